//! Bot strategy trait and the harness players.
//!
//! Bots see exactly what a human client sees in an `operates` prompt and
//! answer with the same `MjRequest` a human would send.

use rand::seq::SliceRandom;

use crate::games::mahjong::hu::ting_distance;
use crate::games::mahjong::messages::MjRequest;
use crate::games::mahjong::operates::{Operate, Operates};
use crate::games::mahjong::state::Prompt;
use crate::games::mahjong::tiles::{remove_tiles, Tile};

/// A bot strategy picks an answer for an outstanding prompt.
pub trait BotStrategy: Send + Sync {
    fn name(&self) -> &str;
    fn choose_action(&self, prompt: &Prompt) -> MjRequest;
}

/// Look a strategy up by the name used in bot ids and CLI flags.
pub fn strategy_by_name(name: &str) -> Option<Box<dyn BotStrategy>> {
    match name {
        "random" => Some(Box::new(RandomStrategy)),
        "greedy" => Some(Box::new(GreedyStrategy)),
        _ => None,
    }
}

/// Every answer the prompt allows, forced wins first.
pub fn legal_requests(prompt: &Prompt) -> Vec<MjRequest> {
    let request_id = prompt.request_id;
    let opt = &prompt.operates;
    if opt.must_hu && opt.has(Operate::HU) {
        return vec![MjRequest::Hu { request_id }];
    }
    let mut out = Vec::new();
    if opt.has(Operate::HU) {
        out.push(MjRequest::Hu { request_id });
    }
    if prompt.self_turn {
        if opt.has(Operate::DISCARD) {
            let mut distinct = prompt.hand.clone();
            distinct.sort();
            distinct.dedup();
            out.extend(distinct.into_iter().map(|tile| MjRequest::Discard {
                request_id,
                tile: Some(tile),
            }));
        }
        if opt.has(Operate::TING) || opt.has(Operate::TIAN_TING) {
            out.extend(prompt.ting_tiles.iter().map(|&tile| MjRequest::Ting { request_id, tile }));
        }
        out.extend(opt.kon_tiles.iter().map(|&tile| MjRequest::Kon {
            request_id,
            tile: Some(tile),
        }));
        return out;
    }
    out.push(MjRequest::Pass { request_id });
    if opt.has(Operate::PON) {
        out.push(MjRequest::Pon { request_id });
    }
    if opt.has(Operate::KON) {
        out.push(MjRequest::Kon { request_id, tile: None });
    }
    if opt.has(Operate::PON_TING) {
        out.push(MjRequest::PonTing { request_id });
    }
    if opt.has(Operate::CHOW) {
        out.extend(opt.chow_lefts.iter().map(|&left| MjRequest::Chow { request_id, left }));
    }
    if opt.has(Operate::CHOW_TING) {
        out.extend(opt.chow_ting_lefts.iter().map(|&left| MjRequest::ChowTing { request_id, left }));
    }
    out
}

/// Fallback when nothing else applies: pass a claim, discard the last tile.
fn default_request(prompt: &Prompt) -> MjRequest {
    if prompt.self_turn {
        MjRequest::Discard {
            request_id: prompt.request_id,
            tile: None,
        }
    } else {
        MjRequest::Pass {
            request_id: prompt.request_id,
        }
    }
}

/// Picks a uniformly random legal answer.
pub struct RandomStrategy;

impl BotStrategy for RandomStrategy {
    fn name(&self) -> &str {
        "random"
    }

    fn choose_action(&self, prompt: &Prompt) -> MjRequest {
        let legal = legal_requests(prompt);
        let mut rng = rand::thread_rng();
        legal.choose(&mut rng).cloned().unwrap_or_else(|| default_request(prompt))
    }
}

/// Always wins when it can and otherwise discards toward the fewest exchanges
/// from ready.
pub struct GreedyStrategy;

impl GreedyStrategy {
    fn distance(prompt: &Prompt, tiles: &[Tile]) -> i32 {
        ting_distance(tiles, &prompt.wildcards, &prompt.shapes)
    }

    fn best_discard(prompt: &Prompt) -> Option<Tile> {
        let mut distinct = prompt.hand.clone();
        distinct.sort();
        distinct.dedup();
        let natural: Vec<Tile> = distinct
            .iter()
            .copied()
            .filter(|t| !prompt.wildcards.contains(t))
            .collect();
        let candidates = if natural.is_empty() { distinct } else { natural };
        candidates.into_iter().min_by_key(|&tile| {
            let mut rest = prompt.hand.clone();
            remove_tiles(&mut rest, tile, 1);
            // Prefer honors on ties; they rarely fit runs.
            (Self::distance(prompt, &rest), !tile.is_honor())
        })
    }

    fn claim_improves(prompt: &Prompt, tile: Tile, used: usize) -> bool {
        let mut rest = prompt.hand.clone();
        if remove_tiles(&mut rest, tile, used) < used {
            return false;
        }
        Self::distance(prompt, &rest) < Self::distance(prompt, &prompt.hand)
    }
}

impl BotStrategy for GreedyStrategy {
    fn name(&self) -> &str {
        "greedy"
    }

    fn choose_action(&self, prompt: &Prompt) -> MjRequest {
        let request_id = prompt.request_id;
        let opt: &Operates = &prompt.operates;
        if opt.has(Operate::HU) {
            return MjRequest::Hu { request_id };
        }
        if prompt.self_turn {
            if let Some(&tile) = opt.kon_tiles.first() {
                return MjRequest::Kon {
                    request_id,
                    tile: Some(tile),
                };
            }
            if opt.has(Operate::TING) || opt.has(Operate::TIAN_TING) {
                if let Some(&tile) = prompt.ting_tiles.first() {
                    return MjRequest::Ting { request_id, tile };
                }
            }
            if !opt.has(Operate::DISCARD) {
                return default_request(prompt);
            }
            return MjRequest::Discard {
                request_id,
                tile: Self::best_discard(prompt),
            };
        }
        if opt.has(Operate::PON_TING) {
            return MjRequest::PonTing { request_id };
        }
        if let Some(&left) = opt.chow_ting_lefts.first() {
            return MjRequest::ChowTing { request_id, left };
        }
        if let Some(tile) = prompt.tile {
            if opt.has(Operate::KON) {
                return MjRequest::Kon { request_id, tile: None };
            }
            if opt.has(Operate::PON) && Self::claim_improves(prompt, tile, 2) {
                return MjRequest::Pon { request_id };
            }
        }
        default_request(prompt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::mahjong::hu::HandShape;
    use crate::games::mahjong::tiles::{parse_tile, parse_tiles};

    fn prompt(hand: &str, operates: Operates, self_turn: bool, tile: Option<&str>) -> Prompt {
        Prompt {
            seat: 0,
            request_id: 3,
            operates,
            tile: tile.map(|t| parse_tile(t).unwrap()),
            self_turn,
            hand: parse_tiles(hand).unwrap(),
            ting_tiles: Vec::new(),
            wildcards: Vec::new(),
            shapes: vec![HandShape::SevenPairs],
        }
    }

    #[test]
    fn test_greedy_discards_isolated_honor() {
        let mut opt = Operates::default();
        opt.add(Operate::DISCARD);
        let p = prompt("123m456s789p11p45m1w", opt, true, None);
        let req = GreedyStrategy.choose_action(&p);
        assert_eq!(
            req,
            MjRequest::Discard {
                request_id: 3,
                tile: Some(parse_tile("1w").unwrap())
            }
        );
    }

    #[test]
    fn test_forced_win_is_only_legal_answer() {
        let mut opt = Operates::default();
        opt.add(Operate::PASS);
        opt.add(Operate::PON);
        opt.add(Operate::HU);
        opt.must_hu = true;
        let p = prompt("11m", opt, false, Some("1m"));
        assert_eq!(legal_requests(&p), vec![MjRequest::Hu { request_id: 3 }]);
        assert_eq!(RandomStrategy.choose_action(&p), MjRequest::Hu { request_id: 3 });
    }

    #[test]
    fn test_claim_answers_include_pass_and_chows() {
        let mut opt = Operates::default();
        opt.add(Operate::PASS);
        opt.add(Operate::CHOW);
        opt.chow_lefts = vec![parse_tile("2m").unwrap(), parse_tile("3m").unwrap()];
        let p = prompt("2345m", opt, false, Some("4m"));
        let legal = legal_requests(&p);
        assert_eq!(legal.len(), 3);
        assert!(legal.contains(&MjRequest::Pass { request_id: 3 }));
        assert_eq!(GreedyStrategy.choose_action(&p), MjRequest::Pass { request_id: 3 });
        assert!(strategy_by_name("greedy").is_some());
        assert!(strategy_by_name("mcts").is_none());
    }
}
