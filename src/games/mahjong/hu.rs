//! Win detection, distance to a winning hand and call (waiting tile) detection.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::play_data::{CallData, CallMap, Meld};
use super::ting::table_for;
use super::tiles::{Tile, ORPHANS};
use crate::engine::plugin::{FanId, HuContext, MahjongVariant, WinSituation};
use crate::engine::rules::PlayConf;

pub const MAX_DISTANCE: i32 = 99;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandShape {
    /// Four melds plus a pair.
    Standard,
    SevenPairs,
    ThirteenOrphans,
}

/// Split a hand into natural tile counts, wildcard count and loose extras.
/// Bonus tiles never form groups and are counted as extras.
pub fn split_hand(tiles: &[Tile], wildcards: &[Tile]) -> (BTreeMap<Tile, u8>, usize, usize) {
    let mut counts = BTreeMap::new();
    let mut wild = 0;
    let mut other = 0;
    for &tile in tiles {
        if wildcards.contains(&tile) {
            wild += 1;
        } else if tile.is_bonus() {
            other += 1;
        } else {
            *counts.entry(tile).or_insert(0u8) += 1;
        }
    }
    (counts, wild, other)
}

/// Pads a hand so its size is congruent to 2 mod 3.
fn fix_hand_count(len: usize) -> usize {
    (122 - len % 122) % 3
}

fn standard_steps(tiles: &[Tile], wildcards: &[Tile]) -> i32 {
    let (mut counts, wild, other) = split_hand(tiles, wildcards);
    table_for(tiles.len()).standard_steps(&mut counts, wild, other + fix_hand_count(tiles.len()))
}

fn seven_pairs_steps(tiles: &[Tile], wildcards: &[Tile]) -> i32 {
    if tiles.len() <= 12 {
        return MAX_DISTANCE;
    }
    let (counts, wild, _) = split_hand(tiles, wildcards);
    let pairs = wild as i32 + counts.values().map(|&c| c as i32 / 2).sum::<i32>();
    (7 - pairs).max(0)
}

fn thirteen_orphans_steps(tiles: &[Tile], wildcards: &[Tile]) -> i32 {
    if tiles.len() < 13 {
        return MAX_DISTANCE;
    }
    let mut selected: Vec<Tile> = Vec::with_capacity(13);
    let mut wild = 0;
    let mut duplicate = false;
    for &tile in tiles {
        if wildcards.contains(&tile) {
            wild += 1;
        } else if ORPHANS.contains(&tile) {
            if selected.contains(&tile) {
                duplicate = true;
            } else {
                selected.push(tile);
            }
        }
    }
    let used = selected.len() + duplicate as usize + wild;
    14 - used.min(14) as i32
}

/// Steps from `tiles` to a complete hand over the standard shape and the
/// allowed special shapes. A complete hand is 0, a ready 13-tile hand is 1.
pub fn distance(tiles: &[Tile], wildcards: &[Tile], shapes: &[HandShape]) -> (i32, HandShape) {
    let mut best = (standard_steps(tiles, wildcards), HandShape::Standard);
    for &shape in shapes {
        let steps = match shape {
            HandShape::Standard => continue,
            HandShape::SevenPairs => seven_pairs_steps(tiles, wildcards),
            HandShape::ThirteenOrphans => thirteen_orphans_steps(tiles, wildcards),
        };
        if steps < best.0 {
            best = (steps, shape);
        }
    }
    best
}

/// Shape of a complete hand, if `tiles` is one.
pub fn evaluate_win(tiles: &[Tile], wildcards: &[Tile], shapes: &[HandShape]) -> Option<HandShape> {
    if tiles.len() % 3 != 2 {
        return None;
    }
    match distance(tiles, wildcards, shapes) {
        (0, shape) => Some(shape),
        _ => None,
    }
}

/// Tile exchanges needed before the hand is ready.
pub fn ting_distance(tiles: &[Tile], wildcards: &[Tile], shapes: &[HandShape]) -> i32 {
    (distance(tiles, wildcards, shapes).0 - 1).max(0)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HuResult {
    pub seat: usize,
    pub fans: Vec<FanId>,
    /// Uncapped multiplier; the cap is applied at settlement.
    pub multiple: i64,
    pub shape: HandShape,
    pub win_tile: Tile,
}

/// Concealed state of one seat as seen by the evaluator.
#[derive(Debug, Clone, Copy)]
pub struct SeatHand<'a> {
    pub seat: usize,
    pub tiles: &'a [Tile],
    pub melds: &'a [Meld],
    pub flowers: usize,
}

/// Binds the variant and rule profile to the pure hand functions.
pub struct HandEvaluator<'a> {
    pub variant: &'a dyn MahjongVariant,
    pub conf: &'a PlayConf,
    pub wildcards: &'a [Tile],
    /// Candidate waiting tiles.
    pub playable: &'a [Tile],
    pub shapes: &'a [HandShape],
}

impl HandEvaluator<'_> {
    /// Evaluate a win with `cur_tile` appended when the hand is one short.
    pub fn check_hu(&self, hand: SeatHand<'_>, cur_tile: Tile, situation: WinSituation) -> Option<HuResult> {
        let mut tiles = hand.tiles.to_vec();
        if tiles.len() % 3 != 2 {
            tiles.push(cur_tile);
        }
        let shape = evaluate_win(&tiles, self.wildcards, self.shapes)?;
        let wildcard_count = tiles.iter().filter(|t| self.wildcards.contains(t)).count();
        let ctx = HuContext {
            seat: hand.seat,
            tiles: &tiles,
            win_tile: cur_tile,
            wildcards: self.wildcards,
            wildcard_count,
            shape,
            melds: hand.melds,
            flowers: hand.flowers,
            situation,
        };
        let fans = self.variant.fan_types(&ctx);
        if fans.is_empty() {
            return None;
        }
        let multiple = self.variant.total_multiple(&fans, self.conf);
        Some(HuResult {
            seat: hand.seat,
            fans,
            multiple,
            shape,
            win_tile: cur_tile,
        })
    }

    /// Winning tiles for a hand one tile short of complete.
    pub fn check_calls(&self, hand: SeatHand<'_>) -> CallData {
        let mut calls = CallData::new();
        if hand.tiles.len() % 3 != 1 {
            return calls;
        }
        // Cheap pre-filter: a hand more than one step away cannot be waiting.
        let (steps, _) = distance(hand.tiles, self.wildcards, self.shapes);
        if steps > 1 {
            return calls;
        }
        for &tile in self.playable {
            if self.held(hand, tile) >= tile.color().copies() {
                continue;
            }
            if let Some(result) = self.check_hu(hand, tile, WinSituation::default()) {
                calls.insert(tile, result.multiple);
            }
        }
        calls
    }

    /// Copies of `tile` the seat already holds, concealed or melded.
    fn held(&self, hand: SeatHand<'_>, tile: Tile) -> usize {
        let concealed = hand.tiles.iter().filter(|&&t| t == tile).count();
        let melded: usize = hand
            .melds
            .iter()
            .map(|m| m.tiles().into_iter().filter(|&t| t == tile).count())
            .sum();
        concealed + melded
    }

    /// For a full hand, every discard that leaves a waiting hand.
    pub fn check_call(&self, hand: SeatHand<'_>) -> CallMap {
        let mut map = CallMap::new();
        if hand.tiles.len() % 3 != 2 {
            return map;
        }
        let mut distinct: Vec<Tile> = hand.tiles.to_vec();
        distinct.sort();
        distinct.dedup();
        for discard in distinct {
            let mut rest = hand.tiles.to_vec();
            if let Some(pos) = rest.iter().position(|&t| t == discard) {
                rest.remove(pos);
            }
            let calls = self.check_calls(SeatHand { tiles: &rest, ..hand });
            if !calls.is_empty() {
                map.insert(discard, calls);
            }
        }
        map
    }
}
