//! Turn engine: per-round mutable state and the operations the round state
//! machine applies once a choice has been validated.

use std::collections::HashMap;
use std::sync::Arc;

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::checkers::{SelfChecker, WaitChecker};
use super::dealer::Dealer;
use super::hu::{HandEvaluator, HandShape, HuResult, SeatHand};
use super::operates::{Operate, Operates};
use super::play_data::{CallData, KonKind, PlayData};
use super::tiles::{count_of, remove_tiles, Tile};
use crate::engine::errors::{EngineError, EngineResult};
use crate::engine::plugin::{MahjongVariant, WinSituation};
use crate::engine::rules::PlayConf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub seat: usize,
    pub from: usize,
    pub operate: Operate,
    pub tile: Tile,
    pub extra: Option<Tile>,
}

/// Carry-over between rounds of one session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastGameData {
    pub banker: Option<usize>,
    pub counters: HashMap<String, i64>,
}

impl LastGameData {
    /// Banker for the coming round; random on the first round.
    pub fn take_banker<R: Rng>(&mut self, seat_count: usize, rng: &mut R) -> usize {
        match self.banker {
            Some(seat) if seat < seat_count => seat,
            _ => {
                let seat = rng.gen_range(0..seat_count);
                self.banker = Some(seat);
                seat
            }
        }
    }

    pub fn bump(&mut self, key: &str, by: i64) {
        *self.counters.entry(key.to_string()).or_insert(0) += by;
    }
}

pub struct Play {
    conf: PlayConf,
    variant: Arc<dyn MahjongVariant>,
    wildcards: Vec<Tile>,
    playable: Vec<Tile>,
    shapes: Vec<HandShape>,
    cur_seat: usize,
    cur_tile: Option<Tile>,
    banker: usize,
    dealer: Dealer,
    history: Vec<HistoryEntry>,
    seats: Vec<PlayData>,
    hu_results: Vec<Option<HuResult>>,
    eliminated: Vec<bool>,
    self_checkers: Vec<SelfChecker>,
    wait_checkers: Vec<WaitChecker>,
}

impl Play {
    pub fn new(
        conf: PlayConf,
        variant: Arc<dyn MahjongVariant>,
        seat_count: usize,
        banker: usize,
        dealer: Dealer,
    ) -> EngineResult<Self> {
        conf.validate()?;
        if seat_count < 2 || banker >= seat_count {
            return Err(EngineError::InvalidSeat(banker));
        }
        let wildcards = conf.wildcard_tiles()?;
        let playable = conf.tile_set.playable();
        let shapes = variant.special_shapes(&conf);
        let self_checkers = variant.self_checkers().to_vec();
        let wait_checkers = variant.wait_checkers().to_vec();
        Ok(Self {
            conf,
            variant,
            wildcards,
            playable,
            shapes,
            cur_seat: banker,
            cur_tile: None,
            banker,
            dealer,
            history: Vec::new(),
            seats: (0..seat_count).map(PlayData::new).collect(),
            hu_results: vec![None; seat_count],
            eliminated: vec![false; seat_count],
            self_checkers,
            wait_checkers,
        })
    }

    pub fn register_self_checkers(&mut self, checkers: &[SelfChecker]) {
        self.self_checkers = checkers.to_vec();
    }

    pub fn register_wait_checkers(&mut self, checkers: &[WaitChecker]) {
        self.wait_checkers = checkers.to_vec();
    }

    pub fn set_eliminated(&mut self, seat: usize, out: bool) {
        if let Some(flag) = self.eliminated.get_mut(seat) {
            *flag = out;
        }
    }

    pub fn is_eliminated(&self, seat: usize) -> bool {
        self.eliminated.get(seat).copied().unwrap_or(true)
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn conf(&self) -> &PlayConf {
        &self.conf
    }

    pub fn variant(&self) -> &dyn MahjongVariant {
        self.variant.as_ref()
    }

    pub fn wildcards(&self) -> &[Tile] {
        &self.wildcards
    }

    pub fn shapes(&self) -> &[HandShape] {
        &self.shapes
    }

    pub fn seat_count(&self) -> usize {
        self.seats.len()
    }

    pub fn cur_seat(&self) -> usize {
        self.cur_seat
    }

    pub fn cur_tile(&self) -> Option<Tile> {
        self.cur_tile
    }

    pub fn banker(&self) -> usize {
        self.banker
    }

    pub fn rest_count(&self) -> usize {
        self.dealer.rest_count()
    }

    pub fn wall_total(&self) -> usize {
        self.dealer.total()
    }

    pub fn seat_data(&self, seat: usize) -> &PlayData {
        &self.seats[seat]
    }

    pub fn seats(&self) -> &[PlayData] {
        &self.seats
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    pub fn hu_result(&self, seat: usize) -> Option<&HuResult> {
        self.hu_results.get(seat).and_then(Option::as_ref)
    }

    /// Every tile of the round accounted for: wall plus all seat zones.
    pub fn tiles_in_play(&self) -> usize {
        self.rest_count() + self.seats.iter().map(PlayData::tile_count).sum::<usize>()
    }

    fn check_seat(&self, seat: usize) -> EngineResult<()> {
        if seat < self.seats.len() {
            Ok(())
        } else {
            Err(EngineError::InvalidSeat(seat))
        }
    }

    // -----------------------------------------------------------------------
    // Evaluation helpers
    // -----------------------------------------------------------------------

    fn evaluator(&self) -> HandEvaluator<'_> {
        HandEvaluator {
            variant: self.variant.as_ref(),
            conf: &self.conf,
            wildcards: &self.wildcards,
            playable: &self.playable,
            shapes: &self.shapes,
        }
    }

    fn seat_hand<'a>(&'a self, seat: usize, tiles: &'a [Tile]) -> SeatHand<'a> {
        let data = &self.seats[seat];
        SeatHand {
            seat,
            tiles,
            melds: &data.melds,
            flowers: data.flowers.len(),
        }
    }

    pub fn situation(&self, seat: usize, self_drawn: bool, robbing_kong: bool) -> WinSituation {
        WinSituation {
            self_drawn,
            after_kong: self_drawn && self.is_kon_draw(seat),
            robbing_kong,
            last_tile: self.rest_count() == 0,
            first_turn: !self.has_operate(seat) && !self.any_claim(),
            tian_ting: self.seats[seat].tian_ting,
        }
    }

    /// Evaluate the seat's hand with `tile` as the winning tile.
    pub fn check_hu(&self, seat: usize, tile: Tile, situation: WinSituation) -> Option<HuResult> {
        let hand = &self.seats[seat].hand;
        self.evaluator().check_hu(self.seat_hand(seat, hand), tile, situation)
    }

    pub fn add_hu_operate(&mut self, opt: &mut Operates, result: HuResult, must_hu: bool) {
        opt.capped = self.conf.is_capped(result.multiple);
        opt.hu_multiple = result.multiple;
        opt.must_hu = must_hu;
        opt.add(Operate::HU);
        let seat = result.seat;
        self.hu_results[seat] = Some(result);
    }

    pub fn is_all_wild(&self, tiles: &[Tile]) -> bool {
        !tiles.is_empty() && tiles.iter().all(|t| self.wildcards.contains(t))
    }

    pub fn check_must_hu(&self, seat: usize) -> bool {
        self.conf.must_hu || (self.conf.must_hu_if_only_wild && self.is_all_wild(&self.seats[seat].hand))
    }

    pub fn only_wild_after_removing(&self, seat: usize, tile: Tile, count: usize) -> bool {
        let mut rest = self.seats[seat].hand.clone();
        remove_tiles(&mut rest, tile, count);
        self.is_all_wild(&rest)
    }

    fn calls_for(&self, seat: usize, tiles: &[Tile]) -> CallData {
        self.evaluator().check_calls(self.seat_hand(seat, tiles))
    }

    /// Refresh the cached call map of a seat that is not calling.
    pub fn fresh_call_data(&mut self, seat: usize) {
        if self.seats[seat].calling {
            return;
        }
        let hand = &self.seats[seat].hand;
        let map = if hand.len() % 3 == 2 {
            self.evaluator().check_call(self.seat_hand(seat, hand))
        } else {
            Default::default()
        };
        self.seats[seat].call_map = map;
    }

    /// Best multiplier the seat is waiting on, if its hand is ready.
    pub fn ready_multiple(&self, seat: usize) -> Option<i64> {
        let data = &self.seats[seat];
        if data.calling {
            return data.call_data.values().copied().max();
        }
        if data.hand.len() % 3 != 1 {
            return None;
        }
        self.calls_for(seat, &data.hand).values().copied().max()
    }

    pub fn can_zhi_kon(&self, seat: usize, tile: Tile) -> bool {
        let data = &self.seats[seat];
        if self.wildcards.contains(&tile) || !data.can_zhi_kon(tile) {
            return false;
        }
        if !data.calling {
            return true;
        }
        let mut rest = data.hand.clone();
        remove_tiles(&mut rest, tile, 3);
        same_waits(&self.calls_for(seat, &rest), &data.call_data)
    }

    pub fn ready_after_chow(&self, seat: usize, tile: Tile, left: Tile) -> bool {
        let data = &self.seats[seat];
        let Some(used) = data.chow_tiles(tile, left) else {
            return false;
        };
        let mut rest = data.hand.clone();
        for t in used {
            remove_tiles(&mut rest, t, 1);
        }
        !self.evaluator().check_call(self.seat_hand(seat, &rest)).is_empty()
    }

    pub fn ready_after_pon(&self, seat: usize, tile: Tile) -> bool {
        let mut rest = self.seats[seat].hand.clone();
        if remove_tiles(&mut rest, tile, 2) < 2 {
            return false;
        }
        !self.evaluator().check_call(self.seat_hand(seat, &rest)).is_empty()
    }

    /// Kongs the current seat may declare: concealed fours and pong upgrades.
    /// While calling only the drawn tile qualifies and the waits must not change.
    pub fn self_kon_candidates(&self) -> Vec<(Tile, KonKind)> {
        if self.rest_count() == 0 {
            return Vec::new();
        }
        let data = &self.seats[self.cur_seat];
        let mut distinct = data.hand.clone();
        distinct.sort();
        distinct.dedup();
        let mut out = Vec::new();
        for tile in distinct {
            if self.wildcards.contains(&tile) {
                continue;
            }
            if data.calling && Some(tile) != self.cur_tile {
                continue;
            }
            if data.can_an_kon(tile) {
                if data.calling {
                    let mut rest = data.hand.clone();
                    remove_tiles(&mut rest, tile, 4);
                    if !same_waits(&self.calls_for(self.cur_seat, &rest), &data.call_data) {
                        continue;
                    }
                }
                out.push((tile, KonKind::An));
            } else if data.can_bu_kon(tile) {
                out.push((tile, KonKind::Bu));
            }
        }
        out
    }

    // -----------------------------------------------------------------------
    // Operate sets
    // -----------------------------------------------------------------------

    pub fn fetch_self_operates(&mut self) -> Operates {
        let mut opt = Operates::default();
        opt.add(Operate::DISCARD);
        let seat = self.cur_seat;
        self.hu_results[seat] = None;
        for checker in self.self_checkers.clone() {
            checker.check(self, &mut opt);
        }
        opt
    }

    pub fn fetch_wait_operates(&mut self, seat: usize) -> Operates {
        let mut opt = Operates::default();
        opt.add(Operate::PASS);
        self.hu_results[seat] = None;
        if self.is_eliminated(seat) || seat == self.cur_seat {
            return opt;
        }
        for checker in self.wait_checkers.clone() {
            checker.check(self, seat, &mut opt);
        }
        opt
    }

    /// Operates for a seat that may rob the upgrade kong on `cur_tile`.
    pub fn fetch_rob_kong_operates(&mut self, seat: usize) -> Operates {
        let mut opt = Operates::default();
        opt.add(Operate::PASS);
        self.hu_results[seat] = None;
        if self.is_eliminated(seat) || seat == self.cur_seat || self.conf.only_zimo {
            return opt;
        }
        let Some(tile) = self.cur_tile else { return opt };
        let situation = self.situation(seat, false, true);
        let Some(result) = self.check_hu(seat, tile, situation) else {
            return opt;
        };
        if self.check_must_hu(seat) {
            self.add_hu_operate(&mut opt, result, true);
        } else if self.conf.hu_pass && self.seats[seat].is_pass_hu(tile) {
            opt.add_tip(super::operates::Tip::PassHu);
        } else if result.multiple < self.conf.min_multiple {
            opt.add_tip(super::operates::Tip::QiHuFan);
        } else {
            self.add_hu_operate(&mut opt, result, false);
        }
        opt
    }

    // -----------------------------------------------------------------------
    // Round operations
    // -----------------------------------------------------------------------

    /// Deal the opening hands and replace any bonus tiles, banker first.
    pub fn deal(&mut self) {
        let hand_count = self.variant.hand_count(&self.conf);
        for data in &mut self.seats {
            data.hand = self.dealer.deal(hand_count);
        }
        let count = self.seats.len();
        for i in 0..count {
            let seat = (self.banker + i) % count;
            self.replace_flowers(seat);
        }
    }

    fn replace_flowers(&mut self, seat: usize) {
        loop {
            let Some(pos) = self.seats[seat].hand.iter().position(|t| t.is_bonus()) else {
                return;
            };
            let flower = self.seats[seat].hand.remove(pos);
            self.seats[seat].flowers.push(flower);
            self.add_history(seat, seat, Operate::FLOWER, flower, None);
            match self.dealer.draw() {
                Some(tile) => self.seats[seat].hand.push(tile),
                None => return,
            }
        }
    }

    /// Draw for the current seat, setting bonus tiles aside and drawing again.
    /// `None` once the wall is exhausted.
    pub fn draw(&mut self) -> Option<Tile> {
        let seat = self.cur_seat;
        loop {
            let tile = self.dealer.draw()?;
            if tile.is_bonus() {
                self.seats[seat].flowers.push(tile);
                self.add_history(seat, seat, Operate::FLOWER, tile, None);
                continue;
            }
            self.cur_tile = Some(tile);
            self.seats[seat].hand.push(tile);
            self.seats[seat].clear_pass();
            self.add_history(seat, seat, Operate::DRAW, tile, None);
            self.fresh_call_data(seat);
            return Some(tile);
        }
    }

    /// Discard for the current seat. A calling seat always gives up the tile
    /// it just drew; `None` also means the last tile of the hand.
    pub fn discard(&mut self, tile: Option<Tile>) -> EngineResult<Tile> {
        let seat = self.cur_seat;
        let data = &self.seats[seat];
        let last = data.hand.last().copied();
        let tile = if data.calling { last } else { tile.or(last) };
        let Some(tile) = tile else {
            return Err(EngineError::IllegalAction {
                seat,
                message: "empty hand".into(),
            });
        };
        if !self.seats[seat].discard(tile) {
            return Err(EngineError::TileNotInHand {
                seat,
                tile: tile.to_string(),
            });
        }
        self.add_history(seat, seat, Operate::DISCARD, tile, None);
        self.cur_tile = Some(tile);
        self.fresh_call_data(seat);
        Ok(tile)
    }

    /// Declare ready by discarding `tile`, which must leave a waiting hand.
    pub fn ting(&mut self, tile: Tile, tian_ting: bool) -> EngineResult<()> {
        let seat = self.cur_seat;
        if self.seats[seat].calling || !self.seats[seat].can_ting(tile) {
            return Err(EngineError::IllegalAction {
                seat,
                message: format!("discarding {} does not leave a ready hand", tile),
            });
        }
        if !self.seats[seat].discard(tile) {
            return Err(EngineError::TileNotInHand {
                seat,
                tile: tile.to_string(),
            });
        }
        self.seats[seat].set_ting(tian_ting);
        let op = if tian_ting { Operate::TIAN_TING } else { Operate::TING };
        self.add_history(seat, seat, op, tile, None);
        let hand = self.seats[seat].hand.clone();
        self.seats[seat].call_data = self.calls_for(seat, &hand);
        self.seats[seat].call_map.clear();
        self.cur_tile = Some(tile);
        Ok(())
    }

    fn claimed_tile(&self, seat: usize) -> EngineResult<Tile> {
        self.check_seat(seat)?;
        if seat == self.cur_seat {
            return Err(EngineError::IllegalAction {
                seat,
                message: "cannot claim own discard".into(),
            });
        }
        self.cur_tile.ok_or(EngineError::IllegalAction {
            seat,
            message: "no discard to claim".into(),
        })
    }

    fn after_claim(&mut self, seat: usize, op: Operate, tile: Tile, extra: Option<Tile>) {
        let from = self.cur_seat;
        self.seats[from].withdraw_discard();
        self.seats[seat].clear_pass();
        self.add_history(seat, from, op, tile, extra);
        self.cur_seat = seat;
        self.fresh_call_data(seat);
    }

    pub fn pon(&mut self, seat: usize) -> EngineResult<()> {
        let tile = self.claimed_tile(seat)?;
        if !self.seats[seat].pon(tile, self.cur_seat) {
            return Err(EngineError::IllegalAction {
                seat,
                message: format!("cannot pon {}", tile),
            });
        }
        self.after_claim(seat, Operate::PON, tile, None);
        Ok(())
    }

    pub fn chow(&mut self, seat: usize, left: Tile) -> EngineResult<()> {
        let tile = self.claimed_tile(seat)?;
        if !self.seats[seat].chow(tile, left, self.cur_seat) {
            return Err(EngineError::IllegalAction {
                seat,
                message: format!("cannot chow {} from {}", tile, left),
            });
        }
        self.after_claim(seat, Operate::CHOW, tile, Some(left));
        Ok(())
    }

    pub fn zhi_kon(&mut self, seat: usize) -> EngineResult<()> {
        let tile = self.claimed_tile(seat)?;
        if !self.can_zhi_kon(seat, tile) || !self.seats[seat].kon(tile, self.cur_seat, KonKind::Zhi, false) {
            return Err(EngineError::IllegalAction {
                seat,
                message: format!("cannot kon {}", tile),
            });
        }
        self.after_claim(seat, Operate::KON, tile, None);
        Ok(())
    }

    /// Concealed or upgrade kong by the current seat. Returns the kind that
    /// was recorded; an upgrade right after the pong counts as exposed when
    /// the rules say so.
    pub fn try_kon(&mut self, tile: Tile, kind: KonKind) -> EngineResult<KonKind> {
        let seat = self.cur_seat;
        let allowed = self.self_kon_candidates().contains(&(tile, kind));
        let as_zhi = kind == KonKind::Bu && self.conf.kon_after_pon_as_zhi && self.is_kon_after_pon(tile);
        if !allowed || !self.seats[seat].kon(tile, seat, kind, as_zhi) {
            return Err(EngineError::IllegalAction {
                seat,
                message: format!("cannot declare kon on {}", tile),
            });
        }
        let from = match self.seats[seat].melds.iter().rev().find(|m| m.tiles().contains(&tile)) {
            Some(meld) if as_zhi => meld.from(),
            _ => seat,
        };
        self.add_history(seat, from, Operate::KON, tile, None);
        self.cur_tile = Some(tile);
        self.fresh_call_data(seat);
        Ok(if as_zhi { KonKind::Zhi } else { kind })
    }

    /// Self-drawn win: every other active seat pays the capped multiplier.
    pub fn zimo(&mut self) -> Vec<i64> {
        let seat = self.cur_seat;
        let mut multiples = vec![0; self.seats.len()];
        let multi = self.real_multiple(seat);
        for other in 0..self.seats.len() {
            if other == seat || self.eliminated[other] {
                continue;
            }
            multiples[other] = -multi;
            multiples[seat] += multi;
        }
        if let Some(tile) = self.cur_tile {
            self.add_history(seat, seat, Operate::HU, tile, None);
        }
        self.seats[seat].stats.hu += 1;
        multiples
    }

    /// Win off the current seat's discard; the discarder pays every winner.
    pub fn pao_hu(&mut self, winners: &[usize]) -> Vec<i64> {
        let from = self.cur_seat;
        let tile = self.cur_tile;
        if let (Some(tile), Some(&first)) = (tile, winners.first()) {
            if self.seats[from].discards.last() == Some(&tile) {
                self.seats[from].withdraw_discard();
            }
            self.seats[first].hand.push(tile);
        }
        self.settle_claimed_win(winners, from)
    }

    /// Win on a tile used to upgrade a pong. The kong goes back to a pong and
    /// the kong seat pays as if it had discarded the tile.
    pub fn rob_kong(&mut self, winners: &[usize]) -> Vec<i64> {
        let from = self.cur_seat;
        if let Some(tile) = self.cur_tile {
            if self.seats[from].revert_bu_kon(tile).is_some() {
                if let Some(&first) = winners.first() {
                    self.seats[first].hand.push(tile);
                }
            } else {
                tracing::error!(seat = from, %tile, "robbed kong not found");
            }
        }
        self.settle_claimed_win(winners, from)
    }

    fn settle_claimed_win(&mut self, winners: &[usize], from: usize) -> Vec<i64> {
        let mut multiples = vec![0; self.seats.len()];
        for &seat in winners {
            let multi = self.real_multiple(seat);
            multiples[from] -= multi;
            multiples[seat] += multi;
            if let Some(tile) = self.cur_tile {
                self.add_history(seat, from, Operate::HU, tile, None);
            }
            self.seats[seat].stats.hu += 1;
        }
        self.seats[from].stats.pao += 1;
        multiples
    }

    /// Self-drawn win right after an exposed kong: the seat that fed the kong pays alone.
    pub fn dian_kon_hua(&mut self, feeder: usize) -> Vec<i64> {
        let seat = self.cur_seat;
        let mut multiples = vec![0; self.seats.len()];
        let multi = self.real_multiple(seat);
        multiples[seat] += multi;
        multiples[feeder] -= multi;
        if let Some(tile) = self.cur_tile {
            self.add_history(seat, feeder, Operate::HU, tile, None);
        }
        self.seats[seat].stats.hu += 1;
        multiples
    }

    fn real_multiple(&self, seat: usize) -> i64 {
        let multiple = self.hu_results[seat].as_ref().map(|r| r.multiple).unwrap_or(0);
        self.conf.real_multiple(multiple)
    }

    pub fn next_active_seat(&self, from: usize) -> usize {
        let count = self.seats.len();
        (1..=count)
            .map(|i| (from + i) % count)
            .find(|&s| !self.eliminated[s])
            .unwrap_or(from)
    }

    /// Move the turn to `seat` or, when `None`, to the next seat; eliminated
    /// seats are skipped either way.
    pub fn switch_seat(&mut self, seat: Option<usize>) {
        let count = self.seats.len();
        let start = seat.unwrap_or((self.cur_seat + 1) % count) % count;
        if let Some(s) = (0..count).map(|i| (start + i) % count).find(|&s| !self.eliminated[s]) {
            self.cur_seat = s;
        }
    }

    // -----------------------------------------------------------------------
    // History queries
    // -----------------------------------------------------------------------

    fn add_history(&mut self, seat: usize, from: usize, operate: Operate, tile: Tile, extra: Option<Tile>) {
        self.history.push(HistoryEntry {
            seat,
            from,
            operate,
            tile,
            extra,
        });
    }

    fn last_action(&self) -> Option<&HistoryEntry> {
        self.history.iter().rev().find(|h| h.operate != Operate::FLOWER)
    }

    pub fn is_after_pon(&self) -> bool {
        self.last_action().is_some_and(|h| h.operate == Operate::PON)
    }

    pub fn is_after_kon(&self) -> bool {
        self.last_action().is_some_and(|h| h.operate == Operate::KON)
    }

    /// Seat that fed the exposed kong just declared, if the last action was one.
    pub fn after_zhi_kon(&self) -> Option<usize> {
        self.last_action()
            .filter(|h| h.operate == Operate::KON && h.seat != h.from)
            .map(|h| h.from)
    }

    fn is_kon_after_pon(&self, tile: Tile) -> bool {
        self.last_action()
            .is_some_and(|h| h.operate == Operate::PON && h.tile == tile)
    }

    /// The seat's latest draw is the replacement after its own kong.
    fn is_kon_draw(&self, seat: usize) -> bool {
        let mut actions = self.history.iter().rev().filter(|h| h.operate != Operate::FLOWER);
        matches!(
            (actions.next(), actions.next()),
            (Some(draw), Some(kon)) if draw.operate == Operate::DRAW && draw.seat == seat
                && kon.operate == Operate::KON && kon.seat == seat
        )
    }

    /// Feeder of the exposed kong behind the current replacement draw.
    pub fn kon_draw_feeder(&self) -> Option<usize> {
        let mut actions = self.history.iter().rev().filter(|h| h.operate != Operate::FLOWER);
        match (actions.next(), actions.next()) {
            (Some(draw), Some(kon))
                if draw.operate == Operate::DRAW && kon.operate == Operate::KON && kon.seat != kon.from =>
            {
                Some(kon.from)
            }
            _ => None,
        }
    }

    /// True once the seat has done anything besides drawing.
    pub fn has_operate(&self, seat: usize) -> bool {
        self.history
            .iter()
            .any(|h| h.seat == seat && h.operate != Operate::DRAW && h.operate != Operate::FLOWER)
    }

    fn any_claim(&self) -> bool {
        self.history
            .iter()
            .any(|h| matches!(h.operate, Operate::PON | Operate::CHOW | Operate::KON))
    }

    /// Count copies of `tile` visible to everyone.
    pub fn visible_count(&self, tile: Tile) -> usize {
        self.seats
            .iter()
            .map(|d| count_of(&d.discards, tile) + d.melds.iter().map(|m| count_of(&m.tiles(), tile)).sum::<usize>())
            .sum()
    }

    /// Record that `seat` declined a win or pong it was offered on `tile`.
    pub fn record_pass(&mut self, seat: usize, opt: &Operates, tile: Tile) {
        let data = &mut self.seats[seat];
        if opt.has(Operate::HU) {
            data.pass_hu(tile, opt.hu_multiple);
        }
        if opt.has(Operate::PON) {
            data.pass_pon(tile);
        }
    }
}

fn same_waits(a: &CallData, b: &CallData) -> bool {
    a.len() == b.len() && a.keys().zip(b.keys()).all(|(x, y)| x == y)
}
