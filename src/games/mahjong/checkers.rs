//! Ordered checker chains producing the legal-action set.
//!
//! Order matters: a forced win sets `must_hu` on the accumulator and every
//! later checker that would offer an alternative backs off.

use super::operates::{Operate, Operates, Tip};
use super::play::Play;
use super::play_data::KonKind;

/// Checks for the seat about to act.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelfChecker {
    Win,
    Kon,
    Ting,
}

/// Checks for a passive seat answering a discard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitChecker {
    WinOffDiscard,
    Chow,
    Pon,
    ZhiKon,
    ChowTing,
    PonTing,
}

pub const DEFAULT_SELF_CHECKERS: &[SelfChecker] = &[SelfChecker::Win, SelfChecker::Kon, SelfChecker::Ting];

pub const DEFAULT_WAIT_CHECKERS: &[WaitChecker] = &[
    WaitChecker::WinOffDiscard,
    WaitChecker::Chow,
    WaitChecker::Pon,
    WaitChecker::ZhiKon,
    WaitChecker::ChowTing,
    WaitChecker::PonTing,
];

impl SelfChecker {
    pub fn check(self, play: &mut Play, opt: &mut Operates) {
        let seat = play.cur_seat();
        match self {
            SelfChecker::Win => {
                if play.is_after_pon() {
                    return;
                }
                let Some(tile) = play.cur_tile() else { return };
                let situation = play.situation(seat, true, false);
                let Some(result) = play.check_hu(seat, tile, situation) else {
                    return;
                };
                if play.check_must_hu(seat) {
                    opt.remove(Operate::DISCARD);
                    play.add_hu_operate(opt, result, true);
                } else if result.multiple < play.conf().min_multiple {
                    opt.add_tip(Tip::QiHuFan);
                } else {
                    play.add_hu_operate(opt, result, false);
                }
            }
            SelfChecker::Kon => {
                if opt.must_hu {
                    return;
                }
                let candidates = play.self_kon_candidates();
                if !candidates.is_empty() {
                    opt.kon_tiles = candidates.into_iter().map(|(tile, _)| tile).collect();
                    opt.add(Operate::KON);
                }
            }
            SelfChecker::Ting => {
                let data = play.seat_data(seat);
                if opt.must_hu || data.calling || data.call_map.is_empty() {
                    return;
                }
                if play.conf().tian_ting && !play.has_operate(seat) {
                    opt.add(Operate::TIAN_TING);
                } else {
                    opt.add(Operate::TING);
                }
            }
        }
    }
}

impl WaitChecker {
    pub fn check(self, play: &mut Play, seat: usize, opt: &mut Operates) {
        let Some(tile) = play.cur_tile() else { return };
        match self {
            WaitChecker::WinOffDiscard => {
                if play.conf().only_zimo {
                    opt.add_tip(Tip::OnlyZiMo);
                    return;
                }
                let situation = play.situation(seat, false, false);
                let Some(result) = play.check_hu(seat, tile, situation) else {
                    return;
                };
                if play.check_must_hu(seat) {
                    play.add_hu_operate(opt, result, true);
                } else if play.conf().hu_pass && play.seat_data(seat).is_pass_hu(tile) {
                    opt.add_tip(Tip::PassHu);
                } else if result.multiple < play.conf().min_multiple {
                    opt.add_tip(Tip::QiHuFan);
                } else {
                    play.add_hu_operate(opt, result, false);
                }
            }
            WaitChecker::Chow => {
                if opt.must_hu || !play.conf().can_chow || play.seat_data(seat).calling {
                    return;
                }
                if play.next_active_seat(play.cur_seat()) != seat {
                    return;
                }
                let lefts = play.seat_data(seat).chow_lefts(tile);
                if !lefts.is_empty() {
                    opt.chow_lefts = lefts;
                    opt.add(Operate::CHOW);
                }
            }
            WaitChecker::Pon => {
                let data = play.seat_data(seat);
                if opt.must_hu || data.calling || !data.can_pon(tile) {
                    return;
                }
                if play.conf().no_pon_leaving_only_wild && play.only_wild_after_removing(seat, tile, 2) {
                    return;
                }
                if play.conf().pon_pass && data.is_pass_pon(tile) {
                    opt.add_tip(Tip::PassPon);
                } else {
                    opt.add(Operate::PON);
                }
            }
            WaitChecker::ZhiKon => {
                if opt.must_hu || play.rest_count() == 0 {
                    return;
                }
                if play.can_zhi_kon(seat, tile) {
                    opt.kon_tiles = vec![tile];
                    opt.add(Operate::KON);
                }
            }
            WaitChecker::ChowTing => {
                if opt.must_hu || !opt.has(Operate::CHOW) {
                    return;
                }
                let lefts: Vec<_> = opt
                    .chow_lefts
                    .iter()
                    .copied()
                    .filter(|&left| play.ready_after_chow(seat, tile, left))
                    .collect();
                if !lefts.is_empty() {
                    opt.chow_ting_lefts = lefts;
                    opt.add(Operate::CHOW_TING);
                }
            }
            WaitChecker::PonTing => {
                if opt.must_hu || !opt.has(Operate::PON) {
                    return;
                }
                if play.ready_after_pon(seat, tile) {
                    opt.add(Operate::PON_TING);
                }
            }
        }
    }
}

/// Kong kinds a seat may declare on its own turn.
pub fn self_kon_kind(play: &Play, tile: super::tiles::Tile) -> Option<KonKind> {
    play.self_kon_candidates()
        .into_iter()
        .find(|(t, _)| *t == tile)
        .map(|(_, kind)| kind)
}
