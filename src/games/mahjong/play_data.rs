//! Per-seat hand state: concealed tiles, discards, melds, calling state and
//! pass markers. Mutated only through `Play`.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use super::tiles::{count_of, remove_tiles, Tile};

/// Winning tile → multiplier.
pub type CallData = BTreeMap<Tile, i64>;
/// Candidate discard → call data after that discard.
pub type CallMap = BTreeMap<Tile, CallData>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KonKind {
    /// Exposed kong claimed off a discard.
    Zhi,
    /// Concealed kong of four drawn tiles.
    An,
    /// Upgrade of an existing pong.
    Bu,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Meld {
    Chow { tile: Tile, left: Tile, from: usize },
    Pon { tile: Tile, from: usize },
    Kon { tile: Tile, from: usize, kon: KonKind },
}

impl Meld {
    pub fn tiles(&self) -> Vec<Tile> {
        match *self {
            Meld::Chow { left, .. } => (0..3).filter_map(|i| left.offset(i)).collect(),
            Meld::Pon { tile, .. } => vec![tile; 3],
            Meld::Kon { tile, .. } => vec![tile; 4],
        }
    }

    pub fn is_concealed(&self) -> bool {
        matches!(self, Meld::Kon { kon: KonKind::An, .. })
    }

    pub fn is_chow(&self) -> bool {
        matches!(self, Meld::Chow { .. })
    }

    /// Seat that supplied the claimed tile.
    pub fn from(&self) -> usize {
        match *self {
            Meld::Chow { from, .. } | Meld::Pon { from, .. } | Meld::Kon { from, .. } => from,
        }
    }

    /// Physical tile count of the meld.
    pub fn len(&self) -> usize {
        match self {
            Meld::Kon { .. } => 4,
            _ => 3,
        }
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatStats {
    pub pon: u32,
    pub kon: u32,
    pub chow: u32,
    pub hu: u32,
    pub pao: u32,
}

#[derive(Debug, Clone, Default)]
pub struct PlayData {
    pub seat: usize,
    pub hand: Vec<Tile>,
    pub discards: Vec<Tile>,
    pub melds: Vec<Meld>,
    pub flowers: Vec<Tile>,
    pub calling: bool,
    pub tian_ting: bool,
    /// Refreshed while not calling.
    pub call_map: CallMap,
    /// Fixed once the seat has declared ready.
    pub call_data: CallData,
    pass_hu: HashMap<Tile, i64>,
    pass_pon: HashSet<Tile>,
    pub stats: SeatStats,
}

impl PlayData {
    pub fn new(seat: usize) -> Self {
        Self {
            seat,
            ..Self::default()
        }
    }

    pub fn count(&self, tile: Tile) -> usize {
        count_of(&self.hand, tile)
    }

    pub fn has_tile(&self, tile: Tile) -> bool {
        self.hand.contains(&tile)
    }

    /// Remove one copy of `tile` from the hand into the discard pile and pick
    /// the call data that belongs to it.
    pub fn discard(&mut self, tile: Tile) -> bool {
        if remove_tiles(&mut self.hand, tile, 1) == 0 {
            return false;
        }
        self.discards.push(tile);
        if !self.calling {
            self.call_data = self.call_map.get(&tile).cloned().unwrap_or_default();
        }
        true
    }

    /// Withdraw the last discard after another seat claimed it.
    pub fn withdraw_discard(&mut self) -> Option<Tile> {
        self.discards.pop()
    }

    pub fn can_ting(&self, tile: Tile) -> bool {
        self.call_map.contains_key(&tile)
    }

    pub fn set_ting(&mut self, tian_ting: bool) {
        self.calling = true;
        self.tian_ting = tian_ting;
    }

    pub fn can_pon(&self, tile: Tile) -> bool {
        self.count(tile) >= 2
    }

    pub fn can_zhi_kon(&self, tile: Tile) -> bool {
        self.count(tile) == 3
    }

    pub fn can_an_kon(&self, tile: Tile) -> bool {
        self.count(tile) == 4
    }

    pub fn can_bu_kon(&self, tile: Tile) -> bool {
        self.count(tile) >= 1 && self.has_pon(tile)
    }

    /// Lowest tiles of every run the hand can complete with `tile`.
    pub fn chow_lefts(&self, tile: Tile) -> Vec<Tile> {
        if !tile.is_suit() {
            return Vec::new();
        }
        let point = tile.point();
        let lowest = point.saturating_sub(2);
        let highest = point.min(6);
        (lowest..=highest)
            .map(|left| Tile::new(tile.color(), left))
            .filter(|&left| self.chow_tiles(tile, left).is_some())
            .collect()
    }

    /// Hand tiles consumed by a chow of `tile` starting at `left`.
    pub fn chow_tiles(&self, tile: Tile, left: Tile) -> Option<[Tile; 2]> {
        if !tile.is_suit() || left.color() != tile.color() {
            return None;
        }
        if tile.point() < left.point() || tile.point() - left.point() >= 3 {
            return None;
        }
        let mut needed = Vec::with_capacity(2);
        for i in 0..3 {
            let t = left.offset(i)?;
            if t == tile {
                continue;
            }
            if !self.has_tile(t) {
                return None;
            }
            needed.push(t);
        }
        match needed.as_slice() {
            [a, b] => Some([*a, *b]),
            _ => None,
        }
    }

    pub fn chow(&mut self, tile: Tile, left: Tile, from: usize) -> bool {
        let Some(used) = self.chow_tiles(tile, left) else {
            return false;
        };
        for t in used {
            remove_tiles(&mut self.hand, t, 1);
        }
        self.melds.push(Meld::Chow { tile, left, from });
        self.stats.chow += 1;
        true
    }

    pub fn pon(&mut self, tile: Tile, from: usize) -> bool {
        if !self.can_pon(tile) {
            return false;
        }
        remove_tiles(&mut self.hand, tile, 2);
        self.melds.push(Meld::Pon { tile, from });
        self.stats.pon += 1;
        true
    }

    pub fn has_pon(&self, tile: Tile) -> bool {
        self.melds.iter().any(|m| matches!(m, Meld::Pon { tile: t, .. } if *t == tile))
    }

    /// Apply a kong. An upgrade recorded as `as_zhi` keeps the pong's source
    /// seat and scores as an exposed kong.
    pub fn kon(&mut self, tile: Tile, from: usize, kind: KonKind, as_zhi: bool) -> bool {
        match kind {
            KonKind::Zhi => {
                if !self.can_zhi_kon(tile) {
                    return false;
                }
                remove_tiles(&mut self.hand, tile, 3);
                self.melds.push(Meld::Kon { tile, from, kon: KonKind::Zhi });
            }
            KonKind::An => {
                if !self.can_an_kon(tile) {
                    return false;
                }
                remove_tiles(&mut self.hand, tile, 4);
                self.melds.push(Meld::Kon { tile, from: self.seat, kon: KonKind::An });
            }
            KonKind::Bu => {
                let Some(pos) = self
                    .melds
                    .iter()
                    .position(|m| matches!(m, Meld::Pon { tile: t, .. } if *t == tile))
                else {
                    return false;
                };
                if remove_tiles(&mut self.hand, tile, 1) == 0 {
                    return false;
                }
                let pon_from = self.melds[pos].from();
                let kon = if as_zhi { KonKind::Zhi } else { KonKind::Bu };
                self.melds[pos] = Meld::Kon { tile, from: pon_from, kon };
            }
        }
        self.stats.kon += 1;
        true
    }

    /// Turn an upgrade kong back into its pong and return the robbed tile.
    pub fn revert_bu_kon(&mut self, tile: Tile) -> Option<Tile> {
        let pos = self
            .melds
            .iter()
            .position(|m| matches!(m, Meld::Kon { tile: t, kon: KonKind::Bu | KonKind::Zhi, .. } if *t == tile))?;
        let from = self.melds[pos].from();
        self.melds[pos] = Meld::Pon { tile, from };
        self.stats.kon = self.stats.kon.saturating_sub(1);
        Some(tile)
    }

    pub fn kon_count(&self) -> usize {
        self.melds.iter().filter(|m| matches!(m, Meld::Kon { .. })).count()
    }

    /// True while no tile has been claimed from another seat.
    pub fn is_men_qin(&self) -> bool {
        self.melds.iter().all(|m| m.is_concealed())
    }

    pub fn pass_hu(&mut self, tile: Tile, multiple: i64) {
        self.pass_hu.insert(tile, multiple);
    }

    pub fn is_pass_hu(&self, tile: Tile) -> bool {
        self.pass_hu.contains_key(&tile)
    }

    pub fn pass_pon(&mut self, tile: Tile) {
        self.pass_pon.insert(tile);
    }

    pub fn is_pass_pon(&self, tile: Tile) -> bool {
        self.pass_pon.contains(&tile)
    }

    pub fn clear_pass(&mut self) {
        self.pass_hu.clear();
        self.pass_pon.clear();
    }

    /// Tiles held by this seat in any zone.
    pub fn tile_count(&self) -> usize {
        self.hand.len() + self.discards.len() + self.flowers.len() + self.melds.iter().map(|m| m.len()).sum::<usize>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::mahjong::tiles::{parse_tile, parse_tiles};

    fn data(hand: &str) -> PlayData {
        let mut d = PlayData::new(1);
        d.hand = parse_tiles(hand).unwrap();
        d
    }

    #[test]
    fn test_chow_lefts() {
        let d = data("23m 5m 9p");
        let lefts = d.chow_lefts(parse_tile("4m").unwrap());
        assert_eq!(lefts, vec![parse_tile("2m").unwrap(), parse_tile("3m").unwrap()]);
        assert!(d.chow_lefts(parse_tile("1w").unwrap()).is_empty());
    }

    #[test]
    fn test_pon_then_upgrade_kong() {
        let mut d = data("55s 5s 1m");
        let five = parse_tile("5s").unwrap();
        assert!(d.pon(five, 0));
        assert_eq!(d.hand.len(), 2);
        assert!(d.can_bu_kon(five));
        assert!(d.kon(five, 1, KonKind::Bu, false));
        assert_eq!(d.melds, vec![Meld::Kon { tile: five, from: 0, kon: KonKind::Bu }]);
        assert_eq!(d.revert_bu_kon(five), Some(five));
        assert_eq!(d.melds, vec![Meld::Pon { tile: five, from: 0 }]);
    }

    #[test]
    fn test_discard_takes_call_data() {
        let mut d = data("1m 2m");
        let one = parse_tile("1m").unwrap();
        let mut calls = CallData::new();
        calls.insert(parse_tile("3m").unwrap(), 2);
        d.call_map.insert(one, calls.clone());
        assert!(d.discard(one));
        assert_eq!(d.call_data, calls);
        assert!(!d.discard(one));
    }

    #[test]
    fn test_pass_markers_clear() {
        let mut d = data("");
        let t = parse_tile("7p").unwrap();
        d.pass_hu(t, 3);
        d.pass_pon(t);
        assert!(d.is_pass_hu(t) && d.is_pass_pon(t));
        d.clear_pass();
        assert!(!d.is_pass_hu(t) && !d.is_pass_pon(t));
    }

    #[test]
    fn test_concealed_kong_keeps_men_qin() {
        let mut d = data("4444m");
        assert!(d.kon(parse_tile("4m").unwrap(), 1, KonKind::An, false));
        assert!(d.is_men_qin());
        assert_eq!(d.tile_count(), 4);
    }
}
