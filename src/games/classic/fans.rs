//! Fan detection for the classic variant.

use std::collections::BTreeMap;

use crate::engine::plugin::{FanId, HuContext};
use crate::games::mahjong::hu::HandShape;
use crate::games::mahjong::play_data::Meld;
use crate::games::mahjong::tiles::{Color, Tile};

pub const BASIC: FanId = 1;
pub const SELF_DRAWN: FanId = 2;
pub const CONCEALED: FanId = 3;
pub const ALL_PONGS: FanId = 4;
pub const HALF_FLUSH: FanId = 5;
pub const FULL_FLUSH: FanId = 6;
pub const SEVEN_PAIRS: FanId = 7;
pub const THIRTEEN_ORPHANS: FanId = 8;
pub const KONG_BLOOM: FanId = 9;
pub const ROBBING_KONG: FanId = 10;
pub const LAST_TILE: FanId = 11;
pub const HEAVENLY_HAND: FanId = 12;
pub const DRAGON_PONG: FanId = 13;
pub const HEAVENLY_READY: FanId = 14;

/// (id, name, multiplier)
pub const FAN_TABLE: &[(FanId, &str, i64)] = &[
    (BASIC, "basic", 1),
    (SELF_DRAWN, "self_drawn", 1),
    (CONCEALED, "concealed", 1),
    (ALL_PONGS, "all_pongs", 2),
    (HALF_FLUSH, "half_flush", 2),
    (FULL_FLUSH, "full_flush", 4),
    (SEVEN_PAIRS, "seven_pairs", 4),
    (THIRTEEN_ORPHANS, "thirteen_orphans", 13),
    (KONG_BLOOM, "kong_bloom", 1),
    (ROBBING_KONG, "robbing_kong", 1),
    (LAST_TILE, "last_tile", 1),
    (HEAVENLY_HAND, "heavenly_hand", 8),
    (DRAGON_PONG, "dragon_pong", 1),
    (HEAVENLY_READY, "heavenly_ready", 2),
];

pub fn fan_value(fan: FanId) -> i64 {
    FAN_TABLE.iter().find(|(id, _, _)| *id == fan).map(|(_, _, v)| *v).unwrap_or(0)
}

pub fn fan_name(fan: FanId) -> &'static str {
    FAN_TABLE.iter().find(|(id, _, _)| *id == fan).map(|(_, n, _)| *n).unwrap_or("unknown")
}

fn counts(tiles: impl Iterator<Item = Tile>) -> BTreeMap<Tile, usize> {
    let mut map = BTreeMap::new();
    for tile in tiles {
        *map.entry(tile).or_insert(0) += 1;
    }
    map
}

/// Wildcards needed to turn the concealed tiles into triplets and one pair.
fn pong_cost(counts: &BTreeMap<Tile, usize>) -> usize {
    let triplet = |c: usize| (3 - c % 3) % 3;
    let all_triplets: usize = counts.values().map(|&c| triplet(c)).sum();
    // Pair made of two wildcards.
    let mut best = all_triplets + 2;
    for &c in counts.values() {
        let as_pair = if c >= 2 { triplet(c - 2) } else { 2 - c };
        best = best.min(all_triplets - triplet(c) + as_pair);
    }
    best
}

fn is_all_pongs(ctx: &HuContext<'_>) -> bool {
    if ctx.shape != HandShape::Standard || ctx.melds.iter().any(Meld::is_chow) {
        return false;
    }
    let cost = pong_cost(&counts(ctx.natural_tiles()));
    cost <= ctx.wildcard_count && (ctx.wildcard_count - cost) % 3 == 0
}

/// `(suits used, any honor)` over every natural tile of the hand.
fn color_profile(ctx: &HuContext<'_>) -> (Vec<Color>, bool) {
    let tiles = ctx.all_natural_tiles();
    let mut suits: Vec<Color> = tiles.iter().filter(|t| t.is_suit()).map(|t| t.color()).collect();
    suits.sort();
    suits.dedup();
    (suits, tiles.iter().any(|t| t.is_honor()))
}

fn has_dragon_pong(ctx: &HuContext<'_>) -> bool {
    let melded = ctx.melds.iter().any(|m| match m {
        Meld::Pon { tile, .. } | Meld::Kon { tile, .. } => tile.is_dragon(),
        Meld::Chow { .. } => false,
    });
    melded
        || counts(ctx.natural_tiles())
            .iter()
            .any(|(t, &c)| t.is_dragon() && c >= 3)
}

pub fn detect(ctx: &HuContext<'_>) -> Vec<FanId> {
    let mut fans = vec![BASIC];
    let sit = ctx.situation;
    if sit.self_drawn {
        fans.push(SELF_DRAWN);
    }
    if ctx.melds.iter().all(Meld::is_concealed) && !sit.self_drawn {
        fans.push(CONCEALED);
    }
    match ctx.shape {
        HandShape::SevenPairs => fans.push(SEVEN_PAIRS),
        HandShape::ThirteenOrphans => fans.push(THIRTEEN_ORPHANS),
        HandShape::Standard => {
            if is_all_pongs(ctx) {
                fans.push(ALL_PONGS);
            }
            if has_dragon_pong(ctx) {
                fans.push(DRAGON_PONG);
            }
        }
    }
    if ctx.shape != HandShape::ThirteenOrphans {
        match color_profile(ctx) {
            (suits, false) if suits.len() == 1 => fans.push(FULL_FLUSH),
            (suits, true) if suits.len() == 1 => fans.push(HALF_FLUSH),
            _ => {}
        }
    }
    if sit.after_kong {
        fans.push(KONG_BLOOM);
    }
    if sit.robbing_kong {
        fans.push(ROBBING_KONG);
    }
    if sit.last_tile {
        fans.push(LAST_TILE);
    }
    if sit.first_turn && sit.self_drawn {
        fans.push(HEAVENLY_HAND);
    }
    if sit.tian_ting {
        fans.push(HEAVENLY_READY);
    }
    fans
}
