//! RedDragonVariant: the red dragon is wild, no chows, doubling fans.

use crate::engine::plugin::{FanId, HuContext, MahjongVariant};
use crate::engine::rules::PlayConf;
use crate::games::mahjong::hu::HandShape;

pub const BASIC: FanId = 1;
pub const SELF_DRAWN: FanId = 2;
pub const SEVEN_PAIRS: FanId = 3;
pub const NO_WILDCARD: FanId = 4;
pub const KONG_BLOOM: FanId = 5;
pub const ROBBING_KONG: FanId = 6;

const FANS: &[(FanId, &str)] = &[
    (BASIC, "basic"),
    (SELF_DRAWN, "self_drawn"),
    (SEVEN_PAIRS, "seven_pairs"),
    (NO_WILDCARD, "no_wildcard"),
    (KONG_BLOOM, "kong_bloom"),
    (ROBBING_KONG, "robbing_kong"),
];

pub struct RedDragonVariant;

impl MahjongVariant for RedDragonVariant {
    fn game_id(&self) -> &str {
        "red_dragon"
    }
    fn display_name(&self) -> &str {
        "Red Dragon"
    }
    fn description(&self) -> &str {
        "Red dragons substitute for any tile. Pon and kong only; \
         every fan beyond the basic win doubles the stake."
    }

    fn default_rules(&self) -> PlayConf {
        PlayConf {
            variant: self.game_id().to_string(),
            description: Some(self.description().to_string()),
            wildcards: "1d".to_string(),
            can_chow: false,
            thirteen_orphans: false,
            must_hu_if_only_wild: true,
            no_pon_leaving_only_wild: true,
            max_multiple: 16,
            ..PlayConf::default()
        }
    }

    fn fan_types(&self, ctx: &HuContext<'_>) -> Vec<FanId> {
        let mut fans = vec![BASIC];
        if ctx.situation.self_drawn {
            fans.push(SELF_DRAWN);
        }
        if ctx.shape == HandShape::SevenPairs {
            fans.push(SEVEN_PAIRS);
        }
        if ctx.wildcard_count == 0 {
            fans.push(NO_WILDCARD);
        }
        if ctx.situation.after_kong {
            fans.push(KONG_BLOOM);
        }
        if ctx.situation.robbing_kong {
            fans.push(ROBBING_KONG);
        }
        fans
    }

    fn total_multiple(&self, fans: &[FanId], _conf: &PlayConf) -> i64 {
        let doublings = fans.iter().filter(|&&f| f != BASIC).count() as u32;
        2i64.saturating_pow(doublings)
    }

    fn fan_name(&self, fan: FanId) -> &str {
        FANS.iter().find(|(id, _)| *id == fan).map(|(_, name)| *name).unwrap_or("unknown")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::plugin::WinSituation;
    use crate::games::mahjong::hu::{HandEvaluator, SeatHand};
    use crate::games::mahjong::tiles::{parse_tile, parse_tiles};

    #[test]
    fn test_wildcard_win_doubles_on_self_draw() {
        let variant = RedDragonVariant;
        let conf = variant.default_rules();
        let wildcards = conf.wildcard_tiles().unwrap();
        let playable = conf.tile_set.playable();
        let shapes = variant.special_shapes(&conf);
        assert_eq!(shapes, vec![HandShape::SevenPairs]);
        let eval = HandEvaluator {
            variant: &variant,
            conf: &conf,
            wildcards: &wildcards,
            playable: &playable,
            shapes: &shapes,
        };
        // 1d fills the 3p gap.
        let tiles = parse_tiles("123m456s12p1d789p55w").unwrap();
        let hand = SeatHand {
            seat: 0,
            tiles: &tiles[..13],
            melds: &[],
            flowers: 0,
        };
        let drawn = tiles[13];
        let result = eval
            .check_hu(hand, drawn, WinSituation { self_drawn: true, ..Default::default() })
            .unwrap();
        assert!(!result.fans.contains(&NO_WILDCARD));
        assert_eq!(result.multiple, 2);
        assert_eq!(variant.fan_name(SELF_DRAWN), "self_drawn");
        assert_eq!(parse_tile("1d").unwrap(), wildcards[0]);
    }

    #[test]
    fn test_multiple_is_power_of_two() {
        let v = RedDragonVariant;
        let conf = v.default_rules();
        assert_eq!(v.total_multiple(&[BASIC], &conf), 1);
        assert_eq!(v.total_multiple(&[BASIC, SELF_DRAWN, NO_WILDCARD, KONG_BLOOM], &conf), 8);
    }
}
