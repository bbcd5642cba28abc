//! ClassicVariant: honors and suits, chows allowed, additive fans.

use crate::engine::plugin::{FanId, HuContext, MahjongVariant};
use crate::engine::rules::PlayConf;

use super::fans;

pub struct ClassicVariant;

impl MahjongVariant for ClassicVariant {
    fn game_id(&self) -> &str {
        "classic"
    }
    fn display_name(&self) -> &str {
        "Classic"
    }
    fn description(&self) -> &str {
        "Four players, 136 tiles, chow pon and kong claims. \
         Fans add up to the hand multiplier."
    }

    fn default_rules(&self) -> PlayConf {
        PlayConf {
            variant: self.game_id().to_string(),
            description: Some(self.description().to_string()),
            ..PlayConf::default()
        }
    }

    fn fan_types(&self, ctx: &HuContext<'_>) -> Vec<FanId> {
        fans::detect(ctx)
    }

    fn total_multiple(&self, fans: &[FanId], _conf: &PlayConf) -> i64 {
        fans.iter().map(|&f| fans::fan_value(f)).sum()
    }

    fn fan_name(&self, fan: FanId) -> &str {
        fans::fan_name(fan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::plugin::WinSituation;
    use crate::games::mahjong::hu::{HandEvaluator, HandShape, SeatHand};
    use crate::games::mahjong::tiles::{parse_tile, parse_tiles};

    #[test]
    fn test_self_drawn_full_flush_scores() {
        let variant = ClassicVariant;
        let conf = variant.default_rules();
        let playable = conf.tile_set.playable();
        let shapes = variant.special_shapes(&conf);
        let eval = HandEvaluator {
            variant: &variant,
            conf: &conf,
            wildcards: &[],
            playable: &playable,
            shapes: &shapes,
        };
        let tiles = parse_tiles("1112345678999m").unwrap();
        let hand = SeatHand {
            seat: 2,
            tiles: &tiles,
            melds: &[],
            flowers: 0,
        };
        let situation = WinSituation {
            self_drawn: true,
            ..Default::default()
        };
        let result = eval.check_hu(hand, parse_tile("5m").unwrap(), situation).unwrap();
        assert_eq!(result.shape, HandShape::Standard);
        assert!(result.fans.contains(&fans::SELF_DRAWN));
        assert!(result.fans.contains(&fans::FULL_FLUSH));
        // basic + self drawn + full flush
        assert_eq!(result.multiple, 6);
    }
}
