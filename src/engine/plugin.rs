//! MahjongVariant trait: the per-title rule layer every variant implements.
//!
//! The engine owns hand decomposition, claim resolution and settlement. A
//! variant only names itself, supplies its default rule profile and maps a
//! complete hand to fan ids and a total multiplier.

use crate::engine::rules::PlayConf;
use crate::games::mahjong::checkers::{SelfChecker, WaitChecker, DEFAULT_SELF_CHECKERS, DEFAULT_WAIT_CHECKERS};
use crate::games::mahjong::hu::HandShape;
use crate::games::mahjong::play_data::Meld;
use crate::games::mahjong::tiles::Tile;

pub type FanId = u32;

/// How the winning tile arrived.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WinSituation {
    pub self_drawn: bool,
    /// Replacement draw after a kong.
    pub after_kong: bool,
    pub robbing_kong: bool,
    /// The wall is empty after this tile.
    pub last_tile: bool,
    /// The seat has not acted yet this round.
    pub first_turn: bool,
    /// The seat declared ready on its very first turn.
    pub tian_ting: bool,
}

/// Everything a variant may look at when scoring a complete hand.
#[derive(Debug, Clone, Copy)]
pub struct HuContext<'a> {
    pub seat: usize,
    /// Concealed tiles including the winning tile.
    pub tiles: &'a [Tile],
    pub win_tile: Tile,
    pub wildcards: &'a [Tile],
    pub wildcard_count: usize,
    pub shape: HandShape,
    pub melds: &'a [Meld],
    pub flowers: usize,
    pub situation: WinSituation,
}

impl HuContext<'_> {
    /// Concealed tiles that are not wildcards.
    pub fn natural_tiles(&self) -> impl Iterator<Item = Tile> + '_ {
        self.tiles.iter().copied().filter(move |t| !self.wildcards.contains(t))
    }

    /// Every tile of the hand, melds included, without wildcards.
    pub fn all_natural_tiles(&self) -> Vec<Tile> {
        let mut tiles: Vec<Tile> = self.natural_tiles().collect();
        for meld in self.melds {
            tiles.extend(meld.tiles());
        }
        tiles
    }

    pub fn is_concealed(&self) -> bool {
        self.melds.iter().all(|m| m.is_concealed())
    }
}

/// Trait that every rule variant must implement.
pub trait MahjongVariant: Send + Sync {
    fn game_id(&self) -> &str;
    fn display_name(&self) -> &str;
    fn description(&self) -> &str;

    /// Built-in rule profile used when the catalog has none for this variant.
    fn default_rules(&self) -> PlayConf;

    /// Concealed tiles dealt to each seat.
    fn hand_count(&self, conf: &PlayConf) -> usize {
        conf.hand_count
    }

    /// Checker order for the seat about to act.
    fn self_checkers(&self) -> &'static [SelfChecker] {
        DEFAULT_SELF_CHECKERS
    }

    /// Checker order for seats answering a discard.
    fn wait_checkers(&self) -> &'static [WaitChecker] {
        DEFAULT_WAIT_CHECKERS
    }

    /// Special shapes this variant accepts on top of the standard hand.
    fn special_shapes(&self, conf: &PlayConf) -> Vec<HandShape> {
        let mut shapes = Vec::new();
        if conf.hand_count == 13 {
            if conf.seven_pairs {
                shapes.push(HandShape::SevenPairs);
            }
            if conf.thirteen_orphans {
                shapes.push(HandShape::ThirteenOrphans);
            }
        }
        shapes
    }

    /// Fan ids matched by a complete hand. Always non-empty for a real win.
    fn fan_types(&self, ctx: &HuContext<'_>) -> Vec<FanId>;

    /// Uncapped multiplier for a set of fans.
    fn total_multiple(&self, fans: &[FanId], conf: &PlayConf) -> i64;

    fn fan_name(&self, fan: FanId) -> &str;
}
