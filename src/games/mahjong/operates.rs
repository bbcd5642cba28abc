//! Legal-action bitmask for one decision point, plus tip codes.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::tiles::Tile;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Operate(pub u32);

impl Operate {
    pub const NONE: Operate = Operate(0);
    pub const PASS: Operate = Operate(1);
    pub const CHOW: Operate = Operate(1 << 1);
    pub const PON: Operate = Operate(1 << 2);
    pub const KON: Operate = Operate(1 << 3);
    pub const TING: Operate = Operate(1 << 4);
    pub const HU: Operate = Operate(1 << 5);
    pub const DISCARD: Operate = Operate(1 << 6);
    pub const EXCHANGE: Operate = Operate(1 << 7);
    pub const DRAW: Operate = Operate(1 << 8);
    pub const TIAN_TING: Operate = Operate(1 << 9);
    pub const FLOWER: Operate = Operate(1 << 10);
    pub const CHOW_TING: Operate = Operate(1 << 11);
    pub const PON_TING: Operate = Operate(1 << 12);

    const NAMES: [(Operate, &'static str); 13] = [
        (Operate::PASS, "Pass"),
        (Operate::CHOW, "Chow"),
        (Operate::PON, "Pon"),
        (Operate::KON, "Kon"),
        (Operate::TING, "Ting"),
        (Operate::HU, "Win"),
        (Operate::DISCARD, "Discard"),
        (Operate::EXCHANGE, "Exchange"),
        (Operate::DRAW, "Draw"),
        (Operate::TIAN_TING, "TianTing"),
        (Operate::FLOWER, "Flower"),
        (Operate::CHOW_TING, "ChowTing"),
        (Operate::PON_TING, "PonTing"),
    ];

    pub fn name(self) -> &'static str {
        Self::NAMES
            .iter()
            .find(|(op, _)| *op == self)
            .map(|(_, name)| *name)
            .unwrap_or("")
    }

    pub fn from_name(name: &str) -> Operate {
        Self::NAMES
            .iter()
            .find(|(_, n)| *n == name)
            .map(|(op, _)| *op)
            .unwrap_or(Operate::NONE)
    }

    /// Claim priority when several seats answer one discard.
    pub fn priority(self) -> u8 {
        match self {
            Operate::HU => 4,
            Operate::KON => 3,
            Operate::PON | Operate::PON_TING => 2,
            Operate::CHOW | Operate::CHOW_TING => 1,
            _ => 0,
        }
    }
}

impl fmt::Debug for Operate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            "" => write!(f, "Operate({})", self.0),
            name => f.write_str(name),
        }
    }
}

/// Hint codes shown next to a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tip {
    PassHu = 0,
    PassPon = 1,
    QiHuFan = 2,
    OnlyZiMo = 3,
    MenQin = 4,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operates {
    pub value: u32,
    /// The seat must declare the win.
    pub must_hu: bool,
    pub capped: bool,
    pub hu_multiple: i64,
    /// Lowest tiles of the runs a chow may form.
    pub chow_lefts: Vec<Tile>,
    /// Chow lefts that also leave the hand ready.
    pub chow_ting_lefts: Vec<Tile>,
    pub kon_tiles: Vec<Tile>,
    pub tips: Vec<Tip>,
}

impl Operates {
    pub fn add(&mut self, op: Operate) {
        self.value |= op.0;
    }

    pub fn remove(&mut self, op: Operate) {
        self.value &= !op.0;
    }

    pub fn has(&self, op: Operate) -> bool {
        self.value & op.0 != 0
    }

    pub fn add_tip(&mut self, tip: Tip) {
        if !self.tips.contains(&tip) {
            self.tips.push(tip);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.value == 0
    }

    /// Bits other than Pass.
    pub fn has_claim(&self) -> bool {
        self.value & !Operate::PASS.0 != 0
    }

    /// Highest claim priority offered.
    pub fn max_priority(&self) -> u8 {
        Operate::NAMES
            .iter()
            .filter(|(op, _)| self.has(*op))
            .map(|(op, _)| op.priority())
            .max()
            .unwrap_or(0)
    }

    pub fn list(&self) -> Vec<Operate> {
        Operate::NAMES.iter().map(|(op, _)| *op).filter(|op| self.has(*op)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bit_values() {
        assert_eq!(Operate::PASS.0, 1);
        assert_eq!(Operate::HU.0, 32);
        assert_eq!(Operate::DRAW.0, 256);
        assert_eq!(Operate::PON_TING.0, 4096);
        assert_eq!(Operate::from_name("Win"), Operate::HU);
        assert_eq!(Operate::KON.name(), "Kon");
    }

    #[test]
    fn test_add_remove_and_priority() {
        let mut ops = Operates::default();
        ops.add(Operate::PASS);
        assert!(!ops.has_claim());
        ops.add(Operate::CHOW);
        ops.add(Operate::PON);
        assert_eq!(ops.max_priority(), 2);
        ops.remove(Operate::PON);
        assert_eq!(ops.max_priority(), 1);
        assert_eq!(ops.list(), vec![Operate::PASS, Operate::CHOW]);
        ops.add_tip(Tip::PassPon);
        ops.add_tip(Tip::PassPon);
        assert_eq!(ops.tips.len(), 1);
    }
}
