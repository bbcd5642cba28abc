//! The wall: shuffled from a seed or built from a scripted preset.

use std::collections::{HashMap, VecDeque};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use super::tiles::{parse_tiles, Tile, TileSet};
use crate::engine::errors::{EngineError, EngineResult};

/// Scripted deal: fixed tiles per seat, then fixed draws at the wall front.
/// Seats with fewer tiles than the hand size are topped up from the shuffled rest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresetDeal {
    #[serde(default)]
    pub hands: Vec<String>,
    #[serde(default)]
    pub wall_front: String,
}

#[derive(Debug, Clone)]
pub struct Dealer {
    wall: VecDeque<Tile>,
    total: usize,
}

impl Dealer {
    pub fn shuffled(tile_set: &TileSet, seed: u64) -> Self {
        let mut tiles = tile_set.deck();
        let mut rng = StdRng::seed_from_u64(seed);
        tiles.shuffle(&mut rng);
        Self::from_tiles(tiles)
    }

    /// Lay out a preset so that dealing `hand_count` tiles to each of
    /// `seats` seats in order reproduces it.
    pub fn from_preset(
        tile_set: &TileSet,
        preset: &PresetDeal,
        seats: usize,
        hand_count: usize,
        seed: u64,
    ) -> EngineResult<Self> {
        if preset.hands.len() > seats {
            return Err(EngineError::Config(format!(
                "preset has {} hands for {} seats",
                preset.hands.len(),
                seats
            )));
        }
        let mut pool: HashMap<Tile, usize> = tile_set.universe().into_iter().collect();
        let mut take = |tiles: &[Tile]| -> EngineResult<()> {
            for tile in tiles {
                match pool.get_mut(tile) {
                    Some(n) if *n > 0 => *n -= 1,
                    _ => return Err(EngineError::Config(format!("preset uses too many {}", tile))),
                }
            }
            Ok(())
        };

        let mut hands = Vec::with_capacity(seats);
        for seat in 0..seats {
            let text = preset.hands.get(seat).map(String::as_str).unwrap_or("");
            let hand = parse_tiles(text)?;
            if hand.len() > hand_count {
                return Err(EngineError::Config(format!(
                    "preset hand for seat {} has {} tiles",
                    seat,
                    hand.len()
                )));
            }
            take(&hand)?;
            hands.push(hand);
        }
        let front = parse_tiles(&preset.wall_front)?;
        take(&front)?;

        let mut rest: Vec<Tile> = pool
            .into_iter()
            .flat_map(|(tile, n)| std::iter::repeat(tile).take(n))
            .collect();
        rest.sort();
        rest.shuffle(&mut StdRng::seed_from_u64(seed));

        let mut wall = Vec::with_capacity(tile_set.deck().len());
        for mut hand in hands {
            let more = hand_count - hand.len();
            hand.extend(rest.drain(..more.min(rest.len())));
            wall.extend(hand);
        }
        wall.extend(front);
        wall.extend(rest);
        Ok(Self::from_tiles(wall))
    }

    pub fn from_tiles(tiles: Vec<Tile>) -> Self {
        Self {
            total: tiles.len(),
            wall: tiles.into(),
        }
    }

    pub fn deal(&mut self, count: usize) -> Vec<Tile> {
        let n = count.min(self.wall.len());
        self.wall.drain(..n).collect()
    }

    pub fn draw(&mut self) -> Option<Tile> {
        self.wall.pop_front()
    }

    pub fn rest_count(&self) -> usize {
        self.wall.len()
    }

    /// Tiles the wall started with.
    pub fn total(&self) -> usize {
        self.total
    }

    pub fn count(&self, tile: Tile) -> usize {
        self.wall.iter().filter(|&&t| t == tile).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::mahjong::tiles::{format_tiles, parse_tile};

    #[test]
    fn test_shuffle_is_seeded() {
        let set = TileSet::default();
        let mut a = Dealer::shuffled(&set, 7);
        let mut b = Dealer::shuffled(&set, 7);
        assert_eq!(a.deal(13), b.deal(13));
        assert_eq!(a.rest_count(), 123);
        assert_eq!(a.total(), 136);
    }

    #[test]
    fn test_preset_places_hands_and_front() {
        let set = TileSet::default();
        let preset = PresetDeal {
            hands: vec!["1112345678999m".into(), "".into(), "55p".into()],
            wall_front: "1w".into(),
        };
        let mut dealer = Dealer::from_preset(&set, &preset, 4, 13, 1).unwrap();
        assert_eq!(format_tiles(&dealer.deal(13)), "1112345678999m");
        assert_eq!(dealer.deal(13).len(), 13);
        let third = dealer.deal(13);
        assert_eq!(&third[..2], &[parse_tile("5p").unwrap(); 2]);
        dealer.deal(13);
        assert_eq!(dealer.draw(), parse_tile("1w").ok());
        assert_eq!(dealer.rest_count(), 136 - 52 - 1);
    }

    #[test]
    fn test_preset_rejects_overflow() {
        let preset = PresetDeal {
            hands: vec!["11111m".into()],
            wall_front: String::new(),
        };
        assert!(Dealer::from_preset(&TileSet::default(), &preset, 4, 13, 1).is_err());
    }
}
