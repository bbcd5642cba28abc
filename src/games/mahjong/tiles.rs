//! Tile identity, classification and the text notation used by tests,
//! preset deals and logs.
//!
//! A tile packs `(color << 8) | (point << 4) | flag` into an `i32`; the flag
//! is always 1 for playable tiles. Points are zero based.
//!
//! Text notation: digits followed by a color letter, e.g. `123m 55p 1234w 3d`.
//! `m` characters, `s` bamboo, `p` dots, `w` winds (east south west north),
//! `d` dragons (red green white), `f` flowers, `q` seasons, `j` joker.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::engine::errors::{EngineError, EngineResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Color {
    Character = 0,
    Bamboo = 1,
    Dot = 2,
    Wind = 3,
    Dragon = 4,
    Flower = 5,
    Season = 6,
    Joker = 7,
}

const POINT_COUNT: [u8; 8] = [9, 9, 9, 4, 3, 4, 4, 1];
const SAME_TILE_COUNT: [usize; 8] = [4, 4, 4, 4, 4, 1, 1, 0];

impl Color {
    pub const ALL: [Color; 8] = [
        Color::Character,
        Color::Bamboo,
        Color::Dot,
        Color::Wind,
        Color::Dragon,
        Color::Flower,
        Color::Season,
        Color::Joker,
    ];

    pub const SUITS: [Color; 3] = [Color::Character, Color::Bamboo, Color::Dot];

    /// Number of distinct points in this color.
    pub fn point_count(self) -> u8 {
        POINT_COUNT[self as usize]
    }

    /// Copies of each tile of this color in a full deck.
    pub fn copies(self) -> usize {
        SAME_TILE_COUNT[self as usize]
    }

    pub fn is_suit(self) -> bool {
        matches!(self, Color::Character | Color::Bamboo | Color::Dot)
    }

    fn suffix(self) -> char {
        match self {
            Color::Character => 'm',
            Color::Bamboo => 's',
            Color::Dot => 'p',
            Color::Wind => 'w',
            Color::Dragon => 'd',
            Color::Flower => 'f',
            Color::Season => 'q',
            Color::Joker => 'j',
        }
    }

    fn from_suffix(c: char) -> Option<Color> {
        Some(match c {
            'm' => Color::Character,
            's' => Color::Bamboo,
            'p' => Color::Dot,
            'w' => Color::Wind,
            'd' => Color::Dragon,
            'f' => Color::Flower,
            'q' => Color::Season,
            'j' => Color::Joker,
            _ => return None,
        })
    }
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub struct Tile(i32);

pub const EAST: Tile = Tile::new(Color::Wind, 0);
pub const RED_DRAGON: Tile = Tile::new(Color::Dragon, 0);
pub const GREEN_DRAGON: Tile = Tile::new(Color::Dragon, 1);
pub const WHITE_DRAGON: Tile = Tile::new(Color::Dragon, 2);
pub const JOKER: Tile = Tile::new(Color::Joker, 0);

/// Terminals of the three suits plus every honor.
pub const ORPHANS: [Tile; 13] = [
    Tile::new(Color::Character, 0),
    Tile::new(Color::Character, 8),
    Tile::new(Color::Bamboo, 0),
    Tile::new(Color::Bamboo, 8),
    Tile::new(Color::Dot, 0),
    Tile::new(Color::Dot, 8),
    Tile::new(Color::Wind, 0),
    Tile::new(Color::Wind, 1),
    Tile::new(Color::Wind, 2),
    Tile::new(Color::Wind, 3),
    Tile::new(Color::Dragon, 0),
    Tile::new(Color::Dragon, 1),
    Tile::new(Color::Dragon, 2),
];

impl Tile {
    pub const fn new(color: Color, point: u8) -> Tile {
        Tile(((color as i32) << 8) | ((point as i32) << 4) | 1)
    }

    /// Decode a packed value, rejecting anything that is not a real tile.
    pub fn from_code(code: i32) -> Option<Tile> {
        if code & 0x0F != 1 || code < 0 {
            return None;
        }
        let color = *Color::ALL.get((code >> 8) as usize)?;
        let point = ((code >> 4) & 0x0F) as u8;
        if point >= color.point_count() {
            return None;
        }
        Some(Tile(code))
    }

    pub fn code(self) -> i32 {
        self.0
    }

    pub fn color(self) -> Color {
        Color::ALL[((self.0 >> 8) & 0x07) as usize]
    }

    pub fn point(self) -> u8 {
        ((self.0 >> 4) & 0x0F) as u8
    }

    pub fn is_suit(self) -> bool {
        self.color().is_suit()
    }

    pub fn is_wind(self) -> bool {
        self.color() == Color::Wind
    }

    pub fn is_dragon(self) -> bool {
        self.color() == Color::Dragon
    }

    pub fn is_honor(self) -> bool {
        self.is_wind() || self.is_dragon()
    }

    /// Flowers and seasons: set aside on draw, never part of a meld.
    pub fn is_bonus(self) -> bool {
        matches!(self.color(), Color::Flower | Color::Season)
    }

    pub fn is_terminal(self) -> bool {
        self.is_suit() && (self.point() == 0 || self.point() == 8)
    }

    pub fn is_terminal_or_honor(self) -> bool {
        self.is_terminal() || self.is_honor()
    }

    /// Ranks 2, 5 and 8 of a suit.
    pub fn is_258(self) -> bool {
        self.is_suit() && self.point() % 3 == 1
    }

    /// The tile one point higher in the same color, if any.
    pub fn next_in_color(self) -> Option<Tile> {
        let next = self.point() + 1;
        (next < self.color().point_count()).then(|| Tile::new(self.color(), next))
    }

    /// Tile at `offset` points above this one, if it exists.
    pub fn offset(self, offset: u8) -> Option<Tile> {
        let point = self.point().checked_add(offset)?;
        (point < self.color().point_count()).then(|| Tile::new(self.color(), point))
    }
}

impl TryFrom<i32> for Tile {
    type Error = String;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        Tile::from_code(code).ok_or_else(|| format!("invalid tile code {}", code))
    }
}

impl From<Tile> for i32 {
    fn from(tile: Tile) -> i32 {
        tile.0
    }
}

impl fmt::Display for Tile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.point() + 1, self.color().suffix())
    }
}

impl fmt::Debug for Tile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Parse the compact text notation into tiles, preserving order.
pub fn parse_tiles(text: &str) -> EngineResult<Vec<Tile>> {
    let mut tiles = Vec::new();
    let mut pending: Vec<u8> = Vec::new();

    for c in text.chars() {
        if let Some(d) = c.to_digit(10) {
            if d == 0 {
                return Err(EngineError::Parse {
                    input: text.to_string(),
                    message: "points start at 1".to_string(),
                });
            }
            pending.push(d as u8 - 1);
        } else if let Some(color) = Color::from_suffix(c) {
            for &point in &pending {
                if point >= color.point_count() {
                    return Err(EngineError::Parse {
                        input: text.to_string(),
                        message: format!("point {} out of range for '{}'", point + 1, c),
                    });
                }
                tiles.push(Tile::new(color, point));
            }
            pending.clear();
        } else if !c.is_whitespace() && c != ',' {
            return Err(EngineError::Parse {
                input: text.to_string(),
                message: format!("unexpected character '{}'", c),
            });
        }
    }

    if !pending.is_empty() {
        return Err(EngineError::Parse {
            input: text.to_string(),
            message: "pending digits without color".to_string(),
        });
    }
    Ok(tiles)
}

/// Parse exactly one tile.
pub fn parse_tile(text: &str) -> EngineResult<Tile> {
    let tiles = parse_tiles(text)?;
    match tiles.as_slice() {
        [tile] => Ok(*tile),
        _ => Err(EngineError::Parse {
            input: text.to_string(),
            message: format!("expected one tile, found {}", tiles.len()),
        }),
    }
}

/// Render tiles in compact notation, grouping consecutive tiles of one color.
pub fn format_tiles(tiles: &[Tile]) -> String {
    let mut out = String::new();
    let mut current: Option<Color> = None;
    for tile in tiles {
        if let Some(color) = current {
            if color != tile.color() {
                out.push(color.suffix());
            }
        }
        out.push(char::from(b'1' + tile.point()));
        current = Some(tile.color());
    }
    if let Some(color) = current {
        out.push(color.suffix());
    }
    out
}

/// Which colors a deck is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileSet {
    #[serde(default = "default_true")]
    pub winds: bool,
    #[serde(default = "default_true")]
    pub dragons: bool,
    #[serde(default)]
    pub bonus: bool,
}

fn default_true() -> bool {
    true
}

impl Default for TileSet {
    fn default() -> Self {
        Self {
            winds: true,
            dragons: true,
            bonus: false,
        }
    }
}

impl TileSet {
    pub fn colors(&self) -> Vec<Color> {
        let mut colors = Color::SUITS.to_vec();
        if self.winds {
            colors.push(Color::Wind);
        }
        if self.dragons {
            colors.push(Color::Dragon);
        }
        if self.bonus {
            colors.push(Color::Flower);
            colors.push(Color::Season);
        }
        colors
    }

    /// Distinct tiles with their copy counts, in ascending order.
    pub fn universe(&self) -> Vec<(Tile, usize)> {
        self.colors()
            .into_iter()
            .flat_map(|color| {
                (0..color.point_count()).map(move |p| (Tile::new(color, p), color.copies()))
            })
            .collect()
    }

    /// Distinct non-bonus tiles a hand can wait on.
    pub fn playable(&self) -> Vec<Tile> {
        self.universe()
            .into_iter()
            .map(|(t, _)| t)
            .filter(|t| !t.is_bonus())
            .collect()
    }

    /// Every physical tile of the deck, unshuffled.
    pub fn deck(&self) -> Vec<Tile> {
        self.universe()
            .into_iter()
            .flat_map(|(tile, copies)| std::iter::repeat(tile).take(copies))
            .collect()
    }
}

/// Count occurrences of `tile` in `tiles`.
pub fn count_of(tiles: &[Tile], tile: Tile) -> usize {
    tiles.iter().filter(|&&t| t == tile).count()
}

/// Remove up to `count` copies of `tile`, returning how many were removed.
pub fn remove_tiles(tiles: &mut Vec<Tile>, tile: Tile, count: usize) -> usize {
    let mut removed = 0;
    tiles.retain(|&t| {
        if removed < count && t == tile {
            removed += 1;
            false
        } else {
            true
        }
    });
    removed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoding_matches_packed_layout() {
        assert_eq!(Tile::new(Color::Character, 0).code(), 0x001);
        assert_eq!(Tile::new(Color::Bamboo, 0).code(), 0x101);
        assert_eq!(Tile::new(Color::Dragon, 2).code(), 0x421);
        assert_eq!(Tile::from_code(0x421), Some(WHITE_DRAGON));
        assert_eq!(Tile::from_code(0x431), None);
        assert_eq!(Tile::from_code(0x090), None);
    }

    #[test]
    fn test_parse_and_display() {
        let tiles = parse_tiles("123m 55p 1w 3d").unwrap();
        assert_eq!(tiles.len(), 7);
        assert_eq!(tiles[0].to_string(), "1m");
        assert_eq!(tiles[4].color(), Color::Dot);
        assert_eq!(tiles[5], EAST);
        assert_eq!(tiles[6], WHITE_DRAGON);
        assert_eq!(format_tiles(&tiles), "123m55p1w3d");
        assert!(parse_tiles("5d").is_err());
        assert!(parse_tiles("12").is_err());
        assert!(parse_tile("12m").is_err());
    }

    #[test]
    fn test_classification() {
        let one = parse_tile("1m").unwrap();
        let five = parse_tile("5s").unwrap();
        assert!(one.is_terminal());
        assert!(!five.is_terminal());
        assert!(five.is_258());
        assert!(RED_DRAGON.is_honor() && RED_DRAGON.is_terminal_or_honor());
        assert!(parse_tile("2f").unwrap().is_bonus());
        assert_eq!(one.next_in_color(), Some(parse_tile("2m").unwrap()));
        assert_eq!(parse_tile("9p").unwrap().next_in_color(), None);
        assert_eq!(one.offset(2), Some(parse_tile("3m").unwrap()));
    }

    #[test]
    fn test_deck_sizes() {
        assert_eq!(TileSet::default().deck().len(), 136);
        let with_bonus = TileSet { bonus: true, ..TileSet::default() };
        assert_eq!(with_bonus.deck().len(), 144);
        let suits_only = TileSet { winds: false, dragons: false, bonus: false };
        assert_eq!(suits_only.deck().len(), 108);
        assert_eq!(with_bonus.playable().len(), 34);
    }

    #[test]
    fn test_serde_uses_code() {
        let json = serde_json::to_string(&RED_DRAGON).unwrap();
        assert_eq!(json, "1025");
        let back: Tile = serde_json::from_str(&json).unwrap();
        assert_eq!(back, RED_DRAGON);
        assert!(serde_json::from_str::<Tile>("7").is_err());
    }

    #[test]
    fn test_remove_tiles() {
        let mut tiles = parse_tiles("1112m").unwrap();
        let one = parse_tile("1m").unwrap();
        assert_eq!(remove_tiles(&mut tiles, one, 2), 2);
        assert_eq!(format_tiles(&tiles), "12m");
    }
}
