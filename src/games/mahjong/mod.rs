//! Mahjong core: tiles, hand evaluation, the turn engine and the round state machine.

pub mod checkers;
pub mod dealer;
pub mod hu;
pub mod messages;
pub mod operates;
pub mod play;
pub mod play_data;
pub mod scoring;
pub mod sender;
pub mod state;
pub mod tiles;
pub mod ting;

pub use state::{Phase, Prompt, Round, RoundSettings};
