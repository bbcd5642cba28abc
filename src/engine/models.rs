//! Core table data types: players, inbound actions, outbound events and results.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::games::mahjong::hu::HuResult;

pub type PlayerId = String;

pub const ACTION_ENTER_GAME: &str = "enter_game";
pub const ACTION_READY: &str = "ready";
pub const ACTION_DISSOLVE: &str = "dissolve";
pub const ACTION_GAME: &str = "game";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub player_id: PlayerId,
    pub display_name: String,
    #[serde(default)]
    pub seat_index: usize,
    #[serde(default)]
    pub is_bot: bool,
    #[serde(default)]
    pub bot_id: Option<String>,
    /// Balance brought to the table.
    #[serde(default)]
    pub score: i64,
}

impl Player {
    pub fn human(player_id: &str, score: i64) -> Self {
        Self {
            player_id: player_id.to_string(),
            display_name: player_id.to_string(),
            seat_index: 0,
            is_bot: false,
            bot_id: None,
            score,
        }
    }

    pub fn bot(player_id: &str, bot_id: &str, score: i64) -> Self {
        Self {
            is_bot: true,
            bot_id: Some(bot_id.to_string()),
            ..Self::human(player_id, score)
        }
    }
}

/// Decoded inbound message. `action_type` is one of `enter_game`, `ready`,
/// `dissolve` or `game`; game payloads decode into `MjRequest`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    pub action_type: String,
    pub player_id: PlayerId,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl Action {
    pub fn new(action_type: &str, player_id: &str, payload: serde_json::Value) -> Self {
        Self {
            action_type: action_type.to_string(),
            player_id: player_id.to_string(),
            payload,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub event_type: String,
    /// Recipient; `None` for a broadcast.
    #[serde(default)]
    pub player_id: Option<PlayerId>,
    #[serde(default)]
    pub payload: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundEndReason {
    Win,
    /// Wall exhausted with no winner.
    Exhausted,
    Dissolved,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundResult {
    pub round: u32,
    pub banker: usize,
    pub reason: RoundEndReason,
    #[serde(default)]
    pub winners: Vec<HuResult>,
    /// Seat that paid for a claimed win, if any.
    #[serde(default)]
    pub from: Option<usize>,
    /// Total score change of each seat over the round.
    pub deltas: Vec<i64>,
    pub balances: Vec<i64>,
    #[serde(default)]
    pub next_banker: Option<usize>,
    #[serde(default)]
    pub details: HashMap<String, serde_json::Value>,
}

impl RoundResult {
    pub fn is_draw(&self) -> bool {
        self.winners.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionResult {
    pub rounds_played: u32,
    pub final_scores: HashMap<PlayerId, i64>,
    #[serde(default = "default_reason")]
    pub reason: String,
}

fn default_reason() -> String {
    "normal".to_string()
}
