//! Seat requests and outbound round events.

use serde::{Deserialize, Serialize};

use super::hu::HuResult;
use super::operates::{Operate, Operates, Tip};
use super::play_data::KonKind;
use super::scoring::ScoreReason;
use super::tiles::Tile;
use crate::engine::models::{RoundResult, SessionResult};

/// A decision sent by a seat in answer to an `operates` prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MjRequest {
    Discard {
        request_id: u32,
        #[serde(default)]
        tile: Option<Tile>,
    },
    Ting {
        request_id: u32,
        tile: Tile,
    },
    Kon {
        request_id: u32,
        #[serde(default)]
        tile: Option<Tile>,
    },
    Hu {
        request_id: u32,
    },
    Pon {
        request_id: u32,
    },
    Chow {
        request_id: u32,
        left: Tile,
    },
    Pass {
        request_id: u32,
    },
    PonTing {
        request_id: u32,
    },
    ChowTing {
        request_id: u32,
        left: Tile,
    },
}

impl MjRequest {
    pub fn request_id(&self) -> u32 {
        match *self {
            MjRequest::Discard { request_id, .. }
            | MjRequest::Ting { request_id, .. }
            | MjRequest::Kon { request_id, .. }
            | MjRequest::Hu { request_id }
            | MjRequest::Pon { request_id }
            | MjRequest::Chow { request_id, .. }
            | MjRequest::Pass { request_id }
            | MjRequest::PonTing { request_id }
            | MjRequest::ChowTing { request_id, .. } => request_id,
        }
    }

    /// The operate bit this request exercises.
    pub fn operate(&self) -> Operate {
        match self {
            MjRequest::Discard { .. } => Operate::DISCARD,
            MjRequest::Ting { .. } => Operate::TING,
            MjRequest::Kon { .. } => Operate::KON,
            MjRequest::Hu { .. } => Operate::HU,
            MjRequest::Pon { .. } => Operate::PON,
            MjRequest::Chow { .. } => Operate::CHOW,
            MjRequest::Pass { .. } => Operate::PASS,
            MjRequest::PonTing { .. } => Operate::PON_TING,
            MjRequest::ChowTing { .. } => Operate::CHOW_TING,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MjEvent {
    RoundBegin {
        round: u32,
        banker: usize,
        wildcards: Vec<Tile>,
        balances: Vec<i64>,
    },
    /// Own tiles for the owner; other seats only learn the count.
    Deal {
        seat: usize,
        tiles: Vec<Tile>,
        count: usize,
    },
    Draw {
        seat: usize,
        tile: Option<Tile>,
        rest: usize,
    },
    Flower {
        seat: usize,
        tile: Tile,
    },
    Discard {
        seat: usize,
        tile: Tile,
    },
    Ting {
        seat: usize,
        tile: Tile,
        tian_ting: bool,
    },
    Pon {
        seat: usize,
        from: usize,
        tile: Tile,
    },
    Chow {
        seat: usize,
        from: usize,
        tile: Tile,
        left: Tile,
    },
    Kon {
        seat: usize,
        from: usize,
        tile: Tile,
        kind: KonKind,
    },
    Hu {
        seat: usize,
        from: usize,
        result: HuResult,
    },
    Operates {
        seat: usize,
        request_id: u32,
        operates: Operates,
        tile: Option<Tile>,
    },
    Tip {
        seat: usize,
        tip: Tip,
    },
    ScoreChange {
        reason: ScoreReason,
        deltas: Vec<i64>,
        balances: Vec<i64>,
    },
    RoundResult(RoundResult),
    SeatJoined {
        seat: usize,
        player_id: String,
    },
    Ready {
        seat: usize,
    },
    NetState {
        seat: usize,
        online: bool,
    },
    Dissolve {
        seat: usize,
        agree: bool,
        remaining_secs: u64,
    },
    DissolveResult {
        dissolved: bool,
    },
    HistoryBegin,
    HistoryEnd,
    SessionOver(SessionResult),
}

impl MjEvent {
    /// Wire name, matching the serde tag.
    pub fn event_type(&self) -> &'static str {
        match self {
            MjEvent::RoundBegin { .. } => "round_begin",
            MjEvent::Deal { .. } => "deal",
            MjEvent::Draw { .. } => "draw",
            MjEvent::Flower { .. } => "flower",
            MjEvent::Discard { .. } => "discard",
            MjEvent::Ting { .. } => "ting",
            MjEvent::Pon { .. } => "pon",
            MjEvent::Chow { .. } => "chow",
            MjEvent::Kon { .. } => "kon",
            MjEvent::Hu { .. } => "hu",
            MjEvent::Operates { .. } => "operates",
            MjEvent::Tip { .. } => "tip",
            MjEvent::ScoreChange { .. } => "score_change",
            MjEvent::RoundResult(_) => "round_result",
            MjEvent::SeatJoined { .. } => "seat_joined",
            MjEvent::Ready { .. } => "ready",
            MjEvent::NetState { .. } => "net_state",
            MjEvent::Dissolve { .. } => "dissolve",
            MjEvent::DissolveResult { .. } => "dissolve_result",
            MjEvent::HistoryBegin => "history_begin",
            MjEvent::HistoryEnd => "history_end",
            MjEvent::SessionOver(_) => "session_over",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::mahjong::tiles::parse_tile;

    #[test]
    fn test_request_wire_format() {
        let req: MjRequest = serde_json::from_str(r#"{"type":"discard","request_id":4}"#).unwrap();
        assert_eq!(req, MjRequest::Discard { request_id: 4, tile: None });
        assert_eq!(req.operate(), Operate::DISCARD);

        let five = parse_tile("5m").unwrap();
        let json = serde_json::to_value(MjRequest::Chow { request_id: 9, left: five }).unwrap();
        assert_eq!(json["type"], "chow");
        assert_eq!(json["left"], five.code());
        assert!(serde_json::from_str::<MjRequest>(r#"{"type":"dance","request_id":1}"#).is_err());
    }

    #[test]
    fn test_event_type_matches_tag() {
        let events = vec![
            MjEvent::Discard { seat: 0, tile: parse_tile("1p").unwrap() },
            MjEvent::HistoryBegin,
            MjEvent::DissolveResult { dissolved: true },
            MjEvent::ScoreChange {
                reason: ScoreReason::Hu,
                deltas: vec![1, -1],
                balances: vec![1, -1],
            },
        ];
        for ev in events {
            let json = serde_json::to_value(&ev).unwrap();
            assert_eq!(json["type"], ev.event_type());
        }
    }
}
