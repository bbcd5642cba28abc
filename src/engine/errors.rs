//! Engine error taxonomy.
//!
//! Only precondition and input errors surface here. Wall exhaustion, duplicate
//! round-over triggers and settlement parameter mismatches are handled inside
//! the engine and never reach the caller.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// A seat acted while another seat holds the decision.
    NotYourTurn { seat: usize },
    /// The requested operation is not in the seat's current legal set.
    IllegalAction { seat: usize, message: String },
    /// A tile named by the request is not in the seat's hand.
    TileNotInHand { seat: usize, tile: String },
    /// The response carries an outdated request id.
    StaleRequest { seat: usize, request_id: u32 },
    /// Seat index out of range for the table.
    InvalidSeat(usize),
    /// The player id is not registered at the table.
    PlayerNotOnTable(String),
    /// A game message arrived while no round is running.
    RoundNotStarted,
    /// Payload could not be decoded into a request.
    BadPayload(String),
    /// Rule catalog or preset deal is malformed.
    Config(String),
    /// Tile text could not be parsed.
    Parse { input: String, message: String },
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::NotYourTurn { seat } => write!(f, "seat {} is not expected to act", seat),
            EngineError::IllegalAction { seat, message } => {
                write!(f, "illegal action from seat {}: {}", seat, message)
            }
            EngineError::TileNotInHand { seat, tile } => {
                write!(f, "tile {} is not in the hand of seat {}", tile, seat)
            }
            EngineError::StaleRequest { seat, request_id } => {
                write!(f, "stale request id {} from seat {}", request_id, seat)
            }
            EngineError::InvalidSeat(seat) => write!(f, "invalid seat {}", seat),
            EngineError::PlayerNotOnTable(id) => write!(f, "player {} is not on the table", id),
            EngineError::RoundNotStarted => write!(f, "round not started"),
            EngineError::BadPayload(msg) => write!(f, "bad payload: {}", msg),
            EngineError::Config(msg) => write!(f, "configuration error: {}", msg),
            EngineError::Parse { input, message } => {
                write!(f, "parse error on '{}': {}", input, message)
            }
        }
    }
}

impl std::error::Error for EngineError {}

pub type EngineResult<T> = Result<T, EngineError>;
