use ulid::Ulid;

use crate::model::{OperatingHours, TimeWindow};

#[derive(Debug)]
pub enum EngineError {
    NotFound(Ulid),
    AlreadyExists(Ulid),
    /// The requested window overlaps this confirmed booking.
    Conflict(Ulid),
    UsernameTaken(String),
    /// Malformed input: bad field, unparsable value, `start >= end`.
    Invalid(&'static str),
    OutsideOperatingHours {
        window: TimeWindow,
        hours: OperatingHours,
    },
    LimitExceeded(&'static str),
    WalError(String),
}

impl EngineError {
    /// Malformed input the caller should have rejected before admission.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            EngineError::Invalid(_) | EngineError::OutsideOperatingHours { .. }
        )
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::NotFound(id) => write!(f, "not found: {id}"),
            EngineError::AlreadyExists(id) => write!(f, "already exists: {id}"),
            EngineError::Conflict(id) => write!(f, "conflict with booking: {id}"),
            EngineError::UsernameTaken(name) => write!(f, "username already taken: {name}"),
            EngineError::Invalid(msg) => write!(f, "invalid input: {msg}"),
            EngineError::OutsideOperatingHours { window, hours } => write!(
                f,
                "window [{}, {}) outside operating hours {:02}:00-{:02}:00",
                crate::model::format_clock(window.start),
                crate::model::format_clock(window.end),
                hours.day_start_hour,
                hours.day_end_hour
            ),
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::WalError(e) => write!(f, "WAL error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}
