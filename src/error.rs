use thiserror::Error;

/// Errors surfaced synchronously to collaborators. None of these are
/// fatal: a rejected call leaves the scheduler state untouched and the
/// cycle keeps running.
#[derive(Debug, Error, PartialEq)]
pub enum ControlError {
    #[error("unknown lane id {0} (valid lanes are 1-4)")]
    InvalidLane(u8),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("cycle record sink unavailable: {0}")]
    SinkUnavailable(String),
}
