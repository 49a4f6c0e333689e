use std::time::Duration;

use thiserror::Error;

use super::models::Field;

/// Every way a turn can go wrong. None of these end a session: the
/// state machine turns each one into a reply or a fallback.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    #[error("intent classifier unavailable: {0}")]
    ClassifierUnavailable(String),
    #[error("intent classifier returned malformed output: {0}")]
    ClassifierMalformed(String),
    #[error("no calendar event matches the reference")]
    ReferenceEventNotFound,
    #[error("no availability found within the search horizon")]
    NoAvailabilityFound,
    #[error("calendar read failed: {0}")]
    CalendarReadFailed(String),
    #[error("calendar write failed: {0}")]
    CalendarWriteFailed(String),
    #[error("there is no suggested slot to confirm")]
    NoCandidateToConfirm,
    #[error("missing required parameter: {0}")]
    MissingParameter(Field),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}
