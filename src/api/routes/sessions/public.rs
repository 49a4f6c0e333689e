//! Public types for the sessions API
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::agent::models::ChatMessage;
use crate::agent::{BookingRecord, Parameters, Phase, Session, Slot};

#[derive(Deserialize)]
pub struct CreateSessionRequest {
    pub user_id: String,
    // IANA name, e.g. "America/New_York". Defaults to the server's
    // configured timezone.
    pub timezone: Option<String>,
}

#[derive(Deserialize)]
pub struct MessageRequest {
    pub text: String,
    /// Interim transcripts are acknowledged but never processed.
    #[serde(default = "default_is_final")]
    pub is_final: bool,
}

fn default_is_final() -> bool {
    true
}

#[derive(Serialize, Deserialize)]
pub struct SessionResponse {
    pub id: String,
    pub user_id: String,
    pub timezone: String,
    pub phase: Phase,
    pub params: Parameters,
    pub candidates: Vec<Slot>,
    pub last_booking: Option<BookingRecord>,
    pub history: Vec<ChatMessage>,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
}

impl From<Session> for SessionResponse {
    fn from(session: Session) -> Self {
        Self {
            id: session.id,
            user_id: session.user_id,
            timezone: session.timezone.name().to_string(),
            phase: session.phase,
            params: session.params,
            candidates: session.candidates,
            last_booking: session.last_booking,
            history: session.history,
            created_at: session.created_at,
            last_active: session.last_active,
        }
    }
}

#[derive(Serialize)]
pub struct AcceptedResponse {
    pub accepted: bool,
}
