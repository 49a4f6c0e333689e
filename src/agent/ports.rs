//! Capabilities the scheduling core depends on but does not implement.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use super::error::SchedulerError;
use super::intent::IntentResult;
use super::models::{BookingRecord, ChatMessage, Parameters, Slot};

/// Everything the classifier gets to look at for one turn.
#[derive(Debug)]
pub struct ClassifyRequest<'a> {
    pub history: &'a [ChatMessage],
    pub params: &'a Parameters,
    pub candidates: &'a [Slot],
    pub calendar_summary: &'a str,
    pub message: &'a str,
    pub today: NaiveDate,
    pub timezone: Tz,
    pub previous_booking: Option<&'a BookingRecord>,
    /// Set on the first turn after a booking went through.
    pub booking_completed: bool,
}

#[async_trait]
pub trait IntentClassifier: Send + Sync {
    async fn classify(&self, request: &ClassifyRequest<'_>) -> Result<IntentResult, SchedulerError>;
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub id: String,
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewEvent {
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Same key, same event: a retried write must not double book.
    pub idempotency_key: String,
}

#[async_trait]
pub trait CalendarReader: Send + Sync {
    async fn list_events(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> anyhow::Result<Vec<CalendarEvent>>;
}

#[async_trait]
pub trait CalendarWriter: Send + Sync {
    /// Returns the calendar's id for the created (or already existing)
    /// event.
    async fn create_event(&self, event: &NewEvent) -> anyhow::Result<String>;
}
