//! Booking executor plus the calendar reads around it.

use std::time::Duration;

use chrono::Utc;
use chrono_tz::Tz;
use tokio::time::{sleep, timeout};

use super::error::SchedulerError;
use super::models::{BookingRecord, CalendarSnapshot, Event, Field, Phase, Session, Slot};
use super::ports::{CalendarReader, CalendarWriter, NewEvent};
use crate::core::SearchSettings;
use crate::time::{to_local, to_utc};

/// Read the calendar window around now, retrying with exponential
/// backoff. Each attempt is bounded by `limit`.
pub async fn fetch_snapshot(
    reader: &dyn CalendarReader,
    timezone: Tz,
    settings: &SearchSettings,
    limit: Duration,
) -> Result<CalendarSnapshot, SchedulerError> {
    let now = Utc::now();
    let window = chrono::Duration::days(settings.snapshot_window_days);
    let mut backoff = settings.read_backoff;
    let mut last_error = String::new();

    for attempt in 1..=settings.read_attempts {
        match timeout(limit, reader.list_events(now - window, now + window)).await {
            Ok(Ok(events)) => {
                let events = events
                    .into_iter()
                    .map(|e| Event {
                        title: e.title,
                        start: to_local(e.start, timezone),
                        end: to_local(e.end, timezone),
                    })
                    .collect();
                return Ok(CalendarSnapshot::new(events, to_local(now, timezone)));
            }
            Ok(Err(e)) => last_error = e.to_string(),
            Err(_) => last_error = SchedulerError::Timeout(limit).to_string(),
        }
        tracing::warn!(attempt, "Calendar read failed: {}", last_error);
        if attempt < settings.read_attempts {
            sleep(backoff).await;
            backoff *= 2;
        }
    }
    Err(SchedulerError::CalendarReadFailed(last_error))
}

pub fn idempotency_key(session_id: &str, slot: &Slot) -> String {
    format!("{}:{}", session_id, slot.start.format("%Y-%m-%dT%H:%M"))
}

/// Write the event for `slot`, then refresh the session's snapshot so
/// later searches see it. A failed write leaves the session exactly as
/// it was; a failed refresh keeps the old snapshot.
pub async fn book(
    session: &mut Session,
    slot: &Slot,
    writer: &dyn CalendarWriter,
    reader: &dyn CalendarReader,
    settings: &SearchSettings,
    limit: Duration,
) -> Result<BookingRecord, SchedulerError> {
    let duration = session
        .params
        .duration
        .value()
        .copied()
        .ok_or(SchedulerError::MissingParameter(Field::Duration))?;
    let title = session
        .params
        .title
        .value()
        .filter(|t| !t.trim().is_empty())
        .cloned()
        .ok_or(SchedulerError::MissingParameter(Field::Title))?;

    let event = NewEvent {
        title: title.clone(),
        start: to_utc(slot.start, session.timezone),
        end: to_utc(slot.end, session.timezone),
        idempotency_key: idempotency_key(&session.id, slot),
    };

    let event_id = match timeout(limit, writer.create_event(&event)).await {
        Ok(Ok(id)) => id,
        Ok(Err(e)) => {
            tracing::error!(session_id = %session.id, "Calendar write failed: {}", e);
            return Err(SchedulerError::CalendarWriteFailed(e.to_string()));
        }
        Err(_) => {
            tracing::error!(session_id = %session.id, "Calendar write timed out");
            return Err(SchedulerError::CalendarWriteFailed(
                SchedulerError::Timeout(limit).to_string(),
            ));
        }
    };

    let record = BookingRecord {
        title,
        date: slot.date(),
        start: slot.start.time(),
        duration: u32::try_from(slot.duration_minutes()).unwrap_or(duration),
        event_id,
    };
    tracing::info!(
        session_id = %session.id,
        event_id = %record.event_id,
        "Booked {}",
        slot.label()
    );

    match fetch_snapshot(reader, session.timezone, settings, limit).await {
        Ok(snapshot) => session.snapshot = Some(snapshot),
        Err(e) => tracing::warn!("Keeping the previous calendar snapshot: {}", e),
    }
    session.last_booking = Some(record.clone());
    session.candidates.clear();
    session.pending_slot = None;
    session.phase = Phase::PostConfirmation;
    Ok(record)
}
