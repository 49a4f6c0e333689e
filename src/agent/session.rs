//! Session state machine. `process_turn` takes one finalized user
//! message through classification, merging, search and booking and
//! always comes back with a structured reply. Errors end the turn, never
//! the session.

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use chrono_tz::Tz;
use serde::Serialize;
use tokio::time::timeout;

use super::availability::{
    self, QueryKind, SearchOutcome, check_time, infer_duration, is_bookable, query_kind,
};
use super::booking::{self, fetch_snapshot};
use super::conflict;
use super::error::SchedulerError;
use super::extractor::{self, ExtractContext, clean_title, meeting_kind, recurring_keyword};
use super::intent::{IntentKind, IntentResult, Modifications};
use super::merge::merge;
use super::models::{
    BookingRecord, CalendarSnapshot, Field, Param, Parameters, Phase, Session, Slot, SlotTag,
    Speaker,
};
use super::ports::{CalendarReader, CalendarWriter, ClassifyRequest, IntentClassifier};
use super::present;
use super::validate::{self, Clarification};
use crate::ai::LlmClassifier;
use crate::calendar::MemoryCalendar;
use crate::core::{AppConfig, SearchSettings};
use crate::google::GoogleCalendar;
use crate::time::{TimePreference, now_local};

/// Classifier attempts per turn before the rule-based extractor takes
/// over.
const CLASSIFIER_ATTEMPTS: usize = 2;

/// What the turn produced, as data. Wording is left to `present`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Reply {
    AskFor { field: Field },
    /// Something about the request looks like a slip.
    Clarify { reason: Clarification },
    Suggestions { kind: QueryKind, slots: Vec<Slot> },
    /// The exact time asked for is taken, these are close to it.
    Nearby { requested: NaiveDateTime, slots: Vec<Slot> },
    Alternatives { slots: Vec<Slot> },
    AskSelection { slots: Vec<Slot> },
    NoAvailability,
    ReferenceNotFound { title: Option<String> },
    Booked { booking: BookingRecord },
    BookingFailed { reason: String },
    Cancelled,
    NothingToConfirm,
    CalendarUnavailable,
}

impl Reply {
    pub fn slots(&self) -> &[Slot] {
        match self {
            Reply::Suggestions { slots, .. }
            | Reply::Nearby { slots, .. }
            | Reply::Alternatives { slots }
            | Reply::AskSelection { slots } => slots,
            _ => &[],
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct TurnOutcome {
    pub phase: Phase,
    pub reply: Reply,
    pub text: String,
}

pub struct Scheduler {
    classifier: Arc<dyn IntentClassifier>,
    reader: Arc<dyn CalendarReader>,
    writer: Arc<dyn CalendarWriter>,
    settings: SearchSettings,
    classifier_timeout: Duration,
    calendar_timeout: Duration,
}

fn changes_search(m: &Modifications) -> bool {
    !(m.duration.is_keep()
        && m.date.is_keep()
        && m.time.is_keep()
        && m.reference.is_keep()
        && m.constraints.is_keep()
        && m.search_range.is_keep()
        && m.buffer.is_keep())
}

/// Fill in a "that meeting" reference from the booking it points at.
fn resolve_previous_booking(session: &mut Session) {
    let Some(last) = session.last_booking.as_ref() else {
        return;
    };
    if let Param::Set(reference) = &mut session.params.reference
        && reference.previous_booking
    {
        reference.title = Some(last.title.clone());
        reference.day = Some(last.date);
        reference.time = Some(last.start);
        reference.previous_booking = false;
    }
}

fn suggestion_reply(outcome: SearchOutcome, params: &Parameters) -> Reply {
    let requested = match (params.date.value(), params.time.value().and_then(TimePreference::exact)) {
        (Some(date), Some(time)) => Some(date.and_time(time)),
        _ => None,
    };
    let all_near = outcome
        .slots
        .iter()
        .all(|s| s.tag == Some(SlotTag::NearRequested));
    match requested {
        Some(requested) if all_near => Reply::Nearby {
            requested,
            slots: outcome.slots,
        },
        _ => Reply::Suggestions {
            kind: outcome.kind,
            slots: outcome.slots,
        },
    }
}

fn session_today(session: &Session) -> NaiveDate {
    session
        .snapshot
        .as_ref()
        .map(CalendarSnapshot::today)
        .unwrap_or_else(|| now_local(session.timezone).date())
}

/// Fill in a missing duration from past occurrences of a meeting the
/// user calls "our usual sync-up", or that the title names.
fn infer_recurring_duration(session: &mut Session, message: &str) {
    if session.params.duration.is_set() {
        return;
    }
    let keyword = recurring_keyword(message)
        .or_else(|| session.params.title.value().and_then(|t| meeting_kind(t)));
    let (Some(keyword), Some(snapshot)) = (keyword, session.snapshot.as_ref()) else {
        return;
    };
    if let Some(minutes) = infer_duration(&keyword, snapshot) {
        tracing::info!(session_id = %session.id, %keyword, minutes, "Duration taken from past meetings");
        session.params.duration = Param::Set(minutes);
    }
}

/// Run the availability engine and fall back to the conflict resolver
/// when it comes back empty.
fn find_slots(
    params: &Parameters,
    snapshot: &CalendarSnapshot,
    settings: &SearchSettings,
) -> Result<(Phase, Reply), SchedulerError> {
    let outcome = availability::search(params, snapshot, settings)?;
    if !outcome.slots.is_empty() {
        return Ok((Phase::Suggesting, suggestion_reply(outcome, params)));
    }
    tracing::debug!("Nothing free for the request, looking for alternatives");
    let slots = conflict::resolve(params, snapshot, settings)?;
    Ok((Phase::Resolving, Reply::Alternatives { slots }))
}

impl Scheduler {
    pub fn new(
        classifier: Arc<dyn IntentClassifier>,
        reader: Arc<dyn CalendarReader>,
        writer: Arc<dyn CalendarWriter>,
        settings: SearchSettings,
    ) -> Self {
        Self {
            classifier,
            reader,
            writer,
            settings,
            classifier_timeout: Duration::from_secs(5),
            calendar_timeout: Duration::from_secs(5),
        }
    }

    pub fn with_timeouts(mut self, classifier: Duration, calendar: Duration) -> Self {
        self.classifier_timeout = classifier;
        self.calendar_timeout = calendar;
        self
    }

    /// Wire up the LLM classifier and whichever calendar the config
    /// points at. Without Google credentials bookings go to an
    /// in-memory calendar.
    pub fn from_config(config: &AppConfig) -> Self {
        let classifier = Arc::new(LlmClassifier::new(
            &config.openai_api_hostname,
            &config.openai_api_key,
            &config.openai_model,
        ));
        let scheduler = match &config.google {
            Some(credentials) => {
                tracing::info!("Using Google calendar {}", config.calendar_id);
                let calendar = Arc::new(GoogleCalendar::new(credentials.clone(), &config.calendar_id));
                Self::new(classifier, calendar.clone(), calendar, config.search.clone())
            }
            None => {
                tracing::warn!("No Google credentials configured, bookings stay in memory");
                let calendar = Arc::new(MemoryCalendar::default());
                Self::new(classifier, calendar.clone(), calendar, config.search.clone())
            }
        };
        scheduler.with_timeouts(config.classifier_timeout, config.calendar_timeout)
    }

    /// Start a conversation and take the first calendar snapshot. An
    /// unreadable calendar doesn't stop the session; the next turn that
    /// needs it tries again.
    pub async fn open_session(&self, id: &str, user_id: &str, timezone: Tz) -> Session {
        let mut session = Session::new(id, user_id, timezone);
        self.refresh_snapshot(&mut session).await;
        tracing::info!(session_id = id, user_id, %timezone, "Session opened");
        session
    }

    async fn refresh_snapshot(&self, session: &mut Session) -> bool {
        match fetch_snapshot(
            self.reader.as_ref(),
            session.timezone,
            &self.settings,
            self.calendar_timeout,
        )
        .await
        {
            Ok(snapshot) => {
                session.snapshot = Some(snapshot);
                true
            }
            Err(e) => {
                tracing::warn!(session_id = %session.id, "No calendar snapshot: {}", e);
                false
            }
        }
    }

    pub async fn process_turn(&self, session: &mut Session, message: &str) -> TurnOutcome {
        session.push(Speaker::User, message);
        let before = session.phase;
        let reply = self.step(session, message).await;
        let text = present::render(&reply);
        session.push(Speaker::Assistant, &text);
        if session.phase != before {
            tracing::info!(session_id = %session.id, from = ?before, to = ?session.phase, "Phase changed");
        }
        TurnOutcome {
            phase: session.phase,
            reply,
            text,
        }
    }

    async fn step(&self, session: &mut Session, message: &str) -> Reply {
        if session.snapshot.is_none() {
            self.refresh_snapshot(session).await;
        }
        let booking_completed = session.phase == Phase::PostConfirmation;
        let intent = self.interpret(session, message, booking_completed).await;
        let clarification = session.clarification.take();

        // A confirmed slot is waiting on a title
        if let Some(slot) = session.pending_slot.clone() {
            match &intent {
                Some(i) if i.kind == IntentKind::Cancel => {}
                Some(i) if i.modifications.title.is_keep() && changes_search(&i.modifications) => {
                    session.pending_slot = None;
                }
                _ => {
                    let title = intent
                        .as_ref()
                        .and_then(|i| i.modifications.title.changed().cloned())
                        .or_else(|| clean_title(message));
                    return match title {
                        Some(title) => {
                            session.params.title = Param::Set(title);
                            self.book_slot(session, slot).await
                        }
                        None => Reply::AskFor { field: Field::Title },
                    };
                }
            }
        }

        let Some(mut intent) = intent else {
            if let Some(reason) = clarification {
                session.clarification = Some(reason);
                return Reply::Clarify { reason };
            }
            return self.reask(session);
        };

        // A plain "yes" to the last clarifying question
        if let Some(reason) = clarification
            && intent.kind == IntentKind::Confirm
            && session.candidates.is_empty()
        {
            // "yes, but make it two hours" answers with a change instead
            if changes_search(&intent.modifications) {
                intent.kind = IntentKind::Modify;
            } else if reason.accept(&mut session.params, &mut session.accepted_duration) {
                tracing::info!(session_id = %session.id, ?reason, "Clarification accepted");
                return self.advance(session).await;
            } else {
                session.clarification = Some(reason);
                return Reply::Clarify { reason };
            }
        }

        if booking_completed && intent.kind == IntentKind::NewRequest {
            tracing::info!(session_id = %session.id, "New request after a booking, starting over");
            session.params = Parameters::default();
            session.accepted_duration = None;
            session.candidates.clear();
            session.phase = Phase::Gathering;
        }

        let merged = match merge(&session.params, &intent, &session.candidates) {
            Ok(merged) => merged,
            Err(SchedulerError::NoCandidateToConfirm) => return Reply::NothingToConfirm,
            Err(e) => {
                tracing::warn!("Merge rejected the intent: {}", e);
                return self.reask(session);
            }
        };
        session.params = merged.params;

        match intent.kind {
            IntentKind::Cancel => {
                session.candidates.clear();
                session.pending_slot = None;
                session.phase = Phase::Gathering;
                return Reply::Cancelled;
            }
            IntentKind::Confirm => return self.confirm(session, &intent).await,
            IntentKind::NewRequest | IntentKind::Modify => {}
        }

        if merged.invalidated {
            session.candidates.clear();
        }
        resolve_previous_booking(session);
        infer_recurring_duration(session, message);
        self.advance(session).await
    }

    /// Search once the parameters are complete and look sane, otherwise
    /// ask about whatever is missing or off.
    async fn advance(&self, session: &mut Session) -> Reply {
        let today = session_today(session);
        let clarification = validate::check(
            &session.params,
            today,
            session.accepted_duration,
            &self.settings,
        );
        if let Some(reason) = clarification {
            tracing::info!(session_id = %session.id, ?reason, "Asking before searching");
            session.phase = Phase::Gathering;
            session.candidates.clear();
            session.clarification = Some(reason);
            return Reply::Clarify { reason };
        }
        if let Some(field) = session.params.missing_for_search() {
            session.phase = Phase::Gathering;
            session.candidates.clear();
            return Reply::AskFor { field };
        }
        if !session.candidates.is_empty() {
            return self.present_candidates(session);
        }
        self.search(session).await
    }

    /// Ask the classifier, once more if it fails, then fall back to the
    /// extractor. `None` means nothing usable came out of the message.
    async fn interpret(
        &self,
        session: &Session,
        message: &str,
        booking_completed: bool,
    ) -> Option<IntentResult> {
        let today = session_today(session);
        let calendar_summary = session
            .snapshot
            .as_ref()
            .map(CalendarSnapshot::summary)
            .unwrap_or_else(|| "Calendar unavailable.".to_string());
        let request = ClassifyRequest {
            history: session.recent_history(self.settings.history_window),
            params: &session.params,
            candidates: &session.candidates,
            calendar_summary: &calendar_summary,
            message,
            today,
            timezone: session.timezone,
            previous_booking: session.last_booking.as_ref(),
            booking_completed,
        };

        for attempt in 1..=CLASSIFIER_ATTEMPTS {
            match timeout(self.classifier_timeout, self.classifier.classify(&request)).await {
                Ok(Ok(intent)) => {
                    tracing::debug!(kind = ?intent.kind, missing = ?intent.missing, "Classified message");
                    return Some(intent);
                }
                Ok(Err(e)) => tracing::warn!(attempt, "Classifier failed: {}", e),
                Err(_) => tracing::warn!(attempt, "Classifier timed out after {:?}", self.classifier_timeout),
            }
        }

        let ctx = ExtractContext {
            today,
            timezone: session.timezone,
            candidate_count: session.candidates.len(),
            has_params: !booking_completed && !session.params.is_empty(),
            awaiting_answer: session.clarification.is_some(),
        };
        let intent = extractor::extract(message, &ctx);
        if intent.is_none() {
            tracing::warn!(session_id = %session.id, "Fallback extractor found nothing either");
        }
        intent
    }

    fn reask(&self, session: &Session) -> Reply {
        if session.phase == Phase::PostConfirmation {
            return Reply::AskFor {
                field: Field::Duration,
            };
        }
        match session.params.missing_for_search() {
            Some(field) => Reply::AskFor { field },
            None if !session.candidates.is_empty() => self.present_candidates(session),
            None => Reply::AskFor { field: Field::Time },
        }
    }

    fn present_candidates(&self, session: &Session) -> Reply {
        let slots = session.candidates.clone();
        match session.phase {
            Phase::Resolving => Reply::Alternatives { slots },
            _ => Reply::Suggestions {
                kind: query_kind(&session.params),
                slots,
            },
        }
    }

    async fn search(&self, session: &mut Session) -> Reply {
        session.phase = Phase::Searching;
        if session.snapshot.is_none() && !self.refresh_snapshot(session).await {
            session.phase = Phase::Gathering;
            return Reply::CalendarUnavailable;
        }
        let found = match session.snapshot.as_ref() {
            Some(snapshot) => find_slots(&session.params, snapshot, &self.settings),
            None => Err(SchedulerError::CalendarReadFailed("no snapshot".to_string())),
        };

        match found {
            Ok((phase, reply)) => {
                session.candidates = reply.slots().to_vec();
                session.phase = phase;
                reply
            }
            Err(e) => {
                tracing::info!(session_id = %session.id, "Search ended without slots: {}", e);
                session.candidates.clear();
                session.phase = Phase::Gathering;
                match e {
                    SchedulerError::ReferenceEventNotFound => Reply::ReferenceNotFound {
                        title: session
                            .params
                            .reference
                            .value()
                            .and_then(|r| r.title.clone()),
                    },
                    SchedulerError::NoAvailabilityFound => Reply::NoAvailability,
                    SchedulerError::MissingParameter(field) => Reply::AskFor { field },
                    _ => Reply::CalendarUnavailable,
                }
            }
        }
    }

    /// Pick the slot a confirmation refers to: an explicit selection, a
    /// stated time, or the only candidate there is.
    async fn confirm(&self, session: &mut Session, intent: &IntentResult) -> Reply {
        let selection = session.params.selection.value().copied();
        session.params.selection = Param::Unset;
        let stated_time = intent
            .modifications
            .time
            .changed()
            .and_then(TimePreference::exact);

        let slot = if let Some(index) = selection {
            match session.candidates.get(index) {
                Some(slot) => slot.clone(),
                None => {
                    return Reply::AskSelection {
                        slots: session.candidates.clone(),
                    };
                }
            }
        } else if let Some(time) = stated_time {
            let date = intent.modifications.date.changed().copied();
            let matching = session
                .candidates
                .iter()
                .find(|s| s.start.time() == time && date.is_none_or(|d| s.date() == d))
                .cloned();
            match matching {
                Some(slot) => slot,
                None => {
                    let date = date
                        .or_else(|| session.candidates.first().map(Slot::date))
                        .or_else(|| session.params.date.value().copied());
                    let Some(date) = date else {
                        return Reply::AskFor { field: Field::Date };
                    };
                    return self.confirm_time(session, date, time).await;
                }
            }
        } else if session.candidates.len() == 1 {
            session.candidates[0].clone()
        } else {
            return Reply::AskSelection {
                slots: session.candidates.clone(),
            };
        };

        self.book_slot(session, slot).await
    }

    /// The user confirmed a time nobody suggested. Book it if it's free,
    /// otherwise offer what is close by.
    async fn confirm_time(&self, session: &mut Session, date: NaiveDate, time: NaiveTime) -> Reply {
        session.params.date = Param::Set(date);
        session.params.time = Param::Set(TimePreference::At(time));
        let checked = match session.snapshot.as_ref() {
            Some(snapshot) => check_time(&session.params, snapshot, &self.settings, date, time),
            None => return Reply::CalendarUnavailable,
        };
        match checked {
            Ok(mut slots) => {
                if slots.first().is_some_and(|s| s.tag == Some(SlotTag::Requested)) {
                    let slot = slots.swap_remove(0);
                    return self.book_slot(session, slot).await;
                }
                if slots.is_empty() {
                    session.candidates.clear();
                    return self.search(session).await;
                }
                session.candidates = slots.clone();
                session.phase = Phase::Suggesting;
                Reply::Nearby {
                    requested: date.and_time(time),
                    slots,
                }
            }
            Err(SchedulerError::MissingParameter(field)) => Reply::AskFor { field },
            Err(e) => {
                tracing::warn!("Could not check the requested time: {}", e);
                Reply::CalendarUnavailable
            }
        }
    }

    async fn book_slot(&self, session: &mut Session, slot: Slot) -> Reply {
        let still_free = session
            .snapshot
            .as_ref()
            .is_some_and(|snapshot| is_bookable(&slot, snapshot));
        if !still_free {
            tracing::info!(session_id = %session.id, "{} is no longer free", slot.label());
            session.pending_slot = None;
            session.candidates.clear();
            return self.search(session).await;
        }

        let has_title = session
            .params
            .title
            .value()
            .is_some_and(|t| !t.trim().is_empty());
        if !has_title {
            session.pending_slot = Some(slot);
            return Reply::AskFor { field: Field::Title };
        }

        let previous = session.phase;
        session.phase = Phase::Booking;
        let booked = booking::book(
            session,
            &slot,
            self.writer.as_ref(),
            self.reader.as_ref(),
            &self.settings,
            self.calendar_timeout,
        )
        .await;

        match booked {
            Ok(booking) => Reply::Booked { booking },
            Err(SchedulerError::MissingParameter(field)) => {
                session.phase = previous;
                Reply::AskFor { field }
            }
            Err(e) => {
                // Leave the slot confirmable so the user can retry
                session.pending_slot = None;
                if !session.candidates.contains(&slot) {
                    session.candidates = vec![slot];
                }
                session.phase = match previous {
                    Phase::Resolving => Phase::Resolving,
                    _ => Phase::Suggesting,
                };
                Reply::BookingFailed {
                    reason: e.to_string(),
                }
            }
        }
    }
}
