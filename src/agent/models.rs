//! Session data model. Everything a conversation accumulates lives on
//! `Session`; the other types are plain values passed between the
//! merger, the engines and the executor.

use std::fmt;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc, Weekday};
use chrono_tz::Tz;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use super::validate::Clarification;
use crate::time::{DateRange, Interval, TimePreference, format_12h};

/// A single parameter slot. `Cleared` is kept apart from `Unset` so the
/// session can tell "never mentioned" from "user took it back".
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum Param<T> {
    Unset,
    Cleared,
    Set(T),
}

impl<T> Default for Param<T> {
    fn default() -> Self {
        Self::Unset
    }
}

impl<T> Param<T> {
    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Set(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_set(&self) -> bool {
        matches!(self, Self::Set(_))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Duration,
    Date,
    Time,
    Title,
    Reference,
    Constraints,
    SearchRange,
    Buffer,
    Selection,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Duration => "duration",
            Self::Date => "date",
            Self::Time => "time",
            Self::Title => "title",
            Self::Reference => "reference",
            Self::Constraints => "constraints",
            Self::SearchRange => "search_range",
            Self::Buffer => "buffer",
            Self::Selection => "selection",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    Before,
    After,
}

/// Points at an existing event: "an hour before my 5pm meeting",
/// "right after the standup", "after that meeting".
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceQuery {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub time: Option<NaiveTime>,
    #[serde(default)]
    pub day: Option<NaiveDate>,
    #[serde(default)]
    pub offset_minutes: u32,
    pub relation: Relation,
    /// Refers to the booking made earlier in this conversation.
    #[serde(default)]
    pub previous_booking: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Constraints {
    pub excluded_dates: Vec<NaiveDate>,
    pub excluded_weekdays: Vec<Weekday>,
    /// No meeting starts before this time of day.
    pub earliest: Option<NaiveTime>,
    /// No meeting ends after this time of day.
    pub latest: Option<NaiveTime>,
}

impl Constraints {
    pub fn excludes(&self, date: NaiveDate) -> bool {
        use chrono::Datelike;
        self.excluded_dates.contains(&date) || self.excluded_weekdays.contains(&date.weekday())
    }

    pub fn has_exclusions(&self) -> bool {
        !self.excluded_dates.is_empty() || !self.excluded_weekdays.is_empty()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BufferSide {
    /// Leave room after the last event of the day.
    #[default]
    AfterLastEvent,
    /// Leave room before every following event.
    BeforeNextEvent,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Buffer {
    pub minutes: u32,
    #[serde(default)]
    pub side: BufferSide,
}

/// The working set of what the user has asked for so far.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameters {
    pub duration: Param<u32>,
    pub date: Param<NaiveDate>,
    pub time: Param<TimePreference>,
    pub title: Param<String>,
    pub reference: Param<ReferenceQuery>,
    pub constraints: Param<Constraints>,
    pub search_range: Param<DateRange>,
    pub buffer: Param<Buffer>,
    /// Index into the last presented slots.
    pub selection: Param<usize>,
}

impl Parameters {
    pub fn is_empty(&self) -> bool {
        self == &Parameters::default()
    }

    /// Enough to run a search: a duration plus something that pins
    /// down which days to look at.
    pub fn missing_for_search(&self) -> Option<Field> {
        if !self.duration.is_set() {
            return Some(Field::Duration);
        }
        let has_days = self.date.is_set()
            || self.reference.is_set()
            || self.search_range.is_set()
            || self.constraints.value().is_some_and(Constraints::has_exclusions);
        if !has_days {
            return Some(Field::Date);
        }
        None
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotTag {
    Requested,
    ReferenceDerived,
    NearRequested,
    ConflictAlternative,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Slot {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub tag: Option<SlotTag>,
}

impl Slot {
    pub fn new(start: NaiveDateTime, duration_minutes: u32, tag: Option<SlotTag>) -> Self {
        Self {
            start,
            end: start + Duration::minutes(i64::from(duration_minutes)),
            tag,
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.start.date()
    }

    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }

    pub fn interval(&self) -> Interval {
        Interval::new(self.start, self.end)
    }

    pub fn label(&self) -> String {
        format!(
            "{} {} - {}",
            self.start.format("%A, %b %-d"),
            format_12h(self.start.time()),
            format_12h(self.end.time())
        )
    }
}

/// A calendar occurrence in the session's timezone.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub title: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl Event {
    pub fn interval(&self) -> Interval {
        Interval::new(self.start, self.end.max(self.start))
    }
}

/// The user's calendar as of `fetched_at`, which also serves as "now"
/// for every search run against it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarSnapshot {
    pub events: Vec<Event>,
    pub fetched_at: NaiveDateTime,
}

impl CalendarSnapshot {
    pub fn new(mut events: Vec<Event>, fetched_at: NaiveDateTime) -> Self {
        events.sort_by(|a, b| a.start.cmp(&b.start).then(a.end.cmp(&b.end)));
        Self { events, fetched_at }
    }

    pub fn today(&self) -> NaiveDate {
        self.fetched_at.date()
    }

    /// Events overlapping the given calendar day, in start order.
    pub fn events_on(&self, date: NaiveDate) -> Vec<&Event> {
        let day = Interval::new(
            date.and_time(NaiveTime::MIN),
            date.and_time(NaiveTime::MIN) + Duration::days(1),
        );
        self.events
            .iter()
            .filter(|e| e.interval().overlaps(&day) || (e.start == e.end && e.start.date() == date))
            .collect()
    }

    /// Busy intervals of every event touching `window`, which may run
    /// past midnight.
    pub fn busy_within(&self, window: &Interval) -> Vec<Interval> {
        self.events
            .iter()
            .map(Event::interval)
            .filter(|i| i.overlaps(window))
            .collect()
    }

    pub fn is_free(&self, interval: &Interval) -> bool {
        !self.events.iter().any(|e| e.interval().overlaps(interval))
    }

    /// One line per event grouped under a heading per day, the way the
    /// classifier prompt expects it.
    pub fn summary(&self) -> String {
        if self.events.is_empty() {
            return "No events.".to_string();
        }
        self.events
            .iter()
            .chunk_by(|e| e.start.date())
            .into_iter()
            .map(|(date, events)| {
                let lines = events
                    .map(|e| {
                        format!(
                            "- {} to {}: {}",
                            e.start.format("%H:%M"),
                            e.end.format("%H:%M"),
                            e.title
                        )
                    })
                    .join("\n");
                format!("{}\n{}", date.format("%A %Y-%m-%d"), lines)
            })
            .join("\n")
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingRecord {
    pub title: String,
    pub date: NaiveDate,
    pub start: NaiveTime,
    pub duration: u32,
    pub event_id: String,
}

impl BookingRecord {
    pub fn slot(&self) -> Slot {
        Slot::new(self.date.and_time(self.start), self.duration, None)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Gathering,
    Searching,
    Suggesting,
    Resolving,
    Booking,
    PostConfirmation,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    User,
    Assistant,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub speaker: Speaker,
    pub text: String,
    pub at: DateTime<Utc>,
}

/// One scheduling conversation.
#[derive(Clone, Debug)]
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub timezone: Tz,
    pub history: Vec<ChatMessage>,
    pub phase: Phase,
    pub params: Parameters,
    pub candidates: Vec<Slot>,
    pub last_booking: Option<BookingRecord>,
    pub snapshot: Option<CalendarSnapshot>,
    /// Slot the user confirmed before giving the meeting a title.
    pub pending_slot: Option<Slot>,
    /// Question about the request still waiting on an answer.
    pub clarification: Option<Clarification>,
    /// A long duration the user said yes to.
    pub accepted_duration: Option<u32>,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
}

impl Session {
    pub fn new(id: &str, user_id: &str, timezone: Tz) -> Self {
        let now = Utc::now();
        Self {
            id: id.to_string(),
            user_id: user_id.to_string(),
            timezone,
            history: vec![],
            phase: Phase::Gathering,
            params: Parameters::default(),
            candidates: vec![],
            last_booking: None,
            snapshot: None,
            pending_slot: None,
            clarification: None,
            accepted_duration: None,
            created_at: now,
            last_active: now,
        }
    }

    pub fn push(&mut self, speaker: Speaker, text: &str) {
        let at = Utc::now();
        self.history.push(ChatMessage {
            speaker,
            text: text.to_string(),
            at,
        });
        self.last_active = at;
    }

    /// The last `window` messages before the newest one.
    pub fn recent_history(&self, window: usize) -> &[ChatMessage] {
        let end = self.history.len().saturating_sub(1);
        let start = end.saturating_sub(window);
        &self.history[start..end]
    }

    pub fn is_expired(&self, now: DateTime<Utc>, ttl: chrono::Duration) -> bool {
        now - self.last_active > ttl
    }
}
