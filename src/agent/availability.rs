//! Availability engine. Turns the working parameters and a calendar
//! snapshot into a short list of free slots. Three query shapes are
//! supported, tried in this order: relative to an existing event,
//! spread over several days, or a single day.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use super::error::SchedulerError;
use super::models::{
    BufferSide, CalendarSnapshot, Event, Field, Parameters, ReferenceQuery, Relation, Slot,
    SlotTag,
};
use crate::core::SearchSettings;
use crate::time::{
    Interval, TimePreference, business_days, candidate_starts, free_gaps, minutes_apart,
    round_up_to_step,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryKind {
    Reference,
    MultiDay,
    SingleDay,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchOutcome {
    pub kind: QueryKind,
    pub slots: Vec<Slot>,
}

pub fn query_kind(params: &Parameters) -> QueryKind {
    if params.reference.is_set() {
        QueryKind::Reference
    } else if params.date.is_set() {
        QueryKind::SingleDay
    } else {
        QueryKind::MultiDay
    }
}

pub(crate) fn required_duration(params: &Parameters) -> Result<u32, SchedulerError> {
    params
        .duration
        .value()
        .copied()
        .filter(|d| *d > 0)
        .ok_or(SchedulerError::MissingParameter(Field::Duration))
}

pub fn search(
    params: &Parameters,
    snapshot: &CalendarSnapshot,
    settings: &SearchSettings,
) -> Result<SearchOutcome, SchedulerError> {
    let duration = required_duration(params)?;
    let kind = query_kind(params);
    let slots = match kind {
        QueryKind::Reference => reference_search(params, snapshot, duration)?,
        QueryKind::MultiDay => multi_day(params, snapshot, settings, duration),
        QueryKind::SingleDay => {
            let date = params
                .date
                .value()
                .copied()
                .ok_or(SchedulerError::MissingParameter(Field::Date))?;
            single_day(date, params, snapshot, settings, duration)
        }
    };
    tracing::debug!(?kind, found = slots.len(), "Availability search finished");
    Ok(SearchOutcome { kind, slots })
}

/// Validate one specific requested start time. Returns the slot itself
/// when it is free, otherwise whatever is free within the fuzzy window
/// around it (possibly nothing).
pub fn check_time(
    params: &Parameters,
    snapshot: &CalendarSnapshot,
    settings: &SearchSettings,
    date: NaiveDate,
    time: NaiveTime,
) -> Result<Vec<Slot>, SchedulerError> {
    let duration = required_duration(params)?;
    let pref = TimePreference::At(time);
    let window = window_for(date, Some(&pref), duration, settings);
    let starts = open_starts(date, window, duration, params, snapshot, settings);
    Ok(near_time(&starts, date.and_time(time), duration, settings, false))
}

/// Whether a slot computed earlier still fits the current snapshot.
pub fn is_bookable(slot: &Slot, snapshot: &CalendarSnapshot) -> bool {
    slot.start >= snapshot.fetched_at && snapshot.is_free(&slot.interval())
}

/// The search window for one day given a time preference. An exact
/// time outside the working day stretches the window to include it.
pub(crate) fn window_for(
    date: NaiveDate,
    pref: Option<&TimePreference>,
    duration: u32,
    settings: &SearchSettings,
) -> Interval {
    let day_start = date.and_time(settings.day_start);
    let day_end = date.and_time(settings.day_end);
    match pref {
        Some(TimePreference::At(t)) => {
            let at = date.and_time(*t);
            let end = at + Duration::minutes(i64::from(duration));
            Interval::new(day_start.min(at), day_end.max(end))
        }
        Some(TimePreference::Part(part)) => {
            let (start, end) = part.bounds();
            Interval::new(date.and_time(start), date.and_time(end))
        }
        None => Interval::new(day_start, day_end),
    }
}

/// Every start time on `date` inside `window` where a meeting of
/// `duration` fits around the day's events, honouring the constraint
/// set, the buffer and the current time.
pub(crate) fn open_starts(
    date: NaiveDate,
    window: Interval,
    duration: u32,
    params: &Parameters,
    snapshot: &CalendarSnapshot,
    settings: &SearchSettings,
) -> Vec<NaiveDateTime> {
    let today = snapshot.today();
    if date < today {
        return vec![];
    }
    let constraints = params.constraints.value();
    if constraints.is_some_and(|c| c.excludes(date)) {
        return vec![];
    }

    let mut start = window.start;
    let mut end = window.end;
    if let Some(c) = constraints {
        if let Some(earliest) = c.earliest {
            start = start.max(date.and_time(earliest));
        }
        if let Some(latest) = c.latest {
            end = end.min(date.and_time(latest));
        }
    }
    if date == today {
        start = start.max(round_up_to_step(snapshot.fetched_at, settings.step_minutes));
    }

    let pad = params
        .buffer
        .value()
        .filter(|b| b.side == BufferSide::BeforeNextEvent)
        .map(|b| Duration::minutes(i64::from(b.minutes)))
        .unwrap_or_else(Duration::zero);
    let mut busy = snapshot.busy_within(&Interval::new(start.min(end), end + pad));
    if let Some(buffer) = params.buffer.value() {
        let pad = Duration::minutes(i64::from(buffer.minutes));
        match buffer.side {
            BufferSide::AfterLastEvent => {
                let last_end = snapshot
                    .events_on(date)
                    .iter()
                    .map(|e| e.end)
                    .filter(|end| end.date() == date)
                    .max();
                if let Some(last_end) = last_end {
                    start = start.max(last_end + pad);
                }
            }
            BufferSide::BeforeNextEvent => {
                busy = busy
                    .into_iter()
                    .map(|i| Interval::new(i.start - pad, i.end))
                    .collect();
            }
        }
    }

    if start >= end {
        return vec![];
    }
    free_gaps(Interval::new(start, end), &busy)
        .into_iter()
        .flat_map(|gap| candidate_starts(gap, duration, settings.step_minutes))
        .collect()
}

/// Pick up to `cap` starts evenly through the list: first, middle, last.
pub(crate) fn spread(starts: &[NaiveDateTime], cap: usize) -> Vec<NaiveDateTime> {
    let n = starts.len();
    if n <= cap {
        return starts.to_vec();
    }
    if cap <= 1 {
        return starts.iter().take(cap).copied().collect();
    }
    (0..cap)
        .map(|i| starts[i * (n - 1) / (cap - 1)])
        .dedup()
        .collect()
}

/// Closest first, earlier start on ties.
pub(crate) fn by_proximity(starts: &[NaiveDateTime], target: NaiveDateTime) -> Vec<NaiveDateTime> {
    starts
        .iter()
        .copied()
        .sorted_by_key(|s| ((*s - target).num_minutes().abs(), *s))
        .collect()
}

fn near_time(
    starts: &[NaiveDateTime],
    target: NaiveDateTime,
    duration: u32,
    settings: &SearchSettings,
    fall_back_to_ranked: bool,
) -> Vec<Slot> {
    if starts.contains(&target) {
        return vec![Slot::new(target, duration, Some(SlotTag::Requested))];
    }
    let window = i64::from(settings.fuzzy_window_minutes);
    let ranked = by_proximity(starts, target);
    let near: Vec<Slot> = ranked
        .iter()
        .filter(|s| (**s - target).num_minutes().abs() <= window)
        .take(settings.suggestion_cap)
        .map(|s| Slot::new(*s, duration, Some(SlotTag::NearRequested)))
        .collect();
    if !near.is_empty() || !fall_back_to_ranked {
        return near;
    }
    ranked
        .into_iter()
        .take(settings.suggestion_cap)
        .map(|s| Slot::new(s, duration, None))
        .collect()
}

/// Starts on one day in the order the preference ranks them.
pub(crate) fn day_picks(
    date: NaiveDate,
    pref: Option<&TimePreference>,
    duration: u32,
    params: &Parameters,
    snapshot: &CalendarSnapshot,
    settings: &SearchSettings,
) -> Vec<NaiveDateTime> {
    let window = window_for(date, pref, duration, settings);
    let starts = open_starts(date, window, duration, params, snapshot, settings);
    match pref {
        Some(TimePreference::At(t)) => by_proximity(&starts, date.and_time(*t)),
        _ => spread(&starts, settings.suggestion_cap),
    }
}

fn single_day(
    date: NaiveDate,
    params: &Parameters,
    snapshot: &CalendarSnapshot,
    settings: &SearchSettings,
    duration: u32,
) -> Vec<Slot> {
    let pref = params.time.value();
    let window = window_for(date, pref, duration, settings);
    let starts = open_starts(date, window, duration, params, snapshot, settings);
    match pref {
        Some(TimePreference::At(t)) => {
            near_time(&starts, date.and_time(*t), duration, settings, true)
        }
        _ => spread(&starts, settings.suggestion_cap)
            .into_iter()
            .map(|s| Slot::new(s, duration, None))
            .collect(),
    }
}

fn multi_day(
    params: &Parameters,
    snapshot: &CalendarSnapshot,
    settings: &SearchSettings,
    duration: u32,
) -> Vec<Slot> {
    let today = snapshot.today();
    let days: Vec<NaiveDate> = match params.search_range.value() {
        Some(range) => range.days().filter(|d| *d >= today).collect(),
        None => business_days(today, settings.horizon_days),
    };
    let pref = params.time.value();
    let per_day: Vec<Vec<NaiveDateTime>> = days
        .iter()
        .map(|d| day_picks(*d, pref, duration, params, snapshot, settings))
        .collect();

    // One per day per round so earlier days don't crowd out the rest
    let mut picked = Vec::new();
    'rounds: for round in 0..settings.suggestion_cap.max(1) {
        for starts in &per_day {
            if picked.len() >= settings.multi_day_cap {
                break 'rounds;
            }
            if let Some(start) = starts.get(round) {
                picked.push(*start);
            }
        }
    }
    picked.sort();
    picked
        .into_iter()
        .map(|s| Slot::new(s, duration, None))
        .collect()
}

/// Locate the event a reference query points at. Without a day the
/// first upcoming match wins; without a title the event nearest the
/// stated time wins (earlier on ties).
pub fn find_reference<'a>(
    reference: &ReferenceQuery,
    date: Option<NaiveDate>,
    snapshot: &'a CalendarSnapshot,
) -> Result<&'a Event, SchedulerError> {
    let title = reference
        .title
        .as_deref()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty());
    let matches_title =
        |e: &&Event| title.as_ref().is_none_or(|t| e.title.to_lowercase().contains(t.as_str()));

    let day = reference.day.or(date);
    let mut pool: Vec<&Event> = match day {
        Some(d) => snapshot.events_on(d),
        None => snapshot
            .events
            .iter()
            .filter(|e| e.end > snapshot.fetched_at)
            .collect(),
    };
    pool.retain(matches_title);

    if day.is_none() {
        if let Some(t) = reference.time {
            if let Some(exact) = pool.iter().copied().find(|e| e.start.time() == t) {
                return Ok(exact);
            }
        }
        if let Some(first_date) = pool.first().map(|e| e.start.date()) {
            pool.retain(|e| e.start.date() == first_date);
        }
    }

    let found = match (reference.time, &title) {
        (Some(t), _) => pool
            .into_iter()
            .min_by_key(|e| (minutes_apart(e.start.time(), t), e.start)),
        (None, Some(_)) => pool.into_iter().next(),
        (None, None) => None,
    };
    found.ok_or(SchedulerError::ReferenceEventNotFound)
}

/// The single window a reference query asks for: `offset` before the
/// event starts or `offset` after it ends.
pub fn reference_window(event: &Event, reference: &ReferenceQuery, duration: u32) -> Slot {
    let offset = Duration::minutes(i64::from(reference.offset_minutes));
    let length = Duration::minutes(i64::from(duration));
    let start = match reference.relation {
        Relation::Before => event.start - offset - length,
        Relation::After => event.end + offset,
    };
    Slot::new(start, duration, Some(SlotTag::ReferenceDerived))
}

fn reference_search(
    params: &Parameters,
    snapshot: &CalendarSnapshot,
    duration: u32,
) -> Result<Vec<Slot>, SchedulerError> {
    let Some(reference) = params.reference.value() else {
        return Ok(vec![]);
    };
    let event = find_reference(reference, params.date.value().copied(), snapshot)?;
    let slot = reference_window(event, reference, duration);

    let within_constraints = params.constraints.value().is_none_or(|c| {
        !c.excludes(slot.date())
            && c.earliest.is_none_or(|e| slot.start >= slot.date().and_time(e))
            && c.latest.is_none_or(|l| slot.end <= slot.date().and_time(l))
    });
    if within_constraints && is_bookable(&slot, snapshot) {
        Ok(vec![slot])
    } else {
        tracing::debug!("Reference window {} is not free", slot.label());
        Ok(vec![])
    }
}

/// The usual length of past meetings whose title mentions `keyword`,
/// ignoring case, spaces and hyphens. The same length has to show up
/// at least twice unless there is only one such meeting.
pub fn infer_duration(keyword: &str, snapshot: &CalendarSnapshot) -> Option<u32> {
    let squash = |s: &str| s.to_lowercase().replace(['-', ' '], "");
    let needle = squash(keyword);
    if needle.is_empty() {
        return None;
    }
    let durations: Vec<u32> = snapshot
        .events
        .iter()
        .filter(|e| e.start < snapshot.fetched_at && squash(&e.title).contains(&needle))
        .filter_map(|e| u32::try_from((e.end - e.start).num_minutes()).ok())
        .filter(|m| *m > 0)
        .collect();
    let (minutes, count) = durations
        .iter()
        .copied()
        .counts()
        .into_iter()
        .max_by_key(|(minutes, count)| (*count, std::cmp::Reverse(*minutes)))?;
    tracing::debug!(keyword, seen = durations.len(), minutes, count, "Past meeting lengths");
    (count >= 2 || durations.len() == 1).then_some(minutes)
}
