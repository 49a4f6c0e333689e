//! Conflict resolver. Runs when the availability engine comes back
//! empty and looks outward from the request: other times the same day,
//! then the next business day, then the rest of the horizon.

use chrono::{Days, NaiveDate, NaiveDateTime, NaiveTime};

use super::availability::{
    by_proximity, day_picks, find_reference, open_starts, reference_window, required_duration,
    spread, window_for,
};
use super::error::SchedulerError;
use super::models::{CalendarSnapshot, Event, Parameters, Relation, Slot, SlotTag};
use crate::core::SearchSettings;
use crate::time::{TimePreference, business_days};

/// Hard ceiling on alternatives regardless of configuration.
const MAX_ALTERNATIVES: usize = 3;

/// Enough to stop looking further out.
const GOOD_ENOUGH: usize = 2;

struct Anchor<'a> {
    date: NaiveDate,
    /// The exact start that was asked for, if any.
    requested: Option<NaiveDateTime>,
    /// The preference carried to other days.
    pref: Option<TimePreference>,
    reference: Option<(Relation, &'a Event)>,
}

fn anchor<'a>(
    params: &Parameters,
    snapshot: &'a CalendarSnapshot,
    duration: u32,
) -> Result<Anchor<'a>, SchedulerError> {
    if let Some(reference) = params.reference.value() {
        let event = find_reference(reference, params.date.value().copied(), snapshot)?;
        let window = reference_window(event, reference, duration);
        return Ok(Anchor {
            date: window.date(),
            requested: Some(window.start),
            pref: Some(TimePreference::At(window.start.time())),
            reference: Some((reference.relation, event)),
        });
    }
    let date = params
        .date
        .value()
        .copied()
        .unwrap_or_else(|| snapshot.today());
    let pref = params.time.value().copied();
    Ok(Anchor {
        date,
        requested: pref.and_then(|p| p.exact()).map(|t| date.and_time(t)),
        pref,
        reference: None,
    })
}

fn take(picks: Vec<NaiveDateTime>, found: &mut Vec<NaiveDateTime>, limit: usize) {
    for start in picks {
        if found.len() >= limit {
            break;
        }
        if !found.contains(&start) {
            found.push(start);
        }
    }
}

/// The first business day after `after` that the constraints allow,
/// looking no further than the search horizon.
fn next_open_day(after: NaiveDate, params: &Parameters, settings: &SearchSettings) -> Option<NaiveDate> {
    let from = after.checked_add_days(Days::new(1))?;
    business_days(from, settings.horizon_days.max(1))
        .into_iter()
        .find(|d| !params.constraints.value().is_some_and(|c| c.excludes(*d)))
}

pub fn resolve(
    params: &Parameters,
    snapshot: &CalendarSnapshot,
    settings: &SearchSettings,
) -> Result<Vec<Slot>, SchedulerError> {
    let duration = required_duration(params)?;
    let cap = settings.alternative_cap.min(MAX_ALTERNATIVES);
    let anchor = anchor(params, snapshot, duration)?;
    let mut found: Vec<NaiveDateTime> = Vec::with_capacity(cap);

    // Same day, any other time
    let exact = anchor.pref.as_ref().filter(|p| p.exact().is_some());
    let window = window_for(anchor.date, exact, duration, settings);
    let same_day: Vec<NaiveDateTime> =
        open_starts(anchor.date, window, duration, params, snapshot, settings)
        .into_iter()
        .filter(|s| Some(*s) != anchor.requested)
        .filter(|s| match anchor.reference {
            Some((Relation::Before, event)) => {
                *s + chrono::Duration::minutes(i64::from(duration)) <= event.start
            }
            Some((Relation::After, event)) => *s >= event.end,
            None => true,
        })
        .collect();
    let same_day = match anchor.requested.or_else(|| part_midpoint(anchor.date, anchor.pref)) {
        Some(target) => by_proximity(&same_day, target),
        None => spread(&same_day, cap),
    };
    take(same_day, &mut found, cap);
    tracing::debug!(found = found.len(), "Conflict search on the requested day");

    // Next business day, same preference
    let next_day = next_open_day(anchor.date, params, settings);
    if found.len() < GOOD_ENOUGH {
        if let Some(next_day) = next_day {
            let pref = anchor.pref.as_ref();
            let picks = day_picks(next_day, pref, duration, params, snapshot, settings);
            take(picks, &mut found, cap);
            tracing::debug!(found = found.len(), %next_day, "Conflict search on the next day");
        }
    }

    // The rest of the horizon, one per day, earliest day first
    if found.len() < GOOD_ENOUGH {
        let rest = anchor
            .date
            .checked_add_days(Days::new(1))
            .map(|from| business_days(from, settings.horizon_days))
            .unwrap_or_default();
        for day in rest.into_iter().filter(|d| Some(*d) != next_day) {
            if found.len() >= cap {
                break;
            }
            let picks = day_picks(day, anchor.pref.as_ref(), duration, params, snapshot, settings);
            take(picks.into_iter().take(1).collect(), &mut found, cap);
        }
        tracing::debug!(found = found.len(), "Conflict search across the horizon");
    }

    if found.is_empty() {
        return Err(SchedulerError::NoAvailabilityFound);
    }
    Ok(found
        .into_iter()
        .map(|s| Slot::new(s, duration, Some(SlotTag::ConflictAlternative)))
        .collect())
}

fn part_midpoint(date: NaiveDate, pref: Option<TimePreference>) -> Option<NaiveDateTime> {
    match pref? {
        TimePreference::Part(part) => {
            let (start, end) = part.bounds();
            let mid = (start.signed_duration_since(NaiveTime::MIN)
                + end.signed_duration_since(NaiveTime::MIN))
                / 2;
            Some(date.and_time(NaiveTime::MIN) + mid)
        }
        TimePreference::At(_) => None,
    }
}
