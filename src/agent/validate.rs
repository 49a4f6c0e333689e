//! Sanity checks on the working parameters before a search runs. A
//! request that is probably a slip (a date that already passed, a
//! meeting longer than a working day) is put back to the user instead
//! of being searched.

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use super::models::{Param, Parameters};
use crate::core::SearchSettings;
use crate::time::next_weekday;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Clarification {
    /// The date is before today. `suggestion` is the next day with the
    /// same weekday.
    PastDate { date: NaiveDate, suggestion: NaiveDate },
    /// Longer than anything bookable; the user has to restate it.
    UnrealisticDuration { minutes: u32 },
    /// Long enough to double check, accepted once confirmed.
    LongDuration { minutes: u32 },
}

impl Clarification {
    /// Apply a "yes" to the question. Returns false when there is
    /// nothing a yes can settle.
    pub fn accept(&self, params: &mut Parameters, accepted_duration: &mut Option<u32>) -> bool {
        match self {
            Clarification::PastDate { suggestion, .. } => {
                params.date = Param::Set(*suggestion);
                true
            }
            Clarification::LongDuration { minutes } => {
                *accepted_duration = Some(*minutes);
                true
            }
            Clarification::UnrealisticDuration { .. } => false,
        }
    }
}

/// First problem found with `params`, if any. A long duration the
/// user already confirmed passes.
pub fn check(
    params: &Parameters,
    today: NaiveDate,
    accepted_duration: Option<u32>,
    settings: &SearchSettings,
) -> Option<Clarification> {
    if let Some(date) = params.date.value().copied()
        && date < today
    {
        return Some(Clarification::PastDate {
            date,
            suggestion: next_weekday(today, date.weekday()),
        });
    }
    let minutes = params.duration.value().copied()?;
    if minutes > settings.max_duration_minutes {
        return Some(Clarification::UnrealisticDuration { minutes });
    }
    if minutes >= settings.long_duration_minutes && accepted_duration != Some(minutes) {
        return Some(Clarification::LongDuration { minutes });
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    // Thursday
    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 11, 13).unwrap()
    }

    fn params(duration: u32, date: NaiveDate) -> Parameters {
        Parameters {
            duration: Param::Set(duration),
            date: Param::Set(date),
            ..Default::default()
        }
    }

    #[test]
    fn test_past_date_suggests_next_same_weekday() {
        // Monday the 10th
        let past = NaiveDate::from_ymd_opt(2025, 11, 10).unwrap();
        let found = check(&params(30, past), today(), None, &SearchSettings::default());
        assert_eq!(
            found,
            Some(Clarification::PastDate {
                date: past,
                suggestion: NaiveDate::from_ymd_opt(2025, 11, 17).unwrap(),
            })
        );
        assert_eq!(check(&params(30, today()), today(), None, &SearchSettings::default()), None);
    }

    #[test]
    fn test_durations() {
        let settings = SearchSettings::default();
        let day = today();
        assert_eq!(check(&params(60, day), day, None, &settings), None);
        assert_eq!(
            check(&params(600, day), day, None, &settings),
            Some(Clarification::UnrealisticDuration { minutes: 600 })
        );
        assert_eq!(
            check(&params(600, day), day, Some(600), &settings),
            Some(Clarification::UnrealisticDuration { minutes: 600 })
        );
        assert_eq!(
            check(&params(240, day), day, None, &settings),
            Some(Clarification::LongDuration { minutes: 240 })
        );
        assert_eq!(check(&params(240, day), day, Some(240), &settings), None);
        assert_eq!(
            check(&params(300, day), day, Some(240), &settings),
            Some(Clarification::LongDuration { minutes: 300 })
        );
    }

    #[test]
    fn test_accept() {
        let past = NaiveDate::from_ymd_opt(2025, 11, 10).unwrap();
        let mut p = params(30, past);
        let mut accepted = None;
        let suggestion = NaiveDate::from_ymd_opt(2025, 11, 17).unwrap();
        assert!(Clarification::PastDate { date: past, suggestion }.accept(&mut p, &mut accepted));
        assert_eq!(p.date, Param::Set(suggestion));

        assert!(Clarification::LongDuration { minutes: 300 }.accept(&mut p, &mut accepted));
        assert_eq!(accepted, Some(300));
        assert!(!Clarification::UnrealisticDuration { minutes: 900 }.accept(&mut p, &mut accepted));
    }
}
