use chrono::{Datelike, Days, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

/// An inclusive range of calendar dates, e.g. "next week".
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        if start <= end {
            Self { start, end }
        } else {
            Self { start: end, end: start }
        }
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.start.iter_days().take_while(|d| *d <= self.end)
    }
}

pub fn parse_weekday(input: &str) -> Option<Weekday> {
    let lower = input.trim().to_lowercase();
    let word = lower.trim_end_matches('s');
    let day = match word {
        "mon" | "monday" => Weekday::Mon,
        "tue" | "tues" | "tuesday" => Weekday::Tue,
        "wed" | "wednesday" => Weekday::Wed,
        "thu" | "thur" | "thurs" | "thursday" => Weekday::Thu,
        "fri" | "friday" => Weekday::Fri,
        "sat" | "saturday" => Weekday::Sat,
        "sun" | "sunday" => Weekday::Sun,
        _ => return None,
    };
    Some(day)
}

pub fn is_business_day(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// The first `count` business days starting at `from` (inclusive).
pub fn business_days(from: NaiveDate, count: usize) -> Vec<NaiveDate> {
    from.iter_days().filter(|d| is_business_day(*d)).take(count).collect()
}

/// The next date strictly after `from` that falls on `weekday`. Saying
/// "Friday" on a Friday means next week's Friday.
pub fn next_weekday(from: NaiveDate, weekday: Weekday) -> NaiveDate {
    let current = from.weekday().num_days_from_monday();
    let target = weekday.num_days_from_monday();
    let mut ahead = (7 + target - current) % 7;
    if ahead == 0 {
        ahead = 7;
    }
    from.checked_add_days(Days::new(u64::from(ahead))).unwrap_or(from)
}
