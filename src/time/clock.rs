//! Wall-clock parsing. Times are always stored as 24-hour values
//! (`NaiveTime`) and only turned back into 12-hour text for display.

use std::fmt;
use std::sync::LazyLock;

use chrono::{NaiveTime, Timelike};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

static CLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{1,2})(?:[:.](\d{2}))?\s*(am|pm|a\.m\.|p\.m\.)?$").expect("Invalid clock regex")
});

/// A coarse part of the day a user can ask for instead of a clock
/// time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DayPart {
    Morning,
    Afternoon,
    Evening,
    Night,
}

impl DayPart {
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_lowercase().as_str() {
            "morning" => Some(Self::Morning),
            "afternoon" => Some(Self::Afternoon),
            "evening" => Some(Self::Evening),
            "night" | "late night" => Some(Self::Night),
            _ => None,
        }
    }

    /// The half-open window `[start, end)` this part of the day covers.
    pub fn bounds(&self) -> (NaiveTime, NaiveTime) {
        let (start, end) = match self {
            Self::Morning => (8, 12),
            Self::Afternoon => (12, 17),
            Self::Evening => (17, 21),
            Self::Night => (21, 23),
        };
        (hour(start), hour(end))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Morning => "morning",
            Self::Afternoon => "afternoon",
            Self::Evening => "evening",
            Self::Night => "night",
        }
    }
}

/// What the user said about the time of the meeting: either an exact
/// start time or a bucket like "afternoon".
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TimePreference {
    At(NaiveTime),
    Part(DayPart),
}

impl TimePreference {
    pub fn parse(input: &str) -> Option<Self> {
        if let Some(part) = DayPart::parse(input) {
            return Some(Self::Part(part));
        }
        normalize_24h(input).map(Self::At)
    }

    pub fn exact(&self) -> Option<NaiveTime> {
        match self {
            Self::At(t) => Some(*t),
            Self::Part(_) => None,
        }
    }
}

impl fmt::Display for TimePreference {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::At(t) => write!(f, "{}", t.format("%H:%M")),
            Self::Part(p) => f.write_str(p.as_str()),
        }
    }
}

impl Serialize for TimePreference {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TimePreference {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        TimePreference::parse(&raw)
            .ok_or_else(|| de::Error::custom(format!("unrecognized time preference: {raw}")))
    }
}

fn hour(h: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, 0, 0).expect("hour out of range")
}

/// Normalise a spoken or typed clock time to 24-hour form.
///
/// Accepts `15:00`, `3 PM`, `3:30pm`, `9.15 am`, `noon`, `midnight`. A
/// bare single-digit hour from 1 to 5 without a meridiem is read as
/// afternoon since nobody books meetings at 3 AM by default.
pub fn normalize_24h(input: &str) -> Option<NaiveTime> {
    let cleaned = input
        .trim()
        .to_lowercase()
        .trim_start_matches("at ")
        .replace("o'clock", "")
        .replace("oclock", "")
        .trim()
        .to_string();

    match cleaned.as_str() {
        "noon" | "midday" => return NaiveTime::from_hms_opt(12, 0, 0),
        "midnight" => return NaiveTime::from_hms_opt(0, 0, 0),
        _ => {}
    }

    let caps = CLOCK_RE.captures(&cleaned)?;
    let hour_text = caps.get(1)?.as_str();
    let mut hour: u32 = hour_text.parse().ok()?;
    let minute: u32 = match caps.get(2) {
        Some(m) => m.as_str().parse().ok()?,
        None => 0,
    };
    if minute >= 60 {
        return None;
    }

    match caps.get(3).map(|m| m.as_str().replace('.', "")) {
        Some(meridiem) => {
            if !(1..=12).contains(&hour) {
                return None;
            }
            if meridiem == "pm" && hour != 12 {
                hour += 12;
            } else if meridiem == "am" && hour == 12 {
                hour = 0;
            }
        }
        None => {
            if hour_text.len() == 1 && (1..=5).contains(&hour) {
                hour += 12;
            }
        }
    }

    NaiveTime::from_hms_opt(hour, minute, 0)
}

/// Absolute distance between two times of day in minutes.
pub fn minutes_apart(a: NaiveTime, b: NaiveTime) -> i64 {
    let a = i64::from(a.num_seconds_from_midnight() / 60);
    let b = i64::from(b.num_seconds_from_midnight() / 60);
    (a - b).abs()
}

/// `15:30` -> `3:30 PM`
pub fn format_12h(t: NaiveTime) -> String {
    let (pm, h) = t.hour12();
    format!("{}:{:02} {}", h, t.minute(), if pm { "PM" } else { "AM" })
}
