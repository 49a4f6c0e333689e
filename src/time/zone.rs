use chrono::{DateTime, Duration, LocalResult, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Parse an IANA zone name, falling back to the common abbreviations
/// people type ("PST", "EST", ...).
pub fn parse_timezone(name: &str) -> Option<Tz> {
    let trimmed = name.trim();
    if let Ok(tz) = trimmed.parse::<Tz>() {
        return Some(tz);
    }
    abbreviation(trimmed)
}

fn abbreviation(word: &str) -> Option<Tz> {
    let tz = match word.to_uppercase().as_str() {
        "PST" | "PDT" | "PT" | "PACIFIC" => Tz::America__Los_Angeles,
        "MST" | "MDT" | "MT" | "MOUNTAIN" => Tz::America__Denver,
        "CST" | "CDT" | "CT" | "CENTRAL" => Tz::America__Chicago,
        "EST" | "EDT" | "ET" | "EASTERN" => Tz::America__New_York,
        "GMT" | "BST" => Tz::Europe__London,
        "UTC" | "Z" => Tz::UTC,
        "IST" => Tz::Asia__Kolkata,
        "CET" | "CEST" => Tz::Europe__Paris,
        _ => return None,
    };
    Some(tz)
}

/// Find a timezone the user mentioned in passing, e.g. "3pm EST".
pub fn detect_timezone(message: &str) -> Option<Tz> {
    message
        .split(|c: char| !c.is_ascii_alphabetic())
        .filter(|w| w.len() >= 3 && w.chars().all(|c| c.is_ascii_uppercase()))
        .find_map(abbreviation)
}

pub fn to_local(instant: DateTime<Utc>, tz: Tz) -> NaiveDateTime {
    instant.with_timezone(&tz).naive_local()
}

/// Resolve a wall-clock time in `tz` to an instant. When the clocks fall
/// back the earlier of the two instants wins; a time inside a spring
/// forward gap is pushed past the gap.
pub fn to_utc(local: NaiveDateTime, tz: Tz) -> DateTime<Utc> {
    match tz.from_local_datetime(&local) {
        LocalResult::Single(dt) => dt.with_timezone(&Utc),
        LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
        LocalResult::None => {
            let mut probe = local;
            for _ in 0..4 {
                probe += Duration::minutes(30);
                if let Some(dt) = tz.from_local_datetime(&probe).earliest() {
                    return dt.with_timezone(&Utc);
                }
            }
            Utc.from_utc_datetime(&local)
        }
    }
}

pub fn now_local(tz: Tz) -> NaiveDateTime {
    to_local(Utc::now(), tz)
}

/// Re-express a wall-clock time given in `from` as wall-clock time in `to`.
pub fn convert(local: NaiveDateTime, from: Tz, to: Tz) -> NaiveDateTime {
    to_local(to_utc(local, from), to)
}
