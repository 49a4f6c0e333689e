//! Pure time and interval helpers used by the scheduling core. Nothing
//! in here knows about sessions or calendars.

pub mod clock;
pub use clock::{DayPart, TimePreference, format_12h, minutes_apart, normalize_24h};

pub mod days;
pub use days::{DateRange, business_days, is_business_day, next_weekday, parse_weekday};

pub mod interval;
pub use interval::{Interval, candidate_starts, free_gaps, merge_busy, round_up_to_step};

pub mod zone;
pub use zone::{convert, detect_timezone, now_local, parse_timezone, to_local, to_utc};
