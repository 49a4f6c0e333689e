//! Rule-based fallback used when the classifier is down or returns
//! something unusable. It only understands the common phrasings for
//! duration, date and time plus a few control words, and it says
//! nothing rather than guess.

use std::ops::Range;
use std::sync::LazyLock;

use chrono::{Datelike, Days, NaiveDate, NaiveTime, Weekday};
use chrono_tz::Tz;
use regex::Regex;

use super::intent::{Directive, IntentKind, IntentResult, Modifications};
use super::models::{Buffer, BufferSide, Constraints, ReferenceQuery, Relation};
use crate::time::{
    DateRange, DayPart, TimePreference, convert, detect_timezone, next_weekday, normalize_24h,
    parse_weekday,
};

macro_rules! re {
    ($name:ident, $pattern:expr) => {
        static $name: LazyLock<Regex> =
            LazyLock::new(|| Regex::new($pattern).expect(concat!("Invalid regex ", stringify!($name))));
    };
}

re!(CANCEL_RE, r"\b(cancel|never\s?mind|forget (it|about it)|scratch that|start over)\b");
re!(
    CONFIRM_RE,
    r"\b(yes|yeah|yep|yup|sure|ok|okay|confirm|book it|book that|sounds good|perfect|that works|works for me|go ahead|do it)\b"
);
re!(
    REFERENCE_RE,
    r"(?:(\d+)\s*(minutes?|mins?|hours?|hrs?)\s+)?((?:right|just)\s+)?(before|after)\s+(my|the|that|our)\s+(?:(\d{1,2}(?::\d{2})?\s*(?:am|pm)?)\s+)?([a-z0-9' -]*?)\s*\b(meeting|call|event|appointment|standup|stand-up|sync|review|lunch|interview)\b"
);
re!(TITLE_RE, r#"(?i)\b(?:called|titled|named)\s+["']?([^"'.,!?]+)["']?"#);
re!(QUOTED_RE, r#""([^"]+)""#);
re!(
    EXCLUDED_DAY_RE,
    r"\bnot\s+(?:on\s+)?(monday|tuesday|wednesday|thursday|friday|saturday|sunday)s?\b"
);
re!(EARLIEST_RE, r"\b(?:no earlier than|not before)\s+(\d{1,2}(?::\d{2})?\s*(?:am|pm)?|noon)");
re!(LATEST_RE, r"\b(?:no later than|not after|done by)\s+(\d{1,2}(?::\d{2})?\s*(?:am|pm)?|noon)");
re!(
    BUFFER_RE,
    r"(\d+)\s*(?:-\s*)?(?:minutes?|mins?)\s+(?:of\s+)?(?:buffer|break|gap)(?:\s+(before|after))?"
);
re!(HOUR_AND_HALF_RE, r"\b(?:(?:an?|one)\s+)?hour\s+and\s+a\s+half\b");
re!(HOURS_RE, r"\b(\d+(?:\.\d+)?)\s*(?:hours?|hrs?|h)\b");
re!(HALF_HOUR_RE, r"\bhalf\s+(?:an\s+)?hour\b");
re!(QUARTER_HOUR_RE, r"\bquarter\s+(?:of\s+an\s+)?hour\b");
re!(ONE_HOUR_RE, r"\b(?:an?|one)\s+hour\b");
re!(MINUTES_RE, r"\b(\d+)\s*(?:minutes?|mins?|m)\b");
re!(RELATIVE_DAY_RE, r"\b(day after tomorrow|tomorrow|today|tonight)\b");
re!(ISO_DATE_RE, r"\b(\d{4}-\d{2}-\d{2})\b");
re!(
    MONTH_DAY_RE,
    r"\b(january|february|march|april|may|june|july|august|september|october|november|december|jan|feb|mar|apr|jun|jul|aug|sept|sep|oct|nov|dec)\.?\s+(\d{1,2})(?:st|nd|rd|th)?\b"
);
re!(WEEK_RE, r"\b(next|this)\s+week\b");
re!(
    WEEKDAY_RE,
    r"\b(monday|tuesday|wednesday|thursday|friday|saturday|sunday|mon|tue|tues|wed|thu|thur|thurs|fri|sat|sun)\b"
);
re!(
    CLOCK_RE,
    r"\b(noon|midnight|\d{1,2}(?::\d{2})?\s*(?:am|pm|a\.m\.|p\.m\.)|\d{1,2}:\d{2})"
);
re!(AT_HOUR_RE, r"\bat\s+(\d{1,2})\b");
re!(DAY_PART_RE, r"\b(morning|afternoon|evening|tonight|night)\b");
re!(
    SELECTION_RE,
    r"\b(first|second|third|1st|2nd|3rd|last)\b|\b(?:option|number|slot)\s+(\d)\b|#(\d)\b"
);
re!(
    RECURRING_RE,
    r"\b(?:(usual|regular|our|my)\s+)?(sync[- ]?up|synch-up|stand[- ]?up|1-on-1|one-on-one|check[- ]?in|review|team meeting|status update)\b(?:\s+(?:like|as)\s+(usual))?"
);

/// Longest duration or offset the extractor will read out of a
/// message. Anything bigger is treated as unreadable.
const MAX_MINUTES: u32 = 24 * 60;

/// What the extractor needs to know about the session.
#[derive(Clone, Copy, Debug)]
pub struct ExtractContext {
    pub today: NaiveDate,
    pub timezone: Tz,
    pub candidate_count: usize,
    pub has_params: bool,
    /// A yes/no question is open, so "yes" confirms even without slots.
    pub awaiting_answer: bool,
}

/// Overwrite a matched span with spaces so later patterns don't read
/// the same words twice. Byte offsets stay valid.
fn blank(text: &mut String, range: Range<usize>) {
    let len = range.len();
    text.replace_range(range, &" ".repeat(len));
}

/// Capture groups copied out of the haystack, so the caller is free
/// to blank the match afterwards.
struct Groups(Vec<Option<String>>);

impl Groups {
    fn get(&self, i: usize) -> Option<&str> {
        self.0.get(i).and_then(|g| g.as_deref())
    }
}

fn take(re: &Regex, text: &str) -> Option<(Groups, Range<usize>)> {
    let caps = re.captures(text)?;
    let range = caps.get(0)?.range();
    let groups = caps.iter().map(|g| g.map(|m| m.as_str().to_string())).collect();
    Some((Groups(groups), range))
}

fn unit_minutes(amount: u32, unit: &str) -> Option<u32> {
    let minutes = if unit.starts_with('h') {
        amount.checked_mul(60)?
    } else {
        amount
    };
    Some(minutes).filter(|m| *m <= MAX_MINUTES)
}

fn extract_reference(text: &mut String) -> Option<ReferenceQuery> {
    let (caps, mut range) = take(&REFERENCE_RE, text)?;
    // "30 minutes right after" is a length, not an offset
    let offset_minutes = match (caps.get(1), caps.get(2), caps.get(3)) {
        (Some(n), Some(unit), None) => unit_minutes(n.parse().ok()?, unit)?,
        (Some(_), Some(_), Some(adverb)) => {
            let adverb_at = text[range.clone()].find(adverb.trim_end()).unwrap_or(0);
            range.start += adverb_at;
            0
        }
        _ => 0,
    };
    let relation = match caps.get(4)? {
        "before" => Relation::Before,
        _ => Relation::After,
    };
    let determiner = caps.get(5)?;
    let time = caps.get(6).and_then(normalize_24h);
    let noun = caps.get(8)?;
    let mut title = caps.get(7).map(|t| t.trim().to_string()).unwrap_or_default();
    if !matches!(noun, "meeting" | "call" | "event" | "appointment") {
        title = format!("{title} {noun}").trim().to_string();
    }
    let previous_booking = determiner == "that" && title.is_empty() && time.is_none();
    blank(text, range);
    Some(ReferenceQuery {
        title: Some(title).filter(|t| !t.is_empty()),
        time,
        day: None,
        offset_minutes,
        relation,
        previous_booking,
    })
}

fn extract_title(message: &str, text: &mut String) -> Option<String> {
    let title = TITLE_RE
        .captures(message)
        .or_else(|| QUOTED_RE.captures(message))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|t| !t.is_empty())?;
    for re in [&*TITLE_RE, &*QUOTED_RE] {
        if let Some(range) = re.find(text).map(|m| m.range()) {
            blank(text, range);
        }
    }
    Some(title)
}

fn extract_constraints(text: &mut String) -> Option<Constraints> {
    let mut constraints = Constraints::default();
    while let Some((caps, range)) = take(&EXCLUDED_DAY_RE, text) {
        if let Some(day) = caps.get(1).and_then(parse_weekday) {
            if !constraints.excluded_weekdays.contains(&day) {
                constraints.excluded_weekdays.push(day);
            }
        }
        blank(text, range);
    }
    if let Some(range) = text.find("not too early").map(|i| i..i + "not too early".len()) {
        constraints.earliest = NaiveTime::from_hms_opt(10, 0, 0);
        blank(text, range);
    }
    if let Some(range) = text.find("not too late").map(|i| i..i + "not too late".len()) {
        constraints.latest = NaiveTime::from_hms_opt(17, 0, 0);
        blank(text, range);
    }
    if let Some((caps, range)) = take(&EARLIEST_RE, text) {
        constraints.earliest = caps.get(1).and_then(normalize_24h);
        blank(text, range);
    }
    if let Some((caps, range)) = take(&LATEST_RE, text) {
        constraints.latest = caps.get(1).and_then(normalize_24h);
        blank(text, range);
    }
    Some(constraints).filter(|c| c != &Constraints::default())
}

fn extract_buffer(text: &mut String) -> Option<Buffer> {
    let (caps, range) = take(&BUFFER_RE, text)?;
    let minutes = caps.get(1)?.parse().ok()?;
    let side = match caps.get(2) {
        Some("before") => BufferSide::BeforeNextEvent,
        _ => BufferSide::AfterLastEvent,
    };
    blank(text, range);
    Some(Buffer { minutes, side })
}

/// Duration in minutes from phrasings like "an hour and a half",
/// "2 hours", "1.5h", "45 minutes" or "half an hour".
pub fn extract_duration(text: &mut String) -> Option<u32> {
    if let Some(m) = HOUR_AND_HALF_RE.find(text).map(|m| m.range()) {
        blank(text, m);
        return Some(90);
    }
    let mut total: Option<u32> = None;
    let mut unreadable = false;
    if let Some((caps, range)) = take(&HOURS_RE, text) {
        let minutes = caps
            .get(1)
            .and_then(|h| h.parse::<f64>().ok())
            .map(|h| (h * 60.0).round())
            .filter(|m| *m <= f64::from(MAX_MINUTES));
        match minutes {
            Some(m) => total = Some(m as u32),
            None => unreadable = true,
        }
        blank(text, range);
    }
    if let Some((caps, range)) = take(&MINUTES_RE, text) {
        let minutes = caps
            .get(1)
            .and_then(|m| m.parse::<u32>().ok())
            .and_then(|m| total.unwrap_or(0).checked_add(m));
        match minutes {
            Some(m) => total = Some(m),
            None => unreadable = true,
        }
        blank(text, range);
    }
    if unreadable {
        tracing::debug!("Ignoring a duration too large to be meant");
        return None;
    }
    if total.is_some() {
        return total.filter(|m| (1..=MAX_MINUTES).contains(m));
    }
    for (re, minutes) in [(&*HALF_HOUR_RE, 30), (&*QUARTER_HOUR_RE, 15), (&*ONE_HOUR_RE, 60)] {
        if let Some(range) = re.find(text).map(|m| m.range()) {
            blank(text, range);
            return Some(minutes);
        }
    }
    None
}

fn month_number(word: &str) -> Option<u32> {
    let month = match word.get(..3)? {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(month)
}

enum DateInfo {
    Day(NaiveDate),
    Range(DateRange),
}

fn extract_date(text: &mut String, today: NaiveDate) -> Option<DateInfo> {
    if let Some((caps, range)) = take(&RELATIVE_DAY_RE, text) {
        let days = match caps.get(1)? {
            "day after tomorrow" => 2,
            "tomorrow" => 1,
            _ => 0,
        };
        let keep_tonight = caps.get(1)? == "tonight";
        if !keep_tonight {
            blank(text, range);
        }
        return today.checked_add_days(Days::new(days)).map(DateInfo::Day);
    }
    if let Some((caps, range)) = take(&ISO_DATE_RE, text) {
        let date = NaiveDate::parse_from_str(caps.get(1)?, "%Y-%m-%d").ok()?;
        blank(text, range);
        return Some(DateInfo::Day(date));
    }
    if let Some((caps, range)) = take(&MONTH_DAY_RE, text) {
        let month = month_number(caps.get(1)?)?;
        let day: u32 = caps.get(2)?.parse().ok()?;
        let mut date = NaiveDate::from_ymd_opt(today.year(), month, day)?;
        if date < today {
            date = NaiveDate::from_ymd_opt(today.year() + 1, month, day)?;
        }
        blank(text, range);
        return Some(DateInfo::Day(date));
    }
    if let Some((caps, range)) = take(&WEEK_RE, text) {
        let next = caps.get(1)? == "next";
        let monday = next_weekday(today, Weekday::Mon);
        let range_days = if next || !crate::time::is_business_day(today) {
            DateRange::new(monday, monday + Days::new(4))
        } else {
            let friday = today + Days::new(u64::from(4 - today.weekday().num_days_from_monday()));
            DateRange::new(today, friday)
        };
        blank(text, range);
        return Some(DateInfo::Range(range_days));
    }
    if let Some((caps, range)) = take(&WEEKDAY_RE, text) {
        let weekday = parse_weekday(caps.get(1)?)?;
        blank(text, range);
        return Some(DateInfo::Day(next_weekday(today, weekday)));
    }
    None
}

fn extract_time(text: &mut String) -> Option<TimePreference> {
    if let Some((caps, range)) = take(&CLOCK_RE, text) {
        if let Some(t) = caps.get(1).and_then(normalize_24h) {
            blank(text, range);
            return Some(TimePreference::At(t));
        }
    }
    if let Some((caps, range)) = take(&AT_HOUR_RE, text) {
        if let Some(t) = caps.get(1).and_then(normalize_24h) {
            blank(text, range);
            return Some(TimePreference::At(t));
        }
    }
    if let Some((caps, range)) = take(&DAY_PART_RE, text) {
        let part = match caps.get(1)? {
            "tonight" => DayPart::Evening,
            word => DayPart::parse(word)?,
        };
        blank(text, range);
        return Some(TimePreference::Part(part));
    }
    None
}

fn extract_selection(text: &mut String, candidate_count: usize) -> Option<usize> {
    if candidate_count == 0 {
        return None;
    }
    let (caps, range) = take(&SELECTION_RE, text)?;
    let index = match caps.get(1) {
        Some("first" | "1st") => 0,
        Some("second" | "2nd") => 1,
        Some("third" | "3rd") => 2,
        Some("last") => candidate_count - 1,
        _ => {
            let n: usize = caps.get(2).or(caps.get(3))?.parse().ok()?;
            n.checked_sub(1)?
        }
    };
    blank(text, range);
    Some(index)
}

pub fn extract(message: &str, ctx: &ExtractContext) -> Option<IntentResult> {
    let mut text = message.to_lowercase();

    if CANCEL_RE.is_match(&text) {
        return Some(IntentResult::new(IntentKind::Cancel));
    }

    let mut m = Modifications::default();
    if let Some(title) = extract_title(message, &mut text) {
        m.title = Directive::Change(title);
    }
    if let Some(reference) = extract_reference(&mut text) {
        m.reference = Directive::Change(reference);
    }
    if let Some(buffer) = extract_buffer(&mut text) {
        m.buffer = Directive::Change(buffer);
    }
    if let Some(constraints) = extract_constraints(&mut text) {
        m.constraints = Directive::Change(constraints);
    }
    if let Some(minutes) = extract_duration(&mut text) {
        m.duration = Directive::Change(minutes);
    }
    match extract_date(&mut text, ctx.today) {
        Some(DateInfo::Day(date)) => m.date = Directive::Change(date),
        Some(DateInfo::Range(range)) => m.search_range = Directive::Change(range),
        None => {}
    }
    if let Some(time) = extract_time(&mut text) {
        m.time = Directive::Change(time);
    }
    if let (Directive::Change(TimePreference::At(t)), Some(from)) =
        (&m.time, detect_timezone(message))
    {
        if from != ctx.timezone {
            let base = m.date.changed().copied().unwrap_or(ctx.today);
            let local = convert(base.and_time(*t), from, ctx.timezone);
            if local.date() != base || m.date.changed().is_some() {
                m.date = Directive::Change(local.date());
            }
            m.time = Directive::Change(TimePreference::At(local.time()));
        }
    }
    if let Some(index) = extract_selection(&mut text, ctx.candidate_count) {
        m.selection = Directive::Change(index);
    }

    let confirmed = CONFIRM_RE.is_match(&text);
    let can_confirm = ctx.candidate_count > 0 || ctx.awaiting_answer;
    let kind = if can_confirm && (confirmed || m.selection.changed().is_some()) {
        IntentKind::Confirm
    } else if m.is_all_keep() {
        return None;
    } else if ctx.has_params {
        IntentKind::Modify
    } else {
        IntentKind::NewRequest
    };
    tracing::debug!(?kind, "Rule-based extraction produced an intent");

    let mut intent = IntentResult::new(kind);
    intent.modifications = m;
    Some(intent)
}

/// The meeting kind in "our usual sync-up" or "standup as usual". A
/// bare kind with no "our", "usual" and the like doesn't count.
pub fn recurring_keyword(message: &str) -> Option<String> {
    let text = message.to_lowercase();
    RECURRING_RE
        .captures_iter(&text)
        .find(|caps| caps.get(1).is_some() || caps.get(3).is_some())
        .and_then(|caps| caps.get(2))
        .map(|m| m.as_str().to_string())
}

/// The meeting kind a title names, e.g. "Weekly sync-up" gives
/// "sync-up".
pub fn meeting_kind(title: &str) -> Option<String> {
    let text = title.to_lowercase();
    RECURRING_RE
        .captures(&text)
        .and_then(|caps| caps.get(2))
        .map(|m| m.as_str().to_string())
}

/// Turn a bare reply like "call it quarterly planning." into a title.
pub fn clean_title(message: &str) -> Option<String> {
    let mut title = message.trim();
    let lower = title.to_lowercase();
    for prefix in [
        "call it ",
        "name it ",
        "title it ",
        "let's call it ",
        "the title is ",
        "title: ",
        "it's ",
        "its ",
        "it is ",
    ] {
        if lower.starts_with(prefix) {
            title = title.get(prefix.len()..).unwrap_or(title);
            break;
        }
    }
    let title = title
        .trim()
        .trim_matches(|c: char| c == '"' || c == '\'' || c.is_ascii_punctuation() && c != ')')
        .trim();
    let mut chars = title.chars();
    let first = chars.next()?;
    Some(first.to_uppercase().chain(chars).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> ExtractContext {
        ExtractContext {
            // Thursday
            today: NaiveDate::from_ymd_opt(2025, 11, 13).unwrap(),
            timezone: Tz::America__New_York,
            candidate_count: 0,
            has_params: false,
            awaiting_answer: false,
        }
    }

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 11, d).unwrap()
    }

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn mods(message: &str, ctx: &ExtractContext) -> Modifications {
        extract(message, ctx).unwrap().modifications
    }

    #[test]
    fn test_durations() {
        let cases = [
            ("book an hour and a half", 90),
            ("I need 2 hours", 120),
            ("1.5h please", 90),
            ("45 minutes", 45),
            ("half an hour", 30),
            ("an hour", 60),
            ("1 hour 30 minutes", 90),
            ("30 min", 30),
        ];
        for (message, minutes) in cases {
            let mut text = message.to_string();
            assert_eq!(extract_duration(&mut text), Some(minutes), "{message}");
        }
    }

    #[test]
    fn test_huge_numbers_are_ignored() {
        let intent = extract("99999999 hours before my meeting", &ctx());
        assert!(intent.is_none_or(|i| i.modifications.duration.is_keep() && i.modifications.reference.is_keep()));

        let m = mods("1 hour 4294967295 minutes tomorrow", &ctx());
        assert_eq!(m.duration, Directive::Keep);
        assert_eq!(m.date, Directive::Change(date(14)));

        let mut text = "3000 minutes".to_string();
        assert_eq!(extract_duration(&mut text), None);
    }

    #[test]
    fn test_recurring_keyword() {
        assert_eq!(recurring_keyword("Book our usual sync-up tomorrow").as_deref(), Some("sync-up"));
        assert_eq!(recurring_keyword("standup as usual on friday").as_deref(), Some("standup"));
        assert_eq!(recurring_keyword("a review tomorrow"), None);
        assert_eq!(meeting_kind("Weekly Check-in").as_deref(), Some("check-in"));
        assert_eq!(meeting_kind("Lunch"), None);
    }

    #[test]
    fn test_yes_answers_an_open_question() {
        assert!(extract("yes", &ctx()).is_none());
        let ctx = ExtractContext {
            awaiting_answer: true,
            ..ctx()
        };
        assert_eq!(extract("yes that's right", &ctx).unwrap().kind, IntentKind::Confirm);
    }

    #[test]
    fn test_new_request() {
        let intent = extract("Schedule 30 minutes tomorrow at 2pm", &ctx()).unwrap();
        assert_eq!(intent.kind, IntentKind::NewRequest);
        let m = intent.modifications;
        assert_eq!(m.duration, Directive::Change(30));
        assert_eq!(m.date, Directive::Change(date(14)));
        assert_eq!(m.time, Directive::Change(TimePreference::At(t(14, 0))));
    }

    #[test]
    fn test_weekday_and_day_part() {
        let m = mods("how about monday afternoon", &ctx());
        assert_eq!(m.date, Directive::Change(date(17)));
        assert_eq!(m.time, Directive::Change(TimePreference::Part(DayPart::Afternoon)));
    }

    #[test]
    fn test_same_weekday_means_next_week() {
        let m = mods("thursday at 10am", &ctx());
        assert_eq!(m.date, Directive::Change(date(20)));
    }

    #[test]
    fn test_modify_when_params_exist() {
        let ctx = ExtractContext {
            has_params: true,
            ..ctx()
        };
        let intent = extract("actually make it 60 minutes", &ctx).unwrap();
        assert_eq!(intent.kind, IntentKind::Modify);
        assert_eq!(intent.modifications.duration, Directive::Change(60));
        assert!(intent.modifications.date.is_keep());
    }

    #[test]
    fn test_reference_phrase() {
        let m = mods("1 hour before my 5pm meeting on friday", &ctx());
        assert_eq!(
            m.reference,
            Directive::Change(ReferenceQuery {
                title: None,
                time: Some(t(17, 0)),
                day: None,
                offset_minutes: 60,
                relation: Relation::Before,
                previous_booking: false,
            })
        );
        // the offset is not a duration
        assert!(m.duration.is_keep());
        assert_eq!(m.date, Directive::Change(date(14)));
    }

    #[test]
    fn test_reference_to_previous_booking() {
        let m = mods("30 minutes right after that meeting", &ctx());
        let Directive::Change(reference) = m.reference else {
            panic!("no reference");
        };
        assert!(reference.previous_booking);
        assert_eq!(reference.relation, Relation::After);
        assert_eq!(m.duration, Directive::Change(30));
    }

    #[test]
    fn test_reference_by_title() {
        let m = mods("right after the project review", &ctx());
        let Directive::Change(reference) = m.reference else {
            panic!("no reference");
        };
        assert_eq!(reference.title.as_deref(), Some("project review"));
    }

    #[test]
    fn test_constraints_and_range() {
        let m = mods("an hour next week, not on wednesday, not too early", &ctx());
        assert_eq!(m.duration, Directive::Change(60));
        assert_eq!(m.search_range, Directive::Change(DateRange::new(date(17), date(21))));
        assert!(m.date.is_keep());
        let Directive::Change(c) = m.constraints else {
            panic!("no constraints");
        };
        assert_eq!(c.excluded_weekdays, vec![Weekday::Wed]);
        assert_eq!(c.earliest, Some(t(10, 0)));
    }

    #[test]
    fn test_buffer() {
        let m = mods("30 minutes with a 15 minute buffer", &ctx());
        assert_eq!(m.duration, Directive::Change(30));
        assert_eq!(
            m.buffer,
            Directive::Change(Buffer {
                minutes: 15,
                side: BufferSide::AfterLastEvent
            })
        );
    }

    #[test]
    fn test_confirm_and_selection() {
        let ctx = ExtractContext {
            candidate_count: 3,
            has_params: true,
            ..ctx()
        };
        let yes = extract("Yes, book it", &ctx).unwrap();
        assert_eq!(yes.kind, IntentKind::Confirm);
        assert!(yes.modifications.selection.is_keep());

        let second = extract("the second one", &ctx).unwrap();
        assert_eq!(second.kind, IntentKind::Confirm);
        assert_eq!(second.modifications.selection, Directive::Change(1));

        let last = extract("option 3", &ctx).unwrap();
        assert_eq!(last.modifications.selection, Directive::Change(2));
    }

    #[test]
    fn test_confirm_without_candidates_is_not_confirm() {
        assert!(extract("yes", &ctx()).is_none());
    }

    #[test]
    fn test_cancel() {
        let intent = extract("never mind, cancel that", &ctx()).unwrap();
        assert_eq!(intent.kind, IntentKind::Cancel);
    }

    #[test]
    fn test_timezone_conversion() {
        // 3pm Pacific is 6pm Eastern
        let m = mods("tomorrow at 3pm PST", &ctx());
        assert_eq!(m.time, Directive::Change(TimePreference::At(t(18, 0))));
        assert_eq!(m.date, Directive::Change(date(14)));
    }

    #[test]
    fn test_title() {
        let m = mods("30 minutes tomorrow called Budget review", &ctx());
        assert_eq!(m.title, Directive::Change("Budget review".to_string()));
        assert_eq!(m.duration, Directive::Change(30));
    }

    #[test]
    fn test_nothing_recognised() {
        assert!(extract("hmm let me think", &ctx()).is_none());
    }

    #[test]
    fn test_clean_title() {
        assert_eq!(clean_title("call it quarterly planning."), Some("Quarterly planning".to_string()));
        assert_eq!(clean_title("\"Design sync\""), Some("Design sync".to_string()));
        assert_eq!(clean_title("  ...  "), None);
    }
}
