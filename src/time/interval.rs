//! Interval arithmetic over local (session timezone) date-times.

use chrono::{Duration, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Interval {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl Interval {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        debug_assert!(start <= end, "interval ends before it starts");
        Self { start, end }
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// Touching intervals (one ends exactly when the other starts) do
    /// not overlap.
    pub fn overlaps(&self, other: &Interval) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Sort busy intervals by start and coalesce any that overlap or touch.
pub fn merge_busy(mut busy: Vec<Interval>) -> Vec<Interval> {
    busy.retain(|i| !i.is_empty());
    busy.sort();
    let mut merged: Vec<Interval> = Vec::with_capacity(busy.len());
    for interval in busy {
        match merged.last_mut() {
            Some(last) if interval.start <= last.end => {
                last.end = last.end.max(interval.end);
            }
            _ => merged.push(interval),
        }
    }
    merged
}

/// Subtract `busy` from `window`, returning the free gaps in order.
/// `busy` does not need to be sorted or disjoint.
pub fn free_gaps(window: Interval, busy: &[Interval]) -> Vec<Interval> {
    let busy = merge_busy(busy.iter().copied().filter(|b| b.overlaps(&window)).collect());
    let mut gaps = Vec::new();
    let mut cursor = window.start;
    for b in busy {
        if b.start > cursor {
            gaps.push(Interval::new(cursor, b.start.min(window.end)));
        }
        cursor = cursor.max(b.end);
        if cursor >= window.end {
            break;
        }
    }
    if cursor < window.end {
        gaps.push(Interval::new(cursor, window.end));
    }
    gaps
}

/// Round `t` up to the next multiple of `step_minutes` past midnight.
/// Values already on a boundary are returned unchanged.
pub fn round_up_to_step(t: NaiveDateTime, step_minutes: u32) -> NaiveDateTime {
    let step = i64::from(step_minutes.max(1));
    let truncated = t.with_second(0).and_then(|t| t.with_nanosecond(0)).unwrap_or(t);
    let minutes = i64::from(truncated.hour() * 60 + truncated.minute());
    let remainder = minutes % step;
    let needs_bump = remainder != 0 || truncated != t;
    if !needs_bump {
        return t;
    }
    let bump = if remainder == 0 { step } else { step - remainder };
    truncated + Duration::minutes(bump)
}

/// Every start time inside `gap` where a meeting of `duration_minutes`
/// fits: the gap's own start, each step boundary after it, and the start
/// that ends the meeting flush with the gap's end.
pub fn candidate_starts(gap: Interval, duration_minutes: u32, step_minutes: u32) -> Vec<NaiveDateTime> {
    let duration = Duration::minutes(i64::from(duration_minutes));
    if gap.end - gap.start < duration {
        return vec![];
    }
    let latest = gap.end - duration;
    let mut starts = vec![gap.start];
    let mut next = round_up_to_step(gap.start, step_minutes);
    if next == gap.start {
        next += Duration::minutes(i64::from(step_minutes.max(1)));
    }
    while next <= latest {
        starts.push(next);
        next += Duration::minutes(i64::from(step_minutes.max(1)));
    }
    if starts.last() != Some(&latest) {
        starts.push(latest);
    }
    starts
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 11, 14)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn iv(sh: u32, sm: u32, eh: u32, em: u32) -> Interval {
        Interval::new(at(sh, sm), at(eh, em))
    }

    #[test]
    fn test_merge_busy_coalesces_overlapping_and_touching() {
        let merged = merge_busy(vec![iv(13, 0, 14, 0), iv(9, 0, 10, 0), iv(9, 30, 11, 0), iv(11, 0, 11, 30)]);
        assert_eq!(merged, vec![iv(9, 0, 11, 30), iv(13, 0, 14, 0)]);
    }

    #[test]
    fn test_free_gaps_subtracts_busy() {
        let gaps = free_gaps(iv(8, 0, 18, 0), &[iv(9, 0, 10, 0), iv(9, 30, 12, 0), iv(17, 0, 19, 0)]);
        assert_eq!(gaps, vec![iv(8, 0, 9, 0), iv(12, 0, 17, 0)]);
    }

    #[test]
    fn test_free_gaps_no_busy() {
        assert_eq!(free_gaps(iv(8, 0, 18, 0), &[]), vec![iv(8, 0, 18, 0)]);
    }

    #[test]
    fn test_free_gaps_fully_busy() {
        assert!(free_gaps(iv(8, 0, 18, 0), &[iv(7, 0, 19, 0)]).is_empty());
    }

    #[test]
    fn test_round_up_to_step() {
        assert_eq!(round_up_to_step(at(9, 0), 30), at(9, 0));
        assert_eq!(round_up_to_step(at(9, 10), 30), at(9, 30));
        assert_eq!(round_up_to_step(at(9, 45), 30), at(10, 0));
        let with_seconds = at(9, 30).with_second(12).unwrap();
        assert_eq!(round_up_to_step(with_seconds, 30), at(10, 0));
    }

    #[test]
    fn test_candidate_starts() {
        assert_eq!(
            candidate_starts(iv(9, 10, 11, 0), 60, 30),
            vec![at(9, 10), at(9, 30), at(10, 0)]
        );
        assert_eq!(candidate_starts(iv(9, 0, 9, 45), 60, 30), vec![]);
        assert_eq!(candidate_starts(iv(9, 0, 10, 0), 60, 30), vec![at(9, 0)]);
        assert_eq!(
            candidate_starts(iv(9, 0, 10, 15), 30, 30),
            vec![at(9, 0), at(9, 30), at(9, 45)]
        );
    }
}
