//! Placement rules shared by the calendar pre-check and the lifecycle service.
//!
//! Everything here is pure: same inputs, same answer, no I/O.

use std::fmt;

use chrono::{Duration, NaiveDateTime, NaiveTime};
use serde::Serialize;

use super::model::SLOT_MINUTES;

/// Half-open interval `[start, end)` in clinic local time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Interval {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl Interval {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        debug_assert!(end > start, "interval must not be empty");
        Interval { start, end }
    }

    /// One slot starting at `start`.
    pub fn slot(start: NaiveDateTime) -> Self {
        Interval::new(start, start + Duration::minutes(SLOT_MINUTES))
    }

    /// Abutting intervals (`a.end == b.start`) do not overlap.
    pub fn overlaps(&self, other: &Interval) -> bool {
        other.start < self.end && other.end > self.start
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectReason {
    PastSlot,
    Overlap,
}

impl RejectReason {
    pub fn code(&self) -> &'static str {
        match self {
            RejectReason::PastSlot => "SLOT_IN_PAST",
            RejectReason::Overlap => "SLOT_OVERLAP",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::PastSlot => f.write_str("the selected day is in the past, choose another time"),
            RejectReason::Overlap => {
                f.write_str("the selected time overlaps another record, choose another time")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Allowed,
    Rejected(RejectReason),
}

/// Local midnight of the day containing `now`.
pub fn today_midnight(now: NaiveDateTime) -> NaiveDateTime {
    now.date().and_time(NaiveTime::MIN)
}

/// Decide whether `candidate` may be placed.
///
/// `existing` must already exclude deleted records and, on a move, the
/// record's own prior interval. "Past" is day-granular: any slot on a day
/// before `now`'s day is rejected, earlier slots today are not.
pub fn can_place(candidate: Interval, existing: &[Interval], now: NaiveDateTime) -> Placement {
    if candidate.start < today_midnight(now) {
        return Placement::Rejected(RejectReason::PastSlot);
    }
    check_overlap(candidate, existing)
}

/// Overlap half of [`can_place`], for edits that keep an existing (possibly past) start.
pub fn check_overlap(candidate: Interval, existing: &[Interval]) -> Placement {
    if existing.iter().any(|e| e.overlaps(&candidate)) {
        Placement::Rejected(RejectReason::Overlap)
    } else {
        Placement::Allowed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(day: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, day)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn overlap_is_symmetric() {
        let cases = [
            (Interval::slot(at(10, 10, 0)), Interval::slot(at(10, 10, 15))),
            (Interval::slot(at(10, 10, 0)), Interval::slot(at(10, 10, 30))),
            (Interval::slot(at(10, 10, 0)), Interval::new(at(10, 9, 0), at(10, 12, 0))),
            (Interval::slot(at(10, 10, 0)), Interval::slot(at(11, 10, 0))),
        ];
        for (a, b) in cases {
            assert_eq!(a.overlaps(&b), b.overlaps(&a), "{a:?} vs {b:?}");
        }
    }

    #[test]
    fn abutting_slot_is_allowed() {
        let existing = [Interval::slot(at(10, 10, 30))];
        let placement = can_place(Interval::slot(at(10, 10, 0)), &existing, at(10, 9, 0));
        assert_eq!(placement, Placement::Allowed);
    }

    #[test]
    fn exact_duplicate_is_overlap() {
        let existing = [Interval::slot(at(10, 10, 0))];
        let placement = can_place(Interval::slot(at(10, 10, 0)), &existing, at(10, 9, 0));
        assert_eq!(placement, Placement::Rejected(RejectReason::Overlap));
    }

    #[test]
    fn partial_overlap_is_rejected() {
        let existing = [Interval::slot(at(10, 10, 0))];
        let candidate = Interval::new(at(10, 10, 15), at(10, 10, 45));
        assert_eq!(
            can_place(candidate, &existing, at(10, 9, 0)),
            Placement::Rejected(RejectReason::Overlap)
        );
    }

    #[test]
    fn yesterday_is_rejected_before_overlap() {
        let candidate = Interval::slot(at(9, 10, 0));
        assert_eq!(
            can_place(candidate, &[], at(10, 9, 0)),
            Placement::Rejected(RejectReason::PastSlot)
        );
        // Past wins even when it would also overlap.
        assert_eq!(
            can_place(candidate, &[candidate], at(10, 9, 0)),
            Placement::Rejected(RejectReason::PastSlot)
        );
    }

    #[test]
    fn earlier_today_is_still_allowed() {
        let candidate = Interval::slot(at(10, 8, 0));
        assert_eq!(can_place(candidate, &[], at(10, 15, 0)), Placement::Allowed);
    }

    #[test]
    fn check_overlap_ignores_the_clock() {
        let past = Interval::slot(at(1, 8, 0));
        assert_eq!(check_overlap(past, &[]), Placement::Allowed);
        assert_eq!(
            check_overlap(past, &[Interval::slot(at(1, 8, 0))]),
            Placement::Rejected(RejectReason::Overlap)
        );
    }
}
