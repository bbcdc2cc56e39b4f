//! In-memory calendar view over one owner's records.
//!
//! Holds an eventually-stale copy of the record set and the selection state
//! machine. Nothing here is authoritative: placements are advisory and
//! confirmed moves are handed to the lifecycle service.

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use uuid::Uuid;

use super::guard::{self, Interval, Placement};
use super::model::{RecordKind, ScheduledRecord};

/// Day -> that day's records ordered by start.
#[derive(Debug, Default, Clone)]
pub struct CalendarIndex {
    days: BTreeMap<NaiveDate, Vec<ScheduledRecord>>,
}

impl CalendarIndex {
    /// Deleted records are dropped.
    pub fn build(records: impl IntoIterator<Item = ScheduledRecord>) -> Self {
        let mut days: BTreeMap<NaiveDate, Vec<ScheduledRecord>> = BTreeMap::new();
        for r in records.into_iter().filter(|r| !r.is_deleted()) {
            days.entry(r.start_at.date()).or_default().push(r);
        }
        for day in days.values_mut() {
            day.sort_by_key(|r| r.start_at);
        }
        CalendarIndex { days }
    }

    pub fn records(&self) -> impl Iterator<Item = &ScheduledRecord> {
        self.days.values().flatten()
    }

    pub fn find(&self, record_id: Uuid) -> Option<&ScheduledRecord> {
        self.records().find(|r| r.id == record_id)
    }

    pub fn badge_counts(&self) -> BTreeMap<NaiveDate, usize> {
        self.days
            .iter()
            .map(|(date, records)| (*date, records.len()))
            .collect()
    }

    fn intervals_excluding(&self, exclude: Option<Uuid>) -> Vec<Interval> {
        self.records()
            .filter(|r| Some(r.id) != exclude)
            .map(ScheduledRecord::interval)
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionState {
    Idle,
    Focused(Uuid),
    PendingMove {
        record_id: Uuid,
        proposed_start: NaiveDateTime,
    },
}

/// A confirmed move, ready for the lifecycle service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveProposal {
    pub record_id: Uuid,
    pub proposed_start: NaiveDateTime,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CalendarError {
    #[error("no record is focused")]
    NoFocusedRecord,
    #[error("no move is pending")]
    NoPendingMove,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    pub record_id: Uuid,
    pub title: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub kind: RecordKind,
    pub is_past: bool,
    pub is_focused: bool,
}

#[derive(Debug, Clone)]
pub struct SlotCalendar {
    index: CalendarIndex,
    state: SelectionState,
}

impl Default for SlotCalendar {
    fn default() -> Self {
        SlotCalendar {
            index: CalendarIndex::default(),
            state: SelectionState::Idle,
        }
    }
}

impl SlotCalendar {
    /// Rebuild the index. Any selection in progress is discarded.
    pub fn load(&mut self, records: impl IntoIterator<Item = ScheduledRecord>) {
        self.index = CalendarIndex::build(records);
        self.state = SelectionState::Idle;
    }

    pub fn state(&self) -> SelectionState {
        self.state
    }

    fn focused_id(&self) -> Option<Uuid> {
        match self.state {
            SelectionState::Idle => None,
            SelectionState::Focused(id) | SelectionState::PendingMove { record_id: id, .. } => {
                Some(id)
            }
        }
    }

    /// Advisory check of `candidate`. With a record focused this proposes
    /// moving it (the record's own slot is ignored); a rejection leaves the
    /// state untouched.
    pub fn select_slot(&mut self, candidate: Interval, now: NaiveDateTime) -> Placement {
        let focused = self.focused_id();
        let existing = self.index.intervals_excluding(focused);
        let placement = guard::can_place(candidate, &existing, now);

        if let (Some(record_id), Placement::Allowed) = (focused, placement) {
            self.state = SelectionState::PendingMove {
                record_id,
                proposed_start: candidate.start,
            };
        }
        placement
    }

    /// Toggle focus. Activating the focused record again clears focus.
    /// Unknown ids leave the state alone.
    pub fn activate_record(&mut self, record_id: Uuid) -> Option<&ScheduledRecord> {
        self.index.find(record_id)?;

        if self.focused_id() == Some(record_id) {
            self.state = SelectionState::Idle;
            return None;
        }
        self.state = SelectionState::Focused(record_id);
        self.index.find(record_id)
    }

    pub fn move_focused_record_to(
        &mut self,
        new_start: NaiveDateTime,
        now: NaiveDateTime,
    ) -> Result<Placement, CalendarError> {
        if self.focused_id().is_none() {
            return Err(CalendarError::NoFocusedRecord);
        }
        Ok(self.select_slot(Interval::slot(new_start), now))
    }

    pub fn confirm_save(&mut self) -> Result<MoveProposal, CalendarError> {
        let SelectionState::PendingMove {
            record_id,
            proposed_start,
        } = self.state
        else {
            return Err(CalendarError::NoPendingMove);
        };
        self.state = SelectionState::Idle;
        Ok(MoveProposal {
            record_id,
            proposed_start,
        })
    }

    /// PendingMove falls back to Focused; other states are unchanged.
    pub fn cancel(&mut self) {
        if let SelectionState::PendingMove { record_id, .. } = self.state {
            self.state = SelectionState::Focused(record_id);
        }
    }

    pub fn day_badge_counts(&self) -> BTreeMap<NaiveDate, usize> {
        self.index.badge_counts()
    }

    pub fn events(&self, now: NaiveDateTime) -> Vec<CalendarEvent> {
        let focused = self.focused_id();
        self.index
            .records()
            .map(|r| {
                let interval = r.interval();
                let patient = r.patient_name.as_deref().unwrap_or("Unknown");
                CalendarEvent {
                    record_id: r.id,
                    title: format!("{patient} - {}", r.title),
                    start: interval.start,
                    end: interval.end,
                    kind: r.kind,
                    is_past: interval.start < now,
                    is_focused: focused == Some(r.id),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::guard::RejectReason;
    use chrono::{NaiveDate, Utc};

    fn at(day: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, day)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn record(start_at: NaiveDateTime) -> ScheduledRecord {
        ScheduledRecord {
            id: Uuid::new_v4(),
            tenant_id: Uuid::nil(),
            owner_id: Uuid::nil(),
            patient_id: Uuid::nil(),
            patient_name: Some("Ayse".into()),
            kind: RecordKind::Note,
            start_at,
            duration_minutes: 30,
            title: "Kontrol".into(),
            description: None,
            price: None,
            cost: None,
            created_by: Uuid::nil(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            deleted_at: None,
        }
    }

    fn loaded(records: Vec<ScheduledRecord>) -> SlotCalendar {
        let mut cal = SlotCalendar::default();
        cal.load(records);
        cal
    }

    #[test]
    fn badges_count_live_records_per_day() {
        let mut gone = record(at(10, 12, 0));
        gone.deleted_at = Some(Utc::now());
        let cal = loaded(vec![
            record(at(10, 9, 0)),
            record(at(10, 11, 0)),
            record(at(11, 9, 0)),
            gone,
        ]);

        let badges = cal.day_badge_counts();
        assert_eq!(badges.get(&at(10, 0, 0).date()), Some(&2));
        assert_eq!(badges.get(&at(11, 0, 0).date()), Some(&1));
        assert_eq!(badges.len(), 2);
    }

    #[test]
    fn day_records_are_ordered_by_start() {
        let cal = loaded(vec![
            record(at(11, 8, 0)),
            record(at(10, 11, 0)),
            record(at(10, 9, 0)),
        ]);
        let starts: Vec<_> = cal.events(at(10, 0, 0)).iter().map(|e| e.start).collect();
        assert_eq!(starts, vec![at(10, 9, 0), at(10, 11, 0), at(11, 8, 0)]);
    }

    #[test]
    fn activating_twice_returns_to_idle() {
        let r = record(at(10, 9, 0));
        let id = r.id;
        let mut cal = loaded(vec![r]);

        assert_eq!(cal.activate_record(id).map(|r| r.id), Some(id));
        assert_eq!(cal.state(), SelectionState::Focused(id));
        assert!(cal.activate_record(id).is_none());
        assert_eq!(cal.state(), SelectionState::Idle);
    }

    #[test]
    fn activating_another_record_switches_focus() {
        let a = record(at(10, 9, 0));
        let b = record(at(10, 10, 0));
        let (a_id, b_id) = (a.id, b.id);
        let mut cal = loaded(vec![a, b]);

        cal.activate_record(a_id);
        cal.activate_record(b_id);
        assert_eq!(cal.state(), SelectionState::Focused(b_id));
    }

    #[test]
    fn unknown_record_does_not_change_state() {
        let mut cal = loaded(vec![record(at(10, 9, 0))]);
        assert!(cal.activate_record(Uuid::new_v4()).is_none());
        assert_eq!(cal.state(), SelectionState::Idle);
    }

    #[test]
    fn idle_selection_is_advisory_only() {
        let mut cal = loaded(vec![record(at(10, 10, 0))]);
        let now = at(10, 8, 0);

        assert_eq!(
            cal.select_slot(Interval::slot(at(10, 10, 0)), now),
            Placement::Rejected(RejectReason::Overlap)
        );
        assert_eq!(cal.select_slot(Interval::slot(at(10, 10, 30)), now), Placement::Allowed);
        assert_eq!(cal.state(), SelectionState::Idle);
    }

    #[test]
    fn focused_selection_becomes_pending_move_then_saves() {
        let r = record(at(10, 10, 0));
        let id = r.id;
        let mut cal = loaded(vec![r, record(at(10, 11, 0))]);
        let now = at(10, 8, 0);

        cal.activate_record(id);
        // Extending over its own slot is fine.
        assert_eq!(cal.select_slot(Interval::slot(at(10, 10, 0)), now), Placement::Allowed);
        assert_eq!(
            cal.move_focused_record_to(at(10, 13, 0), now),
            Ok(Placement::Allowed)
        );
        assert_eq!(
            cal.state(),
            SelectionState::PendingMove {
                record_id: id,
                proposed_start: at(10, 13, 0)
            }
        );

        let proposal = cal.confirm_save().unwrap();
        assert_eq!(proposal.record_id, id);
        assert_eq!(proposal.proposed_start, at(10, 13, 0));
        assert_eq!(cal.state(), SelectionState::Idle);
    }

    #[test]
    fn rejected_move_keeps_focus_and_cancel_returns_to_focus() {
        let r = record(at(10, 10, 0));
        let id = r.id;
        let mut cal = loaded(vec![r, record(at(10, 11, 0))]);
        let now = at(10, 8, 0);

        cal.activate_record(id);
        assert_eq!(
            cal.move_focused_record_to(at(10, 11, 0), now),
            Ok(Placement::Rejected(RejectReason::Overlap))
        );
        assert_eq!(cal.state(), SelectionState::Focused(id));
        assert_eq!(
            cal.move_focused_record_to(at(9, 11, 0), now),
            Ok(Placement::Rejected(RejectReason::PastSlot))
        );

        cal.move_focused_record_to(at(10, 14, 0), now).unwrap();
        cal.cancel();
        assert_eq!(cal.state(), SelectionState::Focused(id));
        assert_eq!(cal.confirm_save(), Err(CalendarError::NoPendingMove));
    }

    #[test]
    fn move_without_focus_is_an_error() {
        let mut cal = loaded(vec![]);
        assert_eq!(
            cal.move_focused_record_to(at(10, 9, 0), at(10, 8, 0)),
            Err(CalendarError::NoFocusedRecord)
        );
    }

    #[test]
    fn load_discards_selection() {
        let r = record(at(10, 10, 0));
        let id = r.id;
        let mut cal = loaded(vec![r.clone()]);
        cal.activate_record(id);
        cal.load(vec![r]);
        assert_eq!(cal.state(), SelectionState::Idle);
    }

    #[test]
    fn events_span_one_slot_and_flag_past_and_focus() {
        let r = record(at(10, 9, 0));
        let id = r.id;
        let mut cal = loaded(vec![r, record(at(10, 15, 0))]);
        cal.activate_record(id);

        let events = cal.events(at(10, 12, 0));
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].title, "Ayse - Kontrol");
        assert_eq!(events[0].end, at(10, 9, 30));
        assert!(events[0].is_past && events[0].is_focused);
        assert!(!events[1].is_past && !events[1].is_focused);
    }
}
