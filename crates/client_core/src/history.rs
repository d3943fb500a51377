//! Day-labelled display sequence derived from the event history.

use std::fmt;

use chrono::{Local, NaiveDate, TimeZone};
use shared::domain::ClockEvent;

use crate::event_store::EventCollection;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayLabel {
    pub date: NaiveDate,
}

impl fmt::Display for DayLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.date.format("%A, %B %-d, %Y"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryEntry {
    Day(DayLabel),
    Event(ClockEvent),
}

impl HistoryEntry {
    /// Stable list key.
    pub fn key(&self) -> String {
        match self {
            HistoryEntry::Day(label) => format!("day-{}", label.date.format("%Y-%m-%d")),
            HistoryEntry::Event(event) => format!("event-{}", event.id),
        }
    }

    pub fn as_event(&self) -> Option<&ClockEvent> {
        match self {
            HistoryEntry::Event(event) => Some(event),
            HistoryEntry::Day(_) => None,
        }
    }

    pub fn as_day(&self) -> Option<&DayLabel> {
        match self {
            HistoryEntry::Day(label) => Some(label),
            HistoryEntry::Event(_) => None,
        }
    }
}

/// [`build_view_in`] over the viewer's local timezone.
pub fn build_view(collection: &EventCollection) -> Vec<HistoryEntry> {
    build_view_in(collection, &Local)
}

/// Newest-first events with a [`DayLabel`] ahead of the first event of each
/// calendar date in `tz`. Ties keep first-seen order.
pub fn build_view_in<Tz: TimeZone>(collection: &EventCollection, tz: &Tz) -> Vec<HistoryEntry> {
    let mut events: Vec<&ClockEvent> = collection.events().collect();
    events.sort_by(|a, b| b.time.cmp(&a.time));

    let mut view = Vec::with_capacity(events.len() * 2);
    let mut last_date: Option<NaiveDate> = None;
    for event in events {
        let date = event.date_in(tz);
        if last_date != Some(date) {
            view.push(HistoryEntry::Day(DayLabel { date }));
            last_date = Some(date);
        }
        view.push(HistoryEntry::Event(event.clone()));
    }
    view
}

#[cfg(test)]
#[path = "tests/history_tests.rs"]
mod tests;
