//! Clock event history: an idempotent id-keyed merge plus the page cursor.

use std::collections::HashMap;

use shared::{
    domain::{ClockEvent, EventId},
    protocol::HistoryQuery,
};
use tracing::{debug, info};

use crate::{api::HistorySource, error::ClientError};

/// Events keyed by id plus the ids in first-seen order.
///
/// Every id in `order` has an entry in `by_id` and vice versa.
#[derive(Debug, Clone, Default)]
pub struct EventCollection {
    by_id: HashMap<EventId, ClockEvent>,
    order: Vec<EventId>,
    cursor: u32,
}

impl EventCollection {
    /// Inserts or overwrites each event (last write wins). Returns the number
    /// of ids seen for the first time.
    pub fn record_events<I>(&mut self, events: I) -> usize
    where
        I: IntoIterator<Item = ClockEvent>,
    {
        let mut added = 0;
        for event in events {
            let id = event.id;
            if self.by_id.insert(id, event).is_none() {
                self.order.push(id);
                added += 1;
            }
        }
        added
    }

    pub fn advance_page(&mut self) {
        self.cursor += 1;
    }

    /// Page the next history fetch requests.
    pub fn cursor(&self) -> u32 {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn get(&self, id: EventId) -> Option<&ClockEvent> {
        self.by_id.get(&id)
    }

    pub fn ids(&self) -> &[EventId] {
        &self.order
    }

    /// Events in first-seen order.
    pub fn events(&self) -> impl Iterator<Item = &ClockEvent> + '_ {
        self.order.iter().filter_map(|id| self.by_id.get(id))
    }
}

/// Proof that a history fetch was started; handed back on completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageTicket {
    pub cursor: u32,
    generation: u64,
}

impl PageTicket {
    pub fn query(&self) -> HistoryQuery {
        HistoryQuery {
            week_offset: self.cursor,
        }
    }
}

/// [`EventCollection`] plus a guard that allows one outstanding page fetch.
#[derive(Debug, Clone, Default)]
pub struct EventStore {
    collection: EventCollection,
    fetch_in_flight: bool,
    generation: u64,
}

impl EventStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn collection(&self) -> &EventCollection {
        &self.collection
    }

    pub fn record_events<I>(&mut self, events: I) -> usize
    where
        I: IntoIterator<Item = ClockEvent>,
    {
        self.collection.record_events(events)
    }

    pub fn advance_page(&mut self) {
        self.collection.advance_page();
    }

    pub fn cursor(&self) -> u32 {
        self.collection.cursor()
    }

    pub fn is_fetch_in_flight(&self) -> bool {
        self.fetch_in_flight
    }

    pub fn begin_fetch(&mut self) -> Result<PageTicket, ClientError> {
        if self.fetch_in_flight {
            return Err(ClientError::HistoryFetchInFlight);
        }
        self.fetch_in_flight = true;
        Ok(PageTicket {
            cursor: self.collection.cursor(),
            generation: self.generation,
        })
    }

    /// Merges a fetched page and advances past it, returning the number of
    /// new ids. A page fetched before the last [`reset`](Self::reset) is
    /// discarded and yields `None`.
    pub fn complete_fetch(&mut self, ticket: PageTicket, events: Vec<ClockEvent>) -> Option<usize> {
        if ticket.generation != self.generation {
            debug!(cursor = ticket.cursor, "history: dropping page fetched before reset");
            return None;
        }
        self.fetch_in_flight = false;
        let added = self.collection.record_events(events);
        if self.collection.cursor() == ticket.cursor {
            self.collection.advance_page();
        }
        info!(
            page = ticket.cursor,
            added,
            total = self.collection.len(),
            "history: page merged"
        );
        Some(added)
    }

    /// Releases the guard after a failed fetch; the cursor stays put.
    pub fn abort_fetch(&mut self, ticket: PageTicket) {
        if ticket.generation == self.generation {
            self.fetch_in_flight = false;
        }
    }

    /// Fetches and merges the page at the cursor. Returns the merged events,
    /// which are empty when the page was discarded.
    pub async fn fetch_next_page<S>(&mut self, source: &S) -> Result<Vec<ClockEvent>, ClientError>
    where
        S: HistorySource + ?Sized,
    {
        let ticket = self.begin_fetch()?;
        match source.history_page(ticket.query()).await {
            Ok(events) => match self.complete_fetch(ticket, events.clone()) {
                Some(_) => Ok(events),
                None => Ok(Vec::new()),
            },
            Err(err) => {
                self.abort_fetch(ticket);
                Err(err)
            }
        }
    }

    /// Drops all events and rewinds the cursor. Outstanding fetches are
    /// invalidated.
    pub fn reset(&mut self) {
        self.collection = EventCollection::default();
        self.fetch_in_flight = false;
        self.generation += 1;
    }
}

#[cfg(test)]
#[path = "tests/event_store_tests.rs"]
mod tests;
