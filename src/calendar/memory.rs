//! A calendar that lives in process memory. Used when no Google
//! credentials are configured and as the backing store in tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::agent::{CalendarEvent, CalendarReader, CalendarWriter, NewEvent};

#[derive(Default)]
struct Store {
    events: Vec<CalendarEvent>,
    // idempotency key -> event id
    keys: HashMap<String, String>,
}

#[derive(Default)]
pub struct MemoryCalendar {
    store: Mutex<Store>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl MemoryCalendar {
    pub fn add_event(&self, title: &str, start: DateTime<Utc>, end: DateTime<Utc>) {
        if let Ok(mut store) = self.store.lock() {
            store.events.push(CalendarEvent {
                id: Uuid::new_v4().to_string(),
                title: title.to_string(),
                start,
                end,
            });
        }
    }

    pub fn events(&self) -> Vec<CalendarEvent> {
        self.store
            .lock()
            .map(|store| store.events.clone())
            .unwrap_or_default()
    }

    pub fn event_count(&self) -> usize {
        self.events().len()
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of read attempts seen, failed ones included.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Number of write attempts seen, failed ones included.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CalendarReader for MemoryCalendar {
    async fn list_events(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<CalendarEvent>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(anyhow!("calendar unavailable"));
        }
        let store = self.store.lock().map_err(|_| anyhow!("calendar store poisoned"))?;
        let mut events: Vec<CalendarEvent> = store
            .events
            .iter()
            .filter(|e| e.end > start && e.start < end)
            .cloned()
            .collect();
        events.sort_by_key(|e| e.start);
        Ok(events)
    }
}

#[async_trait]
impl CalendarWriter for MemoryCalendar {
    async fn create_event(&self, event: &NewEvent) -> Result<String> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(anyhow!("calendar rejected the write"));
        }
        let mut store = self.store.lock().map_err(|_| anyhow!("calendar store poisoned"))?;
        if let Some(id) = store.keys.get(&event.idempotency_key) {
            tracing::debug!("Duplicate create for {}, returning {}", event.idempotency_key, id);
            return Ok(id.clone());
        }
        let id = Uuid::new_v4().to_string();
        store.keys.insert(event.idempotency_key.clone(), id.clone());
        store.events.push(CalendarEvent {
            id: id.clone(),
            title: event.title.clone(),
            start: event.start,
            end: event.end,
        });
        Ok(id)
    }
}
