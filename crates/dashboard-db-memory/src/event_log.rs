//! Bounded change log backing `watch(since)`.

use std::collections::VecDeque;

use dashboard_storage::{StoreError, WatchEvent};
use tokio::sync::broadcast;

/// A change stamped with the store version it produced.
#[derive(Debug, Clone)]
pub(crate) struct Record {
    pub version: u64,
    pub event: WatchEvent,
}

/// Retains the most recent changes and fans live ones out to watchers.
///
/// Appends and subscriptions happen under the store's write lock, so a
/// watcher's replay and its live receiver never overlap or leave a gap.
pub(crate) struct EventLog {
    records: VecDeque<Record>,
    capacity: usize,
    /// Version of the newest record dropped from the window.
    evicted_through: u64,
    sender: broadcast::Sender<Record>,
}

impl EventLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, _) = broadcast::channel(capacity);
        Self {
            records: VecDeque::with_capacity(capacity),
            capacity,
            evicted_through: 0,
            sender,
        }
    }

    pub fn append(&mut self, record: Record) {
        if self.records.len() == self.capacity {
            if let Some(evicted) = self.records.pop_front() {
                self.evicted_through = evicted.version;
            }
        }
        self.records.push_back(record.clone());
        // No receivers is not an error for a log.
        let _ = self.sender.send(record);
    }

    /// Records newer than `since` plus a receiver for everything after them.
    pub fn subscribe_since(
        &self,
        since: u64,
    ) -> Result<(Vec<Record>, broadcast::Receiver<Record>), StoreError> {
        if since < self.evicted_through {
            return Err(StoreError::expired(since.to_string()));
        }
        let receiver = self.sender.subscribe();
        let replay = self
            .records
            .iter()
            .filter(|r| r.version > since)
            .cloned()
            .collect();
        Ok((replay, receiver))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Record> {
        self.sender.subscribe()
    }
}
