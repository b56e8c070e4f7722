/// Default number of change events retained for watch resumption.
pub const DEFAULT_EVENT_LOG_CAPACITY: usize = 4096;

/// In-memory backend configuration options.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Mark `CustomResourceDefinition` objects `Established` on every write.
    /// When off, call `InMemoryStore::establish_schema` to finish registration.
    pub auto_establish_schemas: bool,
    /// Number of change events kept for `watch(since)`.
    pub event_log_capacity: usize,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            auto_establish_schemas: true,
            event_log_capacity: DEFAULT_EVENT_LOG_CAPACITY,
        }
    }
}
