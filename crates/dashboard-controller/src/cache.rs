use std::collections::HashSet;
use std::sync::Arc;

use dashboard_core::{Object, ObjectKey, ResourceKind};
use dashboard_storage::{LabelSelector, WatchEvent};
use dashmap::DashMap;

/// Shared read-through view of the watched kinds.
///
/// Workers read it freely; only the engine's informers write to it.
#[derive(Clone, Default)]
pub struct Cache {
    objects: Arc<DashMap<ObjectKey, Arc<Object>>>,
}

impl Cache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, kind: ResourceKind, namespace: Option<&str>, name: &str) -> Option<Arc<Object>> {
        self.objects
            .get(&ObjectKey::new(kind, namespace, name))
            .map(|entry| entry.value().clone())
    }

    /// Every cached object of `kind` whose labels match `selector`.
    pub fn list(&self, kind: ResourceKind, selector: &LabelSelector) -> Vec<Arc<Object>> {
        self.objects
            .iter()
            .filter(|entry| entry.key().kind == kind && selector.matches(entry.value().labels()))
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub(crate) fn apply(&self, event: &WatchEvent) {
        match event {
            WatchEvent::Added(obj) | WatchEvent::Modified(obj) => {
                self.objects.insert(obj.key(), Arc::new(obj.clone()));
            }
            WatchEvent::Deleted(obj) => {
                self.objects.remove(&obj.key());
            }
        }
    }

    /// Replaces every object of `kind` with a fresh listing.
    ///
    /// Returns the objects that disappeared since the previous listing.
    pub(crate) fn replace(&self, kind: ResourceKind, items: &[Object]) -> Vec<Object> {
        let fresh: HashSet<ObjectKey> = items.iter().map(Object::key).collect();
        let stale: Vec<ObjectKey> = self
            .objects
            .iter()
            .filter(|entry| entry.key().kind == kind && !fresh.contains(entry.key()))
            .map(|entry| entry.key().clone())
            .collect();

        let removed = stale
            .iter()
            .filter_map(|key| self.objects.remove(key))
            .map(|(_, obj)| Object::clone(&obj))
            .collect();

        for obj in items {
            self.objects.insert(obj.key(), Arc::new(obj.clone()));
        }
        removed
    }
}
