//! Data types used by the store traits.

use dashboard_core::Object;
use futures_util::stream::BoxStream;

use crate::error::StoreError;
use crate::selector::{FieldSelector, LabelSelector};

/// Filters accepted by `list` and `watch`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListParams {
    pub label_selector: LabelSelector,
    pub field_selector: FieldSelector,
}

impl ListParams {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn labels(mut self, selector: LabelSelector) -> Self {
        self.label_selector = selector;
        self
    }

    #[must_use]
    pub fn fields(mut self, selector: FieldSelector) -> Self {
        self.field_selector = selector;
        self
    }

    /// Whether `obj` satisfies both selectors.
    pub fn matches(&self, obj: &Object) -> bool {
        self.label_selector.matches(obj.labels()) && self.field_selector.matches(obj)
    }
}

/// Result of a list call: a consistent snapshot and the version it was taken at.
#[derive(Debug, Clone, Default)]
pub struct ObjectList {
    pub items: Vec<Object>,
    /// Store version of the snapshot; pass it to `watch` to resume without gaps.
    pub resource_version: String,
}

/// A change observed on a watched kind.
#[derive(Debug, Clone, PartialEq)]
pub enum WatchEvent {
    Added(Object),
    Modified(Object),
    Deleted(Object),
}

impl WatchEvent {
    pub fn object(&self) -> &Object {
        match self {
            WatchEvent::Added(obj) | WatchEvent::Modified(obj) | WatchEvent::Deleted(obj) => obj,
        }
    }

    pub fn into_object(self) -> Object {
        match self {
            WatchEvent::Added(obj) | WatchEvent::Modified(obj) | WatchEvent::Deleted(obj) => obj,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            WatchEvent::Added(_) => "ADDED",
            WatchEvent::Modified(_) => "MODIFIED",
            WatchEvent::Deleted(_) => "DELETED",
        }
    }
}

/// Stream of watch events. Ends when the store closes the watch; an
/// `Err(StoreError::Expired)` item means the consumer must relist.
pub type WatchStream = BoxStream<'static, Result<WatchEvent, StoreError>>;
