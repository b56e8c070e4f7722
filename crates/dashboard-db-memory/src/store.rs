use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashboard_core::schema::ESTABLISHED_CONDITION;
use dashboard_core::{Condition, Object, ObjectKey, Phase, ResourceKind};
use dashboard_storage::{ListParams, ObjectList, ObjectStore, StoreError, WatchEvent, WatchStream};
use futures_util::future;
use futures_util::stream::{self, StreamExt};
use papaya::HashMap as PapayaHashMap;
use parking_lot::Mutex;
use time::OffsetDateTime;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tracing::debug;
use uuid::Uuid;

use crate::event_log::{EventLog, Record};
use crate::options::StoreOptions;

/// In-memory object store backed by a papaya lock-free HashMap.
///
/// Reads go straight to the map. Writes are serialized behind the event log
/// lock so that resource versions, map contents and the change log advance
/// together:
/// - a single monotonically increasing version counter shared by all kinds
/// - optimistic concurrency on update
/// - finalizer and phase based deletion
/// - watch with replay from a retained version
pub struct InMemoryStore {
    objects: PapayaHashMap<ObjectKey, Object>,
    version_counter: AtomicU64,
    log: Mutex<EventLog>,
    options: StoreOptions,
}

impl InMemoryStore {
    /// Creates a new in-memory store with default options.
    pub fn new() -> Self {
        Self::with_options(StoreOptions::default())
    }

    /// Creates a new in-memory store with the given options.
    pub fn with_options(options: StoreOptions) -> Self {
        Self {
            objects: PapayaHashMap::new(),
            version_counter: AtomicU64::new(0),
            log: Mutex::new(EventLog::new(options.event_log_capacity)),
            options,
        }
    }

    /// The version assigned by the most recent write. Unchanged means no writes.
    pub fn current_version(&self) -> u64 {
        self.version_counter.load(Ordering::SeqCst)
    }

    /// Number of stored objects, Terminating ones included.
    pub fn len(&self) -> usize {
        self.objects.pin().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn next_version(&self) -> u64 {
        self.version_counter.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn lookup(&self, key: &ObjectKey) -> Option<Object> {
        self.objects.pin().get(key).cloned()
    }

    /// Stores `obj` under a fresh version and logs the change.
    fn put(&self, log: &mut EventLog, mut obj: Object, added: bool) -> Object {
        let version = self.next_version();
        obj.metadata.resource_version = Some(version.to_string());
        self.objects.pin().insert(obj.key(), obj.clone());
        let event = if added {
            WatchEvent::Added(obj.clone())
        } else {
            WatchEvent::Modified(obj.clone())
        };
        log.append(Record { version, event });
        obj
    }

    /// Physically removes `obj` and logs its final state.
    fn remove(&self, log: &mut EventLog, mut obj: Object) -> Object {
        let version = self.next_version();
        obj.metadata.resource_version = Some(version.to_string());
        self.objects.pin().remove(&obj.key());
        debug!(kind = %obj.kind, name = %obj.name(), version, "Removed object");
        log.append(Record {
            version,
            event: WatchEvent::Deleted(obj.clone()),
        });
        obj
    }

    fn terminate(&self, log: &mut EventLog, mut obj: Object) -> Object {
        obj.status.phase = Phase::Terminating;
        obj.metadata.deletion_timestamp = Some(OffsetDateTime::now_utc());
        debug!(kind = %obj.kind, name = %obj.name(), "Object is terminating");
        self.put(log, obj, false)
    }

    fn check_placement(&self, obj: &Object) -> Result<(), StoreError> {
        if obj.name().is_empty() {
            return Err(StoreError::invalid(format!("{} name must not be empty", obj.kind)));
        }
        match (obj.kind.is_namespaced(), obj.namespace()) {
            (true, None) => Err(StoreError::invalid(format!(
                "{} {} requires a namespace",
                obj.kind,
                obj.name()
            ))),
            (false, Some(ns)) => Err(StoreError::invalid(format!(
                "{} is cluster scoped but namespace {ns} was given",
                obj.kind
            ))),
            (true, Some(ns)) => {
                match self.lookup(&ObjectKey::cluster(ResourceKind::Namespace, ns)) {
                    Some(namespace) if namespace.is_active() => Ok(()),
                    Some(_) => Err(StoreError::invalid(format!(
                        "namespace {ns} is terminating"
                    ))),
                    None => Err(StoreError::invalid(format!("namespace {ns} not found"))),
                }
            }
            (false, None) => Ok(()),
        }
    }

    fn auto_establish(&self, obj: &mut Object) {
        if self.options.auto_establish_schemas && obj.kind == ResourceKind::CustomResourceDefinition {
            obj.set_condition(established());
        }
    }

    fn create_object(&self, obj: &Object) -> Result<Object, StoreError> {
        let mut log = self.log.lock();
        let key = obj.key();
        if self.lookup(&key).is_some() {
            return Err(StoreError::already_exists(key));
        }
        self.check_placement(obj)?;

        let mut new = obj.clone();
        new.metadata.uid = Some(Uuid::new_v4());
        new.metadata.creation_timestamp = Some(OffsetDateTime::now_utc());
        new.metadata.deletion_timestamp = None;
        new.status.phase = Phase::Active;
        self.auto_establish(&mut new);

        let stored = self.put(&mut log, new, true);
        debug!(
            kind = %stored.kind,
            name = %stored.name(),
            namespace = ?stored.namespace(),
            version = ?stored.resource_version(),
            "Created object"
        );
        Ok(stored)
    }

    fn update_object(&self, obj: &Object) -> Result<Object, StoreError> {
        let mut log = self.log.lock();
        let key = obj.key();
        let current = self
            .lookup(&key)
            .ok_or_else(|| StoreError::not_found(key.clone()))?;

        if let Some(expected) = obj.resource_version() {
            let actual = current.resource_version().unwrap_or_default();
            if expected != actual {
                return Err(StoreError::conflict(key, expected, actual));
            }
        }

        let mut next = obj.clone();
        next.metadata.uid = current.metadata.uid;
        next.metadata.creation_timestamp = current.metadata.creation_timestamp;
        next.metadata.deletion_timestamp = current.metadata.deletion_timestamp;
        next.status.phase = current.status.phase;
        if next.status.conditions.is_empty() {
            next.status.conditions = current.status.conditions.clone();
        }
        self.auto_establish(&mut next);

        if next.is_terminating()
            && next.metadata.finalizers.is_empty()
            && next.kind != ResourceKind::Namespace
        {
            return Ok(self.remove(&mut log, next));
        }

        let stored = self.put(&mut log, next, false);
        debug!(
            kind = %stored.kind,
            name = %stored.name(),
            namespace = ?stored.namespace(),
            version = ?stored.resource_version(),
            "Updated object"
        );
        Ok(stored)
    }

    fn delete_object(&self, key: ObjectKey) -> Result<(), StoreError> {
        let mut log = self.log.lock();
        let current = self
            .lookup(&key)
            .ok_or_else(|| StoreError::not_found(key.clone()))?;

        if current.is_terminating() {
            return Ok(());
        }
        if current.kind == ResourceKind::Namespace || !current.metadata.finalizers.is_empty() {
            self.terminate(&mut log, current);
        } else {
            self.remove(&mut log, current);
        }
        Ok(())
    }

    fn list_objects(
        &self,
        kind: ResourceKind,
        namespace: Option<&str>,
        params: &ListParams,
    ) -> ObjectList {
        // Holding the write lock pins the snapshot to one version.
        let _log = self.log.lock();
        let guard = self.objects.pin();
        let mut items: Vec<Object> = guard
            .iter()
            .filter(|(key, _)| key.kind == kind)
            .filter(|(key, _)| namespace.is_none_or(|ns| key.namespace.as_deref() == Some(ns)))
            .filter(|(_, obj)| params.matches(obj))
            .map(|(_, obj)| obj.clone())
            .collect();
        items.sort_by_key(Object::key);

        ObjectList {
            items,
            resource_version: self.current_version().to_string(),
        }
    }

    /// Marks a schema registration `Established`.
    ///
    /// Only needed when the store was built without `auto_establish_schemas`.
    pub fn establish_schema(&self, name: &str) -> Result<Object, StoreError> {
        let mut log = self.log.lock();
        let key = ObjectKey::cluster(ResourceKind::CustomResourceDefinition, name);
        let mut crd = self
            .lookup(&key)
            .ok_or_else(|| StoreError::not_found(key))?;
        crd.set_condition(established());
        Ok(self.put(&mut log, crd, false))
    }

    /// Finishes deletion of Terminating namespaces.
    ///
    /// Objects inside a Terminating namespace go through the normal deletion
    /// protocol; the namespace itself is removed once it is empty and has no
    /// finalizers. Returns the number of namespaces removed.
    pub fn purge_terminating_namespaces(&self) -> usize {
        let mut log = self.log.lock();
        let terminating: Vec<Object> = self
            .objects
            .pin()
            .iter()
            .filter(|(key, obj)| key.kind == ResourceKind::Namespace && obj.is_terminating())
            .map(|(_, obj)| obj.clone())
            .collect();

        let mut purged = 0;
        for namespace in terminating {
            let children: Vec<Object> = self
                .objects
                .pin()
                .iter()
                .filter(|(key, _)| key.namespace.as_deref() == Some(namespace.name()))
                .map(|(_, obj)| obj.clone())
                .collect();

            let mut blocked = false;
            for child in children {
                if child.metadata.finalizers.is_empty() {
                    self.remove(&mut log, child);
                } else {
                    blocked = true;
                    if !child.is_terminating() {
                        self.terminate(&mut log, child);
                    }
                }
            }

            if !blocked && namespace.metadata.finalizers.is_empty() {
                self.remove(&mut log, namespace);
                purged += 1;
            }
        }
        purged
    }

    fn open_watch(
        &self,
        kind: ResourceKind,
        params: &ListParams,
        since: Option<&str>,
    ) -> Result<WatchStream, StoreError> {
        let since = since
            .map(|v| {
                v.parse::<u64>()
                    .map_err(|_| StoreError::invalid(format!("invalid resource version \"{v}\"")))
            })
            .transpose()?;

        let (replay, receiver, start) = {
            let log = self.log.lock();
            match since {
                Some(version) => {
                    let (replay, receiver) = log.subscribe_since(version)?;
                    (replay, receiver, version)
                }
                None => (Vec::new(), log.subscribe(), self.current_version()),
            }
        };
        debug!(%kind, since = start, replayed = replay.len(), "Opened watch");

        let replay_params = params.clone();
        let replay = stream::iter(
            replay
                .into_iter()
                .filter(move |r| record_matches(kind, &replay_params, r))
                .map(|r| Ok(r.event)),
        );

        let live_params = params.clone();
        let live = BroadcastStream::new(receiver)
            // A lagging watcher has lost events: report Expired once, then end.
            .scan((start, false), |(last, failed), item| {
                if *failed {
                    return future::ready(None);
                }
                let out = match item {
                    Ok(record) => {
                        *last = record.version;
                        Ok(record)
                    }
                    Err(BroadcastStreamRecvError::Lagged(_)) => {
                        *failed = true;
                        Err(StoreError::expired(last.to_string()))
                    }
                };
                future::ready(Some(out))
            })
            .filter_map(move |item| {
                let out = match item {
                    Ok(record) => record_matches(kind, &live_params, &record).then_some(Ok(record.event)),
                    Err(e) => Some(Err(e)),
                };
                future::ready(out)
            });

        Ok(replay.chain(live).boxed())
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn established() -> Condition {
    Condition {
        condition_type: ESTABLISHED_CONDITION.to_string(),
        status: true,
        reason: Some("InitialNamesAccepted".to_string()),
    }
}

fn record_matches(kind: ResourceKind, params: &ListParams, record: &Record) -> bool {
    let obj = record.event.object();
    obj.kind == kind && params.matches(obj)
}

#[async_trait]
impl ObjectStore for InMemoryStore {
    async fn get(
        &self,
        kind: ResourceKind,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<Option<Object>, StoreError> {
        Ok(self.lookup(&ObjectKey::new(kind, namespace, name)))
    }

    async fn list(
        &self,
        kind: ResourceKind,
        namespace: Option<&str>,
        params: &ListParams,
    ) -> Result<ObjectList, StoreError> {
        Ok(self.list_objects(kind, namespace, params))
    }

    async fn watch(
        &self,
        kind: ResourceKind,
        params: &ListParams,
        since: Option<&str>,
    ) -> Result<WatchStream, StoreError> {
        self.open_watch(kind, params, since)
    }

    async fn create(&self, obj: &Object) -> Result<Object, StoreError> {
        self.create_object(obj)
    }

    async fn update(&self, obj: &Object) -> Result<Object, StoreError> {
        self.update_object(obj)
    }

    async fn delete(
        &self,
        kind: ResourceKind,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<(), StoreError> {
        self.delete_object(ObjectKey::new(kind, namespace, name))
    }

    fn backend_name(&self) -> &'static str {
        "in-memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dashboard_storage::LabelSelector;
    use tokio_test::block_on;

    fn namespace(name: &str) -> Object {
        Object::new(ResourceKind::Namespace, name)
    }

    #[tokio::test]
    async fn test_create_assigns_metadata() {
        let store = InMemoryStore::new();
        let created = store.create(&namespace("org-acme")).await.unwrap();
        assert_eq!(created.resource_version(), Some("1"));
        assert!(created.metadata.uid.is_some());
        assert!(created.metadata.creation_timestamp.is_some());
        assert!(created.is_active());

        let err = store.create(&namespace("org-acme")).await.unwrap_err();
        assert!(err.is_already_exists());
    }

    #[tokio::test]
    async fn test_namespaced_object_requires_live_namespace() {
        let store = InMemoryStore::new();
        let secret = Object::namespaced(ResourceKind::Secret, "proj-web", "gitea-conf");
        assert!(matches!(
            store.create(&secret).await.unwrap_err(),
            StoreError::Invalid { .. }
        ));

        store.create(&namespace("proj-web")).await.unwrap();
        store.create(&secret).await.unwrap();

        store
            .delete(ResourceKind::Namespace, None, "proj-web")
            .await
            .unwrap();
        let other = Object::namespaced(ResourceKind::Secret, "proj-web", "other");
        assert!(matches!(
            store.create(&other).await.unwrap_err(),
            StoreError::Invalid { .. }
        ));
    }

    #[tokio::test]
    async fn test_update_version_precondition() {
        let store = InMemoryStore::new();
        let created = store.create(&namespace("org-acme")).await.unwrap();

        let mut first = created.clone();
        first.set_label("a", "1");
        let updated = store.update(&first).await.unwrap();
        assert_eq!(updated.resource_version(), Some("2"));

        let mut stale = created.clone();
        stale.set_label("a", "2");
        let err = store.update(&stale).await.unwrap_err();
        assert!(err.is_conflict());

        // No version means last write wins.
        let mut blind = created;
        blind.metadata.resource_version = None;
        blind.set_label("a", "3");
        assert!(store.update(&blind).await.is_ok());
    }

    #[tokio::test]
    async fn test_update_cannot_revive_terminating_object() {
        let store = InMemoryStore::new();
        store.create(&namespace("org-acme")).await.unwrap();
        store
            .delete(ResourceKind::Namespace, None, "org-acme")
            .await
            .unwrap();

        let mut obj = store
            .get(ResourceKind::Namespace, None, "org-acme")
            .await
            .unwrap()
            .unwrap();
        obj.status.phase = Phase::Active;
        let stored = store.update(&obj).await.unwrap();
        assert!(stored.is_terminating());
    }

    #[tokio::test]
    async fn test_delete_without_finalizers_removes() {
        let store = InMemoryStore::new();
        store.create(&namespace("proj-web")).await.unwrap();
        let svc = Object::namespaced(ResourceKind::Service, "proj-web", "gitea");
        store.create(&svc).await.unwrap();

        store
            .delete(ResourceKind::Service, Some("proj-web"), "gitea")
            .await
            .unwrap();
        assert!(
            store
                .get(ResourceKind::Service, Some("proj-web"), "gitea")
                .await
                .unwrap()
                .is_none()
        );
        let err = store
            .delete(ResourceKind::Service, Some("proj-web"), "gitea")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_finalizers_block_removal() {
        let store = InMemoryStore::new();
        store.create(&namespace("proj-web")).await.unwrap();
        let pvc = Object::namespaced(ResourceKind::PersistentVolumeClaim, "proj-web", "gitea")
            .with_finalizers(["kubernetes.io/pvc-protection"]);
        store.create(&pvc).await.unwrap();

        store
            .delete(ResourceKind::PersistentVolumeClaim, Some("proj-web"), "gitea")
            .await
            .unwrap();
        let mut live = store
            .get(ResourceKind::PersistentVolumeClaim, Some("proj-web"), "gitea")
            .await
            .unwrap()
            .unwrap();
        assert!(live.is_terminating());
        assert!(live.metadata.deletion_timestamp.is_some());

        live.metadata.finalizers.clear();
        store.update(&live).await.unwrap();
        assert!(
            store
                .get(ResourceKind::PersistentVolumeClaim, Some("proj-web"), "gitea")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_purge_terminating_namespaces() {
        let store = InMemoryStore::new();
        store.create(&namespace("proj-web")).await.unwrap();
        store.create(&namespace("proj-api")).await.unwrap();
        store
            .create(&Object::namespaced(ResourceKind::Secret, "proj-web", "gitea-conf"))
            .await
            .unwrap();

        assert_eq!(store.purge_terminating_namespaces(), 0);

        store
            .delete(ResourceKind::Namespace, None, "proj-web")
            .await
            .unwrap();
        assert_eq!(store.purge_terminating_namespaces(), 1);
        assert!(
            store
                .get(ResourceKind::Namespace, None, "proj-web")
                .await
                .unwrap()
                .is_none()
        );
        assert!(
            store
                .get(ResourceKind::Secret, Some("proj-web"), "gitea-conf")
                .await
                .unwrap()
                .is_none()
        );
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_list_filters_and_versions() {
        let store = InMemoryStore::new();
        block_on(async {
            store
                .create(&namespace("org-a").with_labels([("presslabs.com/kind", "organization")]))
                .await
                .unwrap();
            store
                .create(&namespace("proj-b").with_labels([("presslabs.com/kind", "project")]))
                .await
                .unwrap();

            let params =
                ListParams::new().labels(LabelSelector::new().equals("presslabs.com/kind", "project"));
            let list = store.list(ResourceKind::Namespace, None, &params).await.unwrap();
            assert_eq!(list.items.len(), 1);
            assert_eq!(list.items[0].name(), "proj-b");
            assert_eq!(list.resource_version, "2");
        });
    }

    #[tokio::test]
    async fn test_schema_establishment() {
        let store = InMemoryStore::new();
        let crd = Object::new(ResourceKind::CustomResourceDefinition, "projects.example.com");
        let stored = store.create(&crd).await.unwrap();
        assert!(stored.condition(ESTABLISHED_CONDITION).is_some_and(|c| c.status));

        let manual = InMemoryStore::with_options(StoreOptions {
            auto_establish_schemas: false,
            ..Default::default()
        });
        let stored = manual.create(&crd).await.unwrap();
        assert!(stored.condition(ESTABLISHED_CONDITION).is_none());
        let stored = manual.establish_schema("projects.example.com").unwrap();
        assert!(stored.condition(ESTABLISHED_CONDITION).is_some_and(|c| c.status));
        assert!(manual.establish_schema("missing.example.com").is_err());
    }
}
