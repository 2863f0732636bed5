//! Local store boundary.
//!
//! The reconciliation loop consumes the local store through two narrow
//! capabilities: short-lived synchronous scoped transactions, and a
//! subscribable query over the unsynced record set (`synced_at == None`)
//! that reports an initial snapshot followed by incremental change sets.
//!
//! [`MemoryLocalStore`] is the in-crate reference implementation used by
//! the engine's tests.

use crate::entity::EntityRecord;
use docsync_codec::EntitySchema;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::mpsc::{self, Receiver, Sender};

/// How an upsert treats fields absent from the incoming record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateMode {
    /// Full create-or-replace: the stored record becomes the incoming one.
    All,
    /// Only-changed-fields: incoming fields are merged over the stored
    /// record; absent properties are left untouched. Sync markers are
    /// always taken from the incoming record.
    Modified,
}

/// Scoped write operations available inside one local transaction.
pub trait LocalTransaction {
    /// Reads a record by identifier.
    fn get(&self, schema: &EntitySchema, id: &str) -> Option<EntityRecord>;

    /// Creates or updates a record by its identifier.
    fn upsert(&mut self, schema: &EntitySchema, record: EntityRecord, mode: UpdateMode);

    /// Deletes a record by identifier. Deleting an absent record is a no-op.
    fn delete(&mut self, schema: &EntitySchema, id: &str);
}

/// Identifier of one unsynced-query subscription.
pub type SubscriptionId = u64;

/// One delivery from an unsynced-query subscription.
#[derive(Debug, Clone, PartialEq)]
pub enum UnsyncedDelivery {
    /// The full unsynced set at subscription time.
    Initial(Vec<EntityRecord>),
    /// An incremental change to the unsynced set. Records leaving the set
    /// are not reported; leaving is itself the side effect of becoming
    /// synced or locally deleted.
    Update {
        /// Records newly entering the unsynced set.
        inserted: Vec<EntityRecord>,
        /// Records already unsynced whose content changed.
        modified: Vec<EntityRecord>,
    },
}

/// The local, transactional, change-notifying object store.
pub trait LocalStore: Send + Sync + 'static {
    /// Runs a short-lived synchronous scoped transaction. Transactions are
    /// serialized; change notifications are delivered after commit.
    fn transaction<R>(&self, f: impl FnOnce(&mut dyn LocalTransaction) -> R) -> R;

    /// Reads a record outside any transaction.
    fn get(&self, schema: &EntitySchema, id: &str) -> Option<EntityRecord>;

    /// Snapshot of the current unsynced record set for one entity type.
    fn unsynced(&self, schema: &EntitySchema) -> Vec<EntityRecord>;

    /// Subscribes to the unsynced query for one entity type. The receiver
    /// first sees [`UnsyncedDelivery::Initial`], then incremental updates
    /// in commit order.
    fn subscribe_unsynced(
        &self,
        schema: &EntitySchema,
    ) -> (SubscriptionId, Receiver<UnsyncedDelivery>);

    /// Invalidates a subscription; no further deliveries are made.
    /// Unsubscribing twice is safe.
    fn unsubscribe(&self, subscription: SubscriptionId);
}

type Collections = BTreeMap<String, BTreeMap<String, EntityRecord>>;

struct Subscriber {
    id: SubscriptionId,
    entity: String,
    sender: Sender<UnsyncedDelivery>,
}

#[derive(Default)]
struct Inner {
    collections: Collections,
    subscribers: Vec<Subscriber>,
    next_subscription: SubscriptionId,
}

impl Inner {
    fn unsynced_for(&self, entity: &str) -> BTreeMap<String, EntityRecord> {
        self.collections
            .get(entity)
            .map(|records| {
                records
                    .iter()
                    .filter(|(_, record)| record.is_unsynced())
                    .map(|(id, record)| (id.clone(), record.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// An in-memory local store for testing the engine.
#[derive(Default)]
pub struct MemoryLocalStore {
    inner: Mutex<Inner>,
}

impl MemoryLocalStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records stored for one entity type.
    pub fn len(&self, schema: &EntitySchema) -> usize {
        self.inner
            .lock()
            .collections
            .get(&schema.name)
            .map_or(0, BTreeMap::len)
    }

    /// True if no records are stored for one entity type.
    pub fn is_empty(&self, schema: &EntitySchema) -> bool {
        self.len(schema) == 0
    }
}

struct MemoryTransaction<'a> {
    collections: &'a mut Collections,
}

impl LocalTransaction for MemoryTransaction<'_> {
    fn get(&self, schema: &EntitySchema, id: &str) -> Option<EntityRecord> {
        self.collections
            .get(&schema.name)
            .and_then(|records| records.get(id))
            .cloned()
    }

    fn upsert(&mut self, schema: &EntitySchema, record: EntityRecord, mode: UpdateMode) {
        let records = self.collections.entry(schema.name.clone()).or_default();
        match mode {
            UpdateMode::All => {
                records.insert(record.id.clone(), record);
            }
            UpdateMode::Modified => match records.get_mut(&record.id) {
                Some(existing) => {
                    existing.fields.extend(record.fields);
                    existing.sync = record.sync;
                }
                None => {
                    records.insert(record.id.clone(), record);
                }
            },
        }
    }

    fn delete(&mut self, schema: &EntitySchema, id: &str) {
        if let Some(records) = self.collections.get_mut(&schema.name) {
            records.remove(id);
        }
    }
}

impl LocalStore for MemoryLocalStore {
    fn transaction<R>(&self, f: impl FnOnce(&mut dyn LocalTransaction) -> R) -> R {
        let mut inner = self.inner.lock();

        // Snapshot the unsynced sets of subscribed entity types so the
        // post-commit notification can report insertions and modifications.
        let watched: Vec<String> = {
            let mut entities: Vec<String> =
                inner.subscribers.iter().map(|s| s.entity.clone()).collect();
            entities.dedup();
            entities
        };
        let before: BTreeMap<String, BTreeMap<String, EntityRecord>> = watched
            .iter()
            .map(|entity| (entity.clone(), inner.unsynced_for(entity)))
            .collect();

        let result = {
            let mut txn = MemoryTransaction {
                collections: &mut inner.collections,
            };
            f(&mut txn)
        };

        // Deliver change sets, dropping disconnected subscribers.
        let after: BTreeMap<String, BTreeMap<String, EntityRecord>> = watched
            .iter()
            .map(|entity| (entity.clone(), inner.unsynced_for(entity)))
            .collect();
        inner.subscribers.retain(|subscriber| {
            let Some(now) = after.get(&subscriber.entity) else {
                return true;
            };
            let was = before.get(&subscriber.entity);
            let mut inserted = Vec::new();
            let mut modified = Vec::new();
            for (id, record) in now {
                match was.and_then(|set| set.get(id)) {
                    None => inserted.push(record.clone()),
                    Some(previous) if previous != record => modified.push(record.clone()),
                    Some(_) => {}
                }
            }
            if inserted.is_empty() && modified.is_empty() {
                return true;
            }
            subscriber
                .sender
                .send(UnsyncedDelivery::Update { inserted, modified })
                .is_ok()
        });

        result
    }

    fn get(&self, schema: &EntitySchema, id: &str) -> Option<EntityRecord> {
        self.inner
            .lock()
            .collections
            .get(&schema.name)
            .and_then(|records| records.get(id))
            .cloned()
    }

    fn unsynced(&self, schema: &EntitySchema) -> Vec<EntityRecord> {
        self.inner
            .lock()
            .unsynced_for(&schema.name)
            .into_values()
            .collect()
    }

    fn subscribe_unsynced(
        &self,
        schema: &EntitySchema,
    ) -> (SubscriptionId, Receiver<UnsyncedDelivery>) {
        let mut inner = self.inner.lock();
        inner.next_subscription += 1;
        let id = inner.next_subscription;

        let (sender, receiver) = mpsc::channel();
        let initial = inner.unsynced_for(&schema.name).into_values().collect();
        // The receiver is not yet handed out; this send cannot fail.
        let _ = sender.send(UnsyncedDelivery::Initial(initial));

        inner.subscribers.push(Subscriber {
            id,
            entity: schema.name.clone(),
            sender,
        });
        (id, receiver)
    }

    fn unsubscribe(&self, subscription: SubscriptionId) {
        self.inner
            .lock()
            .subscribers
            .retain(|subscriber| subscriber.id != subscription);
    }
}
