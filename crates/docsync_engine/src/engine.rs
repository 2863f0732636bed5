//! The reconciliation loop.
//!
//! One [`SyncEngine`] owns a local store and a remote store and runs one
//! bidirectional synchronization per registered entity type. Each
//! registration spawns two threads:
//!
//! - the inbound thread drains the remote snapshot listener and applies
//!   each batch to the local store in one transaction
//! - the outbound thread drains the local unsynced-record subscription and
//!   uplinks each record to the remote collection
//!
//! Both threads exit when their channel disconnects, which happens when the
//! registration's [`SyncHandle`] is canceled.

use crate::entity::{record_from_document, EntityRecord, SyncState};
use crate::handle::SyncHandle;
use crate::local::{LocalStore, LocalTransaction, UnsyncedDelivery, UpdateMode};
use crate::remote::{ChangeKind, RemoteCollection, RemoteStore, SnapshotBatch};
use crate::uplink::uplink;
use docsync_codec::{CodecError, EntitySchema, Timestamp};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread;

/// The result of applying one snapshot batch to the local store.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    /// Number of change events applied.
    pub applied: usize,
    /// Events skipped because of a schema/value contract violation,
    /// with the offending document identifier.
    pub errors: Vec<(String, CodecError)>,
}

/// Orchestrates bidirectional synchronization between one local store and
/// one remote store.
pub struct SyncEngine<L: LocalStore, R: RemoteStore> {
    local: Arc<L>,
    remote: Arc<R>,
    handles: Mutex<Vec<Arc<SyncHandle>>>,
}

impl<L: LocalStore, R: RemoteStore> SyncEngine<L, R> {
    /// Creates an engine over the two stores.
    pub fn new(local: Arc<L>, remote: Arc<R>) -> Self {
        Self {
            local,
            remote,
            handles: Mutex::new(Vec::new()),
        }
    }

    /// The local store.
    pub fn local(&self) -> &Arc<L> {
        &self.local
    }

    /// The remote store.
    pub fn remote(&self) -> &Arc<R> {
        &self.remote
    }

    /// Starts synchronizing one entity type against one remote collection.
    ///
    /// Returns a handle that stops both directions when canceled. The
    /// engine also cancels all outstanding handles on drop.
    pub fn register(&self, schema: &EntitySchema, collection_path: &str) -> Arc<SyncHandle> {
        let collection = self.remote.collection(collection_path);
        let handle = Arc::new(SyncHandle::new(&schema.name));

        // Inbound: remote snapshot batches into local transactions.
        let (listener, remote_rx) = collection.listen();
        {
            let local = self.local.clone();
            let schema = schema.clone();
            thread::spawn(move || {
                while let Ok(batch) = remote_rx.recv() {
                    let outcome = apply_snapshot_batch(&*local, &schema, &batch);
                    tracing::debug!(
                        entity = %schema.name,
                        applied = outcome.applied,
                        skipped = outcome.errors.len(),
                        "snapshot batch applied"
                    );
                }
            });
        }
        {
            let collection = collection.clone();
            handle.add_teardown(move || collection.unlisten(listener));
        }

        // Outbound: local unsynced records into remote writes.
        let (subscription, local_rx) = self.local.subscribe_unsynced(schema);
        {
            let local = self.local.clone();
            let collection = collection.clone();
            let schema = schema.clone();
            thread::spawn(move || {
                while let Ok(delivery) = local_rx.recv() {
                    let records = match delivery {
                        UnsyncedDelivery::Initial(records) => records,
                        UnsyncedDelivery::Update { inserted, modified } => {
                            inserted.into_iter().chain(modified).collect()
                        }
                    };
                    for record in records {
                        // Failures are logged and rolled back inside uplink;
                        // the loop moves on to the next record.
                        let _ = uplink(&*local, &*collection, &schema, &record);
                    }
                }
            });
        }
        {
            let local = self.local.clone();
            handle.add_teardown(move || local.unsubscribe(subscription));
        }

        tracing::info!(entity = %schema.name, collection = collection_path, "synchronization started");
        self.handles.lock().push(handle.clone());
        handle
    }

    /// Cancels every handle this engine has issued.
    pub fn cancel_all(&self) {
        for handle in self.handles.lock().drain(..) {
            handle.cancel();
        }
    }

    /// Number of handles issued and not yet drained by [`Self::cancel_all`].
    pub fn handle_count(&self) -> usize {
        self.handles.lock().len()
    }
}

impl<L: LocalStore, R: RemoteStore> Drop for SyncEngine<L, R> {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

/// Applies one batch of remote document changes to the local store in a
/// single transaction.
///
/// - `Added` for an unknown identifier creates the record; for a known one
///   it only refreshes the confirmation marker, never the fields, so a
///   re-delivered initial snapshot cannot clobber local edits. The refresh
///   is skipped while a local deletion is pending.
/// - `Modified` merges the document's properties over the stored record.
/// - `Removed` deletes the record unless a local deletion is pending, in
///   which case the event is the echo of this store's own uplink and the
///   record is already gone or about to be.
///
/// A contract violation in one event skips that event only; the rest of
/// the batch still applies.
pub fn apply_snapshot_batch<L: LocalStore>(
    local: &L,
    schema: &EntitySchema,
    batch: &SnapshotBatch,
) -> BatchOutcome {
    let synced_at = Timestamp::now();
    local.transaction(|txn| {
        let mut outcome = BatchOutcome::default();
        for change in batch {
            match apply_change(txn, schema, change, synced_at) {
                Ok(()) => outcome.applied += 1,
                Err(err) => {
                    tracing::error!(
                        entity = %schema.name,
                        id = %change.id,
                        error = %err,
                        "skipping undecodable remote change"
                    );
                    outcome.errors.push((change.id.clone(), err));
                }
            }
        }
        outcome
    })
}

fn apply_change(
    txn: &mut dyn LocalTransaction,
    schema: &EntitySchema,
    change: &crate::remote::DocumentChange,
    synced_at: Timestamp,
) -> Result<(), CodecError> {
    match change.kind {
        ChangeKind::Added => match txn.get(schema, &change.id) {
            Some(existing) => {
                if existing.sync_state() != SyncState::DirtyDelete {
                    confirm(txn, schema, existing, synced_at);
                }
                Ok(())
            }
            None => {
                let record = record_from_document(schema, &change.id, &change.fields, synced_at)?;
                txn.upsert(schema, record, UpdateMode::All);
                Ok(())
            }
        },
        ChangeKind::Modified => {
            let record = record_from_document(schema, &change.id, &change.fields, synced_at)?;
            txn.upsert(schema, record, UpdateMode::Modified);
            Ok(())
        }
        ChangeKind::Removed => {
            let pending_local_delete = txn
                .get(schema, &change.id)
                .is_some_and(|record| record.deleted_at().is_some());
            if !pending_local_delete {
                txn.delete(schema, &change.id);
            }
            Ok(())
        }
    }
}

fn confirm(
    txn: &mut dyn LocalTransaction,
    schema: &EntitySchema,
    mut record: EntityRecord,
    synced_at: Timestamp,
) {
    record.set_synced_at(Some(synced_at));
    txn.upsert(schema, record, UpdateMode::All);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::MemoryLocalStore;
    use crate::remote::DocumentChange;
    use docsync_codec::{FieldMap, FieldValue, Property, PropertyType, Value};

    fn schema() -> EntitySchema {
        EntitySchema::top_level("Widget")
            .deletable()
            .with_property(Property::scalar("name", PropertyType::String))
    }

    fn doc(name: &str) -> docsync_codec::Document {
        [("name".to_string(), Value::Text(name.to_string()))]
            .into_iter()
            .collect()
    }

    #[test]
    fn added_creates_unknown_record() {
        let local = MemoryLocalStore::new();
        let schema = schema();

        let batch = vec![DocumentChange::new(ChangeKind::Added, "w1", doc("a"))];
        let outcome = apply_snapshot_batch(&local, &schema, &batch);
        assert_eq!(outcome.applied, 1);

        let record = local.get(&schema, "w1").unwrap();
        assert_eq!(record.fields["name"], FieldValue::from("a"));
        assert!(record.synced_at().is_some());
        assert_eq!(record.sync_state(), SyncState::Clean);
    }

    #[test]
    fn added_for_known_record_refreshes_marker_only() {
        let local = MemoryLocalStore::new();
        let schema = schema();

        // An unsynced local record with different content.
        let mut fields = FieldMap::new();
        fields.insert("name".to_string(), FieldValue::from("local edit"));
        let record = EntityRecord::deletable("w1", fields);
        local.transaction(|txn| txn.upsert(&schema, record, UpdateMode::All));

        let batch = vec![DocumentChange::new(ChangeKind::Added, "w1", doc("remote"))];
        apply_snapshot_batch(&local, &schema, &batch);

        let stored = local.get(&schema, "w1").unwrap();
        assert_eq!(stored.fields["name"], FieldValue::from("local edit"));
        assert!(stored.synced_at().is_some());
    }

    #[test]
    fn repeated_added_for_synced_record_only_refreshes_marker() {
        let local = MemoryLocalStore::new();
        let schema = schema();

        let batch = vec![DocumentChange::new(ChangeKind::Added, "w1", doc("a"))];
        apply_snapshot_batch(&local, &schema, &batch);
        let first = local.get(&schema, "w1").unwrap();
        assert_eq!(first.sync_state(), SyncState::Clean);

        // A re-delivered initial snapshot carries stale field content.
        let batch = vec![DocumentChange::new(ChangeKind::Added, "w1", doc("stale"))];
        apply_snapshot_batch(&local, &schema, &batch);
        apply_snapshot_batch(&local, &schema, &batch);

        let stored = local.get(&schema, "w1").unwrap();
        assert_eq!(stored.fields, first.fields);
        assert_eq!(stored.sync_state(), SyncState::Clean);
        assert!(stored.synced_at() >= first.synced_at());
    }

    #[test]
    fn added_does_not_confirm_pending_deletion() {
        let local = MemoryLocalStore::new();
        let schema = schema();

        let mut record = EntityRecord::deletable("w1", FieldMap::new());
        record.set_synced_at(Some(Timestamp::from_millis(1)));
        record.mark_deleted(Timestamp::from_millis(2));
        local.transaction(|txn| txn.upsert(&schema, record, UpdateMode::All));

        let batch = vec![DocumentChange::new(ChangeKind::Added, "w1", doc("a"))];
        apply_snapshot_batch(&local, &schema, &batch);

        let stored = local.get(&schema, "w1").unwrap();
        assert_eq!(stored.sync_state(), SyncState::DirtyDelete);
        assert_eq!(stored.synced_at(), None);
    }

    #[test]
    fn modified_merges_fields_and_confirms() {
        let local = MemoryLocalStore::new();
        let schema = schema();

        let batch = vec![DocumentChange::new(ChangeKind::Added, "w1", doc("a"))];
        apply_snapshot_batch(&local, &schema, &batch);

        let batch = vec![DocumentChange::new(ChangeKind::Modified, "w1", doc("b"))];
        apply_snapshot_batch(&local, &schema, &batch);

        let stored = local.get(&schema, "w1").unwrap();
        assert_eq!(stored.fields["name"], FieldValue::from("b"));
        assert_eq!(stored.sync_state(), SyncState::Clean);
    }

    #[test]
    fn removed_deletes_unless_deletion_pending() {
        let local = MemoryLocalStore::new();
        let schema = schema();

        let batch = vec![
            DocumentChange::new(ChangeKind::Added, "w1", doc("a")),
            DocumentChange::new(ChangeKind::Added, "w2", doc("b")),
        ];
        apply_snapshot_batch(&local, &schema, &batch);

        // w2's deletion is locally pending: the removal echo must not race
        // ahead of the uplink's own local delete.
        local.transaction(|txn| {
            let mut record = txn.get(&schema, "w2").unwrap();
            record.mark_deleted(Timestamp::from_millis(9));
            txn.upsert(&schema, record, UpdateMode::All);
        });

        let batch = vec![
            DocumentChange::new(ChangeKind::Removed, "w1", doc("a")),
            DocumentChange::new(ChangeKind::Removed, "w2", doc("b")),
        ];
        apply_snapshot_batch(&local, &schema, &batch);

        assert!(local.get(&schema, "w1").is_none());
        assert!(local.get(&schema, "w2").is_some());
    }

    #[test]
    fn undecodable_change_skips_only_itself() {
        let local = MemoryLocalStore::new();
        let schema = schema();

        let poisoned: docsync_codec::Document = [("name".to_string(), Value::Integer(7))]
            .into_iter()
            .collect();
        let batch = vec![
            DocumentChange::new(ChangeKind::Added, "bad", poisoned),
            DocumentChange::new(ChangeKind::Added, "good", doc("a")),
        ];

        let outcome = apply_snapshot_batch(&local, &schema, &batch);
        assert_eq!(outcome.applied, 1);
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].0, "bad");
        assert!(local.get(&schema, "bad").is_none());
        assert!(local.get(&schema, "good").is_some());
    }
}
