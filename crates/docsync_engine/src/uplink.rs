//! Uplink of local creations, updates, and deletions to the remote store.
//!
//! A record in `DirtyDelete` state becomes a remote document deletion; any
//! other unsynced record becomes a document create-or-replace. Remote
//! failures roll the local store back to a consistent retryable state:
//!
//! - failed deletion: the pending-deletion markers are reverted, leaving
//!   the record as it was before the delete was requested
//! - failed creation: the local record is removed, mirroring a creation
//!   that never happened
//!
//! Confirmation stamping is not done here. The snapshot listener echoes
//! every successful write back as a change event, and the inbound path
//! stamps `synced_at` then, keeping one code path for confirmation.

use crate::entity::{EntityRecord, SyncState};
use crate::error::{SyncError, SyncResult};
use crate::local::{LocalStore, UpdateMode};
use crate::remote::RemoteCollection;
use docsync_codec::{to_document, EntitySchema};

/// Pushes one unsynced record to the remote store, rolling the local store
/// back if the remote write fails.
pub fn uplink<L, C>(
    local: &L,
    collection: &C,
    schema: &EntitySchema,
    record: &EntityRecord,
) -> SyncResult<()>
where
    L: LocalStore,
    C: RemoteCollection,
{
    match record.sync_state() {
        SyncState::DirtyDelete => uplink_deletion(local, collection, schema, record),
        _ => uplink_creation(local, collection, schema, record),
    }
}

fn uplink_deletion<L, C>(
    local: &L,
    collection: &C,
    schema: &EntitySchema,
    record: &EntityRecord,
) -> SyncResult<()>
where
    L: LocalStore,
    C: RemoteCollection,
{
    match collection.delete_document(&record.id) {
        Ok(()) => {
            local.transaction(|txn| txn.delete(schema, &record.id));
            tracing::info!(entity = %schema.name, id = %record.id, "deletion uplinked");
            Ok(())
        }
        Err(err) => {
            local.transaction(|txn| {
                if let Some(mut stored) = txn.get(schema, &record.id) {
                    stored.undo_deletion();
                    txn.upsert(schema, stored, UpdateMode::All);
                }
            });
            tracing::error!(
                entity = %schema.name,
                id = %record.id,
                error = %err,
                "deletion uplink failed, reverted local deletion"
            );
            Err(SyncError::remote(
                "delete",
                &schema.name,
                &record.id,
                err.message,
            ))
        }
    }
}

fn uplink_creation<L, C>(
    local: &L,
    collection: &C,
    schema: &EntitySchema,
    record: &EntityRecord,
) -> SyncResult<()>
where
    L: LocalStore,
    C: RemoteCollection,
{
    let document = to_document(schema, &record.fields)?;
    match collection.set_document(&record.id, document) {
        Ok(()) => {
            tracing::info!(entity = %schema.name, id = %record.id, "creation uplinked");
            Ok(())
        }
        Err(err) => {
            local.transaction(|txn| txn.delete(schema, &record.id));
            tracing::error!(
                entity = %schema.name,
                id = %record.id,
                error = %err,
                "creation uplink failed, removed local record"
            );
            Err(SyncError::remote(
                "create",
                &schema.name,
                &record.id,
                err.message,
            ))
        }
    }
}
