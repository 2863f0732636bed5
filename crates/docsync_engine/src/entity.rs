//! Synchronizable entity records and their sync-state markers.

use docsync_codec::{
    from_document, CodecResult, Document, EntitySchema, FieldMap, SchemaKind, Timestamp,
};

/// Sync markers attached to every top-level entity record.
///
/// `Plain` entities track only the confirmation marker. `Deletable` entities
/// additionally track a pending local deletion, keeping the pre-delete
/// marker around so a failed deletion uplink can be undone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncFields {
    /// Markers for an entity without deletion tracking.
    Plain {
        /// When the last local mutation was confirmed by the remote store.
        /// `None` means a creation or update is pending.
        synced_at: Option<Timestamp>,
    },
    /// Markers for an entity with deletion tracking.
    Deletable {
        /// When the last local mutation was confirmed by the remote store.
        synced_at: Option<Timestamp>,
        /// When a local deletion was requested. Non-`None` means the
        /// deletion has not yet been confirmed by the remote store.
        deleted_at: Option<Timestamp>,
        /// The `synced_at` value that existed immediately before the
        /// deletion was requested. Only valid while `deleted_at` is set.
        synced_at_before_deletion: Option<Timestamp>,
    },
}

impl SyncFields {
    /// Markers for a freshly created plain entity (unsynced).
    pub fn plain() -> Self {
        SyncFields::Plain { synced_at: None }
    }

    /// Markers for a freshly created deletable entity (unsynced).
    pub fn deletable() -> Self {
        SyncFields::Deletable {
            synced_at: None,
            deleted_at: None,
            synced_at_before_deletion: None,
        }
    }
}

/// The per-entity reconciliation state, derived from the markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// All local mutations are confirmed by the remote store.
    Clean,
    /// A local creation or field update awaits uplink.
    DirtyUpsert,
    /// A local deletion awaits uplink.
    DirtyDelete,
}

/// One top-level synchronizable entity as stored locally.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityRecord {
    /// Stable identifier; doubles as the remote document identifier.
    pub id: String,
    /// The user property bag.
    pub fields: FieldMap,
    /// Sync markers.
    pub sync: SyncFields,
}

impl EntityRecord {
    /// Creates an unsynced plain record (a fresh local creation).
    pub fn plain(id: impl Into<String>, fields: FieldMap) -> Self {
        Self {
            id: id.into(),
            fields,
            sync: SyncFields::plain(),
        }
    }

    /// Creates an unsynced deletable record (a fresh local creation).
    pub fn deletable(id: impl Into<String>, fields: FieldMap) -> Self {
        Self {
            id: id.into(),
            fields,
            sync: SyncFields::deletable(),
        }
    }

    /// The confirmation marker.
    pub fn synced_at(&self) -> Option<Timestamp> {
        match self.sync {
            SyncFields::Plain { synced_at } | SyncFields::Deletable { synced_at, .. } => synced_at,
        }
    }

    /// Sets the confirmation marker.
    pub fn set_synced_at(&mut self, value: Option<Timestamp>) {
        match &mut self.sync {
            SyncFields::Plain { synced_at } | SyncFields::Deletable { synced_at, .. } => {
                *synced_at = value;
            }
        }
    }

    /// The pending-deletion marker. Always `None` for plain records.
    pub fn deleted_at(&self) -> Option<Timestamp> {
        match self.sync {
            SyncFields::Plain { .. } => None,
            SyncFields::Deletable { deleted_at, .. } => deleted_at,
        }
    }

    /// The saved pre-deletion marker. Always `None` for plain records.
    pub fn synced_at_before_deletion(&self) -> Option<Timestamp> {
        match self.sync {
            SyncFields::Plain { .. } => None,
            SyncFields::Deletable {
                synced_at_before_deletion,
                ..
            } => synced_at_before_deletion,
        }
    }

    /// True if a local mutation awaits uplink.
    pub fn is_unsynced(&self) -> bool {
        self.synced_at().is_none()
    }

    /// The derived reconciliation state.
    pub fn sync_state(&self) -> SyncState {
        if self.deleted_at().is_some() {
            SyncState::DirtyDelete
        } else if self.is_unsynced() {
            SyncState::DirtyUpsert
        } else {
            SyncState::Clean
        }
    }

    /// Requests a local deletion: records the deletion time, saves the
    /// current confirmation marker, and marks the record unsynced.
    ///
    /// Returns false (and changes nothing) for plain records, which do not
    /// track deletions.
    pub fn mark_deleted(&mut self, now: Timestamp) -> bool {
        match &mut self.sync {
            SyncFields::Plain { .. } => false,
            SyncFields::Deletable {
                synced_at,
                deleted_at,
                synced_at_before_deletion,
            } => {
                *deleted_at = Some(now);
                *synced_at_before_deletion = synced_at.take();
                true
            }
        }
    }

    /// Reverts a pending local deletion, restoring the record to the state
    /// implied by the saved pre-deletion marker.
    pub fn undo_deletion(&mut self) {
        if let SyncFields::Deletable {
            synced_at,
            deleted_at,
            synced_at_before_deletion,
        } = &mut self.sync
        {
            *deleted_at = None;
            *synced_at = synced_at_before_deletion.take();
        }
    }
}

/// Builds a local record directly usable for create-or-update from a remote
/// document: decodes the fields, stamps the sync marker, and writes the
/// document identifier into the record.
pub fn record_from_document(
    schema: &EntitySchema,
    document_id: &str,
    document: &Document,
    synced_at: Timestamp,
) -> CodecResult<EntityRecord> {
    let fields = from_document(schema, document, synced_at)?;
    let sync = match schema.kind {
        SchemaKind::TopLevel { deletable: true } => SyncFields::Deletable {
            synced_at: Some(synced_at),
            deleted_at: None,
            synced_at_before_deletion: None,
        },
        _ => SyncFields::Plain {
            synced_at: Some(synced_at),
        },
    };
    Ok(EntityRecord {
        id: document_id.to_string(),
        fields,
        sync,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use docsync_codec::{FieldValue, Property, PropertyType, Value};

    fn deletable_record() -> EntityRecord {
        let mut record = EntityRecord::deletable("e1", FieldMap::new());
        record.set_synced_at(Some(Timestamp::from_millis(100)));
        record
    }

    #[test]
    fn fresh_records_are_unsynced() {
        let record = EntityRecord::plain("p1", FieldMap::new());
        assert!(record.is_unsynced());
        assert_eq!(record.sync_state(), SyncState::DirtyUpsert);
    }

    #[test]
    fn deletion_marker_algebra() {
        let mut record = deletable_record();
        assert_eq!(record.sync_state(), SyncState::Clean);

        let deleted = record.mark_deleted(Timestamp::from_millis(200));
        assert!(deleted);
        assert_eq!(record.sync_state(), SyncState::DirtyDelete);
        assert_eq!(record.synced_at(), None);
        assert_eq!(record.deleted_at(), Some(Timestamp::from_millis(200)));
        assert_eq!(
            record.synced_at_before_deletion(),
            Some(Timestamp::from_millis(100))
        );

        record.undo_deletion();
        assert_eq!(record.sync_state(), SyncState::Clean);
        assert_eq!(record.synced_at(), Some(Timestamp::from_millis(100)));
        assert_eq!(record.deleted_at(), None);
        assert_eq!(record.synced_at_before_deletion(), None);
    }

    #[test]
    fn deleting_an_unsynced_record_restores_to_dirty_upsert() {
        let mut record = EntityRecord::deletable("e1", FieldMap::new());
        record.mark_deleted(Timestamp::from_millis(10));
        assert_eq!(record.sync_state(), SyncState::DirtyDelete);
        assert_eq!(record.synced_at_before_deletion(), None);

        record.undo_deletion();
        assert_eq!(record.sync_state(), SyncState::DirtyUpsert);
    }

    #[test]
    fn plain_records_cannot_be_marked_deleted() {
        let mut record = EntityRecord::plain("p1", FieldMap::new());
        record.set_synced_at(Some(Timestamp::from_millis(1)));
        assert!(!record.mark_deleted(Timestamp::from_millis(2)));
        assert_eq!(record.sync_state(), SyncState::Clean);
        assert_eq!(record.deleted_at(), None);
    }

    #[test]
    fn record_from_document_stamps_id_and_marker() {
        let schema = EntitySchema::top_level("Widget")
            .deletable()
            .with_property(Property::scalar("name", PropertyType::String));

        let document: Document = [("name".to_string(), Value::Text("a".into()))]
            .into_iter()
            .collect();

        let synced_at = Timestamp::from_millis(7);
        let record = record_from_document(&schema, "w1", &document, synced_at).unwrap();
        assert_eq!(record.id, "w1");
        assert_eq!(record.synced_at(), Some(synced_at));
        assert_eq!(record.deleted_at(), None);
        assert_eq!(record.fields["name"], FieldValue::from("a"));
        assert_eq!(record.sync_state(), SyncState::Clean);
    }
}
