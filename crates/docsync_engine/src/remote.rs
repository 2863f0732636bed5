//! Remote store boundary.
//!
//! The remote side is a document-oriented cloud store organized into named
//! collections. The engine consumes it through two capabilities: per-document
//! writes (create-or-replace, delete) and a snapshot listener that pushes
//! batched document change events, starting with the full current state of
//! the collection.
//!
//! [`MockRemoteStore`] is the in-crate scriptable implementation used by the
//! engine's tests.

use docsync_codec::Document;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;

/// The kind of one document change event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// The document entered the result set (initial state or new document).
    Added,
    /// The document's content changed.
    Modified,
    /// The document left the result set (remote deletion).
    Removed,
}

/// One document change within a snapshot batch.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentChange {
    /// What happened to the document.
    pub kind: ChangeKind,
    /// The document identifier within its collection.
    pub id: String,
    /// The document's value bag at event time.
    pub fields: Document,
}

impl DocumentChange {
    /// Builds a change event.
    pub fn new(kind: ChangeKind, id: impl Into<String>, fields: Document) -> Self {
        Self {
            kind,
            id: id.into(),
            fields,
        }
    }
}

/// One atomic batch of document changes from a snapshot listener.
pub type SnapshotBatch = Vec<DocumentChange>;

/// Identifier of one registered snapshot listener.
pub type ListenerId = u64;

/// Result alias for remote store operations.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// A remote store operation failure (network, permission, availability).
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct RemoteError {
    /// The remote store's failure message.
    pub message: String,
}

impl RemoteError {
    /// Builds a failure from a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// One named collection of documents in the remote store.
pub trait RemoteCollection: Send + Sync + 'static {
    /// Registers a snapshot listener. The receiver first sees one batch of
    /// `Added` events describing the full current collection state, then
    /// incremental batches.
    fn listen(&self) -> (ListenerId, Receiver<SnapshotBatch>);

    /// Removes a snapshot listener; no further batches are delivered.
    /// Removing twice is safe.
    fn unlisten(&self, listener: ListenerId);

    /// Creates or fully replaces one document.
    fn set_document(&self, id: &str, fields: Document) -> RemoteResult<()>;

    /// Deletes one document. Deleting an absent document succeeds.
    fn delete_document(&self, id: &str) -> RemoteResult<()>;
}

/// The remote document store, addressed by collection path.
pub trait RemoteStore: Send + Sync + 'static {
    /// The collection handle type.
    type Collection: RemoteCollection;

    /// Returns the collection at `path`, creating its handle on first use.
    fn collection(&self, path: &str) -> Arc<Self::Collection>;
}

struct Listener {
    id: ListenerId,
    sender: Sender<SnapshotBatch>,
}

#[derive(Default)]
struct CollectionInner {
    documents: BTreeMap<String, Document>,
    listeners: Vec<Listener>,
}

/// A scriptable in-memory remote collection for testing the engine.
#[derive(Default)]
pub struct MockRemoteCollection {
    inner: Mutex<CollectionInner>,
    next_listener: AtomicU64,
    fail_writes: AtomicBool,
    fail_deletes: AtomicBool,
}

impl MockRemoteCollection {
    /// Makes every subsequent `set_document` fail (or succeed again).
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Makes every subsequent `delete_document` fail (or succeed again).
    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    /// Reads back one stored document.
    pub fn document(&self, id: &str) -> Option<Document> {
        self.inner.lock().documents.get(id).cloned()
    }

    /// Number of stored documents.
    pub fn len(&self) -> usize {
        self.inner.lock().documents.len()
    }

    /// True if no documents are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pushes a batch of change events to every live listener, as if the
    /// backend had reported them. Does not touch the stored documents.
    pub fn emit(&self, batch: SnapshotBatch) {
        let mut inner = self.inner.lock();
        inner
            .listeners
            .retain(|listener| listener.sender.send(batch.clone()).is_ok());
    }
}

impl RemoteCollection for MockRemoteCollection {
    fn listen(&self) -> (ListenerId, Receiver<SnapshotBatch>) {
        let id = self.next_listener.fetch_add(1, Ordering::SeqCst) + 1;
        let (sender, receiver) = mpsc::channel();

        let mut inner = self.inner.lock();
        let initial: SnapshotBatch = inner
            .documents
            .iter()
            .map(|(id, fields)| DocumentChange::new(ChangeKind::Added, id, fields.clone()))
            .collect();
        // The receiver is not yet handed out; this send cannot fail.
        let _ = sender.send(initial);
        inner.listeners.push(Listener { id, sender });
        (id, receiver)
    }

    fn unlisten(&self, listener: ListenerId) {
        self.inner.lock().listeners.retain(|l| l.id != listener);
    }

    fn set_document(&self, id: &str, fields: Document) -> RemoteResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(RemoteError::new("write rejected"));
        }
        let mut inner = self.inner.lock();
        let kind = if inner.documents.contains_key(id) {
            ChangeKind::Modified
        } else {
            ChangeKind::Added
        };
        inner.documents.insert(id.to_string(), fields.clone());
        let batch = vec![DocumentChange::new(kind, id, fields)];
        inner
            .listeners
            .retain(|listener| listener.sender.send(batch.clone()).is_ok());
        Ok(())
    }

    fn delete_document(&self, id: &str) -> RemoteResult<()> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(RemoteError::new("delete rejected"));
        }
        let mut inner = self.inner.lock();
        if let Some(fields) = inner.documents.remove(id) {
            let batch = vec![DocumentChange::new(ChangeKind::Removed, id, fields)];
            inner
                .listeners
                .retain(|listener| listener.sender.send(batch.clone()).is_ok());
        }
        Ok(())
    }
}

/// A scriptable in-memory remote store for testing the engine.
#[derive(Default)]
pub struct MockRemoteStore {
    collections: Mutex<BTreeMap<String, Arc<MockRemoteCollection>>>,
}

impl MockRemoteStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl RemoteStore for MockRemoteStore {
    type Collection = MockRemoteCollection;

    fn collection(&self, path: &str) -> Arc<MockRemoteCollection> {
        self.collections
            .lock()
            .entry(path.to_string())
            .or_default()
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docsync_codec::Value;
    use std::time::Duration;

    fn doc(name: &str) -> Document {
        [("name".to_string(), Value::Text(name.to_string()))]
            .into_iter()
            .collect()
    }

    #[test]
    fn listener_sees_initial_state_then_changes() {
        let store = MockRemoteStore::new();
        let collection = store.collection("widgets");
        collection.set_document("w1", doc("a")).unwrap();

        let (_, receiver) = collection.listen();
        let initial = receiver.recv_timeout(Duration::from_millis(100)).unwrap();
        assert_eq!(initial.len(), 1);
        assert_eq!(initial[0].kind, ChangeKind::Added);
        assert_eq!(initial[0].id, "w1");

        collection.set_document("w1", doc("b")).unwrap();
        let update = receiver.recv_timeout(Duration::from_millis(100)).unwrap();
        assert_eq!(update[0].kind, ChangeKind::Modified);

        collection.delete_document("w1").unwrap();
        let removal = receiver.recv_timeout(Duration::from_millis(100)).unwrap();
        assert_eq!(removal[0].kind, ChangeKind::Removed);
    }

    #[test]
    fn unlisten_stops_deliveries() {
        let store = MockRemoteStore::new();
        let collection = store.collection("widgets");

        let (id, receiver) = collection.listen();
        receiver.recv_timeout(Duration::from_millis(100)).unwrap();

        collection.unlisten(id);
        collection.unlisten(id); // idempotent

        collection.set_document("w1", doc("a")).unwrap();
        assert!(receiver.recv_timeout(Duration::from_millis(50)).is_err());
    }

    #[test]
    fn scripted_failures() {
        let store = MockRemoteStore::new();
        let collection = store.collection("widgets");

        collection.fail_writes(true);
        assert!(collection.set_document("w1", doc("a")).is_err());
        collection.fail_writes(false);
        assert!(collection.set_document("w1", doc("a")).is_ok());

        collection.fail_deletes(true);
        assert!(collection.delete_document("w1").is_err());
        collection.fail_deletes(false);
        assert!(collection.delete_document("w1").is_ok());
        assert!(collection.is_empty());
    }

    #[test]
    fn deleting_absent_document_succeeds_silently() {
        let store = MockRemoteStore::new();
        let collection = store.collection("widgets");
        let (_, receiver) = collection.listen();
        receiver.recv_timeout(Duration::from_millis(100)).unwrap();

        collection.delete_document("missing").unwrap();
        assert!(receiver.recv_timeout(Duration::from_millis(50)).is_err());
    }

    #[test]
    fn same_path_returns_same_collection() {
        let store = MockRemoteStore::new();
        let a = store.collection("widgets");
        let b = store.collection("widgets");
        a.set_document("w1", doc("a")).unwrap();
        assert_eq!(b.len(), 1);
    }
}
