//! # DocSync Engine
//!
//! Bidirectional reconciliation between a local transactional object store
//! and a remote document-oriented cloud store.
//!
//! The engine keeps the two stores convergent per entity type:
//!
//! - **Inbound**: a remote snapshot listener pushes batched document change
//!   events; each batch is applied to the local store in one transaction
//!   ([`apply_snapshot_batch`])
//! - **Outbound**: a local subscription over the unsynced record set pushes
//!   creations, updates, and deletions to the remote store, rolling the
//!   local store back when a remote write fails ([`uplink`])
//!
//! Records carry explicit sync markers ([`SyncFields`]): `synced_at` is the
//! remote confirmation stamp, and deletable entities additionally track a
//! pending deletion so a failed deletion uplink can be undone. The remote
//! store is the arbiter: a local mutation counts as synchronized only once
//! its echo arrives back through the snapshot listener.
//!
//! Store access goes through the [`LocalStore`] and [`RemoteStore`] traits;
//! [`MemoryLocalStore`] and [`MockRemoteStore`] are the in-crate test
//! implementations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod engine;
mod entity;
mod error;
mod handle;
mod local;
mod remote;
mod uplink;

pub use engine::{apply_snapshot_batch, BatchOutcome, SyncEngine};
pub use entity::{record_from_document, EntityRecord, SyncFields, SyncState};
pub use error::{SyncError, SyncResult};
pub use handle::SyncHandle;
pub use local::{
    LocalStore, LocalTransaction, MemoryLocalStore, SubscriptionId, UnsyncedDelivery, UpdateMode,
};
pub use remote::{
    ChangeKind, DocumentChange, ListenerId, MockRemoteCollection, MockRemoteStore, RemoteCollection,
    RemoteError, RemoteResult, RemoteStore, SnapshotBatch,
};
pub use uplink::uplink;
