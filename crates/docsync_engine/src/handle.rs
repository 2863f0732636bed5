//! Cancelable handles for running synchronizations.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

type Teardown = Box<dyn FnOnce() + Send>;

/// A handle to one running entity-type synchronization.
///
/// Dropping the handle does not stop the synchronization; call
/// [`SyncHandle::cancel`]. Cancellation is idempotent.
pub struct SyncHandle {
    entity: String,
    canceled: AtomicBool,
    teardown: Mutex<Vec<Teardown>>,
}

impl SyncHandle {
    pub(crate) fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            canceled: AtomicBool::new(false),
            teardown: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn add_teardown(&self, f: impl FnOnce() + Send + 'static) {
        let mut teardown = self.teardown.lock();
        if self.canceled.load(Ordering::SeqCst) {
            drop(teardown);
            f();
        } else {
            teardown.push(Box::new(f));
        }
    }

    /// The entity type this handle synchronizes.
    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// True once [`SyncHandle::cancel`] has run.
    pub fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::SeqCst)
    }

    /// Stops both reconciliation directions: removes the remote snapshot
    /// listener and invalidates the local change subscription. Safe to call
    /// any number of times; only the first call tears anything down.
    pub fn cancel(&self) {
        if self.canceled.swap(true, Ordering::SeqCst) {
            return;
        }
        let teardowns: Vec<Teardown> = std::mem::take(&mut *self.teardown.lock());
        for teardown in teardowns {
            teardown();
        }
        tracing::debug!(entity = %self.entity, "synchronization canceled");
    }
}
