//! The single published snapshot that queries read from.

use parking_lot::RwLock;
use std::sync::Arc;

use super::IndexSnapshot;

/// Holds the authoritative [`IndexSnapshot`].
///
/// The lock only guards an `Arc` swap, so neither `current` nor `publish`
/// ever waits on snapshot construction. Readers that loaded the previous
/// `Arc` keep using it until they drop it.
#[derive(Debug)]
pub struct SnapshotStore {
    current: RwLock<Arc<IndexSnapshot>>,
}

impl SnapshotStore {
    pub fn new(initial: IndexSnapshot) -> Self {
        Self {
            current: RwLock::new(Arc::new(initial)),
        }
    }

    /// The snapshot in effect right now.
    pub fn current(&self) -> Arc<IndexSnapshot> {
        Arc::clone(&self.current.read())
    }

    /// Atomically replaces the served snapshot and returns the previous one.
    pub fn publish(&self, snapshot: IndexSnapshot) -> Arc<IndexSnapshot> {
        let next = Arc::new(snapshot);
        std::mem::replace(&mut *self.current.write(), next)
    }
}
