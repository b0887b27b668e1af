//! Progression storage port and an in-memory adapter
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::{Arc, Mutex, PoisonError};

use crate::snapshot::ProgressionSnapshot;

/// Trait for abstracting snapshot persistence.
/// Platform-specific implementations should provide this
pub trait ProgressionStore {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Load a user's snapshot, `None` when the user has no history.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot exists but cannot be read.
    fn load(&self, user_id: &str) -> Result<Option<ProgressionSnapshot>, Self::Error>;

    /// Replace a user's snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be written.
    fn save(&self, user_id: &str, snapshot: &ProgressionSnapshot) -> Result<(), Self::Error>;

    /// Remove a user's snapshot. Removing a missing snapshot is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be removed.
    fn delete(&self, user_id: &str) -> Result<(), Self::Error>;
}

impl<S: ProgressionStore + ?Sized> ProgressionStore for Arc<S> {
    type Error = S::Error;

    fn load(&self, user_id: &str) -> Result<Option<ProgressionSnapshot>, Self::Error> {
        (**self).load(user_id)
    }

    fn save(&self, user_id: &str, snapshot: &ProgressionSnapshot) -> Result<(), Self::Error> {
        (**self).save(user_id, snapshot)
    }

    fn delete(&self, user_id: &str) -> Result<(), Self::Error> {
        (**self).delete(user_id)
    }
}

/// Thread-safe in-memory store. Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    snapshots: Arc<Mutex<HashMap<String, ProgressionSnapshot>>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ProgressionStore for MemoryStore {
    type Error = Infallible;

    fn load(&self, user_id: &str) -> Result<Option<ProgressionSnapshot>, Self::Error> {
        let snapshots = self.snapshots.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(snapshots.get(user_id).cloned())
    }

    fn save(&self, user_id: &str, snapshot: &ProgressionSnapshot) -> Result<(), Self::Error> {
        self.snapshots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(user_id.to_string(), snapshot.clone());
        Ok(())
    }

    fn delete(&self, user_id: &str) -> Result<(), Self::Error> {
        self.snapshots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(user_id);
        Ok(())
    }
}
