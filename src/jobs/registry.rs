//! In-memory map of owners to the cancel handle of their active sweep.

use std::collections::HashMap;

use tokio::sync::{Mutex, MutexGuard};

use super::cancel::CancelHandle;

/// Owner → cancel handle. At most one entry per owner.
///
/// Every method takes the lock once. Callers needing check-then-insert
/// atomicity must hold [`JobRegistry::lock`] across both steps.
#[derive(Debug, Default)]
pub struct JobRegistry {
    entries: Mutex<HashMap<String, CancelHandle>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle registered for `owner`, if any.
    pub async fn get(&self, owner: &str) -> Option<CancelHandle> {
        self.entries.lock().await.get(owner).cloned()
    }

    /// Register (or replace) the handle for `owner`.
    pub async fn set(&self, owner: &str, handle: CancelHandle) {
        self.entries.lock().await.insert(owner.to_string(), handle);
    }

    /// Drop the entry for `owner`.
    pub async fn delete(&self, owner: &str) {
        self.entries.lock().await.remove(owner);
    }

    pub async fn contains(&self, owner: &str) -> bool {
        self.entries.lock().await.contains_key(owner)
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    /// Owners with a registered job.
    pub async fn owners(&self) -> Vec<String> {
        self.entries.lock().await.keys().cloned().collect()
    }

    /// Hold the registry lock for a compound operation.
    pub(crate) async fn lock(&self) -> MutexGuard<'_, HashMap<String, CancelHandle>> {
        self.entries.lock().await
    }
}
