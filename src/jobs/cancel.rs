//! One-shot cancellation flag shared between a registry entry and its runner.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Cooperative stop signal. Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a stop. Firing twice is a no-op.
    pub fn fire(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Whether [`fire`](Self::fire) has been called on any clone.
    pub fn is_fired(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// True when both handles refer to the same flag.
    pub fn same_as(&self, other: &CancelHandle) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}
