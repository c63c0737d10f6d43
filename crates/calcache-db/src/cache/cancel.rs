use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{CacheError, CacheResult};

/// A flag another thread can raise to stop an operation before it writes.
#[derive(Debug, Clone, Default)]
pub struct Cancellable {
    cancelled: Arc<AtomicBool>,
}

impl Cancellable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// ## Errors
/// Returns `Cancelled` if `cancellable` has been raised.
pub fn check(cancellable: Option<&Cancellable>) -> CacheResult<()> {
    if cancellable.is_some_and(Cancellable::is_cancelled) {
        tracing::debug!("Operation cancelled");
        return Err(CacheError::Cancelled);
    }
    Ok(())
}
