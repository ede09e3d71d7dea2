//! Shared cancellation flag

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cancellation flag shared by every runner of one coordinator invocation.
///
/// Setting is idempotent and there is no way to unset it. Clones observe
/// the same flag.
#[derive(Clone, Debug, Default)]
pub struct CancellationGate {
    flag: Arc<AtomicBool>,
}

impl CancellationGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_set(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}
