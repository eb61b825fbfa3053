use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Completion flag attached to one submitted command sequence.
///
/// The backend flips it once the device has finished the submission; the
/// frame pacer checks it before reusing the ring slot the submission read.
#[derive(Debug, Clone)]
pub struct CompletionSignal(Arc<AtomicBool>);

impl CompletionSignal {
    pub fn pending() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn completed() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub fn complete(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_complete(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// True when both handles belong to the same submission.
    pub fn same_as(&self, other: &CompletionSignal) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}
