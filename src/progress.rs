//! Progress reporting and cooperative cancellation for long running operations.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

/// Receives progress reports and signals cancellation.
///
/// Implementations are shared between worker threads and must be `Sync`.
pub trait ProgressMonitor: Sync {
    /// Report progress in percent. Returning `false` requests cancellation.
    fn progress(&self, percent: u8) -> bool {
        let _ = percent;
        !self.is_cancelled()
    }

    /// True once the operation should stop.
    fn is_cancelled(&self) -> bool;
}

/// A cancel flag that can be set from any thread and records the last
/// reported progress.
#[derive(Debug, Default)]
pub struct CancelFlag {
    cancelled: AtomicBool,
    percent: AtomicU8,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Last reported progress in percent.
    pub fn percent(&self) -> u8 {
        self.percent.load(Ordering::Relaxed)
    }
}

impl ProgressMonitor for CancelFlag {
    fn progress(&self, percent: u8) -> bool {
        self.percent.store(percent.min(100), Ordering::Relaxed);
        !self.is_cancelled()
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Monitor that never cancels.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressMonitor for NoProgress {
    fn is_cancelled(&self) -> bool {
        false
    }
}
