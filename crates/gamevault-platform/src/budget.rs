//! Bounds for long filesystem walks

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Cooperative cancellation shared between a caller and a running scan
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Depth and time limits for heuristic directory walks
#[derive(Debug, Clone)]
pub struct ScanBudget {
    /// Maximum directory depth below each root
    pub max_depth: usize,

    /// Hard stop for the walk
    pub deadline: Option<Instant>,

    /// External cancellation
    pub cancel: CancelFlag,
}

impl Default for ScanBudget {
    fn default() -> Self {
        Self {
            max_depth: 3,
            deadline: None,
            cancel: CancelFlag::new(),
        }
    }
}

impl ScanBudget {
    pub fn new(max_depth: usize) -> Self {
        Self {
            max_depth,
            ..Default::default()
        }
    }

    /// Start the clock: the budget expires `timeout` from now
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// True once the deadline passed or the scan was cancelled
    pub fn is_exhausted(&self) -> bool {
        if self.cancel.is_cancelled() {
            return true;
        }
        self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }
}
