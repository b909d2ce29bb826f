//! Progress reporting and cancellation.
//!
//! [`ProgressCallback`] observes long-running work (frame analysis, export
//! rendering), and [`CancellationToken`] lets a newer analysis run stop the
//! one it supersedes.
//!
//! # Example
//!
//! ```
//! use framepick::CancellationToken;
//!
//! let token = CancellationToken::new();
//! let worker_view = token.clone();
//! token.cancel();
//! assert!(worker_view.is_cancelled());
//! ```

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::time::{Duration, Instant};

/// The kind of operation reporting progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum OperationType {
    /// Sampling and scoring frames.
    Analysis,
    /// Rendering frames into an export archive.
    Export,
}

/// A snapshot of progress.
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    /// What kind of work is being performed.
    pub operation: OperationType,
    /// How many items have been processed so far.
    pub current: u64,
    /// Total items expected.
    pub total: u64,
    /// Wall-clock time elapsed since the operation started.
    pub elapsed: Duration,
    /// Estimated time remaining, based on current throughput.
    pub estimated_remaining: Option<Duration>,
    /// The frame number most recently processed.
    pub current_frame: Option<u64>,
}

impl ProgressInfo {
    /// Completion percentage (0.0 – 100.0).
    pub fn percentage(&self) -> f32 {
        if self.total == 0 {
            100.0
        } else {
            (self.current as f32 / self.total as f32) * 100.0
        }
    }
}

/// Trait for receiving progress updates.
///
/// Callbacks run on worker threads, so implementations must be [`Send`] and
/// [`Sync`]. They observe but cannot halt the operation; use
/// [`CancellationToken`] for that.
pub trait ProgressCallback: Send + Sync {
    /// Called after each processed item.
    fn on_progress(&self, info: &ProgressInfo);
}

/// Discards all progress notifications.
pub(crate) struct NoOpProgress;

impl ProgressCallback for NoOpProgress {
    fn on_progress(&self, _info: &ProgressInfo) {}
}

/// Cooperative cancellation token backed by an [`AtomicBool`].
///
/// Clones share state: cancelling any clone cancels them all.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a new, non-cancelled token.
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Check whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Tracks timing for one operation and emits callbacks.
pub(crate) struct ProgressTracker {
    callback: Arc<dyn ProgressCallback>,
    operation: OperationType,
    total: u64,
    current: u64,
    start_time: Instant,
}

impl ProgressTracker {
    pub(crate) fn new(callback: Arc<dyn ProgressCallback>, operation: OperationType, total: u64) -> Self {
        Self {
            callback,
            operation,
            total,
            current: 0,
            start_time: Instant::now(),
        }
    }

    /// Record one completed item and fire the callback.
    pub(crate) fn advance(&mut self, frame_number: Option<u64>) {
        self.current = (self.current + 1).min(self.total);
        let elapsed = self.start_time.elapsed();

        let estimated_remaining = if self.current > 0 {
            let remaining = self.total.saturating_sub(self.current);
            Some(elapsed.mul_f64(remaining as f64 / self.current as f64))
        } else {
            None
        };

        self.callback.on_progress(&ProgressInfo {
            operation: self.operation,
            current: self.current,
            total: self.total,
            elapsed,
            estimated_remaining,
            current_frame: frame_number,
        });
    }
}
