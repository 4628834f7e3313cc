//! Observing and stopping long frame loops.
//!
//! [`SmoothSkip::for_each_frame`](crate::SmoothSkip::for_each_frame),
//! [`SmoothSkip::plan`](crate::SmoothSkip::plan) and the parallel renderer
//! report how far they got through a [`ProgressCallback`] and stop early
//! when a [`CancellationToken`] fires. Both are attached with
//! [`RenderOptions`](crate::RenderOptions).
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use smoothskip::{ProgressCallback, ProgressInfo, RenderOptions};
//!
//! struct Percent;
//!
//! impl ProgressCallback for Percent {
//!     fn on_progress(&self, info: &ProgressInfo) {
//!         if let Some(pct) = info.percentage {
//!             eprintln!("{:?}: {pct:.0}%", info.operation);
//!         }
//!     }
//! }
//!
//! let options = RenderOptions::new()
//!     .with_progress(Arc::new(Percent))
//!     .with_batch_size(24);
//! ```

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::time::{Duration, Instant};

/// Which loop produced a [`ProgressInfo`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum OperationType {
    /// Output frames are being resolved to frame map entries only.
    Planning,
    /// Output frames are being resolved and their pixels fetched.
    Rendering,
}

/// Where a frame loop stands.
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    /// The loop that sent this report.
    pub operation: OperationType,
    /// Output frames finished so far.
    pub current: u64,
    /// Output frames the loop will visit, when known up front.
    pub total: Option<u64>,
    /// `current / total` as a percentage.
    pub percentage: Option<f32>,
    /// Time since the loop started.
    pub elapsed: Duration,
    /// Linear extrapolation of the time left.
    pub estimated_remaining: Option<Duration>,
    /// Output frame that triggered the report. `None` on the closing report.
    pub current_frame: Option<u64>,
}

/// Receives [`ProgressInfo`] reports.
///
/// The parallel renderer calls this from rayon workers, hence `Send + Sync`.
/// A callback cannot stop the loop; cancel a [`CancellationToken`] instead.
pub trait ProgressCallback: Send + Sync {
    /// Handle one report.
    fn on_progress(&self, info: &ProgressInfo);
}

pub(crate) struct NoOpProgress;

impl ProgressCallback for NoOpProgress {
    fn on_progress(&self, _info: &ProgressInfo) {}
}

/// A shared stop flag for frame loops.
///
/// Clones observe the same flag. Loops check it before each output frame and
/// return [`SmoothSkipError::Cancelled`](crate::SmoothSkipError::Cancelled)
/// once it is set; frames already handed out stay valid.
///
/// ```
/// use smoothskip::CancellationToken;
///
/// let token = CancellationToken::new();
/// let worker = token.clone();
/// token.cancel();
/// assert!(worker.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// A token that has not been cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the flag. There is no way to clear it again.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Whether [`cancel`](CancellationToken::cancel) was called on any clone.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Counts finished frames and forwards a report every `batch_size` of them.
pub(crate) struct ProgressTracker {
    callback: Arc<dyn ProgressCallback>,
    operation: OperationType,
    total: Option<u64>,
    batch_size: u64,
    started: Instant,
    done: u64,
}

impl ProgressTracker {
    pub(crate) fn new(
        callback: Arc<dyn ProgressCallback>,
        operation: OperationType,
        total: Option<u64>,
        batch_size: u64,
    ) -> Self {
        Self {
            callback,
            operation,
            total,
            batch_size: batch_size.max(1),
            started: Instant::now(),
            done: 0,
        }
    }

    pub(crate) fn advance(&mut self, output_frame: u64) {
        self.done += 1;
        if self.done % self.batch_size == 0 {
            self.emit(Some(output_frame));
        }
    }

    /// Closing report, sent whether or not the last batch was full.
    pub(crate) fn finish(&mut self) {
        self.emit(None);
    }

    fn emit(&self, current_frame: Option<u64>) {
        let elapsed = self.started.elapsed();
        let known_total = self.total.filter(|&total| total > 0);

        let percentage = known_total.map(|total| self.done as f32 * 100.0 / total as f32);
        let estimated_remaining = known_total.filter(|_| self.done > 0).map(|total| {
            let left = total.saturating_sub(self.done);
            elapsed.mul_f64(left as f64 / self.done as f64)
        });

        self.callback.on_progress(&ProgressInfo {
            operation: self.operation,
            current: self.done,
            total: self.total,
            percentage,
            elapsed,
            estimated_remaining,
            current_frame,
        });
    }
}
