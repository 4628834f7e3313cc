//! Filter and render configuration.
//!
//! [`SmoothSkipOptions`] carries the options a filter is built with (cycle
//! length, frames created per cycle, alternate clip offset, scene threshold,
//! debug overlay). [`RenderOptions`] threads progress callbacks and
//! cancellation tokens through the rendering loops without polluting every
//! function signature.
//!
//! # Example
//!
//! ```
//! use smoothskip::{CancellationToken, RenderOptions, SmoothSkipOptions};
//!
//! let options = SmoothSkipOptions::new()
//!     .with_cycle_length(5)
//!     .with_creates_per_cycle(1)
//!     .with_scene_threshold(24.0);
//! assert_eq!(options.output_frame_count(25), 30);
//!
//! let token = CancellationToken::new();
//! let render = RenderOptions::new()
//!     .with_cancellation(token.clone())
//!     .with_batch_size(10);
//! ```

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::Arc;

use crate::error::SmoothSkipError;
use crate::progress::{CancellationToken, NoOpProgress, ProgressCallback};

/// Default cycle length.
pub const DEFAULT_CYCLE_LENGTH: usize = 4;
/// Default number of frames created per cycle.
pub const DEFAULT_CREATES_PER_CYCLE: usize = 1;
/// Default scene-change threshold, in mean luma difference units.
pub const DEFAULT_SCENE_THRESHOLD: f64 = 32.0;

/// Options a [`SmoothSkip`](crate::SmoothSkip) filter is built with.
///
/// All options are fixed for the lifetime of the filter.
#[derive(Debug, Clone, PartialEq)]
pub struct SmoothSkipOptions {
    /// Source frames per cycle (L). Must be at least 1 and no larger than
    /// either clip.
    pub cycle_length: usize,
    /// Frames inserted into every cycle (C), `1..=cycle_length`.
    pub creates_per_cycle: usize,
    /// Added to the source frame number when reading the alternate clip.
    pub alternate_offset: i64,
    /// A cycle's largest difference must exceed this to count as a scene
    /// change.
    pub scene_threshold: f64,
    /// Attach a diagnostic overlay to every rendered frame.
    pub debug: bool,
    /// Serialize every difference-metric call behind one lock, even when the
    /// metric claims to be reentrant.
    pub serialize_metric: bool,
}

impl Default for SmoothSkipOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl SmoothSkipOptions {
    /// Create options with default settings.
    ///
    /// Defaults: cycle 4, create 1, offset 0, scene threshold 32.0, no debug
    /// overlay, reentrant metric calls.
    pub fn new() -> Self {
        Self {
            cycle_length: DEFAULT_CYCLE_LENGTH,
            creates_per_cycle: DEFAULT_CREATES_PER_CYCLE,
            alternate_offset: 0,
            scene_threshold: DEFAULT_SCENE_THRESHOLD,
            debug: false,
            serialize_metric: false,
        }
    }

    /// Set the cycle length (source frames per cycle).
    #[must_use]
    pub fn with_cycle_length(mut self, cycle_length: usize) -> Self {
        self.cycle_length = cycle_length;
        self
    }

    /// Set the number of frames created per cycle.
    #[must_use]
    pub fn with_creates_per_cycle(mut self, creates: usize) -> Self {
        self.creates_per_cycle = creates;
        self
    }

    /// Set the offset applied to frame numbers of the alternate clip.
    #[must_use]
    pub fn with_alternate_offset(mut self, offset: i64) -> Self {
        self.alternate_offset = offset;
        self
    }

    /// Set the scene-change threshold.
    #[must_use]
    pub fn with_scene_threshold(mut self, threshold: f64) -> Self {
        self.scene_threshold = threshold;
        self
    }

    /// Enable or disable the debug overlay.
    #[must_use]
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Force difference-metric calls to run one at a time.
    #[must_use]
    pub fn with_serialized_metric(mut self, serialize: bool) -> Self {
        self.serialize_metric = serialize;
        self
    }

    /// Output frames per full cycle (`L + C`).
    pub fn output_cycle_length(&self) -> usize {
        self.cycle_length + self.creates_per_cycle
    }

    /// Length of the output clip for a source of `source_frame_count` frames.
    ///
    /// Every full cycle gains C frames; a trailing partial cycle of `r`
    /// frames gains `min(r, C)`.
    pub fn output_frame_count(&self, source_frame_count: u64) -> u64 {
        let length = self.cycle_length.max(1) as u64;
        let creates = self.creates_per_cycle as u64;
        source_frame_count
            + (source_frame_count / length) * creates
            + (source_frame_count % length).min(creates)
    }

    /// Check the options that do not depend on any clip.
    ///
    /// # Errors
    ///
    /// - [`SmoothSkipError::InvalidCycleLength`] when the cycle is empty.
    /// - [`SmoothSkipError::InvalidCreatesPerCycle`] when C is outside `1..=L`.
    /// - [`SmoothSkipError::InvalidSceneThreshold`] when the threshold is
    ///   negative or NaN.
    pub fn validate(&self) -> Result<(), SmoothSkipError> {
        if self.cycle_length < 1 {
            return Err(SmoothSkipError::InvalidCycleLength(self.cycle_length));
        }
        if self.creates_per_cycle < 1 || self.creates_per_cycle > self.cycle_length {
            return Err(SmoothSkipError::InvalidCreatesPerCycle {
                creates: self.creates_per_cycle,
                cycle_length: self.cycle_length,
            });
        }
        if self.scene_threshold.is_nan() || self.scene_threshold < 0.0 {
            return Err(SmoothSkipError::InvalidSceneThreshold(self.scene_threshold));
        }
        Ok(())
    }

    /// Check the options against the lengths of both clips.
    ///
    /// # Errors
    ///
    /// Everything [`validate`](SmoothSkipOptions::validate) reports, plus
    /// [`SmoothSkipError::CycleExceedsSource`] and
    /// [`SmoothSkipError::CycleExceedsAlternate`].
    pub fn validate_for(
        &self,
        source_frame_count: u64,
        alternate_frame_count: u64,
    ) -> Result<(), SmoothSkipError> {
        self.validate()?;
        if self.cycle_length as u64 > source_frame_count {
            return Err(SmoothSkipError::CycleExceedsSource {
                cycle_length: self.cycle_length,
                frame_count: source_frame_count,
            });
        }
        if self.cycle_length as u64 > alternate_frame_count {
            return Err(SmoothSkipError::CycleExceedsAlternate {
                cycle_length: self.cycle_length,
                frame_count: alternate_frame_count,
            });
        }
        Ok(())
    }
}

/// Configuration for rendering loops.
///
/// Carries optional progress and cancellation settings for
/// [`SmoothSkip::for_each_frame`](crate::SmoothSkip::for_each_frame) and
/// [`SmoothSkip::plan`](crate::SmoothSkip::plan). A default-constructed value
/// reports nothing and never cancels.
#[derive(Clone)]
pub struct RenderOptions {
    /// Progress callback. Defaults to a no-op.
    pub(crate) progress: Arc<dyn ProgressCallback>,
    /// Cancellation token. `None` means never cancelled.
    pub(crate) cancellation: Option<CancellationToken>,
    /// How often to fire the progress callback (every N frames).
    pub(crate) batch_size: u64,
}

impl Debug for RenderOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("RenderOptions")
            .field("has_progress", &true)
            .field("has_cancellation", &self.cancellation.is_some())
            .field("batch_size", &self.batch_size)
            .finish()
    }
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderOptions {
    /// Create a configuration with no progress callback, no cancellation and
    /// batch size 1.
    pub fn new() -> Self {
        Self {
            progress: Arc::new(NoOpProgress),
            cancellation: None,
            batch_size: 1,
        }
    }

    /// Attach a progress callback.
    #[must_use]
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = callback;
        self
    }

    /// Attach a cancellation token.
    ///
    /// When the token is cancelled the loop stops before the next frame and
    /// returns [`SmoothSkipError::Cancelled`].
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Set how often the progress callback fires. Clamped to at least 1.
    #[must_use]
    pub fn with_batch_size(mut self, size: u64) -> Self {
        self.batch_size = size.max(1);
        self
    }

    /// Returns `true` if cancellation has been requested.
    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(|token| token.is_cancelled())
    }
}
