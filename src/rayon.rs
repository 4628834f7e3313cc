//! Parallel rendering.
//!
//! [`SmoothSkip::frames_parallel`] distributes output frames across the
//! rayon thread pool. Cycles are independent, so workers only contend when
//! two of them land in the same cycle while it is being populated.

use std::ops::Range;
use std::sync::{Arc, Mutex};

use ::rayon::iter::{IntoParallelIterator, ParallelIterator};

use crate::{
    configuration::RenderOptions,
    error::SmoothSkipError,
    progress::{OperationType, ProgressTracker},
    smooth_skip::{OutputFrame, SmoothSkip},
};

impl SmoothSkip {
    /// Render every output frame in `range` on the rayon thread pool.
    ///
    /// The range is clipped to the output clip. Frames are returned in output
    /// order regardless of the order in which workers finish them.
    ///
    /// # Errors
    ///
    /// [`SmoothSkipError::Cancelled`] if the token in `options` is cancelled,
    /// otherwise the first rendering error encountered.
    pub fn frames_parallel(
        &self,
        range: Range<u64>,
        options: &RenderOptions,
    ) -> Result<Vec<OutputFrame>, SmoothSkipError> {
        let range = self.clip_range(range);
        let tracker = Mutex::new(ProgressTracker::new(
            Arc::clone(&options.progress),
            OperationType::Rendering,
            Some(range.end - range.start),
            options.batch_size,
        ));

        log::debug!("Rendering output frames {range:?} in parallel");
        let frames = range
            .into_par_iter()
            .map(|output_frame| {
                if options.is_cancelled() {
                    return Err(SmoothSkipError::Cancelled);
                }
                let frame = self.frame(output_frame)?;
                tracker.lock()?.advance(output_frame);
                Ok(frame)
            })
            .collect::<Result<Vec<_>, _>>()?;

        tracker.lock()?.finish();
        Ok(frames)
    }
}
