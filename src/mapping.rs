//! Output frame resolution.
//!
//! [`FrameMapper`] turns an output frame number into the
//! [`FrameMapEntry`] that says which source frame to show and from which
//! clip. Cycle data is computed lazily: the first request that lands in a
//! cycle measures the differences of the cycle's source frames, classifies
//! them, and builds the cycle's frame map; every later request for that
//! cycle is a lookup.
//!
//! Each cycle is guarded by its own lock, held for the check-and-refresh
//! step and the lookup, so requests for different cycles never wait on each
//! other. A metric that is not reentrant (or a mapper built with
//! [`SmoothSkipOptions::serialize_metric`]) additionally runs every metric
//! call under one mapper-wide lock. Locks are always taken cycle first, then
//! metric.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use smoothskip::{FrameMapper, PrecomputedDifferences, SmoothSkipOptions};
//!
//! let metric = Arc::new(PrecomputedDifferences::new(vec![0.0, 3.0, 2.0, 5.0]));
//! let options = SmoothSkipOptions::new().with_scene_threshold(100.0);
//! let mapper = FrameMapper::new(&options, 4, metric)?;
//!
//! let inserted = mapper.resolve(3)?;
//! assert_eq!(inserted.src_frame, 3);
//! assert!(inserted.use_alternate);
//! # Ok::<(), smoothskip::SmoothSkipError>(())
//! ```

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::ops::Range;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::{
    configuration::SmoothSkipOptions,
    cycle::{Cycle, FrameClass, FrameDiff, FrameMapEntry},
    cycle_cache::CycleCache,
    difference::DifferenceMetric,
    error::SmoothSkipError,
};

/// Classification of one source frame, as captured by [`FrameMapper::inspect`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleFrame {
    /// Source frame number.
    pub frame: u64,
    /// Difference to the previous source frame.
    pub diff: f64,
    /// How the frame is expanded.
    pub class: FrameClass,
}

/// A copy of the classification state of the cycle owning some output frame.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleSnapshot {
    /// Index of the cycle.
    pub cycle_index: u64,
    /// Every populated source frame of the cycle, in frame order.
    pub frames: Vec<CycleFrame>,
    /// Whether the cycle contains a scene change.
    pub has_scene_change: bool,
}

/// Resolves output frames to source frames, computing cycle data on demand.
///
/// `FrameMapper` is `Send + Sync`; share it between worker threads behind
/// an [`Arc`] or a plain reference.
pub struct FrameMapper {
    cache: CycleCache,
    metric: Arc<dyn DifferenceMetric>,
    metric_guard: Option<Mutex<()>>,
    source_frame_count: u64,
    output_frame_count: u64,
    refreshes: AtomicU64,
}

impl Debug for FrameMapper {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("FrameMapper")
            .field("cycle_length", &self.cache.cycle_length())
            .field("creates", &self.cache.creates())
            .field("cycle_count", &self.cache.cycle_count())
            .field("source_frame_count", &self.source_frame_count)
            .field("output_frame_count", &self.output_frame_count)
            .field("serialized_metric", &self.metric_guard.is_some())
            .finish_non_exhaustive()
    }
}

impl FrameMapper {
    /// Build a mapper for a source of `source_frame_count` frames.
    ///
    /// # Errors
    ///
    /// - Configuration errors from [`SmoothSkipOptions::validate`], and
    ///   [`SmoothSkipError::CycleExceedsSource`] when the source is shorter
    ///   than one cycle.
    /// - [`SmoothSkipError::AllocationFailed`] if cycle storage cannot be
    ///   reserved.
    pub fn new(
        options: &SmoothSkipOptions,
        source_frame_count: u64,
        metric: Arc<dyn DifferenceMetric>,
    ) -> Result<Self, SmoothSkipError> {
        options.validate()?;
        if options.cycle_length as u64 > source_frame_count {
            return Err(SmoothSkipError::CycleExceedsSource {
                cycle_length: options.cycle_length,
                frame_count: source_frame_count,
            });
        }

        let cache = CycleCache::new(
            options.cycle_length,
            options.creates_per_cycle,
            source_frame_count,
            options.scene_threshold,
        )?;

        let metric_guard =
            (options.serialize_metric || !metric.is_reentrant()).then(|| Mutex::new(()));

        Ok(Self {
            cache,
            metric,
            metric_guard,
            source_frame_count,
            output_frame_count: options.output_frame_count(source_frame_count),
            refreshes: AtomicU64::new(0),
        })
    }

    /// Frames in the source clip.
    pub fn source_frame_count(&self) -> u64 {
        self.source_frame_count
    }

    /// Frames in the output clip.
    pub fn output_frame_count(&self) -> u64 {
        self.output_frame_count
    }

    /// The underlying cycle storage.
    pub fn cache(&self) -> &CycleCache {
        &self.cache
    }

    /// How many times a cycle has been (re)populated.
    pub fn refresh_count(&self) -> u64 {
        self.refreshes.load(Ordering::Relaxed)
    }

    /// Resolve `output_frame` to the source frame and clip it is built from.
    ///
    /// # Errors
    ///
    /// - [`SmoothSkipError::FrameOutOfRange`] past the end of the output clip.
    /// - Any error from the difference metric while populating the cycle.
    /// - [`SmoothSkipError::FrameMappingMismatch`] if the cycle's frame map
    ///   disagrees with the requested frame number.
    pub fn resolve(&self, output_frame: u64) -> Result<FrameMapEntry, SmoothSkipError> {
        let offset = self.cycle_offset(output_frame);
        let entry = self.with_cycle(output_frame, |cycle| cycle.entry(offset))?;

        match entry {
            Some(entry) if entry.dst_frame == output_frame => Ok(entry),
            Some(entry) => Err(SmoothSkipError::FrameMappingMismatch {
                requested: output_frame,
                mapped: entry.dst_frame,
            }),
            None => Err(SmoothSkipError::FrameMappingMismatch {
                requested: output_frame,
                mapped: u64::MAX,
            }),
        }
    }

    /// Resolve every output frame in `range`, in order.
    pub fn resolve_range(&self, range: Range<u64>) -> Result<Vec<FrameMapEntry>, SmoothSkipError> {
        let end = range.end.min(self.output_frame_count);
        (range.start..end).map(|frame| self.resolve(frame)).collect()
    }

    /// Snapshot the classification of the cycle owning `output_frame`.
    pub fn inspect(&self, output_frame: u64) -> Result<CycleSnapshot, SmoothSkipError> {
        let cycle_index = self.cache.cycle_index(output_frame);
        self.with_cycle(output_frame, |cycle| CycleSnapshot {
            cycle_index,
            frames: cycle
                .diffs()
                .iter()
                .flatten()
                .map(|&FrameDiff { frame, diff }| CycleFrame {
                    frame,
                    diff,
                    class: cycle.classify(frame),
                })
                .collect(),
            has_scene_change: cycle.has_scene_change(),
        })
    }

    fn cycle_offset(&self, output_frame: u64) -> usize {
        (output_frame % self.cache.output_cycle_length() as u64) as usize
    }

    /// Run `read` on the cycle owning `output_frame`, populating it first if
    /// it does not hold the expected window.
    fn with_cycle<T>(
        &self,
        output_frame: u64,
        read: impl FnOnce(&Cycle) -> T,
    ) -> Result<T, SmoothSkipError> {
        if output_frame >= self.output_frame_count {
            return Err(SmoothSkipError::FrameOutOfRange {
                frame_number: output_frame,
                total_frames: self.output_frame_count,
            });
        }

        let slot = self.cache.cycle_for(output_frame)?;
        let cycle_start = self.cache.cycle_index(output_frame) * self.cache.cycle_length() as u64;

        let mut cycle = slot.lock()?;
        if !cycle.includes(cycle_start) {
            log::debug!(
                "Output frame {output_frame} not in cycle, populating from source frame {cycle_start}"
            );
            if let Err(error) = self.populate(&mut cycle, cycle_start) {
                cycle.reset();
                return Err(error);
            }
            self.refreshes.fetch_add(1, Ordering::Relaxed);
        }

        Ok(read(&cycle))
    }

    fn populate(&self, cycle: &mut Cycle, cycle_start: u64) -> Result<(), SmoothSkipError> {
        cycle.reset();

        let cycle_end = (cycle_start + cycle.length() as u64).min(self.source_frame_count);
        for (slot, frame) in (cycle_start..cycle_end).enumerate() {
            let diff = self.measure(frame)?;
            cycle.set_diff(slot, frame, diff);
        }

        cycle.update_frame_map();
        Ok(())
    }

    fn measure(&self, frame: u64) -> Result<f64, SmoothSkipError> {
        let diff = match &self.metric_guard {
            Some(guard) => {
                let _serialized = guard.lock()?;
                self.metric.difference(frame, -1)?
            }
            None => self.metric.difference(frame, -1)?,
        };

        if !diff.is_finite() || diff < 0.0 {
            return Err(SmoothSkipError::InvalidDifference {
                frame_number: frame,
                value: diff,
            });
        }
        log::trace!("Frame {frame} differs from its predecessor by {diff:.5}");
        Ok(diff)
    }
}
