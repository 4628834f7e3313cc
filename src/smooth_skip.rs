//! The frame-rate smoothing filter.
//!
//! [`SmoothSkip`] ties two clips and a difference metric to a
//! [`FrameMapper`]. The *primary* clip supplies pass-through and duplicated
//! frames; the *alternate* clip supplies the frames inserted at bad-frame
//! positions. Both must have the same dimensions.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use image::{DynamicImage, GrayImage, Luma};
//! use smoothskip::{FrameRate, MemorySource, SmoothSkip, SmoothSkipOptions};
//!
//! let frames: Vec<DynamicImage> = [0u8, 10, 20, 60, 62, 64, 66, 90]
//!     .iter()
//!     .map(|&v| DynamicImage::ImageLuma8(GrayImage::from_pixel(4, 4, Luma([v]))))
//!     .collect();
//! let source = Arc::new(MemorySource::new(frames, FrameRate::new(24, 1)));
//!
//! let filter = SmoothSkip::new(source.clone(), source, SmoothSkipOptions::new())?;
//! let info = filter.output_info();
//! assert_eq!(info.frame_count, 10);
//! assert_eq!(info.frame_rate, FrameRate::new(30, 1));
//!
//! let frame = filter.frame(0)?;
//! assert_eq!(frame.entry.src_frame, 0);
//! # Ok::<(), smoothskip::SmoothSkipError>(())
//! ```

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::ops::Range;
use std::sync::Arc;

use image::DynamicImage;

use crate::{
    configuration::{RenderOptions, SmoothSkipOptions},
    cycle::FrameMapEntry,
    difference::{DifferenceMetric, LumaDifference},
    error::SmoothSkipError,
    frame_rate::FrameRate,
    mapping::FrameMapper,
    overlay::DebugOverlay,
    progress::{OperationType, ProgressTracker},
    source::FrameSource,
};

/// Shape of the output clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputInfo {
    /// Frames in the output clip.
    pub frame_count: u64,
    /// Frame rate of the output clip: the source rate scaled by `(L + C) / L`.
    pub frame_rate: FrameRate,
    /// Frames in the primary clip.
    pub source_frame_count: u64,
    /// Frame width and height in pixels.
    pub dimensions: (u32, u32),
}

/// Which clip, and which frame of it, an output frame is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceSelection {
    /// `true` for the alternate clip.
    pub use_alternate: bool,
    /// Frame index within the selected clip.
    pub index: u64,
}

/// A rendered output frame.
#[derive(Debug, Clone)]
pub struct OutputFrame {
    /// Output frame number.
    pub frame_number: u64,
    /// The frame map entry the frame was resolved to.
    pub entry: FrameMapEntry,
    /// Where the pixels came from.
    pub selection: SourceSelection,
    /// Frame pixels, unchanged from the selected clip.
    pub image: DynamicImage,
    /// Diagnostics, present when the filter was built with `debug` enabled.
    pub overlay: Option<DebugOverlay>,
}

/// Inserts frames into every cycle of a clip to raise its frame rate.
///
/// `SmoothSkip` is `Send + Sync`; frames may be requested from any number of
/// threads, in any order.
pub struct SmoothSkip {
    primary: Arc<dyn FrameSource>,
    alternate: Arc<dyn FrameSource>,
    options: SmoothSkipOptions,
    mapper: FrameMapper,
    info: OutputInfo,
}

impl Debug for SmoothSkip {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("SmoothSkip")
            .field("options", &self.options)
            .field("info", &self.info)
            .field("alternate_frame_count", &self.alternate.frame_count())
            .finish_non_exhaustive()
    }
}

impl SmoothSkip {
    /// Build a filter that ranks frames by the mean luma difference of the
    /// primary clip.
    ///
    /// # Errors
    ///
    /// See [`with_metric`](SmoothSkip::with_metric).
    pub fn new(
        primary: Arc<dyn FrameSource>,
        alternate: Arc<dyn FrameSource>,
        options: SmoothSkipOptions,
    ) -> Result<Self, SmoothSkipError> {
        let metric = Arc::new(LumaDifference::new(Arc::clone(&primary)));
        Self::with_metric(primary, alternate, options, metric)
    }

    /// Build a filter with a custom difference metric.
    ///
    /// # Errors
    ///
    /// - Any option error from [`SmoothSkipOptions::validate_for`].
    /// - [`SmoothSkipError::IncompatibleSources`] if the clips differ in size.
    /// - [`SmoothSkipError::AllocationFailed`] if cycle storage cannot be
    ///   reserved.
    pub fn with_metric(
        primary: Arc<dyn FrameSource>,
        alternate: Arc<dyn FrameSource>,
        options: SmoothSkipOptions,
        metric: Arc<dyn DifferenceMetric>,
    ) -> Result<Self, SmoothSkipError> {
        let source_frame_count = primary.frame_count();
        options.validate_for(source_frame_count, alternate.frame_count())?;

        let dimensions = primary.dimensions();
        if dimensions != alternate.dimensions() {
            let (alternate_width, alternate_height) = alternate.dimensions();
            return Err(SmoothSkipError::IncompatibleSources(format!(
                "primary clip is {}x{} but alternate clip is {alternate_width}x{alternate_height}",
                dimensions.0, dimensions.1
            )));
        }

        let source_rate = primary.frame_rate();
        if source_rate != alternate.frame_rate() {
            log::warn!(
                "Primary clip runs at {source_rate} fps but alternate clip at {} fps; using the primary rate",
                alternate.frame_rate()
            );
        }

        let mapper = FrameMapper::new(&options, source_frame_count, metric)?;
        let info = OutputInfo {
            frame_count: mapper.output_frame_count(),
            frame_rate: source_rate.scaled(
                options.output_cycle_length() as u64,
                options.cycle_length as u64,
            ),
            source_frame_count,
            dimensions,
        };

        log::debug!(
            "Built filter: cycle {}, create {}, {} -> {} frames at {} fps",
            options.cycle_length,
            options.creates_per_cycle,
            source_frame_count,
            info.frame_count,
            info.frame_rate
        );

        Ok(Self {
            primary,
            alternate,
            options,
            mapper,
            info,
        })
    }

    /// The options the filter was built with.
    pub fn options(&self) -> &SmoothSkipOptions {
        &self.options
    }

    /// Length, rate and size of the output clip.
    pub fn output_info(&self) -> OutputInfo {
        self.info
    }

    /// The frame mapper driving the filter.
    pub fn mapper(&self) -> &FrameMapper {
        &self.mapper
    }

    /// Resolve an output frame without fetching pixels.
    pub fn resolve(&self, output_frame: u64) -> Result<FrameMapEntry, SmoothSkipError> {
        self.mapper.resolve(output_frame)
    }

    /// Pick the clip and frame index for `entry`.
    ///
    /// Alternate indices are shifted by the configured offset and clamped
    /// into the alternate clip.
    pub fn select(&self, entry: &FrameMapEntry) -> SourceSelection {
        if !entry.use_alternate {
            return SourceSelection {
                use_alternate: false,
                index: entry.src_frame,
            };
        }

        let last = self.alternate.frame_count().saturating_sub(1);
        // Saturating add floors negative indices at frame 0.
        let index = entry
            .src_frame
            .saturating_add_signed(self.options.alternate_offset)
            .min(last);
        SourceSelection {
            use_alternate: true,
            index,
        }
    }

    /// Render output frame `output_frame`.
    ///
    /// # Errors
    ///
    /// Any error from [`resolve`](SmoothSkip::resolve) or from the selected
    /// frame source.
    pub fn frame(&self, output_frame: u64) -> Result<OutputFrame, SmoothSkipError> {
        let entry = self.mapper.resolve(output_frame)?;
        let selection = self.select(&entry);
        let source = if selection.use_alternate {
            &self.alternate
        } else {
            &self.primary
        };
        let image = source.frame(selection.index)?;

        let overlay = if self.options.debug {
            let overlay = self.overlay(output_frame, &entry, &selection)?;
            for line in overlay.lines() {
                log::debug!("[{output_frame}] {line}");
            }
            Some(overlay)
        } else {
            None
        };

        Ok(OutputFrame {
            frame_number: output_frame,
            entry,
            selection,
            image,
            overlay,
        })
    }

    /// Render every output frame in `range`, handing each to `callback`.
    ///
    /// The range is clipped to the output clip. Processing stops at the
    /// first error from rendering or from the callback.
    ///
    /// # Errors
    ///
    /// [`SmoothSkipError::Cancelled`] if the token in `options` is
    /// cancelled, otherwise the first rendering or callback error.
    pub fn for_each_frame<F>(
        &self,
        range: Range<u64>,
        options: &RenderOptions,
        mut callback: F,
    ) -> Result<(), SmoothSkipError>
    where
        F: FnMut(u64, OutputFrame) -> Result<(), SmoothSkipError>,
    {
        let range = self.clip_range(range);
        let mut tracker = ProgressTracker::new(
            Arc::clone(&options.progress),
            OperationType::Rendering,
            Some(range.end - range.start),
            options.batch_size,
        );

        for output_frame in range {
            if options.is_cancelled() {
                return Err(SmoothSkipError::Cancelled);
            }
            let frame = self.frame(output_frame)?;
            callback(output_frame, frame)?;
            tracker.advance(output_frame);
        }

        tracker.finish();
        Ok(())
    }

    /// Resolve every output frame without fetching pixels.
    ///
    /// # Errors
    ///
    /// [`SmoothSkipError::Cancelled`] or the first resolution error.
    pub fn plan(&self, options: &RenderOptions) -> Result<Vec<FrameMapEntry>, SmoothSkipError> {
        let total = self.info.frame_count;
        let mut tracker = ProgressTracker::new(
            Arc::clone(&options.progress),
            OperationType::Planning,
            Some(total),
            options.batch_size,
        );

        let mut entries = Vec::with_capacity(usize::try_from(total).unwrap_or(0));
        for output_frame in 0..total {
            if options.is_cancelled() {
                return Err(SmoothSkipError::Cancelled);
            }
            entries.push(self.mapper.resolve(output_frame)?);
            tracker.advance(output_frame);
        }

        tracker.finish();
        Ok(entries)
    }

    pub(crate) fn clip_range(&self, range: Range<u64>) -> Range<u64> {
        let end = range.end.min(self.info.frame_count);
        range.start.min(end)..end
    }

    fn overlay(
        &self,
        output_frame: u64,
        entry: &FrameMapEntry,
        selection: &SourceSelection,
    ) -> Result<DebugOverlay, SmoothSkipError> {
        let snapshot = self.mapper.inspect(output_frame)?;
        Ok(DebugOverlay {
            output_frame,
            source_frame: entry.src_frame,
            selected_index: selection.index,
            use_alternate: selection.use_alternate,
            output_rate: self.info.frame_rate,
            source_rate: self.primary.frame_rate(),
            scene_threshold: self.options.scene_threshold,
            cycle: snapshot.frames,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use image::{DynamicImage, GrayImage, Luma};

    use super::{SmoothSkip, SourceSelection};
    use crate::{
        configuration::SmoothSkipOptions, cycle::FrameMapEntry, difference::PrecomputedDifferences,
        error::SmoothSkipError, frame_rate::FrameRate, source::MemorySource,
    };

    fn clip(count: usize, width: u32, rate: FrameRate) -> Arc<MemorySource> {
        let frames = (0..count)
            .map(|n| DynamicImage::ImageLuma8(GrayImage::from_pixel(width, 2, Luma([n as u8]))))
            .collect();
        Arc::new(MemorySource::new(frames, rate))
    }

    fn alternate(src_frame: u64) -> FrameMapEntry {
        FrameMapEntry {
            dst_frame: 0,
            src_frame,
            use_alternate: true,
        }
    }

    #[test]
    fn alternate_offset_is_clamped() {
        let rate = FrameRate::new(24, 1);
        let build = |offset| {
            SmoothSkip::new(
                clip(8, 2, rate),
                clip(6, 2, rate),
                SmoothSkipOptions::new().with_alternate_offset(offset),
            )
            .unwrap()
        };

        let forward = build(3);
        assert_eq!(forward.select(&alternate(1)).index, 4);
        assert_eq!(forward.select(&alternate(4)).index, 5);

        let backward = build(-2);
        assert_eq!(backward.select(&alternate(1)).index, 0);
        assert_eq!(backward.select(&alternate(5)).index, 3);

        let primary = FrameMapEntry {
            dst_frame: 0,
            src_frame: 7,
            use_alternate: false,
        };
        assert_eq!(
            backward.select(&primary),
            SourceSelection {
                use_alternate: false,
                index: 7
            }
        );
    }

    #[test]
    fn mismatched_dimensions_are_rejected() {
        let rate = FrameRate::new(24, 1);
        assert!(matches!(
            SmoothSkip::new(clip(8, 2, rate), clip(8, 4, rate), SmoothSkipOptions::new()),
            Err(SmoothSkipError::IncompatibleSources(_))
        ));
    }

    #[test]
    fn short_alternate_is_rejected() {
        let rate = FrameRate::new(24, 1);
        assert!(matches!(
            SmoothSkip::new(clip(8, 2, rate), clip(3, 2, rate), SmoothSkipOptions::new()),
            Err(SmoothSkipError::CycleExceedsAlternate { .. })
        ));
    }

    #[test]
    fn output_rate_follows_primary() {
        let filter = SmoothSkip::new(
            clip(10, 2, FrameRate::new(24000, 1001)),
            clip(10, 2, FrameRate::new(30, 1)),
            SmoothSkipOptions::new(),
        )
        .unwrap();
        let info = filter.output_info();
        assert_eq!(info.frame_rate, FrameRate::new(30000, 1001));
        assert_eq!(info.frame_count, 13);
        assert_eq!(info.dimensions, (2, 2));
    }

    #[test]
    fn bad_frames_read_the_alternate_clip() {
        let rate = FrameRate::new(24, 1);
        let filter = SmoothSkip::with_metric(
            clip(4, 2, rate),
            clip(4, 2, rate),
            SmoothSkipOptions::new().with_scene_threshold(100.0),
            Arc::new(PrecomputedDifferences::new(vec![0.0, 3.0, 2.0, 5.0])),
        )
        .unwrap();

        let inserted = filter.frame(3).unwrap();
        assert!(inserted.selection.use_alternate);
        assert_eq!(inserted.selection.index, 3);
        assert_eq!(inserted.image.to_luma8().get_pixel(0, 0)[0], 3);
        assert!(inserted.overlay.is_none());
        assert!(!filter.frame(4).unwrap().selection.use_alternate);
    }
}
