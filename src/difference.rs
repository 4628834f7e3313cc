//! Frame dissimilarity metrics.
//!
//! The cycle engine ranks every source frame by how much it differs from its
//! predecessor. [`DifferenceMetric`] is that measurement; [`LumaDifference`]
//! computes it from pixels (mean absolute difference over the luma plane),
//! and [`PrecomputedDifferences`] replays values measured elsewhere.
//!
//! # Example
//!
//! ```
//! use image::{DynamicImage, GrayImage, Luma};
//! use smoothskip::{DifferenceMetric, FrameRate, LumaDifference, MemorySource};
//! use std::sync::Arc;
//!
//! let frames = [0u8, 0, 40]
//!     .map(|v| DynamicImage::ImageLuma8(GrayImage::from_pixel(8, 8, Luma([v]))))
//!     .to_vec();
//! let source = Arc::new(MemorySource::new(frames, FrameRate::new(24, 1)));
//! let metric = LumaDifference::new(source);
//!
//! assert_eq!(metric.difference(0, -1)?, 0.0);
//! assert_eq!(metric.difference(1, -1)?, 0.0);
//! assert_eq!(metric.difference(2, -1)?, 40.0);
//! # Ok::<(), smoothskip::SmoothSkipError>(())
//! ```

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::Arc;

use image::DynamicImage;

use crate::{error::SmoothSkipError, source::FrameSource};

/// Measures how different a frame is from a frame at a relative offset.
///
/// The contract: deterministic for a fixed pair of frames, never negative,
/// larger for more visible change. Metrics are expensive; the frame mapper
/// calls each one at most once per frame per cycle population.
pub trait DifferenceMetric: Send + Sync {
    /// Difference between `frame_number` and `frame_number + reference_offset`.
    ///
    /// The mapper always asks for `reference_offset = -1`. Frame 0 has no
    /// predecessor and is expected to yield 0.
    fn difference(&self, frame_number: u64, reference_offset: i64) -> Result<f64, SmoothSkipError>;

    /// Whether concurrent calls are safe.
    ///
    /// Metrics that return `false` are serialized behind a single lock shared
    /// by every cycle of the mapper.
    fn is_reentrant(&self) -> bool {
        true
    }
}

/// Mean absolute difference of the luma plane of two frames of a source.
///
/// Both frame numbers are clamped into the clip, so the first frame compared
/// with its predecessor compares with itself. 8-bit frames are compared in
/// 8-bit units, 16-bit frames in 16-bit units, float frames in `0.0..=1.0`.
///
/// Luma is derived by `image`'s grayscale conversion, which weights channels
/// with the Rec. 709 coefficients (0.2126, 0.7152, 0.0722).
pub struct LumaDifference {
    source: Arc<dyn FrameSource>,
}

impl Debug for LumaDifference {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("LumaDifference")
            .field("frame_count", &self.source.frame_count())
            .finish_non_exhaustive()
    }
}

impl LumaDifference {
    /// Measure differences over `source`.
    pub fn new(source: Arc<dyn FrameSource>) -> Self {
        Self { source }
    }
}

impl DifferenceMetric for LumaDifference {
    fn difference(&self, frame_number: u64, reference_offset: i64) -> Result<f64, SmoothSkipError> {
        let frame_count = self.source.frame_count();
        if frame_count == 0 {
            return Err(SmoothSkipError::EmptySource("difference metric source".to_string()));
        }
        let last = frame_count - 1;

        let current = frame_number.min(last);
        let reference = current.saturating_add_signed(reference_offset).min(last);
        if current == reference {
            return Ok(0.0);
        }

        log::trace!("Measuring luma difference between frames {current} and {reference}");
        let current_frame = self.source.frame(current)?;
        let reference_frame = self.source.frame(reference)?;
        mean_absolute_luma_difference(&current_frame, &reference_frame)
    }
}

/// Mean absolute difference between the luma planes of two images.
///
/// The result is in the sample range of the inputs: `0..=255` for 8-bit
/// frames, `0..=65535` for 16-bit frames and `0.0..=1.0` for float frames.
///
/// # Errors
///
/// Returns [`SmoothSkipError::IncompatibleSources`] if the images differ in
/// size.
pub fn mean_absolute_luma_difference(
    a: &DynamicImage,
    b: &DynamicImage,
) -> Result<f64, SmoothSkipError> {
    if a.width() != b.width() || a.height() != b.height() {
        return Err(SmoothSkipError::IncompatibleSources(format!(
            "cannot compare {}x{} frame with {}x{} frame",
            a.width(),
            a.height(),
            b.width(),
            b.height()
        )));
    }

    let pixels = f64::from(a.width()) * f64::from(a.height());
    if pixels == 0.0 {
        return Ok(0.0);
    }

    let sum = match (a, b) {
        (DynamicImage::ImageRgb32F(_) | DynamicImage::ImageRgba32F(_), _)
        | (_, DynamicImage::ImageRgb32F(_) | DynamicImage::ImageRgba32F(_)) => {
            let a = a.to_luma32f();
            let b = b.to_luma32f();
            a.as_raw()
                .iter()
                .zip(b.as_raw())
                .map(|(&x, &y)| f64::from((x - y).abs()))
                .sum::<f64>()
        }
        _ if is_high_depth(a) || is_high_depth(b) => {
            sum_absolute_difference(a.to_luma16().as_raw(), b.to_luma16().as_raw()) as f64
        }
        _ => sum_absolute_difference(a.to_luma8().as_raw(), b.to_luma8().as_raw()) as f64,
    };

    Ok(sum / pixels)
}

fn is_high_depth(image: &DynamicImage) -> bool {
    matches!(
        image,
        DynamicImage::ImageLuma16(_)
            | DynamicImage::ImageLumaA16(_)
            | DynamicImage::ImageRgb16(_)
            | DynamicImage::ImageRgba16(_)
    )
}

fn sum_absolute_difference<T>(a: &[T], b: &[T]) -> u64
where
    T: Copy + Into<u64>,
{
    a.iter()
        .zip(b)
        .map(|(&x, &y)| {
            let (x, y): (u64, u64) = (x.into(), y.into());
            x.abs_diff(y)
        })
        .sum()
}

/// Differences measured ahead of time, one per source frame.
///
/// `values[n]` is the difference of frame `n` to frame `n - 1`. Only
/// reference offsets `-1` and `0` are meaningful.
#[derive(Debug, Clone, PartialEq)]
pub struct PrecomputedDifferences {
    values: Vec<f64>,
}

impl PrecomputedDifferences {
    /// Replay `values`.
    pub fn new(values: Vec<f64>) -> Self {
        Self { values }
    }

    /// Parse whitespace-, comma- or newline-separated numbers.
    ///
    /// Lines starting with `#` are skipped.
    pub fn parse(text: &str) -> Result<Self, SmoothSkipError> {
        let mut values = Vec::new();
        for line in text.lines().map(str::trim) {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            for token in line
                .split(|c: char| c == ',' || c.is_whitespace())
                .filter(|token| !token.is_empty())
            {
                let value = token.parse::<f64>().map_err(|error| {
                    SmoothSkipError::FrameSourceError(format!(
                        "invalid difference {token:?}: {error}"
                    ))
                })?;
                values.push(value);
            }
        }
        Ok(Self { values })
    }

    /// Number of frames covered.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if no values were supplied.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl DifferenceMetric for PrecomputedDifferences {
    fn difference(&self, frame_number: u64, reference_offset: i64) -> Result<f64, SmoothSkipError> {
        if reference_offset == 0 {
            return Ok(0.0);
        }
        if reference_offset != -1 {
            return Err(SmoothSkipError::UnsupportedReferenceOffset(reference_offset));
        }

        usize::try_from(frame_number)
            .ok()
            .and_then(|index| self.values.get(index))
            .copied()
            .ok_or(SmoothSkipError::FrameOutOfRange {
                frame_number,
                total_frames: self.values.len() as u64,
            })
    }
}
