//! Error types for the `smoothskip` crate.
//!
//! This module defines [`SmoothSkipError`], the unified error type returned by
//! all fallible operations in the crate. Configuration problems are reported
//! when a [`SmoothSkip`](crate::SmoothSkip) is constructed; everything else is
//! reported per frame request.

use std::io::Error as IoError;

use image::ImageError;
use thiserror::Error;

/// The unified error type for all `smoothskip` operations.
///
/// None of these conditions are transient, so nothing in the crate retries.
/// Configuration errors mean the filter was never built; the internal errors
/// ([`FrameMappingMismatch`](SmoothSkipError::FrameMappingMismatch),
/// [`CycleOutOfRange`](SmoothSkipError::CycleOutOfRange)) indicate a defect in
/// the frame accounting itself.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SmoothSkipError {
    /// The cycle length is zero.
    #[error("Cycle must be > 0 (got {0})")]
    InvalidCycleLength(usize),

    /// The number of frames created per cycle is outside `1..=cycle_length`.
    #[error(
        "Create must be between 1 and the value of cycle (1 <= create <= {cycle_length}, got {creates})"
    )]
    InvalidCreatesPerCycle {
        /// Requested frames to create per cycle.
        creates: usize,
        /// Configured cycle length.
        cycle_length: usize,
    },

    /// The cycle is longer than the primary clip.
    #[error("Cycle ({cycle_length}) can't be larger than the frames in source clip ({frame_count})")]
    CycleExceedsSource {
        /// Configured cycle length.
        cycle_length: usize,
        /// Frames in the primary clip.
        frame_count: u64,
    },

    /// The cycle is longer than the alternate clip.
    #[error(
        "Cycle ({cycle_length}) can't be larger than the frames in alternate clip ({frame_count})"
    )]
    CycleExceedsAlternate {
        /// Configured cycle length.
        cycle_length: usize,
        /// Frames in the alternate clip.
        frame_count: u64,
    },

    /// The scene-change threshold is negative or not a number.
    #[error("Scene threshold must be >= 0.0 (got {0})")]
    InvalidSceneThreshold(f64),

    /// The primary and alternate clips cannot be combined.
    #[error("Incompatible sources: {0}")]
    IncompatibleSources(String),

    /// A frame source has no frames.
    #[error("Frame source has no frames: {0}")]
    EmptySource(String),

    /// Cycle storage could not be allocated.
    #[error("Failed to allocate cycle memory for {cycle_count} cycles")]
    AllocationFailed {
        /// Number of cycles that were requested.
        cycle_count: usize,
    },

    /// An output frame maps to a cycle the cache does not hold.
    #[error("Cycle {cycle_index} is out of range (cache holds {cycle_count} cycles)")]
    CycleOutOfRange {
        /// Index computed from the output frame number.
        cycle_index: usize,
        /// Number of cycles in the cache.
        cycle_count: usize,
    },

    /// The requested frame number exceeds the clip length.
    #[error("Frame {frame_number} is out of range (clip has {total_frames} frames)")]
    FrameOutOfRange {
        /// The frame number that was requested.
        frame_number: u64,
        /// The total number of frames in the clip.
        total_frames: u64,
    },

    /// The frame map entry found for an output frame belongs to another frame.
    #[error(
        "Internal error: frame counting is out of whack (requested output frame {requested}, mapped entry is for {mapped}). Please report this as a bug."
    )]
    FrameMappingMismatch {
        /// Output frame that was requested.
        requested: u64,
        /// `dst_frame` of the entry that was found.
        mapped: u64,
    },

    /// The difference metric produced a value that is not a finite, non-negative number.
    #[error("Difference metric returned {value} for frame {frame_number}")]
    InvalidDifference {
        /// Frame the metric was evaluated for.
        frame_number: u64,
        /// The offending value.
        value: f64,
    },

    /// The difference metric cannot compare against the requested reference offset.
    #[error("Reference offset {0} is not supported by this difference metric")]
    UnsupportedReferenceOffset(i64),

    /// A frame could not be produced by a frame source.
    #[error("Frame source error: {0}")]
    FrameSourceError(String),

    /// A lock guarding cycle state was poisoned by a panicking thread.
    #[error("Cycle state lock poisoned")]
    LockPoisoned,

    /// The operation was cancelled via a [`CancellationToken`](crate::CancellationToken).
    #[error("Operation cancelled")]
    Cancelled,

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    IoError(#[from] IoError),

    /// An error from the `image` crate while reading or writing frames.
    #[error("Image processing error: {0}")]
    ImageError(#[from] ImageError),

    /// An error originating from the FFmpeg libraries.
    #[cfg(feature = "ffmpeg")]
    #[error("FFmpeg error: {0}")]
    FfmpegError(String),
}

#[cfg(feature = "ffmpeg")]
impl From<ffmpeg_next::Error> for SmoothSkipError {
    fn from(error: ffmpeg_next::Error) -> Self {
        SmoothSkipError::FfmpegError(error.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for SmoothSkipError {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        SmoothSkipError::LockPoisoned
    }
}
