//! Frame providers.
//!
//! A [`FrameSource`] hands out decoded frames by source frame number. The
//! filter reads from two of them: the *primary* clip (pass-through and
//! duplicated frames, and the input of the difference metric) and the
//! *alternate* clip (typically motion-interpolated, used for bad frames).
//!
//! Two in-process implementations are provided: [`MemorySource`] for frames
//! already held in memory, and [`ImageSequence`] for a directory of numbered
//! image files. With the `ffmpeg` feature, `VideoFileSource` decodes frames
//! straight out of a video file.

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::fs;
use std::path::{Path, PathBuf};

use image::DynamicImage;

use crate::{error::SmoothSkipError, frame_rate::FrameRate};

/// File extensions recognised by [`ImageSequence`].
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "tif", "tiff", "webp"];

/// An addressable provider of video frames.
///
/// Implementations must be [`Send`] and [`Sync`]: frames are requested from
/// many worker threads at once and out of order.
pub trait FrameSource: Send + Sync {
    /// Number of frames in the clip.
    fn frame_count(&self) -> u64;

    /// Decode frame `frame_number` (0-indexed).
    ///
    /// # Errors
    ///
    /// Implementations return [`SmoothSkipError::FrameOutOfRange`] for frame
    /// numbers at or past [`frame_count`](FrameSource::frame_count).
    fn frame(&self, frame_number: u64) -> Result<DynamicImage, SmoothSkipError>;

    /// Nominal frame rate of the clip.
    fn frame_rate(&self) -> FrameRate;

    /// Frame width and height in pixels.
    fn dimensions(&self) -> (u32, u32);
}

/// Frames held in memory.
#[derive(Clone)]
pub struct MemorySource {
    frames: Vec<DynamicImage>,
    frame_rate: FrameRate,
}

impl Debug for MemorySource {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("MemorySource")
            .field("frame_count", &self.frames.len())
            .field("frame_rate", &self.frame_rate)
            .field("dimensions", &self.dimensions())
            .finish()
    }
}

impl MemorySource {
    /// Wrap a list of frames.
    pub fn new(frames: Vec<DynamicImage>, frame_rate: FrameRate) -> Self {
        Self { frames, frame_rate }
    }
}

impl FrameSource for MemorySource {
    fn frame_count(&self) -> u64 {
        self.frames.len() as u64
    }

    fn frame(&self, frame_number: u64) -> Result<DynamicImage, SmoothSkipError> {
        usize::try_from(frame_number)
            .ok()
            .and_then(|index| self.frames.get(index))
            .cloned()
            .ok_or(SmoothSkipError::FrameOutOfRange {
                frame_number,
                total_frames: self.frame_count(),
            })
    }

    fn frame_rate(&self) -> FrameRate {
        self.frame_rate
    }

    fn dimensions(&self) -> (u32, u32) {
        self.frames
            .first()
            .map(|frame| (frame.width(), frame.height()))
            .unwrap_or((0, 0))
    }
}

/// A directory of still images, one per frame.
///
/// Files with a recognised image extension are ordered by file name, so
/// zero-padded names (`frame_000001.png`) sort in frame order. Frames are
/// decoded on demand; only the dimensions of the first frame are read up
/// front.
#[derive(Debug, Clone)]
pub struct ImageSequence {
    directory: PathBuf,
    paths: Vec<PathBuf>,
    frame_rate: FrameRate,
    dimensions: (u32, u32),
}

impl ImageSequence {
    /// Scan `directory` for frames.
    ///
    /// # Errors
    ///
    /// - [`SmoothSkipError::IoError`] if the directory cannot be read.
    /// - [`SmoothSkipError::EmptySource`] if it contains no image files.
    /// - [`SmoothSkipError::ImageError`] if the first frame cannot be probed.
    pub fn open<P: AsRef<Path>>(
        directory: P,
        frame_rate: FrameRate,
    ) -> Result<Self, SmoothSkipError> {
        let directory = directory.as_ref().to_path_buf();
        log::debug!("Scanning image sequence: {}", directory.display());

        let mut paths: Vec<PathBuf> = fs::read_dir(&directory)?
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .filter(|path| path.is_file() && has_image_extension(path))
            .collect();
        paths.sort();

        let first = paths
            .first()
            .ok_or_else(|| SmoothSkipError::EmptySource(directory.display().to_string()))?;
        let dimensions = image::image_dimensions(first)?;

        log::debug!(
            "Found {} frames of {}x{} in {}",
            paths.len(),
            dimensions.0,
            dimensions.1,
            directory.display()
        );

        Ok(Self {
            directory,
            paths,
            frame_rate,
            dimensions,
        })
    }

    /// The scanned directory.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Path of the file backing `frame_number`.
    pub fn path(&self, frame_number: u64) -> Option<&Path> {
        usize::try_from(frame_number)
            .ok()
            .and_then(|index| self.paths.get(index))
            .map(PathBuf::as_path)
    }
}

impl FrameSource for ImageSequence {
    fn frame_count(&self) -> u64 {
        self.paths.len() as u64
    }

    fn frame(&self, frame_number: u64) -> Result<DynamicImage, SmoothSkipError> {
        let path = self.path(frame_number).ok_or(SmoothSkipError::FrameOutOfRange {
            frame_number,
            total_frames: self.frame_count(),
        })?;
        Ok(image::open(path)?)
    }

    fn frame_rate(&self) -> FrameRate {
        self.frame_rate
    }

    fn dimensions(&self) -> (u32, u32) {
        self.dimensions
    }
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|extension| extension.to_str())
        .is_some_and(|extension| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(extension))
        })
}
