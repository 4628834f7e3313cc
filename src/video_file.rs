//! Frames decoded from a video file with FFmpeg.
//!
//! [`VideoFileSource`] opens the best video stream of a file and serves
//! frames by number: each request seeks to the nearest keyframe before the
//! frame and decodes forward until it is reached. Frames are converted to
//! RGB8 at the stream's native size.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use smoothskip::{SmoothSkip, SmoothSkipOptions, VideoFileSource};
//!
//! let primary = Arc::new(VideoFileSource::open("input.mp4")?);
//! let alternate = Arc::new(VideoFileSource::open("interpolated.mp4")?);
//! let filter = SmoothSkip::new(primary, alternate, SmoothSkipOptions::new())?;
//! filter.frame(0)?.image.save("first.png")?;
//! # Ok::<(), smoothskip::SmoothSkipError>(())
//! ```

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use ffmpeg_next::{
    codec::context::Context as CodecContext,
    ffi::AV_TIME_BASE,
    format::{Pixel, context::Input},
    frame::Video as VideoFrame,
    media::Type,
    software::scaling::{Context as ScalingContext, Flags as ScalingFlags},
};
use image::{DynamicImage, RgbImage};

use crate::{error::SmoothSkipError, frame_rate::FrameRate, source::FrameSource};

/// A [`FrameSource`] backed by a video file.
///
/// The demuxer is shared behind a lock, so concurrent requests decode one at
/// a time. Open one source per worker for parallel decoding.
pub struct VideoFileSource {
    path: PathBuf,
    input: Mutex<Input>,
    stream_index: usize,
    frame_rate: FrameRate,
    frame_count: u64,
    dimensions: (u32, u32),
}

impl Debug for VideoFileSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("VideoFileSource")
            .field("path", &self.path)
            .field("stream_index", &self.stream_index)
            .field("frame_rate", &self.frame_rate)
            .field("frame_count", &self.frame_count)
            .field("dimensions", &self.dimensions)
            .finish_non_exhaustive()
    }
}

impl VideoFileSource {
    /// Open `path` and probe its best video stream.
    ///
    /// # Errors
    ///
    /// - [`SmoothSkipError::FfmpegError`] if the file cannot be opened or
    ///   its decoder cannot be created.
    /// - [`SmoothSkipError::EmptySource`] if the file has no video stream or
    ///   no frames.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, SmoothSkipError> {
        let path = path.as_ref().to_path_buf();
        log::debug!("Opening video file: {}", path.display());

        ffmpeg_next::init()?;
        let input = ffmpeg_next::format::input(&path)?;

        let stream = input
            .streams()
            .best(Type::Video)
            .ok_or_else(|| SmoothSkipError::EmptySource(path.display().to_string()))?;
        let stream_index = stream.index();

        let decoder = CodecContext::from_parameters(stream.parameters())?
            .decoder()
            .video()?;
        let dimensions = (decoder.width(), decoder.height());

        let rate = match stream.avg_frame_rate() {
            rate if rate.denominator() != 0 && rate.numerator() > 0 => rate,
            _ => stream.rate(),
        };
        if rate.denominator() == 0 || rate.numerator() <= 0 {
            return Err(SmoothSkipError::FfmpegError(format!(
                "{} has no usable frame rate",
                path.display()
            )));
        }
        let frame_rate = FrameRate::new(rate.numerator() as u64, rate.denominator() as u64);

        let frame_count = match stream.frames() {
            frames if frames > 0 => frames as u64,
            _ => {
                let seconds = input.duration().max(0) as f64 / f64::from(AV_TIME_BASE);
                (seconds * frame_rate.as_f64()) as u64
            }
        };
        if frame_count == 0 {
            return Err(SmoothSkipError::EmptySource(path.display().to_string()));
        }

        log::debug!(
            "Video stream {stream_index}: {}x{}, {frame_rate} fps, {frame_count} frames",
            dimensions.0,
            dimensions.1
        );

        Ok(Self {
            path,
            input: Mutex::new(input),
            stream_index,
            frame_rate,
            frame_count,
            dimensions,
        })
    }

    /// Path of the opened file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn frame_number_of(&self, pts: i64, time_base: ffmpeg_next::Rational) -> u64 {
        let seconds = pts.max(0) as f64 * f64::from(time_base.numerator())
            / f64::from(time_base.denominator());
        (seconds * self.frame_rate.as_f64()).round() as u64
    }
}

impl FrameSource for VideoFileSource {
    fn frame_count(&self) -> u64 {
        self.frame_count
    }

    fn frame(&self, frame_number: u64) -> Result<DynamicImage, SmoothSkipError> {
        if frame_number >= self.frame_count {
            return Err(SmoothSkipError::FrameOutOfRange {
                frame_number,
                total_frames: self.frame_count,
            });
        }

        let mut input = self.input.lock()?;
        let stream = input
            .stream(self.stream_index)
            .ok_or_else(|| SmoothSkipError::EmptySource(self.path.display().to_string()))?;
        let time_base = stream.time_base();
        let mut decoder = CodecContext::from_parameters(stream.parameters())?
            .decoder()
            .video()?;

        let (width, height) = self.dimensions;
        let mut scaler = ScalingContext::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            Pixel::RGB24,
            width,
            height,
            ScalingFlags::BILINEAR,
        )?;

        // Seek positions are in AV_TIME_BASE units.
        let target =
            (frame_number as f64 / self.frame_rate.as_f64() * f64::from(AV_TIME_BASE)) as i64;
        input.seek(target, ..target)?;

        let mut decoded = VideoFrame::empty();
        let mut rgb = VideoFrame::empty();

        for (stream, packet) in input.packets() {
            if stream.index() != self.stream_index {
                continue;
            }
            decoder.send_packet(&packet)?;
            while decoder.receive_frame(&mut decoded).is_ok() {
                let current = self.frame_number_of(decoded.pts().unwrap_or(0), time_base);
                if current >= frame_number {
                    scaler.run(&decoded, &mut rgb)?;
                    return to_image(&rgb, width, height);
                }
            }
        }

        decoder.send_eof()?;
        while decoder.receive_frame(&mut decoded).is_ok() {
            let current = self.frame_number_of(decoded.pts().unwrap_or(0), time_base);
            if current >= frame_number {
                scaler.run(&decoded, &mut rgb)?;
                return to_image(&rgb, width, height);
            }
        }

        Err(SmoothSkipError::FfmpegError(format!(
            "could not locate frame {frame_number} in {}",
            self.path.display()
        )))
    }

    fn frame_rate(&self) -> FrameRate {
        self.frame_rate
    }

    fn dimensions(&self) -> (u32, u32) {
        self.dimensions
    }
}

/// Copy a decoded RGB24 frame into an image, dropping row padding.
fn to_image(frame: &VideoFrame, width: u32, height: u32) -> Result<DynamicImage, SmoothSkipError> {
    let stride = frame.stride(0);
    let row_bytes = width as usize * 3;
    let data = frame.data(0);

    let buffer = if stride == row_bytes {
        data[..row_bytes * height as usize].to_vec()
    } else {
        (0..height as usize)
            .flat_map(|row| &data[row * stride..row * stride + row_bytes])
            .copied()
            .collect()
    };

    RgbImage::from_raw(width, height, buffer)
        .map(DynamicImage::ImageRgb8)
        .ok_or_else(|| {
            SmoothSkipError::FfmpegError("decoded frame is smaller than its dimensions".to_string())
        })
}
