//! # smoothskip
//!
//! Smooth a stuttering clip into a uniform, higher frame rate by inserting
//! frames where they are least noticeable.
//!
//! The clip is split into cycles of `L` source frames. Within each cycle,
//! frames are ranked by how much they differ from their predecessor; the `C`
//! most different frames are *bad* frames, and each one gets an extra frame
//! inserted ahead of it, taken from an alternate (typically
//! motion-interpolated) clip. A cut whose difference exceeds the scene
//! threshold is duplicated from the primary clip instead, so interpolation
//! never straddles a scene change. Every cycle of `L` frames becomes `L + C`
//! output frames and the frame rate rises by the same ratio.
//!
//! Cycle data is computed lazily and cached, and output frames can be
//! requested from many threads in any order.
//!
//! ## Quick Start
//!
//! ### Plan a clip from known differences
//!
//! ```
//! use std::sync::Arc;
//!
//! use smoothskip::{FrameMapper, PrecomputedDifferences, SmoothSkipOptions};
//!
//! let diffs = PrecomputedDifferences::new(vec![0.0, 10.0, 40.0, 5.0]);
//! let mapper = FrameMapper::new(&SmoothSkipOptions::new(), 4, Arc::new(diffs))?;
//!
//! for output_frame in 0..mapper.output_frame_count() {
//!     let entry = mapper.resolve(output_frame)?;
//!     println!("{output_frame} <- {} ({})", entry.src_frame, entry.use_alternate);
//! }
//! # Ok::<(), smoothskip::SmoothSkipError>(())
//! ```
//!
//! ### Render an image sequence
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use smoothskip::{FrameRate, ImageSequence, RenderOptions, SmoothSkip, SmoothSkipOptions};
//!
//! let rate = FrameRate::new(24, 1);
//! let primary = Arc::new(ImageSequence::open("frames/", rate)?);
//! let alternate = Arc::new(ImageSequence::open("interpolated/", rate)?);
//! let filter = SmoothSkip::new(primary, alternate, SmoothSkipOptions::new())?;
//!
//! filter.for_each_frame(0..u64::MAX, &RenderOptions::new(), |number, frame| {
//!     frame.image.save(format!("out/frame_{number:06}.png"))?;
//!     Ok(())
//! })?;
//! # Ok::<(), smoothskip::SmoothSkipError>(())
//! ```
//!
//! ### Optional Features
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `ffmpeg` | `VideoFileSource` decodes frames from video files via FFmpeg |
//! | `rayon` | `SmoothSkip::frames_parallel()` renders on rayon threads |
//! | `full` | Enables all of the above |

pub mod configuration;
pub mod cycle;
pub mod cycle_cache;
pub mod difference;
pub mod error;
pub mod frame_rate;
pub mod mapping;
pub mod overlay;
pub mod progress;
#[cfg(feature = "rayon")]
mod rayon;
pub mod smooth_skip;
pub mod source;
#[cfg(feature = "ffmpeg")]
pub mod video_file;

pub use configuration::{
    DEFAULT_CREATES_PER_CYCLE, DEFAULT_CYCLE_LENGTH, DEFAULT_SCENE_THRESHOLD, RenderOptions,
    SmoothSkipOptions,
};
pub use cycle::{Cycle, FrameClass, FrameDiff, FrameMapEntry};
pub use cycle_cache::CycleCache;
pub use difference::{
    DifferenceMetric, LumaDifference, PrecomputedDifferences, mean_absolute_luma_difference,
};
pub use error::SmoothSkipError;
pub use frame_rate::FrameRate;
pub use mapping::{CycleFrame, CycleSnapshot, FrameMapper};
pub use overlay::DebugOverlay;
pub use progress::{CancellationToken, OperationType, ProgressCallback, ProgressInfo};
pub use smooth_skip::{OutputFrame, OutputInfo, SmoothSkip, SourceSelection};
pub use source::{FrameSource, ImageSequence, MemorySource};
#[cfg(feature = "ffmpeg")]
pub use video_file::VideoFileSource;
