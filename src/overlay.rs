//! Diagnostic text for rendered frames.
//!
//! When a filter is built with [`SmoothSkipOptions::with_debug`], every
//! [`OutputFrame`](crate::OutputFrame) carries a [`DebugOverlay`] describing
//! how it was produced. The overlay is plain text; drawing it onto the frame
//! is left to the caller.
//!
//! [`SmoothSkipOptions::with_debug`]: crate::SmoothSkipOptions::with_debug

use std::fmt::{Display, Formatter, Result as FmtResult};

use crate::{frame_rate::FrameRate, mapping::CycleFrame};

/// How one output frame was produced.
#[derive(Debug, Clone, PartialEq)]
pub struct DebugOverlay {
    /// Output frame number.
    pub output_frame: u64,
    /// Source frame number the output frame maps to.
    pub source_frame: u64,
    /// Frame index actually read from the selected clip.
    pub selected_index: u64,
    /// `true` when the alternate clip was read.
    pub use_alternate: bool,
    /// Frame rate of the output clip.
    pub output_rate: FrameRate,
    /// Frame rate of the source clip.
    pub source_rate: FrameRate,
    /// Scene-change threshold in effect.
    pub scene_threshold: f64,
    /// Classification of every frame in the owning cycle.
    pub cycle: Vec<CycleFrame>,
}

impl DebugOverlay {
    /// The overlay as individual lines.
    pub fn lines(&self) -> Vec<String> {
        let mut lines = vec![
            format!("SmoothSkip v{}", env!("CARGO_PKG_VERSION")),
            format!("Frame: {} (child: {})", self.output_frame, self.source_frame),
            format!(
                "Using: {}, clip {}",
                self.selected_index,
                if self.use_alternate { 'B' } else { 'A' }
            ),
            format!(
                "FPS: {:.3} (child: {:.3})",
                self.output_rate.as_f64(),
                self.source_rate.as_f64()
            ),
            format!("Scene: {:.1}", self.scene_threshold),
            "Cycle frame diffs (child):".to_string(),
        ];
        lines.extend(
            self.cycle
                .iter()
                .map(|row| format!("{} {} ({:.5})", row.class.marker(), row.frame, row.diff)),
        );
        lines
    }
}

impl Display for DebugOverlay {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.lines().join("\n"))
    }
}
