//! Per-cycle frame classification.
//!
//! A [`Cycle`] holds the predecessor differences of one window of
//! `cycle_length` consecutive source frames. From those it decides which
//! frames are *bad* (duplication points), which single frame (if any) is a
//! scene change, and how the window expands into `cycle_length + creates`
//! output frames.
//!
//! # Example
//!
//! ```
//! use smoothskip::Cycle;
//!
//! let mut cycle = Cycle::new(4, 1, 32.0);
//! for (slot, diff) in [0.0, 3.0, 2.0, 5.0].into_iter().enumerate() {
//!     cycle.set_diff(slot, slot as u64, diff);
//! }
//! cycle.update_frame_map();
//!
//! assert!(cycle.is_bad_frame(3));
//! assert!(!cycle.has_scene_change());
//! assert_eq!(cycle.frame_map().len(), 5);
//! ```

use std::cell::OnceCell;
use std::cmp::Ordering;
use std::fmt::{Display, Formatter, Result as FmtResult};

/// One source frame's measured difference to its predecessor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameDiff {
    /// Source frame number.
    pub frame: u64,
    /// Difference to the previous source frame. Never negative.
    pub diff: f64,
}

/// One output frame of an expanded cycle.
///
/// Entries are copied out of the cycle, never borrowed, so callers can hold
/// them without keeping the cycle locked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameMapEntry {
    /// Output frame number, monotonic across the whole clip.
    pub dst_frame: u64,
    /// Source frame the output frame is built from.
    pub src_frame: u64,
    /// `true` when the pixels come from the alternate (interpolated) clip.
    pub use_alternate: bool,
}

/// How a source frame is treated when its cycle is expanded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameClass {
    /// The cycle's largest difference, above the scene threshold. Duplicated
    /// from the primary clip.
    SceneChange,
    /// Among the top `creates` differences. An extra frame is taken from the
    /// alternate clip.
    Bad,
    /// Passed through unchanged.
    PassThrough,
}

impl FrameClass {
    /// Single-character marker used by the debug overlay.
    pub fn marker(self) -> char {
        match self {
            FrameClass::SceneChange => 'S',
            FrameClass::Bad => '*',
            FrameClass::PassThrough => ' ',
        }
    }
}

impl Display for FrameClass {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let name = match self {
            FrameClass::SceneChange => "scene-change",
            FrameClass::Bad => "bad",
            FrameClass::PassThrough => "pass-through",
        };
        f.write_str(name)
    }
}

/// Classification state for one window of source frames.
///
/// Slots are `None` until populated; the last cycle of a clip whose length is
/// not a multiple of the cycle length keeps its trailing slots empty. Empty
/// slots always rank below populated ones.
///
/// The sorted view is computed lazily on the first query after the diffs
/// change and memoized until the next [`reset`](Cycle::reset) or
/// [`set_diff`](Cycle::set_diff). A `Cycle` is not `Sync`; share it behind a
/// lock (see [`CycleCache`](crate::CycleCache)).
#[derive(Debug, Clone)]
pub struct Cycle {
    length: usize,
    creates: usize,
    scene_threshold: f64,
    diffs: Vec<Option<FrameDiff>>,
    sorted: OnceCell<Vec<Option<FrameDiff>>>,
    frame_map: Vec<FrameMapEntry>,
}

impl Cycle {
    /// Create an empty cycle of `length` source frames that expands by
    /// `creates` frames, using `scene_threshold` for scene-change detection.
    pub fn new(length: usize, creates: usize, scene_threshold: f64) -> Self {
        Self {
            length,
            creates,
            scene_threshold,
            diffs: vec![None; length],
            sorted: OnceCell::new(),
            frame_map: Vec::with_capacity(length + creates + 1),
        }
    }

    /// Source frames per cycle.
    pub fn length(&self) -> usize {
        self.length
    }

    /// Frames created per cycle.
    pub fn creates(&self) -> usize {
        self.creates
    }

    /// The configured scene-change threshold.
    pub fn scene_threshold(&self) -> f64 {
        self.scene_threshold
    }

    /// Clear every slot and drop the sorted view.
    ///
    /// The frame map is left in place but is stale until the next
    /// [`update_frame_map`](Cycle::update_frame_map).
    pub fn reset(&mut self) {
        self.diffs.iter_mut().for_each(|slot| *slot = None);
        self.sorted.take();
    }

    /// Record the difference of `frame` to its predecessor in `slot`.
    ///
    /// Slots outside `0..length` are ignored.
    pub fn set_diff(&mut self, slot: usize, frame: u64, diff: f64) {
        match self.diffs.get_mut(slot) {
            Some(entry) => {
                *entry = Some(FrameDiff { frame, diff });
                self.sorted.take();
            }
            None => log::warn!(
                "Ignoring diff for frame {frame}: slot {slot} outside cycle of length {}",
                self.length
            ),
        }
    }

    /// Slots in source frame order.
    pub fn diffs(&self) -> &[Option<FrameDiff>] {
        &self.diffs
    }

    /// Returns `true` once the first slot has been populated.
    pub fn is_populated(&self) -> bool {
        self.diffs.first().is_some_and(Option::is_some)
    }

    /// First source frame of the window, if populated.
    pub fn first_frame(&self) -> Option<u64> {
        self.diffs.first().copied().flatten().map(|entry| entry.frame)
    }

    /// Returns `true` if a populated slot holds `frame`.
    ///
    /// The coordinator uses this with the expected first frame of the window
    /// to decide whether the cycle already holds the right data.
    pub fn includes(&self, frame: u64) -> bool {
        self.diffs
            .iter()
            .flatten()
            .any(|entry| entry.frame == frame)
    }

    /// Slots ordered by descending difference.
    ///
    /// Equal differences are ordered by ascending frame number; empty slots
    /// come last.
    pub fn sorted_diffs(&self) -> &[Option<FrameDiff>] {
        self.sorted.get_or_init(|| {
            let mut sorted = self.diffs.clone();
            sorted.sort_unstable_by(descending_diff);
            sorted
        })
    }

    /// Frame holding the `offset`-th largest difference (0 = largest).
    ///
    /// Returns `None` when `offset >= length` or the slot at that rank is empty.
    pub fn sorted_rank(&self, offset: usize) -> Option<u64> {
        self.sorted_diffs()
            .get(offset)
            .copied()
            .flatten()
            .map(|entry| entry.frame)
    }

    /// Returns `true` if the largest difference exceeds the scene threshold.
    ///
    /// A cycle that creates as many frames as it holds has no slack to treat
    /// a cut specially, so this is always `false` when `creates >= length`.
    pub fn has_scene_change(&self) -> bool {
        if self.creates >= self.length {
            return false;
        }
        self.sorted_diffs()
            .first()
            .copied()
            .flatten()
            .is_some_and(|largest| largest.diff > self.scene_threshold)
    }

    /// Returns `true` if `frame` is this cycle's scene change.
    pub fn is_scene_change(&self, frame: u64) -> bool {
        self.has_scene_change() && self.sorted_rank(0) == Some(frame)
    }

    /// Returns `true` if `frame` is one of the `creates` duplication points.
    ///
    /// When the cycle has a scene change, rank 0 is reserved for it and the
    /// bad frames are ranks `1..=creates`; otherwise ranks `0..creates`.
    pub fn is_bad_frame(&self, frame: u64) -> bool {
        let first_rank = usize::from(self.has_scene_change());
        (first_rank..first_rank + self.creates).any(|rank| self.sorted_rank(rank) == Some(frame))
    }

    /// Classify `frame` for expansion.
    pub fn classify(&self, frame: u64) -> FrameClass {
        if self.is_scene_change(frame) {
            FrameClass::SceneChange
        } else if self.is_bad_frame(frame) {
            FrameClass::Bad
        } else {
            FrameClass::PassThrough
        }
    }

    /// Rebuild the frame map from the current diffs.
    ///
    /// Output numbering starts at `first_frame * (length + creates) / length`.
    /// Each scene change or bad frame emits its extra entry ahead of the
    /// frame's own pass-through entry. Does nothing on an unpopulated cycle.
    pub fn update_frame_map(&mut self) {
        let Some(first_frame) = self.first_frame() else {
            return;
        };

        let scaled_length = (self.length + self.creates) as u64;
        let mut cursor = first_frame * scaled_length / self.length as u64;
        let mut frame_map = Vec::with_capacity(self.length + self.creates + 1);

        for entry in self.diffs.iter().flatten() {
            let frame = entry.frame;
            match self.classify(frame) {
                FrameClass::SceneChange => {
                    frame_map.push(FrameMapEntry {
                        dst_frame: cursor,
                        src_frame: frame,
                        use_alternate: false,
                    });
                    cursor += 1;
                }
                FrameClass::Bad => {
                    frame_map.push(FrameMapEntry {
                        dst_frame: cursor,
                        src_frame: frame,
                        use_alternate: true,
                    });
                    cursor += 1;
                }
                FrameClass::PassThrough => {}
            }

            frame_map.push(FrameMapEntry {
                dst_frame: cursor,
                src_frame: frame,
                use_alternate: false,
            });
            cursor += 1;
        }

        self.frame_map = frame_map;
    }

    /// The expanded cycle, in output order.
    pub fn frame_map(&self) -> &[FrameMapEntry] {
        &self.frame_map
    }

    /// Copy of the frame map entry at `offset` within the expanded cycle.
    pub fn entry(&self, offset: usize) -> Option<FrameMapEntry> {
        self.frame_map.get(offset).copied()
    }
}

fn descending_diff(a: &Option<FrameDiff>, b: &Option<FrameDiff>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.diff.total_cmp(&a.diff).then(a.frame.cmp(&b.frame)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::{Cycle, FrameClass, FrameMapEntry};

    fn populated(diffs: &[f64], creates: usize, threshold: f64) -> Cycle {
        populated_from(0, diffs.len(), diffs, creates, threshold)
    }

    fn populated_from(
        first_frame: u64,
        length: usize,
        diffs: &[f64],
        creates: usize,
        threshold: f64,
    ) -> Cycle {
        let mut cycle = Cycle::new(length, creates, threshold);
        for (slot, &diff) in diffs.iter().enumerate() {
            cycle.set_diff(slot, first_frame + slot as u64, diff);
        }
        cycle.update_frame_map();
        cycle
    }

    fn entry(dst_frame: u64, src_frame: u64, use_alternate: bool) -> FrameMapEntry {
        FrameMapEntry {
            dst_frame,
            src_frame,
            use_alternate,
        }
    }

    #[test]
    fn new_cycle_is_unpopulated() {
        let cycle = Cycle::new(4, 1, 32.0);
        assert!(!cycle.is_populated());
        assert_eq!(cycle.first_frame(), None);
        assert!(!cycle.includes(0));
        assert_eq!(cycle.sorted_rank(0), None);
        assert!(!cycle.has_scene_change());
        assert!(!cycle.is_bad_frame(0));
    }

    #[test]
    fn update_frame_map_is_noop_on_unpopulated_cycle() {
        let mut cycle = Cycle::new(4, 1, 32.0);
        cycle.update_frame_map();
        assert!(cycle.frame_map().is_empty());
    }

    #[test]
    fn sorted_diffs_descend_with_empty_slots_last() {
        let mut cycle = Cycle::new(5, 1, 100.0);
        cycle.set_diff(0, 10, 1.5);
        cycle.set_diff(1, 11, 7.0);
        cycle.set_diff(2, 12, 0.0);

        let sorted: Vec<Option<u64>> = cycle
            .sorted_diffs()
            .iter()
            .map(|slot| slot.map(|entry| entry.frame))
            .collect();
        assert_eq!(sorted, vec![Some(11), Some(10), Some(12), None, None]);
    }

    #[test]
    fn equal_diffs_rank_lower_frame_first() {
        let cycle = populated(&[0.0, 4.0, 4.0, 4.0], 1, 100.0);
        assert_eq!(cycle.sorted_rank(0), Some(1));
        assert_eq!(cycle.sorted_rank(1), Some(2));
        assert_eq!(cycle.sorted_rank(2), Some(3));
        assert!(cycle.is_bad_frame(1));
        assert!(!cycle.is_bad_frame(2));
    }

    #[test]
    fn sorted_rank_past_length_is_none() {
        let cycle = populated(&[0.0, 1.0], 1, 100.0);
        assert_eq!(cycle.sorted_rank(2), None);
        assert_eq!(cycle.sorted_rank(usize::MAX), None);
    }

    #[test]
    fn set_diff_invalidates_sorted_view() {
        let mut cycle = populated(&[0.0, 3.0, 2.0, 5.0], 1, 100.0);
        assert_eq!(cycle.sorted_rank(0), Some(3));

        cycle.set_diff(1, 1, 9.0);
        assert_eq!(cycle.sorted_rank(0), Some(1));
    }

    #[test]
    fn set_diff_outside_cycle_is_ignored() {
        let mut cycle = Cycle::new(2, 1, 32.0);
        cycle.set_diff(2, 7, 1.0);
        assert!(!cycle.is_populated());
        assert!(!cycle.includes(7));
    }

    #[test]
    fn reset_clears_slots_and_sort() {
        let mut cycle = populated(&[0.0, 3.0, 2.0, 5.0], 1, 100.0);
        assert!(cycle.includes(3));

        cycle.reset();
        assert!(!cycle.is_populated());
        assert!(!cycle.includes(3));
        assert!(cycle.sorted_diffs().iter().all(Option::is_none));
    }

    #[test]
    fn scene_change_cycle_expands_with_primary_duplicate() {
        // Frame 2 is the cut; frame 1 (second largest) becomes the bad frame.
        let cycle = populated(&[0.0, 10.0, 40.0, 5.0], 1, 32.0);

        assert!(cycle.has_scene_change());
        assert!(cycle.is_scene_change(2));
        assert!(!cycle.is_scene_change(1));
        assert!(cycle.is_bad_frame(1));
        assert!(!cycle.is_bad_frame(2));
        assert!(!cycle.is_bad_frame(3));

        assert_eq!(
            cycle.frame_map(),
            &[
                entry(0, 0, false),
                entry(1, 1, true),
                entry(2, 1, false),
                entry(3, 2, false),
                entry(4, 2, false),
                entry(5, 3, false),
            ]
        );
    }

    #[test]
    fn plain_cycle_expands_by_creates() {
        let cycle = populated(&[0.0, 3.0, 2.0, 5.0], 1, 100.0);

        assert!(!cycle.has_scene_change());
        assert!(cycle.is_bad_frame(3));
        assert_eq!(
            cycle.frame_map(),
            &[
                entry(0, 0, false),
                entry(1, 1, false),
                entry(2, 2, false),
                entry(3, 3, true),
                entry(4, 3, false),
            ]
        );
    }

    #[test]
    fn threshold_must_be_strictly_exceeded() {
        let cycle = populated(&[0.0, 32.0, 1.0, 2.0], 1, 32.0);
        assert!(!cycle.has_scene_change());
        assert!(cycle.is_bad_frame(1));
    }

    #[test]
    fn scene_change_is_ignored_when_creates_fill_the_cycle() {
        let cycle = populated(&[0.0, 90.0, 1.0], 3, 32.0);
        assert!(!cycle.has_scene_change());
        assert!((0..3).all(|frame| cycle.is_bad_frame(frame)));
        assert_eq!(cycle.frame_map().len(), 6);
        assert!(cycle.frame_map().iter().step_by(2).all(|e| e.use_alternate));
    }

    #[test]
    fn bad_frame_count_matches_creates() {
        let diffs = [3.0, 8.0, 1.0, 6.0, 2.0, 9.0];
        for creates in 1..=diffs.len() {
            for threshold in [0.5, 100.0] {
                let cycle = populated(&diffs, creates, threshold);
                let bad = (0..diffs.len() as u64)
                    .filter(|&frame| cycle.is_bad_frame(frame))
                    .count();
                let scenes = (0..diffs.len() as u64)
                    .filter(|&frame| cycle.is_scene_change(frame))
                    .count();

                let expected_scenes = usize::from(creates < diffs.len() && threshold < 9.0);
                assert_eq!(scenes, expected_scenes, "creates={creates} threshold={threshold}");
                assert_eq!(bad, creates, "creates={creates} threshold={threshold}");
                assert_eq!(
                    cycle.frame_map().len(),
                    diffs.len() + creates + scenes,
                    "creates={creates} threshold={threshold}"
                );
            }
        }
    }

    #[test]
    fn later_cycle_starts_at_scaled_offset() {
        let cycle = populated_from(8, 4, &[1.0, 2.0, 7.0, 3.0], 1, 100.0);
        let map = cycle.frame_map();
        assert_eq!(map[0], entry(10, 8, false));
        assert_eq!(map[2], entry(12, 10, true));
        assert_eq!(map[3], entry(13, 10, false));
        assert_eq!(map.last().copied(), Some(entry(14, 11, false)));
    }

    #[test]
    fn partial_cycle_maps_only_populated_frames() {
        let cycle = populated_from(8, 4, &[1.0, 6.0], 1, 100.0);
        assert_eq!(cycle.sorted_rank(2), None);
        assert_eq!(
            cycle.frame_map(),
            &[entry(10, 8, false), entry(11, 9, true), entry(12, 9, false)]
        );
    }

    #[test]
    fn classify_and_markers() {
        let cycle = populated(&[0.0, 10.0, 40.0, 5.0], 1, 32.0);
        assert_eq!(cycle.classify(2), FrameClass::SceneChange);
        assert_eq!(cycle.classify(1), FrameClass::Bad);
        assert_eq!(cycle.classify(0), FrameClass::PassThrough);
        assert_eq!(FrameClass::SceneChange.marker(), 'S');
        assert_eq!(FrameClass::Bad.marker(), '*');
        assert_eq!(FrameClass::Bad.to_string(), "bad");
    }

    #[test]
    fn repeated_queries_do_not_drift() {
        let mut cycle = populated(&[0.0, 3.0, 2.0, 5.0], 2, 100.0);
        let first = cycle.frame_map().to_vec();
        for _ in 0..3 {
            assert_eq!(cycle.sorted_rank(0), Some(3));
            cycle.update_frame_map();
        }
        assert_eq!(cycle.frame_map(), first.as_slice());
    }
}
