//! Storage for every cycle of a clip.
//!
//! [`CycleCache`] allocates one [`Cycle`] per window of `cycle_length` source
//! frames up front and addresses them by *output* frame number. The set of
//! cycles never grows, shrinks, or moves, so the only shared mutable state is
//! the contents of each individual cycle, each behind its own lock.

use std::sync::Mutex;

use crate::{cycle::Cycle, error::SmoothSkipError};

/// Fixed-size, index-addressed collection of cycles.
#[derive(Debug)]
pub struct CycleCache {
    cycle_length: usize,
    creates: usize,
    cycles: Box<[Mutex<Cycle>]>,
}

impl CycleCache {
    /// Allocate `ceil(source_frame_count / cycle_length)` empty cycles.
    ///
    /// A trailing partial window gets a cycle of its own.
    ///
    /// # Errors
    ///
    /// - [`SmoothSkipError::InvalidCycleLength`] if `cycle_length` is zero.
    /// - [`SmoothSkipError::AllocationFailed`] if the cycle storage cannot be
    ///   reserved. No partially built cache is returned.
    pub fn new(
        cycle_length: usize,
        creates: usize,
        source_frame_count: u64,
        scene_threshold: f64,
    ) -> Result<Self, SmoothSkipError> {
        if cycle_length == 0 {
            return Err(SmoothSkipError::InvalidCycleLength(cycle_length));
        }

        let cycle_count = usize::try_from(source_frame_count.div_ceil(cycle_length as u64))
            .map_err(|_| SmoothSkipError::AllocationFailed {
                cycle_count: usize::MAX,
            })?;

        let mut cycles = Vec::new();
        cycles
            .try_reserve_exact(cycle_count)
            .map_err(|_| SmoothSkipError::AllocationFailed { cycle_count })?;
        cycles.extend(
            (0..cycle_count)
                .map(|_| Mutex::new(Cycle::new(cycle_length, creates, scene_threshold))),
        );

        log::debug!(
            "Allocated {cycle_count} cycles (length={cycle_length}, creates={creates}, source_frames={source_frame_count})"
        );

        Ok(Self {
            cycle_length,
            creates,
            cycles: cycles.into_boxed_slice(),
        })
    }

    /// Source frames per cycle.
    pub fn cycle_length(&self) -> usize {
        self.cycle_length
    }

    /// Frames created per cycle.
    pub fn creates(&self) -> usize {
        self.creates
    }

    /// Number of cycles held.
    pub fn cycle_count(&self) -> usize {
        self.cycles.len()
    }

    /// Output frames per full cycle (`cycle_length + creates`).
    pub fn output_cycle_length(&self) -> usize {
        self.cycle_length + self.creates
    }

    /// Index of the cycle that owns `output_frame`.
    pub fn cycle_index(&self, output_frame: u64) -> u64 {
        output_frame / self.output_cycle_length() as u64
    }

    /// The cycle that owns `output_frame`.
    ///
    /// # Errors
    ///
    /// Returns [`SmoothSkipError::CycleOutOfRange`] when the frame lies past
    /// the last cycle.
    pub fn cycle_for(&self, output_frame: u64) -> Result<&Mutex<Cycle>, SmoothSkipError> {
        let index = self.cycle_index(output_frame);
        let out_of_range = || SmoothSkipError::CycleOutOfRange {
            cycle_index: usize::try_from(index).unwrap_or(usize::MAX),
            cycle_count: self.cycles.len(),
        };
        let index = usize::try_from(index).map_err(|_| out_of_range())?;
        self.cycles.get(index).ok_or_else(out_of_range)
    }
}
