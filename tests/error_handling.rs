//! Error handling integration tests.
//!
//! These tests verify that meaningful errors are returned for invalid
//! configurations and failing collaborators.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use image::{DynamicImage, GrayImage};
use smoothskip::{
    DifferenceMetric, FrameMapper, FrameRate, FrameSource, ImageSequence, MemorySource,
    PrecomputedDifferences, SmoothSkip, SmoothSkipError, SmoothSkipOptions,
};

fn clip(count: usize, width: u32) -> Arc<MemorySource> {
    let frames = (0..count)
        .map(|_| DynamicImage::ImageLuma8(GrayImage::new(width, 2)))
        .collect();
    Arc::new(MemorySource::new(frames, FrameRate::new(24, 1)))
}

fn build(options: SmoothSkipOptions) -> Result<SmoothSkip, SmoothSkipError> {
    SmoothSkip::new(clip(8, 2), clip(8, 2), options)
}

/// Fails every call until `healthy` is set.
struct Flaky {
    healthy: AtomicBool,
}

impl DifferenceMetric for Flaky {
    fn difference(&self, frame: u64, _offset: i64) -> Result<f64, SmoothSkipError> {
        if self.healthy.load(Ordering::SeqCst) {
            Ok(frame as f64)
        } else {
            Err(SmoothSkipError::FrameSourceError(format!("frame {frame} unavailable")))
        }
    }
}

// ── Configuration ────────────────────────────────────────────────

#[test]
fn zero_cycle_is_rejected() {
    let error = build(SmoothSkipOptions::new().with_cycle_length(0)).unwrap_err();
    assert!(matches!(error, SmoothSkipError::InvalidCycleLength(0)));
    assert!(error.to_string().contains("Cycle must be > 0"), "{error}");
}

#[test]
fn create_outside_range_is_rejected() {
    for create in [0, 5] {
        let error = build(SmoothSkipOptions::new().with_creates_per_cycle(create)).unwrap_err();
        assert!(
            matches!(
                error,
                SmoothSkipError::InvalidCreatesPerCycle {
                    creates,
                    cycle_length: 4
                } if creates == create
            ),
            "{error}"
        );
        assert!(error.to_string().contains("Create must be between 1 and the value of cycle"));
    }
}

#[test]
fn cycle_longer_than_clips_is_rejected() {
    let error = build(SmoothSkipOptions::new().with_cycle_length(9)).unwrap_err();
    assert!(matches!(
        error,
        SmoothSkipError::CycleExceedsSource {
            cycle_length: 9,
            frame_count: 8
        }
    ));
    assert!(error.to_string().contains("source clip"), "{error}");

    let error = SmoothSkip::new(
        clip(8, 2),
        clip(5, 2),
        SmoothSkipOptions::new().with_cycle_length(6),
    )
    .unwrap_err();
    assert!(matches!(error, SmoothSkipError::CycleExceedsAlternate { frame_count: 5, .. }));
    assert!(error.to_string().contains("alternate clip"), "{error}");
}

#[test]
fn negative_threshold_is_rejected() {
    let error = build(SmoothSkipOptions::new().with_scene_threshold(-0.5)).unwrap_err();
    assert!(matches!(error, SmoothSkipError::InvalidSceneThreshold(_)));
}

#[test]
fn mismatched_clip_sizes_are_rejected() {
    let error = SmoothSkip::new(clip(8, 2), clip(8, 3), SmoothSkipOptions::new()).unwrap_err();
    assert!(matches!(error, SmoothSkipError::IncompatibleSources(_)));
    assert!(error.to_string().contains("2x2"), "{error}");
}

#[test]
fn empty_image_directory_is_rejected() {
    let directory = tempfile::tempdir().expect("Failed to create temp dir");
    std::fs::write(directory.path().join("readme.txt"), b"no frames here")
        .expect("Failed to write");
    let error = ImageSequence::open(directory.path(), FrameRate::default()).unwrap_err();
    assert!(matches!(error, SmoothSkipError::EmptySource(_)));
}

#[test]
fn missing_image_directory_is_an_io_error() {
    let error =
        ImageSequence::open("this_directory_does_not_exist", FrameRate::default()).unwrap_err();
    assert!(matches!(error, SmoothSkipError::IoError(_)));
}

// ── Resolution ───────────────────────────────────────────────────

#[test]
fn out_of_range_frame_is_reported() {
    let filter = build(SmoothSkipOptions::new()).expect("Failed to build filter");
    let error = filter.frame(10).unwrap_err();
    assert!(error.to_string().contains("out of range"), "{error}");
}

#[test]
fn metric_failure_propagates_and_recovers() {
    let metric = Arc::new(Flaky {
        healthy: AtomicBool::new(false),
    });
    let mapper = FrameMapper::new(&SmoothSkipOptions::new(), 8, metric.clone())
        .expect("Failed to build mapper");

    let error = mapper.resolve(0).unwrap_err();
    assert!(error.to_string().contains("frame 0 unavailable"), "{error}");
    assert_eq!(mapper.refresh_count(), 0);

    metric.healthy.store(true, Ordering::SeqCst);
    let entry = mapper.resolve(3).expect("Failed to resolve after recovery");
    // Frame 3 has the largest difference, so its inserted frame comes first.
    assert!(entry.use_alternate);
    assert_eq!(entry.src_frame, 3);
    assert_eq!(mapper.refresh_count(), 1);
}

#[test]
fn non_finite_difference_is_rejected() {
    let metric = Arc::new(PrecomputedDifferences::new(vec![0.0, f64::NAN, 1.0, 1.0]));
    let mapper =
        FrameMapper::new(&SmoothSkipOptions::new(), 4, metric).expect("Failed to build mapper");
    assert!(matches!(
        mapper.resolve(0),
        Err(SmoothSkipError::InvalidDifference { frame_number: 1, .. })
    ));
}

#[test]
fn source_failures_surface_from_frame() {
    struct Broken;

    impl FrameSource for Broken {
        fn frame_count(&self) -> u64 {
            8
        }
        fn frame(&self, frame_number: u64) -> Result<DynamicImage, SmoothSkipError> {
            Err(SmoothSkipError::FrameSourceError(format!("cannot decode {frame_number}")))
        }
        fn frame_rate(&self) -> FrameRate {
            FrameRate::new(24, 1)
        }
        fn dimensions(&self) -> (u32, u32) {
            (2, 2)
        }
    }

    let filter = SmoothSkip::with_metric(
        clip(8, 2),
        Arc::new(Broken),
        SmoothSkipOptions::new().with_scene_threshold(100.0),
        Arc::new(PrecomputedDifferences::new(vec![0.0, 1.0, 2.0, 9.0, 0.0, 0.0, 0.0, 0.0])),
    )
    .expect("Failed to build filter");

    assert!(filter.frame(0).is_ok());
    let error = filter.frame(3).unwrap_err();
    assert!(error.to_string().contains("cannot decode 3"), "{error}");
}
