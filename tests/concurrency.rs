//! Concurrent resolution tests.
//!
//! Many threads request output frames in scrambled orders; every cycle must
//! be populated exactly once and every thread must see the same mapping.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Mutex};
use std::thread;

use image::{DynamicImage, GrayImage, Luma};
use smoothskip::{
    DifferenceMetric, FrameMapEntry, FrameMapper, FrameRate, MemorySource,
    PrecomputedDifferences, SmoothSkip, SmoothSkipError, SmoothSkipOptions,
};

const WORKERS: u64 = 8;

/// Wraps precomputed differences and records every call.
struct Recording {
    inner: PrecomputedDifferences,
    calls: Mutex<HashMap<u64, usize>>,
    active: AtomicUsize,
    max_active: AtomicUsize,
    reentrant: bool,
}

impl Recording {
    fn new(values: Vec<f64>, reentrant: bool) -> Self {
        Self {
            inner: PrecomputedDifferences::new(values),
            calls: Mutex::new(HashMap::new()),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
            reentrant,
        }
    }
}

impl DifferenceMetric for Recording {
    fn difference(&self, frame: u64, offset: i64) -> Result<f64, SmoothSkipError> {
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);
        *self.calls.lock().unwrap().entry(frame).or_default() += 1;
        thread::yield_now();
        let result = self.inner.difference(frame, offset);
        self.active.fetch_sub(1, Ordering::SeqCst);
        result
    }

    fn is_reentrant(&self) -> bool {
        self.reentrant
    }
}

fn diffs(count: u64) -> Vec<f64> {
    (0..count).map(|n| ((n * 37 + 11) % 71) as f64).collect()
}

fn scrambled(worker: u64, total: u64) -> impl Iterator<Item = u64> {
    // 31 is coprime with every total used here, so each worker visits every frame.
    (0..total).map(move |step| (step * 31 + worker * 7) % total)
}

fn resolve_from_workers(mapper: Arc<FrameMapper>) -> Vec<HashMap<u64, FrameMapEntry>> {
    let barrier = Arc::new(Barrier::new(WORKERS as usize));
    let handles: Vec<_> = (0..WORKERS)
        .map(|worker| {
            let mapper = Arc::clone(&mapper);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                scrambled(worker, mapper.output_frame_count())
                    .map(|frame| (frame, mapper.resolve(frame).expect("Failed to resolve")))
                    .collect::<HashMap<_, _>>()
            })
        })
        .collect();
    handles
        .into_iter()
        .map(|handle| handle.join().expect("Worker panicked"))
        .collect()
}

// ── FrameMapper ──────────────────────────────────────────────────

#[test]
fn each_frame_is_measured_once_under_contention() {
    let source_frames = 200;
    let values = diffs(source_frames);
    let metric = Arc::new(Recording::new(values.clone(), true));
    let options = SmoothSkipOptions::new()
        .with_cycle_length(5)
        .with_creates_per_cycle(2);
    let mapper = Arc::new(
        FrameMapper::new(&options, source_frames, metric.clone()).expect("Failed to build mapper"),
    );

    let results = resolve_from_workers(Arc::clone(&mapper));

    let calls = metric.calls.lock().unwrap();
    assert_eq!(calls.len() as u64, source_frames);
    assert!(calls.values().all(|&count| count == 1));
    assert_eq!(mapper.refresh_count(), 40);

    let sequential = FrameMapper::new(
        &options,
        source_frames,
        Arc::new(PrecomputedDifferences::new(values)),
    )
    .expect("Failed to build mapper")
    .resolve_range(0..u64::MAX)
    .expect("Failed to resolve");

    for result in results {
        assert_eq!(result.len(), sequential.len());
        for (frame, entry) in result {
            assert_eq!(entry, sequential[frame as usize]);
        }
    }
}

#[test]
fn non_reentrant_metric_runs_one_call_at_a_time() {
    let metric = Arc::new(Recording::new(diffs(120), false));
    let mapper = Arc::new(
        FrameMapper::new(&SmoothSkipOptions::new(), 120, metric.clone())
            .expect("Failed to build mapper"),
    );
    resolve_from_workers(mapper);
    assert_eq!(metric.max_active.load(Ordering::SeqCst), 1);
}

#[test]
fn serialized_option_overrides_reentrant_metric() {
    let metric = Arc::new(Recording::new(diffs(120), true));
    let options = SmoothSkipOptions::new().with_serialized_metric(true);
    let mapper =
        Arc::new(FrameMapper::new(&options, 120, metric.clone()).expect("Failed to build mapper"));
    resolve_from_workers(mapper);
    assert_eq!(metric.max_active.load(Ordering::SeqCst), 1);
}

// ── SmoothSkip ───────────────────────────────────────────────────

#[test]
fn filter_renders_identically_from_many_threads() {
    let frames: Vec<DynamicImage> = (0..48u8)
        .map(|n| {
            let value = if n % 12 == 0 { n * 5 } else { n };
            DynamicImage::ImageLuma8(GrayImage::from_pixel(6, 4, Luma([value])))
        })
        .collect();
    let primary = Arc::new(MemorySource::new(frames.clone(), FrameRate::new(24, 1)));
    let inverted: Vec<DynamicImage> = frames
        .iter()
        .map(|frame| {
            let mut frame = frame.clone();
            frame.invert();
            frame
        })
        .collect();
    let alternate = Arc::new(MemorySource::new(inverted, FrameRate::new(24, 1)));

    let filter = Arc::new(
        SmoothSkip::new(primary, alternate, SmoothSkipOptions::new().with_scene_threshold(20.0))
            .expect("Failed to build filter"),
    );
    let total = filter.output_info().frame_count;
    let rendered = AtomicU64::new(0);

    thread::scope(|scope| {
        for worker in 0..WORKERS {
            let filter = Arc::clone(&filter);
            let rendered = &rendered;
            scope.spawn(move || {
                for frame in scrambled(worker, total) {
                    let output = filter.frame(frame).expect("Failed to render");
                    let pixel = output.image.to_luma8().get_pixel(0, 0)[0];
                    let source = output.entry.src_frame as usize;
                    let expected_luma = (if source % 12 == 0 { source * 5 } else { source }) as u8;
                    if output.selection.use_alternate {
                        assert_eq!(pixel, 255 - expected_luma);
                    } else {
                        assert_eq!(pixel, expected_luma);
                    }
                    rendered.fetch_add(1, Ordering::Relaxed);
                }
            });
        }
    });

    assert_eq!(rendered.load(Ordering::Relaxed), total * WORKERS);
    assert_eq!(filter.mapper().refresh_count(), 12);
}
