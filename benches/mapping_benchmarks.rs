//! Benchmarks for cycle classification and frame resolution.
//!
//! Run with: cargo bench
//! Run with all features: cargo bench --all-features

use std::sync::Arc;

use criterion::{BatchSize, Criterion};
use image::{DynamicImage, GrayImage, Luma};
use smoothskip::{
    Cycle, DifferenceMetric, FrameMapper, FrameRate, LumaDifference, MemorySource,
    PrecomputedDifferences, SmoothSkip, SmoothSkipOptions,
};

const SOURCE_FRAMES: u64 = 24 * 60 * 10;

fn diffs(count: u64) -> Vec<f64> {
    (0..count).map(|n| ((n * 7919) % 97) as f64).collect()
}

fn benchmark_cycle_classification(criterion: &mut Criterion) {
    criterion.bench_function("classify 8-frame cycle", |bencher| {
        bencher.iter_batched(
            || {
                let mut cycle = Cycle::new(8, 2, 50.0);
                for (slot, diff) in diffs(8).into_iter().enumerate() {
                    cycle.set_diff(slot, slot as u64, diff);
                }
                cycle
            },
            |mut cycle| {
                cycle.update_frame_map();
                cycle
            },
            BatchSize::SmallInput,
        );
    });
}

fn benchmark_resolution(criterion: &mut Criterion) {
    let options = SmoothSkipOptions::new();
    let values = diffs(SOURCE_FRAMES);

    criterion.bench_function("resolve 10 minutes (cold cache)", |bencher| {
        bencher.iter_batched(
            || {
                FrameMapper::new(
                    &options,
                    SOURCE_FRAMES,
                    Arc::new(PrecomputedDifferences::new(values.clone())),
                )
                .unwrap()
            },
            |mapper| mapper.resolve_range(0..u64::MAX).unwrap(),
            BatchSize::LargeInput,
        );
    });

    let warm = FrameMapper::new(
        &options,
        SOURCE_FRAMES,
        Arc::new(PrecomputedDifferences::new(values)),
    )
    .unwrap();
    warm.resolve_range(0..u64::MAX).unwrap();
    criterion.bench_function("resolve 10 minutes (warm cache)", |bencher| {
        bencher.iter(|| warm.resolve_range(0..u64::MAX).unwrap());
    });
}

fn benchmark_luma_rendering(criterion: &mut Criterion) {
    let frames: Vec<DynamicImage> = (0..96u32)
        .map(|n| {
            DynamicImage::ImageLuma8(GrayImage::from_pixel(320, 180, Luma([(n * 3 % 256) as u8])))
        })
        .collect();
    let source = Arc::new(MemorySource::new(frames, FrameRate::new(24, 1)));

    criterion.bench_function("render 120 frames at 320x180 (luma metric)", |bencher| {
        bencher.iter_batched(
            || SmoothSkip::new(source.clone(), source.clone(), SmoothSkipOptions::new()).unwrap(),
            |filter| {
                for frame in 0..filter.output_info().frame_count {
                    filter.frame(frame).unwrap();
                }
            },
            BatchSize::SmallInput,
        );
    });

    let metric = LumaDifference::new(source);
    criterion.bench_function("luma difference 320x180", |bencher| {
        bencher.iter(|| metric.difference(10, -1).unwrap());
    });
}

#[cfg(feature = "rayon")]
fn benchmark_parallel(criterion: &mut Criterion) {
    let frames: Vec<DynamicImage> = (0..96u32)
        .map(|n| {
            DynamicImage::ImageLuma8(GrayImage::from_pixel(320, 180, Luma([(n * 3 % 256) as u8])))
        })
        .collect();
    let source = Arc::new(MemorySource::new(frames, FrameRate::new(24, 1)));

    criterion.bench_function("render 120 frames at 320x180 (parallel)", |bencher| {
        bencher.iter_batched(
            || SmoothSkip::new(source.clone(), source.clone(), SmoothSkipOptions::new()).unwrap(),
            |filter| {
                filter
                    .frames_parallel(0..u64::MAX, &smoothskip::RenderOptions::new())
                    .unwrap()
            },
            BatchSize::SmallInput,
        );
    });
}

#[cfg(not(feature = "rayon"))]
fn benchmark_parallel(_criterion: &mut Criterion) {}

criterion::criterion_group!(
    benches,
    benchmark_cycle_classification,
    benchmark_resolution,
    benchmark_luma_rendering,
    benchmark_parallel,
);
criterion::criterion_main!(benches);
