//! Parallel rendering example (feature = "rayon").
//!
//! Usage:
//!   cargo run --features=rayon --example parallel_render -- <frames_dir> <interpolated_dir> [out_dir]

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use smoothskip::{FrameRate, ImageSequence, RenderOptions, SmoothSkip, SmoothSkipOptions};

fn main() -> Result<(), Box<dyn Error>> {
    let mut args = std::env::args().skip(1);
    let primary_dir = args.next().unwrap_or_else(|| "frames".to_string());
    let alternate_dir = args.next().unwrap_or_else(|| "interpolated".to_string());
    let out_dir = PathBuf::from(args.next().unwrap_or_else(|| "smooth".to_string()));

    let rate = FrameRate::new(24, 1);
    let primary = Arc::new(ImageSequence::open(&primary_dir, rate)?);
    let alternate = Arc::new(ImageSequence::open(&alternate_dir, rate)?);
    let filter = SmoothSkip::new(primary, alternate, SmoothSkipOptions::new())?;
    let info = filter.output_info();
    println!(
        "{} source frames -> {} output frames at {} fps",
        info.source_frame_count, info.frame_count, info.frame_rate
    );

    std::fs::create_dir_all(&out_dir)?;
    let start = Instant::now();
    let frames = filter.frames_parallel(0..info.frame_count, &RenderOptions::new())?;
    let elapsed = start.elapsed();

    println!(
        "Rendered {} frames in {elapsed:.2?} ({:.1} fps)",
        frames.len(),
        frames.len() as f64 / elapsed.as_secs_f64(),
    );

    for frame in &frames {
        frame
            .image
            .save(out_dir.join(format!("frame_{:06}.png", frame.frame_number)))?;
    }
    println!("Saved to {}", out_dir.display());
    Ok(())
}
