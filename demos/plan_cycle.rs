//! Print how a clip expands, cycle by cycle.
//!
//! Usage:
//!   cargo run --example plan_cycle -- [diffs_file] [cycle] [create]
//!
//! Without a file, a short built-in clip with one hard cut is used.

use std::error::Error;
use std::sync::Arc;

use smoothskip::{FrameMapper, PrecomputedDifferences, SmoothSkipOptions};

const BUILT_IN: &str = "0 3 2 5\n1 2 1 4\n0 10 40 5\n2 2";

fn main() -> Result<(), Box<dyn Error>> {
    let mut args = std::env::args().skip(1);
    let diffs = match args.next() {
        Some(path) => PrecomputedDifferences::parse(&std::fs::read_to_string(path)?)?,
        None => PrecomputedDifferences::parse(BUILT_IN)?,
    };
    let cycle = args.next().map(|value| value.parse()).transpose()?.unwrap_or(4);
    let create = args.next().map(|value| value.parse()).transpose()?.unwrap_or(1);

    let options = SmoothSkipOptions::new()
        .with_cycle_length(cycle)
        .with_creates_per_cycle(create);
    let source_frames = diffs.len() as u64;
    let mapper = FrameMapper::new(&options, source_frames, Arc::new(diffs))?;

    println!(
        "{source_frames} source frames -> {} output frames (cycle {cycle}, create {create})",
        mapper.output_frame_count()
    );

    let span = options.output_cycle_length() as u64;
    for start in (0..mapper.output_frame_count()).step_by(span as usize) {
        let snapshot = mapper.inspect(start)?;
        println!("\ncycle {}:", snapshot.cycle_index);
        for frame in &snapshot.frames {
            println!(
                "  {} frame {:>4}  diff {:>9.3}  {}",
                frame.class.marker(),
                frame.frame,
                frame.diff,
                frame.class
            );
        }

        let end = (start + span).min(mapper.output_frame_count());
        for entry in mapper.resolve_range(start..end)? {
            println!(
                "  out {:>4} <- src {:>4} from {}",
                entry.dst_frame,
                entry.src_frame,
                if entry.use_alternate { "alternate" } else { "primary" }
            );
        }
    }

    Ok(())
}
