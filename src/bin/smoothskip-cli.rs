use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::{Value, json};
use smoothskip::{
    CycleSnapshot, FrameMapEntry, FrameMapper, FrameRate, FrameSource, ImageSequence,
    LumaDifference, OperationType, OutputFrame, PrecomputedDifferences, ProgressCallback,
    ProgressInfo, RenderOptions, SmoothSkip, SmoothSkipOptions,
};
#[cfg(feature = "ffmpeg")]
use smoothskip::VideoFileSource;

const CLI_AFTER_HELP: &str = "Examples:\n  smoothskip info --source frames --cycle 4 --create 1\n  smoothskip plan --diffs diffs.txt --json\n  smoothskip render --source frames --alternate interpolated --out smooth --progress\n  smoothskip completions zsh > _smoothskip";

#[derive(Debug, Parser)]
#[command(
    name = "smoothskip",
    version,
    about = "Insert interpolated frames at the least noticeable points of every cycle",
    after_help = CLI_AFTER_HELP
)]
struct Cli {
    #[command(flatten)]
    global: GlobalOptions,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Parser, Clone, Default)]
struct GlobalOptions {
    /// Show additional output.
    #[arg(long, global = true)]
    verbose: bool,

    /// Show a progress bar where supported.
    #[arg(long, global = true)]
    progress: bool,

    /// Allow overwriting existing output files.
    #[arg(long, global = true)]
    overwrite: bool,

    /// Desired worker thread count for parallel rendering.
    #[arg(long, global = true)]
    threads: Option<usize>,
}

/// Options shared by every command that builds a filter.
#[derive(Debug, Args, Clone)]
struct FilterArgs {
    /// Source frames per cycle.
    #[arg(long, default_value_t = smoothskip::DEFAULT_CYCLE_LENGTH)]
    cycle: usize,

    /// Frames created per cycle.
    #[arg(long, default_value_t = smoothskip::DEFAULT_CREATES_PER_CYCLE)]
    create: usize,

    /// Offset added to frame numbers read from the alternate clip.
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    offset: i64,

    /// Scene-change threshold (mean luma difference).
    #[arg(long, default_value_t = smoothskip::DEFAULT_SCENE_THRESHOLD)]
    scene: f64,

    /// Frame rate of frame directories (e.g. 24, 24000/1001, 23.976).
    #[arg(long, default_value = "24")]
    fps: FrameRate,
}

impl FilterArgs {
    fn options(&self) -> SmoothSkipOptions {
        SmoothSkipOptions::new()
            .with_cycle_length(self.cycle)
            .with_creates_per_cycle(self.create)
            .with_alternate_offset(self.offset)
            .with_scene_threshold(self.scene)
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print the shape of the output clip.
    #[command(
        about = "Print output length and frame rate",
        after_help = "Examples:\n  smoothskip info --source frames\n  smoothskip info --source frames --cycle 5 --create 1 --fps 24000/1001 --json"
    )]
    Info {
        /// Primary clip: a directory of frames, or a video file (`ffmpeg` feature).
        #[arg(long)]
        source: PathBuf,
        /// Alternate clip, checked for compatibility if given.
        #[arg(long)]
        alternate: Option<PathBuf>,
        #[command(flatten)]
        filter: FilterArgs,
        /// Output as machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// Print which source frame and clip every output frame is built from.
    #[command(
        about = "Print the output frame mapping",
        after_help = "Examples:\n  smoothskip plan --diffs diffs.txt\n  smoothskip plan --source frames --cycle 5 --json"
    )]
    Plan {
        /// Primary clip (directory or video file); differences are measured from it.
        #[arg(long, required_unless_present = "diffs", conflicts_with = "diffs")]
        source: Option<PathBuf>,
        /// File of precomputed differences, one per source frame.
        #[arg(long)]
        diffs: Option<PathBuf>,
        #[command(flatten)]
        filter: FilterArgs,
        /// Output as machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// Write the output clip as an image sequence.
    #[command(
        about = "Render the output clip",
        after_help = "Examples:\n  smoothskip render --source frames --alternate interpolated --out smooth\n  smoothskip render --source frames --alternate interpolated --out smooth --offset -1 --debug --progress"
    )]
    Render {
        /// Primary clip: a directory of frames, or a video file (`ffmpeg` feature).
        #[arg(long)]
        source: PathBuf,
        /// Alternate (interpolated) clip: a directory of frames or a video file.
        #[arg(long)]
        alternate: PathBuf,
        /// Output directory.
        #[arg(long)]
        out: PathBuf,
        #[command(flatten)]
        filter: FilterArgs,
        /// Write a diagnostic text file next to every frame.
        #[arg(long)]
        debug: bool,
        /// Output image extension (png, jpg, jpeg, bmp, tiff).
        #[arg(long, default_value = "png")]
        ext: String,
    },

    /// Generate shell completions.
    Completions {
        /// Target shell.
        shell: Shell,
    },
}

/// Drives an indicatif bar from filter progress reports.
struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    fn new(total: u64) -> Result<Self, Box<dyn std::error::Error>> {
        let bar = ProgressBar::new(total);
        let style =
            ProgressStyle::with_template("{spinner:.green} {bar:40.cyan/blue} {pos}/{len} {msg}")?;
        bar.set_style(style.progress_chars("##-"));
        Ok(Self { bar })
    }
}

impl ProgressCallback for BarProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        self.bar.set_position(info.current);
        if info.operation == OperationType::Planning {
            self.bar.set_message("planning");
        }
        if info.current_frame.is_none() {
            self.bar.finish_with_message("done");
        }
    }
}

/// Open a clip: a directory of frames, or a video file with the `ffmpeg` feature.
///
/// `rate` applies to frame directories only; video files carry their own.
fn open_source(
    path: &Path,
    rate: FrameRate,
) -> Result<Arc<dyn FrameSource>, Box<dyn std::error::Error>> {
    if path.is_file() {
        #[cfg(feature = "ffmpeg")]
        return Ok(Arc::new(VideoFileSource::open(path)?));

        #[cfg(not(feature = "ffmpeg"))]
        return Err(format!(
            "{} is a file; reading video files requires the `ffmpeg` feature",
            path.display()
        )
        .into());
    }
    Ok(Arc::new(ImageSequence::open(path, rate)?))
}

fn prepare_output_directory(
    out: &Path,
    overwrite: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if out.exists() {
        if !overwrite {
            return Err(format!(
                "output directory already exists: {} (use --overwrite)",
                out.display()
            )
            .into());
        }
        eprintln!(
            "{} {}",
            "warning:".yellow().bold(),
            format!("writing into existing directory {}", out.display()).yellow()
        );
    }
    fs::create_dir_all(out)?;
    Ok(())
}

fn apply_global_options(global: &GlobalOptions) {
    if let Some(threads) = global.threads {
        if threads > 0 {
            unsafe {
                std::env::set_var("RAYON_NUM_THREADS", threads.to_string());
            }
        }
    }

    #[cfg(not(feature = "rayon"))]
    if global.threads.is_some() {
        eprintln!(
            "{} {}",
            "warning:".yellow().bold(),
            "--threads requires building with the `rayon` feature".yellow()
        );
    }
}

#[cfg(not(feature = "rayon"))]
fn render_options(
    global: &GlobalOptions,
    total: u64,
) -> Result<RenderOptions, Box<dyn std::error::Error>> {
    let mut options = RenderOptions::new().with_batch_size((total / 200).max(1));
    if global.progress {
        options = options.with_progress(Arc::new(BarProgress::new(total)?));
    }
    Ok(options)
}

fn entry_json(entry: &FrameMapEntry) -> Value {
    json!({
        "output_frame": entry.dst_frame,
        "source_frame": entry.src_frame,
        "clip": clip_label(entry.use_alternate),
    })
}

fn cycle_json(snapshot: &CycleSnapshot) -> Value {
    json!({
        "index": snapshot.cycle_index,
        "scene_change": snapshot.has_scene_change,
        "frames": snapshot.frames.iter().map(|frame| json!({
            "frame": frame.frame,
            "diff": frame.diff,
            "class": frame.class.to_string(),
        })).collect::<Vec<_>>(),
    })
}

fn clip_label(use_alternate: bool) -> &'static str {
    if use_alternate { "B" } else { "A" }
}

/// One snapshot per cycle, taken at the cycle's first output frame.
fn cycle_snapshots(
    mapper: &FrameMapper,
) -> Result<Vec<CycleSnapshot>, smoothskip::SmoothSkipError> {
    let step = mapper.cache().output_cycle_length() as u64;
    (0..mapper.output_frame_count())
        .step_by(step as usize)
        .map(|frame| mapper.inspect(frame))
        .collect()
}

fn save_frame(
    out: &Path,
    ext: &str,
    frame: &OutputFrame,
    overwrite: bool,
    verbose: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let number = frame.frame_number;
    let output_path = out.join(format!("frame_{number:06}.{ext}"));
    if output_path.exists() && !overwrite {
        return Err(format!(
            "output file already exists: {} (use --overwrite)",
            output_path.display()
        )
        .into());
    }
    frame.image.save(&output_path)?;

    if let Some(overlay) = &frame.overlay {
        fs::write(out.join(format!("frame_{number:06}.txt")), format!("{overlay}\n"))?;
    }

    if verbose {
        eprintln!(
            "saved frame {number} <- {} clip {} -> {}",
            frame.selection.index,
            clip_label(frame.selection.use_alternate),
            output_path.display()
        );
    }
    Ok(())
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    apply_global_options(&cli.global);

    match cli.command {
        Commands::Info {
            source,
            alternate,
            filter,
            json,
        } => {
            let primary = open_source(&source, filter.fps)?;
            let alternate = match alternate {
                Some(path) => open_source(&path, filter.fps)?,
                None => Arc::clone(&primary),
            };
            let smooth = SmoothSkip::new(primary.clone(), alternate, filter.options())?;
            let info = smooth.output_info();

            if json {
                let payload = json!({
                    "source_frames": info.source_frame_count,
                    "source_fps": primary.frame_rate().to_string(),
                    "output_frames": info.frame_count,
                    "output_fps": info.frame_rate.to_string(),
                    "output_fps_decimal": info.frame_rate.as_f64(),
                    "width": info.dimensions.0,
                    "height": info.dimensions.1,
                    "cycle": filter.cycle,
                    "create": filter.create,
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                println!("Source: {}", source.display());
                println!("Dimensions: {}x{}", info.dimensions.0, info.dimensions.1);
                println!(
                    "Source frames: {} at {} fps",
                    info.source_frame_count,
                    primary.frame_rate()
                );
                println!(
                    "Output frames: {} at {} fps ({:.3})",
                    info.frame_count,
                    info.frame_rate,
                    info.frame_rate.as_f64()
                );
            }
        }
        Commands::Plan {
            source,
            diffs,
            filter,
            json,
        } => {
            let options = filter.options();
            let (mapper, source_rate) = match (source, diffs) {
                (_, Some(path)) => {
                    let metric = PrecomputedDifferences::parse(&fs::read_to_string(&path)?)?;
                    let count = metric.len() as u64;
                    let mapper = FrameMapper::new(&options, count, Arc::new(metric))?;
                    (mapper, filter.fps)
                }
                (Some(path), None) => {
                    let primary = open_source(&path, filter.fps)?;
                    let count = primary.frame_count();
                    let rate = primary.frame_rate();
                    let metric = Arc::new(LumaDifference::new(primary));
                    (FrameMapper::new(&options, count, metric)?, rate)
                }
                (None, None) => return Err("either --source or --diffs is required".into()),
            };

            let total = mapper.output_frame_count();
            let progress = cli.global.progress.then(|| BarProgress::new(total)).transpose()?;
            let mut entries = Vec::new();
            for output_frame in 0..total {
                entries.push(mapper.resolve(output_frame)?);
                if let Some(progress) = &progress {
                    progress.bar.inc(1);
                }
            }
            if let Some(progress) = progress {
                progress.bar.finish_and_clear();
            }

            let cycles = cycle_snapshots(&mapper)?;
            let output_rate = source_rate
                .scaled(options.output_cycle_length() as u64, options.cycle_length as u64);

            if json {
                let payload = json!({
                    "source_frames": mapper.source_frame_count(),
                    "output_frames": total,
                    "output_fps": output_rate.to_string(),
                    "cycles": cycles.iter().map(cycle_json).collect::<Vec<_>>(),
                    "entries": entries.iter().map(entry_json).collect::<Vec<_>>(),
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                for snapshot in &cycles {
                    let marker = if snapshot.has_scene_change {
                        " (scene change)".yellow().to_string()
                    } else {
                        String::new()
                    };
                    println!("{}{marker}", format!("cycle {}", snapshot.cycle_index).bold());
                    for frame in &snapshot.frames {
                        println!("  {} {} ({:.5})", frame.class.marker(), frame.frame, frame.diff);
                    }
                }
                println!();
                println!("{:>8}  {:>8}  clip", "output", "source");
                for entry in &entries {
                    let clip = clip_label(entry.use_alternate);
                    let clip = if entry.use_alternate {
                        clip.cyan().to_string()
                    } else {
                        clip.to_string()
                    };
                    println!("{:>8}  {:>8}  {clip}", entry.dst_frame, entry.src_frame);
                }
                println!(
                    "{} {}",
                    "success:".green().bold(),
                    format!(
                        "{} source frame(s) map to {total} output frame(s) at {output_rate} fps",
                        mapper.source_frame_count()
                    )
                    .green()
                );
            }
        }
        Commands::Render {
            source,
            alternate,
            out,
            filter,
            debug,
            ext,
        } => {
            prepare_output_directory(&out, cli.global.overwrite)?;

            let primary = open_source(&source, filter.fps)?;
            let alternate = open_source(&alternate, filter.fps)?;
            let smooth = SmoothSkip::new(primary, alternate, filter.options().with_debug(debug))?;
            let total = smooth.output_info().frame_count;
            let ext = ext.trim_start_matches('.').to_ascii_lowercase();

            // Rendering in chunks keeps at most one chunk of frames in memory.
            #[cfg(feature = "rayon")]
            {
                const CHUNK: u64 = 64;
                let progress = cli.global.progress.then(|| BarProgress::new(total)).transpose()?;
                let options = RenderOptions::new();
                for start in (0..total).step_by(CHUNK as usize) {
                    for frame in smooth.frames_parallel(start..start + CHUNK, &options)? {
                        save_frame(&out, &ext, &frame, cli.global.overwrite, cli.global.verbose)?;
                        if let Some(progress) = &progress {
                            progress.bar.inc(1);
                        }
                    }
                }
                if let Some(progress) = progress {
                    progress.bar.finish_with_message("done");
                }
            }

            #[cfg(not(feature = "rayon"))]
            {
                let options = render_options(&cli.global, total)?;
                smooth.for_each_frame(0..total, &options, |_, frame| {
                    save_frame(&out, &ext, &frame, cli.global.overwrite, cli.global.verbose)
                        .map_err(|error| {
                            smoothskip::SmoothSkipError::FrameSourceError(error.to_string())
                        })
                })?;
            }

            println!(
                "{} {}",
                "success:".green().bold(),
                format!("Rendered {total} frame(s) to {}", out.display()).green()
            );
        }
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "smoothskip", &mut std::io::stdout());
        }
    }

    Ok(())
}

fn main() {
    if let Err(error) = run() {
        eprintln!("{} {error}", "error:".red().bold());
        std::process::exit(1);
    }
}
