//! CLI Entry Point for arv-stream
//!
//! Drives the acquisition pipeline against the simulated camera:
//! - `grab`: one normalized frame
//! - `batch`: a bounded batch, per-frame failures reported in place
//! - `stream`: a lazy stream of `--count` frames, or unbounded until the
//!   process is killed (no signal handler, so an unbounded run skips the
//!   orderly camera teardown)
//!
//! # Usage
//!
//! ```bash
//! arv-stream --width 640 --height 512 --bits 16 stream --count 30 --max-fps 30
//! ```

use anyhow::{bail, Context, Result};
use arv_stream::config::{AcqConfig, DEFAULT_CONFIG_PATH};
use arv_stream::hardware::mock::MockFrameSource;
use arv_stream::{
    acquire_frame, acquire_frames, frame_stream, logging, AcqResult, NormalizedFrame, PixelFormat,
};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "arv-stream")]
#[command(about = "Acquire and contrast-stretch camera frames", long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Override the configured log level
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Override the configured buffer pool size
    #[arg(long, global = true)]
    pool_size: Option<usize>,

    /// Simulated sensor width
    #[arg(long, global = true, default_value_t = 640)]
    width: u32,

    /// Simulated sensor height
    #[arg(long, global = true, default_value_t = 512)]
    height: u32,

    /// Simulated pixel depth (8, 10, 12, 16 or 24)
    #[arg(long, global = true, default_value_t = 16)]
    bits: u32,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Acquire a single frame
    Grab,

    /// Acquire a fixed number of frames
    Batch {
        /// Number of frames
        #[arg(long, default_value_t = 10)]
        count: usize,
    },

    /// Stream frames lazily
    Stream {
        /// Stop after this many frames (default: unbounded, until the process is killed)
        #[arg(long)]
        count: Option<u64>,

        /// Hardware frames consumed per printed frame
        #[arg(long)]
        step: Option<u32>,

        /// Maximum frames per second
        #[arg(long)]
        max_fps: Option<f64>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AcqConfig::load_from(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    if let Some(pool_size) = cli.pool_size {
        config.session.pool_size = pool_size;
    }
    if let Commands::Stream {
        count,
        step,
        max_fps,
    } = &cli.command
    {
        config.stream.count = count.or(config.stream.count);
        config.stream.step = step.unwrap_or(config.stream.step);
        config.stream.max_fps = max_fps.or(config.stream.max_fps);
    }
    config.validate()?;
    logging::init_from_config(&config)?;

    let camera = MockFrameSource::new(cli.width, cli.height, pixel_format(cli.bits)?)
        .with_model("arv-stream simulated camera");
    let session = config.session_config();

    match cli.command {
        Commands::Grab => {
            let frame = acquire_frame(camera, session)?;
            report(0, &Ok(frame));
        }
        Commands::Batch { count } => {
            let frames = acquire_frames(camera, session, count)?;
            let failed = frames.iter().filter(|f| f.is_err()).count();
            for (index, item) in frames.iter().enumerate() {
                report(index, item);
            }
            println!("{} frames, {failed} failed", frames.len());
        }
        Commands::Stream { .. } => {
            let stream = frame_stream(camera, session, config.stream_config())?;
            for (index, item) in stream.enumerate() {
                report(index, &item);
            }
        }
    }

    Ok(())
}

fn pixel_format(bits: u32) -> Result<PixelFormat> {
    Ok(match bits {
        8 => PixelFormat::MONO_8,
        10 => PixelFormat::MONO_10,
        12 => PixelFormat::MONO_12,
        16 => PixelFormat::MONO_16,
        24 => PixelFormat::RGB_8_PACKED,
        other => bail!("unsupported --bits {other}; expected 8, 10, 12, 16 or 24"),
    })
}

fn report(index: usize, item: &AcqResult<NormalizedFrame>) {
    match item {
        Ok(frame) if frame.is_empty() => {
            println!("#{index} frame {} empty", frame.frame_number);
        }
        Ok(frame) => {
            let (min, max, sum) = frame
                .data
                .iter()
                .fold((u8::MAX, u8::MIN, 0u64), |(lo, hi, sum), &v| {
                    (lo.min(v), hi.max(v), sum + u64::from(v))
                });
            let mean = sum as f64 / frame.len() as f64;
            println!(
                "#{index} frame {} {}x{} from {}-bit: min {min} max {max} mean {mean:.1}",
                frame.frame_number, frame.width, frame.height, frame.source_bits
            );
        }
        Err(e) => println!("#{index} error: {e}"),
    }
}
