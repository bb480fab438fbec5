use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use gps_tracker_rs::{ChannelSource, NullPresenter, PositionSample, TrackSessionController};

/// Replay a recorded fix log through the tracking core and print the
/// export document.
#[derive(Parser, Debug)]
struct Args {
    /// Path to a JSON array of position samples
    #[arg(long)]
    log: PathBuf,

    /// Print only the derived stats instead of the full export
    #[arg(long, default_value_t = false)]
    stats_only: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let raw = fs::read_to_string(&args.log)
        .with_context(|| format!("reading {}", args.log.display()))?;
    let samples: Vec<PositionSample> = serde_json::from_str(&raw).context("parsing fix log")?;

    // The clock follows the log's timestamps so replays are deterministic
    let start_ms = samples.first().map(|s| s.timestamp).unwrap_or(0);
    let clock = Arc::new(AtomicI64::new(start_ms));
    let clock_for_controller = Arc::clone(&clock);

    let source = ChannelSource::new();
    let handle = source.handle();
    let mut controller = TrackSessionController::with_clock(
        source,
        NullPresenter,
        Box::new(move || clock_for_controller.load(Ordering::Relaxed)),
    );

    controller.start()?;

    let mut replayed = 0usize;
    for sample in samples {
        clock.store(sample.timestamp, Ordering::Relaxed);
        handle.push_sample(sample);
        controller.pump();
        replayed += 1;
        if replayed % 100 == 0 {
            log::info!("{} fixes replayed", replayed);
        }
    }
    log::info!("{} fixes replayed in total", replayed);

    controller.stop();

    let export = controller.export();
    if args.stats_only {
        println!("{}", serde_json::to_string_pretty(&export.stats)?);
    } else {
        println!("{}", export.to_json()?);
    }
    Ok(())
}
