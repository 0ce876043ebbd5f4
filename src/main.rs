//! Framex Video Frame Extractor
//!
//! A command-line tool that extracts a video file into a sequence of still
//! JPEG frames through an external FFmpeg executable.
//!
//! # Usage
//!
//! ```bash
//! framex video.mov --output-dir frames/
//! framex video.mov --output-dir frames/ --frame-rate 29.97
//! framex video.mov --output-dir frames/ --ffmpeg /usr/bin/ffmpeg --json
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use framex_cli::cli::Cli;
use framex_cli::{
    BundledLocator, ExecutableLocator, ExtractionOutcome, ExtractionRequest, ExtractionRunner,
    FixedLocator, ProgressObserver, ProgressSnapshot, SystemSpawner,
};

/// Observer that renders progress snapshots on the terminal
struct ConsoleObserver {
    json: bool,
}

impl ProgressObserver for ConsoleObserver {
    fn progress_changed(&self, snapshot: &ProgressSnapshot) {
        if self.json {
            if let Ok(line) = serde_json::to_string(snapshot) {
                println!("{}", line);
            }
        } else if let Some(fraction) = snapshot.fraction() {
            println!("[{:>3.0}%] {}", fraction * 100.0, snapshot.message);
        } else {
            println!("[ ...] {}", snapshot.message);
        }
    }
}

/// Main entry point for the Framex CLI application
fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    info!("Starting Framex frame extraction");

    let request = ExtractionRequest {
        video_path: PathBuf::from(&cli.input),
        output_directory: PathBuf::from(&cli.output_dir),
        frame_rate_override: cli.frame_rate,
    };

    let locator: Box<dyn ExecutableLocator> = match &cli.ffmpeg {
        Some(path) => Box::new(FixedLocator::new(path)),
        None => Box::new(BundledLocator::new(&cli.resource_dir)),
    };

    let runner = ExtractionRunner::new(locator, SystemSpawner);
    let tracker = runner.tracker();
    tracker.subscribe(Arc::new(ConsoleObserver { json: cli.json }));

    // One dedicated worker per extraction; the tracker stays observable
    // from this thread
    let worker = thread::spawn(move || runner.run(request));
    let outcome = worker
        .join()
        .map_err(|_| anyhow::anyhow!("extraction worker panicked"))??;

    match outcome {
        ExtractionOutcome::Completed => info!("Extraction completed successfully"),
        ExtractionOutcome::Cancelled => info!("Extraction cancelled"),
    }

    Ok(())
}
