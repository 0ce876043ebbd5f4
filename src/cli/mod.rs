//! CLI module for Framex
//!
//! This module handles command-line argument parsing.

use clap::Parser;

/// Framex Video Frame Extractor
///
/// Extracts a video file into a sequence of still JPEG frames through an
/// external FFmpeg executable, with live progress reporting.
#[derive(Parser, Debug)]
#[command(name = "framex")]
#[command(about = "Framex - extract still frames from a video file")]
#[command(version)]
#[command(long_about = None)]
pub struct Cli {
    /// Input video file path
    pub input: String,

    /// Directory to write extracted frames into
    #[arg(short, long)]
    pub output_dir: String,

    /// Extraction frame rate override (default: the video's native rate)
    #[arg(long)]
    pub frame_rate: Option<f64>,

    /// Path to an FFmpeg executable, bypassing the bundled binaries
    #[arg(long, env = "FRAMEX_FFMPEG")]
    pub ffmpeg: Option<String>,

    /// Directory holding the bundled FFmpeg binaries
    #[arg(long, env = "FRAMEX_RESOURCE_DIR", default_value = "resources")]
    pub resource_dir: String,

    /// Emit progress snapshots as JSON lines on standard output
    #[arg(long)]
    pub json: bool,
}
