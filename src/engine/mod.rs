//! Core frame extraction engine module

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub mod process;
pub mod progress;
pub mod runner;

pub use process::{SystemSpawner, ToolProcess, ToolSpawner};
pub use progress::{ExtractionPhase, ProgressObserver, ProgressSnapshot, ProgressTracker};
pub use runner::ExtractionRunner;

/// One frame extraction request, immutable once created
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionRequest {
    /// Path to the video file to read
    pub video_path: PathBuf,
    /// Directory to put still frames in
    pub output_directory: PathBuf,
    /// Extraction frame rate override; the video's native rate when absent
    pub frame_rate_override: Option<f64>,
}

/// Terminal outcome of an extraction run that did not fail.
///
/// Cancellation is a distinct outcome, never an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionOutcome {
    /// The subprocess ran to completion and was waited on
    Completed,
    /// A cancellation request was honored and the subprocess terminated
    Cancelled,
}
