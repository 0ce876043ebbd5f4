//! End-to-end extraction orchestration

use std::fs;
use std::fs::File;

use once_cell::sync::Lazy;
use regex::Regex;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::engine::{
    ExtractionOutcome, ExtractionPhase, ExtractionRequest, ProgressTracker, ToolProcess,
    ToolSpawner,
};
use crate::error::{FramexError, FramexResult};
use crate::interval::Interval;
use crate::locator::{ExecutableLocator, Platform};
use crate::planner::plan_resolution;
use crate::probe::VideoProbe;

/// Total duration of the input file, as printed once near the start of the
/// tool's diagnostic output
static DURATION_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Duration:\s*(\d{2}:\d{2}:\d{2}\.\d{2})").expect("duration pattern is valid")
});

/// One progress update: current frame count, instantaneous frame rate and
/// elapsed time
static PROGRESS_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"frame=\s*(?P<frame>\d+)\s*fps=\s*(?P<fps>[.\d]+)\s*q=\s*-?[.\d]+\s*size=\s*\S+\s*time=\s*(?P<time>[:.\d]+)",
    )
    .expect("progress pattern is valid")
});

/// Name of the artifact recording the effective extraction frame rate
const FRAME_RATE_FILE: &str = "frame_rate.txt";

#[cfg(windows)]
const LINE_TERMINATOR: &str = "\r\n";
#[cfg(not(windows))]
const LINE_TERMINATOR: &str = "\n";

/// How the subprocess line loop ended
enum LineLoopEnd {
    /// End of stream was reached without cancellation
    Finished { total_duration: Option<Interval> },
    /// A cancellation request was observed
    Cancelled,
}

/// Orchestrates one frame extraction from validation through completion.
///
/// The runner validates the request, probes the video, plans the output
/// resolution, persists the effective frame rate, then supervises the
/// extraction subprocess while streaming its progress into a
/// [`ProgressTracker`]. `run` blocks; callers put it on a dedicated worker
/// and observe the tracker from their own context.
pub struct ExtractionRunner<L, S> {
    locator: L,
    spawner: S,
    platform: Platform,
    tracker: ProgressTracker,
}

impl<L, S> ExtractionRunner<L, S>
where
    L: ExecutableLocator,
    S: ToolSpawner,
{
    /// Create a runner for the current platform
    pub fn new(locator: L, spawner: S) -> Self {
        Self {
            locator,
            spawner,
            platform: Platform::current(),
            tracker: ProgressTracker::new(),
        }
    }

    /// Create a runner for an explicit platform descriptor
    pub fn with_platform(locator: L, spawner: S, platform: Platform) -> Self {
        Self {
            locator,
            spawner,
            platform,
            tracker: ProgressTracker::new(),
        }
    }

    /// Handle to the shared progress state; clone freely across threads
    pub fn tracker(&self) -> ProgressTracker {
        self.tracker.clone()
    }

    /// Run one extraction to a terminal outcome.
    ///
    /// Cancellation yields `Ok(ExtractionOutcome::Cancelled)`; every error
    /// is terminal and reflected in the tracker as the `Failed` phase.
    pub fn run(&self, request: ExtractionRequest) -> FramexResult<ExtractionOutcome> {
        match self.run_to_completion(&request) {
            Ok(outcome) => Ok(outcome),
            Err(error) => {
                self.tracker
                    .set_indeterminate(ExtractionPhase::Failed, format!("Failed: {}", error));
                Err(error)
            }
        }
    }

    fn run_to_completion(&self, request: &ExtractionRequest) -> FramexResult<ExtractionOutcome> {
        self.tracker
            .set_indeterminate(ExtractionPhase::Validating, "Starting process");
        info!(
            "Starting extraction: {} -> {}",
            request.video_path.display(),
            request.output_directory.display()
        );

        let base_name = self.validate(request)?;

        let executable = self.locator.locate(&self.platform)?;
        debug!("Using tool executable at {}", executable.display());

        self.tracker
            .set_indeterminate(ExtractionPhase::Probing, "Getting video information");
        let video_info = VideoProbe::probe(&self.spawner, &executable, &request.video_path)?;

        self.tracker
            .set_indeterminate(ExtractionPhase::Planning, "Planning extraction");
        let effective_rate = request
            .frame_rate_override
            .unwrap_or(video_info.frame_rate);
        let target = plan_resolution(video_info.resolution, video_info.aspect_ratio);
        info!(
            "Extracting at {} fps, output resolution {}",
            effective_rate, target
        );

        // Persisted before launch so the artifact exists even if the
        // extraction itself is later cancelled
        let frame_rate_path = request.output_directory.join(FRAME_RATE_FILE);
        fs::write(
            &frame_rate_path,
            format!("{}{}", effective_rate, LINE_TERMINATOR),
        )?;

        let output_pattern = request
            .output_directory
            .join(format!("{}_%07d.jpg", base_name));
        let args = vec![
            "-i".to_string(),
            request.video_path.display().to_string(),
            "-r".to_string(),
            effective_rate.to_string(),
            "-s".to_string(),
            target.to_string(),
            "-f".to_string(),
            "image2".to_string(),
            output_pattern.display().to_string(),
        ];

        self.tracker
            .set_indeterminate(ExtractionPhase::Extracting, "Extracting video length");
        let mut process = self.spawner.spawn(&executable, &args)?;

        match self.stream_progress(&mut process) {
            Ok(LineLoopEnd::Cancelled) => {
                process.kill()?;
                self.tracker
                    .set_indeterminate(ExtractionPhase::Cancelled, "Cancelled");
                info!("Extraction cancelled");
                Ok(ExtractionOutcome::Cancelled)
            }
            Ok(LineLoopEnd::Finished { total_duration }) => {
                process.wait()?;
                // A zero-length or unknown total still renders as complete
                let denominator = total_duration
                    .map(|total| total.as_millis() as i64)
                    .unwrap_or(1)
                    .max(1);
                self.tracker.set_ratio(
                    ExtractionPhase::Completed,
                    denominator,
                    denominator,
                    "Finished",
                );
                info!("Extraction finished");
                Ok(ExtractionOutcome::Completed)
            }
            Err(error) => {
                // The child must never outlive a failed run
                let _ = process.kill();
                Err(error)
            }
        }
    }

    /// Check the input and output locations before any subprocess exists.
    ///
    /// Returns the input file's base name, used in the output pattern.
    fn validate(&self, request: &ExtractionRequest) -> FramexResult<String> {
        let video_path = &request.video_path;
        if !video_path.exists() {
            return Err(FramexError::Validation {
                message: format!("Input video file {} does not exist", video_path.display()),
            });
        }
        File::open(video_path).map_err(|error| FramexError::Validation {
            message: format!(
                "Input video file {} is not readable: {}",
                video_path.display(),
                error
            ),
        })?;

        let base_name = video_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| FramexError::Validation {
                message: format!("Input video path {} has no file name", video_path.display()),
            })?;

        let output_dir = &request.output_directory;
        if !output_dir.is_dir() {
            fs::create_dir_all(output_dir).map_err(|error| FramexError::Validation {
                message: format!(
                    "Output directory {} does not exist and could not be created: {}",
                    output_dir.display(),
                    error
                ),
            })?;
        }
        // Write probe; the temporary file is removed when dropped
        NamedTempFile::new_in(output_dir).map_err(|error| FramexError::Validation {
            message: format!(
                "Output directory {} is not writable: {}",
                output_dir.display(),
                error
            ),
        })?;

        Ok(base_name)
    }

    /// Drive the subprocess line loop, updating the tracker per line.
    ///
    /// The cancellation flag is polled before each read, so a stalled
    /// subprocess delays cancellation until its next line; no read timeout
    /// is enforced. A matched but malformed duration or progress field is a
    /// hard failure of the whole run.
    fn stream_progress<P: ToolProcess>(&self, process: &mut P) -> FramexResult<LineLoopEnd> {
        let mut total_duration: Option<Interval> = None;

        loop {
            if self.tracker.is_cancel_requested() {
                return Ok(LineLoopEnd::Cancelled);
            }

            let line = match process.next_line()? {
                Some(line) => line,
                None => return Ok(LineLoopEnd::Finished { total_duration }),
            };
            debug!("Tool output: {}", line);

            if total_duration.is_none() {
                if let Some(captures) = DURATION_PATTERN.captures(&line) {
                    let duration = Interval::parse(&captures[1])?;
                    total_duration = Some(duration);
                    self.tracker.set_ratio(
                        ExtractionPhase::Extracting,
                        0,
                        duration.as_millis() as i64,
                        "Extracting frames",
                    );
                }
            }

            if let Some(captures) = PROGRESS_PATTERN.captures(&line) {
                let fps: f64 =
                    captures["fps"]
                        .parse()
                        .map_err(|_| FramexError::Format {
                            text: line.clone(),
                        })?;
                let elapsed = Interval::parse(&captures["time"])?;
                let message = format!("Extracting frames at {} frames/second", fps.round() as i64);

                match total_duration {
                    Some(total) => self.tracker.set_ratio(
                        ExtractionPhase::Extracting,
                        elapsed.as_millis() as i64,
                        total.as_millis() as i64,
                        message,
                    ),
                    None => self
                        .tracker
                        .set_indeterminate(ExtractionPhase::Extracting, message),
                }
            }
        }
    }
}
