//! Framex Video Frame Extractor Library
//!
//! Drives an external FFmpeg executable to probe a video's metadata and
//! render it as a sequence of still JPEG frames, exposing live progress and
//! cooperative cancellation to the caller.

pub mod cli;
pub mod engine;
pub mod error;
pub mod interval;
pub mod locator;
pub mod planner;
pub mod probe;

// Re-export commonly used types
pub use engine::{
    ExtractionOutcome, ExtractionPhase, ExtractionRequest, ExtractionRunner, ProgressObserver,
    ProgressSnapshot, ProgressTracker, SystemSpawner, ToolProcess, ToolSpawner,
};
pub use error::{FramexError, FramexResult};
pub use interval::Interval;
pub use locator::{BundledLocator, ExecutableLocator, FixedLocator, Platform, SystemLocator};
pub use planner::{plan_resolution, TargetResolution};
pub use probe::{AspectRatio, Resolution, VideoInfo, VideoProbe};
