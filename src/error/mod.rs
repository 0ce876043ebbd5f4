//! Error handling module for Framex

use thiserror::Error;

/// Main error type for Framex operations
#[derive(Error, Debug)]
pub enum FramexError {
    /// Input or output location failed pre-launch validation
    #[error("Validation failed: {message}")]
    Validation { message: String },

    /// The tool produced no usable metadata for the input video
    #[error("Failed to probe video metadata: {message}")]
    Probe { message: String },

    /// A timestamp or progress field did not match the expected pattern
    #[error("Text {text:?} does not match the expected format")]
    Format { text: String },

    /// The transcoding subprocess could not be started
    #[error("Failed to start {tool}: {message}")]
    ProcessStart { tool: String, message: String },

    /// No runnable transcoding executable for the current platform
    #[error("No FFmpeg executable available for platform: {platform}")]
    ToolUnavailable { platform: String },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Framex operations
pub type FramexResult<T> = std::result::Result<T, FramexError>;
