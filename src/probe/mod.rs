//! Video metadata probing through the tool's diagnostic output

use std::fmt;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::engine::{ToolProcess, ToolSpawner};
use crate::error::{FramexError, FramexResult};

/// A 1-3 digit integer immediately followed by the "fps" token
static FRAME_RATE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{1,3})\sfps").expect("frame rate pattern is valid"));

/// Resolution plus display aspect ratio, as FFmpeg prints them for a video
/// stream: `WIDTHxHEIGHT [SAR a:b DAR c:d]`
static ASPECT_RATIO_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?P<resx>\d+)x(?P<resy>\d+) \[SAR \d{1,2}:\d{1,2} DAR (?P<aspectn>\d{1,2}):(?P<aspectd>\d{1,2})\]",
    )
    .expect("aspect ratio pattern is valid")
});

/// Pixel resolution of a video stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    /// Width in pixels
    pub horizontal: u32,
    /// Height in pixels
    pub vertical: u32,
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.horizontal, self.vertical)
    }
}

/// Display aspect ratio of a video, for example 16:9
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AspectRatio {
    /// Ratio numerator
    pub numerator: u32,
    /// Ratio denominator, never zero on a successful probe
    pub denominator: u32,
}

impl AspectRatio {
    /// Decimal form of this aspect ratio
    pub fn as_decimal(&self) -> f64 {
        self.numerator as f64 / self.denominator as f64
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.numerator, self.denominator)
    }
}

/// Metadata recovered from one probe run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VideoInfo {
    /// Native frame rate, greater than zero
    pub frame_rate: f64,
    /// Stored pixel resolution
    pub resolution: Resolution,
    /// Display aspect ratio
    pub aspect_ratio: AspectRatio,
}

/// Video metadata prober
pub struct VideoProbe;

impl VideoProbe {
    /// Probe a video file by running the tool in metadata-dump mode.
    ///
    /// Launches `<executable> -i <video>` and scans the merged diagnostic
    /// stream line by line until end of stream, keeping the last successful
    /// capture of the frame rate and resolution/aspect patterns. Fails with
    /// [`FramexError::Probe`] when either is never found; a zero-valued
    /// [`VideoInfo`] is never returned.
    pub fn probe<S: ToolSpawner>(
        spawner: &S,
        executable: &Path,
        video_path: &Path,
    ) -> FramexResult<VideoInfo> {
        info!("Probing video metadata: {}", video_path.display());

        let args = vec!["-i".to_string(), video_path.display().to_string()];
        let mut process = spawner.spawn(executable, &args)?;

        let mut frame_rate = 0.0_f64;
        let mut resolution: Option<Resolution> = None;
        let mut aspect_ratio: Option<AspectRatio> = None;

        loop {
            let line = match process.next_line() {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(error) => {
                    let _ = process.kill();
                    return Err(error);
                }
            };
            debug!("Probe output: {}", line);

            if let Some(captures) = FRAME_RATE_PATTERN.captures(&line) {
                if let Ok(rate) = captures[1].parse::<f64>() {
                    frame_rate = rate;
                }
            }

            if let Some(captures) = ASPECT_RATIO_PATTERN.captures(&line) {
                let parsed = Self::parse_aspect_capture(&captures);
                if let Some((parsed_resolution, parsed_aspect)) = parsed {
                    resolution = Some(parsed_resolution);
                    aspect_ratio = Some(parsed_aspect);
                }
            }
        }

        // The probe child is fully drained before the handle is released
        process.wait()?;

        match (resolution, aspect_ratio) {
            (Some(resolution), Some(aspect_ratio)) if frame_rate > 0.0 => {
                let info = VideoInfo {
                    frame_rate,
                    resolution,
                    aspect_ratio,
                };
                info!(
                    "Probed {} at {} fps, display aspect {}",
                    info.resolution, info.frame_rate, info.aspect_ratio
                );
                Ok(info)
            }
            _ => Err(FramexError::Probe {
                message: "FFmpeg did not report the video frame rate and aspect ratio".to_string(),
            }),
        }
    }

    /// Turn one aspect pattern capture into a resolution and aspect ratio.
    ///
    /// A zero aspect denominator or an out-of-range dimension invalidates
    /// the whole capture, leaving any earlier capture in place.
    fn parse_aspect_capture(captures: &regex::Captures<'_>) -> Option<(Resolution, AspectRatio)> {
        let horizontal = captures["resx"].parse::<u32>().ok()?;
        let vertical = captures["resy"].parse::<u32>().ok()?;
        let numerator = captures["aspectn"].parse::<u32>().ok()?;
        let denominator = captures["aspectd"].parse::<u32>().ok()?;
        if vertical == 0 || denominator == 0 {
            return None;
        }

        Some((
            Resolution {
                horizontal,
                vertical,
            },
            AspectRatio {
                numerator,
                denominator,
            },
        ))
    }
}
