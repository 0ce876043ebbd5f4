//! Output resolution planning

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::probe::{AspectRatio, Resolution};

/// Pixel resolution the extracted frames are stored at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetResolution {
    /// Width in pixels, corrected for the display aspect ratio
    pub horizontal: u32,
    /// Height in pixels, always equal to the source height
    pub vertical: u32,
}

impl fmt::Display for TargetResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.horizontal, self.vertical)
    }
}

/// Compute the output resolution that reproduces the display aspect ratio
/// with square stored pixels.
///
/// Frames are stored with a 1:1 pixel aspect, so the stored width must be
/// scaled whenever the source pixels are anamorphic. The height is copied
/// unchanged and the width is rounded to the nearest pixel.
pub fn plan_resolution(native: Resolution, aspect_ratio: AspectRatio) -> TargetResolution {
    let input_aspect = native.horizontal as f64 / native.vertical as f64;
    let desired_aspect = aspect_ratio.as_decimal();

    let horizontal = (native.horizontal as f64 * (desired_aspect / input_aspect)).round() as u32;

    TargetResolution {
        horizontal,
        vertical: native.vertical,
    }
}
