//! Output dimensions: named image sizes per model family and video sizes.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::VariationError;

/// Width and height in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Parses a literal `WIDTHxHEIGHT`.
    pub fn parse_literal(value: &str) -> Option<Self> {
        let (width, height) = value.trim().split_once(['x', 'X'])?;
        let width = width.trim().parse().ok().filter(|w| *w > 0)?;
        let height = height.trim().parse().ok().filter(|h| *h > 0)?;
        Some(Self::new(width, height))
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

const IMAGE3_SIZES: &[(&str, Dimensions)] = &[
    ("square", Dimensions::new(2048, 2048)),
    ("square1024", Dimensions::new(1024, 1024)),
    ("landscape", Dimensions::new(2304, 1792)),
    ("portrait", Dimensions::new(1792, 2304)),
    ("widescreen", Dimensions::new(2688, 1536)),
    ("7:4", Dimensions::new(1344, 768)),
    ("9:7", Dimensions::new(1152, 896)),
    ("7:9", Dimensions::new(896, 1152)),
    ("16:9", Dimensions::new(2688, 1536)),
    ("1:1", Dimensions::new(2048, 2048)),
    ("4:3", Dimensions::new(2304, 1792)),
    ("3:4", Dimensions::new(1792, 2304)),
    ("ultrawide", Dimensions::new(2688, 1536)),
    ("wide", Dimensions::new(2688, 1536)),
];

const IMAGE4_SIZES: &[(&str, Dimensions)] = &[
    ("square", Dimensions::new(2048, 2048)),
    ("landscape", Dimensions::new(2304, 1792)),
    ("portrait", Dimensions::new(1792, 2304)),
    ("widescreen", Dimensions::new(2688, 1536)),
    ("9:16", Dimensions::new(1440, 2560)),
    ("1:1", Dimensions::new(2048, 2048)),
    ("4:3", Dimensions::new(2304, 1792)),
    ("3:4", Dimensions::new(1792, 2304)),
    ("16:9", Dimensions::new(2688, 1536)),
    ("ultrawide", Dimensions::new(2688, 1536)),
    ("wide", Dimensions::new(2688, 1536)),
];

const VIDEO_SIZES: &[(&str, Dimensions)] = &[
    ("960x540", Dimensions::new(960, 540)),
    ("540x960", Dimensions::new(540, 960)),
    ("540x540", Dimensions::new(540, 540)),
    ("sq540p", Dimensions::new(540, 540)),
    ("1280x720", Dimensions::new(1280, 720)),
    ("720p", Dimensions::new(1280, 720)),
    ("720x1280", Dimensions::new(720, 1280)),
    ("v720p", Dimensions::new(720, 1280)),
    ("720x720", Dimensions::new(720, 720)),
    ("sq720p", Dimensions::new(720, 720)),
    ("1920x1080", Dimensions::new(1920, 1080)),
    ("1080p", Dimensions::new(1920, 1080)),
    ("1080x1920", Dimensions::new(1080, 1920)),
    ("v1080p", Dimensions::new(1080, 1920)),
    ("1080x1080", Dimensions::new(1080, 1080)),
    ("sq1080p", Dimensions::new(1080, 1080)),
];

/// Named sizes for a normalized model name; empty for unknown families.
pub fn image_sizes(model: &str) -> &'static [(&'static str, Dimensions)] {
    match model {
        "image3" | "image3_custom" => IMAGE3_SIZES,
        "image4" | "image4_standard" | "image4_ultra" => IMAGE4_SIZES,
        _ => &[],
    }
}

fn lookup(table: &[(&str, Dimensions)], name: &str) -> Option<Dimensions> {
    table
        .iter()
        .find(|(candidate, _)| candidate.eq_ignore_ascii_case(name))
        .map(|(_, size)| *size)
}

fn names(table: &[(&str, Dimensions)]) -> String {
    table
        .iter()
        .map(|(name, _)| *name)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Resolves an image size given as a name valid for `model` or as
/// `WIDTHxHEIGHT`.
pub fn parse_image_size(value: &str, model: &str) -> Result<Dimensions, VariationError> {
    let table = image_sizes(model);
    lookup(table, value.trim())
        .or_else(|| Dimensions::parse_literal(value))
        .ok_or_else(|| VariationError::InvalidParameter {
            parameter: "size".to_string(),
            message: format!(
                "'{}' is neither WIDTHxHEIGHT nor a named size for {} ({})",
                value,
                model,
                names(table)
            ),
        })
}

/// Resolves one of the supported video sizes.
pub fn parse_video_size(value: &str) -> Result<Dimensions, VariationError> {
    lookup(VIDEO_SIZES, value.trim()).ok_or_else(|| VariationError::InvalidParameter {
        parameter: "size".to_string(),
        message: format!(
            "unsupported video size '{}'; supported: {}",
            value,
            names(VIDEO_SIZES)
        ),
    })
}
