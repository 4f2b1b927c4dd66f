//! Parameter types for image operations.
//!
//! These structs describe *what* to do, not *how* to do it. They are the
//! interface between the [generator](crate::generate) (which decides which
//! derivative to produce) and the [`backend`](super::backend) (which does the
//! actual pixel work). Backends can be swapped, including for a test mock,
//! without touching selection or caching logic.
//!
//! ## Types
//!
//! - [`Quality`]: Lossy encoding quality (1–100, default 75). Clamped on construction.
//! - [`Sharpening`]: Unsharp-mask parameters applied after downscaling.
//! - [`Compression`]: Named compression algorithm, as understood by GraphicsMagick/ImageMagick.
//! - [`ResizeParams`]: Everything needed for one derivative: source, output, width, encoding.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(75)
    }
}

/// Sharpening parameters for unsharp mask.
///
/// - `sigma`: Standard deviation of the Gaussian blur (higher = more sharpening)
/// - `threshold`: Minimum brightness difference to sharpen (0 = sharpen all pixels)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sharpening {
    pub sigma: f32,
    pub threshold: i32,
}

impl Sharpening {
    /// Light sharpening to recover detail lost when downscaling.
    pub fn light() -> Self {
        Self {
            sigma: 0.5,
            threshold: 0,
        }
    }
}

/// Compression algorithm names accepted by `-compress`.
///
/// The Rust backend only honours the choice for PNG output, where it maps
/// onto the deflate effort level. JPEG, GIF and WebP have a single codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Compression {
    #[default]
    None,
    BZip,
    Fax,
    Group4,
    #[serde(rename = "JPEG")]
    Jpeg,
    Lossless,
    #[serde(rename = "LZW")]
    Lzw,
    #[serde(rename = "RLE")]
    Rle,
    Zip,
    #[serde(rename = "LZMA")]
    Lzma,
}

impl Compression {
    /// The name as passed on a GraphicsMagick/ImageMagick command line.
    pub fn as_str(self) -> &'static str {
        match self {
            Compression::None => "None",
            Compression::BZip => "BZip",
            Compression::Fax => "Fax",
            Compression::Group4 => "Group4",
            Compression::Jpeg => "JPEG",
            Compression::Lossless => "Lossless",
            Compression::Lzw => "LZW",
            Compression::Rle => "RLE",
            Compression::Zip => "Zip",
            Compression::Lzma => "LZMA",
        }
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters for producing one derivative image.
///
/// `width` is the breakpoint width; height follows the source aspect ratio.
#[derive(Debug, Clone, PartialEq)]
pub struct ResizeParams {
    pub source: PathBuf,
    pub output: PathBuf,
    pub width: u32,
    pub quality: Quality,
    pub compression: Compression,
    pub sharpening: Option<Sharpening>,
}
