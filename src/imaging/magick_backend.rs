//! External-process backend for GraphicsMagick and ImageMagick.
//!
//! Runs a single convert invocation per derivative:
//!
//! ```text
//! gm convert <source> -resize <width>> +profile * -quality <q> -compress <c> [-unsharp 0x<sigma>] <output>
//! magick     <source> -resize <width>> +profile * -quality <q> -compress <c> [-unsharp 0x<sigma>] <output>
//! ```
//!
//! The trailing `>` on the geometry only shrinks, matching the
//! [`RustBackend`](super::rust_backend::RustBackend) never-upscale rule.
//! Requires the corresponding binary on `PATH`.

use super::backend::{BackendError, ImageBackend};
use super::params::ResizeParams;
use std::ffi::OsString;
use std::process::Command;

/// Which Magick suite to invoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MagickFlavor {
    GraphicsMagick,
    ImageMagick,
}

impl MagickFlavor {
    /// Select the flavor from the `use_image_magick` option.
    pub fn from_use_image_magick(use_image_magick: bool) -> Self {
        if use_image_magick {
            MagickFlavor::ImageMagick
        } else {
            MagickFlavor::GraphicsMagick
        }
    }

    fn program(self) -> &'static str {
        match self {
            MagickFlavor::GraphicsMagick => "gm",
            MagickFlavor::ImageMagick => "magick",
        }
    }
}

/// Backend that shells out to `gm convert` or `magick`.
pub struct MagickBackend {
    flavor: MagickFlavor,
}

impl MagickBackend {
    pub fn new(flavor: MagickFlavor) -> Self {
        Self { flavor }
    }

    pub fn flavor(&self) -> MagickFlavor {
        self.flavor
    }

    /// Full argument list after the program name.
    pub fn convert_args(&self, params: &ResizeParams) -> Vec<OsString> {
        let mut args: Vec<OsString> = Vec::new();
        if self.flavor == MagickFlavor::GraphicsMagick {
            args.push("convert".into());
        }
        args.push(params.source.clone().into_os_string());
        args.push("-resize".into());
        args.push(format!("{}>", params.width).into());
        args.push("+profile".into());
        args.push("*".into());
        args.push("-quality".into());
        args.push(params.quality.value().to_string().into());
        args.push("-compress".into());
        args.push(params.compression.as_str().into());
        if let Some(sharpening) = params.sharpening {
            args.push("-unsharp".into());
            args.push(format!("0x{}", sharpening.sigma).into());
        }
        args.push(params.output.clone().into_os_string());
        args
    }
}

impl ImageBackend for MagickBackend {
    fn name(&self) -> &'static str {
        self.flavor.program()
    }

    fn resize(&self, params: &ResizeParams) -> Result<(), BackendError> {
        let output = Command::new(self.flavor.program())
            .args(self.convert_args(params))
            .output()?;

        if !output.status.success() {
            return Err(BackendError::ProcessingFailed(format!(
                "{} exited with {}: {}",
                self.flavor.program(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }
}
