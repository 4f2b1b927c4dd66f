//! High-level image operations.
//!
//! These functions turn configuration into backend parameters. Planning is
//! kept separate from execution so parameter generation can be tested without
//! touching pixels.

use super::backend::{BackendError, ImageBackend};
use super::params::{Compression, Quality, ResizeParams, Sharpening};
use std::path::Path;

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, BackendError>;

/// Encoding settings shared by every derivative.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DerivativeConfig {
    pub quality: Quality,
    pub compression: Compression,
    pub sharpening: Option<Sharpening>,
}

impl Default for DerivativeConfig {
    fn default() -> Self {
        Self {
            quality: Quality::default(),
            compression: Compression::default(),
            sharpening: Some(Sharpening::light()),
        }
    }
}

/// Plan a derivative without executing it.
pub fn plan_derivative(
    source: &Path,
    output: &Path,
    width: u32,
    config: &DerivativeConfig,
) -> ResizeParams {
    ResizeParams {
        source: source.to_path_buf(),
        output: output.to_path_buf(),
        width,
        quality: config.quality,
        compression: config.compression,
        sharpening: config.sharpening,
    }
}

/// Create one derivative image at a breakpoint width.
pub fn create_derivative(
    backend: &dyn ImageBackend,
    source: &Path,
    output: &Path,
    width: u32,
    config: &DerivativeConfig,
) -> Result<()> {
    let params = plan_derivative(source, output, width, config);
    backend.resize(&params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::backend::tests::{MockBackend, RecordedOp};

    #[test]
    fn plan_carries_config_through() {
        let config = DerivativeConfig {
            quality: Quality::new(60),
            compression: Compression::Zip,
            sharpening: None,
        };
        let params = plan_derivative(Path::new("/a.jpg"), Path::new("/b.jpg"), 768, &config);

        assert_eq!(params.width, 768);
        assert_eq!(params.quality.value(), 60);
        assert_eq!(params.compression, Compression::Zip);
        assert_eq!(params.sharpening, None);
    }

    #[test]
    fn default_config_sharpens_lightly() {
        let config = DerivativeConfig::default();
        assert_eq!(config.sharpening, Some(Sharpening::light()));
        assert_eq!(config.quality.value(), 75);
    }

    #[test]
    fn create_derivative_uses_backend() {
        let tmp = tempfile::TempDir::new().unwrap();
        let backend = MockBackend::new();

        create_derivative(
            &backend,
            Path::new("/source.jpg"),
            &tmp.path().join("out.jpg"),
            480,
            &DerivativeConfig::default(),
        )
        .unwrap();

        let ops = backend.get_operations();
        assert_eq!(ops.len(), 1);
        assert!(matches!(
            &ops[0],
            RecordedOp { width: 480, quality: 75, source, .. } if source == "/source.jpg"
        ));
    }
}
