//! Pure Rust image processing backend with zero external dependencies.
//!
//! Everything is statically linked into the binary.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, GIF, WebP) | `image` crate (pure Rust decoders) |
//! | Resize | `image::DynamicImage::resize_exact` with `Lanczos3` filter |
//! | Sharpening | `image::imageops::unsharpen` |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` (quality) |
//! | Encode → PNG | `image::codecs::png::PngEncoder` (compression level) |
//! | Encode → GIF | `image::codecs::gif::GifEncoder` (every frame, delays kept) |
//! | Encode → WebP | `image::codecs::webp::WebPEncoder` (lossless) |
//!
//! Decoding to pixels and re-encoding drops ICC profiles and EXIF blocks, so
//! derivatives never carry embedded color-profile metadata.
//!
//! A GIF source written to a GIF output takes the animated path: all frames
//! are decoded as full-canvas RGBA, resized and sharpened one by one, and
//! re-encoded with their original delays, looping forever.

use super::backend::{BackendError, ImageBackend};
use super::calculations::calculate_fit_to_width;
use super::params::{Compression, ResizeParams};
use image::codecs::gif::{GifDecoder, GifEncoder, Repeat};
use image::codecs::png::{CompressionType, FilterType as PngFilter};
use image::imageops::FilterType;
use image::{AnimationDecoder, DynamicImage, Frame, ImageFormat, ImageReader, RgbaImage};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Load and decode an image from disk.
fn load_image(path: &Path) -> Result<DynamicImage, BackendError> {
    ImageReader::open(path)
        .map_err(BackendError::Io)?
        .with_guessed_format()
        .map_err(BackendError::Io)?
        .decode()
        .map_err(|e| {
            BackendError::ProcessingFailed(format!("Failed to decode {}: {}", path.display(), e))
        })
}

/// Format of the file at `path`, sniffed from its contents.
fn source_format(path: &Path) -> Result<Option<ImageFormat>, BackendError> {
    Ok(ImageReader::open(path)?.with_guessed_format()?.format())
}

fn is_animated_gif_job(params: &ResizeParams) -> Result<bool, BackendError> {
    let output_is_gif = ImageFormat::from_path(&params.output).ok() == Some(ImageFormat::Gif);
    Ok(output_is_gif && source_format(&params.source)? == Some(ImageFormat::Gif))
}

/// Resize one RGBA buffer and apply the optional unsharp mask.
fn resize_rgba(buffer: &RgbaImage, params: &ResizeParams) -> RgbaImage {
    let (width, height) = calculate_fit_to_width(buffer.dimensions(), params.width);
    let resized = if (width, height) == buffer.dimensions() {
        buffer.clone()
    } else {
        image::imageops::resize(buffer, width, height, FilterType::Lanczos3)
    };
    match params.sharpening {
        Some(s) => image::imageops::unsharpen(&resized, s.sigma, s.threshold),
        None => resized,
    }
}

/// Resize every frame of a GIF, keeping frame delays.
fn resize_gif_frames(params: &ResizeParams) -> Result<(), BackendError> {
    let processing = |e: image::ImageError| {
        BackendError::ProcessingFailed(format!("GIF {}: {}", params.source.display(), e))
    };

    let decoder = GifDecoder::new(BufReader::new(File::open(&params.source)?)).map_err(processing)?;
    let frames = decoder.into_frames().collect_frames().map_err(processing)?;
    if frames.is_empty() {
        return Err(BackendError::ProcessingFailed(format!(
            "GIF {} has no frames",
            params.source.display()
        )));
    }

    let resized: Vec<Frame> = frames
        .iter()
        .map(|frame| Frame::from_parts(resize_rgba(frame.buffer(), params), 0, 0, frame.delay()))
        .collect();

    let mut encoder = GifEncoder::new_with_speed(BufWriter::new(File::create(&params.output)?), 10);
    encoder.set_repeat(Repeat::Infinite).map_err(processing)?;
    encoder.encode_frames(resized).map_err(processing)
}

/// PNG deflate effort for a named compression algorithm.
fn png_compression(compression: Compression) -> CompressionType {
    match compression {
        Compression::None => CompressionType::Fast,
        Compression::Zip | Compression::BZip | Compression::Lzma | Compression::Lossless => {
            CompressionType::Best
        }
        _ => CompressionType::Default,
    }
}

/// Save a DynamicImage to the given path, inferring format from extension.
fn save_image(img: &DynamicImage, path: &Path, params: &ResizeParams) -> Result<(), BackendError> {
    let format = ImageFormat::from_path(path).map_err(|e| {
        BackendError::ProcessingFailed(format!("Unsupported output format: {}", e))
    })?;

    let file = std::fs::File::create(path).map_err(BackendError::Io)?;
    let writer = BufWriter::new(file);

    let encoded = match format {
        ImageFormat::Jpeg => {
            let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(
                writer,
                params.quality.value() as u8,
            );
            // JPEG has no alpha channel
            DynamicImage::ImageRgb8(img.to_rgb8()).write_with_encoder(encoder)
        }
        ImageFormat::Png => {
            let encoder = image::codecs::png::PngEncoder::new_with_quality(
                writer,
                png_compression(params.compression),
                PngFilter::Adaptive,
            );
            img.write_with_encoder(encoder)
        }
        ImageFormat::Gif => {
            let mut encoder = image::codecs::gif::GifEncoder::new(writer);
            encoder.encode_frame(image::Frame::new(img.to_rgba8()))
        }
        ImageFormat::WebP => {
            let encoder = image::codecs::webp::WebPEncoder::new_lossless(writer);
            DynamicImage::ImageRgba8(img.to_rgba8()).write_with_encoder(encoder)
        }
        other => {
            return Err(BackendError::ProcessingFailed(format!(
                "Unsupported output format: {:?}",
                other
            )));
        }
    };

    encoded.map_err(|e| {
        BackendError::ProcessingFailed(format!("Encoding {} failed: {}", path.display(), e))
    })
}

impl ImageBackend for RustBackend {
    fn name(&self) -> &'static str {
        "rust"
    }

    fn resize(&self, params: &ResizeParams) -> Result<(), BackendError> {
        if is_animated_gif_job(params)? {
            return resize_gif_frames(params);
        }
        let img = load_image(&params.source)?;

        let (width, height) = calculate_fit_to_width((img.width(), img.height()), params.width);
        let resized = if (width, height) == (img.width(), img.height()) {
            img
        } else {
            img.resize_exact(width, height, FilterType::Lanczos3)
        };

        let final_img = if let Some(sharpening) = params.sharpening {
            DynamicImage::from(image::imageops::unsharpen(
                &resized,
                sharpening.sigma,
                sharpening.threshold,
            ))
        } else {
            resized
        };

        save_image(&final_img, &params.output, params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::params::{Quality, Sharpening};
    use image::{ImageEncoder, RgbImage};
    use std::path::PathBuf;

    /// Create a small valid JPEG file with the given dimensions.
    fn create_test_jpeg(path: &Path, width: u32, height: u32) {
        let img = RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        });
        let file = std::fs::File::create(path).unwrap();
        let writer = std::io::BufWriter::new(file);
        image::codecs::jpeg::JpegEncoder::new(writer)
            .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
            .unwrap();
    }

    fn params(source: PathBuf, output: PathBuf, width: u32) -> ResizeParams {
        ResizeParams {
            source,
            output,
            width,
            quality: Quality::new(75),
            compression: Compression::None,
            sharpening: Some(Sharpening::light()),
        }
    }

    #[test]
    fn resize_jpeg_to_breakpoint_width() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("source.jpg");
        create_test_jpeg(&source, 400, 300);

        let output = tmp.path().join("resized.jpg");
        RustBackend::new()
            .resize(&params(source, output.clone(), 200))
            .unwrap();

        assert_eq!(image::image_dimensions(&output).unwrap(), (200, 150));
    }

    #[test]
    fn resize_never_upscales() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("source.jpg");
        create_test_jpeg(&source, 120, 80);

        let output = tmp.path().join("resized.jpg");
        RustBackend::new()
            .resize(&params(source, output.clone(), 992))
            .unwrap();

        assert_eq!(image::image_dimensions(&output).unwrap(), (120, 80));
    }

    #[test]
    fn resize_to_png_without_sharpening() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("source.jpg");
        create_test_jpeg(&source, 300, 300);

        let output = tmp.path().join("resized.png");
        let mut p = params(source, output.clone(), 100);
        p.sharpening = None;
        p.compression = Compression::Zip;
        RustBackend::new().resize(&p).unwrap();

        assert_eq!(image::image_dimensions(&output).unwrap(), (100, 100));
    }

    #[test]
    fn resize_to_gif_and_webp() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("source.jpg");
        create_test_jpeg(&source, 64, 32);

        for name in ["out.gif", "out.webp"] {
            let output = tmp.path().join(name);
            RustBackend::new()
                .resize(&params(source.clone(), output.clone(), 32))
                .unwrap();
            assert_eq!(image::image_dimensions(&output).unwrap(), (32, 16));
        }
    }

    #[test]
    fn resize_unsupported_output_format_errors() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("source.jpg");
        create_test_jpeg(&source, 100, 100);

        let result = RustBackend::new().resize(&params(source, tmp.path().join("out.xyz"), 50));
        assert!(matches!(result, Err(BackendError::ProcessingFailed(_))));
    }

    #[test]
    fn resize_missing_source_is_io_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let result = RustBackend::new().resize(&params(
            tmp.path().join("missing.jpg"),
            tmp.path().join("out.jpg"),
            50,
        ));
        assert!(matches!(result, Err(BackendError::Io(_))));
    }

    /// Write a GIF with `count` solid-color frames, 100 ms apart.
    fn create_test_gif(path: &Path, width: u32, height: u32, count: u8) {
        let frames = (0..count).map(|i| {
            let buffer = RgbaImage::from_pixel(width, height, image::Rgba([i * 80, 40, 200, 255]));
            Frame::from_parts(buffer, 0, 0, image::Delay::from_numer_denom_ms(100, 1))
        });
        let mut encoder = GifEncoder::new(std::fs::File::create(path).unwrap());
        encoder.set_repeat(Repeat::Infinite).unwrap();
        encoder.encode_frames(frames).unwrap();
    }

    fn read_gif_frames(path: &Path) -> Vec<Frame> {
        let file = std::io::BufReader::new(std::fs::File::open(path).unwrap());
        GifDecoder::new(file)
            .unwrap()
            .into_frames()
            .collect_frames()
            .unwrap()
    }

    #[test]
    fn animated_gif_keeps_every_frame() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("spinner.gif");
        create_test_gif(&source, 200, 100, 3);

        let output = tmp.path().join("resized.gif");
        RustBackend::new()
            .resize(&params(source, output.clone(), 100))
            .unwrap();

        let frames = read_gif_frames(&output);
        assert_eq!(frames.len(), 3);
        for frame in &frames {
            assert_eq!(frame.buffer().dimensions(), (100, 50));
            assert_eq!(frame.delay().numer_denom_ms(), (100, 1));
        }
    }

    #[test]
    fn narrow_animated_gif_is_not_upscaled() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("small.gif");
        create_test_gif(&source, 40, 20, 2);

        let output = tmp.path().join("resized.gif");
        let mut p = params(source, output.clone(), 480);
        p.sharpening = None;
        RustBackend::new().resize(&p).unwrap();

        let frames = read_gif_frames(&output);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].buffer().dimensions(), (40, 20));
    }

    #[test]
    fn gif_source_to_other_format_uses_first_frame() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("spinner.gif");
        create_test_gif(&source, 200, 100, 3);

        let output = tmp.path().join("still.png");
        RustBackend::new()
            .resize(&params(source, output.clone(), 100))
            .unwrap();

        assert_eq!(image::image_dimensions(&output).unwrap(), (100, 50));
    }

    #[test]
    fn png_compression_mapping() {
        assert!(matches!(
            png_compression(Compression::None),
            CompressionType::Fast
        ));
        assert!(matches!(
            png_compression(Compression::Zip),
            CompressionType::Best
        ));
        assert!(matches!(
            png_compression(Compression::Fax),
            CompressionType::Default
        ));
    }
}
