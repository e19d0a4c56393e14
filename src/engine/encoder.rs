// src/engine/encoder.rs
//
// Encode driver: validate options, describe the frame to the compressor,
// run it once and collect its output in a ByteSink.

use crate::codecs::webp_safe::{build_config, PixelLayout, SafeWebPPicture};
use crate::engine::container::HeaderView;
use crate::engine::metadata::{MetadataKey, MetadataProvider, MetadataSet};
use crate::engine::sink::ByteSink;
use crate::engine::MAX_DIMENSION;
use crate::error::{Result, WebpSaveError};
use crate::options::EncodeOptions;
use image::DynamicImage;
use libwebp_sys::WebPConfig;
use std::borrow::Cow;
use tracing::debug;

type EncoderResult<T> = Result<T>;

/// One raster frame plus the metadata that should travel with it.
#[derive(Debug, Clone)]
pub struct Frame<'a> {
    width: u32,
    height: u32,
    bands: u8,
    pixels: Cow<'a, [u8]>,
    metadata: MetadataSet,
}

impl<'a> Frame<'a> {
    /// Interleaved 8-bit scanlines, `bands` bytes per pixel, no row padding.
    pub fn new(pixels: impl Into<Cow<'a, [u8]>>, width: u32, height: u32, bands: u8) -> Self {
        Self {
            width,
            height,
            bands,
            pixels: pixels.into(),
            metadata: MetadataSet::new(),
        }
    }

    /// Borrow RGB8/RGBA8 buffers directly; anything else is converted,
    /// keeping an alpha channel when the source has one.
    pub fn from_image(img: &'a DynamicImage) -> Self {
        let (width, height) = (img.width(), img.height());
        match img {
            DynamicImage::ImageRgb8(rgb) => Self::new(rgb.as_raw().as_slice(), width, height, 3),
            DynamicImage::ImageRgba8(rgba) => {
                Self::new(rgba.as_raw().as_slice(), width, height, 4)
            }
            other if other.color().has_alpha() => {
                Self::new(other.to_rgba8().into_raw(), width, height, 4)
            }
            other => Self::new(other.to_rgb8().into_raw(), width, height, 3),
        }
    }

    pub fn with_metadata(mut self, metadata: MetadataSet) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn bands(&self) -> u8 {
        self.bands
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn metadata(&self) -> &MetadataSet {
        &self.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut MetadataSet {
        &mut self.metadata
    }
}

impl MetadataProvider for Frame<'_> {
    fn has(&self, name: &str) -> bool {
        self.metadata.contains(name)
    }

    fn get(&self, name: &str) -> Result<&[u8]> {
        self.metadata.lookup(name)
    }

    fn regenerate(&mut self, name: &str) -> Result<()> {
        match MetadataKey::from_name(name) {
            Some(MetadataKey::Exif) => self.metadata.regenerate_exif(self.width, self.height),
            _ => Ok(()),
        }
    }
}

/// What the compressor is asked to encode.
#[derive(Debug, Clone, Copy)]
pub struct Picture<'a> {
    pub width: u32,
    pub height: u32,
    /// Full-precision ARGB import instead of YUV420
    pub use_argb: bool,
    pub layout: PixelLayout,
    pub pixels: &'a [u8],
    pub stride: usize,
}

impl<'a> Picture<'a> {
    /// Check the frame's band layout and buffer size against its dimensions.
    pub fn from_frame(frame: &'a Frame<'_>, use_argb: bool) -> EncoderResult<Self> {
        let (width, height) = (frame.width(), frame.height());
        if width == 0 || height == 0 {
            return Err(WebpSaveError::import_failed(format!(
                "invalid dimensions {width}x{height}"
            )));
        }
        if width > MAX_DIMENSION || height > MAX_DIMENSION {
            return Err(WebpSaveError::dimension_exceeds_limit(
                width.max(height),
                MAX_DIMENSION,
            ));
        }

        let layout = PixelLayout::from_bands(frame.bands()).ok_or_else(|| {
            WebpSaveError::import_failed(format!(
                "{} band images cannot be imported, expected 3 or 4",
                frame.bands()
            ))
        })?;

        let stride = width as usize * layout.bands();
        let expected = stride * height as usize;
        if frame.pixels().len() != expected {
            return Err(WebpSaveError::import_failed(format!(
                "expected {expected} bytes ({width}x{height}x{}), got {}",
                layout.bands(),
                frame.pixels().len()
            )));
        }

        Ok(Self {
            width,
            height,
            use_argb,
            layout,
            pixels: frame.pixels(),
            stride,
        })
    }
}

/// Pixel compression capability.
///
/// `configure` turns options into whatever the backend needs and rejects
/// anything it cannot honour. `encode` runs exactly once per frame and
/// passes every produced byte range to `emit`, in order.
pub trait Compressor {
    type Config;

    fn configure(&self, options: &EncodeOptions) -> EncoderResult<Self::Config>;

    fn encode(
        &self,
        config: &Self::Config,
        picture: &Picture<'_>,
        emit: &mut dyn FnMut(&[u8]) -> Result<()>,
    ) -> EncoderResult<()>;
}

/// libwebp's advanced encoding API.
#[derive(Debug, Clone, Copy, Default)]
pub struct LibWebp;

impl Compressor for LibWebp {
    type Config = WebPConfig;

    fn configure(&self, options: &EncodeOptions) -> EncoderResult<WebPConfig> {
        options.validate()?;
        build_config(options)
    }

    fn encode(
        &self,
        config: &WebPConfig,
        picture: &Picture<'_>,
        emit: &mut dyn FnMut(&[u8]) -> Result<()>,
    ) -> EncoderResult<()> {
        let mut pic = SafeWebPPicture::new(picture.width, picture.height, picture.use_argb)?;
        pic.import(picture.pixels, picture.layout, picture.stride)?;
        pic.encode(config, emit)
    }
}

/// Encode one frame into a fresh sink holding a minimal container:
/// RIFF header plus the compressor's image chunk(s).
pub fn encode_frame<C>(
    compressor: &C,
    frame: &Frame<'_>,
    options: &EncodeOptions,
) -> EncoderResult<ByteSink>
where
    C: Compressor + ?Sized,
{
    let config = compressor.configure(options)?;
    let picture = Picture::from_frame(frame, options.needs_argb())?;

    let mut sink = ByteSink::new();
    compressor.encode(&config, &picture, &mut |bytes: &[u8]| sink.append(bytes))?;

    let header = HeaderView::parse(sink.as_bytes())?;
    let declared = header.riff_size() as usize;
    if declared + 8 != sink.len() {
        return Err(WebpSaveError::malformed_container(format!(
            "RIFF size {declared} does not match {} byte stream",
            sink.len()
        )));
    }

    debug!(
        width = picture.width,
        height = picture.height,
        bands = picture.layout.bands(),
        use_argb = picture.use_argb,
        bytes = sink.len(),
        first_chunk = %String::from_utf8_lossy(&header.format_tag()),
        "encoded frame"
    );
    Ok(sink)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCategory;
    use image::{Rgb, RgbImage, Rgba, RgbaImage};

    fn gradient(width: u32, height: u32, bands: u8) -> Vec<u8> {
        (0..width * height)
            .flat_map(|i| {
                let x = (i % width) as u8;
                let y = (i / width) as u8;
                [x.wrapping_mul(20), y.wrapping_mul(20), 128, 200]
                    .into_iter()
                    .take(bands as usize)
            })
            .collect()
    }

    #[test]
    fn test_picture_rejects_band_layout() {
        let frame = Frame::new(vec![0u8; 10 * 10 * 2], 10, 10, 2);
        let err = Picture::from_frame(&frame, false).unwrap_err();
        assert!(matches!(err, WebpSaveError::ImportFailed { .. }));
        assert_eq!(err.category(), ErrorCategory::Encode);
    }

    #[test]
    fn test_picture_rejects_length_mismatch() {
        let frame = Frame::new(vec![0u8; 10 * 9 * 3], 10, 10, 3);
        assert!(Picture::from_frame(&frame, false).is_err());
    }

    #[test]
    fn test_picture_rejects_oversized_frames() {
        let frame = Frame::new(Vec::new(), MAX_DIMENSION + 1, 1, 3);
        let err = Picture::from_frame(&frame, false).unwrap_err();
        assert!(matches!(err, WebpSaveError::DimensionExceedsLimit { .. }));
    }

    #[test]
    fn test_picture_stride() {
        let pixels = gradient(7, 3, 4);
        let frame = Frame::new(pixels.as_slice(), 7, 3, 4);
        let picture = Picture::from_frame(&frame, true).unwrap();
        assert_eq!(picture.stride, 28);
        assert_eq!(picture.layout, PixelLayout::Rgba);
        assert!(picture.use_argb);
    }

    #[test]
    fn test_from_image_picks_bands() {
        let rgb = DynamicImage::ImageRgb8(RgbImage::from_pixel(3, 2, Rgb([1, 2, 3])));
        let frame = Frame::from_image(&rgb);
        assert_eq!((frame.width(), frame.height(), frame.bands()), (3, 2, 3));
        assert!(matches!(frame.pixels, Cow::Borrowed(_)));

        let rgba = DynamicImage::ImageRgba8(RgbaImage::from_pixel(2, 2, Rgba([1, 2, 3, 4])));
        assert_eq!(Frame::from_image(&rgba).bands(), 4);

        let luma_alpha = DynamicImage::ImageLumaA8(image::GrayAlphaImage::new(2, 2));
        let frame = Frame::from_image(&luma_alpha);
        assert_eq!(frame.bands(), 4);
        assert_eq!(frame.pixels().len(), 16);

        let luma = DynamicImage::ImageLuma8(image::GrayImage::new(2, 2));
        assert_eq!(Frame::from_image(&luma).bands(), 3);
    }

    #[test]
    fn test_encode_frame_lossy_rgb() {
        let pixels = gradient(10, 10, 3);
        let frame = Frame::new(pixels, 10, 10, 3);
        let sink = encode_frame(&LibWebp, &frame, &EncodeOptions::new().quality(80)).unwrap();
        let view = HeaderView::parse(sink.as_bytes()).unwrap();
        assert_eq!(view.riff_size() as usize, sink.len() - 8);
        assert_eq!(&view.format_tag(), b"VP8 ");
    }

    #[test]
    fn test_encode_frame_lossless_rgba() {
        let pixels = gradient(9, 5, 4);
        let frame = Frame::new(pixels, 9, 5, 4);
        let sink = encode_frame(&LibWebp, &frame, &EncodeOptions::new().lossless(true)).unwrap();
        assert_eq!(&HeaderView::parse(sink.as_bytes()).unwrap().format_tag(), b"VP8L");
    }

    #[test]
    fn test_encode_frame_rejects_invalid_config() {
        let frame = Frame::new(gradient(4, 4, 3), 4, 4, 3);
        let err = encode_frame(&LibWebp, &frame, &EncodeOptions::new().quality(150)).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Config);
    }

    #[test]
    fn test_frame_regenerates_only_exif() {
        let mut frame = Frame::new(vec![0u8; 3], 1, 1, 3)
            .with_metadata(MetadataSet::new().with_xmp(b"<x/>".to_vec()));
        frame.regenerate("xmp").unwrap();
        frame.regenerate("exif").unwrap();
        assert!(frame.has("xmp"));
        assert!(!frame.has("exif"));
        assert_eq!(frame.get("xmp").unwrap(), b"<x/>");
    }
}
