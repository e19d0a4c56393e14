// src/codecs/webp_safe.rs
//
// Safe abstractions for libwebp FFI operations.
// This module provides RAII-based wrappers that hide raw pointers and
// keep unsafe blocks out of the encode driver.
#![deny(unsafe_op_in_unsafe_fn)]

use crate::error::{Result, WebpSaveError};
use crate::options::{EncodeOptions, Preset};
use libwebp_sys::*;
use std::os::raw::{c_int, c_void};
use std::ptr;

/// libwebp preprocessing bit for smart (sharp) RGB->YUV conversion.
const PREPROCESSING_SMART_SUBSAMPLE: c_int = 4;

impl Preset {
    pub(crate) fn to_libwebp(self) -> WebPPreset {
        match self {
            Preset::Default => WebPPreset::WEBP_PRESET_DEFAULT,
            Preset::Picture => WebPPreset::WEBP_PRESET_PICTURE,
            Preset::Photo => WebPPreset::WEBP_PRESET_PHOTO,
            Preset::Drawing => WebPPreset::WEBP_PRESET_DRAWING,
            Preset::Icon => WebPPreset::WEBP_PRESET_ICON,
            Preset::Text => WebPPreset::WEBP_PRESET_TEXT,
        }
    }
}

/// Translate options into a validated `WebPConfig`.
///
/// Presets are lossy-only: lossless and near-lossless start from the plain
/// defaults instead.
pub fn build_config(options: &EncodeOptions) -> Result<WebPConfig> {
    let lossless = options.uses_lossless_coder();
    let quality = options.quality as f32;

    let mut config = if lossless {
        WebPConfig::new()
    } else {
        WebPConfig::new_with_preset(options.preset.to_libwebp(), quality)
    }
    .map_err(|_| WebpSaveError::config_version("config version error"))?;

    config.quality = quality;
    config.lossless = lossless as c_int;
    config.alpha_quality = options.alpha_quality as c_int;
    if let Some(strength) = options.near_lossless {
        config.near_lossless = strength as c_int;
    }
    if options.smart_subsample {
        config.preprocessing |= PREPROCESSING_SMART_SUBSAMPLE;
    }

    if unsafe { WebPValidateConfig(&config) } == 0 {
        return Err(WebpSaveError::invalid_config(
            "options",
            format!("{options:?}"),
            "libwebp rejected the configuration",
        ));
    }
    Ok(config)
}

/// Which libwebp importer a frame goes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelLayout {
    Rgb,
    Rgba,
}

impl PixelLayout {
    pub fn bands(&self) -> usize {
        match self {
            PixelLayout::Rgb => 3,
            PixelLayout::Rgba => 4,
        }
    }

    pub fn from_bands(bands: u8) -> Option<Self> {
        match bands {
            3 => Some(PixelLayout::Rgb),
            4 => Some(PixelLayout::Rgba),
            _ => None,
        }
    }
}

/// Callback state reachable from libwebp through `custom_ptr`.
struct WriterState<'a> {
    emit: &'a mut dyn FnMut(&[u8]) -> Result<()>,
    error: Option<WebpSaveError>,
}

/// `WebPWriterFunction` forwarding every output range to the Rust closure.
/// A failed write is stashed and reported as 0 so libwebp stops early.
unsafe extern "C" fn forward_output(
    data: *const u8,
    data_size: usize,
    picture: *const WebPPicture,
) -> c_int {
    if picture.is_null() {
        return 0;
    }
    // SAFETY: custom_ptr is set by SafeWebPPicture::encode to a WriterState
    // that outlives the WebPEncode call.
    let state = unsafe { ((*picture).custom_ptr as *mut WriterState<'_>).as_mut() };
    let Some(state) = state else {
        return 0;
    };
    let bytes = if data_size == 0 || data.is_null() {
        &[][..]
    } else {
        // SAFETY: libwebp guarantees `data` points at `data_size` bytes.
        unsafe { std::slice::from_raw_parts(data, data_size) }
    };
    match (state.emit)(bytes) {
        Ok(()) => 1,
        Err(err) => {
            state.error = Some(err);
            0
        }
    }
}

/// Safe wrapper for WebPPicture that frees its buffers on drop.
pub struct SafeWebPPicture {
    raw: WebPPicture,
}

impl SafeWebPPicture {
    /// Initialise a picture of the given size. `use_argb` requests the
    /// full-precision ARGB representation instead of YUV420.
    pub fn new(width: u32, height: u32, use_argb: bool) -> Result<Self> {
        let mut raw =
            WebPPicture::new().map_err(|_| WebpSaveError::config_version("picture version error"))?;
        raw.width = c_int::try_from(width)
            .map_err(|_| WebpSaveError::dimension_exceeds_limit(width, c_int::MAX as u32))?;
        raw.height = c_int::try_from(height)
            .map_err(|_| WebpSaveError::dimension_exceeds_limit(height, c_int::MAX as u32))?;
        raw.use_argb = use_argb as c_int;
        Ok(Self { raw })
    }

    pub fn width(&self) -> u32 {
        self.raw.width as u32
    }

    pub fn height(&self) -> u32 {
        self.raw.height as u32
    }

    pub fn uses_argb(&self) -> bool {
        self.raw.use_argb != 0
    }

    /// Copy interleaved scanlines into the picture.
    pub fn import(&mut self, pixels: &[u8], layout: PixelLayout, stride: usize) -> Result<()> {
        let needed = stride
            .checked_mul(self.height() as usize)
            .ok_or_else(|| WebpSaveError::import_failed("scanline buffer size overflow"))?;
        if pixels.len() < needed {
            return Err(WebpSaveError::import_failed(format!(
                "expected {needed} bytes of scanlines, got {}",
                pixels.len()
            )));
        }
        let stride = c_int::try_from(stride)
            .map_err(|_| WebpSaveError::import_failed("scanline stride overflow"))?;

        let ok = unsafe {
            match layout {
                PixelLayout::Rgb => WebPPictureImportRGB(&mut self.raw, pixels.as_ptr(), stride),
                PixelLayout::Rgba => WebPPictureImportRGBA(&mut self.raw, pixels.as_ptr(), stride),
            }
        };
        if ok == 0 {
            return Err(WebpSaveError::import_failed("picture memory error"));
        }
        Ok(())
    }

    /// Run the compressor once, handing each output range to `emit`.
    ///
    /// An error returned by `emit` wins over libwebp's own error code.
    pub fn encode(
        &mut self,
        config: &WebPConfig,
        emit: &mut dyn FnMut(&[u8]) -> Result<()>,
    ) -> Result<()> {
        let mut state = WriterState { emit, error: None };
        self.raw.writer = Some(forward_output);
        self.raw.custom_ptr = (&mut state as *mut WriterState<'_>).cast::<c_void>();

        let ok = unsafe { WebPEncode(config, &mut self.raw) };

        self.raw.writer = None;
        self.raw.custom_ptr = ptr::null_mut();

        if let Some(err) = state.error.take() {
            return Err(err);
        }
        if ok == 0 {
            return Err(WebpSaveError::encode_failed(format!(
                "unable to encode: {:?}",
                self.raw.error_code
            )));
        }
        Ok(())
    }
}

impl Drop for SafeWebPPicture {
    fn drop(&mut self) {
        unsafe { WebPPictureFree(&mut self.raw) };
    }
}
