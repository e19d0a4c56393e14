// src/options.rs
//
// Encode configuration.
// Cheap to build and clone - libwebp only sees it once the driver validates it.

use crate::error::{Result, WebpSaveError};
use std::str::FromStr;

/// Content-aware presets for lossy compression.
///
/// Presets only tune the lossy encoder. They are ignored when lossless or
/// near-lossless output is requested.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Preset {
    #[default]
    Default,
    /// Digital picture, like portrait or indoor shot
    Picture,
    /// Outdoor photograph with natural lighting
    Photo,
    /// Hand or line drawing with high-contrast details
    Drawing,
    /// Small-sized colorful images
    Icon,
    /// Text-like content
    Text,
}

impl Preset {
    pub const ALL: [Preset; 6] = [
        Preset::Default,
        Preset::Picture,
        Preset::Photo,
        Preset::Drawing,
        Preset::Icon,
        Preset::Text,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Preset::Default => "default",
            Preset::Picture => "picture",
            Preset::Photo => "photo",
            Preset::Drawing => "drawing",
            Preset::Icon => "icon",
            Preset::Text => "text",
        }
    }
}

impl FromStr for Preset {
    type Err = WebpSaveError;

    fn from_str(name: &str) -> Result<Self> {
        Preset::ALL
            .into_iter()
            .find(|preset| preset.as_str().eq_ignore_ascii_case(name))
            .ok_or_else(|| {
                WebpSaveError::invalid_config(
                    "preset",
                    name.to_string(),
                    "Expected default, picture, photo, drawing, icon or text",
                )
            })
    }
}

/// Everything the encode driver needs to know about one write.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodeOptions {
    /// Quality factor (0-100). Compression effort when lossless.
    pub quality: u8,
    pub lossless: bool,
    /// Near-lossless strength (0-100, 100 = off). Implies lossless coding.
    pub near_lossless: Option<u8>,
    pub preset: Preset,
    /// Alpha plane quality (0-100)
    pub alpha_quality: u8,
    /// Sharper RGB->YUV conversion, applied before subsampling
    pub smart_subsample: bool,
    /// Never embed ICC/EXIF/XMP, even when the frame carries them
    pub strip: bool,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            quality: 75,
            lossless: false,
            near_lossless: None,
            preset: Preset::Default,
            alpha_quality: 100,
            smart_subsample: false,
            strip: false,
        }
    }
}

impl EncodeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn quality(mut self, quality: u8) -> Self {
        self.quality = quality;
        self
    }

    pub fn lossless(mut self, lossless: bool) -> Self {
        self.lossless = lossless;
        self
    }

    pub fn near_lossless(mut self, strength: u8) -> Self {
        self.near_lossless = Some(strength);
        self
    }

    pub fn preset(mut self, preset: Preset) -> Self {
        self.preset = preset;
        self
    }

    pub fn alpha_quality(mut self, alpha_quality: u8) -> Self {
        self.alpha_quality = alpha_quality;
        self
    }

    pub fn smart_subsample(mut self, smart_subsample: bool) -> Self {
        self.smart_subsample = smart_subsample;
        self
    }

    pub fn strip(mut self, strip: bool) -> Self {
        self.strip = strip;
        self
    }

    /// True when libwebp's lossless coder will run.
    pub fn uses_lossless_coder(&self) -> bool {
        self.lossless || self.near_lossless.is_some()
    }

    /// Full-precision ARGB import is needed whenever conversion must happen
    /// inside libwebp rather than up front: lossless coding, and smart
    /// subsampling (applied during RGB->YUV).
    pub fn needs_argb(&self) -> bool {
        self.uses_lossless_coder() || self.smart_subsample
    }

    /// Range checks. Out-of-range values are rejected, never clamped.
    pub fn validate(&self) -> Result<()> {
        check_percent("quality", self.quality)?;
        check_percent("alpha_quality", self.alpha_quality)?;
        if let Some(strength) = self.near_lossless {
            check_percent("near_lossless", strength)?;
        }
        Ok(())
    }
}

fn check_percent(name: &'static str, value: u8) -> Result<()> {
    if value > 100 {
        return Err(WebpSaveError::invalid_config(
            name,
            value.to_string(),
            "Must be between 0 and 100",
        ));
    }
    Ok(())
}
