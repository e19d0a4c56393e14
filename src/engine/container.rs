// src/engine/container.rs
//
// RIFF/WebP container layout.
//
//  0 - 3   RIFF
//  4 - 7   size of the data after this field (stream length - 8)
//  8 - 11  WEBP
// 12 - 15  first chunk tag: "VP8 " (lossy), "VP8L" (lossless), "VP8X" (extended)
// 16 - 19  first chunk length
// 20 -     first chunk payload
//
// An extended stream's VP8X payload is always 10 bytes:
//
// 20       flags
// 21 - 23  reserved
// 24 - 26  canvas width - 1  (24-bit)
// 27 - 29  canvas height - 1 (24-bit)
// 30 -     ICCP, ANIM, image, EXIF and XMP chunks, in that order
//
// See https://developers.google.com/speed/webp/docs/riff_container

use crate::error::{Result, WebpSaveError};
use bitflags::bitflags;

pub const RIFF: &[u8; 4] = b"RIFF";
pub const WEBP: &[u8; 4] = b"WEBP";
pub const VP8: &[u8; 4] = b"VP8 ";
pub const VP8L: &[u8; 4] = b"VP8L";
pub const VP8X: &[u8; 4] = b"VP8X";
pub const ICCP: &[u8; 4] = b"ICCP";
pub const EXIF: &[u8; 4] = b"EXIF";
pub const XMP: &[u8; 4] = b"XMP ";

/// "RIFF" + size + "WEBP"
pub const RIFF_HEADER_LEN: usize = 12;
pub const CHUNK_HEADER_LEN: usize = 8;
pub const VP8X_PAYLOAD_LEN: usize = 10;
/// Bytes added when a simple stream is upgraded to VP8X.
pub const VP8X_CHUNK_LEN: usize = CHUNK_HEADER_LEN + VP8X_PAYLOAD_LEN;
/// First byte after the VP8X chunk in an extended stream.
pub const EXTENDED_HEADER_LEN: usize = RIFF_HEADER_LEN + VP8X_CHUNK_LEN;

pub const RIFF_SIZE_OFFSET: usize = 4;
pub const FORMAT_TAG_OFFSET: usize = RIFF_HEADER_LEN;
pub const FIRST_CHUNK_LEN_OFFSET: usize = FORMAT_TAG_OFFSET + 4;
pub const FIRST_PAYLOAD_OFFSET: usize = RIFF_HEADER_LEN + CHUNK_HEADER_LEN;
pub const VP8X_FLAGS_OFFSET: usize = FIRST_PAYLOAD_OFFSET;
pub const VP8X_WIDTH_OFFSET: usize = FIRST_PAYLOAD_OFFSET + 4;
pub const VP8X_HEIGHT_OFFSET: usize = FIRST_PAYLOAD_OFFSET + 7;

/// The VP8L header is a 0x2f signature byte followed by a 32-bit word:
/// 14 bits width-1, 14 bits height-1, 1 bit alpha_is_used, 3 bits version.
const VP8L_SIGNATURE: u8 = 0x2f;
const VP8L_ALPHA_BYTE: usize = FIRST_PAYLOAD_OFFSET + 4;
const VP8L_ALPHA_BIT: u8 = 1 << 4;

/// Largest value a 24-bit canvas field can hold.
pub const MAX_CANVAS_FIELD: u32 = (1 << 24) - 1;

bitflags! {
    /// VP8X feature flags (byte 20 of an extended stream).
    ///
    /// Unknown bits are retained so a rewrite never drops them.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Vp8xFlags: u8 {
        const ANIMATION = 0x02;
        const XMP = 0x04;
        const EXIF = 0x08;
        const ALPHA = 0x10;
        const ICC = 0x20;
    }
}

/// What kind of stream the compressor produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerFlavor {
    /// `VP8 ` chunk directly after the RIFF header
    Lossy,
    /// `VP8L` chunk directly after the RIFF header
    Lossless { alpha: bool },
    /// `VP8X` header already present (e.g. lossy with alpha)
    Extended {
        flags: Vp8xFlags,
        width_minus_one: u32,
        height_minus_one: u32,
    },
}

impl ContainerFlavor {
    pub fn is_extended(&self) -> bool {
        matches!(self, ContainerFlavor::Extended { .. })
    }

    /// Where the image chunk(s) start in a stream of this flavor.
    pub fn image_data_offset(&self) -> usize {
        match self {
            ContainerFlavor::Extended { .. } => EXTENDED_HEADER_LEN,
            ContainerFlavor::Lossy | ContainerFlavor::Lossless { .. } => FORMAT_TAG_OFFSET,
        }
    }

    /// Flags a rebuilt VP8X header starts from.
    pub fn seed_flags(&self) -> Vp8xFlags {
        match self {
            ContainerFlavor::Extended { flags, .. } => *flags,
            ContainerFlavor::Lossless { alpha: true } => Vp8xFlags::ALPHA,
            ContainerFlavor::Lossless { alpha: false } | ContainerFlavor::Lossy => {
                Vp8xFlags::empty()
            }
        }
    }
}

/// Read-only view over the fixed header of a finished container.
#[derive(Debug, Clone, Copy)]
pub struct HeaderView<'a> {
    bytes: &'a [u8],
}

impl<'a> HeaderView<'a> {
    /// Check the RIFF/WEBP framing and that the first chunk header is
    /// complete.
    pub fn parse(bytes: &'a [u8]) -> Result<Self> {
        if bytes.len() < FIRST_PAYLOAD_OFFSET {
            return Err(WebpSaveError::malformed_container(format!(
                "{} bytes is too short for a RIFF/WEBP header",
                bytes.len()
            )));
        }
        if &bytes[0..4] != RIFF || &bytes[8..12] != WEBP {
            return Err(WebpSaveError::malformed_container(
                "missing RIFF/WEBP signature",
            ));
        }
        Ok(Self { bytes })
    }

    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// RIFF size field: bytes after offset 8.
    pub fn riff_size(&self) -> u32 {
        read_u32_le(self.bytes, RIFF_SIZE_OFFSET)
    }

    pub fn format_tag(&self) -> [u8; 4] {
        let mut tag = [0u8; 4];
        tag.copy_from_slice(&self.bytes[FORMAT_TAG_OFFSET..FORMAT_TAG_OFFSET + 4]);
        tag
    }

    pub fn first_chunk_len(&self) -> u32 {
        read_u32_le(self.bytes, FIRST_CHUNK_LEN_OFFSET)
    }

    /// Classify the stream by its first chunk tag.
    pub fn flavor(&self) -> Result<ContainerFlavor> {
        match &self.format_tag() {
            VP8 => Ok(ContainerFlavor::Lossy),
            VP8L => {
                if self.bytes.len() <= VP8L_ALPHA_BYTE
                    || self.bytes[FIRST_PAYLOAD_OFFSET] != VP8L_SIGNATURE
                {
                    return Err(WebpSaveError::malformed_container(
                        "VP8L chunk is missing its bitstream header",
                    ));
                }
                Ok(ContainerFlavor::Lossless {
                    alpha: self.bytes[VP8L_ALPHA_BYTE] & VP8L_ALPHA_BIT != 0,
                })
            }
            VP8X => {
                if self.bytes.len() < EXTENDED_HEADER_LEN
                    || self.first_chunk_len() as usize != VP8X_PAYLOAD_LEN
                {
                    return Err(WebpSaveError::malformed_container(
                        "VP8X chunk must carry a 10 byte payload",
                    ));
                }
                Ok(ContainerFlavor::Extended {
                    flags: Vp8xFlags::from_bits_retain(self.bytes[VP8X_FLAGS_OFFSET]),
                    width_minus_one: read_u24_le(self.bytes, VP8X_WIDTH_OFFSET),
                    height_minus_one: read_u24_le(self.bytes, VP8X_HEIGHT_OFFSET),
                })
            }
            other => Err(WebpSaveError::malformed_container(format!(
                "unexpected first chunk '{}'",
                String::from_utf8_lossy(other)
            ))),
        }
    }

    /// The extended header body (flags, reserved, canvas size).
    pub fn vp8x_payload(&self) -> Option<&'a [u8]> {
        self.bytes.get(FIRST_PAYLOAD_OFFSET..EXTENDED_HEADER_LEN)
    }
}

fn read_u32_le(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

fn read_u24_le(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([bytes[offset], bytes[offset + 1], bytes[offset + 2], 0])
}
