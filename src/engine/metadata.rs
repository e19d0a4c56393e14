// src/engine/metadata.rs
//
// Metadata blobs that can ride along in an extended WebP container:
// ICC profile, EXIF and XMP. The composer only ever talks to the
// MetadataProvider trait; MetadataSet is the in-memory store frames use.

use crate::engine::container::{Vp8xFlags, EXIF, ICCP, XMP};
use crate::engine::sink::chunk_size;
use crate::error::{Result, WebpSaveError};
use exif::experimental::Writer;
use exif::{Field, In, Reader, Tag, Value};
use std::collections::BTreeMap;
use std::io::Cursor;
use tracing::{debug, warn};

/// JPEG APP1 style header some producers keep in front of the TIFF data.
const EXIF_HEADER: &[u8] = b"Exif\0\0";

/// Tags the writer produces itself: the refreshed dimensions and the
/// offsets of the sub-IFDs it lays out.
const REWRITTEN_TAGS: [Tag; 5] = [
    Tag::PixelXDimension,
    Tag::PixelYDimension,
    Tag::ExifIFDPointer,
    Tag::GPSInfoIFDPointer,
    Tag::InteropIFDPointer,
];

/// Metadata kinds the container knows how to carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MetadataKey {
    Icc,
    Exif,
    Xmp,
}

impl MetadataKey {
    /// Lookup order used when sizing a rebuilt container.
    pub const ALL: [MetadataKey; 3] = [MetadataKey::Icc, MetadataKey::Exif, MetadataKey::Xmp];

    pub fn name(&self) -> &'static str {
        match self {
            MetadataKey::Icc => "icc",
            MetadataKey::Exif => "exif",
            MetadataKey::Xmp => "xmp",
        }
    }

    pub fn fourcc(&self) -> &'static [u8; 4] {
        match self {
            MetadataKey::Icc => ICCP,
            MetadataKey::Exif => EXIF,
            MetadataKey::Xmp => XMP,
        }
    }

    pub fn flag(&self) -> Vp8xFlags {
        match self {
            MetadataKey::Icc => Vp8xFlags::ICC,
            MetadataKey::Exif => Vp8xFlags::EXIF,
            MetadataKey::Xmp => Vp8xFlags::XMP,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|key| key.name() == name)
    }
}

/// One payload read from a provider, ready to be written as a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetadataBlock<'a> {
    pub key: MetadataKey,
    pub data: &'a [u8],
}

impl MetadataBlock<'_> {
    /// On-disk size including chunk header and padding.
    pub fn chunk_size(&self) -> u64 {
        chunk_size(self.data.len())
    }
}

/// Source of metadata blobs for one frame.
///
/// Keys are plain names ("icc", "exif", "xmp", ...). Names the container
/// cannot carry are never asked for.
pub trait MetadataProvider {
    fn has(&self, name: &str) -> bool;

    /// Fetch a blob. Missing or unusable blobs are errors.
    fn get(&self, name: &str) -> Result<&[u8]>;

    /// Rebuild a blob in place so it matches the image about to be written.
    fn regenerate(&mut self, name: &str) -> Result<()>;
}

/// Named metadata blobs attached to a frame.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MetadataSet {
    blobs: BTreeMap<String, Vec<u8>>,
}

impl MetadataSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a blob, returning whatever was stored under that name before.
    pub fn insert(&mut self, name: impl Into<String>, data: impl Into<Vec<u8>>) -> Option<Vec<u8>> {
        let name = name.into();
        if MetadataKey::from_name(&name).is_none() {
            warn!(name = %name, "metadata is not embeddable in webp and will be ignored");
        }
        self.blobs.insert(name, data.into())
    }

    pub fn with(mut self, name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        self.insert(name, data);
        self
    }

    pub fn with_icc(self, data: impl Into<Vec<u8>>) -> Self {
        self.with(MetadataKey::Icc.name(), data)
    }

    pub fn with_exif(self, data: impl Into<Vec<u8>>) -> Self {
        self.with(MetadataKey::Exif.name(), data)
    }

    pub fn with_xmp(self, data: impl Into<Vec<u8>>) -> Self {
        self.with(MetadataKey::Xmp.name(), data)
    }

    pub fn remove(&mut self, name: &str) -> Option<Vec<u8>> {
        self.blobs.remove(name)
    }

    pub fn raw(&self, name: &str) -> Option<&[u8]> {
        self.blobs.get(name).map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.blobs.keys().map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.blobs.contains_key(name)
    }

    /// Validated lookup. ICC profiles must pass a header sanity check.
    pub fn lookup(&self, name: &str) -> Result<&[u8]> {
        let data = self
            .raw(name)
            .ok_or_else(|| WebpSaveError::metadata_missing(name.to_string()))?;
        if name == MetadataKey::Icc.name() && !data.is_empty() && !validate_icc_profile(data) {
            return Err(WebpSaveError::metadata_malformed(
                name.to_string(),
                "ICC profile header is invalid",
            ));
        }
        Ok(data)
    }

    /// Rewrite the EXIF blob so its pixel dimensions describe the image
    /// being written. No-op when there is no EXIF.
    pub fn regenerate_exif(&mut self, width: u32, height: u32) -> Result<()> {
        let name = MetadataKey::Exif.name();
        let Some(blob) = self.blobs.get_mut(name) else {
            return Ok(());
        };
        if blob.is_empty() {
            return Ok(());
        }
        let refreshed = refresh_exif_dimensions(blob, width, height)?;
        debug!(
            before = blob.len(),
            after = refreshed.len(),
            width,
            height,
            "regenerated exif"
        );
        *blob = refreshed;
        Ok(())
    }
}

/// Parse an EXIF blob and serialise it again with PixelXDimension and
/// PixelYDimension set to `width` x `height`.
///
/// Primary and thumbnail IFDs survive, including an embedded JPEG thumbnail.
/// Entries of unknown type cannot be re-serialised and are dropped.
pub fn refresh_exif_dimensions(blob: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    let key = MetadataKey::Exif.name();
    let (header, tiff) = match blob.strip_prefix(EXIF_HEADER) {
        Some(rest) => (EXIF_HEADER, rest),
        None => (&[][..], blob),
    };

    let parsed = Reader::new()
        .read_raw(tiff.to_vec())
        .map_err(|e| WebpSaveError::metadata_malformed(key, e.to_string()))?;

    let mut fields: Vec<Field> = parsed
        .fields()
        .filter(|field| field.ifd_num == In::PRIMARY || field.ifd_num == In::THUMBNAIL)
        .filter(|field| !REWRITTEN_TAGS.contains(&field.tag))
        .filter(|field| !matches!(field.value, Value::Unknown(..)))
        .cloned()
        .collect();
    fields.push(Field {
        tag: Tag::PixelXDimension,
        ifd_num: In::PRIMARY,
        value: Value::Long(vec![width]),
    });
    fields.push(Field {
        tag: Tag::PixelYDimension,
        ifd_num: In::PRIMARY,
        value: Value::Long(vec![height]),
    });

    let mut writer = Writer::new();
    for field in &fields {
        writer.push_field(field);
    }
    if let Some(jpeg) = thumbnail_jpeg(&parsed) {
        writer.set_jpeg(jpeg, In::THUMBNAIL);
    }
    let mut out = Cursor::new(Vec::new());
    writer
        .write(&mut out, parsed.little_endian())
        .map_err(|e| WebpSaveError::metadata_regeneration_failed(key, e.to_string()))?;

    let mut refreshed = header.to_vec();
    refreshed.extend_from_slice(&out.into_inner());
    Ok(refreshed)
}

/// JPEG thumbnail referenced from IFD1, if its offset and length are in bounds.
fn thumbnail_jpeg(parsed: &exif::Exif) -> Option<&[u8]> {
    let read = |tag| {
        parsed
            .get_field(tag, In::THUMBNAIL)
            .and_then(|field| field.value.get_uint(0))
            .map(|value| value as usize)
    };
    let offset = read(Tag::JPEGInterchangeFormat)?;
    let len = read(Tag::JPEGInterchangeFormatLength)?;
    parsed.buf().get(offset..offset.checked_add(len)?)
}

/// Validate ICC profile header
/// ICC profiles must start with a 128-byte header containing specific fields
pub(crate) fn validate_icc_profile(icc_data: &[u8]) -> bool {
    if icc_data.len() < 128 {
        return false;
    }

    // Profile size (bytes 0-3, big-endian) must cover the header and fit the
    // blob; trailing padding is allowed
    let profile_size =
        u32::from_be_bytes([icc_data[0], icc_data[1], icc_data[2], icc_data[3]]) as usize;
    if profile_size < 128 || profile_size > icc_data.len() {
        return false;
    }

    // Major version (byte 8) is 2, 4 or 5 in practice
    if icc_data[8] > 10 {
        return false;
    }

    // CMM type, profile class, color space and PCS are four-character codes
    let is_signature = |range: std::ops::Range<usize>| {
        icc_data[range]
            .iter()
            .all(|&byte| (32..=126).contains(&byte) || byte == 0)
    };
    is_signature(4..8) && is_signature(12..16) && is_signature(16..20) && is_signature(20..24)
}
