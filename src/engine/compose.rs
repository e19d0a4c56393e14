// src/engine/compose.rs
//
// Container metadata composer.
//
// A simple container ("VP8 " or "VP8L" right after the RIFF header) cannot
// carry metadata, so when ICC, EXIF or XMP is to be embedded the stream is
// rebuilt with a VP8X header:
//
//   RIFF <size> WEBP  VP8X <10> <flags> <w-1> <h-1>  [ICCP]  image  [EXIF] [XMP ]
//
// The old stream is only ever read; the new one is written into a fresh
// sink, and the old sink is dropped once its bytes have been copied.

use crate::engine::container::{
    ContainerFlavor, HeaderView, Vp8xFlags, MAX_CANVAS_FIELD, RIFF, VP8X, VP8X_CHUNK_LEN,
    VP8X_FLAGS_OFFSET, VP8X_PAYLOAD_LEN, WEBP,
};
use crate::engine::metadata::{MetadataBlock, MetadataKey, MetadataProvider};
use crate::engine::sink::{ByteSink, SINK_LIMIT};
use crate::error::{Result, WebpSaveError};
use tracing::debug;

/// Splice the provider's metadata into `base`.
///
/// Returns `base` untouched when `strip` is set or nothing embeddable is
/// available. On error `base` is dropped; callers never see a partly
/// rewritten container.
pub fn compose_metadata<P>(
    base: ByteSink,
    width: u32,
    height: u32,
    provider: &mut P,
    strip: bool,
) -> Result<ByteSink>
where
    P: MetadataProvider + ?Sized,
{
    if strip {
        debug!("metadata stripped, keeping simple container");
        return Ok(base);
    }
    if !MetadataKey::ALL.iter().any(|key| provider.has(key.name())) {
        return Ok(base);
    }

    let header = HeaderView::parse(base.as_bytes())?;
    let flavor = header.flavor()?;

    // EXIF describes the image it is attached to; refresh it before anything
    // is sized.
    let exif = MetadataKey::Exif.name();
    if provider.has(exif) {
        provider.regenerate(exif)?;
    }

    let provider = &*provider;
    let mut blocks = Vec::with_capacity(MetadataKey::ALL.len());
    for key in MetadataKey::ALL {
        if !provider.has(key.name()) {
            continue;
        }
        let data = provider.get(key.name())?;
        if data.is_empty() {
            continue;
        }
        blocks.push(MetadataBlock { key, data });
    }
    if blocks.is_empty() {
        debug!("metadata present but empty, keeping simple container");
        return Ok(base);
    }

    let composed = ExtendedBuilder::new(header, flavor, width, height)
        .with_limit(base.limit())
        .build(&blocks)?;
    debug!(
        ?flavor,
        before = base.len(),
        after = composed.len(),
        chunks = blocks.len(),
        "embedded metadata"
    );
    Ok(composed)
}

/// Rebuilds a container with a VP8X header and the given metadata chunks.
#[derive(Debug, Clone, Copy)]
pub struct ExtendedBuilder<'a> {
    old: HeaderView<'a>,
    flavor: ContainerFlavor,
    width: u32,
    height: u32,
    limit: u64,
}

impl<'a> ExtendedBuilder<'a> {
    /// `width`/`height` are only used when the old stream has no VP8X
    /// header of its own.
    pub fn new(old: HeaderView<'a>, flavor: ContainerFlavor, width: u32, height: u32) -> Self {
        Self {
            old,
            flavor,
            width,
            height,
            limit: SINK_LIMIT,
        }
    }

    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = limit;
        self
    }

    /// RIFF size field of the rebuilt stream (its length minus 8).
    pub fn riff_size(&self, blocks: &[MetadataBlock<'_>]) -> Result<u32> {
        let metadata_size: u64 = blocks.iter().map(MetadataBlock::chunk_size).sum();
        let upgrade = if self.flavor.is_extended() {
            0
        } else {
            VP8X_CHUNK_LEN as u64
        };
        let total = self.old.bytes().len() as u64 - 8 + upgrade + metadata_size;
        u32::try_from(total).map_err(|_| WebpSaveError::size_limit_exceeded(total + 8, SINK_LIMIT))
    }

    /// Flags for the rebuilt header: the old ones (or ALPHA for a lossless
    /// stream with alpha) plus one bit per metadata chunk.
    pub fn flags(&self, blocks: &[MetadataBlock<'_>]) -> Vp8xFlags {
        blocks
            .iter()
            .fold(self.flavor.seed_flags(), |flags, block| flags | block.key.flag())
    }

    /// `blocks` must be in ICC, EXIF, XMP order, at most one of each.
    pub fn build(&self, blocks: &[MetadataBlock<'_>]) -> Result<ByteSink> {
        let riff_size = self.riff_size(blocks)?;
        let flags = self.flags(blocks);
        let canvas = match self.flavor {
            ContainerFlavor::Extended { .. } => None,
            _ => Some((
                canvas_field(self.width, "width")?,
                canvas_field(self.height, "height")?,
            )),
        };
        let old = self.old.bytes();

        let mut sink = ByteSink::with_limit(self.limit);
        sink.reserve(riff_size as u64 + 8)?;

        sink.append_tag(RIFF)?;
        sink.append_u32_le(riff_size)?;
        sink.append_tag(WEBP)?;
        sink.append_tag(VP8X)?;
        sink.append_u32_le(VP8X_PAYLOAD_LEN as u32)?;
        match canvas {
            None => {
                let body = self.old.vp8x_payload().ok_or_else(|| {
                    WebpSaveError::malformed_container("VP8X header is truncated")
                })?;
                sink.append(body)?;
                sink.patch_byte(VP8X_FLAGS_OFFSET, flags.bits());
            }
            Some((width_minus_one, height_minus_one)) => {
                // flags byte followed by three reserved zero bytes
                sink.append_u32_le(flags.bits() as u32)?;
                sink.append_u24_le(width_minus_one)?;
                sink.append_u24_le(height_minus_one)?;
            }
        }
        debug!(
            flags = flags.bits(),
            upgraded = !self.flavor.is_extended(),
            "wrote VP8X header"
        );

        for block in blocks.iter().filter(|b| b.key == MetadataKey::Icc) {
            sink.append_chunk(block.key.fourcc(), block.data)?;
        }
        sink.append(&old[self.flavor.image_data_offset()..])?;
        for block in blocks.iter().filter(|b| b.key != MetadataKey::Icc) {
            sink.append_chunk(block.key.fourcc(), block.data)?;
        }

        debug_assert_eq!(sink.len() as u64, riff_size as u64 + 8);
        Ok(sink)
    }
}

fn canvas_field(dimension: u32, name: &'static str) -> Result<u32> {
    if dimension == 0 {
        return Err(WebpSaveError::malformed_container(format!(
            "canvas {name} must be at least 1"
        )));
    }
    let minus_one = dimension - 1;
    if minus_one > MAX_CANVAS_FIELD {
        return Err(WebpSaveError::dimension_exceeds_limit(
            dimension,
            MAX_CANVAS_FIELD + 1,
        ));
    }
    Ok(minus_one)
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::engine::container::{RIFF, WEBP};
    use crate::engine::metadata::MetadataProvider;
    use crate::error::{Result, WebpSaveError};
    use std::collections::BTreeMap;

    /// RIFF/WEBP stream holding a single chunk.
    pub fn simple_stream(tag: &[u8; 4], payload: &[u8]) -> Vec<u8> {
        let padded = payload.len() + (payload.len() & 1);
        let mut out = Vec::new();
        out.extend_from_slice(RIFF);
        out.extend_from_slice(&((4 + 8 + padded) as u32).to_le_bytes());
        out.extend_from_slice(WEBP);
        out.extend_from_slice(tag);
        out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        out.extend_from_slice(payload);
        if payload.len() & 1 == 1 {
            out.push(0);
        }
        out
    }

    /// (tag, payload offset, payload length) for every chunk after "WEBP".
    pub fn chunks(stream: &[u8]) -> Vec<([u8; 4], usize, usize)> {
        let mut found = Vec::new();
        let mut offset = 12;
        while offset + 8 <= stream.len() {
            let mut tag = [0u8; 4];
            tag.copy_from_slice(&stream[offset..offset + 4]);
            let len = u32::from_le_bytes([
                stream[offset + 4],
                stream[offset + 5],
                stream[offset + 6],
                stream[offset + 7],
            ]) as usize;
            found.push((tag, offset + 8, len));
            offset += 8 + len + (len & 1);
        }
        found
    }

    /// Provider backed by a map, with hooks to observe and break regeneration.
    #[derive(Debug, Default)]
    pub struct MapProvider {
        pub blobs: BTreeMap<String, Vec<u8>>,
        pub regenerated: Vec<String>,
        pub regenerated_exif: Option<Vec<u8>>,
        pub fail_regenerate: bool,
    }

    impl MapProvider {
        pub fn with(mut self, name: &str, data: impl Into<Vec<u8>>) -> Self {
            self.blobs.insert(name.to_string(), data.into());
            self
        }
    }

    impl MetadataProvider for MapProvider {
        fn has(&self, name: &str) -> bool {
            self.blobs.contains_key(name)
        }

        fn get(&self, name: &str) -> Result<&[u8]> {
            self.blobs
                .get(name)
                .map(Vec::as_slice)
                .ok_or_else(|| WebpSaveError::metadata_missing(name.to_string()))
        }

        fn regenerate(&mut self, name: &str) -> Result<()> {
            if self.fail_regenerate {
                return Err(WebpSaveError::metadata_regeneration_failed(
                    name.to_string(),
                    "refused",
                ));
            }
            self.regenerated.push(name.to_string());
            if let Some(blob) = self.regenerated_exif.take() {
                self.blobs.insert(name.to_string(), blob);
            }
            Ok(())
        }
    }
}
