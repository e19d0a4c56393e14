// src/engine.rs
//
// The core of webpsave. A single write:
// 1. Drives libwebp once, collecting its output in a growable sink
// 2. Upgrades the container to VP8X when metadata is to be embedded
// 3. Splices ICC, EXIF and XMP chunks around the image data
//
// This file is a facade that delegates to the decomposed modules in engine/

// =============================================================================
// LIMITS
// =============================================================================

/// Maximum width or height libwebp can encode (14-bit VP8/VP8L fields).
pub const MAX_DIMENSION: u32 = 16383;

// =============================================================================
// MODULE DECOMPOSITION
// =============================================================================

mod api;
pub mod compose;
pub mod container;
mod encoder;
pub mod metadata;
pub mod sink;

pub use api::{write_to_buffer, write_to_file, WebpWriter};
pub use compose::{compose_metadata, ExtendedBuilder};
pub use container::{ContainerFlavor, HeaderView, Vp8xFlags};
pub use encoder::{encode_frame, Compressor, Frame, LibWebp, Picture};
pub use metadata::{MetadataBlock, MetadataKey, MetadataProvider, MetadataSet};
pub use sink::{ByteSink, MIN_GROWTH, SINK_LIMIT};
