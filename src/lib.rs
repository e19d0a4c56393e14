// lib.rs
//
// webpsave: WebP writer built on libwebp
//
// Design goals:
// - One encode pass into a growable, size-capped buffer
// - Metadata (ICC, EXIF, XMP) spliced into a VP8X container in a single rebuild
// - No partial output: every failure is reported, never a half-written file

// Memory allocator optimization - jemalloc for better performance
// Note: jemalloc is not supported on Windows/MSVC, so we exclude it on that platform
#[cfg(all(feature = "jemalloc", not(target_env = "msvc")))]
#[global_allocator]
static ALLOC: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

pub mod codecs;
pub mod engine;
pub mod error;
pub mod options;

pub use engine::{
    compose_metadata, encode_frame, write_to_buffer, write_to_file, ByteSink, Compressor, Frame,
    LibWebp, MetadataKey, MetadataProvider, MetadataSet, WebpWriter,
};
pub use error::{ErrorCategory, Result, WebpSaveError};
pub use options::{EncodeOptions, Preset};
