// src/engine/api.rs
//
// Top-level write operations: encode one frame, splice in its metadata,
// and hand the finished container to a buffer or a file.

use crate::engine::compose::compose_metadata;
use crate::engine::encoder::{encode_frame, Compressor, Frame, LibWebp};
use crate::engine::sink::ByteSink;
use crate::error::{Result, WebpSaveError};
use crate::options::EncodeOptions;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::debug;

/// Reusable writer bound to one set of options and one compressor.
///
/// ```no_run
/// use webpsave::{EncodeOptions, Frame, WebpWriter};
///
/// let pixels = vec![0u8; 16 * 16 * 3];
/// let mut frame = Frame::new(pixels, 16, 16, 3);
/// let writer = WebpWriter::new(EncodeOptions::new().quality(80));
/// let bytes = writer.write_to_buffer(&mut frame)?;
/// # Ok::<(), webpsave::WebpSaveError>(())
/// ```
#[derive(Debug, Clone)]
pub struct WebpWriter<C: Compressor = LibWebp> {
    compressor: C,
    options: EncodeOptions,
}

impl WebpWriter<LibWebp> {
    pub fn new(options: EncodeOptions) -> Self {
        Self::with_compressor(LibWebp, options)
    }
}

impl<C: Compressor> WebpWriter<C> {
    pub fn with_compressor(compressor: C, options: EncodeOptions) -> Self {
        Self {
            compressor,
            options,
        }
    }

    pub fn options(&self) -> &EncodeOptions {
        &self.options
    }

    /// Run the encode driver and the composer, returning the final sink.
    ///
    /// The frame is borrowed mutably because its EXIF is refreshed to the
    /// encoded dimensions before being embedded.
    pub fn encode(&self, frame: &mut Frame<'_>) -> Result<ByteSink> {
        let base = encode_frame(&self.compressor, frame, &self.options)?;
        let (width, height) = (frame.width(), frame.height());
        compose_metadata(base, width, height, frame, self.options.strip)
    }

    pub fn write_to_buffer(&self, frame: &mut Frame<'_>) -> Result<Vec<u8>> {
        Ok(self.encode(frame)?.into_vec())
    }

    /// Write the container to `path` atomically: the bytes go to a temporary
    /// file next to the target, which replaces the target only once fully
    /// written and synced. Returns the number of bytes written.
    pub fn write_to_file(&self, path: impl AsRef<Path>, frame: &mut Frame<'_>) -> Result<u64> {
        let path = path.as_ref();
        let sink = self.encode(frame)?;
        persist_atomically(path, sink.as_bytes())?;
        debug!(path = %path.display(), bytes = sink.len(), "wrote webp file");
        Ok(sink.len() as u64)
    }
}

/// Encode `frame` and return the finished WebP container.
#[tracing::instrument(
    skip_all,
    fields(width = frame.width(), height = frame.height(), lossless = options.lossless)
)]
pub fn write_to_buffer(frame: &mut Frame<'_>, options: &EncodeOptions) -> Result<Vec<u8>> {
    WebpWriter::new(options.clone()).write_to_buffer(frame)
}

/// Encode `frame` and write the finished WebP container to `path`.
#[tracing::instrument(
    skip_all,
    fields(path = %path.as_ref().display(), width = frame.width(), height = frame.height())
)]
pub fn write_to_file(
    path: impl AsRef<Path>,
    frame: &mut Frame<'_>,
    options: &EncodeOptions,
) -> Result<u64> {
    WebpWriter::new(options.clone()).write_to_file(path, frame)
}

fn persist_atomically(path: &Path, bytes: &[u8]) -> Result<()> {
    let display = || path.display().to_string();
    // Same directory as the target so the final rename stays on one filesystem.
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut temp = NamedTempFile::new_in(dir)
        .map_err(|e| WebpSaveError::file_write_failed(dir.display().to_string(), e))?;
    temp.write_all(bytes)
        .map_err(|e| WebpSaveError::file_write_failed(display(), e))?;
    temp.as_file_mut()
        .sync_all()
        .map_err(|e| WebpSaveError::file_write_failed(display(), e))?;
    temp.persist(path)
        .map_err(|e| WebpSaveError::file_write_failed(display(), e.error))?;
    Ok(())
}
