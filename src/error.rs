// src/error.rs
//
// Unified error handling for webpsave
// Uses thiserror for simple, type-safe error handling
//
// Error Taxonomy:
// - Config: invalid or unsupported encode configuration
// - Encode: libwebp could not import or compress the frame
// - Memory: allocation failure or the 4 GiB container ceiling
// - Metadata: a metadata blob could not be read or regenerated
// - Io: the final sink could not be written

use std::borrow::Cow;
use thiserror::Error;

/// Error taxonomy for callers that want to branch on the kind of failure
/// rather than on individual variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Invalid or unsupported encode configuration
    Config,
    /// The compressor failed to produce a usable container
    Encode,
    /// Allocation failure or size ceiling
    Memory,
    /// Metadata provider failure
    Metadata,
    /// Output could not be written
    Io,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Config => "ConfigError",
            ErrorCategory::Encode => "EncodeError",
            ErrorCategory::Memory => "MemoryError",
            ErrorCategory::Metadata => "MetadataError",
            ErrorCategory::Io => "IOError",
        }
    }
}

/// webpsave error types
#[derive(Debug, Error)]
pub enum WebpSaveError {
    // Configuration Errors
    #[error("Invalid value for {name}: {value}. {reason}")]
    InvalidConfig {
        name: Cow<'static, str>,
        value: Cow<'static, str>,
        reason: Cow<'static, str>,
    },

    #[error("libwebp version mismatch: {message}")]
    ConfigVersion { message: Cow<'static, str> },

    // Encode Errors
    #[error("Image dimension {dimension} exceeds maximum {max}")]
    DimensionExceedsLimit { dimension: u32, max: u32 },

    #[error("Failed to import scanlines: {message}")]
    ImportFailed { message: Cow<'static, str> },

    #[error("Failed to encode as webp: {message}")]
    EncodeFailed { message: Cow<'static, str> },

    #[error("Malformed webp container: {message}")]
    MalformedContainer { message: Cow<'static, str> },

    // Memory Errors
    #[error("Output of {requested} bytes would reach the {limit} byte container limit")]
    SizeLimitExceeded { requested: u64, limit: u64 },

    #[error("Out of memory growing output buffer to {requested} bytes")]
    AllocationFailed { requested: u64 },

    // Metadata Errors
    #[error("No '{key}' metadata is attached to the image")]
    MetadataMissing { key: Cow<'static, str> },

    #[error("Malformed '{key}' metadata: {message}")]
    MetadataMalformed {
        key: Cow<'static, str>,
        message: Cow<'static, str>,
    },

    #[error("Failed to regenerate '{key}' metadata: {message}")]
    MetadataRegenerationFailed {
        key: Cow<'static, str>,
        message: Cow<'static, str>,
    },

    // I/O Errors
    #[error("Failed to write file '{path}': {source}")]
    FileWriteFailed {
        path: Cow<'static, str>,
        #[source]
        source: std::io::Error,
    },
}

// Constructor Helpers
impl WebpSaveError {
    pub fn invalid_config(
        name: impl Into<Cow<'static, str>>,
        value: impl Into<Cow<'static, str>>,
        reason: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::InvalidConfig {
            name: name.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    pub fn config_version(message: impl Into<Cow<'static, str>>) -> Self {
        Self::ConfigVersion {
            message: message.into(),
        }
    }

    pub fn dimension_exceeds_limit(dimension: u32, max: u32) -> Self {
        Self::DimensionExceedsLimit { dimension, max }
    }

    pub fn import_failed(message: impl Into<Cow<'static, str>>) -> Self {
        Self::ImportFailed {
            message: message.into(),
        }
    }

    pub fn encode_failed(message: impl Into<Cow<'static, str>>) -> Self {
        Self::EncodeFailed {
            message: message.into(),
        }
    }

    pub fn malformed_container(message: impl Into<Cow<'static, str>>) -> Self {
        Self::MalformedContainer {
            message: message.into(),
        }
    }

    pub fn size_limit_exceeded(requested: u64, limit: u64) -> Self {
        Self::SizeLimitExceeded { requested, limit }
    }

    pub fn allocation_failed(requested: u64) -> Self {
        Self::AllocationFailed { requested }
    }

    pub fn metadata_missing(key: impl Into<Cow<'static, str>>) -> Self {
        Self::MetadataMissing { key: key.into() }
    }

    pub fn metadata_malformed(
        key: impl Into<Cow<'static, str>>,
        message: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::MetadataMalformed {
            key: key.into(),
            message: message.into(),
        }
    }

    pub fn metadata_regeneration_failed(
        key: impl Into<Cow<'static, str>>,
        message: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::MetadataRegenerationFailed {
            key: key.into(),
            message: message.into(),
        }
    }

    pub fn file_write_failed(path: impl Into<Cow<'static, str>>, source: std::io::Error) -> Self {
        Self::FileWriteFailed {
            path: path.into(),
            source,
        }
    }

    /// Check if this error is recoverable (caller can fix it and retry)
    ///
    /// Config and Io failures depend on caller-supplied input or environment.
    /// The rest are terminal for the frame being written.
    pub fn is_recoverable(&self) -> bool {
        match self.category() {
            ErrorCategory::Config | ErrorCategory::Io => true,
            ErrorCategory::Encode | ErrorCategory::Memory | ErrorCategory::Metadata => false,
        }
    }

    /// Get the error category for this error
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidConfig { .. } | Self::ConfigVersion { .. } => ErrorCategory::Config,

            Self::DimensionExceedsLimit { .. }
            | Self::ImportFailed { .. }
            | Self::EncodeFailed { .. }
            | Self::MalformedContainer { .. } => ErrorCategory::Encode,

            Self::SizeLimitExceeded { .. } | Self::AllocationFailed { .. } => {
                ErrorCategory::Memory
            }

            Self::MetadataMissing { .. }
            | Self::MetadataMalformed { .. }
            | Self::MetadataRegenerationFailed { .. } => ErrorCategory::Metadata,

            Self::FileWriteFailed { .. } => ErrorCategory::Io,
        }
    }
}

// Result type alias
pub type Result<T> = std::result::Result<T, WebpSaveError>;
