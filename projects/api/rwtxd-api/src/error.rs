//! Error types for native texture operations.

use rwtxd_common::PixelFormatError;
use thiserror::Error;

/// Result type for native texture operations
pub type TxdResult<T> = Result<T, TxdError>;

/// Errors raised by the block layer, the engine and the native texture codecs.
#[derive(Debug, Error)]
pub enum TxdError {
    /// Malformed on-disk structure: bad magic, unexpected chunk, invalid dimensions.
    #[error("Structural error: {0}")]
    Structural(String),

    /// Read or write outside the bounds of the current block or stream.
    #[error("Block access violation: {0}")]
    BlockAccessViolation(String),

    /// The stream is shorter than the length declared by a block header.
    #[error("Block truncated: declared {declared} bytes, {available} available")]
    BlockTruncation {
        /// Length declared by the header.
        declared: u64,
        /// Bytes remaining in the enclosing stream or block.
        available: u64,
    },

    /// The stream returned fewer bytes than requested.
    #[error("Stream underrun: needed {needed} bytes")]
    StreamUnderrun {
        /// Number of bytes that were requested.
        needed: usize,
    },

    /// Raster, palette or depth combination not representable by the target.
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// The pixel allocator refused a request.
    #[error("Allocation of {0} bytes failed")]
    AllocationFailure(usize),

    /// Mutation attempted while the raster holds const references.
    #[error("Raster is immutable while const references are held")]
    RasterImmutable,

    /// The codec found internally inconsistent data.
    #[error("Codec invariant violated: {0}")]
    CodecInvariantViolation(String),

    /// A child extension chunk could not be parsed.
    #[error("Extension parse failure: {0}")]
    ExtensionParseFailure(String),

    /// A native texture type with this name is already registered.
    #[error("Native texture type '{0}' is already registered")]
    TypeAlreadyRegistered(String),

    /// No native texture type matches the requested name or platform.
    #[error("Unknown native texture type: {0}")]
    UnknownNativeType(String),

    /// Types can no longer be registered after the first serialization.
    #[error("Native texture type registry is sealed")]
    RegistrySealed,

    /// The raster has no native texture attached.
    #[error("Raster has no native data")]
    NoNativeData,

    /// `rem_const_ref` was called without a matching `add_const_ref`.
    #[error("Const reference count underflow")]
    ConstRefUnderflow,

    /// A mipmap index past the end of the chain.
    #[error("Mipmap index {index} out of range (count {count})")]
    InvalidMipmapIndex {
        /// Requested index.
        index: usize,
        /// Number of mipmaps present.
        count: usize,
    },

    /// Pixel format conversion error.
    #[error("Pixel format error: {0}")]
    PixelFormat(#[from] PixelFormatError),

    /// Error reported by the underlying stream.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TxdError {
    /// Creates a [`TxdError::Structural`] error.
    pub fn structural(message: impl Into<String>) -> Self {
        Self::Structural(message.into())
    }

    /// Creates a [`TxdError::UnsupportedFormat`] error.
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::UnsupportedFormat(message.into())
    }

    /// Creates a [`TxdError::BlockAccessViolation`] error.
    pub fn access_violation(message: impl Into<String>) -> Self {
        Self::BlockAccessViolation(message.into())
    }
}
