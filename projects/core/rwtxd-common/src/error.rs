//! Error types for pixel format operations.

use crate::formats::{CompressionType, PaletteType, RasterFormat};
use crate::permute::PixelEncoding;
use thiserror::Error;

/// Errors raised while reading, writing or converting texels.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PixelFormatError {
    /// The raster format cannot be stored at the requested depth.
    #[error("Raster format {format:?} cannot be stored with a depth of {depth} bits")]
    UnsupportedDepth {
        /// Format that was requested.
        format: RasterFormat,
        /// Depth that was requested.
        depth: u32,
    },

    /// Conversion between the two layouts is not implemented.
    #[error("Unsupported texel conversion: {0}")]
    UnsupportedConversion(&'static str),

    /// Compressed data of this kind cannot be decoded.
    #[error("Compression type {0:?} cannot be decoded")]
    UndecodableCompression(CompressionType),

    /// A palette index does not fit into the destination palette kind.
    #[error("Palette index {index} does not fit into palette type {palette_type:?}")]
    PaletteIndexOverflow {
        /// Offending index.
        index: u32,
        /// Destination palette type.
        palette_type: PaletteType,
    },

    /// Source or destination buffer is smaller than the layout requires.
    #[error("Buffer too small: expected at least {expected} bytes, got {actual}")]
    BufferTooSmall {
        /// Minimum number of bytes needed.
        expected: usize,
        /// Number of bytes available.
        actual: usize,
    },

    /// No permutation exists between the two pixel encodings.
    #[error("No memory permutation between {raw:?} and {packed:?}")]
    InvalidPermutationPair {
        /// Raw (linear) encoding.
        raw: PixelEncoding,
        /// Packed (hardware) encoding.
        packed: PixelEncoding,
    },

    /// The tiled layout cannot address a surface with these dimensions.
    #[error("Surface of {stride} bytes x {height} rows is not a multiple of the {cluster_width}x{cluster_height} tile cluster")]
    UnalignedTileSurface {
        /// Row stride in bytes.
        stride: usize,
        /// Number of rows.
        height: u32,
        /// Cluster width in bytes.
        cluster_width: u32,
        /// Cluster height in rows.
        cluster_height: u32,
    },
}

/// Result type for pixel format operations.
pub type PixelResult<T> = Result<T, PixelFormatError>;
