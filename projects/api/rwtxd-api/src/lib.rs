#![doc = include_str!(concat!("../", core::env!("CARGO_PKG_README")))]
#![warn(missing_docs)]

pub mod block;
pub mod chunks;
pub mod engine;
pub mod error;
pub mod extension;
pub mod mipmap;
pub mod native;
pub mod pixel_data;
pub mod raster;
pub mod size_rules;
pub mod stream;
pub mod version;

#[cfg(test)]
pub(crate) mod test_prelude;

pub use block::{BlockHeader, BlockMode, BlockProvider, SeekMode};
pub use chunks::{AddressingMode, FilterMode, RasterFormatFlags, TexFormatInfo};
pub use engine::{Engine, EngineConfig, LogWarningManager, RecordingWarningManager, WarningManager};
pub use error::{TxdError, TxdResult};
pub use extension::{ExtensionEntry, ExtensionStore};
pub use mipmap::RawMipmapLayer;
pub use native::{AcquireFeedback, NativeTexture, NativeTextureType, StorageCapabilities, TextureInfo};
pub use pixel_data::{MipmapLayer, PixelData, RasterLayout};
pub use raster::Raster;
pub use size_rules::SizeRules;
pub use stream::Stream;
pub use version::LibraryVersion;

// Pixel layer types used throughout the public API.
pub use rwtxd_common;
