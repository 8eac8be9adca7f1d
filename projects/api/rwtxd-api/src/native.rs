//! # Native Texture Interface
//!
//! Every platform codec provides two objects:
//!
//! - a [`NativeTextureType`], registered once with the [`Engine`], which describes the
//!   platform and constructs instances
//! - a [`NativeTexture`] instance per texture, which owns the platform representation
//!   (swizzled mipmaps, palette, registers) and converts it to and from [`PixelData`]
//!
//! The engine is never stored inside a texture; it is passed into every call.

use crate::block::BlockProvider;
use crate::chunks::{AddressingMode, FilterMode};
use crate::engine::Engine;
use crate::error::TxdResult;
use crate::extension::ExtensionStore;
use crate::mipmap::{self, RawMipmapLayer};
use crate::pixel_data::PixelData;
use crate::size_rules::SizeRules;
use crate::version::LibraryVersion;
use core::any::Any;

/// Storage features of a platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct StorageCapabilities {
    /// DXT1 blocks can be stored directly.
    pub supports_dxt1: bool,
    /// DXT2 blocks can be stored directly.
    pub supports_dxt2: bool,
    /// DXT3 blocks can be stored directly.
    pub supports_dxt3: bool,
    /// DXT4 blocks can be stored directly.
    pub supports_dxt4: bool,
    /// DXT5 blocks can be stored directly.
    pub supports_dxt5: bool,
    /// Palette rasters can be stored.
    pub supports_palette: bool,
    /// The platform only stores compressed data.
    pub is_compressed_format: bool,
    /// More than one mipmap level can be stored.
    pub supports_mipmaps: bool,
}

/// Result of handing [`PixelData`] to a native texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AcquireFeedback {
    /// The buffers were adopted as is, without conversion or permutation.
    pub directly_acquired: bool,
}

/// Properties shared by the texture objects of every platform.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TextureInfo {
    /// Texture name.
    pub name: String,
    /// Name of the alpha mask texture.
    pub mask_name: String,
    /// Sampling filter.
    pub filter_mode: FilterMode,
    /// Horizontal addressing.
    pub u_addressing: AddressingMode,
    /// Vertical addressing.
    pub v_addressing: AddressingMode,
    /// Name field marker from `texFormatInfo`, round-tripped verbatim.
    pub name_marker: u32,
    /// Mask name field marker from `texFormatInfo`, round-tripped verbatim.
    pub mask_marker: u32,
    /// Plugin extensions attached to the texture.
    pub extensions: ExtensionStore,
}

/// A platform codec as registered with the [`Engine`].
pub trait NativeTextureType: Send + Sync {
    /// Unique registry name, e.g. `"PlayStation2"`.
    fn name(&self) -> &'static str;

    /// Platform descriptor written at the start of the texture's struct chunk.
    fn platform_descriptor(&self) -> u32;

    /// Whether textures with this platform descriptor are read by this type.
    fn accepts_platform(&self, platform: u32) -> bool {
        platform == self.platform_descriptor()
    }

    /// Creates an empty texture using the engine's configured version.
    fn construct(&self, engine: &Engine) -> Box<dyn NativeTexture>;

    /// Storage features of the platform.
    fn capabilities(&self) -> StorageCapabilities;

    /// Dimension limits of the platform.
    fn size_rules(&self) -> SizeRules;

    /// Identifier of the driver family that consumes this format.
    fn driver_identifier(&self) -> u32;
}

/// One texture in a platform's native representation.
pub trait NativeTexture: Send + Sync + Any {
    /// Registry name of the owning [`NativeTextureType`].
    fn type_name(&self) -> &'static str;

    /// Deep copy.
    fn clone_box(&self) -> Box<dyn NativeTexture>;

    /// Writes the payload of the texture native block.
    ///
    /// `block` is entered; the texture writes its child chunks into it.
    fn serialize(&self, engine: &Engine, block: &mut BlockProvider<'_>) -> TxdResult<()>;

    /// Reads the payload of an entered texture native block.
    ///
    /// On failure the texture is left empty.
    fn deserialize(&mut self, engine: &Engine, block: &mut BlockProvider<'_>) -> TxdResult<()>;

    /// Exports the mipmap chain in a portable layout.
    fn get_pixel_data(&self, engine: &Engine) -> TxdResult<PixelData>;

    /// Replaces the mipmap chain, converting when the layout is not native.
    fn set_pixel_data(&mut self, engine: &Engine, pixels: PixelData) -> TxdResult<AcquireFeedback>;

    /// Drops all mipmaps and the palette.
    fn unset_pixel_data(&mut self, engine: &Engine);

    /// Number of stored mipmap levels.
    fn mipmap_count(&self) -> usize;

    /// Human readable format description, e.g. `"PAL8 8888"`.
    fn texture_format_string(&self) -> String;

    /// Library version the texture serializes with.
    fn version(&self) -> LibraryVersion;

    /// Changes the serialization version.
    fn set_version(&mut self, engine: &Engine, version: LibraryVersion);

    /// Shared texture properties.
    fn info(&self) -> &TextureInfo;

    /// Shared texture properties, mutable.
    fn info_mut(&mut self) -> &mut TextureInfo;

    /// Dimension limits applied by [`NativeTexture::set_pixel_data`].
    fn size_rules(&self) -> SizeRules;

    /// Upcast for downcasting to the concrete texture.
    fn as_any(&self) -> &dyn Any;

    /// Upcast for downcasting to the concrete texture, mutable.
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Exports one mipmap level.
    fn get_mipmap(&self, engine: &Engine, index: usize) -> TxdResult<RawMipmapLayer> {
        mipmap::get_mipmap(self, engine, index)
    }

    /// Appends a mipmap level, converting it into the texture's layout.
    fn add_mipmap(&mut self, engine: &Engine, layer: RawMipmapLayer) -> TxdResult<()> {
        mipmap::add_mipmap(self, engine, layer)
    }

    /// Removes every level but the base.
    fn clear_mipmaps(&mut self, engine: &Engine) -> TxdResult<()> {
        mipmap::clear_mipmaps(self, engine)
    }
}
