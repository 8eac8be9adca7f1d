//! # Raster Object
//!
//! A [`Raster`] owns at most one native texture and serializes access to it.
//!
//! - Strong references are plain [`Arc`] clones ([`Raster::acquire`]); dropping the
//!   last one destroys the raster.
//! - Const references ([`Raster::add_const_ref`]) freeze the raster: every mutation
//!   fails with [`TxdError::RasterImmutable`] until they are released.
//! - Reads take the reader lock, mutations the writer lock. Const reference
//!   changes take the reader lock so they cannot interleave with a mutation.

use crate::block::{BlockMode, BlockProvider, SeekMode};
use crate::chunks::{CHUNK_STRUCT, CHUNK_TEXTURENATIVE};
use crate::engine::Engine;
use crate::error::{TxdError, TxdResult};
use crate::mipmap::RawMipmapLayer;
use crate::native::{AcquireFeedback, NativeTexture, TextureInfo};
use crate::pixel_data::PixelData;
use crate::stream::Stream;
use crate::version::LibraryVersion;
use parking_lot::{RwLock, RwLockWriteGuard};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

type NativeSlot = Option<Box<dyn NativeTexture>>;

/// Reference counted holder of a native texture.
pub struct Raster {
    engine: Arc<Engine>,
    native: RwLock<NativeSlot>,
    const_refs: AtomicU32,
}

impl core::fmt::Debug for Raster {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Raster")
            .field("native_type", &self.native_type_name())
            .field("const_refs", &self.const_ref_count())
            .finish()
    }
}

impl Raster {
    /// Creates an empty raster with a reference count of 1.
    pub fn new(engine: &Arc<Engine>) -> Arc<Self> {
        Arc::new(Self {
            engine: Arc::clone(engine),
            native: RwLock::new(None),
            const_refs: AtomicU32::new(0),
        })
    }

    /// Takes another strong reference.
    pub fn acquire(self: &Arc<Self>) -> Arc<Self> {
        Arc::clone(self)
    }

    /// Number of strong references.
    pub fn ref_count(self: &Arc<Self>) -> usize {
        Arc::strong_count(self)
    }

    /// Creates an independent raster holding a deep copy of the native texture.
    pub fn clone_raster(&self) -> Arc<Self> {
        let native = self.native.read();
        Arc::new(Self {
            engine: Arc::clone(&self.engine),
            native: RwLock::new(native.as_ref().map(|texture| texture.clone_box())),
            const_refs: AtomicU32::new(0),
        })
    }

    /// Engine the raster was created with.
    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    /// Freezes the raster against mutation.
    pub fn add_const_ref(&self) {
        let _guard = self.native.read();
        self.const_refs.fetch_add(1, Ordering::AcqRel);
    }

    /// Releases a const reference taken with [`Raster::add_const_ref`].
    pub fn rem_const_ref(&self) -> TxdResult<()> {
        let _guard = self.native.read();
        self.const_refs
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |count| count.checked_sub(1))
            .map(|_| ())
            .map_err(|_| TxdError::ConstRefUnderflow)
    }

    /// Number of outstanding const references.
    pub fn const_ref_count(&self) -> u32 {
        self.const_refs.load(Ordering::Acquire)
    }

    fn write_checked(&self) -> TxdResult<RwLockWriteGuard<'_, NativeSlot>> {
        let guard = self.native.write();
        if self.const_refs.load(Ordering::Acquire) > 0 {
            return Err(TxdError::RasterImmutable);
        }
        Ok(guard)
    }

    /// Whether a native texture is attached.
    pub fn has_native_data(&self) -> bool {
        self.native.read().is_some()
    }

    /// Whether the attached native texture has the given type name.
    pub fn has_native_data_of_type(&self, type_name: &str) -> bool {
        self.native_type_name() == Some(type_name)
    }

    /// Type name of the attached native texture.
    pub fn native_type_name(&self) -> Option<&'static str> {
        self.native.read().as_ref().map(|texture| texture.type_name())
    }

    /// Replaces the native texture with an empty one of the named type.
    pub fn new_native_data(&self, type_name: &str) -> TxdResult<()> {
        let native_type = self
            .engine
            .native_texture_type(type_name)
            .ok_or_else(|| TxdError::UnknownNativeType(type_name.into()))?;
        let mut native = self.write_checked()?;
        *native = Some(native_type.construct(&self.engine));
        Ok(())
    }

    /// Drops the native texture.
    pub fn clear_native_data(&self) -> TxdResult<()> {
        *self.write_checked()? = None;
        Ok(())
    }

    /// Serialization version of the native texture.
    pub fn engine_version(&self) -> TxdResult<LibraryVersion> {
        self.with_texture(|texture| Ok(texture.version()))
    }

    /// Changes the serialization version of the native texture.
    pub fn set_engine_version(&self, version: LibraryVersion) -> TxdResult<()> {
        self.with_texture_mut(|engine, texture| {
            texture.set_version(engine, version);
            Ok(())
        })
    }

    /// Shared texture properties of the native texture.
    pub fn texture_info(&self) -> TxdResult<TextureInfo> {
        self.with_texture(|texture| Ok(texture.info().clone()))
    }

    /// Modifies the shared texture properties.
    pub fn update_texture_info(&self, update: impl FnOnce(&mut TextureInfo)) -> TxdResult<()> {
        self.with_texture_mut(|_, texture| {
            update(texture.info_mut());
            Ok(())
        })
    }

    /// Exports the mipmap chain.
    pub fn get_pixel_data(&self) -> TxdResult<PixelData> {
        self.with_texture(|texture| texture.get_pixel_data(&self.engine))
    }

    /// Replaces the mipmap chain.
    pub fn set_pixel_data(&self, pixels: PixelData) -> TxdResult<AcquireFeedback> {
        self.with_texture_mut(|engine, texture| texture.set_pixel_data(engine, pixels))
    }

    /// Drops the mipmap chain and palette.
    pub fn unset_pixel_data(&self) -> TxdResult<()> {
        self.with_texture_mut(|engine, texture| {
            texture.unset_pixel_data(engine);
            Ok(())
        })
    }

    /// Number of mipmap levels.
    pub fn mipmap_count(&self) -> TxdResult<usize> {
        self.with_texture(|texture| Ok(texture.mipmap_count()))
    }

    /// Exports one mipmap level.
    pub fn get_mipmap(&self, index: usize) -> TxdResult<RawMipmapLayer> {
        self.with_texture(|texture| texture.get_mipmap(&self.engine, index))
    }

    /// Appends a mipmap level.
    pub fn add_mipmap(&self, layer: RawMipmapLayer) -> TxdResult<()> {
        self.with_texture_mut(|engine, texture| texture.add_mipmap(engine, layer))
    }

    /// Removes every level but the base.
    pub fn clear_mipmaps(&self) -> TxdResult<()> {
        self.with_texture_mut(|engine, texture| texture.clear_mipmaps(engine))
    }

    /// Format description of the native texture.
    pub fn texture_format_string(&self) -> TxdResult<String> {
        self.with_texture(|texture| Ok(texture.texture_format_string()))
    }

    fn with_texture<R>(&self, body: impl FnOnce(&dyn NativeTexture) -> TxdResult<R>) -> TxdResult<R> {
        let native = self.native.read();
        let texture = native.as_deref().ok_or(TxdError::NoNativeData)?;
        body(texture)
    }

    fn with_texture_mut<R>(
        &self,
        body: impl FnOnce(&Engine, &mut dyn NativeTexture) -> TxdResult<R>,
    ) -> TxdResult<R> {
        let mut native = self.write_checked()?;
        let texture = native.as_deref_mut().ok_or(TxdError::NoNativeData)?;
        body(&self.engine, texture)
    }

    /// Runs `body` on the concrete native texture.
    ///
    /// # Errors
    ///
    /// - [`TxdError::NoNativeData`] without a native texture
    /// - [`TxdError::UnknownNativeType`] if the texture is not a `T`
    pub fn with_native<T: NativeTexture, R>(&self, body: impl FnOnce(&T) -> R) -> TxdResult<R> {
        self.with_texture(|texture| {
            let concrete = texture
                .as_any()
                .downcast_ref::<T>()
                .ok_or_else(|| TxdError::UnknownNativeType(texture.type_name().into()))?;
            Ok(body(concrete))
        })
    }

    /// Runs `body` on the concrete native texture, mutably.
    pub fn with_native_mut<T: NativeTexture, R>(
        &self,
        body: impl FnOnce(&Engine, &mut T) -> R,
    ) -> TxdResult<R> {
        self.with_texture_mut(|engine, texture| {
            let type_name = texture.type_name();
            let concrete = texture
                .as_any_mut()
                .downcast_mut::<T>()
                .ok_or_else(|| TxdError::UnknownNativeType(type_name.into()))?;
            Ok(body(engine, concrete))
        })
    }

    /// Writes the texture native block to `stream`.
    ///
    /// The first serialization seals the engine's type registry.
    pub fn serialize(&self, stream: &mut dyn Stream) -> TxdResult<()> {
        let mut block = BlockProvider::new(&self.engine, stream, BlockMode::Write);
        self.serialize_block(&mut block)
    }

    /// Writes the texture native block through a provider that has not been entered yet.
    pub fn serialize_block(&self, block: &mut BlockProvider<'_>) -> TxdResult<()> {
        let native = self.native.read();
        let texture = native.as_deref().ok_or(TxdError::NoNativeData)?;
        self.engine.seal_registry();

        block.set_block_id(CHUNK_TEXTURENATIVE);
        block.set_block_version(texture.version());
        block.scoped(|block| texture.serialize(&self.engine, block))
    }

    /// Reads a texture native block from `stream`, replacing the native texture.
    ///
    /// On failure the raster is left without native data.
    pub fn deserialize(&self, stream: &mut dyn Stream) -> TxdResult<()> {
        let mut block = BlockProvider::new(&self.engine, stream, BlockMode::Read);
        self.deserialize_block(&mut block)
    }

    /// Reads a texture native block through a provider that has not been entered yet.
    pub fn deserialize_block(&self, block: &mut BlockProvider<'_>) -> TxdResult<()> {
        let mut native = self.write_checked()?;
        *native = None;

        block.enter_expected(CHUNK_TEXTURENATIVE)?;
        let result = self.read_native(block);
        let left = block.leave_context();
        let texture = result?;
        left?;

        log::debug!(
            target: "rwtxd",
            "deserialized '{}' texture '{}'",
            texture.type_name(),
            texture.info().name
        );
        *native = Some(texture);
        Ok(())
    }

    fn read_native(&self, block: &mut BlockProvider<'_>) -> TxdResult<Box<dyn NativeTexture>> {
        let platform = BlockProvider::read_expected_child(block, CHUNK_STRUCT, |header| header.read_u32())?;
        block.seek(0, SeekMode::Begin)?;

        let native_type = self
            .engine
            .native_texture_type_for_platform(platform)
            .ok_or_else(|| TxdError::structural(format!("unknown platform descriptor {platform:#x}")))?;
        let mut texture = native_type.construct(&self.engine);
        texture.deserialize(&self.engine, block)?;
        Ok(texture)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pixel_data::RasterLayout;
    use crate::test_prelude::*;
    use std::io::Cursor;

    fn dummy_engine() -> Arc<Engine> {
        let engine = Engine::new();
        engine
            .register_native_texture_type(Arc::new(DummyType("dummy")))
            .unwrap();
        Arc::new(engine)
    }

    fn filled_raster(engine: &Arc<Engine>) -> Arc<Raster> {
        let raster = Raster::new(engine);
        raster.new_native_data("dummy").unwrap();
        raster
            .set_pixel_data(PixelData::from_surface(
                RasterLayout::RGBA8888,
                2,
                2,
                (0..16).collect(),
            ))
            .unwrap();
        raster
    }

    #[test]
    fn reference_counting() {
        let engine = dummy_engine();
        let raster = Raster::new(&engine);
        assert_eq!(raster.ref_count(), 1);
        let second = raster.acquire();
        assert_eq!(raster.ref_count(), 2);
        drop(second);
        assert_eq!(raster.ref_count(), 1);

        assert!(matches!(raster.rem_const_ref(), Err(TxdError::ConstRefUnderflow)));
        raster.add_const_ref();
        raster.rem_const_ref().unwrap();
        assert_eq!(raster.const_ref_count(), 0);
    }

    #[test]
    fn const_references_freeze_the_raster() {
        let engine = dummy_engine();
        let raster = filled_raster(&engine);
        let before = raster.get_pixel_data().unwrap();

        raster.add_const_ref();
        let replacement = PixelData::from_surface(RasterLayout::RGBA8888, 1, 1, vec![0; 4]);
        assert!(matches!(
            raster.set_pixel_data(replacement.clone()),
            Err(TxdError::RasterImmutable)
        ));
        assert!(matches!(raster.clear_mipmaps(), Err(TxdError::RasterImmutable)));
        assert!(matches!(
            raster.set_engine_version(LibraryVersion::new(3, 4, 0, 3)),
            Err(TxdError::RasterImmutable)
        ));
        assert!(matches!(raster.new_native_data("dummy"), Err(TxdError::RasterImmutable)));
        assert!(matches!(raster.clear_native_data(), Err(TxdError::RasterImmutable)));
        assert_eq!(raster.get_pixel_data().unwrap(), before);

        raster.rem_const_ref().unwrap();
        raster.set_pixel_data(replacement).unwrap();
    }

    #[test]
    fn native_data_management() {
        let engine = dummy_engine();
        let raster = Raster::new(&engine);
        assert!(!raster.has_native_data());
        assert!(matches!(raster.get_pixel_data(), Err(TxdError::NoNativeData)));
        assert!(matches!(
            raster.new_native_data("missing"),
            Err(TxdError::UnknownNativeType(_))
        ));

        raster.new_native_data("dummy").unwrap();
        assert!(raster.has_native_data_of_type("dummy"));
        assert_eq!(raster.engine_version().unwrap(), LibraryVersion::default());
        raster.set_engine_version(LibraryVersion::new(3, 4, 0, 3)).unwrap();
        assert_eq!(raster.engine_version().unwrap(), LibraryVersion::new(3, 4, 0, 3));

        let width = raster.with_native(|texture: &DummyTexture| texture.mipmap_count()).unwrap();
        assert_eq!(width, 0);

        raster.clear_native_data().unwrap();
        assert!(!raster.has_native_data());
    }

    #[test]
    fn clones_are_independent() {
        let engine = dummy_engine();
        let raster = filled_raster(&engine);
        let copy = raster.clone_raster();
        raster.unset_pixel_data().unwrap();
        assert_eq!(raster.mipmap_count().unwrap(), 0);
        assert_eq!(copy.mipmap_count().unwrap(), 1);
    }

    #[test]
    fn serialization_round_trip() {
        let engine = dummy_engine();
        let raster = filled_raster(&engine);
        raster
            .update_texture_info(|info| info.name = "crate_wood".into())
            .unwrap();

        let mut stream = Cursor::new(Vec::new());
        raster.serialize(&mut stream).unwrap();
        assert!(engine.is_registry_sealed());

        let bytes = stream.into_inner();
        assert_eq!(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]), CHUNK_TEXTURENATIVE);

        let read = Raster::new(&engine);
        read.deserialize(&mut Cursor::new(bytes)).unwrap();
        assert!(read.has_native_data_of_type("dummy"));
        assert_eq!(read.texture_info().unwrap().name, "crate_wood");
        assert_eq!(read.get_pixel_data().unwrap(), raster.get_pixel_data().unwrap());
    }

    #[test]
    fn failed_deserialization_leaves_no_native_data() {
        let engine = dummy_engine();
        let raster = filled_raster(&engine);
        let mut stream = Cursor::new(Vec::new());
        raster.serialize(&mut stream).unwrap();
        let mut bytes = stream.into_inner();
        // Corrupt the platform descriptor.
        bytes[24] ^= 0xFF;

        assert!(matches!(
            raster.deserialize(&mut Cursor::new(bytes)),
            Err(TxdError::Structural(_))
        ));
        assert!(!raster.has_native_data());
    }
}
