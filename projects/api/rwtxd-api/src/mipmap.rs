//! # Mipmap Virtual Manager
//!
//! Level-wise access built on top of [`NativeTexture::get_pixel_data`] and
//! [`NativeTexture::set_pixel_data`], so codecs only implement whole-chain
//! import and export.
//!
//! Incoming levels are converted into the layout the texture reports, subject to
//! [`EngineConfig::fix_incompatible_rasters`](crate::EngineConfig::fix_incompatible_rasters).

use crate::engine::Engine;
use crate::error::{TxdError, TxdResult};
use crate::native::NativeTexture;
use crate::pixel_data::{MipmapLayer, PixelData, RasterLayout};

/// A single mipmap level together with everything needed to interpret it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMipmapLayer {
    /// The level.
    pub mipmap: MipmapLayer,
    /// Layout of the level.
    pub layout: RasterLayout,
    /// Palette entries, for palette layouts.
    pub palette: Vec<u8>,
    /// Number of valid palette entries.
    pub palette_size: u32,
}

impl RawMipmapLayer {
    fn into_pixel_data(self) -> PixelData {
        let mut pixels = PixelData::new(self.layout).with_palette(self.palette, self.palette_size);
        pixels.mipmaps.push(self.mipmap);
        pixels
    }
}

/// Exports level `index` of `texture`.
pub fn get_mipmap<T: NativeTexture + ?Sized>(
    texture: &T,
    engine: &Engine,
    index: usize,
) -> TxdResult<RawMipmapLayer> {
    let count = texture.mipmap_count();
    if index >= count {
        return Err(TxdError::InvalidMipmapIndex { index, count });
    }
    let mut pixels = texture.get_pixel_data(engine)?;
    if index >= pixels.mipmaps.len() {
        return Err(TxdError::InvalidMipmapIndex {
            index,
            count: pixels.mipmaps.len(),
        });
    }
    let mipmap = pixels.mipmaps.swap_remove(index);
    Ok(RawMipmapLayer {
        mipmap,
        layout: pixels.layout,
        palette: pixels.palette,
        palette_size: pixels.palette_size,
    })
}

/// Appends `layer` to the mipmap chain of `texture`.
///
/// The first level becomes the base. Later levels must have the visible
/// dimensions of the previous level halved (rounded down, at least 1).
pub fn add_mipmap<T: NativeTexture + ?Sized>(
    texture: &mut T,
    engine: &Engine,
    layer: RawMipmapLayer,
) -> TxdResult<()> {
    if texture.mipmap_count() == 0 {
        texture.set_pixel_data(engine, layer.into_pixel_data())?;
        return Ok(());
    }

    let mut pixels = texture.get_pixel_data(engine)?;
    let last = pixels
        .mipmaps
        .last()
        .ok_or_else(|| TxdError::structural("texture reported mipmaps but exported none"))?;
    if last.layer_width == 1 && last.layer_height == 1 {
        return Err(TxdError::structural("mipmap chain already ends at 1x1"));
    }
    let expected = ((last.layer_width / 2).max(1), (last.layer_height / 2).max(1));
    let actual = (layer.mipmap.layer_width, layer.mipmap.layer_height);
    if actual != expected {
        return Err(TxdError::structural(format!(
            "mipmap of {}x{} does not continue the chain, expected {}x{}",
            actual.0, actual.1, expected.0, expected.1
        )));
    }

    let incoming = layer.into_pixel_data();
    let converted = if incoming.layout == pixels.layout {
        incoming
    } else if engine.config().fix_incompatible_rasters {
        incoming.convert(pixels.layout)?
    } else {
        return Err(TxdError::unsupported(
            "mipmap layout differs from the texture layout",
        ));
    };
    if pixels.layout.palette_type.is_palette() && converted.palette != pixels.palette {
        return Err(TxdError::unsupported(
            "mipmap palette differs from the texture palette",
        ));
    }

    pixels.mipmaps.extend(converted.mipmaps);
    texture.set_pixel_data(engine, pixels)?;
    Ok(())
}

/// Drops every level but the base.
pub fn clear_mipmaps<T: NativeTexture + ?Sized>(texture: &mut T, engine: &Engine) -> TxdResult<()> {
    if texture.mipmap_count() <= 1 {
        return Ok(());
    }
    let mut pixels = texture.get_pixel_data(engine)?;
    pixels.mipmaps.truncate(1);
    pixels.auto_mipmaps = false;
    texture.set_pixel_data(engine, pixels)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_prelude::*;
    use rwtxd_common::{ColorOrdering, RasterFormat};

    fn rgba_layer(size: u32, value: u8) -> RawMipmapLayer {
        RawMipmapLayer {
            mipmap: MipmapLayer::new(size, size, vec![value; (size * size * 4) as usize]),
            layout: RasterLayout::RGBA8888,
            palette: Vec::new(),
            palette_size: 0,
        }
    }

    #[test]
    fn builds_and_clears_a_chain() {
        let engine = Engine::new();
        let mut texture = DummyTexture::new(&engine, "dummy");
        texture.add_mipmap(&engine, rgba_layer(4, 1)).unwrap();
        texture.add_mipmap(&engine, rgba_layer(2, 2)).unwrap();
        texture.add_mipmap(&engine, rgba_layer(1, 3)).unwrap();
        assert_eq!(texture.mipmap_count(), 3);
        assert!(texture.add_mipmap(&engine, rgba_layer(1, 4)).is_err());

        let level = texture.get_mipmap(&engine, 1).unwrap();
        assert_eq!(level.mipmap.layer_width, 2);
        assert!(level.mipmap.texels[..16].iter().all(|byte| *byte == 2));
        assert!(matches!(
            texture.get_mipmap(&engine, 3),
            Err(TxdError::InvalidMipmapIndex { index: 3, count: 3 })
        ));

        texture.clear_mipmaps(&engine).unwrap();
        assert_eq!(texture.mipmap_count(), 1);
    }

    #[test]
    fn rejects_levels_that_break_the_chain() {
        let engine = Engine::new();
        let mut texture = DummyTexture::new(&engine, "dummy");
        texture.add_mipmap(&engine, rgba_layer(8, 0)).unwrap();
        assert!(matches!(
            texture.add_mipmap(&engine, rgba_layer(2, 0)),
            Err(TxdError::Structural(_))
        ));
    }

    #[rstest]
    #[case(true)]
    #[case(false)]
    fn converts_foreign_levels_when_allowed(#[case] fix: bool) {
        let engine = Engine::with_config(EngineConfig::default().with_fix_incompatible_rasters(fix));
        let mut texture = DummyTexture::new(&engine, "dummy");
        texture.add_mipmap(&engine, rgba_layer(2, 0x40)).unwrap();

        let layout = RasterLayout::direct(RasterFormat::Raster565, 16, 4, ColorOrdering::Bgra);
        let foreign = RawMipmapLayer {
            mipmap: MipmapLayer::new(1, 1, vec![0xFF, 0xFF, 0, 0]),
            layout,
            palette: Vec::new(),
            palette_size: 0,
        };
        let result = texture.add_mipmap(&engine, foreign);
        assert_eq!(result.is_ok(), fix);
        if fix {
            let level = texture.get_mipmap(&engine, 1).unwrap();
            assert_eq!(&level.mipmap.texels[..4], &[0xFF, 0xFF, 0xFF, 0xFF]);
        }
    }
}
