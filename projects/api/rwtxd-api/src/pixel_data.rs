//! # Portable Pixel Data
//!
//! The representation every native texture imports from and exports to.
//!
//! A [`PixelData`] is a mipmap chain plus the [`RasterLayout`] describing how its
//! texels are stored. Native textures return data in whatever layout they can
//! produce most cheaply; [`PixelData::convert`] moves it into another layout.

use crate::error::{TxdError, TxdResult};
use rwtxd_common::{
    convert_palette, convert_texels, ColorOrdering, CompressionType, PaletteType, RasterFormat,
    TexelFormat,
};

/// Raster type byte of ordinary textures.
pub const RASTER_TYPE_TEXTURE: u8 = 4;

/// How texels of a mipmap chain are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RasterLayout {
    /// Sample format (of the palette entries, for palette rasters).
    pub raster_format: RasterFormat,
    /// Bits per texel.
    pub depth: u32,
    /// Byte alignment of every row.
    pub row_alignment: u32,
    /// Channel ordering of samples and palette entries.
    pub color_order: ColorOrdering,
    /// Palette kind.
    pub palette_type: PaletteType,
    /// Block compression.
    pub compression: CompressionType,
}

impl RasterLayout {
    /// Uncompressed direct color layout.
    pub const fn direct(
        raster_format: RasterFormat,
        depth: u32,
        row_alignment: u32,
        color_order: ColorOrdering,
    ) -> Self {
        Self {
            raster_format,
            depth,
            row_alignment,
            color_order,
            palette_type: PaletteType::None,
            compression: CompressionType::None,
        }
    }

    /// Uncompressed palette layout; the depth follows from the palette type.
    pub fn palettized(
        raster_format: RasterFormat,
        palette_type: PaletteType,
        row_alignment: u32,
        color_order: ColorOrdering,
    ) -> Self {
        Self {
            raster_format,
            depth: palette_type.index_depth(),
            row_alignment,
            color_order,
            palette_type,
            compression: CompressionType::None,
        }
    }

    /// Block compressed layout.
    pub const fn compressed(
        compression: CompressionType,
        raster_format: RasterFormat,
        depth: u32,
        color_order: ColorOrdering,
    ) -> Self {
        Self {
            raster_format,
            depth,
            row_alignment: 1,
            color_order,
            palette_type: PaletteType::None,
            compression,
        }
    }

    /// Tightly packed RGBA 8888, the layout every decodable surface converts into.
    pub const RGBA8888: Self = Self::direct(RasterFormat::Raster8888, 32, 1, ColorOrdering::Rgba);

    /// Texel description for the conversion routines.
    pub fn texel_format<'a>(&self, palette: &'a [u8], palette_size: u32) -> TexelFormat<'a> {
        TexelFormat {
            raster_format: self.raster_format,
            depth: self.depth,
            row_alignment: self.row_alignment,
            color_order: self.color_order,
            palette_type: self.palette_type,
            palette,
            palette_size,
            compression: self.compression,
        }
    }

    /// Size of one surface of `width` x `height` stored in this layout.
    pub fn surface_size(&self, width: u32, height: u32) -> usize {
        self.texel_format(&[], 0).surface_size(width, height)
    }

    /// Byte size of a palette with `count` entries.
    pub fn palette_data_size(&self, count: u32) -> usize {
        rwtxd_common::row_size(count, self.raster_format.natural_depth(), 1)
    }
}

/// One level of a mipmap chain.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MipmapLayer {
    /// Stored width; block aligned for compressed layouts.
    pub width: u32,
    /// Stored height; block aligned for compressed layouts.
    pub height: u32,
    /// Visible width.
    pub layer_width: u32,
    /// Visible height.
    pub layer_height: u32,
    /// Texel data.
    pub texels: Vec<u8>,
}

impl MipmapLayer {
    /// Layer whose stored and visible dimensions match.
    pub fn new(width: u32, height: u32, texels: Vec<u8>) -> Self {
        Self {
            width,
            height,
            layer_width: width,
            layer_height: height,
            texels,
        }
    }

    /// Layer of a block compressed surface; stored dimensions are rounded up to the block size.
    pub fn compressed(compression: CompressionType, layer_width: u32, layer_height: u32, texels: Vec<u8>) -> Self {
        let (width, height) = compression.physical_dimensions(layer_width, layer_height);
        Self {
            width,
            height,
            layer_width,
            layer_height,
            texels,
        }
    }

    /// Fails unless the texel buffer is large enough for `layout`.
    pub fn verify(&self, layout: &RasterLayout) -> TxdResult<()> {
        let expected = layout.surface_size(self.width, self.height);
        if self.texels.len() < expected {
            return Err(TxdError::structural(format!(
                "mipmap of {}x{} needs {expected} bytes, has {}",
                self.width,
                self.height,
                self.texels.len()
            )));
        }
        Ok(())
    }
}

/// A complete mipmap chain with its palette and layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelData {
    /// Mipmaps, base level first.
    pub mipmaps: Vec<MipmapLayer>,
    /// Layout of every mipmap.
    pub layout: RasterLayout,
    /// Palette entries at the natural depth of `layout.raster_format`.
    pub palette: Vec<u8>,
    /// Number of valid palette entries.
    pub palette_size: u32,
    /// Whether any texel is not fully opaque.
    pub has_alpha: bool,
    /// Mipmaps are generated at runtime.
    pub auto_mipmaps: bool,
    /// The texture is a cube map.
    pub cubemap: bool,
    /// Raster type byte.
    pub raster_type: u8,
}

impl PixelData {
    /// Empty chain with the given layout.
    pub fn new(layout: RasterLayout) -> Self {
        Self {
            mipmaps: Vec::new(),
            layout,
            palette: Vec::new(),
            palette_size: 0,
            has_alpha: false,
            auto_mipmaps: false,
            cubemap: false,
            raster_type: RASTER_TYPE_TEXTURE,
        }
    }

    /// Single level direct color data.
    pub fn from_surface(layout: RasterLayout, width: u32, height: u32, texels: Vec<u8>) -> Self {
        let mut pixels = Self::new(layout);
        pixels.mipmaps.push(MipmapLayer::new(width, height, texels));
        pixels
    }

    /// Attaches a palette.
    pub fn with_palette(mut self, palette: Vec<u8>, palette_size: u32) -> Self {
        self.palette = palette;
        self.palette_size = palette_size;
        self
    }

    /// Visible dimensions of the base level.
    pub fn base_dimensions(&self) -> Option<(u32, u32)> {
        self.mipmaps
            .first()
            .map(|base| (base.layer_width, base.layer_height))
    }

    /// Texel description of this chain for the conversion routines.
    pub fn texel_format(&self) -> TexelFormat<'_> {
        self.layout.texel_format(&self.palette, self.palette_size)
    }

    /// Checks every mipmap buffer and the palette against the layout.
    pub fn verify(&self) -> TxdResult<()> {
        if self.layout.palette_type.is_palette() {
            if self.palette_size == 0 || self.palette_size > self.layout.palette_type.item_count() {
                return Err(TxdError::structural(format!(
                    "palette of {} entries for {}",
                    self.palette_size,
                    self.layout.palette_type.name()
                )));
            }
            let expected = self.layout.palette_data_size(self.palette_size);
            if self.palette.len() < expected {
                return Err(TxdError::structural(format!(
                    "palette needs {expected} bytes, has {}",
                    self.palette.len()
                )));
            }
        }
        self.mipmaps
            .iter()
            .try_for_each(|mipmap| mipmap.verify(&self.layout))
    }

    /// Converts the chain into `target`.
    ///
    /// Compressed data can only be kept as is or decoded. Palette data can be
    /// expanded to direct color or re-indexed into another palette type whose
    /// entries it fits.
    ///
    /// # Errors
    ///
    /// [`TxdError::UnsupportedFormat`] for block compression and palette
    /// generation, pixel format errors for everything the conversion routines reject.
    pub fn convert(&self, target: RasterLayout) -> TxdResult<PixelData> {
        let source = self.layout;
        if source == target {
            return Ok(self.clone());
        }
        if target.compression.is_compressed() {
            if target.compression != source.compression {
                return Err(TxdError::unsupported(format!(
                    "texels cannot be compressed to {}",
                    target.compression.name()
                )));
            }
            let mut copy = self.clone();
            copy.layout = target;
            return Ok(copy);
        }
        if target.palette_type.is_palette() && !source.palette_type.is_palette() {
            return Err(TxdError::unsupported(format!(
                "palette generation for {} is not supported",
                target.palette_type.name()
            )));
        }

        let (palette, palette_size) = if target.palette_type.is_palette() {
            let count = self.palette_size.min(target.palette_type.item_count());
            let palette = convert_palette(
                source.raster_format,
                source.color_order,
                &self.palette,
                count,
                target.raster_format,
                target.color_order,
            )?;
            (palette, count)
        } else {
            (Vec::new(), 0)
        };

        let src = self.texel_format();
        let dst = target.texel_format(&palette, palette_size);
        let mut mipmaps = Vec::with_capacity(self.mipmaps.len());
        for mipmap in &self.mipmaps {
            // Decoded block data only keeps the visible area.
            let (width, height) = match source.compression.is_compressed() {
                true => (mipmap.layer_width, mipmap.layer_height),
                false => (mipmap.width, mipmap.height),
            };
            let texels = convert_texels(&src, &mipmap.texels, width, height, &dst)?;
            mipmaps.push(MipmapLayer {
                width,
                height,
                layer_width: mipmap.layer_width,
                layer_height: mipmap.layer_height,
                texels,
            });
        }

        Ok(PixelData {
            mipmaps,
            layout: target,
            palette,
            palette_size,
            has_alpha: self.has_alpha && target.raster_format.has_alpha_channel(),
            auto_mipmaps: self.auto_mipmaps,
            cubemap: self.cubemap,
            raster_type: self.raster_type,
        })
    }

    /// Scans the texels for anything that is not fully opaque.
    ///
    /// Undecodable compressed data reports the stored [`PixelData::has_alpha`].
    pub fn detect_alpha(&self) -> TxdResult<bool> {
        let layout = self.layout;
        if layout.compression.is_compressed() {
            if !layout.compression.is_dxt() {
                return Ok(self.has_alpha);
            }
        } else if !layout.raster_format.has_alpha_channel() {
            return Ok(false);
        }

        let rgba = self.convert(RasterLayout::RGBA8888)?;
        Ok(rgba
            .mipmaps
            .iter()
            .any(|mipmap| mipmap.texels.chunks_exact(4).any(|texel| texel[3] != 0xFF)))
    }
}
