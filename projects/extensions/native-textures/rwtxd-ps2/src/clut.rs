//! # CLUT Textures
//!
//! The palette is uploaded to GS memory as a small texture. PAL8 palettes are a
//! 16x16 surface whose entries are reordered so the GS can address them in CSM1
//! mode; PAL4 palettes are a single 8 pixel wide strip.
//!
//! CLUT data keeps the GS alpha range; conversion happens in [`encode_clut`] and
//! [`decode_clut`].

use rwtxd_api::{TxdError, TxdResult};
use rwtxd_common::alpha::{convert_alpha_in_place, pc_alpha_to_ps2, ps2_alpha_to_pc};
use rwtxd_common::{PaletteType, RasterFormat};

/// Dimensions of the CLUT texture of `palette_type`, as `(width, height)`.
///
/// Libraries up to minor version 2 upload PAL4 palettes as 8x2, later ones as 8x3.
pub fn clut_dimensions(palette_type: PaletteType, lib_minor: u8) -> (u32, u32) {
    match palette_type {
        PaletteType::Pal8 => (16, 16),
        _ if lib_minor <= 2 => (8, 2),
        _ => (8, 3),
    }
}

/// Swaps entries 8-15 and 16-23 of every group of 32. Applying it twice restores the order.
pub fn permute_clut(entries: &mut [u8], entry_size: usize) {
    for group in entries.chunks_exact_mut(32 * entry_size) {
        let (low, high) = group.split_at_mut(16 * entry_size);
        low[8 * entry_size..].swap_with_slice(&mut high[..8 * entry_size]);
    }
}

/// Bytes per CLUT entry.
pub fn entry_size(format: RasterFormat) -> TxdResult<usize> {
    match format {
        RasterFormat::Raster8888 => Ok(4),
        RasterFormat::Raster1555 => Ok(2),
        other => Err(TxdError::unsupported(format!(
            "{} CLUT entries are not supported",
            other.name()
        ))),
    }
}

/// Builds the CLUT texture from `palette_size` RGBA ordered entries.
pub fn encode_clut(
    palette: &[u8],
    palette_size: u32,
    format: RasterFormat,
    palette_type: PaletteType,
    lib_minor: u8,
) -> TxdResult<Vec<u8>> {
    let size = entry_size(format)?;
    let (width, height) = clut_dimensions(palette_type, lib_minor);
    let mut clut = vec![0u8; (width * height) as usize * size];
    let used = (palette_size.min(palette_type.item_count()) as usize * size)
        .min(palette.len())
        .min(clut.len());
    clut[..used].copy_from_slice(&palette[..used]);

    if format == RasterFormat::Raster8888 {
        convert_alpha_in_place(&mut clut, 3, pc_alpha_to_ps2);
    }
    if palette_type == PaletteType::Pal8 {
        permute_clut(&mut clut, size);
    }
    Ok(clut)
}

/// Recovers the RGBA ordered palette from a CLUT texture.
pub fn decode_clut(clut: &[u8], format: RasterFormat, palette_type: PaletteType) -> TxdResult<Vec<u8>> {
    let size = entry_size(format)?;
    let length = palette_type.item_count() as usize * size;
    if clut.len() < length {
        return Err(TxdError::structural(format!(
            "CLUT of {} bytes is too small for {}",
            clut.len(),
            palette_type.name()
        )));
    }

    let mut palette = clut.to_vec();
    if palette_type == PaletteType::Pal8 {
        permute_clut(&mut palette, size);
    }
    palette.truncate(length);
    if format == RasterFormat::Raster8888 {
        convert_alpha_in_place(&mut palette, 3, ps2_alpha_to_pc);
    }
    Ok(palette)
}
