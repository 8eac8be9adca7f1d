//! # Memory Permutation Engine
//!
//! Reversible mapping between a linear ("raw") texel buffer and the memory layout a
//! console GPU expects ("packed"), where several small samples are packed into one
//! larger hardware unit and positions are scrambled within every column.
//!
//! Both buffers are split into columns. A raw column of `raw_column_width` x
//! `raw_column_height` samples holds exactly as many bits as a packed column of
//! `packed_column_width` x `packed_column_height` units. A per-pair table maps every
//! raw position of a column onto a slot of the packed column; even rows of columns
//! use the primary table, odd rows the secondary one.
//!
//! Raw 4-bit samples are addressed high nibble first (like PAL4 rasters); inside a
//! packed unit the sub-samples are stored from the least significant bit upwards.
//!
//! The [`tiled`] submodule implements the byte-cluster tiling used by the PSP.

mod tables;
pub mod tiled;

pub use tiled::{TileLayout, TiledCoordinate};

use crate::bits::{move_sample, row_slice, row_slice_mut};
use crate::convert::copy_texel_rect;
use crate::error::{PixelFormatError, PixelResult};
use crate::formats::row_size;
use alloc::vec;
use alloc::vec::Vec;
use derive_enum_all_values::AllValues;

/// Hardware encoding of a texel buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, AllValues)]
pub enum PixelEncoding {
    /// No known encoding.
    Unknown,
    /// 4-bit palette indices.
    IdTex4,
    /// 8-bit palette indices.
    IdTex8,
    /// 4-bit palette indices stored through the 8-bit path of older libraries.
    IdTex8Compressed,
    /// 16-bit direct color.
    Tex16,
    /// 32-bit direct color.
    Tex32,
}

impl PixelEncoding {
    /// Bits per sample.
    pub const fn depth(self) -> u32 {
        match self {
            Self::Unknown => 0,
            Self::IdTex4 | Self::IdTex8Compressed => 4,
            Self::IdTex8 => 8,
            Self::Tex16 => 16,
            Self::Tex32 => 32,
        }
    }

    /// Dimensions of one column in samples, as `(width, height)`.
    pub const fn column_dimensions(self) -> (u32, u32) {
        match self {
            Self::Unknown => (1, 1),
            Self::IdTex4 | Self::IdTex8Compressed => (32, 4),
            Self::IdTex8 => (16, 4),
            Self::Tex16 => (16, 2),
            Self::Tex32 => (8, 2),
        }
    }

    /// Whether buffers of this encoding can be packed into `packed` units.
    pub fn packs_into(self, packed: PixelEncoding) -> bool {
        permutation_tables(self, packed).is_ok()
    }
}

/// Width, height and row alignment of a texel buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceShape {
    /// Width in samples.
    pub width: u32,
    /// Height in rows.
    pub height: u32,
    /// Byte alignment of every row.
    pub row_alignment: u32,
}

impl SurfaceShape {
    /// Creates a new shape.
    pub const fn new(width: u32, height: u32, row_alignment: u32) -> Self {
        Self {
            width,
            height,
            row_alignment,
        }
    }

    /// Size of one row at `depth` bits per sample.
    pub fn row_size(&self, depth: u32) -> usize {
        row_size(self.width, depth, self.row_alignment)
    }

    /// Size of the whole surface at `depth` bits per sample.
    pub fn data_size(&self, depth: u32) -> usize {
        self.row_size(depth) * self.height as usize
    }
}

fn permutation_tables(
    raw: PixelEncoding,
    packed: PixelEncoding,
) -> PixelResult<(&'static [u8], &'static [u8])> {
    match (raw, packed) {
        (PixelEncoding::IdTex8, PixelEncoding::Tex32) => {
            Ok((&tables::IDTEX8_PRIMARY, &tables::IDTEX8_SECONDARY))
        }
        (PixelEncoding::IdTex4 | PixelEncoding::IdTex8Compressed, PixelEncoding::Tex32) => {
            Ok((&tables::IDTEX4_PRIMARY, &tables::IDTEX4_SECONDARY))
        }
        _ => Err(PixelFormatError::InvalidPermutationPair { raw, packed }),
    }
}

/// Dimensions of the packed buffer that holds a `width` x `height` raw surface.
///
/// Raw dimensions are rounded up to whole columns. For identical encodings the
/// surface is only aligned to the column dimensions.
pub fn packed_dimensions(
    raw: PixelEncoding,
    packed: PixelEncoding,
    width: u32,
    height: u32,
) -> PixelResult<(u32, u32)> {
    let (raw_column_width, raw_column_height) = raw.column_dimensions();
    if raw == packed {
        return Ok((
            width.next_multiple_of(raw_column_width),
            height.next_multiple_of(raw_column_height),
        ));
    }
    permutation_tables(raw, packed)?;
    let (packed_column_width, packed_column_height) = packed.column_dimensions();
    Ok((
        width.div_ceil(raw_column_width) * packed_column_width,
        height.div_ceil(raw_column_height) * packed_column_height,
    ))
}

/// Packed dimensions as computed by the PSP libraries.
///
/// Dimensions are scaled without rounding up to whole columns, so small surfaces
/// receive packed buffers too narrow to hold every raw sample. Samples that do not
/// fit are dropped; existing files depend on this and it is kept as is.
pub fn broken_packed_dimensions(
    raw: PixelEncoding,
    packed: PixelEncoding,
    width: u32,
    height: u32,
) -> PixelResult<(u32, u32)> {
    if raw == packed {
        return Ok((width, height));
    }
    permutation_tables(raw, packed)?;
    let (raw_column_width, raw_column_height) = raw.column_dimensions();
    let (packed_column_width, packed_column_height) = packed.column_dimensions();
    Ok((
        (width * packed_column_width / raw_column_width).max(1),
        (height * packed_column_height / raw_column_height).max(1),
    ))
}

/// Visits every raw position of the surface together with its packed location.
///
/// The visitor receives `(raw_x, raw_y, packed_y, packed_sub_index)`, where
/// `packed_sub_index` addresses raw-sized samples inside the packed row.
fn for_each_mapping<F>(
    raw: PixelEncoding,
    packed: PixelEncoding,
    raw_width: u32,
    raw_height: u32,
    packed_width: u32,
    packed_height: u32,
    mut visit: F,
) -> PixelResult<()>
where
    F: FnMut(u32, u32, u32, u32),
{
    let (primary, secondary) = permutation_tables(raw, packed)?;
    let (raw_column_width, raw_column_height) = raw.column_dimensions();
    let (packed_column_width, packed_column_height) = packed.column_dimensions();
    let stride = packed.depth() / raw.depth();

    for column_y in 0..raw_height.div_ceil(raw_column_height) {
        let table = if column_y & 1 == 0 { primary } else { secondary };
        for column_x in 0..raw_width.div_ceil(raw_column_width) {
            for (raw_position, slot) in table.iter().enumerate() {
                let raw_position = raw_position as u32;
                let raw_x = column_x * raw_column_width + raw_position % raw_column_width;
                let raw_y = column_y * raw_column_height + raw_position / raw_column_width;
                if raw_x >= raw_width || raw_y >= raw_height {
                    continue;
                }

                let slot = *slot as u32;
                let sample = slot / stride;
                let packed_x = column_x * packed_column_width + sample % packed_column_width;
                let packed_y = column_y * packed_column_height + sample / packed_column_width;
                if packed_x >= packed_width || packed_y >= packed_height {
                    continue;
                }
                visit(raw_x, raw_y, packed_y, packed_x * stride + slot % stride);
            }
        }
    }
    Ok(())
}

/// Packs a linear surface into hardware units.
///
/// # Parameters
///
/// - `raw`, `packed`: Encodings of the source and destination buffers
/// - `raw_shape`: Shape of `texels`
/// - `texels`: Linear source samples
/// - `packed_shape`: Shape of the result, usually from [`packed_dimensions`]
///
/// # Returns
///
/// A buffer of `packed_shape.data_size(packed.depth())` bytes. Areas not covered by
/// the raw surface are zero.
pub fn pack_texels(
    raw: PixelEncoding,
    packed: PixelEncoding,
    raw_shape: SurfaceShape,
    texels: &[u8],
    packed_shape: SurfaceShape,
) -> PixelResult<Vec<u8>> {
    let raw_depth = raw.depth();
    let raw_row_size = raw_shape.row_size(raw_depth);
    let packed_row_size = packed_shape.row_size(packed.depth());
    check_size(texels, raw_shape.data_size(raw_depth))?;

    let mut out = vec![0u8; packed_shape.data_size(packed.depth())];
    for_each_mapping(
        raw,
        packed,
        raw_shape.width,
        raw_shape.height,
        packed_shape.width,
        packed_shape.height,
        |raw_x, raw_y, packed_y, packed_index| {
            if let (Some(src), Some(dst)) = (
                row_slice(texels, raw_row_size, raw_y),
                row_slice_mut(&mut out, packed_row_size, packed_y),
            ) {
                move_sample(src, raw_x, false, dst, packed_index, true, raw_depth);
            }
        },
    )?;
    Ok(out)
}

/// Unpacks hardware units into a linear surface. Inverse of [`pack_texels`].
pub fn unpack_texels(
    raw: PixelEncoding,
    packed: PixelEncoding,
    packed_shape: SurfaceShape,
    data: &[u8],
    raw_shape: SurfaceShape,
) -> PixelResult<Vec<u8>> {
    let raw_depth = raw.depth();
    let raw_row_size = raw_shape.row_size(raw_depth);
    let packed_row_size = packed_shape.row_size(packed.depth());
    check_size(data, packed_shape.data_size(packed.depth()))?;

    let mut out = vec![0u8; raw_shape.data_size(raw_depth)];
    for_each_mapping(
        raw,
        packed,
        raw_shape.width,
        raw_shape.height,
        packed_shape.width,
        packed_shape.height,
        |raw_x, raw_y, packed_y, packed_index| {
            if let (Some(src), Some(dst)) = (
                row_slice(data, packed_row_size, packed_y),
                row_slice_mut(&mut out, raw_row_size, raw_y),
            ) {
                move_sample(src, packed_index, true, dst, raw_x, false, raw_depth);
            }
        },
    )?;
    Ok(out)
}

/// Moves a surface from one encoding into another.
///
/// Picks packing when the source samples are smaller than the destination units,
/// unpacking when they are larger, and a padded copy when both depths match.
pub fn permute_texels(
    src_encoding: PixelEncoding,
    dst_encoding: PixelEncoding,
    src_shape: SurfaceShape,
    data: &[u8],
    dst_shape: SurfaceShape,
) -> PixelResult<Vec<u8>> {
    let src_depth = src_encoding.depth();
    let dst_depth = dst_encoding.depth();
    if src_depth == 0 || dst_depth == 0 {
        return Err(PixelFormatError::InvalidPermutationPair {
            raw: src_encoding,
            packed: dst_encoding,
        });
    }

    if src_depth == dst_depth {
        copy_texel_rect(
            data,
            src_shape.width,
            src_shape.height,
            src_shape.row_alignment,
            dst_shape.width,
            dst_shape.height,
            dst_shape.row_alignment,
            src_depth,
            false,
        )
    } else if src_depth < dst_depth {
        pack_texels(src_encoding, dst_encoding, src_shape, data, dst_shape)
    } else {
        unpack_texels(dst_encoding, src_encoding, src_shape, data, dst_shape)
    }
}

fn check_size(data: &[u8], expected: usize) -> PixelResult<()> {
    if data.len() < expected {
        return Err(PixelFormatError::BufferTooSmall {
            expected,
            actual: data.len(),
        });
    }
    Ok(())
}
