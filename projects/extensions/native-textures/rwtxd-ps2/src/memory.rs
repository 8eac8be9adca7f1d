//! # GS Memory Allocation
//!
//! Graphics Synthesizer memory is addressed in 256-byte blocks, 32 blocks to a page.
//! How pixels map onto blocks depends on the pixel storage format ([`GsMemoryLayout`]):
//! every layout has its own block size in pixels, its own page shape in blocks and a
//! table that scrambles block positions inside the page.
//!
//! [`allocate`] assigns base pointers to the mipmaps and CLUT of one texture:
//!
//! - All surfaces share one buffer width, the page count needed by the widest mipmap.
//! - Pages are scanned along a baseline (first page column, increasing page rows).
//! - A surface that fits into one page may start at any free, size aligned block
//!   position of that page; larger surfaces start on a page boundary.
//! - A PAL8 CLUT goes into the bottom right corner of the last occupied page when
//!   that corner is free, otherwise onto the next page. A PAL4 CLUT takes the first
//!   block after the last mipmap.
//!
//! Occupancy is tracked by physical block address, so surfaces of different
//! layouts never overlap.

use derive_enum_all_values::AllValues;
use rwtxd_api::{TxdError, TxdResult};

/// Blocks per page.
pub const BLOCKS_PER_PAGE: u32 = 32;

/// Number of addressable blocks; base pointers must stay below.
pub const GS_MAX_BLOCKS: u32 = 16384;

/// Pixel storage formats with a known memory arrangement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, AllValues)]
pub enum GsMemoryLayout {
    /// 32-bit color.
    Psmct32,
    /// 32-bit depth.
    Psmz32,
    /// 16-bit color.
    Psmct16,
    /// 16-bit color, alternate block arrangement.
    Psmct16s,
    /// 16-bit depth.
    Psmz16,
    /// 16-bit depth, alternate block arrangement.
    Psmz16s,
    /// 8-bit palette indices.
    Psmt8,
    /// 4-bit palette indices.
    Psmt4,
}

#[rustfmt::skip]
const BLOCKS_PSMCT32: [u8; 32] = [
     0,  1,  4,  5, 16, 17, 20, 21,
     2,  3,  6,  7, 18, 19, 22, 23,
     8,  9, 12, 13, 24, 25, 28, 29,
    10, 11, 14, 15, 26, 27, 30, 31,
];

#[rustfmt::skip]
const BLOCKS_PSMZ32: [u8; 32] = [
    24, 25, 28, 29,  8,  9, 12, 13,
    26, 27, 30, 31, 10, 11, 14, 15,
    16, 17, 20, 21,  0,  1,  4,  5,
    18, 19, 22, 23,  2,  3,  6,  7,
];

#[rustfmt::skip]
const BLOCKS_PSMCT16: [u8; 32] = [
     0,  2,  8, 10,
     1,  3,  9, 11,
     4,  6, 12, 14,
     5,  7, 13, 15,
    16, 18, 24, 26,
    17, 19, 25, 27,
    20, 22, 28, 30,
    21, 23, 29, 31,
];

#[rustfmt::skip]
const BLOCKS_PSMCT16S: [u8; 32] = [
     0,  2, 16, 18,
     1,  3, 17, 19,
     8, 10, 24, 26,
     9, 11, 25, 27,
     4,  6, 20, 22,
     5,  7, 21, 23,
    12, 14, 28, 30,
    13, 15, 29, 31,
];

#[rustfmt::skip]
const BLOCKS_PSMZ16: [u8; 32] = [
    24, 26, 16, 18,
    25, 27, 17, 19,
    28, 30, 20, 22,
    29, 31, 21, 23,
     8, 10,  0,  2,
     9, 11,  1,  3,
    12, 14,  4,  6,
    13, 15,  5,  7,
];

#[rustfmt::skip]
const BLOCKS_PSMZ16S: [u8; 32] = [
    24, 26,  8, 10,
    25, 27,  9, 11,
    16, 18,  0,  2,
    17, 19,  1,  3,
    28, 30, 12, 14,
    29, 31, 13, 15,
    20, 22,  4,  6,
    21, 23,  5,  7,
];

impl GsMemoryLayout {
    /// `PSM` register code.
    pub const fn psm(self) -> u64 {
        match self {
            Self::Psmct32 => 0x00,
            Self::Psmz32 => 0x30,
            Self::Psmct16 => 0x02,
            Self::Psmct16s => 0x0A,
            Self::Psmz16 => 0x32,
            Self::Psmz16s => 0x3A,
            Self::Psmt8 => 0x13,
            Self::Psmt4 => 0x14,
        }
    }

    /// Layout of a `PSM` register code.
    pub fn from_psm(code: u64) -> Option<Self> {
        Self::all_values().iter().copied().find(|layout| layout.psm() == code)
    }

    /// Block size in pixels, as `(width, height)`.
    pub const fn block_dimensions(self) -> (u32, u32) {
        match self {
            Self::Psmct32 | Self::Psmz32 => (8, 8),
            Self::Psmct16 | Self::Psmct16s | Self::Psmz16 | Self::Psmz16s => (16, 8),
            Self::Psmt8 => (16, 16),
            Self::Psmt4 => (32, 16),
        }
    }

    /// Page size in blocks, as `(width, height)`.
    pub const fn page_blocks(self) -> (u32, u32) {
        match self {
            Self::Psmct32 | Self::Psmz32 | Self::Psmt8 => (8, 4),
            _ => (4, 8),
        }
    }

    /// Page size in pixels, as `(width, height)`.
    pub const fn page_dimensions(self) -> (u32, u32) {
        let (block_width, block_height) = self.block_dimensions();
        let (blocks_x, blocks_y) = self.page_blocks();
        (block_width * blocks_x, block_height * blocks_y)
    }

    fn block_table(self) -> &'static [u8; 32] {
        match self {
            Self::Psmct32 | Self::Psmt8 => &BLOCKS_PSMCT32,
            Self::Psmz32 => &BLOCKS_PSMZ32,
            Self::Psmct16 | Self::Psmt4 => &BLOCKS_PSMCT16,
            Self::Psmct16s => &BLOCKS_PSMCT16S,
            Self::Psmz16 => &BLOCKS_PSMZ16,
            Self::Psmz16s => &BLOCKS_PSMZ16S,
        }
    }

    /// Block number of the block at `(x, y)` inside a page.
    pub fn block_index(self, x: u32, y: u32) -> u32 {
        let (width, _) = self.page_blocks();
        self.block_table()[(y * width + x) as usize] as u32
    }

    /// Number of blocks covered by a `width` x `height` surface, as `(columns, rows)`.
    pub fn block_footprint(self, width: u32, height: u32) -> (u32, u32) {
        let (block_width, block_height) = self.block_dimensions();
        (width.div_ceil(block_width), height.div_ceil(block_height))
    }
}

/// Where one surface was placed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    /// Base pointer in blocks.
    pub base_pointer: u32,
    /// Buffer width in 64 pixel units.
    pub buffer_width: u32,
    /// Every block address the surface occupies.
    pub blocks: Vec<u32>,
}

/// A surface to place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GsSurface {
    /// Layout the GS samples the surface in.
    pub layout: GsMemoryLayout,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

/// Placement rule of the CLUT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClutRule {
    /// Bottom right corner of the last occupied page, else the next page.
    LastPageCorner,
    /// First block after the last mipmap.
    AfterMipmaps,
}

/// Result of [`allocate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GsAllocation {
    /// One placement per mipmap.
    pub mipmaps: Vec<Placement>,
    /// Placement of the CLUT.
    pub clut: Option<Placement>,
    /// One past the highest occupied block.
    pub max_memory_offset: u32,
}

impl GsAllocation {
    /// Value expected in the `combinedGPUDataSize` field of the meta chunk.
    pub fn combined_gpu_data_size(&self) -> u32 {
        (self.max_memory_offset * 64).next_multiple_of(2048)
    }
}

struct GsMemory {
    /// Width of the texture buffer in pages.
    page_width: u32,
    /// One occupancy mask per page.
    pages: Vec<u32>,
}

impl GsMemory {
    fn new(page_width: u32) -> Self {
        Self {
            page_width: page_width.max(1),
            pages: Vec::new(),
        }
    }

    fn is_free(&self, address: u32) -> bool {
        let page = (address / BLOCKS_PER_PAGE) as usize;
        self.pages
            .get(page)
            .map_or(true, |mask| mask & (1 << (address % BLOCKS_PER_PAGE)) == 0)
    }

    fn occupy(&mut self, blocks: &[u32]) {
        for &address in blocks {
            let page = (address / BLOCKS_PER_PAGE) as usize;
            if self.pages.len() <= page {
                self.pages.resize(page + 1, 0);
            }
            self.pages[page] |= 1 << (address % BLOCKS_PER_PAGE);
        }
    }

    /// Occupies a `columns` x `rows` block rectangle starting at block `(x, y)` of
    /// `page`, in a buffer `page_width` pages wide, if all of it is free.
    fn place(&mut self, layout: GsMemoryLayout, page_width: u32, page: u32, (x, y): (u32, u32), (columns, rows): (u32, u32)) -> Option<Placement> {
        let (page_columns, page_rows) = layout.page_blocks();
        let mut blocks = Vec::with_capacity((columns * rows) as usize);
        for row in y..y + rows {
            for column in x..x + columns {
                let page = page + (row / page_rows) * page_width + column / page_columns;
                blocks.push(page * BLOCKS_PER_PAGE + layout.block_index(column % page_columns, row % page_rows));
            }
        }
        if !blocks.iter().all(|address| self.is_free(*address)) {
            return None;
        }
        self.occupy(&blocks);
        Some(Placement {
            base_pointer: page * BLOCKS_PER_PAGE + layout.block_index(x, y),
            buffer_width: page_width * layout.page_dimensions().0 / 64,
            blocks,
        })
    }

    fn place_surface(&mut self, surface: GsSurface) -> TxdResult<Placement> {
        let layout = surface.layout;
        let size = layout.block_footprint(surface.width, surface.height);
        let (columns, rows) = size;
        let (page_columns, page_rows) = layout.page_blocks();
        let single_page = columns <= page_columns && rows <= page_rows;

        for page_row in 0..GS_MAX_BLOCKS / BLOCKS_PER_PAGE / self.page_width {
            let page = page_row * self.page_width;
            if !single_page {
                if let Some(placement) = self.place(layout, self.page_width, page, (0, 0), size) {
                    return Ok(placement);
                }
                continue;
            }
            for y in (0..=page_rows - rows).step_by(rows as usize) {
                for x in (0..=page_columns - columns).step_by(columns as usize) {
                    if let Some(placement) = self.place(layout, self.page_width, page, (x, y), size) {
                        return Ok(placement);
                    }
                }
            }
        }
        Err(out_of_memory(surface))
    }

    fn place_clut(&mut self, surface: GsSurface, rule: ClutRule, mipmaps: &[Placement]) -> TxdResult<Placement> {
        let layout = surface.layout;
        let size = layout.block_footprint(surface.width, surface.height);
        let (columns, rows) = size;
        let highest = mipmaps
            .iter()
            .flat_map(|placement| placement.blocks.iter().copied())
            .max()
            .unwrap_or(0);

        match rule {
            ClutRule::AfterMipmaps => {
                let count = columns * rows;
                let base = (highest + 1..GS_MAX_BLOCKS.saturating_sub(count))
                    .find(|base| (*base..base + count).all(|address| self.is_free(address)))
                    .ok_or_else(|| out_of_memory(surface))?;
                let blocks: Vec<u32> = (base..base + count).collect();
                self.occupy(&blocks);
                Ok(Placement {
                    base_pointer: base,
                    buffer_width: 1,
                    blocks,
                })
            }
            ClutRule::LastPageCorner => {
                let (page_columns, page_rows) = layout.page_blocks();
                let last_page = highest / BLOCKS_PER_PAGE;
                let mut corner = None;
                if columns <= page_columns && rows <= page_rows {
                    let position = (page_columns - columns, page_rows - rows);
                    corner = self.place(layout, 1, last_page, position, size);
                }
                corner
                    .or_else(|| self.place(layout, 1, last_page + 1, (0, 0), size))
                    .ok_or_else(|| out_of_memory(surface))
            }
        }
    }
}

fn out_of_memory(surface: GsSurface) -> TxdError {
    TxdError::unsupported(format!(
        "{}x{} {:?} surface does not fit into GS memory",
        surface.width, surface.height, surface.layout
    ))
}

/// Places the mipmaps (largest first) and the optional CLUT of one texture.
///
/// # Errors
///
/// [`TxdError::UnsupportedFormat`] when the texture does not fit into GS memory.
pub fn allocate(mipmaps: &[GsSurface], clut: Option<(GsSurface, ClutRule)>) -> TxdResult<GsAllocation> {
    let page_width = mipmaps
        .first()
        .map(|base| base.width.div_ceil(base.layout.page_dimensions().0))
        .unwrap_or(1);
    let mut memory = GsMemory::new(page_width);

    let mut placements = Vec::with_capacity(mipmaps.len());
    for surface in mipmaps {
        placements.push(memory.place_surface(*surface)?);
    }
    let clut = match clut {
        Some((surface, rule)) => Some(memory.place_clut(surface, rule, &placements)?),
        None => None,
    };

    let max_memory_offset = placements
        .iter()
        .chain(clut.iter())
        .flat_map(|placement| placement.blocks.iter().copied())
        .max()
        .map_or(0, |highest| highest + 1);
    if max_memory_offset > GS_MAX_BLOCKS {
        return Err(TxdError::unsupported(format!(
            "texture needs {max_memory_offset} blocks of GS memory"
        )));
    }
    log::trace!(target: "rwtxd", "GS allocation of {} surfaces ends at block {max_memory_offset}", placements.len());

    Ok(GsAllocation {
        mipmaps: placements,
        clut,
        max_memory_offset,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_prelude::*;
    use std::collections::HashSet;

    fn chain(layout: GsMemoryLayout, width: u32, height: u32, count: u32) -> Vec<GsSurface> {
        (0..count)
            .map(|level| GsSurface {
                layout,
                width: (width >> level).max(1),
                height: (height >> level).max(1),
            })
            .collect()
    }

    fn assert_disjoint(allocation: &GsAllocation) {
        let mut seen = HashSet::new();
        for placement in allocation.mipmaps.iter().chain(allocation.clut.iter()) {
            assert!(placement.base_pointer < GS_MAX_BLOCKS);
            for block in &placement.blocks {
                assert!(seen.insert(*block), "block {block} used twice");
            }
        }
    }

    #[test]
    fn block_tables_are_permutations() {
        for &layout in GsMemoryLayout::all_values() {
            let (columns, rows) = layout.page_blocks();
            let mut seen = HashSet::new();
            for y in 0..rows {
                for x in 0..columns {
                    assert!(seen.insert(layout.block_index(x, y)));
                }
            }
            assert_eq!(seen.len(), 32, "{layout:?}");
            assert_eq!(GsMemoryLayout::from_psm(layout.psm()), Some(layout));
        }
    }

    #[rstest]
    #[case(GsMemoryLayout::Psmct32, (64, 32))]
    #[case(GsMemoryLayout::Psmct16, (64, 64))]
    #[case(GsMemoryLayout::Psmt8, (128, 64))]
    #[case(GsMemoryLayout::Psmt4, (128, 128))]
    fn page_dimensions(#[case] layout: GsMemoryLayout, #[case] expected: (u32, u32)) {
        assert_eq!(layout.page_dimensions(), expected);
    }

    #[test]
    fn small_pal8_texture_shares_its_page_with_the_clut() {
        let mipmaps = chain(GsMemoryLayout::Psmt8, 16, 16, 1);
        let clut = GsSurface {
            layout: GsMemoryLayout::Psmct32,
            width: 16,
            height: 16,
        };
        let allocation = allocate(&mipmaps, Some((clut, ClutRule::LastPageCorner))).unwrap();
        assert_eq!(allocation.mipmaps[0].base_pointer, 0);
        assert_eq!(allocation.mipmaps[0].buffer_width, 2);
        let clut = allocation.clut.as_ref().unwrap();
        assert_eq!(clut.base_pointer, 28);
        assert_eq!(clut.blocks, vec![28, 29, 30, 31]);
        assert_eq!(allocation.max_memory_offset, 32);
        assert_eq!(allocation.combined_gpu_data_size(), 2048);
        assert_disjoint(&allocation);
    }

    #[rstest]
    #[case(64, 3, &[0, 8, 10], 11, 2048)]
    #[case(256, 2, &[0, 128], 160, 12288)]
    fn pal4_clut_follows_the_mipmaps(
        #[case] size: u32,
        #[case] count: u32,
        #[case] mip_bases: &[u32],
        #[case] clut_base: u32,
        #[case] combined_size: u32,
    ) {
        // 8x2 CLUT used by libraries up to 3.2.
        let mipmaps = chain(GsMemoryLayout::Psmt4, size, size, count);
        let clut = GsSurface {
            layout: GsMemoryLayout::Psmct32,
            width: 8,
            height: 2,
        };
        let allocation = allocate(&mipmaps, Some((clut, ClutRule::AfterMipmaps))).unwrap();
        let bases: Vec<u32> = allocation.mipmaps.iter().map(|p| p.base_pointer).collect();
        assert_eq!(bases, mip_bases);

        let highest = allocation.mipmaps.iter().flat_map(|p| p.blocks.iter()).max().copied().unwrap();
        let clut = allocation.clut.as_ref().unwrap();
        assert_eq!(clut.base_pointer, highest + 1);
        assert_eq!(clut.base_pointer, clut_base);
        assert_eq!(clut.blocks, vec![clut_base]);
        assert_eq!(allocation.max_memory_offset, clut_base + 1);
        assert_eq!(allocation.combined_gpu_data_size(), combined_size);
        assert_disjoint(&allocation);
    }

    #[rstest]
    #[case(GsMemoryLayout::Psmct32, 256, 256, 7)]
    #[case(GsMemoryLayout::Psmct32, 512, 64, 7)]
    #[case(GsMemoryLayout::Psmct16, 128, 512, 7)]
    #[case(GsMemoryLayout::Psmt8, 256, 128, 7)]
    #[case(GsMemoryLayout::Psmt4, 1024, 1024, 7)]
    #[case(GsMemoryLayout::Psmt4, 8, 8, 4)]
    fn mipmaps_never_overlap(#[case] layout: GsMemoryLayout, #[case] width: u32, #[case] height: u32, #[case] count: u32) {
        let mipmaps = chain(layout, width, height, count);
        let clut = match layout {
            GsMemoryLayout::Psmt8 => Some((
                GsSurface { layout: GsMemoryLayout::Psmct32, width: 16, height: 16 },
                ClutRule::LastPageCorner,
            )),
            GsMemoryLayout::Psmt4 => Some((
                GsSurface { layout: GsMemoryLayout::Psmct16, width: 8, height: 3 },
                ClutRule::AfterMipmaps,
            )),
            _ => None,
        };
        let allocation = allocate(&mipmaps, clut).unwrap();
        assert_eq!(allocation.mipmaps.len(), count as usize);
        assert_eq!(allocation.mipmaps[0].base_pointer, 0);
        assert_eq!(
            allocation.mipmaps[0].buffer_width,
            width.div_ceil(layout.page_dimensions().0) * layout.page_dimensions().0 / 64
        );
        assert_disjoint(&allocation);
    }

    #[test]
    fn oversized_textures_are_rejected() {
        let mipmaps = chain(GsMemoryLayout::Psmct32, 4096, 4096, 1);
        assert!(matches!(allocate(&mipmaps, None), Err(TxdError::UnsupportedFormat(_))));
    }
}
