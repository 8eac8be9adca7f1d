//! Byte-cluster tiling.
//!
//! A tiled surface is stored as a sequence of clusters, each `cluster_width` bytes
//! wide and `cluster_height` rows tall, in row-major cluster order. Bytes inside a
//! cluster are row-major as well. The PSP stores direct color textures this way
//! with 16 x 8 byte clusters.

use crate::error::{PixelFormatError, PixelResult};
use alloc::vec;
use alloc::vec::Vec;

/// Position of one byte inside a tiled surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TiledCoordinate {
    /// Byte column inside the cluster.
    pub tiled_x: u32,
    /// Row inside the cluster.
    pub tiled_y: u32,
    /// Index of the cluster in storage order.
    pub cluster_index: u32,
}

/// Dimensions of the clusters of a tiled surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileLayout {
    /// Cluster width in bytes.
    pub cluster_width: u32,
    /// Cluster height in rows.
    pub cluster_height: u32,
}

impl TileLayout {
    /// 128-bit wide, 8 row clusters of the PSP GE.
    pub const PSP: Self = Self::new(16, 8);

    /// Creates a layout with the given cluster dimensions.
    pub const fn new(cluster_width: u32, cluster_height: u32) -> Self {
        Self {
            cluster_width,
            cluster_height,
        }
    }

    /// Bytes per cluster.
    #[inline]
    pub const fn cluster_size(&self) -> usize {
        self.cluster_width as usize * self.cluster_height as usize
    }

    /// Whether a surface of `stride` bytes per row and `height` rows is made of whole clusters.
    pub fn fits(&self, stride: usize, height: u32) -> bool {
        stride != 0
            && stride % self.cluster_width as usize == 0
            && height % self.cluster_height == 0
    }

    fn check_surface(&self, stride: usize, height: u32) -> PixelResult<()> {
        if self.fits(stride, height) {
            Ok(())
        } else {
            Err(PixelFormatError::UnalignedTileSurface {
                stride,
                height,
                cluster_width: self.cluster_width,
                cluster_height: self.cluster_height,
            })
        }
    }

    /// Maps the linear byte `(x, y)` of a surface with `stride` bytes per row.
    #[inline]
    pub fn linear_to_tiled(&self, stride: usize, x: u32, y: u32) -> TiledCoordinate {
        let clusters_per_row = (stride / self.cluster_width as usize) as u32;
        TiledCoordinate {
            tiled_x: x % self.cluster_width,
            tiled_y: y % self.cluster_height,
            cluster_index: x / self.cluster_width + (y / self.cluster_height) * clusters_per_row,
        }
    }

    /// Inverse of [`TileLayout::linear_to_tiled`], returning the linear `(x, y)`.
    #[inline]
    pub fn tiled_to_linear(&self, stride: usize, coordinate: TiledCoordinate) -> (u32, u32) {
        let clusters_per_row = ((stride / self.cluster_width as usize) as u32).max(1);
        let cluster_x = coordinate.cluster_index % clusters_per_row;
        let cluster_y = coordinate.cluster_index / clusters_per_row;
        (
            cluster_x * self.cluster_width + coordinate.tiled_x,
            cluster_y * self.cluster_height + coordinate.tiled_y,
        )
    }

    /// Byte offset of a coordinate in the tiled buffer.
    #[inline]
    pub fn tiled_offset(&self, coordinate: TiledCoordinate) -> usize {
        coordinate.cluster_index as usize * self.cluster_size()
            + coordinate.tiled_y as usize * self.cluster_width as usize
            + coordinate.tiled_x as usize
    }

    /// Tiled coordinates of the `bytes_per_texel` bytes of texel `(x, y)`.
    pub fn texel_coordinates(
        &self,
        stride: usize,
        x: u32,
        y: u32,
        bytes_per_texel: u32,
    ) -> impl Iterator<Item = TiledCoordinate> + '_ {
        let first = x * bytes_per_texel;
        (first..first + bytes_per_texel).map(move |byte_x| self.linear_to_tiled(stride, byte_x, y))
    }

    /// Reorders a linear surface into clusters.
    pub fn swizzle(&self, linear: &[u8], stride: usize, height: u32) -> PixelResult<Vec<u8>> {
        self.reorder(linear, stride, height, true)
    }

    /// Reorders a tiled surface back into rows.
    pub fn unswizzle(&self, tiled: &[u8], stride: usize, height: u32) -> PixelResult<Vec<u8>> {
        self.reorder(tiled, stride, height, false)
    }

    fn reorder(&self, src: &[u8], stride: usize, height: u32, to_tiled: bool) -> PixelResult<Vec<u8>> {
        self.check_surface(stride, height)?;
        let size = stride * height as usize;
        if src.len() < size {
            return Err(PixelFormatError::BufferTooSmall {
                expected: size,
                actual: src.len(),
            });
        }

        let mut out = vec![0u8; size];
        let cluster_width = self.cluster_width as usize;
        for y in 0..height {
            for cluster_x in (0..stride).step_by(cluster_width) {
                // Cluster rows are contiguous on both sides.
                let coordinate = self.linear_to_tiled(stride, cluster_x as u32, y);
                let tiled = self.tiled_offset(coordinate);
                let linear = y as usize * stride + cluster_x;
                let (from, to) = if to_tiled { (linear, tiled) } else { (tiled, linear) };
                out[to..to + cluster_width].copy_from_slice(&src[from..from + cluster_width]);
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_prelude::*;

    #[test]
    fn second_cluster_follows_first_cluster() {
        // 32 bytes x 8 rows: two clusters side by side.
        let linear = counting_surface(32, 8, 1);
        let tiled = TileLayout::PSP.swizzle(&linear, 32, 8).unwrap();
        assert_eq!(&tiled[0..16], &linear[0..16]);
        assert_eq!(&tiled[16..32], &linear[32..48]);
        assert_eq!(&tiled[128..144], &linear[16..32]);
    }

    #[rstest]
    #[case(16, 8)]
    #[case(64, 16)]
    #[case(128, 64)]
    fn unswizzle_inverts_swizzle(#[case] stride: usize, #[case] height: u32) {
        let linear = counting_surface(stride as u32, height, 1);
        let tiled = TileLayout::PSP.swizzle(&linear, stride, height).unwrap();
        assert_eq!(TileLayout::PSP.unswizzle(&tiled, stride, height).unwrap(), linear);
    }

    #[test]
    fn coordinates_round_trip() {
        let layout = TileLayout::PSP;
        for y in 0..16 {
            for x in 0..48 {
                let coordinate = layout.linear_to_tiled(48, x, y);
                assert_eq!(layout.tiled_to_linear(48, coordinate), (x, y));
            }
        }
        let bytes: Vec<_> = layout.texel_coordinates(48, 4, 9, 4).collect();
        assert_eq!(bytes.len(), 4);
        assert_eq!(
            bytes[3],
            TiledCoordinate {
                tiled_x: 3,
                tiled_y: 1,
                cluster_index: 4
            }
        );
    }

    #[rstest]
    #[case(8, 8)]
    #[case(16, 4)]
    #[case(0, 8)]
    fn unaligned_surfaces_are_rejected(#[case] stride: usize, #[case] height: u32) {
        assert!(matches!(
            TileLayout::PSP.swizzle(&[0; 64], stride, height),
            Err(PixelFormatError::UnalignedTileSurface { .. })
        ));
    }
}
