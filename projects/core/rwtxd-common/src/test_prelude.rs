//! Common test imports and utilities
//!
//! This module provides a common prelude for test modules to avoid
//! duplicate imports across the codebase.

// External crates commonly used in tests
pub use rstest::rstest;

// Allocation types (the crate is `no_std`)
pub use alloc::{vec, vec::Vec};

/// Builds a `width` x `height` surface of `bytes_per_texel` sized texels whose bytes
/// count upwards, wrapping at 256. Rows are tightly packed.
pub(crate) fn counting_surface(width: u32, height: u32, bytes_per_texel: usize) -> Vec<u8> {
    (0..width as usize * height as usize * bytes_per_texel)
        .map(|index| index as u8)
        .collect()
}
