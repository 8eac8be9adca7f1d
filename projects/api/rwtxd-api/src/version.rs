//! RenderWare library version and its two on-disk packings.

use bitfield::bitfield;
use core::fmt;

bitfield! {
    /// Version word of chunk headers written by newer libraries.
    ///
    /// Bit layout:
    /// - Bits 0-15: Build number
    /// - Bits 16-21: Revision minor
    /// - Bits 22-25: Revision major
    /// - Bits 26-29: Library minor
    /// - Bits 30-31: Library major minus 3
    #[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PackedVersion(u32);
    impl Debug;
    u32;

    /// Build number (16 bits)
    pub build_number, set_build_number: 15, 0;
    /// Revision minor (6 bits)
    pub rev_minor, set_rev_minor: 21, 16;
    /// Revision major (4 bits)
    pub rev_major, set_rev_major: 25, 22;
    /// Library minor (4 bits)
    pub lib_minor, set_lib_minor: 29, 26;
    /// Library major, stored as an offset from 3 (2 bits)
    pub lib_major_offset, set_lib_major_offset: 31, 30;
}

bitfield! {
    /// Version word of chunk headers written by older libraries.
    ///
    /// The upper 16 bits are always zero, which is how both packings are told apart.
    #[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct LegacyPackedVersion(u32);
    impl Debug;
    u32;

    /// Revision major (4 bits)
    pub rev_major, set_rev_major: 7, 4;
    /// Library minor (4 bits)
    pub lib_minor, set_lib_minor: 11, 8;
    /// Library major (4 bits)
    pub lib_major, set_lib_major: 15, 12;
}

/// Build number meaning "no build number".
pub const NO_BUILD_NUMBER: u16 = 0xFFFF;

/// Version of the RenderWare library that produced (or will consume) a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LibraryVersion {
    /// Library major, e.g. the 3 of 3.6.0.3.
    pub lib_major: u8,
    /// Library minor.
    pub lib_minor: u8,
    /// Revision major.
    pub rev_major: u8,
    /// Revision minor.
    pub rev_minor: u8,
    /// Build number, [`NO_BUILD_NUMBER`] if absent.
    pub build_number: u16,
}

impl Default for LibraryVersion {
    /// 3.6.0.3 without build number.
    fn default() -> Self {
        Self::new(3, 6, 0, 3)
    }
}

impl LibraryVersion {
    /// Creates a version without build number.
    pub const fn new(lib_major: u8, lib_minor: u8, rev_major: u8, rev_minor: u8) -> Self {
        Self {
            lib_major,
            lib_minor,
            rev_major,
            rev_minor,
            build_number: NO_BUILD_NUMBER,
        }
    }

    /// Returns this version with the given build number.
    pub const fn with_build(mut self, build_number: u16) -> Self {
        self.build_number = build_number;
        self
    }

    /// Whether the version can only be expressed with the newer packing.
    pub fn requires_new_packing(&self) -> bool {
        (self.lib_major == 3
            && self.lib_minor >= 1
            && (self.rev_major >= 1 || self.rev_minor >= 1))
            || self.lib_major > 3
            || self.build_number != NO_BUILD_NUMBER
            || self.rev_minor != 0
    }

    /// Packs the version into a chunk header word.
    pub fn pack(&self) -> u32 {
        if self.requires_new_packing() {
            let mut packed = PackedVersion::default();
            packed.set_build_number(self.build_number as u32);
            packed.set_rev_minor(self.rev_minor as u32);
            packed.set_rev_major(self.rev_major as u32);
            packed.set_lib_minor(self.lib_minor as u32);
            packed.set_lib_major_offset(self.lib_major.saturating_sub(3) as u32);
            packed.0
        } else {
            let mut packed = LegacyPackedVersion::default();
            packed.set_rev_major(self.rev_major as u32);
            packed.set_lib_minor(self.lib_minor as u32);
            packed.set_lib_major(self.lib_major as u32);
            packed.0
        }
    }

    /// Unpacks a chunk header word, picking the packing by its upper 16 bits.
    pub fn unpack(word: u32) -> Self {
        if word >> 16 != 0 {
            let packed = PackedVersion(word);
            Self {
                lib_major: packed.lib_major_offset() as u8 + 3,
                lib_minor: packed.lib_minor() as u8,
                rev_major: packed.rev_major() as u8,
                rev_minor: packed.rev_minor() as u8,
                build_number: packed.build_number() as u16,
            }
        } else {
            let packed = LegacyPackedVersion(word);
            Self::new(
                packed.lib_major() as u8,
                packed.lib_minor() as u8,
                packed.rev_major() as u8,
                0,
            )
        }
    }
}

impl fmt::Display for LibraryVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.lib_major, self.lib_minor, self.rev_major, self.rev_minor
        )?;
        if self.build_number != NO_BUILD_NUMBER {
            write!(f, " (build {:#06x})", self.build_number)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_prelude::*;

    #[rstest]
    #[case(LibraryVersion::new(3, 6, 0, 3), 0x1803_FFFF)]
    #[case(LibraryVersion::new(3, 7, 0, 2).with_build(0), 0x1C02_0000)]
    #[case(LibraryVersion::new(3, 4, 0, 3).with_build(0x0001), 0x1003_0001)]
    #[case(LibraryVersion::new(3, 0, 0, 0), 0x3000)]
    #[case(LibraryVersion::new(3, 1, 0, 0), 0x3100)]
    fn packs_versions(#[case] version: LibraryVersion, #[case] word: u32) {
        assert_eq!(version.pack(), word);
        assert_eq!(LibraryVersion::unpack(word), version);
    }

    #[test]
    fn old_packing_is_limited_to_early_versions() {
        assert!(!LibraryVersion::new(3, 0, 2, 0).requires_new_packing());
        assert!(LibraryVersion::new(3, 1, 1, 0).requires_new_packing());
        assert!(LibraryVersion::new(4, 0, 0, 0).requires_new_packing());
        assert!(LibraryVersion::new(3, 0, 0, 0).with_build(5).requires_new_packing());
    }

    #[test]
    fn display_includes_build_only_when_present() {
        assert_eq!(LibraryVersion::default().to_string(), "3.6.0.3");
        assert_eq!(
            LibraryVersion::new(3, 7, 0, 2).with_build(0).to_string(),
            "3.7.0.2 (build 0x0000)"
        );
    }
}
