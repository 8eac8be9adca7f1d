//! # GS Register Words
//!
//! Bitfield views over the 64-bit Graphics Synthesizer registers stored in the
//! texture meta chunk and in the GIF packets of the image data.

use bitfield::bitfield;

/// Register id of `BITBLTBUF`.
pub const REG_BITBLTBUF: u64 = 0x50;
/// Register id of `TRXPOS`.
pub const REG_TRXPOS: u64 = 0x51;
/// Register id of `TRXREG`.
pub const REG_TRXREG: u64 = 0x52;
/// Register id of `TRXDIR`.
pub const REG_TRXDIR: u64 = 0x53;

/// GIFtag register descriptor of the `A+D` (address plus data) packed mode.
pub const GIF_REG_AD: u64 = 0xE;

/// Maximum `NLOOP` of a GIFtag, exclusive.
pub const GIF_MAX_NLOOP: u64 = 0x8000;

bitfield! {
    /// Texture information register of context 1.
    ///
    /// Bit layout:
    /// - Bits 0-13: Base pointer of mipmap 0
    /// - Bits 14-19: Buffer width in 64 pixel units
    /// - Bits 20-25: Pixel storage format
    /// - Bits 26-29: Log2 of the width
    /// - Bits 30-33: Log2 of the height
    /// - Bit 34: Color component (0 RGB, 1 RGBA)
    /// - Bits 35-36: Texture function
    /// - Bits 37-50: CLUT base pointer
    /// - Bits 51-54: CLUT pixel storage format
    /// - Bit 55: CLUT storage mode
    /// - Bits 56-60: CLUT entry offset
    /// - Bits 61-63: CLUT buffer load control
    #[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Tex0(u64);
    impl Debug;
    u64;

    pub tbp0, set_tbp0: 13, 0;
    pub tbw, set_tbw: 19, 14;
    pub psm, set_psm: 25, 20;
    pub tw, set_tw: 29, 26;
    pub th, set_th: 33, 30;
    pub tcc, set_tcc: 34, 34;
    pub tfx, set_tfx: 36, 35;
    pub cbp, set_cbp: 50, 37;
    pub cpsm, set_cpsm: 54, 51;
    pub csm, set_csm: 55, 55;
    pub csa, set_csa: 60, 56;
    pub cld, set_cld: 63, 61;
}

bitfield! {
    /// Texture sampling register of context 1.
    ///
    /// Bit layout:
    /// - Bit 0: LOD calculation method
    /// - Bits 2-4: Maximum mipmap level
    /// - Bit 5: Magnification filter
    /// - Bits 6-8: Minification filter
    /// - Bit 9: Automatic mipmap base pointers
    /// - Bits 19-20: LOD parameter L
    /// - Bits 32-43: LOD parameter K
    #[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Tex1(u64);
    impl Debug;
    u64;

    pub lcm, set_lcm: 0, 0;
    pub mxl, set_mxl: 4, 2;
    pub mmag, set_mmag: 5, 5;
    pub mmin, set_mmin: 8, 6;
    pub mtba, set_mtba: 9, 9;
    pub l, set_l: 20, 19;
    pub k, set_k: 43, 32;
}

bitfield! {
    /// Base pointers and buffer widths of three consecutive mipmaps.
    ///
    /// `MIPTBP1` covers mipmaps 1 to 3, `MIPTBP2` mipmaps 4 to 6.
    #[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MipTbp(u64);
    impl Debug;
    u64;

    pub tbp1, set_tbp1: 13, 0;
    pub tbw1, set_tbw1: 19, 14;
    pub tbp2, set_tbp2: 33, 20;
    pub tbw2, set_tbw2: 39, 34;
    pub tbp3, set_tbp3: 53, 40;
    pub tbw3, set_tbw3: 59, 54;
}

impl MipTbp {
    /// Stores the base pointer and buffer width of `slot` (0 to 2).
    pub fn set_level(&mut self, slot: usize, base_pointer: u64, buffer_width: u64) {
        match slot {
            0 => {
                self.set_tbp1(base_pointer);
                self.set_tbw1(buffer_width);
            }
            1 => {
                self.set_tbp2(base_pointer);
                self.set_tbw2(buffer_width);
            }
            _ => {
                self.set_tbp3(base_pointer);
                self.set_tbw3(buffer_width);
            }
        }
    }

    /// Base pointer and buffer width of `slot` (0 to 2).
    pub fn level(&self, slot: usize) -> (u64, u64) {
        match slot {
            0 => (self.tbp1(), self.tbw1()),
            1 => (self.tbp2(), self.tbw2()),
            _ => (self.tbp3(), self.tbw3()),
        }
    }
}

bitfield! {
    /// Lower 64 bits of a GIFtag.
    ///
    /// The upper 64 bits hold the register descriptors, 4 bits each.
    #[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct GifTagWord(u64);
    impl Debug;
    u64;

    pub nloop, set_nloop: 14, 0;
    pub eop, set_eop: 15, 15;
    pub pre, set_pre: 46, 46;
    pub prim, set_prim: 57, 47;
    pub flg, set_flg: 59, 58;
    pub nreg, set_nreg: 63, 60;
}

/// `FLG` of register list packets.
pub const GIF_FLG_PACKED: u64 = 0;
/// `FLG` of image data packets.
pub const GIF_FLG_IMAGE: u64 = 2;

/// A complete 128-bit GIFtag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct GifTag {
    /// Control word.
    pub tag: GifTagWord,
    /// Register descriptors.
    pub registers: u64,
}

impl GifTag {
    /// Size on disk.
    pub const SIZE: usize = 16;

    /// Tag announcing `count` `A+D` register writes.
    pub fn register_list(count: u64) -> Self {
        let mut tag = GifTagWord::default();
        tag.set_nloop(count);
        tag.set_flg(GIF_FLG_PACKED);
        tag.set_nreg(1);
        Self {
            tag,
            registers: GIF_REG_AD,
        }
    }

    /// Tag announcing `quad_words` quad words of image data.
    pub fn image(quad_words: u64) -> Self {
        let mut tag = GifTagWord::default();
        tag.set_nloop(quad_words);
        tag.set_flg(GIF_FLG_IMAGE);
        Self { tag, registers: 0 }
    }

    /// Whether this is a well formed `A+D` register list tag.
    pub fn is_register_list(&self) -> bool {
        self.tag.flg() == GIF_FLG_PACKED && self.tag.nreg() == 1 && self.registers & 0xF == GIF_REG_AD
    }

    /// Whether this is an image data tag.
    pub fn is_image(&self) -> bool {
        self.tag.flg() == GIF_FLG_IMAGE
    }
}

bitfield! {
    /// Transfer buffer register.
    #[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct BitBltBuf(u64);
    impl Debug;
    u64;

    pub sbp, set_sbp: 13, 0;
    pub sbw, set_sbw: 21, 16;
    pub spsm, set_spsm: 29, 24;
    pub dbp, set_dbp: 45, 32;
    pub dbw, set_dbw: 53, 48;
    pub dpsm, set_dpsm: 61, 56;
}

bitfield! {
    /// Transfer position register.
    #[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TrxPos(u64);
    impl Debug;
    u64;

    pub ssax, set_ssax: 10, 0;
    pub ssay, set_ssay: 26, 16;
    pub dsax, set_dsax: 42, 32;
    pub dsay, set_dsay: 58, 48;
    pub dir, set_dir: 60, 59;
}

bitfield! {
    /// Transfer area register.
    #[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TrxReg(u64);
    impl Debug;
    u64;

    pub rrw, set_rrw: 11, 0;
    pub rrh, set_rrh: 43, 32;
}

bitfield! {
    /// Transfer direction register. Only host to local (0) is used by textures.
    #[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TrxDir(u64);
    impl Debug;
    u64;

    pub xdir, set_xdir: 1, 0;
}

macro_rules! register_words {
    ($($name:ident),* $(,)?) => {
        $(
            impl From<u64> for $name {
                fn from(value: u64) -> Self {
                    Self(value)
                }
            }

            impl From<$name> for u64 {
                fn from(register: $name) -> u64 {
                    register.0
                }
            }
        )*
    };
}

register_words!(Tex0, Tex1, MipTbp, GifTagWord, BitBltBuf, TrxPos, TrxReg, TrxDir);

/// The four registers of the texture meta chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct GsRegisters {
    /// Texture information.
    pub tex0: Tex0,
    /// Sampling parameters.
    pub tex1: Tex1,
    /// Mipmaps 1 to 3.
    pub miptbp1: MipTbp,
    /// Mipmaps 4 to 6.
    pub miptbp2: MipTbp,
}

/// Maps a filter mode onto the `(MMAG, MMIN)` pair of [`Tex1`].
pub fn filter_to_gs(filter_mode: u8) -> (u64, u64) {
    match filter_mode {
        2 => (1, 1),
        3 => (0, 2),
        4 => (0, 3),
        5 => (1, 4),
        6 => (1, 5),
        _ => (0, 0),
    }
}
