#![doc = include_str!(concat!("../", core::env!("CARGO_PKG_README")))]
#![no_std]
#![warn(missing_docs)]

#[cfg(feature = "std")]
extern crate std;

extern crate alloc;

pub mod alpha;
pub mod bits;
pub mod color;
pub mod color_565;
pub mod convert;
pub mod dispatch;
pub mod dxt;
pub mod endian;
pub mod error;
pub mod formats;
pub mod permute;

#[cfg(test)]
pub(crate) mod test_prelude;

pub use color::{AbstractColor, Color8888};
pub use convert::{convert_palette, convert_texels, copy_texel_rect, TexelFormat};
pub use dispatch::ColorDispatcher;
pub use error::{PixelFormatError, PixelResult};
pub use formats::{
    row_size, texel_data_size, Channel, ColorModel, ColorOrdering, CompressionType, PaletteType,
    RasterFormat,
};
pub use permute::{PixelEncoding, TileLayout};
