//! Permutation tables of the GS column layouts.
//!
//! Every table is indexed by the raw position `y * raw_column_width + x` inside one
//! raw column and yields the slot inside the packed column, counted in raw samples
//! (`packed_sample * stride + sub_sample`). Even column rows use the primary table,
//! odd column rows the secondary one.

/// 8-bit indices (16x4 column) into 32-bit units (8x2 column), even column rows.
pub(crate) static IDTEX8_PRIMARY: [u8; 64] = [
      0,   4,   8,  12,  16,  20,  24,  28,   2,   6,  10,  14,  18,  22,  26,  30,
     32,  36,  40,  44,  48,  52,  56,  60,  34,  38,  42,  46,  50,  54,  58,  62,
     17,  21,  25,  29,   1,   5,   9,  13,  19,  23,  27,  31,   3,   7,  11,  15,
     49,  53,  57,  61,  33,  37,  41,  45,  51,  55,  59,  63,  35,  39,  43,  47,
];

/// 8-bit indices, odd column rows.
pub(crate) static IDTEX8_SECONDARY: [u8; 64] = [
     16,  20,  24,  28,   0,   4,   8,  12,  18,  22,  26,  30,   2,   6,  10,  14,
     48,  52,  56,  60,  32,  36,  40,  44,  50,  54,  58,  62,  34,  38,  42,  46,
      1,   5,   9,  13,  17,  21,  25,  29,   3,   7,  11,  15,  19,  23,  27,  31,
     33,  37,  41,  45,  49,  53,  57,  61,  35,  39,  43,  47,  51,  55,  59,  63,
];

/// 4-bit indices (32x4 column) into 32-bit units (8x2 column), even column rows.
pub(crate) static IDTEX4_PRIMARY: [u8; 128] = [
      0,   8,  16,  24,  32,  40,  48,  56,   2,  10,  18,  26,  34,  42,  50,  58,
      4,  12,  20,  28,  36,  44,  52,  60,   6,  14,  22,  30,  38,  46,  54,  62,
     64,  72,  80,  88,  96, 104, 112, 120,  66,  74,  82,  90,  98, 106, 114, 122,
     68,  76,  84,  92, 100, 108, 116, 124,  70,  78,  86,  94, 102, 110, 118, 126,
     33,  41,  49,  57,   1,   9,  17,  25,  35,  43,  51,  59,   3,  11,  19,  27,
     37,  45,  53,  61,   5,  13,  21,  29,  39,  47,  55,  63,   7,  15,  23,  31,
     97, 105, 113, 121,  65,  73,  81,  89,  99, 107, 115, 123,  67,  75,  83,  91,
    101, 109, 117, 125,  69,  77,  85,  93, 103, 111, 119, 127,  71,  79,  87,  95,
];

/// 4-bit indices, odd column rows.
pub(crate) static IDTEX4_SECONDARY: [u8; 128] = [
     32,  40,  48,  56,   0,   8,  16,  24,  34,  42,  50,  58,   2,  10,  18,  26,
     36,  44,  52,  60,   4,  12,  20,  28,  38,  46,  54,  62,   6,  14,  22,  30,
     96, 104, 112, 120,  64,  72,  80,  88,  98, 106, 114, 122,  66,  74,  82,  90,
    100, 108, 116, 124,  68,  76,  84,  92, 102, 110, 118, 126,  70,  78,  86,  94,
      1,   9,  17,  25,  33,  41,  49,  57,   3,  11,  19,  27,  35,  43,  51,  59,
      5,  13,  21,  29,  37,  45,  53,  61,   7,  15,  23,  31,  39,  47,  55,  63,
     65,  73,  81,  89,  97, 105, 113, 121,  67,  75,  83,  91,  99, 107, 115, 123,
     69,  77,  85,  93, 101, 109, 117, 125,  71,  79,  87,  95, 103, 111, 119, 127,
];
