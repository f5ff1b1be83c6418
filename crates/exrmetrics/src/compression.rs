//! The OpenEXR compression methods and their properties.
//!
//! Each method has a lowercase name, a one-line description, the number of
//! scan lines packed into one chunk, and flags telling whether it loses data
//! and whether it can encode deep parts. The table is static and lookups never
//! mutate shared state.

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

use crate::error::{Error, Result};

/// Zip level used when a part does not set one.
pub const DEFAULT_ZIP_LEVEL: f32 = 4.0;

/// DWA quality used when a part does not set one.
pub const DEFAULT_DWA_LEVEL: f32 = 45.0;

/// An OpenEXR compression method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[repr(u8)]
pub enum Compression {
    /// Uncompressed.
    #[default]
    None = 0,
    /// Run-length encoding.
    Rle = 1,
    /// Zlib, one scan line per chunk.
    Zips = 2,
    /// Zlib, 16 scan lines per chunk.
    Zip = 3,
    /// Wavelet compression.
    Piz = 4,
    /// Lossy 24-bit float compression.
    Pxr24 = 5,
    /// Lossy 4x4 block compression.
    B44 = 6,
    /// Lossy 4x4 block compression, flat fields compressed more.
    B44a = 7,
    /// Lossy DCT compression, 32 scan lines per chunk.
    Dwaa = 8,
    /// Lossy DCT compression, 256 scan lines per chunk.
    Dwab = 9,
}

/// Static properties of one compression method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionInfo {
    /// Lowercase name accepted on the command line.
    pub name: &'static str,
    /// Human-readable summary.
    pub description: &'static str,
    /// Scan lines per chunk.
    pub scanlines_per_chunk: usize,
    /// Whether decoding may not reproduce the input bits.
    pub lossy: bool,
    /// Whether deep parts may use it.
    pub deep: bool,
}

const fn info(
    name: &'static str,
    description: &'static str,
    scanlines_per_chunk: usize,
    lossy: bool,
    deep: bool,
) -> CompressionInfo {
    CompressionInfo { name, description, scanlines_per_chunk, lossy, deep }
}

// Indexed by the enum discriminant.
static TABLE: [CompressionInfo; 10] = [
    info("none", "no compression.", 1, false, true),
    info("rle", "run-length encoding.", 1, false, true),
    info("zips", "zlib compression, one scan line at a time.", 1, false, true),
    info("zip", "zlib compression, in blocks of 16 scan lines.", 16, false, false),
    info("piz", "piz-based wavelet compression, in blocks of 32 scan lines.", 32, false, false),
    info("pxr24", "lossy 24-bit float compression, in blocks of 16 scan lines.", 16, true, false),
    info("b44", "lossy 4-by-4 pixel block compression, fixed compression rate.", 32, true, false),
    info(
        "b44a",
        "lossy 4-by-4 pixel block compression, flat fields are compressed more.",
        32,
        true,
        false,
    ),
    info(
        "dwaa",
        "lossy DCT based compression, in blocks of 32 scanlines. More efficient for partial buffer access.",
        32,
        true,
        false,
    ),
    info(
        "dwab",
        "lossy DCT based compression, in blocks of 256 scanlines. More efficient space wise and faster to decode full frames than DWAA_COMPRESSION.",
        256,
        true,
        false,
    ),
];

// "no" is accepted as a shorthand for "none".
static ALIASES: [(&str, Compression); 1] = [("no", Compression::None)];

impl Compression {
    /// Every method, in identifier order.
    pub const ALL: [Compression; 10] = [
        Compression::None,
        Compression::Rle,
        Compression::Zips,
        Compression::Zip,
        Compression::Piz,
        Compression::Pxr24,
        Compression::B44,
        Compression::B44a,
        Compression::Dwaa,
        Compression::Dwab,
    ];

    /// Numeric identifier as stored in files.
    #[inline]
    pub fn id(self) -> u8 {
        self as u8
    }

    /// Looks up a method by numeric identifier.
    pub fn from_id(id: u8) -> Option<Self> {
        Self::ALL.get(usize::from(id)).copied()
    }

    /// Static properties of this method.
    #[inline]
    pub fn info(self) -> &'static CompressionInfo {
        &TABLE[self as usize]
    }

    /// Lowercase name.
    #[inline]
    pub fn name(self) -> &'static str {
        self.info().name
    }

    /// One-line description.
    #[inline]
    pub fn description(self) -> &'static str {
        self.info().description
    }

    /// Scan lines per chunk.
    #[inline]
    pub fn scanlines_per_chunk(self) -> usize {
        self.info().scanlines_per_chunk
    }

    /// Whether the method may lose data.
    #[inline]
    pub fn is_lossy(self) -> bool {
        self.info().lossy
    }

    /// Whether deep parts may use the method.
    #[inline]
    pub fn supports_deep(self) -> bool {
        self.info().deep
    }

    /// Whether the method takes a compression level.
    pub fn takes_level(self) -> bool {
        self.is_zip() || self.is_dwa()
    }

    /// `zip` or `zips`.
    pub fn is_zip(self) -> bool {
        matches!(self, Self::Zip | Self::Zips)
    }

    /// `dwaa` or `dwab`.
    pub fn is_dwa(self) -> bool {
        matches!(self, Self::Dwaa | Self::Dwab)
    }

    /// Level used when a part does not override it, `None` for methods
    /// without a level.
    pub fn default_level(self) -> Option<f32> {
        if self.is_zip() {
            Some(DEFAULT_ZIP_LEVEL)
        } else if self.is_dwa() {
            Some(DEFAULT_DWA_LEVEL)
        } else {
            None
        }
    }

    /// Looks up a method by name, ignoring ASCII case.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.to_ascii_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.name() == name)
            .or_else(|| {
                ALIASES
                    .iter()
                    .find(|(alias, _)| *alias == name)
                    .map(|(_, c)| *c)
            })
    }

    /// All names joined by `separator`, in identifier order.
    pub fn names(separator: &str) -> String {
        Self::ALL
            .iter()
            .map(|c| c.name())
            .collect::<Vec<_>>()
            .join(separator)
    }

    /// One `name: description` line per method.
    pub fn descriptions() -> String {
        Self::ALL
            .iter()
            .map(|c| format!("{}: {}", c.name(), c.description()))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Compression {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_name(s).ok_or_else(|| {
            Error::invalid_argument(format!(
                "unknown compression '{s}', expected one of {}",
                Self::names(", ")
            ))
        })
    }
}

impl Serialize for Compression {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}
