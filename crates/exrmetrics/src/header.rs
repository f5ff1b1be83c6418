//! Part headers: channels, part kind and level layout.
//!
//! [`PartHeader`] is the codec-neutral view of an OpenEXR part. It carries
//! everything the copy engine needs to size buffers and walk levels, and
//! nothing else.

use std::fmt;
use std::str::FromStr;

use half::f16;
use serde::{Serialize, Serializer};

use crate::compression::Compression;
use crate::error::{Error, Result};
use crate::geometry::{
    self, Bounds, Level, LevelMode, RoundingMode, TileDescription,
};

/// Storage type of a channel's samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleType {
    /// 32-bit unsigned integer.
    U32,
    /// 16-bit float.
    F16,
    /// 32-bit float.
    F32,
}

impl SampleType {
    /// Bytes per sample.
    #[inline]
    pub const fn byte_size(self) -> usize {
        match self {
            Self::F16 => 2,
            Self::U32 | Self::F32 => 4,
        }
    }

    /// OpenEXR type name.
    pub fn name(self) -> &'static str {
        match self {
            Self::U32 => "uint",
            Self::F16 => "half",
            Self::F32 => "float",
        }
    }

    /// Reads one native-endian sample as `f32`.
    ///
    /// `bytes` must hold at least [`byte_size`](Self::byte_size) bytes.
    pub fn read_f32(self, bytes: &[u8]) -> f32 {
        match self {
            Self::F16 => f16::from_ne_bytes([bytes[0], bytes[1]]).to_f32(),
            Self::F32 => f32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            Self::U32 => u32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f32,
        }
    }

    /// Writes `value` as one native-endian sample.
    ///
    /// Floats stored into `U32` are clamped to `0..=u32::MAX`, NaN becomes 0.
    pub fn write_f32(self, value: f32, bytes: &mut [u8]) {
        match self {
            Self::F16 => bytes[..2].copy_from_slice(&f16::from_f32(value).to_ne_bytes()),
            Self::F32 => bytes[..4].copy_from_slice(&value.to_ne_bytes()),
            Self::U32 => {
                // `as` saturates and maps NaN to zero
                bytes[..4].copy_from_slice(&(value as u32).to_ne_bytes());
            }
        }
    }
}

impl fmt::Display for SampleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Converts a run of samples between storage types.
///
/// Both slices hold the same number of samples. Identical types are copied
/// bytewise; `U32` to `U32` never passes through a float.
pub fn convert_samples(from: SampleType, src: &[u8], to: SampleType, dst: &mut [u8]) {
    if from == to {
        dst.copy_from_slice(src);
        return;
    }

    for (src, dst) in src
        .chunks_exact(from.byte_size())
        .zip(dst.chunks_exact_mut(to.byte_size()))
    {
        to.write_f32(from.read_f32(src), dst);
    }
}

/// A named channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Channel {
    /// Channel name, e.g. `"R"` or `"diffuse.A"`.
    pub name: String,
    /// Sample storage type.
    pub sample_type: SampleType,
}

impl Channel {
    /// Creates a channel description.
    pub fn new(name: impl Into<String>, sample_type: SampleType) -> Self {
        Self { name: name.into(), sample_type }
    }

    /// Bytes per sample.
    #[inline]
    pub fn byte_size(&self) -> usize {
        self.sample_type.byte_size()
    }
}

/// The four OpenEXR part kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PartKind {
    /// Flat scan lines.
    ScanLine,
    /// Flat tiles, possibly with levels.
    Tiled,
    /// Deep scan lines.
    DeepScanLine,
    /// Deep tiles.
    DeepTiled,
}

impl PartKind {
    /// Type attribute value stored in multi-part files.
    pub fn type_name(self) -> &'static str {
        match self {
            Self::ScanLine => "scanlineimage",
            Self::Tiled => "tiledimage",
            Self::DeepScanLine => "deepscanline",
            Self::DeepTiled => "deeptile",
        }
    }

    /// Parses a type attribute value.
    pub fn from_type_name(name: &str) -> Result<Self> {
        match name {
            "scanlineimage" => Ok(Self::ScanLine),
            "tiledimage" => Ok(Self::Tiled),
            "deepscanline" => Ok(Self::DeepScanLine),
            "deeptile" => Ok(Self::DeepTiled),
            other => Err(Error::unsupported_mode(format!("unknown part type '{other}'"))),
        }
    }

    /// Part stores a variable number of samples per pixel.
    #[inline]
    pub fn is_deep(self) -> bool {
        matches!(self, Self::DeepScanLine | Self::DeepTiled)
    }

    /// Part is split into tiles.
    #[inline]
    pub fn is_tiled(self) -> bool {
        matches!(self, Self::Tiled | Self::DeepTiled)
    }
}

impl fmt::Display for PartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

impl FromStr for PartKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_type_name(s)
    }
}

impl Serialize for PartKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.type_name())
    }
}

/// Codec-neutral description of one part.
#[derive(Debug, Clone, PartialEq)]
pub struct PartHeader {
    /// Part name, if the file stores one.
    pub name: Option<String>,
    /// Pixel bounds at full resolution.
    pub data_window: Bounds,
    /// Channels, sorted by name.
    pub channels: Vec<Channel>,
    /// Kind of part.
    pub kind: PartKind,
    /// Tile layout, present exactly for tiled kinds.
    pub tiles: Option<TileDescription>,
    /// Compression method.
    pub compression: Compression,
    /// Zip level or DWA quality, when the part sets one.
    pub compression_level: Option<f32>,
}

impl PartHeader {
    fn with_kind(
        kind: PartKind,
        data_window: Bounds,
        mut channels: Vec<Channel>,
        tiles: Option<TileDescription>,
    ) -> Self {
        channels.sort_by(|a, b| a.name.cmp(&b.name));
        Self {
            name: None,
            data_window,
            channels,
            kind,
            tiles,
            compression: Compression::None,
            compression_level: None,
        }
    }

    /// Flat scan line part.
    pub fn scan_line(data_window: Bounds, channels: Vec<Channel>) -> Self {
        Self::with_kind(PartKind::ScanLine, data_window, channels, None)
    }

    /// Flat tiled part.
    pub fn tiled(data_window: Bounds, channels: Vec<Channel>, tiles: TileDescription) -> Self {
        Self::with_kind(PartKind::Tiled, data_window, channels, Some(tiles))
    }

    /// Deep scan line part.
    pub fn deep_scan_line(data_window: Bounds, channels: Vec<Channel>) -> Self {
        Self::with_kind(PartKind::DeepScanLine, data_window, channels, None)
    }

    /// Deep tiled part.
    pub fn deep_tiled(data_window: Bounds, channels: Vec<Channel>, tiles: TileDescription) -> Self {
        Self::with_kind(PartKind::DeepTiled, data_window, channels, Some(tiles))
    }

    /// Sets the compression method.
    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    /// Sets the part name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Checks that the header describes a part that can be copied.
    pub fn validate(&self) -> Result<()> {
        if self.data_window.is_empty() {
            return Err(Error::invalid_argument(format!(
                "data window {} is empty",
                self.data_window
            )));
        }
        match (self.kind.is_tiled(), &self.tiles) {
            (true, None) => {
                return Err(Error::invalid_argument(format!(
                    "{} part has no tile description",
                    self.kind
                )));
            }
            (false, Some(_)) => {
                return Err(Error::invalid_argument(format!(
                    "{} part has a tile description",
                    self.kind
                )));
            }
            (true, Some(tiles)) if tiles.tile_width == 0 || tiles.tile_height == 0 => {
                return Err(Error::invalid_argument("tile size is empty"));
            }
            _ => {}
        }
        if self.kind.is_deep() && !self.compression.supports_deep() {
            return Err(Error::incompatible_option(format!(
                "{} compression cannot encode deep parts",
                self.compression
            )));
        }
        Ok(())
    }

    /// Index of the channel called `name`.
    pub fn channel_index(&self, name: &str) -> Option<usize> {
        self.channels.iter().position(|c| c.name == name)
    }

    /// Bytes per pixel summed over all channels.
    pub fn bytes_per_pixel(&self) -> usize {
        self.channels.iter().map(Channel::byte_size).sum()
    }

    /// Level layout; scan line parts have a single level.
    pub fn level_mode(&self) -> LevelMode {
        self.tiles.map_or(LevelMode::Singular, |t| t.level_mode)
    }

    /// Level size rounding.
    pub fn rounding_mode(&self) -> RoundingMode {
        self.tiles.map_or(RoundingMode::Down, |t| t.rounding_mode)
    }

    /// Number of horizontal levels.
    pub fn x_levels(&self) -> usize {
        let window = &self.data_window;
        match self.level_mode() {
            LevelMode::Singular => 1,
            LevelMode::MipMap => geometry::level_count(
                window.width().max(window.height()),
                self.rounding_mode(),
            ),
            LevelMode::RipMap => geometry::level_count(window.width(), self.rounding_mode()),
        }
    }

    /// Number of vertical levels.
    pub fn y_levels(&self) -> usize {
        let window = &self.data_window;
        match self.level_mode() {
            LevelMode::Singular => 1,
            LevelMode::MipMap => self.x_levels(),
            LevelMode::RipMap => geometry::level_count(window.height(), self.rounding_mode()),
        }
    }

    /// Number of stored levels.
    pub fn level_count(&self) -> usize {
        match self.level_mode() {
            LevelMode::Singular => 1,
            LevelMode::MipMap => self.x_levels(),
            LevelMode::RipMap => self.x_levels() * self.y_levels(),
        }
    }

    /// Every stored level, full resolution first.
    pub fn levels(&self) -> Vec<Level> {
        geometry::enumerate_levels(self.level_mode(), self.x_levels(), self.y_levels())
    }

    /// Returns `true` if the part stores `level`.
    pub fn has_level(&self, level: Level) -> bool {
        if level.x < 0 || level.y < 0 {
            return false;
        }
        let (x, y) = (level.x as usize, level.y as usize);
        match self.level_mode() {
            LevelMode::Singular => x == 0 && y == 0,
            LevelMode::MipMap => x == y && x < self.x_levels(),
            LevelMode::RipMap => x < self.x_levels() && y < self.y_levels(),
        }
    }

    /// Data window of `level`.
    pub fn level_data_window(&self, level: Level) -> Result<Bounds> {
        if !self.has_level(level) {
            return Err(Error::invalid_argument(format!(
                "{} part has no level {level}",
                self.level_mode().name()
            )));
        }
        geometry::data_window_for_level(&self.data_window, level, self.rounding_mode())
    }

    fn tile_description(&self) -> Result<&TileDescription> {
        self.tiles
            .as_ref()
            .ok_or_else(|| Error::invalid_argument(format!("{} part has no tiles", self.kind)))
    }

    /// Number of tile columns on horizontal level `level_x`.
    pub fn x_tiles(&self, level_x: i32) -> Result<usize> {
        let tiles = self.tile_description()?;
        let w = &self.data_window;
        let extent = geometry::level_size(w.min_x, w.max_x, level_x, tiles.rounding_mode)?;
        Ok(geometry::tile_count(extent, tiles.tile_width))
    }

    /// Number of tile rows on vertical level `level_y`.
    pub fn y_tiles(&self, level_y: i32) -> Result<usize> {
        let tiles = self.tile_description()?;
        let w = &self.data_window;
        let extent = geometry::level_size(w.min_y, w.max_y, level_y, tiles.rounding_mode)?;
        Ok(geometry::tile_count(extent, tiles.tile_height))
    }
}
