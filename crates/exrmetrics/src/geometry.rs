//! Data windows, resolution levels and tile grids.
//!
//! OpenEXR parts describe their pixels with an inclusive integer box, the
//! *data window*. Tiled parts may additionally store a pyramid of reduced
//! resolution levels:
//!
//! - **Singular**: only level `(0, 0)`
//! - **MipMap**: levels `(l, l)`, both axes halved together
//! - **RipMap**: every `(lx, ly)` combination, axes halved independently
//!
//! Level `l` of an axis spanning `min..=max` has
//! `floor((max - min + 1) / 2^l)` pixels when rounding down, the ceiling when
//! rounding up, and never fewer than one. The level's data window keeps the
//! full-resolution minimum corner.
//!
//! # Example
//!
//! ```rust
//! use exrmetrics::geometry::{level_size, Bounds, RoundingMode};
//!
//! assert_eq!(level_size(0, 99, 1, RoundingMode::Down).unwrap(), 50);
//! assert_eq!(level_size(0, 4, 1, RoundingMode::Up).unwrap(), 3);
//! assert_eq!(Bounds::new(0, 0, 99, 49).pixel_count(), 5000);
//! ```

use std::fmt;

use crate::error::{Error, Result};

/// Inclusive integer box `(min_x, min_y) - (max_x, max_y)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Bounds {
    /// Left edge, inclusive.
    pub min_x: i32,
    /// Top edge, inclusive.
    pub min_y: i32,
    /// Right edge, inclusive.
    pub max_x: i32,
    /// Bottom edge, inclusive.
    pub max_y: i32,
}

impl Bounds {
    /// Creates a box from its inclusive corners.
    #[inline]
    pub const fn new(min_x: i32, min_y: i32, max_x: i32, max_y: i32) -> Self {
        Self { min_x, min_y, max_x, max_y }
    }

    /// Creates a box from its minimum corner and a size in pixels.
    ///
    /// A zero-sized axis yields an empty box.
    pub fn from_origin_size(min_x: i32, min_y: i32, width: usize, height: usize) -> Self {
        Self {
            min_x,
            min_y,
            max_x: (i64::from(min_x) + width as i64 - 1) as i32,
            max_y: (i64::from(min_y) + height as i64 - 1) as i32,
        }
    }

    /// Number of columns, zero for an empty box.
    #[inline]
    pub fn width(&self) -> usize {
        (i64::from(self.max_x) - i64::from(self.min_x) + 1).max(0) as usize
    }

    /// Number of rows, zero for an empty box.
    #[inline]
    pub fn height(&self) -> usize {
        (i64::from(self.max_y) - i64::from(self.min_y) + 1).max(0) as usize
    }

    /// Total number of pixels covered.
    #[inline]
    pub fn pixel_count(&self) -> usize {
        self.width() * self.height()
    }

    /// Returns `true` if the box covers no pixel.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    /// Returns `true` if `(x, y)` lies inside the box.
    #[inline]
    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    /// Returns the overlap of two boxes, or `None` when they are disjoint.
    pub fn intersect(&self, other: &Bounds) -> Option<Bounds> {
        let result = Bounds::new(
            self.min_x.max(other.min_x),
            self.min_y.max(other.min_y),
            self.max_x.min(other.max_x),
            self.max_y.min(other.max_y),
        );
        (!result.is_empty()).then_some(result)
    }
}

impl fmt::Display for Bounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}) - ({}, {})",
            self.min_x, self.min_y, self.max_x, self.max_y
        )
    }
}

/// How level sizes round when an axis does not halve evenly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RoundingMode {
    /// Round towards smaller levels.
    #[default]
    Down,
    /// Round towards larger levels.
    Up,
}

impl RoundingMode {
    /// Decodes the rounding mode stored in a tile description.
    pub fn from_raw(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Self::Down),
            1 => Ok(Self::Up),
            other => Err(Error::unsupported_mode(format!(
                "unknown level rounding mode {other}"
            ))),
        }
    }
}

/// Which resolution levels a tiled part stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LevelMode {
    /// A single full-resolution level.
    #[default]
    Singular,
    /// Levels reduced equally along both axes.
    MipMap,
    /// Levels reduced independently along each axis.
    RipMap,
}

impl LevelMode {
    /// Decodes the level mode stored in a tile description.
    pub fn from_raw(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Self::Singular),
            1 => Ok(Self::MipMap),
            2 => Ok(Self::RipMap),
            other => Err(Error::unsupported_mode(format!("unknown level mode {other}"))),
        }
    }

    /// Short lowercase name, as used in log output.
    pub fn name(self) -> &'static str {
        match self {
            Self::Singular => "one level",
            Self::MipMap => "mipmap",
            Self::RipMap => "ripmap",
        }
    }
}

/// Tile size and level layout of a tiled part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileDescription {
    /// Tile width in pixels, identical on every level.
    pub tile_width: usize,
    /// Tile height in pixels, identical on every level.
    pub tile_height: usize,
    /// Stored levels.
    pub level_mode: LevelMode,
    /// Level size rounding.
    pub rounding_mode: RoundingMode,
}

impl TileDescription {
    /// Single-level tiles of the given size.
    pub fn new(tile_width: usize, tile_height: usize) -> Self {
        Self {
            tile_width,
            tile_height,
            level_mode: LevelMode::Singular,
            rounding_mode: RoundingMode::Down,
        }
    }

    /// Sets the level layout.
    pub fn with_levels(mut self, level_mode: LevelMode, rounding_mode: RoundingMode) -> Self {
        self.level_mode = level_mode;
        self.rounding_mode = rounding_mode;
        self
    }

    /// Decodes a tile description from its packed file form.
    ///
    /// The mode byte stores the level mode in its low nibble and the
    /// rounding mode in its high nibble.
    pub fn from_raw(tile_width: u32, tile_height: u32, mode: u8) -> Result<Self> {
        if tile_width == 0 || tile_height == 0 {
            return Err(Error::invalid_argument(format!(
                "tile size {tile_width}x{tile_height} is empty"
            )));
        }
        Ok(Self {
            tile_width: tile_width as usize,
            tile_height: tile_height as usize,
            level_mode: LevelMode::from_raw(mode & 0x0f)?,
            rounding_mode: RoundingMode::from_raw(mode >> 4)?,
        })
    }
}

/// Index of one resolution level, `(0, 0)` being full resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Level {
    /// Horizontal reduction step.
    pub x: i32,
    /// Vertical reduction step.
    pub y: i32,
}

impl Level {
    /// Full resolution.
    pub const FULL: Level = Level { x: 0, y: 0 };

    /// Creates a level index.
    #[inline]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Number of pixels along one axis at `level`.
///
/// The axis spans `min..=max` at full resolution. The result is at least one.
pub fn level_size(min: i32, max: i32, level: i32, rounding: RoundingMode) -> Result<usize> {
    if level < 0 {
        return Err(Error::invalid_argument(format!("level index {level} is negative")));
    }

    let extent = (i64::from(max) - i64::from(min) + 1).max(0) as u64;
    let size = match 1u64.checked_shl(level as u32) {
        Some(divisor) => {
            let size = extent / divisor;
            if rounding == RoundingMode::Up && size * divisor < extent {
                size + 1
            } else {
                size
            }
        }
        // Every extent fits below 2^64, so only rounding up leaves a pixel.
        None => u64::from(rounding == RoundingMode::Up && extent > 0),
    };

    Ok(size.max(1) as usize)
}

/// Data window of `level`, anchored at the full-resolution minimum corner.
pub fn data_window_for_level(
    window: &Bounds,
    level: Level,
    rounding: RoundingMode,
) -> Result<Bounds> {
    let width = level_size(window.min_x, window.max_x, level.x, rounding)?;
    let height = level_size(window.min_y, window.max_y, level.y, rounding)?;
    Ok(Bounds::from_origin_size(window.min_x, window.min_y, width, height))
}

fn floor_log2(value: usize) -> usize {
    if value <= 1 {
        0
    } else {
        (usize::BITS - 1 - value.leading_zeros()) as usize
    }
}

fn ceil_log2(value: usize) -> usize {
    let floor = floor_log2(value);
    if value > 1 && !value.is_power_of_two() {
        floor + 1
    } else {
        floor
    }
}

/// Number of levels needed to reduce an axis of `extent` pixels to one pixel.
pub fn level_count(extent: usize, rounding: RoundingMode) -> usize {
    let steps = match rounding {
        RoundingMode::Down => floor_log2(extent),
        RoundingMode::Up => ceil_log2(extent),
    };
    steps + 1
}

/// Number of tiles needed to cover `extent` pixels.
#[inline]
pub fn tile_count(extent: usize, tile_size: usize) -> usize {
    if tile_size == 0 {
        0
    } else {
        extent.div_ceil(tile_size)
    }
}

/// Lists the levels stored for `mode`, in row-major `(x, y)` order.
///
/// `x_levels` and `y_levels` are the per-axis level counts. Mipmaps keep the
/// diagonal only, singular parts always yield exactly `(0, 0)`.
pub fn enumerate_levels(mode: LevelMode, x_levels: usize, y_levels: usize) -> Vec<Level> {
    if mode == LevelMode::Singular {
        return vec![Level::FULL];
    }

    let mut levels = Vec::new();
    for x in 0..x_levels {
        for y in 0..y_levels {
            if mode == LevelMode::RipMap || x == y {
                levels.push(Level::new(x as i32, y as i32));
            }
        }
    }
    levels
}
