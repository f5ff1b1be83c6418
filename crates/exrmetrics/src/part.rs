//! The seam between the copy engine and a codec.
//!
//! An [`InputContainer`] hands out [`PartReader`]s, an [`OutputContainer`]
//! creates [`PartWriter`]s. Readers fill caller-owned buffers for a
//! [`Region`] and writers encode them, so the engine decides what is
//! allocated, when, and which calls are timed.

use crate::deep::{DeepFrameBuffer, SampleCounts};
use crate::error::{Error, Result};
use crate::geometry::{Bounds, Level};
use crate::header::PartHeader;
use crate::layout::FrameBuffer;

/// Inclusive range of tile indices on one level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileRange {
    /// First tile column.
    pub min_x: usize,
    /// First tile row.
    pub min_y: usize,
    /// Last tile column.
    pub max_x: usize,
    /// Last tile row.
    pub max_y: usize,
}

impl TileRange {
    /// Number of tiles in the range.
    pub fn count(&self) -> usize {
        (self.max_x + 1).saturating_sub(self.min_x) * (self.max_y + 1).saturating_sub(self.min_y)
    }

    /// Returns `true` if tile `(x, y)` is in the range.
    pub fn contains(&self, x: usize, y: usize) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }
}

/// Pixels covered by one codec call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Region {
    /// Scan lines `min_y..=max_y` of the full-resolution data window.
    Lines {
        /// First scan line.
        min_y: i32,
        /// Last scan line.
        max_y: i32,
    },
    /// A block of tiles on one level.
    Tiles {
        /// Tile indices.
        range: TileRange,
        /// Level the tiles belong to.
        level: Level,
    },
}

impl Region {
    /// Every scan line of `header`.
    pub fn all_lines(header: &PartHeader) -> Self {
        Self::Lines { min_y: header.data_window.min_y, max_y: header.data_window.max_y }
    }

    /// Every tile of `level`.
    pub fn all_tiles(header: &PartHeader, level: Level) -> Result<Self> {
        // validates the level before asking for tile counts
        header.level_data_window(level)?;
        let last = |count: usize| {
            count
                .checked_sub(1)
                .ok_or_else(|| Error::invalid_argument(format!("level {level} has no tiles")))
        };
        let range = TileRange {
            min_x: 0,
            min_y: 0,
            max_x: last(header.x_tiles(level.x)?)?,
            max_y: last(header.y_tiles(level.y)?)?,
        };
        Ok(Self::Tiles { range, level })
    }

    /// Level the region belongs to.
    pub fn level(&self) -> Level {
        match self {
            Self::Lines { .. } => Level::FULL,
            Self::Tiles { level, .. } => *level,
        }
    }

    /// Number of tiles, zero for scan lines.
    pub fn tile_count(&self) -> usize {
        match self {
            Self::Lines { .. } => 0,
            Self::Tiles { range, .. } => range.count(),
        }
    }

    /// Pixel bounds covered in `header`'s coordinates, clipped to the
    /// level's data window.
    pub fn pixel_bounds(&self, header: &PartHeader) -> Result<Bounds> {
        let window = header.level_data_window(self.level())?;
        let covered = match *self {
            Self::Lines { min_y, max_y } => {
                Bounds::new(window.min_x, min_y, window.max_x, max_y)
            }
            Self::Tiles { range, .. } => {
                let tiles = header.tiles.as_ref().ok_or_else(|| {
                    Error::invalid_argument(format!("{} part has no tiles", header.kind))
                })?;
                let (tw, th) = (tiles.tile_width as i64, tiles.tile_height as i64);
                let min_x = i64::from(window.min_x) + range.min_x as i64 * tw;
                let min_y = i64::from(window.min_y) + range.min_y as i64 * th;
                let max_x = i64::from(window.min_x) + (range.max_x as i64 + 1) * tw - 1;
                let max_y = i64::from(window.min_y) + (range.max_y as i64 + 1) * th - 1;
                Bounds::new(
                    min_x.min(i64::from(window.max_x) + 1) as i32,
                    min_y.min(i64::from(window.max_y) + 1) as i32,
                    max_x.min(i64::from(window.max_x)) as i32,
                    max_y.min(i64::from(window.max_y)) as i32,
                )
            }
        };
        covered.intersect(&window).ok_or_else(|| {
            Error::invalid_argument(format!("region {self:?} covers no pixel of {window}"))
        })
    }
}

/// Decodes pixels of one input part.
///
/// Samples are converted to each buffer's own sample type. Channels present
/// in a buffer but not in the part are left untouched.
pub trait PartReader {
    /// Header of the part being read.
    fn header(&self) -> &PartHeader;

    /// Fills `frame` with the flat pixels of `region`.
    fn read_pixels(&mut self, frame: &mut FrameBuffer, region: Region) -> Result<()>;

    /// Fills `counts` with the per-pixel sample counts of `region`.
    fn read_sample_counts(&mut self, counts: &mut SampleCounts, region: Region) -> Result<()> {
        let _ = (counts, region);
        Err(Error::unsupported_mode(format!(
            "{} part has no deep sample counts",
            self.header().kind
        )))
    }

    /// Fills the allocated sample storage of `frame` for `region`.
    fn read_deep_samples(&mut self, frame: &mut DeepFrameBuffer, region: Region) -> Result<()> {
        let _ = (frame, region);
        Err(Error::unsupported_mode(format!(
            "{} part has no deep samples",
            self.header().kind
        )))
    }
}

/// Encodes pixels of one output part.
pub trait PartWriter {
    /// Header the part is written with.
    fn header(&self) -> &PartHeader;

    /// Encodes the flat pixels of `region` from `frame`.
    fn write_pixels(&mut self, frame: &FrameBuffer, region: Region) -> Result<()>;

    /// Encodes counts and samples of `region` from `frame`.
    fn write_deep_samples(&mut self, frame: &DeepFrameBuffer, region: Region) -> Result<()> {
        let _ = (frame, region);
        Err(Error::unsupported_mode(format!(
            "{} part cannot store deep samples",
            self.header().kind
        )))
    }

    /// Completes the part. Called once, after the last write.
    fn finish(&mut self) -> Result<()>;
}

/// A source of parts, usually an open file.
pub trait InputContainer {
    /// Number of parts.
    fn part_count(&self) -> usize;

    /// Header of part `part`.
    fn part_header(&self, part: usize) -> Result<&PartHeader>;

    /// Opens part `part` for reading.
    fn open_part(&mut self, part: usize) -> Result<Box<dyn PartReader + '_>>;
}

/// A destination for parts.
pub trait OutputContainer {
    /// Starts a new part described by `header`.
    fn create_part(&mut self, header: PartHeader) -> Result<Box<dyn PartWriter + '_>>;
}

/// Error for a part index past the end of a container.
pub(crate) fn part_out_of_range(source: &str, count: usize, part: usize) -> Error {
    Error::invalid_argument(format!(
        "{source} only contains {count} parts. Cannot copy part {part}"
    ))
}
