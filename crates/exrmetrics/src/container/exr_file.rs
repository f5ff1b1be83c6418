//! OpenEXR files read and written through the `exr` crate.
//!
//! Flat scan line and flat tiled parts are supported, including mipmap and
//! ripmap levels. The reader decodes only the blocks a [`Region`] selects and
//! scatters their rows into the caller's buffers. The writer compresses
//! blocks as soon as they arrive and writes the whole file in
//! [`PartWriter::finish`], so a run that fails early leaves no file behind.
//!
//! The `exr` crate refuses deep data, so deep parts are rejected with
//! [`Error::UnsupportedMode`] on both sides.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use exr::block::chunk::Chunk;
use exr::block::reader::ChunksReader;
use exr::block::writer::ChunksWriter;
use exr::block::{BlockIndex, UncompressedBlock};
use exr::compression::Compression as ExrCompression;
use exr::math::{RoundingMode as ExrRoundingMode, Vec2};
use exr::meta::attribute::{
    ChannelDescription, LevelMode as ExrLevelMode, LineOrder, SampleType as ExrSampleType, Text,
    TileDescription as ExrTileDescription,
};
use exr::meta::header::{Header, ImageAttributes, LayerAttributes};
use exr::meta::{calculate_block_size, BlockDescription, MetaData, TileIndices};
use smallvec::{smallvec, SmallVec};
use tracing::{debug, trace, warn};

use crate::compression::Compression;
use crate::error::{Error, Result};
use crate::geometry::{Bounds, Level, LevelMode, RoundingMode, TileDescription};
use crate::header::{convert_samples, Channel, PartHeader, PartKind, SampleType};
use crate::layout::FrameBuffer;
use crate::part::{
    part_out_of_range, InputContainer, OutputContainer, PartReader, PartWriter, Region,
};

fn sample_type_from_exr(sample_type: ExrSampleType) -> SampleType {
    match sample_type {
        ExrSampleType::U32 => SampleType::U32,
        ExrSampleType::F16 => SampleType::F16,
        ExrSampleType::F32 => SampleType::F32,
    }
}

fn sample_type_to_exr(sample_type: SampleType) -> ExrSampleType {
    match sample_type {
        SampleType::U32 => ExrSampleType::U32,
        SampleType::F16 => ExrSampleType::F16,
        SampleType::F32 => ExrSampleType::F32,
    }
}

/// Maps an `exr` compression to ours, with its DWA level if any.
pub fn compression_from_exr(compression: ExrCompression) -> Result<(Compression, Option<f32>)> {
    Ok(match compression {
        ExrCompression::Uncompressed => (Compression::None, None),
        ExrCompression::RLE => (Compression::Rle, None),
        ExrCompression::ZIP1 => (Compression::Zips, None),
        ExrCompression::ZIP16 => (Compression::Zip, None),
        ExrCompression::PIZ => (Compression::Piz, None),
        ExrCompression::PXR24 => (Compression::Pxr24, None),
        ExrCompression::B44 => (Compression::B44, None),
        ExrCompression::B44A => (Compression::B44a, None),
        ExrCompression::DWAA(level) => (Compression::Dwaa, level),
        ExrCompression::DWAB(level) => (Compression::Dwab, level),
        #[allow(unreachable_patterns)]
        other => {
            return Err(Error::unsupported_mode(format!(
                "compression {other:?} has no exrmetrics equivalent"
            )));
        }
    })
}

/// Maps our compression and level to the `exr` representation.
///
/// The `exr` crate has no zip level setting; a zip level is dropped with a
/// warning.
pub fn compression_to_exr(compression: Compression, level: Option<f32>) -> ExrCompression {
    if compression.is_zip() && level.is_some() {
        warn!(level = ?level, "zip compression level is not supported by the exr codec, ignoring it");
    }
    match compression {
        Compression::None => ExrCompression::Uncompressed,
        Compression::Rle => ExrCompression::RLE,
        Compression::Zips => ExrCompression::ZIP1,
        Compression::Zip => ExrCompression::ZIP16,
        Compression::Piz => ExrCompression::PIZ,
        Compression::Pxr24 => ExrCompression::PXR24,
        Compression::B44 => ExrCompression::B44,
        Compression::B44a => ExrCompression::B44A,
        Compression::Dwaa => ExrCompression::DWAA(level),
        Compression::Dwab => ExrCompression::DWAB(level),
    }
}

fn tiles_from_exr(tiles: &ExrTileDescription) -> TileDescription {
    let level_mode = match tiles.level_mode {
        ExrLevelMode::Singular => LevelMode::Singular,
        ExrLevelMode::MipMap => LevelMode::MipMap,
        ExrLevelMode::RipMap => LevelMode::RipMap,
    };
    let rounding_mode = match tiles.rounding_mode {
        ExrRoundingMode::Down => RoundingMode::Down,
        ExrRoundingMode::Up => RoundingMode::Up,
    };
    TileDescription::new(tiles.tile_size.width(), tiles.tile_size.height())
        .with_levels(level_mode, rounding_mode)
}

fn tiles_to_exr(tiles: &TileDescription) -> ExrTileDescription {
    ExrTileDescription {
        tile_size: Vec2(tiles.tile_width, tiles.tile_height),
        level_mode: match tiles.level_mode {
            LevelMode::Singular => ExrLevelMode::Singular,
            LevelMode::MipMap => ExrLevelMode::MipMap,
            LevelMode::RipMap => ExrLevelMode::RipMap,
        },
        rounding_mode: match tiles.rounding_mode {
            RoundingMode::Down => ExrRoundingMode::Down,
            RoundingMode::Up => ExrRoundingMode::Up,
        },
    }
}

/// Builds our view of an `exr` header.
pub fn part_header_from_exr(header: &Header) -> Result<PartHeader> {
    let position = header.own_attributes.layer_position;
    let data_window = Bounds::from_origin_size(
        position.x(),
        position.y(),
        header.layer_size.width(),
        header.layer_size.height(),
    );

    let mut channels = Vec::with_capacity(header.channels.list.len());
    for channel in &header.channels.list {
        if channel.sampling != Vec2(1, 1) {
            return Err(Error::unsupported_mode(format!(
                "channel '{}' is subsampled",
                channel.name
            )));
        }
        channels.push(Channel::new(
            channel.name.to_string(),
            sample_type_from_exr(channel.sample_type),
        ));
    }

    let tiles = match &header.blocks {
        BlockDescription::ScanLines => None,
        BlockDescription::Tiles(tiles) => Some(tiles_from_exr(tiles)),
    };
    let kind = match (header.deep, tiles.is_some()) {
        (false, false) => PartKind::ScanLine,
        (false, true) => PartKind::Tiled,
        (true, false) => PartKind::DeepScanLine,
        (true, true) => PartKind::DeepTiled,
    };
    let (compression, compression_level) = compression_from_exr(header.compression)?;

    let mut part = match tiles {
        Some(tiles) if kind == PartKind::DeepTiled => PartHeader::deep_tiled(data_window, channels, tiles),
        Some(tiles) => PartHeader::tiled(data_window, channels, tiles),
        None if kind == PartKind::DeepScanLine => PartHeader::deep_scan_line(data_window, channels),
        None => PartHeader::scan_line(data_window, channels),
    }
    .with_compression(compression);
    part.compression_level = compression_level;
    part.name = header.own_attributes.layer_name.as_ref().map(Text::to_string);
    Ok(part)
}

fn text(value: &str) -> Result<Text> {
    Text::new_or_none(value)
        .ok_or_else(|| Error::invalid_argument(format!("'{value}' cannot be stored as exr text")))
}

/// Builds an `exr` header for `part`, keeping `attributes` when given.
pub fn part_header_to_exr(
    part: &PartHeader,
    attributes: Option<&(ImageAttributes, LayerAttributes)>,
) -> Result<Header> {
    if part.kind.is_deep() {
        return Err(Error::unsupported_mode(format!(
            "the exr codec cannot write {} parts",
            part.kind
        )));
    }

    let channels = part
        .channels
        .iter()
        .map(|c| Ok(ChannelDescription::new(text(&c.name)?, sample_type_to_exr(c.sample_type), false)))
        .collect::<Result<SmallVec<[ChannelDescription; 5]>>>()?;

    let size = Vec2(part.data_window.width(), part.data_window.height());
    let mut header = Header::new(text(part.name.as_deref().unwrap_or_default())?, size, channels);

    if let Some((shared, own)) = attributes {
        header.shared_attributes = shared.clone();
        header.own_attributes = own.clone();
    }
    header.own_attributes.layer_position = Vec2(part.data_window.min_x, part.data_window.min_y);
    header.own_attributes.layer_name = part.name.as_deref().map(text).transpose()?;

    let blocks = match &part.tiles {
        Some(tiles) => BlockDescription::Tiles(tiles_to_exr(tiles)),
        None => BlockDescription::ScanLines,
    };
    let compression = compression_to_exr(part.compression, part.compression_level);
    Ok(header.with_encoding(compression, blocks, LineOrder::Increasing))
}

/// An OpenEXR file opened for reading.
#[derive(Debug, Clone)]
pub struct ExrInputFile {
    path: PathBuf,
    meta: MetaData,
    headers: Vec<PartHeader>,
}

impl ExrInputFile {
    /// Reads the headers of the file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let reader = exr::block::read(BufReader::new(File::open(&path)?), false)?;
        let meta = reader.into_meta_data();
        let headers = meta
            .headers
            .iter()
            .map(part_header_from_exr)
            .collect::<Result<Vec<_>>>()?;

        debug!(path = %path.display(), parts = headers.len(), "opened exr input");
        Ok(Self { path, meta, headers })
    }

    /// Path of the file.
    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Shared and per-part attributes of part `part`, to carry over into an
    /// output file.
    pub fn attributes(&self, part: usize) -> Option<(ImageAttributes, LayerAttributes)> {
        self.meta
            .headers
            .get(part)
            .map(|h| (h.shared_attributes.clone(), h.own_attributes.clone()))
    }
}

impl InputContainer for ExrInputFile {
    fn part_count(&self) -> usize {
        self.headers.len()
    }

    fn part_header(&self, part: usize) -> Result<&PartHeader> {
        let count = self.headers.len();
        self.headers
            .get(part)
            .ok_or_else(|| part_out_of_range(&self.path.display().to_string(), count, part))
    }

    fn open_part(&mut self, part: usize) -> Result<Box<dyn PartReader + '_>> {
        let header = self.part_header(part)?;
        if header.kind.is_deep() {
            return Err(Error::unsupported_mode(format!(
                "the exr codec cannot read {} parts",
                header.kind
            )));
        }
        Ok(Box::new(ExrPartReader { file: self, part }))
    }
}

/// Returns `true` if the block at `tile`/`block` falls inside `region`.
fn block_selected(region: Region, tile_index: Vec2<usize>, level: Vec2<usize>, rows: Bounds) -> bool {
    match region {
        Region::Lines { min_y, max_y } => {
            level == Vec2(0, 0) && rows.max_y >= min_y && rows.min_y <= max_y
        }
        Region::Tiles { range, level: wanted } => {
            level == Vec2(wanted.x as usize, wanted.y as usize)
                && range.contains(tile_index.x(), tile_index.y())
        }
    }
}

/// Absolute pixel bounds of a block at `pixel_position` (relative to the
/// data window origin) of `pixel_size`.
fn block_bounds(header: &Header, pixel_position: Vec2<usize>, pixel_size: Vec2<usize>) -> Bounds {
    let origin = header.own_attributes.layer_position;
    Bounds::from_origin_size(
        origin.x() + pixel_position.x() as i32,
        origin.y() + pixel_position.y() as i32,
        pixel_size.width(),
        pixel_size.height(),
    )
}

struct ExrPartReader<'a> {
    file: &'a ExrInputFile,
    part: usize,
}

impl ExrPartReader<'_> {
    fn exr_header(&self) -> &Header {
        &self.file.meta.headers[self.part]
    }

    fn scatter(&self, block: &UncompressedBlock, frame: &mut FrameBuffer, target: &Bounds) -> Result<()> {
        let header = self.exr_header();
        let rows = block_bounds(header, block.index.pixel_position, block.index.pixel_size);
        let expected = rows.pixel_count() * header.channels.bytes_per_pixel;
        if block.data.len() != expected {
            return Err(Error::layout_mismatch(format!(
                "decoded block holds {} bytes, expected {expected}",
                block.data.len()
            )));
        }
        let Some(area) = rows.intersect(&frame.window()).and_then(|a| a.intersect(target)) else {
            return Ok(());
        };

        let targets: Vec<(SampleType, Option<usize>)> = header
            .channels
            .list
            .iter()
            .map(|c| {
                let name = c.name.to_string();
                let index = frame.channels().iter().position(|b| b.channel().name == name);
                (sample_type_from_exr(c.sample_type), index)
            })
            .collect();

        let width = rows.width();
        let first = (area.min_x - rows.min_x) as usize;
        let last = (area.max_x - rows.min_x) as usize;
        let mut offset = 0;

        for y in rows.min_y..=rows.max_y {
            for &(src_type, index) in &targets {
                let size = src_type.byte_size();
                let line = &block.data[offset..offset + width * size];
                offset += width * size;

                let Some(index) = index else { continue };
                if y < area.min_y || y > area.max_y {
                    continue;
                }
                let buffer = &mut frame.channels_mut()[index];
                let dst_type = buffer.sample_type();
                let dst = buffer.row_mut(y, area.min_x, area.max_x)?;
                convert_samples(src_type, &line[first * size..(last + 1) * size], dst_type, dst);
            }
        }
        Ok(())
    }
}

impl PartReader for ExrPartReader<'_> {
    fn header(&self) -> &PartHeader {
        &self.file.headers[self.part]
    }

    fn read_pixels(&mut self, frame: &mut FrameBuffer, region: Region) -> Result<()> {
        let target = region.pixel_bounds(self.header())?;
        let part = self.part;
        let header = self.exr_header().clone();
        trace!(part, region = ?region, "exr read_pixels");

        let reader = exr::block::read(BufReader::new(File::open(&self.file.path)?), false)?;
        let chunks = reader.filter_chunks(false, |_meta, tile, block| {
            block.layer == part
                && block_selected(
                    region,
                    tile.tile_index,
                    tile.level_index,
                    block_bounds(&header, block.pixel_position, block.pixel_size),
                )
        })?;

        for block in chunks.sequential_decompressor(false) {
            self.scatter(&block?, frame, &target)?;
        }
        Ok(())
    }
}

/// An OpenEXR file to be written with a single part.
#[derive(Debug, Clone)]
pub struct ExrOutputFile {
    path: PathBuf,
    attributes: Option<(ImageAttributes, LayerAttributes)>,
    created: bool,
}

impl ExrOutputFile {
    /// Prepares writing to `path`. Nothing touches the disk until the part
    /// is finished.
    pub fn create(path: impl AsRef<Path>) -> Self {
        Self { path: path.as_ref().to_path_buf(), attributes: None, created: false }
    }

    /// Carries the given attributes into the output header.
    pub fn with_attributes(mut self, attributes: Option<(ImageAttributes, LayerAttributes)>) -> Self {
        self.attributes = attributes;
        self
    }

    /// Path of the file.
    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl OutputContainer for ExrOutputFile {
    fn create_part(&mut self, header: PartHeader) -> Result<Box<dyn PartWriter + '_>> {
        if self.created {
            return Err(Error::invalid_argument("exr output holds a single part"));
        }
        header.validate()?;
        let exr_header = part_header_to_exr(&header, self.attributes.as_ref())?;
        let chunk_count = exr_header.blocks_increasing_y_order().len();
        self.created = true;

        debug!(path = %self.path.display(), chunks = chunk_count, "creating exr output part");
        Ok(Box::new(ExrPartWriter {
            path: &self.path,
            header,
            exr_header,
            chunks: (0..chunk_count).map(|_| None).collect(),
        }))
    }
}

struct ExrPartWriter<'a> {
    path: &'a Path,
    header: PartHeader,
    exr_header: Header,
    chunks: Vec<Option<Chunk>>,
}

impl ExrPartWriter<'_> {
    /// Position and size of a block within its level, relative to the data
    /// window origin. The last block on each axis is clipped to the level.
    fn block_placement(&self, tile: &TileIndices) -> Result<(Vec2<usize>, Vec2<usize>)> {
        let (width, height) = match &self.header.tiles {
            Some(tiles) => (tiles.tile_width, tiles.tile_height),
            None => (self.header.data_window.width(), self.header.compression.scanlines_per_chunk()),
        };
        let location = tile.location;
        let level = Level::new(location.level_index.x() as i32, location.level_index.y() as i32);
        let window = self.header.level_data_window(level)?;

        let position = Vec2(location.tile_index.x() * width, location.tile_index.y() * height);
        let size = Vec2(
            calculate_block_size(window.width(), width, position.x())?,
            calculate_block_size(window.height(), height, position.y())?,
        );
        Ok((position, size))
    }

    fn gather(&self, frame: &FrameBuffer, rows: &Bounds) -> Result<Vec<u8>> {
        let mut data = Vec::with_capacity(rows.pixel_count() * self.exr_header.channels.bytes_per_pixel);
        let width = rows.width();

        for y in rows.min_y..=rows.max_y {
            for channel in &self.exr_header.channels.list {
                let dst_type = sample_type_from_exr(channel.sample_type);
                let start = data.len();
                data.resize(start + width * dst_type.byte_size(), 0);

                let name = channel.name.to_string();
                if let Some(buffer) = frame.channel(&name) {
                    let src = buffer.row(y, rows.min_x, rows.max_x)?;
                    convert_samples(buffer.sample_type(), src, dst_type, &mut data[start..]);
                }
            }
        }
        Ok(data)
    }
}

impl PartWriter for ExrPartWriter<'_> {
    fn header(&self) -> &PartHeader {
        &self.header
    }

    fn write_pixels(&mut self, frame: &FrameBuffer, region: Region) -> Result<()> {
        let headers = std::slice::from_ref(&self.exr_header);
        let mut encoded = Vec::new();

        for (index, tile) in self.exr_header.blocks_increasing_y_order().enumerate() {
            let (pixel_position, pixel_size) = self.block_placement(&tile)?;
            let rows = block_bounds(&self.exr_header, pixel_position, pixel_size);
            if !block_selected(region, tile.location.tile_index, tile.location.level_index, rows) {
                continue;
            }

            let block = UncompressedBlock {
                index: BlockIndex {
                    layer: 0,
                    pixel_position,
                    pixel_size,
                    level: tile.location.level_index,
                },
                data: self.gather(frame, &rows)?,
            };
            encoded.push((index, block.compress_to_chunk(headers)?));
        }

        trace!(region = ?region, blocks = encoded.len(), "exr write_pixels");
        for (index, chunk) in encoded {
            self.chunks[index] = Some(chunk);
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if let Some(index) = self.chunks.iter().position(Option::is_none) {
            return Err(Error::layout_mismatch(format!(
                "chunk {index} of {} was never written",
                self.chunks.len()
            )));
        }
        let chunks: Vec<Chunk> = std::mem::take(&mut self.chunks).into_iter().flatten().collect();

        let file = BufWriter::new(File::create(self.path)?);
        exr::block::write(file, smallvec![self.exr_header.clone()], true, move |_meta, writer| {
            for (index, chunk) in chunks.into_iter().enumerate() {
                writer.write_chunk(index, chunk)?;
            }
            Ok(())
        })?;

        debug!(path = %self.path.display(), "exr output written");
        Ok(())
    }
}
