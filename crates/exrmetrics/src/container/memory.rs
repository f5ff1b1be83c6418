//! In-memory parts.
//!
//! [`MemoryContainer`] stores every level of every part as plain sample
//! planes. It supports all four part kinds and every level mode, and serves
//! as the reference backend for tests and benchmarks.

use std::collections::BTreeMap;

use crate::deep::{DeepFrameBuffer, SampleCounts};
use crate::error::{Error, Result};
use crate::geometry::{Bounds, Level};
use crate::header::{convert_samples, PartHeader, SampleType};
use crate::layout::{FrameBuffer, PixelAddressing};
use crate::part::{
    part_out_of_range, InputContainer, OutputContainer, PartReader, PartWriter, Region,
};

/// Flat samples of one level, one plane per header channel.
#[derive(Debug, Clone, PartialEq)]
struct FlatLevel {
    addressing: PixelAddressing,
    planes: Vec<Vec<u8>>,
}

/// Deep samples of one level, indexed `[channel][pixel]`.
#[derive(Debug, Clone, PartialEq)]
struct DeepLevel {
    addressing: PixelAddressing,
    counts: Vec<u32>,
    samples: Vec<Vec<Vec<u8>>>,
}

#[derive(Debug, Clone, PartialEq)]
enum LevelStore {
    Flat(FlatLevel),
    Deep(DeepLevel),
}

/// One part held in memory.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryPart {
    header: PartHeader,
    levels: BTreeMap<Level, LevelStore>,
    complete: bool,
}

impl MemoryPart {
    /// Allocates zeroed storage for every level of `header`.
    pub fn new(header: PartHeader) -> Result<Self> {
        header.validate()?;

        let mut levels = BTreeMap::new();
        for level in header.levels() {
            let addressing = PixelAddressing::new(header.level_data_window(level)?);
            let pixels = addressing.pixel_count();
            let store = if header.kind.is_deep() {
                LevelStore::Deep(DeepLevel {
                    addressing,
                    counts: vec![0; pixels],
                    samples: vec![vec![Vec::new(); pixels]; header.channels.len()],
                })
            } else {
                LevelStore::Flat(FlatLevel {
                    addressing,
                    planes: header
                        .channels
                        .iter()
                        .map(|c| vec![0; pixels * c.byte_size()])
                        .collect(),
                })
            };
            levels.insert(level, store);
        }

        Ok(Self { header, levels, complete: true })
    }

    /// Part header.
    #[inline]
    pub fn header(&self) -> &PartHeader {
        &self.header
    }

    /// Returns `false` while a writer is still filling the part.
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    fn channel(&self, name: &str) -> Result<(usize, SampleType)> {
        let index = self.header.channel_index(name).ok_or_else(|| {
            Error::invalid_argument(format!("part has no channel '{name}'"))
        })?;
        Ok((index, self.header.channels[index].sample_type))
    }

    fn store(&self, level: Level) -> Result<&LevelStore> {
        self.levels
            .get(&level)
            .ok_or_else(|| Error::invalid_argument(format!("part has no level {level}")))
    }

    fn store_mut(&mut self, level: Level) -> Result<&mut LevelStore> {
        self.levels
            .get_mut(&level)
            .ok_or_else(|| Error::invalid_argument(format!("part has no level {level}")))
    }

    fn flat(&self, level: Level) -> Result<&FlatLevel> {
        match self.store(level)? {
            LevelStore::Flat(flat) => Ok(flat),
            LevelStore::Deep(_) => Err(self.wrong_kind("flat")),
        }
    }

    fn flat_mut(&mut self, level: Level) -> Result<&mut FlatLevel> {
        let kind = self.header.kind;
        match self.store_mut(level)? {
            LevelStore::Flat(flat) => Ok(flat),
            LevelStore::Deep(_) => Err(Error::unsupported_mode(format!(
                "{kind} part has no flat samples"
            ))),
        }
    }

    fn deep(&self, level: Level) -> Result<&DeepLevel> {
        match self.store(level)? {
            LevelStore::Deep(deep) => Ok(deep),
            LevelStore::Flat(_) => Err(self.wrong_kind("deep")),
        }
    }

    fn deep_mut(&mut self, level: Level) -> Result<&mut DeepLevel> {
        let kind = self.header.kind;
        match self.store_mut(level)? {
            LevelStore::Deep(deep) => Ok(deep),
            LevelStore::Flat(_) => Err(Error::unsupported_mode(format!(
                "{kind} part has no deep samples"
            ))),
        }
    }

    fn wrong_kind(&self, what: &str) -> Error {
        Error::unsupported_mode(format!("{} part has no {what} samples", self.header.kind))
    }

    /// Flat sample of `channel` at `(x, y)` on `level`, as `f32`.
    pub fn get_f32(&self, level: Level, channel: &str, x: i32, y: i32) -> Result<f32> {
        let (c, sample_type) = self.channel(channel)?;
        let flat = self.flat(level)?;
        let start = flat.addressing.index(x, y)? * sample_type.byte_size();
        Ok(sample_type.read_f32(&flat.planes[c][start..]))
    }

    /// Stores a flat sample, converting to the channel's type.
    pub fn set_f32(&mut self, level: Level, channel: &str, x: i32, y: i32, value: f32) -> Result<()> {
        let (c, sample_type) = self.channel(channel)?;
        let flat = self.flat_mut(level)?;
        let start = flat.addressing.index(x, y)? * sample_type.byte_size();
        sample_type.write_f32(value, &mut flat.planes[c][start..]);
        Ok(())
    }

    /// Sets every flat sample of every level to `value(channel, level, x, y)`.
    pub fn fill(&mut self, value: impl Fn(&str, Level, i32, i32) -> f32) -> Result<()> {
        let channels = self.header.channels.clone();
        for level in self.header.levels() {
            let flat = self.flat_mut(level)?;
            let window = flat.addressing.window();
            for (c, channel) in channels.iter().enumerate() {
                let size = channel.byte_size();
                for (i, sample) in flat.planes[c].chunks_exact_mut(size).enumerate() {
                    let (x, y) = pixel_at(&window, i);
                    channel.sample_type.write_f32(value(&channel.name, level, x, y), sample);
                }
            }
        }
        Ok(())
    }

    /// Sample count of the deep pixel `(x, y)` on `level`.
    pub fn deep_count(&self, level: Level, x: i32, y: i32) -> Result<u32> {
        let deep = self.deep(level)?;
        Ok(deep.counts[deep.addressing.index(x, y)?])
    }

    /// Deep samples of `channel` at `(x, y)` on `level`, as `f32`.
    pub fn deep_samples_f32(&self, level: Level, channel: &str, x: i32, y: i32) -> Result<Vec<f32>> {
        let (c, sample_type) = self.channel(channel)?;
        let deep = self.deep(level)?;
        let bytes = &deep.samples[c][deep.addressing.index(x, y)?];
        Ok(bytes
            .chunks_exact(sample_type.byte_size())
            .map(|s| sample_type.read_f32(s))
            .collect())
    }

    /// Fills every deep level: pixel `(x, y)` gets `count(level, x, y)`
    /// samples, sample `i` of a channel is `value(channel, level, x, y, i)`.
    pub fn fill_deep(
        &mut self,
        count: impl Fn(Level, i32, i32) -> u32,
        value: impl Fn(&str, Level, i32, i32, usize) -> f32,
    ) -> Result<()> {
        let channels = self.header.channels.clone();
        for level in self.header.levels() {
            let deep = self.deep_mut(level)?;
            let window = deep.addressing.window();
            for pixel in 0..deep.counts.len() {
                let (x, y) = pixel_at(&window, pixel);
                let n = count(level, x, y);
                deep.counts[pixel] = n;
                for (c, channel) in channels.iter().enumerate() {
                    let size = channel.byte_size();
                    let mut bytes = vec![0; n as usize * size];
                    for (i, sample) in bytes.chunks_exact_mut(size).enumerate() {
                        channel.sample_type.write_f32(value(&channel.name, level, x, y, i), sample);
                    }
                    deep.samples[c][pixel] = bytes;
                }
            }
        }
        Ok(())
    }
}

fn pixel_at(window: &Bounds, index: usize) -> (i32, i32) {
    let width = window.width();
    (
        window.min_x + (index % width) as i32,
        window.min_y + (index / width) as i32,
    )
}

/// Parts held in memory.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryContainer {
    parts: Vec<MemoryPart>,
}

impl MemoryContainer {
    /// Empty container.
    pub fn new() -> Self {
        Self::default()
    }

    /// Container holding `part`.
    pub fn with_part(part: MemoryPart) -> Self {
        Self { parts: vec![part] }
    }

    /// Appends a part.
    pub fn push(&mut self, part: MemoryPart) {
        self.parts.push(part);
    }

    /// All parts.
    #[inline]
    pub fn parts(&self) -> &[MemoryPart] {
        &self.parts
    }

    /// Part `index`.
    pub fn part(&self, index: usize) -> Option<&MemoryPart> {
        self.parts.get(index)
    }
}

impl InputContainer for MemoryContainer {
    fn part_count(&self) -> usize {
        self.parts.len()
    }

    fn part_header(&self, part: usize) -> Result<&PartHeader> {
        self.parts
            .get(part)
            .map(MemoryPart::header)
            .ok_or_else(|| part_out_of_range("memory container", self.parts.len(), part))
    }

    fn open_part(&mut self, part: usize) -> Result<Box<dyn PartReader + '_>> {
        let count = self.parts.len();
        let part = self
            .parts
            .get(part)
            .ok_or_else(|| part_out_of_range("memory container", count, part))?;
        Ok(Box::new(MemoryPartReader { part }))
    }
}

impl OutputContainer for MemoryContainer {
    fn create_part(&mut self, header: PartHeader) -> Result<Box<dyn PartWriter + '_>> {
        let mut part = MemoryPart::new(header)?;
        part.complete = false;
        self.parts.push(part);
        let index = self.parts.len() - 1;
        Ok(Box::new(MemoryPartWriter { part: &mut self.parts[index] }))
    }
}

/// Area of `region` that lies inside the caller's buffer.
fn covered(header: &PartHeader, region: Region, buffer: Bounds) -> Result<Option<Bounds>> {
    Ok(region.pixel_bounds(header)?.intersect(&buffer))
}

fn copy_rows(
    area: &Bounds,
    src: &[u8],
    src_addressing: &PixelAddressing,
    src_type: SampleType,
    dst: &mut [u8],
    dst_addressing: &PixelAddressing,
    dst_type: SampleType,
) -> Result<()> {
    let (src_size, dst_size) = (src_type.byte_size(), dst_type.byte_size());
    for y in area.min_y..=area.max_y {
        let s = src_addressing.row_range(y, area.min_x, area.max_x)?;
        let d = dst_addressing.row_range(y, area.min_x, area.max_x)?;
        convert_samples(
            src_type,
            &src[s.start * src_size..s.end * src_size],
            dst_type,
            &mut dst[d.start * dst_size..d.end * dst_size],
        );
    }
    Ok(())
}

struct MemoryPartReader<'a> {
    part: &'a MemoryPart,
}

impl PartReader for MemoryPartReader<'_> {
    fn header(&self) -> &PartHeader {
        &self.part.header
    }

    fn read_pixels(&mut self, frame: &mut FrameBuffer, region: Region) -> Result<()> {
        let header = &self.part.header;
        let flat = self.part.flat(region.level())?;
        let Some(area) = covered(header, region, frame.window())? else {
            return Ok(());
        };

        for buffer in frame.channels_mut() {
            let Some(c) = header.channel_index(&buffer.channel().name) else {
                continue;
            };
            let addressing = *buffer.addressing();
            let dst_type = buffer.sample_type();
            copy_rows(
                &area,
                &flat.planes[c],
                &flat.addressing,
                header.channels[c].sample_type,
                buffer.data_mut(),
                &addressing,
                dst_type,
            )?;
        }
        Ok(())
    }

    fn read_sample_counts(&mut self, counts: &mut SampleCounts, region: Region) -> Result<()> {
        let deep = self.part.deep(region.level())?;
        let Some(area) = covered(&self.part.header, region, counts.window())? else {
            return Ok(());
        };

        let addressing = *counts.addressing();
        for y in area.min_y..=area.max_y {
            let s = deep.addressing.row_range(y, area.min_x, area.max_x)?;
            let d = addressing.row_range(y, area.min_x, area.max_x)?;
            counts.as_mut_slice()[d].copy_from_slice(&deep.counts[s]);
        }
        Ok(())
    }

    fn read_deep_samples(&mut self, frame: &mut DeepFrameBuffer, region: Region) -> Result<()> {
        if !frame.is_allocated() {
            return Err(Error::layout_mismatch("deep samples read before allocation"));
        }
        let header = &self.part.header;
        let deep = self.part.deep(region.level())?;
        let Some(area) = covered(header, region, frame.window())? else {
            return Ok(());
        };

        let targets: Vec<(usize, usize, SampleType)> = frame
            .channels()
            .iter()
            .enumerate()
            .filter_map(|(f, storage)| {
                header
                    .channel_index(&storage.channel().name)
                    .map(|c| (f, c, storage.channel().sample_type))
            })
            .collect();

        for y in area.min_y..=area.max_y {
            for x in area.min_x..=area.max_x {
                let pixel = deep.addressing.index(x, y)?;
                let stored = deep.counts[pixel] as usize;
                let span = frame.span(x, y)?;
                if span.count != stored {
                    return Err(Error::layout_mismatch(format!(
                        "pixel ({x}, {y}) has room for {} samples but stores {stored}",
                        span.count
                    )));
                }
                for &(f, c, dst_type) in &targets {
                    let src = &deep.samples[c][pixel];
                    let dst = frame.pixel_samples_mut(f, x, y)?;
                    convert_samples(header.channels[c].sample_type, src, dst_type, dst);
                }
            }
        }
        Ok(())
    }
}

struct MemoryPartWriter<'a> {
    part: &'a mut MemoryPart,
}

impl PartWriter for MemoryPartWriter<'_> {
    fn header(&self) -> &PartHeader {
        &self.part.header
    }

    fn write_pixels(&mut self, frame: &FrameBuffer, region: Region) -> Result<()> {
        let header = self.part.header.clone();
        let Some(area) = covered(&header, region, frame.window())? else {
            return Ok(());
        };
        let flat = self.part.flat_mut(region.level())?;

        for (c, channel) in header.channels.iter().enumerate() {
            let Some(buffer) = frame.channel(&channel.name) else {
                continue;
            };
            copy_rows(
                &area,
                buffer.data(),
                buffer.addressing(),
                buffer.sample_type(),
                &mut flat.planes[c],
                &flat.addressing,
                channel.sample_type,
            )?;
        }
        Ok(())
    }

    fn write_deep_samples(&mut self, frame: &DeepFrameBuffer, region: Region) -> Result<()> {
        if !frame.is_allocated() {
            return Err(Error::layout_mismatch("deep samples written before allocation"));
        }
        let header = self.part.header.clone();
        let Some(area) = covered(&header, region, frame.window())? else {
            return Ok(());
        };
        let deep = self.part.deep_mut(region.level())?;

        for y in area.min_y..=area.max_y {
            for x in area.min_x..=area.max_x {
                let pixel = deep.addressing.index(x, y)?;
                let count = frame.sample_counts().get(x, y)?;
                deep.counts[pixel] = count;

                for (c, channel) in header.channels.iter().enumerate() {
                    let mut bytes = vec![0; count as usize * channel.byte_size()];
                    if let Some(f) = frame.channel_index(&channel.name) {
                        let src_type = frame.channels()[f].channel().sample_type;
                        let src = frame.pixel_samples(f, x, y)?;
                        if src.len() / src_type.byte_size() != count as usize {
                            return Err(Error::layout_mismatch(format!(
                                "pixel ({x}, {y}) counts {count} samples but holds {}",
                                src.len() / src_type.byte_size()
                            )));
                        }
                        convert_samples(src_type, src, channel.sample_type, &mut bytes);
                    }
                    deep.samples[c][pixel] = bytes;
                }
            }
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.part.complete = true;
        Ok(())
    }
}
