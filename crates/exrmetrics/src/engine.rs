//! The part copy engine.
//!
//! One routine copies every part kind. A [`CopyStrategy`] selects whether it
//! walks resolution levels, whether it addresses tiles or scan lines, and
//! whether it runs the flat single-pass read or the deep two-pass read.
//!
//! For every level the engine allocates a buffer sized to that level's data
//! window using the output header's channel types, times the read calls,
//! times the write call, and drops the buffer before moving on. Timings and
//! counters are summed over levels.

use tracing::{debug, info, trace};

use crate::deep::DeepFrameBuffer;
use crate::error::{Error, Result};
use crate::geometry::{Level, LevelMode};
use crate::header::{PartHeader, PartKind};
use crate::layout::FrameBuffer;
use crate::part::{PartReader, PartWriter, Region};
use crate::report::{CopyReport, CopyTally};
use crate::timing::{Phase, TimingRecorder};

/// Behaviour of one copy variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CopyStrategy {
    /// Addresses tiles and walks every stored level.
    pub tiled: bool,
    /// Reads counts before samples.
    pub deep: bool,
}

impl CopyStrategy {
    /// Flat scan line copy.
    pub const SCAN_LINE: Self = Self { tiled: false, deep: false };
    /// Flat tiled copy over all levels.
    pub const TILED: Self = Self { tiled: true, deep: false };
    /// Deep scan line copy.
    pub const DEEP_SCAN_LINE: Self = Self { tiled: false, deep: true };
    /// Deep tiled copy, single level only.
    pub const DEEP_TILED: Self = Self { tiled: true, deep: true };

    /// Strategy matching `kind`.
    pub fn for_kind(kind: PartKind) -> Self {
        match kind {
            PartKind::ScanLine => Self::SCAN_LINE,
            PartKind::Tiled => Self::TILED,
            PartKind::DeepScanLine => Self::DEEP_SCAN_LINE,
            PartKind::DeepTiled => Self::DEEP_TILED,
        }
    }

    /// Part kind this strategy copies.
    pub fn kind(&self) -> PartKind {
        match (self.tiled, self.deep) {
            (false, false) => PartKind::ScanLine,
            (true, false) => PartKind::Tiled,
            (false, true) => PartKind::DeepScanLine,
            (true, true) => PartKind::DeepTiled,
        }
    }

    /// Checks that `header` can be copied by this strategy.
    ///
    /// Runs before anything is allocated or written.
    pub fn validate(&self, header: &PartHeader) -> Result<()> {
        if header.kind != self.kind() {
            return Err(Error::unsupported_mode(format!(
                "{} copy cannot handle a {} part",
                self.kind(),
                header.kind
            )));
        }
        if self.deep && self.tiled && header.level_mode() != LevelMode::Singular {
            return Err(Error::unsupported_mode(format!(
                "{} levels of deep tiled parts are not supported",
                header.level_mode().name()
            )));
        }
        header.validate()
    }

    /// Levels the copy walks.
    pub fn levels(&self, header: &PartHeader) -> Vec<Level> {
        if self.tiled { header.levels() } else { vec![Level::FULL] }
    }

    /// Region covering all of `level`.
    pub fn region(&self, header: &PartHeader, level: Level) -> Result<Region> {
        if self.tiled {
            Region::all_tiles(header, level)
        } else {
            Ok(Region::all_lines(header))
        }
    }
}

/// Copies one part, choosing the strategy from the reader's part kind.
pub fn copy_part(reader: &mut dyn PartReader, writer: &mut dyn PartWriter) -> Result<CopyReport> {
    let strategy = CopyStrategy::for_kind(reader.header().kind);
    copy_with_strategy(strategy, reader, writer)
}

/// Copies a flat scan line part.
pub fn copy_scan_line(reader: &mut dyn PartReader, writer: &mut dyn PartWriter) -> Result<CopyReport> {
    copy_with_strategy(CopyStrategy::SCAN_LINE, reader, writer)
}

/// Copies every level of a flat tiled part.
pub fn copy_tiled(reader: &mut dyn PartReader, writer: &mut dyn PartWriter) -> Result<CopyReport> {
    copy_with_strategy(CopyStrategy::TILED, reader, writer)
}

/// Copies a deep scan line part.
pub fn copy_deep_scan_line(
    reader: &mut dyn PartReader,
    writer: &mut dyn PartWriter,
) -> Result<CopyReport> {
    copy_with_strategy(CopyStrategy::DEEP_SCAN_LINE, reader, writer)
}

/// Copies a single-level deep tiled part.
pub fn copy_deep_tiled(reader: &mut dyn PartReader, writer: &mut dyn PartWriter) -> Result<CopyReport> {
    copy_with_strategy(CopyStrategy::DEEP_TILED, reader, writer)
}

fn check_geometry(input: &PartHeader, output: &PartHeader) -> Result<()> {
    if input.data_window != output.data_window {
        return Err(Error::layout_mismatch(format!(
            "output data window {} differs from input {}",
            output.data_window, input.data_window
        )));
    }
    if input.kind != output.kind || input.tiles != output.tiles {
        return Err(Error::layout_mismatch(format!(
            "output {} part does not share the input {} layout",
            output.kind, input.kind
        )));
    }
    if input.channels.len() != output.channels.len()
        || input.channels.iter().zip(&output.channels).any(|(a, b)| a.name != b.name)
    {
        return Err(Error::layout_mismatch("output channels differ from input channels"));
    }
    Ok(())
}

/// Copies `reader`'s part into `writer` following `strategy`.
pub fn copy_with_strategy(
    strategy: CopyStrategy,
    reader: &mut dyn PartReader,
    writer: &mut dyn PartWriter,
) -> Result<CopyReport> {
    strategy.validate(reader.header())?;
    let output = writer.header().clone();
    check_geometry(reader.header(), &output)?;

    let levels = strategy.levels(&output);
    trace!(kind = %output.kind, levels = levels.len(), "copy_with_strategy");

    let mut timer = TimingRecorder::new();
    let mut tally = CopyTally {
        tiles: strategy.tiled.then_some(0),
        samples: strategy.deep.then_some(0),
        ..CopyTally::default()
    };

    for level in levels {
        let region = strategy.region(&output, level)?;
        if strategy.deep {
            copy_deep_level(reader, writer, &output, region, &mut timer, &mut tally)?;
        } else {
            copy_flat_level(reader, writer, &output, region, &mut timer, &mut tally)?;
        }
        if let Some(tiles) = tally.tiles.as_mut() {
            *tiles += region.tile_count() as u64;
        }
    }

    timer.time(Phase::Write, Level::FULL, || writer.finish())?;

    let report = CopyReport::new(tally, timer);
    info!(
        kind = %output.kind,
        pixels = report.pixel_count,
        raw_size = report.raw_size,
        write_time = report.write_time,
        "part copied"
    );
    Ok(report)
}

fn copy_flat_level(
    reader: &mut dyn PartReader,
    writer: &mut dyn PartWriter,
    output: &PartHeader,
    region: Region,
    timer: &mut TimingRecorder,
    tally: &mut CopyTally,
) -> Result<()> {
    let level = region.level();
    let window = output.level_data_window(level)?;
    let mut frame = FrameBuffer::build(window, &output.channels);

    timer.time(Phase::Read, level, || reader.read_pixels(&mut frame, region))?;
    timer.time(Phase::Write, level, || writer.write_pixels(&frame, region))?;

    debug!(level = %level, window = %window, bytes = frame.byte_size(), "level copied");
    tally.pixels += frame.pixel_count() as u64;
    tally.raw_size += frame.byte_size() as u64;
    Ok(())
}

fn copy_deep_level(
    reader: &mut dyn PartReader,
    writer: &mut dyn PartWriter,
    output: &PartHeader,
    region: Region,
    timer: &mut TimingRecorder,
    tally: &mut CopyTally,
) -> Result<()> {
    let level = region.level();
    let window = output.level_data_window(level)?;
    let mut frame = DeepFrameBuffer::new(window, &output.channels);

    timer.time(Phase::CountRead, level, || {
        reader.read_sample_counts(frame.sample_counts_mut(), region)
    })?;
    let total = frame.allocate_samples()?;
    timer.time(Phase::SampleRead, level, || reader.read_deep_samples(&mut frame, region))?;
    timer.time(Phase::Write, level, || writer.write_deep_samples(&frame, region))?;

    debug!(level = %level, window = %window, samples = total, "deep level copied");
    tally.pixels += frame.pixel_count() as u64;
    tally.raw_size += frame.raw_byte_size() as u64;
    if let Some(samples) = tally.samples.as_mut() {
        *samples += total as u64;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::{MemoryContainer, MemoryPart};
    use crate::geometry::{Bounds, RoundingMode, TileDescription};
    use crate::header::{Channel, SampleType};
    use crate::part::{InputContainer, OutputContainer};

    fn copy(input: &mut MemoryContainer, header: PartHeader) -> Result<(CopyReport, MemoryContainer)> {
        let mut output = MemoryContainer::new();
        let report = {
            let mut reader = input.open_part(0)?;
            let mut writer = output.create_part(header)?;
            copy_part(reader.as_mut(), writer.as_mut())?
        };
        Ok((report, output))
    }

    fn flat_input(header: PartHeader) -> MemoryContainer {
        let mut part = MemoryPart::new(header).unwrap();
        part.fill(|name, level, x, y| {
            let bias = if name == "R" { 0.5 } else { 0.0 };
            (level.x * 1000 + level.y * 100 + x * 10 + y) as f32 + bias
        })
        .unwrap();
        MemoryContainer::with_part(part)
    }

    fn tiled_header(mode: LevelMode) -> PartHeader {
        let tiles = TileDescription::new(4, 4).with_levels(mode, RoundingMode::Down);
        PartHeader::tiled(
            Bounds::new(0, 0, 9, 4),
            vec![Channel::new("Y", SampleType::F32)],
            tiles,
        )
    }

    #[test]
    fn test_scan_line_copy() {
        let header = PartHeader::scan_line(
            Bounds::new(-2, 3, 5, 6),
            vec![Channel::new("R", SampleType::F32), Channel::new("Z", SampleType::F32)],
        );
        let mut input = flat_input(header.clone());
        let (report, output) = copy(&mut input, header).unwrap();

        let part = output.part(0).unwrap();
        assert!(part.is_complete());
        assert_eq!(part.get_f32(Level::FULL, "R", -2, 3).unwrap(), -16.5);
        assert_eq!(part.get_f32(Level::FULL, "Z", 5, 6).unwrap(), 56.0);

        assert_eq!(report.pixel_count, 32);
        assert_eq!(report.raw_size, 32 * 8);
        assert_eq!(report.total_tiles, None);
        assert_eq!(report.total_samples, None);
        assert!(report.read_time.unwrap() >= 0.0);
        assert!(report.count_read_time.is_none());
        assert!(report.write_time >= 0.0);
        // one read, one write, one flush
        assert_eq!(report.timings.len(), 3);
    }

    #[test]
    fn test_single_level_tiled_copies_level_zero_only() {
        let header = tiled_header(LevelMode::Singular);
        let mut input = flat_input(header.clone());
        let (report, output) = copy(&mut input, header).unwrap();

        assert_eq!(report.pixel_count, 50);
        assert_eq!(report.total_tiles, Some(6));
        assert_eq!(output.part(0).unwrap().get_f32(Level::FULL, "Y", 9, 4).unwrap(), 94.0);
    }

    #[test]
    fn test_mipmap_copy_sums_levels() {
        let header = tiled_header(LevelMode::MipMap);
        assert_eq!(header.levels().len(), 4);

        let mut input = flat_input(header.clone());
        let (report, output) = copy(&mut input, header).unwrap();

        assert_eq!(report.pixel_count, 50 + 10 + 2 + 1);
        assert_eq!(report.total_tiles, Some(6 + 2 + 1 + 1));
        assert_eq!(report.raw_size, 63 * 4);
        assert_eq!(
            report.timings.iter().filter(|t| t.phase == Phase::Read).count(),
            4
        );

        let part = output.part(0).unwrap();
        assert_eq!(part.get_f32(Level::new(1, 1), "Y", 4, 1).unwrap(), 1141.0);
        assert_eq!(part.get_f32(Level::new(3, 3), "Y", 0, 0).unwrap(), 3300.0);
    }

    #[test]
    fn test_ripmap_copy_sums_levels() {
        let header = tiled_header(LevelMode::RipMap);
        assert_eq!(header.levels().len(), 12);

        let mut input = flat_input(header.clone());
        let (report, output) = copy(&mut input, header).unwrap();

        assert_eq!(report.pixel_count, (10 + 5 + 2 + 1) * (5 + 2 + 1));
        assert_eq!(report.total_tiles, Some(7 * 4));
        assert_eq!(
            output.part(0).unwrap().get_f32(Level::new(2, 0), "Y", 1, 4).unwrap(),
            2014.0
        );
    }

    fn deep_input(header: PartHeader) -> MemoryContainer {
        let mut part = MemoryPart::new(header).unwrap();
        part.fill_deep(
            |_, x, y| (x + y) as u32,
            |name, _, x, y, i| if name == "A" { 0.5 } else { (x * 10 + y) as f32 + i as f32 / 4.0 },
        )
        .unwrap();
        MemoryContainer::with_part(part)
    }

    fn deep_channels() -> Vec<Channel> {
        vec![Channel::new("A", SampleType::F16), Channel::new("Z", SampleType::F32)]
    }

    #[test]
    fn test_deep_scan_line_copy() {
        let header = PartHeader::deep_scan_line(Bounds::new(0, 0, 2, 1), deep_channels());
        let mut input = deep_input(header.clone());
        let (report, output) = copy(&mut input, header).unwrap();

        assert_eq!(report.pixel_count, 6);
        assert_eq!(report.total_samples, Some(9));
        assert_eq!(report.raw_size, 9 * 6 + 6 * 4);
        assert!(report.read_time.is_none());
        assert!(report.count_read_time.is_some());
        assert!(report.sample_read_time.is_some());

        let part = output.part(0).unwrap();
        assert_eq!(part.deep_count(Level::FULL, 2, 1).unwrap(), 3);
        assert_eq!(
            part.deep_samples_f32(Level::FULL, "Z", 2, 1).unwrap(),
            vec![21.0, 21.25, 21.5]
        );
        assert_eq!(part.deep_samples_f32(Level::FULL, "A", 1, 0).unwrap(), vec![0.5]);
        assert!(part.deep_samples_f32(Level::FULL, "Z", 0, 0).unwrap().is_empty());
    }

    #[test]
    fn test_deep_tiled_copy() {
        let tiles = TileDescription::new(2, 2);
        let header = PartHeader::deep_tiled(Bounds::new(0, 0, 2, 1), deep_channels(), tiles);
        let mut input = deep_input(header.clone());
        let (report, output) = copy(&mut input, header).unwrap();

        assert_eq!(report.total_tiles, Some(2));
        assert_eq!(report.total_samples, Some(9));
        assert_eq!(output.part(0).unwrap().deep_count(Level::FULL, 1, 1).unwrap(), 2);
    }

    #[test]
    fn test_deep_tiled_mipmap_rejected() {
        let tiles = TileDescription::new(2, 2).with_levels(LevelMode::MipMap, RoundingMode::Down);
        let header = PartHeader::deep_tiled(Bounds::new(0, 0, 3, 3), deep_channels(), tiles);
        let mut input = deep_input(header.clone());

        let err = copy(&mut input, header).unwrap_err();
        assert!(err.is_capability_error());
    }

    #[test]
    fn test_strategy_must_match_kind() {
        let header = PartHeader::scan_line(
            Bounds::new(0, 0, 3, 3),
            vec![Channel::new("Y", SampleType::F32)],
        );
        let mut input = flat_input(header.clone());
        let mut output = MemoryContainer::new();
        let mut reader = input.open_part(0).unwrap();
        let mut writer = output.create_part(header).unwrap();

        let err = copy_tiled(reader.as_mut(), writer.as_mut()).unwrap_err();
        assert!(matches!(err, Error::UnsupportedMode(_)));
        assert!(copy_scan_line(reader.as_mut(), writer.as_mut()).is_ok());
    }

    #[test]
    fn test_output_window_must_match() {
        let header = PartHeader::scan_line(
            Bounds::new(0, 0, 3, 3),
            vec![Channel::new("Y", SampleType::F32)],
        );
        let mut input = flat_input(header.clone());
        let mut other = header;
        other.data_window = Bounds::new(0, 0, 4, 3);

        let err = copy(&mut input, other).unwrap_err();
        assert!(matches!(err, Error::LayoutMismatch(_)));
    }
}
