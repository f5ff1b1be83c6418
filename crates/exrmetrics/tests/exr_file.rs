//! Round trips through real OpenEXR files.

use approx::assert_abs_diff_eq;
use exrmetrics::prelude::*;
use tempfile::TempDir;

fn flat_channels() -> Vec<Channel> {
    vec![
        Channel::new("B", SampleType::F16),
        Channel::new("G", SampleType::F32),
        Channel::new("R", SampleType::F32),
        Channel::new("id", SampleType::U32),
    ]
}

fn value(name: &str, level: Level, x: i32, y: i32) -> f32 {
    let base = (level.x * 1000 + level.y * 100 + x * 10 + y) as f32;
    match name {
        "id" => base.abs(),
        "B" => base / 4.0,
        "G" => base + 0.125,
        _ => base / 7.0,
    }
}

fn memory_input(header: PartHeader) -> MemoryContainer {
    let mut part = MemoryPart::new(header).expect("memory part");
    part.fill(value).expect("fill");
    MemoryContainer::with_part(part)
}

/// Writes `input` part 0 to `path` and reads it back into memory.
fn round_trip(input: &mut MemoryContainer, options: &MetricsOptions, path: &std::path::Path) -> MemoryContainer {
    let mut file = ExrOutputFile::create(path);
    run_metrics(input, &mut file, options).expect("write exr");

    let mut exr = ExrInputFile::open(path).expect("open exr");
    let mut output = MemoryContainer::new();
    run_metrics(&mut exr, &mut output, &MetricsOptions::new()).expect("read exr");
    output
}

fn assert_same_pixels(expected: &MemoryPart, actual: &MemoryPart) {
    for level in expected.header().levels() {
        let window = expected.header().level_data_window(level).unwrap();
        for channel in &expected.header().channels {
            for y in window.min_y..=window.max_y {
                for x in window.min_x..=window.max_x {
                    assert_eq!(
                        actual.get_f32(level, &channel.name, x, y).unwrap(),
                        expected.get_f32(level, &channel.name, x, y).unwrap(),
                        "{} at ({x}, {y}) on level {level}",
                        channel.name
                    );
                }
            }
        }
    }
}

#[test]
fn scan_line_round_trip_uncompressed() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("scanline.exr");
    let header = PartHeader::scan_line(Bounds::new(2, -1, 9, 4), flat_channels());
    let mut input = memory_input(header.clone());

    let output = round_trip(&mut input, &MetricsOptions::new(), &path);

    let read = ExrInputFile::open(&path).unwrap();
    let read_header = read.part_header(0).unwrap();
    assert_eq!(read_header.kind, PartKind::ScanLine);
    assert_eq!(read_header.data_window, header.data_window);
    assert_eq!(read_header.channels, header.channels);
    assert_eq!(read_header.compression, Compression::None);

    assert_same_pixels(input.part(0).unwrap(), output.part(0).unwrap());
}

#[test]
fn scan_line_round_trip_lossless_compressions() {
    let dir = TempDir::new().unwrap();
    let header = PartHeader::scan_line(Bounds::new(0, 0, 40, 37), flat_channels());
    let mut input = memory_input(header);

    for compression in [Compression::Rle, Compression::Zips, Compression::Zip, Compression::Piz] {
        let path = dir.path().join(format!("{compression}.exr"));
        let options = MetricsOptions::new().with_compression(compression);
        let output = round_trip(&mut input, &options, &path);

        let read = ExrInputFile::open(&path).unwrap();
        assert_eq!(read.part_header(0).unwrap().compression, compression);
        assert_same_pixels(input.part(0).unwrap(), output.part(0).unwrap());
    }
}

/// The last chunk holds fewer lines than the compression groups together.
#[test]
fn scan_line_partial_last_chunk() {
    let dir = TempDir::new().unwrap();
    // 41x38: 38 = 2 * 16 + 6 = 32 + 6
    let header = PartHeader::scan_line(Bounds::new(-3, 5, 37, 42), flat_channels());
    let mut input = memory_input(header.clone());

    for compression in [Compression::Zip, Compression::Piz] {
        let path = dir.path().join(format!("partial-{compression}.exr"));
        let options = MetricsOptions::new().with_compression(compression);
        let output = round_trip(&mut input, &options, &path);

        let read = ExrInputFile::open(&path).unwrap();
        assert_eq!(read.part_header(0).unwrap().data_window, header.data_window);
        assert_same_pixels(input.part(0).unwrap(), output.part(0).unwrap());
    }
}

/// Edge tiles are clipped to the data window.
#[test]
fn tiled_partial_edge_tiles() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tiled.exr");
    let header = PartHeader::tiled(Bounds::new(0, 0, 19, 9), flat_channels(), TileDescription::new(8, 8));
    let mut input = memory_input(header);

    let mut file = ExrOutputFile::create(&path);
    let report = run_metrics(&mut input, &mut file, &MetricsOptions::new()).unwrap();
    assert_eq!(report.copy.pixel_count, 200);
    assert_eq!(report.copy.total_tiles, Some(3 * 2));

    let mut exr = ExrInputFile::open(&path).unwrap();
    let mut output = MemoryContainer::new();
    run_metrics(&mut exr, &mut output, &MetricsOptions::new()).unwrap();
    assert_same_pixels(input.part(0).unwrap(), output.part(0).unwrap());
}

#[test]
fn mipmap_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("mipmap.exr");
    let tiles = TileDescription::new(8, 8).with_levels(LevelMode::MipMap, RoundingMode::Down);
    let header = PartHeader::tiled(Bounds::new(0, 0, 19, 9), flat_channels(), tiles);
    let mut input = memory_input(header);

    let options = MetricsOptions::new().with_compression(Compression::Zip);
    let mut file = ExrOutputFile::create(&path);
    let report = run_metrics(&mut input, &mut file, &options).unwrap();
    assert_eq!(report.part_type, PartKind::Tiled);
    assert_eq!(report.scanlines_per_chunk, None);
    // 20x10, 10x5, 5x2, 2x1, 1x1
    assert_eq!(report.copy.pixel_count, 200 + 50 + 10 + 2 + 1);
    assert_eq!(report.copy.total_tiles, Some(6 + 2 + 1 + 1 + 1));

    let mut exr = ExrInputFile::open(&path).unwrap();
    let read_header = exr.part_header(0).unwrap().clone();
    assert_eq!(read_header.tiles, Some(tiles));
    assert_eq!(read_header.levels().len(), 5);

    let mut output = MemoryContainer::new();
    run_metrics(&mut exr, &mut output, &MetricsOptions::new()).unwrap();
    assert_same_pixels(input.part(0).unwrap(), output.part(0).unwrap());
}

#[test]
fn half_conversion_applies_to_rgba_only() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("half.exr");
    let header = PartHeader::scan_line(Bounds::new(0, 0, 15, 7), flat_channels());
    let mut input = memory_input(header);

    let options = MetricsOptions::new().with_half(HalfMode::Rgba);
    let output = round_trip(&mut input, &options, &path);

    let read = ExrInputFile::open(&path).unwrap();
    let types: Vec<_> = read
        .part_header(0)
        .unwrap()
        .channels
        .iter()
        .map(|c| c.sample_type)
        .collect();
    assert_eq!(types, [SampleType::F16, SampleType::F16, SampleType::F16, SampleType::U32]);

    let (expected, actual) = (input.part(0).unwrap(), output.part(0).unwrap());
    for y in 0..8 {
        for x in 0..16 {
            let r = expected.get_f32(Level::FULL, "R", x, y).unwrap();
            assert_abs_diff_eq!(actual.get_f32(Level::FULL, "R", x, y).unwrap(), r, epsilon = 0.02);
            assert_eq!(
                actual.get_f32(Level::FULL, "id", x, y).unwrap(),
                expected.get_f32(Level::FULL, "id", x, y).unwrap()
            );
        }
    }
}

#[test]
fn incompatible_level_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("rle.exr");
    let header = PartHeader::scan_line(Bounds::new(0, 0, 3, 3), flat_channels());
    let mut input = memory_input(header);

    let options = MetricsOptions::new().with_compression(Compression::Rle).with_level(5.0);
    let mut file = ExrOutputFile::create(&path);
    let err = run_metrics(&mut input, &mut file, &options).unwrap_err();

    assert!(matches!(err, Error::IncompatibleOption(_)));
    assert!(!path.exists());
}

#[test]
fn deep_parts_are_refused_by_the_exr_codec() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("deep.exr");
    let header = PartHeader::deep_scan_line(
        Bounds::new(0, 0, 3, 3),
        vec![Channel::new("Z", SampleType::F32)],
    );
    let mut input = MemoryContainer::with_part(MemoryPart::new(header).unwrap());

    let mut file = ExrOutputFile::create(&path);
    let err = run_metrics(&mut input, &mut file, &MetricsOptions::new()).unwrap_err();

    assert!(err.is_capability_error());
    assert!(!path.exists());
}

#[test]
fn missing_part_is_reported() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("single.exr");
    let header = PartHeader::scan_line(Bounds::new(0, 0, 3, 3), flat_channels());
    let mut input = memory_input(header);
    round_trip(&mut input, &MetricsOptions::new(), &path);

    let mut exr = ExrInputFile::open(&path).unwrap();
    let mut output = MemoryContainer::new();
    let err = run_metrics(&mut exr, &mut output, &MetricsOptions::new().with_part(3)).unwrap_err();

    assert!(matches!(err, Error::InvalidArgument(_)));
    assert!(err.to_string().contains("only contains 1 parts. Cannot copy part 3"));
    assert!(output.parts().is_empty());
}
