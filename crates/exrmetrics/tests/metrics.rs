//! End-to-end runs over in-memory containers and the report they produce.

use approx::assert_relative_eq;
use exrmetrics::prelude::*;
use serde_json::Value;

fn rgba() -> Vec<Channel> {
    ["A", "B", "G", "R"]
        .into_iter()
        .map(|name| Channel::new(name, SampleType::F32))
        .collect()
}

fn report_json(report: &MetricsReport) -> Value {
    serde_json::to_value(report).expect("serialize report")
}

/// Scan line report carries chunk height and no tile or sample counts.
#[test]
fn scan_line_report_keys() {
    let header = PartHeader::scan_line(Bounds::new(0, 0, 99, 49), rgba())
        .with_compression(Compression::Piz);
    let mut input = MemoryContainer::with_part(MemoryPart::new(header).unwrap());
    let mut output = MemoryContainer::new();

    let options = MetricsOptions::new().with_compression(Compression::Zip);
    let report = run_metrics(&mut input, &mut output, &options).unwrap();
    let json = report_json(&report);

    assert_eq!(json["input compression"], "piz");
    assert_eq!(json["output compression"], "zip");
    assert_eq!(json["zipCompressionLevel"], 4.0);
    assert!(json.get("dwaCompressionLevel").is_none());
    assert_eq!(json["part type"], "scanlineimage");
    assert_eq!(json["scanlines per chunk"], 16);
    assert_eq!(json["pixel count"], 5000);
    assert_eq!(json["raw size"], 5000 * 16);
    assert!(json["read time"].as_f64().unwrap() >= 0.0);
    assert!(json["write time"].as_f64().unwrap() >= 0.0);
    for absent in ["total tiles", "total samples", "count read time", "sample read time"] {
        assert!(json.get(absent).is_none(), "{absent} should be absent");
    }

    let copied = output.part(0).unwrap();
    assert!(copied.is_complete());
    assert_eq!(copied.header().compression, Compression::Zip);
}

/// A DWA level given on the command line shows up in the report.
#[test]
fn dwa_level_is_reported() {
    let header = PartHeader::scan_line(Bounds::new(0, 0, 7, 7), rgba());
    let mut input = MemoryContainer::with_part(MemoryPart::new(header).unwrap());
    let mut output = MemoryContainer::new();

    let options = MetricsOptions::new()
        .with_compression(Compression::Dwab)
        .with_level(80.0);
    let report = run_metrics(&mut input, &mut output, &options).unwrap();

    assert_eq!(report.dwa_level, Some(80.0));
    assert_eq!(report.zip_level, None);
    assert_eq!(report.scanlines_per_chunk, Some(256));
    assert_eq!(output.part(0).unwrap().header().compression_level, Some(80.0));
}

/// Ripmap copies visit every level and carry values across.
#[test]
fn ripmap_copy_visits_every_level() {
    let tiles = TileDescription::new(4, 4).with_levels(LevelMode::RipMap, RoundingMode::Up);
    let header = PartHeader::tiled(Bounds::new(0, 0, 8, 4), rgba(), tiles);
    let mut part = MemoryPart::new(header).unwrap();
    part.fill(|name, level, x, y| (level.x * 100 + level.y * 10 + x + y) as f32 + name.len() as f32)
        .unwrap();
    let mut input = MemoryContainer::with_part(part);
    let mut output = MemoryContainer::new();

    let report = run_metrics(&mut input, &mut output, &MetricsOptions::new()).unwrap();

    // x: 9, 5, 3, 2, 1; y: 5, 3, 2, 1
    let xs = [9u64, 5, 3, 2, 1];
    let ys = [5u64, 3, 2, 1];
    let pixels: u64 = xs.iter().flat_map(|x| ys.iter().map(move |y| x * y)).sum();
    let tiles: u64 = xs
        .iter()
        .flat_map(|x| ys.iter().map(move |y| x.div_ceil(4) * y.div_ceil(4)))
        .sum();
    assert_eq!(report.copy.pixel_count, pixels);
    assert_eq!(report.copy.total_tiles, Some(tiles));
    assert_eq!(report.copy.raw_size, pixels * 16);

    let (source, copied) = (input.part(0).unwrap(), output.part(0).unwrap());
    for level in source.header().levels() {
        let window = source.header().level_data_window(level).unwrap();
        let (x, y) = (window.max_x, window.max_y);
        assert_eq!(
            copied.get_f32(level, "R", x, y).unwrap(),
            source.get_f32(level, "R", x, y).unwrap()
        );
    }
}

/// Deep scan line copies report count and sample read times.
#[test]
fn deep_scan_line_report() {
    let channels = vec![
        Channel::new("A", SampleType::F16),
        Channel::new("Z", SampleType::F32),
    ];
    let header = PartHeader::deep_scan_line(Bounds::new(-1, -1, 2, 1), channels)
        .with_compression(Compression::Zips);
    let mut part = MemoryPart::new(header).unwrap();
    part.fill_deep(
        |_, x, y| ((x + 1) + (y + 1)) as u32,
        |name, _, x, _, i| if name == "Z" { i as f32 + x as f32 * 0.5 } else { 0.5 },
    )
    .unwrap();
    let mut input = MemoryContainer::with_part(part);
    let mut output = MemoryContainer::new();

    let report = run_metrics(&mut input, &mut output, &MetricsOptions::new()).unwrap();
    let json = report_json(&report);

    // Counts per row: y=-1: 0,1,2,3  y=0: 1,2,3,4  y=1: 2,3,4,5
    let samples = 6 + 10 + 14;
    assert_eq!(report.copy.total_samples, Some(samples));
    assert_eq!(report.copy.pixel_count, 12);
    assert_eq!(report.copy.raw_size, samples * 6 + 12 * 4);
    assert!(json.get("read time").is_none());
    assert!(json["count read time"].is_number());
    assert!(json["sample read time"].is_number());
    assert_eq!(json["part type"], "deepscanline");

    let copied = output.part(0).unwrap();
    assert_eq!(copied.deep_count(Level::FULL, 2, 1).unwrap(), 5);
    let z = copied.deep_samples_f32(Level::FULL, "Z", 2, 1).unwrap();
    assert_eq!(z, [1.0, 2.0, 3.0, 4.0, 5.0]);
}

/// Half conversion of every channel halves the raw size and keeps values
/// close.
#[test]
fn half_all_converts_every_channel() {
    let mut channels = rgba();
    channels.push(Channel::new("depth", SampleType::F32));
    let header = PartHeader::scan_line(Bounds::new(0, 0, 9, 9), channels);
    let mut part = MemoryPart::new(header).unwrap();
    part.fill(|_, _, x, y| 0.1 + x as f32 * 0.37 + y as f32 * 1.3).unwrap();
    let mut input = MemoryContainer::with_part(part);
    let mut output = MemoryContainer::new();

    let options = MetricsOptions::new().with_half(HalfMode::All);
    let report = run_metrics(&mut input, &mut output, &options).unwrap();
    assert_eq!(report.copy.raw_size, 100 * 5 * 2);

    let copied = output.part(0).unwrap();
    assert!(copied.header().channels.iter().all(|c| c.sample_type == SampleType::F16));
    let source = input.part(0).unwrap();
    for (x, y) in [(0, 0), (4, 7), (9, 9)] {
        assert_relative_eq!(
            copied.get_f32(Level::FULL, "depth", x, y).unwrap(),
            source.get_f32(Level::FULL, "depth", x, y).unwrap(),
            max_relative = 1e-3
        );
    }
}

/// Rejected options leave the output container without a part.
#[test]
fn rejected_options_leave_output_empty() {
    let header = PartHeader::scan_line(Bounds::new(0, 0, 3, 3), rgba());
    let mut input = MemoryContainer::with_part(MemoryPart::new(header).unwrap());
    let mut output = MemoryContainer::new();

    let piz_level = MetricsOptions::new().with_compression(Compression::Piz).with_level(3.0);
    let err = run_metrics(&mut input, &mut output, &piz_level).unwrap_err();
    assert!(err.is_argument_error());

    let bad_part = MetricsOptions::new().with_part(1);
    let err = run_metrics(&mut input, &mut output, &bad_part).unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));
    assert!(err.to_string().ends_with("input only contains 1 parts. Cannot copy part 1"));

    assert!(output.parts().is_empty());
}

/// Multi-resolution deep tiled parts fail before any output part exists.
#[test]
fn deep_tiled_levels_are_unsupported() {
    for mode in [LevelMode::MipMap, LevelMode::RipMap] {
        let tiles = TileDescription::new(4, 4).with_levels(mode, RoundingMode::Down);
        let header = PartHeader::deep_tiled(
            Bounds::new(0, 0, 7, 7),
            vec![Channel::new("Z", SampleType::F32)],
            tiles,
        );
        let mut input = MemoryContainer::with_part(MemoryPart::new(header).unwrap());
        let mut output = MemoryContainer::new();

        let err = run_metrics(&mut input, &mut output, &MetricsOptions::new()).unwrap_err();
        assert!(matches!(err, Error::UnsupportedMode(_)), "{mode:?}: {err}");
        assert!(err.to_string().contains(mode.name()));
        assert!(output.parts().is_empty());
    }
}
