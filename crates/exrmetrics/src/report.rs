//! Copy statistics.
//!
//! Field names in the serialized form are the keys printed by the
//! `exrmetrics` tool, e.g. `"read time"` or `"raw size"`.

use serde::Serialize;

use crate::compression::Compression;
use crate::header::{PartHeader, PartKind};
use crate::timing::{Phase, TimingRecorder, TimingSample};

/// Volume of data moved by one copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CopyTally {
    /// Pixels summed over all levels.
    pub pixels: u64,
    /// Tiles summed over all levels, for tiled parts.
    pub tiles: Option<u64>,
    /// Deep samples per channel summed over all levels, for deep parts.
    pub samples: Option<u64>,
    /// Bytes of frame buffer storage summed over all levels.
    pub raw_size: u64,
}

/// Result of copying one part.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CopyReport {
    /// Flat read time in seconds.
    #[serde(rename = "read time", skip_serializing_if = "Option::is_none")]
    pub read_time: Option<f64>,

    /// Deep sample-count read time in seconds.
    #[serde(rename = "count read time", skip_serializing_if = "Option::is_none")]
    pub count_read_time: Option<f64>,

    /// Deep sample read time in seconds.
    #[serde(rename = "sample read time", skip_serializing_if = "Option::is_none")]
    pub sample_read_time: Option<f64>,

    /// Write time in seconds, including the final flush.
    #[serde(rename = "write time")]
    pub write_time: f64,

    /// Tiles copied, for tiled parts.
    #[serde(rename = "total tiles", skip_serializing_if = "Option::is_none")]
    pub total_tiles: Option<u64>,

    /// Pixels copied over all levels.
    #[serde(rename = "pixel count")]
    pub pixel_count: u64,

    /// Deep samples per channel, for deep parts.
    #[serde(rename = "total samples", skip_serializing_if = "Option::is_none")]
    pub total_samples: Option<u64>,

    /// Uncompressed bytes moved.
    #[serde(rename = "raw size")]
    pub raw_size: u64,

    /// Individual measurements behind the totals.
    #[serde(skip)]
    pub timings: Vec<TimingSample>,
}

impl CopyReport {
    /// Summarizes `timer` and `tally`.
    ///
    /// A read phase appears in the report only if at least one call of it
    /// was timed.
    pub fn new(tally: CopyTally, timer: TimingRecorder) -> Self {
        let phase = |p: Phase| timer.has(p).then(|| timer.seconds(p));
        Self {
            read_time: phase(Phase::Read),
            count_read_time: phase(Phase::CountRead),
            sample_read_time: phase(Phase::SampleRead),
            write_time: timer.seconds(Phase::Write),
            total_tiles: tally.tiles,
            pixel_count: tally.pixels,
            total_samples: tally.samples,
            raw_size: tally.raw_size,
            timings: timer.into_samples(),
        }
    }
}

/// Everything `exrmetrics` reports about one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsReport {
    /// Compression of the input part.
    #[serde(rename = "input compression")]
    pub input_compression: Compression,

    /// Compression of the output part.
    #[serde(rename = "output compression")]
    pub output_compression: Compression,

    /// Zip level of the output, for zip compressions.
    #[serde(rename = "zipCompressionLevel", skip_serializing_if = "Option::is_none")]
    pub zip_level: Option<f32>,

    /// DWA quality of the output, for DWA compressions.
    #[serde(rename = "dwaCompressionLevel", skip_serializing_if = "Option::is_none")]
    pub dwa_level: Option<f32>,

    /// Kind of the copied part.
    #[serde(rename = "part type")]
    pub part_type: PartKind,

    /// Scan lines per chunk of the output, for scan line parts.
    #[serde(rename = "scanlines per chunk", skip_serializing_if = "Option::is_none")]
    pub scanlines_per_chunk: Option<usize>,

    /// Copy statistics.
    #[serde(flatten)]
    pub copy: CopyReport,

    /// Input file size in bytes, filled in by callers that know it.
    #[serde(rename = "input file size", skip_serializing_if = "Option::is_none")]
    pub input_file_size: Option<u64>,

    /// Output file size in bytes, filled in by callers that know it.
    #[serde(rename = "output file size", skip_serializing_if = "Option::is_none")]
    pub output_file_size: Option<u64>,
}

impl MetricsReport {
    /// Combines the part headers with the copy statistics.
    pub fn new(input: &PartHeader, output: &PartHeader, copy: CopyReport) -> Self {
        let out = output.compression;
        let level = output.compression_level.or(out.default_level());
        Self {
            input_compression: input.compression,
            output_compression: out,
            zip_level: if out.is_zip() { level } else { None },
            dwa_level: if out.is_dwa() { level } else { None },
            part_type: output.kind,
            scanlines_per_chunk: (!output.kind.is_tiled()).then(|| out.scanlines_per_chunk()),
            copy,
            input_file_size: None,
            output_file_size: None,
        }
    }

    /// Sets the file sizes.
    pub fn with_file_sizes(mut self, input: Option<u64>, output: Option<u64>) -> Self {
        self.input_file_size = input;
        self.output_file_size = output;
        self
    }
}
