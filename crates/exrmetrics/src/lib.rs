//! # exrmetrics
//!
//! Measures how long OpenEXR parts take to decode and re-encode.
//!
//! The engine copies one part of an input file into a new output part,
//! optionally switching compression, compression level and channel
//! precision, and reports wall-clock time per phase together with pixel,
//! tile, sample and byte counts:
//!
//! - [`geometry`] - Data windows, resolution levels and tile grids
//! - [`header`] - Channels, part kinds and part headers
//! - [`compression`] - The compression table
//! - [`layout`], [`deep`] - Frame buffers for flat and deep data
//! - [`part`] - The reader/writer seam between engine and codec
//! - [`engine`] - The copy routine for all four part kinds
//! - [`metrics`] - Part selection, output preparation and reporting
//! - [`container`] - OpenEXR file and in-memory backends
//!
//! ## Example
//!
//! ```
//! use exrmetrics::prelude::*;
//!
//! let header = PartHeader::scan_line(
//!     Bounds::new(0, 0, 63, 31),
//!     vec![Channel::new("Y", SampleType::F32)],
//! );
//! let mut input = MemoryContainer::with_part(MemoryPart::new(header)?);
//! let mut output = MemoryContainer::new();
//!
//! let options = MetricsOptions::new().with_half(HalfMode::All);
//! let report = run_metrics(&mut input, &mut output, &options)?;
//!
//! assert_eq!(report.copy.pixel_count, 64 * 32);
//! assert_eq!(report.copy.raw_size, 64 * 32 * 2);
//! # Ok::<(), exrmetrics::Error>(())
//! ```
//!
//! ## Crate Structure
//!
//! ```text
//! exrmetrics (this crate)
//!    ^
//!    +-- exrmetrics-cli (the `exrmetrics` binary)
//!    +-- exrmetrics-bench (criterion benchmarks)
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod compression;
pub mod container;
pub mod deep;
pub mod engine;
pub mod error;
pub mod geometry;
pub mod header;
pub mod layout;
pub mod metrics;
pub mod options;
pub mod part;
pub mod report;
pub mod timing;

pub use compression::Compression;
pub use error::{Error, Result};
pub use metrics::run_metrics;
pub use options::{prepare_output_header, HalfMode, MetricsOptions};
pub use report::{CopyReport, MetricsReport};

/// Prelude module for convenient imports.
///
/// # Usage
///
/// ```
/// use exrmetrics::prelude::*;
/// ```
pub mod prelude {
    pub use crate::compression::Compression;
    pub use crate::container::{ExrInputFile, ExrOutputFile, MemoryContainer, MemoryPart};
    pub use crate::deep::{DeepFrameBuffer, SampleCounts, SampleSpan};
    pub use crate::engine::{copy_part, CopyStrategy};
    pub use crate::error::{Error, Result};
    pub use crate::geometry::{Bounds, Level, LevelMode, RoundingMode, TileDescription};
    pub use crate::header::{Channel, PartHeader, PartKind, SampleType};
    pub use crate::layout::FrameBuffer;
    pub use crate::metrics::run_metrics;
    pub use crate::options::{HalfMode, MetricsOptions};
    pub use crate::part::{InputContainer, OutputContainer, PartReader, PartWriter, Region};
    pub use crate::report::{CopyReport, MetricsReport};
    pub use crate::timing::{Phase, TimingRecorder};
}
