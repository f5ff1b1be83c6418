//! Run options and output header preparation.

use std::fmt;
use std::str::FromStr;

use tracing::debug;

use crate::compression::Compression;
use crate::error::{Error, Result};
use crate::header::{PartHeader, SampleType};

/// Which channels are stored as 16-bit floats in the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HalfMode {
    /// Keep every channel's type.
    #[default]
    Off,
    /// Convert channels named exactly `R`, `G`, `B` or `A`.
    Rgba,
    /// Convert every channel.
    All,
}

impl HalfMode {
    /// Returns `true` if the channel called `name` becomes half.
    pub fn applies_to(self, name: &str) -> bool {
        match self {
            Self::Off => false,
            Self::Rgba => matches!(name, "R" | "G" | "B" | "A"),
            Self::All => true,
        }
    }
}

impl fmt::Display for HalfMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Off => "off",
            Self::Rgba => "rgba",
            Self::All => "all",
        })
    }
}

impl FromStr for HalfMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "off" | "none" => Ok(Self::Off),
            "rgba" => Ok(Self::Rgba),
            "all" => Ok(Self::All),
            other => Err(Error::invalid_argument(format!(
                "unknown half mode '{other}', expected rgba or all"
            ))),
        }
    }
}

/// What to copy and how to re-encode it.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MetricsOptions {
    /// Index of the part to copy.
    pub part: usize,
    /// Output compression; `None` keeps the input's.
    pub compression: Option<Compression>,
    /// Zip level or DWA quality override.
    ///
    /// A level is never silently ignored: one given for a method without
    /// levels fails with [`Error::IncompatibleOption`], checked first, and a
    /// non-finite level or one below -1 fails with
    /// [`Error::InvalidArgument`] instead of meaning "no override".
    pub level: Option<f32>,
    /// Channels converted to half.
    pub half: HalfMode,
}

impl MetricsOptions {
    /// Copies part 0 unchanged.
    pub fn new() -> Self {
        Self::default()
    }

    /// Selects the part to copy.
    pub fn with_part(mut self, part: usize) -> Self {
        self.part = part;
        self
    }

    /// Overrides the output compression.
    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = Some(compression);
        self
    }

    /// Overrides the zip level or DWA quality.
    pub fn with_level(mut self, level: f32) -> Self {
        self.level = Some(level);
        self
    }

    /// Selects channels to convert to half.
    pub fn with_half(mut self, half: HalfMode) -> Self {
        self.half = half;
        self
    }
}

/// Derives the output header from the input header and `options`.
///
/// Fails with [`Error::IncompatibleOption`] when a level is requested for a
/// compression that takes none, and with [`Error::InvalidArgument`] for a
/// level that is not finite or below -1.
pub fn prepare_output_header(input: &PartHeader, options: &MetricsOptions) -> Result<PartHeader> {
    let mut output = input.clone();

    if let Some(compression) = options.compression {
        output.compression = compression;
    }

    if let Some(level) = options.level {
        if !output.compression.takes_level() {
            return Err(Error::incompatible_option(format!(
                "a compression level only works for zip/zips or dwaa/dwab compression, not {}",
                output.compression
            )));
        }
        if !level.is_finite() || level < -1.0 {
            return Err(Error::invalid_argument(format!(
                "compression level {level} must be -1 or above"
            )));
        }
        output.compression_level = Some(level);
    } else if output.compression != input.compression {
        // the input's level belongs to the input's method
        output.compression_level = None;
    }

    for channel in &mut output.channels {
        if options.half.applies_to(&channel.name) {
            channel.sample_type = SampleType::F16;
        }
    }

    if output.kind.is_deep() && !output.compression.supports_deep() {
        return Err(Error::incompatible_option(format!(
            "{} compression cannot encode deep parts, use none, rle or zips",
            output.compression
        )));
    }

    debug!(
        compression = %output.compression,
        level = ?output.compression_level,
        half = %options.half,
        "output header prepared"
    );
    Ok(output)
}
