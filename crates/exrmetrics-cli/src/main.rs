//! exrmetrics - OpenEXR read/write performance metrics
//!
//! Copies one part of an EXR file into a new file and prints the time spent
//! reading and writing it, together with pixel counts and file sizes, as JSON.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{debug, info};

use exrmetrics::container::{ExrInputFile, ExrOutputFile};
use exrmetrics::{run_metrics, Compression, HalfMode, MetricsOptions, MetricsReport};

#[derive(Parser)]
#[command(name = "exrmetrics")]
#[command(author, version, about = "Read an OpenEXR image, write it back, and report timings")]
#[command(long_about = "
Reads one part of an OpenEXR image and writes it to a new file, optionally
with another compression or channel precision. Timings and sizes are printed
to stdout as JSON; log output goes to stderr.

Examples:
  exrmetrics in.exr out.exr                  # Copy part 0 as is
  exrmetrics in.exr out.exr -z piz           # Re-encode with piz
  exrmetrics in.exr out.exr -z dwaa -l 90    # DWA with quality 90
  exrmetrics in.exr out.exr --half rgba      # R, G, B, A to half
  exrmetrics --list-compressions
")]
struct Cli {
    /// Input image
    #[arg(required_unless_present = "list_compressions")]
    input: Option<PathBuf>,

    /// Output image
    #[arg(required_unless_present = "list_compressions")]
    output: Option<PathBuf>,

    /// Part to copy
    #[arg(short, long, default_value = "0")]
    part: usize,

    /// Output compression (see --list-compressions)
    #[arg(short = 'z', long)]
    compression: Option<Compression>,

    /// Compression level, for zip, zips, dwaa and dwab only
    #[arg(short, long, allow_negative_numbers = true)]
    level: Option<f32>,

    /// Convert channels to half: rgba, all
    #[arg(long, value_name = "MODE")]
    half: Option<HalfMode>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// List available compression methods and exit
    #[arg(long)]
    list_compressions: bool,
}

impl Cli {
    fn options(&self) -> MetricsOptions {
        let mut options = MetricsOptions::new().with_part(self.part);
        if let Some(compression) = self.compression {
            options = options.with_compression(compression);
        }
        if let Some(level) = self.level {
            options = options.with_level(level);
        }
        if let Some(half) = self.half {
            options = options.with_half(half);
        }
        options
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "exrmetrics=debug" } else { "exrmetrics=warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn file_size(path: &Path) -> Result<u64> {
    let metadata = fs::metadata(path)
        .with_context(|| format!("Failed to stat {}", path.display()))?;
    Ok(metadata.len())
}

/// Copies the requested part and attaches file sizes to the report.
fn measure(input: &Path, output: &Path, options: &MetricsOptions) -> Result<MetricsReport> {
    if input == output {
        bail!("input and output must be different files: {}", input.display());
    }

    let mut source = ExrInputFile::open(input)
        .with_context(|| format!("Failed to open {}", input.display()))?;
    let mut target = ExrOutputFile::create(output).with_attributes(source.attributes(options.part));

    let report = run_metrics(&mut source, &mut target, options)
        .with_context(|| format!("Failed to copy {} to {}", input.display(), output.display()))?;
    debug!(report = ?report, "copy finished");

    Ok(report.with_file_sizes(Some(file_size(input)?), Some(file_size(output)?)))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if cli.list_compressions {
        println!("{}", Compression::descriptions());
        return Ok(());
    }

    let (Some(input), Some(output)) = (&cli.input, &cli.output) else {
        bail!("input and output files are required");
    };

    let options = cli.options();
    info!(input = %input.display(), output = %output.display(), "exrmetrics");
    let report = measure(input, output, &options)?;

    let json = serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
    println!("{json}");
    Ok(())
}
