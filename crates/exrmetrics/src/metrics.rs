//! Top-level measurement run: select a part, prepare the output, copy it.

use tracing::{info, trace};

use crate::engine::{copy_with_strategy, CopyStrategy};
use crate::error::Result;
use crate::options::{prepare_output_header, MetricsOptions};
use crate::part::{part_out_of_range, InputContainer, OutputContainer};
use crate::report::MetricsReport;

/// Copies part `options.part` of `input` into a new part of `output`.
///
/// Option and capability checks run before the output part is created, so a
/// rejected run leaves `output` untouched.
pub fn run_metrics(
    input: &mut dyn InputContainer,
    output: &mut dyn OutputContainer,
    options: &MetricsOptions,
) -> Result<MetricsReport> {
    trace!(part = options.part, "run_metrics");

    let count = input.part_count();
    if options.part >= count {
        return Err(part_out_of_range("input", count, options.part));
    }

    let in_header = input.part_header(options.part)?.clone();
    let out_header = prepare_output_header(&in_header, options)?;
    let strategy = CopyStrategy::for_kind(in_header.kind);
    strategy.validate(&in_header)?;

    info!(
        part = options.part,
        kind = %in_header.kind,
        window = %in_header.data_window,
        input_compression = %in_header.compression,
        output_compression = %out_header.compression,
        "copying part"
    );

    let mut reader = input.open_part(options.part)?;
    let mut writer = output.create_part(out_header.clone())?;
    let copy = copy_with_strategy(strategy, reader.as_mut(), writer.as_mut())?;

    Ok(MetricsReport::new(&in_header, &out_header, copy))
}
