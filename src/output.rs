use std::io::{self, Write};

use crate::aggregator::Histogram;
use crate::config::Format;
use crate::error::{Error, Result};
use crate::speedscope::SpeedscopeFile;

/// Writes `<signature>\t<count>` for every distinct stack.
///
/// Lines come out in whatever order the histogram iterates in.
pub fn write_collapsed<W: Write>(histogram: &Histogram, out: &mut W) -> io::Result<()> {
    for (signature, count) in histogram.iter() {
        writeln!(out, "{}\t{}", signature, count)?;
    }
    Ok(())
}

pub fn write_json<W: Write>(histogram: &Histogram, out: &mut W) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut *out, histogram)?;
    writeln!(out)
}

pub fn write_speedscope<W: Write>(histogram: &Histogram, name: &str, out: &mut W) -> io::Result<()> {
    serde_json::to_writer(&mut *out, &SpeedscopeFile::from_histogram(histogram, name))?;
    writeln!(out)
}

/// Writes the histogram in `format` and flushes. `name` labels formats that carry one.
pub fn write_report<W: Write>(
    histogram: &Histogram,
    format: Format,
    name: &str,
    out: &mut W,
) -> Result<()> {
    let written = match format {
        Format::Collapsed => write_collapsed(histogram, out),
        Format::Json => write_json(histogram, out),
        Format::Speedscope => write_speedscope(histogram, name, out),
    };
    written
        .and_then(|()| out.flush())
        .map_err(Error::ReportWrite)
}
