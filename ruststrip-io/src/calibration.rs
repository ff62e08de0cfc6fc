//! Plain-text strip delay tables.
//!
//! The format is one aligned row per strip under a `#` header, the side
//! written as `0` (X) or `1` (Y). Reading splits on whitespace, so the
//! column widths are cosmetic.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use ruststrip_core::{Side, StripDelayTable, StripId};

use crate::error::{Error, Result};

const HEADER: &str = "# Module Row Column Layer  Side  Strip  Offset";

/// Writes a delay table as aligned text columns.
///
/// # Errors
/// Returns an error when the file cannot be created or written.
pub fn store_delay_table<P: AsRef<Path>>(path: P, table: &StripDelayTable) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    writeln!(writer, "{HEADER}")?;
    for (strip, delay) in table.iter() {
        writeln!(
            writer,
            "{:>8}{:>4}{:>7}{:>6}{:>6}{:>7}{:>10.3}",
            strip.module,
            strip.row,
            strip.column,
            strip.layer,
            strip.side.index(),
            strip.strip,
            delay
        )?;
    }
    writer.flush()?;
    Ok(())
}

/// Loads a delay table written by [`store_delay_table`].
///
/// Lines starting with `#` and blank lines are skipped.
///
/// # Errors
/// Returns I/O errors, and parse errors with their 1-based line number.
pub fn load_delay_table<P: AsRef<Path>>(path: P) -> Result<StripDelayTable> {
    let reader = BufReader::new(File::open(path)?);
    let mut table = StripDelayTable::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let text = line.trim();
        if text.is_empty() || text.starts_with('#') {
            continue;
        }
        let (strip, delay) = parse_row(text).ok_or_else(|| Error::InvalidCalibrationRow {
            line: index + 1,
            reason: format!("expected `module row column layer side strip offset`, got {text:?}"),
        })?;
        table.set_delay(strip, delay);
    }
    Ok(table)
}

fn parse_row(text: &str) -> Option<(StripId, f64)> {
    let mut fields = text.split_whitespace();
    let module = fields.next()?.parse().ok()?;
    let row = fields.next()?.parse().ok()?;
    let column = fields.next()?.parse().ok()?;
    let layer = fields.next()?.parse().ok()?;
    let side = match fields.next()? {
        "0" => Side::X,
        "1" => Side::Y,
        _ => return None,
    };
    let strip = fields.next()?.parse().ok()?;
    let delay = fields.next()?.parse().ok()?;
    if fields.next().is_some() {
        return None;
    }
    Some((StripId::new(module, row, column, layer, side, strip), delay))
}
