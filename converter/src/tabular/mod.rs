//! Delimited text sources.
//!
//! ```text
//! bytes ──▶ decode ──▶ skip ignore_lines ──▶ CsvRowReader ──▶ header + Row*
//!                                                │
//!                     ┌──────────────────────────┼──────────────────────────┐
//!                     ▼                          ▼                          ▼
//!              CsvTextEncoder             CsvJsonEncoder             CsvGraphEncoder
//!              (line per row)           (object per row)         (RecordGraph per row)
//! ```
//!
//! Row discarding and the row cap happen in the reader; encoders see only
//! the rows that survive.

mod graph;
mod json;
mod reader;
mod text;

pub use graph::CsvGraphEncoder;
pub use json::CsvJsonEncoder;
pub use reader::{CsvRowReader, Row};
pub use text::CsvTextEncoder;

use crate::error::ConversionResult;
use crate::logs::{log_debug, log_warning};

/// Turns one row into some output.
pub trait RowEncoder {
    type Output;

    fn encode(&mut self, header: &[String], row: &Row) -> ConversionResult<Self::Output>;
}

/// Drain `reader` through `encoder`; the first bad row aborts.
pub fn encode_rows<E: RowEncoder>(reader: CsvRowReader, encoder: &mut E) -> ConversionResult<Vec<E::Output>> {
    let header = reader.header().to_vec();
    let mut outputs = Vec::new();

    for row in reader {
        let row = row?;
        outputs.push(encoder.encode(&header, &row)?);
    }

    if outputs.is_empty() {
        log_warning("no data rows in delimited input");
    } else {
        log_debug(format!("encoded {} rows", outputs.len()));
    }
    Ok(outputs)
}

/// Lazily encode each row as it is read.
pub fn encode_lazily<E: RowEncoder>(
    reader: CsvRowReader,
    mut encoder: E,
) -> impl Iterator<Item = ConversionResult<E::Output>> {
    let header = reader.header().to_vec();
    let mut failed = false;
    reader.map_while(move |row| {
        if failed {
            return None;
        }
        let result = row.and_then(|row| encoder.encode(&header, &row));
        failed = result.is_err();
        Some(result)
    })
}
