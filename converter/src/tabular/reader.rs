//! Delimited text to rows.
//!
//! The whole input is decoded up front (encoding may need the full byte
//! stream for detection); rows are then split lazily by the csv crate.

use std::io::{Cursor, Read};

use crate::config::{CsvSettings, RowDelimiter};
use crate::error::{ConversionResult, MalformedInputError};
use crate::logs::log_debug;

/// One data row. `number` is 1-based over emitted data rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub number: usize,
    /// `None` marks a column the row does not reach
    pub values: Vec<Option<String>>,
}

impl Row {
    /// (column, value) pairs for present values.
    pub fn present<'a>(&'a self, header: &'a [String]) -> impl Iterator<Item = (&'a str, &'a str)> + 'a {
        header
            .iter()
            .zip(self.values.iter())
            .filter_map(|(name, value)| value.as_deref().map(|v| (name.as_str(), v)))
    }
}

/// Lazy data rows of one delimited input.
pub struct CsvRowReader {
    header: Vec<String>,
    /// Derived from the data: every row must match its width
    strict_width: bool,
    records: csv::StringRecordsIntoIter<Cursor<Vec<u8>>>,
    line_offset: usize,
    discard: usize,
    remaining: Option<usize>,
    emitted: usize,
    pending: Option<csv::StringRecord>,
}

impl CsvRowReader {
    pub fn from_reader<R: Read>(mut input: R, settings: &CsvSettings) -> ConversionResult<Self> {
        let mut bytes = Vec::new();
        input.read_to_end(&mut bytes)?;
        Self::from_bytes(&bytes, settings, None)
    }

    /// `header` overrides both the first-row header and generated column names.
    pub fn from_bytes(bytes: &[u8], settings: &CsvSettings, header: Option<Vec<String>>) -> ConversionResult<Self> {
        let text = settings.encoding.decode(bytes);
        let body = skip_lines(&text, settings.ignore_lines, settings.row_delimiter);

        let mut records = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(settings.column_delimiter)
            .quote(settings.quote_character)
            .escape(Some(settings.escape_character))
            .terminator(settings.row_delimiter.terminator())
            .from_reader(Cursor::new(body.as_bytes().to_vec()))
            .into_records();

        let mut pending = None;
        let (header, strict_width) = match header {
            Some(header) => (header, false),
            None => {
                let first = records.next().transpose()?;
                match first {
                    None => (Vec::new(), true),
                    Some(record) if settings.first_row_is_headings => {
                        (record.iter().map(|h| h.trim().to_string()).collect(), true)
                    }
                    Some(record) => {
                        let names = (1..=record.len()).map(|i| format!("column{}", i)).collect();
                        pending = Some(record);
                        (names, true)
                    }
                }
            }
        };

        log_debug(format!(
            "CSV header ({} columns, encoding {}): {}",
            header.len(),
            settings.encoding.name(),
            header.join(", ")
        ));

        Ok(Self {
            header,
            strict_width,
            records,
            line_offset: settings.ignore_lines,
            discard: settings.discard_rows,
            remaining: settings.at_most_rows,
            emitted: 0,
            pending,
        })
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    fn next_row(&mut self) -> ConversionResult<Option<Row>> {
        if self.remaining == Some(0) {
            return Ok(None);
        }

        loop {
            let record = match self.pending.take() {
                Some(record) => record,
                None => match self.records.next().transpose()? {
                    Some(record) => record,
                    None => return Ok(None),
                },
            };

            if self.discard > 0 {
                self.discard -= 1;
                continue;
            }

            let ragged = if self.strict_width {
                record.len() != self.header.len()
            } else {
                record.len() > self.header.len()
            };
            if ragged {
                let line = record.position().map(|p| p.line() as usize).unwrap_or(0) + self.line_offset;
                return Err(MalformedInputError::RaggedRow {
                    line,
                    expected: self.header.len(),
                    found: record.len(),
                }
                .into());
            }

            let mut values: Vec<Option<String>> = record.iter().map(|v| Some(v.to_string())).collect();
            values.resize(self.header.len(), None);

            self.emitted += 1;
            if let Some(remaining) = self.remaining.as_mut() {
                *remaining -= 1;
            }
            return Ok(Some(Row { number: self.emitted, values }));
        }
    }
}

impl Iterator for CsvRowReader {
    type Item = ConversionResult<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_row().transpose()
    }
}

/// Drop the first `count` raw lines.
fn skip_lines(text: &str, count: usize, delimiter: RowDelimiter) -> &str {
    let separator = match delimiter {
        RowDelimiter::Newline => '\n',
        RowDelimiter::Byte(b) => b as char,
    };

    let mut rest = text;
    for _ in 0..count {
        match rest.find(separator) {
            Some(pos) => rest = &rest[pos + separator.len_utf8()..],
            None => return "",
        }
    }
    rest
}
