//! Rows back to delimited text, one line per row.

use csv::{QuoteStyle, Terminator, WriterBuilder};

use super::reader::Row;
use super::RowEncoder;
use crate::config::{CsvSettings, RowDelimiter};
use crate::error::{ConversionError, ConversionResult};

/// Re-serializes rows with the input's delimiter and quoting settings.
///
/// The header line is written in front of the first row when enabled.
/// Returned lines never end in a row delimiter.
pub struct CsvTextEncoder {
    column_delimiter: u8,
    quote_character: u8,
    escape_character: u8,
    row_delimiter: RowDelimiter,
    with_header: bool,
    header_written: bool,
}

impl CsvTextEncoder {
    pub fn new(settings: &CsvSettings) -> Self {
        Self {
            column_delimiter: settings.column_delimiter,
            quote_character: settings.quote_character,
            escape_character: settings.escape_character,
            row_delimiter: settings.row_delimiter,
            with_header: false,
            header_written: false,
        }
    }

    pub fn with_header(mut self, with_header: bool) -> Self {
        self.with_header = with_header;
        self
    }

    fn line<'a>(&self, fields: impl IntoIterator<Item = &'a str>) -> ConversionResult<String> {
        let terminator = match self.row_delimiter {
            RowDelimiter::Newline => Terminator::Any(b'\n'),
            RowDelimiter::Byte(b) => Terminator::Any(b),
        };

        let mut writer = WriterBuilder::new()
            .delimiter(self.column_delimiter)
            .quote(self.quote_character)
            .escape(self.escape_character)
            .quote_style(QuoteStyle::Necessary)
            .terminator(terminator)
            .from_writer(Vec::new());

        writer.write_record(fields)?;
        let bytes = writer
            .into_inner()
            .map_err(|e| ConversionError::Io(std::io::Error::new(e.error().kind(), e.error().to_string())))?;

        let mut line = String::from_utf8_lossy(&bytes).into_owned();
        let delimiter = self.row_delimiter.as_str();
        if line.ends_with(&delimiter) {
            line.truncate(line.len() - delimiter.len());
        }
        Ok(line)
    }
}

impl RowEncoder for CsvTextEncoder {
    type Output = String;

    fn encode(&mut self, header: &[String], row: &Row) -> ConversionResult<String> {
        let values = self.line(row.values.iter().map(|v| v.as_deref().unwrap_or("")))?;

        if self.with_header && !self.header_written {
            self.header_written = true;
            let heading = self.line(header.iter().map(String::as_str))?;
            return Ok(format!("{}{}{}", heading, self.row_delimiter.as_str(), values));
        }
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tabular::{encode_rows, CsvRowReader};

    fn encode(input: &str, with_header: bool) -> Vec<String> {
        let settings = CsvSettings::default();
        let reader = CsvRowReader::from_bytes(input.as_bytes(), &settings, None).unwrap();
        let mut encoder = CsvTextEncoder::new(&settings).with_header(with_header);
        encode_rows(reader, &mut encoder).unwrap()
    }

    #[test]
    fn test_reproduces_data_lines() {
        let lines = encode("id;name\n1;Alice\n2;Bob\n", false);
        assert_eq!(lines, vec!["1;Alice", "2;Bob"]);
    }

    #[test]
    fn test_header_in_front_of_first_line() {
        let lines = encode("id;name\n1;Alice\n2;Bob\n", true);
        assert_eq!(lines, vec!["id;name\n1;Alice", "2;Bob"]);
    }

    #[test]
    fn test_quotes_fields_containing_delimiter() {
        let lines = encode("id;note\n1;\"a;b\"\n", false);
        assert_eq!(lines, vec!["1;\"a;b\""]);
    }
}
