//! Rows to JSON objects.

use serde_json::{Map, Value};

use super::reader::Row;
use super::RowEncoder;
use crate::error::ConversionResult;

/// One JSON object per row, column name → value.
///
/// Absent values are left out. With `with_schema`, the first record is
/// wrapped as `{"schema": [header...], "data": [object]}` so previews can
/// show the column order.
#[derive(Debug, Default)]
pub struct CsvJsonEncoder {
    with_schema: bool,
    emitted: usize,
}

impl CsvJsonEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_schema(mut self, with_schema: bool) -> Self {
        self.with_schema = with_schema;
        self
    }

    pub fn emitted(&self) -> usize {
        self.emitted
    }
}

impl RowEncoder for CsvJsonEncoder {
    type Output = Value;

    fn encode(&mut self, header: &[String], row: &Row) -> ConversionResult<Value> {
        let data: Map<String, Value> = row
            .present(header)
            .map(|(name, value)| (name.to_string(), Value::String(value.to_string())))
            .collect();

        self.emitted += 1;
        if self.with_schema && self.emitted == 1 {
            let mut first = Map::new();
            first.insert(
                "schema".to_string(),
                Value::Array(header.iter().cloned().map(Value::String).collect()),
            );
            first.insert("data".to_string(), Value::Array(vec![Value::Object(data)]));
            return Ok(Value::Object(first));
        }
        Ok(Value::Object(data))
    }
}
