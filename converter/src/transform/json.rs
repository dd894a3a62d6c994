//! Events to one JSON array string.

use serde_json::{Map, Value};

use super::collapse::ARRAY_MARKER;
use super::stream::{Nesting, StreamEvent, StreamReceiver};
use crate::error::{TransformError, TransformResult};
use crate::logs::log_debug;

enum Frame {
    Object(String, Map<String, Value>),
    Array(String, Vec<Value>),
}

impl Frame {
    fn open(name: String) -> Self {
        match name.strip_suffix(ARRAY_MARKER) {
            Some(base) => Frame::Array(base.to_string(), Vec::new()),
            None => Frame::Object(name, Map::new()),
        }
    }

    fn add(&mut self, name: String, value: Value) {
        match self {
            Frame::Object(_, fields) => {
                fields.insert(name, value);
            }
            Frame::Array(_, items) => items.push(value),
        }
    }

    fn finish(self) -> (String, Value) {
        match self {
            Frame::Object(name, fields) => (name, Value::Object(fields)),
            Frame::Array(name, items) => (name, Value::Array(items)),
        }
    }
}

/// Serializes each record as an object and accumulates them into
/// `[obj,obj,...]`. Entities named `x[]` become arrays under `x`.
pub struct JsonArrayWriter {
    buffer: String,
    nesting: Nesting,
    stack: Vec<Frame>,
    records: usize,
    closed: bool,
}

impl JsonArrayWriter {
    pub fn new() -> Self {
        Self {
            buffer: String::from("["),
            nesting: Nesting::default(),
            stack: Vec::new(),
            records: 0,
            closed: false,
        }
    }

    pub fn records(&self) -> usize {
        self.records
    }

    /// The accumulated array; closes the writer first if needed.
    pub fn into_string(mut self) -> String {
        if !self.closed {
            self.finish();
        }
        self.buffer
    }

    fn finish(&mut self) {
        if self.buffer.ends_with(',') {
            self.buffer.pop();
        }
        self.buffer.push(']');
        self.closed = true;
    }

    fn write_record(&mut self, record: Value) -> TransformResult<()> {
        let json = serde_json::to_string(&record).map_err(|e| TransformError::Output(e.to_string()))?;
        self.buffer.push_str(&json);
        self.buffer.push(',');
        self.records += 1;
        Ok(())
    }
}

impl Default for JsonArrayWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamReceiver for JsonArrayWriter {
    fn receive(&mut self, event: StreamEvent) -> TransformResult<()> {
        if self.closed {
            return Err(TransformError::Closed);
        }
        self.nesting.check(&event)?;

        match event {
            StreamEvent::StartRecord(_) => {
                self.stack.clear();
                self.stack.push(Frame::Object(String::new(), Map::new()));
            }
            StreamEvent::StartEntity(name) => self.stack.push(Frame::open(name)),
            StreamEvent::EndEntity => {
                if let Some(frame) = self.stack.pop() {
                    let (name, value) = frame.finish();
                    if let Some(parent) = self.stack.last_mut() {
                        parent.add(name, value);
                    }
                }
            }
            StreamEvent::Literal(name, value) => {
                if let Some(frame) = self.stack.last_mut() {
                    frame.add(name, Value::String(value));
                }
            }
            StreamEvent::EndRecord => {
                if let Some(frame) = self.stack.pop() {
                    let (_, record) = frame.finish();
                    self.write_record(record)?;
                }
            }
        }
        Ok(())
    }

    fn close(&mut self) -> TransformResult<()> {
        if !self.closed {
            self.finish();
            log_debug(format!("JSON writer closed after {} records", self.records));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn write(writer: &mut JsonArrayWriter, events: Vec<StreamEvent>) {
        for event in events {
            writer.receive(event).unwrap();
        }
    }

    #[test]
    fn test_empty_stream() {
        let mut writer = JsonArrayWriter::new();
        writer.close().unwrap();
        assert_eq!(writer.into_string(), "[]");
    }

    #[test]
    fn test_records_and_arrays() {
        let mut writer = JsonArrayWriter::new();
        write(
            &mut writer,
            vec![
                StreamEvent::StartRecord("1".into()),
                StreamEvent::literal("title", "A"),
                StreamEvent::entity("creator[]"),
                StreamEvent::entity("creator"),
                StreamEvent::literal("name", "X"),
                StreamEvent::EndEntity,
                StreamEvent::entity("creator"),
                StreamEvent::literal("name", "Y"),
                StreamEvent::EndEntity,
                StreamEvent::EndEntity,
                StreamEvent::EndRecord,
                StreamEvent::StartRecord("2".into()),
                StreamEvent::literal("title", "B"),
                StreamEvent::EndRecord,
            ],
        );
        writer.close().unwrap();
        assert_eq!(writer.records(), 2);

        let output: Value = serde_json::from_str(&writer.into_string()).unwrap();
        assert_eq!(
            output,
            json!([
                {"title": "A", "creator": [{"name": "X"}, {"name": "Y"}]},
                {"title": "B"}
            ])
        );
    }

    #[test]
    fn test_closed_writer_rejects_events() {
        let mut writer = JsonArrayWriter::new();
        writer.close().unwrap();
        assert!(writer.receive(StreamEvent::StartRecord("1".into())).is_err());
    }
}
