//! Parsed JSON records to events.

use serde_json::Value;

use super::stream::{StreamEvent, StreamReceiver};
use crate::error::TransformResult;

/// Walks one JSON record per call and pushes its events downstream.
///
/// Objects become entities, arrays repeat their key once per element,
/// scalars become literals and nulls are dropped.
pub struct JsonRecordReader<R: StreamReceiver> {
    receiver: R,
    records: usize,
}

impl<R: StreamReceiver> JsonRecordReader<R> {
    pub fn new(receiver: R) -> Self {
        Self { receiver, records: 0 }
    }

    pub fn read(&mut self, id: &str, record: &Value) -> TransformResult<()> {
        self.receiver.receive(StreamEvent::StartRecord(id.to_string()))?;
        match record {
            Value::Object(fields) => {
                for (name, value) in fields {
                    self.field(name, value)?;
                }
            }
            Value::Null => {}
            // a bare value has no field name of its own
            other => self.field("value", other)?,
        }
        self.receiver.receive(StreamEvent::EndRecord)?;
        self.records += 1;
        Ok(())
    }

    pub fn records(&self) -> usize {
        self.records
    }

    pub fn close(&mut self) -> TransformResult<()> {
        self.receiver.close()
    }

    pub fn into_receiver(self) -> R {
        self.receiver
    }

    fn field(&mut self, name: &str, value: &Value) -> TransformResult<()> {
        match value {
            Value::Null => Ok(()),
            Value::String(s) => self.receiver.receive(StreamEvent::literal(name, s.as_str())),
            Value::Bool(_) | Value::Number(_) => self.receiver.receive(StreamEvent::literal(name, value.to_string())),
            Value::Array(items) => {
                for item in items {
                    self.field(name, item)?;
                }
                Ok(())
            }
            Value::Object(fields) => {
                self.receiver.receive(StreamEvent::entity(name))?;
                for (key, nested) in fields {
                    self.field(key, nested)?;
                }
                self.receiver.receive(StreamEvent::EndEntity)
            }
        }
    }
}
