//! Record event streams.
//!
//! Every stage of a transformation consumes and produces the same flat
//! vocabulary of events:
//!
//! ```text
//! StartRecord("r1")
//!   Literal("title", "A")
//!   StartEntity("creator")
//!     Literal("name", "X")
//!   EndEntity
//! EndRecord
//! ```
//!
//! Stages own (or borrow) their downstream receiver and forward events to it.

use crate::error::{TransformError, TransformResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    StartRecord(String),
    EndRecord,
    StartEntity(String),
    EndEntity,
    Literal(String, String),
}

impl StreamEvent {
    pub fn literal(name: impl Into<String>, value: impl Into<String>) -> Self {
        StreamEvent::Literal(name.into(), value.into())
    }

    pub fn entity(name: impl Into<String>) -> Self {
        StreamEvent::StartEntity(name.into())
    }
}

/// A stage that accepts record events.
pub trait StreamReceiver {
    fn receive(&mut self, event: StreamEvent) -> TransformResult<()>;

    /// End of input. Stages flush and forward the close downstream.
    fn close(&mut self) -> TransformResult<()> {
        Ok(())
    }
}

impl<R: StreamReceiver + ?Sized> StreamReceiver for &mut R {
    fn receive(&mut self, event: StreamEvent) -> TransformResult<()> {
        (**self).receive(event)
    }

    fn close(&mut self) -> TransformResult<()> {
        (**self).close()
    }
}

impl<R: StreamReceiver + ?Sized> StreamReceiver for Box<R> {
    fn receive(&mut self, event: StreamEvent) -> TransformResult<()> {
        (**self).receive(event)
    }

    fn close(&mut self) -> TransformResult<()> {
        (**self).close()
    }
}

/// Collects every event; the end of test pipelines.
#[derive(Debug, Default)]
pub struct EventCollector {
    pub events: Vec<StreamEvent>,
    pub closed: bool,
}

impl EventCollector {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StreamReceiver for EventCollector {
    fn receive(&mut self, event: StreamEvent) -> TransformResult<()> {
        if self.closed {
            return Err(TransformError::Closed);
        }
        self.events.push(event);
        Ok(())
    }

    fn close(&mut self) -> TransformResult<()> {
        self.closed = true;
        Ok(())
    }
}

/// Tracks record/entity nesting and rejects unbalanced streams.
#[derive(Debug, Default)]
pub(crate) struct Nesting {
    in_record: bool,
    depth: usize,
}

impl Nesting {
    pub(crate) fn check(&mut self, event: &StreamEvent) -> TransformResult<()> {
        match event {
            StreamEvent::StartRecord(_) if self.in_record => {
                Err(TransformError::UnbalancedStream("record started inside a record".to_string()))
            }
            StreamEvent::StartRecord(_) => {
                self.in_record = true;
                self.depth = 0;
                Ok(())
            }
            _ if !self.in_record => Err(TransformError::UnbalancedStream(format!("{:?} outside a record", event))),
            StreamEvent::EndRecord if self.depth > 0 => {
                Err(TransformError::UnbalancedStream(format!("record ended with {} open entities", self.depth)))
            }
            StreamEvent::EndRecord => {
                self.in_record = false;
                Ok(())
            }
            StreamEvent::StartEntity(_) => {
                self.depth += 1;
                Ok(())
            }
            StreamEvent::EndEntity if self.depth == 0 => {
                Err(TransformError::UnbalancedStream("entity closed without being opened".to_string()))
            }
            StreamEvent::EndEntity => {
                self.depth -= 1;
                Ok(())
            }
            StreamEvent::Literal(..) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nesting_accepts_balanced_stream() {
        let mut nesting = Nesting::default();
        let events = [
            StreamEvent::StartRecord("1".into()),
            StreamEvent::entity("a"),
            StreamEvent::literal("b", "c"),
            StreamEvent::EndEntity,
            StreamEvent::EndRecord,
        ];
        for event in &events {
            nesting.check(event).unwrap();
        }
        assert!(!nesting.in_record);
    }

    #[test]
    fn test_nesting_rejects_unbalanced_stream() {
        let mut nesting = Nesting::default();
        assert!(nesting.check(&StreamEvent::literal("a", "b")).is_err());

        nesting.check(&StreamEvent::StartRecord("1".into())).unwrap();
        nesting.check(&StreamEvent::entity("a")).unwrap();
        assert!(nesting.check(&StreamEvent::EndRecord).is_err());
    }

    #[test]
    fn test_collector_refuses_after_close() {
        let mut collector = EventCollector::new();
        collector.receive(StreamEvent::StartRecord("1".into())).unwrap();
        collector.close().unwrap();
        assert!(matches!(collector.receive(StreamEvent::EndRecord), Err(TransformError::Closed)));
    }
}
