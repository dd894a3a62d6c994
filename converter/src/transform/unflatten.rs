//! Dotted literal names back to entity hierarchy.

use super::stream::{StreamEvent, StreamReceiver};
use crate::error::{TransformError, TransformResult};

pub const DEFAULT_ENTITY_MARKER: char = '.';

/// Turns `Literal("a.b.c", v)` into `StartEntity(a) StartEntity(b) Literal(c, v)`.
///
/// Consecutive literals sharing a prefix reuse the open entities. A first
/// segment equal to `initial_discard` is dropped. Input must be flat.
pub struct StreamUnflattener<R: StreamReceiver> {
    receiver: R,
    marker: char,
    initial_discard: String,
    open: Vec<String>,
}

impl<R: StreamReceiver> StreamUnflattener<R> {
    pub fn new(receiver: R) -> Self {
        Self::with_settings(receiver, "", DEFAULT_ENTITY_MARKER)
    }

    pub fn with_settings(receiver: R, initial_discard: &str, marker: char) -> Self {
        Self {
            receiver,
            marker,
            initial_discard: initial_discard.to_string(),
            open: Vec::new(),
        }
    }

    pub fn entity_marker(&self) -> char {
        self.marker
    }

    pub fn initial_discard(&self) -> &str {
        &self.initial_discard
    }

    pub fn into_receiver(self) -> R {
        self.receiver
    }

    fn close_to(&mut self, depth: usize) -> TransformResult<()> {
        while self.open.len() > depth {
            self.open.pop();
            self.receiver.receive(StreamEvent::EndEntity)?;
        }
        Ok(())
    }

    fn literal(&mut self, name: &str, value: String) -> TransformResult<()> {
        let mut segments: Vec<&str> = name.split(self.marker).collect();
        let local = segments.pop().unwrap_or(name);

        if segments.first().is_some_and(|first| *first == self.initial_discard) {
            segments.remove(0);
        }

        let shared = self
            .open
            .iter()
            .zip(segments.iter())
            .take_while(|(open, wanted)| open.as_str() == **wanted)
            .count();
        self.close_to(shared)?;

        for entity in &segments[shared..] {
            self.open.push(entity.to_string());
            self.receiver.receive(StreamEvent::entity(*entity))?;
        }
        self.receiver.receive(StreamEvent::Literal(local.to_string(), value))
    }
}

impl<R: StreamReceiver> StreamReceiver for StreamUnflattener<R> {
    fn receive(&mut self, event: StreamEvent) -> TransformResult<()> {
        match event {
            StreamEvent::StartRecord(id) => {
                self.open.clear();
                self.receiver.receive(StreamEvent::StartRecord(id))
            }
            StreamEvent::EndRecord => {
                self.close_to(0)?;
                self.receiver.receive(StreamEvent::EndRecord)
            }
            StreamEvent::Literal(name, value) => self.literal(&name, value),
            StreamEvent::StartEntity(_) | StreamEvent::EndEntity => Err(TransformError::UnbalancedStream(
                "the unflattener expects a flat stream of literals".to_string(),
            )),
        }
    }

    fn close(&mut self) -> TransformResult<()> {
        self.receiver.close()
    }
}
