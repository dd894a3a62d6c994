//! Repeated sibling names to array entities.

use indexmap::IndexMap;

use super::stream::{Nesting, StreamEvent, StreamReceiver};
use crate::error::TransformResult;

pub const ARRAY_MARKER: &str = "[]";

#[derive(Debug)]
enum Member {
    Literal(String),
    Entity(Vec<(String, Member)>),
}

/// Buffers one record and re-emits it with repeated sibling names grouped
/// under a single `name[]` entity, placed where the name first appeared.
pub struct StreamCollapser<R: StreamReceiver> {
    receiver: R,
    nesting: Nesting,
    record: Option<String>,
    stack: Vec<(String, Vec<(String, Member)>)>,
}

impl<R: StreamReceiver> StreamCollapser<R> {
    pub fn new(receiver: R) -> Self {
        Self {
            receiver,
            nesting: Nesting::default(),
            record: None,
            stack: Vec::new(),
        }
    }

    pub fn into_receiver(self) -> R {
        self.receiver
    }

    fn push(&mut self, name: String, member: Member) {
        if let Some((_, members)) = self.stack.last_mut() {
            members.push((name, member));
        }
    }

    fn emit(&mut self, members: Vec<(String, Member)>) -> TransformResult<()> {
        let mut groups: IndexMap<String, Vec<Member>> = IndexMap::new();
        for (name, member) in members {
            groups.entry(name).or_default().push(member);
        }

        for (name, mut group) in groups {
            if group.len() == 1 {
                if let Some(member) = group.pop() {
                    self.emit_member(&name, member)?;
                }
                continue;
            }

            self.receiver.receive(StreamEvent::entity(format!("{}{}", name, ARRAY_MARKER)))?;
            for member in group {
                self.emit_member(&name, member)?;
            }
            self.receiver.receive(StreamEvent::EndEntity)?;
        }
        Ok(())
    }

    fn emit_member(&mut self, name: &str, member: Member) -> TransformResult<()> {
        match member {
            Member::Literal(value) => self.receiver.receive(StreamEvent::literal(name, value)),
            Member::Entity(children) => {
                self.receiver.receive(StreamEvent::entity(name))?;
                self.emit(children)?;
                self.receiver.receive(StreamEvent::EndEntity)
            }
        }
    }
}

impl<R: StreamReceiver> StreamReceiver for StreamCollapser<R> {
    fn receive(&mut self, event: StreamEvent) -> TransformResult<()> {
        self.nesting.check(&event)?;

        match event {
            StreamEvent::StartRecord(id) => {
                self.record = Some(id);
                self.stack.clear();
                self.stack.push((String::new(), Vec::new()));
            }
            StreamEvent::StartEntity(name) => self.stack.push((name, Vec::new())),
            StreamEvent::EndEntity => {
                if let Some((name, members)) = self.stack.pop() {
                    self.push(name, Member::Entity(members));
                }
            }
            StreamEvent::Literal(name, value) => self.push(name, Member::Literal(value)),
            StreamEvent::EndRecord => {
                let members = self.stack.pop().map(|(_, members)| members).unwrap_or_default();
                let id = self.record.take().unwrap_or_default();
                self.receiver.receive(StreamEvent::StartRecord(id))?;
                self.emit(members)?;
                self.receiver.receive(StreamEvent::EndRecord)?;
            }
        }
        Ok(())
    }

    fn close(&mut self) -> TransformResult<()> {
        self.receiver.close()
    }
}
