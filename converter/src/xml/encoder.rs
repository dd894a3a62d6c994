//! Push-driven record encoder.
//!
//! ```text
//!              start(record tag, first-seen name)
//!  OutsideRecord ──────────────────────────────▶ InRecord { frames }
//!        ▲                                           │  start  → push frame
//!        │        end(record) / emit RecordGraph     │  chars  → buffer text
//!        └───────────────────────────────────────────┘  end    → pop frame
//! ```
//!
//! Nested elements materialize lazily. An element that only ever holds text
//! becomes a literal on its parent; one with attributes or child elements
//! becomes an anonymous entity with a single `rdf:type`.

use std::sync::Arc;

use crate::models::{Model, Node, NodeKey, OrderCounter, Predicate, RecordGraph, Statement, RDF_TYPE, RDF_VALUE};
use crate::uri::{Interner, UriMinter};

/// A resolved element or attribute name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlName {
    pub namespace: Option<String>,
    pub local: String,
}

impl XmlName {
    pub fn new(namespace: Option<&str>, local: &str) -> Self {
        Self {
            namespace: namespace.filter(|ns| !ns.is_empty()).map(str::to_string),
            local: local.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct XmlAttribute {
    pub name: XmlName,
    pub value: String,
}

impl XmlAttribute {
    pub fn new(name: XmlName, value: impl Into<String>) -> Self {
        Self { name, value: value.into() }
    }
}

/// Where the encoder should cut records.
#[derive(Debug, Clone)]
pub struct RecordBoundary {
    /// Local name of the record element
    pub tag: String,
    /// Required namespace, if any
    pub namespace: Option<String>,
    /// Attribute carrying the record identifier
    pub id_attribute: String,
}

impl RecordBoundary {
    pub fn new(tag: &str) -> Self {
        let local = tag.rsplit(':').next().unwrap_or(tag);
        Self {
            tag: local.to_string(),
            namespace: None,
            id_attribute: crate::config::DEFAULT_RECORD_ID_ATTRIBUTE.to_string(),
        }
    }

    pub fn with_namespace(mut self, namespace: Option<String>) -> Self {
        self.namespace = namespace.filter(|ns| !ns.is_empty());
        self
    }

    pub fn with_id_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.id_attribute = attribute.into();
        self
    }
}

/// One open element inside a record.
#[derive(Debug)]
struct Frame {
    predicate: Predicate,
    /// `None` until the element needs to be an entity
    node: Option<NodeKey>,
    text: String,
}

#[derive(Debug)]
struct OpenRecord {
    model: Model,
    uri: Arc<str>,
    class: Arc<str>,
    root: NodeKey,
    root_text: String,
    frames: Vec<Frame>,
    order: OrderCounter,
}

#[derive(Debug)]
enum State {
    OutsideRecord,
    InRecord(Box<OpenRecord>),
}

/// Turns element/attribute/text events into one [`RecordGraph`] per record.
#[derive(Debug)]
pub struct XmlRecordEncoder {
    boundary: RecordBoundary,
    minter: UriMinter,
    interner: Interner,
    rdf_type: Predicate,
    rdf_value: Predicate,
    record_name: Option<XmlName>,
    next_node_id: u64,
    records_emitted: usize,
    state: State,
}

impl XmlRecordEncoder {
    pub fn new(boundary: RecordBoundary, minter: UriMinter) -> Self {
        let mut interner = Interner::new();
        let rdf_type = interner.predicate(&Arc::from(RDF_TYPE));
        let rdf_value = interner.predicate(&Arc::from(RDF_VALUE));

        Self {
            boundary,
            minter,
            interner,
            rdf_type,
            rdf_value,
            record_name: None,
            next_node_id: 1,
            records_emitted: 0,
            state: State::OutsideRecord,
        }
    }

    pub fn is_in_record(&self) -> bool {
        matches!(self.state, State::InRecord(_))
    }

    pub fn records_emitted(&self) -> usize {
        self.records_emitted
    }

    pub fn start_element(&mut self, name: &XmlName, attributes: &[XmlAttribute]) {
        match std::mem::replace(&mut self.state, State::OutsideRecord) {
            State::OutsideRecord => {
                if self.is_record_boundary(name) {
                    let record = self.start_record(name, attributes);
                    self.state = State::InRecord(Box::new(record));
                }
            }
            State::InRecord(mut record) => {
                self.start_entity(&mut record, name, attributes);
                self.state = State::InRecord(record);
            }
        }
    }

    pub fn characters(&mut self, text: &str) {
        if let State::InRecord(record) = &mut self.state {
            let buffer = match record.frames.last_mut() {
                Some(frame) => &mut frame.text,
                None => &mut record.root_text,
            };
            buffer.extend(text.chars().filter(|c| *c != '\t'));
        }
    }

    /// Returns the finished record when `name` closes it.
    pub fn end_element(&mut self, _name: &XmlName) -> Option<RecordGraph> {
        let State::InRecord(mut record) = std::mem::replace(&mut self.state, State::OutsideRecord) else {
            return None;
        };

        if record.frames.is_empty() {
            return Some(self.end_record(*record));
        }

        self.end_entity(&mut record);
        self.state = State::InRecord(record);
        None
    }

    fn is_record_boundary(&self, name: &XmlName) -> bool {
        if name.local != self.boundary.tag {
            return false;
        }
        if let Some(required) = &self.boundary.namespace {
            if name.namespace.as_ref() != Some(required) {
                return false;
            }
        }
        match &self.record_name {
            Some(first) => first == name,
            None => true,
        }
    }

    fn start_record(&mut self, name: &XmlName, attributes: &[XmlAttribute]) -> OpenRecord {
        if self.record_name.is_none() {
            self.record_name = Some(name.clone());
        }

        let identifier = attributes
            .iter()
            .find(|a| a.name.local == self.boundary.id_attribute)
            .map(|a| a.value.as_str());

        let uri: Arc<str> = self.minter.record_uri(identifier).into();
        let tag_uri = self.minter.term_uri(name.namespace.as_deref(), &name.local);
        let class = self.minter.type_uri(&tag_uri);
        let root = NodeKey::Uri(uri.clone());

        let mut record = OpenRecord {
            model: Model::new(),
            uri,
            class: class.clone(),
            root: root.clone(),
            root_text: String::new(),
            frames: Vec::new(),
            order: OrderCounter::new(),
        };

        let rdf_type = self.rdf_type.clone();
        add(&mut record, &root, &rdf_type, Node::Resource(class));

        for attribute in attributes {
            if attribute.name.local == self.boundary.id_attribute {
                continue;
            }
            self.write_attribute(&mut record, &root, attribute);
        }

        record
    }

    fn start_entity(&mut self, record: &mut OpenRecord, name: &XmlName, attributes: &[XmlAttribute]) {
        let parent = self.materialize_top(record);
        self.flush_text(record, &parent);

        let uri = self.minter.term_uri(name.namespace.as_deref(), &name.local);
        let predicate = self.interner.predicate(&uri);
        record.frames.push(Frame { predicate, node: None, text: String::new() });

        if !attributes.is_empty() {
            let node = self.materialize_top(record);
            for attribute in attributes {
                self.write_attribute(record, &node, attribute);
            }
        }
    }

    fn end_entity(&mut self, record: &mut OpenRecord) {
        let Some(frame) = record.frames.pop() else {
            return;
        };
        let parent = record
            .frames
            .last()
            .and_then(|f| f.node.clone())
            .unwrap_or_else(|| record.root.clone());

        match frame.node {
            Some(node) => {
                if let Some(text) = normalize(&frame.text) {
                    let rdf_value = self.rdf_value.clone();
                    add(record, &node, &rdf_value, Node::Literal(text));
                }
            }
            None => match normalize(&frame.text) {
                Some(text) => add(record, &parent, &frame.predicate, Node::Literal(text)),
                None => {
                    self.new_entity(record, &parent, &frame.predicate);
                }
            },
        }
    }

    fn end_record(&mut self, mut record: OpenRecord) -> RecordGraph {
        let root = record.root.clone();
        self.flush_text(&mut record, &root);
        self.records_emitted += 1;
        RecordGraph::new(record.model, record.uri, Some(record.class))
    }

    /// Node of the innermost open element, creating it if still pending.
    fn materialize_top(&mut self, record: &mut OpenRecord) -> NodeKey {
        let depth = record.frames.len();
        if depth == 0 {
            return record.root.clone();
        }
        if let Some(node) = &record.frames[depth - 1].node {
            return node.clone();
        }

        let parent = record.frames[..depth - 1]
            .last()
            .and_then(|f| f.node.clone())
            .unwrap_or_else(|| record.root.clone());
        let predicate = record.frames[depth - 1].predicate.clone();
        let node = self.new_entity(record, &parent, &predicate);
        record.frames[depth - 1].node = Some(node.clone());
        node
    }

    fn new_entity(&mut self, record: &mut OpenRecord, parent: &NodeKey, predicate: &Predicate) -> NodeKey {
        let node = NodeKey::Id(self.next_node_id);
        self.next_node_id += 1;

        add(record, parent, predicate, node.node());
        let type_uri = self.minter.type_uri(predicate.shared_uri());
        let rdf_type = self.rdf_type.clone();
        add(record, &node, &rdf_type, Node::Resource(type_uri));
        node
    }

    fn flush_text(&mut self, record: &mut OpenRecord, subject: &NodeKey) {
        let buffer = match record.frames.last_mut() {
            Some(frame) => std::mem::take(&mut frame.text),
            None => std::mem::take(&mut record.root_text),
        };
        if let Some(text) = normalize(&buffer) {
            let rdf_value = self.rdf_value.clone();
            add(record, subject, &rdf_value, Node::Literal(text));
        }
    }

    fn write_attribute(&mut self, record: &mut OpenRecord, subject: &NodeKey, attribute: &XmlAttribute) {
        let uri = self.minter.term_uri(attribute.name.namespace.as_deref(), &attribute.name.local);
        let predicate = self.interner.predicate(&uri);
        add(record, subject, &predicate, Node::Literal(attribute.value.clone()));
    }
}

fn add(record: &mut OpenRecord, subject: &NodeKey, predicate: &Predicate, object: Node) {
    let order = record.order.next(subject, predicate);
    record.model.resource_mut(&record.uri).add_statement(Statement {
        subject: subject.node(),
        predicate: predicate.clone(),
        object,
        order,
    });
}

/// Newlines become spaces; whitespace-only text is dropped.
fn normalize(text: &str) -> Option<String> {
    let joined = text.replace("\r\n", " ").replace(['\n', '\r'], " ");
    let trimmed = joined.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
