//! Graph Data Model: nodes, predicates, ordered statements, resources.
//!
//! ```text
//! Model
//!  └── Resource <http://…/records/1>
//!       ├── (<…/records/1>, rdf:type, <…#recType>)           order 1
//!       ├── (<…/records/1>, ns#title, "A")                   order 1
//!       ├── (<…/records/1>, ns#author, _:1)                  order 1
//!       └── (_:1,           ns#name, "X")                    order 1
//! ```
//!
//! Statements whose subject is an anonymous node live in the resource that
//! roots them. `order` is 1-based per (subject, predicate) pair.

mod record;

pub use record::RecordGraph;

use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use indexmap::IndexMap;

use crate::uri::TermId;

pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
pub const RDF_VALUE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#value";

// =============================================================================
// Nodes
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Node {
    Literal(String),
    Resource(Arc<str>),
    Anonymous(u64),
}

/// Identity of a node that can act as a subject.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeKey {
    Uri(Arc<str>),
    Id(u64),
}

impl Node {
    pub fn key(&self) -> Option<NodeKey> {
        match self {
            Node::Literal(_) => None,
            Node::Resource(uri) => Some(NodeKey::Uri(uri.clone())),
            Node::Anonymous(id) => Some(NodeKey::Id(*id)),
        }
    }

    pub fn as_literal(&self) -> Option<&str> {
        match self {
            Node::Literal(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, Node::Literal(_))
    }
}

impl NodeKey {
    pub fn node(&self) -> Node {
        match self {
            NodeKey::Uri(uri) => Node::Resource(uri.clone()),
            NodeKey::Id(id) => Node::Anonymous(*id),
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Literal(v) => write!(f, "{:?}", v),
            Node::Resource(uri) => write!(f, "<{}>", uri),
            Node::Anonymous(id) => write!(f, "_:{}", id),
        }
    }
}

// =============================================================================
// Predicates and statements
// =============================================================================

/// An interned predicate URI. Equality and hashing go by URI.
#[derive(Debug, Clone)]
pub struct Predicate {
    id: TermId,
    uri: Arc<str>,
}

impl Predicate {
    pub fn new(id: TermId, uri: Arc<str>) -> Self {
        Self { id, uri }
    }

    pub fn id(&self) -> TermId {
        self.id
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn shared_uri(&self) -> &Arc<str> {
        &self.uri
    }

    pub fn local_name(&self) -> &str {
        crate::uri::local_name(&self.uri)
    }

    pub fn is_type(&self) -> bool {
        &*self.uri == RDF_TYPE
    }
}

impl PartialEq for Predicate {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.uri, &other.uri) || self.uri == other.uri
    }
}

impl Eq for Predicate {}

impl Hash for Predicate {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.uri.hash(state);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub subject: Node,
    pub predicate: Predicate,
    pub object: Node,
    pub order: u64,
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <{}> {} [{}]", self.subject, self.predicate.uri(), self.object, self.order)
    }
}

/// Hands out gapless 1-based positions per (subject, predicate) pair.
#[derive(Debug, Default)]
pub struct OrderCounter {
    next: HashMap<(NodeKey, TermId), u64>,
}

impl OrderCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&mut self, subject: &NodeKey, predicate: &Predicate) -> u64 {
        let slot = self.next.entry((subject.clone(), predicate.id())).or_insert(0);
        *slot += 1;
        *slot
    }
}

// =============================================================================
// Resources and models
// =============================================================================

/// Statements rooted at one URI-addressable node, indexed by subject.
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    pub uri: Arc<str>,
    statements: Vec<Statement>,
    by_subject: IndexMap<NodeKey, Vec<usize>>,
}

impl Resource {
    pub fn new(uri: Arc<str>) -> Self {
        Self {
            uri,
            statements: Vec::new(),
            by_subject: IndexMap::new(),
        }
    }

    pub fn add_statement(&mut self, statement: Statement) {
        if let Some(subject) = statement.subject.key() {
            self.by_subject.entry(subject).or_default().push(self.statements.len());
        }
        self.statements.push(statement);
    }

    pub fn key(&self) -> NodeKey {
        NodeKey::Uri(self.uri.clone())
    }

    /// All statements, in insertion order.
    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    /// Statements about `subject`, in insertion order.
    pub fn statements_for<'a>(&'a self, subject: &NodeKey) -> impl Iterator<Item = &'a Statement> + 'a {
        self.by_subject
            .get(subject)
            .into_iter()
            .flatten()
            .map(move |&i| &self.statements[i])
    }

    pub fn has_statements_for(&self, subject: &NodeKey) -> bool {
        self.by_subject.contains_key(subject)
    }
}

/// All resources produced from one input unit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Model {
    resources: IndexMap<Arc<str>, Resource>,
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resource(&self, uri: &str) -> Option<&Resource> {
        self.resources.get(uri)
    }

    pub fn resource_mut(&mut self, uri: &Arc<str>) -> &mut Resource {
        self.resources
            .entry(uri.clone())
            .or_insert_with(|| Resource::new(uri.clone()))
    }

    pub fn resources(&self) -> impl Iterator<Item = &Resource> {
        self.resources.values()
    }
}
