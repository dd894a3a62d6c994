use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use serde_json::{Map, Value};

use super::{Model, Node, NodeKey, Resource, Statement};
use crate::error::InferenceResult;
use crate::schema::{self, AttributePathSet};

/// One converted record: its model plus the URIs that denote records in it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordGraph {
    pub model: Model,
    pub record_uris: IndexSet<Arc<str>>,
    pub record_class_uri: Option<Arc<str>>,
}

impl RecordGraph {
    pub fn new(model: Model, record_uri: Arc<str>, record_class_uri: Option<Arc<str>>) -> Self {
        let mut record_uris = IndexSet::new();
        record_uris.insert(record_uri);
        Self { model, record_uris, record_class_uri }
    }

    /// The first record URI; graphs built by the encoders carry exactly one.
    pub fn record_uri(&self) -> Option<&str> {
        self.record_uris.first().map(|u| &**u)
    }

    pub fn record_resources(&self) -> impl Iterator<Item = &Resource> {
        self.record_uris.iter().filter_map(|uri| self.model.resource(uri))
    }

    /// `[{"<record uri>": {...}}, ...]`
    pub fn to_json(&self) -> Value {
        let records = self
            .records()
            .into_iter()
            .map(|(uri, body)| {
                let mut wrapper = Map::new();
                wrapper.insert(uri, body);
                Value::Object(wrapper)
            })
            .collect();
        Value::Array(records)
    }

    /// (record uri, record body) pairs, keys are predicate local names.
    pub fn records(&self) -> Vec<(String, Value)> {
        self.record_resources()
            .map(|resource| {
                let mut visiting = vec![resource.key()];
                let body = render_subject(&self.model, resource, &resource.key(), &mut visiting);
                (resource.uri.to_string(), body)
            })
            .collect()
    }

    pub fn attribute_paths(&self) -> InferenceResult<AttributePathSet> {
        schema::attribute_paths_of(self)
    }

    pub fn schema(&self) -> InferenceResult<Value> {
        Ok(schema::generate_schema(&self.attribute_paths()?))
    }
}

fn render_subject(model: &Model, resource: &Resource, subject: &NodeKey, visiting: &mut Vec<NodeKey>) -> Value {
    let mut grouped: IndexMap<&str, Vec<&Statement>> = IndexMap::new();
    for statement in resource.statements_for(subject) {
        if statement.predicate.is_type() {
            continue;
        }
        grouped.entry(statement.predicate.local_name()).or_default().push(statement);
    }

    let mut body = Map::new();
    for (name, mut statements) in grouped {
        statements.sort_by_key(|s| s.order);
        let mut values: Vec<Value> = statements
            .iter()
            .map(|s| render_object(model, resource, &s.object, visiting))
            .collect();

        let value = if values.len() == 1 { values.remove(0) } else { Value::Array(values) };
        body.insert(name.to_string(), value);
    }
    Value::Object(body)
}

fn render_object(model: &Model, resource: &Resource, object: &Node, visiting: &mut Vec<NodeKey>) -> Value {
    match object {
        Node::Literal(v) => Value::String(v.clone()),
        Node::Anonymous(id) => {
            let key = NodeKey::Id(*id);
            if visiting.contains(&key) {
                return Value::Null;
            }
            visiting.push(key.clone());
            let body = render_subject(model, resource, &key, visiting);
            visiting.pop();
            body
        }
        Node::Resource(uri) => {
            let key = NodeKey::Uri(uri.clone());
            match model.resource(uri) {
                Some(nested) if !visiting.contains(&key) && nested.has_statements_for(&key) => {
                    visiting.push(key.clone());
                    let body = render_subject(model, nested, &key, visiting);
                    visiting.pop();
                    body
                }
                _ => Value::String(uri.to_string()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{OrderCounter, RDF_TYPE};
    use crate::uri::Interner;
    use serde_json::json;

    fn sample() -> RecordGraph {
        let mut interner = Interner::new();
        let mut counter = OrderCounter::new();
        let record: Arc<str> = "http://ex.org/records/1".into();
        let rdf_type = interner.predicate(&Arc::from(RDF_TYPE));
        let title = interner.predicate(&Arc::from("http://ex.org/ns#title"));
        let creator = interner.predicate(&Arc::from("http://ex.org/ns#creator"));
        let name = interner.predicate(&Arc::from("http://ex.org/ns#name"));

        let mut model = Model::new();
        let root = NodeKey::Uri(record.clone());
        let resource = model.resource_mut(&record);

        let mut add = |subject: &NodeKey, p: &crate::models::Predicate, object: Node| {
            let order = counter.next(subject, p);
            resource.add_statement(Statement { subject: subject.node(), predicate: p.clone(), object, order });
        };

        add(&root, &rdf_type, Node::Resource("http://ex.org/ns#recType".into()));
        add(&root, &title, Node::Literal("A".into()));
        add(&root, &creator, Node::Anonymous(1));
        add(&NodeKey::Id(1), &name, Node::Literal("X".into()));
        add(&root, &creator, Node::Anonymous(2));
        add(&NodeKey::Id(2), &name, Node::Literal("Y".into()));

        RecordGraph::new(model, record, Some("http://ex.org/ns#recType".into()))
    }

    #[test]
    fn test_to_json_nests_and_groups() {
        let graph = sample();
        assert_eq!(
            graph.to_json(),
            json!([{
                "http://ex.org/records/1": {
                    "title": "A",
                    "creator": [{ "name": "X" }, { "name": "Y" }]
                }
            }])
        );
    }

    #[test]
    fn test_dangling_resource_renders_as_uri() {
        let mut graph = sample();
        let record: Arc<str> = "http://ex.org/records/1".into();
        let see_also = crate::models::Predicate::new(99, "http://ex.org/ns#seeAlso".into());
        graph.model.resource_mut(&record).add_statement(Statement {
            subject: Node::Resource(record.clone()),
            predicate: see_also,
            object: Node::Resource("http://other.org/x".into()),
            order: 1,
        });

        let records = graph.records();
        assert_eq!(records[0].1["seeAlso"], "http://other.org/x");
    }
}
