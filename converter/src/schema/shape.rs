//! Unnormalized per-record shape trees.
//!
//! Transitions when a key is seen again under the same parent:
//!
//! ```text
//! absent  + s → s
//! Array   + s → Array[.., s]
//! other   + s → Array[other, s]
//! ```

use indexmap::IndexMap;

use super::attribute_path::{AttributePath, AttributePathSet};
use crate::error::{InferenceError, InferenceResult};
use crate::models::{Model, Node, NodeKey, Resource};

#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    /// An entity without statements of its own
    Empty,
    Scalar,
    Object(IndexMap<String, Shape>),
    Array(Vec<Shape>),
}

impl Shape {
    fn absorb(map: &mut IndexMap<String, Shape>, key: &str, shape: Shape) {
        match map.get_mut(key) {
            None => {
                map.insert(key.to_string(), shape);
            }
            Some(Shape::Array(items)) => items.push(shape),
            Some(existing) => {
                let previous = std::mem::replace(existing, Shape::Empty);
                *existing = Shape::Array(vec![previous, shape]);
            }
        }
    }

    /// Root-to-leaf paths of this shape.
    pub fn paths(&self) -> InferenceResult<AttributePathSet> {
        let mut out = AttributePathSet::new();
        let mut prefix = Vec::new();
        collect(self, &mut prefix, &mut out, false)?;
        Ok(out)
    }
}

fn collect(shape: &Shape, prefix: &mut Vec<String>, out: &mut AttributePathSet, in_array: bool) -> InferenceResult<()> {
    match shape {
        Shape::Empty | Shape::Scalar => {
            if !prefix.is_empty() {
                out.insert(AttributePath::new(prefix.iter().cloned()));
            }
        }
        Shape::Object(map) if map.is_empty() => {
            if !prefix.is_empty() {
                out.insert(AttributePath::new(prefix.iter().cloned()));
            }
        }
        Shape::Object(map) => {
            for (key, child) in map {
                prefix.push(key.clone());
                collect(child, prefix, out, false)?;
                prefix.pop();
            }
        }
        Shape::Array(items) => {
            if in_array {
                return Err(InferenceError::Internal(format!(
                    "nested array under '{}'",
                    prefix.join("/")
                )));
            }
            for item in items {
                collect(item, prefix, out, true)?;
            }
        }
    }
    Ok(())
}

/// Build the shape of `subject` inside `resource`.
pub fn build_shape(model: &Model, resource: &Resource, subject: &NodeKey) -> Shape {
    let mut ancestors = vec![subject.clone()];
    build(model, resource, subject, &mut ancestors)
}

fn build(model: &Model, resource: &Resource, subject: &NodeKey, ancestors: &mut Vec<NodeKey>) -> Shape {
    let mut map = IndexMap::new();

    for statement in resource.statements_for(subject) {
        let child = match &statement.object {
            Node::Literal(_) => Shape::Scalar,
            Node::Anonymous(id) => {
                let key = NodeKey::Id(*id);
                descend(model, resource, key, ancestors)
            }
            Node::Resource(uri) => {
                let key = NodeKey::Uri(uri.clone());
                match model.resource(uri) {
                    Some(nested) if nested.has_statements_for(&key) => {
                        descend(model, nested, key, ancestors)
                    }
                    _ => Shape::Scalar,
                }
            }
        };

        Shape::absorb(&mut map, statement.predicate.local_name(), child);
    }

    if map.is_empty() {
        Shape::Empty
    } else {
        Shape::Object(map)
    }
}

fn descend(model: &Model, resource: &Resource, key: NodeKey, ancestors: &mut Vec<NodeKey>) -> Shape {
    if ancestors.contains(&key) {
        return Shape::Scalar;
    }
    ancestors.push(key.clone());
    let shape = build(model, resource, &key, ancestors);
    ancestors.pop();
    shape
}
