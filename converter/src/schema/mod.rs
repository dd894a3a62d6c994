//! Schema inference over record graphs.
//!
//! ```text
//! RecordGraph ──▶ Shape (per record) ──▶ AttributePathSet ──┐
//! RecordGraph ──▶ Shape (per record) ──▶ AttributePathSet ──┼─ merge ──▶ generate_schema ──▶ JSON tree
//! RecordGraph ──▶ Shape (per record) ──▶ AttributePathSet ──┘
//! ```
//!
//! Each record yields its own path set; one fold merges them, so records may
//! be walked on independent workers.

mod attribute_path;
mod generate;
mod shape;

pub use attribute_path::{AttributePath, AttributePathSet};
pub use generate::{generate_schema, schema_paths};
pub use shape::{build_shape, Shape};

use crate::error::{InferenceError, InferenceResult};
use crate::logs::log_debug;
use crate::models::RecordGraph;

/// Attribute paths of every record in one graph.
pub fn attribute_paths_of(graph: &RecordGraph) -> InferenceResult<AttributePathSet> {
    let mut paths = AttributePathSet::new();
    for resource in graph.record_resources() {
        let shape = build_shape(&graph.model, resource, &resource.key());
        paths.merge(shape.paths()?);
    }
    Ok(paths)
}

/// Fold the path sets of many graphs in input order.
pub fn infer_attribute_paths<'a, I>(graphs: I) -> InferenceResult<AttributePathSet>
where
    I: IntoIterator<Item = &'a RecordGraph>,
{
    let mut paths = AttributePathSet::new();
    for graph in graphs {
        paths.merge(attribute_paths_of(graph)?);
    }
    Ok(paths)
}

/// Same result as [`infer_attribute_paths`], with each record walked on a
/// blocking worker.
pub async fn infer_attribute_paths_concurrently(graphs: Vec<RecordGraph>) -> InferenceResult<AttributePathSet> {
    let total = graphs.len();
    let handles: Vec<_> = graphs
        .into_iter()
        .map(|graph| tokio::task::spawn_blocking(move || attribute_paths_of(&graph)))
        .collect();

    let mut paths = AttributePathSet::new();
    for joined in futures::future::join_all(handles).await {
        let local = joined.map_err(|e| InferenceError::Internal(format!("inference worker failed: {}", e)))??;
        paths.merge(local);
    }

    log_debug(format!("Inferred {} attribute paths from {} records", paths.len(), total));
    Ok(paths)
}
