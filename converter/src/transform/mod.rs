//! Transformation module.
//!
//! Runs mapping scripts over records as a chain of stream stages:
//! - `stream`: event vocabulary and the `StreamReceiver` stage trait
//! - `reader` / `json`: JSON records in, one JSON array out
//! - `unflatten` / `collapse`: dotted names to entities, repeats to arrays
//! - `dsl`: matrix scripts and their interpreter
//! - `task`: tasks, jobs, mappings and their compilation into scripts
//! - `flow`: wiring of all of the above

pub mod collapse;
pub mod dsl;
pub mod flow;
pub mod json;
pub mod reader;
pub mod stream;
pub mod task;
pub mod unflatten;

pub use collapse::StreamCollapser;
pub use dsl::*;
pub use flow::{execute_task, TransformationFlow};
pub use json::JsonArrayWriter;
pub use reader::JsonRecordReader;
pub use stream::{EventCollector, StreamEvent, StreamReceiver};
pub use task::{Attribute, AttributePathRef, Component, FunctionRef, Job, Mapping, MappingAttributePath, MatrixScriptBuilder, Task};
pub use unflatten::StreamUnflattener;
