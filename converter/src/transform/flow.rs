//! Transformation flow.
//!
//! ```text
//! (record id, JSON record)*
//!        │
//!        ▼
//! JsonRecordReader ─► interpreter ─► StreamUnflattener ─► StreamCollapser ─► JsonArrayWriter
//!                     (script)       "a.b" -> a { b }     x,x -> x[]         "[{..},{..}]"
//! ```
//!
//! Tasks are validated before anything is opened or read.

use std::path::Path;
use std::sync::Arc;

use serde_json::Value;

use super::collapse::StreamCollapser;
use super::dsl::{MatrixEngine, MatrixScript, ScriptEngine};
use super::json::JsonArrayWriter;
use super::reader::JsonRecordReader;
use super::task::{MatrixScriptBuilder, Task};
use super::unflatten::StreamUnflattener;
use crate::error::{ConversionResult, MalformedInputError};
use crate::ingest::{record_source, RecordItem, ResourceOpener};
use crate::logs::{log_info, log_success};

pub struct TransformationFlow {
    engine: Arc<dyn ScriptEngine>,
    script: String,
}

impl TransformationFlow {
    pub fn new(script: MatrixScript) -> ConversionResult<Self> {
        let text = script.to_json()?;
        let engine = MatrixEngine::new(script)?;
        Ok(Self::with_engine(Arc::new(engine), text))
    }

    /// A flow around any engine; `script` is kept for display only.
    pub fn with_engine(engine: Arc<dyn ScriptEngine>, script: impl Into<String>) -> Self {
        Self {
            engine,
            script: script.into(),
        }
    }

    pub fn from_script_json(json: &str) -> ConversionResult<Self> {
        Self::new(MatrixScript::from_json(json)?)
    }

    pub fn from_script_file(path: impl AsRef<Path>) -> ConversionResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_script_json(&json)
    }

    pub fn from_task(task: &Task) -> ConversionResult<Self> {
        Self::new(MatrixScriptBuilder::new().build(task)?)
    }

    pub fn script(&self) -> &str {
        &self.script
    }

    /// Runs every record through the stages and returns one JSON array.
    pub fn apply<I>(&self, records: I) -> ConversionResult<String>
    where
        I: IntoIterator<Item = ConversionResult<(String, Value)>>,
    {
        let mut writer = JsonArrayWriter::new();
        {
            let collapser = StreamCollapser::new(&mut writer);
            let unflattener = StreamUnflattener::new(collapser);
            let interpreter = self.engine.interpreter(Box::new(unflattener))?;
            let mut reader = JsonRecordReader::new(interpreter);

            for item in records {
                let (id, record) = item?;
                reader.read(&id, &record)?;
            }
            reader.close()?;
            log_info(format!("Read {} records into the transformation", reader.records()));
        }

        log_success(format!("Transformation wrote {} records", writer.records()));
        Ok(writer.into_string())
    }

    /// Demo path: `record` is a JSON array of `[id, record]` pairs.
    pub fn apply_record(&self, record: &str) -> ConversionResult<String> {
        let tuples: Vec<(String, Value)> =
            serde_json::from_str(record).map_err(|e| MalformedInputError::Record(e.to_string()))?;
        self.apply(tuples.into_iter().map(Ok))
    }

    /// Ingested record graphs, rendered to JSON one record at a time.
    pub fn apply_graphs<I>(&self, graphs: I) -> ConversionResult<String>
    where
        I: IntoIterator<Item = RecordItem>,
    {
        let records = graphs.into_iter().flat_map(|item| match item {
            Ok((_, graph)) => graph.records().into_iter().map(Ok).collect::<Vec<_>>(),
            Err(e) => vec![Err(e)],
        });
        self.apply(records)
    }
}

/// Validates `task`, ingests its input data model and transforms it.
pub fn execute_task(
    task: &Task,
    opener: &dyn ResourceOpener,
    base_uri: &str,
    at_most: Option<usize>,
) -> ConversionResult<String> {
    let (_, input) = task.validate()?;
    let flow = TransformationFlow::from_task(task)?;

    log_info(format!(
        "Running task '{}' over data model '{}'",
        task.name.as_deref().unwrap_or("<unnamed>"),
        input.name.as_deref().or(input.id.as_deref()).unwrap_or("<unnamed>")
    ));

    let source = record_source(input, opener, base_uri, at_most)?;
    flow.apply_graphs(source)
}
