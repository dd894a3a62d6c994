//! # dmp-converter - record graphs from XML and CSV sources
//!
//! Turns XML documents and delimited text into Graph Data Model (GDM)
//! records, infers attribute paths and schemas from them, and runs mapping
//! tasks over them.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐     ┌─────────────┐     ┌──────────────┐     ┌──────────────┐
//! │ XML / CSV  │────▶│   Encoder   │────▶│ RecordGraph  │──┬─▶│ JSON records │
//! │  resource  │     │ (xml / tab) │     │ (uri, model) │  │  └──────────────┘
//! └────────────┘     └─────────────┘     └──────────────┘  ├─▶ attribute paths / schema
//!                                                          └─▶ TransformationFlow ─▶ "[...]"
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use dmp_converter::{record_source, DataModel, FileOpener, DEFAULT_BASE_URI};
//!
//! let data_model: DataModel = serde_json::from_str(&std::fs::read_to_string("model.json")?)?;
//! for record in record_source(&data_model, &FileOpener, DEFAULT_BASE_URI, Some(10))? {
//!     let (uri, graph) = record?;
//!     println!("{} -> {}", uri, graph.to_json());
//! }
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Error types per concern and the top-level `ConversionError`
//! - [`config`] - Parameter bags, data model entities, CSV settings
//! - [`logs`] - Log broadcaster
//! - [`uri`] - URI minting and predicate interning
//! - [`models`] - Graph model and record graphs
//! - [`xml`] - XML record encoder
//! - [`tabular`] - Delimited text reader and row encoders
//! - [`schema`] - Attribute path and schema inference
//! - [`ingest`] - Lazy record sources per data model
//! - [`transform`] - Stream stages, matrix scripts, tasks and flows

// Core modules
pub mod config;
pub mod error;
pub mod logs;

// Graph model
pub mod models;
pub mod uri;

// Encoders
pub mod tabular;
pub mod xml;

// Inference
pub mod schema;

// Ingestion and transformation
pub mod ingest;
pub mod transform;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    ConfigurationError,
    ConfigurationResult,
    ConversionError,
    ConversionResult,
    InferenceError,
    InferenceResult,
    MalformedInputError,
    MissingReferenceError,
    TransformError,
    TransformResult,
};

// =============================================================================
// Re-exports - Configuration
// =============================================================================

pub use config::{
    keys,
    Configuration,
    ConverterSettings,
    CsvSettings,
    DataModel,
    DataModelAccessor,
    DataResource,
    Parameters,
    Schema,
    DEFAULT_BASE_URI,
};

// =============================================================================
// Re-exports - Graph model
// =============================================================================

pub use models::{Model, Node, Predicate, RecordGraph, Resource, Statement};
pub use uri::{Interner, UriMinter};

// =============================================================================
// Re-exports - Encoders
// =============================================================================

pub use tabular::{
    encode_lazily,
    encode_rows,
    CsvGraphEncoder,
    CsvJsonEncoder,
    CsvRowReader,
    CsvTextEncoder,
    Row,
    RowEncoder,
};
pub use xml::{read_records, XmlRecordEncoder, XmlRecordReader};

// =============================================================================
// Re-exports - Schema inference
// =============================================================================

pub use schema::{
    generate_schema,
    infer_attribute_paths,
    infer_attribute_paths_concurrently,
    schema_paths,
    AttributePath,
    AttributePathSet,
};

// =============================================================================
// Re-exports - Ingestion
// =============================================================================

pub use ingest::{record_source, record_stream, FileOpener, RecordItem, RecordSource, ResourceOpener, StorageType};

// =============================================================================
// Re-exports - Transformation
// =============================================================================

pub use transform::{
    example_script,
    execute_task,
    functions_description,
    MatrixEngine,
    MatrixScript,
    MatrixScriptBuilder,
    ScriptEngine,
    Task,
    TransformationFlow,
};
