//! Error types for the conversion pipeline.
//!
//! One enum per concern, folded into [`ConversionError`]:
//!
//! - [`ConfigurationError`] - bad parameter bag values, raised before any I/O
//! - [`MalformedInputError`] - ragged rows, XML well-formedness failures
//! - [`MissingReferenceError`] - task/job/mapping/data model links that are absent
//! - [`InferenceError`] - invariant violations while walking a record graph
//! - [`TransformError`] - mapping script and interpreter failures
//!
//! `From` conversions let `?` cross every boundary.

use thiserror::Error;

// =============================================================================
// Configuration Errors
// =============================================================================

/// Invalid configuration parameters.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Unsupported Encoding - [{0}]")]
    UnsupportedEncoding(String),

    #[error("The field [{key}] must be a single character only, got '{value}' instead")]
    NotSingleCharacter { key: String, value: String },

    #[error("The field [{key}] must be numeric or a numeric string, got '{value}' instead")]
    NotNumeric { key: String, value: String },

    /// The csv reader only splits rows on `\n`, `\r\n` or a single byte.
    #[error("Unsupported row delimiter '{0}'")]
    UnsupportedRowDelimiter(String),

    #[error("No record tag configured for data model '{0}'")]
    MissingRecordTag(String),

    #[error("Invalid parameter [{key}]: {message}")]
    InvalidParameter { key: String, message: String },
}

// =============================================================================
// Malformed Input Errors
// =============================================================================

/// Input that cannot be converted as-is.
#[derive(Debug, Error)]
pub enum MalformedInputError {
    #[error("wrong number of columns in input line {line} - expected [{expected}] but found [{found}] instead")]
    RaggedRow {
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error("XML is not well-formed at byte {position}: {message}")]
    Xml { position: usize, message: String },

    #[error("Undeclared namespace prefix '{0}'")]
    UnknownPrefix(String),

    #[error("Invalid CSV: {0}")]
    Csv(String),

    #[error("Invalid record payload: {0}")]
    Record(String),
}

// =============================================================================
// Missing Reference Errors
// =============================================================================

/// Broken links between task, job, mappings and data models.
#[derive(Debug, Error)]
pub enum MissingReferenceError {
    #[error("there is no task")]
    Task,

    #[error("there is no job for this task")]
    Job,

    #[error("there are no mappings for this job")]
    Mappings,

    #[error("mapping '{0}' has no input or output attribute path")]
    MappingAttributePath(String),

    #[error("there is no input data model for this task")]
    InputDataModel,

    #[error("there is no data resource for the input data model of this task")]
    DataResource,

    #[error("there is no configuration for the input data model of this task")]
    Configuration,

    #[error("data resource '{0}' has no path attribute")]
    ResourcePath(String),
}

// =============================================================================
// Inference Errors
// =============================================================================

/// A well-formed graph violated an inference invariant.
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("Schema inference defect: {0}")]
    Internal(String),
}

// =============================================================================
// Transformation Errors
// =============================================================================

/// Errors raised while compiling or running a mapping script.
#[derive(Debug, Error)]
pub enum TransformError {
    #[error("Invalid transformation script: {0}")]
    InvalidScript(String),

    #[error("Invalid pattern '{pattern}' in function '{function}': {message}")]
    InvalidPattern {
        function: String,
        pattern: String,
        message: String,
    },

    #[error("Unbalanced stream: {0}")]
    UnbalancedStream(String),

    #[error("Stream stage already closed")]
    Closed,

    #[error("Cannot serialize transformation output: {0}")]
    Output(String),

    /// A record lacked a value for a required target.
    #[error("record '{record}' has no value for required target '{target}'")]
    MissingRequired { record: String, target: String },
}

// =============================================================================
// Conversion Errors (top-level)
// =============================================================================

/// Top-level error returned by readers, encoders and flows.
#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Malformed input: {0}")]
    MalformedInput(#[from] MalformedInputError),

    #[error("Missing reference: {0}")]
    MissingReference(#[from] MissingReferenceError),

    #[error("Inference error: {0}")]
    Inference(#[from] InferenceError),

    #[error("Transform error: {0}")]
    Transform(#[from] TransformError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<csv::Error> for ConversionError {
    fn from(err: csv::Error) -> Self {
        if err.is_io_error() {
            if let csv::ErrorKind::Io(io) = err.into_kind() {
                return ConversionError::Io(io);
            }
            return ConversionError::MalformedInput(MalformedInputError::Csv(
                "I/O failure while reading CSV".to_string(),
            ));
        }
        ConversionError::MalformedInput(MalformedInputError::Csv(err.to_string()))
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

pub type ConfigurationResult<T> = Result<T, ConfigurationError>;

pub type TransformResult<T> = Result<T, TransformError>;

pub type InferenceResult<T> = Result<T, InferenceError>;

/// Result type for readers, encoders and flows.
pub type ConversionResult<T> = Result<T, ConversionError>;
