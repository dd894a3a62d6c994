//! Lazy record sources for a data model.
//!
//! ```text
//! DataModel ──▶ storage type ──┬─ xml ──▶ XmlRecordReader ──┐
//!     │                        ├─ csv ──▶ CsvGraphEncoder ──┼──▶ (record uri, RecordGraph)*
//!     └─ DataResource ─opener──┘                            │        take(at_most)
//!                              └─ other ──▶ (empty) ────────┘
//! ```
//!
//! Sources are cold: nothing is opened until [`record_source`] is called and
//! nothing is read until the iterator is pulled. Dropping the iterator (or
//! the stream from [`record_stream`]) stops the scan.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::config::{keys, CsvSettings, DataModel, DataModelAccessor, DataResource};
use crate::error::{ConversionResult, MissingReferenceError};
use crate::logs::{log_debug, log_info, log_warning};
use crate::models::RecordGraph;
use crate::tabular::{encode_lazily, CsvGraphEncoder, CsvRowReader};
use crate::uri::UriMinter;
use crate::xml;

/// Records buffered between the blocking reader and an async consumer.
const STREAM_BUFFER: usize = 32;

/// A record graph keyed by its record URI.
pub type RecordItem = ConversionResult<(String, RecordGraph)>;

/// Boxed lazy sequence of records.
pub type RecordSource = Box<dyn Iterator<Item = RecordItem> + Send>;

// =============================================================================
// Storage types
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageType {
    Xml,
    Csv,
}

impl StorageType {
    /// `None` for labels no reader exists for.
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim().to_ascii_lowercase();
        match label.as_str() {
            "xml" | "mabxml" | "marcxml" | "marc21" | "pnx" | "mods" => Some(StorageType::Xml),
            "csv" | "tsv" => Some(StorageType::Csv),
            other if other.starts_with("oai-pmh") => Some(StorageType::Xml),
            _ => None,
        }
    }

    /// From the `storage_type` parameter, else from the resource's file extension.
    pub fn of(data_model: &DataModel) -> Option<Self> {
        if let Some(label) = data_model.parameter(keys::STORAGE_TYPE).and_then(|v| v.as_str()) {
            return Self::from_label(label);
        }

        let path = data_model.data_resource.as_ref().and_then(DataResource::path)?;
        let extension = Path::new(path).extension()?.to_str()?;
        Self::from_label(extension)
    }
}

// =============================================================================
// Resource opener seam
// =============================================================================

/// Opens the bytes behind a data resource.
pub trait ResourceOpener: Send + Sync {
    fn open(&self, resource: &DataResource) -> ConversionResult<Box<dyn BufRead + Send>>;
}

/// Reads the resource's `path` attribute from the local file system.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileOpener;

impl ResourceOpener for FileOpener {
    fn open(&self, resource: &DataResource) -> ConversionResult<Box<dyn BufRead + Send>> {
        let path = resource.path().ok_or_else(|| {
            MissingReferenceError::ResourcePath(resource.id.clone().unwrap_or_else(|| "<unsaved>".to_string()))
        })?;
        let path = path.strip_prefix("file://").unwrap_or(path);
        Ok(Box::new(BufReader::new(File::open(path)?)))
    }
}

// =============================================================================
// Sources
// =============================================================================

/// Lazy `(record uri, graph)` pairs for `data_model`, capped at `at_most`.
///
/// An unknown storage type yields an empty source, not an error.
pub fn record_source(
    data_model: &DataModel,
    opener: &dyn ResourceOpener,
    base_uri: &str,
    at_most: Option<usize>,
) -> ConversionResult<RecordSource> {
    let Some(storage_type) = StorageType::of(data_model) else {
        log_warning(format!(
            "no reader for storage type of data model '{}', nothing to ingest",
            data_model.id.as_deref().unwrap_or("<unsaved>")
        ));
        return Ok(Box::new(std::iter::empty()));
    };

    let resource = data_model
        .data_resource
        .as_ref()
        .ok_or(MissingReferenceError::DataResource)?;

    log_info(format!(
        "Ingesting {:?} resource {}",
        storage_type,
        resource.path().unwrap_or("<no path>")
    ));

    let source: RecordSource = match storage_type {
        StorageType::Xml => {
            // configuration errors surface before the resource is opened
            xml::record_boundary(data_model)?;
            let input = opener.open(resource)?;
            let records = xml::read_records(input, data_model, base_uri)?;
            Box::new(records.map(|graph| graph.map(keyed)))
        }
        StorageType::Csv => {
            let settings = CsvSettings::from_parameters(&data_model.parameters())?;
            let input = opener.open(resource)?;
            let rows = CsvRowReader::from_reader(input, &settings)?;
            let encoder = CsvGraphEncoder::new(UriMinter::for_data_model(base_uri, data_model));
            Box::new(encode_lazily(rows, encoder).map(|graph| graph.map(keyed)))
        }
    };

    Ok(match at_most {
        Some(limit) => {
            log_debug(format!("record source capped at {}", limit));
            Box::new(source.take(limit))
        }
        None => source,
    })
}

fn keyed(graph: RecordGraph) -> (String, RecordGraph) {
    let uri = graph.record_uri().unwrap_or_default().to_string();
    (uri, graph)
}

/// [`record_source`] driven on a blocking worker and delivered as a stream.
///
/// The worker stops once the stream is dropped.
pub fn record_stream(
    data_model: DataModel,
    opener: Arc<dyn ResourceOpener>,
    base_uri: String,
    at_most: Option<usize>,
) -> ReceiverStream<RecordItem> {
    let (tx, rx) = mpsc::channel(STREAM_BUFFER);

    tokio::task::spawn_blocking(move || {
        let source = match record_source(&data_model, opener.as_ref(), &base_uri, at_most) {
            Ok(source) => source,
            Err(e) => {
                let _ = tx.blocking_send(Err(e));
                return;
            }
        };

        for item in source {
            if tx.blocking_send(item).is_err() {
                log_debug("record stream consumer dropped, stopping");
                break;
            }
        }
    });

    ReceiverStream::new(rx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Configuration, Parameters, DEFAULT_BASE_URI};
    use crate::error::{ConfigurationError, ConversionError};
    use std::io::Write;
    use tokio_stream::StreamExt;

    fn data_model(path: &str, parameters: Parameters) -> DataModel {
        DataModel {
            id: Some("7".to_string()),
            configuration: Some(Configuration::with_parameters(parameters)),
            data_resource: Some(DataResource::from_path(path)),
            ..Default::default()
        }
    }

    fn write_temp(suffix: &str, content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    fn xml_input(records: usize) -> String {
        let mut xml = String::from("<records>");
        for i in 0..records {
            xml.push_str(&format!("<rec id=\"{}\"><title>T{}</title></rec>", i, i));
        }
        xml.push_str("</records>");
        xml
    }

    #[test]
    fn test_storage_type_labels() {
        assert_eq!(StorageType::from_label("MARCXML"), Some(StorageType::Xml));
        assert_eq!(StorageType::from_label("oai-pmh+marcxml"), Some(StorageType::Xml));
        assert_eq!(StorageType::from_label("csv"), Some(StorageType::Csv));
        assert_eq!(StorageType::from_label("json"), None);
    }

    #[test]
    fn test_xml_file_source() {
        let file = write_temp(".xml", &xml_input(3));
        let params = Parameters::new().with(keys::RECORD_TAG, "rec");
        let dm = data_model(file.path().to_str().unwrap(), params);

        let records: Vec<_> = record_source(&dm, &FileOpener, DEFAULT_BASE_URI, None)
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].0, "http://data.slub-dresden.de/datamodels/7/records/0");
    }

    #[test]
    fn test_csv_file_source_by_storage_type() {
        let file = write_temp(".txt", "id;name\n1;Alice\n2;Bob\n");
        let params = Parameters::new().with(keys::STORAGE_TYPE, "csv");
        let dm = data_model(file.path().to_str().unwrap(), params);

        let records: Vec<_> = record_source(&dm, &FileOpener, DEFAULT_BASE_URI, None)
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].1.records()[0].1["name"], "Bob");
    }

    #[test]
    fn test_at_most_caps_records() {
        let file = write_temp(".xml", &xml_input(10));
        let params = Parameters::new().with(keys::RECORD_TAG, "rec");
        let dm = data_model(file.path().to_str().unwrap(), params);

        let source = record_source(&dm, &FileOpener, DEFAULT_BASE_URI, Some(4)).unwrap();
        assert_eq!(source.count(), 4);
    }

    #[test]
    fn test_unknown_storage_type_is_empty() {
        let params = Parameters::new().with(keys::STORAGE_TYPE, "json");
        let dm = data_model("/does/not/exist.json", params);
        let source = record_source(&dm, &FileOpener, DEFAULT_BASE_URI, None).unwrap();
        assert_eq!(source.count(), 0);
    }

    #[test]
    fn test_configuration_checked_before_open() {
        let dm = data_model("/does/not/exist.xml", Parameters::new());
        let err = record_source(&dm, &FileOpener, DEFAULT_BASE_URI, None).err().unwrap();
        assert!(matches!(err, ConversionError::Configuration(ConfigurationError::MissingRecordTag(_))));
    }

    #[tokio::test]
    async fn test_record_stream() {
        let file = write_temp(".xml", &xml_input(5));
        let params = Parameters::new().with(keys::RECORD_TAG, "rec");
        let dm = data_model(file.path().to_str().unwrap(), params);

        let stream = record_stream(dm, Arc::new(FileOpener), DEFAULT_BASE_URI.to_string(), Some(2));
        let records: Vec<_> = stream.collect().await;
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.is_ok()));
    }
}
