//! XML sources to record graphs.
//!
//! ```text
//! bytes ──▶ XmlRecordReader (quick-xml, namespaces) ──▶ XmlRecordEncoder ──▶ RecordGraph*
//! ```

mod encoder;
mod reader;

pub use encoder::{RecordBoundary, XmlAttribute, XmlName, XmlRecordEncoder};
pub use reader::XmlRecordReader;

use std::io::BufRead;

use crate::config::DataModelAccessor;
use crate::error::{ConfigurationError, ConversionResult};
use crate::uri::UriMinter;

/// Record boundary from the accessor's `record_tag`, `xml_namespace` and
/// `record_id_attribute` parameters.
pub fn record_boundary(accessor: &dyn DataModelAccessor) -> ConversionResult<RecordBoundary> {
    let tag = accessor.record_tag().ok_or_else(|| {
        ConfigurationError::MissingRecordTag(accessor.data_model_id().unwrap_or("<unsaved>").to_string())
    })?;

    Ok(RecordBoundary::new(&tag)
        .with_namespace(accessor.record_namespace())
        .with_id_attribute(accessor.record_id_attribute()))
}

/// Lazy record graphs for one XML input, configured from `accessor`.
pub fn read_records<R: BufRead>(
    input: R,
    accessor: &dyn DataModelAccessor,
    base_uri: &str,
) -> ConversionResult<XmlRecordReader<R>> {
    let boundary = record_boundary(accessor)?;
    let minter = UriMinter::for_data_model(base_uri, accessor);
    XmlRecordReader::new(input, XmlRecordEncoder::new(boundary, minter))
}
