//! Configuration: the parameter bag, the read-only entities that carry it,
//! and settings validated eagerly before any input is touched.
//!
//! ```text
//! DataModel ──┬── Configuration ── Parameters { "encoding": "UTF-8", ... }
//!             ├── DataResource  ── attributes { "path": "/data/records.xml" }
//!             └── Schema        ── record class
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ConfigurationError, ConfigurationResult};

/// Well-known parameter keys.
pub mod keys {
    pub const ENCODING: &str = "encoding";
    pub const ESCAPE_CHARACTER: &str = "escape_character";
    pub const QUOTE_CHARACTER: &str = "quote_character";
    pub const COLUMN_DELIMITER: &str = "column_delimiter";
    pub const ROW_DELIMITER: &str = "row_delimiter";
    pub const IGNORE_LINES: &str = "ignore_lines";
    pub const DISCARD_ROWS: &str = "discard_rows";
    pub const AT_MOST_ROWS: &str = "at_most_rows";
    pub const RECORD_TAG: &str = "record_tag";
    pub const XML_NAMESPACE: &str = "xml_namespace";
    pub const FIRST_ROW_IS_HEADINGS: &str = "first_row_is_headings";
    pub const STORAGE_TYPE: &str = "storage_type";
    pub const RECORD_ID_ATTRIBUTE: &str = "record_id_attribute";
}

pub const DEFAULT_ENCODING: &str = "UTF-8";
pub const DEFAULT_ESCAPE_CHARACTER: char = '\\';
pub const DEFAULT_QUOTE_CHARACTER: char = '"';
pub const DEFAULT_COLUMN_DELIMITER: char = ';';
pub const DEFAULT_ROW_DELIMITER: &str = "\n";
pub const DEFAULT_IGNORE_LINES: usize = 0;
pub const DEFAULT_DISCARD_ROWS: usize = 0;
pub const DEFAULT_FIRST_ROW_IS_HEADINGS: bool = true;
pub const DEFAULT_RECORD_ID_ATTRIBUTE: &str = "id";

pub const DEFAULT_BASE_URI: &str = "http://data.slub-dresden.de";

// =============================================================================
// Parameter bag
// =============================================================================

/// Opaque key/value parameters of a configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Parameters(pub Map<String, Value>);

impl Parameters {
    pub fn new() -> Self {
        Self(Map::new())
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key).filter(|v| !v.is_null())
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.0.insert(key.to_string(), value.into());
    }

    /// Merge `other` over `self`; keys in `other` win.
    pub fn merged(mut self, other: &Parameters) -> Self {
        for (k, v) in &other.0 {
            self.0.insert(k.clone(), v.clone());
        }
        self
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        self.get(key).map(as_text)
    }

    /// A single character; the two-character sequence `\t` means tab.
    pub fn get_char(&self, key: &str) -> ConfigurationResult<Option<char>> {
        let Some(text) = self.get_string(key) else {
            return Ok(None);
        };

        let mut chars = text.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Ok(Some(c)),
            _ if text == "\\t" => Ok(Some('\t')),
            _ => Err(ConfigurationError::NotSingleCharacter {
                key: key.to_string(),
                value: text,
            }),
        }
    }

    /// A non-negative number, given either as a JSON number or a numeric string.
    pub fn get_number(&self, key: &str) -> ConfigurationResult<Option<usize>> {
        let Some(value) = self.get(key) else {
            return Ok(None);
        };

        let not_numeric = || ConfigurationError::NotNumeric {
            key: key.to_string(),
            value: as_text(value),
        };

        match value {
            Value::Number(n) => n.as_u64().map(|n| Some(n as usize)).ok_or_else(not_numeric),
            other => as_text(other)
                .trim()
                .parse::<usize>()
                .map(Some)
                .map_err(|_| not_numeric()),
        }
    }

    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        match self.get(key) {
            None => default,
            Some(Value::Bool(b)) => *b,
            Some(other) => as_text(other).eq_ignore_ascii_case("true"),
        }
    }
}

fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// =============================================================================
// Entities
// =============================================================================

/// Parameter source attached to a data model.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Configuration {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub parameters: Parameters,
}

impl Configuration {
    pub fn with_parameters(parameters: Parameters) -> Self {
        Self { id: None, name: None, parameters }
    }
}

/// The physical input of a data model.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DataResource {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

impl DataResource {
    pub fn from_path(path: impl Into<String>) -> Self {
        let mut attributes = Map::new();
        attributes.insert("path".to_string(), Value::String(path.into()));
        Self { id: None, name: None, attributes }
    }

    pub fn path(&self) -> Option<&str> {
        self.attributes.get("path").and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Schema {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub record_class: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DataModel {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub configuration: Option<Configuration>,
    #[serde(default)]
    pub data_resource: Option<DataResource>,
    #[serde(default)]
    pub schema: Option<Schema>,
}

impl DataModel {
    pub fn parameters(&self) -> Parameters {
        self.configuration
            .as_ref()
            .map(|c| c.parameters.clone())
            .unwrap_or_default()
    }
}

// =============================================================================
// Accessor seam
// =============================================================================

/// Read-only view over whatever entity carries the conversion parameters.
pub trait DataModelAccessor {
    fn parameter(&self, key: &str) -> Option<&Value>;

    fn data_model_id(&self) -> Option<&str> {
        None
    }

    /// Schema namespace for terms minted without an explicit namespace.
    fn schema_base_uri(&self, _base_uri: &str) -> Option<String> {
        None
    }

    fn record_tag(&self) -> Option<String> {
        self.parameter(keys::RECORD_TAG).map(as_text).filter(|t| !t.is_empty())
    }

    fn record_namespace(&self) -> Option<String> {
        self.parameter(keys::XML_NAMESPACE).map(as_text).filter(|t| !t.is_empty())
    }

    fn record_id_attribute(&self) -> String {
        self.parameter(keys::RECORD_ID_ATTRIBUTE)
            .map(as_text)
            .unwrap_or_else(|| DEFAULT_RECORD_ID_ATTRIBUTE.to_string())
    }
}

impl DataModelAccessor for Parameters {
    fn parameter(&self, key: &str) -> Option<&Value> {
        self.get(key)
    }
}

impl DataModelAccessor for Configuration {
    fn parameter(&self, key: &str) -> Option<&Value> {
        self.parameters.get(key)
    }
}

impl DataModelAccessor for DataModel {
    fn parameter(&self, key: &str) -> Option<&Value> {
        self.configuration.as_ref().and_then(|c| c.parameters.get(key))
    }

    fn data_model_id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn schema_base_uri(&self, base_uri: &str) -> Option<String> {
        let base = data_model_base_uri(self, base_uri)?;
        if base.ends_with('/') {
            Some(format!("{}schema#", base))
        } else {
            Some(format!("{}/schema#", base))
        }
    }
}

/// Base URI of a data model: an absolute resource path, else one derived from
/// the resource id, else from the data model id.
pub fn data_model_base_uri(data_model: &DataModel, base_uri: &str) -> Option<String> {
    let base_uri = base_uri.trim_end_matches('/');
    let resource = data_model.data_resource.as_ref();

    if let Some(path) = resource.and_then(DataResource::path) {
        if crate::uri::is_uri(path) && !path.starts_with("file:") {
            return Some(path.to_string());
        }
    }

    if let Some(id) = resource.and_then(|r| r.id.as_deref()) {
        return Some(format!("{}/resources/{}", base_uri, id));
    }

    data_model
        .id
        .as_deref()
        .map(|id| format!("{}/datamodels/{}", base_uri, id))
}

// =============================================================================
// Process settings
// =============================================================================

/// Process-level settings read from the environment.
#[derive(Debug, Clone)]
pub struct ConverterSettings {
    /// Prefix for every minted URI (`DMP_BASE_URI`)
    pub base_uri: String,
}

impl ConverterSettings {
    pub fn from_env() -> Self {
        let base_uri = std::env::var("DMP_BASE_URI")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URI.to_string());
        Self { base_uri: base_uri.trim_end_matches('/').to_string() }
    }
}

impl Default for ConverterSettings {
    fn default() -> Self {
        Self { base_uri: DEFAULT_BASE_URI.to_string() }
    }
}

// =============================================================================
// Delimited text settings
// =============================================================================

/// How input bytes are turned into text.
#[derive(Debug, Clone, Copy)]
pub enum TextEncoding {
    Fixed(&'static encoding_rs::Encoding),
    /// Guess from the bytes
    Detect,
}

impl TextEncoding {
    pub fn from_label(label: &str) -> ConfigurationResult<Self> {
        if label.eq_ignore_ascii_case("auto") {
            return Ok(TextEncoding::Detect);
        }
        encoding_rs::Encoding::for_label(label.trim().as_bytes())
            .map(TextEncoding::Fixed)
            .ok_or_else(|| ConfigurationError::UnsupportedEncoding(label.to_string()))
    }

    /// Decode `bytes`, dropping a leading byte order mark.
    pub fn decode(&self, bytes: &[u8]) -> String {
        let encoding = match self {
            TextEncoding::Fixed(encoding) => *encoding,
            TextEncoding::Detect => {
                let (charset, _, _) = chardet::detect(bytes);
                encoding_rs::Encoding::for_label(chardet::charset2encoding(&charset).as_bytes())
                    .unwrap_or(encoding_rs::UTF_8)
            }
        };
        let (text, _, _) = encoding.decode(bytes);
        text.into_owned()
    }

    pub fn name(&self) -> &'static str {
        match self {
            TextEncoding::Fixed(encoding) => encoding.name(),
            TextEncoding::Detect => "auto",
        }
    }
}

/// Row delimiter accepted by the csv reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowDelimiter {
    /// `\n` or `\r\n`
    Newline,
    Byte(u8),
}

impl RowDelimiter {
    pub fn parse(text: &str) -> ConfigurationResult<Self> {
        match text {
            "\n" | "\r\n" | "\\n" | "\\r\\n" => Ok(RowDelimiter::Newline),
            "\\r" => Ok(RowDelimiter::Byte(b'\r')),
            other if other.len() == 1 => Ok(RowDelimiter::Byte(other.as_bytes()[0])),
            other => Err(ConfigurationError::UnsupportedRowDelimiter(other.escape_default().to_string())),
        }
    }

    pub fn terminator(&self) -> csv::Terminator {
        match self {
            RowDelimiter::Newline => csv::Terminator::CRLF,
            RowDelimiter::Byte(b) => csv::Terminator::Any(*b),
        }
    }

    pub fn as_str(&self) -> String {
        match self {
            RowDelimiter::Newline => "\n".to_string(),
            RowDelimiter::Byte(b) => (*b as char).to_string(),
        }
    }
}

/// Validated delimited-text settings.
#[derive(Debug, Clone)]
pub struct CsvSettings {
    pub encoding: TextEncoding,
    pub escape_character: u8,
    pub quote_character: u8,
    pub column_delimiter: u8,
    pub row_delimiter: RowDelimiter,
    pub ignore_lines: usize,
    pub discard_rows: usize,
    pub at_most_rows: Option<usize>,
    pub first_row_is_headings: bool,
}

impl CsvSettings {
    /// Validate every delimited-text parameter up front.
    pub fn from_parameters(parameters: &Parameters) -> ConfigurationResult<Self> {
        let encoding_label = parameters
            .get_string(keys::ENCODING)
            .unwrap_or_else(|| DEFAULT_ENCODING.to_string());

        let escape = parameters.get_char(keys::ESCAPE_CHARACTER)?.unwrap_or(DEFAULT_ESCAPE_CHARACTER);
        let quote = parameters.get_char(keys::QUOTE_CHARACTER)?.unwrap_or(DEFAULT_QUOTE_CHARACTER);
        let column = parameters.get_char(keys::COLUMN_DELIMITER)?.unwrap_or(DEFAULT_COLUMN_DELIMITER);
        let row = parameters
            .get_string(keys::ROW_DELIMITER)
            .unwrap_or_else(|| DEFAULT_ROW_DELIMITER.to_string());

        Ok(Self {
            encoding: TextEncoding::from_label(&encoding_label)?,
            escape_character: single_byte(keys::ESCAPE_CHARACTER, escape)?,
            quote_character: single_byte(keys::QUOTE_CHARACTER, quote)?,
            column_delimiter: single_byte(keys::COLUMN_DELIMITER, column)?,
            row_delimiter: RowDelimiter::parse(&row)?,
            ignore_lines: parameters.get_number(keys::IGNORE_LINES)?.unwrap_or(DEFAULT_IGNORE_LINES),
            discard_rows: parameters.get_number(keys::DISCARD_ROWS)?.unwrap_or(DEFAULT_DISCARD_ROWS),
            at_most_rows: parameters.get_number(keys::AT_MOST_ROWS)?,
            first_row_is_headings: parameters
                .get_bool(keys::FIRST_ROW_IS_HEADINGS, DEFAULT_FIRST_ROW_IS_HEADINGS),
        })
    }
}

impl Default for CsvSettings {
    fn default() -> Self {
        Self {
            encoding: TextEncoding::Fixed(encoding_rs::UTF_8),
            escape_character: DEFAULT_ESCAPE_CHARACTER as u8,
            quote_character: DEFAULT_QUOTE_CHARACTER as u8,
            column_delimiter: DEFAULT_COLUMN_DELIMITER as u8,
            row_delimiter: RowDelimiter::Newline,
            ignore_lines: DEFAULT_IGNORE_LINES,
            discard_rows: DEFAULT_DISCARD_ROWS,
            at_most_rows: None,
            first_row_is_headings: DEFAULT_FIRST_ROW_IS_HEADINGS,
        }
    }
}

fn single_byte(key: &str, c: char) -> ConfigurationResult<u8> {
    if c.is_ascii() {
        Ok(c as u8)
    } else {
        Err(ConfigurationError::InvalidParameter {
            key: key.to_string(),
            message: format!("'{}' is not an ASCII character", c),
        })
    }
}
