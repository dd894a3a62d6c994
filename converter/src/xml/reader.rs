//! quick-xml driver for [`XmlRecordEncoder`].
//!
//! Pulls events lazily, resolves namespace prefixes against the in-scope
//! declarations and yields one record graph as soon as it closes.

use std::collections::HashMap;
use std::io::BufRead;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::encoder::{XmlAttribute, XmlName, XmlRecordEncoder};
use crate::error::{ConversionError, ConversionResult, MalformedInputError};
use crate::models::RecordGraph;

const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";
const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Iterator of record graphs over an XML byte stream.
pub struct XmlRecordReader<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    encoder: XmlRecordEncoder,
    /// One map of prefix declarations per open element
    scopes: Vec<HashMap<String, String>>,
    done: bool,
}

impl<R: BufRead> XmlRecordReader<R> {
    pub fn new(mut input: R, encoder: XmlRecordEncoder) -> ConversionResult<Self> {
        skip_bom(&mut input)?;
        Ok(Self {
            reader: Reader::from_reader(input),
            buf: Vec::new(),
            encoder,
            scopes: Vec::new(),
            done: false,
        })
    }

    pub fn records_emitted(&self) -> usize {
        self.encoder.records_emitted()
    }

    fn next_record(&mut self) -> ConversionResult<Option<RecordGraph>> {
        loop {
            self.buf.clear();
            let event = self.reader.read_event_into(&mut self.buf).map_err(|e| {
                MalformedInputError::Xml {
                    position: self.reader.buffer_position(),
                    message: e.to_string(),
                }
            })?;

            match event {
                Event::Start(e) => {
                    let (name, attributes) = open_scope(&mut self.scopes, &e, self.reader.buffer_position())?;
                    self.encoder.start_element(&name, &attributes);
                }
                Event::Empty(e) => {
                    let (name, attributes) = open_scope(&mut self.scopes, &e, self.reader.buffer_position())?;
                    self.encoder.start_element(&name, &attributes);
                    self.scopes.pop();
                    if let Some(graph) = self.encoder.end_element(&name) {
                        return Ok(Some(graph));
                    }
                }
                Event::End(e) => {
                    let qname = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    let name = resolve_element(&self.scopes, &qname)?;
                    self.scopes.pop();
                    if let Some(graph) = self.encoder.end_element(&name) {
                        return Ok(Some(graph));
                    }
                }
                Event::Text(e) => {
                    if self.encoder.is_in_record() {
                        let text = e.unescape().map_err(|err| MalformedInputError::Xml {
                            position: self.reader.buffer_position(),
                            message: err.to_string(),
                        })?;
                        self.encoder.characters(&text);
                    }
                }
                Event::CData(e) => {
                    if self.encoder.is_in_record() {
                        let raw = e.into_inner();
                        self.encoder.characters(&String::from_utf8_lossy(&raw));
                    }
                }
                Event::Eof => {
                    if self.encoder.is_in_record() {
                        return Err(MalformedInputError::Xml {
                            position: self.reader.buffer_position(),
                            message: "unexpected end of document inside a record".to_string(),
                        }
                        .into());
                    }
                    return Ok(None);
                }
                _ => {}
            }
        }
    }
}

impl<R: BufRead> Iterator for XmlRecordReader<R> {
    type Item = ConversionResult<RecordGraph>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_record() {
            Ok(Some(graph)) => Some(Ok(graph)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

fn skip_bom<R: BufRead>(input: &mut R) -> ConversionResult<()> {
    let has_bom = input.fill_buf()?.starts_with(UTF8_BOM);
    if has_bom {
        input.consume(UTF8_BOM.len());
    }
    Ok(())
}

fn split_qname(qname: &str) -> (Option<&str>, &str) {
    match qname.split_once(':') {
        Some((prefix, local)) => (Some(prefix), local),
        None => (None, qname),
    }
}

fn lookup<'a>(scopes: &'a [HashMap<String, String>], prefix: &str) -> Option<&'a str> {
    scopes.iter().rev().find_map(|scope| scope.get(prefix)).map(String::as_str)
}

fn resolve_element(scopes: &[HashMap<String, String>], qname: &str) -> ConversionResult<XmlName> {
    let (prefix, local) = split_qname(qname);
    match prefix {
        None => Ok(XmlName::new(lookup(scopes, ""), local)),
        Some("xml") => Ok(XmlName::new(Some(XML_NAMESPACE), local)),
        Some(p) => lookup(scopes, p)
            .map(|ns| XmlName::new(Some(ns), local))
            .ok_or_else(|| ConversionError::from(MalformedInputError::UnknownPrefix(p.to_string()))),
    }
}

/// Push the element's namespace declarations and resolve its names.
///
/// Unprefixed attributes take the namespace of their element.
fn open_scope(
    scopes: &mut Vec<HashMap<String, String>>,
    element: &BytesStart<'_>,
    position: usize,
) -> ConversionResult<(XmlName, Vec<XmlAttribute>)> {
    let mut declarations = HashMap::new();
    let mut raw_attributes = Vec::new();

    for attribute in element.attributes() {
        let attribute = attribute.map_err(|e| MalformedInputError::Xml {
            position,
            message: e.to_string(),
        })?;
        let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
        let value = attribute
            .unescape_value()
            .map_err(|e| MalformedInputError::Xml { position, message: e.to_string() })?
            .into_owned();

        if key == "xmlns" {
            declarations.insert(String::new(), value);
        } else if let Some(prefix) = key.strip_prefix("xmlns:") {
            declarations.insert(prefix.to_string(), value);
        } else {
            raw_attributes.push((key, value));
        }
    }
    scopes.push(declarations);

    let qname = String::from_utf8_lossy(element.name().as_ref()).into_owned();
    let name = resolve_element(scopes, &qname)?;

    let mut attributes = Vec::with_capacity(raw_attributes.len());
    for (key, value) in raw_attributes {
        let attr_name = match split_qname(&key) {
            (None, local) => XmlName::new(name.namespace.as_deref(), local),
            _ => resolve_element(scopes, &key)?,
        };
        attributes.push(XmlAttribute::new(attr_name, value));
    }

    Ok((name, attributes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Node;
    use crate::uri::UriMinter;
    use crate::xml::RecordBoundary;
    use serde_json::json;

    fn reader<'a>(xml: &'a str, tag: &str) -> XmlRecordReader<&'a [u8]> {
        let minter = UriMinter::new("http://data.slub-dresden.de", None, Some("http://ex.org/schema#"));
        let encoder = XmlRecordEncoder::new(RecordBoundary::new(tag), minter);
        XmlRecordReader::new(xml.as_bytes(), encoder).unwrap()
    }

    #[test]
    fn test_single_record_document() {
        let xml = r#"<records><rec id="1"><title>A</title><author>X</author></rec></records>"#;
        let graphs: Vec<_> = reader(xml, "rec").collect::<Result<_, _>>().unwrap();
        assert_eq!(graphs.len(), 1);

        let graph = &graphs[0];
        let resource = graph.record_resources().next().unwrap();
        assert_eq!(resource.statements().iter().filter(|s| s.object.is_literal()).count(), 2);
        assert_eq!(
            graph.to_json(),
            json!([{ "http://data.slub-dresden.de/records/1": { "title": "A", "author": "X" } }])
        );
    }

    #[test]
    fn test_bom_and_namespaces() {
        let xml = "\u{FEFF}<?xml version=\"1.0\"?>\
            <m:collection xmlns:m=\"http://www.loc.gov/MARC21/slim\">\
              <m:record id=\"a\"><m:leader>00000nam</m:leader><m:subfield code=\"a\">T</m:subfield></m:record>\
              <m:record id=\"b\"><m:leader>00001nam</m:leader></m:record>\
            </m:collection>";
        let graphs: Vec<_> = reader(xml, "record").collect::<Result<_, _>>().unwrap();
        assert_eq!(graphs.len(), 2);

        let resource = graphs[0].record_resources().next().unwrap();
        assert!(resource
            .statements()
            .iter()
            .any(|s| s.predicate.uri() == "http://www.loc.gov/MARC21/slim#leader"));
        assert_eq!(
            &**graphs[0].record_class_uri.as_ref().unwrap(),
            "http://www.loc.gov/MARC21/slim#recordType"
        );

        let body = &graphs[0].records()[0].1;
        assert_eq!(body["subfield"]["code"], "a");
        assert_eq!(body["subfield"]["value"], "T");
    }

    #[test]
    fn test_attributes_take_element_namespace() {
        let xml = "<m:collection xmlns:m=\"http://www.loc.gov/MARC21/slim\">\
              <m:record><m:datafield tag=\"245\"><m:subfield code=\"a\">T</m:subfield></m:datafield></m:record>\
            </m:collection>";
        let graphs: Vec<_> = reader(xml, "record").collect::<Result<_, _>>().unwrap();
        let predicates: Vec<&str> = graphs[0]
            .record_resources()
            .next()
            .unwrap()
            .statements()
            .iter()
            .map(|s| s.predicate.uri())
            .collect();
        assert!(predicates.contains(&"http://www.loc.gov/MARC21/slim#tag"));
        assert!(predicates.contains(&"http://www.loc.gov/MARC21/slim#code"));
        assert!(!predicates.iter().any(|p| p.starts_with("http://ex.org/schema#")));

        let body = &graphs[0].records()[0].1;
        assert_eq!(body["datafield"]["tag"], "245");
        assert_eq!(body["datafield"]["subfield"]["code"], "a");
    }

    #[test]
    fn test_unqualified_element_attributes_use_schema_namespace() {
        let xml = r#"<list><rec id="1"><item kind="x"/></rec></list>"#;
        let graphs: Vec<_> = reader(xml, "rec").collect::<Result<_, _>>().unwrap();
        let resource = graphs[0].record_resources().next().unwrap();
        assert!(resource
            .statements()
            .iter()
            .any(|s| s.predicate.uri() == "http://ex.org/schema#kind"));
    }

    #[test]
    fn test_repeated_siblings_and_nested_entities_are_ordered() {
        let xml = r#"<records><rec id="1">
            <subject>a</subject>
            <creator><name>X</name></creator>
            <subject>b</subject>
            <creator><name>Y</name><name>Z</name></creator>
            <subject>c</subject>
        </rec></records>"#;
        let graphs: Vec<_> = reader(xml, "rec").collect::<Result<_, _>>().unwrap();
        let resource = graphs[0].record_resources().next().unwrap();

        let orders = |local: &str| -> Vec<u64> {
            resource
                .statements()
                .iter()
                .filter(|s| s.predicate.local_name() == local)
                .map(|s| s.order)
                .collect()
        };
        assert_eq!(orders("subject"), vec![1, 2, 3]);
        assert_eq!(orders("creator"), vec![1, 2]);
        assert_eq!(orders("name"), vec![1, 1, 2]);

        let creators: Vec<&Node> = resource
            .statements()
            .iter()
            .filter(|s| s.predicate.local_name() == "creator")
            .map(|s| &s.object)
            .collect();
        assert_eq!(creators.len(), 2);
        assert_ne!(creators[0], creators[1]);

        let body = &graphs[0].records()[0].1;
        assert_eq!(body["subject"], json!(["a", "b", "c"]));
        assert_eq!(body["creator"][0]["name"], "X");
        assert_eq!(body["creator"][1]["name"], json!(["Y", "Z"]));
    }

    #[test]
    fn test_self_closing_record() {
        let xml = r#"<list><rec id="7" kind="x"/><rec id="8"/></list>"#;
        let graphs: Vec<_> = reader(xml, "rec").collect::<Result<_, _>>().unwrap();
        assert_eq!(graphs.len(), 2);
        assert_eq!(graphs[0].records()[0].1, json!({ "kind": "x" }));
    }

    #[test]
    fn test_malformed_document() {
        let xml = r#"<records><rec id="1"><title>A</rec></records>"#;
        let results: Vec<_> = reader(xml, "rec").collect();
        assert_eq!(results.len(), 1);
        assert!(matches!(results[0], Err(ConversionError::MalformedInput(_))));
    }

    #[test]
    fn test_attribute_errors_report_position() {
        let xml = r#"<records><rec id="1" id="2"/></records>"#;
        let results: Vec<_> = reader(xml, "rec").collect();
        match &results[0] {
            Err(ConversionError::MalformedInput(MalformedInputError::Xml { position, .. })) => {
                assert!(*position > 0)
            }
            other => panic!("expected an XML error, got {:?}", other.as_ref().map(|g| g.record_uri())),
        }
    }

    #[test]
    fn test_undeclared_prefix() {
        let xml = r#"<records><rec><x:title>A</x:title></rec></records>"#;
        let results: Vec<_> = reader(xml, "rec").collect();
        assert!(matches!(
            results[0],
            Err(ConversionError::MalformedInput(MalformedInputError::UnknownPrefix(_)))
        ));
    }

    #[test]
    fn test_lazy_pull() {
        let mut xml = String::from("<records>");
        for i in 0..50 {
            xml.push_str(&format!("<rec id=\"{}\"><v>{}</v></rec>", i, i));
        }
        xml.push_str("</records>");

        let mut records = reader(&xml, "rec");
        let first: Vec<_> = records.by_ref().take(3).collect::<Result<_, _>>().unwrap();
        assert_eq!(first.len(), 3);
        assert_eq!(records.records_emitted(), 3);
    }
}
