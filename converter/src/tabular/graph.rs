//! Rows to record graphs.

use std::sync::Arc;

use super::reader::Row;
use super::RowEncoder;
use crate::error::ConversionResult;
use crate::models::{Model, Node, NodeKey, OrderCounter, RecordGraph, Statement, RDF_TYPE};
use crate::uri::{Interner, UriMinter};

/// One record per row, one literal statement per present column.
///
/// The row number is the record identifier. Column predicates and the
/// record class are minted under the minter's default namespace.
pub struct CsvGraphEncoder {
    minter: UriMinter,
    interner: Interner,
    record_class: Arc<str>,
}

impl CsvGraphEncoder {
    pub fn new(mut minter: UriMinter) -> Self {
        let record_class = minter.term_uri(None, "RecordType");
        Self { minter, interner: Interner::new(), record_class }
    }

    pub fn record_class(&self) -> &str {
        &self.record_class
    }
}

impl RowEncoder for CsvGraphEncoder {
    type Output = RecordGraph;

    fn encode(&mut self, header: &[String], row: &Row) -> ConversionResult<RecordGraph> {
        let uri: Arc<str> = self.minter.record_uri(Some(&row.number.to_string())).into();
        let subject = NodeKey::Uri(uri.clone());
        let mut order = OrderCounter::new();
        let mut model = Model::new();
        let resource = model.resource_mut(&uri);

        let rdf_type = self.interner.predicate(&Arc::from(RDF_TYPE));
        resource.add_statement(Statement {
            subject: subject.node(),
            order: order.next(&subject, &rdf_type),
            predicate: rdf_type,
            object: Node::Resource(self.record_class.clone()),
        });

        for (column, value) in row.present(header) {
            let predicate_uri = self.minter.term_uri(None, column);
            let predicate = self.interner.predicate(&predicate_uri);
            resource.add_statement(Statement {
                subject: subject.node(),
                order: order.next(&subject, &predicate),
                predicate,
                object: Node::Literal(value.to_string()),
            });
        }

        Ok(RecordGraph::new(model, uri, Some(self.record_class.clone())))
    }
}
