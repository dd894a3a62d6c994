//! Identifier minting and predicate interning.
//!
//! A [`UriMinter`] lives for one encoding run. Every URI it derives for a
//! logical name is memoized, so the same name always yields the same
//! `Arc<str>` within the run:
//!
//! ```text
//! record id "42"          → <base>/datamodels/<dm>/records/42
//! (ns, "title")           → ns#title   (or ns + title when ns ends in '/')
//! (none, "title")         → <schema base>#title
//! predicate p             → pType
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use uuid::Uuid;

use crate::config::DataModelAccessor;
use crate::models::Predicate;

/// Index of an interned term within one run.
pub type TermId = u32;

/// `true` when `candidate` carries a URI scheme and nothing a URI parser
/// would reject. Parse failures mean "not a URI", never an error.
pub fn is_uri(candidate: &str) -> bool {
    let Some((scheme, rest)) = candidate.split_once(':') else {
        return false;
    };

    let mut scheme_chars = scheme.chars();
    let scheme_ok = scheme_chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && scheme_chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));

    scheme_ok
        && !rest.is_empty()
        && !rest
            .chars()
            .any(|c| c.is_whitespace() || c.is_control() || matches!(c, '<' | '>' | '"' | '{' | '}' | '|' | '\\' | '^' | '`'))
}

/// Join a namespace and a local name.
pub fn join(namespace: &str, local: &str) -> String {
    if namespace.ends_with('/') || namespace.ends_with('#') || local.starts_with('#') {
        format!("{}{}", namespace, local)
    } else {
        format!("{}#{}", namespace, local)
    }
}

/// The part of a URI after its last `#` or `/`.
pub fn local_name(uri: &str) -> &str {
    match uri.rfind(|c: char| c == '#' || c == '/') {
        Some(pos) if pos + 1 < uri.len() => &uri[pos + 1..],
        _ => uri,
    }
}

/// Mints record, term and type URIs for one encoding run.
#[derive(Debug)]
pub struct UriMinter {
    base_uri: String,
    data_model_id: Option<String>,
    default_namespace: String,
    terms: HashMap<(String, String), Arc<str>>,
    types: HashMap<Arc<str>, Arc<str>>,
}

impl UriMinter {
    pub fn new(base_uri: &str, data_model_id: Option<&str>, schema_base_uri: Option<&str>) -> Self {
        let base_uri = base_uri.trim_end_matches('/').to_string();
        let default_namespace = match schema_base_uri {
            Some(schema) => schema.to_string(),
            None => format!("{}/datamodels/{}/schema#", base_uri, Uuid::new_v4()),
        };

        Self {
            base_uri,
            data_model_id: data_model_id.map(str::to_string),
            default_namespace,
            terms: HashMap::new(),
            types: HashMap::new(),
        }
    }

    pub fn for_data_model(base_uri: &str, accessor: &dyn DataModelAccessor) -> Self {
        let schema = accessor.schema_base_uri(base_uri);
        Self::new(base_uri, accessor.data_model_id(), schema.as_deref())
    }

    /// Namespace used for names that arrive without one.
    pub fn default_namespace(&self) -> &str {
        &self.default_namespace
    }

    pub fn record_uri(&self, identifier: Option<&str>) -> String {
        let identifier = identifier.map(str::trim).filter(|id| !id.is_empty());

        if let Some(id) = identifier {
            if is_uri(id) {
                return id.to_string();
            }
        }

        let segment = identifier
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        match &self.data_model_id {
            Some(dm) => format!("{}/datamodels/{}/records/{}", self.base_uri, dm, segment),
            None => format!("{}/records/{}", self.base_uri, segment),
        }
    }

    pub fn term_uri(&mut self, namespace: Option<&str>, local: &str) -> Arc<str> {
        let namespace = namespace.filter(|ns| !ns.is_empty()).unwrap_or(self.default_namespace.as_str());
        let key = (namespace.to_string(), local.to_string());

        if let Some(uri) = self.terms.get(&key) {
            return uri.clone();
        }

        let uri: Arc<str> = join(namespace, local).into();
        self.terms.insert(key, uri.clone());
        uri
    }

    pub fn type_uri(&mut self, predicate_uri: &Arc<str>) -> Arc<str> {
        self.types
            .entry(predicate_uri.clone())
            .or_insert_with(|| format!("{}Type", predicate_uri).into())
            .clone()
    }
}

/// String → [`TermId`] table owned by one run.
#[derive(Debug, Default)]
pub struct Interner {
    ids: HashMap<Arc<str>, TermId>,
    terms: Vec<Arc<str>>,
}

impl Interner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, term: &Arc<str>) -> TermId {
        if let Some(id) = self.ids.get(term) {
            return *id;
        }
        let id = self.terms.len() as TermId;
        self.terms.push(term.clone());
        self.ids.insert(term.clone(), id);
        id
    }

    pub fn predicate(&mut self, uri: &Arc<str>) -> Predicate {
        let id = self.intern(uri);
        Predicate::new(id, self.terms[id as usize].clone())
    }

    pub fn resolve(&self, id: TermId) -> Option<&Arc<str>> {
        self.terms.get(id as usize)
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_uri() {
        assert!(is_uri("http://example.org/a"));
        assert!(is_uri("urn:isbn:0451450523"));
        assert!(!is_uri("42"));
        assert!(!is_uri("not a uri: really"));
        assert!(!is_uri("C:\\data\\file.csv"));
        assert!(!is_uri("1http://x"));
        assert!(!is_uri("http:"));
    }

    #[test]
    fn test_join() {
        assert_eq!(join("http://ex.org/ns", "title"), "http://ex.org/ns#title");
        assert_eq!(join("http://ex.org/ns/", "title"), "http://ex.org/ns/title");
        assert_eq!(join("http://ex.org/ns", "#title"), "http://ex.org/ns#title");
        assert_eq!(join("http://ex.org/schema#", "title"), "http://ex.org/schema#title");
    }

    #[test]
    fn test_record_uri_deterministic() {
        let minter = UriMinter::new("http://data.slub-dresden.de/", Some("5"), None);
        let a = minter.record_uri(Some("42"));
        let b = minter.record_uri(Some("42"));
        assert_eq!(a, "http://data.slub-dresden.de/datamodels/5/records/42");
        assert_eq!(a, b);

        let standalone = UriMinter::new("http://data.slub-dresden.de", None, None);
        assert_eq!(standalone.record_uri(Some("42")), "http://data.slub-dresden.de/records/42");
        assert_eq!(standalone.record_uri(Some("http://ex.org/r/1")), "http://ex.org/r/1");
    }

    #[test]
    fn test_record_uri_without_identifier_is_unique() {
        let minter = UriMinter::new("http://data.slub-dresden.de", None, None);
        let a = minter.record_uri(None);
        let b = minter.record_uri(Some("  "));
        assert!(a.starts_with("http://data.slub-dresden.de/records/"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_term_uri_memoized() {
        let mut minter = UriMinter::new("http://b", None, Some("http://b/resources/1/schema#"));
        let a = minter.term_uri(None, "title");
        let b = minter.term_uri(Some(""), "title");
        assert_eq!(&*a, "http://b/resources/1/schema#title");
        assert!(Arc::ptr_eq(&a, &b));

        let t1 = minter.type_uri(&a);
        let t2 = minter.type_uri(&b);
        assert_eq!(&*t1, "http://b/resources/1/schema#titleType");
        assert!(Arc::ptr_eq(&t1, &t2));
    }

    #[test]
    fn test_fallback_namespace_stable_within_run() {
        let mut minter = UriMinter::new("http://b", None, None);
        let a = minter.term_uri(None, "x");
        let b = minter.term_uri(None, "x");
        assert_eq!(a, b);
        assert!(a.starts_with("http://b/datamodels/"));
    }

    #[test]
    fn test_local_name() {
        assert_eq!(local_name("http://ex.org/ns#title"), "title");
        assert_eq!(local_name("http://ex.org/ns/title"), "title");
        assert_eq!(local_name("title"), "title");
    }

    #[test]
    fn test_interner() {
        let mut interner = Interner::new();
        let a: Arc<str> = "http://ex.org/a".into();
        let b: Arc<str> = "http://ex.org/b".into();
        assert_eq!(interner.intern(&a), 0);
        assert_eq!(interner.intern(&b), 1);
        assert_eq!(interner.intern(&a), 0);
        assert_eq!(interner.len(), 2);
        assert_eq!(interner.resolve(1).map(|s| &**s), Some("http://ex.org/b"));
    }
}
