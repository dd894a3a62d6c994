//! Matrix scripts.
//!
//! A script maps each target attribute to where its values come from:
//!
//! ```text
//! "creator.name"  <- source "dc:creator.name" | trim | case(upper)
//! "title"         <- sources ["title", "subtitle"] joined by " : "
//! "collection"    <- constant "Digital Collections"
//! ```
//!
//! Targets and sources are dotted attribute paths. A dotted target is
//! unflattened into nested entities downstream.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::operations::{CaseMode, CompiledFunction, Function};
use crate::error::{TransformError, TransformResult};

/// A complete script: one rule per target attribute, in output order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixScript {
    #[serde(default = "default_version")]
    pub version: String,

    #[serde(default)]
    pub description: String,

    pub rules: IndexMap<String, FieldRule>,
}

fn default_version() -> String {
    "1.0".to_string()
}

/// How one target attribute is filled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldRule {
    /// Every value found at this path (exclusive with `sources` and `constant`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// First value of each path, joined with `separator`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<String>>,

    #[serde(default = "default_separator")]
    pub separator: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constant: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub functions: Vec<Function>,

    /// Used when the chain leaves nothing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,

    /// A record without any value for this target is skipped
    #[serde(default)]
    pub required: bool,
}

fn default_separator() -> String {
    " ".to_string()
}

impl MatrixScript {
    pub fn new() -> Self {
        Self {
            version: default_version(),
            description: String::new(),
            rules: IndexMap::new(),
        }
    }

    pub fn with_rule(mut self, target: &str, rule: FieldRule) -> Self {
        self.rules.insert(target.to_string(), rule);
        self
    }

    pub fn from_json(json: &str) -> TransformResult<Self> {
        serde_json::from_str(json).map_err(|e| TransformError::InvalidScript(e.to_string()))
    }

    pub fn to_json(&self) -> TransformResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| TransformError::Output(e.to_string()))
    }

    /// Every source path the script reads, deduplicated in first-use order.
    pub fn source_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = Vec::new();
        for path in self.rules.values().flat_map(|rule| rule.source_paths()) {
            if !paths.contains(&path) {
                paths.push(path);
            }
        }
        paths
    }

    pub fn targets(&self) -> Vec<String> {
        self.rules.keys().cloned().collect()
    }

    /// Source paths absent from `known`, e.g. an inferred attribute path set.
    pub fn unknown_sources(&self, known: &[String]) -> Vec<String> {
        self.source_paths()
            .into_iter()
            .filter(|path| !known.contains(path))
            .collect()
    }

    /// Check rule shapes and compile every function chain.
    pub fn compile(&self) -> TransformResult<Vec<CompiledRule>> {
        self.rules
            .iter()
            .map(|(target, rule)| rule.compile(target))
            .collect()
    }
}

impl Default for MatrixScript {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldRule {
    fn empty() -> Self {
        Self {
            source: None,
            sources: None,
            separator: default_separator(),
            constant: None,
            functions: Vec::new(),
            default: None,
            required: false,
        }
    }

    pub fn from_source(path: &str) -> Self {
        Self {
            source: Some(path.to_string()),
            ..Self::empty()
        }
    }

    pub fn from_sources(paths: Vec<String>, separator: &str) -> Self {
        Self {
            sources: Some(paths),
            separator: separator.to_string(),
            ..Self::empty()
        }
    }

    pub fn from_constant(value: &str) -> Self {
        Self {
            constant: Some(value.to_string()),
            ..Self::empty()
        }
    }

    pub fn with_function(mut self, function: Function) -> Self {
        self.functions.push(function);
        self
    }

    pub fn with_default(mut self, default: &str) -> Self {
        self.default = Some(default.to_string());
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn source_paths(&self) -> Vec<String> {
        let mut paths = Vec::new();
        if let Some(source) = &self.source {
            paths.push(source.clone());
        }
        if let Some(sources) = &self.sources {
            paths.extend(sources.iter().cloned());
        }
        paths
    }

    fn compile(&self, target: &str) -> TransformResult<CompiledRule> {
        let input = match (&self.source, &self.sources, &self.constant) {
            (Some(path), None, None) => RuleInput::Source(path.clone()),
            (None, Some(paths), None) if !paths.is_empty() => RuleInput::Sources(paths.clone(), self.separator.clone()),
            (None, None, Some(value)) => RuleInput::Constant(value.clone()),
            _ => {
                return Err(TransformError::InvalidScript(format!(
                    "rule '{}' needs exactly one of source, sources or constant",
                    target
                )))
            }
        };

        let chain = self
            .functions
            .iter()
            .map(Function::compile)
            .collect::<TransformResult<Vec<_>>>()?;

        Ok(CompiledRule {
            target: target.to_string(),
            input,
            chain,
            default: self.default.clone(),
            required: self.required,
        })
    }
}

#[derive(Debug, Clone)]
pub enum RuleInput {
    Source(String),
    Sources(Vec<String>, String),
    Constant(String),
}

/// A rule checked and ready to evaluate.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub target: String,
    pub input: RuleInput,
    pub chain: Vec<CompiledFunction>,
    pub default: Option<String>,
    pub required: bool,
}

/// A script over a typical library record, for documentation and the CLI.
pub fn example_script() -> MatrixScript {
    let mut languages = IndexMap::new();
    languages.insert("ger".to_string(), "German".to_string());
    languages.insert("eng".to_string(), "English".to_string());
    languages.insert("fre".to_string(), "French".to_string());

    MatrixScript {
        version: default_version(),
        description: "Example script for a bibliographic record".to_string(),
        rules: IndexMap::new(),
    }
    .with_rule(
        "title",
        FieldRule::from_sources(vec!["title".to_string(), "subtitle".to_string()], " : ")
            .with_function(Function::NormalizeWhitespace)
            .required(),
    )
    .with_rule(
        "creator.name",
        FieldRule::from_source("creator.name").with_function(Function::Trim),
    )
    .with_rule(
        "language",
        FieldRule::from_source("language")
            .with_function(Function::Case { to: CaseMode::Lower })
            .with_function(Function::Lookup { map: languages, default: None })
            .with_default("Unknown"),
    )
    .with_rule(
        "year",
        FieldRule::from_source("date").with_function(Function::Regexp {
            pattern: r"\d{4}".to_string(),
            format: None,
        }),
    )
    .with_rule("collection", FieldRule::from_constant("Digital Collections"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_serialization() {
        let script = example_script();
        let json = script.to_json().unwrap();
        let parsed = MatrixScript::from_json(&json).unwrap();
        assert_eq!(parsed, script);
        assert_eq!(parsed.targets()[0], "title");
    }

    #[test]
    fn test_source_paths_and_unknown_sources() {
        let script = example_script();
        assert_eq!(script.source_paths(), vec!["title", "subtitle", "creator.name", "language", "date"]);

        let known: Vec<String> = ["title", "subtitle", "creator.name", "language"].iter().map(|s| s.to_string()).collect();
        assert_eq!(script.unknown_sources(&known), vec!["date"]);
    }

    #[test]
    fn test_rule_needs_one_input() {
        let mut rule = FieldRule::from_source("a");
        rule.constant = Some("x".into());
        let script = MatrixScript::new().with_rule("t", rule);
        assert!(matches!(script.compile(), Err(TransformError::InvalidScript(_))));

        let script = MatrixScript::new().with_rule("t", FieldRule::from_sources(Vec::new(), " "));
        assert!(script.compile().is_err());
    }

    #[test]
    fn test_bad_json_is_invalid_script() {
        assert!(matches!(MatrixScript::from_json("{\"rules\": 3}"), Err(TransformError::InvalidScript(_))));
    }

    #[test]
    fn test_minimal_json() {
        let script = MatrixScript::from_json(r#"{"rules": {"t": {"source": "a", "functions": [{"type": "trim"}]}}}"#).unwrap();
        assert_eq!(script.version, "1.0");
        let compiled = script.compile().unwrap();
        assert_eq!(compiled.len(), 1);
        assert_eq!(compiled[0].chain.len(), 1);
        assert_eq!(script.rules["t"].separator, " ");
    }
}
