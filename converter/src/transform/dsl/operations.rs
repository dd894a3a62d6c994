//! Functions a matrix rule can chain.
//!
//! Every function maps one value to zero or more values; a chain is applied
//! value by value, so `split` fans out and everything after it runs on each
//! part. Empty results are dropped.

use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{TransformError, TransformResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseMode {
    Upper,
    Lower,
}

/// Declarative form, as written in scripts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Function {
    /// Strip leading and trailing whitespace
    Trim,

    Case { to: CaseMode },

    /// Replace every regex match
    Replace {
        pattern: String,
        #[serde(default)]
        with: String,
    },

    /// Keep the first match, optionally reformatted with `${n}` groups.
    /// No match drops the value.
    Regexp {
        pattern: String,
        #[serde(default)]
        format: Option<String>,
    },

    /// Characters `start..end`, counted in chars
    Substring {
        #[serde(default)]
        start: usize,
        #[serde(default)]
        end: Option<usize>,
    },

    Compose {
        #[serde(default)]
        prefix: String,
        #[serde(default)]
        postfix: String,
    },

    /// Map through a table; unmatched values use `default` or are dropped
    Lookup {
        map: IndexMap<String, String>,
        #[serde(default)]
        default: Option<String>,
    },

    Split {
        #[serde(default = "default_split_separator")]
        separator: String,
    },

    DigitsOnly,

    /// Collapse whitespace runs to a single space
    NormalizeWhitespace,
}

fn default_split_separator() -> String {
    ",".to_string()
}

impl Function {
    pub fn name(&self) -> &'static str {
        match self {
            Function::Trim => "trim",
            Function::Case { .. } => "case",
            Function::Replace { .. } => "replace",
            Function::Regexp { .. } => "regexp",
            Function::Substring { .. } => "substring",
            Function::Compose { .. } => "compose",
            Function::Lookup { .. } => "lookup",
            Function::Split { .. } => "split",
            Function::DigitsOnly => "digits_only",
            Function::NormalizeWhitespace => "normalize_whitespace",
        }
    }

    /// Validate and precompile patterns.
    pub fn compile(&self) -> TransformResult<CompiledFunction> {
        let compiled = match self {
            Function::Replace { pattern, with } => CompiledFunction::Replace {
                regex: compile_pattern(self.name(), pattern)?,
                with: with.clone(),
            },
            Function::Regexp { pattern, format } => CompiledFunction::Regexp {
                regex: compile_pattern(self.name(), pattern)?,
                format: format.clone(),
            },
            Function::NormalizeWhitespace => CompiledFunction::NormalizeWhitespace,
            other => CompiledFunction::Plain(other.clone()),
        };
        Ok(compiled)
    }
}

fn compile_pattern(function: &str, pattern: &str) -> TransformResult<Regex> {
    Regex::new(pattern).map_err(|e| TransformError::InvalidPattern {
        function: function.to_string(),
        pattern: pattern.to_string(),
        message: e.to_string(),
    })
}

/// A function ready to run.
#[derive(Debug, Clone)]
pub enum CompiledFunction {
    Replace { regex: Regex, with: String },
    Regexp { regex: Regex, format: Option<String> },
    NormalizeWhitespace,
    Plain(Function),
}

impl CompiledFunction {
    pub fn apply(&self, value: &str) -> Vec<String> {
        let results = match self {
            CompiledFunction::Replace { regex, with } => vec![regex.replace_all(value, with.as_str()).into_owned()],
            CompiledFunction::Regexp { regex, format } => match regex.captures(value) {
                Some(captures) => match format {
                    Some(format) => {
                        let mut out = String::new();
                        captures.expand(format, &mut out);
                        vec![out]
                    }
                    None => captures.get(0).map(|m| vec![m.as_str().to_string()]).unwrap_or_default(),
                },
                None => Vec::new(),
            },
            CompiledFunction::NormalizeWhitespace => {
                vec![value.split_whitespace().collect::<Vec<_>>().join(" ")]
            }
            CompiledFunction::Plain(function) => apply_plain(function, value),
        };

        results.into_iter().filter(|v| !v.trim().is_empty()).collect()
    }
}

fn apply_plain(function: &Function, value: &str) -> Vec<String> {
    match function {
        Function::Trim => vec![value.trim().to_string()],
        Function::Case { to: CaseMode::Upper } => vec![value.to_uppercase()],
        Function::Case { to: CaseMode::Lower } => vec![value.to_lowercase()],
        Function::Substring { start, end } => {
            let chars: Vec<char> = value.chars().collect();
            let end = end.unwrap_or(chars.len()).min(chars.len());
            let part: String = chars.get(*start..end).map(|c| c.iter().collect()).unwrap_or_default();
            vec![part]
        }
        Function::Compose { prefix, postfix } => vec![format!("{}{}{}", prefix, value, postfix)],
        Function::Lookup { map, default } => match map.get(value).or(default.as_ref()) {
            Some(mapped) => vec![mapped.clone()],
            None => Vec::new(),
        },
        Function::Split { separator } => value.split(separator.as_str()).map(|p| p.trim().to_string()).collect(),
        Function::DigitsOnly => vec![value.chars().filter(|c| c.is_ascii_digit()).collect()],
        // compiled variants never reach here
        Function::Replace { .. } | Function::Regexp { .. } | Function::NormalizeWhitespace => vec![value.to_string()],
    }
}

/// Run a compiled chain over `values`.
pub fn apply_chain(chain: &[CompiledFunction], values: Vec<String>) -> Vec<String> {
    chain.iter().fold(values, |values, function| {
        values.iter().flat_map(|v| function.apply(v)).collect()
    })
}

/// Reference of the function vocabulary, for the CLI.
pub fn functions_description() -> String {
    r#"Available transformation functions:

| Function | Description | Parameters |
|----------|-------------|------------|
| trim | Remove leading/trailing whitespace | - |
| case | Change letter case | to: "upper" or "lower" |
| replace | Regex replacement of every match | pattern: regex, with: replacement |
| regexp | Keep the first match (drops non-matching values) | pattern: regex, format: optional "${1}" template |
| substring | Character range | start: index (default 0), end: optional index |
| compose | Wrap the value | prefix, postfix |
| lookup | Map through a table | map: {from: to}, default: optional fallback |
| split | Split into several values | separator (default ",") |
| digits_only | Keep only ASCII digits | - |
| normalize_whitespace | Collapse whitespace runs | - |

Example chain in JSON:
[
  {"type": "trim"},
  {"type": "replace", "pattern": "[-. ]", "with": ""},
  {"type": "lookup", "map": {"ger": "German", "eng": "English"}},
  {"type": "compose", "prefix": "lang:"}
]"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(function: Function, value: &str) -> Vec<String> {
        function.compile().unwrap().apply(value)
    }

    #[test]
    fn test_trim_and_case() {
        assert_eq!(run(Function::Trim, "  hello  "), vec!["hello"]);
        assert_eq!(run(Function::Case { to: CaseMode::Upper }, "abc"), vec!["ABC"]);
    }

    #[test]
    fn test_replace_and_regexp() {
        let replace = Function::Replace { pattern: "[-. ]".into(), with: String::new() };
        assert_eq!(run(replace, "T-123.456 7"), vec!["T1234567"]);

        let year = Function::Regexp { pattern: r"(\d{4})".into(), format: Some("year ${1}".into()) };
        assert_eq!(run(year.clone(), "15/03/2024"), vec!["year 2024"]);
        assert!(run(year, "no digits").is_empty());
    }

    #[test]
    fn test_invalid_pattern_fails_compile() {
        let bad = Function::Regexp { pattern: "(".into(), format: None };
        assert!(matches!(bad.compile(), Err(TransformError::InvalidPattern { .. })));
    }

    #[test]
    fn test_lookup() {
        let mut map = IndexMap::new();
        map.insert("ger".to_string(), "German".to_string());
        assert_eq!(run(Function::Lookup { map: map.clone(), default: None }, "ger"), vec!["German"]);
        assert!(run(Function::Lookup { map: map.clone(), default: None }, "fre").is_empty());
        assert_eq!(run(Function::Lookup { map, default: Some("Other".into()) }, "fre"), vec!["Other"]);
    }

    #[test]
    fn test_substring_counts_chars() {
        assert_eq!(run(Function::Substring { start: 1, end: Some(3) }, "äöüß"), vec!["öü"]);
        assert!(run(Function::Substring { start: 9, end: None }, "abc").is_empty());
    }

    #[test]
    fn test_chain_fans_out() {
        let chain: Vec<_> = [
            Function::Split { separator: ";".into() },
            Function::Compose { prefix: "<".into(), postfix: ">".into() },
        ]
        .iter()
        .map(|f| f.compile().unwrap())
        .collect();
        assert_eq!(apply_chain(&chain, vec!["a; b;".into()]), vec!["<a>", "<b>"]);
    }

    #[test]
    fn test_serde_shape() {
        let function: Function = serde_json::from_str(r#"{"type": "case", "to": "lower"}"#).unwrap();
        assert_eq!(function, Function::Case { to: CaseMode::Lower });
        assert_eq!(function.name(), "case");
    }
}
