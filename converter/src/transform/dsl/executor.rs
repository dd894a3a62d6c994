//! Matrix interpreter.
//!
//! Runs as a stream stage: it gathers the values of one record by dotted
//! attribute path, evaluates every rule on `EndRecord` and forwards a flat
//! record of `Literal(target, value)` events.
//!
//! ```text
//! StartRecord(r1)                         StartRecord(r1)
//!   StartEntity(creator)                    Literal(creator.name, "X")
//!     Literal(name, " X ")      ──────►     Literal(title, "A")
//!   EndEntity                             EndRecord
//!   Literal(title, "A")
//! EndRecord
//! ```

use indexmap::IndexMap;

use super::matrix::{CompiledRule, MatrixScript, RuleInput};
use super::operations::apply_chain;
use crate::error::{TransformError, TransformResult};
use crate::logs::{log_debug, log_info, log_warning};
use crate::transform::stream::{Nesting, StreamEvent, StreamReceiver};

/// Per-run counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InterpreterStats {
    pub records: usize,
    pub skipped: usize,
    pub empty: usize,
}

impl InterpreterStats {
    pub fn summary(&self) -> String {
        format!(
            "Transformed: {} records, {} skipped, {} empty",
            self.records, self.skipped, self.empty
        )
    }
}

pub struct MatrixInterpreter<R: StreamReceiver> {
    receiver: R,
    rules: Vec<CompiledRule>,
    strict: bool,
    nesting: Nesting,
    record: String,
    path: Vec<String>,
    values: IndexMap<String, Vec<String>>,
    stats: InterpreterStats,
}

impl<R: StreamReceiver> MatrixInterpreter<R> {
    pub fn new(script: &MatrixScript, receiver: R) -> TransformResult<Self> {
        Ok(Self {
            receiver,
            rules: script.compile()?,
            strict: false,
            nesting: Nesting::default(),
            record: String::new(),
            path: Vec::new(),
            values: IndexMap::new(),
            stats: InterpreterStats::default(),
        })
    }

    /// Fail on a missing required value instead of skipping the record.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn stats(&self) -> InterpreterStats {
        self.stats
    }

    pub fn into_receiver(self) -> R {
        self.receiver
    }

    fn evaluate(&self, rule: &CompiledRule) -> Vec<String> {
        let values = match &rule.input {
            RuleInput::Source(path) => self.values.get(path).cloned().unwrap_or_default(),
            RuleInput::Sources(paths, separator) => {
                let parts: Vec<&str> = paths
                    .iter()
                    .filter_map(|path| self.values.get(path).and_then(|v| v.first()))
                    .map(|s| s.trim())
                    .filter(|s| !s.is_empty())
                    .collect();
                if parts.is_empty() {
                    Vec::new()
                } else {
                    vec![parts.join(separator)]
                }
            }
            RuleInput::Constant(value) => vec![value.clone()],
        };

        let values: Vec<String> = values.into_iter().filter(|v| !v.trim().is_empty()).collect();
        let values = apply_chain(&rule.chain, values);

        match (&rule.default, values.is_empty()) {
            (Some(default), true) => vec![default.clone()],
            _ => values,
        }
    }

    fn finish_record(&mut self) -> TransformResult<()> {
        let mut output: Vec<(String, String)> = Vec::new();

        for rule in &self.rules {
            let values = self.evaluate(rule);
            if values.is_empty() && rule.required {
                let missing = TransformError::MissingRequired {
                    record: self.record.clone(),
                    target: rule.target.clone(),
                };
                if self.strict {
                    return Err(missing);
                }
                log_warning(format!("Skipping {}", missing));
                self.stats.skipped += 1;
                return Ok(());
            }
            output.extend(values.into_iter().map(|value| (rule.target.clone(), value)));
        }

        if output.is_empty() {
            log_debug(format!("Record '{}' produced no values", self.record));
            self.stats.empty += 1;
            return Ok(());
        }

        self.receiver.receive(StreamEvent::StartRecord(self.record.clone()))?;
        for (target, value) in output {
            self.receiver.receive(StreamEvent::Literal(target, value))?;
        }
        self.receiver.receive(StreamEvent::EndRecord)?;
        self.stats.records += 1;
        Ok(())
    }
}

impl<R: StreamReceiver> StreamReceiver for MatrixInterpreter<R> {
    fn receive(&mut self, event: StreamEvent) -> TransformResult<()> {
        self.nesting.check(&event)?;

        match event {
            StreamEvent::StartRecord(id) => {
                self.record = id;
                self.path.clear();
                self.values.clear();
            }
            StreamEvent::StartEntity(name) => self.path.push(name),
            StreamEvent::EndEntity => {
                self.path.pop();
            }
            StreamEvent::Literal(name, value) => {
                let key = if self.path.is_empty() {
                    name
                } else {
                    format!("{}.{}", self.path.join("."), name)
                };
                self.values.entry(key).or_default().push(value);
            }
            StreamEvent::EndRecord => self.finish_record()?,
        }
        Ok(())
    }

    fn close(&mut self) -> TransformResult<()> {
        log_info(self.stats.summary());
        self.receiver.close()
    }
}

/// Builds an interpreter stage in front of a downstream receiver.
///
/// The flow only talks to this seam, so another script language can be
/// plugged in without touching the surrounding stages.
pub trait ScriptEngine: Send + Sync {
    fn interpreter<'a>(
        &self,
        downstream: Box<dyn StreamReceiver + 'a>,
    ) -> TransformResult<Box<dyn StreamReceiver + 'a>>;
}

/// The bundled engine for matrix scripts.
#[derive(Debug, Clone)]
pub struct MatrixEngine {
    script: MatrixScript,
    strict: bool,
}

impl MatrixEngine {
    /// Compiles once up front so script errors surface before any input is read.
    pub fn new(script: MatrixScript) -> TransformResult<Self> {
        script.compile()?;
        Ok(Self { script, strict: false })
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn script(&self) -> &MatrixScript {
        &self.script
    }
}

impl ScriptEngine for MatrixEngine {
    fn interpreter<'a>(
        &self,
        downstream: Box<dyn StreamReceiver + 'a>,
    ) -> TransformResult<Box<dyn StreamReceiver + 'a>> {
        let interpreter = MatrixInterpreter::new(&self.script, downstream)?.strict(self.strict);
        Ok(Box::new(interpreter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::dsl::matrix::{example_script, FieldRule};
    use crate::transform::dsl::operations::Function;
    use crate::transform::reader::JsonRecordReader;
    use crate::transform::stream::EventCollector;
    use serde_json::{json, Value};

    fn run(script: &MatrixScript, records: &[Value]) -> (Vec<StreamEvent>, InterpreterStats) {
        let interpreter = MatrixInterpreter::new(script, EventCollector::new()).unwrap();
        let mut reader = JsonRecordReader::new(interpreter);
        for (i, record) in records.iter().enumerate() {
            reader.read(&format!("r{}", i + 1), record).unwrap();
        }
        reader.close().unwrap();
        let interpreter = reader.into_receiver();
        let stats = interpreter.stats();
        (interpreter.into_receiver().events, stats)
    }

    fn literals(events: &[StreamEvent]) -> Vec<(String, String)> {
        events
            .iter()
            .filter_map(|e| match e {
                StreamEvent::Literal(name, value) => Some((name.clone(), value.clone())),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_example_script() {
        let record = json!({
            "title": "  Faust ",
            "subtitle": "Eine  Tragödie",
            "creator": {"name": " Goethe "},
            "language": "GER",
            "date": "ca. 1808"
        });
        let (events, stats) = run(&example_script(), &[record]);

        assert_eq!(stats.records, 1);
        assert_eq!(
            literals(&events),
            vec![
                ("title".to_string(), "Faust : Eine Tragödie".to_string()),
                ("creator.name".to_string(), "Goethe".to_string()),
                ("language".to_string(), "German".to_string()),
                ("year".to_string(), "1808".to_string()),
                ("collection".to_string(), "Digital Collections".to_string()),
            ]
        );
    }

    #[test]
    fn test_source_takes_every_value() {
        let script = MatrixScript::new().with_rule("subject", FieldRule::from_source("subject"));
        let (events, _) = run(&script, &[json!({"subject": ["a", "b"]})]);
        assert_eq!(literals(&events).len(), 2);
    }

    #[test]
    fn test_default_fills_empty_result() {
        let script = MatrixScript::new().with_rule("lang", FieldRule::from_source("missing").with_default("und"));
        let (events, _) = run(&script, &[json!({"other": "x"})]);
        assert_eq!(literals(&events), vec![("lang".to_string(), "und".to_string())]);
    }

    #[test]
    fn test_missing_required_skips_record() {
        let script = MatrixScript::new()
            .with_rule("id", FieldRule::from_source("id").with_function(Function::DigitsOnly).required())
            .with_rule("title", FieldRule::from_source("title"));
        let (events, stats) = run(&script, &[json!({"id": "n/a", "title": "A"}), json!({"id": "7", "title": "B"})]);

        assert_eq!(stats, InterpreterStats { records: 1, skipped: 1, empty: 0 });
        assert_eq!(events[0], StreamEvent::StartRecord("r2".into()));
    }

    #[test]
    fn test_strict_mode_fails_on_missing_required() {
        let script = MatrixScript::new().with_rule("id", FieldRule::from_source("id").required());
        let interpreter = MatrixInterpreter::new(&script, EventCollector::new()).unwrap().strict(true);
        let mut reader = JsonRecordReader::new(interpreter);
        let result = reader.read("r1", &json!({"title": "A"}));
        assert!(matches!(result, Err(TransformError::MissingRequired { .. })));
    }

    #[test]
    fn test_empty_record_not_forwarded() {
        let script = MatrixScript::new().with_rule("t", FieldRule::from_source("absent"));
        let (events, stats) = run(&script, &[json!({"x": "1"})]);
        assert!(events.is_empty());
        assert_eq!(stats.empty, 1);
    }

    #[test]
    fn test_engine_rejects_bad_script_up_front() {
        let script = MatrixScript::new().with_rule(
            "t",
            FieldRule::from_source("a").with_function(Function::Replace { pattern: "[".into(), with: String::new() }),
        );
        assert!(MatrixEngine::new(script).is_err());
    }

    #[test]
    fn test_engine_builds_boxed_stage() {
        let engine = MatrixEngine::new(MatrixScript::new().with_rule("t", FieldRule::from_constant("c"))).unwrap();
        let mut collector = EventCollector::new();
        {
            let mut stage = engine.interpreter(Box::new(&mut collector)).unwrap();
            stage.receive(StreamEvent::StartRecord("1".into())).unwrap();
            stage.receive(StreamEvent::EndRecord).unwrap();
            stage.close().unwrap();
        }
        assert_eq!(collector.events.len(), 3);
        assert!(collector.closed);
    }
}
