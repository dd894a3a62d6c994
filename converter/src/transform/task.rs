//! Tasks, jobs and mappings, and their compilation into matrix scripts.
//!
//! ```text
//! Task ─┬─ input_data_model ── configuration, data_resource
//!       └─ job ── mappings ─┬─ input_attribute_paths   ─► rule sources
//!                           ├─ output_attribute_path   ─► rule target
//!                           └─ transformation (components) ─► function chain
//! ```

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::dsl::{FieldRule, Function, MatrixScript};
use crate::config::DataModel;
use crate::error::{ConversionResult, MissingReferenceError, TransformError, TransformResult};
use crate::logs::log_debug;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Task {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub job: Option<Job>,
    #[serde(default)]
    pub input_data_model: Option<DataModel>,
    #[serde(default)]
    pub output_data_model: Option<DataModel>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Job {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub mappings: Vec<Mapping>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Mapping {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub input_attribute_paths: Vec<MappingAttributePath>,
    #[serde(default)]
    pub output_attribute_path: Option<MappingAttributePath>,
    #[serde(default)]
    pub transformation: Option<Component>,
}

/// An attribute path as used by one side of a mapping.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct MappingAttributePath {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub attribute_path: Option<AttributePathRef>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AttributePathRef {
    #[serde(default)]
    pub attributes: Vec<Attribute>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    #[serde(default)]
    pub uri: Option<String>,
}

/// One step of a mapping's transformation, or a container of steps.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Component {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub function: Option<FunctionRef>,
    #[serde(default)]
    pub parameter_mappings: IndexMap<String, String>,
    #[serde(default)]
    pub components: Vec<Component>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FunctionRef {
    pub name: String,
    #[serde(default)]
    pub parameters: Vec<String>,
}

impl MappingAttributePath {
    /// Dotted form, e.g. `creator.name`.
    pub fn dotted(&self) -> Option<String> {
        let attributes = &self.attribute_path.as_ref()?.attributes;
        if attributes.is_empty() {
            return None;
        }
        Some(attributes.iter().map(|a| a.name.as_str()).collect::<Vec<_>>().join("."))
    }
}

impl Mapping {
    fn label(&self) -> String {
        self.name
            .clone()
            .or_else(|| self.id.clone())
            .unwrap_or_else(|| "<unnamed>".to_string())
    }
}

impl Task {
    /// A `null` document means there is no task at all.
    pub fn from_json(json: &str) -> ConversionResult<Self> {
        let task: Option<Task> = serde_json::from_str(json)?;
        Ok(task.ok_or(MissingReferenceError::Task)?)
    }

    /// Every reference the flow needs, checked before anything is read.
    pub fn validate(&self) -> Result<(&Job, &DataModel), MissingReferenceError> {
        let job = self.job.as_ref().ok_or(MissingReferenceError::Job)?;
        if job.mappings.is_empty() {
            return Err(MissingReferenceError::Mappings);
        }
        for mapping in &job.mappings {
            let has_input = mapping.input_attribute_paths.iter().any(|p| p.dotted().is_some());
            let has_output = mapping
                .output_attribute_path
                .as_ref()
                .and_then(MappingAttributePath::dotted)
                .is_some();
            if !has_input || !has_output {
                return Err(MissingReferenceError::MappingAttributePath(mapping.label()));
            }
        }

        let input = self
            .input_data_model
            .as_ref()
            .ok_or(MissingReferenceError::InputDataModel)?;
        if input.data_resource.is_none() {
            return Err(MissingReferenceError::DataResource);
        }
        if input.configuration.is_none() {
            return Err(MissingReferenceError::Configuration);
        }
        Ok((job, input))
    }
}

/// Compiles job mappings into a matrix script.
pub struct MatrixScriptBuilder {
    separator: String,
}

impl MatrixScriptBuilder {
    pub fn new() -> Self {
        Self {
            separator: " ".to_string(),
        }
    }

    /// Joins values when a mapping reads several input paths.
    pub fn with_separator(mut self, separator: &str) -> Self {
        self.separator = separator.to_string();
        self
    }

    pub fn build(&self, task: &Task) -> ConversionResult<MatrixScript> {
        let (job, _) = task.validate()?;

        let mut script = MatrixScript::new();
        script.description = job
            .name
            .clone()
            .or_else(|| task.name.clone())
            .unwrap_or_default();

        for mapping in &job.mappings {
            let (target, rule) = self.rule(mapping)?;
            log_debug(format!("Mapping '{}' -> rule for '{}'", mapping.label(), target));
            script.rules.insert(target, rule);
        }
        Ok(script)
    }

    fn rule(&self, mapping: &Mapping) -> ConversionResult<(String, FieldRule)> {
        let label = mapping.label();
        let mut sources: Vec<String> = mapping.input_attribute_paths.iter().filter_map(|p| p.dotted()).collect();
        let target = mapping
            .output_attribute_path
            .as_ref()
            .and_then(MappingAttributePath::dotted)
            .ok_or_else(|| MissingReferenceError::MappingAttributePath(label.clone()))?;

        let mut rule = match sources.len() {
            0 => return Err(MissingReferenceError::MappingAttributePath(label).into()),
            1 => FieldRule::from_source(&sources.remove(0)),
            _ => FieldRule::from_sources(sources, &self.separator),
        };

        if let Some(transformation) = &mapping.transformation {
            let mut steps = Vec::new();
            flatten_components(transformation, &mut steps);
            for component in steps {
                rule = rule.with_function(component_function(component)?);
            }
        }
        Ok((target, rule))
    }
}

impl Default for MatrixScriptBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Depth-first, in declaration order; containers contribute only their children.
fn flatten_components<'a>(component: &'a Component, steps: &mut Vec<&'a Component>) {
    if component.function.is_some() {
        steps.push(component);
    }
    for child in &component.components {
        flatten_components(child, steps);
    }
}

fn component_function(component: &Component) -> TransformResult<Function> {
    let name = component
        .function
        .as_ref()
        .map(|f| f.name.as_str())
        .unwrap_or_default();

    let mut object = Map::new();
    object.insert("type".to_string(), Value::String(name.to_string()));

    if name == "lookup" {
        let mut map = Map::new();
        for (key, value) in &component.parameter_mappings {
            if key == "default" {
                object.insert(key.clone(), Value::String(value.clone()));
            } else {
                map.insert(key.clone(), Value::String(value.clone()));
            }
        }
        object.insert("map".to_string(), Value::Object(map));
    } else {
        for (key, value) in &component.parameter_mappings {
            let key = if key == "match" { "pattern" } else { key.as_str() };
            object.insert(key.to_string(), parameter_value(key, value));
        }
    }

    serde_json::from_value(Value::Object(object))
        .map_err(|e| TransformError::InvalidScript(format!("function '{}': {}", name, e)))
}

fn parameter_value(key: &str, value: &str) -> Value {
    match (key, value.parse::<u64>()) {
        ("start" | "end", Ok(n)) => Value::from(n),
        _ => Value::String(value.to_string()),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::{Configuration, DataResource};
    use crate::error::ConversionError;
    use crate::transform::dsl::CaseMode;

    pub(crate) fn path(names: &[&str]) -> MappingAttributePath {
        MappingAttributePath {
            name: None,
            attribute_path: Some(AttributePathRef {
                attributes: names
                    .iter()
                    .map(|n| Attribute { name: n.to_string(), uri: None })
                    .collect(),
            }),
        }
    }

    pub(crate) fn mapping(name: &str, inputs: &[&[&str]], output: &[&str]) -> Mapping {
        Mapping {
            id: None,
            name: Some(name.to_string()),
            input_attribute_paths: inputs.iter().map(|p| path(p)).collect(),
            output_attribute_path: Some(path(output)),
            transformation: None,
        }
    }

    pub(crate) fn component(function: &str, parameters: &[(&str, &str)]) -> Component {
        Component {
            name: Some(function.to_string()),
            function: Some(FunctionRef { name: function.to_string(), parameters: Vec::new() }),
            parameter_mappings: parameters.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            components: Vec::new(),
        }
    }

    pub(crate) fn task(mappings: Vec<Mapping>, data_model: DataModel) -> Task {
        Task {
            name: Some("test task".to_string()),
            job: Some(Job { id: None, name: Some("test job".to_string()), mappings }),
            input_data_model: Some(data_model),
            ..Task::default()
        }
    }

    fn data_model() -> DataModel {
        DataModel {
            configuration: Some(Configuration::default()),
            data_resource: Some(DataResource::from_path("/tmp/input.xml")),
            ..DataModel::default()
        }
    }

    #[test]
    fn test_validate_fails_fast() {
        assert!(matches!(Task::default().validate(), Err(MissingReferenceError::Job)));

        let empty = task(Vec::new(), data_model());
        assert!(matches!(empty.validate(), Err(MissingReferenceError::Mappings)));

        let mut dangling = mapping("m", &[&["title"]], &["title"]);
        dangling.output_attribute_path = None;
        let t = task(vec![dangling], data_model());
        assert!(matches!(t.validate(), Err(MissingReferenceError::MappingAttributePath(name)) if name == "m"));

        let mut t = task(vec![mapping("m", &[&["a"]], &["b"])], data_model());
        t.input_data_model = None;
        assert!(matches!(t.validate(), Err(MissingReferenceError::InputDataModel)));

        let mut dm = data_model();
        dm.data_resource = None;
        let t = task(vec![mapping("m", &[&["a"]], &["b"])], dm);
        assert!(matches!(t.validate(), Err(MissingReferenceError::DataResource)));

        let mut dm = data_model();
        dm.configuration = None;
        let t = task(vec![mapping("m", &[&["a"]], &["b"])], dm);
        assert!(matches!(t.validate(), Err(MissingReferenceError::Configuration)));
    }

    #[test]
    fn test_build_script_from_mappings() {
        let mut title = mapping("title", &[&["title"], &["subtitle"]], &["dc", "title"]);
        title.transformation = Some(Component {
            components: vec![component("trim", &[]), component("case", &[("to", "upper")])],
            ..Component::default()
        });
        let creator = mapping("creator", &[&["creator", "name"]], &["dc", "creator"]);

        let script = MatrixScriptBuilder::new()
            .with_separator(" / ")
            .build(&task(vec![title, creator], data_model()))
            .unwrap();

        assert_eq!(script.description, "test job");
        assert_eq!(script.targets(), vec!["dc.title", "dc.creator"]);

        let title_rule = &script.rules["dc.title"];
        assert_eq!(title_rule.sources, Some(vec!["title".to_string(), "subtitle".to_string()]));
        assert_eq!(title_rule.separator, " / ");
        assert_eq!(title_rule.functions, vec![Function::Trim, Function::Case { to: CaseMode::Upper }]);
        assert_eq!(script.rules["dc.creator"].source.as_deref(), Some("creator.name"));
    }

    #[test]
    fn test_component_parameters() {
        let regexp = component_function(&component("regexp", &[("match", r"\d+"), ("format", "n${0}")])).unwrap();
        assert_eq!(regexp, Function::Regexp { pattern: r"\d+".into(), format: Some("n${0}".into()) });

        let substring = component_function(&component("substring", &[("start", "0"), ("end", "4")])).unwrap();
        assert_eq!(substring, Function::Substring { start: 0, end: Some(4) });

        let lookup = component_function(&component("lookup", &[("ger", "German"), ("default", "Other")])).unwrap();
        match lookup {
            Function::Lookup { map, default } => {
                assert_eq!(map.get("ger").map(String::as_str), Some("German"));
                assert_eq!(default.as_deref(), Some("Other"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_unknown_function_is_invalid_script() {
        let result = component_function(&component("sql_query", &[]));
        assert!(matches!(result, Err(TransformError::InvalidScript(_))));
    }

    #[test]
    fn test_task_from_json() {
        let json = r#"{
            "name": "t",
            "job": {"mappings": [{
                "name": "m",
                "input_attribute_paths": [{"attribute_path": {"attributes": [{"name": "title", "uri": "http://ex.org/title"}]}}],
                "output_attribute_path": {"attribute_path": {"attributes": [{"name": "label"}]}}
            }]},
            "input_data_model": {"configuration": {"parameters": {"storage_type": "xml"}}, "data_resource": {"attributes": {"path": "in.xml"}}}
        }"#;
        let task = Task::from_json(json).unwrap();
        assert!(task.validate().is_ok());
        let script = MatrixScriptBuilder::new().build(&task).unwrap();
        assert_eq!(script.rules["label"].source.as_deref(), Some("title"));
    }

    #[test]
    fn test_null_task_is_missing() {
        let result = Task::from_json("null");
        assert!(matches!(result, Err(ConversionError::MissingReference(MissingReferenceError::Task))));
    }
}
