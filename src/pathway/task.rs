//! Task building: expanding a level's templated task for one evidence item.
//!
//! `{{dotted.path}}` placeholders resolve against the interpolation context
//! `{evidence, parent, outputPath}`. Unresolved paths keep their literal
//! token so a half-filled task stays inspectable rather than silently losing
//! information.

use regex::Regex;
use serde_json::{json, Value};
use std::sync::OnceLock;

use crate::model::EvidenceItem;
use super::types::{LevelDef, LevelOutput, RequiredOutput};

static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();

fn placeholder_re() -> &'static Regex {
    PLACEHOLDER.get_or_init(|| Regex::new(r"\{\{([A-Za-z0-9_.]+)\}\}").expect("valid regex"))
}

/// A fully expanded task ready to hand to a worker.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltTask {
    pub purpose: String,
    pub key_tasks: Vec<String>,
    pub end_state: String,
    pub required_output_schema: Vec<RequiredOutput>,
    pub worker_template: String,
    pub level_name: String,
}

impl BuiltTask {
    /// Render the worker-facing task description, naming the file the worker
    /// must write its JSON output to.
    pub fn description(&self, output_path: &str) -> String {
        let mut text = String::new();
        text.push_str(&format!("Purpose: {}\n\n", self.purpose));
        if !self.key_tasks.is_empty() {
            text.push_str("Key tasks:\n");
            for task in &self.key_tasks {
                text.push_str(&format!("- {}\n", task));
            }
            text.push('\n');
        }
        text.push_str(&format!("End state: {}\n\n", self.end_state));
        if !self.required_output_schema.is_empty() {
            text.push_str("Required output fields:\n");
            for field in &self.required_output_schema {
                text.push_str(&format!("- {} ({})", field.field, field.field_type));
                if !field.description.is_empty() {
                    text.push_str(&format!(": {}", field.description));
                }
                text.push('\n');
            }
            text.push('\n');
        }
        text.push_str(&format!("Write the JSON result to {}", output_path));
        text
    }
}

/// Expands level task templates against evidence and parent output.
#[derive(Debug, Default)]
pub struct TaskBuilder;

impl TaskBuilder {
    /// Build the task for one level of one evidence item's pathway.
    pub fn build(
        level: &LevelDef,
        evidence: &EvidenceItem,
        parent: Option<&LevelOutput>,
        output_path: &str,
    ) -> BuiltTask {
        let context = json!({
            "evidence": serde_json::to_value(evidence).unwrap_or(Value::Null),
            "parent": parent
                .map(|p| serde_json::to_value(p).unwrap_or(Value::Null))
                .unwrap_or(Value::Null),
            "outputPath": output_path,
        });

        BuiltTask {
            purpose: interpolate(&level.task.purpose, &context),
            key_tasks: level
                .task
                .key_tasks
                .iter()
                .map(|t| interpolate(t, &context))
                .collect(),
            end_state: interpolate(&level.task.end_state, &context),
            required_output_schema: level.required_outputs.clone(),
            worker_template: level.worker_template.clone(),
            level_name: level.name.clone(),
        }
    }
}

/// Replace every `{{a.b.c}}` with the dotted-path lookup into `context`.
/// Paths that do not resolve keep the original token.
fn interpolate(template: &str, context: &Value) -> String {
    placeholder_re()
        .replace_all(template, |captures: &regex::Captures<'_>| {
            let path = &captures[1];
            match lookup(context, path) {
                Some(value) => render(value),
                None => captures[0].to_string(),
            }
        })
        .into_owned()
}

fn lookup<'a>(context: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = context;
    for segment in path.split('.') {
        current = current.as_object()?.get(segment)?;
    }
    if current.is_null() {
        None
    } else {
        Some(current)
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
