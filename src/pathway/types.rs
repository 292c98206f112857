//! Pathway definition and level-output types.
//!
//! Pathway definitions are static JSON loaded from disk; level outputs are
//! produced by workers and read back from the project directory. Both are
//! camelCase on the wire.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Sentinel `nextLevel` meaning "terminate the pathway".
pub const TERMINATE: i32 = -1;

/// A typed investigation script tied to a single evidence type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pathway {
    pub id: String,
    pub levels: Vec<LevelDef>,
}

impl Pathway {
    /// Levels in depth order, limited to the executor's depth cap.
    pub fn levels_through(&self, max_depth: u32) -> Vec<&LevelDef> {
        let mut levels: Vec<&LevelDef> = self
            .levels
            .iter()
            .filter(|l| l.depth >= 1 && l.depth <= max_depth)
            .collect();
        levels.sort_by_key(|l| l.depth);
        levels
    }
}

/// One step of a pathway. Its `branches` gate entry into the level,
/// evaluated against the previous level's signals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelDef {
    pub depth: u32,
    pub name: String,
    pub worker_template: String,
    pub task: TaskTemplate,
    #[serde(default)]
    pub required_outputs: Vec<RequiredOutput>,
    #[serde(default)]
    pub branches: Vec<Branch>,
}

/// The templated task text for one level. `{{dotted.path}}` placeholders are
/// expanded by the task builder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskTemplate {
    pub purpose: String,
    #[serde(default)]
    pub key_tasks: Vec<String>,
    pub end_state: String,
}

/// A field the worker must include in its level output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequiredOutput {
    pub field: String,
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(default)]
    pub description: String,
}

/// A conditional transition into a level (or TERMINATE).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Branch {
    pub condition: Condition,
    pub next_level: i32,
}

impl Branch {
    pub fn is_terminate(&self) -> bool {
        self.next_level == TERMINATE
    }
}

/// A single condition of the branch DSL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub field: String,
    pub operator: Operator,
    #[serde(default)]
    pub value: Option<Value>,
}

/// The eight condition operators. Unknown operators deserialize to
/// [`Operator::Unknown`] and always evaluate false.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Operator {
    Equals,
    NotEquals,
    Contains,
    GreaterThan,
    LessThan,
    In,
    Exists,
    NotExists,
    #[serde(other)]
    Unknown,
}

/// A citation attached to a level output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub text: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub year: Option<i32>,
}

/// The JSON a level worker writes when it finishes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelOutput {
    pub pathway_id: String,
    pub depth: u32,
    #[serde(default)]
    pub evidence_found: bool,
    #[serde(default)]
    pub source_rating: Option<crate::model::SourceRating>,
    #[serde(default)]
    pub info_rating: Option<u8>,
    #[serde(default)]
    pub findings: Value,
    #[serde(default)]
    pub branch_signals: Option<Value>,
    #[serde(default)]
    pub citations: Vec<Citation>,
    #[serde(default)]
    pub next_evidence_types: Vec<String>,
}

impl LevelOutput {
    /// The signal map downstream branches evaluate against: `branchSignals`
    /// when present, falling back to `findings`.
    pub fn signals(&self) -> &Value {
        match &self.branch_signals {
            Some(signals) if !signals.is_null() => signals,
            _ => &self.findings,
        }
    }
}
