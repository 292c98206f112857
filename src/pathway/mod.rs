//! Investigation pathways: definitions, the condition DSL, and task building.

pub mod catalog;
pub mod condition;
pub mod task;
pub mod types;

pub use catalog::PathwayCatalog;
pub use condition::evaluate;
pub use task::{BuiltTask, TaskBuilder};
pub use types::{
    Branch, Citation, Condition, LevelDef, LevelOutput, Operator, Pathway, RequiredOutput,
    TaskTemplate, TERMINATE,
};
