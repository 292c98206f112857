//! # inquest-core
//!
//! A research-investigation orchestration library. Given a free-text topic,
//! the engine plans sub-questions, classifies evidence into a typed
//! taxonomy, drives each evidence item through a multi-level investigation
//! pathway on a fleet of remote workers, applies a deterministic confidence
//! calculus, adjudicates per sub-question, and validates the synthesized
//! knowledge graph.
//!
//! ## Core Components
//!
//! - **Pipeline**: the five-phase sequencer (plan, classify, investigate,
//!   adjudicate, synthesize)
//! - **Executor**: one pathway for one evidence item, level by level
//! - **Confidence**: the ordered V/P/U/D/R calculus with caps, downgrades,
//!   and upgrades
//! - **Graph**: artifact types, invariant validation, topology metrics
//!
//! ## Example
//!
//! ```rust,ignore
//! use inquest_core::{
//!     EngineConfig, GatewayConfig, NullIndex, PathwayCatalog, Project,
//!     ResearchPipeline, StrategosGateway, TracingSink,
//! };
//! use std::sync::Arc;
//!
//! let config = EngineConfig::new("pathways", "projects");
//! let pipeline = ResearchPipeline::new(
//!     Arc::new(StrategosGateway::new(GatewayConfig::default())),
//!     Arc::new(PathwayCatalog::new(&config.pathways_dir)),
//!     Arc::new(TracingSink),
//!     Arc::new(NullIndex),
//!     config,
//! );
//!
//! let mut project = Project::new("proj-1", "microplastics in drinking water");
//! pipeline.run(&mut project).await?;
//! ```

pub mod adjudicator;
pub mod confidence;
pub mod config;
pub mod error;
pub mod event;
pub mod executor;
pub mod graph;
pub mod index;
pub mod investigation;
pub mod model;
pub mod pathway;
pub mod pipeline;
pub mod project;
pub mod worker;

// Re-exports for convenience
pub use adjudicator::{Adjudicator, SubQuestionAdjudication, FLAG_CONTRARIAN_DOWNGRADE};
pub use confidence::{
    assess, Confidence, ConfidenceAssessment, FLAG_INDUSTRY_FUNDING, FLAG_LOW_HIERARCHY,
    FLAG_SMALL_SAMPLE, FLAG_TESTIMONIAL_ONLY,
};
pub use config::{EngineConfig, GatewayConfig};
pub use error::{Error, Result};
pub use event::{EngineEvent, EventKind, EventSink, MemorySink, NullSink, TracingSink};
pub use executor::{CrossPathwayDiscovery, InvestigationExecutor, PathwayRun, MAX_DEPTH};
pub use graph::{
    build_edge, build_node, compute_topology_metrics, validate, Edge, EdgeType, Node, NodeType,
    Topic, TopologyMetrics, ValidationReport,
};
pub use index::{DirIndex, NullIndex, ProjectIndex, RelatedProject};
pub use investigation::InvestigationOrchestrator;
pub use model::{
    AdjudicatedEvidence, EvidenceItem, EvidenceManifest, EvidenceType, Plan, SourceRating,
    SubQuestion,
};
pub use pathway::{
    evaluate, Branch, BuiltTask, Citation, Condition, LevelDef, LevelOutput, Operator, Pathway,
    PathwayCatalog, RequiredOutput, TaskBuilder, TaskTemplate, TERMINATE,
};
pub use pipeline::{
    ResearchPipeline, CLASSIFIER_TEMPLATE, PLANNING_TEMPLATE, SYNTHESIS_TEMPLATE,
};
pub use project::{Project, ProjectStatus, ProjectStore};
pub use worker::{
    SpawnRequest, SpawnTask, StrategosGateway, WorkerGateway, WorkerId, WorkerState, WorkerStatus,
    DEFAULT_WAIT_TIMEOUT,
};
