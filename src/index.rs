//! Seam to the external project search index.
//!
//! The real BM25 matcher lives outside this crate; the engine only needs to
//! record a completed project and look up related prior projects for
//! cross-project reconciliation.

use async_trait::async_trait;
use serde_json::Value;
use std::path::PathBuf;

use crate::error::Result;
use crate::project::Project;

/// A prior project surfaced for reconciliation.
#[derive(Debug, Clone)]
pub struct RelatedProject {
    pub project_id: String,
    pub topic: String,
    pub graph: Value,
}

/// External index of completed projects.
#[async_trait]
pub trait ProjectIndex: Send + Sync {
    /// Record a completed project. Called even when validation failed.
    async fn record(&self, project: &Project, graph: &Value) -> Result<()>;

    /// Prior projects related to a topic, best matches first.
    async fn related(&self, topic: &str, limit: usize) -> Result<Vec<RelatedProject>>;
}

/// Index that records nothing and relates nothing.
#[derive(Debug, Default)]
pub struct NullIndex;

#[async_trait]
impl ProjectIndex for NullIndex {
    async fn record(&self, _project: &Project, _graph: &Value) -> Result<()> {
        Ok(())
    }

    async fn related(&self, _topic: &str, _limit: usize) -> Result<Vec<RelatedProject>> {
        Ok(Vec::new())
    }
}

/// Minimal local index backed by the projects directory itself: completed
/// project directories already hold `project.json` and `graph.json`, so
/// recording is a no-op and relatedness is naive token overlap.
#[derive(Debug)]
pub struct DirIndex {
    projects_dir: PathBuf,
}

impl DirIndex {
    pub fn new(projects_dir: impl Into<PathBuf>) -> Self {
        Self {
            projects_dir: projects_dir.into(),
        }
    }

    fn tokens(text: &str) -> Vec<String> {
        text.to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| t.len() > 3)
            .map(str::to_string)
            .collect()
    }
}

#[async_trait]
impl ProjectIndex for DirIndex {
    async fn record(&self, _project: &Project, _graph: &Value) -> Result<()> {
        // The project directory is the index.
        Ok(())
    }

    async fn related(&self, topic: &str, limit: usize) -> Result<Vec<RelatedProject>> {
        let query: Vec<String> = Self::tokens(topic);
        let pattern = format!("{}/*/project.json", self.projects_dir.display());

        let mut scored: Vec<(usize, RelatedProject)> = Vec::new();
        for entry in glob::glob(&pattern)
            .map_err(|e| crate::error::Error::Config(format!("bad index glob: {}", e)))?
        {
            let Ok(path) = entry else { continue };
            let Ok(raw) = std::fs::read_to_string(&path) else {
                continue;
            };
            let Ok(project) = serde_json::from_str::<Project>(&raw) else {
                continue;
            };
            if project.topic == topic {
                continue;
            }

            let overlap = Self::tokens(&project.topic)
                .iter()
                .filter(|t| query.contains(t))
                .count();
            if overlap == 0 {
                continue;
            }

            let graph_path = path.with_file_name("graph.json");
            let Ok(graph_raw) = std::fs::read_to_string(&graph_path) else {
                continue;
            };
            let Ok(graph) = serde_json::from_str::<Value>(&graph_raw) else {
                continue;
            };

            scored.push((
                overlap,
                RelatedProject {
                    project_id: project.id,
                    topic: project.topic,
                    graph,
                },
            ));
        }

        scored.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(scored.into_iter().take(limit).map(|(_, p)| p).collect())
    }
}
