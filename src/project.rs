//! Project identity, status lifecycle, and the on-disk artifact layout.
//!
//! Each project owns one directory; every artifact inside it has a single
//! writer (the pipeline or one spawned worker), so write-write races are
//! structurally impossible.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Project status: a total order of phase names plus the terminal states.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Pending,
    Planning,
    Classifying,
    Investigating,
    Adjudicating,
    Synthesizing,
    Complete,
    Error,
}

impl ProjectStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Error)
    }
}

impl std::fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Planning => "planning",
            Self::Classifying => "classifying",
            Self::Investigating => "investigating",
            Self::Adjudicating => "adjudicating",
            Self::Synthesizing => "synthesizing",
            Self::Complete => "complete",
            Self::Error => "error",
        };
        write!(f, "{}", s)
    }
}

/// A research project: one topic, one directory, one artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub topic: String,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    pub status: ProjectStatus,
    #[serde(default)]
    pub status_detail: Option<String>,
}

impl Project {
    pub fn new(id: impl Into<String>, topic: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            topic: topic.into(),
            created: now,
            updated: now,
            status: ProjectStatus::Pending,
            status_detail: None,
        }
    }
}

/// Paths and typed JSON I/O for one project directory.
#[derive(Debug, Clone)]
pub struct ProjectStore {
    root: PathBuf,
}

impl ProjectStore {
    /// Open (creating if needed) the directory for a project.
    pub fn open(projects_dir: &Path, project_id: &str) -> Result<Self> {
        let root = projects_dir.join(project_id);
        std::fs::create_dir_all(root.join("manifests"))?;
        std::fs::create_dir_all(root.join("investigations"))?;
        std::fs::create_dir_all(root.join("adjudicated"))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn project_file(&self) -> PathBuf {
        self.root.join("project.json")
    }

    pub fn plan_file(&self) -> PathBuf {
        self.root.join("plan.json")
    }

    pub fn manifest_file(&self, index: usize) -> PathBuf {
        self.root.join("manifests").join(format!("manifest-{}.json", index))
    }

    pub fn level_output_file(&self, evidence_id: &str, depth: u32) -> PathBuf {
        self.root
            .join("investigations")
            .join(format!("{}-level{}.json", evidence_id, depth))
    }

    pub fn adjudicated_file(&self, sub_question_id: &str) -> PathBuf {
        self.root
            .join("adjudicated")
            .join(format!("{}.json", sub_question_id))
    }

    pub fn graph_file(&self) -> PathBuf {
        self.root.join("graph.json")
    }

    pub fn summary_file(&self) -> PathBuf {
        self.root.join("summary.json")
    }

    pub fn validation_errors_file(&self) -> PathBuf {
        self.root.join("validation-errors.json")
    }

    /// Read and deserialize a JSON artifact.
    pub fn read_json<T: DeserializeOwned>(&self, path: &Path) -> Result<T> {
        let raw = std::fs::read_to_string(path)
            .map_err(|_| Error::missing_artifact(path.display().to_string()))?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Serialize and write a JSON artifact.
    pub fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> Result<()> {
        let raw = serde_json::to_string_pretty(value)?;
        std::fs::write(path, raw)?;
        Ok(())
    }

    /// Persist the project record, bumping its `updated` timestamp.
    pub fn save_project(&self, project: &mut Project) -> Result<()> {
        project.updated = Utc::now();
        self.write_json(&self.project_file(), project)
    }

    /// Read back every classification manifest, in index order.
    pub fn read_manifests(&self) -> Result<Vec<crate::model::EvidenceManifest>> {
        let dir = self.root.join("manifests");
        let mut paths: Vec<PathBuf> = std::fs::read_dir(&dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|p| p.extension().is_some_and(|e| e == "json"))
            .collect();
        paths.sort();

        let mut manifests = Vec::with_capacity(paths.len());
        for path in paths {
            manifests.push(self.read_json(&path)?);
        }
        Ok(manifests)
    }
}
