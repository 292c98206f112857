//! Core data model: evidence taxonomy, ratings, plans, and manifests.
//!
//! Evidence items are immutable once their manifest is written; everything
//! here is plain data shared between the pipeline phases.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::confidence::Confidence;

/// The closed evidence taxonomy. Each type maps 1:1 to a pathway id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EvidenceType {
    /// Peer-reviewed scientific literature
    #[serde(rename = "SCI")]
    Scientific,
    /// Government / regulatory publications
    #[serde(rename = "GOV")]
    Government,
    /// NGO and organizational reports
    #[serde(rename = "ORG")]
    Organizational,
    /// Expert commentary and opinion
    #[serde(rename = "EXP")]
    Expert,
    /// Statistical datasets
    #[serde(rename = "STA")]
    Statistical,
    /// Financial disclosures and filings
    #[serde(rename = "FIN")]
    Financial,
    /// Primary documents
    #[serde(rename = "DOC")]
    Documentary,
    /// Media coverage
    #[serde(rename = "MED")]
    Media,
    /// Historical records
    #[serde(rename = "HIS")]
    Historical,
    /// Testimonial accounts
    #[serde(rename = "TES")]
    Testimonial,
    /// Technical / engineering material
    #[serde(rename = "TEC")]
    Technical,
}

impl EvidenceType {
    pub const ALL: [EvidenceType; 11] = [
        Self::Scientific,
        Self::Government,
        Self::Organizational,
        Self::Expert,
        Self::Statistical,
        Self::Financial,
        Self::Documentary,
        Self::Media,
        Self::Historical,
        Self::Testimonial,
        Self::Technical,
    ];

    /// The three-letter wire code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Scientific => "SCI",
            Self::Government => "GOV",
            Self::Organizational => "ORG",
            Self::Expert => "EXP",
            Self::Statistical => "STA",
            Self::Financial => "FIN",
            Self::Documentary => "DOC",
            Self::Media => "MED",
            Self::Historical => "HIS",
            Self::Testimonial => "TES",
            Self::Technical => "TEC",
        }
    }

    /// The pathway this evidence type triggers.
    pub fn pathway_id(&self) -> String {
        format!("P-{}", self.code())
    }
}

impl FromStr for EvidenceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|t| t.code() == s)
            .copied()
            .ok_or_else(|| format!("unknown evidence type: {}", s))
    }
}

impl std::fmt::Display for EvidenceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Source reliability rating, A (best) through F.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SourceRating {
    A,
    B,
    C,
    D,
    E,
    F,
}

impl SourceRating {
    /// A and B ratings count toward verified-confidence thresholds.
    pub fn is_high_quality(&self) -> bool {
        matches!(self, Self::A | Self::B)
    }
}

impl FromStr for SourceRating {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "A" => Ok(Self::A),
            "B" => Ok(Self::B),
            "C" => Ok(Self::C),
            "D" => Ok(Self::D),
            "E" => Ok(Self::E),
            "F" => Ok(Self::F),
            other => Err(format!("unknown source rating: {}", other)),
        }
    }
}

/// One sub-question of the research plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubQuestion {
    pub id: String,
    pub question: String,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub expected_evidence_types: Vec<String>,
}

/// The planning-phase output: an ordered list of sub-questions.
///
/// The planning worker contract asks for 5-8 sub-questions with at least one
/// concerning actionable recommendations; the pipeline itself only hard-fails
/// on an empty plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub sub_questions: Vec<SubQuestion>,
}

impl Plan {
    /// Whether the plan satisfies the planning-worker contract in full.
    pub fn meets_contract(&self) -> bool {
        (5..=8).contains(&self.sub_questions.len())
            && self.sub_questions.iter().any(|q| {
                let text = format!("{} {}", q.question, q.scope.as_deref().unwrap_or(""));
                text.to_lowercase().contains("recommendation")
            })
    }
}

/// A single classified piece of evidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceItem {
    pub id: String,
    #[serde(rename = "type")]
    pub evidence_type: EvidenceType,
    pub source_rating: SourceRating,
    /// Information rating, 1 (confirmed) through 6 (unjudgeable)
    pub info_rating: u8,
    pub description: String,
    #[serde(default)]
    pub citation: Option<String>,
    pub triggered_pathway: String,
}

impl EvidenceItem {
    /// Derive a second-wave item for a cross-pathway discovery.
    pub fn cross_pathway(&self, evidence_type: EvidenceType) -> EvidenceItem {
        EvidenceItem {
            id: format!("{}-cross-{}", self.id, evidence_type.code()),
            evidence_type,
            source_rating: self.source_rating,
            info_rating: self.info_rating,
            description: format!("Cross-pathway from {}: {}", self.id, self.description),
            citation: self.citation.clone(),
            triggered_pathway: evidence_type.pathway_id(),
        }
    }
}

/// Output of one classification worker: the sub-questions it covered and the
/// evidence items it produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceManifest {
    #[serde(default)]
    pub sub_question_id: Option<String>,
    #[serde(default)]
    pub sub_questions: Vec<String>,
    pub evidence_items: Vec<EvidenceItem>,
}

impl EvidenceManifest {
    /// Whether this manifest covers the given sub-question.
    pub fn covers(&self, sub_question_id: &str) -> bool {
        self.sub_question_id.as_deref() == Some(sub_question_id)
            || self.sub_questions.iter().any(|q| q == sub_question_id)
    }
}

/// One adjudicated record per evidence item, pairing inputs with the
/// confidence engine's outputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdjudicatedEvidence {
    pub evidence_id: String,
    pub confidence: Confidence,
    pub label: String,
    pub rationale: String,
    pub pathway_id: String,
    pub levels_completed: usize,
    #[serde(default)]
    pub flags: Vec<String>,
}
