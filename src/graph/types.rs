//! Knowledge-graph node, edge, and topic types, plus the pure builders the
//! synthesis path and tests share.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;

use crate::confidence::Confidence;

/// Closed set of node types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeType {
    Domain,
    Contaminant,
    HealthEffect,
    Solution,
    Product,
    Recommendation,
    Context,
    Investigation,
}

impl NodeType {
    pub const ALL: [NodeType; 8] = [
        Self::Domain,
        Self::Contaminant,
        Self::HealthEffect,
        Self::Solution,
        Self::Product,
        Self::Recommendation,
        Self::Context,
        Self::Investigation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Domain => "domain",
            Self::Contaminant => "contaminant",
            Self::HealthEffect => "health-effect",
            Self::Solution => "solution",
            Self::Product => "product",
            Self::Recommendation => "recommendation",
            Self::Context => "context",
            Self::Investigation => "investigation",
        }
    }
}

impl FromStr for NodeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|t| t.as_str() == s)
            .copied()
            .ok_or_else(|| format!("unknown node type: {}", s))
    }
}

/// Closed set of edge types. Legacy names normalize to their canonical form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeType {
    Causation,
    Evidence,
    Composition,
    Addresses,
    Gap,
    Contextualizes,
    Investigates,
}

impl EdgeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Causation => "causation",
            Self::Evidence => "evidence",
            Self::Composition => "composition",
            Self::Addresses => "addresses",
            Self::Gap => "gap",
            Self::Contextualizes => "contextualizes",
            Self::Investigates => "investigates",
        }
    }

    /// Parse an edge-type string, accepting the legacy aliases
    /// `solution`, `context`, and `investigation`.
    pub fn normalize(s: &str) -> Option<EdgeType> {
        match s {
            "causation" => Some(Self::Causation),
            "evidence" => Some(Self::Evidence),
            "composition" => Some(Self::Composition),
            "addresses" | "solution" => Some(Self::Addresses),
            "gap" => Some(Self::Gap),
            "contextualizes" | "context" => Some(Self::Contextualizes),
            "investigates" | "investigation" => Some(Self::Investigates),
            _ => None,
        }
    }
}

/// One graph node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: String,
    pub label: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_stats: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence_rationale: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub investigation_pathway: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,
}

/// One graph edge. Edges may form cycles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub source: String,
    pub target: String,
    pub label: String,
    #[serde(rename = "type")]
    pub edge_type: EdgeType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub citation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
}

/// A topic entry backing one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topic {
    pub title: String,
    #[serde(default)]
    pub sections: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub citations: Option<Vec<String>>,
}

/// Build a node with a normalized id (kebab-case) and uppercase label.
///
/// When a categorical confidence is supplied without a numeric score, the
/// score is derived from the category midpoint and rounded to two decimals;
/// an explicit score is clamped to [0, 1].
pub fn build_node(
    id: &str,
    label: &str,
    node_type: NodeType,
    confidence: Option<Confidence>,
    confidence_score: Option<f64>,
) -> Node {
    let score = match (confidence_score, confidence) {
        (Some(score), _) => Some(round2(score.clamp(0.0, 1.0))),
        (None, Some(categorical)) => Some(round2(categorical.score())),
        (None, None) => None,
    };

    Node {
        id: kebab_case(id),
        label: label.to_uppercase(),
        node_type,
        parent: None,
        summary: None,
        key_stats: None,
        confidence: confidence.map(|c| c.graph_label().to_string()),
        confidence_score: score,
        confidence_rationale: None,
        investigation_pathway: None,
        severity: None,
    }
}

/// Build an edge, normalizing legacy type aliases and clamping confidence.
/// Unknown types fall back to `evidence`.
pub fn build_edge(
    source: &str,
    target: &str,
    label: &str,
    edge_type: &str,
    confidence: Option<f64>,
) -> Edge {
    Edge {
        source: kebab_case(source),
        target: kebab_case(target),
        label: label.to_uppercase(),
        edge_type: EdgeType::normalize(edge_type).unwrap_or(EdgeType::Evidence),
        citation: None,
        confidence: confidence.map(|c| round2(c.clamp(0.0, 1.0))),
        weight: None,
    }
}

fn kebab_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut last_dash = true;
    for c in s.chars() {
        if c.is_alphanumeric() {
            out.extend(c.to_lowercase());
            last_dash = false;
        } else if !last_dash {
            out.push('-');
            last_dash = true;
        }
    }
    out.trim_end_matches('-').to_string()
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}
