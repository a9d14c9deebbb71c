//! Scope schema produced by extraction.
//!
//! The completion service returns free text that should be JSON in this
//! shape. Every field is defaulted: after a successful parse there are no
//! absent fields, so downstream consumers never branch on optionality.
//! Aliases tolerate the field names older prompt revisions used.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Structured project scope derived from a free-text request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Scope {
    /// Identifier-safe project label.
    #[serde(alias = "project")]
    pub project_name: String,

    /// What the project is trying to achieve.
    pub goal: String,

    /// Facet -> description, e.g. "frontend" -> "Next.js + Tailwind".
    pub tech_stack: BTreeMap<String, String>,

    /// Ordered feature list.
    pub features: Vec<String>,

    /// Comparable products with strengths/gaps.
    #[serde(alias = "comps")]
    pub comparables: Vec<String>,

    /// Rough delivery timeline, e.g. "1-2h MVP".
    pub timeline: String,

    /// Expected deliverable.
    pub outcome: String,

    /// In/out boundaries, milestones, risks, KPIs.
    #[serde(alias = "scope_of_works")]
    pub scope_of_work: ScopeOfWork,
}

/// Scope-of-work breakdown.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScopeOfWork {
    pub in_scope: Vec<String>,
    #[serde(alias = "out_of_scope")]
    pub out_scope: Vec<String>,
    pub milestones: Vec<String>,
    pub risks: Vec<String>,
    pub kpis: Vec<String>,
}

impl Scope {
    /// A scope is actionable when extraction recovered at least a goal or a
    /// feature list; anything less needs a clarification turn instead of a
    /// project.
    pub fn is_actionable(&self) -> bool {
        !self.goal.trim().is_empty() || !self.features.is_empty()
    }
}

/// One subtask as drafted by the completion service, before normalization.
///
/// IDs and priorities in the draft are advisory; the generator reassigns
/// positional IDs and maps unparseable priorities to the role default.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SubtaskDraft {
    pub id: String,
    pub title: String,
    pub description: String,
    pub priority: String,
    pub tools: Vec<String>,
}
