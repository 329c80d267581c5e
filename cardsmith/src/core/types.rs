//! Shared value types passed between the workflow and its collaborators.
//!
//! Everything here is plain data: produced once by a collaborator, moved into
//! the workflow state, never mutated afterwards.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Work-item category. The set is closed; model output naming anything else
/// is rejected at the agent boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Bug,
    Feature,
    Docs,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Bug, Category::Feature, Category::Docs];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Bug => "Bug",
            Category::Feature => "Feature",
            Category::Docs => "Docs",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Candidate work-item awaiting evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Draft {
    pub title: String,
    pub description: String,
    pub category: Category,
    /// Opaque id of an existing card to update instead of creating a new one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub existing_id: Option<String>,
}

impl Draft {
    /// Card name as shown on the board: `[{category}] {title}`.
    pub fn card_name(&self) -> String {
        format!("[{}] {}", self.category, self.title)
    }
}

/// Decomposition of the request, computed once per run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub steps: Vec<String>,
    pub reasoning: String,
}

impl Plan {
    /// An empty plan is still handed to the drafter; it is just a weak one.
    pub fn is_well_formed(&self) -> bool {
        !self.steps.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Approve,
    Reject,
}

/// Verdict on a draft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evaluation {
    pub decision: Decision,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub critique: Option<String>,
}

impl Evaluation {
    pub fn approve() -> Self {
        Self {
            decision: Decision::Approve,
            critique: None,
        }
    }

    pub fn reject(critique: impl Into<String>) -> Self {
        Self {
            decision: Decision::Reject,
            critique: Some(critique.into()),
        }
    }

    pub fn is_approved(&self) -> bool {
        self.decision == Decision::Approve
    }

    /// Critique worth feeding back to the drafter (present and non-blank).
    pub fn feedback(&self) -> Option<&str> {
        self.critique
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }
}
