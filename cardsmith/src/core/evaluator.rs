//! Deterministic rule engine that gates what reaches the tracker.
//!
//! Rules run in order and the first failing rule decides the verdict. A draft
//! that passes every rule is approved. The evaluator holds no state between
//! calls, so the same draft always yields the same evaluation.

use serde::{Deserialize, Serialize};

use crate::core::types::{Category, Draft, Evaluation};

pub const NO_DRAFT_CRITIQUE: &str = "no draft: the drafter did not produce a card";

/// Which deployment rule configuration is active. Exactly one applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RuleSet {
    /// Creation-only deployments: descriptions must carry some detail and no
    /// draft may target an existing card.
    DescriptionLength,
    /// Deployments with search: an `existing_id` must look like a real card id.
    ExistingId,
}

/// A single check over a draft. `check` returns the critique when it fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rule {
    MinDescription { min_chars: usize },
    CreateOnly,
    OpaqueExistingId { min_chars: usize },
    AllowedCategory { allowed: Vec<Category> },
}

impl Rule {
    pub fn check(&self, draft: &Draft) -> Option<String> {
        match self {
            Rule::MinDescription { min_chars } => {
                let len = draft.description.chars().count();
                (len < *min_chars).then(|| {
                    format!(
                        "description too short ({len} characters, need at least {min_chars}); \
                         describe the problem or request in more detail"
                    )
                })
            }
            Rule::CreateOnly => {
                let id = draft.existing_id.as_deref()?;
                Some(format!(
                    "existing_id '{id}' is not allowed: this board only accepts new cards. \
                     Set existing_id to null"
                ))
            }
            Rule::OpaqueExistingId { min_chars } => {
                let id = draft.existing_id.as_deref()?;
                let problem = if id.contains(' ') {
                    "it contains a space".to_string()
                } else if !id.chars().all(|c| c.is_ascii_alphanumeric()) {
                    "it contains characters other than letters and digits".to_string()
                } else if id.chars().count() < *min_chars {
                    format!("it is shorter than {min_chars} characters")
                } else {
                    return None;
                };
                Some(format!(
                    "existing_id '{id}' is invalid because {problem}; it must be the opaque card id \
                     returned by the search step, not a person's name or a fragment of a title. \
                     Leave existing_id empty to create a new card"
                ))
            }
            Rule::AllowedCategory { allowed } => {
                if allowed.contains(&draft.category) {
                    return None;
                }
                let names: Vec<&str> = allowed.iter().map(Category::as_str).collect();
                Some(format!(
                    "category '{}' is not allowed here; use one of: {}",
                    draft.category,
                    names.join(", ")
                ))
            }
        }
    }
}

/// Threshold settings for [`Evaluator::new`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluatorSettings {
    pub rule_set: RuleSet,
    pub min_description_chars: usize,
    pub min_id_chars: usize,
    pub allowed_categories: Vec<Category>,
}

impl Default for EvaluatorSettings {
    fn default() -> Self {
        Self {
            rule_set: RuleSet::ExistingId,
            min_description_chars: 10,
            min_id_chars: 10,
            allowed_categories: Category::ALL.to_vec(),
        }
    }
}

/// A draft that passed every rule. Only [`Evaluator::approve`] builds one, so
/// holding it is proof the commit precondition holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovedDraft {
    draft: Draft,
}

impl ApprovedDraft {
    pub fn draft(&self) -> &Draft {
        &self.draft
    }

    pub fn into_inner(self) -> Draft {
        self.draft
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluator {
    rules: Vec<Rule>,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new(&EvaluatorSettings::default())
    }
}

impl Evaluator {
    pub fn new(settings: &EvaluatorSettings) -> Self {
        let mut rules = Vec::new();
        match settings.rule_set {
            RuleSet::DescriptionLength => {
                rules.push(Rule::MinDescription {
                    min_chars: settings.min_description_chars,
                });
                rules.push(Rule::CreateOnly);
            }
            RuleSet::ExistingId => rules.push(Rule::OpaqueExistingId {
                min_chars: settings.min_id_chars,
            }),
        }
        rules.push(Rule::AllowedCategory {
            allowed: settings.allowed_categories.clone(),
        });
        Self { rules }
    }

    /// Build an evaluator from an explicit rule list (order is significant).
    pub fn with_rules(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn evaluate(&self, draft: Option<&Draft>) -> Evaluation {
        let Some(draft) = draft else {
            return Evaluation::reject(NO_DRAFT_CRITIQUE);
        };
        self.rules
            .iter()
            .find_map(|rule| rule.check(draft))
            .map_or_else(Evaluation::approve, |critique| Evaluation::reject(critique))
    }

    /// Evaluate and, on approval, wrap the draft for the committer.
    pub fn approve(&self, draft: &Draft) -> Result<ApprovedDraft, Evaluation> {
        let evaluation = self.evaluate(Some(draft));
        if evaluation.is_approved() {
            Ok(ApprovedDraft {
                draft: draft.clone(),
            })
        } else {
            Err(evaluation)
        }
    }
}
