//! Prompt rendering for the planner and drafter.

use anyhow::Result;
use minijinja::{Environment, context};
use serde::Serialize;

use crate::core::types::{Category, Plan};

const PLANNER_TEMPLATE: &str = include_str!("prompts/planner.md");
const DRAFTER_TEMPLATE: &str = include_str!("prompts/drafter.md");

/// A search the planner made and what it returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub query: String,
    pub result: String,
}

/// Inputs for one planner round.
#[derive(Debug, Clone)]
pub struct PlannerPrompt<'a> {
    pub request: &'a str,
    pub findings: &'a [Finding],
    /// Whether the model may answer with a search instead of a plan.
    pub allow_search: bool,
    pub searches_left: Option<u32>,
}

/// Inputs for one drafting attempt.
#[derive(Debug, Clone)]
pub struct DrafterPrompt<'a> {
    pub request: &'a str,
    pub plan: &'a Plan,
    /// Critiques of earlier attempts, oldest first.
    pub scratchpad: &'a [String],
    pub categories: &'a [Category],
    /// Whether the draft may name an existing card to update.
    pub allow_update: bool,
}

/// Template engine wrapper around minijinja.
pub struct PromptEngine {
    env: Environment<'static>,
}

impl Default for PromptEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl PromptEngine {
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_trim_blocks(true);
        env.add_template("planner", PLANNER_TEMPLATE)
            .expect("planner template should be valid");
        env.add_template("drafter", DRAFTER_TEMPLATE)
            .expect("drafter template should be valid");
        Self { env }
    }

    pub fn render_planner(&self, input: &PlannerPrompt<'_>) -> Result<String> {
        let template = self.env.get_template("planner")?;
        let rendered = template.render(context! {
            request => input.request.trim(),
            findings => input.findings,
            allow_search => input.allow_search,
            searches_left => input.searches_left,
        })?;
        Ok(rendered)
    }

    pub fn render_drafter(&self, input: &DrafterPrompt<'_>) -> Result<String> {
        let template = self.env.get_template("drafter")?;
        let categories: Vec<&str> = input.categories.iter().map(Category::as_str).collect();
        let scratchpad: Vec<&str> = input
            .scratchpad
            .iter()
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
            .collect();
        let rendered = template.render(context! {
            request => input.request.trim(),
            plan => input.plan,
            scratchpad => scratchpad,
            categories => categories,
            allow_update => input.allow_update,
        })?;
        Ok(rendered)
    }
}
