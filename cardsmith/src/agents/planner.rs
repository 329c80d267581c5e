//! Planner agent with an optional board search loop.
//!
//! With a search tool attached, each round the model either asks for a search
//! or returns the plan. Search results are fed into the next round's prompt.
//! Once `max_tool_calls` searches are spent, the final round only accepts a
//! plan.

use std::path::Path;

use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

use crate::core::types::Plan;
use crate::io::executor::Executor;
use crate::io::prompt::{Finding, PlannerPrompt, PromptEngine};
use crate::io::search::SearchTool;

use super::{AgentError, CallSettings, Planner, call_model};

const PLAN_SCHEMA: &str = include_str!("../../schemas/plan_output.schema.json");
const PLANNER_STEP_SCHEMA: &str = include_str!("../../schemas/planner_step.schema.json");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum StepAction {
    Search,
    Plan,
}

#[derive(Debug, Deserialize)]
struct PlannerStep {
    action: StepAction,
    query: Option<String>,
    steps: Vec<String>,
    reasoning: String,
}

pub struct PlannerAgent<E> {
    executor: E,
    search: Option<Box<dyn SearchTool>>,
    settings: CallSettings,
    max_tool_calls: u32,
    prompts: PromptEngine,
}

impl<E: Executor> PlannerAgent<E> {
    pub fn new(executor: E, settings: CallSettings) -> Self {
        Self {
            executor,
            search: None,
            settings,
            max_tool_calls: 0,
            prompts: PromptEngine::new(),
        }
    }

    /// Let the model look up existing cards, at most `max_tool_calls` times.
    pub fn with_search(mut self, search: Box<dyn SearchTool>, max_tool_calls: u32) -> Self {
        self.search = Some(search);
        self.max_tool_calls = max_tool_calls;
        self
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    fn render(&self, input: &PlannerPrompt<'_>) -> Result<String, AgentError> {
        self.prompts
            .render_planner(input)
            .map_err(|err| AgentError::Prompt(format!("{err:#}")))
    }
}

impl<E: Executor> Planner for PlannerAgent<E> {
    #[instrument(skip_all, fields(max_tool_calls = self.max_tool_calls))]
    fn plan(&self, workdir: &Path, request: &str) -> Result<Plan, AgentError> {
        let mut findings: Vec<Finding> = Vec::new();

        for round in 1..=self.max_tool_calls + 1 {
            let searches_left = self.max_tool_calls.saturating_sub(findings.len() as u32);
            let search = self.search.as_deref().filter(|_| searches_left > 0);
            let dir = workdir.join(format!("round-{round}"));
            let prompt = self.render(&PlannerPrompt {
                request,
                findings: &findings,
                allow_search: search.is_some(),
                searches_left: search.map(|_| searches_left),
            })?;

            let Some(search) = search else {
                let plan: Plan = call_model(&self.executor, &dir, prompt, PLAN_SCHEMA, self.settings)?;
                info!(round, steps = plan.steps.len(), "plan ready");
                return Ok(plan);
            };

            let step: PlannerStep =
                call_model(&self.executor, &dir, prompt, PLANNER_STEP_SCHEMA, self.settings)?;
            match step.action {
                StepAction::Plan => {
                    let plan = Plan {
                        steps: step.steps,
                        reasoning: step.reasoning,
                    };
                    if !plan.is_well_formed() {
                        warn!(round, "planner returned a plan without steps");
                    }
                    info!(round, steps = plan.steps.len(), "plan ready");
                    return Ok(plan);
                }
                StepAction::Search => {
                    let query = step
                        .query
                        .map(|q| q.trim().to_string())
                        .filter(|q| !q.is_empty())
                        .ok_or_else(|| {
                            AgentError::Decode("search action without a query".to_string())
                        })?;
                    debug!(round, %query, "planner searching");
                    let result = search.search(&query);
                    findings.push(Finding {
                        query,
                        result: result.render(),
                    });
                }
            }
        }

        Err(AgentError::ToolBudget(self.max_tool_calls))
    }
}
