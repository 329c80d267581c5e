//! Model-driven collaborators of the workflow.
//!
//! The orchestrator only sees the [`Planner`] and [`Drafter`] traits. The
//! implementations here render a prompt, call an [`Executor`] and return a
//! schema-validated value or a typed [`AgentError`].

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::core::types::{Draft, Plan};
use crate::io::executor::{ExecRequest, Executor, execute_and_load_json};

pub mod drafter;
pub mod planner;

pub use drafter::DrafterAgent;
pub use planner::PlannerAgent;

/// Why a planner or drafter call produced nothing usable.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("model backend failed: {0:#}")]
    Backend(anyhow::Error),
    #[error("model wrote no output at {}", .0.display())]
    MissingOutput(PathBuf),
    #[error("could not decode model output: {0}")]
    Decode(String),
    #[error("model output violates its schema: {0}")]
    Schema(String),
    #[error("could not render prompt: {0}")]
    Prompt(String),
    #[error("planner made {0} searches without returning a plan")]
    ToolBudget(u32),
}

/// Turns the user request into a plan. Called once per run.
pub trait Planner {
    fn plan(&self, workdir: &Path, request: &str) -> Result<Plan, AgentError>;
}

/// Turns the request and plan into a candidate card. `scratchpad` holds the
/// critiques of earlier rejected attempts, oldest first.
pub trait Drafter {
    fn draft(
        &self,
        workdir: &Path,
        request: &str,
        plan: &Plan,
        scratchpad: &[String],
    ) -> Result<Draft, AgentError>;
}

/// Limits applied to every model call an agent makes.
#[derive(Debug, Clone, Copy)]
pub struct CallSettings {
    pub timeout: Duration,
    pub output_limit_bytes: usize,
}

/// Write the prompt next to the call's other artifacts and run the model.
pub(crate) fn call_model<E: Executor + ?Sized, T: DeserializeOwned>(
    executor: &E,
    dir: &Path,
    prompt: String,
    schema: &str,
    settings: CallSettings,
) -> Result<T, AgentError> {
    fs::create_dir_all(dir)
        .with_context(|| format!("create call dir {}", dir.display()))
        .map_err(AgentError::Backend)?;
    let prompt_path = dir.join("prompt.md");
    fs::write(&prompt_path, &prompt)
        .with_context(|| format!("write {}", prompt_path.display()))
        .map_err(AgentError::Backend)?;
    let request = ExecRequest::in_dir(dir, prompt, settings.timeout, settings.output_limit_bytes);
    execute_and_load_json(executor, &request, schema)
}
