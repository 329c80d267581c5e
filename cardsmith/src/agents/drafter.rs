//! Drafter agent: request + plan + critiques -> card draft.

use std::path::Path;

use tracing::{info, instrument};

use crate::core::types::{Category, Draft, Plan};
use crate::io::executor::Executor;
use crate::io::prompt::{DrafterPrompt, PromptEngine};

use super::{AgentError, CallSettings, Drafter, call_model};

const DRAFT_SCHEMA: &str = include_str!("../../schemas/draft_output.schema.json");

pub struct DrafterAgent<E> {
    executor: E,
    settings: CallSettings,
    categories: Vec<Category>,
    allow_update: bool,
    prompts: PromptEngine,
}

impl<E: Executor> DrafterAgent<E> {
    pub fn new(executor: E, settings: CallSettings) -> Self {
        Self {
            executor,
            settings,
            categories: Category::ALL.to_vec(),
            allow_update: true,
            prompts: PromptEngine::new(),
        }
    }

    /// Categories offered to the model. The evaluator still has the last word.
    pub fn with_categories(mut self, categories: Vec<Category>) -> Self {
        self.categories = categories;
        self
    }

    /// Creation-only drafting: the prompt asks for a null `existing_id` and any
    /// id the model returns anyway is dropped.
    pub fn with_updates(mut self, allow_update: bool) -> Self {
        self.allow_update = allow_update;
        self
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }
}

impl<E: Executor> Drafter for DrafterAgent<E> {
    #[instrument(skip_all, fields(critiques = scratchpad.len()))]
    fn draft(
        &self,
        workdir: &Path,
        request: &str,
        plan: &Plan,
        scratchpad: &[String],
    ) -> Result<Draft, AgentError> {
        let prompt = self
            .prompts
            .render_drafter(&DrafterPrompt {
                request,
                plan,
                scratchpad,
                categories: &self.categories,
                allow_update: self.allow_update,
            })
            .map_err(|err| AgentError::Prompt(format!("{err:#}")))?;
        let draft: Draft = call_model(&self.executor, workdir, prompt, DRAFT_SCHEMA, self.settings)?;
        let mut draft = normalize(draft);
        if !self.allow_update {
            draft.existing_id = None;
        }
        info!(category = %draft.category, update = draft.existing_id.is_some(), "draft ready");
        Ok(draft)
    }
}

/// Trim text fields; a blank `existing_id` means "create".
fn normalize(draft: Draft) -> Draft {
    Draft {
        title: draft.title.trim().to_string(),
        description: draft.description.trim().to_string(),
        category: draft.category,
        existing_id: draft
            .existing_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ScriptedExecutor, call_settings};
    use serde_json::json;

    fn plan() -> Plan {
        Plan {
            steps: vec!["File a bug".to_string()],
            reasoning: "defect".to_string(),
        }
    }

    #[test]
    fn decodes_and_normalizes_draft() {
        let temp = tempfile::tempdir().expect("tempdir");
        let executor = ScriptedExecutor::new(vec![json!({
            "title": "  Login crashes on iOS ",
            "description": "The login page crashes on iOS after submit.",
            "category": "Bug",
            "existing_id": "   "
        })]);
        let drafter = DrafterAgent::new(executor, call_settings());

        let draft = drafter
            .draft(temp.path(), "Fix the login page crashing on iOS", &plan(), &[])
            .expect("draft");

        assert_eq!(draft.title, "Login crashes on iOS");
        assert_eq!(draft.category, Category::Bug);
        assert_eq!(draft.existing_id, None);
        assert!(temp.path().join("output.json").is_file());
    }

    #[test]
    fn critiques_are_part_of_the_prompt() {
        let temp = tempfile::tempdir().expect("tempdir");
        let executor = ScriptedExecutor::new(vec![json!({
            "title": "t",
            "description": "long enough description",
            "category": "Docs",
            "existing_id": null
        })]);
        let drafter = DrafterAgent::new(executor, call_settings());
        let scratchpad = vec!["existing_id 'Shelley K' is invalid".to_string()];

        drafter
            .draft(temp.path(), "request", &plan(), &scratchpad)
            .expect("draft");

        let prompts = drafter.executor().prompts();
        assert!(prompts[0].contains("1. existing_id 'Shelley K' is invalid"));
    }

    #[test]
    fn create_only_drafter_drops_existing_id() {
        let temp = tempfile::tempdir().expect("tempdir");
        let executor = ScriptedExecutor::new(vec![json!({
            "title": "Assign the login crash",
            "description": "Hand the iOS login crash to Shelley.",
            "category": "Bug",
            "existing_id": "Shelley K"
        })]);
        let drafter = DrafterAgent::new(executor, call_settings()).with_updates(false);

        let draft = drafter
            .draft(temp.path(), "request", &plan(), &[])
            .expect("draft");

        assert_eq!(draft.existing_id, None);
        assert!(drafter.executor().prompts()[0].contains("`existing_id`: always null"));
    }

    #[test]
    fn unknown_category_violates_schema() {
        let temp = tempfile::tempdir().expect("tempdir");
        let executor = ScriptedExecutor::new(vec![json!({
            "title": "t",
            "description": "d",
            "category": "Chore",
            "existing_id": null
        })]);
        let drafter = DrafterAgent::new(executor, call_settings());

        let err = drafter
            .draft(temp.path(), "request", &plan(), &[])
            .expect_err("schema");
        assert!(matches!(err, AgentError::Schema(_)));
    }
}
