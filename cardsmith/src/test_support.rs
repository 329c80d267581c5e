//! Scripted collaborators for exercising the workflow without a model or the
//! Trello API.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;

use anyhow::{Result, anyhow};
use serde_json::Value;

use crate::agents::{AgentError, CallSettings, Drafter, Planner};
use crate::core::evaluator::ApprovedDraft;
use crate::core::types::{Category, Draft, Plan};
use crate::io::commit::{CommitAction, CommitReceipt, CommitRequest, Committer, plan_commit};
use crate::io::executor::{ExecRequest, Executor};
use crate::io::run_log::RunLog;
use crate::io::search::{SearchResult, SearchTool};
use crate::io::trello::CommitError;

pub const TEST_LIST_ID: &str = "list-test";
pub const TEST_SHORT_URL: &str = "https://trello.com/c/Ab12Cd34";

pub fn call_settings() -> CallSettings {
    CallSettings {
        timeout: Duration::from_secs(5),
        output_limit_bytes: 10_000,
    }
}

pub fn plan(steps: &[&str]) -> Plan {
    Plan {
        steps: steps.iter().map(|s| s.to_string()).collect(),
        reasoning: "scripted".to_string(),
    }
}

/// A draft every default rule approves.
pub fn bug_draft(title: &str) -> Draft {
    Draft {
        title: title.to_string(),
        description: format!("{title}: steps to reproduce and expected behaviour."),
        category: Category::Bug,
        existing_id: None,
    }
}

pub fn draft_with_id(title: &str, existing_id: &str) -> Draft {
    Draft {
        existing_id: Some(existing_id.to_string()),
        ..bug_draft(title)
    }
}

/// Run log rooted in a fresh temp dir. Keep the `TempDir` alive for the test.
pub fn temp_run_log() -> (tempfile::TempDir, RunLog) {
    let temp = tempfile::tempdir().expect("tempdir");
    let log = RunLog::create(&temp.path().join("runs"), "run-test").expect("run log");
    (temp, log)
}

pub struct ScriptedPlanner {
    results: RefCell<VecDeque<Result<Plan, String>>>,
    calls: RefCell<u32>,
}

impl ScriptedPlanner {
    pub fn new(results: Vec<Result<Plan, String>>) -> Self {
        Self {
            results: RefCell::new(results.into()),
            calls: RefCell::new(0),
        }
    }

    pub fn returning(plan: Plan) -> Self {
        Self::new(vec![Ok(plan)])
    }

    pub fn failing(message: &str) -> Self {
        Self::new(vec![Err(message.to_string())])
    }

    pub fn calls(&self) -> u32 {
        *self.calls.borrow()
    }
}

impl Planner for ScriptedPlanner {
    fn plan(&self, _workdir: &Path, _request: &str) -> Result<Plan, AgentError> {
        *self.calls.borrow_mut() += 1;
        match self.results.borrow_mut().pop_front() {
            Some(Ok(plan)) => Ok(plan),
            Some(Err(message)) => Err(AgentError::Backend(anyhow!(message))),
            None => Err(AgentError::Backend(anyhow!("no scripted plan left"))),
        }
    }
}

/// Returns queued drafts (or failures) and records what each call saw.
pub struct ScriptedDrafter {
    results: RefCell<VecDeque<Result<Draft, String>>>,
    scratchpads: RefCell<Vec<Vec<String>>>,
    workdirs: RefCell<Vec<PathBuf>>,
}

impl ScriptedDrafter {
    pub fn new(results: Vec<Result<Draft, String>>) -> Self {
        Self {
            results: RefCell::new(results.into()),
            scratchpads: RefCell::new(Vec::new()),
            workdirs: RefCell::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.scratchpads.borrow().len()
    }

    /// Scratchpad passed to each call, in call order.
    pub fn scratchpads(&self) -> Vec<Vec<String>> {
        self.scratchpads.borrow().clone()
    }

    pub fn workdirs(&self) -> Vec<PathBuf> {
        self.workdirs.borrow().clone()
    }
}

impl Drafter for ScriptedDrafter {
    fn draft(
        &self,
        workdir: &Path,
        _request: &str,
        _plan: &Plan,
        scratchpad: &[String],
    ) -> Result<Draft, AgentError> {
        self.scratchpads.borrow_mut().push(scratchpad.to_vec());
        self.workdirs.borrow_mut().push(workdir.to_path_buf());
        match self.results.borrow_mut().pop_front() {
            Some(Ok(draft)) => Ok(draft),
            Some(Err(message)) => Err(AgentError::Backend(anyhow!(message))),
            None => Err(AgentError::Backend(anyhow!("no scripted draft left"))),
        }
    }
}

/// Records every commit request; answers with success or a fixed API error.
pub struct RecordingCommitter {
    api_error: Option<String>,
    requests: RefCell<Vec<CommitRequest>>,
}

impl RecordingCommitter {
    pub fn succeeding() -> Self {
        Self {
            api_error: None,
            requests: RefCell::new(Vec::new()),
        }
    }

    pub fn failing_with(body: &str) -> Self {
        Self {
            api_error: Some(body.to_string()),
            requests: RefCell::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<CommitRequest> {
        self.requests.borrow().clone()
    }
}

impl Committer for RecordingCommitter {
    fn commit(&self, approved: &ApprovedDraft) -> Result<CommitReceipt, CommitError> {
        let request = plan_commit(approved.draft(), TEST_LIST_ID);
        let action = request.action();
        let card_id = match &request {
            CommitRequest::Update { card_id, .. } => card_id.clone(),
            CommitRequest::Create { .. } => "new1234567".to_string(),
        };
        self.requests.borrow_mut().push(request);
        if let Some(body) = &self.api_error {
            return Err(CommitError::Api {
                status: 400,
                body: body.clone(),
            });
        }
        let verb = match action {
            CommitAction::Create => "Created",
            CommitAction::Update => "Updated",
        };
        Ok(CommitReceipt {
            action,
            card_id: Some(card_id),
            short_url: Some(TEST_SHORT_URL.to_string()),
            message: format!("SUCCESS: {verb} card {TEST_SHORT_URL}"),
        })
    }
}

/// Writes queued JSON documents as the model's output, one per call.
pub struct ScriptedExecutor {
    outputs: RefCell<VecDeque<Value>>,
    failure: Option<String>,
    prompts: RefCell<Vec<String>>,
}

impl ScriptedExecutor {
    pub fn new(outputs: Vec<Value>) -> Self {
        Self {
            outputs: RefCell::new(outputs.into()),
            failure: None,
            prompts: RefCell::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            outputs: RefCell::new(VecDeque::new()),
            failure: Some(message.to_string()),
            prompts: RefCell::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.prompts.borrow().len()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.borrow().clone()
    }
}

impl Executor for ScriptedExecutor {
    fn exec(&self, request: &ExecRequest) -> Result<()> {
        self.prompts.borrow_mut().push(request.prompt.clone());
        if let Some(message) = &self.failure {
            return Err(anyhow!(message.clone()));
        }
        let output = self
            .outputs
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| anyhow!("no scripted output left"))?;
        fs::write(&request.output_path, serde_json::to_string_pretty(&output)?)?;
        Ok(())
    }
}

/// Search tool with a fixed answer that records the queries it receives.
pub struct StaticSearch {
    result: SearchResult,
    queries: Rc<RefCell<Vec<String>>>,
}

impl StaticSearch {
    pub fn new(result: SearchResult) -> Self {
        Self {
            result,
            queries: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// Handle to the recorded queries that stays valid after the tool is boxed.
    pub fn queries(&self) -> Rc<RefCell<Vec<String>>> {
        Rc::clone(&self.queries)
    }
}

impl SearchTool for StaticSearch {
    fn search(&self, query: &str) -> SearchResult {
        self.queries.borrow_mut().push(query.to_string());
        self.result.clone()
    }
}
