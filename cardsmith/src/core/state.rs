//! Workflow state and its phase transitions.
//!
//! Every mutation of [`WorkflowState`] goes through one of the transition
//! methods below. Each method checks the current phase and refuses events that
//! are not legal there, so the orchestrator cannot skip a phase or commit
//! twice by accident.
//!
//! ```text
//! planning -> executing -> evaluating -> committing -> done
//!     |          ^   |          |             |
//!     v          +---+----------+             v
//!   failed   <- budget exhausted ---------> failed
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::types::{Draft, Evaluation, Plan};

/// Terminal result text when the evaluator keeps rejecting drafts.
pub const HUMAN_HANDOFF: &str = "human handoff required";

/// Default retry budget: up to four drafting attempts per run.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Planning,
    Executing,
    Evaluating,
    Committing,
    Done,
    Failed,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Planning => "planning",
            Phase::Executing => "executing",
            Phase::Evaluating => "evaluating",
            Phase::Committing => "committing",
            Phase::Done => "done",
            Phase::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Done | Phase::Failed)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a run reached its terminal phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// The tracker accepted the card.
    Committed,
    /// The tracker (or the transport to it) refused the commit.
    CommitFailed,
    /// The evaluator rejected every attempt within the budget.
    HumanHandoff,
    /// The drafter failed on its last permitted attempt.
    DraftingFailed,
    /// The planner failed; planning is not retried.
    PlanningFailed,
}

/// An event was applied in a phase that does not accept it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot apply '{event}' while {phase}")]
pub struct TransitionError {
    pub phase: Phase,
    pub event: &'static str,
}

/// Progress of one run. Owned by a single orchestrator call and never shared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowState {
    pub query: String,
    pub phase: Phase,
    /// Critiques from rejected drafts, in rejection order.
    pub scratchpad: Vec<String>,
    pub plan: Option<Plan>,
    pub draft: Option<Draft>,
    pub last_evaluation: Option<Evaluation>,
    pub retry_count: u32,
    pub max_retries: u32,
    pub final_result: Option<String>,
    pub outcome: Option<Outcome>,
}

impl WorkflowState {
    pub fn new(query: impl Into<String>, max_retries: u32) -> Self {
        Self {
            query: query.into(),
            phase: Phase::Planning,
            scratchpad: Vec::new(),
            plan: None,
            draft: None,
            last_evaluation: None,
            retry_count: 0,
            max_retries,
            final_result: None,
            outcome: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.phase.is_terminal()
    }

    /// 1-indexed number of the drafting attempt currently in flight.
    pub fn attempt(&self) -> u32 {
        self.retry_count + 1
    }

    fn expect_phase(&self, phase: Phase, event: &'static str) -> Result<(), TransitionError> {
        if self.phase != phase {
            return Err(TransitionError {
                phase: self.phase,
                event,
            });
        }
        Ok(())
    }

    fn finish(&mut self, phase: Phase, outcome: Outcome, final_result: String) {
        self.phase = phase;
        self.outcome = Some(outcome);
        self.final_result = Some(final_result);
    }

    /// Consume one retry; true when the budget is now exhausted.
    fn consume_retry(&mut self) -> bool {
        self.retry_count += 1;
        self.retry_count > self.max_retries
    }

    pub fn plan_ready(&mut self, plan: Plan) -> Result<(), TransitionError> {
        self.expect_phase(Phase::Planning, "plan ready")?;
        self.plan = Some(plan);
        self.phase = Phase::Executing;
        Ok(())
    }

    pub fn plan_failed(&mut self, error: &str) -> Result<(), TransitionError> {
        self.expect_phase(Phase::Planning, "plan failed")?;
        self.finish(
            Phase::Failed,
            Outcome::PlanningFailed,
            format!("planning failed: {error}"),
        );
        Ok(())
    }

    pub fn draft_ready(&mut self, draft: Draft) -> Result<(), TransitionError> {
        self.expect_phase(Phase::Executing, "draft ready")?;
        self.draft = Some(draft);
        self.phase = Phase::Evaluating;
        Ok(())
    }

    /// Record a drafting failure. Stays in `executing` while budget remains.
    pub fn draft_failed(&mut self, error: &str) -> Result<(), TransitionError> {
        self.expect_phase(Phase::Executing, "draft failed")?;
        if self.consume_retry() {
            let attempts = self.retry_count;
            self.finish(
                Phase::Failed,
                Outcome::DraftingFailed,
                format!("drafting failed after {attempts} attempts: {error}"),
            );
        }
        Ok(())
    }

    pub fn evaluated(&mut self, evaluation: Evaluation) -> Result<(), TransitionError> {
        self.expect_phase(Phase::Evaluating, "evaluated")?;
        if evaluation.is_approved() {
            self.phase = Phase::Committing;
        } else {
            if let Some(feedback) = evaluation.feedback() {
                self.scratchpad.push(feedback.to_string());
            }
            if self.consume_retry() {
                self.finish(Phase::Failed, Outcome::HumanHandoff, HUMAN_HANDOFF.to_string());
            } else {
                self.phase = Phase::Executing;
            }
        }
        self.last_evaluation = Some(evaluation);
        Ok(())
    }

    pub fn committed(&mut self, message: String) -> Result<(), TransitionError> {
        self.expect_phase(Phase::Committing, "committed")?;
        self.finish(Phase::Done, Outcome::Committed, message);
        Ok(())
    }

    pub fn commit_failed(&mut self, message: String) -> Result<(), TransitionError> {
        self.expect_phase(Phase::Committing, "commit failed")?;
        self.finish(Phase::Failed, Outcome::CommitFailed, message);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Category;

    fn plan() -> Plan {
        Plan {
            steps: vec!["triage".to_string()],
            reasoning: "simple".to_string(),
        }
    }

    fn draft() -> Draft {
        Draft {
            title: "title".to_string(),
            description: "description".to_string(),
            category: Category::Feature,
            existing_id: None,
        }
    }

    fn evaluating(max_retries: u32) -> WorkflowState {
        let mut state = WorkflowState::new("request", max_retries);
        state.plan_ready(plan()).expect("plan");
        state.draft_ready(draft()).expect("draft");
        state
    }

    #[test]
    fn happy_path_reaches_done() {
        let mut state = evaluating(3);
        state.evaluated(Evaluation::approve()).expect("evaluate");
        assert_eq!(state.phase, Phase::Committing);
        state
            .committed("SUCCESS: Created card https://trello.com/c/x".to_string())
            .expect("commit");
        assert_eq!(state.phase, Phase::Done);
        assert_eq!(state.outcome, Some(Outcome::Committed));
        assert_eq!(state.retry_count, 0);
    }

    #[test]
    fn rejection_records_critique_and_loops_back() {
        let mut state = evaluating(3);
        state
            .evaluated(Evaluation::reject("needs detail"))
            .expect("evaluate");
        assert_eq!(state.phase, Phase::Executing);
        assert_eq!(state.retry_count, 1);
        assert_eq!(state.scratchpad, vec!["needs detail".to_string()]);
        assert_eq!(state.attempt(), 2);
    }

    #[test]
    fn rejection_without_critique_consumes_retry_but_not_scratchpad() {
        let mut state = evaluating(3);
        state
            .evaluated(Evaluation {
                decision: crate::core::types::Decision::Reject,
                critique: None,
            })
            .expect("evaluate");
        assert_eq!(state.retry_count, 1);
        assert!(state.scratchpad.is_empty());
    }

    #[test]
    fn exhausted_rejections_hand_off_to_human() {
        let mut state = evaluating(1);
        state.evaluated(Evaluation::reject("one")).expect("first");
        state.draft_ready(draft()).expect("redraft");
        state.evaluated(Evaluation::reject("two")).expect("second");
        assert_eq!(state.phase, Phase::Failed);
        assert_eq!(state.outcome, Some(Outcome::HumanHandoff));
        assert_eq!(state.final_result.as_deref(), Some(HUMAN_HANDOFF));
        assert_eq!(state.scratchpad.len(), 2);
    }

    #[test]
    fn drafting_failures_share_the_budget() {
        let mut state = WorkflowState::new("request", 1);
        state.plan_ready(plan()).expect("plan");
        state.draft_failed("bad json").expect("first");
        assert_eq!(state.phase, Phase::Executing);
        state.draft_failed("bad json again").expect("second");
        assert_eq!(state.phase, Phase::Failed);
        assert_eq!(state.outcome, Some(Outcome::DraftingFailed));
        assert!(
            state
                .final_result
                .as_deref()
                .expect("final result")
                .contains("bad json again")
        );
    }

    #[test]
    fn planning_failure_is_terminal() {
        let mut state = WorkflowState::new("request", 3);
        state.plan_failed("model unavailable").expect("plan failed");
        assert_eq!(state.phase, Phase::Failed);
        assert_eq!(state.outcome, Some(Outcome::PlanningFailed));
        assert_eq!(state.retry_count, 0);
    }

    #[test]
    fn commit_failure_is_distinguished_from_success() {
        let mut state = evaluating(3);
        state.evaluated(Evaluation::approve()).expect("evaluate");
        state
            .commit_failed("API ERROR: invalid id".to_string())
            .expect("commit failed");
        assert_eq!(state.phase, Phase::Failed);
        assert_eq!(state.outcome, Some(Outcome::CommitFailed));
    }

    #[test]
    fn events_out_of_phase_are_refused() {
        let mut state = WorkflowState::new("request", 3);
        let err = state
            .committed("nope".to_string())
            .expect_err("cannot commit while planning");
        assert_eq!(err.phase, Phase::Planning);
        assert_eq!(err.to_string(), "cannot apply 'committed' while planning");

        let mut state = evaluating(3);
        state.evaluated(Evaluation::approve()).expect("evaluate");
        state.committed("ok".to_string()).expect("commit");
        assert!(state.committed("again".to_string()).is_err());
        assert!(state.draft_ready(draft()).is_err());
    }
}
