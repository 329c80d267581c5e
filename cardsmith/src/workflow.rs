//! The plan -> draft -> evaluate -> commit loop.
//!
//! [`run_workflow`] owns the [`WorkflowState`] for one request and drives the
//! collaborators phase by phase. Collaborator failures never escape as errors:
//! each one becomes a state transition, and every run ends in `done` or
//! `failed` with a `final_result`. The returned `Err` is reserved for the run
//! log itself failing to write.
//!
//! The committer is only reachable through an [`ApprovedDraft`], which only the
//! evaluator can produce, and it is taken out of its slot before the call, so a
//! run commits at most once.

use anyhow::{Result, anyhow};
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::agents::{Drafter, Planner};
use crate::core::evaluator::{ApprovedDraft, Evaluator};
use crate::core::state::{Outcome, Phase, WorkflowState};
use crate::core::types::{Draft, Evaluation, Plan};
use crate::io::commit::{CommitAction, Committer};
use crate::io::run_log::RunLog;

/// Progress notifications, in the order they happen. Also the lines of
/// `events.jsonl`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WorkflowEvent {
    PlanReady {
        plan: Plan,
    },
    PlanFailed {
        error: String,
    },
    DraftReady {
        attempt: u32,
        draft: Draft,
    },
    DraftFailed {
        attempt: u32,
        error: String,
    },
    Evaluated {
        attempt: u32,
        evaluation: Evaluation,
    },
    Committed {
        action: CommitAction,
        card_id: Option<String>,
        short_url: Option<String>,
        message: String,
    },
    CommitFailed {
        error: String,
    },
    Finished {
        phase: Phase,
        outcome: Option<Outcome>,
        final_result: Option<String>,
    },
}

/// Everything the loop calls out to.
pub struct Collaborators<'a, P: ?Sized, D: ?Sized, C: ?Sized> {
    pub planner: &'a P,
    pub drafter: &'a D,
    pub evaluator: &'a Evaluator,
    pub committer: &'a C,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkflowConfig {
    /// Shared budget for drafting failures and rejections.
    pub max_retries: u32,
}

/// Terminal result of one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowRun {
    pub run_id: String,
    pub state: WorkflowState,
}

impl WorkflowRun {
    pub fn final_result(&self) -> &str {
        self.state.final_result.as_deref().unwrap_or_default()
    }

    pub fn outcome(&self) -> Option<Outcome> {
        self.state.outcome
    }
}

/// Drive one request to a terminal phase.
///
/// `on_event` sees every [`WorkflowEvent`] right after it is appended to the
/// run log.
#[instrument(skip_all, fields(run_id = run_log.run_id(), max_retries = config.max_retries))]
pub fn run_workflow<P, D, C, F>(
    request: &str,
    collaborators: &Collaborators<'_, P, D, C>,
    config: &WorkflowConfig,
    run_log: &RunLog,
    mut on_event: F,
) -> Result<WorkflowRun>
where
    P: Planner + ?Sized,
    D: Drafter + ?Sized,
    C: Committer + ?Sized,
    F: FnMut(&WorkflowEvent),
{
    let mut emit = |event: WorkflowEvent| -> Result<()> {
        run_log.record_event(&event)?;
        on_event(&event);
        Ok(())
    };

    let mut state = WorkflowState::new(request, config.max_retries);
    let mut approved: Option<ApprovedDraft> = None;

    while !state.is_terminal() {
        match state.phase {
            Phase::Planning => {
                let dir = run_log.call_dir("plan")?;
                match collaborators.planner.plan(&dir, &state.query) {
                    Ok(plan) => {
                        info!(steps = plan.steps.len(), "plan ready");
                        state.plan_ready(plan.clone())?;
                        emit(WorkflowEvent::PlanReady { plan })?;
                    }
                    Err(err) => {
                        let error = err.to_string();
                        warn!(%error, "planning failed");
                        state.plan_failed(&error)?;
                        emit(WorkflowEvent::PlanFailed { error })?;
                    }
                }
            }
            Phase::Executing => {
                let attempt = state.attempt();
                let dir = run_log.call_dir(&format!("draft-{attempt}"))?;
                let plan = state
                    .plan
                    .as_ref()
                    .ok_or_else(|| anyhow!("executing without a plan"))?;
                let result =
                    collaborators
                        .drafter
                        .draft(&dir, &state.query, plan, &state.scratchpad);
                match result {
                    Ok(draft) => {
                        state.draft_ready(draft.clone())?;
                        emit(WorkflowEvent::DraftReady { attempt, draft })?;
                    }
                    Err(err) => {
                        let error = err.to_string();
                        warn!(attempt, %error, "drafting failed");
                        state.draft_failed(&error)?;
                        emit(WorkflowEvent::DraftFailed { attempt, error })?;
                    }
                }
            }
            Phase::Evaluating => {
                let attempt = state.attempt();
                let evaluation = match state.draft.as_ref() {
                    Some(draft) => match collaborators.evaluator.approve(draft) {
                        Ok(draft) => {
                            approved = Some(draft);
                            Evaluation::approve()
                        }
                        Err(rejection) => rejection,
                    },
                    None => collaborators.evaluator.evaluate(None),
                };
                info!(attempt, approved = evaluation.is_approved(), "draft evaluated");
                state.evaluated(evaluation.clone())?;
                emit(WorkflowEvent::Evaluated {
                    attempt,
                    evaluation,
                })?;
            }
            Phase::Committing => {
                let draft = approved
                    .take()
                    .ok_or_else(|| anyhow!("committing without an approved draft"))?;
                match collaborators.committer.commit(&draft) {
                    Ok(receipt) => {
                        info!(action = %receipt.action, "committed");
                        state.committed(receipt.message.clone())?;
                        emit(WorkflowEvent::Committed {
                            action: receipt.action,
                            card_id: receipt.card_id,
                            short_url: receipt.short_url,
                            message: receipt.message,
                        })?;
                    }
                    Err(err) => {
                        let error = err.to_string();
                        warn!(%error, "commit failed");
                        state.commit_failed(error.clone())?;
                        emit(WorkflowEvent::CommitFailed { error })?;
                    }
                }
            }
            Phase::Done | Phase::Failed => break,
        }
    }

    emit(WorkflowEvent::Finished {
        phase: state.phase,
        outcome: state.outcome,
        final_result: state.final_result.clone(),
    })?;
    run_log.write_state(&state)?;
    info!(phase = %state.phase, outcome = ?state.outcome, "run finished");

    Ok(WorkflowRun {
        run_id: run_log.run_id().to_string(),
        state,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::state::HUMAN_HANDOFF;
    use crate::io::run_log::{EVENTS_FILE, STATE_FILE};
    use crate::test_support::{
        RecordingCommitter, ScriptedDrafter, ScriptedPlanner, bug_draft, plan, temp_run_log,
    };
    use std::fs;

    fn run(
        planner: &ScriptedPlanner,
        drafter: &ScriptedDrafter,
        committer: &RecordingCommitter,
        max_retries: u32,
        log: &RunLog,
    ) -> (WorkflowRun, Vec<WorkflowEvent>) {
        let evaluator = Evaluator::default();
        let mut events = Vec::new();
        let run = run_workflow(
            "request",
            &Collaborators {
                planner,
                drafter,
                evaluator: &evaluator,
                committer,
            },
            &WorkflowConfig { max_retries },
            log,
            |event| events.push(event.clone()),
        )
        .expect("run");
        (run, events)
    }

    #[test]
    fn events_follow_phase_order() {
        let (_temp, log) = temp_run_log();
        let planner = ScriptedPlanner::returning(plan(&["file it"]));
        let drafter = ScriptedDrafter::new(vec![Ok(bug_draft("Crash"))]);
        let committer = RecordingCommitter::succeeding();

        let (run, events) = run(&planner, &drafter, &committer, 3, &log);

        assert_eq!(run.outcome(), Some(Outcome::Committed));
        let names: Vec<&str> = events
            .iter()
            .map(|event| match event {
                WorkflowEvent::PlanReady { .. } => "plan_ready",
                WorkflowEvent::DraftReady { .. } => "draft_ready",
                WorkflowEvent::Evaluated { .. } => "evaluated",
                WorkflowEvent::Committed { .. } => "committed",
                WorkflowEvent::Finished { .. } => "finished",
                _ => "other",
            })
            .collect();
        assert_eq!(
            names,
            vec!["plan_ready", "draft_ready", "evaluated", "committed", "finished"]
        );
    }

    #[test]
    fn run_log_holds_events_and_terminal_state() {
        let (_temp, log) = temp_run_log();
        let planner = ScriptedPlanner::returning(plan(&["file it"]));
        let drafter = ScriptedDrafter::new(vec![Ok(bug_draft("Crash"))]);
        let committer = RecordingCommitter::succeeding();

        let (_run, events) = run(&planner, &drafter, &committer, 3, &log);

        let lines = fs::read_to_string(log.dir().join(EVENTS_FILE)).expect("events");
        assert_eq!(lines.lines().count(), events.len());
        assert!(lines.lines().next().expect("first").contains("\"event\":\"plan_ready\""));

        let state: WorkflowState =
            serde_json::from_str(&fs::read_to_string(log.dir().join(STATE_FILE)).expect("state"))
                .expect("decode state");
        assert_eq!(state.phase, Phase::Done);
        assert!(log.dir().join("01-plan").is_dir());
        assert!(log.dir().join("02-draft-1").is_dir());
    }

    #[test]
    fn drafter_errors_never_reach_the_committer() {
        let (_temp, log) = temp_run_log();
        let planner = ScriptedPlanner::returning(plan(&["file it"]));
        let drafter = ScriptedDrafter::new(vec![]);
        let committer = RecordingCommitter::succeeding();

        let (run, _events) = run(&planner, &drafter, &committer, 0, &log);

        assert_eq!(run.outcome(), Some(Outcome::DraftingFailed));
        assert!(run.state.scratchpad.is_empty());
        assert!(committer.requests().is_empty());
        assert_ne!(run.final_result(), HUMAN_HANDOFF);
    }
}
