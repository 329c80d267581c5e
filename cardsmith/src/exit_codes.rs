//! Stable exit codes for cardsmith CLI commands.

use crate::core::state::Outcome;

/// Command succeeded; for `run`, the card was written (or dry-run reported).
pub const OK: i32 = 0;
/// Invalid config, missing credentials, or any other error outside a run.
pub const INVALID: i32 = 1;
/// Every draft was rejected; a human needs to take over.
pub const HANDOFF: i32 = 2;
/// The tracker refused the approved card.
pub const COMMIT_FAILED: i32 = 3;
/// Planning failed, or drafting failed on its last attempt.
pub const AGENT_FAILED: i32 = 4;

/// Exit code for a finished run.
pub fn for_outcome(outcome: Option<Outcome>) -> i32 {
    match outcome {
        Some(Outcome::Committed) => OK,
        Some(Outcome::HumanHandoff) => HANDOFF,
        Some(Outcome::CommitFailed) => COMMIT_FAILED,
        Some(Outcome::DraftingFailed | Outcome::PlanningFailed) => AGENT_FAILED,
        None => INVALID,
    }
}
