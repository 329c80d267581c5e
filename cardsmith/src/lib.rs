//! Request-to-card agent loop for Trello.
//!
//! A free-text request is planned, drafted into a card, checked against
//! deterministic rules and, once approved, written to a board. Rejected drafts
//! are retried with the evaluator's critique fed back to the drafter, within a
//! bounded budget. The crate keeps a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (domain types, the evaluator and
//!   the workflow state machine). No I/O.
//! - **[`io`]**: Side-effecting collaborators (model backends, the Trello API,
//!   config, run artifacts).
//! - **[`agents`]**: The planner and drafter, built on an [`io::executor::Executor`].
//!
//! [`workflow`] drives them all for one request.

pub mod agents;
pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod workflow;
