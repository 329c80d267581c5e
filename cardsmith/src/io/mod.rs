//! Side-effecting collaborators: model backends, the Trello API, config and
//! run artifacts.

pub mod commit;
pub mod config;
pub mod executor;
pub mod gemini;
pub mod process;
pub mod prompt;
pub mod run_log;
pub mod search;
pub mod trello;
