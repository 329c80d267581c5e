//! Deterministic, pure logic at the heart of the workflow.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! values and return deterministic outputs suitable for tests.

pub mod evaluator;
pub mod state;
pub mod types;
