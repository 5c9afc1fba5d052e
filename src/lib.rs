//! PMP Eval
//!
//! Runs every prompt of a test suite against every provider, for every test
//! case and variable combination, and grades the outputs with assertions:
//! - Jinja-style prompt templates, including structured chat prompts
//! - Bounded-concurrency execution with per-cell failure capture
//! - Deterministic, text, JSON, script, webhook and model-graded assertions
//! - A results table with per-prompt metrics and token usage

pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;
pub use domain::{EvaluateOptions, EvaluateSummary, TestSuite};
pub use infrastructure::evaluator::{evaluate, Evaluator};
