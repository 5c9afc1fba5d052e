//! Assertion grading engine and per-kind evaluators

mod custom;
mod engine;
mod function_call;
mod json;
mod metrics;
mod rubric;
mod similarity;
mod text;
mod webhook;

pub use engine::{AssertionContext, GradingEngine, DEFAULT_WEBHOOK_TIMEOUT};
pub use json::{find_json, schema_violations};
pub use metrics::rouge_n_score;
pub use rubric::DEFAULT_RUBRIC_PROMPT;
