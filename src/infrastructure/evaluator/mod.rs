//! Evaluation pipeline: matrix construction, bounded execution, aggregation

mod aggregator;
mod conversation;
mod executor;
mod matrix;
mod vars;

pub use aggregator::RunAggregator;
pub use conversation::ConversationStore;
pub use executor::Evaluator;
pub use matrix::{build_columns, build_matrix, build_tests, Column, EvalMatrix, Row};
pub use vars::expand_vars;

use crate::domain::{DomainError, EvaluateOptions, EvaluateSummary, TestSuite};

/// Evaluate `suite` with default rendering and grading
pub async fn evaluate(
    suite: &TestSuite,
    options: EvaluateOptions,
) -> Result<EvaluateSummary, DomainError> {
    Evaluator::default().evaluate(suite, options).await
}
