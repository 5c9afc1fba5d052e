//! Single accumulation point for finished work items

use std::collections::BTreeSet;

use chrono::Utc;
use tracing::info;

use super::matrix::EvalMatrix;
use crate::domain::{
    value_to_text, CompletedPrompt, DomainError, EvaluateOptions, EvaluateResult, EvaluateStats,
    EvaluateSummary, EvaluateTable, EvaluateTableHead, EvaluateTableOutput, EvaluateTableRow,
    ProgressCallback, PromptMetrics, SUMMARY_VERSION,
};

/// Folds results into run statistics and per-column metrics.
///
/// Owned by the executor loop, so every update happens in one place.
pub struct RunAggregator {
    total: usize,
    completed: usize,
    stats: EvaluateStats,
    metrics: Vec<PromptMetrics>,
    results: Vec<EvaluateResult>,
    progress_callback: Option<ProgressCallback>,
    log_progress: bool,
}

impl RunAggregator {
    pub fn new(columns: usize, total: usize, options: &EvaluateOptions) -> Self {
        Self {
            total,
            completed: 0,
            stats: EvaluateStats::default(),
            metrics: vec![PromptMetrics::default(); columns],
            results: Vec::with_capacity(total),
            progress_callback: options.progress_callback.clone(),
            log_progress: options.show_progress_bar,
        }
    }

    pub fn completed(&self) -> usize {
        self.completed
    }

    pub fn record(&mut self, result: EvaluateResult) -> Result<(), DomainError> {
        if result.success {
            self.stats.successes += 1;
        } else {
            self.stats.failures += 1;
        }

        self.stats.token_usage.add(&result.token_usage);
        if let Some(tokens) = result
            .grading_result
            .as_ref()
            .and_then(|grading| grading.tokens_used.as_ref())
        {
            self.stats.token_usage.add(tokens);
        }

        let metrics = self.metrics.get_mut(result.col_index).ok_or_else(|| {
            DomainError::internal(format!("Result for unknown column {}", result.col_index))
        })?;
        metrics.record(&result);

        self.results.push(result);
        self.completed += 1;

        if let Some(callback) = &self.progress_callback {
            callback(self.completed, self.total);
        }
        if self.log_progress {
            info!(
                completed = self.completed,
                total = self.total,
                "Evaluation progress"
            );
        }

        Ok(())
    }

    /// Assemble the summary; every table cell must have been written exactly once
    pub fn finish(self, matrix: &EvalMatrix) -> Result<EvaluateSummary, DomainError> {
        let mut results = self.results;
        results.sort_by_key(|r| (r.row_index, r.col_index));

        let var_names: Vec<String> = matrix
            .rows
            .iter()
            .flat_map(|row| row.vars.keys().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let mut cells: Vec<Vec<Option<EvaluateTableOutput>>> =
            vec![vec![None; matrix.columns.len()]; matrix.rows.len()];
        for result in &results {
            let cell = cells
                .get_mut(result.row_index)
                .and_then(|row| row.get_mut(result.col_index))
                .ok_or_else(|| {
                    DomainError::internal(format!(
                        "Result outside the table at row {} column {}",
                        result.row_index, result.col_index
                    ))
                })?;
            if cell.is_some() {
                return Err(DomainError::internal(format!(
                    "Table cell at row {} column {} written twice",
                    result.row_index, result.col_index
                )));
            }
            *cell = Some(EvaluateTableOutput::from(result));
        }

        let body = matrix
            .rows
            .iter()
            .zip(cells)
            .enumerate()
            .map(|(row_index, (row, outputs))| {
                let outputs = outputs
                    .into_iter()
                    .enumerate()
                    .map(|(col_index, cell)| {
                        cell.ok_or_else(|| {
                            DomainError::internal(format!(
                                "Missing result for row {} column {}",
                                row_index, col_index
                            ))
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;

                Ok(EvaluateTableRow {
                    description: row.description.clone(),
                    vars: var_names
                        .iter()
                        .map(|name| row.vars.get(name).map(value_to_text).unwrap_or_default())
                        .collect(),
                    outputs,
                })
            })
            .collect::<Result<Vec<_>, DomainError>>()?;

        let prompts = matrix
            .columns
            .iter()
            .zip(self.metrics)
            .map(|(column, metrics)| CompletedPrompt {
                id: column.prompt.id().clone(),
                raw: column.prompt.raw().to_string(),
                label: column.label.clone(),
                provider: column.provider.id().to_string(),
                metrics,
            })
            .collect();

        Ok(EvaluateSummary {
            version: SUMMARY_VERSION,
            timestamp: Utc::now(),
            results,
            stats: self.stats,
            table: EvaluateTable {
                head: EvaluateTableHead {
                    prompts,
                    vars: var_names,
                },
                body,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        ApiProvider, GradingResult, MockApiProvider, Prompt, TestCase, TestSuite, TokenUsage,
    };
    use crate::infrastructure::evaluator::matrix::build_matrix;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn matrix() -> EvalMatrix {
        let providers: Vec<Arc<dyn ApiProvider>> = vec![Arc::new(MockApiProvider::echo("p"))];
        let suite = TestSuite::new(vec![Prompt::new("a"), Prompt::new("b")], providers).with_tests(
            vec![TestCase::new().with_var("z", "last").with_var("a", json!(["1", "2"]))],
        );
        build_matrix(&suite, 1, Duration::ZERO)
    }

    fn finished(matrix: &EvalMatrix, index: usize, success: bool) -> EvaluateResult {
        let mut result = EvaluateResult::for_item(&matrix.items[index]);
        result.success = success;
        result.score = if success { 1.0 } else { 0.0 };
        result.output = Some(format!("out {}", index));
        result.token_usage = TokenUsage::new(1, 1);
        result.grading_result = Some(
            GradingResult::from_bool(success, "graded").with_tokens(TokenUsage::new(5, 0)),
        );
        if !success {
            result.error = Some("graded".into());
        }
        result
    }

    #[test]
    fn test_table_is_order_independent() {
        let matrix = matrix();
        let mut aggregator = RunAggregator::new(2, 4, &EvaluateOptions::default());

        for index in [3, 0, 2, 1] {
            aggregator.record(finished(&matrix, index, index != 1)).unwrap();
        }

        let summary = aggregator.finish(&matrix).unwrap();

        assert_eq!(summary.version, SUMMARY_VERSION);
        assert_eq!(summary.stats.successes, 3);
        assert_eq!(summary.stats.failures, 1);
        // 4 x (2 provider + 5 grading) tokens
        assert_eq!(summary.stats.token_usage.total, 28);

        assert_eq!(summary.table.head.vars, vec!["a", "z"]);
        assert_eq!(summary.table.body.len(), 2);
        assert_eq!(summary.table.body[0].vars, vec!["1", "last"]);
        assert_eq!(summary.table.body[0].outputs[0].text, "out 0");
        assert_eq!(summary.table.body[0].outputs[1].text, "graded\n---\nout 1");
        assert_eq!(summary.table.body[1].outputs[1].text, "out 3");

        let first_column = &summary.table.head.prompts[0].metrics;
        assert_eq!(first_column.test_pass_count, 2);
        let second_column = &summary.table.head.prompts[1].metrics;
        assert_eq!(second_column.test_fail_count, 1);

        let column_tokens: u64 = summary
            .table
            .head
            .prompts
            .iter()
            .map(|prompt| prompt.metrics.token_usage.total)
            .sum();
        assert_eq!(first_column.token_usage.total, 14);
        assert_eq!(column_tokens, summary.stats.token_usage.total);

        let order: Vec<_> = summary.results.iter().map(|r| (r.row_index, r.col_index)).collect();
        assert_eq!(order, vec![(0, 0), (0, 1), (1, 0), (1, 1)]);
    }

    #[test]
    fn test_missing_cell_is_internal_error() {
        let matrix = matrix();
        let mut aggregator = RunAggregator::new(2, 4, &EvaluateOptions::default());
        aggregator.record(finished(&matrix, 0, true)).unwrap();

        let error = aggregator.finish(&matrix).unwrap_err();
        assert!(error.to_string().contains("Missing result"));
    }

    #[test]
    fn test_progress_callback_sees_every_item() {
        let matrix = matrix();
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let options = EvaluateOptions::default().with_progress_callback(Arc::new(move |done, total| {
            assert_eq!(total, 4);
            assert!(done <= total);
            seen.fetch_add(1, Ordering::SeqCst);
        }));

        let mut aggregator = RunAggregator::new(2, 4, &options);
        for index in 0..4 {
            aggregator.record(finished(&matrix, index, true)).unwrap();
        }

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(aggregator.completed(), 4);
    }
}
