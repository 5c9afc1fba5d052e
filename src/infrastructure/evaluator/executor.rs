//! Bounded executor: runs every work item and folds the results

use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};

use futures::{stream, FutureExt, StreamExt};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::aggregator::RunAggregator;
use super::conversation::ConversationStore;
use super::matrix::build_matrix;
use crate::domain::{
    last_input, value_to_text, CallContext, ConversationTurn, DomainError, EvaluateOptions,
    EvaluateResult, EvaluateSummary, TestSuite, TokenUsage, Vars, WorkItem, CONVERSATION_VAR,
};
use crate::infrastructure::grading::GradingEngine;
use crate::infrastructure::script::JavascriptRuntime;
use crate::infrastructure::template::PromptRenderer;

/// Runs a test suite against its providers with bounded concurrency
#[derive(Debug, Clone, Default)]
pub struct Evaluator {
    renderer: PromptRenderer,
    grading: GradingEngine,
    javascript: JavascriptRuntime,
    delay_override_ms: Option<u64>,
}

impl Evaluator {
    pub fn new(renderer: PromptRenderer, grading: GradingEngine) -> Self {
        Self {
            renderer,
            grading,
            javascript: JavascriptRuntime::new(),
            delay_override_ms: None,
        }
    }

    /// Delay that replaces the per-run option, usually from configuration
    pub fn with_delay_override(mut self, delay_ms: Option<u64>) -> Self {
        self.delay_override_ms = delay_ms;
        self
    }

    /// Evaluate every (test, vars, prompt, provider) combination of `suite`.
    ///
    /// Only a fatal error (a malformed prompt-function return) aborts the run;
    /// every other failure is recorded in its table cell.
    pub async fn evaluate(
        &self,
        suite: &TestSuite,
        options: EvaluateOptions,
    ) -> Result<EvaluateSummary, DomainError> {
        if options.generate_suggestions {
            warn!("Prompt suggestion generation is not supported, ignoring generate_suggestions");
        }

        let delay_ms = self.delay_override_ms.unwrap_or(options.delay_ms);
        let matrix = build_matrix(suite, options.repeat, Duration::from_millis(delay_ms));

        let mut concurrency = options.max_concurrency.max(1);
        let uses_conversation = suite
            .prompts
            .iter()
            .any(|prompt| prompt.references(CONVERSATION_VAR));
        if uses_conversation && concurrency > 1 {
            warn!(
                requested = concurrency,
                "Prompts reference {}, running with concurrency 1", CONVERSATION_VAR
            );
            concurrency = 1;
        }

        info!(
            items = matrix.items.len(),
            rows = matrix.rows.len(),
            columns = matrix.columns.len(),
            concurrency,
            delay_ms,
            "Starting evaluation"
        );

        let store = ConversationStore::new();
        let mut aggregator =
            RunAggregator::new(matrix.columns.len(), matrix.items.len(), &options);

        let mut results = stream::iter(matrix.items.iter().cloned())
            .map(|item| self.run_item_guarded(item, &store))
            .buffer_unordered(concurrency);

        while let Some(outcome) = results.next().await {
            aggregator.record(outcome?)?;
        }
        drop(results);

        let summary = aggregator.finish(&matrix)?;

        info!(
            successes = summary.stats.successes,
            failures = summary.stats.failures,
            tokens = summary.stats.token_usage.total,
            "Evaluation finished"
        );

        Ok(summary)
    }

    /// Run one item, turning a panic into a failed result
    async fn run_item_guarded(
        &self,
        item: WorkItem,
        store: &ConversationStore,
    ) -> Result<EvaluateResult, DomainError> {
        let placeholder = EvaluateResult::for_item(&item);

        match AssertUnwindSafe(self.run_item(item, store))
            .catch_unwind()
            .await
        {
            Ok(outcome) => outcome,
            Err(panic) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                warn!(
                    row = placeholder.row_index,
                    col = placeholder.col_index,
                    "Work item panicked: {}",
                    message
                );

                let mut result = placeholder;
                result.fail_with(format!("Work item panicked: {}", message));
                Ok(result)
            }
        }
    }

    async fn run_item(
        &self,
        item: WorkItem,
        store: &ConversationStore,
    ) -> Result<EvaluateResult, DomainError> {
        let mut result = EvaluateResult::for_item(&item);

        if let Err(e) = self.execute(&item, store, &mut result).await {
            if e.is_fatal() {
                return Err(e);
            }
            result.fail_with(e.to_string());
        }

        debug!(
            provider = %result.provider_id,
            prompt = %result.prompt_label,
            row = result.row_index,
            col = result.col_index,
            success = result.success,
            latency_ms = result.latency_ms,
            "Work item finished"
        );

        Ok(result)
    }

    async fn execute(
        &self,
        item: &WorkItem,
        store: &ConversationStore,
        result: &mut EvaluateResult,
    ) -> Result<(), DomainError> {
        let key = item.conversation_key();

        let mut vars = item.test.vars.clone();
        if item.prompt.references(CONVERSATION_VAR) {
            let history = serde_json::to_value(store.history(&key)?)
                .map_err(|e| DomainError::internal(e.to_string()))?;
            vars.insert(CONVERSATION_VAR.to_string(), history);
        }

        let rendered = self.renderer.render(&item.prompt, &vars, &item.test.options)?;
        result.rendered_prompt = rendered.clone();

        let started = Instant::now();
        let response = item
            .provider
            .call_api(&rendered, &CallContext::new(vars.clone()))
            .await;
        result.latency_ms = started.elapsed().as_millis() as u64;
        let response = response?;

        let usage = response.token_usage.unwrap_or_default();
        result.token_usage = if response.cached {
            TokenUsage::cached(usage.total)
        } else {
            usage
        };

        let raw_output = response.output_text();
        store.append(
            key,
            ConversationTurn {
                prompt: rendered.clone(),
                input: last_input(&rendered),
                output: raw_output.clone().unwrap_or_default(),
            },
        )?;

        if !response.cached && !item.delay.is_zero() {
            debug!(delay_ms = item.delay.as_millis() as u64, "Sleeping before next call");
            tokio::time::sleep(item.delay).await;
        }

        if let Some(error) = response.error {
            result.output = raw_output;
            result.fail_with(error);
            return Ok(());
        }

        let Some(mut output) = response.output else {
            result.fail_with("No output");
            return Ok(());
        };

        if let Some(code) = &item.test.options.postprocess {
            output = self.postprocess(code, &output, &vars, &rendered).await?;
        }

        result.output = Some(value_to_text(&output));

        let grading = self
            .grading
            .grade_test_case(&item.test, &output, &rendered, &item.provider)
            .await?;

        result.success = grading.pass;
        result.score = grading.score;
        result.named_scores = grading.named_scores.clone();
        if !grading.pass {
            result.error = Some(grading.reason.clone());
        }
        result.grading_result = Some(grading);

        Ok(())
    }

    async fn postprocess(
        &self,
        code: &str,
        output: &Value,
        vars: &Vars,
        prompt: &str,
    ) -> Result<Value, DomainError> {
        let context = json!({ "vars": vars, "prompt": prompt });

        self.javascript
            .run(code, output, &context)
            .await?
            .ok_or_else(|| DomainError::postprocess("Postprocess function did not return a value"))
    }
}
