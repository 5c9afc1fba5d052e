//! Results table: rows are test instances, columns are prompt x provider pairs

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::EvaluateResult;
use crate::domain::{PromptId, TokenUsage};

/// Running totals for one table column
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptMetrics {
    pub score: f64,
    pub test_pass_count: usize,
    pub test_fail_count: usize,
    pub assert_pass_count: usize,
    pub assert_fail_count: usize,
    pub total_latency_ms: u64,
    pub token_usage: TokenUsage,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub named_scores: BTreeMap<String, f64>,
}

impl PromptMetrics {
    /// Fold one finished result into the totals; never decrements
    pub fn record(&mut self, result: &EvaluateResult) {
        self.score += result.score;
        if result.success {
            self.test_pass_count += 1;
        } else {
            self.test_fail_count += 1;
        }

        self.total_latency_ms += result.latency_ms;
        self.token_usage.add(&result.token_usage);

        if let Some(grading) = &result.grading_result {
            self.assert_pass_count += grading.passed_count();
            self.assert_fail_count += grading.failed_count();
            if let Some(tokens) = &grading.tokens_used {
                self.token_usage.add(tokens);
            }
        }

        for (name, value) in &result.named_scores {
            *self.named_scores.entry(name.clone()).or_insert(0.0) += value;
        }
    }
}

/// A table column: one prompt as run by one provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedPrompt {
    pub id: PromptId,
    pub raw: String,
    /// Display label, prefixed with `[provider]` when several providers run
    pub label: String,
    pub provider: String,
    pub metrics: PromptMetrics,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluateTableHead {
    pub prompts: Vec<CompletedPrompt>,
    /// Sorted variable names
    pub vars: Vec<String>,
}

/// One table cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateTableOutput {
    pub pass: bool,
    pub score: f64,
    pub text: String,
    pub latency_ms: u64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub named_scores: BTreeMap<String, f64>,
}

impl From<&EvaluateResult> for EvaluateTableOutput {
    fn from(result: &EvaluateResult) -> Self {
        Self {
            pass: result.success,
            score: result.score,
            text: result.display_text(),
            latency_ms: result.latency_ms,
            named_scores: result.named_scores.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluateTableRow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Variable values as display strings, in head order
    pub vars: Vec<String>,
    /// Indexed by column
    pub outputs: Vec<EvaluateTableOutput>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluateTable {
    pub head: EvaluateTableHead,
    pub body: Vec<EvaluateTableRow>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{GradingResult, Vars};

    fn graded(success: bool, score: f64, components: Vec<GradingResult>) -> EvaluateResult {
        let mut named_scores = BTreeMap::new();
        named_scores.insert("accuracy".to_string(), score);

        EvaluateResult {
            provider_id: "echo".into(),
            prompt_id: PromptId::from_raw("p"),
            prompt_label: "p".into(),
            rendered_prompt: "p".into(),
            vars: Vars::new(),
            description: None,
            output: Some("out".into()),
            success,
            score,
            named_scores,
            latency_ms: 10,
            token_usage: TokenUsage::new(3, 4),
            error: None,
            grading_result: Some(
                GradingResult::from_bool(success, "graded").with_components(components),
            ),
            row_index: 0,
            col_index: 0,
            repeat_index: 0,
        }
    }

    #[test]
    fn test_metrics_accumulate() {
        let mut metrics = PromptMetrics::default();

        metrics.record(&graded(
            true,
            1.0,
            vec![GradingResult::pass("a"), GradingResult::pass("b")],
        ));
        metrics.record(&graded(
            false,
            0.0,
            vec![GradingResult::pass("a"), GradingResult::fail("b")],
        ));

        assert_eq!(metrics.test_pass_count, 1);
        assert_eq!(metrics.test_fail_count, 1);
        assert_eq!(metrics.assert_pass_count, 3);
        assert_eq!(metrics.assert_fail_count, 1);
        assert_eq!(metrics.score, 1.0);
        assert_eq!(metrics.total_latency_ms, 20);
        assert_eq!(metrics.token_usage.total, 14);
        assert_eq!(metrics.named_scores["accuracy"], 1.0);
    }
}
