//! Per-item results, run statistics and the final summary

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{EvaluateTable, WorkItem};
use crate::domain::{GradingResult, PromptId, TokenUsage, Vars};

/// Version tag written into every summary
pub const SUMMARY_VERSION: u32 = 2;

/// Outcome of one work item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateResult {
    pub provider_id: String,
    pub prompt_id: PromptId,
    pub prompt_label: String,
    pub rendered_prompt: String,
    pub vars: Vars,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    pub success: bool,
    pub score: f64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub named_scores: BTreeMap<String, f64>,
    pub latency_ms: u64,
    pub token_usage: TokenUsage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grading_result: Option<GradingResult>,
    pub row_index: usize,
    pub col_index: usize,
    pub repeat_index: usize,
}

impl EvaluateResult {
    /// An unfinished, failing result positioned at `item`'s table cell
    pub fn for_item(item: &WorkItem) -> Self {
        Self {
            provider_id: item.provider.id().to_string(),
            prompt_id: item.prompt.id().clone(),
            prompt_label: item.prompt.label().to_string(),
            rendered_prompt: String::new(),
            vars: item.test.vars.clone(),
            description: item.test.description.clone(),
            output: None,
            success: false,
            score: 0.0,
            named_scores: BTreeMap::new(),
            latency_ms: 0,
            token_usage: TokenUsage::default(),
            error: None,
            grading_result: None,
            row_index: item.row_index,
            col_index: item.col_index,
            repeat_index: item.repeat_index,
        }
    }

    /// Record a per-item failure
    pub fn fail_with(&mut self, error: impl Into<String>) {
        self.success = false;
        self.score = 0.0;
        self.error = Some(error.into());
    }

    /// Text shown in the table cell: the error (if any) above the output
    pub fn display_text(&self) -> String {
        match (&self.error, &self.output) {
            (Some(error), Some(output)) => format!("{}\n---\n{}", error, output),
            (Some(error), None) => error.clone(),
            (None, Some(output)) => output.clone(),
            (None, None) => String::new(),
        }
    }
}

/// Run-wide counters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateStats {
    pub successes: usize,
    pub failures: usize,
    pub token_usage: TokenUsage,
}

/// Everything `evaluate` returns
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateSummary {
    pub version: u32,
    pub timestamp: DateTime<Utc>,
    pub results: Vec<EvaluateResult>,
    pub stats: EvaluateStats,
    pub table: EvaluateTable,
}
