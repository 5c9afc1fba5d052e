//! Grading result types

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::Assertion;
use crate::domain::TokenUsage;

/// Outcome of grading an output against one assertion or a whole test case
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradingResult {
    pub pass: bool,
    /// Conventionally in [0, 1], not clamped
    pub score: f64,
    pub reason: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub named_scores: BTreeMap<String, f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens_used: Option<TokenUsage>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub component_results: Vec<GradingResult>,
    /// The assertion this result belongs to, for component results
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assertion: Option<Assertion>,
}

impl GradingResult {
    pub fn pass(reason: impl Into<String>) -> Self {
        Self::new(true, 1.0, reason)
    }

    pub fn fail(reason: impl Into<String>) -> Self {
        Self::new(false, 0.0, reason)
    }

    pub fn new(pass: bool, score: f64, reason: impl Into<String>) -> Self {
        Self {
            pass,
            score,
            reason: reason.into(),
            named_scores: BTreeMap::new(),
            tokens_used: None,
            component_results: Vec::new(),
            assertion: None,
        }
    }

    /// Boolean outcome with a score of 1 or 0
    pub fn from_bool(pass: bool, reason: impl Into<String>) -> Self {
        Self::new(pass, if pass { 1.0 } else { 0.0 }, reason)
    }

    // Builder methods
    pub fn with_score(mut self, score: f64) -> Self {
        self.score = score;
        self
    }

    pub fn with_tokens(mut self, tokens: TokenUsage) -> Self {
        self.tokens_used = Some(tokens);
        self
    }

    pub fn with_assertion(mut self, assertion: Assertion) -> Self {
        self.assertion = Some(assertion);
        self
    }

    pub fn with_components(mut self, components: Vec<GradingResult>) -> Self {
        self.component_results = components;
        self
    }

    /// Count of passing assertions; a result without components counts itself
    pub fn passed_count(&self) -> usize {
        if self.component_results.is_empty() {
            usize::from(self.pass)
        } else {
            self.component_results.iter().filter(|r| r.pass).count()
        }
    }

    /// Count of failing assertions; a result without components counts itself
    pub fn failed_count(&self) -> usize {
        if self.component_results.is_empty() {
            usize::from(!self.pass)
        } else {
            self.component_results.iter().filter(|r| !r.pass).count()
        }
    }
}
