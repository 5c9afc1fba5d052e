//! Test case entity and override merging

use serde::{Deserialize, Serialize};

use super::Assertion;
use crate::domain::Vars;

/// Per-test options
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCaseOptions {
    /// Text prepended to the raw prompt before rendering
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    /// Text appended to the raw prompt before rendering
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suffix: Option<String>,
    /// JavaScript transform applied to the raw provider output
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postprocess: Option<String>,
    /// Grading provider override for model-graded assertions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// Replacement for the default llm-rubric grading prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rubric_prompt: Option<String>,
}

impl TestCaseOptions {
    /// Merge two option sets, values in `overrides` win
    pub fn merge(&self, overrides: &TestCaseOptions) -> TestCaseOptions {
        TestCaseOptions {
            prefix: overrides.prefix.clone().or_else(|| self.prefix.clone()),
            suffix: overrides.suffix.clone().or_else(|| self.suffix.clone()),
            postprocess: overrides
                .postprocess
                .clone()
                .or_else(|| self.postprocess.clone()),
            provider: overrides.provider.clone().or_else(|| self.provider.clone()),
            rubric_prompt: overrides
                .rubric_prompt
                .clone()
                .or_else(|| self.rubric_prompt.clone()),
        }
    }
}

/// An atomic test case: variables, assertions and grading policy
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub vars: Vars,
    #[serde(default, rename = "assert", skip_serializing_if = "Vec::is_empty")]
    pub assertions: Vec<Assertion>,
    /// Aggregate-score threshold; switches grading to the weighted policy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
    #[serde(default)]
    pub options: TestCaseOptions,
}

impl TestCase {
    pub fn new() -> Self {
        Self::default()
    }

    // Builder methods
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_var(mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.vars.insert(name.into(), value.into());
        self
    }

    pub fn with_vars(mut self, vars: Vars) -> Self {
        self.vars = vars;
        self
    }

    pub fn with_assertion(mut self, assertion: Assertion) -> Self {
        self.assertions.push(assertion);
        self
    }

    pub fn with_assertions(mut self, assertions: Vec<Assertion>) -> Self {
        self.assertions = assertions;
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = Some(threshold);
        self
    }

    pub fn with_options(mut self, options: TestCaseOptions) -> Self {
        self.options = options;
        self
    }

    /// Layer a more specific test case on top of this one.
    ///
    /// Variables and options are overridden key by key, the threshold and
    /// description are replaced when set, and assertion lists concatenate.
    pub fn merged_with(&self, specific: &TestCase) -> TestCase {
        let mut vars = self.vars.clone();
        for (name, value) in &specific.vars {
            vars.insert(name.clone(), value.clone());
        }

        let mut assertions = self.assertions.clone();
        assertions.extend(specific.assertions.iter().cloned());

        TestCase {
            description: specific
                .description
                .clone()
                .or_else(|| self.description.clone()),
            vars,
            assertions,
            threshold: specific.threshold.or(self.threshold),
            options: self.options.merge(&specific.options),
        }
    }
}
