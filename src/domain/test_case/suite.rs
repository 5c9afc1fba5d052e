//! Test suite: prompts, providers, tests and scenarios

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::TestCase;
use crate::domain::{ApiProvider, Prompt};

/// A scenario crosses every config entry with every scenario test
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Per-config data (vars, assertions, options)
    #[serde(default)]
    pub config: Vec<TestCase>,
    #[serde(default)]
    pub tests: Vec<TestCase>,
}

/// Everything needed for one evaluation run
#[derive(Debug, Clone, Default)]
pub struct TestSuite {
    pub description: Option<String>,
    pub prompts: Vec<Prompt>,
    pub providers: Vec<Arc<dyn ApiProvider>>,
    pub default_test: Option<TestCase>,
    pub tests: Vec<TestCase>,
    pub scenarios: Vec<Scenario>,
    /// Provider id -> prompt labels (or ids) that provider may run
    pub provider_prompt_map: Option<HashMap<String, Vec<String>>>,
}

impl TestSuite {
    pub fn new(prompts: Vec<Prompt>, providers: Vec<Arc<dyn ApiProvider>>) -> Self {
        Self {
            prompts,
            providers,
            ..Self::default()
        }
    }

    // Builder methods
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_default_test(mut self, default_test: TestCase) -> Self {
        self.default_test = Some(default_test);
        self
    }

    pub fn with_tests(mut self, tests: Vec<TestCase>) -> Self {
        self.tests = tests;
        self
    }

    pub fn with_scenarios(mut self, scenarios: Vec<Scenario>) -> Self {
        self.scenarios = scenarios;
        self
    }

    pub fn with_provider_prompt_map(mut self, map: HashMap<String, Vec<String>>) -> Self {
        self.provider_prompt_map = Some(map);
        self
    }

    /// Whether a provider is allowed to run a prompt
    pub fn is_prompt_allowed(&self, provider_id: &str, prompt: &Prompt) -> bool {
        let Some(map) = &self.provider_prompt_map else {
            return true;
        };

        match map.get(provider_id) {
            Some(allowed) => allowed
                .iter()
                .any(|entry| entry == prompt.label() || entry == prompt.id().as_str()),
            None => true,
        }
    }
}
