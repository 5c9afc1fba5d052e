//! On-disk suite file shape

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;

use crate::domain::{DomainError, Scenario, TestCase};
use crate::infrastructure::llm::ProviderSpec;

/// A prompt entry: template text (or a `file://` path), or `{raw, label}`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum PromptSpec {
    Text(String),
    Detailed {
        /// Template text, `file://` path, or a structured chat array
        raw: Value,
        #[serde(default)]
        label: Option<String>,
    },
}

/// A suite file as written by users
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuiteConfig {
    #[serde(default)]
    pub description: Option<String>,
    pub prompts: Vec<PromptSpec>,
    pub providers: Vec<ProviderSpec>,
    #[serde(default, alias = "default_test")]
    pub default_test: Option<TestCase>,
    #[serde(default)]
    pub tests: Vec<TestCase>,
    #[serde(default)]
    pub scenarios: Vec<Scenario>,
    #[serde(default, alias = "provider_prompt_map")]
    pub provider_prompt_map: Option<HashMap<String, Vec<String>>>,
}

/// Serialization format, picked from the file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuiteFormat {
    Yaml,
    Json,
    Toml,
}

impl SuiteFormat {
    pub fn from_path(path: &Path) -> Result<Self, DomainError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);

        match extension.as_deref() {
            Some("yaml") | Some("yml") => Ok(Self::Yaml),
            Some("json") => Ok(Self::Json),
            Some("toml") => Ok(Self::Toml),
            _ => Err(DomainError::configuration(format!(
                "Unsupported suite file '{}'; expected .yaml, .yml, .json or .toml",
                path.display()
            ))),
        }
    }
}

impl SuiteConfig {
    pub fn parse(content: &str, format: SuiteFormat) -> Result<Self, DomainError> {
        let parsed = match format {
            SuiteFormat::Yaml => serde_yaml::from_str(content).map_err(|e| e.to_string()),
            SuiteFormat::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
            SuiteFormat::Toml => toml::from_str(content).map_err(|e| e.to_string()),
        };

        parsed.map_err(|e| DomainError::configuration(format!("Invalid suite file: {}", e)))
    }

    /// Ids of graders named by assertions or test options
    pub fn grader_ids(&self) -> Vec<String> {
        let scenario_tests = self
            .scenarios
            .iter()
            .flat_map(|scenario| scenario.config.iter().chain(&scenario.tests));

        let mut ids: Vec<String> = self
            .default_test
            .iter()
            .chain(&self.tests)
            .chain(scenario_tests)
            .flat_map(|test| {
                test.assertions
                    .iter()
                    .filter_map(|assertion| assertion.provider.clone())
                    .chain(test.options.provider.clone())
            })
            .collect();

        ids.sort();
        ids.dedup();
        ids
    }
}
