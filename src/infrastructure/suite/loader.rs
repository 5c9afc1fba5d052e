//! Resolves a suite file into a runnable `TestSuite`

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info};

use super::config::{PromptSpec, SuiteConfig, SuiteFormat};
use crate::domain::{ApiProvider, DomainError, Prompt, TestSuite};
use crate::infrastructure::llm::{ProviderFactory, ProviderSpec};
use crate::infrastructure::script::FILE_PREFIX;

/// A resolved suite plus the grading providers its tests refer to
#[derive(Debug, Clone)]
pub struct LoadedSuite {
    pub suite: TestSuite,
    pub grading_providers: Vec<Arc<dyn ApiProvider>>,
}

/// Loads suite files and builds their providers
#[derive(Debug, Clone, Default)]
pub struct SuiteLoader {
    factory: ProviderFactory,
}

impl SuiteLoader {
    pub fn new(factory: ProviderFactory) -> Self {
        Self { factory }
    }

    /// Read and resolve the suite at `path`.
    ///
    /// Relative `file://` prompt paths are resolved against the suite
    /// file's directory.
    pub async fn load(&self, path: &Path) -> Result<LoadedSuite, DomainError> {
        let format = SuiteFormat::from_path(path)?;
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            DomainError::configuration(format!("Failed to read '{}': {}", path.display(), e))
        })?;

        let config = SuiteConfig::parse(&content, format)?;
        let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();

        let loaded = self.resolve(config, &base_dir).await?;

        info!(
            path = %path.display(),
            prompts = loaded.suite.prompts.len(),
            providers = loaded.suite.providers.len(),
            tests = loaded.suite.tests.len(),
            scenarios = loaded.suite.scenarios.len(),
            "Loaded test suite"
        );

        Ok(loaded)
    }

    pub async fn resolve(
        &self,
        config: SuiteConfig,
        base_dir: &Path,
    ) -> Result<LoadedSuite, DomainError> {
        if config.prompts.is_empty() {
            return Err(DomainError::validation("Suite declares no prompts"));
        }
        if config.providers.is_empty() {
            return Err(DomainError::validation("Suite declares no providers"));
        }

        let mut prompts = Vec::with_capacity(config.prompts.len());
        for spec in &config.prompts {
            prompts.push(load_prompt(spec, base_dir).await?);
        }

        let providers = config
            .providers
            .iter()
            .map(|spec| self.factory.create(spec))
            .collect::<Result<Vec<_>, _>>()?;

        let grading_providers = config
            .grader_ids()
            .into_iter()
            .map(|id| {
                match providers.iter().find(|provider| provider.id() == id) {
                    Some(provider) => Ok(Arc::clone(provider)),
                    None => self.factory.create(&ProviderSpec::Id(id)),
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut suite = TestSuite::new(prompts, providers)
            .with_tests(config.tests)
            .with_scenarios(config.scenarios);
        if let Some(description) = config.description {
            suite = suite.with_description(description);
        }
        if let Some(default_test) = config.default_test {
            suite = suite.with_default_test(default_test);
        }
        if let Some(map) = config.provider_prompt_map {
            suite = suite.with_provider_prompt_map(map);
        }

        Ok(LoadedSuite {
            suite,
            grading_providers,
        })
    }
}

async fn load_prompt(spec: &PromptSpec, base_dir: &Path) -> Result<Prompt, DomainError> {
    let (raw, label) = match spec {
        PromptSpec::Text(text) => (Value::String(text.clone()), None),
        PromptSpec::Detailed { raw, label } => (raw.clone(), label.clone()),
    };

    let prompt = match raw.as_str().and_then(|text| text.strip_prefix(FILE_PREFIX)) {
        Some(relative) => {
            let path = resolve_path(base_dir, relative);
            debug!(path = %path.display(), "Reading prompt file");

            let content = tokio::fs::read_to_string(&path).await.map_err(|e| {
                DomainError::configuration(format!(
                    "Failed to read prompt file '{}': {}",
                    path.display(),
                    e
                ))
            })?;

            Prompt::new(content).with_label(relative)
        }
        None => Prompt::from_value(&raw),
    };

    Ok(match label {
        Some(label) => prompt.with_label(label),
        None => prompt,
    })
}

fn resolve_path(base_dir: &Path, relative: &str) -> PathBuf {
    let path = Path::new(relative);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}
