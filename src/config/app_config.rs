use serde::Deserialize;

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub logging: LoggingConfig,
    pub eval: EvalConfig,
    pub openai: OpenAiConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Defaults and escape hatches for evaluation runs
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EvalConfig {
    pub max_concurrency: usize,
    /// Replaces the per-run delay when set
    pub delay_ms: Option<u64>,
    /// Render JSON-looking prompts as plain text templates
    pub disable_json_autoescape: bool,
    pub python_executable: String,
    pub webhook_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OpenAiConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub embedding_model: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            max_concurrency: crate::domain::eval::DEFAULT_MAX_CONCURRENCY,
            delay_ms: None,
            disable_json_autoescape: false,
            python_executable: crate::infrastructure::script::DEFAULT_PYTHON_EXECUTABLE
                .to_string(),
            webhook_timeout_secs: 30,
        }
    }
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: crate::infrastructure::llm::DEFAULT_OPENAI_BASE_URL.to_string(),
            api_key: None,
            embedding_model: crate::infrastructure::llm::DEFAULT_EMBEDDING_MODEL.to_string(),
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();

        assert_eq!(config.logging.level, "info");
        assert_eq!(config.eval.max_concurrency, 4);
        assert_eq!(config.eval.delay_ms, None);
        assert_eq!(config.eval.python_executable, "python3");
        assert_eq!(config.openai.base_url, "https://api.openai.com");
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[eval]\ndelay_ms = 250\ndisable_json_autoescape = true\n\n[logging]\nformat = \"json\""
        )
        .unwrap();

        let config: AppConfig = config::Config::builder()
            .add_source(config::File::from(file.path()))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.eval.delay_ms, Some(250));
        assert!(config.eval.disable_json_autoescape);
        assert_eq!(config.eval.max_concurrency, 4);
        assert!(matches!(config.logging.format, LogFormat::Json));
        assert_eq!(config.logging.level, "info");
    }
}
