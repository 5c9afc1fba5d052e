//! Application configuration

mod app_config;

pub use app_config::{AppConfig, EvalConfig, LogFormat, LoggingConfig, OpenAiConfig};
