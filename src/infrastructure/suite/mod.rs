//! Test-suite files (YAML, JSON, TOML)

mod config;
mod loader;

pub use config::{PromptSpec, SuiteConfig, SuiteFormat};
pub use loader::{LoadedSuite, SuiteLoader};
