//! User script execution: embedded JavaScript and external Python

mod javascript;
mod python;

pub use javascript::JavascriptRuntime;
pub use python::{parse_stdout, PythonRunner, DEFAULT_PYTHON_EXECUTABLE};

use std::path::Path;

use crate::domain::DomainError;

pub const FILE_PREFIX: &str = "file://";

/// User code given inline or as a `file://` reference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptSource<'a> {
    Inline(&'a str),
    File(&'a Path),
}

impl<'a> ScriptSource<'a> {
    pub fn parse(value: &'a str) -> Self {
        match value.strip_prefix(FILE_PREFIX) {
            Some(path) => Self::File(Path::new(path)),
            None => Self::Inline(value),
        }
    }
}

async fn read_script(path: &Path) -> Result<String, DomainError> {
    tokio::fs::read_to_string(path).await.map_err(|e| {
        DomainError::configuration(format!("Failed to read '{}': {}", path.display(), e))
    })
}
