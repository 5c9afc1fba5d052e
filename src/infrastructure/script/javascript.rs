//! Embedded JavaScript runtime (boa) for `javascript` assertions and postprocess

use boa_engine::{Context, Source};
use serde_json::Value;
use tracing::debug;

use super::{read_script, ScriptSource};
use crate::domain::DomainError;

/// Runs user JavaScript with `output` and `context` in scope.
///
/// An inline single-line snippet is an expression unless it starts with
/// `return`; anything longer, and every `file://` script, is a function body
/// that must `return` its result. Every call gets a fresh context on the
/// blocking pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct JavascriptRuntime;

impl JavascriptRuntime {
    pub fn new() -> Self {
        Self
    }

    /// Evaluate inline `code` or a `file://` script; `Ok(None)` when it returns nothing
    pub async fn run(
        &self,
        code: &str,
        output: &Value,
        context: &Value,
    ) -> Result<Option<Value>, DomainError> {
        let body = match ScriptSource::parse(code) {
            ScriptSource::File(path) => read_script(path).await?,
            ScriptSource::Inline(code) => inline_body(code),
        };
        let script = build_script(&body, output, context);

        tokio::task::spawn_blocking(move || evaluate(&script))
            .await
            .map_err(|e| DomainError::internal(format!("JavaScript task failed: {}", e)))?
    }
}

fn inline_body(code: &str) -> String {
    let trimmed = code.trim();
    if trimmed.contains('\n') || starts_with_return(trimmed) {
        trimmed.to_string()
    } else {
        format!("return {}", trimmed)
    }
}

fn starts_with_return(code: &str) -> bool {
    code.strip_prefix("return")
        .is_some_and(|rest| !rest.starts_with(|c: char| c.is_alphanumeric() || c == '_' || c == '$'))
}

fn build_script(body: &str, output: &Value, context: &Value) -> String {
    format!(
        "(function(output, context) {{\n{}\n}})({}, {})",
        body, output, context
    )
}

fn evaluate(script: &str) -> Result<Option<Value>, DomainError> {
    let mut context = Context::default();

    let value = context
        .eval(Source::from_bytes(script.as_bytes()))
        .map_err(|e| DomainError::script(format!("JavaScript error: {}", e)))?;

    if value.is_undefined() {
        debug!("JavaScript returned undefined");
        return Ok(None);
    }

    value
        .to_json(&mut context)
        .map(Some)
        .map_err(|e| DomainError::script(format!("JavaScript returned a non-JSON value: {}", e)))
}
