//! `javascript` and `python` assertions

use serde::Deserialize;
use serde_json::Value;

use super::engine::AssertionContext;
use crate::domain::{DomainError, GradingResult};
use crate::infrastructure::script::{JavascriptRuntime, PythonRunner};

#[derive(Debug, Deserialize)]
struct ScriptVerdict {
    pass: bool,
    score: Option<f64>,
    reason: Option<String>,
}

pub async fn javascript(
    runtime: &JavascriptRuntime,
    code: &str,
    threshold: Option<f64>,
    ctx: &AssertionContext<'_>,
    inverse: bool,
) -> Result<GradingResult, DomainError> {
    let result = runtime
        .run(code, ctx.output, &ctx.script_context())
        .await?
        .ok_or_else(|| DomainError::assertion("Custom function did not return a value"))?;

    interpret(result, threshold, inverse)
}

pub async fn python(
    runner: &PythonRunner,
    code: &str,
    threshold: Option<f64>,
    ctx: &AssertionContext<'_>,
    inverse: bool,
) -> Result<GradingResult, DomainError> {
    let result = runner.run(code, &ctx.text, &ctx.script_context()).await?;

    interpret(result, threshold, inverse)
}

/// Turn a script's return value into a grading result.
///
/// Booleans score 1 or 0, numbers are their own score and pass when at or
/// above the threshold (or positive without one), objects carry their own
/// `{pass, score?, reason?}` verdict.
pub fn interpret(
    result: Value,
    threshold: Option<f64>,
    inverse: bool,
) -> Result<GradingResult, DomainError> {
    match result {
        Value::Bool(value) => {
            let pass = value != inverse;
            Ok(if pass {
                GradingResult::pass("Assertion passed")
            } else {
                GradingResult::fail(format!("Custom function returned {}", value))
            })
        }
        Value::Number(number) => {
            let score = number.as_f64().unwrap_or_default();
            let holds = match threshold {
                Some(threshold) => score >= threshold,
                None => score > 0.0,
            };
            let pass = holds != inverse;
            let score = if inverse { 1.0 - score } else { score };

            let reason = match (pass, threshold) {
                (true, _) => "Assertion passed".to_string(),
                (false, Some(threshold)) => format!(
                    "Custom function returned {} which is {} threshold {}",
                    number,
                    if inverse { "at or above" } else { "below" },
                    threshold
                ),
                (false, None) => format!("Custom function returned {}", number),
            };
            Ok(GradingResult::new(pass, score, reason))
        }
        Value::Object(_) => {
            let verdict: ScriptVerdict = serde_json::from_value(result.clone()).map_err(|e| {
                DomainError::assertion(format!(
                    "Custom function returned an invalid result {}: {}",
                    result, e
                ))
            })?;

            let pass = verdict.pass != inverse;
            let score = verdict.score.unwrap_or(if verdict.pass { 1.0 } else { 0.0 });
            let score = if inverse { 1.0 - score } else { score };
            let reason = verdict.reason.unwrap_or_else(|| {
                if pass {
                    "Assertion passed".to_string()
                } else {
                    "Custom function returned false".to_string()
                }
            });
            Ok(GradingResult::new(pass, score, reason))
        }
        other => Err(DomainError::assertion(format!(
            "Custom function must return a boolean, number or {{pass, score, reason}} object, got {}",
            other
        ))),
    }
}
