//! Compact assertion DSL, e.g. `icontains:paris` or `not-similar(0.8):a cat`

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use super::assertion::split_list;
use super::{Assertion, AssertionKind};
use crate::domain::DomainError;

/// `[not-]kind[(threshold)][:value]`, kinds ordered so longer names match first
static DSL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?s)^(not-)?(equals|contains-any|contains-all|icontains-any|icontains-all|contains-json|is-json|is-valid-openai-function-call|regex|icontains|contains|starts-with|webhook|rouge-n|levenshtein|similar|classifier|llm-rubric)(?:\((\d+(?:\.\d+)?|\.\d+)\))?(?::(.*))?$",
    )
    .expect("assertion DSL pattern is valid")
});

const JAVASCRIPT_PREFIXES: [&str; 3] = ["fn:", "javascript:", "eval:"];
const PYTHON_PREFIX: &str = "python:";
const RUBRIC_PREFIX: &str = "grade:";
const NEGATION_PREFIX: &str = "not-";

/// Parse the compact textual assertion form
///
/// - plain text becomes `equals`
/// - `fn:expr` / `javascript:expr` / `eval:expr` become `javascript`
/// - `python:expr` becomes `python`, `grade:rubric` becomes `llm-rubric`
/// - `kind`, `kind:value` and `kind(threshold):value`
///
/// Every form except plain text may be prefixed with `not-`.
pub fn assertion_from_string(expected: &str) -> Result<Assertion, DomainError> {
    let (negate, unprefixed) = match expected.strip_prefix(NEGATION_PREFIX) {
        Some(rest) => (true, rest),
        None => (false, expected),
    };
    if let Some(mut assertion) = parse_script_shorthand(unprefixed)? {
        assertion.negate = negate;
        return Ok(assertion);
    }

    let Some(caps) = DSL_PATTERN.captures(expected) else {
        return Ok(Assertion::new(AssertionKind::Equals {
            expected: Value::String(expected.to_string()),
        }));
    };

    let negate = caps.get(1).is_some();
    let kind = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
    let threshold = caps
        .get(3)
        .map(|m| {
            m.as_str().parse::<f64>().map_err(|e| {
                DomainError::validation(format!("Invalid threshold '{}': {}", m.as_str(), e))
            })
        })
        .transpose()?;
    let raw_value = caps.get(4).map(|m| m.as_str());

    let value = match (kind, raw_value) {
        (_, None) => None,
        ("contains-any" | "contains-all" | "icontains-any" | "icontains-all", Some(text)) => {
            Some(Value::Array(
                split_list(text).into_iter().map(Value::String).collect(),
            ))
        }
        // Schemas may be written inline as JSON
        ("is-json" | "contains-json", Some(text)) if text.trim_start().starts_with('{') => {
            Some(serde_json::from_str(text).map_err(|e| {
                DomainError::validation(format!("Invalid inline JSON schema: {}", e))
            })?)
        }
        (_, Some(text)) => Some(Value::String(text.to_string())),
    };

    let mut assertion = Assertion::parse_with_threshold(kind, value, threshold)?;
    assertion.negate = negate;
    Ok(assertion)
}

/// `fn:`, `python:` and `grade:` shorthands
fn parse_script_shorthand(expected: &str) -> Result<Option<Assertion>, DomainError> {
    for prefix in JAVASCRIPT_PREFIXES {
        if let Some(code) = expected.strip_prefix(prefix) {
            return Assertion::parse("javascript", Some(Value::String(code.to_string()))).map(Some);
        }
    }
    if let Some(code) = expected.strip_prefix(PYTHON_PREFIX) {
        return Assertion::parse("python", Some(Value::String(code.to_string()))).map(Some);
    }
    if let Some(rubric) = expected.strip_prefix(RUBRIC_PREFIX) {
        return Assertion::parse("llm-rubric", Some(Value::String(rubric.to_string()))).map(Some);
    }
    Ok(None)
}
