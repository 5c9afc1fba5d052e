//! String-matching assertion kinds

use regex::Regex;
use serde_json::Value;

use super::engine::expectation;
use crate::domain::{value_to_text, DomainError, GradingResult};

pub fn equals(output: &Value, expected: &Value, inverse: bool) -> GradingResult {
    let actual = value_to_text(output);

    let holds = match expected {
        Value::String(text) => actual == *text,
        // Structured expectations compare parsed JSON, not formatting
        structured => match output {
            Value::String(text) => serde_json::from_str::<Value>(text)
                .map(|parsed| parsed == *structured)
                .unwrap_or(false),
            other => other == structured,
        },
    };

    let pass = holds != inverse;
    if pass {
        return GradingResult::pass("Assertion passed");
    }

    GradingResult::fail(format!(
        "Expected output \"{}\" to {}equal \"{}\"",
        actual,
        if inverse { "not " } else { "" },
        value_to_text(expected)
    ))
}

pub fn contains(output: &str, needle: &str, case_insensitive: bool, inverse: bool) -> GradingResult {
    let holds = if case_insensitive {
        output.to_lowercase().contains(&needle.to_lowercase())
    } else {
        output.contains(needle)
    };

    expectation(
        holds,
        inverse,
        format!("contain \"{}\"{}", needle, case_suffix(case_insensitive)),
    )
}

pub fn contains_any(
    output: &str,
    needles: &[String],
    case_insensitive: bool,
    inverse: bool,
) -> GradingResult {
    let haystack = fold_case(output, case_insensitive);
    let holds = needles
        .iter()
        .any(|needle| haystack.contains(&fold_case(needle, case_insensitive)));

    expectation(
        holds,
        inverse,
        format!(
            "contain one of \"{}\"{}",
            needles.join(", "),
            case_suffix(case_insensitive)
        ),
    )
}

pub fn contains_all(
    output: &str,
    needles: &[String],
    case_insensitive: bool,
    inverse: bool,
) -> GradingResult {
    let haystack = fold_case(output, case_insensitive);
    let holds = needles
        .iter()
        .all(|needle| haystack.contains(&fold_case(needle, case_insensitive)));

    expectation(
        holds,
        inverse,
        format!(
            "contain all of \"{}\"{}",
            needles.join(", "),
            case_suffix(case_insensitive)
        ),
    )
}

pub fn starts_with(output: &str, prefix: &str, inverse: bool) -> GradingResult {
    expectation(
        output.starts_with(prefix),
        inverse,
        format!("start with \"{}\"", prefix),
    )
}

/// The pattern is compiled per evaluation; an invalid pattern is an error
pub fn regex(output: &str, pattern: &str, inverse: bool) -> Result<GradingResult, DomainError> {
    let re = Regex::new(pattern)
        .map_err(|e| DomainError::assertion(format!("Invalid regex '{}': {}", pattern, e)))?;

    Ok(expectation(
        re.is_match(output),
        inverse,
        format!("match regex \"{}\"", pattern),
    ))
}

fn fold_case(text: &str, case_insensitive: bool) -> String {
    if case_insensitive {
        text.to_lowercase()
    } else {
        text.to_string()
    }
}

fn case_suffix(case_insensitive: bool) -> &'static str {
    if case_insensitive {
        " (case-insensitive)"
    } else {
        ""
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_equals_quotes_structured_output() {
        let result = equals(&json!({"key": "value"}), &json!("Expected output"), false);

        assert!(!result.pass);
        assert_eq!(result.score, 0.0);
        assert_eq!(
            result.reason,
            r#"Expected output "{"key":"value"}" to equal "Expected output""#
        );
    }

    #[test]
    fn test_equals_structured_expectation() {
        let result = equals(&json!(r#"{ "a": 1, "b": [2] }"#), &json!({"a": 1, "b": [2]}), false);
        assert!(result.pass);

        let result = equals(&json!("Hello"), &json!("Hello"), true);
        assert!(!result.pass);
        assert!(result.reason.contains("to not equal"));
    }

    #[test]
    fn test_contains_variants() {
        assert!(contains("Hello World", "World", false, false).pass);
        assert!(!contains("Hello World", "world", false, false).pass);
        assert!(contains("Hello World", "world", true, false).pass);

        let negated = contains("an error occurred", "error", false, true);
        assert!(!negated.pass);
        assert_eq!(negated.reason, "Expected output to not contain \"error\"");
    }

    #[test]
    fn test_contains_any_and_all_list_candidates() {
        let needles = vec!["red".to_string(), "Blue".to_string()];

        assert!(contains_any("a red car", &needles, false, false).pass);
        assert!(!contains_all("a red car", &needles, false, false).pass);
        assert!(contains_all("a red and blue car", &needles, true, false).pass);

        let failed = contains_any("green", &needles, false, false);
        assert_eq!(failed.reason, "Expected output to contain one of \"red, Blue\"");
    }

    #[test]
    fn test_starts_with() {
        assert!(starts_with("Yes, indeed", "Yes", false).pass);
        assert!(!starts_with("No", "Yes", false).pass);
    }

    #[test]
    fn test_regex() {
        assert!(regex("Order #1234", r"#\d{4}", false).unwrap().pass);
        assert!(regex("Order #1234", r"#\d{4}", true).map(|r| !r.pass).unwrap());
        assert!(regex("x", "(unclosed", false).is_err());
    }
}
