//! JSON assertion kinds and schema validation

use std::path::Path;

use serde_json::Value;

use crate::domain::{DomainError, GradingResult, SchemaSource};

/// Find the first JSON object or array embedded in `text`.
///
/// Every `{` or `[` is tried as a start offset from left to right and the
/// first offset where a complete value parses wins. Unbalanced openings
/// before a valid value are skipped.
pub fn find_json(text: &str) -> Option<Value> {
    text.char_indices()
        .filter(|(_, c)| *c == '{' || *c == '[')
        .find_map(|(offset, _)| {
            serde_json::Deserializer::from_str(&text[offset..])
                .into_iter::<Value>()
                .next()
                .and_then(Result::ok)
        })
}

pub fn is_json(output: &str, schema: Option<&Value>, inverse: bool) -> Result<GradingResult, DomainError> {
    let parsed = serde_json::from_str::<Value>(output).ok();
    grade_json(parsed, schema, inverse, "be valid JSON")
}

pub fn contains_json(
    output: &str,
    schema: Option<&Value>,
    inverse: bool,
) -> Result<GradingResult, DomainError> {
    grade_json(find_json(output), schema, inverse, "contain valid JSON")
}

fn grade_json(
    parsed: Option<Value>,
    schema: Option<&Value>,
    inverse: bool,
    expectation: &str,
) -> Result<GradingResult, DomainError> {
    let Some(value) = parsed else {
        let pass = inverse;
        return Ok(if pass {
            GradingResult::pass("Assertion passed")
        } else {
            GradingResult::fail(format!("Expected output to {}", expectation))
        });
    };

    let violations = match schema {
        Some(schema) => schema_violations(schema, &value)?,
        None => Vec::new(),
    };

    let holds = violations.is_empty();
    let pass = holds != inverse;

    Ok(match (pass, holds) {
        (true, _) => GradingResult::pass("Assertion passed"),
        (false, false) => GradingResult::fail(format!(
            "JSON does not conform to the provided schema. Errors: {}",
            violations.join("; ")
        )),
        (false, true) => GradingResult::fail(format!(
            "Expected output to not {}{}",
            expectation,
            if schema.is_some() { " matching the schema" } else { "" }
        )),
    })
}

/// Validate `instance` against `schema`, one `path: message` entry per violation
pub fn schema_violations(schema: &Value, instance: &Value) -> Result<Vec<String>, DomainError> {
    let validator = jsonschema::validator_for(schema)
        .map_err(|e| DomainError::assertion(format!("Invalid JSON schema: {}", e)))?;

    Ok(validator
        .iter_errors(instance)
        .map(|error| {
            let path = error.instance_path.to_string();
            let path = if path.is_empty() { "/".to_string() } else { path };
            format!("{}: {}", path, error)
        })
        .collect())
}

/// Resolve a schema source; files may be JSON or YAML
pub async fn load_schema(source: &SchemaSource) -> Result<Value, DomainError> {
    match source {
        SchemaSource::Inline(schema) => Ok(schema.clone()),
        SchemaSource::File(path) => {
            let content = tokio::fs::read_to_string(path).await.map_err(|e| {
                DomainError::configuration(format!(
                    "Failed to read schema '{}': {}",
                    path.display(),
                    e
                ))
            })?;
            parse_schema(path, &content)
        }
    }
}

fn parse_schema(path: &Path, content: &str) -> Result<Value, DomainError> {
    let is_yaml = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml" | "yml")
    );

    if is_yaml {
        serde_yaml::from_str(content).map_err(|e| {
            DomainError::configuration(format!("Invalid YAML schema '{}': {}", path.display(), e))
        })
    } else {
        serde_json::from_str(content).map_err(|e| {
            DomainError::configuration(format!("Invalid JSON schema '{}': {}", path.display(), e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    fn coordinates_schema() -> Value {
        json!({
            "type": "object",
            "required": ["latitude", "longitude"],
            "properties": {
                "latitude": {"type": "number", "minimum": -90, "maximum": 90},
                "longitude": {"type": "number", "minimum": -180, "maximum": 180}
            }
        })
    }

    #[test]
    fn test_find_json_skips_stray_brace() {
        let text = r#"Here { is the answer: {"city": "Paris", "tags": ["a", "b"]} done"#;
        assert_eq!(find_json(text), Some(json!({"city": "Paris", "tags": ["a", "b"]})));
    }

    #[test]
    fn test_find_json_prefers_outermost_candidate() {
        let text = r#"result: {"outer": {"inner": 1}} and [2]"#;
        assert_eq!(find_json(text), Some(json!({"outer": {"inner": 1}})));
    }

    #[test]
    fn test_find_json_none() {
        assert_eq!(find_json("no json { here"), None);
    }

    #[test]
    fn test_is_json() {
        assert!(is_json(r#"{"a": 1}"#, None, false).unwrap().pass);

        let failed = is_json("not json", None, false).unwrap();
        assert!(!failed.pass);
        assert_eq!(failed.reason, "Expected output to be valid JSON");

        assert!(is_json("not json", None, true).unwrap().pass);
    }

    #[test]
    fn test_is_json_schema_violation_names_path() {
        let schema = coordinates_schema();
        let result = is_json(r#"{"latitude": "high", "longitude": [-1]}"#, Some(&schema), false).unwrap();

        assert!(!result.pass);
        assert!(result.reason.starts_with("JSON does not conform to the provided schema"));
        assert!(result.reason.contains("/latitude"));
        assert!(result.reason.contains("/longitude"));
    }

    #[test]
    fn test_is_json_schema_pass() {
        let schema = coordinates_schema();
        let result = is_json(r#"{"latitude": 48.85, "longitude": 2.35}"#, Some(&schema), false).unwrap();
        assert!(result.pass);
    }

    #[test]
    fn test_contains_json_with_schema() {
        let schema = coordinates_schema();
        let output = r#"Sure! {"latitude": 48.85, "longitude": 2.35} is Paris."#;
        assert!(contains_json(output, Some(&schema), false).unwrap().pass);

        let failed = contains_json("nothing here", None, false).unwrap();
        assert_eq!(failed.reason, "Expected output to contain valid JSON");
    }

    #[tokio::test]
    async fn test_load_schema_from_yaml_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "type: object\nrequired: [name]").unwrap();

        let schema = load_schema(&SchemaSource::File(file.path().to_path_buf()))
            .await
            .unwrap();

        assert_eq!(schema, json!({"type": "object", "required": ["name"]}));
    }
}
