//! `is-valid-openai-function-call`

use serde_json::Value;

use super::json::schema_violations;
use crate::domain::{DomainError, GradingResult};

/// Validate a `{name, arguments}` call against the provider's declared functions.
///
/// Definitions may use the legacy `functions` shape (`{name, parameters}`) or
/// the `tools` shape (`{type: "function", function: {name, parameters}}`).
pub fn validate(
    output: &Value,
    functions: &[Value],
    inverse: bool,
) -> Result<GradingResult, DomainError> {
    if functions.is_empty() {
        return Err(DomainError::assertion(
            "Provider does not have any functions defined",
        ));
    }

    let (holds, failure) = match check_call(output, functions) {
        Ok(()) => (true, None),
        Err(reason) => (false, Some(reason)),
    };

    let pass = holds != inverse;
    Ok(match (pass, failure) {
        (true, _) => GradingResult::pass("Assertion passed"),
        (false, Some(reason)) => GradingResult::fail(reason),
        (false, None) => GradingResult::fail("Expected output to not be a valid function call"),
    })
}

fn check_call(output: &Value, functions: &[Value]) -> Result<(), String> {
    let call = match output {
        Value::String(text) => serde_json::from_str::<Value>(text)
            .map_err(|_| format!("Output is not a function call: {}", text))?,
        other => other.clone(),
    };

    let name = call
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| format!("Function call has no name: {}", call))?;

    let arguments = match call.get("arguments") {
        Some(Value::String(text)) => serde_json::from_str::<Value>(text)
            .map_err(|e| format!("Arguments of \"{}\" are not valid JSON: {}", name, e))?,
        Some(other) => other.clone(),
        None => Value::Object(serde_json::Map::new()),
    };

    let definition = functions
        .iter()
        .map(|f| f.get("function").unwrap_or(f))
        .find(|f| f.get("name").and_then(Value::as_str) == Some(name))
        .ok_or_else(|| format!("Called \"{}\", but there is no function with that name", name))?;

    let Some(parameters) = definition.get("parameters") else {
        return Ok(());
    };

    let violations =
        schema_violations(parameters, &arguments).map_err(|e| e.to_string())?;
    if violations.is_empty() {
        Ok(())
    } else {
        Err(format!(
            "Call to \"{}\" does not match schema: {}",
            name,
            violations.join("; ")
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn weather_function() -> Value {
        json!({
            "name": "get_weather",
            "parameters": {
                "type": "object",
                "properties": {"city": {"type": "string"}, "days": {"type": "integer"}},
                "required": ["city"]
            }
        })
    }

    #[test]
    fn test_valid_call_with_string_arguments() {
        let output = json!({"name": "get_weather", "arguments": "{\"city\": \"Paris\", \"days\": 3}"});
        let result = validate(&output, &[weather_function()], false).unwrap();
        assert!(result.pass);
    }

    #[test]
    fn test_tools_shape_and_object_arguments() {
        let tool = json!({"type": "function", "function": weather_function()});
        let output = json!({"name": "get_weather", "arguments": {"city": "Oslo"}});

        assert!(validate(&output, &[tool], false).unwrap().pass);
    }

    #[test]
    fn test_schema_mismatch() {
        let output = json!({"name": "get_weather", "arguments": "{\"days\": \"three\"}"});
        let result = validate(&output, &[weather_function()], false).unwrap();

        assert!(!result.pass);
        assert!(result.reason.contains("does not match schema"));
        assert!(result.reason.contains("/days"));
    }

    #[test]
    fn test_unknown_function() {
        let output = json!(r#"{"name": "book_flight", "arguments": "{}"}"#);
        let result = validate(&output, &[weather_function()], false).unwrap();

        assert_eq!(
            result.reason,
            "Called \"book_flight\", but there is no function with that name"
        );
    }

    #[test]
    fn test_provider_without_functions_is_error() {
        let output = json!({"name": "x", "arguments": "{}"});
        assert!(validate(&output, &[], false).is_err());
    }
}
