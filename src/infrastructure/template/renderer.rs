//! Prompt rendering: generator functions, JSON-aware templates and plain text

use serde_json::Value;
use tracing::debug;

use super::TemplateEngine;
use crate::domain::{DomainError, Prompt, TestCaseOptions, Vars};

/// Renders prompts for work items
#[derive(Debug, Clone, Default)]
pub struct PromptRenderer {
    engine: TemplateEngine,
    disable_json_autoescape: bool,
}

impl PromptRenderer {
    pub fn new(engine: TemplateEngine) -> Self {
        Self {
            engine,
            disable_json_autoescape: false,
        }
    }

    /// Render JSON-looking prompts as plain text instead of leaf by leaf
    pub fn with_json_autoescape_disabled(mut self, disabled: bool) -> Self {
        self.disable_json_autoescape = disabled;
        self
    }

    pub fn engine(&self) -> &TemplateEngine {
        &self.engine
    }

    /// Render a prompt against test variables.
    ///
    /// A generator function must return a string or a JSON object/array;
    /// anything else is a fatal [`DomainError::PromptFunction`].
    pub fn render(
        &self,
        prompt: &Prompt,
        vars: &Vars,
        options: &TestCaseOptions,
    ) -> Result<String, DomainError> {
        if let Some(function) = prompt.function() {
            return match function(vars)? {
                Value::String(text) => Ok(text),
                value @ (Value::Object(_) | Value::Array(_)) => Ok(value.to_string()),
                other => Err(DomainError::prompt_function(format!(
                    "Prompt function '{}' must return a string or an object, got {}",
                    prompt.label(),
                    other
                ))),
            };
        }

        let raw = format!(
            "{}{}{}",
            options.prefix.as_deref().unwrap_or_default(),
            prompt.raw(),
            options.suffix.as_deref().unwrap_or_default()
        );
        let vars = trim_trailing_newlines(vars);

        if !self.disable_json_autoescape {
            if let Ok(structured) = serde_json::from_str::<Value>(&raw) {
                debug!(prompt = %prompt.label(), "Rendering structured prompt leaf by leaf");
                return Ok(self.render_leaves(structured, &vars)?.to_string());
            }
        }

        self.engine.render(&raw, &vars)
    }

    fn render_leaves(&self, value: Value, vars: &Vars) -> Result<Value, DomainError> {
        Ok(match value {
            Value::String(text) => Value::String(self.engine.render(&text, vars)?),
            Value::Array(items) => Value::Array(
                items
                    .into_iter()
                    .map(|item| self.render_leaves(item, vars))
                    .collect::<Result<_, _>>()?,
            ),
            Value::Object(map) => Value::Object(
                map.into_iter()
                    .map(|(key, item)| Ok((key, self.render_leaves(item, vars)?)))
                    .collect::<Result<_, DomainError>>()?,
            ),
            scalar => scalar,
        })
    }
}

/// Strip a single trailing newline from every string variable
fn trim_trailing_newlines(vars: &Vars) -> Vars {
    vars.iter()
        .map(|(name, value)| {
            let value = match value {
                Value::String(text) => {
                    Value::String(text.strip_suffix('\n').unwrap_or(text).to_string())
                }
                other => other.clone(),
            };
            (name.clone(), value)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    fn vars(value: Value) -> Vars {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_plain_text_prompt() {
        let renderer = PromptRenderer::default();
        let prompt = Prompt::new("Summarize: {{ text }}");

        let rendered = renderer
            .render(&prompt, &vars(json!({"text": "long story\n"})), &TestCaseOptions::default())
            .unwrap();

        assert_eq!(rendered, "Summarize: long story");
    }

    #[test]
    fn test_only_one_trailing_newline_is_trimmed() {
        let renderer = PromptRenderer::default();
        let prompt = Prompt::new("[{{ text }}]");

        let rendered = renderer
            .render(&prompt, &vars(json!({"text": "a\n\n"})), &TestCaseOptions::default())
            .unwrap();

        assert_eq!(rendered, "[a\n]");
    }

    #[test]
    fn test_json_prompt_renders_string_leaves() {
        let renderer = PromptRenderer::default();
        let prompt = Prompt::new(
            r#"[{"role": "system", "content": "You speak {{ language }}"}, {"role": "user", "content": "{{ question }}"}]"#,
        );

        let rendered = renderer
            .render(
                &prompt,
                &vars(json!({"language": "French", "question": "Say \"hi\""})),
                &TestCaseOptions::default(),
            )
            .unwrap();

        let parsed: Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(parsed[0]["content"], "You speak French");
        // Quotes inside variables stay valid JSON
        assert_eq!(parsed[1]["content"], "Say \"hi\"");
    }

    #[test]
    fn test_json_autoescape_can_be_disabled() {
        let renderer = PromptRenderer::default().with_json_autoescape_disabled(true);
        let prompt = Prompt::new(r#"{"q": "{{ question }}"}"#);

        let rendered = renderer
            .render(&prompt, &vars(json!({"question": "why"})), &TestCaseOptions::default())
            .unwrap();

        assert_eq!(rendered, r#"{"q": "why"}"#);
    }

    #[test]
    fn test_prefix_and_suffix_wrap_raw_prompt() {
        let renderer = PromptRenderer::default();
        let prompt = Prompt::new("{{ q }}");
        let options = TestCaseOptions {
            prefix: Some("Q: ".into()),
            suffix: Some(" A:".into()),
            ..Default::default()
        };

        let rendered = renderer
            .render(&prompt, &vars(json!({"q": "2+2?"})), &options)
            .unwrap();

        assert_eq!(rendered, "Q: 2+2? A:");
    }

    #[test]
    fn test_function_prompt_returning_object_is_serialized() {
        let renderer = PromptRenderer::default();
        let prompt = Prompt::from_function(
            "chat",
            Arc::new(|vars: &Vars| Ok(json!([{"role": "user", "content": vars["topic"]}]))),
        );

        let rendered = renderer
            .render(&prompt, &vars(json!({"topic": "bees"})), &TestCaseOptions::default())
            .unwrap();

        assert_eq!(rendered, r#"[{"role":"user","content":"bees"}]"#);
    }

    #[test]
    fn test_function_prompt_bad_return_is_fatal() {
        let renderer = PromptRenderer::default();
        let prompt = Prompt::from_function("broken", Arc::new(|_: &Vars| Ok(json!(42))));

        let error = renderer
            .render(&prompt, &Vars::new(), &TestCaseOptions::default())
            .unwrap_err();

        assert!(error.is_fatal());
    }
}
