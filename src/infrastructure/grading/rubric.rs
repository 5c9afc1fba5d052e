//! `llm-rubric`: ask a grading model whether the output satisfies a rubric

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::engine::AssertionContext;
use super::json::find_json;
use crate::domain::{
    ApiProvider, CallContext, DomainError, GradingResult, Prompt, TestCaseOptions, Vars,
};
use crate::infrastructure::template::PromptRenderer;

/// Chat-array grading prompt, rendered with `output` and `rubric`
pub const DEFAULT_RUBRIC_PROMPT: &str = r#"[
  {
    "role": "system",
    "content": "You are grading output according to a user-specified rubric. If the statement in the rubric is true, then the output passes the test. You respond with a JSON object with this structure: {\"pass\": boolean, \"reason\": string, \"score\": number between 0 and 1}.\n\nExamples:\n\nOutput: Hello world\nRubric: Content contains a greeting\n{\"pass\": true, \"reason\": \"the content contains the word 'world'\", \"score\": 1.0}\n\nOutput: Avast ye swabs, repel the invaders!\nRubric: Does not speak like a pirate\n{\"pass\": false, \"reason\": \"'avast ye' is a common pirate term\", \"score\": 0.0}"
  },
  {
    "role": "user",
    "content": "Output: {{ output }}\nRubric: {{ rubric }}"
  }
]"#;

#[derive(Debug, Deserialize)]
struct GraderVerdict {
    pass: bool,
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    score: Option<f64>,
}

pub async fn grade(
    grader: &Arc<dyn ApiProvider>,
    renderer: &PromptRenderer,
    rubric: &str,
    ctx: &AssertionContext<'_>,
    inverse: bool,
) -> Result<GradingResult, DomainError> {
    // Rubrics may reference test variables
    let rubric = renderer.engine().render(rubric, &ctx.test.vars)?;

    let template = ctx
        .test
        .options
        .rubric_prompt
        .as_deref()
        .unwrap_or(DEFAULT_RUBRIC_PROMPT);

    let mut vars = Vars::new();
    vars.insert("output".to_string(), Value::String(ctx.text.clone()));
    vars.insert("rubric".to_string(), Value::String(rubric));

    let prompt = renderer.render(&Prompt::new(template), &vars, &TestCaseOptions::default())?;

    debug!(grader = %grader.id(), "Grading output with llm-rubric");

    let response = grader.call_api(&prompt, &CallContext::new(vars)).await?;
    if let Some(error) = response.error {
        return Err(DomainError::provider(grader.id(), error));
    }

    let tokens = response.token_usage.unwrap_or_default();
    let text = response.output.as_ref().map(crate::domain::value_to_text).unwrap_or_default();

    let verdict = find_json(&text)
        .and_then(|json| serde_json::from_value::<GraderVerdict>(json).ok());

    let Some(verdict) = verdict else {
        warn!(grader = %grader.id(), response = %text, "Could not parse llm-rubric response");
        return Ok(GradingResult::fail(format!(
            "Could not extract JSON from llm-rubric response: {}",
            text
        ))
        .with_tokens(tokens));
    };

    let pass = verdict.pass != inverse;
    let score = verdict.score.unwrap_or(if verdict.pass { 1.0 } else { 0.0 });
    let score = if inverse { 1.0 - score } else { score };
    let reason = verdict
        .reason
        .unwrap_or_else(|| if pass { "Assertion passed".into() } else { "Rubric not satisfied".into() });

    Ok(GradingResult::new(pass, score, reason).with_tokens(tokens))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        parse_chat_messages, MockApiProvider, ProviderResponse, TestCase, TokenUsage,
    };

    fn grader(reply: &'static str) -> Arc<MockApiProvider> {
        Arc::new(MockApiProvider::with_responder("grader", move |_, _| {
            ProviderResponse::output(reply).with_token_usage(TokenUsage::new(20, 10))
        }))
    }

    #[tokio::test]
    async fn test_rubric_pass() {
        let mock = grader(r#"Sure. {"pass": true, "reason": "It is polite", "score": 0.9}"#);
        let grader: Arc<dyn ApiProvider> = mock.clone();
        let test = TestCase::new().with_var("tone", "polite");
        let output = Value::String("Thank you \"kindly\"".into());
        let ctx = AssertionContext::new(&output, "prompt", &test, &grader);

        let result = grade(&grader, &PromptRenderer::default(), "Is {{ tone }}", &ctx, false)
            .await
            .unwrap();

        assert!(result.pass);
        assert_eq!(result.score, 0.9);
        assert_eq!(result.reason, "It is polite");
        assert_eq!(result.tokens_used.map(|t| t.total), Some(30));

        // The grading prompt is a valid chat array carrying output and rendered rubric
        let sent = mock.prompts();
        let messages = parse_chat_messages(&sent[0]).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(
            messages[1].content_text(),
            "Output: Thank you \"kindly\"\nRubric: Is polite"
        );
    }

    #[tokio::test]
    async fn test_rubric_unparseable_reply_fails() {
        let grader: Arc<dyn ApiProvider> = grader("I think it passes");
        let test = TestCase::new();
        let output = Value::String("x".into());
        let ctx = AssertionContext::new(&output, "prompt", &test, &grader);

        let result = grade(&grader, &PromptRenderer::default(), "anything", &ctx, false)
            .await
            .unwrap();

        assert!(!result.pass);
        assert!(result.reason.starts_with("Could not extract JSON"));
    }

    #[tokio::test]
    async fn test_rubric_prompt_override() {
        let mock = grader(r#"{"pass": false, "reason": "rude"}"#);
        let grader: Arc<dyn ApiProvider> = mock.clone();
        let test = TestCase::new().with_options(TestCaseOptions {
            rubric_prompt: Some("Grade '{{ output }}' by '{{ rubric }}'".into()),
            ..Default::default()
        });
        let output = Value::String("go away".into());
        let ctx = AssertionContext::new(&output, "prompt", &test, &grader);

        let result = grade(&grader, &PromptRenderer::default(), "is polite", &ctx, false)
            .await
            .unwrap();

        assert!(!result.pass);
        assert_eq!(result.score, 0.0);
        assert_eq!(mock.prompts()[0], "Grade 'go away' by 'is polite'");
    }

    #[tokio::test]
    async fn test_grader_error_propagates() {
        let grader: Arc<dyn ApiProvider> =
            Arc::new(MockApiProvider::echo("grader").failing("quota exceeded"));
        let test = TestCase::new();
        let output = Value::String("x".into());
        let ctx = AssertionContext::new(&output, "prompt", &test, &grader);

        let error = grade(&grader, &PromptRenderer::default(), "r", &ctx, false)
            .await
            .unwrap_err();

        assert!(error.to_string().contains("quota exceeded"));
    }
}
