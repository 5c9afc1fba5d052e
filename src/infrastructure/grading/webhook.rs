//! `webhook` assertion: delegate grading to an HTTP endpoint

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use super::engine::AssertionContext;
use crate::domain::GradingResult;

#[derive(Debug, Deserialize)]
struct WebhookVerdict {
    pass: bool,
    score: Option<f64>,
    reason: Option<String>,
}

/// POST `{prompt, vars, output}` to `url`.
///
/// Transport errors and non-2xx statuses are failed results, never errors.
pub async fn call(
    client: &Client,
    timeout: Duration,
    url: &str,
    ctx: &AssertionContext<'_>,
    inverse: bool,
) -> GradingResult {
    let payload = json!({
        "prompt": ctx.prompt,
        "vars": ctx.test.vars,
        "output": ctx.output,
    });

    let response = match client.post(url).timeout(timeout).json(&payload).send().await {
        Ok(response) => response,
        Err(e) => {
            let error_msg = if e.is_timeout() {
                "Request timed out".to_string()
            } else if e.is_connect() {
                "Connection failed".to_string()
            } else {
                format!("Request failed: {}", e)
            };
            warn!(url = %url, error = %error_msg, "Webhook assertion failed");
            return GradingResult::fail(format!("Webhook error: {}", error_msg));
        }
    };

    let status = response.status();
    if !status.is_success() {
        warn!(url = %url, status = status.as_u16(), "Webhook assertion failed with HTTP error");
        return GradingResult::fail(format!("Webhook returned HTTP status {}", status.as_u16()));
    }

    let verdict = match response.json::<WebhookVerdict>().await {
        Ok(verdict) => verdict,
        Err(e) => {
            return GradingResult::fail(format!("Webhook returned an invalid body: {}", e));
        }
    };

    info!(url = %url, pass = verdict.pass, "Webhook assertion graded");

    let pass = verdict.pass != inverse;
    let score = verdict.score.unwrap_or(if verdict.pass { 1.0 } else { 0.0 });
    let score = if inverse { 1.0 - score } else { score };
    let reason = verdict.reason.unwrap_or_else(|| {
        if pass {
            "Assertion passed".to_string()
        } else {
            "Webhook returned failure".to_string()
        }
    });

    GradingResult::new(pass, score, reason)
}
