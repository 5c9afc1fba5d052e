//! Assertion engine: per-kind dispatch and the two aggregation policies

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tracing::debug;

use super::{custom, function_call, json as json_kinds, metrics, rubric, similarity, text, webhook};
use crate::domain::{
    value_to_text, ApiProvider, Assertion, AssertionKind, ClassifierProvider, DomainError,
    EmbeddingProvider, GradingResult, TestCase, TokenUsage,
};
use crate::infrastructure::script::{JavascriptRuntime, PythonRunner};
use crate::infrastructure::template::PromptRenderer;

pub const DEFAULT_WEBHOOK_TIMEOUT: Duration = Duration::from_secs(30);

/// Everything an assertion may look at
pub struct AssertionContext<'a> {
    pub output: &'a Value,
    /// Output as text; structured outputs are serialized
    pub text: String,
    pub prompt: &'a str,
    pub test: &'a TestCase,
    pub provider: &'a Arc<dyn ApiProvider>,
}

impl<'a> AssertionContext<'a> {
    pub fn new(
        output: &'a Value,
        prompt: &'a str,
        test: &'a TestCase,
        provider: &'a Arc<dyn ApiProvider>,
    ) -> Self {
        Self {
            output,
            text: value_to_text(output),
            prompt,
            test,
            provider,
        }
    }

    /// Context object handed to user scripts
    pub fn script_context(&self) -> Value {
        json!({ "vars": self.test.vars, "prompt": self.prompt })
    }
}

/// Boolean outcome for kinds phrased as "Expected output to ..."
pub(super) fn expectation(holds: bool, inverse: bool, expected: String) -> GradingResult {
    let pass = holds != inverse;
    if pass {
        GradingResult::pass("Assertion passed")
    } else {
        GradingResult::fail(format!(
            "Expected output to {}{}",
            if inverse { "not " } else { "" },
            expected
        ))
    }
}

/// Grades outputs against test-case assertions
#[derive(Clone)]
pub struct GradingEngine {
    javascript: JavascriptRuntime,
    python: PythonRunner,
    http_client: reqwest::Client,
    webhook_timeout: Duration,
    renderer: PromptRenderer,
    grading_providers: HashMap<String, Arc<dyn ApiProvider>>,
    embedding: Option<Arc<dyn EmbeddingProvider>>,
    classifier: Option<Arc<dyn ClassifierProvider>>,
}

impl GradingEngine {
    pub fn new() -> Self {
        Self {
            javascript: JavascriptRuntime::new(),
            python: PythonRunner::default(),
            http_client: reqwest::Client::new(),
            webhook_timeout: DEFAULT_WEBHOOK_TIMEOUT,
            renderer: PromptRenderer::default(),
            grading_providers: HashMap::new(),
            embedding: None,
            classifier: None,
        }
    }

    // Builder methods
    pub fn with_python(mut self, python: PythonRunner) -> Self {
        self.python = python;
        self
    }

    pub fn with_webhook_timeout(mut self, timeout: Duration) -> Self {
        self.webhook_timeout = timeout;
        self
    }

    pub fn with_renderer(mut self, renderer: PromptRenderer) -> Self {
        self.renderer = renderer;
        self
    }

    /// Register a provider that assertions and tests can name as their grader
    pub fn with_grading_provider(mut self, provider: Arc<dyn ApiProvider>) -> Self {
        self.grading_providers
            .insert(provider.id().to_string(), provider);
        self
    }

    pub fn with_embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding = Some(provider);
        self
    }

    pub fn with_classifier_provider(mut self, provider: Arc<dyn ClassifierProvider>) -> Self {
        self.classifier = Some(provider);
        self
    }

    /// Grade `output` against every assertion of `test`.
    ///
    /// Without a threshold the first failing assertion decides the outcome
    /// (score 0). With a threshold all assertions run and the weighted mean
    /// score is compared against it.
    pub async fn grade_test_case(
        &self,
        test: &TestCase,
        output: &Value,
        prompt: &str,
        provider: &Arc<dyn ApiProvider>,
    ) -> Result<GradingResult, DomainError> {
        if test.assertions.is_empty() {
            return Ok(GradingResult::pass("No assertions"));
        }

        let ctx = AssertionContext::new(output, prompt, test, provider);

        match test.threshold {
            None => self.grade_all(&ctx).await,
            Some(threshold) => self.grade_weighted(&ctx, threshold).await,
        }
    }

    async fn grade_all(&self, ctx: &AssertionContext<'_>) -> Result<GradingResult, DomainError> {
        let mut totals = Totals::default();

        for assertion in &ctx.test.assertions {
            let result = self.run_assertion(assertion, ctx).await?;
            let failure = (!result.pass).then(|| result.reason.clone());
            totals.absorb(result);

            if let Some(reason) = failure {
                return Ok(totals.finish(GradingResult::fail(reason)));
            }
        }

        let score = totals.score_sum / totals.components.len() as f64;
        Ok(totals.finish(GradingResult::new(true, score, "All assertions passed")))
    }

    async fn grade_weighted(
        &self,
        ctx: &AssertionContext<'_>,
        threshold: f64,
    ) -> Result<GradingResult, DomainError> {
        let mut totals = Totals::default();
        let mut weighted_sum = 0.0;
        let mut total_weight = 0.0;

        for assertion in &ctx.test.assertions {
            let result = self.run_assertion(assertion, ctx).await?;
            weighted_sum += result.score * assertion.weight;
            total_weight += assertion.weight;
            totals.absorb(result);
        }

        let score = if total_weight > 0.0 {
            weighted_sum / total_weight
        } else {
            0.0
        };
        let pass = score >= threshold;
        let reason = format!(
            "Aggregate score {:.2} {} {} threshold",
            score,
            if pass { "≥" } else { "<" },
            threshold
        );

        Ok(totals.finish(GradingResult::new(pass, score, reason)))
    }

    /// Evaluate a single assertion, applying negation and its metric name
    pub async fn run_assertion(
        &self,
        assertion: &Assertion,
        ctx: &AssertionContext<'_>,
    ) -> Result<GradingResult, DomainError> {
        let inverse = assertion.negate;
        let output = ctx.text.as_str();

        let mut result = match &assertion.kind {
            AssertionKind::Equals { expected } => text::equals(ctx.output, expected, inverse),
            AssertionKind::Contains {
                needle,
                case_insensitive,
            } => text::contains(output, needle, *case_insensitive, inverse),
            AssertionKind::ContainsAny {
                needles,
                case_insensitive,
            } => text::contains_any(output, needles, *case_insensitive, inverse),
            AssertionKind::ContainsAll {
                needles,
                case_insensitive,
            } => text::contains_all(output, needles, *case_insensitive, inverse),
            AssertionKind::StartsWith { prefix } => text::starts_with(output, prefix, inverse),
            AssertionKind::Regex { pattern } => text::regex(output, pattern, inverse)?,
            AssertionKind::IsJson { schema } => {
                let schema = match schema {
                    Some(source) => Some(json_kinds::load_schema(source).await?),
                    None => None,
                };
                json_kinds::is_json(output, schema.as_ref(), inverse)?
            }
            AssertionKind::ContainsJson { schema } => {
                let schema = match schema {
                    Some(source) => Some(json_kinds::load_schema(source).await?),
                    None => None,
                };
                json_kinds::contains_json(output, schema.as_ref(), inverse)?
            }
            AssertionKind::IsValidOpenaiFunctionCall => {
                function_call::validate(ctx.output, ctx.provider.function_definitions(), inverse)?
            }
            AssertionKind::Javascript { code, threshold } => {
                custom::javascript(&self.javascript, code, *threshold, ctx, inverse).await?
            }
            AssertionKind::Python { code, threshold } => {
                custom::python(&self.python, code, *threshold, ctx, inverse).await?
            }
            AssertionKind::Webhook { url } => {
                webhook::call(&self.http_client, self.webhook_timeout, url, ctx, inverse).await
            }
            AssertionKind::RougeN {
                reference,
                n,
                threshold,
            } => metrics::rouge_n(output, reference, *n, *threshold, inverse),
            AssertionKind::Levenshtein {
                expected,
                threshold,
            } => metrics::levenshtein(output, expected, *threshold, inverse),
            AssertionKind::Similar {
                expected,
                threshold,
            } => {
                similarity::similar(self.embedding.as_deref(), output, expected, *threshold, inverse)
                    .await?
            }
            AssertionKind::Classifier { class, threshold } => {
                similarity::classifier(
                    self.classifier.as_deref(),
                    output,
                    class.as_deref(),
                    *threshold,
                    inverse,
                )
                .await?
            }
            AssertionKind::LlmRubric { rubric } => {
                let grader = self.grading_provider(assertion, ctx)?;
                rubric::grade(&grader, &self.renderer, rubric, ctx, inverse).await?
            }
        };

        debug!(
            assertion = %assertion,
            pass = result.pass,
            score = result.score,
            "Assertion evaluated"
        );

        if let Some(metric) = &assertion.metric {
            result.named_scores.insert(metric.clone(), result.score);
        }

        Ok(result.with_assertion(assertion.clone()))
    }

    /// Assertion override, then test option, then the provider under test
    fn grading_provider(
        &self,
        assertion: &Assertion,
        ctx: &AssertionContext<'_>,
    ) -> Result<Arc<dyn ApiProvider>, DomainError> {
        let requested = assertion
            .provider
            .as_deref()
            .or(ctx.test.options.provider.as_deref());

        match requested {
            None => Ok(Arc::clone(ctx.provider)),
            Some(id) if id == ctx.provider.id() => Ok(Arc::clone(ctx.provider)),
            Some(id) => self.grading_providers.get(id).cloned().ok_or_else(|| {
                DomainError::configuration(format!("Unknown grading provider '{}'", id))
            }),
        }
    }
}

impl Default for GradingEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for GradingEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GradingEngine")
            .field("python", &self.python)
            .field("webhook_timeout", &self.webhook_timeout)
            .field(
                "grading_providers",
                &self.grading_providers.keys().collect::<Vec<_>>(),
            )
            .field("embedding", &self.embedding.is_some())
            .field("classifier", &self.classifier.is_some())
            .finish()
    }
}

/// Running totals over component results
#[derive(Default)]
struct Totals {
    components: Vec<GradingResult>,
    named_scores: BTreeMap<String, f64>,
    tokens: Option<TokenUsage>,
    score_sum: f64,
}

impl Totals {
    fn absorb(&mut self, result: GradingResult) {
        self.score_sum += result.score;
        for (name, value) in &result.named_scores {
            *self.named_scores.entry(name.clone()).or_insert(0.0) += value;
        }
        if let Some(tokens) = &result.tokens_used {
            self.tokens.get_or_insert_with(TokenUsage::default).add(tokens);
        }
        self.components.push(result);
    }

    fn finish(self, mut aggregate: GradingResult) -> GradingResult {
        aggregate.named_scores = self.named_scores;
        aggregate.tokens_used = self.tokens;
        aggregate.with_components(self.components)
    }
}
