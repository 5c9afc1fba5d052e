//! Assertion model: a closed set of grading kinds with kind-specific payloads

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::DomainError;

pub const DEFAULT_ROUGE_THRESHOLD: f64 = 0.75;
pub const DEFAULT_LEVENSHTEIN_THRESHOLD: f64 = 5.0;
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.75;
pub const DEFAULT_CLASSIFIER_THRESHOLD: f64 = 0.5;

const FILE_PREFIX: &str = "file://";

/// Where a JSON schema comes from
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaSource {
    Inline(Value),
    File(PathBuf),
}

impl SchemaSource {
    fn from_value(value: Value) -> Result<Self, DomainError> {
        match value {
            Value::String(s) => {
                if let Some(path) = s.strip_prefix(FILE_PREFIX) {
                    return Ok(Self::File(PathBuf::from(path)));
                }
                let parsed: Value = serde_json::from_str(&s).map_err(|e| {
                    DomainError::validation(format!("JSON schema is not valid JSON: {}", e))
                })?;
                Ok(Self::Inline(parsed))
            }
            Value::Object(_) | Value::Bool(_) => Ok(Self::Inline(value)),
            other => Err(DomainError::validation(format!(
                "JSON schema must be an object or a file:// path, got {}",
                other
            ))),
        }
    }

    fn to_value(&self) -> Value {
        match self {
            Self::Inline(schema) => schema.clone(),
            Self::File(path) => Value::String(format!("{}{}", FILE_PREFIX, path.display())),
        }
    }
}

/// Grading kind and its configuration
#[derive(Debug, Clone, PartialEq)]
pub enum AssertionKind {
    Equals {
        expected: Value,
    },
    Contains {
        needle: String,
        case_insensitive: bool,
    },
    ContainsAny {
        needles: Vec<String>,
        case_insensitive: bool,
    },
    ContainsAll {
        needles: Vec<String>,
        case_insensitive: bool,
    },
    StartsWith {
        prefix: String,
    },
    Regex {
        pattern: String,
    },
    IsJson {
        schema: Option<SchemaSource>,
    },
    ContainsJson {
        schema: Option<SchemaSource>,
    },
    IsValidOpenaiFunctionCall,
    Javascript {
        code: String,
        threshold: Option<f64>,
    },
    Python {
        code: String,
        threshold: Option<f64>,
    },
    Webhook {
        url: String,
    },
    RougeN {
        reference: String,
        n: usize,
        threshold: f64,
    },
    Levenshtein {
        expected: String,
        threshold: f64,
    },
    Similar {
        expected: String,
        threshold: f64,
    },
    Classifier {
        class: Option<String>,
        threshold: f64,
    },
    LlmRubric {
        rubric: String,
    },
}

impl AssertionKind {
    /// Build a kind from its type name, raw value and optional threshold
    pub fn build(
        type_name: &str,
        value: Option<Value>,
        threshold: Option<f64>,
    ) -> Result<Self, DomainError> {
        let kind = match type_name {
            "equals" => Self::Equals {
                expected: require(type_name, value)?,
            },
            "contains" | "icontains" => Self::Contains {
                needle: require_text(type_name, value)?,
                case_insensitive: type_name == "icontains",
            },
            "contains-any" | "icontains-any" => Self::ContainsAny {
                needles: require_list(type_name, value)?,
                case_insensitive: type_name == "icontains-any",
            },
            "contains-all" | "icontains-all" => Self::ContainsAll {
                needles: require_list(type_name, value)?,
                case_insensitive: type_name == "icontains-all",
            },
            "starts-with" => Self::StartsWith {
                prefix: require_text(type_name, value)?,
            },
            "regex" => Self::Regex {
                pattern: require_text(type_name, value)?,
            },
            "is-json" => Self::IsJson {
                schema: value.map(SchemaSource::from_value).transpose()?,
            },
            "contains-json" => Self::ContainsJson {
                schema: value.map(SchemaSource::from_value).transpose()?,
            },
            "is-valid-openai-function-call" => Self::IsValidOpenaiFunctionCall,
            "javascript" => Self::Javascript {
                code: require_text(type_name, value)?,
                threshold,
            },
            "python" => Self::Python {
                code: require_text(type_name, value)?,
                threshold,
            },
            "webhook" => Self::Webhook {
                url: require_text(type_name, value)?,
            },
            "rouge-n" => {
                let (reference, n) = match require(type_name, value)? {
                    Value::Object(map) => {
                        let reference = map
                            .get("reference")
                            .and_then(Value::as_str)
                            .ok_or_else(|| {
                                DomainError::validation("rouge-n value requires a 'reference'")
                            })?
                            .to_string();
                        let n = map.get("n").and_then(Value::as_u64).unwrap_or(1) as usize;
                        (reference, n)
                    }
                    other => (value_text(&other), 1),
                };
                if n == 0 {
                    return Err(DomainError::validation("rouge-n requires n >= 1"));
                }
                Self::RougeN {
                    reference,
                    n,
                    threshold: threshold.unwrap_or(DEFAULT_ROUGE_THRESHOLD),
                }
            }
            "levenshtein" => Self::Levenshtein {
                expected: require_text(type_name, value)?,
                threshold: threshold.unwrap_or(DEFAULT_LEVENSHTEIN_THRESHOLD),
            },
            "similar" => Self::Similar {
                expected: require_text(type_name, value)?,
                threshold: threshold.unwrap_or(DEFAULT_SIMILARITY_THRESHOLD),
            },
            "classifier" => Self::Classifier {
                class: value.as_ref().map(value_text),
                threshold: threshold.unwrap_or(DEFAULT_CLASSIFIER_THRESHOLD),
            },
            "llm-rubric" => Self::LlmRubric {
                rubric: require_text(type_name, value)?,
            },
            other => {
                return Err(DomainError::validation(format!(
                    "Unknown assertion type: {}",
                    other
                )));
            }
        };

        Ok(kind)
    }

    /// Canonical type name, without negation
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Equals { .. } => "equals",
            Self::Contains {
                case_insensitive: false,
                ..
            } => "contains",
            Self::Contains {
                case_insensitive: true,
                ..
            } => "icontains",
            Self::ContainsAny {
                case_insensitive: false,
                ..
            } => "contains-any",
            Self::ContainsAny {
                case_insensitive: true,
                ..
            } => "icontains-any",
            Self::ContainsAll {
                case_insensitive: false,
                ..
            } => "contains-all",
            Self::ContainsAll {
                case_insensitive: true,
                ..
            } => "icontains-all",
            Self::StartsWith { .. } => "starts-with",
            Self::Regex { .. } => "regex",
            Self::IsJson { .. } => "is-json",
            Self::ContainsJson { .. } => "contains-json",
            Self::IsValidOpenaiFunctionCall => "is-valid-openai-function-call",
            Self::Javascript { .. } => "javascript",
            Self::Python { .. } => "python",
            Self::Webhook { .. } => "webhook",
            Self::RougeN { .. } => "rouge-n",
            Self::Levenshtein { .. } => "levenshtein",
            Self::Similar { .. } => "similar",
            Self::Classifier { .. } => "classifier",
            Self::LlmRubric { .. } => "llm-rubric",
        }
    }

    fn raw_value(&self) -> Option<Value> {
        match self {
            Self::Equals { expected } => Some(expected.clone()),
            Self::Contains { needle, .. } => Some(Value::String(needle.clone())),
            Self::ContainsAny { needles, .. } | Self::ContainsAll { needles, .. } => Some(
                Value::Array(needles.iter().cloned().map(Value::String).collect()),
            ),
            Self::StartsWith { prefix } => Some(Value::String(prefix.clone())),
            Self::Regex { pattern } => Some(Value::String(pattern.clone())),
            Self::IsJson { schema } | Self::ContainsJson { schema } => {
                schema.as_ref().map(SchemaSource::to_value)
            }
            Self::IsValidOpenaiFunctionCall => None,
            Self::Javascript { code, .. } | Self::Python { code, .. } => {
                Some(Value::String(code.clone()))
            }
            Self::Webhook { url } => Some(Value::String(url.clone())),
            Self::RougeN { reference, n, .. } => {
                if *n == 1 {
                    Some(Value::String(reference.clone()))
                } else {
                    Some(serde_json::json!({"reference": reference, "n": n}))
                }
            }
            Self::Levenshtein { expected, .. } | Self::Similar { expected, .. } => {
                Some(Value::String(expected.clone()))
            }
            Self::Classifier { class, .. } => class.clone().map(Value::String),
            Self::LlmRubric { rubric } => Some(Value::String(rubric.clone())),
        }
    }

    fn threshold(&self) -> Option<f64> {
        match self {
            Self::Javascript { threshold, .. } | Self::Python { threshold, .. } => *threshold,
            Self::RougeN { threshold, .. }
            | Self::Levenshtein { threshold, .. }
            | Self::Similar { threshold, .. }
            | Self::Classifier { threshold, .. } => Some(*threshold),
            _ => None,
        }
    }
}

fn require(type_name: &str, value: Option<Value>) -> Result<Value, DomainError> {
    value.ok_or_else(|| {
        DomainError::validation(format!("Assertion '{}' requires a value", type_name))
    })
}

fn require_text(type_name: &str, value: Option<Value>) -> Result<String, DomainError> {
    require(type_name, value).map(|v| value_text(&v))
}

fn require_list(type_name: &str, value: Option<Value>) -> Result<Vec<String>, DomainError> {
    match require(type_name, value)? {
        Value::Array(items) => Ok(items.iter().map(value_text).collect()),
        Value::String(s) => Ok(split_list(&s)),
        other => Err(DomainError::validation(format!(
            "Assertion '{}' expects a list of strings, got {}",
            type_name, other
        ))),
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Split a comma-separated candidate list
pub(crate) fn split_list(text: &str) -> Vec<String> {
    text.split(',').map(|s| s.trim().to_string()).collect()
}

/// A single grading rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawAssertion", into = "RawAssertion")]
pub struct Assertion {
    pub kind: AssertionKind,
    /// Invert the outcome (`not-` prefix)
    pub negate: bool,
    /// Relative weight under the threshold policy
    pub weight: f64,
    /// Grading provider override
    pub provider: Option<String>,
    /// Named score this assertion contributes to
    pub metric: Option<String>,
}

impl Assertion {
    pub fn new(kind: AssertionKind) -> Self {
        Self {
            kind,
            negate: false,
            weight: 1.0,
            provider: None,
            metric: None,
        }
    }

    /// Build an assertion from a (possibly `not-` prefixed) type name and value
    pub fn parse(type_name: &str, value: Option<Value>) -> Result<Self, DomainError> {
        Self::parse_with_threshold(type_name, value, None)
    }

    pub fn parse_with_threshold(
        type_name: &str,
        value: Option<Value>,
        threshold: Option<f64>,
    ) -> Result<Self, DomainError> {
        let (negate, base) = match type_name.strip_prefix("not-") {
            Some(base) => (true, base),
            None => (false, type_name),
        };

        let mut assertion = Self::new(AssertionKind::build(base, value, threshold)?);
        assertion.negate = negate;
        Ok(assertion)
    }

    // Builder methods
    pub fn negated(mut self) -> Self {
        self.negate = !self.negate;
        self
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn with_metric(mut self, metric: impl Into<String>) -> Self {
        self.metric = Some(metric.into());
        self
    }

    /// Type name without negation
    pub fn type_name(&self) -> &'static str {
        self.kind.type_name()
    }

    /// Full type name including the `not-` prefix
    pub fn full_type_name(&self) -> String {
        if self.negate {
            format!("not-{}", self.kind.type_name())
        } else {
            self.kind.type_name().to_string()
        }
    }
}

impl std::fmt::Display for Assertion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.full_type_name())
    }
}

/// Wire shape of an assertion in suite files
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawAssertion {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    threshold: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    weight: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    metric: Option<String>,
}

impl TryFrom<RawAssertion> for Assertion {
    type Error = DomainError;

    fn try_from(raw: RawAssertion) -> Result<Self, Self::Error> {
        let mut assertion = Assertion::parse_with_threshold(&raw.kind, raw.value, raw.threshold)?;

        if let Some(weight) = raw.weight {
            if weight < 0.0 {
                return Err(DomainError::validation(format!(
                    "Assertion weight must be non-negative, got {}",
                    weight
                )));
            }
            assertion.weight = weight;
        }
        assertion.provider = raw.provider;
        assertion.metric = raw.metric;

        Ok(assertion)
    }
}

impl From<Assertion> for RawAssertion {
    fn from(assertion: Assertion) -> Self {
        Self {
            kind: assertion.full_type_name(),
            value: assertion.kind.raw_value(),
            threshold: assertion.kind.threshold(),
            weight: (assertion.weight != 1.0).then_some(assertion.weight),
            provider: assertion.provider,
            metric: assertion.metric,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_negated_kind() {
        let assertion = Assertion::parse("not-icontains", Some(json!("error"))).unwrap();

        assert!(assertion.negate);
        assert_eq!(
            assertion.kind,
            AssertionKind::Contains {
                needle: "error".to_string(),
                case_insensitive: true
            }
        );
        assert_eq!(assertion.full_type_name(), "not-icontains");
    }

    #[test]
    fn test_list_kinds_accept_comma_separated_strings() {
        let assertion = Assertion::parse("contains-any", Some(json!("red, green,blue"))).unwrap();
        assert_eq!(
            assertion.kind,
            AssertionKind::ContainsAny {
                needles: vec!["red".into(), "green".into(), "blue".into()],
                case_insensitive: false
            }
        );
    }

    #[test]
    fn test_threshold_defaults() {
        let assertion = Assertion::parse("levenshtein", Some(json!("hello"))).unwrap();
        assert_eq!(
            assertion.kind,
            AssertionKind::Levenshtein {
                expected: "hello".into(),
                threshold: DEFAULT_LEVENSHTEIN_THRESHOLD
            }
        );

        let assertion = Assertion::parse("similar", Some(json!("hello"))).unwrap();
        assert_eq!(
            assertion.kind,
            AssertionKind::Similar {
                expected: "hello".into(),
                threshold: DEFAULT_SIMILARITY_THRESHOLD
            }
        );
    }

    #[test]
    fn test_missing_value_is_rejected() {
        let error = Assertion::parse("contains", None).unwrap_err();
        assert!(error.to_string().contains("requires a value"));
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        assert!(Assertion::parse("perplexity", Some(json!(1))).is_err());
    }

    #[test]
    fn test_schema_sources() {
        let inline = Assertion::parse("is-json", Some(json!({"type": "object"}))).unwrap();
        assert_eq!(
            inline.kind,
            AssertionKind::IsJson {
                schema: Some(SchemaSource::Inline(json!({"type": "object"})))
            }
        );

        let file = Assertion::parse("contains-json", Some(json!("file://schemas/user.json"))).unwrap();
        assert_eq!(
            file.kind,
            AssertionKind::ContainsJson {
                schema: Some(SchemaSource::File(PathBuf::from("schemas/user.json")))
            }
        );

        let bare = Assertion::parse("is-json", None).unwrap();
        assert_eq!(bare.kind, AssertionKind::IsJson { schema: None });
    }

    #[test]
    fn test_rouge_accepts_reference_object() {
        let assertion =
            Assertion::parse("rouge-n", Some(json!({"reference": "the cat sat", "n": 2}))).unwrap();
        assert_eq!(
            assertion.kind,
            AssertionKind::RougeN {
                reference: "the cat sat".into(),
                n: 2,
                threshold: DEFAULT_ROUGE_THRESHOLD
            }
        );
    }

    #[test]
    fn test_serde_round_trip_preserves_fields() {
        let json = json!({
            "type": "not-similar",
            "value": "Expected output",
            "threshold": 0.9,
            "weight": 3.0,
            "provider": "openai:embeddings",
            "metric": "semantic"
        });

        let assertion: Assertion = serde_json::from_value(json.clone()).unwrap();
        assert!(assertion.negate);
        assert_eq!(assertion.weight, 3.0);
        assert_eq!(assertion.metric.as_deref(), Some("semantic"));

        assert_eq!(serde_json::to_value(&assertion).unwrap(), json);
    }

    #[test]
    fn test_negative_weight_is_rejected() {
        let result: Result<Assertion, _> =
            serde_json::from_value(json!({"type": "contains", "value": "x", "weight": -1}));
        assert!(result.is_err());
    }
}
