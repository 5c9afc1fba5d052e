//! Auxiliary grading capabilities (embeddings, classification)

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::TokenUsage;
use crate::domain::DomainError;

#[cfg(test)]
use mockall::automock;

/// A single embedding vector
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Embedding {
    pub vector: Vec<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_usage: Option<TokenUsage>,
}

impl Embedding {
    pub fn new(vector: Vec<f64>) -> Self {
        Self {
            vector,
            token_usage: None,
        }
    }
}

/// Probability assigned to one class by a classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassScore {
    pub label: String,
    pub score: f64,
}

impl ClassScore {
    pub fn new(label: impl Into<String>, score: f64) -> Self {
        Self {
            label: label.into(),
            score,
        }
    }
}

/// Embedding capability used by `similar` assertions
#[cfg_attr(test, automock)]
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Embedding, DomainError>;
}

/// Classification capability used by `classifier` assertions
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ClassifierProvider: Send + Sync {
    async fn classify(&self, text: &str) -> Result<Vec<ClassScore>, DomainError>;
}

/// Cosine similarity of two vectors; zero when either has no magnitude
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> Result<f64, DomainError> {
    if a.len() != b.len() {
        return Err(DomainError::validation(format!(
            "Embedding dimensions differ: {} vs {}",
            a.len(),
            b.len()
        )));
    }

    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f64>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }

    Ok(dot / (norm_a * norm_b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity_identical() {
        let v = vec![0.3, 0.4, 0.5];
        let sim = cosine_similarity(&v, &v).unwrap();
        assert!((sim - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_cosine_similarity_orthogonal() {
        let sim = cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).unwrap();
        assert_eq!(sim, 0.0);
    }

    #[test]
    fn test_cosine_similarity_dimension_mismatch() {
        assert!(cosine_similarity(&[1.0], &[1.0, 2.0]).is_err());
    }

    #[tokio::test]
    async fn test_mock_embedding_provider() {
        let mut mock = MockEmbeddingProvider::new();
        mock.expect_embed()
            .returning(|_| Ok(Embedding::new(vec![1.0, 0.0])));

        let embedding = mock.embed("hello").await.unwrap();
        assert_eq!(embedding.vector, vec![1.0, 0.0]);
    }
}
