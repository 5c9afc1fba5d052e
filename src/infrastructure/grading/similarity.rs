//! `similar` and `classifier` assertions backed by external capabilities

use crate::domain::{
    cosine_similarity, ClassifierProvider, DomainError, EmbeddingProvider, GradingResult,
    TokenUsage,
};

pub async fn similar(
    embedder: Option<&dyn EmbeddingProvider>,
    output: &str,
    expected: &str,
    threshold: f64,
    inverse: bool,
) -> Result<GradingResult, DomainError> {
    let embedder = embedder.ok_or_else(|| {
        DomainError::configuration("The similar assertion requires an embedding provider")
    })?;

    let (expected_embedding, output_embedding) =
        futures::try_join!(embedder.embed(expected), embedder.embed(output))?;
    let similarity = cosine_similarity(&expected_embedding.vector, &output_embedding.vector)?;

    let holds = similarity >= threshold;
    let pass = holds != inverse;
    let comparison = if similarity >= threshold {
        "greater than or equal to"
    } else {
        "less than"
    };

    let mut tokens = TokenUsage::default();
    for usage in [expected_embedding.token_usage, output_embedding.token_usage]
        .iter()
        .flatten()
    {
        tokens.add(usage);
    }

    let reason = if pass {
        "Assertion passed".to_string()
    } else {
        format!(
            "Similarity {:.2} is {} threshold {}",
            similarity, comparison, threshold
        )
    };

    Ok(
        GradingResult::new(pass, if inverse { 1.0 - similarity } else { similarity }, reason)
            .with_tokens(tokens),
    )
}

/// Passes when the named class (or the top class when none is named) scores
/// at or above the threshold
pub async fn classifier(
    classifier: Option<&dyn ClassifierProvider>,
    output: &str,
    class: Option<&str>,
    threshold: f64,
    inverse: bool,
) -> Result<GradingResult, DomainError> {
    let classifier = classifier.ok_or_else(|| {
        DomainError::configuration("The classifier assertion requires a classifier provider")
    })?;

    let scores = classifier.classify(output).await?;

    let selected = match class {
        Some(class) => scores.iter().find(|s| s.label == class),
        None => scores
            .iter()
            .max_by(|a, b| a.score.total_cmp(&b.score)),
    };

    let (label, score) = match selected {
        Some(selected) => (selected.label.clone(), selected.score),
        None => (class.unwrap_or("<none>").to_string(), 0.0),
    };

    let holds = score >= threshold;
    let pass = holds != inverse;

    let reason = if pass {
        "Assertion passed".to_string()
    } else {
        format!(
            "Classification {} has score {:.2} which is {} threshold {}",
            label,
            score,
            if holds { "greater than or equal to" } else { "less than" },
            threshold
        )
    };

    Ok(GradingResult::new(
        pass,
        if inverse { 1.0 - score } else { score },
        reason,
    ))
}
