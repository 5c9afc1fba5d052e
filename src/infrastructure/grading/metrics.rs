//! Text-similarity metrics: ROUGE-N and Levenshtein distance

use std::collections::HashMap;

use crate::domain::GradingResult;

/// ROUGE-N recall of `candidate` against `reference` over lower-cased
/// alphanumeric tokens; zero when the reference has no n-grams
pub fn rouge_n_score(candidate: &str, reference: &str, n: usize) -> f64 {
    let reference_grams = ngram_counts(reference, n);
    let total: usize = reference_grams.values().sum();
    if total == 0 {
        return 0.0;
    }

    let candidate_grams = ngram_counts(candidate, n);
    let overlap: usize = reference_grams
        .iter()
        .map(|(gram, count)| (*count).min(candidate_grams.get(gram).copied().unwrap_or(0)))
        .sum();

    overlap as f64 / total as f64
}

fn ngram_counts(text: &str, n: usize) -> HashMap<Vec<String>, usize> {
    let tokens: Vec<String> = text
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(String::from)
        .collect();

    let mut counts = HashMap::new();
    if n == 0 || tokens.len() < n {
        return counts;
    }
    for window in tokens.windows(n) {
        *counts.entry(window.to_vec()).or_insert(0) += 1;
    }
    counts
}

pub fn rouge_n(output: &str, reference: &str, n: usize, threshold: f64, inverse: bool) -> GradingResult {
    let score = rouge_n_score(output, reference, n);
    let holds = score >= threshold;
    let pass = holds != inverse;

    let reason = if pass {
        format!(
            "ROUGE-{} score {:.2} is {} threshold {}",
            n,
            score,
            if inverse { "less than" } else { "greater than or equal to" },
            threshold
        )
    } else {
        format!(
            "ROUGE-{} score {:.2} is {} threshold {}",
            n,
            score,
            if inverse { "greater than or equal to" } else { "less than" },
            threshold
        )
    };

    GradingResult::new(pass, if inverse { 1.0 - score } else { score }, reason)
}

pub fn levenshtein(output: &str, expected: &str, threshold: f64, inverse: bool) -> GradingResult {
    let distance = strsim::levenshtein(output, expected);
    let holds = distance as f64 <= threshold;
    let pass = holds != inverse;

    if pass {
        return GradingResult::pass("Assertion passed");
    }

    let reason = if inverse {
        format!(
            "Levenshtein distance {} is less than or equal to threshold {}",
            distance, threshold
        )
    } else {
        format!(
            "Levenshtein distance {} is greater than threshold {}",
            distance, threshold
        )
    };
    GradingResult::fail(reason)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levenshtein_example() {
        let result = levenshtein("Different output", "Expected output", 5.0, false);

        assert!(!result.pass);
        assert_eq!(result.reason, "Levenshtein distance 8 is greater than threshold 5");
    }

    #[test]
    fn test_levenshtein_within_threshold() {
        assert!(levenshtein("kitten", "sitting", 3.0, false).pass);
        assert!(!levenshtein("kitten", "sitting", 3.0, true).pass);
    }

    #[test]
    fn test_rouge_unigram_recall() {
        let score = rouge_n_score("The cat sat on the mat", "the cat was on the mat", 1);
        // reference unigrams: the x2, cat, was, on, mat -> 5 of 6 matched
        assert!((score - 5.0 / 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_rouge_bigram_recall() {
        let score = rouge_n_score("the cat sat", "the cat ran", 2);
        assert_eq!(score, 0.5);
    }

    #[test]
    fn test_rouge_empty_reference() {
        assert_eq!(rouge_n_score("anything", "", 1), 0.0);
    }

    #[test]
    fn test_rouge_assertion_reason_reports_score() {
        let result = rouge_n("a b", "a b c d", 1, 0.75, false);

        assert!(!result.pass);
        assert_eq!(result.score, 0.5);
        assert_eq!(result.reason, "ROUGE-1 score 0.50 is less than threshold 0.75");

        let result = rouge_n("a b c", "a b c d", 1, 0.75, false);
        assert!(result.pass);
    }
}
