//! Test case domain - test cases, assertions and grading results

mod assertion;
mod entity;
mod parser;
mod result;
mod suite;

pub use assertion::{
    Assertion, AssertionKind, SchemaSource, DEFAULT_CLASSIFIER_THRESHOLD,
    DEFAULT_LEVENSHTEIN_THRESHOLD, DEFAULT_ROUGE_THRESHOLD, DEFAULT_SIMILARITY_THRESHOLD,
};
pub use entity::{TestCase, TestCaseOptions};
pub use parser::assertion_from_string;
pub use result::GradingResult;
pub use suite::{Scenario, TestSuite};
