//! Test matrix construction: merged tests x repeats x variable combinations x columns

use std::sync::Arc;
use std::time::Duration;

use super::vars::expand_vars;
use crate::domain::{ApiProvider, Prompt, TestCase, TestSuite, Vars, WorkItem};

/// A table column: one prompt run by one provider
#[derive(Debug, Clone)]
pub struct Column {
    pub provider: Arc<dyn ApiProvider>,
    pub prompt: Prompt,
    pub label: String,
}

/// A table row: one test instance
#[derive(Debug, Clone)]
pub struct Row {
    pub description: Option<String>,
    pub vars: Vars,
}

/// Flat, indexed execution plan
#[derive(Debug, Clone)]
pub struct EvalMatrix {
    pub columns: Vec<Column>,
    pub rows: Vec<Row>,
    pub items: Vec<WorkItem>,
}

/// Flatten defaults, scenarios and explicit tests into atomic test cases.
///
/// Override order is suite defaults < scenario config < test. Scenario
/// tests are appended after the explicit ones; with neither, the defaults
/// alone form a single placeholder test.
pub fn build_tests(suite: &TestSuite) -> Vec<TestCase> {
    let defaults = suite.default_test.clone().unwrap_or_default();

    let mut tests: Vec<TestCase> = suite
        .tests
        .iter()
        .map(|test| defaults.merged_with(test))
        .collect();

    let placeholder = [TestCase::default()];
    for scenario in &suite.scenarios {
        let scenario_tests: &[TestCase] = if scenario.tests.is_empty() {
            &placeholder
        } else {
            &scenario.tests
        };

        for config in &scenario.config {
            let scoped = defaults.merged_with(config);
            tests.extend(scenario_tests.iter().map(|test| scoped.merged_with(test)));
        }
    }

    if suite.tests.is_empty() && suite.scenarios.is_empty() {
        tests.push(defaults);
    }

    tests
}

/// Enumerate the allowed (provider, prompt) pairs in a stable order
pub fn build_columns(suite: &TestSuite) -> Vec<Column> {
    let multiple_providers = suite.providers.len() > 1;

    suite
        .providers
        .iter()
        .flat_map(|provider| {
            suite
                .prompts
                .iter()
                .filter(move |prompt| suite.is_prompt_allowed(provider.id(), prompt))
                .map(move |prompt| {
                    let label = if multiple_providers {
                        format!(
                            "[{}] {}",
                            provider.label().unwrap_or(provider.id()),
                            prompt.label()
                        )
                    } else {
                        prompt.label().to_string()
                    };

                    Column {
                        provider: Arc::clone(provider),
                        prompt: prompt.clone(),
                        label,
                    }
                })
        })
        .collect()
}

/// Build every work item with its stable `(row, col, repeat)` position
pub fn build_matrix(suite: &TestSuite, repeat: usize, delay: Duration) -> EvalMatrix {
    let columns = build_columns(suite);
    let mut rows = Vec::new();
    let mut items = Vec::new();

    for test in build_tests(suite) {
        for repeat_index in 0..repeat.max(1) {
            for vars in expand_vars(&test.vars) {
                let row_index = rows.len();
                let instance = TestCase {
                    vars: vars.clone(),
                    ..test.clone()
                };

                for (col_index, column) in columns.iter().enumerate() {
                    items.push(WorkItem {
                        provider: Arc::clone(&column.provider),
                        prompt: column.prompt.clone(),
                        test: instance.clone(),
                        row_index,
                        col_index,
                        repeat_index,
                        delay,
                    });
                }

                rows.push(Row {
                    description: test.description.clone(),
                    vars,
                });
            }
        }
    }

    EvalMatrix {
        columns,
        rows,
        items,
    }
}
