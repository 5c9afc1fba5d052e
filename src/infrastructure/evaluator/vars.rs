//! Variable expansion into concrete combinations

use serde_json::Value;

use crate::domain::Vars;

/// Expand list-valued variables into their cross product.
///
/// Only arrays whose first element is a string are alternatives; any other
/// value (including arrays of objects) is bound as is. Combinations follow
/// declaration order with the last variable varying fastest.
pub fn expand_vars(vars: &Vars) -> Vec<Vars> {
    let mut combinations = vec![Vars::new()];

    for (name, value) in vars {
        let alternatives: Vec<&Value> = match value {
            Value::Array(items) if matches!(items.first(), Some(Value::String(_))) => {
                items.iter().collect()
            }
            single => vec![single],
        };

        combinations = combinations
            .into_iter()
            .flat_map(|combination| {
                alternatives.iter().map(move |alternative| {
                    let mut next = combination.clone();
                    next.insert(name.clone(), (*alternative).clone());
                    next
                })
            })
            .collect();
    }

    combinations
}
