use crate::test_case::data::Params;
use regex::{Captures, Regex};
use serde_yaml::Value;
use std::sync::LazyLock;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{(\w+)\}").expect("placeholder pattern is valid"));

/// Handles `{name}` placeholder substitution in test case templates.
pub struct PlaceholderResolver;

impl PlaceholderResolver {
    /// Substitutes placeholders in the input string with corresponding values.
    ///
    /// - `{name}` is replaced with the stringified value of `params["name"]`.
    /// - If `name` is not a known parameter, the placeholder remains unchanged.
    /// - Substituted values are not scanned again.
    pub fn substitute_placeholders(&self, original: &str, params: &Params) -> String {
        PLACEHOLDER
            .replace_all(original, |caps: &Captures| match params.get(&caps[1]) {
                Some(value) => stringify(value),
                None => caps[0].to_string(),
            })
            .into_owned()
    }

    /// Like [`substitute_placeholders`](Self::substitute_placeholders), for a template of any
    /// type. Only strings are templated, everything else passes through untouched.
    pub fn substitute_value(&self, original: &Value, params: &Params) -> Value {
        match original {
            Value::String(s) => Value::String(self.substitute_placeholders(s, params)),
            other => other.clone(),
        }
    }
}

/// Case defaults overlaid by run-level overrides. Overrides win on collision.
pub fn merge_params(defaults: &Params, overrides: &Params) -> Params {
    let mut merged = defaults.clone();
    for (key, value) in overrides {
        merged.insert(key.clone(), value.clone());
    }
    merged
}

/// Text form of a parameter value, as it appears after substitution.
pub fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}
