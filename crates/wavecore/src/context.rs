use regex::{Captures, Regex};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::OnceLock;

fn template_token() -> &'static Regex {
    static TOKEN: OnceLock<Regex> = OnceLock::new();
    TOKEN.get_or_init(|| Regex::new(r"\{\{([^}]+)\}\}").expect("template token pattern is valid"))
}

/// Flat variable store for a single run, keyed by `"<reference_key>.<name>"`.
///
/// Owned by exactly one run; the orchestrator is the only writer.
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    data: HashMap<String, Value>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the store with already-namespaced entries.
    pub fn with_data(data: HashMap<String, Value>) -> Self {
        Self { data }
    }

    pub fn get(&self, path: &str) -> Option<&Value> {
        self.data.get(path)
    }

    pub fn set(&mut self, reference_key: &str, name: &str, value: Value) {
        self.data.insert(format!("{}.{}", reference_key, name), value);
    }

    pub fn set_outputs(&mut self, reference_key: &str, outputs: &Map<String, Value>) {
        for (name, value) in outputs {
            self.set(reference_key, name, value.clone());
        }
    }

    pub fn data(&self) -> &HashMap<String, Value> {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Replaces every `{{ path }}` token with the stringified variable.
    ///
    /// Tokens whose path is absent (or null) are left verbatim, braces included.
    pub fn resolve_template(&self, text: &str) -> String {
        template_token()
            .replace_all(text, |caps: &Captures<'_>| {
                let path = caps[1].trim();
                match self.get(path) {
                    Some(value) if !value.is_null() => display_value(value),
                    _ => caps[0].to_string(),
                }
            })
            .into_owned()
    }

    /// Applies [`resolve_template`](Self::resolve_template) to every string
    /// inside `value`, descending into arrays and objects.
    pub fn resolve_deep(&self, value: &Value) -> Value {
        match value {
            Value::String(s) => Value::String(self.resolve_template(s)),
            Value::Array(items) => Value::Array(items.iter().map(|v| self.resolve_deep(v)).collect()),
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), self.resolve_deep(v)))
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    /// Nested view of the store: `"start.val"` becomes `{"start": {"val": ..}}`.
    ///
    /// Keys are split on the first dot only. Keys without a dot sit at the root.
    pub fn namespaces(&self) -> Map<String, Value> {
        let mut root = Map::new();
        for (key, value) in &self.data {
            match key.split_once('.') {
                Some((namespace, name)) => {
                    let entry = root
                        .entry(namespace.to_string())
                        .or_insert_with(|| Value::Object(Map::new()));
                    if let Value::Object(fields) = entry {
                        fields.insert(name.to_string(), value.clone());
                    }
                }
                None => {
                    root.entry(key.clone()).or_insert_with(|| value.clone());
                }
            }
        }
        root
    }
}

/// Renders a value the way it appears when spliced into text.
///
/// Strings are inserted raw; arrays and objects as compact JSON.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}
