//! Scoped variable environment.
//!
//! Variables flow through a run as a plain map of name to [`Variable`]. A
//! step sees its parent scope overlaid with its own declarations, and the
//! outputs it returns are folded back into the scope for the steps after it.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Placeholder suffix: `__name__:value` is replaced by the value of `__name__`.
pub const VALUE_SUFFIX: &str = ":value";

/// A single typed variable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variable {
    /// Variable type tag (string, integer, uuid, ipv4-addr, ...)
    #[serde(rename = "type", default = "default_type")]
    pub var_type: String,

    /// Variable name; filled from the map key when a playbook is parsed
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    /// String-encoded value
    #[serde(default)]
    pub value: String,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub constant: bool,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub external: bool,
}

fn default_type() -> String {
    "string".to_string()
}

impl Variable {
    /// Create a string variable.
    pub fn new(name: &str, value: &str) -> Self {
        Self::typed(name, "string", value)
    }

    /// Create a variable with an explicit type tag.
    pub fn typed(name: &str, var_type: &str, value: &str) -> Self {
        Self {
            var_type: var_type.to_string(),
            name: name.to_string(),
            value: value.to_string(),
            ..Default::default()
        }
    }

    pub fn constant(mut self) -> Self {
        self.constant = true;
        self
    }

    pub fn external(mut self) -> Self {
        self.external = true;
        self
    }
}

/// A variable environment keyed by variable name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Variables(HashMap<String, Variable>);

impl Variables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a variable unless one with the same name exists.
    ///
    /// Returns true if the variable was inserted.
    pub fn insert(&mut self, variable: Variable) -> bool {
        if self.0.contains_key(&variable.name) {
            return false;
        }
        self.0.insert(variable.name.clone(), variable);
        true
    }

    /// Insert a variable, replacing any existing one with the same name.
    ///
    /// Returns true if an existing variable was replaced.
    pub fn insert_or_replace(&mut self, variable: Variable) -> bool {
        self.0.insert(variable.name.clone(), variable).is_some()
    }

    /// Left-biased merge: entries already present are kept, absent ones are added.
    pub fn merge(&mut self, source: &Variables) {
        for variable in source.0.values() {
            self.insert(variable.clone());
        }
    }

    /// Merge where the source wins on conflicts.
    ///
    /// Used when the source belongs to a newer scope: step declarations over
    /// the parent scope, and step outputs over the running scope.
    pub fn merge_replace(&mut self, source: &Variables) {
        for variable in source.0.values() {
            self.insert_or_replace(variable.clone());
        }
    }

    /// Project the named subset. Unknown keys are ignored.
    pub fn select<S: AsRef<str>>(&self, keys: &[S]) -> Variables {
        let mut selected = Variables::new();
        for key in keys {
            if let Some(variable) = self.find(key.as_ref()) {
                selected.insert_or_replace(variable.clone());
            }
        }
        selected
    }

    pub fn find(&self, name: &str) -> Option<&Variable> {
        self.0.get(name)
    }

    /// Value of a variable, if present.
    pub fn value(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(|v| v.value.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(|k| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Variable)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Replace every `name:value` placeholder with the variable's value.
    ///
    /// The text is scanned once, left to right; when several names match at
    /// the same position the longest one wins. Substituted values are not
    /// rescanned. Placeholders for unknown variables are left untouched.
    pub fn interpolate(&self, input: &str) -> String {
        if self.0.is_empty() || !input.contains(VALUE_SUFFIX) {
            return input.to_string();
        }

        let mut output = String::with_capacity(input.len());
        let mut pos = 0;
        while pos < input.len() {
            let rest = &input[pos..];
            if let Some((value, consumed)) = self.placeholder_at(rest) {
                output.push_str(value);
                pos += consumed;
                continue;
            }
            match rest.chars().next() {
                Some(ch) => {
                    output.push(ch);
                    pos += ch.len_utf8();
                }
                None => break,
            }
        }
        output
    }

    fn placeholder_at(&self, text: &str) -> Option<(&str, usize)> {
        let mut best: Option<(&str, usize)> = None;
        for (name, variable) in &self.0 {
            if name.is_empty() || !text.starts_with(name.as_str()) {
                continue;
            }
            if !text[name.len()..].starts_with(VALUE_SUFFIX) {
                continue;
            }
            let consumed = name.len() + VALUE_SUFFIX.len();
            if best.map_or(true, |(_, len)| consumed > len) {
                best = Some((variable.value.as_str(), consumed));
            }
        }
        best
    }

    /// Copy map keys into the `name` field of each variable.
    pub(crate) fn normalize_names(&mut self) {
        for (key, variable) in self.0.iter_mut() {
            variable.name = key.clone();
        }
    }
}

impl FromIterator<Variable> for Variables {
    fn from_iter<I: IntoIterator<Item = Variable>>(iter: I) -> Self {
        let mut variables = Variables::new();
        for variable in iter {
            variables.insert(variable);
        }
        variables
    }
}
