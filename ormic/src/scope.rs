//! The scope bag: the only channel through which values from the enclosing
//! Rust scope reach the translator. Closures are captured as bare source
//! text, not as closures with an environment, so external values must be
//! supplied explicitly through this bag rather than captured implicitly.

use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub enum ScopeValue {
    Bool(bool),
    Number(f64),
    Text(String),
    Null,
    Object(Scope),
}

impl From<bool> for ScopeValue {
    fn from(v: bool) -> Self {
        ScopeValue::Bool(v)
    }
}

impl From<f64> for ScopeValue {
    fn from(v: f64) -> Self {
        ScopeValue::Number(v)
    }
}

impl From<i64> for ScopeValue {
    fn from(v: i64) -> Self {
        ScopeValue::Number(v as f64)
    }
}

impl From<String> for ScopeValue {
    fn from(v: String) -> Self {
        ScopeValue::Text(v)
    }
}

impl From<&str> for ScopeValue {
    fn from(v: &str) -> Self {
        ScopeValue::Text(v.to_string())
    }
}

/// Mapping from identifier name to a runtime value or (for nested paths) a
/// nested object, looked up by dot-path exactly like a projection alias.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scope {
    values: HashMap<String, ScopeValue>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shallow-merges `key` into the scope. Later calls for the same key win.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ScopeValue>) {
        self.values.insert(key.into(), value.into());
    }

    /// Resolves a dot-path (e.g. `"address.city"`) against the scope,
    /// descending into nested `ScopeValue::Object`s.
    pub fn resolve(&self, path: &str) -> Option<&ScopeValue> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current = self.values.get(first)?;
        for segment in segments {
            match current {
                ScopeValue::Object(nested) => {
                    current = nested.values.get(segment)?;
                }
                _ => return None,
            }
        }
        Some(current)
    }

    pub fn merge_from(&mut self, other: &Scope) {
        for (k, v) in &other.values {
            self.values.insert(k.clone(), v.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_flat_value() {
        let mut scope = Scope::new();
        scope.insert("foo", 1.0);
        assert_eq!(scope.resolve("foo"), Some(&ScopeValue::Number(1.0)));
    }

    #[test]
    fn resolves_nested_path() {
        let mut inner = Scope::new();
        inner.insert("city", "NYC");
        let mut scope = Scope::new();
        scope.insert("address", ScopeValue::Object(inner));
        assert_eq!(scope.resolve("address.city"), Some(&ScopeValue::Text("NYC".into())));
    }

    #[test]
    fn missing_path_resolves_to_none() {
        let scope = Scope::new();
        assert_eq!(scope.resolve("nope"), None);
    }

    #[test]
    fn later_insert_wins_on_conflict() {
        let mut scope = Scope::new();
        scope.insert("foo", 1.0);
        scope.insert("foo", 2.0);
        assert_eq!(scope.resolve("foo"), Some(&ScopeValue::Number(2.0)));
    }
}
