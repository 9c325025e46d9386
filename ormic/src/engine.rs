//! Rehydrator (component C6): turns the flat, dot-keyed rows a `SELECT`
//! produces back into nested JSON objects along relation boundaries.

use serde_json::{Map, Value};

/// A single result row: a JSON object whose keys are either plain field
/// names or, for an included relation, the relation's field name nesting a
/// further object built the same way.
pub type Row = Map<String, Value>;

/// Stateless; exists as a named component rather than a bare function so
/// the rehydration step reads the same way in call sites as the other
/// pipeline stages.
pub struct Rehydrator;

impl Rehydrator {
    /// Converts one flat row (as a driver reports it, with dot-prefixed
    /// keys for any included relation) into its nested form.
    pub fn rehydrate(flat: Map<String, Value>) -> Row {
        let mut root = Map::new();
        for (key, value) in flat {
            insert_path(&mut root, &key, value);
        }
        root
    }
}

fn insert_path(root: &mut Map<String, Value>, dotted: &str, value: Value) {
    match dotted.split_once('.') {
        None => {
            root.insert(dotted.to_string(), value);
        }
        Some((head, rest)) => {
            let entry = root
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(nested) = entry {
                insert_path(nested, rest, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_row_passes_through_unchanged() {
        let mut flat = Map::new();
        flat.insert("id".to_string(), Value::from(1));
        flat.insert("name".to_string(), Value::from("ada"));
        let row = Rehydrator::rehydrate(flat);
        assert_eq!(row.get("id"), Some(&Value::from(1)));
        assert_eq!(row.get("name"), Some(&Value::from("ada")));
    }

    #[test]
    fn dotted_key_nests_into_an_object() {
        let mut flat = Map::new();
        flat.insert("id".to_string(), Value::from(1));
        flat.insert("profile.bio".to_string(), Value::from("hello"));
        let row = Rehydrator::rehydrate(flat);
        assert_eq!(row.get("profile").and_then(|p| p.get("bio")), Some(&Value::from("hello")));
    }

    #[test]
    fn two_dotted_keys_share_one_nested_object() {
        let mut flat = Map::new();
        flat.insert("profile.bio".to_string(), Value::from("hello"));
        flat.insert("profile.city".to_string(), Value::from("nyc"));
        let row = Rehydrator::rehydrate(flat);
        let profile = row.get("profile").unwrap().as_object().unwrap();
        assert_eq!(profile.len(), 2);
    }
}
