use serde_json::Value;

/// Temporary-to-durable identifier mappings produced during one
/// reconciliation pass, in the order the creates were confirmed.
///
/// Later-queued operations referencing a temporary id get their payloads
/// rewritten through this table just before dispatch, so a dependent
/// operation enqueued against a not-yet-confirmed parent resolves correctly
/// within the same pass.
#[derive(Debug, Default)]
pub struct IdMap {
    entries: Vec<(String, String)>,
}

impl IdMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, temporary: String, durable: String) {
        tracing::debug!(%temporary, %durable, "identifier resolved");
        self.entries.push((temporary, durable));
    }

    pub fn get(&self, temporary: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(temp, _)| temp == temporary)
            .map(|(_, durable)| durable.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Depth-first rewrite of every string value equal to a mapped
    /// temporary identifier, through nested objects and arrays.
    pub fn rewrite(&self, value: &Value) -> Value {
        if self.is_empty() {
            return value.clone();
        }
        match value {
            Value::String(s) => match self.get(s) {
                Some(durable) => Value::String(durable.to_string()),
                None => value.clone(),
            },
            Value::Array(items) => Value::Array(items.iter().map(|v| self.rewrite(v)).collect()),
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), self.rewrite(v)))
                    .collect(),
            ),
            _ => value.clone(),
        }
    }

    pub fn into_pairs(self) -> Vec<(String, String)> {
        self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rewrites_nested_references() {
        let mut map = IdMap::new();
        map.insert("temp_a".into(), "42".into());

        let payload = json!({
            "id": "temp_a",
            "client_id": "temp_a",
            "lines": [
                {"parent": "temp_a", "label": "temp_a mentioned in prose stays"},
                {"parent": "other"}
            ],
            "amount": 10
        });

        let rewritten = map.rewrite(&payload);
        assert_eq!(rewritten["id"], "42");
        assert_eq!(rewritten["client_id"], "42");
        assert_eq!(rewritten["lines"][0]["parent"], "42");
        // Only whole-string matches are substituted.
        assert_eq!(
            rewritten["lines"][0]["label"],
            "temp_a mentioned in prose stays"
        );
        assert_eq!(rewritten["lines"][1]["parent"], "other");
        assert_eq!(rewritten["amount"], 10);
    }

    #[test]
    fn empty_map_is_identity() {
        let map = IdMap::new();
        let payload = json!({"id": "temp_a"});
        assert_eq!(map.rewrite(&payload), payload);
    }
}
