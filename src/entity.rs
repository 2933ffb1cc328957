use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

pub const TEMP_ID_PREFIX: &str = "temp_";

/// Name of one cached entity collection ("clients", "invoices", ...).
///
/// Doubles as the record table name in the local store, so it is restricted
/// to a safe SQL identifier at construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityType(String);

impl EntityType {
    pub fn new(value: impl Into<String>) -> Result<Self, String> {
        let value = value.into();
        Self::validate(&value)?;
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(value: &str) -> Result<(), String> {
        if value.is_empty() {
            return Err("Entity type cannot be empty".to_string());
        }
        let mut chars = value.chars();
        let first = chars.next().unwrap_or('_');
        if !first.is_ascii_lowercase() {
            return Err(format!(
                "Entity type must start with a lowercase letter: {value}"
            ));
        }
        if !value
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        {
            return Err(format!(
                "Entity type may only contain [a-z0-9_]: {value}"
            ));
        }
        if value == "sync_queue" || value == "metadata" {
            return Err(format!("Entity type name is reserved: {value}"));
        }
        Ok(())
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<EntityType> for String {
    fn from(value: EntityType) -> Self {
        value.0
    }
}

/// Synthesizes a temporary identifier for an entity created offline.
pub fn new_temporary_id() -> String {
    format!("{TEMP_ID_PREFIX}{}", Uuid::new_v4())
}

pub fn is_temporary_id(id: &str) -> bool {
    id.starts_with(TEMP_ID_PREFIX)
}

/// Extracts the `id` field of an entity payload as a string.
///
/// Remote services routinely return numeric identifiers; those are
/// normalized to their decimal string form so cache keys stay uniform.
pub fn extract_id(payload: &Value) -> Option<String> {
    match payload.get("id")? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
