//! Serde helpers shared across models.

use serde::{Deserialize, Deserializer};

/// Deserialize an optional string, treating blank values as absent
pub fn blank_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|v| !v.trim().is_empty()))
}
