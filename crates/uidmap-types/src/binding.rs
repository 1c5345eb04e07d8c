use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::identifier::Identifier;

/// Association between a string key and its identifier.
///
/// At most one live binding exists per key and per id.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Binding {
    pub key: String,
    pub id: Identifier,
}

impl Binding {
    pub fn new(key: impl Into<String>, id: Identifier) -> Self {
        Self { key: key.into(), id }
    }
}

impl fmt::Display for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.key, self.id)
    }
}

/// Reject keys that can never be bound.
pub fn validate_key(key: &str) -> Result<(), TypeError> {
    if key.is_empty() {
        return Err(TypeError::EmptyKey);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_key_is_rejected() {
        assert_eq!(validate_key(""), Err(TypeError::EmptyKey));
        assert!(validate_key("custom:block_x").is_ok());
    }

    #[test]
    fn display_format() {
        let b = Binding::new("custom:block_x", Identifier::new(1025).unwrap());
        assert_eq!(b.to_string(), "custom:block_x -> 1025");
    }

    #[test]
    fn serde_roundtrip() {
        let b = Binding::new("custom:ore", Identifier::new(3000).unwrap());
        let json = serde_json::to_string(&b).unwrap();
        assert_eq!(json, r#"{"key":"custom:ore","id":3000}"#);
        let parsed: Binding = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, b);
    }
}
