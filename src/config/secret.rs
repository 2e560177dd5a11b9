//! Shared webhook secret handling
//!
//! The bearer token is kept in a wrapper that zeroes its memory on drop,
//! never prints its value through `Debug`, and serializes masked.

use constant_time_eq::constant_time_eq;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use zeroize::{Zeroize, ZeroizeOnDrop};

#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretToken(String);

impl SecretToken {
    pub fn new(value: String) -> Self {
        Self(value)
    }

    /// Expose the raw value (use with caution)
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Compare a presented token against this secret in constant time
    pub fn matches(&self, presented: &str) -> bool {
        constant_time_eq(self.0.as_bytes(), presented.as_bytes())
    }

    /// Masked form safe for logs
    pub fn masked(&self) -> String {
        mask_secret(&self.0)
    }
}

impl std::fmt::Debug for SecretToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SecretToken([REDACTED {} bytes])", self.0.len())
    }
}

impl Serialize for SecretToken {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.masked())
    }
}

impl<'de> Deserialize<'de> for SecretToken {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(SecretToken::new)
    }
}

/// Mask secret value for logging purposes
pub fn mask_secret(value: &str) -> String {
    if value.is_empty() {
        "[empty]".to_string()
    } else if value.chars().count() <= 8 {
        "*".repeat(value.chars().count())
    } else {
        let head: String = value.chars().take(2).collect();
        let tail: String = value
            .chars()
            .rev()
            .take(2)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        format!("{}***{}", head, tail)
    }
}
