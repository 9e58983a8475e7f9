//! Secure secret container with automatic memory zeroing.
//!
//! This module provides the `Secret` newtype which holds passwords, access
//! keys and tokens in a `Zeroizing` buffer so the memory is cleared when the
//! value goes out of scope.
//!
//! # Security
//! - Secrets are stored in `Zeroizing<String>` containers
//! - `Debug` output is always redacted
//! - The plaintext is only reachable through the explicit `expose` call

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use zeroize::Zeroizing;

/// Secret string that zeros its memory on drop and never prints itself.
///
/// # Example
///
/// ```rust
/// use cams_core::security::Secret;
///
/// let secret = Secret::new("hunter2");
/// assert_eq!(secret.expose(), "hunter2");
/// assert_eq!(format!("{secret:?}"), "Secret(****)");
/// ```
#[derive(Clone, Default)]
pub struct Secret(Zeroizing<String>);

impl Secret {
    /// Wraps a plaintext value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(Zeroizing::new(value.into()))
    }

    /// Returns the plaintext. Callers must not log the result.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Checks whether the secret is empty without exposing it.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Secret(****)")
    }
}

impl PartialEq for Secret {
    fn eq(&self, other: &Self) -> bool {
        self.expose() == other.expose()
    }
}

impl Eq for Secret {}

impl From<String> for Secret {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for Secret {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl Serialize for Secret {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.expose())
    }
}

impl<'de> Deserialize<'de> for Secret {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::new)
    }
}

/// Returns the exposed value of an optional secret, treating empty as absent.
pub(crate) fn non_empty(secret: Option<&Secret>) -> Option<&str> {
    secret.map(Secret::expose).filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_debug_is_redacted() {
        let secret = Secret::new("super_secret_password_123");
        let debug = format!("{secret:?}");
        assert!(!debug.contains("super_secret"));
    }

    #[test]
    fn test_secret_serde_is_transparent() {
        let secret: Secret = serde_json::from_str("\"p@ss\"").unwrap();
        assert_eq!(secret.expose(), "p@ss");
        assert_eq!(serde_json::to_string(&secret).unwrap(), "\"p@ss\"");
    }

    #[test]
    fn test_non_empty_filters_blank() {
        let empty = Secret::default();
        let full = Secret::new("x");
        assert_eq!(non_empty(Some(&empty)), None);
        assert_eq!(non_empty(Some(&full)), Some("x"));
        assert_eq!(non_empty(None), None);
    }
}
