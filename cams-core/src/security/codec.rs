//! AES-GCM sealing of stored secrets with optional Argon2id key derivation.
//!
//! Secrets persisted on an `ApplicationConnection` are sealed with
//! AES-GCM-256 using a random 96-bit nonce per value and stored as
//! `ENC:` followed by base64(nonce ‖ ciphertext ‖ tag).
//!
//! # Security Guarantees
//! - AES-GCM-256 authenticated encryption, so tampering is detected
//! - No nonce reuse (each encryption uses a fresh random nonce)
//! - Key material lives in a zeroizing buffer and is read-only after init
//! - Argon2id derivation when the key is configured as a passphrase
//!
//! # Cryptographic Standards
//! - AES-GCM: NIST SP 800-38D
//! - Argon2id: RFC 9106

use aes_gcm::{
    Aes256Gcm, Key, Nonce,
    aead::{Aead, AeadCore, KeyInit, OsRng, rand_core::RngCore},
};
use argon2::{Algorithm, Argon2, Params, Version};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use std::sync::Arc;
use zeroize::Zeroizing;

use crate::error::CamsError;

/// Marker prefixed to every sealed value.
pub const ENCRYPTION_MARKER: &str = "ENC:";

/// Prefix selecting a raw base64 key in key-material strings.
pub const RAW_KEY_PREFIX: &str = "base64:";

/// AES-GCM nonce size: 96 bits (12 bytes)
///
/// **Standard:** NIST SP 800-38D §8.2.1
const AES_GCM_NONCE_SIZE: usize = 12;

/// AES-GCM authentication tag size: 128 bits (16 bytes)
///
/// **Standard:** NIST SP 800-38D §5.2.1, Table 2
const AES_GCM_TAG_SIZE: usize = 16;

/// AES key size: 256 bits (32 bytes)
const AES_KEY_SIZE: usize = 32;

/// Minimum Argon2id salt size: 128 bits (16 bytes)
///
/// **Standard:** RFC 9106 §4
const ARGON2_SALT_SIZE: usize = 16;

/// Argon2id memory cost: 64 MiB (65536 KiB)
const ARGON2_MEMORY_COST: u32 = 65536;

/// Argon2id time cost: 3 iterations
const ARGON2_TIME_COST: u32 = 3;

/// Argon2id parallelism: 4 lanes
const ARGON2_PARALLELISM: u32 = 4;

/// Symmetric codec for secrets stored at rest.
///
/// The codec holds nothing but the key, so clones are cheap and it can be
/// shared by every concurrent caller.
///
/// # Example
/// ```rust
/// use cams_core::security::CredentialCodec;
///
/// let codec = CredentialCodec::from_base64_key(&CredentialCodec::generate_key())?;
/// let sealed = codec.encrypt("s3cret")?;
/// assert!(sealed.starts_with("ENC:"));
/// assert_eq!(codec.decrypt(&sealed)?, "s3cret");
/// assert_eq!(codec.encrypt("")?, "");
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Clone)]
pub struct CredentialCodec {
    key: Arc<Zeroizing<[u8; AES_KEY_SIZE]>>,
}

impl std::fmt::Debug for CredentialCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CredentialCodec { key: **** }")
    }
}

impl CredentialCodec {
    /// Creates a codec from exactly 32 bytes of key material.
    ///
    /// # Errors
    /// Returns a configuration error for any other key length.
    pub fn from_key_bytes(bytes: &[u8]) -> crate::Result<Self> {
        if bytes.len() != AES_KEY_SIZE {
            return Err(CamsError::configuration(format!(
                "Encryption key must be {} bytes, got {}",
                AES_KEY_SIZE,
                bytes.len()
            )));
        }
        let mut key = Zeroizing::new([0u8; AES_KEY_SIZE]);
        key.copy_from_slice(bytes);
        Ok(Self { key: Arc::new(key) })
    }

    /// Creates a codec from a base64-encoded 32-byte key.
    ///
    /// # Errors
    /// Returns a configuration error if the value is not valid base64 or has
    /// the wrong length.
    pub fn from_base64_key(encoded: &str) -> crate::Result<Self> {
        let bytes = Zeroizing::new(STANDARD.decode(encoded.trim()).map_err(|e| {
            CamsError::configuration(format!("Encryption key is not valid base64: {}", e))
        })?);
        Self::from_key_bytes(&bytes)
    }

    /// Derives the key from a passphrase using Argon2id.
    ///
    /// Derivation is deliberately expensive and happens once at startup.
    ///
    /// # Errors
    /// Returns a configuration error if the salt is shorter than 16 bytes or
    /// derivation fails.
    pub fn from_passphrase(passphrase: &str, salt: &[u8]) -> crate::Result<Self> {
        if passphrase.is_empty() {
            return Err(CamsError::configuration("Encryption passphrase cannot be empty"));
        }
        if salt.len() < ARGON2_SALT_SIZE {
            return Err(CamsError::configuration(format!(
                "Salt must be at least {} bytes",
                ARGON2_SALT_SIZE
            )));
        }

        let params = Params::new(
            ARGON2_MEMORY_COST,
            ARGON2_TIME_COST,
            ARGON2_PARALLELISM,
            Some(AES_KEY_SIZE),
        )
        .map_err(|e| CamsError::configuration(format!("Invalid Argon2 parameters: {}", e)))?;

        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
        let mut key = Zeroizing::new([0u8; AES_KEY_SIZE]);
        argon2
            .hash_password_into(passphrase.as_bytes(), salt, &mut *key)
            .map_err(|e| CamsError::configuration(format!("Key derivation failed: {}", e)))?;

        Ok(Self { key: Arc::new(key) })
    }

    /// Builds a codec from configured key material.
    ///
    /// `base64:<key>` selects a raw key; anything else is treated as a
    /// passphrase and requires `salt`.
    ///
    /// # Errors
    /// Returns a configuration error when the material is unusable.
    pub fn from_key_material(material: &str, salt: Option<&str>) -> crate::Result<Self> {
        if let Some(encoded) = material.strip_prefix(RAW_KEY_PREFIX) {
            return Self::from_base64_key(encoded);
        }
        let salt = salt.ok_or_else(|| {
            CamsError::configuration("A salt is required when the encryption key is a passphrase")
        })?;
        Self::from_passphrase(material, salt.as_bytes())
    }

    /// Loads the key from the environment variable `var`.
    ///
    /// Passphrase keys read their salt from `<var>_SALT`.
    ///
    /// # Errors
    /// Returns a configuration error if the variable is unset or invalid.
    pub fn from_env(var: &str) -> crate::Result<Self> {
        let material = Zeroizing::new(std::env::var(var).map_err(|_| {
            CamsError::configuration(format!("Environment variable {} is not set", var))
        })?);
        let salt = std::env::var(format!("{var}_SALT")).ok();
        Self::from_key_material(&material, salt.as_deref())
    }

    /// Generates a fresh random key, base64-encoded.
    pub fn generate_key() -> String {
        let mut key = Zeroizing::new([0u8; AES_KEY_SIZE]);
        OsRng.fill_bytes(&mut *key);
        STANDARD.encode(&*key)
    }

    /// Checks whether a stored value carries the encryption marker.
    pub fn is_encrypted(value: &str) -> bool {
        value.starts_with(ENCRYPTION_MARKER)
    }

    /// Seals a plaintext secret.
    ///
    /// Empty input produces an empty string without the marker.
    ///
    /// # Errors
    /// Returns a crypto error if the cipher fails.
    pub fn encrypt(&self, plaintext: &str) -> crate::Result<String> {
        if plaintext.is_empty() {
            return Ok(String::new());
        }

        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.key[..]));
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|e| CamsError::crypto(format!("Encryption failed: {}", e)))?;

        let mut payload = Vec::with_capacity(AES_GCM_NONCE_SIZE + ciphertext.len());
        payload.extend_from_slice(&nonce);
        payload.extend_from_slice(&ciphertext);

        Ok(format!("{}{}", ENCRYPTION_MARKER, STANDARD.encode(payload)))
    }

    /// Opens a sealed secret.
    ///
    /// An empty string decrypts to an empty string.
    ///
    /// # Errors
    /// Returns a crypto error if the marker is missing, the payload is
    /// malformed, or authentication fails (wrong key or tampered data).
    pub fn decrypt(&self, sealed: &str) -> crate::Result<String> {
        if sealed.is_empty() {
            return Ok(String::new());
        }

        let encoded = sealed
            .strip_prefix(ENCRYPTION_MARKER)
            .ok_or_else(|| CamsError::crypto("Value is missing the encryption marker"))?;

        let payload = STANDARD
            .decode(encoded)
            .map_err(|e| CamsError::crypto(format!("Sealed value is not valid base64: {}", e)))?;

        if payload.len() < AES_GCM_NONCE_SIZE + AES_GCM_TAG_SIZE {
            return Err(CamsError::crypto(format!(
                "Sealed value too short (minimum {} bytes for nonce and tag)",
                AES_GCM_NONCE_SIZE + AES_GCM_TAG_SIZE
            )));
        }

        let (nonce, ciphertext) = payload.split_at(AES_GCM_NONCE_SIZE);
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.key[..]));
        let plaintext = Zeroizing::new(
            cipher
                .decrypt(Nonce::from_slice(nonce), ciphertext)
                .map_err(|_| {
                    CamsError::crypto("Decryption failed (wrong key or corrupted data)")
                })?,
        );

        String::from_utf8(plaintext.to_vec())
            .map_err(|_| CamsError::crypto("Decrypted value is not valid UTF-8"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn codec() -> CredentialCodec {
        CredentialCodec::from_key_bytes(&[7u8; 32]).unwrap()
    }

    #[test]
    fn test_codec_roundtrip() {
        let codec = codec();
        let sealed = codec.encrypt("P@ssw0rd!").unwrap();

        assert!(sealed.starts_with(ENCRYPTION_MARKER));
        assert!(!sealed.contains("P@ssw0rd!"));
        assert_eq!(codec.decrypt(&sealed).unwrap(), "P@ssw0rd!");
    }

    #[test]
    fn test_codec_empty_input_has_no_marker() {
        let codec = codec();
        assert_eq!(codec.encrypt("").unwrap(), "");
        assert_eq!(codec.decrypt("").unwrap(), "");
    }

    #[test]
    fn test_codec_nonce_uniqueness() {
        let codec = codec();
        let first = codec.encrypt("same value").unwrap();
        let second = codec.encrypt("same value").unwrap();

        assert_ne!(first, second);
        assert_eq!(codec.decrypt(&first).unwrap(), codec.decrypt(&second).unwrap());
    }

    #[test]
    fn test_codec_missing_marker_fails() {
        let result = codec().decrypt("plaintext-password");
        assert!(matches!(result, Err(CamsError::Crypto { .. })));
    }

    #[test]
    fn test_codec_malformed_base64_fails() {
        let result = codec().decrypt("ENC:***not-base64***");
        assert!(matches!(result, Err(CamsError::Crypto { .. })));
    }

    #[test]
    fn test_codec_truncated_payload_fails() {
        let result = codec().decrypt(&format!("ENC:{}", STANDARD.encode([1u8; 20])));
        assert!(matches!(result, Err(CamsError::Crypto { .. })));
    }

    #[test]
    fn test_codec_tampered_ciphertext_fails() {
        let codec = codec();
        let sealed = codec.encrypt("secret data").unwrap();
        let mut payload = STANDARD.decode(&sealed[ENCRYPTION_MARKER.len()..]).unwrap();
        let last = payload.len() - 1;
        payload[last] ^= 1;
        let tampered = format!("{}{}", ENCRYPTION_MARKER, STANDARD.encode(payload));

        assert!(matches!(
            codec.decrypt(&tampered),
            Err(CamsError::Crypto { .. })
        ));
    }

    #[test]
    fn test_codec_wrong_key_fails() {
        let sealed = codec().encrypt("secret data").unwrap();
        let other = CredentialCodec::from_key_bytes(&[9u8; 32]).unwrap();
        assert!(other.decrypt(&sealed).is_err());
    }

    #[test]
    fn test_codec_key_length_validation() {
        assert!(CredentialCodec::from_key_bytes(&[0u8; 16]).is_err());
        assert!(CredentialCodec::from_base64_key("not base64!").is_err());
        assert!(CredentialCodec::from_base64_key(&CredentialCodec::generate_key()).is_ok());
    }

    #[test]
    fn test_codec_key_material_selection() {
        let raw = format!("{}{}", RAW_KEY_PREFIX, CredentialCodec::generate_key());
        assert!(CredentialCodec::from_key_material(&raw, None).is_ok());

        // Passphrases need a salt
        assert!(CredentialCodec::from_key_material("correct horse", None).is_err());
        assert!(CredentialCodec::from_key_material("correct horse", Some("short")).is_err());
    }

    #[test]
    fn test_codec_passphrase_derivation_is_stable() {
        let salt = b"cams-unit-test-salt";
        let first = CredentialCodec::from_passphrase("correct horse", salt).unwrap();
        let second = CredentialCodec::from_passphrase("correct horse", salt).unwrap();

        let sealed = first.encrypt("value").unwrap();
        assert_eq!(second.decrypt(&sealed).unwrap(), "value");
    }

    #[test]
    fn test_codec_debug_hides_key() {
        assert_eq!(format!("{:?}", codec()), "CredentialCodec { key: **** }");
    }

    proptest! {
        #[test]
        fn test_codec_roundtrip_any_string(value in ".*") {
            let codec = codec();
            let sealed = codec.encrypt(&value).unwrap();
            prop_assert_eq!(codec.decrypt(&sealed).unwrap(), value.clone());
            prop_assert_eq!(sealed.is_empty(), value.is_empty());
        }
    }
}
