//! Security utilities for credential protection and encryption.
//!
//! This module provides:
//! - `Secret`: zeroizing container for passwords, keys and tokens
//! - `CredentialCodec`: AES-GCM sealing of secrets stored at rest
//!
//! # Security Guarantees
//! - Secrets are stored in `Zeroizing` containers for automatic memory clearing
//! - Sealed values are authenticated; tampering fails decryption
//! - All sensitive data is redacted from logs and error messages

mod codec;
mod secret;

pub use codec::{CredentialCodec, ENCRYPTION_MARKER, RAW_KEY_PREFIX};
pub use secret::Secret;
pub(crate) use secret::non_empty;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codec_seals_secret_values() {
        let codec = CredentialCodec::from_key_bytes(&[3u8; 32]).unwrap();
        let secret = Secret::new("password");

        let sealed = codec.encrypt(secret.expose()).unwrap();
        assert!(CredentialCodec::is_encrypted(&sealed));
        assert_eq!(Secret::new(codec.decrypt(&sealed).unwrap()), secret);
    }
}
