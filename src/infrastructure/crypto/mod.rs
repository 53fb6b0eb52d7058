//! Credential encryption.
//!
//! AES-256-GCM under a 32-byte master key. Every value gets a fresh 96-bit
//! nonce and the credential key is bound as associated data, so a ciphertext
//! copied onto another key's row fails to decrypt.

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng, Payload},
    Aes256Gcm, Key, Nonce,
};

/// Length of the hex-encoded master key.
pub const MASTER_KEY_HEX_LEN: usize = 64;

const NONCE_LEN: usize = 12;

/// Encryption errors
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("master key environment variable {0} is not set")]
    MissingKey(String),

    #[error("master key must be {MASTER_KEY_HEX_LEN} hex characters")]
    InvalidKey,

    #[error("encryption failed")]
    Encrypt,

    #[error("decryption failed")]
    Decrypt,
}

/// Ciphertext plus the nonce it was sealed with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sealed {
    pub ciphertext: Vec<u8>,
    pub nonce: Vec<u8>,
}

/// AES-256-GCM cipher for stored credentials.
#[derive(Clone)]
pub struct CredentialCipher {
    cipher: Aes256Gcm,
}

impl CredentialCipher {
    /// Build from a 64-character hex key.
    pub fn from_hex(hex_key: &str) -> Result<Self, CryptoError> {
        let hex_key = hex_key.trim();
        if hex_key.len() != MASTER_KEY_HEX_LEN {
            return Err(CryptoError::InvalidKey);
        }
        let bytes = hex::decode(hex_key).map_err(|_| CryptoError::InvalidKey)?;
        let key = Key::<Aes256Gcm>::from_slice(&bytes);

        Ok(Self {
            cipher: Aes256Gcm::new(key),
        })
    }

    /// Build from the hex key stored in environment variable `var`.
    pub fn from_env(var: &str) -> Result<Self, CryptoError> {
        let value = std::env::var(var).map_err(|_| CryptoError::MissingKey(var.to_string()))?;
        Self::from_hex(&value)
    }

    /// Encrypt `plaintext` for the credential named `key`.
    pub fn encrypt(&self, key: &str, plaintext: &str) -> Result<Sealed, CryptoError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(
                &nonce,
                Payload {
                    msg: plaintext.as_bytes(),
                    aad: key.as_bytes(),
                },
            )
            .map_err(|_| CryptoError::Encrypt)?;

        Ok(Sealed {
            ciphertext,
            nonce: nonce.to_vec(),
        })
    }

    /// Decrypt a value stored under credential `key`.
    pub fn decrypt(&self, key: &str, ciphertext: &[u8], nonce: &[u8]) -> Result<String, CryptoError> {
        if nonce.len() != NONCE_LEN {
            return Err(CryptoError::Decrypt);
        }
        let plaintext = self
            .cipher
            .decrypt(
                Nonce::from_slice(nonce),
                Payload {
                    msg: ciphertext,
                    aad: key.as_bytes(),
                },
            )
            .map_err(|_| CryptoError::Decrypt)?;

        String::from_utf8(plaintext).map_err(|_| CryptoError::Decrypt)
    }
}

impl std::fmt::Debug for CredentialCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CredentialCipher(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY_A: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";
    const KEY_B: &str = "1f1e1d1c1b1a191817161514131211100f0e0d0c0b0a09080706050403020100";

    #[test]
    fn test_roundtrip_with_fresh_nonces() {
        let cipher = CredentialCipher::from_hex(KEY_A).unwrap();
        let first = cipher.encrypt("stripe.secret_key", "sk_test_123").unwrap();
        let second = cipher.encrypt("stripe.secret_key", "sk_test_123").unwrap();

        assert_ne!(first.nonce, second.nonce);
        assert_ne!(first.ciphertext, second.ciphertext);
        assert_eq!(
            cipher
                .decrypt("stripe.secret_key", &first.ciphertext, &first.nonce)
                .unwrap(),
            "sk_test_123"
        );
    }

    #[test]
    fn test_wrong_master_key_fails() {
        let sealed = CredentialCipher::from_hex(KEY_A)
            .unwrap()
            .encrypt("paypal.client_secret", "secret")
            .unwrap();
        let other = CredentialCipher::from_hex(KEY_B).unwrap();

        assert!(other
            .decrypt("paypal.client_secret", &sealed.ciphertext, &sealed.nonce)
            .is_err());
    }

    #[test]
    fn test_ciphertext_is_bound_to_credential_key() {
        let cipher = CredentialCipher::from_hex(KEY_A).unwrap();
        let sealed = cipher.encrypt("stripe.secret_key", "sk_live_1").unwrap();

        assert!(cipher
            .decrypt("stripe.webhook_secret", &sealed.ciphertext, &sealed.nonce)
            .is_err());
    }

    #[test]
    fn test_key_validation() {
        assert!(matches!(
            CredentialCipher::from_hex("abcd"),
            Err(CryptoError::InvalidKey)
        ));
        assert!(matches!(
            CredentialCipher::from_hex(&"zz".repeat(32)),
            Err(CryptoError::InvalidKey)
        ));
    }
}
