use crate::error::{storage_error, WidgetResult};
use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use keyring::Entry;
use std::sync::Mutex;
use tracing::{debug, warn};

const NONCE_LEN: usize = 12;

/// Keyring service name holding the token encryption key
pub const KEYRING_SERVICE_NAME: &str = "com.caldesk.widget";
const KEYRING_ACCOUNT: &str = "token-encryption-key";

/// Source of the 32-byte key used to encrypt tokens at rest.
///
/// `Ok(None)` means encryption is not available on this system and the
/// store falls back to a permission-restricted plaintext file.
pub trait KeyProvider: Send + Sync {
    fn key(&self) -> WidgetResult<Option<[u8; 32]>>;
}

/// Key kept base64-encoded in the OS keyring, created on first use
#[derive(Debug, Default)]
pub struct KeyringKeyProvider {
    cached: Mutex<Option<[u8; 32]>>,
}

impl KeyringKeyProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn load_or_create() -> Result<[u8; 32], keyring::Error> {
        let entry = Entry::new(KEYRING_SERVICE_NAME, KEYRING_ACCOUNT)?;

        match entry.get_password() {
            Ok(encoded) => match decode_key(&encoded) {
                Some(key) => return Ok(key),
                None => warn!("Stored token key is malformed, generating a new one"),
            },
            Err(keyring::Error::NoEntry) => debug!("No token key in keyring yet"),
            Err(err) => return Err(err),
        }

        let key = Aes256Gcm::generate_key(OsRng);
        entry.set_password(&BASE64.encode(key.as_slice()))?;

        let mut out = [0u8; 32];
        out.copy_from_slice(key.as_slice());
        Ok(out)
    }
}

impl KeyProvider for KeyringKeyProvider {
    fn key(&self) -> WidgetResult<Option<[u8; 32]>> {
        let mut cached = self
            .cached
            .lock()
            .map_err(|_| storage_error("Key cache lock poisoned"))?;
        if let Some(key) = *cached {
            return Ok(Some(key));
        }

        match Self::load_or_create() {
            Ok(key) => {
                *cached = Some(key);
                Ok(Some(key))
            }
            Err(e) => {
                warn!("OS keyring unavailable, token encryption disabled: {}", e);
                Ok(None)
            }
        }
    }
}

/// Fixed key, for tests and headless setups that inject their own secret
#[derive(Debug, Clone)]
pub struct StaticKeyProvider(pub [u8; 32]);

impl KeyProvider for StaticKeyProvider {
    fn key(&self) -> WidgetResult<Option<[u8; 32]>> {
        Ok(Some(self.0))
    }
}

/// Provider reporting that encryption is unavailable
#[derive(Debug, Clone, Default)]
pub struct NoEncryption;

impl KeyProvider for NoEncryption {
    fn key(&self) -> WidgetResult<Option<[u8; 32]>> {
        Ok(None)
    }
}

fn decode_key(encoded: &str) -> Option<[u8; 32]> {
    let bytes = BASE64.decode(encoded.trim()).ok()?;
    bytes.try_into().ok()
}

/// AES-256-GCM with the nonce stored in front of the ciphertext
pub struct TokenCipher {
    cipher: Aes256Gcm,
}

impl TokenCipher {
    pub fn new(key: &[u8; 32]) -> Self {
        Self {
            cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key)),
        }
    }

    pub fn encrypt(&self, plaintext: &[u8]) -> WidgetResult<Vec<u8>> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext)
            .map_err(|e| storage_error(&format!("Encryption failed: {}", e)))?;

        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(nonce.as_slice());
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    pub fn decrypt(&self, data: &[u8]) -> WidgetResult<Vec<u8>> {
        if data.len() <= NONCE_LEN {
            return Err(storage_error("Encrypted token blob is truncated"));
        }

        let (nonce, ciphertext) = data.split_at(NONCE_LEN);
        self.cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|e| storage_error(&format!("Decryption failed: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encrypt_uses_fresh_nonce_and_decrypts() {
        let cipher = TokenCipher::new(&[7u8; 32]);
        let a = cipher.encrypt(b"{\"access_token\":\"a\"}").unwrap();
        let b = cipher.encrypt(b"{\"access_token\":\"a\"}").unwrap();

        assert_ne!(a, b);
        assert_eq!(cipher.decrypt(&a).unwrap(), b"{\"access_token\":\"a\"}");
    }

    #[test]
    fn wrong_key_fails() {
        let blob = TokenCipher::new(&[1u8; 32]).encrypt(b"secret").unwrap();
        assert!(TokenCipher::new(&[2u8; 32]).decrypt(&blob).is_err());
    }

    #[test]
    fn truncated_blob_fails() {
        let cipher = TokenCipher::new(&[1u8; 32]);
        assert!(cipher.decrypt(&[0u8; 5]).is_err());
    }

    #[test]
    fn key_decoding_requires_32_bytes() {
        assert!(decode_key(&BASE64.encode([3u8; 32])).is_some());
        assert!(decode_key(&BASE64.encode([3u8; 16])).is_none());
        assert!(decode_key("***").is_none());
    }
}
