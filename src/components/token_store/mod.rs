pub mod cipher;

pub use cipher::{KeyProvider, KeyringKeyProvider, NoEncryption, StaticKeyProvider};

use crate::components::google_auth::models::AuthTokens;
use crate::error::{storage_error, WidgetResult};
use cipher::TokenCipher;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{error, info, warn};

const ENCRYPTED_FILE: &str = "auth_tokens.enc";
const PLAINTEXT_FILE: &str = "auth_tokens.json";

/// Token persistence: encrypted when a key is available, otherwise a
/// plaintext file readable only by the owner
#[derive(Clone)]
pub struct TokenStore {
    encrypted_path: PathBuf,
    plaintext_path: PathBuf,
    keys: Arc<dyn KeyProvider>,
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStore")
            .field("encrypted_path", &self.encrypted_path)
            .field("plaintext_path", &self.plaintext_path)
            .finish()
    }
}

impl TokenStore {
    pub fn new(data_dir: &Path, keys: Arc<dyn KeyProvider>) -> Self {
        Self {
            encrypted_path: data_dir.join(ENCRYPTED_FILE),
            plaintext_path: data_dir.join(PLAINTEXT_FILE),
            keys,
        }
    }

    /// Store backed by the OS keyring
    pub fn with_keyring(data_dir: &Path) -> Self {
        Self::new(data_dir, Arc::new(KeyringKeyProvider::new()))
    }

    fn cipher(&self) -> WidgetResult<Option<TokenCipher>> {
        Ok(self.keys.key()?.map(|key| TokenCipher::new(&key)))
    }

    /// Write tokens, encrypted when possible
    pub async fn store_tokens(&self, tokens: &AuthTokens) -> WidgetResult<()> {
        let data = serde_json::to_vec(tokens)?;

        if let Some(parent) = self.encrypted_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        match self.cipher()? {
            Some(cipher) => {
                let encrypted = cipher.encrypt(&data)?;
                write_private(&self.encrypted_path, &encrypted)
                    .await
                    .map_err(|e| storage_error(&format!("Failed to store tokens: {}", e)))?;
                // drop the copy left by an earlier plaintext fallback
                remove_if_exists(&self.plaintext_path).await;
                info!("Tokens stored with encryption");
            }
            None => {
                warn!("Encryption not available, using plain text token storage");
                write_private(&self.plaintext_path, &data)
                    .await
                    .map_err(|e| storage_error(&format!("Failed to store tokens: {}", e)))?;
                info!("Tokens stored in plain text");
            }
        }

        Ok(())
    }

    /// Same as [`TokenStore::store_tokens`], used after a refresh
    pub async fn update_tokens(&self, tokens: &AuthTokens) -> WidgetResult<()> {
        self.store_tokens(tokens).await
    }

    /// Read stored tokens; anything unreadable is deleted and treated as absent
    pub async fn get_tokens(&self) -> Option<AuthTokens> {
        match self.read_tokens().await {
            Ok(tokens) => tokens,
            Err(e) => {
                error!("Failed to retrieve tokens: {}", e);
                self.clear_tokens().await;
                None
            }
        }
    }

    async fn read_tokens(&self) -> WidgetResult<Option<AuthTokens>> {
        let cipher = self.cipher()?;

        if let Some(cipher) = cipher.filter(|_| self.encrypted_path.exists()) {
            let encrypted = fs::read(&self.encrypted_path).await?;
            let decrypted = cipher.decrypt(&encrypted)?;
            return Ok(Some(serde_json::from_slice(&decrypted)?));
        }

        if self.plaintext_path.exists() {
            warn!("Reading tokens from plain text storage");
            let data = fs::read(&self.plaintext_path).await?;
            return Ok(Some(serde_json::from_slice(&data)?));
        }

        Ok(None)
    }

    /// Remove both token files; failures are only logged
    pub async fn clear_tokens(&self) {
        remove_if_exists(&self.encrypted_path).await;
        remove_if_exists(&self.plaintext_path).await;
    }

    pub fn has_stored_tokens(&self) -> bool {
        self.encrypted_path.exists() || self.plaintext_path.exists()
    }
}

async fn remove_if_exists(path: &Path) {
    if let Err(e) = fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            error!("Failed to clear tokens at {}: {}", path.display(), e);
        }
    }
}

async fn write_private(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options.open(path).await?;
    file.write_all(data).await?;
    file.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens() -> AuthTokens {
        AuthTokens {
            access_token: "access".to_string(),
            refresh_token: "refresh".to_string(),
            scope: "https://www.googleapis.com/auth/calendar".to_string(),
            token_type: "Bearer".to_string(),
            expires_at: 1_700_000_000_000,
        }
    }

    #[tokio::test]
    async fn encrypted_round_trip_never_writes_plaintext() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path(), Arc::new(StaticKeyProvider([9u8; 32])));

        store.store_tokens(&tokens()).await.unwrap();

        let raw = std::fs::read(dir.path().join(ENCRYPTED_FILE)).unwrap();
        assert!(!String::from_utf8_lossy(&raw).contains("refresh"));
        assert!(!dir.path().join(PLAINTEXT_FILE).exists());
        assert_eq!(store.get_tokens().await, Some(tokens()));
    }

    #[tokio::test]
    async fn falls_back_to_plaintext_without_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path(), Arc::new(NoEncryption));

        store.store_tokens(&tokens()).await.unwrap();
        assert!(dir.path().join(PLAINTEXT_FILE).exists());
        assert!(store.has_stored_tokens());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(dir.path().join(PLAINTEXT_FILE))
                .unwrap()
                .permissions()
                .mode();
            assert_eq!(mode & 0o777, 0o600);
        }

        assert_eq!(store.get_tokens().await, Some(tokens()));
    }

    #[tokio::test]
    async fn undecryptable_tokens_are_cleared() {
        let dir = tempfile::tempdir().unwrap();
        TokenStore::new(dir.path(), Arc::new(StaticKeyProvider([1u8; 32])))
            .store_tokens(&tokens())
            .await
            .unwrap();

        let other_key = TokenStore::new(dir.path(), Arc::new(StaticKeyProvider([2u8; 32])));
        assert_eq!(other_key.get_tokens().await, None);
        assert!(!other_key.has_stored_tokens());
    }

    #[tokio::test]
    async fn missing_tokens_are_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path(), Arc::new(NoEncryption));
        assert_eq!(store.get_tokens().await, None);
        store.clear_tokens().await;
    }
}
