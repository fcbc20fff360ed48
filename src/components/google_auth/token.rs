use super::client::OAuthClient;
use super::models::AuthTokens;
use crate::components::token_store::TokenStore;
use crate::error::{auth_error, WidgetResult};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Keeps the current tokens and hands out a valid access token, refreshing
/// and persisting through the token store when the old one expires
#[derive(Debug, Clone)]
pub struct TokenManager {
    client: OAuthClient,
    store: TokenStore,
    current: Arc<RwLock<Option<AuthTokens>>>,
}

impl TokenManager {
    pub fn new(client: OAuthClient, store: TokenStore) -> Self {
        Self {
            client,
            store,
            current: Arc::new(RwLock::new(None)),
        }
    }

    pub fn client(&self) -> &OAuthClient {
        &self.client
    }

    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    /// Adopt and persist freshly obtained tokens
    pub async fn set_tokens(&self, tokens: AuthTokens) -> WidgetResult<()> {
        self.store.store_tokens(&tokens).await?;
        *self.current.write().await = Some(tokens);
        Ok(())
    }

    /// Tokens in memory, falling back to the store
    pub async fn tokens(&self) -> Option<AuthTokens> {
        if let Some(tokens) = self.current.read().await.clone() {
            return Some(tokens);
        }

        let stored = self.store.get_tokens().await?;
        *self.current.write().await = Some(stored.clone());
        Some(stored)
    }

    /// Current tokens, refreshed first if they are (about to be) expired
    pub async fn valid_tokens(&self) -> WidgetResult<AuthTokens> {
        let tokens = self
            .tokens()
            .await
            .ok_or_else(|| auth_error("Not authenticated"))?;

        if !tokens.is_expired() {
            return Ok(tokens);
        }

        if tokens.refresh_token.is_empty() {
            return Err(auth_error("Access token expired and no refresh token is stored"));
        }

        info!("Access token expired, refreshing");
        let refreshed = self.client.refresh_token(&tokens.refresh_token).await?;
        self.store.update_tokens(&refreshed).await?;
        *self.current.write().await = Some(refreshed.clone());
        debug!("Access token refreshed, valid until {}", refreshed.expires_at);

        Ok(refreshed)
    }

    /// Get a valid access token for an API call
    pub async fn get_token(&self) -> WidgetResult<String> {
        Ok(self.valid_tokens().await?.access_token)
    }

    /// Forget tokens in memory and on disk
    pub async fn clear(&self) {
        *self.current.write().await = None;
        self.store.clear_tokens().await;
    }
}
