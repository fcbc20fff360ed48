pub mod client;
pub mod code;
pub mod consent;
pub mod models;
pub mod token;

pub use client::{OAuthClient, OAuthEndpoints};
pub use consent::{
    ChannelConsentPage, ConsentPage, ConsentTiming, PageCommand, PageEvent, PageReport,
    PageReportKind, TerminalConsentPage,
};
pub use models::{AuthData, AuthTokens, GoogleUser};
pub use token::TokenManager;

use crate::error::WidgetResult;
use tracing::{info, warn};

/// Sign-in, session restore and sign-out on top of the token manager
#[derive(Debug, Clone)]
pub struct GoogleAuthService {
    tokens: TokenManager,
    timing: ConsentTiming,
}

impl GoogleAuthService {
    pub fn new(tokens: TokenManager) -> Self {
        Self {
            tokens,
            timing: ConsentTiming::default(),
        }
    }

    pub fn with_timing(mut self, timing: ConsentTiming) -> Self {
        self.timing = timing;
        self
    }

    pub fn token_manager(&self) -> &TokenManager {
        &self.tokens
    }

    /// Run the consent flow on `page` and exchange the resulting code
    pub async fn authenticate<P: ConsentPage + ?Sized>(&self, page: &mut P) -> WidgetResult<AuthTokens> {
        let state = uuid::Uuid::new_v4().to_string();
        let auth_url = self.tokens.client().auth_url(&state)?;

        let code = consent::wait_for_code(page, &auth_url, self.timing).await?;
        let tokens = self.tokens.client().exchange_code(&code).await?;
        info!("Authentication successful");
        Ok(tokens)
    }

    /// Full sign-in: consent, persist tokens, fetch the profile
    pub async fn google_auth<P: ConsentPage + ?Sized>(&self, page: &mut P) -> WidgetResult<AuthData> {
        let tokens = self.authenticate(page).await?;
        self.tokens.set_tokens(tokens.clone()).await?;
        let user = self.tokens.client().get_user_info(&tokens.access_token).await?;

        Ok(AuthData { user, tokens })
    }

    /// Restore the previous session; any failure means "signed out"
    pub async fn load_stored_auth(&self) -> Option<AuthData> {
        let tokens = match self.tokens.valid_tokens().await {
            Ok(tokens) => tokens,
            Err(e) => {
                info!("No usable stored session: {}", e);
                return None;
            }
        };

        match self.tokens.client().get_user_info(&tokens.access_token).await {
            Ok(user) => Some(AuthData { user, tokens }),
            Err(e) => {
                warn!("Failed to load stored auth: {}", e);
                None
            }
        }
    }

    /// Revoke at Google when possible, then forget the tokens locally
    pub async fn logout(&self) -> WidgetResult<()> {
        if let Some(tokens) = self.tokens.tokens().await {
            if let Err(e) = self.tokens.client().revoke_token(&tokens.access_token).await {
                warn!("Token revocation failed, clearing local tokens anyway: {}", e);
            }
        }
        self.tokens.clear().await;
        info!("Signed out");
        Ok(())
    }

    pub fn has_stored_tokens(&self) -> bool {
        self.tokens.store().has_stored_tokens()
    }
}
