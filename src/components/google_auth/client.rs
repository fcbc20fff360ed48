use super::models::{is_expired_at, AuthTokens, GoogleUser, TokenResponse};
use crate::config::Config;
use crate::error::{auth_error, WidgetResult};
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, warn};
use url::Url;

/// Scopes requested during consent
pub const SCOPES: [&str; 3] = [
    "https://www.googleapis.com/auth/calendar",
    "https://www.googleapis.com/auth/userinfo.profile",
    "https://www.googleapis.com/auth/userinfo.email",
];

/// Google OAuth endpoints; overridable so tests can point at a mock server
#[derive(Debug, Clone)]
pub struct OAuthEndpoints {
    pub authorize: String,
    pub token: String,
    pub revoke: String,
    pub userinfo: String,
}

impl Default for OAuthEndpoints {
    fn default() -> Self {
        Self {
            authorize: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
            token: "https://oauth2.googleapis.com/token".to_string(),
            revoke: "https://oauth2.googleapis.com/revoke".to_string(),
            userinfo: "https://www.googleapis.com/oauth2/v2/userinfo".to_string(),
        }
    }
}

impl OAuthEndpoints {
    /// All endpoints rooted at `base`, laid out like Google's paths
    pub fn with_base(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            authorize: format!("{}/o/oauth2/v2/auth", base),
            token: format!("{}/token", base),
            revoke: format!("{}/revoke", base),
            userinfo: format!("{}/oauth2/v2/userinfo", base),
        }
    }
}

#[derive(Debug, Deserialize)]
struct UserInfoResponse {
    #[serde(default)]
    id: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    picture: Option<String>,
}

/// Thin client over Google's OAuth 2.0 endpoints
#[derive(Debug, Clone)]
pub struct OAuthClient {
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    endpoints: OAuthEndpoints,
    client: Client,
}

impl OAuthClient {
    pub fn new(client_id: &str, client_secret: &str, redirect_uri: &str) -> WidgetResult<Self> {
        if client_id.is_empty() || client_secret.is_empty() {
            return Err(auth_error(
                "Google OAuth credentials not configured. Please set GOOGLE_CLIENT_ID and GOOGLE_CLIENT_SECRET environment variables.",
            ));
        }

        Ok(Self {
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            redirect_uri: redirect_uri.to_string(),
            endpoints: OAuthEndpoints::default(),
            client: Client::new(),
        })
    }

    pub fn from_config(config: &Config) -> WidgetResult<Self> {
        Self::new(
            &config.google_client_id,
            &config.google_client_secret,
            &config.redirect_uri,
        )
    }

    pub fn with_endpoints(mut self, endpoints: OAuthEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// Consent URL asking for offline access, forcing the consent screen so a
    /// refresh token is always issued
    pub fn auth_url(&self, state: &str) -> WidgetResult<Url> {
        let mut url = Url::parse(&self.endpoints.authorize)?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("access_type", "offline")
            .append_pair("prompt", "consent")
            .append_pair("scope", &SCOPES.join(" "))
            .append_pair("state", state);
        Ok(url)
    }

    /// Exchange an authorization code for tokens
    pub async fn exchange_code(&self, code: &str) -> WidgetResult<AuthTokens> {
        info!("Exchanging authorization code for tokens");
        let params = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("code", code),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
        ];

        let response = self.post_token(&params, "Failed to exchange code for tokens").await?;
        if response.refresh_token.is_none() {
            warn!("No refresh token issued; the session ends when the access token expires");
        }

        Ok(response.into_tokens(None, Utc::now().timestamp_millis()))
    }

    /// Refresh the access token; the old refresh token is kept when Google
    /// does not rotate it
    pub async fn refresh_token(&self, refresh_token: &str) -> WidgetResult<AuthTokens> {
        debug!("Refreshing access token");
        let params = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];

        let response = self.post_token(&params, "Failed to refresh token").await?;
        Ok(response.into_tokens(Some(refresh_token), Utc::now().timestamp_millis()))
    }

    async fn post_token(&self, params: &[(&str, &str)], context: &str) -> WidgetResult<TokenResponse> {
        let response = self
            .client
            .post(&self.endpoints.token)
            .form(params)
            .send()
            .await
            .map_err(|e| auth_error(&format!("{}: {}", context, e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Could not read error response".to_string());
            return Err(auth_error(&format!(
                "{}: HTTP {} - {}",
                context, status, error_body
            )));
        }

        response
            .json::<TokenResponse>()
            .await
            .map_err(|e| auth_error(&format!("{}: invalid token response: {}", context, e)))
    }

    /// Profile of the account owning `access_token`
    pub async fn get_user_info(&self, access_token: &str) -> WidgetResult<GoogleUser> {
        let response = self
            .client
            .get(&self.endpoints.userinfo)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| auth_error(&format!("Failed to get user info: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Could not read error response".to_string());
            return Err(auth_error(&format!(
                "Failed to get user info: HTTP {} - {}",
                status, error_body
            )));
        }

        let data: UserInfoResponse = response
            .json()
            .await
            .map_err(|e| auth_error(&format!("Failed to get user info: {}", e)))?;

        Ok(GoogleUser {
            id: data.id,
            email: data.email,
            name: data.name,
            picture: data.picture.filter(|p| !p.is_empty()),
        })
    }

    /// Revoke a token at Google
    pub async fn revoke_token(&self, token: &str) -> WidgetResult<()> {
        let response = self
            .client
            .post(&self.endpoints.revoke)
            .form(&[("token", token)])
            .send()
            .await
            .map_err(|e| auth_error(&format!("Failed to revoke token: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(auth_error(&format!(
                "Failed to revoke token: HTTP {}",
                status
            )));
        }

        Ok(())
    }

    /// True one minute before the real expiry
    pub fn is_token_expired(&self, expires_at: i64) -> bool {
        is_expired_at(expires_at, Utc::now().timestamp_millis())
    }
}
