use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Tokens are treated as expired this long before their real expiry
pub const EXPIRY_SKEW_MS: i64 = 60_000;

/// OAuth tokens as persisted by the token store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub scope: String,
    pub token_type: String,
    /// Absolute expiry, unix milliseconds
    pub expires_at: i64,
}

impl AuthTokens {
    pub fn is_expired(&self) -> bool {
        is_expired_at(self.expires_at, Utc::now().timestamp_millis())
    }
}

/// Expiry check against an explicit clock
pub fn is_expired_at(expires_at: i64, now_ms: i64) -> bool {
    now_ms >= expires_at - EXPIRY_SKEW_MS
}

/// Profile of the signed-in Google account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoogleUser {
    pub id: String,
    pub email: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
}

/// What the bridge hands back after a login or a restore
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthData {
    pub user: GoogleUser,
    pub tokens: AuthTokens,
}

/// Raw token endpoint response
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
}

impl TokenResponse {
    /// Convert to stored tokens, keeping `fallback_refresh` when Google omits one
    pub fn into_tokens(self, fallback_refresh: Option<&str>, now_ms: i64) -> AuthTokens {
        let expires_in = self.expires_in.unwrap_or(3600);
        AuthTokens {
            access_token: self.access_token,
            refresh_token: self
                .refresh_token
                .or_else(|| fallback_refresh.map(str::to_string))
                .unwrap_or_default(),
            scope: self.scope.unwrap_or_default(),
            token_type: self.token_type.unwrap_or_else(|| "Bearer".to_string()),
            expires_at: now_ms + expires_in * 1000,
        }
    }
}
