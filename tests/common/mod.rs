#![allow(dead_code)]

use async_trait::async_trait;
use caldesk::components::google_auth::{
    AuthTokens, ConsentPage, ConsentTiming, OAuthEndpoints, PageEvent,
};
use caldesk::components::notifications::{Notice, Notifier};
use caldesk::components::token_store::{NoEncryption, TokenStore};
use caldesk::components::window::HeadlessWindow;
use caldesk::config::Config;
use caldesk::error::WidgetResult;
use caldesk::service::WidgetService;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::sync::RwLock;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const CODE: &str = "4/1AfJohXn3k2Qx7_abcdefghijklmnopqrstuvwxyz0123456789-ZZ";

/// Notifier that remembers what it was asked to show
#[derive(Default)]
pub struct RecordingNotifier {
    pub shown: Mutex<Vec<Notice>>,
}

impl Notifier for RecordingNotifier {
    fn show(&self, notice: &Notice) -> WidgetResult<()> {
        self.shown.lock().unwrap().push(notice.clone());
        Ok(())
    }
}

/// A widget service wired to a mock Google
pub struct TestWidget {
    pub service: WidgetService<HeadlessWindow>,
    pub config: Arc<RwLock<Config>>,
    pub store: TokenStore,
    pub notifier: Arc<RecordingNotifier>,
    pub dir: TempDir,
}

pub async fn widget(server: &MockServer) -> TestWidget {
    let dir = TempDir::new().unwrap();
    let config = Config::with_credentials("client-id", "client-secret", dir.path().to_path_buf());
    let store = TokenStore::new(dir.path(), Arc::new(NoEncryption));
    let notifier = Arc::new(RecordingNotifier::default());
    let config = Arc::new(RwLock::new(config));

    let service = WidgetService::with_endpoints(
        Arc::clone(&config),
        store.clone(),
        HeadlessWindow::default(),
        notifier.clone(),
        None,
        OAuthEndpoints::with_base(&server.uri()),
        &format!("{}/calendar/v3", server.uri()),
    )
    .await
    .unwrap()
    .with_consent_timing(ConsentTiming::immediate());

    TestWidget {
        service,
        config,
        store,
        notifier,
        dir,
    }
}

pub fn tokens(access: &str, expires_at: i64) -> AuthTokens {
    AuthTokens {
        access_token: access.to_string(),
        refresh_token: "refresh-1".to_string(),
        scope: "https://www.googleapis.com/auth/calendar".to_string(),
        token_type: "Bearer".to_string(),
        expires_at,
    }
}

/// Tokens good for another hour
pub fn fresh_tokens(access: &str) -> AuthTokens {
    tokens(access, chrono::Utc::now().timestamp_millis() + 3_600_000)
}

pub async fn mount_user(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/oauth2/v2/userinfo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "42",
            "email": "ada@example.com",
            "name": "Ada Lovelace",
            "picture": ""
        })))
        .mount(server)
        .await;
}

pub async fn mount_events(server: &MockServer, calendar: &str, items: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(format!("/calendar/v3/calendars/{}/events", calendar)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "items": items })))
        .mount(server)
        .await;
}

/// Consent page that replays navigations to fixed URLs
pub struct ReplayPage {
    urls: VecDeque<String>,
    current: String,
    pub closed: usize,
}

impl ReplayPage {
    pub fn new(urls: &[&str]) -> Self {
        Self {
            urls: urls.iter().map(|u| u.to_string()).collect(),
            current: String::new(),
            closed: 0,
        }
    }
}

#[async_trait]
impl ConsentPage for ReplayPage {
    async fn load(&mut self, url: &Url) -> WidgetResult<()> {
        self.current = url.to_string();
        Ok(())
    }

    async fn next_event(&mut self) -> Option<PageEvent> {
        let next = self.urls.pop_front()?;
        self.current = next.clone();
        Some(PageEvent::Navigated(next))
    }

    async fn current_url(&mut self) -> String {
        self.current.clone()
    }

    async fn page_text(&mut self) -> Option<String> {
        None
    }

    async fn close(&mut self) {
        self.closed += 1;
    }
}
