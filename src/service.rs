use crate::components::google_auth::{
    AuthData, ChannelConsentPage, ConsentPage, ConsentTiming, GoogleAuthService, OAuthClient, OAuthEndpoints,
    PageCommand, PageReport, TokenManager,
};
use crate::components::google_calendar::api::DEFAULT_API_BASE;
use crate::components::google_calendar::time::{month_grid, month_grid_bounds};
use crate::components::google_calendar::{
    CalendarApi, CalendarDay, CalendarEvent, CalendarInfo, EventFilter, EventInput,
    GoogleCalendarHandle,
};
use crate::components::notifications::{NotificationScheduler, Notifier, Urgency};
use crate::components::token_store::TokenStore;
use crate::components::window::{
    build_menu, dispatch, AutoStart, Bounds, MenuItem, SharedWindowManager, TrayAction,
    TrayOutcome, TrayState, WindowBackend, WindowManager,
};
use crate::config::Config;
use crate::error::{auth_error, WidgetResult};
use chrono::Local;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, Mutex, RwLock};
use tracing::{debug, error, info, warn};

/// Free-form UI preferences saved through the bridge
pub const UI_SETTINGS_FILE: &str = "app-settings.json";

/// Pushed to the UI without a request
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum WidgetEvent {
    /// Today's events after a refresh
    EventsUpdated(Vec<CalendarEvent>),
    RefreshCalendar,
    OpenAuthPage { url: String },
    CloseAuthPage,
    Quit,
}

/// Everything the widget process does, behind one cloneable value
pub struct WidgetService<B: WindowBackend + 'static> {
    config: Arc<RwLock<Config>>,
    auth: GoogleAuthService,
    calendar: GoogleCalendarHandle,
    scheduler: NotificationScheduler,
    window: SharedWindowManager<B>,
    autostart: Option<AutoStart>,
    ui_settings: PathBuf,
    todays_events: Arc<RwLock<Vec<CalendarEvent>>>,
    auth_session: Arc<Mutex<Option<mpsc::Sender<PageReport>>>>,
    events: broadcast::Sender<WidgetEvent>,
}

impl<B: WindowBackend + 'static> Clone for WidgetService<B> {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            auth: self.auth.clone(),
            calendar: self.calendar.clone(),
            scheduler: self.scheduler.clone(),
            window: Arc::clone(&self.window),
            autostart: self.autostart.clone(),
            ui_settings: self.ui_settings.clone(),
            todays_events: Arc::clone(&self.todays_events),
            auth_session: Arc::clone(&self.auth_session),
            events: self.events.clone(),
        }
    }
}

impl<B: WindowBackend + 'static> WidgetService<B> {
    /// Wire up the production components from config
    pub async fn new(
        config: Arc<RwLock<Config>>,
        store: TokenStore,
        backend: B,
        notifier: Arc<dyn Notifier>,
        autostart: Option<AutoStart>,
    ) -> WidgetResult<Self> {
        Self::with_endpoints(
            config,
            store,
            backend,
            notifier,
            autostart,
            OAuthEndpoints::default(),
            DEFAULT_API_BASE,
        )
        .await
    }

    /// Same as `new` with the Google endpoints pointed elsewhere
    pub async fn with_endpoints(
        config: Arc<RwLock<Config>>,
        store: TokenStore,
        backend: B,
        notifier: Arc<dyn Notifier>,
        autostart: Option<AutoStart>,
        oauth: OAuthEndpoints,
        api_base: &str,
    ) -> WidgetResult<Self> {
        let (client, data_dir) = {
            let config_read = config.read().await;
            (OAuthClient::from_config(&config_read)?, config_read.data_dir.clone())
        };

        let tokens = TokenManager::new(client.with_endpoints(oauth), store);
        let calendar = GoogleCalendarHandle::new(CalendarApi::with_base(tokens.clone(), api_base));
        let window = WindowManager::new(backend, &data_dir).into_shared();

        Ok(Self::with_components(
            config,
            GoogleAuthService::new(tokens),
            calendar,
            NotificationScheduler::new(notifier),
            window,
            autostart,
        )
        .await)
    }

    /// Assemble from ready-made parts
    pub async fn with_components(
        config: Arc<RwLock<Config>>,
        auth: GoogleAuthService,
        calendar: GoogleCalendarHandle,
        scheduler: NotificationScheduler,
        window: SharedWindowManager<B>,
        autostart: Option<AutoStart>,
    ) -> Self {
        let ui_settings = config.read().await.data_dir.join(UI_SETTINGS_FILE);
        let (events, _) = broadcast::channel(64);

        Self {
            config,
            auth,
            calendar,
            scheduler,
            window,
            autostart,
            ui_settings,
            todays_events: Arc::new(RwLock::new(Vec::new())),
            auth_session: Arc::new(Mutex::new(None)),
            events,
        }
    }

    pub fn with_consent_timing(mut self, timing: ConsentTiming) -> Self {
        self.auth = self.auth.with_timing(timing);
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WidgetEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: WidgetEvent) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }

    pub fn auth(&self) -> &GoogleAuthService {
        &self.auth
    }

    pub fn calendar(&self) -> &GoogleCalendarHandle {
        &self.calendar
    }

    pub fn scheduler(&self) -> &NotificationScheduler {
        &self.scheduler
    }

    pub fn window(&self) -> &SharedWindowManager<B> {
        &self.window
    }

    pub async fn todays_events(&self) -> Vec<CalendarEvent> {
        self.todays_events.read().await.clone()
    }

    async fn configured_calendars(&self) -> Vec<String> {
        self.config.read().await.calendar_ids.clone()
    }

    // Auth

    /// Sign in on an arbitrary consent page, then load today's events
    pub async fn google_auth_with<P: ConsentPage + ?Sized>(&self, page: &mut P) -> WidgetResult<AuthData> {
        let auth = self.auth.google_auth(page).await?;
        self.refresh_quietly().await;
        Ok(auth)
    }

    /// Sign in with the consent screen shown by the UI process
    pub async fn google_auth(&self) -> WidgetResult<AuthData> {
        let (tx, rx) = mpsc::channel(16);
        {
            let mut session = self.auth_session.lock().await;
            if session.as_ref().is_some_and(|s| !s.is_closed()) {
                return Err(auth_error("Authentication already in progress"));
            }
            *session = Some(tx);
        }

        let events = self.events.clone();
        let mut page = ChannelConsentPage::new(rx, move |command| {
            let event = match command {
                PageCommand::Open(url) => WidgetEvent::OpenAuthPage { url: url.to_string() },
                PageCommand::Close => WidgetEvent::CloseAuthPage,
            };
            let _ = events.send(event);
        });

        let result = self.google_auth_with(&mut page).await;
        *self.auth_session.lock().await = None;
        result
    }

    /// Forward a consent page change to the running sign-in
    pub async fn report_auth_page(&self, report: PageReport) -> WidgetResult<()> {
        let session = self.auth_session.lock().await;
        let tx = session
            .as_ref()
            .ok_or_else(|| auth_error("No authentication in progress"))?;
        tx.send(report)
            .await
            .map_err(|_| auth_error("Authentication window was closed"))
    }

    /// Abandon a sign-in that is waiting on page events
    pub async fn cancel_auth(&self) {
        if self.auth_session.lock().await.take().is_some() {
            info!("Pending sign-in cancelled");
        }
    }

    pub async fn load_stored_auth(&self) -> Option<AuthData> {
        let auth = self.auth.load_stored_auth().await?;
        self.refresh_quietly().await;
        Some(auth)
    }

    pub async fn logout(&self) -> WidgetResult<()> {
        self.auth.logout().await?;
        self.todays_events.write().await.clear();
        self.scheduler.schedule_event_notifications(&[]);
        self.emit(WidgetEvent::EventsUpdated(Vec::new()));
        Ok(())
    }

    // Calendar

    pub async fn get_calendars(&self) -> WidgetResult<Vec<CalendarInfo>> {
        self.calendar.get_calendars().await
    }

    pub async fn get_events(&self, mut filter: EventFilter) -> WidgetResult<Vec<CalendarEvent>> {
        if filter.calendar_ids.as_ref().map_or(true, Vec::is_empty) {
            filter.calendar_ids = Some(self.configured_calendars().await);
        }
        self.calendar.get_events(filter).await
    }

    pub async fn get_todays_events(
        &self,
        calendar_ids: Option<Vec<String>>,
    ) -> WidgetResult<Vec<CalendarEvent>> {
        let ids = match calendar_ids {
            Some(ids) if !ids.is_empty() => ids,
            _ => self.configured_calendars().await,
        };
        self.calendar.get_todays_events(Some(ids)).await
    }

    pub async fn get_upcoming_events(
        &self,
        calendar_ids: Option<Vec<String>>,
        days: Option<i64>,
    ) -> WidgetResult<Vec<CalendarEvent>> {
        let (ids, default_days) = {
            let config = self.config.read().await;
            (config.calendar_ids.clone(), config.upcoming_days)
        };
        let ids = calendar_ids.filter(|ids| !ids.is_empty()).unwrap_or(ids);
        self.calendar
            .get_upcoming_events(Some(ids), days.unwrap_or(default_days))
            .await
    }

    pub async fn create_event(
        &self,
        calendar_id: &str,
        input: EventInput,
    ) -> WidgetResult<CalendarEvent> {
        let event = self.calendar.create_event(calendar_id, input).await?;
        self.refresh_quietly().await;
        Ok(event)
    }

    pub async fn update_event(
        &self,
        calendar_id: &str,
        event_id: &str,
        input: EventInput,
    ) -> WidgetResult<CalendarEvent> {
        let event = self.calendar.update_event(calendar_id, event_id, input).await?;
        self.refresh_quietly().await;
        Ok(event)
    }

    pub async fn delete_event(&self, calendar_id: &str, event_id: &str) -> WidgetResult<()> {
        self.calendar.delete_event(calendar_id, event_id).await?;
        self.refresh_quietly().await;
        Ok(())
    }

    /// Month view cells with their events
    pub async fn get_month(&self, year: i32, month: u32) -> WidgetResult<Vec<CalendarDay>> {
        let (time_min, time_max) = month_grid_bounds(year, month)?;
        let filter = EventFilter::between(time_min, time_max);
        let events = self.get_events(filter).await?;
        month_grid(year, month, Local::now().date_naive(), &events)
    }

    /// Reload today's events and re-arm reminders for them
    pub async fn refresh(&self) -> WidgetResult<Vec<CalendarEvent>> {
        let events = self.get_todays_events(None).await?;
        debug!("Loaded {} events for today", events.len());

        if self.config.read().await.notifications_enabled {
            self.scheduler.schedule_event_notifications(&events);
        }

        *self.todays_events.write().await = events.clone();
        self.emit(WidgetEvent::EventsUpdated(events.clone()));
        Ok(events)
    }

    async fn refresh_quietly(&self) {
        if let Err(e) = self.refresh().await {
            warn!("Failed to refresh today's events: {}", e);
        }
    }

    /// Refresh every `refresh_interval` seconds while signed in
    pub async fn run_refresh_loop(&self) {
        let seconds = self.config.read().await.refresh_interval.max(1);
        let mut interval = tokio::time::interval(Duration::from_secs(seconds));
        // the first tick completes immediately
        interval.tick().await;

        loop {
            interval.tick().await;
            if !self.auth.has_stored_tokens() {
                debug!("Not signed in, skipping refresh");
                continue;
            }
            match self.refresh().await {
                Ok(events) => info!("Periodic refresh: {} events today", events.len()),
                Err(e) => error!("Periodic refresh failed: {}", e),
            }
        }
    }

    // Notifications

    pub fn schedule_notifications(&self, events: &[CalendarEvent]) {
        self.scheduler.schedule_event_notifications(events);
    }

    pub fn show_notification(&self, title: &str, body: &str, urgency: Urgency) -> WidgetResult<()> {
        self.scheduler.show_notification(title, body, urgency)
    }

    // Window and tray

    pub async fn open_window(&self, hidden: bool) {
        let mut window = self.window.lock().await;
        window.create_window();
        if !hidden {
            window.show_window();
        }
    }

    pub async fn tray_menu(&self) -> Vec<MenuItem> {
        let window = self.window.lock().await;
        build_menu(&TrayState::of(&window, self.autostart.as_ref()))
    }

    pub async fn tray_action(&self, action: TrayAction) -> WidgetResult<TrayOutcome> {
        let outcome = {
            let mut window = self.window.lock().await;
            dispatch(action, &mut window, self.autostart.as_ref())?
        };

        match outcome {
            TrayOutcome::RefreshCalendar => {
                self.emit(WidgetEvent::RefreshCalendar);
                self.refresh_quietly().await;
            }
            TrayOutcome::Quit => self.emit(WidgetEvent::Quit),
            TrayOutcome::Handled => {}
        }
        Ok(outcome)
    }

    /// Window change reported by the shell
    pub async fn window_event(&self, kind: WindowEventKind, bounds: Option<Bounds>) {
        let mut window = self.window.lock().await;
        if let Some(bounds) = bounds {
            window.report_bounds(bounds);
        }
        match kind {
            WindowEventKind::Moved => window.on_moved(),
            WindowEventKind::Resized => window.on_resized(),
            WindowEventKind::Focus => window.report_focus(true),
            WindowEventKind::Close => window.on_close_requested(),
            WindowEventKind::Blur => {
                window.report_focus(false);
                drop(window);
                crate::components::window::on_blur(&self.window).await;
            }
        }
    }

    // UI settings

    pub async fn save_ui_settings(&self, settings: &serde_json::Value) -> WidgetResult<()> {
        if let Some(parent) = self.ui_settings.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.ui_settings, serde_json::to_vec_pretty(settings)?).await?;
        Ok(())
    }

    /// Saved UI settings, or `null` when nothing was saved
    pub async fn load_ui_settings(&self) -> WidgetResult<serde_json::Value> {
        match tokio::fs::read(&self.ui_settings).await {
            Ok(data) => Ok(serde_json::from_slice(&data)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(serde_json::Value::Null),
            Err(e) => Err(e.into()),
        }
    }

    /// Stop timers and the calendar actor, persist window state
    pub async fn shutdown(&self) {
        self.scheduler.destroy();
        self.window.lock().await.destroy();
        if let Err(e) = self.calendar.shutdown().await {
            error!("Error shutting down calendar actor: {:?}", e);
        }
        info!("Widget service shut down");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WindowEventKind {
    Moved,
    Resized,
    Focus,
    Blur,
    Close,
}

/// Platform name in the form the UI expects
pub fn platform() -> &'static str {
    match std::env::consts::OS {
        "macos" => "darwin",
        "windows" => "win32",
        other => other,
    }
}
