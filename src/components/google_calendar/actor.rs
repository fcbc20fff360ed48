use super::api::CalendarApi;
use super::models::{CalendarEvent, CalendarInfo, EventFilter, EventInput};
use super::time::{day_bounds, upcoming_range};
use crate::error::{google_calendar_error, WidgetResult};
use chrono::{Local, Utc};
use tokio::sync::mpsc;
use tracing::info;

type Reply<T> = mpsc::Sender<WidgetResult<T>>;

/// The Google Calendar actor that processes messages
pub struct GoogleCalendarActor {
    api: CalendarApi,
    command_rx: mpsc::Receiver<GoogleCalendarCommand>,
}

/// Commands that can be sent to the Google Calendar actor
pub enum GoogleCalendarCommand {
    GetCalendars(Reply<Vec<CalendarInfo>>),
    GetEvents(EventFilter, Reply<Vec<CalendarEvent>>),
    GetTodaysEvents(Option<Vec<String>>, Reply<Vec<CalendarEvent>>),
    GetUpcomingEvents(Option<Vec<String>>, i64, Reply<Vec<CalendarEvent>>),
    CreateEvent(String, EventInput, Reply<CalendarEvent>),
    UpdateEvent(String, String, EventInput, Reply<CalendarEvent>),
    DeleteEvent(String, String, Reply<()>),
    Shutdown,
}

/// Handle for communicating with the Google Calendar actor
#[derive(Clone)]
pub struct GoogleCalendarActorHandle {
    command_tx: mpsc::Sender<GoogleCalendarCommand>,
}

impl GoogleCalendarActorHandle {
    async fn call<T>(
        &self,
        make: impl FnOnce(Reply<T>) -> GoogleCalendarCommand,
    ) -> WidgetResult<T> {
        let (response_tx, mut response_rx) = mpsc::channel(1);
        self.command_tx
            .send(make(response_tx))
            .await
            .map_err(|e| google_calendar_error(&format!("Actor mailbox error: {}", e)))?;

        response_rx
            .recv()
            .await
            .ok_or_else(|| google_calendar_error("Response channel closed"))?
    }

    pub async fn get_calendars(&self) -> WidgetResult<Vec<CalendarInfo>> {
        self.call(GoogleCalendarCommand::GetCalendars).await
    }

    pub async fn get_events(&self, filter: EventFilter) -> WidgetResult<Vec<CalendarEvent>> {
        self.call(|tx| GoogleCalendarCommand::GetEvents(filter, tx)).await
    }

    pub async fn get_todays_events(
        &self,
        calendar_ids: Option<Vec<String>>,
    ) -> WidgetResult<Vec<CalendarEvent>> {
        self.call(|tx| GoogleCalendarCommand::GetTodaysEvents(calendar_ids, tx))
            .await
    }

    pub async fn get_upcoming_events(
        &self,
        calendar_ids: Option<Vec<String>>,
        days: i64,
    ) -> WidgetResult<Vec<CalendarEvent>> {
        self.call(|tx| GoogleCalendarCommand::GetUpcomingEvents(calendar_ids, days, tx))
            .await
    }

    pub async fn create_event(
        &self,
        calendar_id: String,
        input: EventInput,
    ) -> WidgetResult<CalendarEvent> {
        self.call(|tx| GoogleCalendarCommand::CreateEvent(calendar_id, input, tx))
            .await
    }

    pub async fn update_event(
        &self,
        calendar_id: String,
        event_id: String,
        input: EventInput,
    ) -> WidgetResult<CalendarEvent> {
        self.call(|tx| GoogleCalendarCommand::UpdateEvent(calendar_id, event_id, input, tx))
            .await
    }

    pub async fn delete_event(&self, calendar_id: String, event_id: String) -> WidgetResult<()> {
        self.call(|tx| GoogleCalendarCommand::DeleteEvent(calendar_id, event_id, tx))
            .await
    }

    /// Shutdown the actor
    pub async fn shutdown(&self) -> WidgetResult<()> {
        let _ = self.command_tx.send(GoogleCalendarCommand::Shutdown).await;
        Ok(())
    }
}

impl GoogleCalendarActor {
    /// Create a new actor and return its handle
    pub fn new(api: CalendarApi) -> (Self, GoogleCalendarActorHandle) {
        let (command_tx, command_rx) = mpsc::channel(32);

        let actor = Self { api, command_rx };
        let handle = GoogleCalendarActorHandle { command_tx };

        (actor, handle)
    }

    /// Start the actor's processing loop. Commands run one at a time, so a
    /// delete and a refresh issued together never interleave.
    pub async fn run(&mut self) {
        info!("Google Calendar actor started");

        while let Some(cmd) = self.command_rx.recv().await {
            match cmd {
                GoogleCalendarCommand::GetCalendars(tx) => {
                    let _ = tx.send(self.api.get_calendars().await).await;
                }
                GoogleCalendarCommand::GetEvents(filter, tx) => {
                    let _ = tx.send(self.api.get_events(&filter).await).await;
                }
                GoogleCalendarCommand::GetTodaysEvents(calendar_ids, tx) => {
                    let _ = tx.send(self.todays_events(calendar_ids).await).await;
                }
                GoogleCalendarCommand::GetUpcomingEvents(calendar_ids, days, tx) => {
                    let _ = tx.send(self.upcoming_events(calendar_ids, days).await).await;
                }
                GoogleCalendarCommand::CreateEvent(calendar_id, input, tx) => {
                    let _ = tx.send(self.api.create_event(&calendar_id, &input).await).await;
                }
                GoogleCalendarCommand::UpdateEvent(calendar_id, event_id, input, tx) => {
                    let result = self.api.update_event(&calendar_id, &event_id, &input).await;
                    let _ = tx.send(result).await;
                }
                GoogleCalendarCommand::DeleteEvent(calendar_id, event_id, tx) => {
                    let _ = tx.send(self.api.delete_event(&calendar_id, &event_id).await).await;
                }
                GoogleCalendarCommand::Shutdown => {
                    info!("Google Calendar actor shutting down");
                    break;
                }
            }
        }

        info!("Google Calendar actor shut down");
    }

    async fn upcoming_events(
        &self,
        calendar_ids: Option<Vec<String>>,
        days: i64,
    ) -> WidgetResult<Vec<CalendarEvent>> {
        let (time_min, time_max) = upcoming_range(Utc::now(), days)?;
        let filter = EventFilter::between(time_min, time_max).with_calendars(calendar_ids);
        self.api.get_events(&filter).await
    }

    async fn todays_events(
        &self,
        calendar_ids: Option<Vec<String>>,
    ) -> WidgetResult<Vec<CalendarEvent>> {
        let (time_min, time_max) = day_bounds(Local::now().date_naive())?;
        let filter = EventFilter::between(time_min, time_max).with_calendars(calendar_ids);
        self.api.get_events(&filter).await
    }
}
