use super::actor::{GoogleCalendarActor, GoogleCalendarActorHandle};
use super::api::CalendarApi;
use super::models::{CalendarEvent, CalendarInfo, EventFilter, EventInput};
use crate::error::WidgetResult;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Handle for interacting with the Google Calendar actor
#[derive(Clone)]
pub struct GoogleCalendarHandle {
    actor_handle: GoogleCalendarActorHandle,
    _actor_task: Arc<JoinHandle<()>>,
}

impl GoogleCalendarHandle {
    /// Create a new GoogleCalendarHandle and spawn the actor
    pub fn new(api: CalendarApi) -> Self {
        // Create the actor and get its handle
        let (mut actor, handle) = GoogleCalendarActor::new(api);

        // Spawn a task to run the actor
        let actor_task = tokio::spawn(async move {
            actor.run().await;
        });

        Self {
            actor_handle: handle,
            _actor_task: Arc::new(actor_task),
        }
    }

    pub async fn get_calendars(&self) -> WidgetResult<Vec<CalendarInfo>> {
        self.actor_handle.get_calendars().await
    }

    pub async fn get_events(&self, filter: EventFilter) -> WidgetResult<Vec<CalendarEvent>> {
        self.actor_handle.get_events(filter).await
    }

    /// Events between local midnight today and tomorrow
    pub async fn get_todays_events(
        &self,
        calendar_ids: Option<Vec<String>>,
    ) -> WidgetResult<Vec<CalendarEvent>> {
        self.actor_handle.get_todays_events(calendar_ids).await
    }

    /// Events from now until `days` days ahead
    pub async fn get_upcoming_events(
        &self,
        calendar_ids: Option<Vec<String>>,
        days: i64,
    ) -> WidgetResult<Vec<CalendarEvent>> {
        self.actor_handle.get_upcoming_events(calendar_ids, days).await
    }

    pub async fn create_event(
        &self,
        calendar_id: &str,
        input: EventInput,
    ) -> WidgetResult<CalendarEvent> {
        self.actor_handle
            .create_event(calendar_id.to_string(), input)
            .await
    }

    pub async fn update_event(
        &self,
        calendar_id: &str,
        event_id: &str,
        input: EventInput,
    ) -> WidgetResult<CalendarEvent> {
        self.actor_handle
            .update_event(calendar_id.to_string(), event_id.to_string(), input)
            .await
    }

    pub async fn delete_event(&self, calendar_id: &str, event_id: &str) -> WidgetResult<()> {
        self.actor_handle
            .delete_event(calendar_id.to_string(), event_id.to_string())
            .await
    }

    /// Shutdown the actor
    pub async fn shutdown(&self) -> WidgetResult<()> {
        self.actor_handle.shutdown().await
    }
}
