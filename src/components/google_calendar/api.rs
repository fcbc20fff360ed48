use super::models::{CalendarEvent, CalendarInfo, EventFilter, EventInput, OrderBy};
use super::time::{days_after, sort_by_start};
use crate::components::google_auth::TokenManager;
use crate::error::{google_calendar_error, WidgetResult};
use chrono::{SecondsFormat, Utc};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

/// Calendar API v3 root
pub const DEFAULT_API_BASE: &str = "https://www.googleapis.com/calendar/v3";

/// Page size for event listings
const MAX_RESULTS: &str = "100";

/// Default listing window when the filter leaves `timeMax` open
const DEFAULT_WINDOW_DAYS: i64 = 30;

#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

/// REST client for the calendar endpoints the widget uses
#[derive(Debug, Clone)]
pub struct CalendarApi {
    base: String,
    client: Client,
    tokens: TokenManager,
}

impl CalendarApi {
    pub fn new(tokens: TokenManager) -> Self {
        Self::with_base(tokens, DEFAULT_API_BASE)
    }

    pub fn with_base(tokens: TokenManager, base: &str) -> Self {
        Self {
            base: base.trim_end_matches('/').to_string(),
            client: Client::new(),
            tokens,
        }
    }

    fn url(&self, segments: &[&str]) -> WidgetResult<Url> {
        let mut url = Url::parse(&self.base)?;
        url.path_segments_mut()
            .map_err(|_| google_calendar_error("Calendar API base cannot carry a path"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn request(&self, method: Method, url: Url) -> WidgetResult<RequestBuilder> {
        let access_token = self.tokens.get_token().await?;
        Ok(self.client.request(method, url).bearer_auth(access_token))
    }

    async fn send(builder: RequestBuilder, context: &str) -> WidgetResult<Response> {
        let response = builder
            .send()
            .await
            .map_err(|e| google_calendar_error(&format!("{}: {}", context, e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Could not read error response".to_string());
            return Err(google_calendar_error(&format!(
                "{}: HTTP {} - {}",
                context, status, error_body
            )));
        }

        Ok(response)
    }

    async fn json<T: DeserializeOwned>(response: Response, context: &str) -> WidgetResult<T> {
        response
            .json::<T>()
            .await
            .map_err(|e| google_calendar_error(&format!("{}: invalid response: {}", context, e)))
    }

    /// Calendars in the user's calendar list
    pub async fn get_calendars(&self) -> WidgetResult<Vec<CalendarInfo>> {
        let context = "Failed to fetch calendars";
        let url = self.url(&["users", "me", "calendarList"])?;
        let response = Self::send(self.request(Method::GET, url).await?, context).await?;
        let list: ListResponse<CalendarInfo> = Self::json(response, context).await?;
        Ok(list.items)
    }

    async fn list_calendar_events(
        &self,
        calendar_id: &str,
        filter: &EventFilter,
    ) -> WidgetResult<Vec<CalendarEvent>> {
        let context = "Failed to fetch events";
        let now = Utc::now();
        let time_min = filter.time_min.unwrap_or(now);
        let time_max = match filter.time_max {
            Some(time_max) => time_max,
            None => days_after(now, DEFAULT_WINDOW_DAYS)?,
        };

        let mut url = self.url(&["calendars", calendar_id, "events"])?;
        url.query_pairs_mut()
            .append_pair("timeMin", &time_min.to_rfc3339_opts(SecondsFormat::Millis, true))
            .append_pair("timeMax", &time_max.to_rfc3339_opts(SecondsFormat::Millis, true))
            .append_pair("showDeleted", &filter.show_deleted.unwrap_or(false).to_string())
            .append_pair("singleEvents", &filter.single_events.unwrap_or(true).to_string())
            .append_pair("orderBy", filter.order_by.unwrap_or(OrderBy::StartTime).as_str())
            .append_pair("maxResults", MAX_RESULTS);

        let response = Self::send(self.request(Method::GET, url).await?, context).await?;
        let list: ListResponse<CalendarEvent> = Self::json(response, context).await?;
        Ok(list.items.into_iter().map(CalendarEvent::normalized).collect())
    }

    /// Events from every requested calendar, merged and sorted by start.
    /// A calendar that fails is logged and skipped.
    pub async fn get_events(&self, filter: &EventFilter) -> WidgetResult<Vec<CalendarEvent>> {
        // fail fast when signed out instead of logging one error per calendar
        self.tokens.get_token().await?;

        let calendar_ids = filter
            .calendar_ids
            .clone()
            .filter(|ids| !ids.is_empty())
            .unwrap_or_else(|| vec!["primary".to_string()]);

        let mut all_events = Vec::new();
        for calendar_id in &calendar_ids {
            match self.list_calendar_events(calendar_id, filter).await {
                Ok(events) => {
                    debug!("Fetched {} events from {}", events.len(), calendar_id);
                    all_events.extend(events);
                }
                Err(e) => warn!("Failed to fetch events from calendar {}: {}", calendar_id, e),
            }
        }

        sort_by_start(&mut all_events);
        Ok(all_events)
    }

    pub async fn create_event(
        &self,
        calendar_id: &str,
        input: &EventInput,
    ) -> WidgetResult<CalendarEvent> {
        let context = "Failed to create event";
        input.validate()?;

        let url = self.url(&["calendars", calendar_id, "events"])?;
        let builder = self.request(Method::POST, url).await?.json(input);
        let response = Self::send(builder, context).await?;
        Ok(Self::json::<CalendarEvent>(response, context).await?.normalized())
    }

    pub async fn update_event(
        &self,
        calendar_id: &str,
        event_id: &str,
        input: &EventInput,
    ) -> WidgetResult<CalendarEvent> {
        let context = "Failed to update event";
        input.validate()?;

        let url = self.url(&["calendars", calendar_id, "events", event_id])?;
        let builder = self.request(Method::PUT, url).await?.json(input);
        let response = Self::send(builder, context).await?;
        Ok(Self::json::<CalendarEvent>(response, context).await?.normalized())
    }

    pub async fn delete_event(&self, calendar_id: &str, event_id: &str) -> WidgetResult<()> {
        let url = self.url(&["calendars", calendar_id, "events", event_id])?;
        Self::send(self.request(Method::DELETE, url).await?, "Failed to delete event").await?;
        Ok(())
    }
}
