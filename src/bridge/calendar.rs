use super::protocol::params;
use crate::components::google_calendar::{CalendarEvent, EventFilter, EventInput};
use crate::components::notifications::Urgency;
use crate::components::window::WindowBackend;
use crate::error::WidgetResult;
use crate::service::WidgetService;
use serde::Deserialize;
use serde_json::Value;

fn primary() -> String {
    "primary".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CalendarsParams {
    #[serde(default)]
    calendar_ids: Option<Vec<String>>,
    #[serde(default)]
    days: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WriteParams {
    #[serde(default = "primary")]
    calendar_id: String,
    #[serde(default)]
    event_id: Option<String>,
    #[serde(default)]
    event: EventInput,
}

impl WriteParams {
    fn event_id(&self) -> WidgetResult<&str> {
        self.event_id
            .as_deref()
            .ok_or_else(|| crate::error::google_calendar_error("eventId is required"))
    }
}

#[derive(Debug, Deserialize)]
struct MonthParams {
    year: i32,
    month: u32,
}

#[derive(Debug, Deserialize)]
struct ScheduleParams {
    #[serde(default)]
    events: Vec<CalendarEvent>,
}

#[derive(Debug, Deserialize)]
struct NotificationParams {
    title: String,
    #[serde(default)]
    body: String,
    #[serde(default)]
    urgency: Urgency,
}

pub async fn get_calendars<B: WindowBackend + 'static>(service: &WidgetService<B>) -> WidgetResult<Value> {
    Ok(serde_json::to_value(service.get_calendars().await?)?)
}

pub async fn get_events<B: WindowBackend + 'static>(
    service: &WidgetService<B>,
    raw: Value,
) -> WidgetResult<Value> {
    let filter: EventFilter = params(raw)?;
    Ok(serde_json::to_value(service.get_events(filter).await?)?)
}

pub async fn get_todays_events<B: WindowBackend + 'static>(
    service: &WidgetService<B>,
    raw: Value,
) -> WidgetResult<Value> {
    let p: CalendarsParams = params(raw)?;
    Ok(serde_json::to_value(service.get_todays_events(p.calendar_ids).await?)?)
}

pub async fn get_upcoming_events<B: WindowBackend + 'static>(
    service: &WidgetService<B>,
    raw: Value,
) -> WidgetResult<Value> {
    let p: CalendarsParams = params(raw)?;
    let events = service.get_upcoming_events(p.calendar_ids, p.days).await?;
    Ok(serde_json::to_value(events)?)
}

pub async fn create_event<B: WindowBackend + 'static>(
    service: &WidgetService<B>,
    raw: Value,
) -> WidgetResult<Value> {
    let p: WriteParams = params(raw)?;
    Ok(serde_json::to_value(service.create_event(&p.calendar_id, p.event).await?)?)
}

pub async fn update_event<B: WindowBackend + 'static>(
    service: &WidgetService<B>,
    raw: Value,
) -> WidgetResult<Value> {
    let p: WriteParams = params(raw)?;
    let event_id = p.event_id()?.to_string();
    let event = service.update_event(&p.calendar_id, &event_id, p.event).await?;
    Ok(serde_json::to_value(event)?)
}

pub async fn delete_event<B: WindowBackend + 'static>(
    service: &WidgetService<B>,
    raw: Value,
) -> WidgetResult<Value> {
    let p: WriteParams = params(raw)?;
    service.delete_event(&p.calendar_id, p.event_id()?).await?;
    Ok(Value::Null)
}

pub async fn get_month<B: WindowBackend + 'static>(
    service: &WidgetService<B>,
    raw: Value,
) -> WidgetResult<Value> {
    let p: MonthParams = params(raw)?;
    Ok(serde_json::to_value(service.get_month(p.year, p.month).await?)?)
}

pub fn schedule_notifications<B: WindowBackend + 'static>(
    service: &WidgetService<B>,
    raw: Value,
) -> WidgetResult<Value> {
    let p: ScheduleParams = params(raw)?;
    service.schedule_notifications(&p.events);
    Ok(Value::Null)
}

pub fn show_notification<B: WindowBackend + 'static>(
    service: &WidgetService<B>,
    raw: Value,
) -> WidgetResult<Value> {
    let p: NotificationParams = params(raw)?;
    service.show_notification(&p.title, &p.body, p.urgency)?;
    Ok(Value::Null)
}
