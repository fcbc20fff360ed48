use crate::error::{google_calendar_error, WidgetResult};
use chrono::{DateTime, NaiveDate, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Shown for events Google returns without a title
pub const UNTITLED_EVENT: &str = "(No title)";

/// One boundary of an event: all-day `date` or timed `dateTime`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventTime {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

impl EventTime {
    pub fn all_day(date: NaiveDate) -> Self {
        Self {
            date: Some(date.format("%Y-%m-%d").to_string()),
            date_time: None,
            time_zone: None,
        }
    }

    pub fn timed<Tz: TimeZone>(at: &DateTime<Tz>, time_zone: Option<&str>) -> Self
    where
        Tz::Offset: std::fmt::Display,
    {
        Self {
            date: None,
            date_time: Some(at.to_rfc3339_opts(SecondsFormat::Secs, true)),
            time_zone: time_zone.map(str::to_string),
        }
    }

    pub fn is_all_day(&self) -> bool {
        self.date_time.is_none() && self.date.is_some()
    }

    /// Exactly one of `date` / `dateTime` must be set
    pub fn validate(&self) -> WidgetResult<()> {
        match (&self.date, &self.date_time) {
            (Some(_), Some(_)) => Err(google_calendar_error(
                "Event time must not set both date and dateTime",
            )),
            (None, None) => Err(google_calendar_error(
                "Event time must set either date or dateTime",
            )),
            _ => Ok(()),
        }
    }

    /// Timed boundary as an instant
    pub fn date_time_utc(&self) -> Option<DateTime<Utc>> {
        let raw = self.date_time.as_deref()?;
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// Instant used for ordering; all-day dates count from UTC midnight
    pub fn sort_key(&self) -> Option<DateTime<Utc>> {
        if self.date_time.is_some() {
            return self.date_time_utc();
        }
        let date = NaiveDate::parse_from_str(self.date.as_deref()?, "%Y-%m-%d").ok()?;
        Some(date.and_hms_opt(0, 0, 0)?.and_utc())
    }

    /// `YYYY-MM-DD` prefix of whichever field is set
    pub fn iso_date(&self) -> Option<&str> {
        let raw = self.date_time.as_deref().or(self.date.as_deref())?;
        raw.get(..10)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventCreator {
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResponseStatus {
    #[default]
    NeedsAction,
    Declined,
    Tentative,
    Accepted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attendee {
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default)]
    pub response_status: ResponseStatus,
}

/// Calendar event as used by the widget; field names follow the API
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub start: EventTime,
    #[serde(default)]
    pub end: EventTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator: Option<EventCreator>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attendees: Option<Vec<Attendee>>,
}

impl CalendarEvent {
    /// Fill in the placeholder title
    pub fn normalized(mut self) -> Self {
        if self.summary.trim().is_empty() {
            self.summary = UNTITLED_EVENT.to_string();
        }
        self
    }

    /// Start instant for timed events; `None` for all-day ones
    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.start.date_time_utc()
    }
}

/// Writable part of an event, sent on create and update
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<EventTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<EventTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attendees: Option<Vec<Attendee>>,
}

impl EventInput {
    /// Google needs both boundaries, each with exactly one of date/dateTime
    pub fn validate(&self) -> WidgetResult<()> {
        let start = self
            .start
            .as_ref()
            .ok_or_else(|| google_calendar_error("Event start is required"))?;
        let end = self
            .end
            .as_ref()
            .ok_or_else(|| google_calendar_error("Event end is required"))?;
        start.validate()?;
        end.validate()?;

        if start.is_all_day() != end.is_all_day() {
            return Err(google_calendar_error(
                "Event start and end must both be all-day or both be timed",
            ));
        }
        if let (Some(s), Some(e)) = (start.sort_key(), end.sort_key()) {
            if e < s {
                return Err(google_calendar_error("Event end is before its start"));
            }
        }
        Ok(())
    }
}

impl From<&CalendarEvent> for EventInput {
    fn from(event: &CalendarEvent) -> Self {
        Self {
            summary: Some(event.summary.clone()),
            description: event.description.clone(),
            start: Some(event.start.clone()),
            end: Some(event.end.clone()),
            location: event.location.clone(),
            attendees: event.attendees.clone(),
        }
    }
}

/// Calendar list entry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarInfo {
    pub id: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreground_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected: Option<bool>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OrderBy {
    #[default]
    StartTime,
    Updated,
}

impl OrderBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderBy::StartTime => "startTime",
            OrderBy::Updated => "updated",
        }
    }
}

/// Query for listing events; unset fields take the listing defaults
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventFilter {
    #[serde(default)]
    pub time_min: Option<DateTime<Utc>>,
    #[serde(default)]
    pub time_max: Option<DateTime<Utc>>,
    #[serde(default)]
    pub calendar_ids: Option<Vec<String>>,
    #[serde(default)]
    pub show_deleted: Option<bool>,
    #[serde(default)]
    pub single_events: Option<bool>,
    #[serde(default)]
    pub order_by: Option<OrderBy>,
}

impl EventFilter {
    pub fn between(time_min: DateTime<Utc>, time_max: DateTime<Utc>) -> Self {
        Self {
            time_min: Some(time_min),
            time_max: Some(time_max),
            ..Default::default()
        }
    }

    pub fn with_calendars(mut self, calendar_ids: Option<Vec<String>>) -> Self {
        self.calendar_ids = calendar_ids;
        self
    }
}
