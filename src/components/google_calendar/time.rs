use super::models::CalendarEvent;
use crate::error::{google_calendar_error, WidgetResult};
use chrono::{DateTime, Datelike, Duration, Local, NaiveDate, TimeDelta, TimeZone, Utc};
use serde::Serialize;

/// Cells in the month view: six full weeks
pub const MONTH_GRID_CELLS: usize = 42;

/// Local midnight as an instant; skips forward over a DST gap
fn local_midnight(date: NaiveDate) -> WidgetResult<DateTime<Utc>> {
    let naive = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| google_calendar_error("Failed to create datetime"))?;

    match Local.from_local_datetime(&naive) {
        chrono::LocalResult::Single(dt) => Ok(dt.with_timezone(&Utc)),
        chrono::LocalResult::Ambiguous(earliest, _) => Ok(earliest.with_timezone(&Utc)),
        chrono::LocalResult::None => Local
            .from_local_datetime(&(naive + Duration::hours(1)))
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
            .ok_or_else(|| google_calendar_error("Invalid local time")),
    }
}

/// Start of `date` and start of the following day, local time
pub fn day_bounds(date: NaiveDate) -> WidgetResult<(DateTime<Utc>, DateTime<Utc>)> {
    let next = date
        .succ_opt()
        .ok_or_else(|| google_calendar_error("Date out of range"))?;
    Ok((local_midnight(date)?, local_midnight(next)?))
}

/// Longest look-ahead accepted for upcoming events
pub const MAX_UPCOMING_DAYS: i64 = 3660;

/// `days` days after `now`; fails on a negative or absurd span
pub fn days_after(now: DateTime<Utc>, days: i64) -> WidgetResult<DateTime<Utc>> {
    if !(0..=MAX_UPCOMING_DAYS).contains(&days) {
        return Err(google_calendar_error(&format!(
            "Days must be between 0 and {}, got {}",
            MAX_UPCOMING_DAYS, days
        )));
    }
    TimeDelta::try_days(days)
        .and_then(|span| now.checked_add_signed(span))
        .ok_or_else(|| google_calendar_error("Date out of range"))
}

/// From `now` to `days` days later
pub fn upcoming_range(now: DateTime<Utc>, days: i64) -> WidgetResult<(DateTime<Utc>, DateTime<Utc>)> {
    Ok((now, days_after(now, days)?))
}

/// Events whose start falls on `date`, compared on the ISO date prefix
pub fn events_on_day<'a>(events: &'a [CalendarEvent], date: NaiveDate) -> Vec<&'a CalendarEvent> {
    let wanted = date.format("%Y-%m-%d").to_string();
    events
        .iter()
        .filter(|event| event.start.iso_date() == Some(wanted.as_str()))
        .collect()
}

/// Order events by start; unparseable starts go last
pub fn sort_by_start(events: &mut [CalendarEvent]) {
    events.sort_by_key(|event| (event.start.sort_key().is_none(), event.start.sort_key()));
}

/// One cell of the month view
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarDay {
    pub date: NaiveDate,
    pub is_current_month: bool,
    pub is_today: bool,
    pub events: Vec<CalendarEvent>,
}

/// Six Sunday-first weeks covering `month` of `year`
pub fn month_grid(
    year: i32,
    month: u32,
    today: NaiveDate,
    events: &[CalendarEvent],
) -> WidgetResult<Vec<CalendarDay>> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| google_calendar_error(&format!("Invalid month {}-{}", year, month)))?;
    let offset = first.weekday().num_days_from_sunday() as i64;
    let start = first - Duration::days(offset);

    Ok((0..MONTH_GRID_CELLS as i64)
        .map(|i| {
            let date = start + Duration::days(i);
            CalendarDay {
                date,
                is_current_month: date.month() == month && date.year() == year,
                is_today: date == today,
                events: events_on_day(events, date).into_iter().cloned().collect(),
            }
        })
        .collect())
}

/// Range of instants covered by a month grid, for fetching its events
pub fn month_grid_bounds(year: i32, month: u32) -> WidgetResult<(DateTime<Utc>, DateTime<Utc>)> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| google_calendar_error(&format!("Invalid month {}-{}", year, month)))?;
    let start = first - Duration::days(first.weekday().num_days_from_sunday() as i64);
    let end = start + Duration::days(MONTH_GRID_CELLS as i64);
    Ok((local_midnight(start)?, local_midnight(end)?))
}
