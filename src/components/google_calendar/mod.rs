mod actor;
pub mod api;
mod handle;
pub mod models;
pub mod time;

pub use api::CalendarApi;
pub use handle::GoogleCalendarHandle;
pub use models::{
    Attendee, CalendarEvent, CalendarInfo, EventFilter, EventInput, EventTime, ResponseStatus,
};
pub use time::CalendarDay;
