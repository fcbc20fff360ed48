use super::notifier::{Notice, Notifier, Urgency};
use crate::components::google_calendar::CalendarEvent;
use crate::error::WidgetResult;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Minutes before start at which a reminder fires, with its label
pub const REMINDER_OFFSETS: [(i64, &str); 3] = [(15, "15 minutes"), (5, "5 minutes"), (1, "1 minute")];

pub const START_TITLE: &str = "Event Starting Now";

/// A reminder computed for one event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reminder {
    pub key: String,
    pub fire_at: DateTime<Utc>,
    pub notice: Notice,
}

fn reminder_body(event: &CalendarEvent) -> String {
    match &event.location {
        Some(location) if !location.is_empty() => format!("{} at {}", event.summary, location),
        _ => event.summary.clone(),
    }
}

/// Reminders for `event` that are still ahead of `now`. All-day events get none.
pub fn plan_reminders(event: &CalendarEvent, now: DateTime<Utc>) -> Vec<Reminder> {
    let Some(start) = event.start.date_time_utc() else {
        return Vec::new();
    };
    let body = reminder_body(event);

    let mut reminders: Vec<Reminder> = REMINDER_OFFSETS
        .iter()
        .map(|(minutes, label)| Reminder {
            key: format!("{}-{}min", event.id, minutes),
            fire_at: start - Duration::minutes(*minutes),
            notice: Notice::new(format!("Event in {}", label), body.clone(), Urgency::Normal),
        })
        .collect();

    reminders.push(Reminder {
        key: format!("{}-start", event.id),
        fire_at: start,
        notice: Notice::new(START_TITLE, body, Urgency::Critical).persistent(),
    });

    reminders.retain(|reminder| reminder.fire_at > now);
    reminders
}

struct Timer {
    generation: u64,
    task: JoinHandle<()>,
}

/// Arms one tokio timer per pending reminder
#[derive(Clone)]
pub struct NotificationScheduler {
    notifier: Arc<dyn Notifier>,
    timers: Arc<Mutex<HashMap<String, Timer>>>,
    generation: Arc<AtomicU64>,
}

impl NotificationScheduler {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self {
            notifier,
            timers: Arc::new(Mutex::new(HashMap::new())),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    fn lock_timers(&self) -> MutexGuard<'_, HashMap<String, Timer>> {
        self.timers.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Replace all pending reminders with the ones for `events`
    pub fn schedule_event_notifications(&self, events: &[CalendarEvent]) {
        self.clear_timers();

        let now = Utc::now();
        let reminders: Vec<Reminder> = events
            .iter()
            .flat_map(|event| plan_reminders(event, now))
            .collect();

        let mut timers = self.lock_timers();
        for reminder in reminders {
            let delay = (reminder.fire_at - now).to_std().unwrap_or_default();
            let generation = self.generation.fetch_add(1, Ordering::SeqCst);
            let notifier = Arc::clone(&self.notifier);
            let registry = Arc::clone(&self.timers);
            let key = reminder.key.clone();

            let task = tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                if let Err(e) = notifier.show(&reminder.notice) {
                    error!("Failed to show reminder {}: {}", reminder.key, e);
                }
                let mut timers = registry.lock().unwrap_or_else(|p| p.into_inner());
                if timers.get(&reminder.key).map(|t| t.generation) == Some(generation) {
                    timers.remove(&reminder.key);
                }
            });

            timers.insert(key, Timer { generation, task });
        }

        info!("Scheduled {} event reminders", timers.len());
    }

    /// Keys of the reminders still waiting to fire
    pub fn pending(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.lock_timers().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn show_notification(&self, title: &str, body: &str, urgency: Urgency) -> WidgetResult<()> {
        self.notifier.show(&Notice::new(title, body, urgency))
    }

    fn clear_timers(&self) {
        let mut timers = self.lock_timers();
        for (_, timer) in timers.drain() {
            timer.task.abort();
        }
    }

    pub fn clear_all_notifications(&self) {
        self.notifier.close_all();
    }

    /// Cancel every timer and dismiss what is on screen
    pub fn destroy(&self) {
        self.clear_timers();
        self.clear_all_notifications();
        debug!("Notification scheduler destroyed");
    }
}
