mod notifier;
mod scheduler;

pub use notifier::{DesktopNotifier, Notice, Notifier, SilentNotifier, Urgency};
pub use scheduler::{plan_reminders, NotificationScheduler, Reminder, REMINDER_OFFSETS};
