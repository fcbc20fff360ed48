use crate::error::{notification_error, WidgetResult};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Mutex;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Low,
    #[default]
    Normal,
    Critical,
}

/// A notification ready to be shown
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub title: String,
    pub body: String,
    pub urgency: Urgency,
    /// Stays on screen until dismissed
    pub persistent: bool,
}

impl Notice {
    pub fn new(title: impl Into<String>, body: impl Into<String>, urgency: Urgency) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            urgency,
            persistent: false,
        }
    }

    pub fn persistent(mut self) -> Self {
        self.persistent = true;
        self
    }
}

/// Where notices end up
pub trait Notifier: Send + Sync {
    fn show(&self, notice: &Notice) -> WidgetResult<()>;

    /// Dismiss everything this notifier put on screen
    fn close_all(&self) {}
}

/// Handles kept for `close_all`; older ones are forgotten
pub const MAX_TRACKED_NOTIFICATIONS: usize = 32;

/// OS notifications through notify-rust
pub struct DesktopNotifier {
    app_name: String,
    #[cfg(all(unix, not(target_os = "macos")))]
    active: Mutex<VecDeque<notify_rust::NotificationHandle>>,
    #[cfg(not(all(unix, not(target_os = "macos"))))]
    active: Mutex<VecDeque<()>>,
}

impl DesktopNotifier {
    pub fn new(app_name: &str) -> Self {
        Self {
            app_name: app_name.to_string(),
            active: Mutex::new(VecDeque::new()),
        }
    }
}

/// Append `item`, dropping the oldest entries past `cap`. Returns how many were dropped.
#[cfg_attr(not(all(unix, not(target_os = "macos"))), allow(dead_code))]
fn push_bounded<T>(list: &mut VecDeque<T>, item: T, cap: usize) -> usize {
    list.push_back(item);
    let excess = list.len().saturating_sub(cap);
    list.drain(..excess);
    excess
}

impl Default for DesktopNotifier {
    fn default() -> Self {
        Self::new("CalDesk")
    }
}

impl Notifier for DesktopNotifier {
    fn show(&self, notice: &Notice) -> WidgetResult<()> {
        let mut notification = notify_rust::Notification::new();
        notification
            .appname(&self.app_name)
            .summary(&notice.title)
            .body(&notice.body);

        if notice.persistent {
            notification.timeout(notify_rust::Timeout::Never);
        }

        #[cfg(all(unix, not(target_os = "macos")))]
        {
            let urgency = match notice.urgency {
                Urgency::Low => notify_rust::Urgency::Low,
                Urgency::Normal => notify_rust::Urgency::Normal,
                Urgency::Critical => notify_rust::Urgency::Critical,
            };
            let handle = notification
                .urgency(urgency)
                .show()
                .map_err(|e| notification_error(&format!("Failed to show notification: {}", e)))?;
            if let Ok(mut active) = self.active.lock() {
                let dropped = push_bounded(&mut active, handle, MAX_TRACKED_NOTIFICATIONS);
                if dropped > 0 {
                    debug!("Stopped tracking {} old notification(s)", dropped);
                }
            }
        }

        #[cfg(not(all(unix, not(target_os = "macos"))))]
        {
            notification
                .show()
                .map_err(|e| notification_error(&format!("Failed to show notification: {}", e)))?;
        }

        debug!("Desktop notification displayed: {}", notice.title);
        Ok(())
    }

    fn close_all(&self) {
        let Ok(mut active) = self.active.lock() else {
            warn!("Notification list lock poisoned");
            return;
        };

        #[cfg(all(unix, not(target_os = "macos")))]
        for handle in active.drain(..) {
            handle.close();
        }

        #[cfg(not(all(unix, not(target_os = "macos"))))]
        active.clear();
    }
}

/// Drops every notice; used when notifications are turned off
#[derive(Debug, Default)]
pub struct SilentNotifier;

impl Notifier for SilentNotifier {
    fn show(&self, notice: &Notice) -> WidgetResult<()> {
        debug!("Notifications disabled, dropping: {}", notice.title);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracked_list_keeps_the_newest_entries() {
        let mut list = VecDeque::new();
        for n in 0..5 {
            assert_eq!(push_bounded(&mut list, n, 3), usize::from(n >= 3));
        }
        assert_eq!(list, VecDeque::from(vec![2, 3, 4]));
    }

    #[test]
    fn tracked_list_never_exceeds_the_cap() {
        let mut list = VecDeque::new();
        for n in 0..(MAX_TRACKED_NOTIFICATIONS * 3) {
            push_bounded(&mut list, n, MAX_TRACKED_NOTIFICATIONS);
        }
        assert_eq!(list.len(), MAX_TRACKED_NOTIFICATIONS);
        assert_eq!(list.front(), Some(&(MAX_TRACKED_NOTIFICATIONS * 2)));
    }
}
