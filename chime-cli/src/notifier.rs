//! Desktop notifications via notify-rust.

use std::collections::HashMap;
use std::sync::Mutex;

use chime_core::error::{ChimeError, ChimeResult};
use chime_core::platform::{NotificationContent, Notifier};
use notify_rust::{Hint, Notification, NotificationHandle, Timeout, Urgency};

#[derive(Default)]
pub struct DesktopNotifier {
    handles: Mutex<HashMap<u32, NotificationHandle>>,
}

impl Notifier for DesktopNotifier {
    fn post(&self, id: u32, content: &NotificationContent) -> ChimeResult<()> {
        let mut notification = Notification::new();
        notification
            .appname("chime")
            .summary(&content.title)
            .body(&content.body)
            .icon("appointment-soon")
            .urgency(Urgency::Normal)
            // Reminders stay up until acted on.
            .timeout(Timeout::Never)
            .hint(Hint::Category("x-event.calendar".to_string()));

        if content.quiet {
            notification.hint(Hint::SuppressSound(true));
        }

        let mut handles = self.handles.lock().unwrap();
        if let Some(existing) = handles.get(&id) {
            // Reuse the server-side id so the post replaces, not stacks.
            notification.id(existing.id());
        }

        let handle = notification
            .show()
            .map_err(|e| ChimeError::Platform(format!("Could not post notification: {e}")))?;
        handles.insert(id, handle);
        Ok(())
    }

    fn cancel(&self, id: u32) -> ChimeResult<()> {
        if let Some(handle) = self.handles.lock().unwrap().remove(&id) {
            handle.close();
        }
        Ok(())
    }

    fn cancel_all(&self) -> ChimeResult<()> {
        let mut handles = self.handles.lock().unwrap();
        for (_, handle) in handles.drain() {
            handle.close();
        }
        Ok(())
    }
}
