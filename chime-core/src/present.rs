//! Notification presentation.
//!
//! Maps event-store rows to user-visible notifications. Each alert walks
//! `Hidden -> Shown -> Collapsed`; snoozing sends it back to `Hidden` and
//! dismissal removes it. Only the most recently surfaced alerts keep
//! their own notification — everything older folds into one aggregate
//! summary so the shade never fills up.

use std::sync::Arc;

use tracing::debug;

use crate::alert::{ActiveAlert, DisplayStatus};
use crate::clock::Clock;
use crate::config::ChimeConfig;
use crate::error::ChimeResult;
use crate::platform::{NotificationContent, Notifier};
use crate::quiet::QuietWindow;
use crate::store::{AlertStore, SUMMARY_NOTIFICATION_ID};

/// One presentation pass over the event store.
#[derive(Debug, Clone, Copy, Default)]
pub struct RefreshContext {
    /// Re-post everything without sound, e.g. after a restart.
    pub force_repost: bool,
    /// A periodic reminder fired: already-shown alerts re-post with sound.
    pub renotify: bool,
    /// Quiet window at the time of the pass; suppresses sound for all but
    /// the primary alert.
    pub quiet: QuietWindow,
}

pub struct Presenter {
    notifier: Arc<dyn Notifier>,
    store: Arc<AlertStore>,
    clock: Arc<dyn Clock>,
    config: Arc<ChimeConfig>,
}

impl Presenter {
    pub fn new(
        notifier: Arc<dyn Notifier>,
        store: Arc<AlertStore>,
        clock: Arc<dyn Clock>,
        config: Arc<ChimeConfig>,
    ) -> Self {
        Presenter { notifier, store, clock, config }
    }

    /// Bring the notification surface in line with the event store.
    pub fn refresh(&self, ctx: RefreshContext) -> ChimeResult<()> {
        let mut due = self.store.due();
        // Most recently surfaced first; ties broken by key order for a
        // deterministic partition.
        due.sort_by(|a, b| b.last_visibility.cmp(&a.last_visibility).then(a.key.cmp(&b.key)));

        let shown_count = self.config.max_shown.min(due.len());
        let (to_show, to_collapse) = due.split_at(shown_count);
        let primary = to_show.first().map(|a| a.key);

        for alert in to_show {
            let was = alert.display_status;
            let Some(id) = self.store.allocate_notification_id(&alert.key)? else {
                continue;
            };

            let quiet = ctx.force_repost
                || was == DisplayStatus::Collapsed
                || (was == DisplayStatus::Shown && !ctx.renotify)
                || alert.is_muted
                || (ctx.quiet.is_active() && Some(alert.key) != primary);

            self.notifier.post(id, &self.content(alert, quiet))?;

            let now = self.clock.now();
            self.store.update(&alert.key, |row| {
                if row.display_status == DisplayStatus::Hidden {
                    row.last_visibility = now;
                }
                row.display_status = DisplayStatus::Shown;
            })?;
        }

        for alert in to_collapse {
            if alert.display_status == DisplayStatus::Shown {
                if let Some(id) = alert.notification_id {
                    self.notifier.cancel(id)?;
                }
            }
            self.store.update(&alert.key, |row| {
                row.display_status = DisplayStatus::Collapsed;
            })?;
        }

        if to_collapse.is_empty() {
            self.notifier.cancel(SUMMARY_NOTIFICATION_ID)?;
        } else {
            debug!("collapsing {} alert(s) into summary", to_collapse.len());
            self.notifier.post(
                SUMMARY_NOTIFICATION_ID,
                &NotificationContent {
                    title: format!("{} more events", to_collapse.len()),
                    body: to_collapse
                        .iter()
                        .map(|a| a.title.as_str())
                        .collect::<Vec<_>>()
                        .join(", "),
                    color: 0,
                    quiet: true,
                    alert: None,
                },
            )?;
        }

        Ok(())
    }

    /// Withdraw an alert's notification after a snooze or dismissal, and
    /// the summary too once nothing is collapsed behind it.
    pub fn retire(&self, alert: &ActiveAlert) -> ChimeResult<()> {
        if let Some(id) = alert.notification_id {
            self.notifier.cancel(id)?;
        }

        let any_collapsed = self
            .store
            .all()
            .iter()
            .any(|a| a.display_status == DisplayStatus::Collapsed);
        if !any_collapsed {
            self.notifier.cancel(SUMMARY_NOTIFICATION_ID)?;
        }

        Ok(())
    }

    /// Tear everything down (e.g. daemon shutdown).
    pub fn clear_all(&self) -> ChimeResult<()> {
        self.notifier.cancel_all()
    }

    fn content(&self, alert: &ActiveAlert, quiet: bool) -> NotificationContent {
        let when = if alert.is_all_day {
            alert.start.format("%a %b %-d").to_string()
        } else {
            alert.start.format("%a %H:%M").to_string()
        };

        let body = if alert.location.is_empty() {
            when
        } else {
            format!("{when} · {}", alert.location)
        };

        NotificationContent {
            title: alert.title.clone(),
            body,
            color: alert.color,
            quiet,
            alert: Some(alert.key),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, TimeZone, Utc};

    use crate::alert::{AlertKey, AlertOrigin};
    use crate::clock::manual::ManualClock;
    use crate::testutil::FakeNotifier;

    use super::*;

    fn now() -> DateTime<Utc> {
        chrono::Utc.with_ymd_and_hms(2026, 5, 1, 12, 0, 0).unwrap()
    }

    fn alert(event_id: i64, surfaced_minutes_ago: i64) -> ActiveAlert {
        let start = now() + Duration::hours(1);
        ActiveAlert {
            key: AlertKey::new(event_id, now() - Duration::minutes(10), start),
            calendar_id: 1,
            title: format!("Event {event_id}"),
            location: String::new(),
            start,
            end: start + Duration::hours(1),
            color: 0x3F51B5,
            is_all_day: false,
            is_repeating: false,
            snoozed_until: None,
            display_status: DisplayStatus::Hidden,
            last_visibility: now() - Duration::minutes(surfaced_minutes_ago),
            origin: AlertOrigin::PollObserved,
            is_muted: false,
            notification_id: None,
        }
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        store: Arc<AlertStore>,
        notifier: Arc<FakeNotifier>,
        presenter: Presenter,
    }

    fn fixture(config: ChimeConfig) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(AlertStore::open(dir.path().join("alerts.json")).unwrap());
        let notifier = Arc::new(FakeNotifier::default());
        let presenter = Presenter::new(
            notifier.clone(),
            store.clone(),
            Arc::new(ManualClock::at(now())),
            Arc::new(config),
        );
        Fixture { _dir: dir, store, notifier, presenter }
    }

    #[test]
    fn test_older_alerts_collapse_into_summary() {
        let f = fixture(ChimeConfig { max_shown: 2, ..ChimeConfig::default() });

        // Event 1 surfaced longest ago, event 3 most recently.
        for (event_id, age) in [(1, 30), (2, 20), (3, 10)] {
            f.store.upsert(alert(event_id, age)).unwrap();
        }

        f.presenter.refresh(RefreshContext::default()).unwrap();

        let by_status = |status: DisplayStatus| {
            f.store
                .all()
                .into_iter()
                .filter(|a| a.display_status == status)
                .map(|a| a.key.event_id)
                .collect::<Vec<_>>()
        };
        assert_eq!(by_status(DisplayStatus::Shown), vec![2, 3]);
        assert_eq!(by_status(DisplayStatus::Collapsed), vec![1]);

        let summary = f.notifier.last_post(SUMMARY_NOTIFICATION_ID).unwrap();
        assert!(summary.quiet);
        assert!(summary.body.contains("Event 1"));
    }

    #[test]
    fn test_summary_withdrawn_when_nothing_collapsed() {
        let f = fixture(ChimeConfig::default());
        f.store.upsert(alert(1, 10)).unwrap();

        f.presenter.refresh(RefreshContext::default()).unwrap();

        assert!(f.notifier.last_post(SUMMARY_NOTIFICATION_ID).is_none());
        assert!(f.notifier.cancels.lock().unwrap().contains(&SUMMARY_NOTIFICATION_ID));
    }

    #[test]
    fn test_notification_id_stable_across_refreshes() {
        let f = fixture(ChimeConfig::default());
        let a = alert(1, 10);
        f.store.upsert(a.clone()).unwrap();

        f.presenter.refresh(RefreshContext::default()).unwrap();
        f.presenter.refresh(RefreshContext::default()).unwrap();

        let ids = f.notifier.posted_ids();
        assert_eq!(ids.len(), 2);
        assert_eq!(ids[0], ids[1]);
    }

    #[test]
    fn test_force_repost_is_quiet() {
        let f = fixture(ChimeConfig::default());
        f.store.upsert(alert(1, 10)).unwrap();

        f.presenter
            .refresh(RefreshContext { force_repost: true, renotify: false, quiet: QuietWindow::INACTIVE })
            .unwrap();

        let posts = f.notifier.posts.lock().unwrap();
        assert!(posts[0].1.quiet);
    }

    #[test]
    fn test_fresh_alert_posts_with_sound() {
        let f = fixture(ChimeConfig::default());
        f.store.upsert(alert(1, 10)).unwrap();

        f.presenter.refresh(RefreshContext::default()).unwrap();

        let posts = f.notifier.posts.lock().unwrap();
        assert!(!posts[0].1.quiet);
    }

    #[test]
    fn test_renotify_resounds_shown_alerts() {
        let f = fixture(ChimeConfig::default());
        f.store.upsert(alert(1, 10)).unwrap();

        f.presenter.refresh(RefreshContext::default()).unwrap();
        // Plain refresh: silent re-post.
        f.presenter.refresh(RefreshContext::default()).unwrap();
        // Periodic reminder: the nag is audible again.
        f.presenter
            .refresh(RefreshContext { renotify: true, ..RefreshContext::default() })
            .unwrap();

        let posts = f.notifier.posts.lock().unwrap();
        assert!(!posts[0].1.quiet);
        assert!(posts[1].1.quiet);
        assert!(!posts[2].1.quiet);
    }

    #[test]
    fn test_quiet_window_silences_all_but_primary() {
        let f = fixture(ChimeConfig::default());
        for (event_id, age) in [(1, 30), (2, 10)] {
            f.store.upsert(alert(event_id, age)).unwrap();
        }

        let quiet = QuietWindow { silent_until: Some(now() + Duration::hours(1)) };
        f.presenter
            .refresh(RefreshContext { force_repost: false, renotify: false, quiet })
            .unwrap();

        let posts = f.notifier.posts.lock().unwrap();
        let for_event = |event_id: i64| {
            posts
                .iter()
                .find(|(_, c)| c.alert.map(|k| k.event_id) == Some(event_id))
                .map(|(_, c)| c.quiet)
                .unwrap()
        };
        // Event 2 surfaced most recently: it is the primary and keeps its
        // sound; event 1 posts silent.
        assert!(!for_event(2));
        assert!(for_event(1));
    }

    #[test]
    fn test_repromotion_from_collapsed_is_quiet() {
        let f = fixture(ChimeConfig { max_shown: 1, ..ChimeConfig::default() });
        f.store.upsert(alert(1, 30)).unwrap();
        f.store.upsert(alert(2, 10)).unwrap();

        // First pass: event 2 shown, event 1 collapsed.
        f.presenter.refresh(RefreshContext::default()).unwrap();
        // Event 2 goes away; event 1 gets re-promoted.
        let gone = f.store.all().into_iter().find(|a| a.key.event_id == 2).unwrap();
        f.store.remove(&gone.key).unwrap();

        f.presenter.refresh(RefreshContext::default()).unwrap();

        let posts = f.notifier.posts.lock().unwrap();
        let repromoted = posts
            .iter()
            .filter(|(_, c)| c.alert.map(|k| k.event_id) == Some(1))
            .next_back()
            .unwrap();
        assert!(repromoted.1.quiet);
    }

    #[test]
    fn test_retire_withdraws_summary_when_collapsed_set_drains() {
        let f = fixture(ChimeConfig { max_shown: 1, ..ChimeConfig::default() });
        f.store.upsert(alert(1, 30)).unwrap();
        f.store.upsert(alert(2, 10)).unwrap();
        f.presenter.refresh(RefreshContext::default()).unwrap();

        // Dismiss the collapsed alert; the summary must go with it.
        let collapsed = f
            .store
            .all()
            .into_iter()
            .find(|a| a.display_status == DisplayStatus::Collapsed)
            .unwrap();
        f.store.remove(&collapsed.key).unwrap();
        f.presenter.retire(&collapsed).unwrap();

        assert!(f.notifier.cancels.lock().unwrap().contains(&SUMMARY_NOTIFICATION_ID));
    }
}
