//! Alarm scheduler
//!
//! Background worker that checks for due alarms every second, fires each
//! occurrence at most once, advances recurring alarms and clears one-shot
//! alarms after they fire. All store write-backs go through the store's
//! serialized mutation path; user-visible side effects are delegated to
//! whoever consumes the fired-event channel.

use chrono::NaiveDateTime;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;

use crate::config::{SCHEDULER_TICK_SECS, SHUTDOWN_GRACE_MS, SUPPRESSION_WINDOW_SECS};
use crate::error::Result;
use crate::services::QueryService;
use crate::store::models::{local_now, truncate_to_minute};
use crate::store::{Alarm, Note, Store};

/// Immutable snapshot emitted to the notification collaborator when an
/// alarm fires
#[derive(Debug, Clone)]
pub struct AlarmFired {
    pub note_id: u64,
    pub note_title: String,
    pub alarm: Alarm,
}

/// Map of recently fired alarm ids to their fire time. An alarm inside
/// the window is ignored, so tick overlap cannot produce duplicate
/// notifications. Safe for concurrent insert/prune/lookup regardless of
/// which context calls it.
pub struct SuppressionMap {
    window: chrono::Duration,
    entries: Mutex<HashMap<u64, NaiveDateTime>>,
}

impl SuppressionMap {
    pub fn new(window_secs: i64) -> Self {
        Self {
            window: chrono::Duration::seconds(window_secs),
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub async fn record(&self, alarm_id: u64, fired_at: NaiveDateTime) {
        self.entries.lock().await.insert(alarm_id, fired_at);
    }

    pub async fn contains(&self, alarm_id: u64) -> bool {
        self.entries.lock().await.contains_key(&alarm_id)
    }

    /// Drop entries that fired more than a window ago
    pub async fn prune(&self, now: NaiveDateTime) {
        let cutoff = now - self.window;
        self.entries.lock().await.retain(|_, fired_at| *fired_at >= cutoff);
    }
}

/// Periodic due-alarm checker
pub struct AlarmScheduler {
    store: Store,
    queries: QueryService,
    suppression: Arc<SuppressionMap>,
    events: mpsc::UnboundedSender<AlarmFired>,
}

impl AlarmScheduler {
    pub fn new(store: Store, events: mpsc::UnboundedSender<AlarmFired>) -> Self {
        let queries = QueryService::new(store.clone());
        Self {
            store,
            queries,
            suppression: Arc::new(SuppressionMap::new(SUPPRESSION_WINDOW_SECS)),
            events,
        }
    }

    /// Spawn the tick loop on its own worker; runs until shutdown
    pub fn start(self) -> SchedulerHandle {
        tracing::info!(
            "Starting alarm scheduler ({}-second tick)",
            SCHEDULER_TICK_SECS
        );
        let (shutdown, mut shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(Duration::from_secs(SCHEDULER_TICK_SECS));
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let now = truncate_to_minute(local_now());
                        self.tick(now).await;
                    }
                    _ = shutdown_rx.changed() => break,
                }
            }
            tracing::info!("Alarm scheduler stopped");
        });

        SchedulerHandle { shutdown, handle }
    }

    /// One scheduler pass. `now` must already be truncated to the minute.
    pub async fn tick(&self, now: NaiveDateTime) {
        self.suppression.prune(now).await;

        let notes = match self.queries.notes().await {
            Ok(notes) => notes,
            Err(e) => {
                tracing::error!("Failed to fetch notes, skipping tick: {}", e);
                return;
            }
        };

        for note in notes {
            if let Err(e) = self.process_note(&note, now).await {
                tracing::error!("Error processing alarm for note '{}': {}", note.title, e);
            }
        }
    }

    async fn process_note(&self, note: &Note, now: NaiveDateTime) -> Result<()> {
        let alarm = match note.alarm.scheduled() {
            Some(alarm) => alarm.clone(),
            None => return Ok(()),
        };

        // A completed mission never fires
        if note.is_mission_completed {
            return Ok(());
        }
        if self.suppression.contains(alarm.id).await {
            return Ok(());
        }
        if !alarm.is_due(now) {
            return Ok(());
        }

        self.suppression.record(alarm.id, now).await;
        tracing::info!(
            "Triggering alarm {} for note '{}' (alarm time {})",
            alarm.id,
            note.title,
            alarm.alarm_time
        );

        let fired = AlarmFired {
            note_id: note.id,
            note_title: note.title.clone(),
            alarm: alarm.clone(),
        };
        if self.events.send(fired).is_err() {
            tracing::warn!(
                "No notification consumer; dropping fired event for alarm {}",
                alarm.id
            );
        }

        match alarm.recurrence {
            None => {
                // Latch the fired alarm first so another tick racing the
                // durable clear cannot re-fire it
                self.store.consume_alarm(note.id).await?;
                self.store.clear_alarm(note.id).await?;
            }
            Some(pattern) => {
                let next = pattern.advance(alarm.alarm_time);
                tracing::info!("Recurring alarm {} advances to {}", alarm.id, next);
                let updated = Alarm {
                    id: alarm.id,
                    alarm_time: next,
                    recurrence: Some(pattern),
                };
                self.store.set_alarm(note.id, Some(updated)).await?;
            }
        }

        Ok(())
    }
}

/// Handle to a running scheduler
pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Cooperative shutdown: signal the worker, wait up to the grace
    /// period for the current tick to finish, then force termination.
    pub async fn shutdown(mut self) {
        let _ = self.shutdown.send(true);
        let grace = Duration::from_millis(SHUTDOWN_GRACE_MS);
        if tokio::time::timeout(grace, &mut self.handle).await.is_err() {
            tracing::warn!("Scheduler did not stop within grace period; aborting");
            self.handle.abort();
        } else {
            tracing::info!("Alarm scheduler shut down cleanly");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::models::RecurrencePattern;
    use crate::store::AlarmState;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn ts(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    async fn create_test_scheduler() -> (
        AlarmScheduler,
        Store,
        mpsc::UnboundedReceiver<AlarmFired>,
        TempDir,
    ) {
        let temp_dir = TempDir::new().unwrap();
        let store = Store::load(temp_dir.path().join("notes.json")).await;
        let (tx, rx) = mpsc::unbounded_channel();
        let scheduler = AlarmScheduler::new(store.clone(), tx);
        (scheduler, store, rx, temp_dir)
    }

    #[tokio::test]
    async fn test_one_shot_alarm_fires_exactly_once() {
        let (scheduler, store, mut rx, _temp) = create_test_scheduler().await;

        let note = store.create_note(Note::text("Dentist", "")).await.unwrap();
        store
            .set_alarm(note.id, Some(Alarm::new(ts(2024, 1, 10, 9, 0), None)))
            .await
            .unwrap();

        let now = ts(2024, 1, 10, 9, 5);
        for _ in 0..5 {
            scheduler.tick(now).await;
        }

        let fired = rx.try_recv().unwrap();
        assert_eq!(fired.note_id, note.id);
        assert!(rx.try_recv().is_err());

        // The durable clear completed
        let note = store.note(note.id).await.unwrap();
        assert_eq!(note.alarm, AlarmState::Cleared);
    }

    #[tokio::test]
    async fn test_recurring_alarm_advances_from_alarm_time() {
        let (scheduler, store, mut rx, _temp) = create_test_scheduler().await;

        let note = store.create_note(Note::text("Standup", "")).await.unwrap();
        store
            .set_alarm(
                note.id,
                Some(Alarm::new(
                    ts(2024, 1, 10, 9, 0),
                    Some(RecurrencePattern::Daily),
                )),
            )
            .await
            .unwrap();
        let alarm_id = store.note(note.id).await.unwrap().alarm.alarm().unwrap().id;

        scheduler.tick(ts(2024, 1, 10, 9, 30)).await;

        assert!(rx.try_recv().is_ok());
        let advanced = store.note(note.id).await.unwrap();
        let alarm = advanced.alarm.scheduled().unwrap();
        // Advances by one unit from the alarm time, not from "now"
        assert_eq!(alarm.alarm_time, ts(2024, 1, 11, 9, 0));
        assert_eq!(alarm.id, alarm_id);
        assert_eq!(alarm.recurrence, Some(RecurrencePattern::Daily));
    }

    #[tokio::test]
    async fn test_still_due_recurring_alarm_is_suppressed_within_window() {
        let (scheduler, store, mut rx, _temp) = create_test_scheduler().await;

        let note = store.create_note(Note::text("Water plants", "")).await.unwrap();
        // Two days overdue: after one daily advance it is still due
        store
            .set_alarm(
                note.id,
                Some(Alarm::new(
                    ts(2024, 1, 8, 9, 0),
                    Some(RecurrencePattern::Daily),
                )),
            )
            .await
            .unwrap();

        let now = ts(2024, 1, 10, 9, 0);
        scheduler.tick(now).await;
        scheduler.tick(now).await;

        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_completed_mission_never_fires() {
        let (scheduler, store, mut rx, _temp) = create_test_scheduler().await;

        let mut note = Note::text("Report", "");
        note.set_mission_content("file the report");
        note.is_mission_completed = true;
        let note = store.create_note(note).await.unwrap();
        store
            .set_alarm(note.id, Some(Alarm::new(ts(2024, 1, 10, 9, 0), None)))
            .await
            .unwrap();

        for _ in 0..10 {
            scheduler.tick(ts(2024, 1, 10, 9, 5)).await;
        }

        assert!(rx.try_recv().is_err());
        // The alarm is untouched, not consumed
        let note = store.note(note.id).await.unwrap();
        assert!(note.alarm.scheduled().is_some());
    }

    #[tokio::test]
    async fn test_future_alarm_does_not_fire() {
        let (scheduler, store, mut rx, _temp) = create_test_scheduler().await;

        let note = store.create_note(Note::text("Later", "")).await.unwrap();
        store
            .set_alarm(note.id, Some(Alarm::new(ts(2024, 1, 10, 9, 1), None)))
            .await
            .unwrap();

        scheduler.tick(ts(2024, 1, 10, 9, 0)).await;
        assert!(rx.try_recv().is_err());

        scheduler.tick(ts(2024, 1, 10, 9, 1)).await;
        assert!(rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_suppression_map_prunes_old_entries() {
        let map = SuppressionMap::new(5);
        let fired_at = ts(2024, 1, 10, 9, 0);

        map.record(1, fired_at).await;
        assert!(map.contains(1).await);

        map.prune(fired_at + chrono::Duration::seconds(4)).await;
        assert!(map.contains(1).await);

        map.prune(fired_at + chrono::Duration::seconds(6)).await;
        assert!(!map.contains(1).await);
    }

    #[tokio::test]
    async fn test_shutdown_stops_the_worker() {
        let (scheduler, _store, _rx, _temp) = create_test_scheduler().await;

        let handle = scheduler.start();
        handle.shutdown().await;
    }
}
