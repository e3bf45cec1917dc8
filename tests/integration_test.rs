//! Integration tests for notebell
//!
//! These tests verify end-to-end behavior across the entity store, the
//! persistence codec and the alarm scheduler:
//! - id uniqueness across save/reload cycles
//! - the Root folder invariant
//! - alarm fire-once and recurrence advancement
//! - round-trip persistence of the full graph

use chrono::{NaiveDate, NaiveDateTime};
use notebell::services::{AlarmFired, AlarmScheduler};
use notebell::store::{Alarm, AlarmState, Folder, Note, RecurrencePattern, Store, Tag};
use std::path::PathBuf;
use tempfile::TempDir;
use tokio::sync::mpsc;

fn ts(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(h, min, 0)
        .unwrap()
}

/// Helper to create a store backed by a temp data file
async fn create_test_store() -> (Store, PathBuf, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("notes.json");
    let store = Store::load(path.clone()).await;
    (store, path, temp_dir)
}

fn create_test_scheduler(
    store: &Store,
) -> (AlarmScheduler, mpsc::UnboundedReceiver<AlarmFired>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (AlarmScheduler::new(store.clone(), tx), rx)
}

#[tokio::test]
async fn test_round_trip_preserves_graph() {
    let (store, path, _temp) = create_test_store().await;

    let work = store.create_folder(Folder::new("Work")).await.unwrap();
    let mut home = Folder::new("Home");
    home.is_favorite = true;
    home.sub_folder_names.push("Work".to_string());
    let home = store.create_folder(home).await.unwrap();

    let mut report = Note::text("Quarterly report", "numbers go here");
    report.folder_id = work.id;
    report.tags.push(Tag::new("deadline"));
    report.set_mission_content("send to accounting");
    let report = store.create_note(report).await.unwrap();
    store
        .set_alarm(
            report.id,
            Some(Alarm::new(
                ts(2031, 3, 1, 8, 0),
                Some(RecurrencePattern::Monthly),
            )),
        )
        .await
        .unwrap();
    let report = store.note(report.id).await.unwrap();

    let mut sketch = Note::drawing("Floor plan", "c29tZSBibG9i");
    sketch.folder_id = home.id;
    sketch.is_favorite = true;
    let sketch = store.create_note(sketch).await.unwrap();

    drop(store);
    let reloaded = Store::load(path).await;

    let notes = reloaded.notes().await;
    let folders = reloaded.folders().await;
    let tags = reloaded.tags().await;
    assert_eq!(notes.len(), 2);
    assert_eq!(folders.len(), 3); // Root + Work + Home
    assert_eq!(tags.len(), 1);

    let loaded_report = reloaded.note(report.id).await.unwrap();
    assert_eq!(loaded_report.title, report.title);
    assert_eq!(loaded_report.content, report.content);
    assert_eq!(loaded_report.created_at, trunc_to_second(report.created_at));
    assert_eq!(loaded_report.folder_id, work.id);
    assert_eq!(loaded_report.tags.len(), 1);
    assert_eq!(loaded_report.tags[0].name, "deadline");
    assert_eq!(loaded_report.mission_content, "send to accounting");
    assert!(loaded_report.is_mission);
    let alarm = loaded_report.alarm.scheduled().unwrap();
    assert_eq!(alarm.alarm_time, ts(2031, 3, 1, 8, 0));
    assert_eq!(alarm.recurrence, Some(RecurrencePattern::Monthly));

    let loaded_sketch = reloaded.note(sketch.id).await.unwrap();
    assert_eq!(loaded_sketch.drawing_data.as_deref(), Some("c29tZSBibG9i"));
    assert!(loaded_sketch.is_favorite);
    assert_eq!(loaded_sketch.folder_id, home.id);

    let loaded_home = reloaded.folder(home.id).await.unwrap();
    assert!(loaded_home.is_favorite);
    assert_eq!(loaded_home.sub_folder_names, vec!["Work"]);
    assert!(loaded_home.note_ids.contains(&sketch.id));
}

/// Timestamps persist at second resolution; in-memory values may carry
/// sub-second precision from the clock.
fn trunc_to_second(ts: NaiveDateTime) -> NaiveDateTime {
    use chrono::Timelike;
    ts.with_nanosecond(0).unwrap_or(ts)
}

#[tokio::test]
async fn test_ids_stay_unique_across_reload() {
    let (store, path, _temp) = create_test_store().await;

    let mut ids = Vec::new();
    for i in 0..3 {
        let note = store
            .create_note(Note::text(format!("Note {}", i), ""))
            .await
            .unwrap();
        ids.push(note.id);
    }
    drop(store);

    let reloaded = Store::load(path).await;
    for i in 3..6 {
        let note = reloaded
            .create_note(Note::text(format!("Note {}", i), ""))
            .await
            .unwrap();
        ids.push(note.id);
    }

    let mut deduped = ids.clone();
    deduped.sort_unstable();
    deduped.dedup();
    assert_eq!(deduped.len(), ids.len());
    // Every post-reload id is strictly greater than every pre-reload id
    assert!(ids[3..].iter().min() > ids[..3].iter().max());
}

#[tokio::test]
async fn test_root_invariant_survives_folder_operations() {
    let (store, path, _temp) = create_test_store().await;

    let work = store.create_folder(Folder::new("Work")).await.unwrap();
    store.create_folder(Folder::new("Play")).await.unwrap();
    store.create_folder(Folder::new("root")).await.unwrap(); // idempotent no-op
    store.delete_folder(work.id, true).await.unwrap();

    let root = store.root_folder().await;
    assert!(store.delete_folder(root.id, true).await.is_err());
    let mut renamed = root.clone();
    renamed.name = "NotRoot".to_string();
    assert!(store.update_folder(renamed).await.is_err());
    drop(store);

    let reloaded = Store::load(path).await;
    let folders = reloaded.folders().await;
    let roots: Vec<_> = folders
        .iter()
        .filter(|f| f.name.eq_ignore_ascii_case("Root"))
        .collect();
    assert_eq!(roots.len(), 1);
    assert_ne!(roots[0].id, 0);
    assert_eq!(folders[0].name, "Root");
}

#[tokio::test]
async fn test_tag_deduplication_across_notes() {
    let (store, _path, _temp) = create_test_store().await;

    let mut first = Note::text("First", "");
    first.tags.push(Tag::new("Work"));
    let first = store.create_note(first).await.unwrap();

    let mut second = Note::text("Second", "");
    second.tags.push(Tag::new("work"));
    let second = store.create_note(second).await.unwrap();

    assert_eq!(first.tags[0].id, second.tags[0].id);
    assert_eq!(store.tags().await.len(), 1);
}

#[tokio::test]
async fn test_one_shot_alarm_fires_once_within_suppression_window() {
    let (store, _path, _temp) = create_test_store().await;
    let (scheduler, mut rx) = create_test_scheduler(&store);

    let note = store.create_note(Note::text("Call mum", "")).await.unwrap();
    store
        .set_alarm(note.id, Some(Alarm::new(ts(2024, 6, 1, 19, 0), None)))
        .await
        .unwrap();

    // Several ticks land inside the suppression window
    let now = ts(2024, 6, 1, 19, 2);
    for _ in 0..4 {
        scheduler.tick(now).await;
    }

    assert!(rx.try_recv().is_ok());
    assert!(rx.try_recv().is_err());
    assert_eq!(
        store.note(note.id).await.unwrap().alarm,
        AlarmState::Cleared
    );
}

#[tokio::test]
async fn test_recurrence_advancement_for_every_pattern() {
    let (store, _path, _temp) = create_test_store().await;
    let (scheduler, mut rx) = create_test_scheduler(&store);

    let patterns = [
        (RecurrencePattern::Daily, ts(2024, 1, 11, 9, 0)),
        (RecurrencePattern::Weekly, ts(2024, 1, 17, 9, 0)),
        (RecurrencePattern::Monthly, ts(2024, 2, 10, 9, 0)),
        (RecurrencePattern::Yearly, ts(2025, 1, 10, 9, 0)),
    ];

    let mut note_ids = Vec::new();
    for (pattern, _) in &patterns {
        let note = store
            .create_note(Note::text(format!("{:?}", pattern), ""))
            .await
            .unwrap();
        store
            .set_alarm(
                note.id,
                Some(Alarm::new(ts(2024, 1, 10, 9, 0), Some(*pattern))),
            )
            .await
            .unwrap();
        note_ids.push(note.id);
    }

    scheduler.tick(ts(2024, 1, 10, 9, 0)).await;

    for _ in &patterns {
        assert!(rx.try_recv().is_ok());
    }
    assert!(rx.try_recv().is_err());

    for (note_id, (pattern, expected)) in note_ids.iter().zip(&patterns) {
        let note = store.note(*note_id).await.unwrap();
        let alarm = note.alarm.scheduled().unwrap();
        assert_eq!(alarm.alarm_time, *expected, "pattern {:?}", pattern);
        assert_eq!(alarm.recurrence, Some(*pattern));
    }
}

#[tokio::test]
async fn test_completed_mission_suppresses_due_alarm() {
    let (store, _path, _temp) = create_test_store().await;
    let (scheduler, mut rx) = create_test_scheduler(&store);

    let mut note = Note::text("Taxes", "");
    note.set_mission_content("file them");
    note.is_mission_completed = true;
    let note = store.create_note(note).await.unwrap();
    store
        .set_alarm(note.id, Some(Alarm::new(ts(2024, 4, 1, 9, 0), None)))
        .await
        .unwrap();

    for i in 0..20 {
        scheduler.tick(ts(2024, 4, 1, 9, 5 + i)).await;
    }

    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_folder_deletion_modes() {
    let (store, _path, _temp) = create_test_store().await;

    // Mode 1: move member notes to Root
    let keep = store.create_folder(Folder::new("Keepers")).await.unwrap();
    let mut kept_note = Note::text("Kept", "");
    kept_note.folder_id = keep.id;
    let kept_note = store.create_note(kept_note).await.unwrap();

    store.delete_folder(keep.id, true).await.unwrap();
    let root = store.root_folder().await;
    let survivor = store.note(kept_note.id).await.unwrap();
    assert_eq!(survivor.folder_id, root.id);

    // Mode 2: delete member notes outright
    let purge = store.create_folder(Folder::new("Purged")).await.unwrap();
    let mut doomed = Note::text("Doomed", "");
    doomed.folder_id = purge.id;
    let doomed = store.create_note(doomed).await.unwrap();

    store.delete_folder(purge.id, false).await.unwrap();
    assert!(store.note(doomed.id).await.is_none());
    assert!(store.folder(purge.id).await.is_none());
    assert!(store.note(kept_note.id).await.is_some());
}

#[tokio::test]
async fn test_corrupt_data_file_starts_empty() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("notes.json");
    tokio::fs::write(&path, "this is not json").await.unwrap();

    let store = Store::load(path).await;

    assert!(store.notes().await.is_empty());
    // The Root folder still gets created
    assert_eq!(store.root_folder().await.name, "Root");
}

#[tokio::test]
async fn test_scheduler_runs_against_live_mutations() {
    let (store, _path, _temp) = create_test_store().await;
    let (scheduler, mut rx) = create_test_scheduler(&store);

    let note = store.create_note(Note::text("Ping", "")).await.unwrap();
    store
        .set_alarm(note.id, Some(Alarm::new(ts(2024, 8, 1, 12, 0), None)))
        .await
        .unwrap();

    // A UI-style mutation lands between ticks
    scheduler.tick(ts(2024, 8, 1, 11, 59)).await;
    let mut renamed = store.note(note.id).await.unwrap();
    renamed.title = "Ping (renamed)".to_string();
    store.update_note(renamed).await.unwrap();

    scheduler.tick(ts(2024, 8, 1, 12, 0)).await;

    let fired = rx.try_recv().unwrap();
    assert_eq!(fired.note_title, "Ping (renamed)");
    assert_eq!(
        store.note(note.id).await.unwrap().alarm,
        AlarmState::Cleared
    );
}
