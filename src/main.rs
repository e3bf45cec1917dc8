// Notebell - note-taking core with alarm scheduling
// Entry point and runtime wiring

use std::path::PathBuf;

use directories::ProjectDirs;
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use notebell::app;
use notebell::services::AlarmScheduler;

fn data_dir() -> PathBuf {
    if let Some(dir) = std::env::args().nth(1) {
        return PathBuf::from(dir);
    }
    ProjectDirs::from("com", "notebell", "notebell")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "notebell=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting notebell");

    let app = app::setup(&data_dir()).await?;

    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let scheduler = AlarmScheduler::new(app.store.clone(), events_tx);
    let handle = scheduler.start();

    loop {
        tokio::select! {
            Some(fired) = events_rx.recv() => {
                tracing::info!(
                    "Alarm {} fired for note '{}' (note id {})",
                    fired.alarm.id,
                    fired.note_title,
                    fired.note_id
                );
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutdown requested");
                break;
            }
        }
    }

    handle.shutdown().await;
    Ok(())
}
