//! Application configuration constants
//!
//! Central location for all configuration constants and reserved values
//! used throughout the core.

// ===== Persistence =====

/// File name of the persisted entity graph inside the data directory
pub const DATA_FILE_NAME: &str = "notes.json";

/// Timestamp format used in the persisted file.
/// ISO-8601-like local date-time with no timezone component; the system
/// assumes a single local timezone.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

// ===== Folders =====

/// Reserved name of the permanent root folder.
/// Exactly one folder carries this name (case-insensitive) at all times;
/// it cannot be deleted or renamed.
pub const ROOT_FOLDER_NAME: &str = "Root";

// ===== Notes =====

/// Title given to notes created or loaded with a blank title
pub const DEFAULT_NOTE_TITLE: &str = "Untitled Note";

// ===== Alarm scheduler =====

/// Period of the scheduler tick in seconds
pub const SCHEDULER_TICK_SECS: u64 = 1;

/// Suppression window in seconds.
/// After an alarm fires, the same alarm id is ignored for this long to
/// avoid duplicate notifications caused by the tick granularity.
pub const SUPPRESSION_WINDOW_SECS: i64 = 5;

/// Grace period in milliseconds the scheduler shutdown waits for the
/// current tick to finish before forcing termination
pub const SHUTDOWN_GRACE_MS: u64 = 1_000;
