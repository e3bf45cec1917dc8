//! Persistence codec for the entity graph
//!
//! Serializes the full graph (notes, folders, tags — alarms embedded in
//! notes) to a single JSON document and deserializes it back. The write
//! is a synchronous whole-file rewrite; the read happens once at startup.
//! A missing, empty or malformed file is treated as "no prior data" and
//! logged, never surfaced as an error.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::config::TIMESTAMP_FORMAT;
use crate::error::Result;
use crate::store::models::{
    local_now, sanitize_title, Alarm, AlarmState, Folder, Note, NoteType, Tag,
};

/// Whole-file JSON codec for the entity graph
#[derive(Clone)]
pub struct DataFile {
    path: PathBuf,
}

/// Entities reconstructed from disk. References between them are still
/// bare id/name stubs; the store's relink pass resolves them.
#[derive(Debug, Default)]
pub struct LoadedData {
    pub notes: Vec<Note>,
    pub folders: Vec<Folder>,
    pub tags: Vec<Tag>,
}

impl DataFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the persisted graph. Any failure degrades to an empty result.
    pub async fn load(&self) -> LoadedData {
        let contents = match fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No data file at {:?}, starting empty", self.path);
                return LoadedData::default();
            }
            Err(e) => {
                tracing::error!("Failed to read data file {:?}: {}", self.path, e);
                return LoadedData::default();
            }
        };

        if contents.trim().is_empty() {
            tracing::info!("Data file {:?} is empty, starting empty", self.path);
            return LoadedData::default();
        }

        let document: Document = match serde_json::from_str(&contents) {
            Ok(document) => document,
            Err(e) => {
                tracing::error!(
                    "Data file {:?} is corrupt ({}), starting empty",
                    self.path,
                    e
                );
                return LoadedData::default();
            }
        };

        let data = LoadedData {
            notes: document.notes.into_iter().map(decode_note).collect(),
            folders: document.folders.into_iter().map(decode_folder).collect(),
            tags: document.tags.into_iter().filter_map(decode_tag).collect(),
        };

        tracing::info!(
            "Loaded {} notes, {} folders, {} tags from {:?}",
            data.notes.len(),
            data.folders.len(),
            data.tags.len(),
            self.path
        );

        data
    }

    /// Write the full graph, atomically (temp file, then rename)
    pub async fn save(&self, notes: &[Note], folders: &[Folder], tags: &[Tag]) -> Result<()> {
        let document = Document {
            notes: notes.iter().map(encode_note).collect(),
            folders: folders.iter().map(encode_folder).collect(),
            tags: tags.iter().map(encode_tag).collect(),
        };

        let json = serde_json::to_string_pretty(&document)?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let temp_path = self.path.with_extension("tmp");
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(json.as_bytes()).await?;
        file.sync_all().await?;
        fs::rename(&temp_path, &self.path).await?;

        tracing::debug!(
            "Saved {} notes, {} folders, {} tags to {:?}",
            notes.len(),
            folders.len(),
            tags.len(),
            self.path
        );

        Ok(())
    }
}

// ===== Wire records =====

#[derive(Debug, Default, Serialize, Deserialize)]
struct Document {
    #[serde(default)]
    notes: Vec<NoteRecord>,
    #[serde(default)]
    folders: Vec<FolderRecord>,
    #[serde(default)]
    tags: Vec<TagRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NoteRecord {
    #[serde(default)]
    id: u64,
    #[serde(default)]
    title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    drawing_data: Option<String>,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    updated_at: Option<String>,
    #[serde(default)]
    is_favorite: bool,
    #[serde(default)]
    is_mission: bool,
    #[serde(default)]
    is_mission_completed: bool,
    #[serde(default)]
    mission_content: String,
    #[serde(default)]
    folder_id: u64,
    #[serde(default)]
    tags: Vec<TagRecord>,
    #[serde(default)]
    alarm: Option<AlarmRecord>,
    #[serde(default)]
    note_type: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FolderRecord {
    #[serde(default)]
    id: u64,
    #[serde(default)]
    name: String,
    #[serde(default)]
    is_favorite: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    sub_folder_names: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct TagRecord {
    #[serde(default)]
    id: u64,
    #[serde(default)]
    name: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AlarmRecord {
    #[serde(default)]
    id: u64,
    #[serde(default)]
    alarm_time: Option<String>,
    #[serde(default)]
    recurring: bool,
    #[serde(default)]
    recurrence_pattern: Option<String>,
}

// ===== Encoding =====

fn format_ts(ts: NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

fn encode_note(note: &Note) -> NoteRecord {
    NoteRecord {
        id: note.id,
        title: note.title.clone(),
        content: match note.note_type {
            NoteType::Text => Some(note.content.clone().unwrap_or_default()),
            NoteType::Drawing => None,
        },
        drawing_data: match note.note_type {
            NoteType::Drawing => note.drawing_data.clone(),
            NoteType::Text => None,
        },
        created_at: Some(format_ts(note.created_at)),
        updated_at: Some(format_ts(note.updated_at)),
        is_favorite: note.is_favorite,
        is_mission: note.is_mission,
        is_mission_completed: note.is_mission_completed,
        mission_content: note.mission_content.clone(),
        folder_id: note.folder_id,
        tags: note.tags.iter().map(encode_tag).collect(),
        // Consumed alarms are awaiting their durable clear; persist as null
        alarm: note.alarm.scheduled().map(encode_alarm),
        note_type: Some(note.note_type.to_string()),
    }
}

fn encode_folder(folder: &Folder) -> FolderRecord {
    FolderRecord {
        id: folder.id,
        name: folder.name.clone(),
        is_favorite: folder.is_favorite,
        sub_folder_names: folder.sub_folder_names.clone(),
    }
}

fn encode_tag(tag: &Tag) -> TagRecord {
    TagRecord {
        id: tag.id,
        name: tag.name.clone(),
    }
}

fn encode_alarm(alarm: &Alarm) -> AlarmRecord {
    AlarmRecord {
        id: alarm.id,
        alarm_time: Some(format_ts(alarm.alarm_time)),
        recurring: alarm.is_recurring(),
        recurrence_pattern: alarm.recurrence.map(|p| p.to_string()),
    }
}

// ===== Decoding =====

fn parse_ts(raw: Option<&str>) -> Option<NaiveDateTime> {
    let raw = raw?;
    match NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT) {
        Ok(ts) => Some(ts),
        Err(e) => {
            tracing::warn!("Unparseable timestamp '{}': {}", raw, e);
            None
        }
    }
}

fn decode_note(record: NoteRecord) -> Note {
    let title = sanitize_title(record.title);

    let note_type = match record.note_type.as_deref() {
        None => NoteType::Text,
        Some(raw) => raw.parse().unwrap_or_else(|e| {
            tracing::warn!("Note '{}': {}. Falling back to TEXT.", title, e);
            NoteType::Text
        }),
    };

    let created_at = parse_ts(record.created_at.as_deref()).unwrap_or_else(local_now);
    let updated_at = parse_ts(record.updated_at.as_deref()).unwrap_or(created_at);

    let alarm = match record.alarm.and_then(|a| decode_alarm(a, &title)) {
        Some(alarm) => AlarmState::Scheduled(alarm),
        None => AlarmState::Cleared,
    };

    Note {
        id: record.id,
        title,
        note_type,
        content: match note_type {
            NoteType::Text => Some(record.content.unwrap_or_default()),
            NoteType::Drawing => None,
        },
        drawing_data: match note_type {
            NoteType::Drawing => record.drawing_data,
            NoteType::Text => None,
        },
        created_at,
        updated_at,
        is_favorite: record.is_favorite,
        is_mission: record.is_mission,
        is_mission_completed: record.is_mission_completed,
        mission_content: record.mission_content,
        folder_id: record.folder_id,
        tags: record
            .tags
            .into_iter()
            .map(|t| Tag {
                id: t.id,
                name: t.name.trim().to_string(),
            })
            .collect(),
        alarm,
    }
}

/// Reconstruct a persisted alarm. Records that cannot form a valid alarm
/// (missing or unparseable time, or a recurring alarm with an unrecognized
/// pattern) disable the alarm with a warning instead of re-firing forever.
fn decode_alarm(record: AlarmRecord, note_title: &str) -> Option<Alarm> {
    let alarm_time = match parse_ts(record.alarm_time.as_deref()) {
        Some(ts) => ts,
        None => {
            tracing::warn!(
                "Alarm for note '{}' has a missing or invalid time; disabling it",
                note_title
            );
            return None;
        }
    };

    let recurrence = if record.recurring {
        let raw = record.recurrence_pattern.unwrap_or_default();
        match raw.parse() {
            Ok(pattern) => Some(pattern),
            Err(_) => {
                tracing::warn!(
                    "Recurring alarm for note '{}' has unrecognized pattern '{}'; disabling it",
                    note_title,
                    raw
                );
                return None;
            }
        }
    } else {
        None
    };

    Some(Alarm {
        id: record.id,
        alarm_time,
        recurrence,
    })
}

fn decode_folder(record: FolderRecord) -> Folder {
    let name = {
        let trimmed = record.name.trim();
        if trimmed.is_empty() {
            tracing::warn!("Folder {} has an empty name; renaming", record.id);
            "Unnamed Folder".to_string()
        } else {
            trimmed.to_string()
        }
    };

    Folder {
        id: record.id,
        name,
        is_favorite: record.is_favorite,
        note_ids: Vec::new(),
        sub_folder_names: record.sub_folder_names,
    }
}

fn decode_tag(record: TagRecord) -> Option<Tag> {
    let name = record.name.trim().to_string();
    if name.is_empty() {
        tracing::warn!("Dropping tag {} with empty name", record.id);
        return None;
    }
    Some(Tag {
        id: record.id,
        name,
    })
}
