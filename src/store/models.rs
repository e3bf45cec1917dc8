//! Entity model
//!
//! Rust structs for the four entity kinds held by the store: notes,
//! folders, tags and alarms. An id of 0 always means "not yet saved";
//! the store assigns real ids on insertion.

use chrono::{Duration, Months, NaiveDateTime, NaiveTime, Timelike};
use std::fmt;
use std::str::FromStr;

use crate::config::DEFAULT_NOTE_TITLE;

/// Current wall-clock time in the local timezone, without zone info
pub fn local_now() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}

/// Truncate a timestamp to minute resolution, matching alarm semantics
pub fn truncate_to_minute(ts: NaiveDateTime) -> NaiveDateTime {
    let time = NaiveTime::from_hms_opt(ts.time().hour(), ts.time().minute(), 0)
        .unwrap_or_else(|| ts.time());
    NaiveDateTime::new(ts.date(), time)
}

/// Discriminates text notes from drawing notes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteType {
    Text,
    Drawing,
}

impl fmt::Display for NoteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            NoteType::Text => "TEXT",
            NoteType::Drawing => "DRAWING",
        })
    }
}

impl FromStr for NoteType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "TEXT" => Ok(NoteType::Text),
            "DRAWING" => Ok(NoteType::Drawing),
            other => Err(format!("Unknown note type: {}", other)),
        }
    }
}

/// Calendar unit by which a recurring alarm advances
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecurrencePattern {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl RecurrencePattern {
    /// Next occurrence: exactly one unit added to the current alarm time,
    /// preserving time-of-day. Month and year steps clamp to the last
    /// valid day-of-month.
    pub fn advance(self, from: NaiveDateTime) -> NaiveDateTime {
        match self {
            RecurrencePattern::Daily => from + Duration::days(1),
            RecurrencePattern::Weekly => from + Duration::weeks(1),
            RecurrencePattern::Monthly => from.checked_add_months(Months::new(1)).unwrap_or(from),
            RecurrencePattern::Yearly => from.checked_add_months(Months::new(12)).unwrap_or(from),
        }
    }
}

impl fmt::Display for RecurrencePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecurrencePattern::Daily => "DAILY",
            RecurrencePattern::Weekly => "WEEKLY",
            RecurrencePattern::Monthly => "MONTHLY",
            RecurrencePattern::Yearly => "YEARLY",
        };
        f.write_str(name)
    }
}

impl FromStr for RecurrencePattern {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "DAILY" => Ok(RecurrencePattern::Daily),
            "WEEKLY" => Ok(RecurrencePattern::Weekly),
            "MONTHLY" => Ok(RecurrencePattern::Monthly),
            "YEARLY" => Ok(RecurrencePattern::Yearly),
            other => Err(format!("Unknown recurrence pattern: {}", other)),
        }
    }
}

/// An alarm attached to a note. Minute resolution; recurring when a
/// recurrence pattern is present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alarm {
    pub id: u64,
    pub alarm_time: NaiveDateTime,
    pub recurrence: Option<RecurrencePattern>,
}

impl Alarm {
    /// New unsaved alarm (id assigned by the store)
    pub fn new(alarm_time: NaiveDateTime, recurrence: Option<RecurrencePattern>) -> Self {
        Self {
            id: 0,
            alarm_time,
            recurrence,
        }
    }

    pub fn is_recurring(&self) -> bool {
        self.recurrence.is_some()
    }

    /// Fire condition: due when `now` is at or past the alarm time
    pub fn is_due(&self, now: NaiveDateTime) -> bool {
        now >= self.alarm_time
    }
}

/// The note/alarm relationship.
///
/// `Consumed` marks a non-recurring alarm that already fired and is
/// awaiting its durable clear; it can never fire again, even if another
/// tick runs before the clear is persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AlarmState {
    #[default]
    Cleared,
    Scheduled(Alarm),
    Consumed(Alarm),
}

impl AlarmState {
    /// The alarm, only while it is still eligible to fire
    pub fn scheduled(&self) -> Option<&Alarm> {
        match self {
            AlarmState::Scheduled(alarm) => Some(alarm),
            AlarmState::Cleared | AlarmState::Consumed(_) => None,
        }
    }

    /// The alarm regardless of firing eligibility
    pub fn alarm(&self) -> Option<&Alarm> {
        match self {
            AlarmState::Scheduled(alarm) | AlarmState::Consumed(alarm) => Some(alarm),
            AlarmState::Cleared => None,
        }
    }
}

/// A tag; de-duplicated by name case-insensitively across the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub id: u64,
    pub name: String,
}

impl Tag {
    /// New unsaved tag with a trimmed name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: 0,
            name: name.into().trim().to_string(),
        }
    }
}

/// A folder. The member-note list is derived and maintained by the store;
/// the sub-folder name list is authoritative for serialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Folder {
    pub id: u64,
    pub name: String,
    pub is_favorite: bool,
    pub note_ids: Vec<u64>,
    pub sub_folder_names: Vec<String>,
}

impl Folder {
    /// New unsaved folder
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: 0,
            name: name.into().trim().to_string(),
            is_favorite: false,
            note_ids: Vec::new(),
            sub_folder_names: Vec::new(),
        }
    }
}

/// A note; either a text note or a drawing note
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Note {
    pub id: u64,
    pub title: String,
    pub note_type: NoteType,
    /// Text notes only
    pub content: Option<String>,
    /// Drawing notes only; opaque encoded blob
    pub drawing_data: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub is_favorite: bool,
    pub is_mission: bool,
    pub is_mission_completed: bool,
    pub mission_content: String,
    /// 0 only transiently before the store assigns a folder
    pub folder_id: u64,
    /// Insertion-ordered, de-duplicated by name case-insensitively
    pub tags: Vec<Tag>,
    pub alarm: AlarmState,
}

impl Note {
    /// New unsaved text note
    pub fn text(title: impl Into<String>, content: impl Into<String>) -> Self {
        let now = local_now();
        Self {
            id: 0,
            title: sanitize_title(title.into()),
            note_type: NoteType::Text,
            content: Some(content.into()),
            drawing_data: None,
            created_at: now,
            updated_at: now,
            is_favorite: false,
            is_mission: false,
            is_mission_completed: false,
            mission_content: String::new(),
            folder_id: 0,
            tags: Vec::new(),
            alarm: AlarmState::Cleared,
        }
    }

    /// New unsaved drawing note holding an opaque encoded blob
    pub fn drawing(title: impl Into<String>, drawing_data: impl Into<String>) -> Self {
        let mut note = Note::text(title, "");
        note.note_type = NoteType::Drawing;
        note.content = None;
        note.drawing_data = Some(drawing_data.into());
        note
    }

    /// Refresh the modification timestamp
    pub fn touch(&mut self) {
        self.updated_at = local_now();
    }

    /// Set the mission text. A non-empty mission marks the note as a
    /// mission; clearing it also clears the completion flag.
    pub fn set_mission_content(&mut self, content: impl Into<String>) {
        self.mission_content = content.into().trim().to_string();
        self.is_mission = !self.mission_content.is_empty();
        if !self.is_mission {
            self.is_mission_completed = false;
        }
        self.touch();
    }

    pub fn has_tag(&self, tag_id: u64) -> bool {
        self.tags.iter().any(|t| t.id == tag_id)
    }
}

/// Blank titles are replaced rather than rejected
pub(crate) fn sanitize_title(title: String) -> String {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        DEFAULT_NOTE_TITLE.to_string()
    } else {
        trimmed.to_string()
    }
}
