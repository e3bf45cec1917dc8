//! Entity store module
//!
//! This module provides the in-memory entity graph:
//! - Model definitions for notes, folders, tags and alarms
//! - The store itself: id generation, mutation operations, startup
//!   sanitation and relinking, persistence triggering

pub mod models;
pub mod repository;

pub use models::{Alarm, AlarmState, Folder, Note, NoteType, RecurrencePattern, Tag};
pub use repository::Store;
