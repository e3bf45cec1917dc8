//! Entity store
//!
//! Single authoritative in-memory holder of the four entity collections.
//! All structural mutation — whether issued by the UI context or by the
//! alarm scheduler — funnels through one mutex, so the store is
//! single-writer; reads are snapshots taken through the same serialized
//! path. Every successful mutation triggers a whole-file save.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::models::{sanitize_title, Alarm, AlarmState, Folder, Note, Tag};
use crate::config::ROOT_FOLDER_NAME;
use crate::error::{AppError, Result};
use crate::storage::DataFile;

fn names_equal(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

fn is_root_name(name: &str) -> bool {
    names_equal(name, ROOT_FOLDER_NAME)
}

/// Four independent monotonic id counters, seeded on load to
/// `max(existing ids) + 1` per kind
#[derive(Debug)]
struct IdCounters {
    note: u64,
    folder: u64,
    tag: u64,
    alarm: u64,
}

impl IdCounters {
    fn seed(notes: &[Note], folders: &[Folder], tags: &[Tag]) -> Self {
        let max_note = notes.iter().map(|n| n.id).max().unwrap_or(0);
        let max_folder = folders.iter().map(|f| f.id).max().unwrap_or(0);
        let max_tag = tags.iter().map(|t| t.id).max().unwrap_or(0);
        let max_alarm = notes
            .iter()
            .filter_map(|n| n.alarm.alarm())
            .map(|a| a.id)
            .max()
            .unwrap_or(0);

        Self {
            note: max_note + 1,
            folder: max_folder + 1,
            tag: max_tag + 1,
            alarm: max_alarm + 1,
        }
    }

    fn next_note(&mut self) -> u64 {
        let id = self.note;
        self.note += 1;
        id
    }

    fn next_folder(&mut self) -> u64 {
        let id = self.folder;
        self.folder += 1;
        id
    }

    fn next_tag(&mut self) -> u64 {
        let id = self.tag;
        self.tag += 1;
        id
    }

    fn next_alarm(&mut self) -> u64 {
        let id = self.alarm;
        self.alarm += 1;
        id
    }

    // Counters must stay ahead of ids supplied from outside, or a later
    // assignment could collide with them.

    fn observe_note(&mut self, id: u64) {
        self.note = self.note.max(id + 1);
    }

    fn observe_folder(&mut self, id: u64) {
        self.folder = self.folder.max(id + 1);
    }

    fn observe_alarm(&mut self, id: u64) {
        self.alarm = self.alarm.max(id + 1);
    }
}

/// Entity store handle; cheap to clone and share between contexts
#[derive(Clone)]
pub struct Store {
    inner: Arc<Mutex<StoreInner>>,
}

struct StoreInner {
    notes: Vec<Note>,
    /// Root is always at index 0
    folders: Vec<Folder>,
    tags: Vec<Tag>,
    ids: IdCounters,
    data_file: DataFile,
}

impl Store {
    /// Load the store from the given data file path, then run the startup
    /// passes: id sanitation, Root enforcement, relinking. If sanitation
    /// changed anything, the sanitized graph is saved before the store
    /// becomes visible to the scheduler or the UI.
    pub async fn load(path: PathBuf) -> Self {
        let data_file = DataFile::new(path);
        let data = data_file.load().await;

        let mut inner = StoreInner {
            ids: IdCounters::seed(&data.notes, &data.folders, &data.tags),
            notes: data.notes,
            folders: data.folders,
            tags: data.tags,
            data_file,
        };

        let mut dirty = inner.sanitize_ids();
        dirty |= inner.ensure_root();
        inner.relink();

        if dirty {
            inner.persist().await;
        }

        tracing::info!(
            "Store initialized: {} notes, {} folders, {} tags",
            inner.notes.len(),
            inner.folders.len(),
            inner.tags.len()
        );

        Self {
            inner: Arc::new(Mutex::new(inner)),
        }
    }

    // ===== Note operations =====

    /// Insert a note. An id of 0 gets a fresh id; tags are resolved
    /// through the case-insensitive tag registry; a missing or invalid
    /// folder falls back to Root.
    pub async fn create_note(&self, note: Note) -> Result<Note> {
        let mut inner = self.inner.lock().await;
        let note = inner.create_note_inner(note)?;
        inner.persist().await;
        Ok(note)
    }

    /// Update an existing note (same resolution rules as create). A note
    /// id that is unknown to the store is appended with a warning rather
    /// than dropped.
    pub async fn update_note(&self, note: Note) -> Result<Note> {
        let mut inner = self.inner.lock().await;
        let note = inner.update_note_inner(note)?;
        inner.persist().await;
        Ok(note)
    }

    /// Remove a note from the store and from its owning folder.
    /// A logged no-op when the id is unknown.
    pub async fn delete_note(&self, id: u64) {
        let mut inner = self.inner.lock().await;
        if inner.delete_note_inner(id) {
            inner.persist().await;
        }
    }

    pub async fn move_note_to_folder(&self, note_id: u64, folder_id: u64) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.move_note_to_folder_inner(note_id, folder_id)? {
            inner.persist().await;
        }
        Ok(())
    }

    // ===== Folder operations =====

    /// Create a folder. Idempotent by case-insensitive name: when a
    /// folder with the same name exists, it is returned unchanged.
    pub async fn create_folder(&self, folder: Folder) -> Result<Folder> {
        let mut inner = self.inner.lock().await;
        let (folder, created) = inner.create_folder_inner(folder)?;
        if created {
            inner.persist().await;
        }
        Ok(folder)
    }

    /// Update a folder. Rejects renames that would break the Root
    /// invariant or collide with another folder's name.
    pub async fn update_folder(&self, folder: Folder) -> Result<Folder> {
        let mut inner = self.inner.lock().await;
        let folder = inner.update_folder_inner(folder)?;
        inner.persist().await;
        Ok(folder)
    }

    /// Delete a folder. Member notes are either re-parented to Root (ids
    /// preserved) or deleted outright. Root itself cannot be deleted.
    pub async fn delete_folder(&self, id: u64, move_notes_to_root: bool) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.delete_folder_inner(id, move_notes_to_root)? {
            inner.persist().await;
        }
        Ok(())
    }

    // ===== Tag operations =====

    /// Case-insensitive match-or-insert on the tag registry
    pub async fn get_or_create_tag(&self, name: &str) -> Result<Tag> {
        let mut inner = self.inner.lock().await;
        let (tag, created) = inner.get_or_create_tag_core(name)?;
        if created {
            inner.persist().await;
        }
        Ok(tag)
    }

    /// Rename a tag; the new name propagates to every referencing note
    pub async fn update_tag(&self, tag: Tag) -> Result<Tag> {
        let mut inner = self.inner.lock().await;
        let tag = inner.update_tag_inner(tag)?;
        inner.persist().await;
        Ok(tag)
    }

    /// Detach the tag from every note, then remove it from the registry.
    /// A logged no-op when the id is unknown.
    pub async fn delete_tag(&self, id: u64) {
        let mut inner = self.inner.lock().await;
        if inner.delete_tag_inner(id) {
            inner.persist().await;
        }
    }

    pub async fn add_tag_to_note(&self, note_id: u64, name: &str) -> Result<Tag> {
        let mut inner = self.inner.lock().await;
        let (tag, mutated) = inner.add_tag_to_note_inner(note_id, name)?;
        if mutated {
            inner.persist().await;
        }
        Ok(tag)
    }

    pub async fn remove_tag_from_note(&self, note_id: u64, tag_id: u64) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.remove_tag_from_note_inner(note_id, tag_id)? {
            inner.persist().await;
        }
        Ok(())
    }

    // ===== Alarm operations =====

    /// Attach an alarm to a note (`Some`) or clear it (`None`)
    pub async fn set_alarm(&self, note_id: u64, alarm: Option<Alarm>) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.set_alarm_inner(note_id, alarm)?;
        inner.persist().await;
        Ok(())
    }

    /// Durably detach a note's alarm
    pub async fn clear_alarm(&self, note_id: u64) -> Result<()> {
        self.set_alarm(note_id, None).await
    }

    /// Latch a fired one-shot alarm as consumed, in memory only. The
    /// scheduler calls this before requesting the durable clear so that a
    /// second tick cannot re-fire the alarm in between.
    pub async fn consume_alarm(&self, note_id: u64) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.consume_alarm_inner(note_id)
    }

    // ===== Snapshots =====

    pub async fn notes(&self) -> Vec<Note> {
        self.inner.lock().await.notes.clone()
    }

    pub async fn note(&self, id: u64) -> Option<Note> {
        let inner = self.inner.lock().await;
        inner.notes.iter().find(|n| n.id == id).cloned()
    }

    pub async fn folders(&self) -> Vec<Folder> {
        self.inner.lock().await.folders.clone()
    }

    pub async fn folder(&self, id: u64) -> Option<Folder> {
        let inner = self.inner.lock().await;
        inner.folders.iter().find(|f| f.id == id).cloned()
    }

    pub async fn folder_by_name(&self, name: &str) -> Option<Folder> {
        let inner = self.inner.lock().await;
        inner.folder_by_name_inner(name).cloned()
    }

    pub async fn root_folder(&self) -> Folder {
        let mut inner = self.inner.lock().await;
        inner.root()
    }

    pub async fn tags(&self) -> Vec<Tag> {
        self.inner.lock().await.tags.clone()
    }

    pub async fn tag_by_name(&self, name: &str) -> Option<Tag> {
        let inner = self.inner.lock().await;
        inner
            .tags
            .iter()
            .find(|t| names_equal(&t.name, name))
            .cloned()
    }
}

impl StoreInner {
    /// Write the full graph to disk. Persistence failures are logged and
    /// degrade gracefully; they never surface to the caller.
    async fn persist(&self) {
        if let Err(e) = self
            .data_file
            .save(&self.notes, &self.folders, &self.tags)
            .await
        {
            tracing::error!("Failed to save data file {:?}: {}", self.data_file.path(), e);
        }
    }

    // ===== Startup passes =====

    /// Assign fresh ids to any loaded entity still carrying id 0
    fn sanitize_ids(&mut self) -> bool {
        let mut dirty = false;

        for folder in self.folders.iter_mut() {
            if folder.id == 0 {
                folder.id = self.ids.next_folder();
                tracing::warn!("Folder '{}' had id 0; assigned {}", folder.name, folder.id);
                dirty = true;
            }
        }

        for tag in self.tags.iter_mut() {
            if tag.id == 0 {
                tag.id = self.ids.next_tag();
                tracing::warn!("Tag '{}' had id 0; assigned {}", tag.name, tag.id);
                dirty = true;
            }
        }

        for note in self.notes.iter_mut() {
            if note.id == 0 {
                note.id = self.ids.next_note();
                tracing::warn!("Note '{}' had id 0; assigned {}", note.title, note.id);
                dirty = true;
            }
            match &mut note.alarm {
                AlarmState::Scheduled(alarm) | AlarmState::Consumed(alarm) if alarm.id == 0 => {
                    alarm.id = self.ids.next_alarm();
                    tracing::warn!(
                        "Alarm on note '{}' had id 0; assigned {}",
                        note.title,
                        alarm.id
                    );
                    dirty = true;
                }
                _ => {}
            }
        }

        dirty
    }

    /// Enforce the Root invariant: exactly one folder named "Root",
    /// non-zero id, at index 0
    fn ensure_root(&mut self) -> bool {
        let mut dirty = false;

        let root_positions: Vec<usize> = self
            .folders
            .iter()
            .enumerate()
            .filter(|(_, f)| is_root_name(&f.name))
            .map(|(i, _)| i)
            .collect();

        match root_positions.first() {
            None => {
                let root = Folder {
                    id: self.ids.next_folder(),
                    name: ROOT_FOLDER_NAME.to_string(),
                    is_favorite: false,
                    note_ids: Vec::new(),
                    sub_folder_names: Vec::new(),
                };
                tracing::info!("Created Root folder with id {}", root.id);
                self.folders.insert(0, root);
                dirty = true;
            }
            Some(&first) => {
                // Drop duplicate Root-named folders; their notes fall back
                // to Root during relink.
                for &pos in root_positions.iter().skip(1).rev() {
                    let dup = self.folders.remove(pos);
                    tracing::warn!("Dropping duplicate Root folder (id {})", dup.id);
                    dirty = true;
                }
                if self.folders[first].id == 0 {
                    self.folders[first].id = self.ids.next_folder();
                    dirty = true;
                }
                if first != 0 {
                    let root = self.folders.remove(first);
                    self.folders.insert(0, root);
                }
            }
        }

        dirty
    }

    /// Resolve cross-references loaded as bare id/name stubs into live
    /// store-owned data. Unresolvable references are dropped with a
    /// warning; notes with a missing folder fall back to Root.
    fn relink(&mut self) {
        let root_id = self.folders[0].id;
        let folder_ids: HashSet<u64> = self.folders.iter().map(|f| f.id).collect();
        let tag_by_id: HashMap<u64, Tag> =
            self.tags.iter().map(|t| (t.id, t.clone())).collect();
        let tag_by_name: HashMap<String, Tag> = self
            .tags
            .iter()
            .map(|t| (t.name.to_lowercase(), t.clone()))
            .collect();

        for note in self.notes.iter_mut() {
            if note.folder_id == 0 || !folder_ids.contains(&note.folder_id) {
                if note.folder_id != 0 {
                    tracing::warn!(
                        "Note '{}' references missing folder {}; assigning Root",
                        note.title,
                        note.folder_id
                    );
                }
                note.folder_id = root_id;
            }

            let stubs = std::mem::take(&mut note.tags);
            for stub in stubs {
                let resolved = if stub.id != 0 {
                    tag_by_id.get(&stub.id).cloned()
                } else {
                    None
                }
                .or_else(|| tag_by_name.get(&stub.name.to_lowercase()).cloned());

                match resolved {
                    Some(tag) => {
                        if !note.has_tag(tag.id) {
                            note.tags.push(tag);
                        }
                    }
                    None => tracing::warn!(
                        "Note '{}' references unresolvable tag '{}' (id {}); dropping it",
                        note.title,
                        stub.name,
                        stub.id
                    ),
                }
            }
        }

        // Derived membership lists are rebuilt from the notes
        for folder in self.folders.iter_mut() {
            folder.note_ids.clear();
        }
        let assignments: Vec<(u64, u64)> =
            self.notes.iter().map(|n| (n.folder_id, n.id)).collect();
        for (folder_id, note_id) in assignments {
            self.attach_to_folder(folder_id, note_id);
        }

        // Sub-folder names resolve against the canonical folder list
        let canonical_names: HashMap<String, String> = self
            .folders
            .iter()
            .map(|f| (f.name.to_lowercase(), f.name.clone()))
            .collect();
        for i in 0..self.folders.len() {
            let own_name = self.folders[i].name.clone();
            let subs = std::mem::take(&mut self.folders[i].sub_folder_names);
            let mut kept = Vec::new();
            for sub in subs {
                if names_equal(&sub, &own_name) {
                    tracing::warn!("Folder '{}' cannot be its own sub-folder", own_name);
                    continue;
                }
                match canonical_names.get(&sub.trim().to_lowercase()) {
                    Some(canonical) => kept.push(canonical.clone()),
                    None => tracing::warn!(
                        "Folder '{}' references unknown sub-folder '{}'; dropping it",
                        own_name,
                        sub
                    ),
                }
            }
            self.folders[i].sub_folder_names = kept;
        }
    }

    // ===== Lookup helpers =====

    fn note_index(&self, id: u64) -> Option<usize> {
        self.notes.iter().position(|n| n.id == id)
    }

    fn folder_index(&self, id: u64) -> Option<usize> {
        self.folders.iter().position(|f| f.id == id)
    }

    fn folder_by_name_inner(&self, name: &str) -> Option<&Folder> {
        self.folders.iter().find(|f| names_equal(&f.name, name))
    }

    fn root(&mut self) -> Folder {
        if self.folders.first().map_or(true, |f| !is_root_name(&f.name)) {
            tracing::warn!("Root folder missing or displaced; re-ensuring");
            self.ensure_root();
        }
        self.folders[0].clone()
    }

    fn attach_to_folder(&mut self, folder_id: u64, note_id: u64) {
        if let Some(folder) = self.folders.iter_mut().find(|f| f.id == folder_id) {
            if !folder.note_ids.contains(&note_id) {
                folder.note_ids.push(note_id);
            }
        }
    }

    fn detach_from_folder(&mut self, folder_id: u64, note_id: u64) {
        if let Some(folder) = self.folders.iter_mut().find(|f| f.id == folder_id) {
            folder.note_ids.retain(|id| *id != note_id);
        }
    }

    // ===== Note logic =====

    /// Replace the note's tag list with registry-owned tags, preserving
    /// insertion order and dropping duplicates and blank names
    fn resolve_tags(&mut self, tags: Vec<Tag>) -> Vec<Tag> {
        let mut resolved: Vec<Tag> = Vec::new();
        for tag in tags {
            match self.get_or_create_tag_core(&tag.name) {
                Ok((tag, _)) => {
                    if !resolved.iter().any(|r| r.id == tag.id) {
                        resolved.push(tag);
                    }
                }
                Err(e) => tracing::warn!("Dropping tag '{}': {}", tag.name, e),
            }
        }
        resolved
    }

    /// Point the note at an existing folder, falling back to Root when
    /// the reference is absent or unresolvable
    fn resolve_folder(&mut self, note: &mut Note) {
        if note.folder_id == 0 {
            note.folder_id = self.root().id;
            return;
        }
        if self.folder_index(note.folder_id).is_none() {
            tracing::warn!(
                "Folder {} for note '{}' not found; assigning Root",
                note.folder_id,
                note.title
            );
            note.folder_id = self.root().id;
        }
    }

    fn assign_alarm_id(&mut self, note: &mut Note) {
        if let AlarmState::Scheduled(alarm) | AlarmState::Consumed(alarm) = &mut note.alarm {
            if alarm.id == 0 {
                alarm.id = self.ids.next_alarm();
            } else {
                self.ids.observe_alarm(alarm.id);
            }
        }
    }

    fn create_note_inner(&mut self, mut note: Note) -> Result<Note> {
        note.title = sanitize_title(note.title);
        if note.id == 0 {
            note.id = self.ids.next_note();
        } else {
            self.ids.observe_note(note.id);
        }
        self.assign_alarm_id(&mut note);
        note.tags = self.resolve_tags(std::mem::take(&mut note.tags));
        self.resolve_folder(&mut note);

        if self.note_index(note.id).is_some() {
            // An id we already hold: treat as an update
            return self.update_note_inner(note);
        }

        self.attach_to_folder(note.folder_id, note.id);
        self.notes.push(note.clone());
        tracing::info!("Created note '{}' with id {}", note.title, note.id);
        Ok(note)
    }

    fn update_note_inner(&mut self, mut note: Note) -> Result<Note> {
        if note.id == 0 {
            return Err(AppError::Validation(
                "Note to update must have a valid id".to_string(),
            ));
        }
        note.title = sanitize_title(note.title);
        self.ids.observe_note(note.id);
        self.assign_alarm_id(&mut note);
        note.tags = self.resolve_tags(std::mem::take(&mut note.tags));
        self.resolve_folder(&mut note);
        note.touch();

        match self.note_index(note.id) {
            Some(idx) => {
                let old_folder_id = self.notes[idx].folder_id;
                if old_folder_id != note.folder_id {
                    self.detach_from_folder(old_folder_id, note.id);
                }
                self.attach_to_folder(note.folder_id, note.id);
                self.notes[idx] = note.clone();
                tracing::debug!("Updated note '{}' (id {})", note.title, note.id);
            }
            None => {
                tracing::warn!(
                    "update_note called for unknown note {}; appending it",
                    note.id
                );
                self.attach_to_folder(note.folder_id, note.id);
                self.notes.push(note.clone());
            }
        }
        Ok(note)
    }

    fn delete_note_inner(&mut self, id: u64) -> bool {
        match self.note_index(id) {
            Some(idx) => {
                let note = self.notes.remove(idx);
                self.detach_from_folder(note.folder_id, note.id);
                tracing::info!("Deleted note '{}' (id {})", note.title, id);
                true
            }
            None => {
                tracing::warn!("Note {} not found for deletion", id);
                false
            }
        }
    }

    fn move_note_to_folder_inner(&mut self, note_id: u64, folder_id: u64) -> Result<bool> {
        let idx = self
            .note_index(note_id)
            .ok_or(AppError::NoteNotFound(note_id))?;
        if self.folder_index(folder_id).is_none() {
            return Err(AppError::FolderNotFound(folder_id));
        }

        let old_folder_id = self.notes[idx].folder_id;
        if old_folder_id == folder_id {
            tracing::debug!("Note {} is already in folder {}", note_id, folder_id);
            return Ok(false);
        }

        self.detach_from_folder(old_folder_id, note_id);
        self.notes[idx].folder_id = folder_id;
        self.notes[idx].touch();
        self.attach_to_folder(folder_id, note_id);
        Ok(true)
    }

    // ===== Folder logic =====

    fn create_folder_inner(&mut self, mut folder: Folder) -> Result<(Folder, bool)> {
        let name = folder.name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::Validation(
                "Folder name cannot be empty".to_string(),
            ));
        }

        if let Some(existing) = self.folder_by_name_inner(&name) {
            tracing::info!(
                "Folder '{}' already exists with id {}; not adding",
                name,
                existing.id
            );
            return Ok((existing.clone(), false));
        }

        folder.name = name;
        if folder.id == 0 {
            folder.id = self.ids.next_folder();
        } else {
            self.ids.observe_folder(folder.id);
        }
        // Membership is derived; a new folder starts empty
        folder.note_ids.clear();
        self.folders.push(folder.clone());
        tracing::info!("Created folder '{}' with id {}", folder.name, folder.id);
        Ok((folder, true))
    }

    fn update_folder_inner(&mut self, mut folder: Folder) -> Result<Folder> {
        if folder.id == 0 {
            return Err(AppError::Validation(
                "Folder to update must have a valid id".to_string(),
            ));
        }
        let name = folder.name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::Validation(
                "Folder name cannot be empty".to_string(),
            ));
        }

        let idx = self
            .folder_index(folder.id)
            .ok_or(AppError::FolderNotFound(folder.id))?;
        let root_id = self.folders[0].id;

        if is_root_name(&name) && folder.id != root_id {
            return Err(AppError::Validation(format!(
                "Cannot rename another folder to '{}'",
                ROOT_FOLDER_NAME
            )));
        }
        if folder.id == root_id && !is_root_name(&name) {
            return Err(AppError::Validation(format!(
                "The '{}' folder cannot be renamed",
                ROOT_FOLDER_NAME
            )));
        }
        if self
            .folders
            .iter()
            .any(|f| f.id != folder.id && names_equal(&f.name, &name))
        {
            return Err(AppError::Validation(format!(
                "Another folder with the name '{}' already exists",
                name
            )));
        }
        if folder.sub_folder_names.iter().any(|n| names_equal(n, &name)) {
            return Err(AppError::Validation(format!(
                "Folder '{}' cannot be its own sub-folder",
                name
            )));
        }

        folder.name = name;
        // Membership is store-maintained; the incoming value is ignored
        folder.note_ids = self.folders[idx].note_ids.clone();
        folder.sub_folder_names.retain(|sub| {
            let known = self.folder_by_name_inner(sub).is_some();
            if !known {
                tracing::warn!(
                    "Folder '{}' references unknown sub-folder '{}'; dropping it",
                    folder.name,
                    sub
                );
            }
            known
        });

        self.folders[idx] = folder.clone();
        tracing::info!("Updated folder '{}' (id {})", folder.name, folder.id);
        Ok(folder)
    }

    /// Two-phase delete: compute the affected note set first, then apply
    /// the per-note moves or deletions, then remove the folder itself.
    fn delete_folder_inner(&mut self, folder_id: u64, move_notes_to_root: bool) -> Result<bool> {
        let idx = match self.folder_index(folder_id) {
            Some(idx) => idx,
            None => {
                tracing::warn!("Folder {} not found for deletion", folder_id);
                return Ok(false);
            }
        };
        if is_root_name(&self.folders[idx].name) {
            return Err(AppError::Validation(format!(
                "Cannot delete the '{}' folder",
                ROOT_FOLDER_NAME
            )));
        }

        let folder_name = self.folders[idx].name.clone();
        let member_ids = self.folders[idx].note_ids.clone();

        if move_notes_to_root {
            let root_id = self.folders[0].id;
            for note_id in member_ids {
                if let Some(nidx) = self.note_index(note_id) {
                    let mut note = self.notes[nidx].clone();
                    note.folder_id = root_id;
                    self.update_note_inner(note)?;
                }
            }
        } else {
            for note_id in member_ids {
                self.delete_note_inner(note_id);
            }
        }

        if let Some(idx) = self.folder_index(folder_id) {
            self.folders.remove(idx);
        }
        for folder in self.folders.iter_mut() {
            folder
                .sub_folder_names
                .retain(|sub| !names_equal(sub, &folder_name));
        }
        tracing::info!("Deleted folder '{}' (id {})", folder_name, folder_id);
        Ok(true)
    }

    // ===== Tag logic =====

    fn get_or_create_tag_core(&mut self, name: &str) -> Result<(Tag, bool)> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(AppError::Validation(
                "Tag name cannot be empty".to_string(),
            ));
        }

        if let Some(tag) = self.tags.iter().find(|t| names_equal(&t.name, trimmed)) {
            return Ok((tag.clone(), false));
        }

        let tag = Tag {
            id: self.ids.next_tag(),
            name: trimmed.to_string(),
        };
        self.tags.push(tag.clone());
        tracing::info!("Created tag '{}' with id {}", tag.name, tag.id);
        Ok((tag, true))
    }

    fn update_tag_inner(&mut self, tag: Tag) -> Result<Tag> {
        if tag.id == 0 {
            return Err(AppError::Validation(
                "Tag to update must have a valid id".to_string(),
            ));
        }
        let name = tag.name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::Validation("Tag name cannot be empty".to_string()));
        }

        let idx = self
            .tags
            .iter()
            .position(|t| t.id == tag.id)
            .ok_or(AppError::TagNotFound(tag.id))?;
        if self
            .tags
            .iter()
            .any(|t| t.id != tag.id && names_equal(&t.name, &name))
        {
            return Err(AppError::Validation(format!(
                "Another tag with the name '{}' already exists",
                name
            )));
        }

        self.tags[idx].name = name.clone();
        for note in self.notes.iter_mut() {
            for t in note.tags.iter_mut() {
                if t.id == tag.id {
                    t.name = name.clone();
                }
            }
        }
        tracing::info!("Updated tag {} to '{}'", tag.id, name);
        Ok(self.tags[idx].clone())
    }

    fn delete_tag_inner(&mut self, tag_id: u64) -> bool {
        let idx = match self.tags.iter().position(|t| t.id == tag_id) {
            Some(idx) => idx,
            None => {
                tracing::warn!("Tag {} not found for deletion", tag_id);
                return false;
            }
        };

        let tag = self.tags.remove(idx);
        for note in self.notes.iter_mut() {
            note.tags.retain(|t| t.id != tag_id);
        }
        tracing::info!("Deleted tag '{}' (id {}) from all notes", tag.name, tag_id);
        true
    }

    fn add_tag_to_note_inner(&mut self, note_id: u64, name: &str) -> Result<(Tag, bool)> {
        let idx = self
            .note_index(note_id)
            .ok_or(AppError::NoteNotFound(note_id))?;
        let (tag, created) = self.get_or_create_tag_core(name)?;

        if self.notes[idx].has_tag(tag.id) {
            tracing::debug!("Note {} already has tag '{}'", note_id, tag.name);
            return Ok((tag, created));
        }

        self.notes[idx].tags.push(tag.clone());
        self.notes[idx].touch();
        Ok((tag, true))
    }

    fn remove_tag_from_note_inner(&mut self, note_id: u64, tag_id: u64) -> Result<bool> {
        let idx = self
            .note_index(note_id)
            .ok_or(AppError::NoteNotFound(note_id))?;

        let before = self.notes[idx].tags.len();
        self.notes[idx].tags.retain(|t| t.id != tag_id);
        let removed = self.notes[idx].tags.len() != before;
        if removed {
            self.notes[idx].touch();
        }
        Ok(removed)
    }

    // ===== Alarm logic =====

    fn set_alarm_inner(&mut self, note_id: u64, alarm: Option<Alarm>) -> Result<()> {
        let idx = self
            .note_index(note_id)
            .ok_or(AppError::NoteNotFound(note_id))?;

        match alarm {
            Some(mut alarm) => {
                if alarm.id == 0 {
                    alarm.id = self.ids.next_alarm();
                } else {
                    self.ids.observe_alarm(alarm.id);
                }
                tracing::debug!(
                    "Set alarm {} on note {} for {}",
                    alarm.id,
                    note_id,
                    alarm.alarm_time
                );
                self.notes[idx].alarm = AlarmState::Scheduled(alarm);
            }
            None => {
                tracing::debug!("Cleared alarm on note {}", note_id);
                self.notes[idx].alarm = AlarmState::Cleared;
            }
        }
        self.notes[idx].touch();
        Ok(())
    }

    fn consume_alarm_inner(&mut self, note_id: u64) -> Result<()> {
        let idx = self
            .note_index(note_id)
            .ok_or(AppError::NoteNotFound(note_id))?;

        let state = std::mem::take(&mut self.notes[idx].alarm);
        self.notes[idx].alarm = match state {
            AlarmState::Scheduled(alarm) => AlarmState::Consumed(alarm),
            other => {
                tracing::warn!("consume_alarm on note {} with no scheduled alarm", note_id);
                other
            }
        };
        Ok(())
    }
}
