//! Query facade
//!
//! Read-only projections over the store's current state, consumed by the
//! UI layer and by the alarm scheduler. These are pure views: they take
//! no locks beyond what the store itself guarantees and never mutate.

use crate::error::Result;
use crate::store::{Folder, Note, Store};

/// Read-only view service over the entity store
#[derive(Clone)]
pub struct QueryService {
    store: Store,
}

impl QueryService {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// All notes, in store order
    pub async fn notes(&self) -> Result<Vec<Note>> {
        Ok(self.store.notes().await)
    }

    /// Notes belonging to one folder. An unknown folder id yields an
    /// empty list with a warning.
    pub async fn notes_in_folder(&self, folder_id: u64) -> Result<Vec<Note>> {
        if self.store.folder(folder_id).await.is_none() {
            tracing::warn!("notes_in_folder: folder {} not found", folder_id);
            return Ok(Vec::new());
        }
        let notes = self.store.notes().await;
        Ok(notes
            .into_iter()
            .filter(|n| n.folder_id == folder_id)
            .collect())
    }

    /// All folders, favorites first, then by name
    pub async fn folders(&self) -> Result<Vec<Folder>> {
        let mut folders = self.store.folders().await;
        folders.sort_by(|a, b| {
            b.is_favorite
                .cmp(&a.is_favorite)
                .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
        });
        Ok(folders)
    }

    /// All notes, favorites first, then most recently updated
    pub async fn sorted_notes(&self) -> Result<Vec<Note>> {
        let mut notes = self.store.notes().await;
        notes.sort_by(|a, b| {
            b.is_favorite
                .cmp(&a.is_favorite)
                .then_with(|| b.updated_at.cmp(&a.updated_at))
        });
        Ok(notes)
    }

    /// Mission notes with actual mission text, open missions first,
    /// then most recently updated
    pub async fn missions(&self) -> Result<Vec<Note>> {
        let mut missions: Vec<Note> = self
            .store
            .notes()
            .await
            .into_iter()
            .filter(|n| n.is_mission && !n.mission_content.is_empty())
            .collect();
        missions.sort_by(|a, b| {
            a.is_mission_completed
                .cmp(&b.is_mission_completed)
                .then_with(|| b.updated_at.cmp(&a.updated_at))
        });
        Ok(missions)
    }

    /// Case-insensitive substring search over title, content and tag
    /// names. A blank query returns everything.
    pub async fn search(&self, query: &str) -> Result<Vec<Note>> {
        let notes = self.sorted_notes().await?;
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(notes);
        }

        Ok(notes
            .into_iter()
            .filter(|note| {
                note.title.to_lowercase().contains(&needle)
                    || note
                        .content
                        .as_deref()
                        .is_some_and(|c| c.to_lowercase().contains(&needle))
                    || note
                        .tags
                        .iter()
                        .any(|t| t.name.to_lowercase().contains(&needle))
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Tag;
    use tempfile::TempDir;

    async fn create_test_service() -> (QueryService, Store, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = Store::load(temp_dir.path().join("notes.json")).await;
        (QueryService::new(store.clone()), store, temp_dir)
    }

    #[tokio::test]
    async fn test_folders_sorted_favorite_then_name() {
        let (queries, store, _temp) = create_test_service().await;

        store.create_folder(Folder::new("Zebra")).await.unwrap();
        let mut starred = Folder::new("Yonder");
        starred.is_favorite = true;
        store.create_folder(starred).await.unwrap();
        store.create_folder(Folder::new("Apple")).await.unwrap();

        let folders = queries.folders().await.unwrap();
        let names: Vec<&str> = folders.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["Yonder", "Apple", "Root", "Zebra"]);
    }

    #[tokio::test]
    async fn test_sorted_notes_favorite_then_recency() {
        let (queries, store, _temp) = create_test_service().await;

        let old = store.create_note(Note::text("Old", "")).await.unwrap();
        let recent = store.create_note(Note::text("Recent", "")).await.unwrap();
        let mut starred = Note::text("Starred", "");
        starred.is_favorite = true;
        let starred = store.create_note(starred).await.unwrap();

        // Refresh "Recent" so it is the most recently updated non-favorite
        store.update_note(recent.clone()).await.unwrap();

        let notes = queries.sorted_notes().await.unwrap();
        assert_eq!(notes[0].id, starred.id);
        assert_eq!(notes[1].id, recent.id);
        assert_eq!(notes[2].id, old.id);
    }

    #[tokio::test]
    async fn test_missions_open_before_completed() {
        let (queries, store, _temp) = create_test_service().await;

        let mut done = Note::text("Done", "");
        done.set_mission_content("ship it");
        done.is_mission_completed = true;
        let done = store.create_note(done).await.unwrap();

        let mut open = Note::text("Open", "");
        open.set_mission_content("write docs");
        let open = store.create_note(open).await.unwrap();

        // A mission flag without content is not listed
        let mut empty = Note::text("Empty", "");
        empty.is_mission = true;
        store.create_note(empty).await.unwrap();

        let missions = queries.missions().await.unwrap();
        assert_eq!(missions.len(), 2);
        assert_eq!(missions[0].id, open.id);
        assert_eq!(missions[1].id, done.id);
    }

    #[tokio::test]
    async fn test_notes_in_unknown_folder_is_empty() {
        let (queries, store, _temp) = create_test_service().await;
        store.create_note(Note::text("Somewhere", "")).await.unwrap();

        let notes = queries.notes_in_folder(404).await.unwrap();
        assert!(notes.is_empty());
    }

    #[tokio::test]
    async fn test_search_matches_title_content_and_tags() {
        let (queries, store, _temp) = create_test_service().await;

        store
            .create_note(Note::text("Shopping", "buy milk"))
            .await
            .unwrap();
        let mut tagged = Note::text("Plain", "nothing here");
        tagged.tags.push(Tag::new("groceries"));
        store.create_note(tagged).await.unwrap();
        store
            .create_note(Note::text("Unrelated", "lorem"))
            .await
            .unwrap();

        assert_eq!(queries.search("MILK").await.unwrap().len(), 1);
        assert_eq!(queries.search("grocer").await.unwrap().len(), 1);
        assert_eq!(queries.search("shopping").await.unwrap().len(), 1);
        assert_eq!(queries.search("").await.unwrap().len(), 3);
        assert!(queries.search("absent").await.unwrap().is_empty());
    }
}
