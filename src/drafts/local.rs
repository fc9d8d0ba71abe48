//! Local fallback store: a bounded ring buffer of snapshots per post

use std::fs;
use std::path::{Path, PathBuf};

use super::{Document, DraftSnapshot, Origin, VersionList, LOCAL_RETENTION};
use crate::error::DraftError;

/// Storage key used for posts that have never been saved
pub const NEW_POST_KEY: &str = "draft_new_post";

/// Storage key for a post's local drafts
pub fn storage_key(post_id: Option<&str>) -> String {
    match post_id {
        Some(id) => format!("draft_{}", id),
        None => NEW_POST_KEY.to_string(),
    }
}

/// Snapshots kept on local disk, one JSON file per storage key
#[derive(Debug, Clone)]
pub struct LocalDraftStore {
    dir: PathBuf,
    max_entries: usize,
}

impl LocalDraftStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self::with_capacity(dir, LOCAL_RETENTION)
    }

    pub fn with_capacity<P: AsRef<Path>>(dir: P, max_entries: usize) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            max_entries: max_entries.max(1),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, post_id: Option<&str>) -> PathBuf {
        // Keys become file names; anything outside the safe set is percent-encoded
        let mut key = String::new();
        for byte in storage_key(post_id).bytes() {
            if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
                key.push(char::from(byte));
            } else {
                key.push_str(&format!("%{:02X}", byte));
            }
        }
        self.dir.join(format!("{}.json", key))
    }

    /// Stored snapshots, newest first. Unreadable or corrupt files yield nothing.
    pub fn load(&self, post_id: Option<&str>) -> Vec<DraftSnapshot> {
        let path = self.path_for(post_id);
        let Ok(content) = fs::read_to_string(&path) else {
            return Vec::new();
        };
        match serde_json::from_str::<Vec<DraftSnapshot>>(&content) {
            Ok(drafts) => drafts,
            Err(e) => {
                tracing::warn!("Error parsing local drafts from {:?}: {}", path, e);
                Vec::new()
            }
        }
    }

    /// Prepend a snapshot of the document, keeping only the newest entries
    pub fn save(&self, document: &Document) -> Result<DraftSnapshot, DraftError> {
        let snapshot = DraftSnapshot::capture(
            format!("local_{}", uuid::Uuid::now_v7()),
            document,
            Origin::Local,
        );

        let post_id = document.post_id.as_deref();
        let mut drafts = self.load(post_id);
        drafts.insert(0, snapshot.clone());
        drafts.truncate(self.max_entries);

        fs::create_dir_all(&self.dir)?;
        let content = serde_json::to_string_pretty(&drafts)?;
        fs::write(self.path_for(post_id), content)?;

        tracing::debug!(
            "Saved local draft {} under {} ({} kept)",
            snapshot.id,
            storage_key(post_id),
            drafts.len()
        );
        Ok(snapshot)
    }

    pub fn list(&self, post_id: Option<&str>, limit: usize) -> VersionList {
        let mut list = VersionList::new(self.load(post_id));
        list.truncate(limit);
        list
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_keys() {
        assert_eq!(storage_key(Some("abc")), "draft_abc");
        assert_eq!(storage_key(None), NEW_POST_KEY);
    }

    #[test]
    fn test_save_and_load_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalDraftStore::new(dir.path());

        let first = store.save(&Document::new(Some("p1".into()), "one")).unwrap();
        let second = store.save(&Document::new(Some("p1".into()), "two")).unwrap();
        assert_eq!(first.origin, Origin::Local);
        assert!(first.id.starts_with("local_"));

        let loaded = store.load(Some("p1"));
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].id, second.id);
        assert_eq!(loaded[1].id, first.id);
        assert!(store.load(None).is_empty());
    }

    #[test]
    fn test_ring_buffer_capped() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalDraftStore::new(dir.path());

        for i in 0..15 {
            store.save(&Document::new(None, format!("v{}", i))).unwrap();
        }
        let loaded = store.load(None);
        assert_eq!(loaded.len(), LOCAL_RETENTION);
        assert_eq!(loaded[0].content, "v14");
        assert_eq!(loaded[LOCAL_RETENTION - 1].content, "v5");
    }

    #[test]
    fn test_corrupt_file_treated_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalDraftStore::new(dir.path());
        fs::write(dir.path().join("draft_new_post.json"), "{not json").unwrap();

        assert!(store.load(None).is_empty());
        // Saving replaces the corrupt file
        store.save(&Document::new(None, "fresh")).unwrap();
        assert_eq!(store.load(None).len(), 1);
    }

    #[test]
    fn test_list_respects_limit() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalDraftStore::new(dir.path());
        for i in 0..4 {
            store.save(&Document::new(Some("p".into()), format!("v{}", i))).unwrap();
        }
        let list = store.list(Some("p"), 2);
        assert_eq!(list.len(), 2);
        assert_eq!(list.latest().unwrap().content, "v3");
    }

    #[test]
    fn test_similar_post_ids_kept_apart() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalDraftStore::new(dir.path());

        store.save(&Document::new(Some("a/b".into()), "slash")).unwrap();
        store.save(&Document::new(Some("a_b".into()), "underscore")).unwrap();
        store.save(&Document::new(Some("a.b".into()), "dot")).unwrap();

        assert_eq!(store.load(Some("a/b"))[0].content, "slash");
        assert_eq!(store.load(Some("a_b"))[0].content, "underscore");
        assert_eq!(store.load(Some("a.b"))[0].content, "dot");
        assert_eq!(store.load(Some("a/b")).len(), 1);

        assert!(dir.path().join("draft_a%2Fb.json").exists());
        assert!(dir.path().join("draft_a_b.json").exists());
        assert!(dir.path().join("draft_a%2Eb.json").exists());
    }
}
