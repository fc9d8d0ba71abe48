//! Drafts module - immutable snapshots of in-progress posts
//!
//! Snapshots are written to the server-side store first and to a bounded
//! local ring buffer when the server is unavailable. Both tiers speak the
//! [`DraftTier`] trait so the auto-save controller can treat them alike.

mod db;
mod identity;
mod local;
mod service;
mod tier;

pub use db::{Database, HealthStatus, IN_MEMORY};
pub use identity::{IdentityProvider, StaticIdentity, User};
pub use local::{storage_key, LocalDraftStore, NEW_POST_KEY};
pub use service::DraftService;
pub use tier::{DraftTier, SaveTier, SavedDraft, TwoTierWriter};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Number of snapshots shown in the version history
pub const DISPLAY_LIMIT: usize = 20;

/// Number of snapshots kept by the local fallback store
pub const LOCAL_RETENTION: usize = 10;

/// Default number of snapshots returned by a server listing
pub const DEFAULT_LIST_LIMIT: usize = 10;

/// The live content of one post being edited
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Owning post; `None` for a post that has never been saved
    pub post_id: Option<String>,
    pub title: String,
    pub content: String,
    pub excerpt: String,
    pub cover_image_url: String,
    /// Comma-separated tags
    pub tags: String,
}

impl Document {
    pub fn new(post_id: Option<String>, content: impl Into<String>) -> Self {
        Self {
            post_id,
            content: content.into(),
            ..Default::default()
        }
    }
}

/// Where a snapshot was persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Server,
    Local,
}

/// An immutable point-in-time capture of a document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftSnapshot {
    pub id: String,
    pub post_id: Option<String>,
    pub content: String,
    pub title: String,
    pub excerpt: String,
    pub cover_image_url: String,
    pub tags: String,
    pub created_at: DateTime<Utc>,
    pub origin: Origin,
}

impl DraftSnapshot {
    /// Capture a document under a new id
    pub fn capture(id: String, document: &Document, origin: Origin) -> Self {
        Self {
            id,
            post_id: document.post_id.clone(),
            content: document.content.clone(),
            title: document.title.clone(),
            excerpt: document.excerpt.clone(),
            cover_image_url: document.cover_image_url.clone(),
            tags: document.tags.clone(),
            created_at: Utc::now(),
            origin,
        }
    }

    /// Short preview of the content for version listings
    pub fn preview(&self, max_chars: usize) -> String {
        let text: String = self.content.chars().take(max_chars).collect();
        if self.content.chars().count() > max_chars {
            format!("{}...", text)
        } else {
            text
        }
    }
}

/// Snapshots ordered newest first, unique by id
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VersionList(Vec<DraftSnapshot>);

impl VersionList {
    /// Build a list from snapshots in any order
    pub fn new(snapshots: Vec<DraftSnapshot>) -> Self {
        let mut list = Self(snapshots);
        list.normalize();
        list
    }

    /// Merge server and local snapshots for display
    pub fn merge(server: VersionList, local: VersionList, cap: usize) -> Self {
        let mut all = server.0;
        all.extend(local.0);
        let mut merged = Self::new(all);
        merged.truncate(cap);
        merged
    }

    fn normalize(&mut self) {
        // Stable sort keeps the first-seen copy of a duplicate ahead
        self.0.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let mut seen = HashSet::new();
        self.0.retain(|s| seen.insert(s.id.clone()));
    }

    pub fn truncate(&mut self, cap: usize) {
        self.0.truncate(cap);
    }

    pub fn latest(&self) -> Option<&DraftSnapshot> {
        self.0.first()
    }

    pub fn find(&self, id: &str) -> Option<&DraftSnapshot> {
        self.0.iter().find(|s| s.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DraftSnapshot> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_vec(self) -> Vec<DraftSnapshot> {
        self.0
    }
}

impl IntoIterator for VersionList {
    type Item = DraftSnapshot;
    type IntoIter = std::vec::IntoIter<DraftSnapshot>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::snapshot;
    use super::*;

    fn ids(list: &VersionList) -> Vec<&str> {
        list.iter().map(|s| s.id.as_str()).collect()
    }

    #[test]
    fn test_version_list_sorted_newest_first() {
        let list = VersionList::new(vec![
            snapshot("a", 1, Origin::Server),
            snapshot("c", 3, Origin::Server),
            snapshot("b", 2, Origin::Server),
        ]);
        assert_eq!(ids(&list), vec!["c", "b", "a"]);
        assert_eq!(list.latest().unwrap().id, "c");
    }

    #[test]
    fn test_merge_dedups_and_caps() {
        let server = VersionList::new(vec![
            snapshot("s1", 10, Origin::Server),
            snapshot("shared", 5, Origin::Server),
        ]);
        let local = VersionList::new(vec![
            snapshot("l1", 20, Origin::Local),
            snapshot("shared", 5, Origin::Local),
            snapshot("l0", 1, Origin::Local),
        ]);

        let merged = VersionList::merge(server.clone(), local.clone(), DISPLAY_LIMIT);
        assert_eq!(ids(&merged), vec!["l1", "s1", "shared", "l0"]);
        assert_eq!(merged.find("shared").unwrap().origin, Origin::Server);

        let capped = VersionList::merge(server, local, 2);
        assert_eq!(ids(&capped), vec!["l1", "s1"]);
    }

    #[test]
    fn test_preview_truncates() {
        let mut snap = snapshot("p", 0, Origin::Local);
        snap.content = "abcdef".to_string();
        assert_eq!(snap.preview(3), "abc...");
        assert_eq!(snap.preview(10), "abcdef");
    }
}
