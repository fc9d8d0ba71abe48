//! draftsmith: editor backend for a blogging platform
//!
//! Converts post content between HTML, a structured document tree and
//! Markdown, auto-saves drafts while a post is edited, and persists draft
//! snapshots to a SQLite store with a local file fallback.

pub mod autosave;
pub mod commands;
pub mod config;
pub mod content;
pub mod drafts;
pub mod error;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use drafts::{Database, DraftService, LocalDraftStore, StaticIdentity, TwoTierWriter, User};

/// The main application context
#[derive(Clone)]
pub struct Draftsmith {
    /// Loaded configuration
    pub config: config::DraftsmithConfig,
    /// Base directory
    pub base_dir: PathBuf,
    /// Directory of the local draft store
    pub local_dir: PathBuf,
}

impl Draftsmith {
    /// Create a new instance from a directory, reading `_config.yml` if present
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        let config_path = base_dir.join("_config.yml");

        let config = if config_path.exists() {
            config::DraftsmithConfig::load(&config_path)?
        } else {
            config::DraftsmithConfig::default()
        };

        let local_dir = base_dir.join(&config.local_store.dir);

        Ok(Self {
            config,
            base_dir,
            local_dir,
        })
    }

    /// Open the draft database, resolving relative paths against the base directory
    pub fn open_database(&self) -> Result<Database> {
        let mut db_config = self.config.database.clone();
        if db_config.path != drafts::IN_MEMORY && Path::new(&db_config.path).is_relative() {
            db_config.path = self
                .base_dir
                .join(&db_config.path)
                .to_string_lossy()
                .into_owned();
        }
        Database::open(&db_config)
            .with_context(|| format!("opening draft database {}", db_config.path))
    }

    pub fn local_store(&self) -> LocalDraftStore {
        LocalDraftStore::with_capacity(&self.local_dir, self.config.local_store.max_entries)
    }

    /// The acting user: an explicit id wins over the configured one
    pub fn identity(&self, user: Option<&str>) -> StaticIdentity {
        match user.or(self.config.user.as_deref()) {
            Some(id) => StaticIdentity::new(User::new(id)),
            None => StaticIdentity::anonymous(),
        }
    }

    pub fn draft_service(&self, db: &Database, user: Option<&str>) -> DraftService {
        DraftService::new(db.clone(), Arc::new(self.identity(user)))
    }

    /// Server store backed by the local store
    pub fn writer(&self, service: DraftService) -> TwoTierWriter {
        TwoTierWriter::new(Arc::new(service), Arc::new(self.local_store()))
            .with_display_limit(self.config.versions.display_limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_without_config() {
        let dir = tempfile::tempdir().unwrap();
        let app = Draftsmith::new(dir.path()).unwrap();
        assert_eq!(app.local_dir, dir.path().join(".draftsmith/local"));
        assert!(app.config.user.is_none());
    }

    #[test]
    fn test_opens_database_under_base_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("_config.yml"),
            "database:\n  path: data/drafts.db\nuser: alice\n",
        )
        .unwrap();
        let app = Draftsmith::new(dir.path()).unwrap();
        let db = app.open_database().unwrap();
        assert!(dir.path().join("data/drafts.db").exists());
        assert!(db.health_check().unwrap().healthy);
    }

    #[tokio::test]
    async fn test_identity_precedence() {
        use crate::drafts::IdentityProvider;

        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("_config.yml"), "user: alice\n").unwrap();
        let app = Draftsmith::new(dir.path()).unwrap();

        let configured = app.identity(None).current_user().await.unwrap();
        assert_eq!(configured.id, "alice");
        let explicit = app.identity(Some("bob")).current_user().await.unwrap();
        assert_eq!(explicit.id, "bob");
    }
}
