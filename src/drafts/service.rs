//! Server-side draft persistence

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use std::sync::Arc;

use super::db::Database;
use super::identity::{IdentityProvider, User};
use super::{Document, DraftSnapshot, Origin, VersionList};
use crate::error::DraftError;

const SNAPSHOT_COLUMNS: &str =
    "id, post_id, user_id, title, content, excerpt, cover_image, tags, created_at";

/// Draft store backed by the relational database
#[derive(Clone)]
pub struct DraftService {
    db: Database,
    identity: Arc<dyn IdentityProvider>,
}

impl DraftService {
    pub fn new(db: Database, identity: Arc<dyn IdentityProvider>) -> Self {
        Self { db, identity }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    async fn require_user(&self) -> Result<User, DraftError> {
        self.identity
            .current_user()
            .await
            .ok_or(DraftError::Unauthorized)
    }

    /// Store a new snapshot of the document for the current user
    pub async fn save(&self, document: &Document) -> Result<DraftSnapshot, DraftError> {
        let user = self.require_user().await?;
        let snapshot =
            DraftSnapshot::capture(uuid::Uuid::now_v7().to_string(), document, Origin::Server);

        self.db
            .with_conn(|conn| {
                conn.execute(
                    "INSERT INTO drafts (id, post_id, user_id, title, content, excerpt, cover_image, tags, created_at)
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
                    params![
                        snapshot.id,
                        snapshot.post_id,
                        user.id,
                        snapshot.title,
                        snapshot.content,
                        snapshot.excerpt,
                        snapshot.cover_image_url,
                        snapshot.tags,
                        snapshot.created_at.timestamp_millis(),
                    ],
                )
            })
            .inspect_err(|e| tracing::error!("Error saving draft: {}", e))?;

        tracing::debug!(
            "Saved draft {} for post {:?} ({} bytes)",
            snapshot.id,
            snapshot.post_id,
            snapshot.content.len()
        );
        Ok(snapshot)
    }

    /// The current user's snapshots for a post, or their unattached drafts
    /// when `post_id` is `None`; newest first
    pub async fn list(
        &self,
        post_id: Option<&str>,
        limit: usize,
    ) -> Result<VersionList, DraftError> {
        let user = self.require_user().await?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        let snapshots = self
            .db
            .with_conn(|conn| {
                let rows = match post_id {
                    Some(post_id) => {
                        let mut stmt = conn.prepare(&format!(
                            "SELECT {SNAPSHOT_COLUMNS} FROM drafts
                             WHERE post_id = ? AND user_id = ?
                             ORDER BY created_at DESC, rowid DESC LIMIT ?"
                        ))?;
                        let rows = stmt.query_map(params![post_id, user.id, limit], row_to_owned)?;
                        rows.collect::<rusqlite::Result<Vec<_>>>()?
                    }
                    None => {
                        let mut stmt = conn.prepare(&format!(
                            "SELECT {SNAPSHOT_COLUMNS} FROM drafts
                             WHERE post_id IS NULL AND user_id = ?
                             ORDER BY created_at DESC, rowid DESC LIMIT ?"
                        ))?;
                        let rows = stmt.query_map(params![user.id, limit], row_to_owned)?;
                        rows.collect::<rusqlite::Result<Vec<_>>>()?
                    }
                };
                Ok(rows)
            })
            .inspect_err(|e| tracing::error!("Error fetching draft versions: {}", e))?;

        // Rows are already ordered; keep that order for equal timestamps
        Ok(VersionList::new(
            snapshots.into_iter().map(|(snapshot, _)| snapshot).collect(),
        ))
    }

    /// A snapshot owned by the current user
    pub async fn get(&self, draft_id: &str) -> Result<DraftSnapshot, DraftError> {
        let user = self.require_user().await?;
        let (snapshot, owner) = self.find(draft_id)?;
        if owner != user.id {
            tracing::warn!("User {} denied access to draft {}", user.id, draft_id);
            return Err(DraftError::Unauthorized);
        }
        Ok(snapshot)
    }

    /// Delete a snapshot owned by the current user
    pub async fn delete(&self, draft_id: &str) -> Result<(), DraftError> {
        let user = self.require_user().await?;
        let (_, owner) = self.find(draft_id)?;
        if owner != user.id {
            tracing::warn!("User {} denied deletion of draft {}", user.id, draft_id);
            return Err(DraftError::Unauthorized);
        }

        let removed = self
            .db
            .with_conn(|conn| conn.execute("DELETE FROM drafts WHERE id = ?", [draft_id]))?;
        if removed == 0 {
            return Err(DraftError::NotFound(draft_id.to_string()));
        }
        tracing::debug!("Deleted draft {}", draft_id);
        Ok(())
    }

    fn find(&self, draft_id: &str) -> Result<(DraftSnapshot, String), DraftError> {
        self.db
            .with_conn(|conn| {
                conn.query_row(
                    &format!("SELECT {SNAPSHOT_COLUMNS} FROM drafts WHERE id = ?"),
                    [draft_id],
                    row_to_owned,
                )
                .optional()
            })?
            .ok_or_else(|| DraftError::NotFound(draft_id.to_string()))
    }
}

/// Map a row to its snapshot and owning user id
fn row_to_owned(row: &Row<'_>) -> rusqlite::Result<(DraftSnapshot, String)> {
    let created_at: i64 = row.get(8)?;
    let snapshot = DraftSnapshot {
        id: row.get(0)?,
        post_id: row.get(1)?,
        title: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
        content: row.get(4)?,
        excerpt: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
        cover_image_url: row.get::<_, Option<String>>(6)?.unwrap_or_default(),
        tags: row.get::<_, Option<String>>(7)?.unwrap_or_default(),
        created_at: DateTime::<Utc>::from_timestamp_millis(created_at).unwrap_or_default(),
        origin: Origin::Server,
    };
    Ok((snapshot, row.get(2)?))
}
