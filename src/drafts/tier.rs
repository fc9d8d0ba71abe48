//! Two-tier draft writes: server first, local ring buffer as fallback

use async_trait::async_trait;
use std::sync::Arc;

use super::{Document, DraftService, DraftSnapshot, LocalDraftStore, VersionList, DISPLAY_LIMIT};
use crate::error::DraftError;

/// A place snapshots can be written to and listed from
#[async_trait]
pub trait DraftTier: Send + Sync {
    async fn save(&self, document: &Document) -> Result<DraftSnapshot, DraftError>;

    async fn list(&self, post_id: Option<&str>, limit: usize) -> Result<VersionList, DraftError>;
}

#[async_trait]
impl DraftTier for DraftService {
    async fn save(&self, document: &Document) -> Result<DraftSnapshot, DraftError> {
        DraftService::save(self, document).await
    }

    async fn list(&self, post_id: Option<&str>, limit: usize) -> Result<VersionList, DraftError> {
        DraftService::list(self, post_id, limit).await
    }
}

#[async_trait]
impl DraftTier for LocalDraftStore {
    async fn save(&self, document: &Document) -> Result<DraftSnapshot, DraftError> {
        LocalDraftStore::save(self, document)
    }

    async fn list(&self, post_id: Option<&str>, limit: usize) -> Result<VersionList, DraftError> {
        Ok(LocalDraftStore::list(self, post_id, limit))
    }
}

/// Which tier accepted a save
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveTier {
    Primary,
    Fallback,
}

#[derive(Debug, Clone)]
pub struct SavedDraft {
    pub snapshot: DraftSnapshot,
    pub tier: SaveTier,
}

/// Writes to the primary tier and falls back to the secondary on failure
#[derive(Clone)]
pub struct TwoTierWriter {
    primary: Arc<dyn DraftTier>,
    fallback: Arc<dyn DraftTier>,
    display_limit: usize,
}

impl TwoTierWriter {
    pub fn new(primary: Arc<dyn DraftTier>, fallback: Arc<dyn DraftTier>) -> Self {
        Self {
            primary,
            fallback,
            display_limit: DISPLAY_LIMIT,
        }
    }

    /// Cap on the merged version history
    pub fn with_display_limit(mut self, display_limit: usize) -> Self {
        self.display_limit = display_limit;
        self
    }

    pub fn display_limit(&self) -> usize {
        self.display_limit
    }

    /// Persist a snapshot; fails only when both tiers fail
    pub async fn save(&self, document: &Document) -> Result<SavedDraft, DraftError> {
        match self.primary.save(document).await {
            Ok(snapshot) => Ok(SavedDraft {
                snapshot,
                tier: SaveTier::Primary,
            }),
            Err(primary_err) => {
                tracing::warn!("Server save failed, writing local draft: {}", primary_err);
                match self.fallback.save(document).await {
                    Ok(snapshot) => Ok(SavedDraft {
                        snapshot,
                        tier: SaveTier::Fallback,
                    }),
                    Err(fallback_err) => {
                        tracing::error!("Local draft save failed too: {}", fallback_err);
                        Err(primary_err)
                    }
                }
            }
        }
    }

    /// Version history from both tiers; local-only when the server is unreachable
    pub async fn list(&self, post_id: Option<&str>, limit: usize) -> VersionList {
        let server = match self.primary.list(post_id, limit).await {
            Ok(list) => list,
            Err(e) => {
                tracing::warn!("Error loading server draft versions: {}", e);
                VersionList::default()
            }
        };
        VersionList::merge(server, self.list_fallback(post_id).await, self.display_limit)
    }

    /// Version history from the fallback tier alone
    pub async fn list_fallback(&self, post_id: Option<&str>) -> VersionList {
        match self.fallback.list(post_id, self.display_limit).await {
            Ok(list) => list,
            Err(e) => {
                tracing::warn!("Error loading local draft versions: {}", e);
                VersionList::default()
            }
        }
    }
}
