//! SQLite connection context for the draft store

use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::config::DatabaseConfig;
use crate::error::DraftError;

/// Path value that selects an in-memory database
pub const IN_MEMORY: &str = ":memory:";

/// SQL schema for the drafts table
const SCHEMA: &str = r#"
-- Append-only draft snapshots
CREATE TABLE IF NOT EXISTS drafts (
    id TEXT PRIMARY KEY,
    post_id TEXT,
    user_id TEXT NOT NULL,
    title TEXT,
    content TEXT NOT NULL,
    excerpt TEXT,
    cover_image TEXT,
    tags TEXT,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_drafts_post_id ON drafts(post_id);
CREATE INDEX IF NOT EXISTS idx_drafts_user_id ON drafts(user_id);
CREATE INDEX IF NOT EXISTS idx_drafts_created_at ON drafts(created_at);
"#;

/// Result of a database health check
#[derive(Debug, Clone)]
pub struct HealthStatus {
    pub healthy: bool,
    pub latency: Duration,
    pub draft_count: i64,
}

/// Explicit database context, opened and shut down by the host process
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Option<Connection>>>,
    location: String,
}

impl Database {
    /// Open the database described by the configuration and apply the schema
    pub fn open(config: &DatabaseConfig) -> Result<Self, DraftError> {
        let conn = if config.path == IN_MEMORY {
            Connection::open_in_memory()?
        } else {
            if let Some(parent) = Path::new(&config.path).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            Connection::open(&config.path)?
        };
        conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))?;
        conn.execute_batch(SCHEMA)?;

        tracing::debug!("Opened draft database at {}", config.path);
        Ok(Self {
            conn: Arc::new(Mutex::new(Some(conn))),
            location: config.path.clone(),
        })
    }

    pub fn open_in_memory() -> Result<Self, DraftError> {
        Self::open(&DatabaseConfig {
            path: IN_MEMORY.to_string(),
            ..Default::default()
        })
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    /// Round-trip a trivial query and count stored drafts
    pub fn health_check(&self) -> Result<HealthStatus, DraftError> {
        let start = Instant::now();
        let (one, draft_count) = self.with_conn(|conn| {
            let one: i64 = conn.query_row("SELECT 1", [], |row| row.get(0))?;
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM drafts", [], |row| row.get(0))?;
            Ok((one, count))
        })?;

        Ok(HealthStatus {
            healthy: one == 1,
            latency: start.elapsed(),
            draft_count,
        })
    }

    /// Close the connection; later operations fail with a persistence error
    pub fn shutdown(&self) {
        let closed = match self.conn.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(conn) = closed {
            if let Err((_, e)) = conn.close() {
                tracing::warn!("Error closing draft database: {}", e);
            }
            tracing::debug!("Closed draft database at {}", self.location);
        }
    }

    pub fn is_open(&self) -> bool {
        self.conn.lock().map(|g| g.is_some()).unwrap_or(false)
    }

    /// Run a closure against the open connection
    pub(crate) fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> rusqlite::Result<T>,
    ) -> Result<T, DraftError> {
        let guard = self
            .conn
            .lock()
            .map_err(|_| DraftError::Persistence("database lock poisoned".to_string()))?;
        let conn = guard
            .as_ref()
            .ok_or_else(|| DraftError::Persistence("database is closed".to_string()))?;
        Ok(f(conn)?)
    }
}
