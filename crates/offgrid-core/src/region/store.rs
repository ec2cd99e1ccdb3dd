//! SQLite persistence for region descriptors.

use crate::clock::DynClock;
use crate::error::{OffgridError, Result};
use crate::geo::BoundingBox;
use crate::index::RegionLiveness;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use super::types::{RegionDescriptor, RegionKind, RegionStatus};

const SELECT_COLUMNS: &str = "id, name, kind, status, min_lat, max_lat, min_lng, max_lng,
    min_zoom, max_zoom, created_at, expires_at, ttl_secs, size_bytes, last_error";

/// Durable table of region descriptors.
///
/// Liveness answers are evaluated against the injected clock.
pub struct RegionStore {
    db_path: Option<PathBuf>,
    conn: Arc<Mutex<Connection>>,
    clock: DynClock,
}

impl RegionStore {
    /// Open (or create) the store at `db_path`.
    pub fn open(db_path: impl Into<PathBuf>, clock: DynClock) -> Result<Self> {
        let db_path = db_path.into();

        if let Some(parent) = db_path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| OffgridError::io_with_path(e, parent))?;
            }
        }

        let conn = Connection::open(&db_path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode=WAL;
            PRAGMA busy_timeout=30000;
            PRAGMA synchronous=NORMAL;
            ",
        )?;
        Self::ensure_schema(&conn)?;

        Ok(Self {
            db_path: Some(db_path),
            conn: Arc::new(Mutex::new(conn)),
            clock,
        })
    }

    /// Non-durable store, used by tests and throwaway sessions.
    pub fn in_memory(clock: DynClock) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::ensure_schema(&conn)?;
        Ok(Self {
            db_path: None,
            conn: Arc::new(Mutex::new(conn)),
            clock,
        })
    }

    fn ensure_schema(conn: &Connection) -> Result<()> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS regions (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                kind TEXT NOT NULL,
                status TEXT NOT NULL,
                min_lat REAL NOT NULL,
                max_lat REAL NOT NULL,
                min_lng REAL NOT NULL,
                max_lng REAL NOT NULL,
                min_zoom INTEGER NOT NULL,
                max_zoom INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                expires_at TEXT NOT NULL,
                ttl_secs INTEGER NOT NULL,
                size_bytes INTEGER,
                last_error TEXT
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_regions_status ON regions(status)",
            [],
        )?;
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| OffgridError::lock_poisoned("region store"))
    }

    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    pub fn clock(&self) -> &DynClock {
        &self.clock
    }

    /// Insert or replace a descriptor.
    pub fn put(&self, descriptor: &RegionDescriptor) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO regions (id, name, kind, status, min_lat, max_lat, min_lng, max_lng,
                                  min_zoom, max_zoom, created_at, expires_at, ttl_secs,
                                  size_bytes, last_error)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
             ON CONFLICT(id) DO UPDATE SET
                 name=excluded.name,
                 kind=excluded.kind,
                 status=excluded.status,
                 min_lat=excluded.min_lat,
                 max_lat=excluded.max_lat,
                 min_lng=excluded.min_lng,
                 max_lng=excluded.max_lng,
                 min_zoom=excluded.min_zoom,
                 max_zoom=excluded.max_zoom,
                 created_at=excluded.created_at,
                 expires_at=excluded.expires_at,
                 ttl_secs=excluded.ttl_secs,
                 size_bytes=excluded.size_bytes,
                 last_error=excluded.last_error",
            params![
                descriptor.id,
                descriptor.name,
                descriptor.kind.as_str(),
                descriptor.status.as_str(),
                descriptor.bounds.min_lat,
                descriptor.bounds.max_lat,
                descriptor.bounds.min_lng,
                descriptor.bounds.max_lng,
                descriptor.min_zoom,
                descriptor.max_zoom,
                descriptor.created_at.to_rfc3339(),
                descriptor.expires_at.to_rfc3339(),
                descriptor.ttl_secs as i64,
                descriptor.size_bytes.map(|s| s as i64),
                descriptor.last_error,
            ],
        )?;
        debug!(region_id = %descriptor.id, status = %descriptor.status, "Stored region");
        Ok(())
    }

    /// Fetch a descriptor regardless of status or expiry.
    pub fn get(&self, id: &str) -> Result<Option<RegionDescriptor>> {
        let conn = self.lock()?;
        let sql = format!("SELECT {} FROM regions WHERE id = ?1", SELECT_COLUMNS);
        let row = conn
            .query_row(&sql, params![id], RawRow::from_row)
            .optional()?;
        row.map(RawRow::into_descriptor).transpose()
    }

    /// Every stored descriptor, ordered by creation time.
    pub fn list(&self) -> Result<Vec<RegionDescriptor>> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {} FROM regions ORDER BY created_at, id",
            SELECT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], RawRow::from_row)?;

        let mut descriptors = Vec::new();
        for row in rows {
            descriptors.push(row?.into_descriptor()?);
        }
        Ok(descriptors)
    }

    /// Update status of an existing descriptor. Returns false if it was removed.
    pub fn set_status(
        &self,
        id: &str,
        status: RegionStatus,
        last_error: Option<&str>,
    ) -> Result<bool> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE regions SET status = ?2, last_error = ?3 WHERE id = ?1",
            params![id, status.as_str(), last_error],
        )?;
        Ok(changed > 0)
    }

    /// Record a completed download. Returns the updated descriptor, or `None`
    /// if the descriptor was evicted while the download was running.
    pub fn mark_ready(
        &self,
        id: &str,
        size_bytes: u64,
        expires_at: DateTime<Utc>,
    ) -> Result<Option<RegionDescriptor>> {
        let changed = {
            let conn = self.lock()?;
            conn.execute(
                "UPDATE regions
                 SET status = ?2, size_bytes = ?3, expires_at = ?4, last_error = NULL
                 WHERE id = ?1",
                params![
                    id,
                    RegionStatus::Ready.as_str(),
                    size_bytes as i64,
                    expires_at.to_rfc3339()
                ],
            )?
        };
        if changed == 0 {
            return Ok(None);
        }
        self.get(id)
    }

    /// Remove a descriptor. Returns true if one existed.
    pub fn delete(&self, id: &str) -> Result<bool> {
        let conn = self.lock()?;
        let changed = conn.execute("DELETE FROM regions WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    }

    /// Mark downloads left unfinished by a previous process as failed.
    ///
    /// Returns the ids that were reset.
    pub fn fail_interrupted(&self) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id FROM regions WHERE status IN ('pending', 'downloading') ORDER BY id",
        )?;
        let ids: Vec<String> = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<_, _>>()?;

        if !ids.is_empty() {
            conn.execute(
                "UPDATE regions SET status = 'failed', last_error = 'interrupted'
                 WHERE status IN ('pending', 'downloading')",
                [],
            )?;
            info!("Marked {} interrupted region downloads as failed", ids.len());
        }
        Ok(ids)
    }

    pub fn count(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM regions", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

impl RegionLiveness for RegionStore {
    fn region_exists(&self, region_id: &str) -> Result<bool> {
        let conn = self.lock()?;
        let found = conn
            .query_row(
                "SELECT 1 FROM regions WHERE id = ?1",
                params![region_id],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn is_live(&self, region_id: &str) -> Result<bool> {
        let now = self.clock.now();
        Ok(self
            .get(region_id)?
            .map(|descriptor| descriptor.is_live(now))
            .unwrap_or(false))
    }
}

/// Column values as read, before enum and timestamp parsing.
struct RawRow {
    id: String,
    name: String,
    kind: String,
    status: String,
    bounds: BoundingBox,
    min_zoom: u8,
    max_zoom: u8,
    created_at: String,
    expires_at: String,
    ttl_secs: i64,
    size_bytes: Option<i64>,
    last_error: Option<String>,
}

impl RawRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            kind: row.get(2)?,
            status: row.get(3)?,
            bounds: BoundingBox {
                min_lat: row.get(4)?,
                max_lat: row.get(5)?,
                min_lng: row.get(6)?,
                max_lng: row.get(7)?,
            },
            min_zoom: row.get(8)?,
            max_zoom: row.get(9)?,
            created_at: row.get(10)?,
            expires_at: row.get(11)?,
            ttl_secs: row.get(12)?,
            size_bytes: row.get(13)?,
            last_error: row.get(14)?,
        })
    }

    fn into_descriptor(self) -> Result<RegionDescriptor> {
        let kind = RegionKind::parse(&self.kind).ok_or_else(|| corrupt(&self.id, "kind"))?;
        let status =
            RegionStatus::parse(&self.status).ok_or_else(|| corrupt(&self.id, "status"))?;
        Ok(RegionDescriptor {
            created_at: parse_timestamp(&self.id, &self.created_at)?,
            expires_at: parse_timestamp(&self.id, &self.expires_at)?,
            id: self.id,
            name: self.name,
            bounds: self.bounds,
            min_zoom: self.min_zoom,
            max_zoom: self.max_zoom,
            kind,
            size_bytes: self.size_bytes.map(|s| s.max(0) as u64),
            status,
            ttl_secs: self.ttl_secs.max(0) as u64,
            last_error: self.last_error,
        })
    }
}

fn parse_timestamp(id: &str, value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            warn!(region_id = %id, "Unreadable timestamp {:?}: {}", value, e);
            corrupt(id, "timestamp")
        })
}

fn corrupt(id: &str, column: &str) -> OffgridError {
    OffgridError::Database {
        message: format!("Corrupt {} column for region {}", column, id),
        source: None,
    }
}
