//! SQLite-backed local search index.

use crate::error::{OffgridError, Result};
use crate::region::RegionEvictionListener;
use rusqlite::{params, params_from_iter, Connection, Row};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{debug, info};

use super::normalize::normalize_search_text;
use super::types::{EntryKind, SearchEntry, SearchOptions};

/// Read-only view of region state consulted by the index.
///
/// The index never changes region state; it only asks whether a region
/// exists (at insert) and whether it is live (at query).
pub trait RegionLiveness: Send + Sync {
    fn region_exists(&self, region_id: &str) -> Result<bool>;

    /// Ready and not expired.
    fn is_live(&self, region_id: &str) -> Result<bool>;
}

/// Match quality, best first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum MatchTier {
    Exact,
    Prefix,
    Substring,
}

impl MatchTier {
    fn of(search_text: &str, query: &str) -> Option<Self> {
        if search_text == query {
            Some(MatchTier::Exact)
        } else if search_text.starts_with(query) {
            Some(MatchTier::Prefix)
        } else if search_text.contains(query) {
            Some(MatchTier::Substring)
        } else {
            None
        }
    }
}

/// Local search index over addresses and points of interest.
pub struct SearchIndex {
    db_path: Option<PathBuf>,
    conn: Arc<Mutex<Connection>>,
    regions: Arc<dyn RegionLiveness>,
    storage_reads: AtomicU64,
}

impl SearchIndex {
    /// Open (or create) an index file.
    pub fn open(db_path: impl Into<PathBuf>, regions: Arc<dyn RegionLiveness>) -> Result<Self> {
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
            PRAGMA temp_store=MEMORY;
            ",
        )?;
        Self::ensure_schema(&conn)?;

        Ok(Self {
            db_path: Some(db_path),
            conn: Arc::new(Mutex::new(conn)),
            regions,
            storage_reads: AtomicU64::new(0),
        })
    }

    /// In-memory index.
    pub fn in_memory(regions: Arc<dyn RegionLiveness>) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::ensure_schema(&conn)?;
        Ok(Self {
            db_path: None,
            conn: Arc::new(Mutex::new(conn)),
            regions,
            storage_reads: AtomicU64::new(0),
        })
    }

    fn ensure_schema(conn: &Connection) -> Result<()> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS search_entries (
                id TEXT PRIMARY KEY,
                region_id TEXT NOT NULL,
                name TEXT NOT NULL,
                kind TEXT NOT NULL,
                latitude REAL NOT NULL,
                longitude REAL NOT NULL,
                search_text TEXT NOT NULL
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_search_entries_region ON search_entries(region_id)",
            [],
        )?;
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| OffgridError::lock_poisoned("search index"))
    }

    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Insert or replace `entries`, all owned by `region_id`, in one
    /// transaction.
    ///
    /// Nothing is written if any entry names another region or the region
    /// does not exist.
    pub fn upsert(&self, entries: &[SearchEntry], region_id: &str) -> Result<usize> {
        if let Some(stray) = entries.iter().find(|e| e.region_id != region_id) {
            return Err(OffgridError::RegionMismatch {
                entry_id: stray.id.clone(),
                expected: region_id.to_string(),
                actual: stray.region_id.clone(),
            });
        }
        if let Some(blank) = entries.iter().find(|e| e.id.trim().is_empty()) {
            return Err(OffgridError::invalid(
                "entry_id",
                format!("entry named {:?} has an empty id", blank.name),
            ));
        }
        if !self.regions.region_exists(region_id)? {
            return Err(OffgridError::RegionNotFound {
                region_id: region_id.to_string(),
            });
        }

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO search_entries (id, region_id, name, kind, latitude, longitude, search_text)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(id) DO UPDATE SET
                     region_id=excluded.region_id,
                     name=excluded.name,
                     kind=excluded.kind,
                     latitude=excluded.latitude,
                     longitude=excluded.longitude,
                     search_text=excluded.search_text",
            )?;
            for entry in entries {
                stmt.execute(params![
                    entry.id,
                    entry.region_id,
                    entry.name,
                    entry.kind.as_str(),
                    entry.latitude,
                    entry.longitude,
                    entry.search_text,
                ])?;
            }
        }
        tx.commit()?;

        debug!(region_id = %region_id, "Upserted {} search entries", entries.len());
        Ok(entries.len())
    }

    /// Delete every entry owned by `region_id`. Returns how many were removed.
    pub fn remove_by_region(&self, region_id: &str) -> Result<usize> {
        let conn = self.lock()?;
        let removed = conn.execute(
            "DELETE FROM search_entries WHERE region_id = ?1",
            params![region_id],
        )?;
        if removed > 0 {
            info!(region_id = %region_id, "Removed {} search entries", removed);
        }
        Ok(removed)
    }

    /// Ranked search over live regions.
    ///
    /// `query` is normalized before matching. A blank query returns no
    /// results without reading storage.
    pub fn search(&self, query: &str, options: &SearchOptions) -> Result<Vec<SearchEntry>> {
        let query = normalize_search_text(query);
        if query.is_empty() || options.limit == 0 {
            return Ok(Vec::new());
        }

        let start = Instant::now();
        let candidates = self.query_candidates(&query, options)?;
        let candidate_count = candidates.len();

        let mut live: HashMap<String, bool> = HashMap::new();
        let mut ranked = Vec::with_capacity(candidates.len());
        for entry in candidates {
            let is_live = match live.get(&entry.region_id) {
                Some(known) => *known,
                None => {
                    let known = self.regions.is_live(&entry.region_id)?;
                    live.insert(entry.region_id.clone(), known);
                    known
                }
            };
            if !is_live {
                continue;
            }
            if let Some(tier) = MatchTier::of(&entry.search_text, &query) {
                ranked.push((tier, entry.name.chars().count(), entry));
            }
        }

        ranked.sort_by(|a, b| {
            a.0.cmp(&b.0)
                .then(a.1.cmp(&b.1))
                .then_with(|| a.2.id.cmp(&b.2.id))
        });
        ranked.truncate(options.limit);

        debug!(
            query = %query,
            candidates = candidate_count,
            returned = ranked.len(),
            elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local search"
        );
        Ok(ranked.into_iter().map(|(_, _, entry)| entry).collect())
    }

    fn query_candidates(&self, query: &str, options: &SearchOptions) -> Result<Vec<SearchEntry>> {
        let mut sql = String::from(
            "SELECT id, region_id, name, kind, latitude, longitude, search_text
             FROM search_entries WHERE instr(search_text, ?1) > 0",
        );
        let mut values = vec![query.to_string()];
        if let Some(region_id) = &options.region_id {
            values.push(region_id.clone());
            sql.push_str(&format!(" AND region_id = ?{}", values.len()));
        }
        if let Some(kind) = options.kind {
            values.push(kind.as_str().to_string());
            sql.push_str(&format!(" AND kind = ?{}", values.len()));
        }

        self.storage_reads.fetch_add(1, Ordering::Relaxed);
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values.iter()), row_to_entry)?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }

    /// Number of storage queries issued by `search`.
    pub fn storage_reads(&self) -> u64 {
        self.storage_reads.load(Ordering::Relaxed)
    }

    pub fn count(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM search_entries", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn count_for_region(&self, region_id: &str) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM search_entries WHERE region_id = ?1",
            params![region_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

impl RegionEvictionListener for SearchIndex {
    fn on_region_evicted(&self, region_id: &str) -> Result<usize> {
        self.remove_by_region(region_id)
    }
}

fn row_to_entry(row: &Row<'_>) -> rusqlite::Result<SearchEntry> {
    let kind: String = row.get(3)?;
    let kind = EntryKind::parse(&kind).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            rusqlite::types::Type::Text,
            format!("unknown entry kind {:?}", kind).into(),
        )
    })?;
    Ok(SearchEntry {
        id: row.get(0)?,
        region_id: row.get(1)?,
        name: row.get(2)?,
        kind,
        latitude: row.get(4)?,
        longitude: row.get(5)?,
        search_text: row.get(6)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::Coordinate;
    use std::collections::HashSet;
    use tempfile::TempDir;

    #[derive(Default)]
    struct FakeRegions {
        existing: Mutex<HashSet<String>>,
        live: Mutex<HashSet<String>>,
    }

    impl FakeRegions {
        fn with_live(ids: &[&str]) -> Arc<Self> {
            let regions = Self::default();
            for id in ids {
                regions.existing.lock().unwrap().insert(id.to_string());
                regions.live.lock().unwrap().insert(id.to_string());
            }
            Arc::new(regions)
        }

        fn expire(&self, id: &str) {
            self.live.lock().unwrap().remove(id);
        }
    }

    impl RegionLiveness for FakeRegions {
        fn region_exists(&self, region_id: &str) -> Result<bool> {
            Ok(self.existing.lock().unwrap().contains(region_id))
        }

        fn is_live(&self, region_id: &str) -> Result<bool> {
            Ok(self.live.lock().unwrap().contains(region_id))
        }
    }

    fn addr(id: &str, region: &str, name: &str) -> SearchEntry {
        SearchEntry::address(id, region, name, Coordinate::new(0.0, 0.0))
    }

    fn names(entries: &[SearchEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.name.as_str()).collect()
    }

    #[test]
    fn test_ranking_tiers_and_ties() {
        let regions = FakeRegions::with_live(&["r1"]);
        let index = SearchIndex::in_memory(regions).unwrap();
        index
            .upsert(
                &[
                    addr("1", "r1", "My Central Deli"),
                    addr("2", "r1", "Central Park"),
                    addr("3", "r1", "Central Ave"),
                    addr("4", "r1", "Harbor Road"),
                ],
                "r1",
            )
            .unwrap();

        let results = index.search("central", &SearchOptions::default()).unwrap();
        assert_eq!(
            names(&results),
            vec!["Central Ave", "Central Park", "My Central Deli"]
        );
    }

    #[test]
    fn test_exact_match_first_and_id_tiebreak() {
        let regions = FakeRegions::with_live(&["r1"]);
        let index = SearchIndex::in_memory(regions).unwrap();
        index
            .upsert(
                &[
                    addr("b", "r1", "Oak St"),
                    addr("a", "r1", "Oak Sq"),
                    addr("c", "r1", "Oak"),
                ],
                "r1",
            )
            .unwrap();

        let results = index.search("OAK", &SearchOptions::default()).unwrap();
        let ids: Vec<&str> = results.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["addr-c", "addr-a", "addr-b"]);
    }

    #[test]
    fn test_blank_query_skips_storage() {
        let index = SearchIndex::in_memory(FakeRegions::with_live(&["r1"])).unwrap();
        index.upsert(&[addr("1", "r1", "Main St")], "r1").unwrap();

        assert!(index.search("", &SearchOptions::default()).unwrap().is_empty());
        assert!(index.search("  \t", &SearchOptions::default()).unwrap().is_empty());
        assert_eq!(index.storage_reads(), 0);

        index.search("main", &SearchOptions::default()).unwrap();
        assert_eq!(index.storage_reads(), 1);
    }

    #[test]
    fn test_region_mismatch_writes_nothing() {
        let index = SearchIndex::in_memory(FakeRegions::with_live(&["r1", "r2"])).unwrap();
        let err = index
            .upsert(&[addr("1", "r1", "A"), addr("2", "r2", "B")], "r1")
            .unwrap_err();
        assert!(matches!(err, OffgridError::RegionMismatch { .. }));
        assert_eq!(index.count().unwrap(), 0);
    }

    #[test]
    fn test_unknown_region_rejected() {
        let index = SearchIndex::in_memory(FakeRegions::with_live(&[])).unwrap();
        let err = index.upsert(&[addr("1", "ghost", "A")], "ghost").unwrap_err();
        assert!(matches!(err, OffgridError::RegionNotFound { .. }));
    }

    #[test]
    fn test_upsert_replaces_same_id() {
        let index = SearchIndex::in_memory(FakeRegions::with_live(&["r1"])).unwrap();
        index.upsert(&[addr("1", "r1", "Old Name")], "r1").unwrap();
        index.upsert(&[addr("1", "r1", "New Name")], "r1").unwrap();

        assert_eq!(index.count().unwrap(), 1);
        let results = index.search("name", &SearchOptions::default()).unwrap();
        assert_eq!(names(&results), vec!["New Name"]);
    }

    #[test]
    fn test_remove_by_region_is_idempotent() {
        let index = SearchIndex::in_memory(FakeRegions::with_live(&["r1", "r2"])).unwrap();
        index
            .upsert(&[addr("1", "r1", "Elm"), addr("2", "r1", "Elm 2")], "r1")
            .unwrap();
        index.upsert(&[addr("3", "r2", "Elm 3")], "r2").unwrap();

        assert_eq!(index.remove_by_region("r1").unwrap(), 2);
        assert_eq!(index.remove_by_region("r1").unwrap(), 0);
        assert_eq!(index.count_for_region("r2").unwrap(), 1);
    }

    #[test]
    fn test_expired_region_excluded_before_limit() {
        let regions = FakeRegions::with_live(&["old", "new"]);
        let index = SearchIndex::in_memory(regions.clone()).unwrap();
        index
            .upsert(&[addr("1", "old", "Pine"), addr("2", "old", "Pine A")], "old")
            .unwrap();
        index.upsert(&[addr("3", "new", "Pine Road")], "new").unwrap();

        regions.expire("old");
        let results = index
            .search("pine", &SearchOptions::default().with_limit(1))
            .unwrap();
        assert_eq!(names(&results), vec!["Pine Road"]);
    }

    #[test]
    fn test_filters_and_limit() {
        let index = SearchIndex::in_memory(FakeRegions::with_live(&["r1", "r2"])).unwrap();
        let at = Coordinate::new(0.0, 0.0);
        index
            .upsert(
                &[
                    addr("1", "r1", "Bakery Lane"),
                    SearchEntry::point_of_interest("1", "r1", "Rosie's", "Bakery", at),
                ],
                "r1",
            )
            .unwrap();
        index.upsert(&[addr("2", "r2", "Bakery Row")], "r2").unwrap();

        let pois = index
            .search(
                "bakery",
                &SearchOptions::default().of_kind(EntryKind::PointOfInterest),
            )
            .unwrap();
        assert_eq!(names(&pois), vec!["Rosie's"]);

        let scoped = index
            .search("bakery", &SearchOptions::default().in_region("r2"))
            .unwrap();
        assert_eq!(names(&scoped), vec!["Bakery Row"]);

        let limited = index
            .search("bakery", &SearchOptions::default().with_limit(2))
            .unwrap();
        assert_eq!(limited.len(), 2);
    }

    #[test]
    fn test_file_backed_index_persists() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("search.sqlite");
        let regions = FakeRegions::with_live(&["r1"]);

        {
            let index = SearchIndex::open(&path, regions.clone()).unwrap();
            index.upsert(&[addr("1", "r1", "Cedar Court")], "r1").unwrap();
        }

        let index = SearchIndex::open(&path, regions).unwrap();
        assert_eq!(index.db_path(), Some(path.as_path()));
        assert_eq!(index.count().unwrap(), 1);
    }
}
