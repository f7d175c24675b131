use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::Connection;

use crate::errors::GateError;

use super::entry::{RescanEntry, RescanOutcome};

/// Durable keyed store of rescan entries, digest → entry.
///
/// Implementations serialize updates per connection, so concurrent writers
/// for the same digest cannot interleave partial updates; the last write
/// wins.
pub trait RescanStore: Send + Sync {
    fn get(&self, digest: &str) -> Result<Option<RescanEntry>, GateError>;
    /// Insert or replace the entry for `entry.digest`.
    fn put(&self, entry: &RescanEntry) -> Result<(), GateError>;
    fn list(&self) -> Result<Vec<RescanEntry>, GateError>;
    /// Atomically record a completed scan. This single update is the source
    /// of truth for due-ness; there is no separate "in progress" state that
    /// could strand an entry if the process dies mid-cycle.
    fn mark_scanned(
        &self,
        digest: &str,
        when: DateTime<Utc>,
        outcome: RescanOutcome,
    ) -> Result<(), GateError>;
}

const CREATE_TABLES: &str = "
CREATE TABLE IF NOT EXISTS rescan_entries (
    digest TEXT PRIMARY KEY,
    image TEXT NOT NULL,
    last_scanned TEXT,
    interval_secs INTEGER NOT NULL,
    last_outcome TEXT
);
";

/// SQLite-backed store. Survives process restarts; WAL mode for concurrent
/// readers.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub fn new(path: &Path) -> Result<Self, GateError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)
            .map_err(|e| GateError::SchedulePersistence(format!("Failed to open store: {}", e)))?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .map_err(|e| GateError::SchedulePersistence(format!("Failed to set pragmas: {}", e)))?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.initialize()?;
        Ok(store)
    }

    pub fn in_memory() -> Result<Self, GateError> {
        let conn = Connection::open_in_memory().map_err(|e| {
            GateError::SchedulePersistence(format!("Failed to open in-memory store: {}", e))
        })?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.initialize()?;
        Ok(store)
    }

    fn initialize(&self) -> Result<(), GateError> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(CREATE_TABLES)
            .map_err(|e| GateError::SchedulePersistence(format!("Failed to create tables: {}", e)))?;
        Ok(())
    }
}

fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<RescanEntry> {
    let last_scanned: Option<String> = row.get(2)?;
    let interval_secs: i64 = row.get(3)?;
    let last_outcome: Option<String> = row.get(4)?;
    Ok(RescanEntry {
        digest: row.get(0)?,
        image: row.get(1)?,
        last_scanned: last_scanned
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|dt| dt.with_timezone(&Utc)),
        interval: Duration::from_secs(interval_secs.max(0) as u64),
        last_outcome: last_outcome.as_deref().and_then(RescanOutcome::parse),
    })
}

impl RescanStore for SqliteStore {
    fn get(&self, digest: &str) -> Result<Option<RescanEntry>, GateError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT digest, image, last_scanned, interval_secs, last_outcome
                 FROM rescan_entries WHERE digest = ?1",
            )
            .map_err(|e| GateError::SchedulePersistence(format!("Query failed: {}", e)))?;

        match stmt.query_row(rusqlite::params![digest], row_to_entry) {
            Ok(entry) => Ok(Some(entry)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(GateError::SchedulePersistence(format!("Query error: {}", e))),
        }
    }

    fn put(&self, entry: &RescanEntry) -> Result<(), GateError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO rescan_entries (digest, image, last_scanned, interval_secs, last_outcome)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(digest) DO UPDATE SET
                 image = excluded.image,
                 last_scanned = excluded.last_scanned,
                 interval_secs = excluded.interval_secs,
                 last_outcome = excluded.last_outcome",
            rusqlite::params![
                entry.digest,
                entry.image,
                entry.last_scanned.map(|dt| dt.to_rfc3339()),
                entry.interval.as_secs() as i64,
                entry.last_outcome.map(|o| o.as_str()),
            ],
        )
        .map_err(|e| GateError::SchedulePersistence(format!("Put failed: {}", e)))?;
        Ok(())
    }

    fn list(&self) -> Result<Vec<RescanEntry>, GateError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT digest, image, last_scanned, interval_secs, last_outcome
                 FROM rescan_entries ORDER BY digest",
            )
            .map_err(|e| GateError::SchedulePersistence(format!("Query failed: {}", e)))?;

        let rows = stmt
            .query_map([], row_to_entry)
            .map_err(|e| GateError::SchedulePersistence(format!("Query failed: {}", e)))?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(
                row.map_err(|e| GateError::SchedulePersistence(format!("Row error: {}", e)))?,
            );
        }
        Ok(entries)
    }

    fn mark_scanned(
        &self,
        digest: &str,
        when: DateTime<Utc>,
        outcome: RescanOutcome,
    ) -> Result<(), GateError> {
        let conn = self.conn.lock().unwrap();
        let updated = conn
            .execute(
                "UPDATE rescan_entries SET last_scanned = ?2, last_outcome = ?3 WHERE digest = ?1",
                rusqlite::params![digest, when.to_rfc3339(), outcome.as_str()],
            )
            .map_err(|e| GateError::SchedulePersistence(format!("Update failed: {}", e)))?;
        if updated == 0 {
            return Err(GateError::SchedulePersistence(format!(
                "No rescan entry for digest {}",
                digest
            )));
        }
        Ok(())
    }
}

/// In-memory store for tests and dry runs.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, RescanEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RescanStore for MemoryStore {
    fn get(&self, digest: &str) -> Result<Option<RescanEntry>, GateError> {
        Ok(self.entries.lock().unwrap().get(digest).cloned())
    }

    fn put(&self, entry: &RescanEntry) -> Result<(), GateError> {
        self.entries
            .lock()
            .unwrap()
            .insert(entry.digest.clone(), entry.clone());
        Ok(())
    }

    fn list(&self) -> Result<Vec<RescanEntry>, GateError> {
        let mut entries: Vec<RescanEntry> =
            self.entries.lock().unwrap().values().cloned().collect();
        entries.sort_by(|a, b| a.digest.cmp(&b.digest));
        Ok(entries)
    }

    fn mark_scanned(
        &self,
        digest: &str,
        when: DateTime<Utc>,
        outcome: RescanOutcome,
    ) -> Result<(), GateError> {
        let mut entries = self.entries.lock().unwrap();
        match entries.get_mut(digest) {
            Some(entry) => {
                entry.last_scanned = Some(when);
                entry.last_outcome = Some(outcome);
                Ok(())
            }
            None => Err(GateError::SchedulePersistence(format!(
                "No rescan entry for digest {}",
                digest
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(digest: &str) -> RescanEntry {
        RescanEntry {
            digest: digest.to_string(),
            image: "app:1".to_string(),
            last_scanned: None,
            interval: Duration::from_secs(86_400),
            last_outcome: None,
        }
    }

    fn roundtrip(store: &dyn RescanStore) {
        store.put(&entry("sha256:a")).unwrap();
        store.put(&entry("sha256:b")).unwrap();

        let fetched = store.get("sha256:a").unwrap().unwrap();
        assert_eq!(fetched.image, "app:1");
        assert_eq!(fetched.last_scanned, None);
        assert!(store.get("sha256:missing").unwrap().is_none());
        assert_eq!(store.list().unwrap().len(), 2);

        let when = Utc::now();
        store
            .mark_scanned("sha256:a", when, RescanOutcome::Pass)
            .unwrap();
        let scanned = store.get("sha256:a").unwrap().unwrap();
        assert_eq!(scanned.last_outcome, Some(RescanOutcome::Pass));
        assert_eq!(
            scanned.last_scanned.unwrap().timestamp(),
            when.timestamp()
        );
    }

    #[test]
    fn test_sqlite_store_roundtrip() {
        let store = SqliteStore::in_memory().unwrap();
        roundtrip(&store);
    }

    #[test]
    fn test_memory_store_roundtrip() {
        let store = MemoryStore::new();
        roundtrip(&store);
    }

    #[test]
    fn test_sqlite_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rescan.db");

        {
            let store = SqliteStore::new(&path).unwrap();
            store.put(&entry("sha256:a")).unwrap();
            store
                .mark_scanned("sha256:a", Utc::now(), RescanOutcome::Fail)
                .unwrap();
        }

        let reopened = SqliteStore::new(&path).unwrap();
        let fetched = reopened.get("sha256:a").unwrap().unwrap();
        assert_eq!(fetched.last_outcome, Some(RescanOutcome::Fail));
        assert!(fetched.last_scanned.is_some());
    }

    #[test]
    fn test_mark_scanned_unknown_digest_errors() {
        let store = SqliteStore::in_memory().unwrap();
        let err = store
            .mark_scanned("sha256:ghost", Utc::now(), RescanOutcome::Pass)
            .unwrap_err();
        assert!(matches!(err, GateError::SchedulePersistence(_)));
    }

    #[test]
    fn test_put_is_upsert() {
        let store = SqliteStore::in_memory().unwrap();
        store.put(&entry("sha256:a")).unwrap();

        let mut updated = entry("sha256:a");
        updated.image = "app:2".to_string();
        store.put(&updated).unwrap();

        assert_eq!(store.list().unwrap().len(), 1);
        assert_eq!(store.get("sha256:a").unwrap().unwrap().image, "app:2");
    }
}
