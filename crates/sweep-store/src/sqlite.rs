use std::{fs, path::Path, sync::Arc, time::Duration};

use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, Row, params};
use sweep_core::{ResultStore, StoreError};
use sweep_model::{RunPage, RunQuery, RunRecord};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use tracing::{debug, warn};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS cleanup_results (
  id TEXT PRIMARY KEY,
  host_info TEXT NOT NULL,
  start_time TEXT NOT NULL,
  end_time TEXT NOT NULL,
  duration_ms INTEGER NOT NULL,
  total_count INTEGER NOT NULL,
  removed INTEGER NOT NULL,
  skipped INTEGER NOT NULL,
  created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_cleanup_results_start_time ON cleanup_results(start_time);
CREATE INDEX IF NOT EXISTS idx_cleanup_results_created_at ON cleanup_results(created_at);
"#;

const COLUMNS: &str =
    "id, host_info, start_time, end_time, duration_ms, total_count, removed, skipped, created_at";

/// [`ResultStore`] backed by a single SQLite file.
///
/// Timestamps are stored as RFC 3339 UTC strings at second precision so that text order
/// matches time order.
#[derive(Clone)]
pub struct SqliteResultStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteResultStore {
    /// Open (or create) the database at `path`, creating parent directories as needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(dir) = path.parent()
            && !dir.as_os_str().is_empty()
        {
            fs::create_dir_all(dir).map_err(|e| {
                StoreError::Backend(format!("create directory {}: {e}", dir.display()))
            })?;
        }

        let conn = Connection::open(path).map_err(backend)?;
        if let Err(e) = conn.pragma_update(None, "journal_mode", "WAL") {
            warn!(error = %e, "failed to enable WAL mode");
        }
        Self::init(conn)
    }

    /// Private in-memory database.
    pub fn in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory().map_err(backend)?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA).map_err(backend)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || f(&conn.lock()))
            .await
            .map_err(|e| StoreError::Backend(format!("blocking task failed: {e}")))?
    }
}

#[async_trait]
impl ResultStore for SqliteResultStore {
    async fn save(&self, record: &RunRecord) -> Result<(), StoreError> {
        let record = record.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO cleanup_results
                 (id, host_info, start_time, end_time, duration_ms, total_count, removed, skipped, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    record.id,
                    record.host_info,
                    encode_time(record.started_at)?,
                    encode_time(record.finished_at)?,
                    i64::try_from(record.duration.as_millis()).unwrap_or(i64::MAX),
                    record.total as i64,
                    record.removed as i64,
                    record.skipped as i64,
                    encode_time(record.created_at)?,
                ],
            )
            .map_err(backend)?;
            debug!(id = %record.id, "saved run result");
            Ok(())
        })
        .await
    }

    async fn latest(&self) -> Result<Option<RunRecord>, StoreError> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {COLUMNS} FROM cleanup_results ORDER BY start_time DESC, id ASC LIMIT 1"
            );
            conn.query_row(&sql, [], read_row)
                .optional()
                .map_err(backend)?
                .transpose()
        })
        .await
    }

    async fn get(&self, id: &str) -> Result<Option<RunRecord>, StoreError> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            let sql = format!("SELECT {COLUMNS} FROM cleanup_results WHERE id = ?1");
            conn.query_row(&sql, [id], read_row)
                .optional()
                .map_err(backend)?
                .transpose()
        })
        .await
    }

    async fn list(&self, query: RunQuery) -> Result<RunPage<RunRecord>, StoreError> {
        self.with_conn(move |conn| {
            let total: i64 = conn
                .query_row("SELECT COUNT(*) FROM cleanup_results", [], |row| row.get(0))
                .map_err(backend)?;

            let sql = format!(
                "SELECT {COLUMNS} FROM cleanup_results
                 ORDER BY start_time DESC, id ASC LIMIT ?1 OFFSET ?2"
            );
            let mut stmt = conn.prepare(&sql).map_err(backend)?;
            let rows = stmt
                .query_map(params![query.limit as i64, query.offset as i64], read_row)
                .map_err(backend)?;

            let mut items = Vec::new();
            for row in rows {
                items.push(row.map_err(backend)??);
            }
            Ok(RunPage {
                items,
                total: total as usize,
            })
        })
        .await
    }
}

/// Row mapper; decoding errors surface as the inner `Err`.
fn read_row(row: &Row<'_>) -> rusqlite::Result<Result<RunRecord, StoreError>> {
    let id: String = row.get(0)?;
    let host_info: String = row.get(1)?;
    let start: String = row.get(2)?;
    let end: String = row.get(3)?;
    let duration_ms: i64 = row.get(4)?;
    let total: i64 = row.get(5)?;
    let removed: i64 = row.get(6)?;
    let skipped: i64 = row.get(7)?;
    let created: String = row.get(8)?;

    Ok((|| -> Result<RunRecord, StoreError> {
        Ok(RunRecord {
            started_at: decode_time(&start)?,
            finished_at: decode_time(&end)?,
            created_at: decode_time(&created)?,
            duration: Duration::from_millis(non_negative(duration_ms, "duration_ms")?),
            total: non_negative(total, "total_count")? as usize,
            removed: non_negative(removed, "removed")? as usize,
            skipped: non_negative(skipped, "skipped")? as usize,
            id,
            host_info,
        })
    })())
}

fn encode_time(t: OffsetDateTime) -> Result<String, StoreError> {
    let t = t.to_offset(time::UtcOffset::UTC);
    t.replace_nanosecond(0)
        .unwrap_or(t)
        .format(&Rfc3339)
        .map_err(|e| StoreError::Decode(format!("format timestamp: {e}")))
}

fn decode_time(s: &str) -> Result<OffsetDateTime, StoreError> {
    OffsetDateTime::parse(s, &Rfc3339)
        .map_err(|e| StoreError::Decode(format!("timestamp '{s}': {e}")))
}

fn non_negative(v: i64, column: &str) -> Result<u64, StoreError> {
    u64::try_from(v).map_err(|_| StoreError::Decode(format!("{column} is negative: {v}")))
}

fn backend(e: rusqlite::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn record(id: &str, started_at: OffsetDateTime) -> RunRecord {
        RunRecord {
            id: id.to_string(),
            host_info: "Host: node-1\nIP(s): 10.0.0.5".into(),
            started_at,
            finished_at: started_at + Duration::from_secs(90),
            duration: Duration::from_millis(90_250),
            total: 10,
            removed: 7,
            skipped: 3,
            created_at: started_at + Duration::from_secs(91),
        }
    }

    #[tokio::test]
    async fn save_and_get_roundtrip_in_utc() {
        let store = SqliteResultStore::in_memory().unwrap();
        let rec = record("run-1", datetime!(2024-03-01 07:00:00 +7));
        store.save(&rec).await.unwrap();

        let got = store.get("run-1").await.unwrap().unwrap();
        assert_eq!(got, rec);
        assert_eq!(got.started_at.offset(), time::UtcOffset::UTC);
        assert!(store.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_twice_keeps_one_row() {
        let store = SqliteResultStore::in_memory().unwrap();
        let rec = record("run-1", datetime!(2024-03-01 00:00:00 UTC));
        store.save(&rec).await.unwrap();
        store.save(&rec).await.unwrap();

        assert_eq!(store.list(RunQuery::new()).await.unwrap().total, 1);
    }

    #[tokio::test]
    async fn latest_and_paginated_list() {
        let store = SqliteResultStore::in_memory().unwrap();
        for (i, id) in ["a", "b", "c"].iter().enumerate() {
            let start = datetime!(2024-03-01 00:00:00 UTC) + Duration::from_secs(3600 * i as u64);
            store.save(&record(id, start)).await.unwrap();
        }

        assert_eq!(store.latest().await.unwrap().unwrap().id, "c");

        let page = store
            .list(RunQuery::new().with_limit(2).with_offset(1))
            .await
            .unwrap();
        assert_eq!(page.total, 3);
        let ids: Vec<_> = page.items.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["b", "a"]);
    }

    #[tokio::test]
    async fn persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("results.db");

        {
            let store = SqliteResultStore::open(&path).unwrap();
            store
                .save(&record("run-1", datetime!(2024-03-01 00:00:00 UTC)))
                .await
                .unwrap();
        }

        let store = SqliteResultStore::open(&path).unwrap();
        assert_eq!(store.latest().await.unwrap().unwrap().id, "run-1");
    }

    #[tokio::test]
    async fn empty_store() {
        let store = SqliteResultStore::in_memory().unwrap();
        assert!(store.latest().await.unwrap().is_none());
        let page = store.list(RunQuery::new()).await.unwrap();
        assert_eq!(page.total, 0);
        assert!(page.items.is_empty());
    }
}
