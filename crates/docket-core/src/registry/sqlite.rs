//! SQLite-backed registry.

use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::domain::{
    decide, AcquireState, Decision, DocId, DocKind, DocumentRecord, ErrorKind, RegistryError,
    RetryPolicy, Seed,
};
use crate::ports::{Registry, RegistryCounts};

/// SQLite implementation of the registry.
///
/// Design:
/// - One connection behind one async mutex. Every claim and every outcome
///   write happens under a single guard and commits immediately, so
///   concurrent claims on the same record are impossible and no progress is
///   ever held in memory only. Batched writes are deliberately not offered.
/// - Timestamps are stored as fixed-width RFC 3339 UTC text, which compares
///   correctly both in SQL and lexicographically.
pub struct SqliteRegistry {
    conn: Mutex<Connection>,
    max_attempts: u32,
    retry: RetryPolicy,
}

fn fmt_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(id: &str, field: &'static str, value: &str) -> Result<DateTime<Utc>, RegistryError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| RegistryError::CorruptRow {
            id: id.to_string(),
            field,
            value: value.to_string(),
        })
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS documents (
    id            TEXT PRIMARY KEY,
    source_url    TEXT NOT NULL UNIQUE,
    kind          TEXT NOT NULL,
    state         TEXT NOT NULL DEFAULT 'pending',
    attempts      INTEGER NOT NULL DEFAULT 0,
    last_error    TEXT,
    artifact_path TEXT,
    artifact_size INTEGER,
    content_hash  TEXT,
    next_retry_at TEXT,
    created_at    TEXT NOT NULL,
    updated_at    TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_documents_claim
    ON documents(state, kind, updated_at);
CREATE INDEX IF NOT EXISTS idx_documents_retry
    ON documents(next_retry_at) WHERE state = 'failed';
"#;

impl SqliteRegistry {
    /// Open (or create) a registry database at `path`.
    pub fn open(
        path: &Path,
        max_attempts: u32,
        retry: RetryPolicy,
    ) -> Result<Self, RegistryError> {
        let conn = Connection::open(path)?;
        Self::init(conn, max_attempts, retry)
    }

    /// In-memory registry, used by tests.
    pub fn open_in_memory(
        max_attempts: u32,
        retry: RetryPolicy,
    ) -> Result<Self, RegistryError> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn, max_attempts, retry)
    }

    fn init(
        conn: Connection,
        max_attempts: u32,
        retry: RetryPolicy,
    ) -> Result<Self, RegistryError> {
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
            max_attempts,
            retry,
        })
    }

    fn row_to_record(row: &Row<'_>) -> Result<DocumentRecord, RegistryError> {
        let id_str: String = row.get(0)?;
        let corrupt = |field: &'static str, value: String| RegistryError::CorruptRow {
            id: id_str.clone(),
            field,
            value,
        };

        let id = DocId::from_str(&id_str)
            .map_err(|_| corrupt("id", id_str.clone()))?;
        let source_url: String = row.get(1)?;
        let kind_str: String = row.get(2)?;
        let kind = DocKind::parse(&kind_str).ok_or_else(|| corrupt("kind", kind_str.clone()))?;
        let state_str: String = row.get(3)?;
        let state = AcquireState::parse(&state_str)
            .ok_or_else(|| corrupt("state", state_str.clone()))?;
        let attempts: u32 = row.get(4)?;
        let last_error = match row.get::<_, Option<String>>(5)? {
            Some(code) => {
                Some(ErrorKind::parse(&code).ok_or_else(|| corrupt("last_error", code.clone()))?)
            }
            None => None,
        };
        let artifact_path: Option<String> = row.get(6)?;
        let artifact_size: Option<u64> = row.get(7)?;
        let content_hash: Option<String> = row.get(8)?;
        let next_retry_at = match row.get::<_, Option<String>>(9)? {
            Some(ts) => Some(parse_ts(&id_str, "next_retry_at", &ts)?),
            None => None,
        };
        let created_at_str: String = row.get(10)?;
        let created_at = parse_ts(&id_str, "created_at", &created_at_str)?;
        let updated_at_str: String = row.get(11)?;
        let updated_at = parse_ts(&id_str, "updated_at", &updated_at_str)?;

        Ok(DocumentRecord {
            id,
            source_url,
            kind,
            state,
            attempts,
            last_error,
            artifact_path,
            artifact_size,
            content_hash,
            next_retry_at,
            created_at,
            updated_at,
        })
    }
}

const RECORD_COLUMNS: &str = "id, source_url, kind, state, attempts, last_error, \
     artifact_path, artifact_size, content_hash, next_retry_at, created_at, updated_at";

#[cfg(test)]
impl SqliteRegistry {
    /// Test helper: the sole record in a single-document scenario.
    pub(crate) async fn single_record(&self) -> DocumentRecord {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(&format!("SELECT {RECORD_COLUMNS} FROM documents"))
            .unwrap();
        let mut records: Vec<DocumentRecord> = stmt
            .query_map([], |row| Ok(Self::row_to_record(row)))
            .unwrap()
            .map(|r| r.unwrap().unwrap())
            .collect();
        assert_eq!(records.len(), 1, "expected exactly one record");
        records.pop().unwrap()
    }
}

#[async_trait]
impl Registry for SqliteRegistry {
    async fn ingest(&self, seeds: &[Seed]) -> Result<usize, RegistryError> {
        let conn = self.conn.lock().await;
        let now = fmt_ts(Utc::now());
        let mut created = 0usize;
        for seed in seeds {
            let record = DocumentRecord::new(seed.source_url.clone(), seed.kind);
            let changed = conn.execute(
                "INSERT OR IGNORE INTO documents \
                 (id, source_url, kind, state, attempts, created_at, updated_at) \
                 VALUES (?1, ?2, ?3, 'pending', 0, ?4, ?4)",
                params![record.id.to_string(), seed.source_url, seed.kind.as_str(), now],
            )?;
            created += changed;
        }
        info!(seeds = seeds.len(), created, "ingested seed batch");
        Ok(created)
    }

    async fn claim_next(&self) -> Result<Option<DocumentRecord>, RegistryError> {
        let conn = self.conn.lock().await;
        let now = fmt_ts(Utc::now());

        // Select and claim under one guard: the select can never race with
        // another worker's update.
        let candidate = conn
            .query_row(
                &format!(
                    "SELECT {RECORD_COLUMNS} FROM documents \
                     WHERE state IN ('pending', 'failed') \
                       AND kind != 'fragment' \
                       AND attempts < ?1 \
                       AND (next_retry_at IS NULL OR next_retry_at <= ?2) \
                     ORDER BY updated_at ASC \
                     LIMIT 1"
                ),
                params![self.max_attempts, now],
                |row| {
                    let id: String = row.get(0)?;
                    Ok(id)
                },
            )
            .optional()?;

        let Some(id_str) = candidate else {
            return Ok(None);
        };

        conn.execute(
            "UPDATE documents \
             SET state = 'in_progress', attempts = attempts + 1, \
                 next_retry_at = NULL, updated_at = ?2 \
             WHERE id = ?1",
            params![id_str, now],
        )?;

        let record = conn.query_row(
            &format!("SELECT {RECORD_COLUMNS} FROM documents WHERE id = ?1"),
            params![id_str],
            |row| Ok(Self::row_to_record(row)),
        )??;

        debug!(id = %record.id, url = %record.source_url, attempt = record.attempts, "claimed");
        Ok(Some(record))
    }

    async fn record_success(
        &self,
        id: DocId,
        artifact_path: &str,
        size: u64,
        content_hash: &str,
    ) -> Result<(), RegistryError> {
        let conn = self.conn.lock().await;
        let now = fmt_ts(Utc::now());
        let changed = conn.execute(
            "UPDATE documents \
             SET state = 'downloaded', artifact_path = ?2, artifact_size = ?3, \
                 content_hash = ?4, last_error = NULL, next_retry_at = NULL, \
                 updated_at = ?5 \
             WHERE id = ?1 AND state = 'in_progress'",
            params![id.to_string(), artifact_path, size, content_hash, now],
        )?;
        if changed == 0 {
            return Err(RegistryError::RecordNotFound(id.to_string()));
        }
        info!(%id, size, "downloaded");
        Ok(())
    }

    async fn record_failure(&self, id: DocId, error: ErrorKind) -> Result<(), RegistryError> {
        let conn = self.conn.lock().await;
        let id_str = id.to_string();
        let attempts: u32 = conn
            .query_row(
                "SELECT attempts FROM documents WHERE id = ?1 AND state = 'in_progress'",
                params![id_str],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| RegistryError::RecordNotFound(id_str.clone()))?;

        let now = Utc::now();
        match decide(&self.retry, error, attempts, self.max_attempts) {
            Decision::Retry { delay } => {
                let retry_at = now
                    + ChronoDuration::from_std(delay)
                        .unwrap_or_else(|_| ChronoDuration::days(3650));
                conn.execute(
                    "UPDATE documents \
                     SET state = 'failed', last_error = ?2, next_retry_at = ?3, \
                         updated_at = ?4 \
                     WHERE id = ?1",
                    params![id_str, error.as_str(), fmt_ts(retry_at), fmt_ts(now)],
                )?;
                warn!(%id, %error, attempts, retry_in = ?delay, "attempt failed, will retry");
            }
            Decision::Skip { classification } => {
                conn.execute(
                    "UPDATE documents \
                     SET state = 'skipped', last_error = ?2, next_retry_at = NULL, \
                         updated_at = ?3 \
                     WHERE id = ?1",
                    params![id_str, classification.as_str(), fmt_ts(now)],
                )?;
                warn!(%id, %error, classification = %classification, attempts, "skipped");
            }
        }
        Ok(())
    }

    async fn reconcile_stale_in_progress(&self) -> Result<usize, RegistryError> {
        let conn = self.conn.lock().await;
        let now = fmt_ts(Utc::now());
        let reverted = conn.execute(
            "UPDATE documents SET state = 'pending', updated_at = ?1 \
             WHERE state = 'in_progress'",
            params![now],
        )?;
        if reverted > 0 {
            info!(reverted, "reverted stale in-progress claims from a previous run");
        }
        Ok(reverted)
    }

    async fn outstanding(&self) -> Result<usize, RegistryError> {
        let conn = self.conn.lock().await;
        let count: usize = conn.query_row(
            "SELECT COUNT(*) FROM documents \
             WHERE kind != 'fragment' \
               AND (state = 'in_progress' \
                    OR (state IN ('pending', 'failed') AND attempts < ?1))",
            params![self.max_attempts],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    async fn counts(&self) -> Result<RegistryCounts, RegistryError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare("SELECT state, COUNT(*) FROM documents GROUP BY state")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, usize>(1)?))
        })?;

        let mut counts = RegistryCounts::default();
        for row in rows {
            let (state, n) = row?;
            match AcquireState::parse(&state) {
                Some(AcquireState::Pending) => counts.pending = n,
                Some(AcquireState::InProgress) => counts.in_progress = n,
                Some(AcquireState::Downloaded) => counts.downloaded = n,
                Some(AcquireState::Failed) => counts.failed = n,
                Some(AcquireState::Skipped) => counts.skipped = n,
                None => {
                    return Err(RegistryError::CorruptRow {
                        id: "<counts>".to_string(),
                        field: "state",
                        value: state,
                    })
                }
            }
        }
        Ok(counts)
    }

    async fn get(&self, id: DocId) -> Result<Option<DocumentRecord>, RegistryError> {
        let conn = self.conn.lock().await;
        let record = conn
            .query_row(
                &format!("SELECT {RECORD_COLUMNS} FROM documents WHERE id = ?1"),
                params![id.to_string()],
                |row| Ok(Self::row_to_record(row)),
            )
            .optional()?;
        record.transpose()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            base_delay: Duration::from_millis(1),
            multiplier: 1.0,
            jitter: 0.0,
        }
    }

    fn registry(max_attempts: u32) -> SqliteRegistry {
        SqliteRegistry::open_in_memory(max_attempts, fast_retry()).unwrap()
    }

    fn seeds(urls: &[&str]) -> Vec<Seed> {
        urls.iter().map(|u| Seed::from_url(*u)).collect()
    }

    #[tokio::test]
    async fn ingest_dedupes_by_source_url() {
        let reg = registry(3);
        let created = reg
            .ingest(&seeds(&["https://a.example/1", "https://a.example/2"]))
            .await
            .unwrap();
        assert_eq!(created, 2);

        // Same URLs again: nothing new.
        let created = reg
            .ingest(&seeds(&["https://a.example/1", "https://a.example/3"]))
            .await
            .unwrap();
        assert_eq!(created, 1);
        assert_eq!(reg.counts().await.unwrap().pending, 3);
    }

    #[tokio::test]
    async fn claim_marks_in_progress_and_counts_attempt() {
        let reg = registry(3);
        reg.ingest(&seeds(&["https://a.example/1"])).await.unwrap();

        let rec = reg.claim_next().await.unwrap().unwrap();
        assert_eq!(rec.state, AcquireState::InProgress);
        assert_eq!(rec.attempts, 1);

        // While claimed, nothing else is claimable.
        assert!(reg.claim_next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn fragments_are_never_claimed() {
        let reg = registry(3);
        reg.ingest(&seeds(&["https://a.example/1#part2"])).await.unwrap();
        assert!(reg.claim_next().await.unwrap().is_none());
        assert_eq!(reg.outstanding().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn concurrent_claims_are_exclusive() {
        let urls: Vec<String> = (0..40).map(|i| format!("https://a.example/{i}")).collect();
        let url_refs: Vec<&str> = urls.iter().map(String::as_str).collect();
        let reg = Arc::new(registry(1));
        reg.ingest(&seeds(&url_refs)).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let reg = Arc::clone(&reg);
            handles.push(tokio::spawn(async move {
                let mut ids = Vec::new();
                while let Some(rec) = reg.claim_next().await.unwrap() {
                    ids.push(rec.id);
                }
                ids
            }));
        }

        let mut all = Vec::new();
        for h in handles {
            all.extend(h.await.unwrap());
        }
        let unique: HashSet<_> = all.iter().copied().collect();
        assert_eq!(all.len(), 40, "every record claimed exactly once");
        assert_eq!(unique.len(), 40, "no record claimed twice");
    }

    #[tokio::test]
    async fn success_sets_artifact_fields() {
        let reg = registry(3);
        reg.ingest(&seeds(&["https://a.example/1"])).await.unwrap();
        let rec = reg.claim_next().await.unwrap().unwrap();

        reg.record_success(rec.id, "/data/artifacts/x.pdf", 1234, "abcd")
            .await
            .unwrap();

        let rec = reg.get(rec.id).await.unwrap().unwrap();
        assert_eq!(rec.state, AcquireState::Downloaded);
        assert_eq!(rec.artifact_path.as_deref(), Some("/data/artifacts/x.pdf"));
        assert_eq!(rec.artifact_size, Some(1234));
        assert_eq!(rec.content_hash.as_deref(), Some("abcd"));
        assert!(rec.last_error.is_none());
    }

    #[tokio::test]
    async fn retryable_failure_reverts_to_claimable_with_backoff() {
        let reg = registry(3);
        reg.ingest(&seeds(&["https://a.example/1"])).await.unwrap();
        let rec = reg.claim_next().await.unwrap().unwrap();

        reg.record_failure(rec.id, ErrorKind::NetworkError).await.unwrap();

        let rec = reg.get(rec.id).await.unwrap().unwrap();
        assert_eq!(rec.state, AcquireState::Failed);
        assert_eq!(rec.last_error, Some(ErrorKind::NetworkError));
        assert!(rec.next_retry_at.is_some());

        // Backoff is 1ms in tests; after it passes the record is claimable.
        tokio::time::sleep(Duration::from_millis(20)).await;
        let rec = reg.claim_next().await.unwrap().unwrap();
        assert_eq!(rec.attempts, 2);
    }

    #[tokio::test]
    async fn retryable_failures_exhaust_into_skipped() {
        let reg = registry(3);
        reg.ingest(&seeds(&["https://a.example/1"])).await.unwrap();

        let mut id = None;
        for _ in 0..3 {
            tokio::time::sleep(Duration::from_millis(5)).await;
            let rec = reg.claim_next().await.unwrap().unwrap();
            id = Some(rec.id);
            reg.record_failure(rec.id, ErrorKind::NetworkError).await.unwrap();
        }

        let rec = reg.get(id.unwrap()).await.unwrap().unwrap();
        assert_eq!(rec.state, AcquireState::Skipped);
        assert_eq!(rec.attempts, 3);
        assert_eq!(rec.last_error, Some(ErrorKind::RetryExhausted));
        assert!(reg.claim_next().await.unwrap().is_none());
        assert_eq!(reg.outstanding().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn not_found_skips_immediately_with_budget_remaining() {
        let reg = registry(3);
        reg.ingest(&seeds(&["https://a.example/1"])).await.unwrap();
        let rec = reg.claim_next().await.unwrap().unwrap();

        reg.record_failure(rec.id, ErrorKind::NotFound).await.unwrap();

        let rec = reg.get(rec.id).await.unwrap().unwrap();
        assert_eq!(rec.state, AcquireState::Skipped);
        assert_eq!(rec.attempts, 1);
        assert_eq!(rec.last_error, Some(ErrorKind::NotFound));
    }

    #[tokio::test]
    async fn reconcile_reverts_stale_claims() {
        let reg = registry(3);
        reg.ingest(&seeds(&["https://a.example/1"])).await.unwrap();
        let rec = reg.claim_next().await.unwrap().unwrap();

        // Simulate a killed worker: claim held, process gone.
        let reverted = reg.reconcile_stale_in_progress().await.unwrap();
        assert_eq!(reverted, 1);

        let back = reg.get(rec.id).await.unwrap().unwrap();
        assert_eq!(back.state, AcquireState::Pending);
        // The consumed attempt is not handed back.
        assert_eq!(back.attempts, 1);

        // And it is claimable again.
        let again = reg.claim_next().await.unwrap().unwrap();
        assert_eq!(again.id, rec.id);
        assert_eq!(again.attempts, 2);
    }

    #[tokio::test]
    async fn counts_track_states() {
        let reg = registry(3);
        reg.ingest(&seeds(&[
            "https://a.example/1",
            "https://a.example/2",
            "https://a.example/3",
        ]))
        .await
        .unwrap();

        let a = reg.claim_next().await.unwrap().unwrap();
        reg.record_success(a.id, "/p", 1, "h").await.unwrap();
        let b = reg.claim_next().await.unwrap().unwrap();
        reg.record_failure(b.id, ErrorKind::NotFound).await.unwrap();

        let counts = reg.counts().await.unwrap();
        assert_eq!(counts.pending, 1);
        assert_eq!(counts.downloaded, 1);
        assert_eq!(counts.skipped, 1);
        assert_eq!(counts.in_progress, 0);
        assert_eq!(counts.total(), 3);
    }

    #[tokio::test]
    async fn attempts_never_decrease() {
        let reg = registry(5);
        reg.ingest(&seeds(&["https://a.example/1"])).await.unwrap();

        let mut last = 0;
        for _ in 0..4 {
            tokio::time::sleep(Duration::from_millis(5)).await;
            let rec = reg.claim_next().await.unwrap().unwrap();
            assert!(rec.attempts > last);
            last = rec.attempts;
            reg.record_failure(rec.id, ErrorKind::Timeout).await.unwrap();
        }
    }
}
