use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tokio::sync::RwLock;

use scriv_storage::{
    PostingId, PostingStore, StoreError, StoreErrorKind, StoredPosting, WalkFn, effective_limit,
};

use crate::codec::{
    id_segments, posting_id_from_db, posting_id_to_db, time_from_db, time_to_db,
};
use crate::schema;

/// Backend identifier for error messages.
const BACKEND: &str = "Sqlite";

/// Deadline for every database round trip.
pub const QUERY_TIMEOUT: Duration = Duration::from_secs(5);

const MAX_CONNECTIONS: u32 = 4;

const COUNT_UNKNOWN: i64 = -1;

/// `(id, lastModified, markdown)` as selected from `postings`.
type Row = (i64, i64, String);

/// Convert a sqlx error into a storage error.
pub fn map_sqlx_error(err: sqlx::Error) -> StoreError {
    let kind = match err {
        sqlx::Error::RowNotFound => StoreErrorKind::NotFound,
        sqlx::Error::PoolTimedOut => StoreErrorKind::Timeout,
        _ => StoreErrorKind::Database,
    };
    StoreError::new(kind).with_backend(BACKEND).with_source(err)
}

/// Run a query under [`QUERY_TIMEOUT`].
async fn bounded<T>(
    query: impl Future<Output = Result<T, sqlx::Error>>,
) -> Result<T, StoreError> {
    match tokio::time::timeout(QUERY_TIMEOUT, query).await {
        Ok(result) => result.map_err(map_sqlx_error),
        Err(elapsed) => Err(StoreError::new(StoreErrorKind::Timeout)
            .with_backend(BACKEND)
            .with_source(elapsed)),
    }
}

fn into_posting((id, last_modified, markdown): Row) -> StoredPosting {
    StoredPosting {
        id: posting_id_from_db(id),
        last_modified: time_from_db(last_modified),
        markdown: markdown.trim().to_owned(),
    }
}

fn to_sql_int(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

/// Escape `%`, `_` and the escape character itself for `LIKE ... ESCAPE '\'`.
fn like_pattern(text: &str) -> String {
    let mut pattern = String::with_capacity(text.len() + 2);
    pattern.push('%');
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// Quote `text` as a single FTS5 phrase.
fn fts_phrase(text: &str) -> String {
    format!("\"{}\"", text.replace('"', "\"\""))
}

/// SQLite-backed posting store.
///
/// Markdown lives in a single `postings` table. Full-text search uses an FTS5
/// index when the SQLite build supports it and falls back to `LIKE`.
#[derive(Debug)]
pub struct SqliteStore {
    pool: SqlitePool,
    path: PathBuf,
    fts: bool,
    lock: RwLock<()>,
    count: AtomicI64,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `path`.
    ///
    /// Creates the schema and probes for full-text search support once.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let options = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true);

        let pool = bounded(
            SqlitePoolOptions::new()
                .max_connections(MAX_CONNECTIONS)
                .connect_with(options),
        )
        .await
        .map_err(|e| e.with_path(&path))?;

        bounded(schema::create_tables(&pool)).await?;
        let fts = schema::probe_fts(&pool).await;

        tracing::info!(path = %path.display(), fts, "opened sqlite store");
        Ok(Self {
            pool,
            path,
            fts,
            lock: RwLock::new(()),
            count: AtomicI64::new(COUNT_UNKNOWN),
        })
    }

    /// Database file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether searches go through the FTS5 index.
    #[must_use]
    pub fn has_full_text_search(&self) -> bool {
        self.fts
    }

    /// Close the connection pool, waiting for checked-out connections.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    fn invalidate_count(&self) {
        self.count.store(COUNT_UNKNOWN, Ordering::Release);
    }

    async fn upsert(&self, posting: &StoredPosting) -> Result<usize, StoreError> {
        if posting.id.is_unassigned() {
            return Err(StoreError::empty_posting().with_backend(BACKEND));
        }
        let markdown = posting.trimmed();
        if markdown.is_empty() {
            self.delete(posting.id).await?;
            return Ok(0);
        }

        let _guard = self.lock.write().await;
        bounded(
            sqlx::query(
                "INSERT INTO postings (id, lastModified, markdown) VALUES (?, ?, ?)
                 ON CONFLICT(id) DO UPDATE
                 SET lastModified = excluded.lastModified, markdown = excluded.markdown",
            )
            .bind(posting_id_to_db(posting.id))
            .bind(time_to_db(SystemTime::now()))
            .bind(markdown)
            .execute(&self.pool),
        )
        .await
        .map_err(|e| e.with_id(posting.id))?;
        self.invalidate_count();

        tracing::debug!(id = %posting.id, bytes = markdown.len(), "wrote posting");
        Ok(markdown.len())
    }
}

#[async_trait]
impl PostingStore for SqliteStore {
    fn name(&self) -> &'static str {
        BACKEND
    }

    async fn create(&self, posting: &StoredPosting) -> Result<usize, StoreError> {
        self.upsert(posting).await
    }

    async fn read(&self, id: PostingId) -> Result<StoredPosting, StoreError> {
        let _guard = self.lock.read().await;
        let row: Option<Row> = bounded(
            sqlx::query_as("SELECT id, lastModified, markdown FROM postings WHERE id = ?")
                .bind(posting_id_to_db(id))
                .fetch_optional(&self.pool),
        )
        .await
        .map_err(|e| e.with_id(id))?;

        row.map(into_posting)
            .ok_or_else(|| StoreError::not_found(id).with_backend(BACKEND))
    }

    async fn update(&self, posting: &StoredPosting) -> Result<usize, StoreError> {
        self.upsert(posting).await
    }

    async fn delete(&self, id: PostingId) -> Result<(), StoreError> {
        let _guard = self.lock.write().await;
        bounded(
            sqlx::query("DELETE FROM postings WHERE id = ?")
                .bind(posting_id_to_db(id))
                .execute(&self.pool),
        )
        .await
        .map_err(|e| e.with_id(id))?;
        self.invalidate_count();
        Ok(())
    }

    async fn exists(&self, id: PostingId) -> bool {
        let _guard = self.lock.read().await;
        let found: Result<(i64,), _> = bounded(
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM postings WHERE id = ?)")
                .bind(posting_id_to_db(id))
                .fetch_one(&self.pool),
        )
        .await;
        found.is_ok_and(|(n,)| n != 0)
    }

    async fn rename(&self, old: PostingId, new: PostingId) -> Result<(), StoreError> {
        if new.is_unassigned() {
            return Err(StoreError::empty_posting().with_backend(BACKEND));
        }
        if old == new {
            return self.read(old).await.map(|_| ());
        }

        let _guard = self.lock.write().await;
        let mut tx = bounded(self.pool.begin()).await?;

        bounded(
            sqlx::query("DELETE FROM postings WHERE id = ?")
                .bind(posting_id_to_db(new))
                .execute(&mut *tx),
        )
        .await?;

        let moved = bounded(
            sqlx::query("UPDATE postings SET id = ?, lastModified = ? WHERE id = ?")
                .bind(posting_id_to_db(new))
                .bind(time_to_db(SystemTime::now()))
                .bind(posting_id_to_db(old))
                .execute(&mut *tx),
        )
        .await?;

        if moved.rows_affected() == 0 {
            bounded(tx.rollback()).await?;
            return Err(StoreError::not_found(old).with_backend(BACKEND));
        }
        bounded(tx.commit()).await?;
        self.invalidate_count();

        tracing::debug!(%old, %new, "renamed posting");
        Ok(())
    }

    async fn search(
        &self,
        text: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<StoredPosting>, StoreError> {
        let limit = to_sql_int(effective_limit(limit));
        let offset = to_sql_int(offset);

        let _guard = self.lock.read().await;
        let rows: Vec<Row> = if self.fts && !text.trim().is_empty() {
            bounded(
                sqlx::query_as(
                    "SELECT p.id, p.lastModified, p.markdown
                     FROM postings p JOIN postings_FTS f ON f.rowid = p.id
                     WHERE postings_FTS MATCH ?
                     ORDER BY (p.id < 0) DESC, p.id DESC LIMIT ? OFFSET ?",
                )
                .bind(fts_phrase(text))
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool),
            )
            .await?
        } else {
            bounded(
                sqlx::query_as(
                    "SELECT id, lastModified, markdown FROM postings
                     WHERE markdown LIKE ? ESCAPE '\\'
                     ORDER BY (id < 0) DESC, id DESC LIMIT ? OFFSET ?",
                )
                .bind(like_pattern(text))
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool),
            )
            .await?
        };

        Ok(rows.into_iter().map(into_posting).collect())
    }

    fn location(&self, id: PostingId) -> String {
        format!("sqlite:{}#{id}", self.path.display())
    }

    async fn count(&self) -> Result<u32, StoreError> {
        let cached = self.count.load(Ordering::Acquire);
        if cached >= 0 {
            return Ok(u32::try_from(cached).unwrap_or(u32::MAX));
        }

        let _guard = self.lock.read().await;
        let (n,): (i64,) = bounded(
            sqlx::query_as("SELECT COUNT(*) FROM postings").fetch_one(&self.pool),
        )
        .await?;
        self.count.store(n, Ordering::Release);
        Ok(u32::try_from(n).unwrap_or(u32::MAX))
    }

    async fn walk(&self, f: &WalkFn<'_>) -> Result<(), StoreError> {
        let ids: Vec<(i64,)> = {
            let _guard = self.lock.read().await;
            bounded(
                sqlx::query_as("SELECT id FROM postings ORDER BY (id < 0) DESC, id DESC")
                    .fetch_all(&self.pool),
            )
            .await?
        };

        for (id,) in ids {
            if f(posting_id_from_db(id))?.is_break() {
                break;
            }
        }
        Ok(())
    }

    async fn newest(&self, limit: usize, offset: usize) -> Result<Vec<StoredPosting>, StoreError> {
        let _guard = self.lock.read().await;
        let rows: Vec<Row> = bounded(
            sqlx::query_as(
                "SELECT id, lastModified, markdown FROM postings
                 ORDER BY (id < 0) DESC, id DESC LIMIT ? OFFSET ?",
            )
            .bind(to_sql_int(limit))
            .bind(to_sql_int(offset))
            .fetch_all(&self.pool),
        )
        .await?;
        Ok(rows.into_iter().map(into_posting).collect())
    }

    async fn range(&self, lo: PostingId, hi: PostingId) -> Result<Vec<StoredPosting>, StoreError> {
        if lo >= hi {
            return Ok(Vec::new());
        }
        let [(a_lo, a_hi), (b_lo, b_hi)] = id_segments(lo, hi);
        let _guard = self.lock.read().await;
        let rows: Vec<Row> = bounded(
            sqlx::query_as(
                "SELECT id, lastModified, markdown FROM postings
                 WHERE id BETWEEN ? AND ? OR id BETWEEN ? AND ?
                 ORDER BY (id < 0) DESC, id DESC",
            )
            .bind(a_lo)
            .bind(a_hi)
            .bind(b_lo)
            .bind(b_hi)
            .fetch_all(&self.pool),
        )
        .await?;
        Ok(rows.into_iter().map(into_posting).collect())
    }
}

#[cfg(test)]
mod tests {
    use std::ops::ControlFlow;

    use pretty_assertions::assert_eq;

    use super::*;

    static_assertions::assert_impl_all!(SqliteStore: Send, Sync);

    async fn setup() -> (tempfile::TempDir, SqliteStore) {
        let tmp = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(tmp.path().join("postings.db"))
            .await
            .unwrap();
        (tmp, store)
    }

    async fn put(store: &SqliteStore, n: u64, markdown: &str) -> PostingId {
        let id = PostingId::new(n);
        store
            .create(&StoredPosting::new(id, markdown))
            .await
            .unwrap();
        id
    }

    fn markdowns(postings: Vec<StoredPosting>) -> Vec<String> {
        postings.into_iter().map(|p| p.markdown).collect()
    }

    #[tokio::test]
    async fn test_create_read_round_trip_trims() {
        let (_tmp, store) = setup().await;
        let id = put(&store, 1_546_300_800_000_000_000, "\n # Hello \n").await;

        let read = store.read(id).await.unwrap();

        assert_eq!(read.id, id);
        assert_eq!(read.markdown, "# Hello");
    }

    #[tokio::test]
    async fn test_ids_above_i64_max_round_trip() {
        let (_tmp, store) = setup().await;
        let big = put(&store, u64::MAX - 1, "far future").await;
        let small = put(&store, 7, "long ago").await;

        assert_eq!(store.read(big).await.unwrap().markdown, "far future");
        assert_eq!(markdowns(store.newest(10, 0).await.unwrap()), vec![
            "far future",
            "long ago"
        ]);
        assert!(store.exists(small).await);
    }

    #[tokio::test]
    async fn test_read_missing_is_not_found() {
        let (_tmp, store) = setup().await;
        let err = store.read(PostingId::new(3)).await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.backend(), Some("Sqlite"));
    }

    #[tokio::test]
    async fn test_update_replaces_content() {
        let (_tmp, store) = setup().await;
        let id = put(&store, 10, "before").await;

        store
            .update(&StoredPosting::new(id, "after"))
            .await
            .unwrap();

        assert_eq!(store.read(id).await.unwrap().markdown, "after");
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_unassigned_id_is_rejected() {
        let (_tmp, store) = setup().await;
        let err = store
            .create(&StoredPosting::new(PostingId::UNASSIGNED, "x"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), StoreErrorKind::EmptyPosting);
    }

    #[tokio::test]
    async fn test_empty_body_deletes() {
        let (_tmp, store) = setup().await;
        let id = put(&store, 10, "content").await;

        let written = store.update(&StoredPosting::new(id, "  ")).await.unwrap();

        assert_eq!(written, 0);
        assert!(!store.exists(id).await);
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let (_tmp, store) = setup().await;
        let id = put(&store, 10, "x").await;

        store.delete(id).await.unwrap();
        store.delete(id).await.unwrap();

        assert!(!store.exists(id).await);
    }

    #[tokio::test]
    async fn test_rename_moves_content() {
        let (_tmp, store) = setup().await;
        let old = put(&store, 10, "moving").await;
        let new = PostingId::new(u64::MAX - 10);

        store.rename(old, new).await.unwrap();

        assert!(!store.exists(old).await);
        assert_eq!(store.read(new).await.unwrap().markdown, "moving");
    }

    #[tokio::test]
    async fn test_rename_overwrites_destination() {
        let (_tmp, store) = setup().await;
        let old = put(&store, 10, "source").await;
        let new = put(&store, 20, "destination").await;

        store.rename(old, new).await.unwrap();

        assert_eq!(store.read(new).await.unwrap().markdown, "source");
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_rename_missing_source_rolls_back() {
        let (_tmp, store) = setup().await;
        let dest = put(&store, 20, "keep me").await;

        let err = store.rename(PostingId::new(10), dest).await.unwrap_err();

        assert!(err.is_not_found());
        assert_eq!(store.read(dest).await.unwrap().markdown, "keep me");
    }

    #[tokio::test]
    async fn test_count_tracks_mutations() {
        let (_tmp, store) = setup().await;
        assert_eq!(store.count().await.unwrap(), 0);

        let id = put(&store, 1, "a").await;
        put(&store, 2, "b").await;
        assert_eq!(store.count().await.unwrap(), 2);

        store.delete(id).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_full_text_search_matches_words() {
        let (_tmp, store) = setup().await;
        assert!(store.has_full_text_search());
        put(&store, 1, "Rust is fun").await;
        put(&store, 2, "nothing here").await;
        put(&store, 3, "more RUST").await;
        put(&store, 4, "rusty nails").await;

        assert_eq!(markdowns(store.search("rust", 0, 0).await.unwrap()), vec![
            "more RUST",
            "Rust is fun"
        ]);
        assert_eq!(markdowns(store.search("rust", 1, 1).await.unwrap()), vec![
            "Rust is fun"
        ]);
    }

    #[tokio::test]
    async fn test_full_text_index_follows_mutations() {
        let (_tmp, store) = setup().await;
        let id = put(&store, 1, "alpha").await;

        store
            .update(&StoredPosting::new(id, "beta"))
            .await
            .unwrap();
        assert!(store.search("alpha", 0, 0).await.unwrap().is_empty());

        store.rename(id, PostingId::new(2)).await.unwrap();
        let found = store.search("beta", 0, 0).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, PostingId::new(2));

        store.delete(PostingId::new(2)).await.unwrap();
        assert!(store.search("beta", 0, 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_like_fallback_matches_substrings() {
        let (_tmp, mut store) = setup().await;
        store.fts = false;
        put(&store, 1, "Rust is fun").await;
        put(&store, 2, "100% done").await;
        put(&store, 3, "rusty nails").await;

        assert_eq!(markdowns(store.search("rust", 0, 0).await.unwrap()), vec![
            "rusty nails",
            "Rust is fun"
        ]);
        assert_eq!(markdowns(store.search("%", 0, 0).await.unwrap()), vec![
            "100% done"
        ]);
    }

    #[tokio::test]
    async fn test_walk_newest_first_and_break() {
        let (_tmp, store) = setup().await;
        for n in 1..=3 {
            put(&store, n, "x").await;
        }
        let seen = std::sync::Mutex::new(Vec::new());

        store
            .walk(&|id| {
                let mut seen = seen.lock().unwrap();
                seen.push(id.as_u64());
                Ok(if seen.len() == 2 {
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                })
            })
            .await
            .unwrap();

        assert_eq!(seen.into_inner().unwrap(), vec![3, 2]);
    }

    #[tokio::test]
    async fn test_range_is_half_open() {
        let (_tmp, store) = setup().await;
        for n in [10, 20, 30] {
            put(&store, n, "x").await;
        }

        let ids: Vec<_> = store
            .range(PostingId::new(10), PostingId::new(30))
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.id.as_u64())
            .collect();

        assert_eq!(ids, vec![20, 10]);
    }

    #[tokio::test]
    async fn test_present_day_id_is_the_column_value() {
        let (_tmp, store) = setup().await;
        put(&store, 1_546_300_800_000_000_000, "new year").await;

        let (stored,): (i64,) = sqlx::query_as("SELECT id FROM postings")
            .fetch_one(&store.pool)
            .await
            .unwrap();

        assert_eq!(stored, 1_546_300_800_000_000_000);
    }

    #[tokio::test]
    async fn test_range_across_sign_boundary() {
        let (_tmp, store) = setup().await;
        let below = i64::MAX.unsigned_abs();
        for n in [below - 1, below, below + 1, below + 2] {
            put(&store, n, "x").await;
        }

        let ids: Vec<_> = store
            .range(PostingId::new(below), PostingId::new(below + 2))
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.id.as_u64())
            .collect();

        assert_eq!(ids, vec![below + 1, below]);
    }

    #[tokio::test]
    async fn test_reopen_keeps_data() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("postings.db");
        let id = PostingId::new(42);
        {
            let store = SqliteStore::open(&path).await.unwrap();
            store.create(&StoredPosting::new(id, "kept")).await.unwrap();
            store.close().await;
        }

        let store = SqliteStore::open(&path).await.unwrap();
        assert_eq!(store.read(id).await.unwrap().markdown, "kept");
        assert_eq!(store.search("kept", 0, 0).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_location_names_database_and_id() {
        let (tmp, store) = setup().await;
        let expected = format!(
            "sqlite:{}#000000000000002a",
            tmp.path().join("postings.db").display()
        );
        assert_eq!(store.location(PostingId::new(42)), expected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_query_times_out() {
        let err = bounded(std::future::pending::<Result<(), sqlx::Error>>())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), StoreErrorKind::Timeout);
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("50%_off\\"), "%50\\%\\_off\\\\%");
    }

    #[test]
    fn test_fts_phrase_quotes() {
        assert_eq!(fts_phrase("say \"hi\""), "\"say \"\"hi\"\"\"");
    }
}
