//! Table definitions and the full-text search probe.

use sqlx::SqlitePool;

/// Main table. `id` is the stored identifier, `lastModified` Unix nanoseconds.
const CREATE_POSTINGS: &str = "CREATE TABLE IF NOT EXISTS postings (
    id INTEGER PRIMARY KEY,
    lastModified INTEGER NOT NULL,
    markdown TEXT NOT NULL
)";

/// External-content FTS5 index over `postings.markdown`, kept current by
/// triggers.
const CREATE_FTS: &str = "
CREATE VIRTUAL TABLE IF NOT EXISTS postings_FTS
    USING fts5(markdown, content='postings', content_rowid='id');

CREATE TRIGGER IF NOT EXISTS postings_ai AFTER INSERT ON postings BEGIN
    INSERT INTO postings_FTS(rowid, markdown) VALUES (new.id, new.markdown);
END;

CREATE TRIGGER IF NOT EXISTS postings_ad AFTER DELETE ON postings BEGIN
    INSERT INTO postings_FTS(postings_FTS, rowid, markdown)
        VALUES ('delete', old.id, old.markdown);
END;

CREATE TRIGGER IF NOT EXISTS postings_au AFTER UPDATE ON postings BEGIN
    INSERT INTO postings_FTS(postings_FTS, rowid, markdown)
        VALUES ('delete', old.id, old.markdown);
    INSERT INTO postings_FTS(rowid, markdown) VALUES (new.id, new.markdown);
END;
";

/// Create the postings table.
pub(crate) async fn create_tables(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(CREATE_POSTINGS).execute(pool).await?;
    Ok(())
}

/// Indexes rows written before the full-text table existed.
const REBUILD_FTS: &str = "INSERT INTO postings_FTS(postings_FTS) VALUES ('rebuild')";

/// Try to set up full-text search. Returns whether it is available.
///
/// Failure is expected on SQLite builds without FTS5 and is not an error.
/// A freshly created index is rebuilt so existing postings are searchable.
pub(crate) async fn probe_fts(pool: &SqlitePool) -> bool {
    let existed = sqlx::query_as::<_, (i64,)>(
        "SELECT COUNT(*) FROM sqlite_master WHERE name = 'postings_FTS'",
    )
    .fetch_one(pool)
    .await
    .is_ok_and(|(n,)| n > 0);

    if let Err(e) = sqlx::raw_sql(CREATE_FTS).execute(pool).await {
        tracing::info!(error = %e, "full-text search unavailable, using LIKE");
        return false;
    }
    if !existed {
        match sqlx::query(REBUILD_FTS).execute(pool).await {
            Ok(_) => tracing::debug!("full-text index built"),
            Err(e) => {
                tracing::warn!(error = %e, "failed to index existing postings, using LIKE");
                return false;
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

    use super::*;

    #[tokio::test]
    async fn test_index_picks_up_existing_rows() {
        let tmp = tempfile::tempdir().unwrap();
        let options = SqliteConnectOptions::new()
            .filename(tmp.path().join("postings.db"))
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new().connect_with(options).await.unwrap();
        create_tables(&pool).await.unwrap();
        sqlx::query("INSERT INTO postings (id, lastModified, markdown) VALUES (1, 0, ?)")
            .bind("written early")
            .execute(&pool)
            .await
            .unwrap();

        assert!(probe_fts(&pool).await);

        let (n,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM postings_FTS WHERE postings_FTS MATCH 'early'")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(n, 1);
        // A second probe leaves the existing index alone
        assert!(probe_fts(&pool).await);
        pool.close().await;
    }
}
