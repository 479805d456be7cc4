//! SQLite implementation of [`ArticleStore`]

use super::ArticleStore;
use crate::article::ArticleRecord;
use crate::error::{HarvestError, Result};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode};
use sqlx::{ConnectOptions, Connection, SqliteConnection};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Article store backed by a single SQLite connection
///
/// Transactions are plain `BEGIN IMMEDIATE`/`COMMIT` statements on that
/// connection, so the write lock is taken at `begin` and contention
/// surfaces there as [`HarvestError::StoreBusy`].
pub struct SqliteStore {
    conn: SqliteConnection,
}

impl SqliteStore {
    /// Open (or create) the database at `path` and bring its schema up to date
    ///
    /// Databases created without a `schema_version` table are adopted
    /// as-is, since version 1 only creates what is missing.
    pub async fn open(path: &Path) -> Result<Self> {
        let conn = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            // Busy is reported immediately; the caller owns the retry policy
            .busy_timeout(Duration::ZERO)
            .connect()
            .await?;

        debug!("Opened database: {}", path.display());

        let mut store = Self { conn };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Close the underlying connection
    pub async fn close(self) -> Result<()> {
        self.conn.close().await?;
        Ok(())
    }

    /// Article ids stored for a group, in insertion order
    pub async fn stored_article_ids(&mut self, group_id: i64) -> Result<Vec<u64>> {
        let ids: Vec<i64> =
            sqlx::query_scalar("SELECT article_id FROM articles WHERE group_id = ? ORDER BY id")
                .bind(group_id)
                .fetch_all(&mut self.conn)
                .await?;
        Ok(ids.into_iter().map(from_sql_int).collect())
    }

    /// Stored headers for one article, if present
    pub async fn find_article(
        &mut self,
        group_id: i64,
        article_id: u64,
    ) -> Result<Option<ArticleRecord>> {
        let row: Option<(i64, i64, Vec<u8>, Vec<u8>, Vec<u8>, Vec<u8>, i64)> = sqlx::query_as(
            "SELECT article_id, group_id, subject, message_id, poster, posted_at, bytes \
             FROM articles WHERE group_id = ? AND article_id = ? ORDER BY id LIMIT 1",
        )
        .bind(group_id)
        .bind(to_sql_int(article_id)?)
        .fetch_optional(&mut self.conn)
        .await?;

        Ok(row.map(
            |(article_id, group_id, subject, message_id, poster, posted_at, bytes)| ArticleRecord {
                article_id: from_sql_int(article_id),
                group_id,
                subject,
                message_id,
                poster,
                posted_at,
                bytes: from_sql_int(bytes),
            },
        ))
    }

    /// Articles whose subject contains `search`, paired with their group name
    ///
    /// `search` goes through `LIKE`, so `%` and `_` keep their wildcard meaning.
    /// Rows come back in insertion order.
    pub async fn articles_matching(
        &mut self,
        search: &str,
    ) -> Result<Vec<(String, ArticleRecord)>> {
        let rows: Vec<(String, i64, i64, Vec<u8>, Vec<u8>, Vec<u8>, Vec<u8>, i64)> =
            sqlx::query_as(
                "SELECT g.name, a.article_id, a.group_id, a.subject, a.message_id, \
                 a.poster, a.posted_at, a.bytes \
                 FROM articles a JOIN groups g ON g.id = a.group_id \
                 WHERE a.subject LIKE ? ORDER BY a.id",
            )
            .bind(format!("%{}%", search))
            .fetch_all(&mut self.conn)
            .await?;

        debug!("{} articles match {:?}", rows.len(), search);

        Ok(rows
            .into_iter()
            .map(
                |(group, article_id, group_id, subject, message_id, poster, posted_at, bytes)| {
                    let record = ArticleRecord {
                        article_id: from_sql_int(article_id),
                        group_id,
                        subject,
                        message_id,
                        poster,
                        posted_at,
                        bytes: from_sql_int(bytes),
                    };
                    (group, record)
                },
            )
            .collect())
    }

    async fn run_migrations(&mut self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY,
                applied_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&mut self.conn)
        .await
        .map_err(|e| {
            HarvestError::Migration(format!("Failed to create schema_version table: {}", e))
        })?;

        let current_version: Option<i64> =
            sqlx::query_scalar("SELECT MAX(version) FROM schema_version")
                .fetch_one(&mut self.conn)
                .await
                .map_err(|e| {
                    HarvestError::Migration(format!("Failed to query schema version: {}", e))
                })?;

        if current_version.unwrap_or(0) < 1 {
            self.migrate_v1().await?;
        }

        Ok(())
    }

    /// Migration v1: groups, articles and the article id index
    async fn migrate_v1(&mut self) -> Result<()> {
        info!("Applying database migration v1");

        sqlx::query("BEGIN")
            .execute(&mut self.conn)
            .await
            .map_err(|e| HarvestError::Migration(format!("Failed to begin transaction: {}", e)))?;

        let result = async {
            sqlx::query(
                "CREATE TABLE IF NOT EXISTS groups \
                 (id INTEGER PRIMARY KEY, name TEXT, last_article_id INTEGER)",
            )
            .execute(&mut self.conn)
            .await?;

            sqlx::query(
                "CREATE TABLE IF NOT EXISTS articles \
                 (id INTEGER PRIMARY KEY, article_id INTEGER, group_id INTEGER, \
                 subject TEXT, message_id TEXT, poster TEXT, posted_at TEXT, bytes INTEGER)",
            )
            .execute(&mut self.conn)
            .await?;

            sqlx::query(
                "CREATE INDEX IF NOT EXISTS articles_article_id ON articles (article_id)",
            )
            .execute(&mut self.conn)
            .await?;

            sqlx::query("INSERT INTO schema_version (version, applied_at) VALUES (?, ?)")
                .bind(1_i64)
                .bind(chrono::Utc::now().timestamp())
                .execute(&mut self.conn)
                .await?;

            Ok::<(), sqlx::Error>(())
        }
        .await;

        match result {
            Ok(()) => {
                sqlx::query("COMMIT")
                    .execute(&mut self.conn)
                    .await
                    .map_err(|e| {
                        HarvestError::Migration(format!("Failed to commit migration v1: {}", e))
                    })?;
                Ok(())
            }
            Err(e) => {
                let _ = sqlx::query("ROLLBACK").execute(&mut self.conn).await;
                Err(HarvestError::Migration(format!(
                    "Failed to create schema: {}",
                    e
                )))
            }
        }
    }
}

#[async_trait]
impl ArticleStore for SqliteStore {
    async fn find_or_create_group(&mut self, name: &str) -> Result<i64> {
        let existing: Option<i64> = sqlx::query_scalar("SELECT id FROM groups WHERE name = ?")
            .bind(name)
            .fetch_optional(&mut self.conn)
            .await?;

        if let Some(id) = existing {
            return Ok(id);
        }

        let result = sqlx::query("INSERT INTO groups (name) VALUES (?)")
            .bind(name)
            .execute(&mut self.conn)
            .await?;
        debug!("Created group {} with id {}", name, result.last_insert_rowid());
        Ok(result.last_insert_rowid())
    }

    async fn last_article_id(&mut self, group_id: i64) -> Result<u64> {
        let last: Option<Option<i64>> =
            sqlx::query_scalar("SELECT last_article_id FROM groups WHERE id = ?")
                .bind(group_id)
                .fetch_optional(&mut self.conn)
                .await?;
        Ok(last.flatten().map(from_sql_int).unwrap_or(0))
    }

    async fn set_last_article_id(&mut self, group_id: i64, article_id: u64) -> Result<()> {
        sqlx::query("UPDATE groups SET last_article_id = ? WHERE id = ?")
            .bind(to_sql_int(article_id)?)
            .bind(group_id)
            .execute(&mut self.conn)
            .await?;
        Ok(())
    }

    async fn begin(&mut self) -> Result<()> {
        sqlx::query("BEGIN IMMEDIATE")
            .execute(&mut self.conn)
            .await?;
        Ok(())
    }

    async fn insert_article(&mut self, article: &ArticleRecord) -> Result<i64> {
        // Header values are raw bytes; CAST keeps them verbatim but typed TEXT
        let result = sqlx::query(
            "INSERT INTO articles \
             (article_id, group_id, subject, message_id, poster, posted_at, bytes) \
             VALUES (?, ?, CAST(? AS TEXT), CAST(? AS TEXT), CAST(? AS TEXT), \
             CAST(? AS TEXT), ?)",
        )
        .bind(to_sql_int(article.article_id)?)
        .bind(article.group_id)
        .bind(article.subject.as_slice())
        .bind(article.message_id.as_slice())
        .bind(article.poster.as_slice())
        .bind(article.posted_at.as_slice())
        .bind(to_sql_int(article.bytes)?)
        .execute(&mut self.conn)
        .await?;
        Ok(result.last_insert_rowid())
    }

    async fn commit(&mut self) -> Result<()> {
        sqlx::query("COMMIT").execute(&mut self.conn).await?;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        sqlx::query("ROLLBACK").execute(&mut self.conn).await?;
        Ok(())
    }

    async fn article_count(&mut self, group_id: i64) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM articles WHERE group_id = ?")
            .bind(group_id)
            .fetch_one(&mut self.conn)
            .await?;
        Ok(from_sql_int(count))
    }
}

/// SQLite integers are signed 64-bit
fn to_sql_int(value: u64) -> Result<i64> {
    i64::try_from(value)
        .map_err(|_| HarvestError::Format(format!("{} does not fit an SQLite integer", value)))
}

fn from_sql_int(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}
