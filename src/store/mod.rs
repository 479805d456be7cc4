//! Persistent article storage
//!
//! The harvester talks to storage only through [`ArticleStore`], an
//! explicitly transactional interface: the ingestion loop brackets each
//! batch with [`begin`](ArticleStore::begin) and
//! [`commit`](ArticleStore::commit) and moves the group's watermark
//! inside the same transaction.

mod sqlite;

pub use sqlite::SqliteStore;

use crate::article::ArticleRecord;
use crate::error::Result;
use async_trait::async_trait;

/// Default database file name
pub const DEFAULT_DATABASE: &str = "pwnntp.sqlite3";

/// Transactional store for groups and harvested article headers
///
/// `begin` and `commit` may fail with
/// [`HarvestError::StoreBusy`](crate::HarvestError::StoreBusy), which the
/// caller is expected to retry.
#[async_trait]
pub trait ArticleStore: Send {
    /// Id of the group named `name`, creating it if needed
    async fn find_or_create_group(&mut self, name: &str) -> Result<i64>;

    /// Highest article id committed for the group, 0 if none
    async fn last_article_id(&mut self, group_id: i64) -> Result<u64>;

    /// Move the group's watermark
    async fn set_last_article_id(&mut self, group_id: i64, article_id: u64) -> Result<()>;

    /// Open a write transaction
    async fn begin(&mut self) -> Result<()>;

    /// Insert one article row, returning its row id
    async fn insert_article(&mut self, article: &ArticleRecord) -> Result<i64>;

    /// Commit the open transaction
    async fn commit(&mut self) -> Result<()>;

    /// Abandon the open transaction
    async fn rollback(&mut self) -> Result<()>;

    /// Number of stored articles for the group
    async fn article_count(&mut self, group_id: i64) -> Result<u64>;
}
