//! Store wrappers that inject busy and failing operations

use async_trait::async_trait;
use nntp_harvest::{ArticleRecord, ArticleStore, HarvestError, Result, SqliteStore};

/// Delegates to a [`SqliteStore`], failing chosen calls first
pub struct FlakyStore {
    pub inner: SqliteStore,
    /// `begin` calls that report busy before one succeeds
    pub busy_begins: usize,
    /// `commit` calls that report busy before one succeeds
    pub busy_commits: usize,
    /// Inserting this article id fails with a store error
    pub fail_insert_of: Option<u64>,
    pub begin_calls: usize,
    pub commit_calls: usize,
    pub rollback_calls: usize,
}

impl FlakyStore {
    pub fn new(inner: SqliteStore) -> Self {
        Self {
            inner,
            busy_begins: 0,
            busy_commits: 0,
            fail_insert_of: None,
            begin_calls: 0,
            commit_calls: 0,
            rollback_calls: 0,
        }
    }
}

#[async_trait]
impl ArticleStore for FlakyStore {
    async fn find_or_create_group(&mut self, name: &str) -> Result<i64> {
        self.inner.find_or_create_group(name).await
    }

    async fn last_article_id(&mut self, group_id: i64) -> Result<u64> {
        self.inner.last_article_id(group_id).await
    }

    async fn set_last_article_id(&mut self, group_id: i64, article_id: u64) -> Result<()> {
        self.inner.set_last_article_id(group_id, article_id).await
    }

    async fn begin(&mut self) -> Result<()> {
        self.begin_calls += 1;
        if self.busy_begins > 0 {
            self.busy_begins -= 1;
            return Err(HarvestError::StoreBusy);
        }
        self.inner.begin().await
    }

    async fn insert_article(&mut self, article: &ArticleRecord) -> Result<i64> {
        if self.fail_insert_of == Some(article.article_id) {
            return Err(HarvestError::Store(sqlx::Error::Protocol(
                "injected insert failure".to_string(),
            )));
        }
        self.inner.insert_article(article).await
    }

    async fn commit(&mut self) -> Result<()> {
        self.commit_calls += 1;
        if self.busy_commits > 0 {
            self.busy_commits -= 1;
            return Err(HarvestError::StoreBusy);
        }
        self.inner.commit().await
    }

    async fn rollback(&mut self) -> Result<()> {
        self.rollback_calls += 1;
        self.inner.rollback().await
    }

    async fn article_count(&mut self, group_id: i64) -> Result<u64> {
        self.inner.article_count(group_id).await
    }
}
