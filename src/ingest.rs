//! Resumable batch ingestion
//!
//! A [`Harvester`] walks a group's article range in fixed-width windows.
//! Each window is fetched completely (every tracked field, aligned), then
//! written in one transaction together with the group's new watermark.
//! A crash at any point leaves the store at the last committed window, so
//! the next run resumes right after it.
//!
//! ```text
//! Init -> FetchWindow -> InsertBatch -> Advance -> FetchWindow | Done
//! ```

use crate::article::ArticleRecord;
use crate::client::{NntpClient, NntpIo};
use crate::commands::GroupInfo;
use crate::config::HarvestSettings;
use crate::error::{HarvestError, Result};
use crate::multiplex::{BatchWindow, HeaderMultiplexer, HeaderSource};
use crate::store::ArticleStore;
use tracing::{debug, info, warn};

/// Outcome of a harvest run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HarvestReport {
    /// Windows committed
    pub batches: u64,
    /// Article rows inserted
    pub articles: u64,
    /// Group watermark after the run
    pub watermark: u64,
}

/// Rows written inside the open transaction
#[derive(Debug, Clone, Copy, Default)]
struct BatchOutcome {
    inserted: u64,
    max_article_id: Option<u64>,
}

#[derive(Debug)]
enum Phase {
    Init,
    FetchWindow(BatchWindow),
    InsertBatch {
        window: BatchWindow,
        records: Vec<ArticleRecord>,
    },
    Advance {
        window: BatchWindow,
        outcome: BatchOutcome,
    },
    Done,
}

/// Drives one group's harvest from a header source into a store
pub struct Harvester<'a, H: ?Sized, S: ?Sized> {
    source: &'a mut H,
    store: &'a mut S,
    multiplexer: HeaderMultiplexer,
    settings: HarvestSettings,
}

impl<'a, H, S> Harvester<'a, H, S>
where
    H: HeaderSource + ?Sized,
    S: ArticleStore + ?Sized,
{
    /// Create a harvester; `run` validates `settings` before any work
    pub fn new(source: &'a mut H, store: &'a mut S, settings: HarvestSettings) -> Self {
        Self {
            source,
            store,
            multiplexer: HeaderMultiplexer::new(settings.fields.clone()),
            settings,
        }
    }

    /// Harvest `group_name` up to the server's high mark
    ///
    /// Any error other than a busy store aborts the run. Nothing from the
    /// failing window is committed; earlier windows stay committed.
    pub async fn run(&mut self, group_name: &str, group: &GroupInfo) -> Result<HarvestReport> {
        self.settings.validate()?;
        let batch_size = self.settings.batch_size;
        let mut report = HarvestReport::default();
        let mut group_id = 0;
        let mut phase = Phase::Init;

        loop {
            debug!("Harvest phase: {:?}", PhaseName(&phase));

            phase = match phase {
                Phase::Init => {
                    group_id = self.store.find_or_create_group(group_name).await?;
                    report.watermark = self.store.last_article_id(group_id).await?;
                    debug!(
                        "Group {} has id {}, watermark {}",
                        group_name, group_id, report.watermark
                    );

                    match BatchWindow::first(group.low, group.high, report.watermark, batch_size) {
                        Some(window) => Phase::FetchWindow(window),
                        None => {
                            info!("No articles to fetch");
                            Phase::Done
                        }
                    }
                }

                Phase::FetchWindow(window) => {
                    info!("Headers {} - {}", window.lower, window.upper);
                    let records = self
                        .multiplexer
                        .fetch_window(&mut *self.source, window, group_id)
                        .await?;
                    Phase::InsertBatch { window, records }
                }

                Phase::InsertBatch { window, records } => {
                    self.begin().await?;
                    let outcome = match self.insert_batch(&records).await {
                        Ok(outcome) => outcome,
                        Err(e) => return Err(self.abort(e).await),
                    };
                    Phase::Advance { window, outcome }
                }

                Phase::Advance { window, outcome } => {
                    if let Some(max_id) = outcome.max_article_id.filter(|id| *id > report.watermark)
                    {
                        if let Err(e) = self.store.set_last_article_id(group_id, max_id).await {
                            return Err(self.abort(e).await);
                        }
                        report.watermark = max_id;
                    }
                    self.commit().await?;

                    report.batches += 1;
                    report.articles += outcome.inserted;
                    info!(
                        "Committed {} articles, watermark {}",
                        outcome.inserted, report.watermark
                    );

                    match window.next(group.high, batch_size) {
                        Some(next) => Phase::FetchWindow(next),
                        None => Phase::Done,
                    }
                }

                Phase::Done => return Ok(report),
            };
        }
    }

    async fn insert_batch(&mut self, records: &[ArticleRecord]) -> Result<BatchOutcome> {
        let mut outcome = BatchOutcome::default();

        for record in records.iter().filter(|r| r.article_id != 0) {
            self.store.insert_article(record).await?;
            outcome.inserted += 1;
            outcome.max_article_id = outcome.max_article_id.max(Some(record.article_id));
        }

        Ok(outcome)
    }

    /// `begin`, retried while the store is busy
    async fn begin(&mut self) -> Result<()> {
        loop {
            match self.store.begin().await {
                Err(e) if e.is_transient() => self.wait_busy().await,
                other => return other,
            }
        }
    }

    /// `commit`, retried while the store is busy
    async fn commit(&mut self) -> Result<()> {
        loop {
            match self.store.commit().await {
                Err(e) if e.is_transient() => self.wait_busy().await,
                Err(e) => return Err(self.abort(e).await),
                Ok(()) => return Ok(()),
            }
        }
    }

    async fn wait_busy(&self) {
        warn!("Database is busy. Sleeping...");
        tokio::time::sleep(self.settings.busy_backoff).await;
    }

    /// Roll back the open transaction and hand back the original error
    async fn abort(&mut self, error: HarvestError) -> HarvestError {
        if let Err(rollback) = self.store.rollback().await {
            warn!("Rollback failed: {}", rollback);
        }
        error
    }
}

/// Authenticate, select `group_name` and harvest it into `store`
///
/// The session is left open; the caller sends QUIT.
pub async fn harvest_session<S, T>(
    client: &mut NntpClient<S>,
    store: &mut T,
    group_name: &str,
    settings: HarvestSettings,
) -> Result<HarvestReport>
where
    S: NntpIo,
    T: ArticleStore + ?Sized,
{
    client.authenticate().await?;

    let group = client.select_group(group_name).await?;
    info!(
        "Group {}: {} articles ({} - {})",
        group.name, group.count, group.low, group.high
    );

    Harvester::new(client, store, settings)
        .run(group_name, &group)
        .await
}

/// Phase label without the batch payload
struct PhaseName<'p>(&'p Phase);

impl std::fmt::Debug for PhaseName<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            Phase::Init => f.write_str("Init"),
            Phase::FetchWindow(w) => write!(f, "FetchWindow({}-{})", w.lower, w.upper),
            Phase::InsertBatch { window, records } => write!(
                f,
                "InsertBatch({}-{}, {} records)",
                window.lower,
                window.upper,
                records.len()
            ),
            Phase::Advance { window, .. } => write!(f, "Advance({}-{})", window.lower, window.upper),
            Phase::Done => f.write_str("Done"),
        }
    }
}
