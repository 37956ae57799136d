// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The per-feed update pipeline: reconcile, download, publish, clean.

mod cleanup;
mod reconcile;
mod schedule;
#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{Instrument, error, info, info_span, warn};

use crate::config::FeedConfig;
use crate::episode::Downloader;
use crate::error::{CleanupError, PipelineError, PublishError, UpdateError};
use crate::listing::ListingProvider;
use crate::progress::{NoopReporter, ProgressEvent, SharedProgressReporter};
use crate::publish::{CatalogPublisher, FeedPublisher, NoopPublisher};
use crate::sponsor::{NoSegmentLookup, SegmentLookup};
use crate::storage::FileStorage;
use crate::store::EpisodeStore;
use crate::transcode::{FfmpegTranscoder, Transcoder};

pub use cleanup::clean;
pub use reconcile::{ReconcileReport, reconcile, reconcile_listing};
pub use schedule::{CandidateOutcome, ScheduleReport, Scheduler, select_candidates};

/// Result of one successful update run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateSummary {
    pub reconcile: ReconcileReport,
    pub schedule: ScheduleReport,
    pub cleaned: usize,
}

/// Runs update passes for feeds against a set of shared collaborators
///
/// One `Updater` can serve several feeds at once; each call to
/// [`Updater::update`] works on a single feed sequentially.
#[derive(Clone)]
pub struct Updater {
    store: Arc<dyn EpisodeStore>,
    storage: Arc<dyn FileStorage>,
    listing: Arc<dyn ListingProvider>,
    downloader: Arc<dyn Downloader>,
    lookup: Arc<dyn SegmentLookup>,
    transcoder: Arc<dyn Transcoder>,
    feed_publisher: Arc<dyn FeedPublisher>,
    catalog_publisher: Arc<dyn CatalogPublisher>,
    reporter: SharedProgressReporter,
}

impl Updater {
    pub fn new(
        store: Arc<dyn EpisodeStore>,
        storage: Arc<dyn FileStorage>,
        listing: Arc<dyn ListingProvider>,
        downloader: Arc<dyn Downloader>,
    ) -> Self {
        Self {
            store,
            storage,
            listing,
            downloader,
            lookup: Arc::new(NoSegmentLookup),
            transcoder: Arc::new(FfmpegTranscoder::default()),
            feed_publisher: Arc::new(NoopPublisher),
            catalog_publisher: Arc::new(NoopPublisher),
            reporter: NoopReporter::shared(),
        }
    }

    pub fn with_segment_lookup(mut self, lookup: Arc<dyn SegmentLookup>) -> Self {
        self.lookup = lookup;
        self
    }

    pub fn with_transcoder(mut self, transcoder: Arc<dyn Transcoder>) -> Self {
        self.transcoder = transcoder;
        self
    }

    pub fn with_publishers(
        mut self,
        feed_publisher: Arc<dyn FeedPublisher>,
        catalog_publisher: Arc<dyn CatalogPublisher>,
    ) -> Self {
        self.feed_publisher = feed_publisher;
        self.catalog_publisher = catalog_publisher;
        self
    }

    pub fn with_reporter(mut self, reporter: SharedProgressReporter) -> Self {
        self.reporter = reporter;
        self
    }

    /// Run one full update pass for `feed`
    ///
    /// Reconcile, download and both document rebuilds are fatal on error.
    /// Cleanup problems are logged and do not fail the run.
    pub async fn update(
        &self,
        feed: &FeedConfig,
        cancel: &CancellationToken,
    ) -> Result<UpdateSummary, UpdateError> {
        let span = info_span!("update", feed_id = %feed.id);
        async {
            self.reporter.report(ProgressEvent::UpdateStarted {
                feed_id: feed.id.clone(),
            });

            let result = self.run(feed, cancel).await;

            match &result {
                Ok(summary) => {
                    self.reporter.report(ProgressEvent::UpdateCompleted {
                        feed_id: feed.id.clone(),
                        downloaded: summary.schedule.downloaded,
                        skipped: summary.schedule.skipped,
                        deferred: summary.schedule.deferred,
                        failed: summary.schedule.failed,
                    });
                    info!("update completed");
                }
                Err(e) => {
                    self.reporter.report(ProgressEvent::UpdateFailed {
                        feed_id: feed.id.clone(),
                        error: e.to_string(),
                    });
                    error!(error = %e, "update failed");
                }
            }

            result
        }
        .instrument(span)
        .await
    }

    async fn run(
        &self,
        feed: &FeedConfig,
        cancel: &CancellationToken,
    ) -> Result<UpdateSummary, UpdateError> {
        if cancel.is_cancelled() {
            return Err(UpdateError::Cancelled);
        }

        let reconciled = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(PipelineError::Cancelled),
            result = reconcile(self.store.as_ref(), self.listing.as_ref(), feed) => result,
        };
        let reconciled = reconciled.map_err(|e| UpdateError::stage(UpdateError::Reconcile, e))?;

        self.reporter.report(ProgressEvent::ListingReconciled {
            feed_id: feed.id.clone(),
            title: reconciled.title.clone(),
            total_episodes: reconciled.total_episodes,
            removed_episodes: reconciled.removed.len(),
        });

        let scheduler = Scheduler {
            store: self.store.as_ref(),
            storage: self.storage.as_ref(),
            downloader: self.downloader.as_ref(),
            lookup: self.lookup.as_ref(),
            transcoder: self.transcoder.as_ref(),
            reporter: self.reporter.as_ref(),
        };
        let schedule = scheduler
            .run(feed, cancel)
            .await
            .map_err(|e| UpdateError::stage(UpdateError::Download, e))?;

        if cancel.is_cancelled() {
            return Err(UpdateError::Cancelled);
        }

        let stored = self
            .store
            .get_feed(&feed.id)
            .await
            .map_err(|e| UpdateError::FeedBuild(PublishError::Store(e)))?;
        self.feed_publisher
            .publish_feed(feed, &stored)
            .await
            .map_err(UpdateError::FeedBuild)?;

        self.catalog_publisher
            .publish_catalog(self.store.as_ref())
            .await
            .map_err(UpdateError::CatalogBuild)?;

        let cleaned = match clean(self.store.as_ref(), self.storage.as_ref(), feed).await {
            Ok(cleaned) => cleaned,
            Err(e) => {
                warn!(error = %e, "cleanup failed");
                match e {
                    CleanupError::Partial { cleaned, .. } => cleaned,
                    CleanupError::Walk(_) => 0,
                }
            }
        };
        if cleaned > 0 {
            self.reporter.report(ProgressEvent::CleanupCompleted {
                feed_id: feed.id.clone(),
                cleaned,
            });
        }

        Ok(UpdateSummary {
            reconcile: reconciled,
            schedule,
            cleaned,
        })
    }
}
