// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::fmt;
use std::ops::ControlFlow;
use std::path::Path;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::FeedConfig;
use crate::episode::{Downloader, episode_name};
use crate::error::{DownloadError, PipelineError, StorageError, StoreError, TranscodeError};
use crate::filter::EpisodeFilter;
use crate::model::Episode;
use crate::progress::{ProgressEvent, ProgressReporter};
use crate::sponsor::{
    DeferReason, SegmentLookup, defer_after_lookup, defer_before_lookup, delay_passed,
    is_passthrough, plan_keep_intervals,
};
use crate::storage::FileStorage;
use crate::store::{EpisodeStore, mark_downloaded, mark_failed};
use crate::transcode::Transcoder;

/// What happened to a single candidate
#[derive(Debug, Clone, PartialEq)]
pub enum CandidateOutcome {
    /// The blob already existed; recorded without fetching
    Skipped { size: u64 },
    Downloaded { size: u64 },
    /// Left `New` for a later run
    Deferred(DeferReason),
    /// Marked `Error`
    Failed(String),
    /// The source throttled us; the rest of the batch waits
    RateLimited,
}

impl fmt::Display for CandidateOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CandidateOutcome::Skipped { size } => write!(f, "already stored ({size} bytes)"),
            CandidateOutcome::Downloaded { size } => write!(f, "downloaded ({size} bytes)"),
            CandidateOutcome::Deferred(reason) => write!(f, "deferred: {reason}"),
            CandidateOutcome::Failed(error) => write!(f, "failed: {error}"),
            CandidateOutcome::RateLimited => f.write_str("rate limited"),
        }
    }
}

/// Counts of a scheduler run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScheduleReport {
    pub selected: usize,
    pub skipped: usize,
    pub downloaded: usize,
    pub deferred: usize,
    pub failed: usize,
    pub rate_limited: bool,
}

impl ScheduleReport {
    /// Fold one outcome in; `Break` ends the batch
    pub fn record(&mut self, outcome: &CandidateOutcome) -> ControlFlow<()> {
        match outcome {
            CandidateOutcome::Skipped { .. } => self.skipped += 1,
            CandidateOutcome::Downloaded { .. } => self.downloaded += 1,
            CandidateOutcome::Deferred(_) => self.deferred += 1,
            CandidateOutcome::Failed(_) => self.failed += 1,
            CandidateOutcome::RateLimited => {
                self.rate_limited = true;
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }
}

/// Pick the pending episodes to work on, in store order
///
/// Every pending episode consumes one unit of `page_size`, whether or not it
/// passes the feed filters. Scanning stops once the budget is used up.
pub async fn select_candidates(
    store: &dyn EpisodeStore,
    feed: &FeedConfig,
) -> Result<Vec<Episode>, StoreError> {
    let filter = EpisodeFilter::new(&feed.filters);
    let mut budget = feed.page_size;
    let mut selected = Vec::new();

    if budget == 0 {
        return Ok(selected);
    }

    store
        .walk_episodes(&feed.id, &mut |episode: &Episode| {
            if !episode.status.is_pending() {
                return ControlFlow::Continue(());
            }

            budget -= 1;
            if filter.matches(episode) {
                selected.push(episode.clone());
            } else {
                debug!(episode_id = %episode.id, "episode filtered out");
            }

            if budget == 0 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })
        .await?;

    Ok(selected)
}

/// Downloads, trims and stores the pending episodes of one feed, one at a time
pub struct Scheduler<'a> {
    pub store: &'a dyn EpisodeStore,
    pub storage: &'a dyn FileStorage,
    pub downloader: &'a dyn Downloader,
    pub lookup: &'a dyn SegmentLookup,
    pub transcoder: &'a dyn Transcoder,
    pub reporter: &'a dyn ProgressReporter,
}

impl Scheduler<'_> {
    /// Select candidates and process them in order
    pub async fn run(
        &self,
        feed: &FeedConfig,
        cancel: &CancellationToken,
    ) -> Result<ScheduleReport, PipelineError> {
        let candidates = select_candidates(self.store, feed).await?;
        let mut report = ScheduleReport {
            selected: candidates.len(),
            ..Default::default()
        };

        self.reporter.report(ProgressEvent::CandidatesSelected {
            feed_id: feed.id.clone(),
            count: candidates.len(),
        });

        if candidates.is_empty() {
            info!(feed_id = %feed.id, "no episodes to download");
            return Ok(report);
        }
        info!(feed_id = %feed.id, count = candidates.len(), "processing episodes");

        for (index, episode) in candidates.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(PipelineError::Cancelled);
            }

            self.reporter.report(ProgressEvent::EpisodeStarting {
                feed_id: feed.id.clone(),
                episode_id: episode.id.clone(),
                title: episode.title.clone(),
                index,
                total: candidates.len(),
            });

            let outcome = self.process(feed, episode, cancel).await?;
            debug!(episode_id = %episode.id, %outcome, "candidate processed");

            self.reporter.report(ProgressEvent::EpisodeFinished {
                feed_id: feed.id.clone(),
                episode_id: episode.id.clone(),
                outcome: outcome.to_string(),
            });

            if report.record(&outcome).is_break() {
                warn!(
                    feed_id = %feed.id,
                    remaining = candidates.len() - index - 1,
                    "source responded with 'Too Many Requests', stopping batch"
                );
                break;
            }
        }

        info!(
            feed_id = %feed.id,
            downloaded = report.downloaded,
            skipped = report.skipped,
            deferred = report.deferred,
            failed = report.failed,
            "downloads finished"
        );
        Ok(report)
    }

    async fn process(
        &self,
        feed: &FeedConfig,
        episode: &Episode,
        cancel: &CancellationToken,
    ) -> Result<CandidateOutcome, PipelineError> {
        let name = episode_name(feed.format, episode);

        match self.storage.size(&feed.id, &name).await {
            Ok(size) => {
                info!(episode_id = %episode.id, "episode already exists in storage");
                self.store
                    .update_episode(&feed.id, &episode.id, mark_downloaded(size))
                    .await?;
                return Ok(CandidateOutcome::Skipped { size });
            }
            Err(StorageError::NotFound { .. }) => {}
            Err(e) => return Err(e.into()),
        }

        let mode = feed.sponsorblock_mode;
        let delay_passed = delay_passed(episode.pub_date, feed.sponsorblock_delay(), Utc::now());

        if let Some(reason) = defer_before_lookup(mode, delay_passed) {
            info!(episode_id = %episode.id, %reason, "deferring episode");
            return Ok(CandidateOutcome::Deferred(reason));
        }

        let segments = if mode.fetches_segments() {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(PipelineError::Cancelled),
                segments = self.lookup.segments(&episode.id) => segments,
            }
        } else {
            Vec::new()
        };

        if let Some(reason) = defer_after_lookup(mode, segments.len(), delay_passed) {
            info!(episode_id = %episode.id, %reason, "deferring episode");
            return Ok(CandidateOutcome::Deferred(reason));
        }

        info!(episode_id = %episode.id, url = %episode.video_url, "downloading episode");
        let downloaded = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PipelineError::Cancelled),
            result = self.downloader.download(feed, episode) => result,
        };

        let media = match downloaded {
            Ok(media) => media,
            Err(DownloadError::RateLimited { .. }) => return Ok(CandidateOutcome::RateLimited),
            Err(e) => {
                warn!(episode_id = %episode.id, error = %e, "download failed");
                self.store
                    .update_episode(&feed.id, &episode.id, mark_failed())
                    .await?;
                return Ok(CandidateOutcome::Failed(e.to_string()));
            }
        };

        let keeps = plan_keep_intervals(&segments, &feed.sponsorblock_categories);

        let stored = if is_passthrough(&keeps) {
            debug!(episode_id = %episode.id, "storing download as is");
            self.persist(&feed.id, &name, media.path(), cancel).await
        } else {
            debug!(episode_id = %episode.id, ?keeps, "trimming episode");
            self.reporter.report(ProgressEvent::Transcoding {
                feed_id: feed.id.clone(),
                episode_id: episode.id.clone(),
                kept_intervals: keeps.len(),
            });

            let trimmed = match self
                .transcoder
                .trim(media.path(), &keeps, feed.format, cancel)
                .await
            {
                Ok(trimmed) => trimmed,
                Err(TranscodeError::Cancelled) => return Err(PipelineError::Cancelled),
                Err(e) => {
                    warn!(episode_id = %episode.id, error = %e, "transcoding failed");
                    self.store
                        .update_episode(&feed.id, &episode.id, mark_failed())
                        .await?;
                    return Ok(CandidateOutcome::Failed(e.to_string()));
                }
            };

            let stored = self.persist(&feed.id, &name, trimmed.path(), cancel).await;
            if let Err(e) = trimmed.close() {
                warn!(error = %e, "failed to remove transcoder scratch directory");
            }
            stored
        };

        if let Err(e) = media.close() {
            warn!(error = %e, "failed to remove temporary download");
        }

        let size = stored?;
        self.store
            .update_episode(&feed.id, &episode.id, mark_downloaded(size))
            .await?;

        Ok(CandidateOutcome::Downloaded { size })
    }

    /// Copy `source` into storage, giving up when the run is cancelled
    async fn persist(
        &self,
        feed_id: &str,
        name: &str,
        source: &Path,
        cancel: &CancellationToken,
    ) -> Result<u64, PipelineError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(PipelineError::Cancelled),
            result = self.storage.create(feed_id, name, source) => Ok(result?),
        }
    }
}
