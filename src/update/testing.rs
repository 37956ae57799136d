// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Collaborator doubles shared by the update tests.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::config::FeedConfig;
use crate::episode::Downloader;
use crate::error::{DownloadError, StorageError, TranscodeError};
use crate::listing::ListingProvider;
use crate::media::TempMedia;
use crate::model::{Episode, Format, Listing};
use crate::sponsor::{KeepInterval, SegmentLookup, SponsorSegment};
use crate::storage::FileStorage;
use crate::transcode::Transcoder;

/// Downloader writing a fixed payload, with scripted failures
#[derive(Default)]
pub(crate) struct MockDownloader {
    pub(crate) payload: Vec<u8>,
    pub(crate) rate_limit_on: Option<String>,
    pub(crate) fail_on: HashSet<String>,
    pub(crate) calls: Mutex<Vec<String>>,
}

impl MockDownloader {
    pub(crate) fn with_payload(payload: &[u8]) -> Self {
        Self {
            payload: payload.to_vec(),
            ..Default::default()
        }
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Downloader for MockDownloader {
    async fn download(
        &self,
        feed: &FeedConfig,
        episode: &Episode,
    ) -> Result<TempMedia, DownloadError> {
        self.calls.lock().unwrap().push(episode.id.clone());

        if self.rate_limit_on.as_deref() == Some(episode.id.as_str()) {
            return Err(DownloadError::RateLimited {
                url: episode.video_url.to_string(),
            });
        }
        if self.fail_on.contains(&episode.id) {
            return Err(DownloadError::HttpStatus {
                url: episode.video_url.to_string(),
                status: 500,
            });
        }

        let media = TempMedia::allocate(
            "podtrim-test-",
            &format!("download.{}", feed.format.extension()),
        )
        .map_err(DownloadError::TempDirFailed)?;
        std::fs::write(media.path(), &self.payload).map_err(|e| {
            DownloadError::FileWriteFailed {
                path: media.path().to_path_buf(),
                source: e,
            }
        })?;
        Ok(media)
    }
}

/// Lookup answering every video with the same segments
#[derive(Default)]
pub(crate) struct StaticLookup {
    pub(crate) segments: Vec<SponsorSegment>,
    pub(crate) calls: Mutex<Vec<String>>,
}

impl StaticLookup {
    pub(crate) fn new(segments: Vec<SponsorSegment>) -> Self {
        Self {
            segments,
            calls: Mutex::default(),
        }
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SegmentLookup for StaticLookup {
    async fn segments(&self, video_id: &str) -> Vec<SponsorSegment> {
        self.calls.lock().unwrap().push(video_id.to_string());
        self.segments.clone()
    }
}

/// Transcoder writing a fixed payload instead of running a process
#[derive(Default)]
pub(crate) struct FakeTranscoder {
    pub(crate) payload: Vec<u8>,
    pub(crate) fail: bool,
    pub(crate) plans: Mutex<Vec<Vec<KeepInterval>>>,
}

impl FakeTranscoder {
    pub(crate) fn with_payload(payload: &[u8]) -> Self {
        Self {
            payload: payload.to_vec(),
            ..Default::default()
        }
    }
}

#[async_trait]
impl Transcoder for FakeTranscoder {
    async fn trim(
        &self,
        _input: &Path,
        keeps: &[KeepInterval],
        format: Format,
        cancel: &CancellationToken,
    ) -> Result<TempMedia, TranscodeError> {
        self.plans.lock().unwrap().push(keeps.to_vec());

        if cancel.is_cancelled() {
            return Err(TranscodeError::Cancelled);
        }
        if self.fail {
            return Err(TranscodeError::SpawnFailed {
                program: "fake".to_string(),
                source: std::io::Error::other("fake transcoder failure"),
            });
        }

        let media = TempMedia::allocate(
            "podtrim-test-",
            &format!("processed.{}", format.extension()),
        )
        .map_err(TranscodeError::TempDirFailed)?;
        std::fs::write(media.path(), &self.payload).map_err(TranscodeError::TempDirFailed)?;
        Ok(media)
    }
}

/// Storage whose deletes fail for the listed blob names
pub(crate) struct FailingDeleteStorage<S> {
    pub(crate) inner: S,
    pub(crate) fail_on: HashSet<String>,
}

#[async_trait]
impl<S: FileStorage> FileStorage for FailingDeleteStorage<S> {
    async fn size(&self, feed_id: &str, name: &str) -> Result<u64, StorageError> {
        self.inner.size(feed_id, name).await
    }

    async fn create(&self, feed_id: &str, name: &str, source: &Path) -> Result<u64, StorageError> {
        self.inner.create(feed_id, name, source).await
    }

    async fn delete(&self, feed_id: &str, name: &str) -> Result<(), StorageError> {
        if self.fail_on.contains(name) {
            return Err(StorageError::Io {
                path: name.into(),
                source: std::io::Error::other("disk on fire"),
            });
        }
        self.inner.delete(feed_id, name).await
    }
}

/// Storage whose copies never finish; cancels `cancel` once one starts
pub(crate) struct StallingStorage<S> {
    pub(crate) inner: S,
    pub(crate) cancel: CancellationToken,
}

#[async_trait]
impl<S: FileStorage> FileStorage for StallingStorage<S> {
    async fn size(&self, feed_id: &str, name: &str) -> Result<u64, StorageError> {
        self.inner.size(feed_id, name).await
    }

    async fn create(
        &self,
        _feed_id: &str,
        _name: &str,
        _source: &Path,
    ) -> Result<u64, StorageError> {
        self.cancel.cancel();
        std::future::pending().await
    }

    async fn delete(&self, feed_id: &str, name: &str) -> Result<(), StorageError> {
        self.inner.delete(feed_id, name).await
    }
}

/// Listing provider returning a canned listing
pub(crate) struct StaticListing(pub(crate) Listing);

#[async_trait]
impl ListingProvider for StaticListing {
    async fn build(&self, _feed: &FeedConfig) -> Result<Listing, crate::error::ListingError> {
        Ok(self.0.clone())
    }
}
