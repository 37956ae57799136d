// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::model::EpisodeStatus;

/// Errors that can occur when loading the configuration file
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    ParseFailed {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

/// Errors that can occur when building the remote listing of a feed
#[derive(Error, Debug)]
pub enum ListingError {
    #[error("Failed to fetch listing from {url}: {source}")]
    FetchFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP error {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Failed to read listing file {path}: {source}")]
    FileReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse RSS feed: {0}")]
    ParseFailed(#[from] rss::Error),
}

/// Errors raised by the local episode store
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Feed '{feed_id}' not found")]
    FeedNotFound { feed_id: String },

    #[error("Episode '{episode_id}' not found in feed '{feed_id}'")]
    EpisodeNotFound { feed_id: String, episode_id: String },

    #[error("Episode '{episode_id}' cannot move from {from} to {to}")]
    IllegalTransition {
        episode_id: String,
        from: EpisodeStatus,
        to: EpisodeStatus,
    },

    #[error("Failed to read store file {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write store file {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse store file {path}: {source}")]
    JsonParseFailed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize feed: {0}")]
    JsonSerializeFailed(#[from] serde_json::Error),
}

/// Errors raised by the blob storage
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("File {name} not found in feed '{feed_id}'")]
    NotFound { feed_id: String, name: String },

    #[error("Storage I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors that can occur during episode downloads
#[derive(Error, Debug)]
pub enum DownloadError {
    /// The source is throttling us; the rest of the batch waits for the next run
    #[error("Too many requests for {url}")]
    RateLimited { url: String },

    #[error("HTTP request failed for {url}: {source}")]
    HttpFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP error {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Failed to create temporary directory: {0}")]
    TempDirFailed(#[source] std::io::Error),

    #[error("Failed to write to file {path}: {source}")]
    FileWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Stream error while downloading {url}: {source}")]
    StreamFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Errors raised while trimming media with the external transcoder
#[derive(Error, Debug)]
pub enum TranscodeError {
    #[error("Failed to create temporary directory: {0}")]
    TempDirFailed(#[source] std::io::Error),

    #[error("Failed to start {program}: {source}")]
    SpawnFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: std::process::ExitStatus,
        stderr: String,
    },

    #[error("Transcoding was cancelled")]
    Cancelled,
}

/// Errors raised while rebuilding published documents
#[derive(Error, Debug)]
pub enum PublishError {
    #[error("Failed to write document {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize document: {0}")]
    JsonSerializeFailed(#[from] serde_json::Error),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Errors inside a single pipeline stage, before stage context is attached
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Listing error: {0}")]
    Listing(#[from] ListingError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Cancelled")]
    Cancelled,
}

/// A single episode the retention cleaner could not clean
#[derive(Debug)]
pub struct CleanupFailure {
    pub episode_id: String,
    pub reason: String,
}

impl fmt::Display for CleanupFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.episode_id, self.reason)
    }
}

/// Errors raised by the retention cleaner
#[derive(Error, Debug)]
pub enum CleanupError {
    #[error("Failed to list downloaded episodes: {0}")]
    Walk(#[from] StoreError),

    #[error(
        "{} episode(s) could not be cleaned: {}",
        .failures.len(),
        .failures.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
    )]
    Partial {
        /// Episodes that were cleaned despite the failures
        cleaned: usize,
        failures: Vec<CleanupFailure>,
    },
}

/// Top-level errors for a feed update, carrying the failed stage
#[derive(Error, Debug)]
pub enum UpdateError {
    #[error("Update failed: {0}")]
    Reconcile(#[source] PipelineError),

    #[error("Download failed: {0}")]
    Download(#[source] PipelineError),

    #[error("Feed document build failed: {0}")]
    FeedBuild(#[source] PublishError),

    #[error("Catalog build failed: {0}")]
    CatalogBuild(#[source] PublishError),

    #[error("Update cancelled")]
    Cancelled,
}

impl UpdateError {
    /// Wrap a stage error, keeping cancellation distinguishable
    pub(crate) fn stage(wrap: fn(PipelineError) -> Self, err: PipelineError) -> Self {
        match err {
            PipelineError::Cancelled => UpdateError::Cancelled,
            other => wrap(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cleanup_error_lists_every_failure() {
        let err = CleanupError::Partial {
            cleaned: 3,
            failures: vec![
                CleanupFailure {
                    episode_id: "a".to_string(),
                    reason: "disk on fire".to_string(),
                },
                CleanupFailure {
                    episode_id: "b".to_string(),
                    reason: "permission denied".to_string(),
                },
            ],
        };

        let message = err.to_string();
        assert!(message.starts_with("2 episode(s)"));
        assert!(message.contains("a: disk on fire"));
        assert!(message.contains("b: permission denied"));
    }

    #[test]
    fn cancelled_stage_error_stays_cancelled() {
        let err = UpdateError::stage(UpdateError::Download, PipelineError::Cancelled);
        assert!(matches!(err, UpdateError::Cancelled));

        let err = UpdateError::stage(
            UpdateError::Reconcile,
            PipelineError::Store(StoreError::FeedNotFound {
                feed_id: "f".to_string(),
            }),
        );
        assert!(matches!(err, UpdateError::Reconcile(_)));
        assert!(err.to_string().starts_with("Update failed"));
    }

    #[test]
    fn config_error_joins_problems() {
        let err = ConfigError::Invalid(vec!["one".to_string(), "two".to_string()]);
        assert_eq!(err.to_string(), "Invalid configuration: one; two");
    }
}
