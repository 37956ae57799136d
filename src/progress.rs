// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::sync::Arc;

/// Events emitted while updating a feed, for progress reporting
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// An update run for a feed is starting
    UpdateStarted { feed_id: String },

    /// The remote listing has been merged into the store
    ListingReconciled {
        feed_id: String,
        title: String,
        total_episodes: usize,
        removed_episodes: usize,
    },

    /// Pending episodes picked for this run
    CandidatesSelected { feed_id: String, count: usize },

    /// Work on one episode is starting
    EpisodeStarting {
        feed_id: String,
        episode_id: String,
        title: String,
        /// Index of this episode among the candidates
        index: usize,
        total: usize,
    },

    /// Download progress update
    DownloadProgress {
        feed_id: String,
        episode_id: String,
        bytes_downloaded: u64,
        total_bytes: Option<u64>,
    },

    /// The downloaded file is being cut
    Transcoding {
        feed_id: String,
        episode_id: String,
        /// Number of intervals kept from the source
        kept_intervals: usize,
    },

    /// Work on one episode finished; `outcome` is a short human readable note
    EpisodeFinished {
        feed_id: String,
        episode_id: String,
        outcome: String,
    },

    /// Old episodes were cleaned up
    CleanupCompleted { feed_id: String, cleaned: usize },

    /// Update run finished
    UpdateCompleted {
        feed_id: String,
        downloaded: usize,
        skipped: usize,
        deferred: usize,
        failed: usize,
    },

    /// Update run stopped with an error
    UpdateFailed { feed_id: String, error: String },
}

/// Trait for reporting progress events during an update.
///
/// Implementations can use this to display progress bars, log messages,
/// or collect statistics.
pub trait ProgressReporter: Send + Sync {
    /// Report a progress event
    fn report(&self, event: ProgressEvent);
}

/// A shared reference to a progress reporter
pub type SharedProgressReporter = Arc<dyn ProgressReporter>;

/// A no-op progress reporter that silently ignores all events.
/// Useful for tests or quiet mode.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn report(&self, _event: ProgressEvent) {
        // Intentionally empty
    }
}

impl NoopReporter {
    /// Create a new NoopReporter wrapped in an Arc
    pub fn shared() -> SharedProgressReporter {
        Arc::new(Self)
    }
}
