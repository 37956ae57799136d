// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

pub mod config;
pub mod episode;
pub mod error;
pub mod filter;
pub mod http;
pub mod listing;
pub mod media;
pub mod model;
pub mod progress;
pub mod publish;
pub mod sponsor;
pub mod storage;
pub mod store;
pub mod transcode;
pub mod update;

// Re-export main types for convenience
pub use config::{Config, FeedConfig};
pub use episode::{Downloader, HttpDownloader, episode_name};
pub use error::{
    CleanupError, ConfigError, DownloadError, ListingError, PipelineError, PublishError,
    StorageError, StoreError, TranscodeError, UpdateError,
};
pub use filter::{EpisodeFilter, Filters, matches_filters};
pub use http::{HttpClient, HttpResponse, ReqwestClient};
pub use listing::{ListingProvider, RssListingProvider};
pub use media::TempMedia;
pub use model::{Episode, EpisodeStatus, Feed, Format, Listing};
pub use progress::{NoopReporter, ProgressEvent, ProgressReporter, SharedProgressReporter};
pub use publish::{CatalogPublisher, FeedPublisher, JsonCatalogPublisher, JsonFeedPublisher};
pub use sponsor::{SegmentLookup, SponsorBlockClient, SponsorMode};
pub use storage::{FileStorage, LocalStorage};
pub use store::{EpisodeStore, JsonStore, MemoryStore};
pub use transcode::{FfmpegTranscoder, Transcoder};
pub use update::{UpdateSummary, Updater};
