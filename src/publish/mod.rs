// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Documents published for downstream podcast clients.

mod catalog;
mod feed;

use std::path::Path;

use async_trait::async_trait;
use serde::Serialize;

use crate::config::FeedConfig;
use crate::error::PublishError;
use crate::model::Feed;
use crate::store::EpisodeStore;

pub use catalog::{CatalogDocument, CatalogEntry, JsonCatalogPublisher};
pub use feed::{EpisodeEntry, FeedDocument, JsonFeedPublisher};

/// Rebuilds the document describing one feed
#[async_trait]
pub trait FeedPublisher: Send + Sync {
    async fn publish_feed(&self, feed: &FeedConfig, stored: &Feed) -> Result<(), PublishError>;
}

/// Rebuilds the document listing every published feed
#[async_trait]
pub trait CatalogPublisher: Send + Sync {
    async fn publish_catalog(&self, store: &dyn EpisodeStore) -> Result<(), PublishError>;
}

/// Publisher that writes nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopPublisher;

#[async_trait]
impl FeedPublisher for NoopPublisher {
    async fn publish_feed(&self, _feed: &FeedConfig, _stored: &Feed) -> Result<(), PublishError> {
        Ok(())
    }
}

#[async_trait]
impl CatalogPublisher for NoopPublisher {
    async fn publish_catalog(&self, _store: &dyn EpisodeStore) -> Result<(), PublishError> {
        Ok(())
    }
}

/// Public URL of `path` below `hostname`
fn public_url(hostname: &str, path: &str) -> String {
    format!("{}/{}", hostname.trim_end_matches('/'), path)
}

/// Serialize `document` and replace `path` with it
async fn write_json<T: Serialize>(path: &Path, document: &T) -> Result<(), PublishError> {
    let json = serde_json::to_string_pretty(document)?;

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| PublishError::WriteFailed {
                path: parent.to_path_buf(),
                source: e,
            })?;
    }

    let partial = path.with_extension("json.partial");
    tokio::fs::write(&partial, json)
        .await
        .map_err(|e| PublishError::WriteFailed {
            path: partial.clone(),
            source: e,
        })?;

    tokio::fs::rename(&partial, path)
        .await
        .map_err(|e| PublishError::WriteFailed {
            path: path.to_path_buf(),
            source: e,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_url_joins_without_double_slash() {
        assert_eq!(
            public_url("http://localhost:8080/", "feed.json"),
            "http://localhost:8080/feed.json"
        );
        assert_eq!(
            public_url("http://localhost", "a/b.mp3"),
            "http://localhost/a/b.mp3"
        );
    }
}
