// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::Path;

use async_trait::async_trait;
use tracing::debug;

use crate::config::FeedConfig;
use crate::error::ListingError;
use crate::http::HttpClient;
use crate::model::Listing;

use super::ListingProvider;
use super::parse::parse_listing;

/// Listing provider reading an RSS feed from a URL or a local file
pub struct RssListingProvider<C> {
    client: C,
}

impl<C: HttpClient> RssListingProvider<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    /// Fetch raw feed bytes from a URL (without parsing)
    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, ListingError> {
        let response = self
            .client
            .get_bytes(url)
            .await
            .map_err(|e| ListingError::FetchFailed {
                url: url.to_string(),
                source: e,
            })?;

        if !response.is_success() {
            return Err(ListingError::HttpStatus {
                url: url.to_string(),
                status: response.status,
            });
        }

        Ok(response.body.to_vec())
    }
}

/// Read raw feed bytes from a local file (without parsing)
async fn read_feed_file(path: &Path) -> Result<Vec<u8>, ListingError> {
    tokio::fs::read(path)
        .await
        .map_err(|e| ListingError::FileReadFailed {
            path: path.to_path_buf(),
            source: e,
        })
}

/// Determine if a string is a URL or a file path
pub fn is_url(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

#[async_trait]
impl<C: HttpClient> ListingProvider for RssListingProvider<C> {
    async fn build(&self, feed: &FeedConfig) -> Result<Listing, ListingError> {
        let bytes = if is_url(&feed.url) {
            self.fetch_bytes(&feed.url).await?
        } else {
            read_feed_file(Path::new(&feed.url)).await?
        };

        let listing = parse_listing(&bytes)?;
        debug!(
            feed_id = %feed.id,
            episodes = listing.episodes.len(),
            "built listing"
        );
        Ok(listing)
    }
}
