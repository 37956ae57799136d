// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

mod fetch;
mod parse;

use async_trait::async_trait;

use crate::config::FeedConfig;
use crate::error::ListingError;
use crate::model::Listing;

pub use fetch::{RssListingProvider, is_url};
pub use parse::parse_listing;

/// Builds the current remote listing of a feed
#[async_trait]
pub trait ListingProvider: Send + Sync {
    async fn build(&self, feed: &FeedConfig) -> Result<Listing, ListingError>;
}
