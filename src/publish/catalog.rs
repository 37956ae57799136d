// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::FeedConfig;
use crate::error::{PublishError, StoreError};
use crate::model::EpisodeStatus;
use crate::store::EpisodeStore;

use super::{CatalogPublisher, public_url, write_json};

const CATALOG_FILENAME: &str = "catalog.json";

/// One feed in the catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub feed_url: String,
    pub episode_count: usize,
}

/// Serializable list of every feed open for subscription
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogDocument {
    pub updated_at: DateTime<Utc>,
    pub feeds: Vec<CatalogEntry>,
}

/// Writes `<data_dir>/catalog.json` for the feeds with `opml` enabled
#[derive(Debug, Clone)]
pub struct JsonCatalogPublisher {
    data_dir: PathBuf,
    hostname: String,
    feed_ids: Vec<String>,
}

impl JsonCatalogPublisher {
    pub fn new<'a>(
        data_dir: impl Into<PathBuf>,
        hostname: impl Into<String>,
        feeds: impl IntoIterator<Item = &'a FeedConfig>,
    ) -> Self {
        Self {
            data_dir: data_dir.into(),
            hostname: hostname.into(),
            feed_ids: feeds
                .into_iter()
                .filter(|f| f.opml)
                .map(|f| f.id.clone())
                .collect(),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.data_dir.join(CATALOG_FILENAME)
    }

    async fn build(&self, store: &dyn EpisodeStore) -> Result<CatalogDocument, PublishError> {
        let mut feeds = Vec::with_capacity(self.feed_ids.len());

        for feed_id in &self.feed_ids {
            let feed = match store.get_feed(feed_id).await {
                Ok(feed) => feed,
                // Not reconciled yet; it shows up after its first update
                Err(StoreError::FeedNotFound { .. }) => continue,
                Err(e) => return Err(e.into()),
            };

            feeds.push(CatalogEntry {
                id: feed_id.clone(),
                title: feed.title.clone(),
                description: feed.description.clone(),
                image_url: feed.image_url.as_ref().map(|u| u.to_string()),
                feed_url: public_url(
                    &self.hostname,
                    &format!("{}.json", sanitize_filename::sanitize(feed_id)),
                ),
                episode_count: feed
                    .episodes
                    .iter()
                    .filter(|e| e.status == EpisodeStatus::Downloaded)
                    .count(),
            });
        }

        Ok(CatalogDocument {
            updated_at: Utc::now(),
            feeds,
        })
    }
}

#[async_trait]
impl CatalogPublisher for JsonCatalogPublisher {
    async fn publish_catalog(&self, store: &dyn EpisodeStore) -> Result<(), PublishError> {
        let document = self.build(store).await?;
        let path = self.path();
        write_json(&path, &document).await?;

        debug!(feeds = document.feeds.len(), path = %path.display(), "published catalog");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tests::{make_episode, make_listing};
    use crate::store::MemoryStore;
    use tempfile::tempdir;

    #[tokio::test]
    async fn catalog_lists_opml_feeds_present_in_store() {
        let dir = tempdir().unwrap();
        let store = MemoryStore::new();
        store
            .add_feed(
                "listed",
                &make_listing(vec![make_episode("a", 0, EpisodeStatus::New)]),
            )
            .await
            .unwrap();
        store
            .add_feed("hidden", &make_listing(Vec::new()))
            .await
            .unwrap();

        let listed = FeedConfig::new("listed", "https://example.com/a.xml");
        let mut hidden = FeedConfig::new("hidden", "https://example.com/b.xml");
        hidden.opml = false;
        let pending = FeedConfig::new("pending", "https://example.com/c.xml");

        let publisher =
            JsonCatalogPublisher::new(dir.path(), "http://localhost", [&listed, &hidden, &pending]);
        publisher.publish_catalog(&store).await.unwrap();

        let content = std::fs::read_to_string(dir.path().join("catalog.json")).unwrap();
        let catalog: CatalogDocument = serde_json::from_str(&content).unwrap();
        assert_eq!(catalog.feeds.len(), 1);
        assert_eq!(catalog.feeds[0].id, "listed");
        assert_eq!(catalog.feeds[0].title, "Test Channel");
        assert_eq!(catalog.feeds[0].feed_url, "http://localhost/listed.json");
        assert_eq!(catalog.feeds[0].episode_count, 0);
    }
}
