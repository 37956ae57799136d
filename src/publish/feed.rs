// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::FeedConfig;
use crate::episode::episode_name;
use crate::error::PublishError;
use crate::model::{EpisodeStatus, Feed, Format};

use super::{FeedPublisher, public_url, write_json};

/// A downloaded episode as seen by podcast clients
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodeEntry {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub description: String,
    pub pub_date: DateTime<Utc>,
    pub size: u64,
    pub enclosure_url: String,
    pub source_url: String,
}

/// Serializable document for one feed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedDocument {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub format: Format,
    pub updated_at: DateTime<Utc>,
    pub episodes: Vec<EpisodeEntry>,
}

impl FeedDocument {
    /// Build the document from the stored feed; only downloaded episodes are listed
    pub fn from_feed(hostname: &str, config: &FeedConfig, feed: &Feed) -> Self {
        let folder = sanitize_filename::sanitize(&config.id);

        let episodes = feed
            .episodes
            .iter()
            .filter(|e| e.status == EpisodeStatus::Downloaded)
            .map(|e| EpisodeEntry {
                id: e.id.clone(),
                title: e.title.clone(),
                description: e.description.clone(),
                pub_date: e.pub_date,
                size: e.size,
                enclosure_url: public_url(
                    hostname,
                    &format!("{folder}/{}", episode_name(config.format, e)),
                ),
                source_url: e.video_url.to_string(),
            })
            .collect();

        Self {
            id: config.id.clone(),
            title: feed.title.clone(),
            description: feed.description.clone(),
            link: feed.link.as_ref().map(|u| u.to_string()),
            image_url: feed.image_url.as_ref().map(|u| u.to_string()),
            format: config.format,
            updated_at: feed.updated_at,
            episodes,
        }
    }
}

/// Writes `<data_dir>/<feed_id>.json`
#[derive(Debug, Clone)]
pub struct JsonFeedPublisher {
    data_dir: PathBuf,
    hostname: String,
}

impl JsonFeedPublisher {
    pub fn new(data_dir: impl Into<PathBuf>, hostname: impl Into<String>) -> Self {
        Self {
            data_dir: data_dir.into(),
            hostname: hostname.into(),
        }
    }

    pub fn path(&self, feed_id: &str) -> PathBuf {
        self.data_dir
            .join(format!("{}.json", sanitize_filename::sanitize(feed_id)))
    }
}

#[async_trait]
impl FeedPublisher for JsonFeedPublisher {
    async fn publish_feed(&self, feed: &FeedConfig, stored: &Feed) -> Result<(), PublishError> {
        let document = FeedDocument::from_feed(&self.hostname, feed, stored);
        let path = self.path(&feed.id);
        write_json(&path, &document).await?;

        debug!(
            feed_id = %feed.id,
            episodes = document.episodes.len(),
            path = %path.display(),
            "published feed"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tests::make_episode;
    use tempfile::tempdir;

    fn stored_feed() -> Feed {
        let mut feed = Feed::new("tech");
        feed.title = "Tech Channel".to_string();
        feed.episodes = vec![
            make_episode("c", 2, EpisodeStatus::Downloaded),
            make_episode("b", 1, EpisodeStatus::New),
            make_episode("a", 0, EpisodeStatus::Cleaned),
        ];
        feed.episodes[0].size = 42;
        feed
    }

    #[test]
    fn document_lists_only_downloaded_episodes() {
        let config = FeedConfig::new("tech", "https://example.com/feed.xml");

        let document = FeedDocument::from_feed("http://localhost:8080", &config, &stored_feed());

        assert_eq!(document.title, "Tech Channel");
        assert_eq!(document.episodes.len(), 1);
        let entry = &document.episodes[0];
        assert_eq!(entry.id, "c");
        assert_eq!(entry.size, 42);
        assert_eq!(entry.enclosure_url, "http://localhost:8080/tech/c.mp3");
        assert_eq!(entry.source_url, "https://example.com/c.mp3");
    }

    #[test]
    fn video_feeds_link_mp4() {
        let mut config = FeedConfig::new("tech", "https://example.com/feed.xml");
        config.format = Format::Video;

        let document = FeedDocument::from_feed("http://localhost", &config, &stored_feed());

        assert_eq!(
            document.episodes[0].enclosure_url,
            "http://localhost/tech/c.mp4"
        );
    }

    #[tokio::test]
    async fn publish_writes_document() {
        let dir = tempdir().unwrap();
        let publisher = JsonFeedPublisher::new(dir.path(), "http://localhost");
        let config = FeedConfig::new("tech", "https://example.com/feed.xml");

        publisher
            .publish_feed(&config, &stored_feed())
            .await
            .unwrap();

        let content = std::fs::read_to_string(dir.path().join("tech.json")).unwrap();
        let read_back: FeedDocument = serde_json::from_str(&content).unwrap();
        assert_eq!(read_back.id, "tech");
        assert_eq!(read_back.episodes.len(), 1);
        assert!(!dir.path().join("tech.json.partial").exists());
    }
}
