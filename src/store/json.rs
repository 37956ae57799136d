// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use super::{EpisodeMutation, EpisodeStore, EpisodeVisitor, apply_mutation};
use crate::error::StoreError;
use crate::model::{Episode, Feed, Listing};

/// Store keeping one JSON document per feed inside a directory
///
/// Writes go to a temporary sibling first and are renamed into place, so a
/// crash never leaves a half-written feed behind.
#[derive(Debug)]
pub struct JsonStore {
    dir: PathBuf,
    // Serializes read-modify-write cycles
    lock: Mutex<()>,
}

impl JsonStore {
    /// Open (and create if needed) a store directory
    pub fn open(dir: &Path) -> Result<Self, StoreError> {
        std::fs::create_dir_all(dir).map_err(|e| StoreError::WriteFailed {
            path: dir.to_path_buf(),
            source: e,
        })?;

        Ok(Self {
            dir: dir.to_path_buf(),
            lock: Mutex::new(()),
        })
    }

    fn feed_path(&self, feed_id: &str) -> PathBuf {
        self.dir
            .join(format!("{}.json", sanitize_filename::sanitize(feed_id)))
    }

    async fn load(&self, feed_id: &str) -> Result<Option<Feed>, StoreError> {
        let path = self.feed_path(feed_id);

        let content = match tokio::fs::read(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::ReadFailed { path, source: e }),
        };

        serde_json::from_slice(&content)
            .map(Some)
            .map_err(|e| StoreError::JsonParseFailed { path, source: e })
    }

    async fn save(&self, feed: &Feed) -> Result<(), StoreError> {
        let path = self.feed_path(&feed.id);
        let partial = path.with_extension("json.partial");

        let json = serde_json::to_vec_pretty(feed)?;
        tokio::fs::write(&partial, json)
            .await
            .map_err(|e| StoreError::WriteFailed {
                path: partial.clone(),
                source: e,
            })?;
        tokio::fs::rename(&partial, &path)
            .await
            .map_err(|e| StoreError::WriteFailed {
                path: path.clone(),
                source: e,
            })?;

        debug!(path = %path.display(), episodes = feed.episodes.len(), "saved feed");
        Ok(())
    }

    async fn load_existing(&self, feed_id: &str) -> Result<Feed, StoreError> {
        self.load(feed_id)
            .await?
            .ok_or_else(|| StoreError::FeedNotFound {
                feed_id: feed_id.to_string(),
            })
    }
}

#[async_trait]
impl EpisodeStore for JsonStore {
    async fn walk_episodes(
        &self,
        feed_id: &str,
        visit: &mut EpisodeVisitor<'_>,
    ) -> Result<(), StoreError> {
        let feed = {
            let _guard = self.lock.lock().await;
            self.load(feed_id).await?
        };

        for episode in feed.iter().flat_map(|f| f.episodes.iter()) {
            if visit(episode).is_break() {
                break;
            }
        }
        Ok(())
    }

    async fn add_feed(&self, feed_id: &str, listing: &Listing) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut feed = self
            .load(feed_id)
            .await?
            .unwrap_or_else(|| Feed::new(feed_id));
        feed.merge_listing(listing);
        self.save(&feed).await
    }

    async fn update_episode(
        &self,
        feed_id: &str,
        episode_id: &str,
        mutate: EpisodeMutation,
    ) -> Result<Episode, StoreError> {
        let _guard = self.lock.lock().await;
        let mut feed = self.load_existing(feed_id).await?;
        let updated = apply_mutation(&mut feed, episode_id, mutate)?;
        self.save(&feed).await?;
        Ok(updated)
    }

    async fn delete_episode(&self, feed_id: &str, episode_id: &str) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let Some(mut feed) = self.load(feed_id).await? else {
            return Ok(());
        };

        let before = feed.episodes.len();
        feed.episodes.retain(|e| e.id != episode_id);
        if feed.episodes.len() != before {
            self.save(&feed).await?;
        }
        Ok(())
    }

    async fn get_feed(&self, feed_id: &str) -> Result<Feed, StoreError> {
        let _guard = self.lock.lock().await;
        self.load_existing(feed_id).await
    }
}
