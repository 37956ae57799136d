// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{EpisodeMutation, EpisodeStore, EpisodeVisitor, apply_mutation};
use crate::error::StoreError;
use crate::model::{Episode, Feed, Listing};

/// In-process store, handy for tests and embedding
#[derive(Debug, Default)]
pub struct MemoryStore {
    feeds: Mutex<HashMap<String, Feed>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a feed with episodes as they are, statuses included
    pub async fn insert_episodes(&self, feed_id: &str, episodes: Vec<Episode>) {
        let mut feeds = self.feeds.lock().await;
        let feed = feeds
            .entry(feed_id.to_string())
            .or_insert_with(|| Feed::new(feed_id));
        feed.episodes.extend(episodes);
        feed.sort_episodes();
    }

    /// Snapshot of one episode
    pub async fn episode(&self, feed_id: &str, episode_id: &str) -> Option<Episode> {
        let feeds = self.feeds.lock().await;
        feeds
            .get(feed_id)?
            .episodes
            .iter()
            .find(|e| e.id == episode_id)
            .cloned()
    }
}

#[async_trait]
impl EpisodeStore for MemoryStore {
    async fn walk_episodes(
        &self,
        feed_id: &str,
        visit: &mut EpisodeVisitor<'_>,
    ) -> Result<(), StoreError> {
        let feeds = self.feeds.lock().await;
        if let Some(feed) = feeds.get(feed_id) {
            for episode in &feed.episodes {
                if visit(episode).is_break() {
                    break;
                }
            }
        }
        Ok(())
    }

    async fn add_feed(&self, feed_id: &str, listing: &Listing) -> Result<(), StoreError> {
        let mut feeds = self.feeds.lock().await;
        feeds
            .entry(feed_id.to_string())
            .or_insert_with(|| Feed::new(feed_id))
            .merge_listing(listing);
        Ok(())
    }

    async fn update_episode(
        &self,
        feed_id: &str,
        episode_id: &str,
        mutate: EpisodeMutation,
    ) -> Result<Episode, StoreError> {
        let mut feeds = self.feeds.lock().await;
        let feed = feeds
            .get_mut(feed_id)
            .ok_or_else(|| StoreError::FeedNotFound {
                feed_id: feed_id.to_string(),
            })?;
        apply_mutation(feed, episode_id, mutate)
    }

    async fn delete_episode(&self, feed_id: &str, episode_id: &str) -> Result<(), StoreError> {
        let mut feeds = self.feeds.lock().await;
        if let Some(feed) = feeds.get_mut(feed_id) {
            feed.episodes.retain(|e| e.id != episode_id);
        }
        Ok(())
    }

    async fn get_feed(&self, feed_id: &str) -> Result<Feed, StoreError> {
        let feeds = self.feeds.lock().await;
        feeds
            .get(feed_id)
            .cloned()
            .ok_or_else(|| StoreError::FeedNotFound {
                feed_id: feed_id.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EpisodeStatus;
    use crate::model::tests::{make_episode, make_listing};
    use crate::store::mark_downloaded;
    use std::ops::ControlFlow;

    #[tokio::test]
    async fn walk_visits_newest_first_and_stops_on_break() {
        let store = MemoryStore::new();
        store
            .add_feed(
                "feed",
                &make_listing(vec![
                    make_episode("a", 0, EpisodeStatus::New),
                    make_episode("c", 2, EpisodeStatus::New),
                    make_episode("b", 1, EpisodeStatus::New),
                ]),
            )
            .await
            .unwrap();

        let mut seen = Vec::new();
        store
            .walk_episodes("feed", &mut |e: &Episode| {
                seen.push(e.id.clone());
                if seen.len() == 2 {
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                }
            })
            .await
            .unwrap();

        assert_eq!(seen, vec!["c", "b"]);
    }

    #[tokio::test]
    async fn walk_of_unknown_feed_is_empty() {
        let store = MemoryStore::new();
        let mut count = 0;
        store
            .walk_episodes("nope", &mut |_: &Episode| {
                count += 1;
                ControlFlow::Continue(())
            })
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn update_unknown_feed_fails() {
        let store = MemoryStore::new();
        let err = store
            .update_episode("nope", "ep", mark_downloaded(1))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::FeedNotFound { .. }));
    }

    #[tokio::test]
    async fn delete_removes_episode() {
        let store = MemoryStore::new();
        store
            .insert_episodes("feed", vec![make_episode("a", 0, EpisodeStatus::New)])
            .await;

        store.delete_episode("feed", "a").await.unwrap();

        assert!(store.episode("feed", "a").await.is_none());
        assert!(store.get_feed("feed").await.unwrap().episodes.is_empty());
    }
}
