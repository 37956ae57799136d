// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Durable episode state.

mod json;
mod memory;

use std::ops::ControlFlow;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::model::{Episode, Feed, Listing};

pub use json::JsonStore;
pub use memory::MemoryStore;

/// Read-modify-write step applied to a stored episode
pub type EpisodeMutation = Box<dyn FnOnce(&mut Episode) + Send>;

/// Visitor used by [`EpisodeStore::walk_episodes`]; return `Break` to stop early
pub type EpisodeVisitor<'a> = dyn FnMut(&Episode) -> ControlFlow<()> + Send + 'a;

/// Persistence for feeds and their episodes
///
/// Implementations must be safe to use from several feed updates at once.
#[async_trait]
pub trait EpisodeStore: Send + Sync {
    /// Visit the episodes of a feed in store order (newest first)
    ///
    /// An unknown feed has no episodes.
    async fn walk_episodes(
        &self,
        feed_id: &str,
        visit: &mut EpisodeVisitor<'_>,
    ) -> Result<(), StoreError>;

    /// Upsert a listing: new episodes are added as `New`, known ones keep their status
    async fn add_feed(&self, feed_id: &str, listing: &Listing) -> Result<(), StoreError>;

    /// Atomically mutate one episode, rejecting illegal status transitions
    async fn update_episode(
        &self,
        feed_id: &str,
        episode_id: &str,
        mutate: EpisodeMutation,
    ) -> Result<Episode, StoreError>;

    async fn delete_episode(&self, feed_id: &str, episode_id: &str) -> Result<(), StoreError>;

    async fn get_feed(&self, feed_id: &str) -> Result<Feed, StoreError>;
}

/// Apply `mutate` to the episode `episode_id` of `feed`, enforcing the status machine
pub(crate) fn apply_mutation(
    feed: &mut Feed,
    episode_id: &str,
    mutate: EpisodeMutation,
) -> Result<Episode, StoreError> {
    let slot = feed
        .episodes
        .iter_mut()
        .find(|e| e.id == episode_id)
        .ok_or_else(|| StoreError::EpisodeNotFound {
            feed_id: feed.id.clone(),
            episode_id: episode_id.to_string(),
        })?;

    let mut updated = slot.clone();
    mutate(&mut updated);

    if updated.id != slot.id {
        return Err(StoreError::EpisodeNotFound {
            feed_id: feed.id.clone(),
            episode_id: updated.id,
        });
    }

    if !slot.status.can_transition_to(updated.status) {
        return Err(StoreError::IllegalTransition {
            episode_id: episode_id.to_string(),
            from: slot.status,
            to: updated.status,
        });
    }

    *slot = updated.clone();
    Ok(updated)
}

/// Mark an episode as stored with `size` bytes
pub fn mark_downloaded(size: u64) -> EpisodeMutation {
    Box::new(move |episode| {
        episode.size = size;
        episode.status = crate::model::EpisodeStatus::Downloaded;
    })
}

/// Mark an episode as failed
pub fn mark_failed() -> EpisodeMutation {
    Box::new(|episode| episode.status = crate::model::EpisodeStatus::Error)
}

/// Mark an episode as cleaned and drop its metadata
pub fn mark_cleaned() -> EpisodeMutation {
    Box::new(|episode| {
        episode.status = crate::model::EpisodeStatus::Cleaned;
        episode.title.clear();
        episode.description.clear();
    })
}
