// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::HashSet;
use std::ops::ControlFlow;

use tracing::{debug, info};

use crate::config::FeedConfig;
use crate::error::{PipelineError, StoreError};
use crate::listing::ListingProvider;
use crate::model::{Episode, Listing};
use crate::store::EpisodeStore;

/// What a reconciliation changed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub title: String,
    pub total_episodes: usize,
    /// Pending episodes dropped because they vanished upstream
    pub removed: Vec<String>,
}

/// Merge `listing` into the store and drop pending episodes missing from it
///
/// Only `New` and `Error` episodes are ever removed; the pending snapshot is
/// taken before the merge. Returns the removed IDs.
pub async fn reconcile_listing(
    store: &dyn EpisodeStore,
    feed_id: &str,
    listing: &Listing,
) -> Result<Vec<String>, StoreError> {
    let mut stale = HashSet::new();
    store
        .walk_episodes(feed_id, &mut |episode: &Episode| {
            if episode.status.is_pending() {
                stale.insert(episode.id.clone());
            }
            ControlFlow::Continue(())
        })
        .await?;

    store.add_feed(feed_id, listing).await?;

    for episode in &listing.episodes {
        stale.remove(&episode.id);
    }

    let mut removed: Vec<String> = stale.into_iter().collect();
    removed.sort();

    for episode_id in &removed {
        debug!(feed_id, episode_id = %episode_id, "removing episode gone upstream");
        store.delete_episode(feed_id, episode_id).await?;
    }

    Ok(removed)
}

/// Fetch the remote listing of `feed` and reconcile it against the store
pub async fn reconcile(
    store: &dyn EpisodeStore,
    provider: &dyn ListingProvider,
    feed: &FeedConfig,
) -> Result<ReconcileReport, PipelineError> {
    let listing = provider.build(feed).await?;
    let removed = reconcile_listing(store, &feed.id, &listing).await?;

    info!(
        feed_id = %feed.id,
        title = %listing.title,
        episodes = listing.episodes.len(),
        removed = removed.len(),
        "listing reconciled"
    );

    Ok(ReconcileReport {
        title: listing.title.clone(),
        total_episodes: listing.episodes.len(),
        removed,
    })
}
