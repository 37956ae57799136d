// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::ops::ControlFlow;

use tracing::{debug, info};

use crate::config::FeedConfig;
use crate::episode::episode_name;
use crate::error::{CleanupError, CleanupFailure};
use crate::model::{Episode, EpisodeStatus};
use crate::storage::FileStorage;
use crate::store::{EpisodeStore, mark_cleaned};

/// Keep the `clean.keep_last` newest downloaded episodes and clean the rest
///
/// Every excess episode is attempted; failures are collected into
/// [`CleanupError::Partial`] along with the count that did get cleaned.
/// Returns the number of episodes cleaned.
pub async fn clean(
    store: &dyn EpisodeStore,
    storage: &dyn FileStorage,
    feed: &FeedConfig,
) -> Result<usize, CleanupError> {
    let keep_last = feed.clean.keep_last;
    if keep_last < 1 {
        return Ok(0);
    }

    let mut downloaded: Vec<Episode> = Vec::new();
    store
        .walk_episodes(&feed.id, &mut |episode: &Episode| {
            if episode.status == EpisodeStatus::Downloaded {
                downloaded.push(episode.clone());
            }
            ControlFlow::Continue(())
        })
        .await?;

    if downloaded.len() <= keep_last {
        return Ok(0);
    }

    downloaded.sort_by(|a, b| b.pub_date.cmp(&a.pub_date).then_with(|| a.id.cmp(&b.id)));

    let mut failures = Vec::new();
    let mut cleaned = 0;

    for episode in &downloaded[keep_last..] {
        let name = episode_name(feed.format, episode);
        debug!(feed_id = %feed.id, episode_id = %episode.id, "deleting old episode");

        if let Err(e) = storage.delete(&feed.id, &name).await {
            failures.push(CleanupFailure {
                episode_id: episode.id.clone(),
                reason: e.to_string(),
            });
            continue;
        }

        match store
            .update_episode(&feed.id, &episode.id, mark_cleaned())
            .await
        {
            Ok(_) => cleaned += 1,
            Err(e) => failures.push(CleanupFailure {
                episode_id: episode.id.clone(),
                reason: e.to_string(),
            }),
        }
    }

    info!(feed_id = %feed.id, cleaned, failed = failures.len(), "cleanup finished");

    if failures.is_empty() {
        Ok(cleaned)
    } else {
        Err(CleanupError::Partial { cleaned, failures })
    }
}
