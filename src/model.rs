// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

/// Lifecycle state of an episode
///
/// Transitions are checked by [`EpisodeStatus::can_transition_to`]; stores
/// refuse any mutation that would take an illegal path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EpisodeStatus {
    New,
    Downloaded,
    Error,
    Cleaned,
}

impl EpisodeStatus {
    /// Whether moving from `self` to `next` is allowed
    pub fn can_transition_to(self, next: EpisodeStatus) -> bool {
        use EpisodeStatus::*;

        self == next
            || matches!(
                (self, next),
                (New, Downloaded) | (New, Error) | (Error, Downloaded) | (Downloaded, Cleaned)
            )
    }

    /// `New` and `Error` episodes still wait for a (successful) download
    pub fn is_pending(self) -> bool {
        matches!(self, EpisodeStatus::New | EpisodeStatus::Error)
    }
}

impl fmt::Display for EpisodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EpisodeStatus::New => "new",
            EpisodeStatus::Downloaded => "downloaded",
            EpisodeStatus::Error => "error",
            EpisodeStatus::Cleaned => "cleaned",
        };
        f.write_str(name)
    }
}

/// A single episode tracked for a feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub pub_date: DateTime<Utc>,
    pub video_url: Url,
    #[serde(default)]
    pub size: u64,
    pub status: EpisodeStatus,
}

impl Episode {
    /// Merge a fresh upstream copy into a stored episode; the local status wins
    ///
    /// Cleaned episodes stay scrubbed.
    pub fn refresh_from(&mut self, remote: &Episode) {
        if self.status == EpisodeStatus::Cleaned {
            return;
        }

        self.title = remote.title.clone();
        self.description = remote.description.clone();
        self.pub_date = remote.pub_date;
        self.video_url = remote.video_url.clone();
        if self.status.is_pending() {
            self.size = remote.size;
        }
    }
}

/// A freshly built remote listing for one feed
#[derive(Debug, Clone)]
pub struct Listing {
    pub title: String,
    pub description: Option<String>,
    pub link: Option<Url>,
    pub image_url: Option<Url>,
    /// Episodes in upstream order
    pub episodes: Vec<Episode>,
}

/// A feed as persisted in the local store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feed {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<Url>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<Url>,
    pub updated_at: DateTime<Utc>,
    /// Episodes in store order: newest first, ties by ID
    pub episodes: Vec<Episode>,
}

impl Feed {
    /// Create an empty feed record
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            title: String::new(),
            description: None,
            link: None,
            image_url: None,
            updated_at: Utc::now(),
            episodes: Vec::new(),
        }
    }

    /// Upsert a listing into this feed
    ///
    /// Unknown episodes are inserted as `New`, known ones are refreshed in
    /// place without touching their status. Duplicate IDs in the listing
    /// collapse onto the first occurrence.
    pub fn merge_listing(&mut self, listing: &Listing) {
        self.title = listing.title.clone();
        self.description = listing.description.clone();
        self.link = listing.link.clone();
        self.image_url = listing.image_url.clone();
        self.updated_at = Utc::now();

        let mut seen = std::collections::HashSet::new();
        for remote in &listing.episodes {
            if !seen.insert(remote.id.as_str()) {
                continue;
            }

            match self.episodes.iter_mut().find(|e| e.id == remote.id) {
                Some(existing) => existing.refresh_from(remote),
                None => {
                    let mut episode = remote.clone();
                    episode.status = EpisodeStatus::New;
                    self.episodes.push(episode);
                }
            }
        }

        self.sort_episodes();
    }

    pub fn sort_episodes(&mut self) {
        self.episodes
            .sort_by(|a, b| b.pub_date.cmp(&a.pub_date).then_with(|| a.id.cmp(&b.id)));
    }
}

/// Output format of a feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    #[default]
    Audio,
    Video,
}

impl Format {
    pub fn has_video(self) -> bool {
        self == Format::Video
    }

    /// Container extension used for stored episodes
    pub fn extension(self) -> &'static str {
        match self {
            Format::Audio => "mp3",
            Format::Video => "mp4",
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::TimeZone;

    pub(crate) fn make_episode(id: &str, days: i64, status: EpisodeStatus) -> Episode {
        Episode {
            id: id.to_string(),
            title: format!("Episode {id}"),
            description: format!("Description of {id}"),
            pub_date: Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
                + chrono::Duration::days(days),
            video_url: Url::parse(&format!("https://example.com/{id}.mp3")).unwrap(),
            size: 0,
            status,
        }
    }

    pub(crate) fn make_listing(episodes: Vec<Episode>) -> Listing {
        Listing {
            title: "Test Channel".to_string(),
            description: None,
            link: None,
            image_url: None,
            episodes,
        }
    }

    #[test]
    fn transitions_follow_table() {
        use EpisodeStatus::*;

        assert!(New.can_transition_to(Downloaded));
        assert!(New.can_transition_to(Error));
        assert!(Error.can_transition_to(Downloaded));
        assert!(Downloaded.can_transition_to(Cleaned));
        assert!(Cleaned.can_transition_to(Cleaned));

        assert!(!New.can_transition_to(Cleaned));
        assert!(!Error.can_transition_to(Cleaned));
        assert!(!Downloaded.can_transition_to(New));
        assert!(!Downloaded.can_transition_to(Error));
        assert!(!Cleaned.can_transition_to(Downloaded));
        assert!(!Error.can_transition_to(New));
    }

    #[test]
    fn merge_inserts_new_and_keeps_local_status() {
        let mut feed = Feed::new("feed");
        feed.episodes
            .push(make_episode("old", 0, EpisodeStatus::Downloaded));

        let mut refreshed = make_episode("old", 0, EpisodeStatus::New);
        refreshed.title = "Renamed".to_string();
        let listing = make_listing(vec![
            make_episode("fresh", 1, EpisodeStatus::Downloaded),
            refreshed,
        ]);

        feed.merge_listing(&listing);

        assert_eq!(feed.title, "Test Channel");
        assert_eq!(feed.episodes.len(), 2);
        assert_eq!(feed.episodes[0].id, "fresh");
        assert_eq!(feed.episodes[0].status, EpisodeStatus::New);
        assert_eq!(feed.episodes[1].title, "Renamed");
        assert_eq!(feed.episodes[1].status, EpisodeStatus::Downloaded);
    }

    #[test]
    fn merge_collapses_duplicate_ids() {
        let mut feed = Feed::new("feed");
        let listing = make_listing(vec![
            make_episode("dup", 0, EpisodeStatus::New),
            make_episode("dup", 3, EpisodeStatus::New),
        ]);

        feed.merge_listing(&listing);

        assert_eq!(feed.episodes.len(), 1);
        assert_eq!(feed.episodes[0].pub_date, make_episode("dup", 0, EpisodeStatus::New).pub_date);
    }

    #[test]
    fn merge_does_not_restore_cleaned_metadata() {
        let mut cleaned = make_episode("gone", 0, EpisodeStatus::Cleaned);
        cleaned.title.clear();
        cleaned.description.clear();
        let mut feed = Feed::new("feed");
        feed.episodes.push(cleaned);

        feed.merge_listing(&make_listing(vec![make_episode("gone", 0, EpisodeStatus::New)]));

        assert_eq!(feed.episodes[0].status, EpisodeStatus::Cleaned);
        assert!(feed.episodes[0].title.is_empty());
        assert!(feed.episodes[0].description.is_empty());
    }
}
