// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use chrono::{DateTime, FixedOffset, Utc};
use tracing::debug;
use url::Url;

use crate::error::ListingError;
use crate::model::{Episode, EpisodeStatus, Listing};

/// GUID prefix YouTube uses in its channel and playlist feeds
const YOUTUBE_GUID_PREFIX: &str = "yt:video:";

/// Parse RSS feed XML bytes into a listing
///
/// Items without an enclosure are skipped. Every episode comes out as `New`;
/// the store decides the real status on merge.
pub fn parse_listing(xml_bytes: &[u8]) -> Result<Listing, ListingError> {
    let channel = rss::Channel::read_from(xml_bytes)?;

    let episodes = channel.items().iter().filter_map(parse_episode).collect();

    let image_url = channel
        .image()
        .and_then(|img| Url::parse(img.url()).ok())
        .or_else(|| {
            channel
                .itunes_ext()
                .and_then(|ext| ext.image())
                .and_then(|url| Url::parse(url).ok())
        });

    Ok(Listing {
        title: channel.title().to_string(),
        description: Some(channel.description().to_string()).filter(|s| !s.is_empty()),
        link: Url::parse(channel.link()).ok(),
        image_url,
        episodes,
    })
}

fn parse_episode(item: &rss::Item) -> Option<Episode> {
    let title = item
        .title()
        .map(String::from)
        .unwrap_or_else(|| "Untitled Episode".to_string());

    let Some(enclosure) = item.enclosure() else {
        debug!(title = %title, "skipping item without enclosure");
        return None;
    };

    let video_url = match Url::parse(enclosure.url()) {
        Ok(url) => url,
        Err(e) => {
            debug!(title = %title, error = %e, "skipping item with invalid enclosure URL");
            return None;
        }
    };

    let pub_date = item
        .pub_date()
        .and_then(|date_str| {
            DateTime::parse_from_rfc2822(date_str)
                .ok()
                .or_else(|| parse_relaxed_date(date_str))
        })
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);

    let id = item
        .guid()
        .map(|g| episode_id(g.value()))
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| enclosure.url().to_string());

    Some(Episode {
        id,
        title,
        description: item.description().map(String::from).unwrap_or_default(),
        pub_date,
        video_url,
        size: enclosure.length().parse().unwrap_or(0),
        status: EpisodeStatus::New,
    })
}

/// Provider ID from an item GUID
fn episode_id(guid: &str) -> String {
    guid.strip_prefix(YOUTUBE_GUID_PREFIX)
        .unwrap_or(guid)
        .trim()
        .to_string()
}

/// Try to parse dates that don't strictly conform to RFC 2822
fn parse_relaxed_date(date_str: &str) -> Option<DateTime<FixedOffset>> {
    const FORMATS: [&str; 3] = [
        "%a, %d %b %Y %H:%M:%S %z",
        "%Y-%m-%dT%H:%M:%S%:z",
        "%Y-%m-%d %H:%M:%S %z",
    ];

    FORMATS
        .iter()
        .find_map(|format| DateTime::parse_from_str(date_str, format).ok())
        .or_else(|| DateTime::parse_from_rfc3339(date_str).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const SAMPLE_FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:itunes="http://www.itunes.com/dtds/podcast-1.0.dtd">
  <channel>
    <title>Test Channel</title>
    <description>A test channel for unit testing</description>
    <link>https://example.com</link>
    <itunes:image href="https://example.com/image.jpg"/>
    <item>
      <title>Episode 1</title>
      <description>First episode</description>
      <pubDate>Mon, 01 Jan 2024 12:00:00 +0000</pubDate>
      <guid>yt:video:dQw4w9WgXcQ</guid>
      <enclosure url="https://example.com/ep1.mp4" length="1234567" type="video/mp4"/>
    </item>
    <item>
      <title>Episode 2</title>
      <enclosure url="https://example.com/ep2.mp4" type="video/mp4"/>
    </item>
    <item>
      <title>No Media</title>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn parse_listing_extracts_channel_metadata() {
        let listing = parse_listing(SAMPLE_FEED.as_bytes()).unwrap();

        assert_eq!(listing.title, "Test Channel");
        assert_eq!(
            listing.description,
            Some("A test channel for unit testing".to_string())
        );
        assert_eq!(
            listing.image_url.as_ref().map(Url::as_str),
            Some("https://example.com/image.jpg")
        );
    }

    #[test]
    fn parse_listing_extracts_episodes() {
        let listing = parse_listing(SAMPLE_FEED.as_bytes()).unwrap();

        assert_eq!(listing.episodes.len(), 2);

        let ep1 = &listing.episodes[0];
        assert_eq!(ep1.id, "dQw4w9WgXcQ");
        assert_eq!(ep1.title, "Episode 1");
        assert_eq!(ep1.description, "First episode");
        assert_eq!(ep1.size, 1234567);
        assert_eq!(ep1.status, EpisodeStatus::New);
        assert_eq!(
            ep1.pub_date,
            Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
        );
    }

    #[test]
    fn missing_guid_and_date_fall_back() {
        let listing = parse_listing(SAMPLE_FEED.as_bytes()).unwrap();

        let ep2 = &listing.episodes[1];
        assert_eq!(ep2.id, "https://example.com/ep2.mp4");
        assert_eq!(ep2.pub_date, DateTime::<Utc>::UNIX_EPOCH);
        assert_eq!(ep2.size, 0);
        assert!(ep2.description.is_empty());
    }

    #[test]
    fn relaxed_dates_are_accepted() {
        assert!(parse_relaxed_date("2024-01-01T12:00:00+00:00").is_some());
        assert!(parse_relaxed_date("2024-01-01 12:00:00 +0000").is_some());
        assert!(parse_relaxed_date("yesterday").is_none());
    }

    #[test]
    fn garbage_is_a_parse_error() {
        let result = parse_listing(b"this is not xml");
        assert!(matches!(result, Err(ListingError::ParseFailed(_))));
    }
}
