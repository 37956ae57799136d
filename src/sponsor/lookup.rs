// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info, warn};
use url::Url;

use super::{SponsorCategory, SponsorSegment};
use crate::http::HttpClient;

/// Source of sponsor segments for a video
///
/// Lookups never fail: every problem is logged and reported as "no segments".
#[async_trait]
pub trait SegmentLookup: Send + Sync {
    async fn segments(&self, video_id: &str) -> Vec<SponsorSegment>;
}

/// Lookup used when SponsorBlock is not configured
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSegmentLookup;

#[async_trait]
impl SegmentLookup for NoSegmentLookup {
    async fn segments(&self, _video_id: &str) -> Vec<SponsorSegment> {
        Vec::new()
    }
}

#[derive(Debug, Deserialize)]
struct RawSegment {
    segment: [f64; 2],
    category: String,
}

/// SponsorBlock `skipSegments` API client
#[derive(Clone)]
pub struct SponsorBlockClient<C> {
    client: C,
    base_url: String,
}

impl<C: HttpClient> SponsorBlockClient<C> {
    pub fn new(client: C, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

/// Build the `skipSegments` URL for a video, asking for every known category
pub fn skip_segments_url(base_url: &str, video_id: &str) -> Result<Url, url::ParseError> {
    let categories = SponsorCategory::ALL
        .iter()
        .map(|c| format!("\"{}\"", c.api_name()))
        .collect::<Vec<_>>()
        .join(",");

    let mut url = Url::parse(&format!(
        "{}/api/skipSegments",
        base_url.trim_end_matches('/')
    ))?;
    url.query_pairs_mut()
        .append_pair("categories", &format!("[{categories}]"))
        .append_pair("videoID", video_id);
    Ok(url)
}

fn parse_segments(body: &[u8]) -> Result<Vec<SponsorSegment>, serde_json::Error> {
    let raw: Vec<RawSegment> = serde_json::from_slice(body)?;

    Ok(raw
        .into_iter()
        .filter_map(|r| match SponsorCategory::from_api_name(&r.category) {
            Some(category) => Some(SponsorSegment {
                category,
                start: r.segment[0],
                end: r.segment[1],
            }),
            None => {
                debug!(category = %r.category, "ignoring segment with unknown category");
                None
            }
        })
        .collect())
}

#[async_trait]
impl<C: HttpClient> SegmentLookup for SponsorBlockClient<C> {
    async fn segments(&self, video_id: &str) -> Vec<SponsorSegment> {
        let url = match skip_segments_url(&self.base_url, video_id) {
            Ok(url) => url,
            Err(e) => {
                warn!(base_url = %self.base_url, error = %e, "invalid SponsorBlock URL");
                return Vec::new();
            }
        };

        debug!(%url, "querying SponsorBlock");
        let response = match self.client.get_bytes(url.as_str()).await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "failed to retrieve sponsor segments");
                return Vec::new();
            }
        };

        match response.status {
            200 => match parse_segments(&response.body) {
                Ok(segments) => {
                    debug!(count = segments.len(), "received sponsor segments");
                    segments
                }
                Err(e) => {
                    warn!(error = %e, "failed to parse SponsorBlock response");
                    Vec::new()
                }
            },
            404 => {
                info!(video_id, "no sponsor segments available yet");
                Vec::new()
            }
            status => {
                warn!(status, "SponsorBlock returned an unexpected status");
                Vec::new()
            }
        }
    }
}
