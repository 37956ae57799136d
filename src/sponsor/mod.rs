// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Sponsor segment handling: lookup, mode gating, keep-interval planning and
//! the ffmpeg filter graph that applies a plan.

mod graph;
mod lookup;
mod plan;

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;

pub use graph::{build_filter_graph, transcode_args};
pub use lookup::{NoSegmentLookup, SegmentLookup, SponsorBlockClient, skip_segments_url};
pub use plan::{KeepInterval, is_passthrough, plan_keep_intervals};

/// How a feed uses SponsorBlock data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SponsorMode {
    /// Use the global mode (only valid on feeds)
    #[default]
    Default,
    /// Never look up segments
    Off,
    /// Wait until segments have been submitted
    Require,
    /// Wait for the configured delay since publishing
    Delay,
    /// Wait for segments, but no longer than the configured delay
    RequireDelay,
}

impl SponsorMode {
    pub fn fetches_segments(self) -> bool {
        !matches!(self, SponsorMode::Off | SponsorMode::Default)
    }
}

/// Why an episode is left for a later run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeferReason {
    /// `delay` mode and the delay has not elapsed
    DelayPending,
    /// `require` mode and no segments were found
    SegmentsMissing,
    /// `requiredelay` mode, no segments, delay not elapsed
    SegmentsAndDelayPending,
}

impl std::fmt::Display for DeferReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            DeferReason::DelayPending => "configured delay has not passed yet",
            DeferReason::SegmentsMissing => "no sponsor segments submitted yet",
            DeferReason::SegmentsAndDelayPending => {
                "no sponsor segments yet and configured delay has not passed"
            }
        };
        f.write_str(text)
    }
}

/// Whether `delay` has elapsed between `published` and `now`
pub fn delay_passed(published: DateTime<Utc>, delay: Duration, now: DateTime<Utc>) -> bool {
    let elapsed = now.signed_duration_since(published);
    match chrono::Duration::from_std(delay) {
        Ok(delay) => elapsed > delay,
        Err(_) => false,
    }
}

/// Gate evaluated before any segment lookup
pub fn defer_before_lookup(mode: SponsorMode, delay_passed: bool) -> Option<DeferReason> {
    (mode == SponsorMode::Delay && !delay_passed).then_some(DeferReason::DelayPending)
}

/// Gate evaluated once the segment lookup returned
pub fn defer_after_lookup(
    mode: SponsorMode,
    segment_count: usize,
    delay_passed: bool,
) -> Option<DeferReason> {
    match mode {
        SponsorMode::Require if segment_count == 0 => Some(DeferReason::SegmentsMissing),
        SponsorMode::RequireDelay if segment_count == 0 && !delay_passed => {
            Some(DeferReason::SegmentsAndDelayPending)
        }
        _ => None,
    }
}

/// SponsorBlock categories podtrim asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SponsorCategory {
    Sponsor,
    Intro,
    Outro,
    Interaction,
    SelfPromo,
    MusicOfftopic,
}

impl SponsorCategory {
    pub const ALL: [SponsorCategory; 6] = [
        SponsorCategory::Sponsor,
        SponsorCategory::Intro,
        SponsorCategory::Outro,
        SponsorCategory::Interaction,
        SponsorCategory::SelfPromo,
        SponsorCategory::MusicOfftopic,
    ];

    /// Name used by the SponsorBlock API
    pub fn api_name(self) -> &'static str {
        match self {
            SponsorCategory::Sponsor => "sponsor",
            SponsorCategory::Intro => "intro",
            SponsorCategory::Outro => "outro",
            SponsorCategory::Interaction => "interaction",
            SponsorCategory::SelfPromo => "selfpromo",
            SponsorCategory::MusicOfftopic => "music_offtopic",
        }
    }

    pub fn from_api_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.api_name() == name)
    }
}

/// What to do with segments of one category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryAction {
    /// Inherit the global setting
    #[default]
    Default,
    Cut,
    Keep,
}

/// Per-category cut/keep policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default = "CategoryPolicy::unset")]
pub struct CategoryPolicy {
    pub sponsors: CategoryAction,
    pub intermissions: CategoryAction,
    pub endcards: CategoryAction,
    pub interaction_reminders: CategoryAction,
    pub self_promotions: CategoryAction,
    pub nonmusic_sections: CategoryAction,
}

impl Default for CategoryPolicy {
    /// Matches SponsorBlock's own defaults
    fn default() -> Self {
        Self {
            sponsors: CategoryAction::Cut,
            intermissions: CategoryAction::Keep,
            endcards: CategoryAction::Keep,
            interaction_reminders: CategoryAction::Keep,
            self_promotions: CategoryAction::Keep,
            nonmusic_sections: CategoryAction::Cut,
        }
    }
}

impl CategoryPolicy {
    /// A policy where every category inherits
    pub fn unset() -> Self {
        Self {
            sponsors: CategoryAction::Default,
            intermissions: CategoryAction::Default,
            endcards: CategoryAction::Default,
            interaction_reminders: CategoryAction::Default,
            self_promotions: CategoryAction::Default,
            nonmusic_sections: CategoryAction::Default,
        }
    }

    /// Replace every inherited entry with the one from `fallback`
    pub fn resolve(&self, fallback: &CategoryPolicy) -> CategoryPolicy {
        let pick = |own: CategoryAction, other: CategoryAction| match own {
            CategoryAction::Default => other,
            set => set,
        };

        CategoryPolicy {
            sponsors: pick(self.sponsors, fallback.sponsors),
            intermissions: pick(self.intermissions, fallback.intermissions),
            endcards: pick(self.endcards, fallback.endcards),
            interaction_reminders: pick(self.interaction_reminders, fallback.interaction_reminders),
            self_promotions: pick(self.self_promotions, fallback.self_promotions),
            nonmusic_sections: pick(self.nonmusic_sections, fallback.nonmusic_sections),
        }
    }

    pub fn action(&self, category: SponsorCategory) -> CategoryAction {
        match category {
            SponsorCategory::Sponsor => self.sponsors,
            SponsorCategory::Intro => self.intermissions,
            SponsorCategory::Outro => self.endcards,
            SponsorCategory::Interaction => self.interaction_reminders,
            SponsorCategory::SelfPromo => self.self_promotions,
            SponsorCategory::MusicOfftopic => self.nonmusic_sections,
        }
    }

    /// Whether segments of `category` are removed
    ///
    /// Inherited entries fall back to [`CategoryPolicy::default`].
    pub fn cuts(&self, category: SponsorCategory) -> bool {
        match self.action(category) {
            CategoryAction::Cut => true,
            CategoryAction::Keep => false,
            CategoryAction::Default => {
                CategoryPolicy::default().action(category) == CategoryAction::Cut
            }
        }
    }
}

/// A time range flagged by SponsorBlock, in seconds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SponsorSegment {
    pub category: SponsorCategory,
    pub start: f64,
    pub end: f64,
}
