// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use regex::Regex;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::model::Episode;

/// Regex filters deciding which episodes get downloaded
///
/// Empty patterns match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Filters {
    /// Title must match
    pub title: String,
    /// Title must not match
    pub not_title: String,
    /// Description must match
    pub description: String,
    /// Description must not match
    pub not_description: String,
}

#[derive(Debug, Clone, Copy)]
enum Field {
    Title,
    Description,
}

struct Rule {
    name: &'static str,
    field: Field,
    negative: bool,
    regex: Regex,
}

/// Compiled form of [`Filters`]
///
/// Patterns that fail to compile are logged once and dropped, so they never
/// block a download.
pub struct EpisodeFilter {
    rules: Vec<Rule>,
}

impl EpisodeFilter {
    pub fn new(filters: &Filters) -> Self {
        let specs = [
            ("title", Field::Title, false, &filters.title),
            ("not_title", Field::Title, true, &filters.not_title),
            ("description", Field::Description, false, &filters.description),
            ("not_description", Field::Description, true, &filters.not_description),
        ];

        let rules = specs
            .into_iter()
            .filter(|(_, _, _, pattern)| !pattern.is_empty())
            .filter_map(|(name, field, negative, pattern)| match Regex::new(pattern) {
                Ok(regex) => Some(Rule {
                    name,
                    field,
                    negative,
                    regex,
                }),
                Err(e) => {
                    warn!(filter = name, pattern = %pattern, error = %e, "pattern is not a valid regex, ignoring it");
                    None
                }
            })
            .collect();

        Self { rules }
    }

    /// Whether every rule accepts the episode
    pub fn matches(&self, episode: &Episode) -> bool {
        self.rules.iter().all(|rule| {
            let text = match rule.field {
                Field::Title => &episode.title,
                Field::Description => &episode.description,
            };

            let accepted = rule.regex.is_match(text) != rule.negative;
            if !accepted {
                debug!(episode_id = %episode.id, filter = rule.name, "skipping due to filter mismatch");
            }
            accepted
        })
    }
}

/// One-shot convenience over [`EpisodeFilter`]
pub fn matches_filters(episode: &Episode, filters: &Filters) -> bool {
    EpisodeFilter::new(filters).matches(episode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EpisodeStatus;
    use crate::model::tests::make_episode;

    fn episode(title: &str, description: &str) -> Episode {
        let mut episode = make_episode("ep", 0, EpisodeStatus::New);
        episode.title = title.to_string();
        episode.description = description.to_string();
        episode
    }

    #[test]
    fn empty_filters_always_pass() {
        assert!(matches_filters(&episode("", ""), &Filters::default()));
        assert!(matches_filters(
            &episode("Anything", "at all"),
            &Filters::default()
        ));
    }

    #[test]
    fn title_must_match() {
        let filters = Filters {
            title: "^Weekly".to_string(),
            ..Default::default()
        };

        assert!(matches_filters(&episode("Weekly News 12", ""), &filters));
        assert!(!matches_filters(&episode("Bonus: Weekly", ""), &filters));
    }

    #[test]
    fn not_title_match_always_excludes() {
        let filters = Filters {
            not_title: "(?i)#shorts".to_string(),
            ..Default::default()
        };

        assert!(!matches_filters(&episode("Quick tip #Shorts", ""), &filters));
        assert!(matches_filters(&episode("Full episode", ""), &filters));
    }

    #[test]
    fn description_filters_are_applied() {
        let filters = Filters {
            description: "interview".to_string(),
            not_description: "rerun".to_string(),
            ..Default::default()
        };

        assert!(matches_filters(&episode("t", "an interview"), &filters));
        assert!(!matches_filters(&episode("t", "an interview rerun"), &filters));
        assert!(!matches_filters(&episode("t", "a monologue"), &filters));
    }

    #[test]
    fn invalid_pattern_passes() {
        let filters = Filters {
            title: "(unclosed".to_string(),
            not_title: "[".to_string(),
            ..Default::default()
        };

        assert!(matches_filters(&episode("Whatever", ""), &filters));
    }

    #[test]
    fn invalid_pattern_does_not_disable_valid_ones() {
        let filters = Filters {
            title: "(unclosed".to_string(),
            not_description: "sponsored".to_string(),
            ..Default::default()
        };

        assert!(!matches_filters(&episode("Whatever", "sponsored talk"), &filters));
    }
}
