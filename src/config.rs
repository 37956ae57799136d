// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::filter::Filters;
use crate::model::Format;
use crate::sponsor::{CategoryPolicy, SponsorMode};

pub const DEFAULT_SPONSORBLOCK_URL: &str = "https://sponsor.ajay.app";
pub const DEFAULT_PAGE_SIZE: usize = 50;
pub const DEFAULT_UPDATE_PERIOD_SECS: u64 = 6 * 60 * 60;

/// Web-facing layout of published files
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Server {
    /// Base URL used for enclosure links in published documents
    pub hostname: String,
    pub port: u16,
    /// Root for downloaded episodes and published documents
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Database {
    pub dir: PathBuf,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: Option<String>,
    pub json: bool,
}

/// Global SponsorBlock settings, used as fallback by every feed
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SponsorBlock {
    pub url: String,
    pub default_mode: SponsorMode,
    pub default_delay_secs: u64,
    pub categories: CategoryPolicy,
}

impl Default for SponsorBlock {
    fn default() -> Self {
        Self {
            url: DEFAULT_SPONSORBLOCK_URL.to_string(),
            default_mode: SponsorMode::Off,
            default_delay_secs: 0,
            categories: CategoryPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default)]
pub struct Cleanup {
    /// How many downloaded episodes to keep; 0 disables cleanup
    pub keep_last: usize,
}

/// Configuration of a single feed
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    #[serde(skip)]
    pub id: String,
    pub url: String,
    /// Upper bound on pending episodes evaluated per run
    pub page_size: usize,
    pub format: Format,
    pub update_period_secs: u64,
    pub filters: Filters,
    pub clean: Cleanup,
    /// Include this feed in the published catalog
    pub opml: bool,
    pub sponsorblock_mode: SponsorMode,
    pub sponsorblock_delay_secs: Option<u64>,
    pub sponsorblock_categories: CategoryPolicy,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            id: String::new(),
            url: String::new(),
            page_size: DEFAULT_PAGE_SIZE,
            format: Format::default(),
            update_period_secs: DEFAULT_UPDATE_PERIOD_SECS,
            filters: Filters::default(),
            clean: Cleanup::default(),
            opml: true,
            sponsorblock_mode: SponsorMode::Default,
            sponsorblock_delay_secs: None,
            sponsorblock_categories: CategoryPolicy::unset(),
        }
    }
}

impl FeedConfig {
    /// Create a feed with default settings
    pub fn new(id: &str, url: &str) -> Self {
        Self {
            id: id.to_string(),
            url: url.to_string(),
            sponsorblock_mode: SponsorMode::Off,
            sponsorblock_categories: CategoryPolicy::default(),
            ..Default::default()
        }
    }

    pub fn sponsorblock_delay(&self) -> Duration {
        Duration::from_secs(self.sponsorblock_delay_secs.unwrap_or(0))
    }

    pub fn update_period(&self) -> Duration {
        Duration::from_secs(self.update_period_secs)
    }
}

/// Top-level configuration file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: Server,
    pub database: Database,
    pub log: LogConfig,
    pub sponsorblock: SponsorBlock,
    pub feeds: BTreeMap<String, FeedConfig>,
}

impl Config {
    /// Load, default and validate a TOML configuration file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

        let mut config: Config = toml::from_str(&content).map_err(|e| ConfigError::ParseFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

        config.apply_defaults(path);
        config.validate()?;
        Ok(config)
    }

    /// Fill derived values and resolve every feed-level `default` against the globals
    pub fn apply_defaults(&mut self, config_path: &Path) {
        if self.server.hostname.is_empty() {
            self.server.hostname = if self.server.port != 0 && self.server.port != 80 {
                format!("http://localhost:{}", self.server.port)
            } else {
                "http://localhost".to_string()
            };
        }

        if self.database.dir.as_os_str().is_empty() {
            let base = config_path.parent().unwrap_or_else(|| Path::new("."));
            self.database.dir = base.join("db");
        }

        if self.sponsorblock.url.is_empty() {
            self.sponsorblock.url = DEFAULT_SPONSORBLOCK_URL.to_string();
        }

        self.sponsorblock.categories = self
            .sponsorblock
            .categories
            .resolve(&CategoryPolicy::default());

        for (id, feed) in self.feeds.iter_mut() {
            feed.id = id.clone();

            if feed.sponsorblock_mode == SponsorMode::Default {
                feed.sponsorblock_mode = self.sponsorblock.default_mode;
            }

            if feed.sponsorblock_delay_secs.is_none() {
                feed.sponsorblock_delay_secs = Some(self.sponsorblock.default_delay_secs);
            }

            feed.sponsorblock_categories = feed
                .sponsorblock_categories
                .resolve(&self.sponsorblock.categories);
        }
    }

    /// Collect every configuration problem into a single error
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut problems = Vec::new();

        if self.server.data_dir.as_os_str().is_empty() {
            problems.push("data directory is required".to_string());
        }

        if !self.server.data_dir.as_os_str().is_empty() && self.database.dir == self.server.data_dir {
            problems.push("database.dir must differ from server.data_dir".to_string());
        }

        if self.feeds.is_empty() {
            problems.push("at least one feed must be specified".to_string());
        }

        if self.sponsorblock.default_mode == SponsorMode::Default {
            problems.push("sponsorblock.default_mode cannot be 'default'".to_string());
        }

        for (id, feed) in &self.feeds {
            if feed.url.is_empty() {
                problems.push(format!("URL is required for '{id}'"));
            }
            if feed.page_size == 0 {
                problems.push(format!("page_size must be positive for '{id}'"));
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(problems))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sponsor::{CategoryAction, SponsorCategory};
    use tempfile::tempdir;

    const SAMPLE_CONFIG: &str = r#"
[server]
data_dir = "/srv/podtrim"
port = 8080

[sponsorblock]
default_mode = "require"
default_delay_secs = 3600

[sponsorblock.categories]
intermissions = "cut"

[feeds.tech]
url = "https://example.com/tech.xml"
page_size = 10
format = "video"

[feeds.tech.filters]
not_title = "(?i)shorts"

[feeds.tech.clean]
keep_last = 5

[feeds.news]
url = "https://example.com/news.xml"
sponsorblock_mode = "off"
sponsorblock_delay_secs = 60

[feeds.news.sponsorblock_categories]
sponsors = "keep"
endcards = "default"
"#;

    fn load_sample() -> Config {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, SAMPLE_CONFIG).unwrap();
        Config::load(&path).unwrap()
    }

    #[test]
    fn load_applies_server_defaults() {
        let config = load_sample();

        assert_eq!(config.server.hostname, "http://localhost:8080");
        assert_eq!(config.sponsorblock.url, DEFAULT_SPONSORBLOCK_URL);
        assert!(config.database.dir.ends_with("db"));
    }

    #[test]
    fn load_resolves_feed_settings() {
        let config = load_sample();

        let tech = &config.feeds["tech"];
        assert_eq!(tech.id, "tech");
        assert_eq!(tech.page_size, 10);
        assert_eq!(tech.format, Format::Video);
        assert_eq!(tech.filters.not_title, "(?i)shorts");
        assert_eq!(tech.clean.keep_last, 5);
        assert_eq!(tech.sponsorblock_mode, SponsorMode::Require);
        assert_eq!(tech.sponsorblock_delay(), Duration::from_secs(3600));
        assert_eq!(
            tech.sponsorblock_categories.action(SponsorCategory::Intro),
            CategoryAction::Cut
        );

        let news = &config.feeds["news"];
        assert_eq!(news.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(news.format, Format::Audio);
        assert_eq!(news.sponsorblock_mode, SponsorMode::Off);
        assert_eq!(news.sponsorblock_delay(), Duration::from_secs(60));
        assert_eq!(
            news.sponsorblock_categories.action(SponsorCategory::Sponsor),
            CategoryAction::Keep
        );
        assert_eq!(
            news.sponsorblock_categories.action(SponsorCategory::Outro),
            CategoryAction::Keep
        );
        assert_eq!(
            news.sponsorblock_categories.action(SponsorCategory::MusicOfftopic),
            CategoryAction::Cut
        );
    }

    #[test]
    fn validate_collects_all_problems() {
        let mut config = Config::default();
        config.sponsorblock.default_mode = SponsorMode::Default;

        let err = config.validate().unwrap_err();
        match err {
            ConfigError::Invalid(problems) => assert_eq!(problems.len(), 3),
            other => panic!("Expected Invalid, got {other:?}"),
        }
    }

    #[test]
    fn validate_rejects_feed_without_url() {
        let mut config = Config::default();
        config.server.data_dir = PathBuf::from("/tmp");
        config.feeds.insert("empty".to_string(), FeedConfig::default());

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("URL is required for 'empty'"));
    }

    #[test]
    fn load_reports_parse_errors() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "[server\ndata_dir = ").unwrap();

        assert!(matches!(
            Config::load(&path),
            Err(ConfigError::ParseFailed { .. })
        ));
    }
}
