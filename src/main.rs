// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result, bail};
use clap::Parser;
use colored::Colorize;
use console::Emoji;
use futures::future::join_all;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use podtrim::{
    Config, FeedConfig, FfmpegTranscoder, HttpDownloader, JsonCatalogPublisher, JsonFeedPublisher,
    JsonStore, LocalStorage, NoopReporter, ProgressEvent, ProgressReporter, ReqwestClient,
    RssListingProvider, SharedProgressReporter, SponsorBlockClient, Updater,
};

// Emoji with fallback for terminals without Unicode support
static SCISSORS: Emoji<'_, '_> = Emoji("✂️  ", "");
static SEARCH: Emoji<'_, '_> = Emoji("🔍 ", "[~] ");
static TV: Emoji<'_, '_> = Emoji("📺 ", "[i] ");
static DOWNLOAD: Emoji<'_, '_> = Emoji("📥 ", "[v] ");
static CUT: Emoji<'_, '_> = Emoji("🎬 ", "[c] ");
static SUCCESS: Emoji<'_, '_> = Emoji("✅ ", "[+] ");
static FAILURE: Emoji<'_, '_> = Emoji("❌ ", "[!] ");
static BROOM: Emoji<'_, '_> = Emoji("🧹 ", "[-] ");
static FOLDER: Emoji<'_, '_> = Emoji("📁 ", "");

/// Mirror video channels as podcasts, with sponsor segments cut out
#[derive(Parser, Debug)]
#[command(name = "podtrim")]
#[command(about = "Mirror video channels as podcasts, with sponsor segments cut out")]
#[command(version)]
struct Args {
    /// Path to the TOML configuration file
    config: PathBuf,

    /// Only update the feed with this ID (repeatable)
    #[arg(short, long = "feed")]
    feeds: Vec<String>,

    /// Keep running and update each feed on its configured period
    #[arg(short, long)]
    watch: bool,

    /// Quiet mode - suppress progress output
    #[arg(short, long)]
    quiet: bool,
}

/// Progress reporter using indicatif for terminal output
struct IndicatifReporter {
    multi: MultiProgress,
    spinners: Mutex<HashMap<String, ProgressBar>>,
    bars: Mutex<HashMap<String, ProgressBar>>,
}

impl IndicatifReporter {
    fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            spinners: Mutex::new(HashMap::new()),
            bars: Mutex::new(HashMap::new()),
        }
    }

    fn spinner(&self, feed_id: &str) -> ProgressBar {
        let Ok(mut spinners) = self.spinners.lock() else {
            return ProgressBar::hidden();
        };

        if let Some(spinner) = spinners.get(feed_id) {
            return spinner.clone();
        }

        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} {wide_msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());

        let spinner = self.multi.add(ProgressBar::new_spinner());
        spinner.set_style(style);
        spinner.enable_steady_tick(std::time::Duration::from_millis(100));
        spinners.insert(feed_id.to_string(), spinner.clone());
        spinner
    }

    fn finish_spinner(&self, feed_id: &str, message: String, failed: bool) {
        let spinner = self.spinner(feed_id);
        if failed {
            spinner.abandon_with_message(message);
        } else {
            spinner.finish_with_message(message);
        }
        if let Ok(mut spinners) = self.spinners.lock() {
            spinners.remove(feed_id);
        }
    }

    fn bar(&self, feed_id: &str) -> ProgressBar {
        let Ok(mut bars) = self.bars.lock() else {
            return ProgressBar::hidden();
        };

        if let Some(bar) = bars.get(feed_id) {
            return bar.clone();
        }

        let style = ProgressStyle::default_bar()
            .template(&format!(
                "  {DOWNLOAD}[{{bar:30.cyan/blue}}] {{bytes}}/{{total_bytes}} {{wide_msg}}"
            ))
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓░");

        let bar = self.multi.add(ProgressBar::new(0));
        bar.set_style(style);
        bars.insert(feed_id.to_string(), bar.clone());
        bar
    }

    fn finish_bar(&self, feed_id: &str) {
        if let Ok(mut bars) = self.bars.lock()
            && let Some(bar) = bars.remove(feed_id)
        {
            bar.finish_and_clear();
        }
    }
}

impl ProgressReporter for IndicatifReporter {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::UpdateStarted { feed_id } => {
                self.spinner(&feed_id)
                    .set_message(format!("{SEARCH}{}: fetching listing", feed_id.cyan()));
            }

            ProgressEvent::ListingReconciled {
                feed_id,
                title,
                total_episodes,
                removed_episodes,
            } => {
                self.spinner(&feed_id).set_message(format!(
                    "{TV}{} • {} episodes, {} removed",
                    title.bold().green(),
                    total_episodes.to_string().cyan(),
                    removed_episodes.to_string().yellow()
                ));
            }

            ProgressEvent::CandidatesSelected { feed_id, count } => {
                self.spinner(&feed_id).set_message(format!(
                    "{TV}{}: {} episodes to process",
                    feed_id.cyan(),
                    count.to_string().yellow()
                ));
            }

            ProgressEvent::EpisodeStarting {
                feed_id,
                title,
                index,
                total,
                ..
            } => {
                let bar = self.bar(&feed_id);
                bar.set_length(0);
                bar.set_position(0);
                bar.set_message(format!(
                    "[{}/{}] {}",
                    (index + 1).to_string().cyan(),
                    total.to_string().cyan(),
                    truncate_title(&title, 40)
                ));
            }

            ProgressEvent::DownloadProgress {
                feed_id,
                bytes_downloaded,
                total_bytes,
                ..
            } => {
                let bar = self.bar(&feed_id);
                if let Some(total) = total_bytes {
                    bar.set_length(total);
                }
                bar.set_position(bytes_downloaded);
            }

            ProgressEvent::Transcoding {
                feed_id,
                kept_intervals,
                ..
            } => {
                self.bar(&feed_id).set_message(format!(
                    "{CUT}cutting, keeping {} intervals",
                    kept_intervals.to_string().cyan()
                ));
            }

            ProgressEvent::EpisodeFinished {
                feed_id,
                episode_id,
                outcome,
            } => {
                self.finish_bar(&feed_id);
                let _ = self.multi.println(format!(
                    "  {}{} {}",
                    if outcome.starts_with("failed") {
                        FAILURE
                    } else {
                        SUCCESS
                    },
                    episode_id.yellow(),
                    outcome.dimmed()
                ));
            }

            ProgressEvent::CleanupCompleted { feed_id, cleaned } => {
                let _ = self.multi.println(format!(
                    "  {BROOM}{}: cleaned {} old episodes",
                    feed_id.cyan(),
                    cleaned.to_string().yellow()
                ));
            }

            ProgressEvent::UpdateCompleted {
                feed_id,
                downloaded,
                skipped,
                deferred,
                failed,
            } => {
                self.finish_bar(&feed_id);
                self.finish_spinner(
                    &feed_id,
                    format!(
                        "{SUCCESS}{} {} downloaded, {} skipped, {} deferred, {} failed",
                        format!("{feed_id}:").bold().green(),
                        downloaded.to_string().green().bold(),
                        skipped.to_string().yellow(),
                        deferred.to_string().yellow(),
                        if failed > 0 {
                            failed.to_string().red().bold()
                        } else {
                            failed.to_string().green()
                        }
                    ),
                    false,
                );
            }

            ProgressEvent::UpdateFailed { feed_id, error } => {
                self.finish_bar(&feed_id);
                self.finish_spinner(
                    &feed_id,
                    format!("{FAILURE}{} {}", format!("{feed_id}:").bold().red(), error.red()),
                    true,
                );
            }
        }
    }
}

fn truncate_title(title: &str, max_len: usize) -> String {
    if title.chars().count() <= max_len {
        title.to_string()
    } else {
        let cut: String = title.chars().take(max_len.saturating_sub(3)).collect();
        format!("{cut}...")
    }
}

fn init_tracing(config: &Config, quiet: bool) -> Result<()> {
    // Progress bars stay readable unless a level was asked for
    let default_level = match (&config.log.level, quiet) {
        (Some(level), _) => level.as_str(),
        (None, true) => "info",
        (None, false) => "warn",
    };

    let env_filter = match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(_) => EnvFilter::from_default_env(),
        Err(_) => EnvFilter::try_new(default_level)
            .with_context(|| format!("Invalid log level '{default_level}'"))?,
    };

    if config.log.json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .with(env_filter)
            .init();
    }

    Ok(())
}

/// Pick the feeds named on the command line, or all of them
fn selected_feeds<'a>(config: &'a Config, ids: &[String]) -> Result<Vec<&'a FeedConfig>> {
    if ids.is_empty() {
        return Ok(config.feeds.values().collect());
    }

    ids.iter()
        .map(|id| match config.feeds.get(id) {
            Some(feed) => Ok(feed),
            None => bail!("Unknown feed '{id}'"),
        })
        .collect()
}

fn build_updater(config: &Config, reporter: SharedProgressReporter) -> Result<Updater> {
    let client = ReqwestClient::new();

    let store = JsonStore::open(&config.database.dir).with_context(|| {
        format!(
            "Failed to open database at {}",
            config.database.dir.display()
        )
    })?;

    let updater = Updater::new(
        Arc::new(store),
        Arc::new(LocalStorage::new(&config.server.data_dir)),
        Arc::new(RssListingProvider::new(client.clone())),
        Arc::new(HttpDownloader::new(client.clone()).with_reporter(reporter.clone())),
    )
    .with_segment_lookup(Arc::new(SponsorBlockClient::new(
        client,
        config.sponsorblock.url.clone(),
    )))
    .with_transcoder(Arc::new(FfmpegTranscoder::default()))
    .with_publishers(
        Arc::new(JsonFeedPublisher::new(
            &config.server.data_dir,
            config.server.hostname.clone(),
        )),
        Arc::new(JsonCatalogPublisher::new(
            &config.server.data_dir,
            config.server.hostname.clone(),
            config.feeds.values(),
        )),
    )
    .with_reporter(reporter);

    Ok(updater)
}

/// Update `feed` on its period until cancelled
async fn watch_feed(updater: &Updater, feed: &FeedConfig, cancel: &CancellationToken) {
    loop {
        if let Err(e) = updater.update(feed, cancel).await {
            warn!(feed_id = %feed.id, error = %e, "update failed, retrying next period");
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(feed.update_period()) => {}
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load(&args.config)
        .with_context(|| format!("Failed to load {}", args.config.display()))?;
    init_tracing(&config, args.quiet)?;

    if !args.quiet {
        println!(
            "\n{}{} {}\n",
            SCISSORS,
            "podtrim".bold().magenta(),
            "- Sponsor-free podcast mirror".dimmed()
        );
    }

    let feeds = selected_feeds(&config, &args.feeds)?;

    let reporter: SharedProgressReporter = if args.quiet {
        NoopReporter::shared()
    } else {
        Arc::new(IndicatifReporter::new())
    };
    let updater = build_updater(&config, reporter)?;

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupt received, stopping");
                cancel.cancel();
            }
        });
    }

    if args.watch {
        join_all(
            feeds
                .iter()
                .map(|feed| watch_feed(&updater, feed, &cancel)),
        )
        .await;
        return Ok(());
    }

    let results = join_all(feeds.iter().map(|feed| updater.update(feed, &cancel))).await;

    let failures: Vec<_> = feeds
        .iter()
        .zip(&results)
        .filter_map(|(feed, result)| result.as_ref().err().map(|e| (&feed.id, e)))
        .collect();

    if !args.quiet && !failures.is_empty() {
        println!("\n{}", "Failed feeds:".red().bold());
        for (feed_id, error) in &failures {
            println!("  {}{} - {}", FAILURE, feed_id.yellow(), error.to_string().dimmed());
        }
    }

    if !args.quiet {
        println!(
            "\n{FOLDER}Output: {}\n",
            config.server.data_dir.display().to_string().cyan()
        );
    }

    if !failures.is_empty() {
        std::process::exit(1);
    }

    Ok(())
}
