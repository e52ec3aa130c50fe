//! # gb-videos
//!
//! Lists Giant Bomb video shows and videos in the terminal.

use anyhow::{Context, Result, bail};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use clap::{Parser, Subcommand};
use gb_videos::config::{self, Overrides, Settings};
use gb_videos::model::{PUBLISH_DATE_FORMAT, Resolution, parse_publish_date};
use gb_videos::{CatalogClient, filter, logging, render};
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about,
    long_about = "gb-videos: list Giant Bomb video shows and videos.\n\
                  The API key is read from --api-key, GIANTBOMB_API_KEY or the config file."
)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to the config file (default: per-user config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Giant Bomb API key
    #[arg(long, global = true)]
    api_key: Option<String>,

    /// Request timeout in seconds (default 10)
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Number of entries to request (1-100)
    #[arg(short, long, global = true)]
    limit: Option<u32>,

    /// Hide entries whose name contains this text (repeatable)
    #[arg(short = 'x', long, global = true)]
    exclude: Vec<String>,

    /// Preferred video rendition (hd, high, low)
    #[arg(short, long, global = true)]
    resolution: Option<String>,

    /// Print decoded records as JSON
    #[arg(long, global = true)]
    json: bool,

    /// More log output on stderr (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Show the config file path and exit
    #[arg(long)]
    paths: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List video shows
    Shows,
    /// List videos
    Videos {
        /// Only videos published after this date (YYYY-MM-DD or RFC 3339)
        #[arg(long)]
        since: Option<String>,
    },
}

/// Bare dates mean midnight Pacific, the zone the API publishes in.
fn parse_since(raw: &str) -> Result<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        let midnight = date.and_time(NaiveTime::MIN).format(PUBLISH_DATE_FORMAT).to_string();
        return parse_publish_date(&midnight)
            .map_err(|e| anyhow::anyhow!("invalid --since value: {}", e));
    }
    parse_publish_date(raw).map_err(|e| anyhow::anyhow!("invalid --since value: {}", e))
}

fn overrides_from_args(args: &Args) -> Result<Overrides> {
    let resolution = args
        .resolution
        .as_deref()
        .map(Resolution::from_str)
        .transpose()
        .map_err(anyhow::Error::msg)?;

    Ok(Overrides {
        api_key: args.api_key.clone(),
        timeout_secs: args.timeout,
        limit: args.limit,
        exclude: args.exclude.clone(),
        resolution,
    })
}

fn main() -> Result<()> {
    let args = Args::parse();
    logging::init_tracing(args.verbose);

    if args.paths {
        let path = match &args.config {
            Some(path) => path.clone(),
            None => config::default_config_path()?,
        };
        println!("App Paths:");
        println!("  Config: {}", path.display());
        return Ok(());
    }

    let Some(command) = &args.command else {
        bail!("no command given; try `gb-videos shows` or `gb-videos videos`");
    };

    let settings = Settings::load(args.config.as_deref(), overrides_from_args(&args)?)?;
    let credential = settings.credential()?;
    let client = CatalogClient::with_options(settings.client_options())
        .context("failed to build HTTP client")?;

    match command {
        Command::Shows => {
            let shows = client
                .fetch_shows(credential)
                .context("failed to fetch video shows")?;
            let shows = filter::dedup_by_id(filter::exclude_names(shows, &settings.exclude));

            if args.json {
                println!("{}", serde_json::to_string_pretty(&shows)?);
            } else {
                print!("{}", render::shows_table(&shows));
            }
        }
        Command::Videos { since } => {
            let since = since.as_deref().map(parse_since).transpose()?;
            let videos = client
                .fetch_videos(credential)
                .context("failed to fetch videos")?;
            let mut videos = filter::dedup_by_id(filter::exclude_names(videos, &settings.exclude));
            if let Some(since) = since {
                videos = filter::published_after(videos, since);
            }

            if args.json {
                println!("{}", serde_json::to_string_pretty(&videos)?);
            } else {
                print!("{}", render::videos_table(&videos, settings.resolution));
            }
        }
    }

    Ok(())
}
