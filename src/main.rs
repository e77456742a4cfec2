use anyhow::{Context, Result};
use clap::Parser;
use dotenv::dotenv;
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use tweetcsv::export::{self, TweetRow};
use tweetcsv::twitter::TwitterClient;

#[derive(Parser, Debug)]
#[command(
    name = "tweetcsv",
    version,
    about = "Export a Twitter user's timeline to CSV",
    long_about = "A CLI tool for fetching a public user's tweet history and exporting it to a CSV file"
)]
struct Cli {
    /// Twitter username (without the @ symbol)
    #[arg(long, required = true)]
    username: String,

    /// Output CSV filename
    #[arg(long, default_value = "tweets_sample.csv")]
    output: PathBuf,

    /// Maximum number of tweets to fetch
    #[arg(long, default_value_t = 2000)]
    max: usize,

    /// Twitter API bearer token for authentication
    #[arg(long, env = "BEARER_TOKEN", hide_env_values = true)]
    bearer_token: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv().ok();

    // Initialize logging
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let args = Cli::parse();

    if args.verbose {
        debug!("Verbose mode enabled");
    }

    // The token check happens before any network call
    let bearer_token = args.bearer_token.context(
        "Bearer token not specified. Please set --bearer-token or the BEARER_TOKEN environment variable (a .env file is also read)"
    )?;

    // Clean username (remove @ if present)
    let username = args.username.trim_start_matches('@');

    let client =
        TwitterClient::new(&bearer_token).context("Failed to initialize Twitter client")?;

    let user_id = client
        .lookup_user_id(username)
        .await
        .with_context(|| format!("Failed to get user ID for @{username}"))?;

    info!("Fetching tweets for @{username}");

    let tweets = client.fetch_user_tweets(&user_id, args.max).await?;

    if tweets.is_empty() {
        info!("No tweets found for @{username}");
        return Ok(());
    }

    let rows: Vec<TweetRow> = tweets.iter().map(TweetRow::from_tweet).collect();
    let count = export::write_csv(&rows, &args.output)?;

    info!(
        "Saved {count} tweets to {path}",
        path = args.output.display()
    );

    Ok(())
}
