use crate::twitter::{classify_attachment, AttachmentKind, Tweet};
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;
use tracing::debug;

/// One CSV row flattened from a tweet. Field order matches the output
/// header: Tweet ID, Created At, Likes, Retweets, Replies, Quotes, Media,
/// Tweet.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TweetRow {
    #[serde(rename = "Tweet ID")]
    pub tweet_id: String,

    #[serde(rename = "Created At")]
    pub created_at: String,

    #[serde(rename = "Likes")]
    pub likes: u64,

    #[serde(rename = "Retweets")]
    pub retweets: u64,

    #[serde(rename = "Replies")]
    pub replies: u64,

    #[serde(rename = "Quotes")]
    pub quotes: u64,

    #[serde(rename = "Media")]
    pub media: AttachmentKind,

    #[serde(rename = "Tweet")]
    pub text: String,
}

impl TweetRow {
    pub fn from_tweet(tweet: &Tweet) -> Self {
        Self {
            tweet_id: tweet.id.clone(),
            created_at: tweet.created_at.clone(),
            likes: tweet.public_metrics.like_count,
            retweets: tweet.public_metrics.retweet_count,
            replies: tweet.public_metrics.reply_count,
            quotes: tweet.public_metrics.quote_count,
            media: classify_attachment(tweet),
            text: tweet.text.clone(),
        }
    }
}

/// Writes tweet rows to a CSV file with a fixed header, overwriting any
/// existing file at `path`. Returns the number of data rows written.
pub fn write_csv(rows: &[TweetRow], path: &Path) -> Result<usize> {
    let mut writer = csv::Writer::from_path(path).with_context(|| {
        format!(
            "Failed to create CSV file at {path}",
            path = path.display()
        )
    })?;

    for row in rows {
        writer
            .serialize(row)
            .with_context(|| format!("Failed to write CSV row for tweet {id}", id = row.tweet_id))?;
    }

    writer.flush().context("Failed to flush CSV output")?;

    debug!(
        "Wrote {count} rows to {path}",
        count = rows.len(),
        path = path.display()
    );

    Ok(rows.len())
}
