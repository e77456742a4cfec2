use crate::error_utils::parse_http_response_json;
use anyhow::{bail, Context, Result};
use backoff::{backoff::Backoff, ExponentialBackoffBuilder};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Twitter API specific errors with structured information
#[derive(Debug, Error)]
pub enum TwitterError {
    #[error("Rate limit exceeded (reset at {reset_time:?}, remaining: {remaining:?})")]
    RateLimit {
        reset_time: Option<u64>,
        remaining: Option<u64>,
    },

    #[error("User not found: {username}")]
    UserNotFound { username: String },

    #[error("API error (status {status}): {message}")]
    ApiError { status: u16, message: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

const TWITTER_API_BASE: &str = "https://api.twitter.com/2";

// URL parameters for timeline requests
const TIMELINE_TWEET_FIELDS: &str = "created_at,public_metrics,entities,attachments";
const TIMELINE_EXPANSIONS: &str = "attachments.media_keys";
const TIMELINE_MEDIA_FIELDS: &str = "type";

/// Twitter API max page size for the user tweets endpoint
const MAX_PAGE_SIZE: usize = 100;
/// The endpoint rejects requests for fewer than 5 tweets
const MIN_PAGE_SIZE: usize = 5;

/// Twitter API rate limit information extracted from response headers
#[derive(Debug, Clone, Default)]
struct RateLimits {
    /// Maximum number of requests allowed in the current time window
    limit: Option<u64>,
    /// Number of requests remaining in the current time window
    remaining: Option<u64>,
    /// Unix timestamp when the rate limit resets
    reset: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Tweet {
    /// The tweet ID
    pub id: String,

    /// Tweet content text
    pub text: String,

    /// Tweet creation date (RFC 3339, as returned by the API)
    #[serde(default)]
    pub created_at: String,

    /// Engagement counts
    #[serde(default)]
    pub public_metrics: PublicMetrics,

    /// URL/mention/hashtag entities
    pub entities: Option<Entities>,

    /// Media attachment references
    pub attachments: Option<Attachments>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct PublicMetrics {
    #[serde(default)]
    pub like_count: u64,
    #[serde(default)]
    pub retweet_count: u64,
    #[serde(default)]
    pub reply_count: u64,
    #[serde(default)]
    pub quote_count: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Entities {
    pub urls: Option<Vec<UrlEntity>>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct UrlEntity {
    pub url: String,
    pub expanded_url: Option<String>,
    pub display_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Attachments {
    pub media_keys: Option<Vec<String>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TimelineResponse {
    pub data: Option<Vec<Tweet>>,
    pub meta: Option<TimelineMeta>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TimelineMeta {
    pub result_count: Option<u32>,
    pub next_token: Option<String>,
}

/// Attachment classification for a tweet, in precedence order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    Media,
    Link,
    None,
}

/// Classifies a tweet's attachment kind.
///
/// A tweet with media keys is "media" even when it also carries URL
/// entities; a tweet with at least one URL entity but no media is "link";
/// everything else is "none".
pub fn classify_attachment(tweet: &Tweet) -> AttachmentKind {
    let has_media = tweet
        .attachments
        .as_ref()
        .and_then(|a| a.media_keys.as_ref())
        .is_some_and(|keys| !keys.is_empty());
    if has_media {
        return AttachmentKind::Media;
    }

    let has_link = tweet
        .entities
        .as_ref()
        .and_then(|e| e.urls.as_ref())
        .is_some_and(|urls| !urls.is_empty());
    if has_link {
        AttachmentKind::Link
    } else {
        AttachmentKind::None
    }
}

/// Twitter API client for fetching a user's tweet history
pub struct TwitterClient {
    client: Client,
    bearer_token: String,
    api_base: String,
    /// Wait applied after a rate-limit signal before retrying
    rate_limit_wait: Duration,
}

impl TwitterClient {
    /// Creates a new Twitter client with the given bearer token.
    pub fn new(bearer_token: &str) -> Result<Self> {
        if bearer_token.is_empty() {
            bail!("Bearer token must not be empty");
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            bearer_token: bearer_token.to_string(),
            api_base: TWITTER_API_BASE.to_string(),
            rate_limit_wait: Duration::from_secs(60),
        })
    }

    /// Overrides the API base URL (e.g. to point at a local test server).
    pub fn with_api_base(mut self, api_base: &str) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self
    }

    /// Overrides the wait applied after a rate-limit signal.
    pub fn with_rate_limit_wait(mut self, wait: Duration) -> Self {
        self.rate_limit_wait = wait;
        self
    }

    /// Parses rate limit headers from a response
    fn parse_rate_limit_headers(&self, response: &reqwest::Response) -> RateLimits {
        let remaining = response
            .headers()
            .get("x-rate-limit-remaining")
            .and_then(|h| h.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok());

        let limit = response
            .headers()
            .get("x-rate-limit-limit")
            .and_then(|h| h.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok());

        let reset = response
            .headers()
            .get("x-rate-limit-reset")
            .and_then(|h| h.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok());

        RateLimits {
            limit,
            remaining,
            reset,
        }
    }

    /// Calculates a sleep duration with random jitter to avoid thundering herd effects
    fn calculate_sleep_duration_with_jitter(&self, base_duration: Duration) -> Duration {
        // Add 0-999ms of jitter to the base duration
        let jitter = rand::random::<u64>() % 1000;
        base_duration + Duration::from_millis(jitter)
    }

    /// Creates an exponential backoff configuration for network timeout retries
    fn create_backoff_config(&self) -> impl Backoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_secs(1))
            .with_max_interval(Duration::from_secs(60))
            .with_multiplier(2.0)
            .with_max_elapsed_time(Some(Duration::from_secs(300)))
            .build()
    }

    /// Makes a Twitter API request, retrying on rate limits and timeouts.
    ///
    /// Rate-limit signals (429) sleep for `rate_limit_wait` and retry the
    /// same request, so pagination resumes where it left off instead of
    /// restarting from scratch. Network timeouts use exponential backoff.
    async fn api_request(&self, resource_id: &str, url: &str) -> Result<reqwest::Response> {
        let mut backoff = self.create_backoff_config();

        let mut attempt = 0;
        let max_attempts = 5;

        loop {
            debug!(%resource_id, %url, "Making request to Twitter API");

            let response = match self
                .client
                .get(url)
                .bearer_auth(&self.bearer_token)
                .timeout(Duration::from_secs(30))
                .send()
                .await
            {
                Ok(response) => response,
                Err(err) => {
                    attempt += 1;

                    if attempt >= max_attempts {
                        return Err(anyhow::Error::new(err)).with_context(|| {
                            format!(
                                "Failed to send request to Twitter API after {attempt} attempts"
                            )
                        });
                    }

                    let is_timeout = err.is_timeout()
                        || err.is_connect()
                        || err.to_string().contains("timed out");

                    if is_timeout {
                        let backoff_time = backoff
                            .next_backoff()
                            .unwrap_or(Duration::from_secs(5 * (attempt as u64)));

                        let sleep_duration =
                            self.calculate_sleep_duration_with_jitter(backoff_time);

                        debug!("Network timeout connecting to Twitter API for {resource_id}. Retrying in {sleep_duration:?} (attempt {attempt}/{max_attempts})");
                        tokio::time::sleep(sleep_duration).await;
                        continue;
                    } else {
                        return Err(anyhow::Error::new(err)
                            .context("Failed to send request to Twitter API"));
                    }
                }
            };

            let rate_limits = self.parse_rate_limit_headers(&response);

            if response.status() == StatusCode::TOO_MANY_REQUESTS {
                attempt += 1;

                if attempt >= max_attempts {
                    debug!("Maximum retry attempts ({max_attempts}) reached for {resource_id}, rate limit reset: {rate_limit_reset:?}", rate_limit_reset = rate_limits.reset);
                    return Err(TwitterError::RateLimit {
                        reset_time: rate_limits.reset,
                        remaining: rate_limits.remaining,
                    }
                    .into());
                }

                let sleep_duration =
                    self.calculate_sleep_duration_with_jitter(self.rate_limit_wait);

                warn!("Rate limited by Twitter API for {resource_id}. Limit: {limit:?}, Remaining: {remaining:?}, Reset: {reset:?}. Sleeping {sleep_duration:?} before retrying (attempt {attempt}/{max_attempts})",
                      limit = rate_limits.limit,
                      remaining = rate_limits.remaining,
                      reset = rate_limits.reset);
                tokio::time::sleep(sleep_duration).await;
                continue;
            }

            if response.status().is_success() {
                debug!("Received Twitter API response for {resource_id} with limits: {limit:?}/{remaining:?} until {reset:?}",
                       limit = rate_limits.limit,
                       remaining = rate_limits.remaining,
                       reset = rate_limits.reset);
            } else {
                let status_code = response.status().as_u16();
                let error_message = format!(
                    "limit: {limit:?}, remaining: {remaining:?}, reset: {reset:?}",
                    limit = rate_limits.limit,
                    remaining = rate_limits.remaining,
                    reset = rate_limits.reset
                );

                return Err(match response.status() {
                    StatusCode::NOT_FOUND => TwitterError::UserNotFound {
                        username: resource_id.to_string(),
                    },
                    _ => TwitterError::ApiError {
                        status: status_code,
                        message: error_message,
                    },
                }
                .into());
            }

            return Ok(response);
        }
    }

    /// Resolves a username (without the @ symbol) to its numeric user ID.
    ///
    /// No retry beyond the shared request handling: a user that cannot be
    /// resolved aborts the run.
    pub async fn lookup_user_id(&self, username: &str) -> Result<String> {
        let url = format!(
            "{api_base}/users/by/username/{username}",
            api_base = self.api_base
        );

        let response = self.api_request(username, &url).await?;

        let data: serde_json::Value = parse_http_response_json(response, "Twitter API").await?;

        // The API reports unknown users as a 200 with an errors array
        if data.get("errors").is_some() && data.get("data").is_none() {
            let detail = data["errors"][0]["detail"].as_str().unwrap_or("Unknown error");
            debug!("User lookup for {username} failed: {detail}");
            return Err(TwitterError::UserNotFound {
                username: username.to_string(),
            }
            .into());
        }

        let user_id = data["data"]["id"]
            .as_str()
            .context("Failed to extract user ID")?;

        Ok(user_id.to_string())
    }

    /// Fetches up to `max_total` tweets from a user's timeline, paging
    /// through the API until the cap is reached or the timeline is
    /// exhausted.
    ///
    /// Errors after the first page are degraded to a warning and whatever
    /// was accumulated so far is returned, so partial results still reach
    /// the exporter.
    pub async fn fetch_user_tweets(&self, user_id: &str, max_total: usize) -> Result<Vec<Tweet>> {
        let mut collected: Vec<Tweet> = Vec::new();
        let mut next_token: Option<String> = None;

        while collected.len() < max_total {
            let remaining = max_total - collected.len();
            let url = self.build_user_timeline_url(user_id, remaining, next_token.as_deref());

            let response = match self.api_request(user_id, &url).await {
                Ok(response) => response,
                Err(e) => {
                    warn!(
                        "Error fetching tweets for user {user_id}, returning {count} collected so far: {e}",
                        count = collected.len()
                    );
                    break;
                }
            };

            let page: TimelineResponse =
                match parse_http_response_json(response, "Twitter API timeline").await {
                    Ok(page) => page,
                    Err(e) => {
                        warn!(
                            "Error parsing timeline page for user {user_id}, returning {count} collected so far: {e}",
                            count = collected.len()
                        );
                        break;
                    }
                };

            let page_tweets = match page.data {
                Some(tweets) if !tweets.is_empty() => tweets,
                // End of timeline
                _ => break,
            };

            debug!(
                "Fetched page of {page_count} tweets for user {user_id} ({collected_count} collected)",
                page_count = page_tweets.len(),
                collected_count = collected.len()
            );

            for tweet in page_tweets {
                collected.push(tweet);
                // Truncate mid-page: the cap is exact
                if collected.len() >= max_total {
                    return Ok(collected);
                }
            }

            next_token = page.meta.and_then(|m| m.next_token);
            if next_token.is_none() {
                break;
            }

            // Small delay to avoid hitting rate limits too hard
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        info!(
            "Collected {count} tweets for user {user_id}",
            count = collected.len()
        );
        Ok(collected)
    }

    /// Builds a Twitter API URL for fetching a page of a user's timeline
    fn build_user_timeline_url(
        &self,
        user_id: &str,
        remaining: usize,
        pagination_token: Option<&str>,
    ) -> String {
        let max_results = page_size_for(remaining);
        let base = format!(
            "{api_base}/users/{user_id}/tweets?max_results={max_results}",
            api_base = self.api_base
        );

        let params = format!(
            "&tweet.fields={TIMELINE_TWEET_FIELDS}&expansions={TIMELINE_EXPANSIONS}&media.fields={TIMELINE_MEDIA_FIELDS}"
        );

        let token_param =
            pagination_token.map_or(String::new(), |token| format!("&pagination_token={token}"));

        format!("{base}{params}{token_param}")
    }
}

/// Clamps a remaining-count to the page size the API accepts
fn page_size_for(remaining: usize) -> usize {
    remaining.min(MAX_PAGE_SIZE).max(MIN_PAGE_SIZE)
}
