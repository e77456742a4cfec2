use anyhow::{Context, Result};
use serde::de::DeserializeOwned;

/// Parse HTTP response as JSON with contextual error handling
pub async fn parse_http_response_json<T: DeserializeOwned>(
    response: reqwest::Response,
    api_desc: &str,
) -> Result<T> {
    response
        .json::<T>()
        .await
        .with_context(|| format!("Failed to parse {api_desc} response"))
}
