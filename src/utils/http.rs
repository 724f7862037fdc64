// src/utils/http.rs

//! HTTP client utilities.

use std::time::Duration;

use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue, ORIGIN, REFERER};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::SourceConfig;

/// Create a configured asynchronous HTTP client.
///
/// The leaderboard API rejects obvious bots, so the client presents itself as a
/// browser coming from the leaderboard page.
pub fn create_async_client(config: &SourceConfig) -> Result<reqwest::Client> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));

    let origin = HeaderValue::from_str(&config.origin)
        .map_err(|e| AppError::config(format!("source.origin is not a header value: {e}")))?;
    let referer = HeaderValue::from_str(&format!("{}/", config.origin.trim_end_matches('/')))
        .map_err(|e| AppError::config(format!("source.origin is not a header value: {e}")))?;
    headers.insert(ORIGIN, origin);
    headers.insert(REFERER, referer);

    let client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .default_headers(headers)
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;
    Ok(client)
}

/// Build the first-page leaderboard URL with the configured page size.
pub fn leaderboard_url(config: &SourceConfig) -> Result<Url> {
    let mut url = Url::parse(&config.endpoint)?;
    url.query_pairs_mut()
        .append_pair("page", "1")
        .append_pair("limit", &config.page_size.to_string());
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leaderboard_url() {
        let config = SourceConfig {
            page_size: 20,
            ..SourceConfig::default()
        };
        let url = leaderboard_url(&config).unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.puch.ai/hackathon-leaderboard?page=1&limit=20"
        );
    }

    #[test]
    fn test_leaderboard_url_rejects_garbage() {
        let config = SourceConfig {
            endpoint: "::nope::".to_string(),
            ..SourceConfig::default()
        };
        assert!(leaderboard_url(&config).is_err());
    }

    #[test]
    fn test_create_client_rejects_bad_origin() {
        let config = SourceConfig {
            origin: "bad\norigin".to_string(),
            ..SourceConfig::default()
        };
        assert!(create_async_client(&config).is_err());
    }
}
