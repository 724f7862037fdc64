// src/services/source.rs

//! Remote leaderboard client.
//!
//! Fetches the current leaderboard snapshot in one GET. Failures are soft:
//! [`LeaderboardSource::fetch`] logs them and yields an empty snapshot, which
//! callers treat as "try again next cycle".

use async_trait::async_trait;
use reqwest::Client;
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{LeaderboardPage, SourceConfig, TeamRecord};
use crate::utils::http;

/// Anything that can produce a leaderboard snapshot.
#[async_trait]
pub trait LeaderboardSource: Send + Sync {
    /// Fetch the snapshot, reporting why it failed.
    async fn try_fetch(&self) -> Result<Vec<TeamRecord>>;

    /// Fetch the snapshot; any failure is logged and becomes an empty vector.
    async fn fetch(&self) -> Vec<TeamRecord> {
        match self.try_fetch().await {
            Ok(teams) => teams,
            Err(error) => {
                log::error!("Error fetching leaderboard: {}", error);
                Vec::new()
            }
        }
    }
}

/// HTTP client for the hackathon leaderboard endpoint.
pub struct LeaderboardClient {
    client: Client,
    url: Url,
}

impl LeaderboardClient {
    /// Create a client from source settings.
    pub fn new(config: &SourceConfig) -> Result<Self> {
        Ok(Self {
            client: http::create_async_client(config)?,
            url: http::leaderboard_url(config)?,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl LeaderboardSource for LeaderboardClient {
    async fn try_fetch(&self) -> Result<Vec<TeamRecord>> {
        log::debug!("GET {}", self.url);
        let response = self.client.get(self.url.clone()).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::upstream(format!(
                "leaderboard answered {status}"
            )));
        }

        let body = response.bytes().await?;
        let page: LeaderboardPage = serde_json::from_slice(&body)
            .map_err(|e| AppError::upstream(format!("malformed leaderboard body: {e}")))?;

        log::debug!("Fetched {} teams", page.leaderboard.len());
        Ok(page.leaderboard)
    }
}
