//! GitHub Releases API fetcher

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::UpdateConfig;
use crate::release::error::FetchError;
use crate::release::fetcher::ReleaseFetcher;
use crate::release::types::RawRelease;

/// Default base URL for GitHub API
pub const DEFAULT_BASE_URL: &str = "https://api.github.com";

/// Response item from the GitHub "list releases" endpoint
#[derive(Debug, Deserialize)]
struct ReleaseResponse {
    tag_name: String,
    html_url: String,
    created_at: DateTime<Utc>,
    /// `null` for drafts
    published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    draft: bool,
}

impl From<ReleaseResponse> for RawRelease {
    fn from(r: ReleaseResponse) -> Self {
        Self {
            tag_name: r.tag_name,
            published_at: r.published_at.unwrap_or(r.created_at),
            html_url: r.html_url,
            draft: r.draft,
        }
    }
}

/// Fetcher implementation for the GitHub Releases API
pub struct GitHubFetcher {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl GitHubFetcher {
    /// Creates a new GitHubFetcher with a custom base URL
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::builder()
                .user_agent("release-cadence")
                .build()
                .expect("Failed to create HTTP client"),
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
        }
    }

    /// Creates a fetcher authenticated with the token of an update
    pub fn from_config(base_url: &str, config: &UpdateConfig) -> Self {
        Self::new(base_url).with_token(config.auth_token.clone())
    }

    /// Authenticate requests with a personal access token
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.is_empty());
        self
    }
}

impl Default for GitHubFetcher {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

fn header_u64(response: &reqwest::Response, name: &str) -> Option<u64> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}

#[async_trait::async_trait]
impl ReleaseFetcher for GitHubFetcher {
    async fn fetch_page(
        &self,
        owner: &str,
        repo: &str,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<RawRelease>, FetchError> {
        let url = format!(
            "{}/repos/{}/{}/releases?per_page={}&page={}",
            self.base_url, owner, repo, page_size, page
        );
        debug!("Fetching {}", url);

        let mut request = self
            .client
            .get(&url)
            .header("Accept", "application/vnd.github+json");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound(format!("{}/{}", owner, repo)));
        }

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(FetchError::RateLimited {
                retry_after_secs: header_u64(&response, "retry-after"),
            });
        }

        // Primary rate limit exhaustion is reported as 403 with a zero remaining budget
        if status == reqwest::StatusCode::FORBIDDEN
            && header_u64(&response, "x-ratelimit-remaining") == Some(0)
        {
            let retry_after_secs = header_u64(&response, "x-ratelimit-reset").map(|reset| {
                reset.saturating_sub(Utc::now().timestamp().max(0) as u64)
            });
            return Err(FetchError::RateLimited { retry_after_secs });
        }

        if !status.is_success() {
            warn!("GitHub API returned status {}: {}", status, url);
            return Err(FetchError::InvalidResponse(format!(
                "Unexpected status: {}",
                status
            )));
        }

        let releases: Vec<ReleaseResponse> = response.json().await.map_err(|e| {
            warn!("Failed to parse GitHub releases response: {}", e);
            FetchError::InvalidResponse(e.to_string())
        })?;

        Ok(releases.into_iter().map(RawRelease::from).collect())
    }
}
