//! Fetcher trait for paging through a repository's releases

#[cfg(test)]
use mockall::automock;

use crate::release::error::FetchError;
use crate::release::types::RawRelease;

/// Trait for fetching one page of releases from a hosting platform
#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait ReleaseFetcher: Send + Sync {
    /// Fetches a single page of releases
    ///
    /// # Arguments
    /// * `owner` - Repository owner or organization
    /// * `repo` - Repository name
    /// * `page` - 1-based page number
    /// * `page_size` - Maximum number of releases on the page
    ///
    /// # Returns
    /// * `Ok(Vec<RawRelease>)` - Releases on the page, ordered from newest to oldest
    /// * `Err(FetchError)` - If the fetch fails
    async fn fetch_page(
        &self,
        owner: &str,
        repo: &str,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<RawRelease>, FetchError>;
}
