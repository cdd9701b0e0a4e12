//! Fetcher and cache test utilities

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use tempfile::TempDir;

use release_cadence::release::cache::Cache;
use release_cadence::release::error::FetchError;
use release_cadence::release::fetcher::ReleaseFetcher;
use release_cadence::release::types::RawRelease;

/// In-memory release history served newest first, page by page
pub struct FakeFetcher {
    /// Oldest first
    history: Vec<RawRelease>,
    fail_on_page: Option<u32>,
    requests: Mutex<Vec<(u32, u32)>>,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self {
            history: Vec::new(),
            fail_on_page: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Append a release published `day` days after 2024-01-01
    pub fn with_release(mut self, tag: &str, day: i64) -> Self {
        self.history.push(RawRelease {
            tag_name: tag.to_string(),
            published_at: day_of_2024(day),
            html_url: format!("https://github.com/owner/repo/releases/tag/{}", tag),
            draft: false,
        });
        self
    }

    pub fn failing_on_page(mut self, page: u32) -> Self {
        self.fail_on_page = Some(page);
        self
    }

    /// `(page, page_size)` of every request, in order
    pub fn requests(&self) -> Vec<(u32, u32)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReleaseFetcher for FakeFetcher {
    async fn fetch_page(
        &self,
        _owner: &str,
        _repo: &str,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<RawRelease>, FetchError> {
        self.requests.lock().unwrap().push((page, page_size));
        if self.fail_on_page == Some(page) {
            return Err(FetchError::InvalidResponse("Unexpected status: 502".to_string()));
        }

        let newest_first: Vec<RawRelease> = self.history.iter().rev().cloned().collect();
        Ok(newest_first
            .chunks(page_size as usize)
            .nth(page as usize - 1)
            .map(<[RawRelease]>::to_vec)
            .unwrap_or_default())
    }
}

pub fn day_of_2024(day: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + chrono::TimeDelta::days(day)
}

/// Create an empty SQLite cache in a temporary directory
pub fn create_test_cache() -> (TempDir, Cache) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");
    let cache = Cache::new(&db_path).unwrap();
    (temp_dir, cache)
}
