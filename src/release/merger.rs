//! Incremental merge of fetched release pages into a cached snapshot
//!
//! Pages are fetched strictly in order. Each page's stop decision depends on
//! the previous page, so there is no concurrency here. The platform returns
//! releases newest first, and everything newer than the newest cached release
//! is prepended to the cache without re-sorting.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::{DEFAULT_MAX_PAGES, MAX_PAGE_SIZE, PAGE_DELAY_MS};
use crate::release::error::FetchError;
use crate::release::fetcher::ReleaseFetcher;
use crate::release::types::{RawRelease, Release, Snapshot};

/// Paging budget for one update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOptions {
    pub max_pages: u32,
    pub page_size: u32,
    /// Wait between two page fetches
    pub page_delay: Duration,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            max_pages: DEFAULT_MAX_PAGES,
            page_size: MAX_PAGE_SIZE,
            page_delay: Duration::from_millis(PAGE_DELAY_MS),
        }
    }
}

/// Result of an incremental update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    pub snapshot: Snapshot,
    /// Releases prepended by this update
    pub new_release_count: usize,
    pub pages_fetched: u32,
    /// The page budget ran out while full pages of new releases were still arriving
    pub truncated: bool,
}

/// Fetch new releases and merge them in front of the existing snapshot.
///
/// A fetch failure aborts the whole update; nothing is merged and the caller
/// keeps the previous snapshot.
pub async fn update(
    existing: Option<&Snapshot>,
    fetcher: &dyn ReleaseFetcher,
    owner: &str,
    repo: &str,
    options: &MergeOptions,
) -> Result<MergeOutcome, FetchError> {
    // Only filter when a cache exists; an empty cache filters at the epoch
    let cutoff: Option<DateTime<Utc>> = existing.map(|snapshot| {
        snapshot
            .newest_published_at()
            .unwrap_or_default()
    });

    let mut fresh: Vec<Release> = Vec::new();
    let mut pages_fetched = 0;
    let mut truncated = false;

    for page in 1..=options.max_pages {
        info!("Fetching page {} of {}/{}", page, owner, repo);
        let raw = fetcher
            .fetch_page(owner, repo, page, options.page_size)
            .await?;
        pages_fetched += 1;
        let raw_count = raw.len();

        // Drafts count toward a full page but are never stored; once published
        // they come back with their own timestamp
        let newer: Vec<RawRelease> = raw
            .into_iter()
            .filter(|r| cutoff.is_none_or(|cutoff| r.published_at > cutoff))
            .collect();
        let newer_count = newer.len();
        let survivors: Vec<Release> = newer
            .into_iter()
            .filter(|r| !r.draft)
            .map(Release::from_raw)
            .collect();
        debug!(
            "Page {}: {} fetched, {} newer than cache, {} kept",
            page,
            raw_count,
            newer_count,
            survivors.len()
        );

        if newer_count == 0 {
            info!("No new releases found");
            break;
        }

        fresh.extend(survivors);

        // A short page is either the end of history or the point where cached data begins
        if newer_count < options.page_size as usize {
            info!("No more releases to fetch");
            break;
        }

        if page == options.max_pages {
            warn!("Reached max pages: {}", options.max_pages);
            truncated = true;
        } else {
            sleep(options.page_delay).await;
        }
    }

    let new_release_count = fresh.len();
    let mut releases = fresh;
    if let Some(snapshot) = existing {
        releases.extend(snapshot.releases.iter().cloned());
    }

    Ok(MergeOutcome {
        snapshot: Snapshot::new(releases, Utc::now()),
        new_release_count,
        pages_fetched,
        truncated,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::release::fetcher::MockReleaseFetcher;
    use chrono::TimeZone;
    use std::sync::Mutex;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    fn raw(tag: &str, published_at: DateTime<Utc>) -> RawRelease {
        RawRelease {
            tag_name: tag.to_string(),
            published_at,
            html_url: format!("https://github.com/o/r/releases/tag/{}", tag),
            draft: false,
        }
    }

    fn draft(tag: &str, created_at: DateTime<Utc>) -> RawRelease {
        RawRelease {
            draft: true,
            ..raw(tag, created_at)
        }
    }

    fn release(tag: &str, published_at: DateTime<Utc>) -> Release {
        Release::from_raw(raw(tag, published_at))
    }

    fn options(max_pages: u32, page_size: u32) -> MergeOptions {
        MergeOptions {
            max_pages,
            page_size,
            page_delay: Duration::ZERO,
        }
    }

    /// Serves fixed pages and records which pages were requested
    struct PagedFetcher {
        pages: Vec<Vec<RawRelease>>,
        requested: Mutex<Vec<u32>>,
    }

    impl PagedFetcher {
        fn new(pages: Vec<Vec<RawRelease>>) -> Self {
            Self {
                pages,
                requested: Mutex::new(Vec::new()),
            }
        }

        fn requested(&self) -> Vec<u32> {
            self.requested.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl ReleaseFetcher for PagedFetcher {
        async fn fetch_page(
            &self,
            _owner: &str,
            _repo: &str,
            page: u32,
            page_size: u32,
        ) -> Result<Vec<RawRelease>, FetchError> {
            self.requested.lock().unwrap().push(page);
            let mut items = self
                .pages
                .get(page as usize - 1)
                .cloned()
                .unwrap_or_default();
            items.truncate(page_size as usize);
            Ok(items)
        }
    }

    #[tokio::test]
    async fn update_prepends_releases_newer_than_cache() {
        let cached = Snapshot::new(
            vec![
                release("v1.1.0", at(2024, 2, 1)),
                release("v1.0.0", at(2024, 1, 1)),
            ],
            at(2024, 2, 2),
        );
        let fetcher = PagedFetcher::new(vec![vec![
            raw("v1.2.0", at(2024, 3, 1)),
            raw("v1.1.0", at(2024, 2, 1)),
        ]]);

        let outcome = update(Some(&cached), &fetcher, "o", "r", &options(5, 2))
            .await
            .unwrap();

        assert_eq!(fetcher.requested(), vec![1]);
        assert_eq!(outcome.snapshot.release_count, 3);
        let tags: Vec<&str> = outcome
            .snapshot
            .releases
            .iter()
            .map(|r| r.tag.as_str())
            .collect();
        assert_eq!(tags, vec!["v1.2.0", "v1.1.0", "v1.0.0"]);
        assert_eq!(outcome.new_release_count, 1);
        assert!(!outcome.truncated);
    }

    #[tokio::test]
    async fn update_without_cache_fetches_until_short_page() {
        let fetcher = PagedFetcher::new(vec![
            vec![raw("v3.0.0", at(2024, 3, 1)), raw("v2.0.0", at(2024, 2, 1))],
            vec![raw("v1.0.0", at(2024, 1, 1))],
        ]);

        let outcome = update(None, &fetcher, "o", "r", &options(5, 2))
            .await
            .unwrap();

        assert_eq!(fetcher.requested(), vec![1, 2]);
        assert_eq!(outcome.pages_fetched, 2);
        assert_eq!(outcome.snapshot.release_count, 3);
        assert_eq!(outcome.snapshot.releases[2].version, "1.0.0");
    }

    #[tokio::test]
    async fn update_without_cache_and_no_releases_yields_empty_snapshot() {
        let fetcher = PagedFetcher::new(vec![]);

        let outcome = update(None, &fetcher, "o", "r", &options(5, 100))
            .await
            .unwrap();

        assert!(outcome.snapshot.is_empty());
        assert_eq!(outcome.snapshot.release_count, 0);
        assert_eq!(outcome.pages_fetched, 1);
    }

    #[tokio::test]
    async fn update_reports_truncation_when_budget_exhausted() {
        let fetcher = PagedFetcher::new(vec![
            vec![raw("v4.0.0", at(2024, 4, 1)), raw("v3.0.0", at(2024, 3, 1))],
            vec![raw("v2.0.0", at(2024, 2, 1)), raw("v1.0.0", at(2024, 1, 1))],
            vec![raw("v0.1.0", at(2023, 1, 1))],
        ]);

        let outcome = update(None, &fetcher, "o", "r", &options(2, 2))
            .await
            .unwrap();

        assert_eq!(fetcher.requested(), vec![1, 2]);
        assert!(outcome.truncated);
        assert_eq!(outcome.snapshot.release_count, 4);
    }

    #[tokio::test]
    async fn update_is_a_no_op_when_nothing_is_newer() {
        let cached = Snapshot::new(
            vec![
                release("v1.1.0", at(2024, 2, 1)),
                release("v1.0.0", at(2024, 1, 1)),
            ],
            at(2024, 2, 2),
        );
        let fetcher = PagedFetcher::new(vec![vec![
            raw("v1.1.0", at(2024, 2, 1)),
            raw("v1.0.0", at(2024, 1, 1)),
        ]]);

        let outcome = update(Some(&cached), &fetcher, "o", "r", &options(5, 2))
            .await
            .unwrap();

        assert_eq!(outcome.snapshot.releases, cached.releases);
        assert_eq!(outcome.snapshot.release_count, cached.release_count);
        assert_eq!(outcome.new_release_count, 0);
    }

    #[tokio::test]
    async fn update_keeps_duplicate_tags_within_one_pass() {
        let fetcher = PagedFetcher::new(vec![vec![
            raw("v1.0.0", at(2024, 1, 2)),
            raw("v1.0.0", at(2024, 1, 1)),
        ]]);

        let outcome = update(None, &fetcher, "o", "r", &options(1, 10))
            .await
            .unwrap();

        assert_eq!(outcome.snapshot.release_count, 2);
    }

    #[tokio::test]
    async fn update_never_decreases_release_count() {
        let cached = Snapshot::new(vec![release("v1.0.0", at(2024, 1, 1))], at(2024, 1, 2));
        let page_sets = vec![
            vec![],
            vec![vec![raw("v0.9.0", at(2023, 12, 1))]],
            vec![vec![raw("v1.1.0", at(2024, 2, 1)), raw("v1.0.0", at(2024, 1, 1))]],
        ];

        for pages in page_sets {
            let fetcher = PagedFetcher::new(pages);
            let outcome = update(Some(&cached), &fetcher, "o", "r", &options(3, 2))
                .await
                .unwrap();
            assert!(outcome.snapshot.release_count >= cached.release_count);
            assert_eq!(
                outcome.snapshot.release_count,
                outcome.snapshot.releases.len()
            );
        }
    }

    #[tokio::test]
    async fn update_skips_drafts_but_counts_them_toward_full_page() {
        let fetcher = PagedFetcher::new(vec![
            vec![draft("v3.0.0", at(2024, 3, 1)), raw("v2.0.0", at(2024, 2, 1))],
            vec![raw("v1.0.0", at(2024, 1, 1))],
        ]);

        let outcome = update(None, &fetcher, "o", "r", &options(5, 2))
            .await
            .unwrap();

        assert_eq!(fetcher.requested(), vec![1, 2]);
        let tags: Vec<&str> = outcome
            .snapshot
            .releases
            .iter()
            .map(|r| r.tag.as_str())
            .collect();
        assert_eq!(tags, vec!["v2.0.0", "v1.0.0"]);
        assert_eq!(outcome.new_release_count, 2);
    }

    #[tokio::test]
    async fn published_draft_is_stored_once() {
        let cached = Snapshot::new(vec![release("v1.0.0", at(2024, 1, 1))], at(2024, 3, 2));
        let drafted = PagedFetcher::new(vec![vec![
            draft("v2.0.0", at(2024, 3, 1)),
            raw("v1.0.0", at(2024, 1, 1)),
        ]]);
        let published = PagedFetcher::new(vec![vec![
            raw("v2.0.0", at(2024, 4, 1)),
            raw("v1.0.0", at(2024, 1, 1)),
        ]]);

        let after_draft = update(Some(&cached), &drafted, "o", "r", &options(5, 2))
            .await
            .unwrap();
        assert_eq!(after_draft.snapshot.release_count, 1);
        let outcome = update(
            Some(&after_draft.snapshot),
            &published,
            "o",
            "r",
            &options(5, 2),
        )
        .await
        .unwrap();

        let v2_count = outcome
            .snapshot
            .releases
            .iter()
            .filter(|r| r.tag == "v2.0.0")
            .count();
        assert_eq!(v2_count, 1);
        assert_eq!(outcome.snapshot.release_count, 2);
    }

    fn delayed(max_pages: u32, page_size: u32) -> MergeOptions {
        MergeOptions {
            page_delay: Duration::from_secs(1),
            ..options(max_pages, page_size)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn update_waits_between_pages_but_not_after_short_last_page() {
        let fetcher = PagedFetcher::new(vec![
            vec![raw("v3.0.0", at(2024, 3, 1)), raw("v2.0.0", at(2024, 2, 1))],
            vec![raw("v1.0.0", at(2024, 1, 1))],
        ]);

        let start = tokio::time::Instant::now();
        update(None, &fetcher, "o", "r", &delayed(5, 2))
            .await
            .unwrap();
        let elapsed = start.elapsed();

        assert_eq!(fetcher.requested(), vec![1, 2]);
        assert!(elapsed >= Duration::from_secs(1), "elapsed {:?}", elapsed);
        assert!(elapsed < Duration::from_secs(2), "elapsed {:?}", elapsed);
    }

    #[tokio::test(start_paused = true)]
    async fn update_does_not_wait_after_last_page_of_budget() {
        let fetcher = PagedFetcher::new(vec![
            vec![raw("v4.0.0", at(2024, 4, 1)), raw("v3.0.0", at(2024, 3, 1))],
            vec![raw("v2.0.0", at(2024, 2, 1)), raw("v1.0.0", at(2024, 1, 1))],
            vec![raw("v0.1.0", at(2023, 1, 1))],
        ]);

        let start = tokio::time::Instant::now();
        let outcome = update(None, &fetcher, "o", "r", &delayed(2, 2))
            .await
            .unwrap();
        let elapsed = start.elapsed();

        assert!(outcome.truncated);
        assert!(elapsed >= Duration::from_secs(1), "elapsed {:?}", elapsed);
        assert!(elapsed < Duration::from_secs(2), "elapsed {:?}", elapsed);
    }

    #[tokio::test(start_paused = true)]
    async fn update_does_not_wait_for_a_single_page() {
        let fetcher = PagedFetcher::new(vec![vec![raw("v1.0.0", at(2024, 1, 1))]]);

        let start = tokio::time::Instant::now();
        update(None, &fetcher, "o", "r", &delayed(5, 2))
            .await
            .unwrap();

        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test]
    async fn update_aborts_on_fetch_failure() {
        let mut fetcher = MockReleaseFetcher::new();
        fetcher
            .expect_fetch_page()
            .times(2)
            .returning(|_, _, page, _| match page {
                1 => Ok(vec![
                    raw("v2.0.0", Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap()),
                    raw("v1.0.0", Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()),
                ]),
                _ => Err(FetchError::RateLimited {
                    retry_after_secs: Some(30),
                }),
            });

        let result = update(None, &fetcher, "o", "r", &options(5, 2)).await;

        assert!(matches!(
            result,
            Err(FetchError::RateLimited {
                retry_after_secs: Some(30)
            })
        ));
    }
}
