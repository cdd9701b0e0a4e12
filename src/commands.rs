//! Operations behind the command-line interface
//!
//! Each operation takes its collaborators explicitly: a [`CacheStore`] for
//! snapshots and, where network access is needed, a [`ReleaseFetcher`].

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::{ConfigError, UpdateConfig};
use crate::release::cache::{CacheEntry, CacheStore};
use crate::release::error::{CacheError, FetchError};
use crate::release::fetcher::ReleaseFetcher;
use crate::release::merger;
use crate::release::report::{RepoReport, build_report};
use crate::release::types::{CacheKey, Snapshot};

#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to fetch releases: {0}")]
    Fetch(#[from] FetchError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("No data found for {owner}/{repo}. Run `update` first to fetch the latest releases.")]
    CacheUnavailable { owner: String, repo: String },

    #[error("Failed to write {path:?}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to serialize output: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// What an update changed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateSummary {
    pub key: CacheKey,
    pub previous_update: Option<DateTime<Utc>>,
    pub last_updated: DateTime<Utc>,
    pub previous_count: usize,
    pub release_count: usize,
    pub new_release_count: usize,
    pub pages_fetched: u32,
    pub truncated: bool,
}

impl std::fmt::Display for UpdateSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Data updated for {}", self.key)?;
        writeln!(
            f,
            "  Last updated: {} -> {}",
            self.previous_update
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "n/a".to_string()),
            self.last_updated.to_rfc3339()
        )?;
        writeln!(f, "  Pages fetched: {}", self.pages_fetched)?;
        writeln!(
            f,
            "  Release count: {} -> {} ({} new)",
            self.previous_count, self.release_count, self.new_release_count
        )?;
        if self.truncated {
            writeln!(
                f,
                "  Page budget exhausted; run update again to fetch older releases"
            )?;
        }
        Ok(())
    }
}

fn cached_snapshot<S: CacheStore + ?Sized>(
    store: &S,
    owner: &str,
    repo: &str,
) -> Result<Snapshot, CommandError> {
    store
        .get(&CacheKey::new(owner, repo))?
        .ok_or_else(|| CommandError::CacheUnavailable {
            owner: owner.to_string(),
            repo: repo.to_string(),
        })
}

/// Fetch new releases and replace the cached snapshot.
///
/// The snapshot is written only after every page was fetched successfully; a
/// failed fetch leaves the previous snapshot in place.
pub async fn update<S: CacheStore + ?Sized>(
    store: &S,
    fetcher: &dyn ReleaseFetcher,
    config: &UpdateConfig,
) -> Result<UpdateSummary, CommandError> {
    config.validate()?;

    let key = CacheKey::new(&config.owner, &config.repo);
    let existing = store.get(&key)?;
    fetch_and_store(store, fetcher, config, key, existing.as_ref(), existing.as_ref()).await
}

/// Fetch `config`'s releases on top of `base` and store the result.
///
/// `previous` is the snapshot being replaced; it only feeds the summary.
async fn fetch_and_store<S: CacheStore + ?Sized>(
    store: &S,
    fetcher: &dyn ReleaseFetcher,
    config: &UpdateConfig,
    key: CacheKey,
    previous: Option<&Snapshot>,
    base: Option<&Snapshot>,
) -> Result<UpdateSummary, CommandError> {
    let options = config.merge_options(base.is_some());

    info!(
        "Fetching releases for {} (last updated: {}, max pages: {}, page size: {})",
        key,
        base.map(|s| s.last_updated.to_rfc3339())
            .unwrap_or_else(|| "never".to_string()),
        options.max_pages,
        options.page_size
    );

    let outcome = merger::update(base, fetcher, &config.owner, &config.repo, &options).await?;

    store.put(&key, &outcome.snapshot)?;
    info!(
        "Cached {} releases for {} ({} new)",
        outcome.snapshot.release_count, key, outcome.new_release_count
    );

    Ok(UpdateSummary {
        previous_update: previous.map(|s| s.last_updated),
        previous_count: previous.map_or(0, |s| s.release_count),
        last_updated: outcome.snapshot.last_updated,
        release_count: outcome.snapshot.release_count,
        new_release_count: outcome.new_release_count,
        pages_fetched: outcome.pages_fetched,
        truncated: outcome.truncated,
        key,
    })
}

/// Classify the cached releases and compute cadence statistics
pub fn stats<S: CacheStore + ?Sized>(
    store: &S,
    owner: &str,
    repo: &str,
    now: DateTime<Utc>,
) -> Result<RepoReport, CommandError> {
    let snapshot = cached_snapshot(store, owner, repo)?;
    Ok(build_report(owner, repo, &snapshot, now))
}

/// Return the cached snapshot as is
pub fn show<S: CacheStore + ?Sized>(
    store: &S,
    owner: &str,
    repo: &str,
) -> Result<Snapshot, CommandError> {
    cached_snapshot(store, owner, repo)
}

/// Write the cached snapshot to `path` as pretty-printed JSON
pub fn export<S: CacheStore + ?Sized>(
    store: &S,
    owner: &str,
    repo: &str,
    path: &Path,
) -> Result<Snapshot, CommandError> {
    let snapshot = cached_snapshot(store, owner, repo)?;
    write_json(path, &snapshot)?;
    info!("Exported {} releases to {:?}", snapshot.release_count, path);
    Ok(snapshot)
}

/// Serialize `value` as pretty-printed JSON into `path`
pub fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<(), CommandError> {
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json).map_err(|source| CommandError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// Remove the cached snapshot, returning whether one existed
pub fn delete<S: CacheStore + ?Sized>(
    store: &S,
    owner: &str,
    repo: &str,
) -> Result<bool, CommandError> {
    let key = CacheKey::new(owner, repo);
    let deleted = store.delete(&key)?;
    if deleted {
        info!("Deleted cached data for {}", key);
    } else {
        warn!("No cached data found for {}", key);
    }
    Ok(deleted)
}

/// Fetch the whole history from scratch and replace the cached snapshot.
///
/// The old snapshot stays in place until the new one is complete.
pub async fn reset<S: CacheStore + ?Sized>(
    store: &S,
    fetcher: &dyn ReleaseFetcher,
    config: &UpdateConfig,
) -> Result<UpdateSummary, CommandError> {
    config.validate()?;

    let key = CacheKey::new(&config.owner, &config.repo);
    let previous = store.get(&key)?;
    info!("Resetting cached data for {}", key);
    fetch_and_store(store, fetcher, config, key, previous.as_ref(), None).await
}

/// List cached repositories
pub fn list<S: CacheStore + ?Sized>(store: &S) -> Result<Vec<CacheEntry>, CommandError> {
    Ok(store.list()?)
}
