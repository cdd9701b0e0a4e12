//! Common types for release history

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::release::tag::coerce_version;

/// Release record as returned by a fetcher, before normalization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRelease {
    pub tag_name: String,
    pub published_at: DateTime<Utc>,
    pub html_url: String,
    /// Unpublished; counts toward page fullness but is never stored
    pub draft: bool,
}

/// A published release, normalized for storage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Release {
    /// Normalized `major.minor.patch[-prerelease]`, empty when the tag carries no version
    pub version: String,
    pub published_at: DateTime<Utc>,
    pub tag: String,
    pub url: String,
}

impl Release {
    pub fn new(
        tag: impl Into<String>,
        version: impl Into<String>,
        published_at: DateTime<Utc>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            version: version.into(),
            published_at,
            tag: tag.into(),
            url: url.into(),
        }
    }

    /// Normalize a fetched record, coercing its tag into a semantic version
    pub fn from_raw(raw: RawRelease) -> Self {
        let version = coerce_version(&raw.tag_name).unwrap_or_default();
        Self {
            version,
            published_at: raw.published_at,
            tag: raw.tag_name,
            url: raw.html_url,
        }
    }
}

/// Full cached release history of one repository, newest first
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub last_updated: DateTime<Utc>,
    pub release_count: usize,
    pub releases: Vec<Release>,
}

impl Snapshot {
    pub fn new(releases: Vec<Release>, last_updated: DateTime<Utc>) -> Self {
        Self {
            last_updated,
            release_count: releases.len(),
            releases,
        }
    }

    /// Publish time of the newest cached release
    pub fn newest_published_at(&self) -> Option<DateTime<Utc>> {
        self.releases.first().map(|r| r.published_at)
    }

    pub fn is_empty(&self) -> bool {
        self.releases.is_empty()
    }
}

/// Key a snapshot is cached under
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub owner: String,
    pub repo: String,
    pub namespace: Option<String>,
}

impl CacheKey {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            namespace: None,
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{} ({})", self.full_name(), ns),
            None => f.write_str(&self.full_name()),
        }
    }
}
