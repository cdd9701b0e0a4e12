//! Per-project release cadence report

use std::fmt;

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;

use crate::config::RECENT_WINDOW_DAYS;
use crate::release::cadence::{as_days, average_gap, count_within, days_since, median_gap};
use crate::release::classifier::{ProjectBucket, ReleaseTier, classify};
use crate::release::types::{Release, Snapshot};

/// Count and gap statistics of one tier
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TierStats {
    pub count: usize,
    pub average_gap_days: f64,
    pub median_gap_days: f64,
}

impl TierStats {
    pub fn from_releases(releases: &[Release]) -> Self {
        let timestamps: Vec<DateTime<Utc>> = releases.iter().map(|r| r.published_at).collect();
        Self::from_timestamps(&timestamps)
    }

    /// Timestamps must be in chronological order
    pub fn from_timestamps(timestamps: &[DateTime<Utc>]) -> Self {
        Self {
            count: timestamps.len(),
            average_gap_days: as_days(average_gap(timestamps)),
            median_gap_days: as_days(median_gap(timestamps)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LatestRelease {
    pub version: String,
    pub tag: String,
    pub url: String,
    pub days_since: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectReport {
    pub name: String,
    /// `None` when the project only has prereleases
    pub latest: Option<LatestRelease>,
    pub baseline_version: Option<String>,
    pub stable_release_count: usize,
    pub prerelease_count: usize,
    pub backport_count: usize,
    pub recent_release_count: usize,
    /// Major, minor and patch releases together
    pub total: TierStats,
    pub major: TierStats,
    pub minor: TierStats,
    pub patch: TierStats,
}

impl ProjectReport {
    fn new(
        name: &str,
        bucket: &ProjectBucket,
        prerelease_count: usize,
        now: DateTime<Utc>,
    ) -> Self {
        let timestamps = |tiers: &[ReleaseTier]| -> Vec<DateTime<Utc>> {
            let mut timestamps: Vec<DateTime<Utc>> = tiers
                .iter()
                .flat_map(|tier| bucket.releases(*tier).iter().map(|r| r.published_at))
                .collect();
            timestamps.sort();
            timestamps
        };
        let tiered = timestamps(&[ReleaseTier::Major, ReleaseTier::Minor, ReleaseTier::Patch]);
        let stable = timestamps(&[
            ReleaseTier::Major,
            ReleaseTier::Minor,
            ReleaseTier::Patch,
            ReleaseTier::Backport,
        ]);

        Self {
            name: name.to_string(),
            latest: Some(LatestRelease {
                version: bucket.latest.version.clone(),
                tag: bucket.latest.tag.clone(),
                url: bucket.latest.url.clone(),
                days_since: days_since(bucket.latest.published_at, now),
            }),
            baseline_version: Some(bucket.original.version.clone()),
            stable_release_count: bucket.stable_count(),
            prerelease_count,
            backport_count: bucket.backports.len(),
            recent_release_count: count_within(
                &stable,
                TimeDelta::days(RECENT_WINDOW_DAYS),
                now,
            ),
            total: TierStats::from_timestamps(&tiered),
            major: TierStats::from_releases(&bucket.major_releases),
            minor: TierStats::from_releases(&bucket.minor_releases),
            patch: TierStats::from_releases(&bucket.patch_releases),
        }
    }

    fn prereleases_only(name: &str, prerelease_count: usize) -> Self {
        Self {
            name: name.to_string(),
            latest: None,
            baseline_version: None,
            stable_release_count: 0,
            prerelease_count,
            backport_count: 0,
            recent_release_count: 0,
            total: TierStats::default(),
            major: TierStats::default(),
            minor: TierStats::default(),
            patch: TierStats::default(),
        }
    }
}

/// Cadence report for a whole repository
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoReport {
    pub owner: String,
    pub repo: String,
    pub generated_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    pub release_count: usize,
    pub skipped_count: usize,
    pub projects: Vec<ProjectReport>,
}

/// Classify a snapshot and compute cadence statistics for every project
pub fn build_report(
    owner: &str,
    repo: &str,
    snapshot: &Snapshot,
    now: DateTime<Utc>,
) -> RepoReport {
    let classification = classify(&snapshot.releases, repo);

    let mut projects: Vec<ProjectReport> = classification
        .projects
        .iter()
        .map(|(name, bucket)| {
            let prereleases = classification.prereleases.get(name).copied().unwrap_or(0);
            ProjectReport::new(name, bucket, prereleases, now)
        })
        .collect();
    projects.extend(
        classification
            .prereleases
            .iter()
            .filter(|(name, _)| !classification.projects.contains_key(*name))
            .map(|(name, count)| ProjectReport::prereleases_only(name, *count)),
    );

    RepoReport {
        owner: owner.to_string(),
        repo: repo.to_string(),
        generated_at: now,
        last_updated: snapshot.last_updated,
        release_count: snapshot.release_count,
        skipped_count: classification.skipped.len(),
        projects,
    }
}

fn write_tier(f: &mut fmt::Formatter<'_>, label: &str, stats: &TierStats) -> fmt::Result {
    writeln!(
        f,
        "  {}: {} releases, avg gap {:.1} days, median gap {:.1} days",
        label, stats.count, stats.average_gap_days, stats.median_gap_days
    )
}

impl fmt::Display for RepoReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Release stats for {}/{}", self.owner, self.repo)?;
        writeln!(f, "  Last updated: {}", self.last_updated.to_rfc3339())?;
        writeln!(f, "  Release count: {}", self.release_count)?;
        if self.skipped_count > 0 {
            writeln!(f, "  Skipped (unparseable tags): {}", self.skipped_count)?;
        }

        for project in &self.projects {
            writeln!(f)?;
            writeln!(f, "{}", project.name)?;
            match &project.latest {
                Some(latest) => writeln!(
                    f,
                    "  Latest: {} ({}), {} days ago",
                    latest.version, latest.tag, latest.days_since
                )?,
                None => writeln!(f, "  Latest: none (prereleases only)")?,
            }
            if let Some(baseline) = &project.baseline_version {
                writeln!(f, "  Baseline: {}", baseline)?;
            }
            writeln!(
                f,
                "  Stable releases: {} ({} backports, {} prereleases excluded)",
                project.stable_release_count, project.backport_count, project.prerelease_count
            )?;
            writeln!(
                f,
                "  Releases in the last {} days: {}",
                RECENT_WINDOW_DAYS, project.recent_release_count
            )?;
            write_tier(f, "Total", &project.total)?;
            write_tier(f, "Major", &project.major)?;
            write_tier(f, "Minor", &project.minor)?;
            write_tier(f, "Patch", &project.patch)?;
        }

        Ok(())
    }
}
