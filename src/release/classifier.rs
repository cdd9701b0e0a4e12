//! Semver tier classification per logical project
//!
//! Releases are walked in chronological order, oldest first. Each project keeps
//! a baseline (`original`) release; a stable release is a major, minor or patch
//! release when it moves the baseline forward at that position. Stable releases
//! that do not move it forward (maintenance backports, re-published versions)
//! are kept apart in `backports`.

use indexmap::IndexMap;
use semver::Version;
use tracing::{debug, warn};

use crate::release::error::ReleaseError;
use crate::release::tag::parse_tag;
use crate::release::types::Release;

/// Semver tier a release lands in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReleaseTier {
    Major,
    Minor,
    Patch,
    /// Not newer than the baseline
    Backport,
}

impl ReleaseTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReleaseTier::Major => "major",
            ReleaseTier::Minor => "minor",
            ReleaseTier::Patch => "patch",
            ReleaseTier::Backport => "backport",
        }
    }

    /// Tier implied by a version's own shape, used for a project's first release
    pub fn of_version(version: &Version) -> Self {
        match (version.minor, version.patch) {
            (0, 0) => ReleaseTier::Major,
            (_, 0) => ReleaseTier::Minor,
            _ => ReleaseTier::Patch,
        }
    }

    /// Tier of `candidate` relative to `baseline`
    pub fn between(baseline: &Version, candidate: &Version) -> Self {
        if candidate.major > baseline.major {
            ReleaseTier::Major
        } else if candidate.major == baseline.major && candidate.minor > baseline.minor {
            ReleaseTier::Minor
        } else if candidate.major == baseline.major
            && candidate.minor == baseline.minor
            && candidate.patch > baseline.patch
        {
            ReleaseTier::Patch
        } else {
            ReleaseTier::Backport
        }
    }
}

/// Classification state for one logical project
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectBucket {
    /// Baseline the next release is compared against
    pub original: Release,
    /// Highest version seen
    pub latest: Release,
    pub major_releases: Vec<Release>,
    pub minor_releases: Vec<Release>,
    pub patch_releases: Vec<Release>,
    pub backports: Vec<Release>,
}

impl ProjectBucket {
    fn seed(release: &Release) -> Self {
        Self {
            original: release.clone(),
            latest: release.clone(),
            major_releases: Vec::new(),
            minor_releases: Vec::new(),
            patch_releases: Vec::new(),
            backports: Vec::new(),
        }
    }

    /// Releases of one tier, oldest first
    pub fn releases(&self, tier: ReleaseTier) -> &[Release] {
        match tier {
            ReleaseTier::Major => &self.major_releases,
            ReleaseTier::Minor => &self.minor_releases,
            ReleaseTier::Patch => &self.patch_releases,
            ReleaseTier::Backport => &self.backports,
        }
    }

    fn push(&mut self, tier: ReleaseTier, release: Release) {
        match tier {
            ReleaseTier::Major => self.major_releases.push(release),
            ReleaseTier::Minor => self.minor_releases.push(release),
            ReleaseTier::Patch => self.patch_releases.push(release),
            ReleaseTier::Backport => self.backports.push(release),
        }
    }

    /// Stable releases classified for this project
    pub fn stable_count(&self) -> usize {
        self.major_releases.len()
            + self.minor_releases.len()
            + self.patch_releases.len()
            + self.backports.len()
    }
}

/// A release left out of classification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRelease {
    pub tag: String,
    pub reason: ReleaseError,
}

/// Result of one classification pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    /// Buckets by project key, in order of each project's first stable release
    pub projects: IndexMap<String, ProjectBucket>,
    /// Prerelease count by project key
    pub prereleases: IndexMap<String, usize>,
    pub skipped: Vec<SkippedRelease>,
}

struct Tracker {
    bucket: ProjectBucket,
    original: Version,
    latest: Version,
}

/// Classify releases into per-project semver tiers.
///
/// `releases` may be in snapshot order (newest first); they are processed
/// oldest first. `fallback_project` names the project for tags without a
/// package name, normally the repository name.
pub fn classify(releases: &[Release], fallback_project: &str) -> Classification {
    let mut chronological: Vec<&Release> = releases.iter().rev().collect();
    chronological.sort_by_key(|r| r.published_at);

    let mut trackers: IndexMap<String, Tracker> = IndexMap::new();
    let mut prereleases: IndexMap<String, usize> = IndexMap::new();
    let mut skipped = Vec::new();

    for release in chronological {
        let parsed = match parse_tag(&release.tag) {
            Ok(parsed) => parsed,
            Err(reason) => {
                warn!("Skipping release: {}", reason);
                skipped.push(SkippedRelease {
                    tag: release.tag.clone(),
                    reason,
                });
                continue;
            }
        };

        let version = match Version::parse(&release.version) {
            Ok(version) => version,
            Err(_) => {
                let reason = ReleaseError::InvalidVersion {
                    tag: release.tag.clone(),
                    version: release.version.clone(),
                };
                warn!("Skipping release: {}", reason);
                skipped.push(SkippedRelease {
                    tag: release.tag.clone(),
                    reason,
                });
                continue;
            }
        };

        let key = parsed.project_key(fallback_project);

        if !version.pre.is_empty() {
            debug!("Excluding prerelease {} of {}", release.tag, key);
            *prereleases.entry(key).or_default() += 1;
            continue;
        }

        let Some(tracker) = trackers.get_mut(&key) else {
            let tier = ReleaseTier::of_version(&version);
            let mut bucket = ProjectBucket::seed(release);
            bucket.push(tier, release.clone());
            debug!("First release of {}: {} ({})", key, release.tag, tier.as_str());
            trackers.insert(
                key,
                Tracker {
                    bucket,
                    original: version.clone(),
                    latest: version,
                },
            );
            continue;
        };

        let tier = ReleaseTier::between(&tracker.original, &version);
        if tier == ReleaseTier::Backport {
            debug!(
                "{} {} is not newer than baseline {}",
                key, version, tracker.original
            );
        } else {
            tracker.bucket.original = release.clone();
            tracker.original = version.clone();
        }
        tracker.bucket.push(tier, release.clone());

        if version > tracker.latest {
            tracker.bucket.latest = release.clone();
            tracker.latest = version;
        }
    }

    Classification {
        projects: trackers
            .into_iter()
            .map(|(key, tracker)| (key, tracker.bucket))
            .collect(),
        prereleases,
        skipped,
    }
}
