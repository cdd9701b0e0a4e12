//! Release tag parser
//!
//! Recovers a logical project name and a semantic version from a release tag.
//! Monorepo-style tags are supported:
//!
//! - Plain: `v1.2.3`, `1.2.3-rc.1+build.7`
//! - Named: `package-name@v2.0.0`
//! - Scoped: `@scope/name@1.2.3`
//! - With a path prefix: `refs/tags/@scope/name@1.2.3`

use std::sync::LazyLock;

use regex::Regex;
use semver::Version;

use crate::release::error::ReleaseError;

/// Anchored tag grammar. Capture groups:
/// 1 path prefix, 2 full project prefix, 3 `@scope`, 4 scope, 5 name,
/// 6-8 major/minor/patch, 9 prerelease, 10 build.
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^([^@\s]+/)?",
        r"((@([^/\s]*))?/?([^\s]+)@)?",
        r"v?(0|[1-9][0-9]*)\.(0|[1-9][0-9]*)\.(0|[1-9][0-9]*)",
        r"(?:-((?:0|[1-9][0-9]*|[0-9]*[a-zA-Z-][0-9a-zA-Z-]*)(?:\.(?:0|[1-9][0-9]*|[0-9]*[a-zA-Z-][0-9a-zA-Z-]*))*))?",
        r"(?:\+([0-9a-zA-Z-]+(?:\.[0-9a-zA-Z-]+)*))?$",
    ))
    .expect("tag grammar is a valid regex")
});

/// Loose version run used when a tag does not follow the grammar
static COERCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[^0-9])([0-9]+)(?:\.([0-9]+))?(?:\.([0-9]+))?(?:-([0-9A-Za-z-]+(?:\.[0-9A-Za-z-]+)*))?")
        .expect("coercion pattern is a valid regex")
});

/// Structured result of parsing a release tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTag {
    pub scope: Option<String>,
    pub name: Option<String>,
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub prerelease: Option<String>,
    pub build: Option<String>,
}

impl ParsedTag {
    /// Logical project this tag belongs to.
    ///
    /// `scope/name` when both are present, otherwise `name`, otherwise `fallback`
    /// (usually the repository name).
    pub fn project_key(&self, fallback: &str) -> String {
        match (&self.scope, &self.name) {
            (Some(scope), Some(name)) => format!("{}/{}", scope, name),
            (None, Some(name)) => name.clone(),
            _ => fallback.to_string(),
        }
    }

    /// Normalized `major.minor.patch[-prerelease]`, build metadata dropped
    pub fn version_string(&self) -> String {
        match &self.prerelease {
            Some(pre) => format!("{}.{}.{}-{}", self.major, self.minor, self.patch, pre),
            None => format!("{}.{}.{}", self.major, self.minor, self.patch),
        }
    }

    pub fn is_prerelease(&self) -> bool {
        self.prerelease.is_some()
    }
}

fn non_empty(m: Option<regex::Match<'_>>) -> Option<String> {
    m.map(|m| m.as_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Parse a release tag against the tag grammar.
///
/// Returns [`ReleaseError::InvalidTag`] when the tag has no recognizable
/// semantic-version suffix. Callers skip such releases.
pub fn parse_tag(tag: &str) -> Result<ParsedTag, ReleaseError> {
    let invalid = || ReleaseError::InvalidTag(tag.to_string());
    let caps = TAG_RE.captures(tag).ok_or_else(invalid)?;

    let number = |i: usize| -> Result<u64, ReleaseError> {
        caps.get(i)
            .and_then(|m| m.as_str().parse().ok())
            .ok_or_else(invalid)
    };

    Ok(ParsedTag {
        scope: non_empty(caps.get(4)),
        name: non_empty(caps.get(5)),
        major: number(6)?,
        minor: number(7)?,
        patch: number(8)?,
        prerelease: non_empty(caps.get(9)),
        build: non_empty(caps.get(10)),
    })
}

/// Coerce a tag into a normalized semantic version.
///
/// Tags matching the grammar keep their prerelease. Anything else is searched
/// for the first `N[.N[.N]][-pre]` run, padding missing components with zero.
/// Returns `None` when the tag holds no number at all.
pub fn coerce_version(tag: &str) -> Option<String> {
    if let Ok(parsed) = parse_tag(tag) {
        return Some(parsed.version_string());
    }

    let caps = COERCE_RE.captures(tag)?;
    let part = |i: usize| -> Option<u64> {
        match caps.get(i) {
            Some(m) => m.as_str().parse().ok(),
            None => Some(0),
        }
    };
    let core = format!("{}.{}.{}", part(1)?, part(2)?, part(3)?);

    // Keep the prerelease only when it forms a valid version
    if let Some(pre) = caps.get(4) {
        let candidate = format!("{}-{}", core, pre.as_str());
        if Version::parse(&candidate).is_ok() {
            return Some(candidate);
        }
    }
    Some(core)
}
