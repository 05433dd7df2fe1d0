//! Tag resolution
//!
//! Turns the raw tag list of a repository into the ordered set of
//! versions the synchronizer walks.

use helmvcs_core::parse_lenient;
use semver::Version;
use std::collections::HashSet;
use std::fmt;

/// A VCS tag that parsed as a semantic version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagVersion {
    /// Normalized version
    pub version: Version,
    /// Tag as written in the repository, used for checkout
    pub original: String,
}

impl TagVersion {
    /// Parse a tag leniently, `None` when it is not a version
    pub fn parse(tag: &str) -> Option<Self> {
        parse_lenient(tag).ok().map(|version| Self {
            version,
            original: tag.to_string(),
        })
    }
}

impl fmt::Display for TagVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.original)
    }
}

/// Ordered, de-duplicated set of tag versions
#[derive(Debug, Clone, Default)]
pub struct VersionSet {
    versions: Vec<TagVersion>,
}

impl VersionSet {
    /// Keep the tags that parse as versions, sorted ascending
    ///
    /// Tags normalizing to the same version (`1.0.0` and `v1.0.0`) are
    /// collapsed and the first one listed is kept.
    pub fn resolve<I, S>(raw_tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen: HashSet<Version> = HashSet::new();
        let mut versions: Vec<TagVersion> = Vec::new();
        for tag in raw_tags {
            let tag = tag.as_ref();
            let Some(parsed) = TagVersion::parse(tag) else {
                tracing::trace!(tag, "ignoring non-version tag");
                continue;
            };
            if !seen.insert(parsed.version.clone()) {
                tracing::debug!(tag, version = %parsed.version, "duplicate version tag ignored");
                continue;
            }
            versions.push(parsed);
        }

        // stable, so equal-precedence versions keep their listing order
        versions.sort_by(|a, b| a.version.cmp(&b.version));
        Self { versions }
    }

}

impl IntoIterator for VersionSet {
    type Item = TagVersion;
    type IntoIter = std::vec::IntoIter<TagVersion>;

    fn into_iter(self) -> Self::IntoIter {
        self.versions.into_iter()
    }
}
