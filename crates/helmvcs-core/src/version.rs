//! Lenient semantic version parsing
//!
//! VCS tags and chart versions are rarely strict SemVer 2.0: `v1.2.0`,
//! `1.2` and `V3` all show up in practice. They are normalized here
//! before handing them to [`semver::Version`].

use semver::Version;

use crate::error::{CoreError, Result};

/// Parse a version string, tolerating a leading `v`/`V` and missing
/// minor or patch components.
///
/// ```
/// use helmvcs_core::version::parse_lenient;
///
/// assert_eq!(parse_lenient("v1.2").unwrap().to_string(), "1.2.0");
/// assert_eq!(parse_lenient("1.2.0-rc1").unwrap().to_string(), "1.2.0-rc1");
/// assert!(parse_lenient("latest").is_err());
/// ```
pub fn parse_lenient(raw: &str) -> Result<Version> {
    let trimmed = raw.trim();
    let stripped = trimmed.strip_prefix(['v', 'V']).unwrap_or(trimmed);

    if let Ok(version) = Version::parse(stripped) {
        return Ok(version);
    }

    let invalid = |message: &str| CoreError::InvalidVersion {
        version: raw.to_string(),
        message: message.to_string(),
    };

    let split_at = stripped.find(['-', '+']).unwrap_or(stripped.len());
    let (core, rest) = stripped.split_at(split_at);
    let parts: Vec<&str> = core.split('.').collect();

    if parts.len() > 3 {
        return Err(invalid("too many version components"));
    }
    if parts
        .iter()
        .any(|p| p.is_empty() || !p.bytes().all(|b| b.is_ascii_digit()))
    {
        return Err(invalid("expected numeric major.minor.patch"));
    }

    let mut padded = parts.join(".");
    for _ in parts.len()..3 {
        padded.push_str(".0");
    }
    padded.push_str(rest);

    Version::parse(&padded).map_err(|e| invalid(&e.to_string()))
}

/// Compare two version strings by SemVer precedence, falling back to
/// plain string order when either side does not parse.
pub fn compare_versions(a: &str, b: &str) -> std::cmp::Ordering {
    match (parse_lenient(a).ok(), parse_lenient(b).ok()) {
        (Some(va), Some(vb)) => va.cmp(&vb),
        (Some(_), None) => std::cmp::Ordering::Greater,
        (None, Some(_)) => std::cmp::Ordering::Less,
        (None, None) => a.cmp(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cmp::Ordering;

    #[test]
    fn test_strict_versions() {
        assert_eq!(parse_lenient("1.0.0").unwrap(), Version::new(1, 0, 0));
        assert_eq!(
            parse_lenient("2.3.4+build.7").unwrap().to_string(),
            "2.3.4+build.7"
        );
    }

    #[test]
    fn test_prefixed_versions() {
        assert_eq!(parse_lenient("v1.2.0").unwrap(), Version::new(1, 2, 0));
        assert_eq!(parse_lenient("V0.9.1").unwrap(), Version::new(0, 9, 1));
        assert_eq!(
            parse_lenient("v1.2.0-rc1").unwrap().to_string(),
            "1.2.0-rc1"
        );
    }

    #[test]
    fn test_short_versions_are_padded() {
        assert_eq!(parse_lenient("v2").unwrap(), Version::new(2, 0, 0));
        assert_eq!(parse_lenient("1.4").unwrap(), Version::new(1, 4, 0));
        assert_eq!(
            parse_lenient("1.4-beta.2").unwrap().to_string(),
            "1.4.0-beta.2"
        );
    }

    #[test]
    fn test_rejects_non_versions() {
        for tag in ["latest", "release-branch", "", "v", "1.2.3.4", "1..2", "vx.y"] {
            assert!(parse_lenient(tag).is_err(), "{tag:?} should not parse");
        }
    }

    #[test]
    fn test_compare_versions() {
        assert_eq!(compare_versions("1.10.0", "1.9.0"), Ordering::Greater);
        assert_eq!(compare_versions("1.0.0-rc1", "1.0.0"), Ordering::Less);
        assert_eq!(compare_versions("1.0.0", "garbage"), Ordering::Greater);
        assert_eq!(compare_versions("a", "b"), Ordering::Less);
    }
}
