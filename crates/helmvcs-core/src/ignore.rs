//! `.helmignore` rules
//!
//! Supports the subset of gitignore syntax Helm understands:
//! comments, negation with `!`, directory-only rules with a trailing `/`,
//! basename rules (no `/`) and rules anchored to the chart root.
//! The last matching rule decides.

use glob::{MatchOptions, Pattern};
use std::path::Path;

use crate::error::{CoreError, Result};

/// Name of the ignore file inside a chart directory
pub const IGNORE_FILE: &str = ".helmignore";

/// Rules applied to every chart, before the chart's own `.helmignore`
const DEFAULT_RULES: &[&str] = &["templates/.?*", ".git/", ".hg/", ".svn/", ".bzr/"];

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

#[derive(Debug, Clone)]
struct Rule {
    pattern: Pattern,
    negate: bool,
    dir_only: bool,
    basename: bool,
}

impl Rule {
    fn parse(line: &str) -> Result<Option<Self>> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }

        let (negate, body) = match line.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, line),
        };
        let (dir_only, body) = match body.strip_suffix('/') {
            Some(rest) => (true, rest),
            None => (false, body),
        };
        let body = body.trim_start_matches('/');
        if body.is_empty() {
            return Ok(None);
        }

        let pattern = Pattern::new(body).map_err(|e| CoreError::IgnorePattern {
            pattern: line.to_string(),
            message: e.to_string(),
        })?;

        Ok(Some(Self {
            pattern,
            negate,
            dir_only,
            basename: !body.contains('/'),
        }))
    }

    fn matches(&self, rel_path: &str, is_dir: bool) -> bool {
        if self.dir_only && !is_dir {
            return false;
        }
        if self.basename {
            let name = rel_path.rsplit('/').next().unwrap_or(rel_path);
            self.pattern.matches_with(name, MATCH_OPTIONS)
        } else {
            self.pattern.matches_with(rel_path, MATCH_OPTIONS)
        }
    }
}

/// Parsed ignore rules for a chart directory
#[derive(Debug, Clone, Default)]
pub struct HelmIgnore {
    rules: Vec<Rule>,
}

impl HelmIgnore {
    /// Rules applied when a chart ships no `.helmignore`
    pub fn defaults() -> Self {
        let rules = DEFAULT_RULES
            .iter()
            .filter_map(|line| Rule::parse(line).ok().flatten())
            .collect();
        Self { rules }
    }

    /// Parse rules from the contents of a `.helmignore` file, on top of the defaults
    pub fn parse(content: &str) -> Result<Self> {
        let mut ignore = Self::defaults();
        for line in content.lines() {
            if let Some(rule) = Rule::parse(line)? {
                ignore.rules.push(rule);
            }
        }
        Ok(ignore)
    }

    /// Load the `.helmignore` of a chart directory, if any
    pub fn load(chart_root: &Path) -> Result<Self> {
        let path = chart_root.join(IGNORE_FILE);
        if !path.is_file() {
            return Ok(Self::defaults());
        }
        let content = std::fs::read_to_string(&path)?;
        Self::parse(&content)
    }

    /// Check a `/`-separated path relative to the chart root
    pub fn is_ignored(&self, rel_path: &str, is_dir: bool) -> bool {
        let mut ignored = false;
        for rule in &self.rules {
            if rule.matches(rel_path, is_dir) {
                ignored = !rule.negate;
            }
        }
        ignored
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let ignore = HelmIgnore::defaults();
        assert!(ignore.is_ignored("templates/.swp", false));
        assert!(ignore.is_ignored(".git", true));
        assert!(!ignore.is_ignored("templates/deployment.yaml", false));
        assert!(!ignore.is_ignored("values.yaml", false));
    }

    #[test]
    fn test_basename_and_anchored_rules() {
        let ignore = HelmIgnore::parse(
            r#"
# editor files
*.bak
/docs/*.md
ci/
"#,
        )
        .unwrap();

        assert!(ignore.is_ignored("values.yaml.bak", false));
        assert!(ignore.is_ignored("templates/deep/file.bak", false));
        assert!(ignore.is_ignored("docs/README.md", false));
        assert!(!ignore.is_ignored("templates/NOTES.md", false));
        assert!(ignore.is_ignored("ci", true));
        assert!(!ignore.is_ignored("ci", false));
    }

    #[test]
    fn test_negation_last_match_wins() {
        let ignore = HelmIgnore::parse("*.txt\n!keep.txt\n").unwrap();
        assert!(ignore.is_ignored("drop.txt", false));
        assert!(!ignore.is_ignored("keep.txt", false));
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(HelmIgnore::parse("[z-a\n").is_err());
    }
}
