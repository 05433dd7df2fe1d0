//! Chart discovery in a checked-out tree

use helmvcs_core::{CHART_FILE, LoadedChart, parse_lenient};
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

use crate::vcs::VcsKind;

/// A chart found in the tree at one revision
#[derive(Debug, Clone)]
pub struct DiscoveredChart {
    pub name: String,
    pub version: String,
    /// Directory holding the chart's `Chart.yaml`
    pub source_path: PathBuf,
    pub chart: LoadedChart,
}

impl DiscoveredChart {
    fn from_loaded(mut chart: LoadedChart) -> Self {
        // `v1.0.0` and `1.0` name the same release as `1.0.0` and `1.0.0`
        if let Ok(version) = parse_lenient(chart.version()) {
            chart.set_version(&version);
        }
        Self {
            name: chart.name().to_string(),
            version: chart.version().to_string(),
            source_path: chart.root.clone(),
            chart,
        }
    }

    /// Replace the version, keeping the chart metadata in step
    pub fn override_version(&mut self, version: &semver::Version) {
        self.chart.set_version(version);
        self.version = version.to_string();
    }

}

/// Whether a directory entry is VCS metadata and must not be entered
pub fn is_skipped_dir(entry: &DirEntry) -> bool {
    entry.file_type().is_dir()
        && entry.depth() > 0
        && VcsKind::ALL
            .iter()
            .any(|kind| entry.file_name() == kind.metadata_dir())
}

/// Lazy walk over a tree yielding every loadable chart
///
/// Broken charts and unreadable entries are logged and skipped.
pub struct ChartScanner {
    walker: Option<Box<dyn Iterator<Item = walkdir::Result<DirEntry>>>>,
}

impl ChartScanner {
    pub fn scan(root: &Path, sub_path: &str) -> Self {
        let start = join_sub_path(root, sub_path);
        if !start.is_dir() {
            tracing::warn!(path = %start.display(), "chart path not found in this revision");
            return Self { walker: None };
        }

        let walker = WalkDir::new(&start)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !is_skipped_dir(entry));

        Self {
            walker: Some(Box::new(walker)),
        }
    }
}

impl Iterator for ChartScanner {
    type Item = DiscoveredChart;

    fn next(&mut self) -> Option<Self::Item> {
        let walker = self.walker.as_mut()?;
        for entry in walker.by_ref() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(error = %e, "skipping unreadable entry");
                    continue;
                }
            };

            if !entry.file_type().is_file() || entry.file_name() != CHART_FILE {
                continue;
            }

            let Some(dir) = entry.path().parent() else {
                continue;
            };

            match LoadedChart::load(dir) {
                Ok(chart) => {
                    tracing::debug!(
                        path = %dir.display(),
                        chart = chart.name(),
                        version = chart.version(),
                        "found chart"
                    );
                    return Some(DiscoveredChart::from_loaded(chart));
                }
                Err(e) => {
                    tracing::warn!(path = %dir.display(), error = %e, "skipping chart that failed to load");
                }
            }
        }
        self.walker = None;
        None
    }
}

fn join_sub_path(root: &Path, sub_path: &str) -> PathBuf {
    let trimmed = sub_path.trim_matches('/');
    if trimmed.is_empty() || trimmed == "." {
        root.to_path_buf()
    } else {
        root.join(trimmed)
    }
}
