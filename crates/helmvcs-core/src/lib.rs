//! helm-vcs core - chart types and packaging
//!
//! This crate provides the chart-level building blocks used by the
//! repository synchronizer:
//! - `ChartMetadata`: the parsed `Chart.yaml`
//! - `LoadedChart`: a chart directory read into memory, honoring `.helmignore`
//! - `archive`: reproducible `.tgz` packaging and archive inspection
//! - `version`: lenient SemVer parsing for VCS tags and chart versions

pub mod archive;
pub mod chart;
pub mod error;
pub mod ignore;
pub mod version;

pub use archive::{archive_name, package_chart, read_chart_metadata};
pub use chart::{CHART_FILE, ChartFile, ChartMetadata, Dependency, LoadedChart, Maintainer};
pub use error::{CoreError, Result};
pub use ignore::HelmIgnore;
pub use version::{compare_versions, parse_lenient};
