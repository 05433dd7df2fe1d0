//! helm-vcs repository synchronization
//!
//! This crate turns a version-controlled source tree into a Helm chart
//! repository:
//!
//! - **VCS backends**: Git, Mercurial, Subversion and Bazaar behind one
//!   [`VcsRepo`] trait, picked by sniffing the repository URI
//! - **Version resolution**: semver tags, walked oldest first
//! - **Chart discovery**: every `Chart.yaml` below a configurable path
//! - **Index generation**: Helm-compatible `index.yaml`, first chart seen
//!   for a name and version wins
//! - **Registration**: the plugin registry and Helm's repositories file
//!
//! ## Example
//!
//! ```rust,no_run
//! use helmvcs_repo::{HelmHome, Repository, RepositorySync};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let sync = RepositorySync::new(HelmHome::resolve(None)?);
//!
//! let repo = Repository::new("charts", "https://github.com/org/charts")?
//!     .with_path("stable");
//! let report = sync.init(&repo)?;
//! println!("{} charts indexed", report.charts);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod download;
pub mod error;
pub mod home;
pub mod index;
pub mod repositories;
pub mod scanner;
pub mod sync;
pub mod vcs;
pub mod version;

pub use config::{RegistryConfig, Repository, infer_name};
pub use download::{DownloadRequest, DownloadTarget, resolve_download};
pub use error::{RepoError, Result};
pub use home::{HelmHome, PLUGIN_NAME};
pub use index::{ChartVersion, INDEX_FILE, IndexBuilder, IndexFile};
pub use repositories::{RepositoriesFile, RepositoryEntry};
pub use scanner::{ChartScanner, DiscoveredChart};
pub use sync::{RepositorySync, SyncReport};
pub use vcs::{BzrRepo, GitRepo, HgRepo, SvnRepo, VcsKind, VcsRepo, VcsSource, display_uri};
pub use version::{TagVersion, VersionSet};
