//! Repository synchronization
//!
//! [`RepositorySync`] turns a registered VCS repository into a chart
//! repository Helm can read:
//!
//! 1. clone the upstream, or fetch into the existing mirror
//! 2. resolve the versions to walk (every semver tag, or the single `ref`)
//! 3. check out each version in ascending order and scan it for charts
//! 4. package each chart not seen before into the chart cache
//! 5. write `index.yaml` and register the repository with Helm
//!
//! Per-version checkout failures and per-chart failures are logged and
//! skipped. Failures to reach the upstream or to persist state abort the
//! update.

use helmvcs_core::{archive_name, package_chart};
use semver::Version;
use std::path::{Path, PathBuf};

use crate::config::{RegistryConfig, Repository};
use crate::download::{DownloadTarget, resolve_download};
use crate::error::{RepoError, Result};
use crate::home::HelmHome;
use crate::index::{INDEX_FILE, IndexBuilder};
use crate::repositories::{RepositoriesFile, RepositoryEntry};
use crate::scanner::ChartScanner;
use crate::vcs::{self, VcsRepo};
use crate::version::VersionSet;

/// Outcome of one update
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    pub repository: String,
    /// Versions checked out and scanned, in processing order
    pub processed: Vec<String>,
    /// Versions whose checkout failed
    pub failed: Vec<String>,
    /// Chart versions in the generated index
    pub charts: usize,
    pub index_path: PathBuf,
}

/// A revision to check out, with its semantic version when it has one
struct Revision {
    checkout: String,
    version: Option<Version>,
}

/// Synchronizes VCS repositories into chart repositories under a Helm home
pub struct RepositorySync {
    home: HelmHome,
}

impl RepositorySync {
    pub fn new(home: HelmHome) -> Self {
        Self { home }
    }

    pub fn home(&self) -> &HelmHome {
        &self.home
    }

    pub fn load_registry(&self) -> Result<RegistryConfig> {
        RegistryConfig::load(&self.home.config_file())
    }

    /// Registered repository matching `uri`
    pub fn find(&self, uri: &str) -> Result<Repository> {
        self.load_registry()?
            .find(uri)
            .cloned()
            .ok_or_else(|| RepoError::RepositoryNotFound {
                uri: uri.to_string(),
            })
    }

    /// Add or replace `repo` in the registry and save it
    pub fn register(&self, repo: &Repository) -> Result<()> {
        let path = self.home.config_file();
        let mut registry = RegistryConfig::load(&path)?;
        registry.upsert(repo.clone());
        registry.save(&path)?;
        tracing::debug!(repository = %repo.name, path = %path.display(), "registry saved");
        Ok(())
    }

    /// Run a first update of `repo`, then register it
    ///
    /// A repository whose mirror cannot be fetched is never registered.
    pub fn init(&self, repo: &Repository) -> Result<SyncReport> {
        let report = self.update(repo)?;
        self.register(repo)?;
        Ok(report)
    }

    /// VCS backend for `repo`, mirrored under the Helm home
    pub fn open_vcs(&self, repo: &Repository) -> Result<Box<dyn VcsRepo>> {
        vcs::open(&repo.uri, self.home.vcs_dir(&repo.name))
    }

    /// Synchronize `repo` with its upstream
    pub fn update(&self, repo: &Repository) -> Result<SyncReport> {
        let vcs = self.open_vcs(repo)?;
        self.update_with(repo, vcs.as_ref())
    }

    /// Synchronize `repo` through an already opened backend
    pub fn update_with(&self, repo: &Repository, vcs: &dyn VcsRepo) -> Result<SyncReport> {
        self.refresh_mirror(repo, vcs)?;

        let revisions = self.revisions(repo, vcs)?;
        tracing::debug!(
            repository = %repo.name,
            versions = ?revisions.iter().map(|r| r.checkout.as_str()).collect::<Vec<_>>(),
            "resolved versions"
        );

        self.reset(&repo.name)?;
        let chart_dir = self.home.chart_dir(&repo.name);
        std::fs::create_dir_all(&chart_dir)?;

        let mut report = SyncReport {
            repository: repo.name.clone(),
            ..SyncReport::default()
        };
        let mut builder = IndexBuilder::new();

        for revision in revisions {
            tracing::info!(repository = %repo.name, version = %revision.checkout, "checking out");
            if let Err(e) = vcs.update_version(&revision.checkout) {
                tracing::warn!(
                    repository = %repo.name,
                    version = %revision.checkout,
                    error = %e,
                    "checkout failed, skipping version"
                );
                report.failed.push(revision.checkout);
                continue;
            }

            self.collect_charts(repo, vcs.local_path(), &revision, &chart_dir, &mut builder);
            report.processed.push(revision.checkout);
        }

        let index = builder.emit();
        let index_path = chart_dir.join(INDEX_FILE);
        index.write(&index_path)?;

        let cache_index = self.home.cache_index(&repo.name);
        index.write(&cache_index)?;

        let repository_file = self.home.repository_file();
        let mut repositories = RepositoriesFile::load(&repository_file)?;
        repositories.update(RepositoryEntry::new(
            &repo.name,
            &repo.display_uri,
            &cache_index,
        ));
        repositories.write(&repository_file)?;

        report.charts = index.len();
        report.index_path = index_path;
        tracing::info!(
            repository = %repo.name,
            charts = report.charts,
            versions = report.processed.len(),
            failed = report.failed.len(),
            "repository updated"
        );
        Ok(report)
    }

    fn refresh_mirror(&self, repo: &Repository, vcs: &dyn VcsRepo) -> Result<()> {
        if vcs.exists() {
            tracing::info!(repository = %repo.name, "updating mirror");
            return vcs.update();
        }

        // leftovers of an interrupted clone
        let local = vcs.local_path();
        if local.exists() {
            std::fs::remove_dir_all(local)?;
        }
        tracing::info!(repository = %repo.name, path = %local.display(), "cloning");
        vcs.get()
    }

    fn revisions(&self, repo: &Repository, vcs: &dyn VcsRepo) -> Result<Vec<Revision>> {
        if let Some(git_ref) = &repo.git_ref {
            return Ok(vec![Revision {
                checkout: git_ref.clone(),
                version: helmvcs_core::parse_lenient(git_ref).ok(),
            }]);
        }

        Ok(VersionSet::resolve(vcs.tags()?)
            .into_iter()
            .map(|tag| Revision {
                checkout: tag.original,
                version: Some(tag.version),
            })
            .collect())
    }

    fn collect_charts(
        &self,
        repo: &Repository,
        root: &Path,
        revision: &Revision,
        chart_dir: &Path,
        builder: &mut IndexBuilder,
    ) {
        for mut chart in ChartScanner::scan(root, &repo.path) {
            if repo.use_tag {
                match &revision.version {
                    Some(version) => chart.override_version(version),
                    None => tracing::warn!(
                        repository = %repo.name,
                        version = %revision.checkout,
                        chart = %chart.name,
                        "ref is not a semantic version, keeping declared chart version"
                    ),
                }
            }

            if builder.contains(&chart.name, &chart.version) {
                tracing::debug!(chart = %chart.name, version = %chart.version, "already indexed");
                continue;
            }

            let package = match package_chart(&chart.chart) {
                Ok(package) => package,
                Err(e) => {
                    tracing::warn!(chart = %chart.name, error = %e, "unable to package chart");
                    continue;
                }
            };

            let archive = chart_dir.join(archive_name(&chart.name, &chart.version));
            if let Err(e) = std::fs::write(&archive, &package) {
                tracing::warn!(path = %archive.display(), error = %e, "unable to save chart");
                continue;
            }

            builder.add(&chart, &package);
            let relative = chart
                .source_path
                .strip_prefix(root)
                .unwrap_or(&chart.source_path);
            tracing::info!(
                chart = %chart.name,
                version = %chart.version,
                path = %relative.display(),
                "added chart"
            );
        }
    }

    /// Erase the chart cache of a repository; a missing cache is fine
    pub fn reset(&self, name: &str) -> Result<()> {
        let chart_dir = self.home.chart_dir(name);
        match std::fs::remove_dir_all(&chart_dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Generated `index.yaml` of a repository
    pub fn index(&self, name: &str) -> Result<Vec<u8>> {
        let path = self.home.chart_dir(name).join(INDEX_FILE);
        Ok(std::fs::read(path)?)
    }

    /// Bytes of a packaged chart from the chart cache
    pub fn chart_archive(&self, name: &str, file: &str) -> Result<Vec<u8>> {
        let not_found = || RepoError::ArchiveNotFound {
            file: file.to_string(),
            repository: name.to_string(),
        };
        if file.is_empty() || file.contains(['/', '\\']) || file.starts_with('.') {
            return Err(not_found());
        }

        match std::fs::read(self.home.chart_dir(name).join(file)) {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(not_found()),
            Err(e) => Err(e.into()),
        }
    }

    /// Serve a Helm downloader request
    ///
    /// Index requests update the repository first; chart requests are
    /// answered from the chart cache.
    pub fn download(&self, uri: &str) -> Result<Vec<u8>> {
        let registry = self.load_registry()?;
        let request = resolve_download(&registry, uri)?;
        match request.target {
            DownloadTarget::Index => {
                self.update(&request.repository)?;
                self.index(&request.repository.name)
            }
            DownloadTarget::Chart(file) => self.chart_archive(&request.repository.name, &file),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::IndexFile;
    use crate::vcs::VcsKind;
    use helmvcs_core::archive::{read_chart_metadata, read_file_from_archive};
    use std::cell::RefCell;
    use std::collections::{HashMap, HashSet};
    use tempfile::TempDir;

    /// In-memory VCS: each version materializes a fixed file tree
    struct FakeVcs {
        local: PathBuf,
        tags: Vec<String>,
        trees: HashMap<String, Vec<(&'static str, String)>>,
        failing: HashSet<String>,
        fail_get: bool,
        calls: RefCell<Vec<String>>,
    }

    impl FakeVcs {
        fn new(local: PathBuf) -> Self {
            Self {
                local,
                tags: Vec::new(),
                trees: HashMap::new(),
                failing: HashSet::new(),
                fail_get: false,
                calls: RefCell::new(Vec::new()),
            }
        }

        fn version(mut self, tag: &str, files: Vec<(&'static str, String)>) -> Self {
            self.tags.push(tag.to_string());
            self.trees.insert(tag.to_string(), files);
            self
        }

        fn failing(mut self, tag: &str) -> Self {
            self.failing.insert(tag.to_string());
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.borrow().clone()
        }
    }

    impl VcsRepo for FakeVcs {
        fn kind(&self) -> VcsKind {
            VcsKind::Git
        }

        fn remote(&self) -> &str {
            "https://github.com/org/charts"
        }

        fn local_path(&self) -> &Path {
            &self.local
        }

        fn get(&self) -> Result<()> {
            self.calls.borrow_mut().push("get".to_string());
            if self.fail_get {
                return Err(RepoError::vcs("git clone", "connection refused"));
            }
            std::fs::create_dir_all(self.local.join(".git"))?;
            Ok(())
        }

        fn update(&self) -> Result<()> {
            self.calls.borrow_mut().push("update".to_string());
            Ok(())
        }

        fn tags(&self) -> Result<Vec<String>> {
            Ok(self.tags.clone())
        }

        fn update_version(&self, version: &str) -> Result<()> {
            self.calls.borrow_mut().push(format!("checkout {}", version));
            if self.failing.contains(version) {
                return Err(RepoError::vcs("git checkout", "pathspec did not match"));
            }
            let files = self
                .trees
                .get(version)
                .ok_or_else(|| RepoError::vcs("git checkout", "unknown revision"))?;

            for entry in std::fs::read_dir(&self.local)? {
                let entry = entry?;
                if entry.file_name() == ".git" {
                    continue;
                }
                if entry.file_type()?.is_dir() {
                    std::fs::remove_dir_all(entry.path())?;
                } else {
                    std::fs::remove_file(entry.path())?;
                }
            }
            for (path, content) in files {
                let target = self.local.join(path);
                std::fs::create_dir_all(target.parent().unwrap())?;
                std::fs::write(target, content)?;
            }
            Ok(())
        }
    }

    fn chart_yaml(name: &str, version: &str) -> String {
        format!("apiVersion: v1\nname: {}\nversion: {}\n", name, version)
    }

    fn fixture() -> (TempDir, RepositorySync, Repository) {
        let temp = TempDir::new().unwrap();
        let sync = RepositorySync::new(HelmHome::new(temp.path().join("helm")));
        let repo = Repository::new("charts", "https://github.com/org/charts").unwrap();
        (temp, sync, repo)
    }

    fn fake(sync: &RepositorySync, repo: &Repository) -> FakeVcs {
        FakeVcs::new(sync.home().vcs_dir(&repo.name))
    }

    fn versions_of(index: &IndexFile, name: &str) -> Vec<String> {
        index
            .get(name)
            .map(|v| v.iter().map(|c| c.metadata.version.clone()).collect())
            .unwrap_or_default()
    }

    #[test]
    fn test_update_indexes_every_tag() {
        let (_temp, sync, repo) = fixture();
        let bad = ("bad-chart/Chart.yaml", "name: bad-chart\nversion: [oops\n".to_string());
        let vcs = fake(&sync, &repo)
            .version(
                "v1.0.0",
                vec![("app/Chart.yaml", chart_yaml("app", "1.0.0")), bad.clone()],
            )
            .version("not-a-version", vec![])
            .version(
                "v2.0.0",
                vec![("app/Chart.yaml", chart_yaml("app", "2.0.0")), bad],
            );

        let report = sync.update_with(&repo, &vcs).unwrap();
        assert_eq!(report.processed, vec!["v1.0.0", "v2.0.0"]);
        assert!(report.failed.is_empty());
        assert_eq!(report.charts, 2);

        let index = IndexFile::load(&report.index_path).unwrap();
        assert_eq!(versions_of(&index, "app"), vec!["2.0.0", "1.0.0"]);
        assert!(index.get("bad-chart").is_none());

        let chart_dir = sync.home().chart_dir("charts");
        assert!(chart_dir.join("app-1.0.0.tgz").is_file());
        assert!(chart_dir.join("app-2.0.0.tgz").is_file());

        let cached = IndexFile::load(&sync.home().cache_index("charts")).unwrap();
        assert_eq!(cached.chart_keys(), index.chart_keys());

        let repositories = RepositoriesFile::load(&sync.home().repository_file()).unwrap();
        let entry = repositories.get("charts").unwrap();
        assert_eq!(entry.url, "git://github.com/org/charts");
        assert_eq!(
            entry.cache,
            sync.home().cache_index("charts").display().to_string()
        );
    }

    #[test]
    fn test_update_tolerates_failed_checkout() {
        let (_temp, sync, repo) = fixture();
        let vcs = fake(&sync, &repo)
            .version("v1.0.0", vec![("app/Chart.yaml", chart_yaml("app", "1.0.0"))])
            .version("v2.0.0", vec![("app/Chart.yaml", chart_yaml("app", "2.0.0"))])
            .version("v3.0.0", vec![("app/Chart.yaml", chart_yaml("app", "3.0.0"))])
            .failing("v2.0.0");

        let report = sync.update_with(&repo, &vcs).unwrap();
        assert_eq!(report.processed, vec!["v1.0.0", "v3.0.0"]);
        assert_eq!(report.failed, vec!["v2.0.0"]);

        let index = IndexFile::load(&report.index_path).unwrap();
        assert_eq!(versions_of(&index, "app"), vec!["3.0.0", "1.0.0"]);
    }

    #[test]
    fn test_update_first_revision_wins() {
        let (_temp, sync, repo) = fixture();
        let vcs = fake(&sync, &repo)
            .version(
                "v1.0.0",
                vec![
                    ("app/Chart.yaml", chart_yaml("app", "1.0.0")),
                    ("app/values.yaml", "origin: first\n".to_string()),
                ],
            )
            .version(
                "v1.1.0",
                vec![
                    ("app/Chart.yaml", chart_yaml("app", "1.0.0")),
                    ("app/values.yaml", "origin: second\n".to_string()),
                ],
            );

        let report = sync.update_with(&repo, &vcs).unwrap();
        assert_eq!(report.charts, 1);

        let archive = sync.chart_archive("charts", "app-1.0.0.tgz").unwrap();
        let values = read_file_from_archive(&archive, "app/values.yaml").unwrap();
        assert_eq!(values, b"origin: first\n");

        let index = IndexFile::load(&report.index_path).unwrap();
        assert_eq!(
            index.get_version("app", "1.0.0").unwrap().digest,
            crate::index::digest(&archive)
        );
    }

    #[test]
    fn test_update_use_tag_overrides_version() {
        let (_temp, sync, repo) = fixture();
        let repo = repo.with_use_tag(true);
        let vcs = fake(&sync, &repo)
            .version("v3.0.0", vec![("app/Chart.yaml", chart_yaml("app", "0.0.1"))]);

        let report = sync.update_with(&repo, &vcs).unwrap();
        let index = IndexFile::load(&report.index_path).unwrap();
        assert_eq!(versions_of(&index, "app"), vec!["3.0.0"]);

        let archive = sync.chart_archive("charts", "app-3.0.0.tgz").unwrap();
        assert_eq!(read_chart_metadata(&archive).unwrap().version, "3.0.0");
    }

    #[test]
    fn test_update_single_ref() {
        let (_temp, sync, repo) = fixture();
        let repo = repo.with_ref(Some("main".to_string())).with_use_tag(true);
        let vcs = fake(&sync, &repo)
            .version("v1.0.0", vec![("app/Chart.yaml", chart_yaml("app", "1.0.0"))])
            .version("main", vec![("app/Chart.yaml", chart_yaml("app", "1.5.0"))]);

        let report = sync.update_with(&repo, &vcs).unwrap();
        assert_eq!(report.processed, vec!["main"]);
        assert_eq!(vcs.calls(), vec!["get", "checkout main"]);

        // not a semantic version, so the declared one is kept
        let index = IndexFile::load(&report.index_path).unwrap();
        assert_eq!(versions_of(&index, "app"), vec!["1.5.0"]);
    }

    #[test]
    fn test_update_scans_sub_path_and_skips_vcs_dirs() {
        let (_temp, sync, repo) = fixture();
        let repo = repo.with_path("stable");
        let vcs = fake(&sync, &repo).version(
            "1.0.0",
            vec![
                ("stable/app/Chart.yaml", chart_yaml("app", "1.0.0")),
                ("stable/.svn/ghost/Chart.yaml", chart_yaml("ghost", "1.0.0")),
                ("incubator/beta/Chart.yaml", chart_yaml("beta", "0.1.0")),
            ],
        );

        let report = sync.update_with(&repo, &vcs).unwrap();
        let index = IndexFile::load(&report.index_path).unwrap();
        let names: Vec<_> = index.entries.keys().cloned().collect();
        assert_eq!(names, vec!["app"]);
    }

    #[test]
    fn test_second_update_fetches_and_rebuilds_cache() {
        let (_temp, sync, repo) = fixture();
        let vcs = fake(&sync, &repo)
            .version("v1.0.0", vec![("app/Chart.yaml", chart_yaml("app", "1.0.0"))]);

        sync.update_with(&repo, &vcs).unwrap();
        let stale = sync.home().chart_dir("charts").join("old-0.1.0.tgz");
        std::fs::write(&stale, b"stale").unwrap();

        sync.update_with(&repo, &vcs).unwrap();
        assert!(!stale.exists());
        assert_eq!(
            vcs.calls(),
            vec!["get", "checkout v1.0.0", "update", "checkout v1.0.0"]
        );
    }

    #[test]
    fn test_clone_failure_registers_nothing() {
        let (_temp, sync, repo) = fixture();
        let mut vcs = fake(&sync, &repo)
            .version("v1.0.0", vec![("app/Chart.yaml", chart_yaml("app", "1.0.0"))]);
        vcs.fail_get = true;

        let err = sync.update_with(&repo, &vcs).unwrap_err();
        assert!(matches!(err, RepoError::Vcs { .. }));
        assert!(!sync.home().repository_file().exists());
        assert!(!sync.home().chart_dir("charts").exists());
    }

    #[test]
    fn test_init_failed_clone_leaves_registry_empty() {
        let (_temp, sync, _repo) = fixture();
        let repo = Repository::new("ghost", "file:///nonexistent/ghost.git").unwrap();

        assert!(sync.init(&repo).is_err());
        assert!(!sync.home().config_file().exists());
        assert!(sync.load_registry().unwrap().repositories.is_empty());
        assert!(!sync.home().repository_file().exists());
    }

    #[test]
    fn test_register_upserts_by_name() {
        let (_temp, sync, repo) = fixture();
        sync.register(&repo.clone().with_path("a")).unwrap();
        sync.register(&repo.with_path("b")).unwrap();

        let registry = sync.load_registry().unwrap();
        assert_eq!(registry.repositories.len(), 1);
        assert_eq!(registry.get("charts").unwrap().path, "b");

        let found = sync.find("git://github.com/org/charts/").unwrap();
        assert_eq!(found.name, "charts");
        assert!(matches!(
            sync.find("git://github.com/org/unknown"),
            Err(RepoError::RepositoryNotFound { .. })
        ));
    }

    #[test]
    fn test_chart_archive_rejects_paths() {
        let (_temp, sync, _repo) = fixture();
        for file in ["../vcs.yaml", "sub/app-1.0.0.tgz", "missing-1.0.0.tgz", ""] {
            assert!(matches!(
                sync.chart_archive("charts", file),
                Err(RepoError::ArchiveNotFound { .. })
            ));
        }
    }

    #[test]
    fn test_download_serves_cached_archive() {
        let (_temp, sync, repo) = fixture();
        sync.register(&repo).unwrap();
        let vcs = fake(&sync, &repo)
            .version("v1.0.0", vec![("app/Chart.yaml", chart_yaml("app", "1.0.0"))]);
        sync.update_with(&repo, &vcs).unwrap();

        let data = sync
            .download("git://github.com/org/charts/app-1.0.0.tgz")
            .unwrap();
        assert_eq!(read_chart_metadata(&data).unwrap().name, "app");

        assert!(matches!(
            sync.download("git://github.com/org/other/index.yaml"),
            Err(RepoError::RepositoryNotFound { .. })
        ));
    }
}
