//! Version control backends
//!
//! A single [`VcsRepo`] interface over Git, Mercurial, Subversion and
//! Bazaar. Each backend drives the system's own client binary, so any
//! transport and credential setup that works for the user's `git`/`hg`/
//! `svn`/`bzr` works here too.
//!
//! The backend is picked by sniffing the URI (see [`VcsKind::detect`]).

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::LazyLock;

use crate::error::{RepoError, Result};

/// `user@host:path`, the SCP-like syntax only git understands
static SCP_LIKE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_.-]+@[A-Za-z0-9_.-]+:[^/]").expect("SCP pattern is valid")
});

const GIT_HOSTS: &[&str] = &["github.com", "gitlab.com", "bitbucket.org"];
const BZR_HOSTS: &[&str] = &["launchpad.net", "code.launchpad.net"];

/// Supported version control systems
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VcsKind {
    Git,
    Hg,
    Svn,
    Bzr,
}

/// Result of URI detection: which client to use and what to hand it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VcsSource {
    pub kind: VcsKind,
    /// URI as the client expects it (explicit `git+` style prefixes removed)
    pub remote: String,
}

impl VcsKind {
    pub const ALL: [VcsKind; 4] = [VcsKind::Git, VcsKind::Hg, VcsKind::Svn, VcsKind::Bzr];

    /// Short name, also used as the display URI scheme
    pub fn as_str(&self) -> &'static str {
        match self {
            VcsKind::Git => "git",
            VcsKind::Hg => "hg",
            VcsKind::Svn => "svn",
            VcsKind::Bzr => "bzr",
        }
    }

    /// Working-copy metadata directory
    pub fn metadata_dir(&self) -> &'static str {
        match self {
            VcsKind::Git => ".git",
            VcsKind::Hg => ".hg",
            VcsKind::Svn => ".svn",
            VcsKind::Bzr => ".bzr",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == name)
    }

    /// Work out which VCS serves `uri`
    ///
    /// In order: an explicit `<vcs>+` prefix (`git+https://...`), a
    /// VCS-specific scheme, a `.git` suffix or SCP-like address, a
    /// well-known hosting service, and finally the metadata found on disk
    /// for local paths and `file://` URIs.
    pub fn detect(uri: &str) -> Result<VcsSource> {
        let uri = uri.trim();
        let unknown = || RepoError::UnknownVcs {
            uri: uri.to_string(),
        };

        if let Some((prefix, rest)) = uri.split_once('+') {
            if let Some(kind) = Self::from_name(prefix) {
                if rest.contains("://") {
                    // svn+ssh:// and bzr+ssh:// are the clients' own schemes
                    let keep_prefix =
                        rest.starts_with("ssh://") && matches!(kind, VcsKind::Svn | VcsKind::Bzr);
                    let remote = if keep_prefix { uri } else { rest };
                    return Ok(VcsSource {
                        kind,
                        remote: remote.to_string(),
                    });
                }
            }
        }

        let source = |kind| {
            Ok(VcsSource {
                kind,
                remote: uri.to_string(),
            })
        };

        let lower = uri.to_ascii_lowercase();
        if lower.starts_with("git://") {
            return source(VcsKind::Git);
        }
        if lower.starts_with("svn://") {
            return source(VcsKind::Svn);
        }
        if lower.starts_with("bzr://") || lower.starts_with("lp:") {
            return source(VcsKind::Bzr);
        }
        if lower.trim_end_matches('/').ends_with(".git") || SCP_LIKE.is_match(uri) {
            return source(VcsKind::Git);
        }

        if let Ok(parsed) = url::Url::parse(uri) {
            if parsed.scheme() != "file" {
                let host = parsed.host_str().unwrap_or_default().to_ascii_lowercase();
                let on = |hosts: &[&str]| {
                    hosts
                        .iter()
                        .any(|h| host == *h || host.ends_with(&format!(".{}", h)))
                };
                if on(GIT_HOSTS) {
                    return source(VcsKind::Git);
                }
                if on(BZR_HOSTS) {
                    return source(VcsKind::Bzr);
                }
                return Err(unknown());
            }
        }

        let local = PathBuf::from(uri.strip_prefix("file://").unwrap_or(uri));
        match detect_local(&local) {
            Some(VcsKind::Svn) if !uri.starts_with("file://") => Ok(VcsSource {
                kind: VcsKind::Svn,
                remote: format!("file://{}", local.display()),
            }),
            Some(kind) => source(kind),
            None => Err(unknown()),
        }
    }
}

impl fmt::Display for VcsKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn detect_local(path: &Path) -> Option<VcsKind> {
    if !path.is_dir() {
        return None;
    }
    for kind in VcsKind::ALL {
        if kind != VcsKind::Svn && path.join(kind.metadata_dir()).is_dir() {
            return Some(kind);
        }
    }
    // bare git repository
    if path.join("HEAD").is_file() && path.join("objects").is_dir() {
        return Some(VcsKind::Git);
    }
    // svn repository created by `svnadmin create`
    if path.join("format").is_file() && path.join("db").is_dir() {
        return Some(VcsKind::Svn);
    }
    None
}

/// `uri` with its scheme replaced by the VCS name, e.g.
/// `https://github.com/org/charts` becomes `git://github.com/org/charts`
pub fn display_uri(kind: VcsKind, uri: &str) -> String {
    let rest = match uri.find("://") {
        Some(i) => &uri[i + 3..],
        None => uri,
    };
    format!("{}://{}", kind, rest)
}

/// Operations the synchronizer needs from a version control system
pub trait VcsRepo {
    fn kind(&self) -> VcsKind;

    /// Upstream location
    fn remote(&self) -> &str;

    /// Local mirror location
    fn local_path(&self) -> &Path;

    /// Whether a usable mirror is present
    fn exists(&self) -> bool {
        self.local_path().join(self.kind().metadata_dir()).exists()
    }

    /// Create the mirror
    fn get(&self) -> Result<()>;

    /// Bring the mirror up to date with upstream
    fn update(&self) -> Result<()>;

    /// All tag names known to the mirror
    fn tags(&self) -> Result<Vec<String>>;

    /// Check out a tag, branch or revision
    fn update_version(&self, version: &str) -> Result<()>;
}

/// Open the backend matching `uri`, mirrored at `local_path`
pub fn open(uri: &str, local_path: impl Into<PathBuf>) -> Result<Box<dyn VcsRepo>> {
    let VcsSource { kind, remote } = VcsKind::detect(uri)?;
    let local = local_path.into();
    Ok(match kind {
        VcsKind::Git => Box::new(GitRepo::new(remote, local)),
        VcsKind::Hg => Box::new(HgRepo::new(remote, local)),
        VcsKind::Svn => Box::new(SvnRepo::new(remote, local)),
        VcsKind::Bzr => Box::new(BzrRepo::new(remote, local)),
    })
}

/// Run a VCS client and return its stdout
fn run<I, S>(program: &str, args: I, dir: Option<&Path>, operation: &str) -> Result<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let args: Vec<OsString> = args.into_iter().map(|a| a.as_ref().to_owned()).collect();
    let mut command = Command::new(program);
    command
        .args(&args)
        .stdin(Stdio::null())
        .env("GIT_TERMINAL_PROMPT", "0");
    if let Some(dir) = dir {
        command.current_dir(dir);
    }

    tracing::debug!(program, args = ?args, "running VCS client");

    let output = command
        .output()
        .map_err(|e| RepoError::vcs(operation, format!("failed to run {}: {}", program, e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(RepoError::vcs(
            operation,
            format!("{} exited with {}: {}", program, output.status, stderr.trim()),
        ));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

fn lines(output: &str) -> impl Iterator<Item = &str> {
    output.lines().map(str::trim).filter(|l| !l.is_empty())
}

fn is_revision_number(version: &str) -> bool {
    !version.is_empty() && version.bytes().all(|b| b.is_ascii_digit())
}

// ============ Git ============

pub struct GitRepo {
    remote: String,
    local: PathBuf,
}

impl GitRepo {
    pub fn new(remote: impl Into<String>, local: impl Into<PathBuf>) -> Self {
        Self {
            remote: remote.into(),
            local: local.into(),
        }
    }

    fn git<I, S>(&self, args: I, operation: &str) -> Result<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        run("git", args, Some(&self.local), operation)
    }
}

impl VcsRepo for GitRepo {
    fn kind(&self) -> VcsKind {
        VcsKind::Git
    }

    fn remote(&self) -> &str {
        &self.remote
    }

    fn local_path(&self) -> &Path {
        &self.local
    }

    fn get(&self) -> Result<()> {
        ensure_parent(&self.local)?;
        run(
            "git",
            [
                OsStr::new("clone"),
                OsStr::new("--quiet"),
                OsStr::new(&self.remote),
                self.local.as_os_str(),
            ],
            None,
            "git clone",
        )?;
        Ok(())
    }

    fn update(&self) -> Result<()> {
        self.git(
            ["fetch", "--quiet", "--tags", "--force", "--prune", "origin"],
            "git fetch",
        )?;
        Ok(())
    }

    fn tags(&self) -> Result<Vec<String>> {
        let output = self.git(["tag", "--list"], "git tag")?;
        Ok(lines(&output).map(String::from).collect())
    }

    fn update_version(&self, version: &str) -> Result<()> {
        let operation = format!("git checkout {}", version);
        self.git(["checkout", "--quiet", "--force", version], &operation)?;

        // A branch checked out earlier lags behind what fetch brought in
        let tracking = format!("refs/remotes/origin/{}", version);
        if self
            .git(["rev-parse", "--verify", "--quiet", tracking.as_str()], &operation)
            .is_ok()
        {
            let upstream = format!("origin/{}", version);
            self.git(["reset", "--quiet", "--hard", upstream.as_str()], &operation)?;
        }
        Ok(())
    }
}

// ============ Mercurial ============

pub struct HgRepo {
    remote: String,
    local: PathBuf,
}

impl HgRepo {
    pub fn new(remote: impl Into<String>, local: impl Into<PathBuf>) -> Self {
        Self {
            remote: remote.into(),
            local: local.into(),
        }
    }
}

impl VcsRepo for HgRepo {
    fn kind(&self) -> VcsKind {
        VcsKind::Hg
    }

    fn remote(&self) -> &str {
        &self.remote
    }

    fn local_path(&self) -> &Path {
        &self.local
    }

    fn get(&self) -> Result<()> {
        ensure_parent(&self.local)?;
        run(
            "hg",
            [
                OsStr::new("clone"),
                OsStr::new("--quiet"),
                OsStr::new(&self.remote),
                self.local.as_os_str(),
            ],
            None,
            "hg clone",
        )?;
        Ok(())
    }

    fn update(&self) -> Result<()> {
        run("hg", ["pull", "--quiet"], Some(&self.local), "hg pull")?;
        Ok(())
    }

    fn tags(&self) -> Result<Vec<String>> {
        let output = run("hg", ["tags", "--quiet"], Some(&self.local), "hg tags")?;
        Ok(lines(&output)
            .filter(|t| *t != "tip")
            .map(String::from)
            .collect())
    }

    fn update_version(&self, version: &str) -> Result<()> {
        run(
            "hg",
            ["update", "--quiet", "--clean", "--rev", version],
            Some(&self.local),
            &format!("hg update {}", version),
        )?;
        Ok(())
    }
}

// ============ Subversion ============

/// Subversion mirror; tags are expected under the conventional `^/tags/`
pub struct SvnRepo {
    remote: String,
    local: PathBuf,
}

impl SvnRepo {
    pub fn new(remote: impl Into<String>, local: impl Into<PathBuf>) -> Self {
        Self {
            remote: remote.into(),
            local: local.into(),
        }
    }
}

impl VcsRepo for SvnRepo {
    fn kind(&self) -> VcsKind {
        VcsKind::Svn
    }

    fn remote(&self) -> &str {
        &self.remote
    }

    fn local_path(&self) -> &Path {
        &self.local
    }

    fn get(&self) -> Result<()> {
        ensure_parent(&self.local)?;
        run(
            "svn",
            [
                OsStr::new("checkout"),
                OsStr::new("--quiet"),
                OsStr::new("--non-interactive"),
                OsStr::new(&self.remote),
                self.local.as_os_str(),
            ],
            None,
            "svn checkout",
        )?;
        Ok(())
    }

    fn update(&self) -> Result<()> {
        // Switch back from whatever tag the last sync left checked out
        run(
            "svn",
            [
                "switch",
                "--quiet",
                "--non-interactive",
                "--ignore-ancestry",
                self.remote.as_str(),
            ],
            Some(&self.local),
            "svn switch",
        )?;
        Ok(())
    }

    fn tags(&self) -> Result<Vec<String>> {
        let output = run(
            "svn",
            ["list", "--non-interactive", "^/tags"],
            Some(&self.local),
            "svn list",
        )?;
        Ok(lines(&output)
            .map(|t| t.trim_end_matches('/').to_string())
            .collect())
    }

    fn update_version(&self, version: &str) -> Result<()> {
        let operation = format!("svn checkout {}", version);
        if is_revision_number(version) {
            run(
                "svn",
                ["update", "--quiet", "--non-interactive", "-r", version],
                Some(&self.local),
                &operation,
            )?;
        } else {
            let tag = format!("^/tags/{}", version);
            run(
                "svn",
                [
                    "switch",
                    "--quiet",
                    "--non-interactive",
                    "--ignore-ancestry",
                    tag.as_str(),
                ],
                Some(&self.local),
                &operation,
            )?;
        }
        Ok(())
    }
}

// ============ Bazaar ============

pub struct BzrRepo {
    remote: String,
    local: PathBuf,
}

impl BzrRepo {
    pub fn new(remote: impl Into<String>, local: impl Into<PathBuf>) -> Self {
        Self {
            remote: remote.into(),
            local: local.into(),
        }
    }
}

impl VcsRepo for BzrRepo {
    fn kind(&self) -> VcsKind {
        VcsKind::Bzr
    }

    fn remote(&self) -> &str {
        &self.remote
    }

    fn local_path(&self) -> &Path {
        &self.local
    }

    fn get(&self) -> Result<()> {
        ensure_parent(&self.local)?;
        run(
            "bzr",
            [
                OsStr::new("branch"),
                OsStr::new("-q"),
                OsStr::new(&self.remote),
                self.local.as_os_str(),
            ],
            None,
            "bzr branch",
        )?;
        Ok(())
    }

    fn update(&self) -> Result<()> {
        run("bzr", ["pull", "-q", "--overwrite"], Some(&self.local), "bzr pull")?;
        Ok(())
    }

    fn tags(&self) -> Result<Vec<String>> {
        let output = run("bzr", ["tags"], Some(&self.local), "bzr tags")?;
        Ok(lines(&output)
            .filter_map(|line| line.split_whitespace().next())
            .map(String::from)
            .collect())
    }

    fn update_version(&self, version: &str) -> Result<()> {
        let revision = if is_revision_number(version) {
            version.to_string()
        } else {
            format!("tag:{}", version)
        };
        run(
            "bzr",
            ["update", "-q", "-r", revision.as_str()],
            Some(&self.local),
            &format!("bzr update {}", version),
        )?;
        Ok(())
    }
}
