//! Init command - register a VCS repository and build its first index

use console::style;
use helmvcs_repo::{Repository, RepositorySync, infer_name};

use crate::error::{CliError, Result};

pub struct InitArgs {
    /// Repository name, or the URI when only one positional was given
    pub name_or_uri: String,
    pub uri: Option<String>,
    pub path: String,
    pub git_ref: Option<String>,
    pub use_tag: bool,
}

pub fn run(sync: &RepositorySync, args: InitArgs) -> Result<()> {
    let (name, uri) = match args.uri {
        Some(uri) => (args.name_or_uri, uri),
        None => (infer_name(&args.name_or_uri)?, args.name_or_uri),
    };
    validate_name(&name)?;

    let repo = Repository::new(name, uri)?
        .with_path(args.path)
        .with_ref(args.git_ref)
        .with_use_tag(args.use_tag);
    tracing::debug!(?repo, "initializing repository");

    let report = sync.init(&repo)?;

    println!(
        "{} {} as {}",
        style("Initialized").green().bold(),
        repo.name,
        repo.display_uri
    );
    println!("  {} {}", style("Versions").dim(), report.processed.len());
    if !report.failed.is_empty() {
        println!(
            "  {} {}",
            style("Skipped").yellow(),
            report.failed.join(", ")
        );
    }
    println!("  {} {}", style("Charts").dim(), report.charts);
    println!("  {} {}", style("Index").dim(), report.index_path.display());

    Ok(())
}

/// Names become directory names under the Helm home
fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
        return Err(CliError::usage(format!(
            "invalid repository name '{}': must be a plain directory name",
            name
        )));
    }
    Ok(())
}
