//! helm-vcs - Helm chart repositories served from version control

use clap::{Parser, Subcommand};
use console::style;
use helmvcs_repo::{HelmHome, RepositorySync};
use std::path::PathBuf;

mod commands;
mod error;
mod exit_codes;
mod logging;

use commands::init::InitArgs;
use error::Result;

#[derive(Parser)]
#[command(name = "helm-vcs")]
#[command(version)]
#[command(about = "Serve Helm chart repositories from Git, Mercurial, Subversion and Bazaar", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug output
    #[arg(long, global = true)]
    debug: bool,

    /// Helm home directory (default: ~/.helm)
    #[arg(long, global = true, env = "HELM_HOME")]
    home: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a VCS repository as a chart repository and index it
    Init {
        /// Repository name, or the repository URI to infer the name from it
        #[arg(value_name = "NAME|URI")]
        name_or_uri: String,

        /// Repository URI
        uri: Option<String>,

        /// Directory inside the repository to search for charts
        #[arg(long, default_value = "")]
        path: String,

        /// Index only this branch, tag or revision instead of every version tag
        #[arg(long = "ref")]
        git_ref: Option<String>,

        /// Version charts by the tag they were found under
        #[arg(long)]
        use_tag: bool,
    },

    /// Fetch an index or chart archive (invoked by Helm as a downloader)
    Download {
        /// Client certificate file (unused, the VCS client handles auth)
        certificate: String,

        /// Client key file (unused)
        key: String,

        /// CA bundle file (unused)
        ca: String,

        /// Requested URL: `<repo>/index.yaml` or `<repo>/<chart>.tgz`
        uri: String,
    },
}

fn main() {
    miette::set_panic_hook();

    let cli = Cli::parse();

    let quiet = matches!(cli.command, Commands::Download { .. });
    if let Err(e) = logging::init(cli.debug, quiet) {
        eprintln!("Unable to initialize logging: {}", e);
    }

    if let Err(e) = run(cli) {
        eprintln!("{} {}", style("Error:").for_stderr().red().bold(), e);
        std::process::exit(e.exit_code());
    }
}

fn run(cli: Cli) -> Result<()> {
    let sync = RepositorySync::new(HelmHome::resolve(cli.home)?);
    tracing::debug!(home = %sync.home().root().display(), "using Helm home");

    match cli.command {
        Commands::Init {
            name_or_uri,
            uri,
            path,
            git_ref,
            use_tag,
        } => commands::init::run(
            &sync,
            InitArgs {
                name_or_uri,
                uri,
                path,
                git_ref,
                use_tag,
            },
        ),
        Commands::Download { uri, .. } => commands::download::run(&sync, &uri),
    }
}
