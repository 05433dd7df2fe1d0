//! Download command - Helm downloader protocol
//!
//! Helm runs `helm-vcs download <cert> <key> <ca> <url>` and reads the
//! requested document from stdout.

use helmvcs_repo::RepositorySync;
use std::io::Write;

use crate::error::Result;

pub fn run(sync: &RepositorySync, uri: &str) -> Result<()> {
    tracing::debug!(uri, "download requested");
    let data = sync.download(uri)?;

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(&data)?;
    stdout.flush()?;
    Ok(())
}
