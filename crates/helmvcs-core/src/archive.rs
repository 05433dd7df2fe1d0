//! Chart packaging and archive reading
//!
//! Charts are packaged the way `helm package` lays them out: a gzipped
//! tarball whose entries all live under a top-level `<chart-name>/`
//! directory. Headers use a fixed mtime and mode, so packaging the same
//! chart twice yields byte-identical archives and stable digests.

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::io::{Cursor, Read, Write};
use tar::{Archive, Builder, Header};

use crate::chart::{CHART_FILE, ChartMetadata, LoadedChart};
use crate::error::{CoreError, Result};

/// Archive extension used for packaged charts
pub const ARCHIVE_EXTENSION: &str = "tgz";

/// Package a loaded chart into `.tgz` bytes
///
/// `Chart.yaml` is re-serialized from `chart.metadata`, so a version
/// override is reflected inside the archive. Every other file is
/// copied verbatim.
pub fn package_chart(chart: &LoadedChart) -> Result<Vec<u8>> {
    let prefix = chart.name();
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = Builder::new(encoder);

    let chart_yaml = chart.metadata.to_yaml()?;
    add_bytes_to_archive(
        &mut builder,
        &format!("{}/{}", prefix, CHART_FILE),
        chart_yaml.as_bytes(),
    )?;

    for file in &chart.files {
        add_bytes_to_archive(&mut builder, &format!("{}/{}", prefix, file.path), &file.data)?;
    }

    let encoder = builder.into_inner()?;
    Ok(encoder.finish()?)
}

/// Conventional archive file name for a chart version
#[must_use]
pub fn archive_name(name: &str, version: &str) -> String {
    format!("{}-{}.{}", name, version, ARCHIVE_EXTENSION)
}

/// Information about a file in an archive
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    /// Relative path within the archive
    pub path: String,
    /// File size in bytes
    pub size: u64,
}

/// List files in an archive
pub fn list_archive(data: &[u8]) -> Result<Vec<ArchiveEntry>> {
    let mut archive = Archive::new(GzDecoder::new(Cursor::new(data)));
    let mut entries = Vec::new();

    for entry in archive.entries()? {
        let entry = entry?;
        if entry.header().entry_type().is_dir() {
            continue;
        }
        entries.push(ArchiveEntry {
            path: entry.path()?.to_string_lossy().to_string(),
            size: entry.header().size()?,
        });
    }

    Ok(entries)
}

/// Read a specific file from an archive
pub fn read_file_from_archive(data: &[u8], file_path: &str) -> Result<Vec<u8>> {
    let mut archive = Archive::new(GzDecoder::new(Cursor::new(data)));

    for entry in archive.entries()? {
        let mut entry = entry?;
        let path = entry.path()?.to_string_lossy().to_string();

        if path == file_path {
            let mut content = Vec::new();
            entry.read_to_end(&mut content)?;
            return Ok(content);
        }
    }

    Err(CoreError::Archive {
        message: format!("File not found in archive: {}", file_path),
    })
}

/// Read the top-level `Chart.yaml` of a packaged chart
pub fn read_chart_metadata(data: &[u8]) -> Result<ChartMetadata> {
    let mut archive = Archive::new(GzDecoder::new(Cursor::new(data)));

    for entry in archive.entries()? {
        let mut entry = entry?;
        let path = entry.path()?.to_string_lossy().to_string();
        let mut parts = path.splitn(2, '/');
        let (Some(_chart_dir), Some(file)) = (parts.next(), parts.next()) else {
            continue;
        };

        if file == CHART_FILE {
            let mut content = String::new();
            entry.read_to_string(&mut content)?;
            return ChartMetadata::from_yaml(&content);
        }
    }

    Err(CoreError::Archive {
        message: format!("{} not found in archive", CHART_FILE),
    })
}

/// Add bytes to a tar archive with a given path
fn add_bytes_to_archive<W: Write>(
    builder: &mut Builder<W>,
    archive_path: &str,
    content: &[u8],
) -> Result<()> {
    let mut header = Header::new_gnu();
    header.set_size(content.len() as u64);
    header.set_mode(0o644);
    header.set_mtime(0); // Reproducible builds: use epoch time
    header.set_cksum();

    builder.append_data(&mut header, archive_path, content)?;

    Ok(())
}
