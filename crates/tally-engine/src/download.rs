use crate::portal::{Portal, PortalError};
use std::path::{Path, PathBuf};
use tally_common::report::ReportDescriptor;
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("Portal error: {0}")]
    Portal(#[from] PortalError),

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Fetch the report bytes; `None` when the portal answers with anything but 200.
pub async fn fetch_report_data<P: Portal + ?Sized>(
    portal: &mut P,
    report: &ReportDescriptor,
) -> Result<Option<Vec<u8>>, PortalError> {
    let resource = portal.get(&report.download_url).await?;
    if resource.is_success() {
        Ok(Some(resource.body))
    } else {
        warn!(
            "Download of {} returned HTTP {}",
            report.filename_ext, resource.status
        );
        Ok(None)
    }
}

/// Where a report lands: `target` if given, else `<download_dir>/<filename_ext>`.
pub fn resolve_target(report: &ReportDescriptor, target: Option<&Path>, download_dir: &Path) -> PathBuf {
    match target {
        Some(path) => path.to_path_buf(),
        None => download_dir.join(&report.filename_ext),
    }
}

/// Fetch the report and write it verbatim to disk.
///
/// Returns the written path, or `None` if the portal refused the download.
pub async fn download_report<P: Portal + ?Sized>(
    portal: &mut P,
    report: &ReportDescriptor,
    target: Option<&Path>,
    download_dir: &Path,
) -> Result<Option<PathBuf>, DownloadError> {
    let Some(data) = fetch_report_data(portal, report).await? else {
        warn!("{} failed to download", report.filename_ext);
        return Ok(None);
    };

    let path = resolve_target(report, target, download_dir);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|source| DownloadError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
    }
    tokio::fs::write(&path, &data)
        .await
        .map_err(|source| DownloadError::Write {
            path: path.clone(),
            source,
        })?;

    info!(
        "{} downloaded successfully ({} bytes) to {}",
        report.filename_ext,
        data.len(),
        path.display()
    );
    Ok(Some(path))
}
