//! Download a data bundle and install it into a destination directory.
//!
//! Archives come in two shapes and both are handled:
//! - a "tarbomb" with files at its root (`README.md` lands at `<dest>/README.md`)
//! - a single wrapping folder, typically `<name>-<revision>/`, whose contents are
//!   installed directly into `<dest>`

use std::path::Path;

use tempfile::TempDir;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::cancel::CancelFlag;
use crate::config::{FetchConfig, InstallOptions};
use crate::error::InstallError;
use crate::extract;
use crate::fetcher::{DownloadedFile, Fetcher};
use crate::layout::{self, Layout};
use crate::merge::{self, MergeStats};
use crate::mirrors::MirrorList;

#[derive(Debug, Clone)]
pub struct InstallReport {
    pub filename: String,
    pub single_root: bool,
    pub stats: MergeStats,
}

pub struct Installer {
    fetcher: Fetcher,
}

impl Installer {
    pub fn new(config: FetchConfig) -> Result<Self, InstallError> {
        Ok(Self {
            fetcher: Fetcher::new(config).map_err(InstallError::Client)?,
        })
    }

    /// Install the bundle served by `urls` into `dest`.
    ///
    /// Unless `options.keep` is set, an existing `dest` is removed first. A failed
    /// install may leave `dest` partially modified and should be retried from scratch.
    ///
    /// When `options.timeout` expires the blocking extract/merge work is told to stop
    /// and is awaited, so `dest` no longer changes once `TimedOut` is returned.
    pub async fn install(
        &self,
        urls: impl Into<MirrorList>,
        dest: &Path,
        options: &InstallOptions,
    ) -> Result<InstallReport, InstallError> {
        let urls = urls.into();
        let deadline = options.timeout.map(|limit| (Instant::now() + limit, limit));

        prepare_destination(dest, options.keep).await?;

        let downloaded = match deadline {
            Some((at, limit)) => tokio::time::timeout_at(at, self.fetcher.fetch(&urls))
                .await
                .map_err(|_| InstallError::TimedOut(limit))??,
            None => self.fetcher.fetch(&urls).await?,
        };

        let cancel = CancelFlag::default();
        let mut task = {
            let cancel = cancel.clone();
            let dest = dest.to_path_buf();
            tokio::task::spawn_blocking(move || unpack_and_merge(downloaded, &dest, &cancel))
        };

        let Some((at, limit)) = deadline else {
            return task.await?;
        };
        match tokio::time::timeout_at(at, &mut task).await {
            Ok(res) => res?,
            Err(_) => {
                warn!(?limit, "install timed out, waiting for extraction to stop");
                cancel.cancel();
                // Only the join matters here; the task reports `Cancelled` or finished work.
                let _ = task.await;
                Err(InstallError::TimedOut(limit))
            }
        }
    }
}

async fn prepare_destination(dest: &Path, keep: bool) -> Result<(), InstallError> {
    let exists = tokio::fs::try_exists(dest)
        .await
        .map_err(|e| InstallError::io(dest, e))?;
    if !keep && exists {
        warn!(dest = %dest.display(), "removing existing destination folder");
        tokio::fs::remove_dir_all(dest)
            .await
            .map_err(|e| InstallError::io(dest, e))?;
    }
    tokio::fs::create_dir_all(dest)
        .await
        .map_err(|e| InstallError::io(dest, e))
}

fn unpack_and_merge(
    downloaded: DownloadedFile,
    dest: &Path,
    cancel: &CancelFlag,
) -> Result<InstallReport, InstallError> {
    let res = tempfile::Builder::new()
        .prefix("databundle-extract-")
        .tempdir()
        .map_err(|e| InstallError::io(std::env::temp_dir(), e))
        .and_then(|extraction| {
            let res = stage(&downloaded, extraction.path(), dest, cancel);
            info!("removing temporary folders");
            cleanup("extraction", extraction);
            res
        });

    let download_dir = downloaded
        .path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    if let Err(err) = downloaded.close() {
        warn!(?err, dir = %download_dir.display(), "failed to remove temporary download folder");
    }
    res
}

fn stage(
    downloaded: &DownloadedFile,
    extraction_dir: &Path,
    dest: &Path,
    cancel: &CancelFlag,
) -> Result<InstallReport, InstallError> {
    extract::extract_with_cancel(&downloaded.path, extraction_dir, cancel)?;

    let layout = layout::classify(extraction_dir).map_err(|e| InstallError::io(extraction_dir, e))?;
    let stats = merge::merge_into(layout.bundle_root(), dest, cancel)?;

    info!(
        dest = %dest.display(),
        dirs_created = stats.dirs_created,
        files_written = stats.files_written,
        files_overwritten = stats.files_overwritten,
        "bundle installed"
    );

    Ok(InstallReport {
        filename: downloaded.filename.clone(),
        single_root: matches!(layout, Layout::SingleRoot(_)),
        stats,
    })
}

fn cleanup(label: &str, dir: TempDir) {
    let path = dir.path().to_path_buf();
    if let Err(err) = dir.close() {
        warn!(?err, dir = %path.display(), "failed to remove temporary {label} folder");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::zip_archive;
    use std::fs;

    #[test]
    fn unpack_removes_both_temporary_folders() {
        let dl = tempfile::Builder::new().prefix("databundle-download-").tempdir().unwrap();
        let path = zip_archive(dl.path(), "bundle.zip", &[("pkg/README.md", "hi")]);
        let dl_dir = dl.path().to_path_buf();
        let downloaded = DownloadedFile::for_test(dl, path);
        let dest = tempfile::tempdir().unwrap();

        let report = unpack_and_merge(downloaded, dest.path(), &CancelFlag::default()).unwrap();

        assert!(report.single_root);
        assert_eq!(fs::read_to_string(dest.path().join("README.md")).unwrap(), "hi");
        assert!(!dl_dir.exists());
    }

    #[test]
    fn unpack_cleans_up_on_failure() {
        let dl = tempfile::tempdir().unwrap();
        let path = dl.path().join("bundle.rar");
        fs::write(&path, b"nope").unwrap();
        let dl_dir = dl.path().to_path_buf();
        let downloaded = DownloadedFile::for_test(dl, path);
        let dest = tempfile::tempdir().unwrap();

        let err = unpack_and_merge(downloaded, dest.path(), &CancelFlag::default()).unwrap_err();

        assert!(matches!(
            err,
            InstallError::Extract(crate::ExtractError::UnsupportedFormat { .. })
        ));
        assert!(!dl_dir.exists());
        assert_eq!(fs::read_dir(dest.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn prepare_wipes_unless_keep() {
        let tmp = tempfile::tempdir().unwrap();
        let dest = tmp.path().join("data");
        fs::create_dir(&dest).unwrap();
        fs::write(dest.join("old.txt"), "old").unwrap();

        prepare_destination(&dest, true).await.unwrap();
        assert!(dest.join("old.txt").exists());

        prepare_destination(&dest, false).await.unwrap();
        assert!(dest.is_dir());
        assert!(!dest.join("old.txt").exists());
    }

    #[test]
    fn cancelled_unpack_leaves_destination_alone_and_cleans_up() {
        let dl = tempfile::tempdir().unwrap();
        let path = zip_archive(dl.path(), "bundle.zip", &[("a.txt", "a"), ("b/c.txt", "c")]);
        let dl_dir = dl.path().to_path_buf();
        let downloaded = DownloadedFile::for_test(dl, path);
        let dest = tempfile::tempdir().unwrap();
        let cancel = CancelFlag::default();
        cancel.cancel();

        let err = unpack_and_merge(downloaded, dest.path(), &cancel).unwrap_err();

        assert!(matches!(
            err,
            InstallError::Extract(crate::ExtractError::Cancelled)
        ));
        assert!(!dl_dir.exists());
        assert_eq!(fs::read_dir(dest.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn prepare_reports_uncheckable_destination() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("plain.txt");
        fs::write(&file, "not a directory").unwrap();
        let dest = file.join("data");

        let err = prepare_destination(&dest, false).await.unwrap_err();

        assert!(matches!(err, InstallError::Io { ref path, .. } if path == &dest));
        assert_eq!(fs::read_to_string(&file).unwrap(), "not a directory");
    }
}
