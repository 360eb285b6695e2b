use std::fs;
use std::path::Path;

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::cancel::CancelFlag;
use crate::error::InstallError;
use crate::layout::is_cruft;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub dirs_created: usize,
    pub files_written: usize,
    pub files_overwritten: usize,
}

/// Copy the contents of `bundle_root` into `dest`.
///
/// Directories are merged with whatever is already there; files are replaced.
/// The walk is depth-first with entries sorted by name, and platform cruft is
/// skipped at every level. A file where a directory is expected (or the other
/// way round) is an error rather than something to paper over. A symlink in
/// `dest` that points at a directory counts as that directory.
///
/// Stops with [`InstallError::Cancelled`] before the next entry once `cancel` is set.
pub fn merge_into(
    bundle_root: &Path,
    dest: &Path,
    cancel: &CancelFlag,
) -> Result<MergeStats, InstallError> {
    let mut stats = MergeStats::default();

    let walker = WalkDir::new(bundle_root)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_cruft(e.file_name()));

    for entry in walker {
        if cancel.is_cancelled() {
            return Err(InstallError::Cancelled);
        }
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(bundle_root).to_path_buf();
            InstallError::io(path, e.into())
        })?;
        let rel = entry
            .path()
            .strip_prefix(bundle_root)
            .unwrap_or(entry.path());
        let dst = dest.join(rel);
        let existing = fs::symlink_metadata(&dst).ok();

        if entry.file_type().is_dir() {
            match existing {
                Some(_) if dst.is_dir() => debug!("- d- {}", rel.display()),
                Some(_) => {
                    return Err(InstallError::DestinationConflict {
                        path: dst,
                        expected: "directory",
                    })
                }
                None => {
                    debug!("- d+ {}", rel.display());
                    fs::create_dir_all(&dst).map_err(|e| InstallError::io(&dst, e))?;
                    stats.dirs_created += 1;
                }
            }
        } else if entry.file_type().is_file() {
            match existing {
                Some(meta) if meta.is_dir() => {
                    return Err(InstallError::DestinationConflict {
                        path: dst,
                        expected: "file",
                    })
                }
                Some(_) => {
                    debug!("- f! {}", rel.display());
                    warn!(path = %dst.display(), "updating existing file");
                    fs::remove_file(&dst).map_err(|e| InstallError::io(&dst, e))?;
                    stats.files_overwritten += 1;
                }
                None => debug!("- f+ {}", rel.display()),
            }
            fs::copy(entry.path(), &dst).map_err(|e| InstallError::io(&dst, e))?;
            stats.files_written += 1;
        }
    }

    Ok(stats)
}
