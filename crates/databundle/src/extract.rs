//! Archive extraction for `.zip` and `.tar.gz` / `.tgz` bundles.
//!
//! Entries are sanitised before anything is written: absolute paths, `..` and
//! link entries are rejected so an untrusted archive cannot write outside `dest_dir`.

use std::ffi::OsStr;
use std::fs::{self, File};
use std::io::{self, BufReader, Read, Write};
use std::path::{Component, Path, PathBuf};

use tracing::{error, info};

use crate::cancel::CancelFlag;
use crate::error::ExtractError;

type ExtractFn = fn(&Path, &Path, &CancelFlag) -> Result<(), ExtractError>;

pub struct ArchiveFormat {
    pub suffix: &'static str,
    extract: ExtractFn,
}

/// Checked in order; the first case-insensitive suffix match wins.
pub const FORMATS: &[ArchiveFormat] = &[
    ArchiveFormat {
        suffix: ".zip",
        extract: extract_zip,
    },
    ArchiveFormat {
        suffix: ".tar.gz",
        extract: extract_tar_gz,
    },
    ArchiveFormat {
        suffix: ".tgz",
        extract: extract_tar_gz,
    },
];

pub fn detect_format(archive: &Path) -> Option<&'static ArchiveFormat> {
    let name = archive.file_name()?.to_string_lossy().to_lowercase();
    FORMATS.iter().find(|f| name.ends_with(f.suffix))
}

/// Extract `archive` into `dest_dir`.
///
/// The format is checked before `dest_dir` is touched, so an unsupported file
/// leaves it as it was.
pub fn extract(archive: &Path, dest_dir: &Path) -> Result<(), ExtractError> {
    extract_with_cancel(archive, dest_dir, &CancelFlag::default())
}

/// Like [`extract`], but stops with [`ExtractError::Cancelled`] before the next
/// entry once `cancel` is set.
pub fn extract_with_cancel(
    archive: &Path,
    dest_dir: &Path,
    cancel: &CancelFlag,
) -> Result<(), ExtractError> {
    let format = detect_format(archive).ok_or_else(|| ExtractError::UnsupportedFormat {
        path: archive.to_path_buf(),
    })?;

    info!(dest = %dest_dir.display(), format = format.suffix, "unzip data");

    let res = (format.extract)(archive, dest_dir, cancel);
    if let Err(ExtractError::Corrupt { .. }) = &res {
        error!(archive = %archive.display(), "archive is corrupted, please try downloading again");
    }
    res
}

fn corrupt(archive: &Path, source: impl Into<io::Error>) -> ExtractError {
    ExtractError::Corrupt {
        path: archive.to_path_buf(),
        source: source.into(),
    }
}

fn write_err(path: &Path, source: io::Error) -> ExtractError {
    ExtractError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn check_cancel(cancel: &CancelFlag) -> Result<(), ExtractError> {
    if cancel.is_cancelled() {
        return Err(ExtractError::Cancelled);
    }
    Ok(())
}

fn create_parent(out_path: &Path) -> Result<(), ExtractError> {
    if let Some(parent) = out_path.parent() {
        fs::create_dir_all(parent).map_err(|e| write_err(parent, e))?;
    }
    Ok(())
}

fn write_entry(entry: &mut impl Read, out_path: &Path, archive: &Path) -> Result<(), ExtractError> {
    create_parent(out_path)?;
    let mut out = File::create(out_path).map_err(|e| write_err(out_path, e))?;
    copy_entry(entry, &mut out, out_path, archive)
}

/// `io::copy` that keeps read failures (bad archive data) apart from write
/// failures (local disk problems).
fn copy_entry(
    reader: &mut impl Read,
    writer: &mut impl Write,
    out_path: &Path,
    archive: &Path,
) -> Result<(), ExtractError> {
    let mut buf = [0u8; 8 * 1024];
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(corrupt(archive, e)),
        };
        writer
            .write_all(&buf[..n])
            .map_err(|e| write_err(out_path, e))?;
    }
    writer.flush().map_err(|e| write_err(out_path, e))
}

fn extract_zip(archive: &Path, dest_dir: &Path, cancel: &CancelFlag) -> Result<(), ExtractError> {
    let file = File::open(archive).map_err(|e| corrupt(archive, e))?;
    let mut zip = zip::ZipArchive::new(BufReader::new(file)).map_err(|e| corrupt(archive, e))?;

    for i in 0..zip.len() {
        check_cancel(cancel)?;
        let mut entry = zip.by_index(i).map_err(|e| corrupt(archive, e))?;
        let name = entry.name().to_string();
        let Some(rel) = sanitize_entry_path(Path::new(&name), &name)? else {
            continue;
        };

        if let Some(mode) = entry.unix_mode() {
            if mode & 0o170000 == 0o120000 {
                return Err(ExtractError::UnsafeEntry {
                    entry: format!("{name} (symlink)"),
                });
            }
        }

        let out_path = dest_dir.join(&rel);
        if entry.is_dir() {
            fs::create_dir_all(&out_path).map_err(|e| write_err(&out_path, e))?;
            continue;
        }

        write_entry(&mut entry, &out_path, archive)?;
    }

    Ok(())
}

fn extract_tar_gz(archive: &Path, dest_dir: &Path, cancel: &CancelFlag) -> Result<(), ExtractError> {
    let file = File::open(archive).map_err(|e| corrupt(archive, e))?;
    let gz = flate2::read::GzDecoder::new(BufReader::new(file));
    let mut tar = tar::Archive::new(gz);

    for entry in tar.entries().map_err(|e| corrupt(archive, e))? {
        check_cancel(cancel)?;
        let mut entry = entry.map_err(|e| corrupt(archive, e))?;
        let path = entry.path().map_err(|e| corrupt(archive, e))?.to_path_buf();
        let display = path.display().to_string();
        let Some(rel) = sanitize_entry_path(&path, &display)? else {
            continue;
        };

        let ty = entry.header().entry_type();
        if ty.is_symlink() || ty.is_hard_link() {
            return Err(ExtractError::UnsafeEntry {
                entry: format!("{display} (link)"),
            });
        }

        let out_path = dest_dir.join(&rel);
        if ty.is_dir() {
            fs::create_dir_all(&out_path).map_err(|e| write_err(&out_path, e))?;
            continue;
        }
        if !ty.is_file() {
            // pax headers, fifos, devices
            continue;
        }

        write_entry(&mut entry, &out_path, archive)?;
    }

    Ok(())
}

/// Relative, traversal-free form of an entry path. `Ok(None)` for entries that
/// reduce to nothing (e.g. `./`).
fn sanitize_entry_path(p: &Path, raw: &str) -> Result<Option<PathBuf>, ExtractError> {
    let mut out = PathBuf::new();
    for c in p.components() {
        match c {
            Component::Prefix(_) | Component::RootDir | Component::ParentDir => {
                return Err(ExtractError::UnsafeEntry {
                    entry: raw.to_string(),
                })
            }
            Component::CurDir => {}
            Component::Normal(seg) => {
                if seg == OsStr::new("") {
                    continue;
                }
                out.push(seg);
            }
        }
    }
    Ok((!out.as_os_str().is_empty()).then_some(out))
}
