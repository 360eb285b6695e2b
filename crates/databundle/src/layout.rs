//! Decide whether an extracted archive wraps everything in one folder or is a
//! "tarbomb" with entries directly at its root.

use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::info;

/// Metadata directories added by archivers on some platforms. Skipped everywhere.
pub const PLATFORM_CRUFT: &[&str] = &["__MACOSX"];

pub fn is_cruft(name: &OsStr) -> bool {
    PLATFORM_CRUFT.iter().any(|c| name == OsStr::new(c))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Layout {
    /// Exactly one top-level directory; its contents are the bundle.
    SingleRoot(PathBuf),
    /// Anything else; the extraction root itself is the bundle.
    Flat(PathBuf),
}

impl Layout {
    pub fn bundle_root(&self) -> &Path {
        match self {
            Layout::SingleRoot(p) | Layout::Flat(p) => p,
        }
    }
}

/// Only the top level is inspected; nested wrapping folders are left alone.
pub fn classify(extraction_root: &Path) -> io::Result<Layout> {
    let mut entries = vec![];
    for entry in fs::read_dir(extraction_root)? {
        let entry = entry?;
        if is_cruft(&entry.file_name()) {
            continue;
        }
        entries.push((entry.path(), entry.file_type()?.is_dir()));
    }

    let layout = match entries.as_slice() {
        [(path, true)] => Layout::SingleRoot(path.clone()),
        _ => Layout::Flat(extraction_root.to_path_buf()),
    };

    match &layout {
        Layout::SingleRoot(p) => info!(root = %p.display(), "archive has a single root folder, installing its contents"),
        Layout::Flat(_) => info!(entries = entries.len(), "archive has no single root folder, installing as-is"),
    }
    Ok(layout)
}
