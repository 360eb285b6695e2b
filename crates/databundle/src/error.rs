use std::io;
use std::path::PathBuf;
use std::time::Duration;

use reqwest::StatusCode;

/// Failure of a single mirror. Recorded by the fetcher, never fatal on its own.
#[derive(Debug, thiserror::Error)]
pub enum MirrorError {
    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("server answered {status} on all {attempts} attempts")]
    RetriesExhausted { status: StatusCode, attempts: u32 },

    #[error("unable to determine target filename for url: {url}")]
    AmbiguousFilename { url: String },

    #[error("failed to write {}: {source}", .path.display())]
    Io { path: PathBuf, source: io::Error },
}

#[derive(Debug)]
pub struct MirrorFailure {
    pub url: String,
    pub error: MirrorError,
}

/// Every mirror failed. Failures are kept in the order the mirrors were tried.
#[derive(Debug, thiserror::Error)]
#[error("download failed on every mirror{}", summarize(.failures))]
pub struct AggregateDownloadError {
    pub failures: Vec<MirrorFailure>,
}

fn summarize(failures: &[MirrorFailure]) -> String {
    if failures.is_empty() {
        return " (no mirrors given)".to_string();
    }
    failures
        .iter()
        .map(|f| format!("\n  - {}: {}", f.url, f.error))
        .collect()
}

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("the file {} is of an unsupported archive format (expected .zip, .tar.gz or .tgz)", .path.display())]
    UnsupportedFormat { path: PathBuf },

    #[error("archive {} is corrupted, please try downloading again: {source}", .path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("archive entry is unsafe: {entry}")]
    UnsafeEntry { entry: String },

    #[error("failed to write {}: {source}", .path.display())]
    Io { path: PathBuf, source: io::Error },

    #[error("extraction cancelled")]
    Cancelled,
}

#[derive(Debug, thiserror::Error)]
pub enum InstallError {
    #[error(transparent)]
    Download(#[from] AggregateDownloadError),

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error("destination {} exists but is not a {expected}", .path.display())]
    DestinationConflict {
        path: PathBuf,
        expected: &'static str,
    },

    #[error("i/o error on {}: {source}", .path.display())]
    Io { path: PathBuf, source: io::Error },

    #[error("install did not finish within {0:?}")]
    TimedOut(Duration),

    #[error("install cancelled")]
    Cancelled,

    #[error("failed to build http client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("install task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl InstallError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogueError {
    #[error("failed to read catalogue {}: {source}", .path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("failed to parse catalogue: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("unknown dataset '{name}' (known: {})", .known.join(", "))]
    UnknownDataset { name: String, known: Vec<String> },
}
