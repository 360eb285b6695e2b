//! Download a bundle from the first mirror that serves it.

use std::path::PathBuf;

use reqwest::header::{ACCEPT_ENCODING, CONTENT_LENGTH};
use tempfile::TempDir;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, warn};
use url::Url;

use crate::config::FetchConfig;
use crate::error::{AggregateDownloadError, MirrorError, MirrorFailure};
use crate::filename;
use crate::mirrors::MirrorList;

/// A downloaded file living in its own temporary directory.
///
/// Dropping it removes the directory; [`DownloadedFile::close`] does the same but
/// reports failures.
#[derive(Debug)]
pub struct DownloadedFile {
    dir: TempDir,
    pub path: PathBuf,
    pub filename: String,
}

impl DownloadedFile {
    pub fn close(self) -> std::io::Result<()> {
        self.dir.close()
    }

    #[cfg(test)]
    pub(crate) fn for_test(dir: TempDir, path: PathBuf) -> Self {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            dir,
            path,
            filename,
        }
    }
}

pub struct Fetcher {
    client: reqwest::Client,
    config: FetchConfig,
}

impl Fetcher {
    pub fn new(config: FetchConfig) -> reqwest::Result<Self> {
        let mut builder = reqwest::Client::builder().user_agent(config.user_agent.clone());
        if let Some(t) = config.connect_timeout {
            builder = builder.connect_timeout(t);
        }
        Ok(Self {
            client: builder.build()?,
            config,
        })
    }

    /// Try each mirror in order and return the first successful download.
    ///
    /// Mirror failures are logged and collected; only when every mirror has failed
    /// does this return an error, carrying all of them.
    pub async fn fetch(&self, urls: &MirrorList) -> Result<DownloadedFile, AggregateDownloadError> {
        let mut failures = vec![];

        for url in urls.iter() {
            info!(%url, "trying url");
            match self.fetch_one(url).await {
                Ok(file) => return Ok(file),
                Err(error) => {
                    warn!(%url, %error, "link download error, trying next mirror");
                    failures.push(MirrorFailure {
                        url: url.to_string(),
                        error,
                    });
                }
            }
        }

        Err(AggregateDownloadError { failures })
    }

    async fn fetch_one(&self, url: &str) -> Result<DownloadedFile, MirrorError> {
        let url = Url::parse(url)?;
        let mut resp = self.get_with_retry(&url).await?;

        let filename = filename::resolve(resp.headers(), &url)?;
        if let Some(len) = resp.headers().get(CONTENT_LENGTH) {
            debug!(content_length = ?len, "response size");
        }

        let dir = tempfile::Builder::new()
            .prefix("databundle-download-")
            .tempdir()
            .map_err(|source| MirrorError::Io {
                path: std::env::temp_dir(),
                source,
            })?;
        let path = dir.path().join(&filename);
        let io_err = |source| MirrorError::Io {
            path: path.clone(),
            source,
        };

        info!(%filename, "downloading");
        let file = tokio::fs::File::create(&path).await.map_err(io_err)?;
        let mut out = BufWriter::with_capacity(self.config.chunk_size, file);
        while let Some(chunk) = resp.chunk().await? {
            out.write_all(&chunk).await.map_err(io_err)?;
        }
        out.flush().await.map_err(io_err)?;

        Ok(DownloadedFile {
            dir,
            path,
            filename,
        })
    }

    /// GET with bounded retries on transient failures (configured 5xx statuses,
    /// connect errors, timeouts). Non-retryable statuses fail immediately.
    async fn get_with_retry(&self, url: &Url) -> Result<reqwest::Response, MirrorError> {
        let policy = &self.config.retry;
        let max_attempts = policy.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            let sent = self
                .client
                .get(url.clone())
                .header(ACCEPT_ENCODING, "identity")
                .send()
                .await;

            let retry_reason = match sent {
                Ok(resp) if policy.is_retryable(resp.status()) => {
                    if attempt >= max_attempts {
                        return Err(MirrorError::RetriesExhausted {
                            status: resp.status(),
                            attempts: attempt,
                        });
                    }
                    resp.status().to_string()
                }
                Ok(resp) => return Ok(resp.error_for_status()?),
                Err(err) if (err.is_connect() || err.is_timeout()) && attempt < max_attempts => {
                    err.to_string()
                }
                Err(err) => return Err(err.into()),
            };

            let delay = policy.backoff(attempt);
            warn!(%url, attempt, reason = %retry_reason, ?delay, "transient failure, retrying");
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}
