use std::future::Future;
use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use reqwest::Client;
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::core::error::{LauncherError, LauncherResult};

/// Cancellable HTTP downloader shared by every pipeline stage.
#[derive(Debug, Clone)]
pub struct Downloader {
    client: Client,
    cancel: CancellationToken,
}

impl Downloader {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Fetch the whole body into memory. Non-success statuses are errors.
    pub async fn fetch_bytes(&self, url: &str) -> LauncherResult<Vec<u8>> {
        let response = self.get_ok(url).await?;
        let bytes = cancellable(&self.cancel, async {
            Ok::<_, LauncherError>(response.bytes().await?.to_vec())
        })
        .await?;
        debug!("Fetched {} bytes from {}", bytes.len(), url);
        Ok(bytes)
    }

    /// Fetch a small text document, returning `None` on any failure.
    pub async fn fetch_text_lenient(&self, url: &str) -> Option<String> {
        let response = self.get_ok(url).await.ok()?;
        cancellable(&self.cancel, async { Ok::<_, LauncherError>(response.text().await?) })
            .await
            .ok()
    }

    // ── Single file download ────────────────────────────

    /// Stream `url` into `dest`, optionally validating SHA-256.
    ///
    /// The body is written to a sibling `.part` file and renamed into place
    /// once complete, so `dest` never holds a partial download.
    pub async fn download_file(
        &self,
        url: &str,
        dest: &Path,
        sha256_expected: Option<&str>,
    ) -> LauncherResult<()> {
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(LauncherError::io(parent))?;
        }

        let response = self.get_ok(url).await?;
        let partial = partial_path(dest);

        let result = cancellable(&self.cancel, async {
            let mut hasher = Sha256::new();
            // Write inside a block so the handle is dropped before the rename.
            {
                let mut file = tokio::fs::File::create(&partial)
                    .await
                    .map_err(LauncherError::io(&partial))?;
                let mut stream = response.bytes_stream();
                while let Some(chunk) = stream.next().await {
                    let chunk = chunk?;
                    hasher.update(&chunk);
                    file.write_all(&chunk)
                        .await
                        .map_err(LauncherError::io(&partial))?;
                }
                file.flush().await.map_err(LauncherError::io(&partial))?;
            }

            if let Some(expected) = sha256_expected {
                let actual = hex::encode(hasher.finalize());
                if !actual.eq_ignore_ascii_case(expected.trim()) {
                    return Err(LauncherError::ChecksumMismatch {
                        url: url.to_string(),
                        expected: expected.trim().to_string(),
                        actual,
                    });
                }
            }

            tokio::fs::rename(&partial, dest)
                .await
                .map_err(LauncherError::io(dest))
        })
        .await;

        if result.is_err() {
            let _ = tokio::fs::remove_file(&partial).await;
        }
        result?;

        debug!("Downloaded: {} -> {:?}", url, dest);
        Ok(())
    }

    async fn get_ok(&self, url: &str) -> LauncherResult<reqwest::Response> {
        let response = cancellable(&self.cancel, async {
            Ok::<_, LauncherError>(self.client.get(url).send().await?)
        })
        .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(LauncherError::DownloadFailed {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response)
    }
}

/// Race `fut` against the token; cancellation wins ties.
pub async fn cancellable<T, F>(cancel: &CancellationToken, fut: F) -> LauncherResult<T>
where
    F: Future<Output = LauncherResult<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(LauncherError::Cancelled),
        result = fut => result,
    }
}

fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    dest.with_file_name(name)
}
