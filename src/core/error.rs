use std::path::PathBuf;
use thiserror::Error;

/// Central error type for the whole client.
/// Every module returns `Result<T, LauncherError>`.
#[derive(Debug, Error)]
pub enum LauncherError {
    // ── IO ──────────────────────────────────────────────
    #[error("IO error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    // ── Network ─────────────────────────────────────────
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Download failed for {url}: HTTP {status}")]
    DownloadFailed { url: String, status: u16 },

    #[error("SHA-256 mismatch for {url}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        url: String,
        expected: String,
        actual: String,
    },

    // ── Patch container ─────────────────────────────────
    #[error("Patch file missing: {0}")]
    MissingPatch(String),

    #[error("Malformed patch container {path:?}: {reason}")]
    Format { path: PathBuf, reason: String },

    // ── Dependency manifest ─────────────────────────────
    #[error("{0}")]
    NoCompatibleVersion(String),

    #[error("Missing dependency: {0}")]
    MissingDependency(String),

    // ── Server configuration ────────────────────────────
    #[error(
        "Max heap size {0:?} in incorrect format. Use a number followed by M or G, e.g. 512M or 2G."
    )]
    InvalidHeapSize(String),

    #[error("Server arguments file not found at {0:?}")]
    MissingArgsFile(PathBuf),

    // ── Supervision ─────────────────────────────────────
    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Java execution failed: {0}")]
    JavaExecution(String),

    // ── JSON ────────────────────────────────────────────
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ── Archive ─────────────────────────────────────────
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    // ── Generic ─────────────────────────────────────────
    #[error("{0}")]
    Other(String),
}

/// Convenience alias used throughout the crate.
pub type LauncherResult<T> = Result<T, LauncherError>;

impl From<std::io::Error> for LauncherError {
    fn from(source: std::io::Error) -> Self {
        LauncherError::Io {
            path: PathBuf::new(),
            source,
        }
    }
}

impl LauncherError {
    /// Process exit status reported for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            LauncherError::Cancelled => 130,
            _ => 1,
        }
    }

    pub fn format(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        LauncherError::Format {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| LauncherError::Io { path, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heap_error_message_suggests_format() {
        let err = LauncherError::InvalidHeapSize("2X".into());
        assert!(err.to_string().contains("512M or 2G"));
    }

    #[test]
    fn io_helper_keeps_path() {
        let err = LauncherError::io("/tmp/x")(std::io::Error::other("boom"));
        assert!(matches!(
            err,
            LauncherError::Io { ref path, .. } if path == &PathBuf::from("/tmp/x")
        ));
    }
}
