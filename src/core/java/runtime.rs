use std::path::{Component, Path, PathBuf};

use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::core::downloader::Downloader;
use crate::core::error::{LauncherError, LauncherResult};

pub const CORRETTO_BASE_URL: &str = "https://corretto.aws/downloads";

fn java_exe() -> &'static str {
    if cfg!(windows) {
        "java.exe"
    } else {
        "java"
    }
}

/// Locate an extracted `jdk<version>*` directory directly under `base_dir`.
pub fn find_jdk_dir(base_dir: &Path, version: &str) -> Option<PathBuf> {
    let prefix = format!("jdk{}", version);
    let mut matches: Vec<PathBuf> = std::fs::read_dir(base_dir)
        .ok()?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|name| name.starts_with(&prefix))
        })
        .collect();
    matches.sort();
    matches.pop()
}

fn jdk_binary(jdk_dir: &Path) -> PathBuf {
    jdk_dir.join("bin").join(java_exe())
}

/// Resolve the Java executable used to run the installer and the server.
///
/// Order: explicit `configured` path or command, a bundled `jdk<version>*`
/// directory in `base_dir`, then `java` on `PATH`.
pub fn find_java_binary(
    base_dir: &Path,
    version: &str,
    configured: Option<&str>,
) -> LauncherResult<PathBuf> {
    if let Some(configured) = configured.map(str::trim).filter(|c| !c.is_empty()) {
        let candidate = PathBuf::from(configured);
        if candidate.is_file() {
            return Ok(candidate);
        }
        return which::which(configured).map_err(|_| {
            LauncherError::MissingDependency(format!(
                "configured Java {:?} could not be found",
                configured
            ))
        });
    }

    if let Some(jdk_dir) = find_jdk_dir(base_dir, version) {
        let bundled = jdk_binary(&jdk_dir);
        if bundled.is_file() {
            return Ok(bundled);
        }
        debug!("Ignoring {:?}: no {} inside", jdk_dir, java_exe());
    }

    which::which("java").map_err(|_| {
        LauncherError::MissingDependency(
            "Could not find Java. Is Java installed on the system?".into(),
        )
    })
}

/// Whether this platform installs a private JDK next to the client.
pub fn uses_bundled_runtime() -> bool {
    cfg!(windows)
}

/// Downloads and unpacks Amazon Corretto builds.
#[derive(Debug, Clone)]
pub struct RuntimeInstaller {
    base_url: String,
}

impl Default for RuntimeInstaller {
    fn default() -> Self {
        Self::new(CORRETTO_BASE_URL)
    }
}

impl RuntimeInstaller {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn archive_name(version: &str) -> String {
        format!("amazon-corretto-{}-x64-windows-jdk.zip", version)
    }

    pub fn archive_url(&self, version: &str) -> String {
        format!("{}/latest/{}", self.base_url, Self::archive_name(version))
    }

    pub fn checksum_url(&self, version: &str) -> String {
        format!("{}/latest_sha256/{}", self.base_url, Self::archive_name(version))
    }

    /// Ensure a JDK for `version` exists under `base_dir`; returns its directory.
    ///
    /// A directory that already holds a Java binary is left alone. Any other
    /// `jdk<version>*` directory is replaced by the freshly extracted build.
    #[instrument(skip(self, downloader))]
    pub async fn install(
        &self,
        downloader: &Downloader,
        base_dir: &Path,
        version: &str,
    ) -> LauncherResult<PathBuf> {
        if let Some(existing) = find_jdk_dir(base_dir, version) {
            if jdk_binary(&existing).is_file() {
                info!("Java {} already present at {:?}", version, existing);
                return Ok(existing);
            }
        }

        let staging_id = Uuid::new_v4().to_string();
        let zip_path = base_dir.join(format!(".{}-jdk.zip", staging_id));
        let expected = downloader
            .fetch_text_lenient(&self.checksum_url(version))
            .await
            .and_then(|text| text.split_whitespace().next().map(str::to_string))
            .filter(|hash| hash.len() == 64 && hash.chars().all(|c| c.is_ascii_hexdigit()));
        if expected.is_none() {
            warn!("No checksum published for Java {}, skipping verification", version);
        }

        info!("Downloading Java {} ...", version);
        downloader
            .download_file(&self.archive_url(version), &zip_path, expected.as_deref())
            .await?;

        info!("Extracting...");
        let extract_zip = zip_path.clone();
        let extract_root = base_dir.to_path_buf();
        let extracted = tokio::task::spawn_blocking(move || {
            extract_zip_file(&extract_zip, &extract_root)
        })
        .await
        .map_err(|e| LauncherError::Other(format!("extraction task failed: {}", e)))?;
        let _ = tokio::fs::remove_file(&zip_path).await;
        let top_level = extracted?;

        remove_other_builds(base_dir, version, &top_level);

        let jdk_dir = base_dir.join(&top_level);
        info!("Java {} installed at {:?}", version, jdk_dir);
        Ok(jdk_dir)
    }
}

fn remove_other_builds(base_dir: &Path, version: &str, keep: &Path) {
    let prefix = format!("jdk{}", version);
    let Ok(entries) = std::fs::read_dir(base_dir) else {
        return;
    };
    for path in entries.filter_map(Result::ok).map(|e| e.path()) {
        let is_other_build = path.is_dir()
            && path.file_name() != Some(keep.as_os_str())
            && path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|name| name.starts_with(&prefix));
        if is_other_build {
            info!("Removing old JDK {:?}", path);
            if let Err(err) = std::fs::remove_dir_all(&path) {
                warn!("Could not remove {:?}: {}", path, err);
            }
        }
    }
}

/// Extract `zip_path` into `dest`, returning the archive's top-level directory.
fn extract_zip_file(zip_path: &Path, dest: &Path) -> LauncherResult<PathBuf> {
    let file = std::fs::File::open(zip_path).map_err(LauncherError::io(zip_path))?;
    let mut archive = zip::ZipArchive::new(file)?;
    let mut top_level: Option<PathBuf> = None;

    for index in 0..archive.len() {
        let mut zipped = archive.by_index(index)?;
        let enclosed_name = zipped
            .enclosed_name()
            .ok_or_else(|| LauncherError::Other("Invalid zip entry path".into()))?;

        let mut rel_path = PathBuf::new();
        for component in enclosed_name.components() {
            if let Component::Normal(part) = component {
                rel_path.push(part);
            }
        }
        let Some(Component::Normal(first)) = rel_path.components().next() else {
            continue;
        };
        top_level.get_or_insert_with(|| PathBuf::from(first));

        let out_path = dest.join(&rel_path);
        if zipped.is_dir() {
            std::fs::create_dir_all(&out_path).map_err(LauncherError::io(&out_path))?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent).map_err(LauncherError::io(parent))?;
        }
        let mut out = std::fs::File::create(&out_path).map_err(LauncherError::io(&out_path))?;
        std::io::copy(&mut zipped, &mut out).map_err(LauncherError::io(&out_path))?;
    }

    top_level.ok_or_else(|| LauncherError::Other("Java archive is empty".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn jdk_zip(top: &str) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
        let options = zip::write::SimpleFileOptions::default();
        writer
            .add_directory(format!("{}/bin/", top), options)
            .unwrap();
        writer
            .start_file(format!("{}/bin/{}", top, java_exe()), options)
            .unwrap();
        writer.write_all(b"#!/bin/sh\n").unwrap();
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn find_jdk_dir_matches_version_prefix() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("jdk17.0.9_9")).unwrap();
        std::fs::create_dir(dir.path().join("jdk21.0.1_12")).unwrap();
        std::fs::write(dir.path().join("jdk17.txt"), "").unwrap();

        assert_eq!(
            find_jdk_dir(dir.path(), "17"),
            Some(dir.path().join("jdk17.0.9_9"))
        );
        assert_eq!(find_jdk_dir(dir.path(), "8"), None);
    }

    #[test]
    fn configured_java_file_wins() {
        let dir = tempfile::tempdir().unwrap();
        let java = dir.path().join("my-java");
        std::fs::write(&java, "").unwrap();

        let resolved = find_java_binary(dir.path(), "17", Some(java.to_str().unwrap())).unwrap();
        assert_eq!(resolved, java);
    }

    #[test]
    fn unknown_configured_java_is_missing_dependency() {
        let dir = tempfile::tempdir().unwrap();
        let err = find_java_binary(dir.path(), "17", Some("definitely-not-a-java-binary-xyz"))
            .unwrap_err();
        assert!(matches!(err, LauncherError::MissingDependency(_)));
    }

    #[test]
    fn bundled_jdk_is_used_when_present() {
        let dir = tempfile::tempdir().unwrap();
        let bin = dir.path().join("jdk17.0.9_9").join("bin");
        std::fs::create_dir_all(&bin).unwrap();
        std::fs::write(bin.join(java_exe()), "").unwrap();

        let resolved = find_java_binary(dir.path(), "17", None).unwrap();
        assert_eq!(resolved, bin.join(java_exe()));
    }

    #[tokio::test]
    async fn install_extracts_and_replaces_broken_build() {
        let server = MockServer::start().await;
        let archive = jdk_zip("jdk17.0.10_7");
        let sha = hex::encode(<sha2::Sha256 as sha2::Digest>::digest(&archive));
        Mock::given(method("GET"))
            .and(path("/latest/amazon-corretto-17-x64-windows-jdk.zip"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(archive))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/latest_sha256/amazon-corretto-17-x64-windows-jdk.zip"))
            .respond_with(ResponseTemplate::new(200).set_body_string(format!("{}\n", sha)))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("jdk17.0.9_9")).unwrap();

        let downloader = Downloader::new(reqwest::Client::new());
        let installed = RuntimeInstaller::new(server.uri())
            .install(&downloader, dir.path(), "17")
            .await
            .unwrap();

        assert_eq!(installed, dir.path().join("jdk17.0.10_7"));
        assert!(jdk_binary(&installed).is_file());
        assert!(!dir.path().join("jdk17.0.9_9").exists());
        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.path().is_file())
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn install_is_noop_when_runtime_present() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let bin = dir.path().join("jdk17.0.9_9").join("bin");
        std::fs::create_dir_all(&bin).unwrap();
        std::fs::write(bin.join(java_exe()), "").unwrap();

        let downloader = Downloader::new(reqwest::Client::new());
        let installed = RuntimeInstaller::new(server.uri())
            .install(&downloader, dir.path(), "17")
            .await
            .unwrap();
        assert_eq!(installed, dir.path().join("jdk17.0.9_9"));
    }

    #[tokio::test]
    async fn failed_download_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let downloader = Downloader::new(reqwest::Client::new());
        let err = RuntimeInstaller::new(server.uri())
            .install(&downloader, dir.path(), "17")
            .await
            .unwrap_err();
        assert!(matches!(err, LauncherError::DownloadFailed { status: 404, .. }));
    }
}
