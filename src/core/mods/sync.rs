// ─── Mod Synchronizer ───
// Keeps exactly one randomizer mod JAR in the server's mods folder, the one
// the dependency manifest points at.

use std::path::{Path, PathBuf};

use tracing::{info, instrument};

use crate::core::downloader::Downloader;
use crate::core::error::{LauncherError, LauncherResult};

/// File naming convention of the mod binary (`<prefix>*<suffix>`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModNaming {
    prefix: String,
    suffix: String,
}

impl ModNaming {
    pub fn new(prefix: impl Into<String>, suffix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            suffix: suffix.into(),
        }
    }

    pub fn matches(&self, file_name: &str) -> bool {
        file_name.len() >= self.prefix.len() + self.suffix.len()
            && file_name.starts_with(&self.prefix)
            && file_name.ends_with(&self.suffix)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The target file was already the installed mod.
    UpToDate(PathBuf),
    /// The target was downloaded and these stale files were removed.
    Replaced {
        installed: PathBuf,
        removed: Vec<PathBuf>,
    },
}

pub struct ModSynchronizer<'a> {
    downloader: &'a Downloader,
    naming: &'a ModNaming,
}

impl<'a> ModSynchronizer<'a> {
    pub fn new(downloader: &'a Downloader, naming: &'a ModNaming) -> Self {
        Self { downloader, naming }
    }

    /// Mod files currently present, sorted by name. Creates `mods_dir`.
    pub fn installed(&self, mods_dir: &Path) -> LauncherResult<Vec<PathBuf>> {
        std::fs::create_dir_all(mods_dir).map_err(LauncherError::io(mods_dir))?;

        let mut found = Vec::new();
        for entry in std::fs::read_dir(mods_dir).map_err(LauncherError::io(mods_dir))? {
            let path = entry.map_err(LauncherError::io(mods_dir))?.path();
            let name_matches = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| self.naming.matches(n));
            if name_matches && path.is_file() {
                found.push(path);
            }
        }
        found.sort();
        Ok(found)
    }

    /// True when the only installed mod file is the one `target_url` names.
    pub fn is_current(&self, mods_dir: &Path, target_url: &str) -> LauncherResult<bool> {
        let target = target_file_name(target_url)?;
        let installed = self.installed(mods_dir)?;
        Ok(installed.len() == 1 && installed[0].file_name() == Some(std::ffi::OsStr::new(&target)))
    }

    /// Make `target_url`'s file the single installed mod.
    ///
    /// The new file is fully written before any old one is removed; a failed
    /// download leaves the folder as it was.
    #[instrument(skip(self))]
    pub async fn reconcile(
        &self,
        mods_dir: &Path,
        target_url: &str,
    ) -> LauncherResult<SyncOutcome> {
        let target_name = target_file_name(target_url)?;
        let target = mods_dir.join(&target_name);
        let installed = self.installed(mods_dir)?;

        let stale: Vec<PathBuf> = installed.into_iter().filter(|p| *p != target).collect();
        if target.is_file() && stale.is_empty() {
            info!("Mod {} is up to date", target_name);
            return Ok(SyncOutcome::UpToDate(target));
        }

        if !target.is_file() {
            info!("Downloading mod {} ...", target_name);
            self.downloader.download_file(target_url, &target, None).await?;
        }

        for old in &stale {
            std::fs::remove_file(old).map_err(LauncherError::io(old))?;
            info!(
                "Removed old mod {}",
                old.file_name().unwrap_or_default().to_string_lossy()
            );
        }
        info!("Installed mod {}", target_name);

        Ok(SyncOutcome::Replaced {
            installed: target,
            removed: stale,
        })
    }
}

/// Last path segment of a download URL, without query or fragment.
fn target_file_name(url: &str) -> LauncherResult<String> {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    path.rsplit('/')
        .next()
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .ok_or_else(|| LauncherError::Other(format!("Mod URL has no file name: {}", url)))
}
