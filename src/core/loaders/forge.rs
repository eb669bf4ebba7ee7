use std::path::{Path, PathBuf};

use tracing::{info, instrument, warn};

use super::context::InstallContext;
use crate::core::error::{LauncherError, LauncherResult};

pub const FORGE_MAVEN: &str = "https://maven.minecraftforge.net";
const INSTALLER_FILE: &str = "forge_install.jar";

/// `1.19.4-45.3.15` from either the token itself or an installer URL
/// (`…/forge-1.19.4-45.3.15-installer.jar`).
pub fn forge_version_token(distribution: &str) -> String {
    let last = distribution
        .trim()
        .rsplit('/')
        .next()
        .unwrap_or_default();
    let last = last.strip_prefix("forge-").unwrap_or(last);
    last.strip_suffix("-installer.jar")
        .unwrap_or(last)
        .to_string()
}

/// `libraries/net/minecraftforge/forge/<token>` inside the server folder.
pub fn forge_library_dir(server_dir: &Path, token: &str) -> PathBuf {
    server_dir
        .join("libraries")
        .join("net")
        .join("minecraftforge")
        .join("forge")
        .join(token)
}

/// True iff the library folder for the resolved Forge version exists.
pub fn is_correct_version_installed(server_dir: &Path, distribution: &str) -> bool {
    forge_library_dir(server_dir, &forge_version_token(distribution)).is_dir()
}

/// Installs a Forge server by running the official installer JAR.
#[derive(Debug, Clone)]
pub struct ForgeInstaller {
    maven_base: String,
}

impl Default for ForgeInstaller {
    fn default() -> Self {
        Self::new(FORGE_MAVEN)
    }
}

impl ForgeInstaller {
    pub fn new(maven_base: impl Into<String>) -> Self {
        Self {
            maven_base: maven_base.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn installer_url(&self, distribution: &str) -> String {
        let distribution = distribution.trim();
        if distribution.starts_with("http://") || distribution.starts_with("https://") {
            return distribution.to_string();
        }
        format!(
            "{}/net/minecraftforge/forge/{id}/forge-{id}-installer.jar",
            self.maven_base,
            id = distribution
        )
    }

    /// Download the installer, run `--installServer` and delete the JAR.
    ///
    /// The installer's exit status is only logged; callers re-check
    /// [`is_correct_version_installed`] afterwards.
    #[instrument(skip(self, ctx), fields(server_dir = ?ctx.server_dir))]
    pub async fn install_server(&self, ctx: InstallContext<'_>) -> LauncherResult<()> {
        let token = forge_version_token(ctx.distribution);
        let url = self.installer_url(ctx.distribution);
        info!("Downloading Forge {} ...", token);

        tokio::fs::create_dir_all(ctx.server_dir)
            .await
            .map_err(LauncherError::io(ctx.server_dir))?;
        let installer_path = ctx.server_dir.join(INSTALLER_FILE);
        ctx.downloader
            .download_file(&url, &installer_path, None)
            .await?;

        info!("Installing Forge {} ...", token);
        let status = tokio::process::Command::new(ctx.java_bin)
            .arg("-jar")
            .arg(&installer_path)
            .arg("--installServer")
            .arg(ctx.server_dir)
            .current_dir(ctx.server_dir)
            .status()
            .await;

        if let Err(err) = tokio::fs::remove_file(&installer_path).await {
            warn!("Could not remove {:?}: {}", installer_path, err);
        }

        match status {
            Ok(status) if status.success() => {
                info!("Forge installer finished");
                Ok(())
            }
            Ok(status) => {
                warn!("Forge installer exited with {:?}", status.code());
                Ok(())
            }
            Err(err) => Err(LauncherError::JavaExecution(err.to_string())),
        }
    }
}
