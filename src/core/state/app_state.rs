use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::core::downloader::Downloader;
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::http::build_http_client;

use super::paths::RuntimePaths;
use super::variant::{GameVariant, VariantProfile};

/// Options of one game variant. Every field has a default so partial
/// settings files keep working.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    /// Forge server folder; relative paths are resolved against the data dir.
    pub forge_directory: Option<PathBuf>,
    pub max_heap_size: String,
    /// Command line run through the shell once the server is ready.
    pub mc_launch: String,
    pub release_channel: String,
    /// Explicit Java executable (path or command name).
    pub java: Option<String>,
    pub java_version: Option<String>,
    pub forge_url: Option<String>,
    pub mod_url: Option<String>,
    pub manifest_url: Option<String>,
    pub ready_timeout_secs: u64,
    pub poll_interval_ms: u64,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            forge_directory: None,
            max_heap_size: "2G".to_string(),
            mc_launch: String::new(),
            release_channel: "release".to_string(),
            java: None,
            java_version: None,
            forge_url: None,
            mod_url: None,
            manifest_url: None,
            ready_timeout_secs: 120,
            poll_interval_ms: 500,
        }
    }
}

impl ClientSettings {
    pub fn ready_timeout(&self) -> Duration {
        Duration::from_secs(self.ready_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    /// Absolute server directory for `variant`, expanding a leading `~`.
    pub fn forge_dir(&self, variant: GameVariant, data_dir: &Path) -> PathBuf {
        let configured = self
            .forge_directory
            .clone()
            .unwrap_or_else(|| PathBuf::from(variant.default_forge_directory()));

        let expanded = match configured.strip_prefix("~") {
            Ok(rest) => dirs::home_dir()
                .map(|home| home.join(rest))
                .unwrap_or_else(|| configured.clone()),
            Err(_) => configured,
        };

        if expanded.is_absolute() {
            expanded
        } else {
            data_dir.join(expanded)
        }
    }
}

/// The persisted `settings.json`: one group per game variant.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsFile {
    pub minecraft_options: ClientSettings,
    pub minecraft_dig_options: ClientSettings,
}

impl SettingsFile {
    /// Load settings, writing a default file on first run.
    ///
    /// An unreadable file falls back to defaults and is left untouched.
    pub fn load_or_init(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(settings) => settings,
                Err(err) => {
                    warn!("Ignoring malformed settings {:?}: {}", path, err);
                    Self::default()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                let settings = Self::default();
                match settings.save(path) {
                    Ok(()) => info!("Wrote default settings to {:?}", path),
                    Err(err) => warn!("Could not write default settings: {}", err),
                }
                settings
            }
            Err(err) => {
                warn!("Could not read settings {:?}: {}", path, err);
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> LauncherResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(LauncherError::io(path))
    }

    pub fn for_variant(&self, variant: GameVariant) -> &ClientSettings {
        match variant {
            GameVariant::Standard => &self.minecraft_options,
            GameVariant::Dig => &self.minecraft_dig_options,
        }
    }
}

/// Everything one invocation needs, built once at start-up.
pub struct AppState {
    pub paths: RuntimePaths,
    pub settings: ClientSettings,
    pub profile: VariantProfile,
    pub downloader: Downloader,
    pub cancel: CancellationToken,
}

impl AppState {
    pub fn new(
        paths: RuntimePaths,
        settings: ClientSettings,
        variant: GameVariant,
        cancel: CancellationToken,
    ) -> LauncherResult<Self> {
        let downloader = Downloader::new(build_http_client()?).with_cancellation(cancel.clone());
        let profile = variant.profile(&settings);
        Ok(Self {
            paths,
            settings,
            profile,
            downloader,
            cancel,
        })
    }

    pub fn variant(&self) -> GameVariant {
        self.profile.variant
    }

    pub fn forge_dir(&self) -> PathBuf {
        self.settings
            .forge_dir(self.variant(), self.paths.data_dir())
    }
}
