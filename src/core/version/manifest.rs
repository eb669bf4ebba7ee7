// ─── Dependency Manifest ───
// Resolves the Java / Forge / mod versions required by a patch, from the
// remote `minecraft_versions.json` with a last-known-good local cache.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};
use tracing::{info, instrument, warn};

use crate::core::downloader::Downloader;
use crate::core::error::{LauncherError, LauncherResult};

pub const DEFAULT_MANIFEST_URL: &str =
    "https://raw.githubusercontent.com/cjmang/Minecraft_AP_Randomizer/refs/heads/master/versions/minecraft_versions.json";
pub const MANIFEST_CACHE_FILE: &str = "minecraft_versions.json";
pub const DEFAULT_CHANNEL: &str = "release";

/// Seed used when the remote was never reachable and no cache exists yet.
const BUNDLED_MANIFEST: &str = include_str!("../../../resources/minecraft_versions.json");

/// Channel name → entries, newest first.
pub type ManifestDocument = HashMap<String, Vec<ManifestEntry>>;

/// A single entry of a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    #[serde(deserialize_with = "string_or_number")]
    pub version: String,
    #[serde(alias = "java", deserialize_with = "string_or_number")]
    pub runtime_version: String,
    /// Forge version token (`1.19.4-45.3.15`) or installer URL.
    #[serde(alias = "forge")]
    pub server_distribution: String,
    #[serde(alias = "url")]
    pub mod_url: String,
}

/// Where a game variant gets its dependency set from.
#[derive(Debug, Clone)]
pub enum ManifestSource {
    Remote { url: String },
    Fixed(ManifestEntry),
}

/// The resolved dependency set for one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyManifest {
    pub channel: String,
    pub version: String,
    pub runtime_version: String,
    pub server_distribution: String,
    pub mod_url: String,
}

impl DependencyManifest {
    fn from_entry(channel: &str, entry: ManifestEntry) -> Self {
        Self {
            channel: channel.to_string(),
            version: entry.version,
            runtime_version: entry.runtime_version,
            server_distribution: entry.server_distribution,
            mod_url: entry.mod_url,
        }
    }
}

impl fmt::Display for DependencyManifest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "mod data v{} on \"{}\" (java {}, forge {})",
            self.version, self.channel, self.runtime_version, self.server_distribution
        )
    }
}

pub struct ManifestResolver<'a> {
    downloader: &'a Downloader,
    source: ManifestSource,
    cache_path: PathBuf,
}

impl<'a> ManifestResolver<'a> {
    pub fn new(downloader: &'a Downloader, source: ManifestSource, cache_dir: &Path) -> Self {
        Self {
            downloader,
            source,
            cache_path: cache_dir.join(MANIFEST_CACHE_FILE),
        }
    }

    #[cfg(test)]
    pub fn cache_path(&self) -> &Path {
        &self.cache_path
    }

    /// Pick the entry for `requested` (or the newest one) on `channel`.
    #[instrument(skip(self))]
    pub async fn resolve(
        &self,
        requested: Option<&str>,
        channel: &str,
    ) -> LauncherResult<DependencyManifest> {
        let url = match &self.source {
            ManifestSource::Fixed(entry) => {
                return Ok(DependencyManifest::from_entry(channel, entry.clone()));
            }
            ManifestSource::Remote { url } => url,
        };

        let document = match self.fetch_remote(url).await? {
            Some(document) => document,
            None => self.load_cache()?,
        };

        select_entry(&document, requested, channel)
    }

    /// `Ok(None)` means "use the cache"; only cancellation is an error here.
    async fn fetch_remote(&self, url: &str) -> LauncherResult<Option<ManifestDocument>> {
        let bytes = match self.downloader.fetch_bytes(url).await {
            Ok(bytes) => bytes,
            Err(LauncherError::Cancelled) => return Err(LauncherError::Cancelled),
            Err(err) => {
                warn!("Unable to fetch version update file, using local version ({err})");
                return Ok(None);
            }
        };

        let raw: serde_json::Value = match serde_json::from_slice(&bytes) {
            Ok(raw) => raw,
            Err(err) => {
                warn!("Version update file is not JSON, using local version ({err})");
                return Ok(None);
            }
        };
        let document: ManifestDocument = match serde_json::from_value(raw.clone()) {
            Ok(document) => document,
            Err(err) => {
                warn!("Version update file has an unexpected layout, using local version ({err})");
                return Ok(None);
            }
        };

        if let Err(err) = self.store_cache(&raw) {
            warn!("Could not update version cache {:?}: {}", self.cache_path, err);
        }
        Ok(Some(document))
    }

    fn store_cache(&self, raw: &serde_json::Value) -> LauncherResult<()> {
        if let Some(parent) = self.cache_path.parent() {
            std::fs::create_dir_all(parent).map_err(LauncherError::io(parent))?;
        }
        let json = serde_json::to_vec_pretty(raw)?;
        std::fs::write(&self.cache_path, json).map_err(LauncherError::io(&self.cache_path))
    }

    fn load_cache(&self) -> LauncherResult<ManifestDocument> {
        match std::fs::read_to_string(&self.cache_path) {
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                info!("No cached version file yet, using the bundled copy");
                Ok(serde_json::from_str(BUNDLED_MANIFEST)?)
            }
            Err(source) => Err(LauncherError::Io {
                path: self.cache_path.clone(),
                source,
            }),
        }
    }
}

fn select_entry(
    document: &ManifestDocument,
    requested: Option<&str>,
    channel: &str,
) -> LauncherResult<DependencyManifest> {
    let entries = document.get(channel).map(Vec::as_slice).unwrap_or_default();

    let found = match requested {
        Some(version) => entries.iter().find(|entry| entry.version == version),
        None => entries.first(),
    };

    if let Some(entry) = found {
        return Ok(DependencyManifest::from_entry(channel, entry.clone()));
    }

    let mut message = match requested {
        Some(version) if !entries.is_empty() => format!(
            "No compatible mod version found for client version {} on \"{}\" channel.",
            version, channel
        ),
        _ => format!("No mod versions are published on the \"{}\" channel.", channel),
    };
    if channel != DEFAULT_CHANNEL {
        message.push_str(&format!(
            " Consider switching \"release_channel\" to \"{}\" in your settings file.",
            DEFAULT_CHANNEL
        ));
    } else {
        message.push_str(" Please report this error to the randomizer maintainers.");
    }
    Err(LauncherError::NoCompatibleVersion(message))
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Token {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match Token::deserialize(deserializer)? {
        Token::Text(text) => text,
        Token::Number(number) => number.to_string(),
    })
}
