// ─── Game Variants ───
// Everything that differs between the regular randomizer and "Dig" is data
// here; the pipeline itself is shared.

use serde::{Deserialize, Serialize};

use crate::core::launch::ReadinessMarkers;
use crate::core::mods::ModNaming;
use crate::core::version::{ManifestEntry, ManifestSource, DEFAULT_MANIFEST_URL};

use super::app_state::ClientSettings;

const DIG_MOD_URL: &str = "https://github.com/AshIndigo/Minecraft_AP_Randomizer/releases/download/dig-v0.0.2-hotfix/aprandomizer-MC1.19.4-hotfix-0.0.2.jar";
const DIG_FORGE_URL: &str = "https://maven.minecraftforge.net/net/minecraftforge/forge/1.19.4-45.3.15/forge-1.19.4-45.3.15-installer.jar";
const DIG_JAVA_VERSION: &str = "17";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum GameVariant {
    Standard,
    Dig,
}

impl GameVariant {
    pub fn display_name(self) -> &'static str {
        match self {
            GameVariant::Standard => "Minecraft Client",
            GameVariant::Dig => "Minecraft Dig",
        }
    }

    /// Extension of the patch files the generator produces.
    pub fn patch_extension(self) -> &'static str {
        match self {
            GameVariant::Standard => "apmc",
            GameVariant::Dig => "apmcdig",
        }
    }

    pub fn default_forge_directory(self) -> &'static str {
        match self {
            GameVariant::Standard => "Minecraft Forge server",
            GameVariant::Dig => "Minecraft Dig Forge server",
        }
    }

    /// Guess the variant from a patch file name.
    pub fn from_patch_path(path: &std::path::Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        [GameVariant::Standard, GameVariant::Dig]
            .into_iter()
            .find(|variant| variant.patch_extension() == ext)
    }

    pub fn profile(self, settings: &ClientSettings) -> VariantProfile {
        let manifest_source = match self {
            GameVariant::Standard => ManifestSource::Remote {
                url: settings
                    .manifest_url
                    .clone()
                    .unwrap_or_else(|| DEFAULT_MANIFEST_URL.to_string()),
            },
            GameVariant::Dig => ManifestSource::Fixed(ManifestEntry {
                version: "dig".to_string(),
                runtime_version: non_empty(&settings.java_version)
                    .unwrap_or(DIG_JAVA_VERSION)
                    .to_string(),
                server_distribution: non_empty(&settings.forge_url)
                    .unwrap_or(DIG_FORGE_URL)
                    .to_string(),
                mod_url: non_empty(&settings.mod_url)
                    .unwrap_or(DIG_MOD_URL)
                    .to_string(),
            }),
        };

        VariantProfile {
            variant: self,
            container_entry: "data.json",
            mod_naming: ModNaming::new("aprandomizer", ".jar"),
            readiness: ReadinessMarkers::default(),
            manifest_source,
        }
    }
}

/// Resolved per-variant configuration consumed by the pipeline.
#[derive(Debug, Clone)]
pub struct VariantProfile {
    pub variant: GameVariant,
    pub container_entry: &'static str,
    pub mod_naming: ModNaming,
    pub readiness: ReadinessMarkers,
    pub manifest_source: ManifestSource,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}
