use std::path::{Path, PathBuf};

use tracing::info;

use super::container::{PatchCodec, PatchContainer, PatchFormat};
use crate::core::error::{LauncherError, LauncherResult};

/// Folder inside the server directory scanned by the mod for patches.
pub const PATCH_DIR: &str = "APData";
/// Extension the mod looks for inside [`PATCH_DIR`].
pub const DELIVERED_EXTENSION: &str = "apmc";

/// Convert `source` into the legacy layout inside `<server_dir>/APData/`.
///
/// Every previously delivered patch is removed first so exactly one patch
/// is active. The source is decoded before anything is deleted, so passing
/// a file that already lives in `APData/` is safe.
pub fn deliver_patch(
    codec: &PatchCodec,
    source: &Path,
    server_dir: &Path,
) -> LauncherResult<(PathBuf, PatchContainer)> {
    let container = codec.decode(source)?;

    let target_dir = server_dir.join(PATCH_DIR);
    std::fs::create_dir_all(&target_dir).map_err(LauncherError::io(&target_dir))?;
    clear_delivered_patches(&target_dir)?;

    let target = target_dir.join(delivered_file_name(source));
    codec.encode(&container, &target, PatchFormat::LegacyEncodedText)?;

    match container.format {
        PatchFormat::ContainerArchive => {
            info!("Converted {:?} -> legacy patch {:?}", source, target)
        }
        PatchFormat::LegacyEncodedText => {
            info!("Passed through legacy patch {:?} -> {:?}", source, target)
        }
    }

    Ok((target, container))
}

fn clear_delivered_patches(target_dir: &Path) -> LauncherResult<()> {
    let entries = std::fs::read_dir(target_dir).map_err(LauncherError::io(target_dir))?;
    for entry in entries {
        let path = entry.map_err(LauncherError::io(target_dir))?.path();
        let is_patch = path.is_file()
            && path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case(DELIVERED_EXTENSION));
        if is_patch {
            std::fs::remove_file(&path).map_err(LauncherError::io(&path))?;
            info!("Removed old patch: {:?}", path.file_name().unwrap_or_default());
        }
    }
    Ok(())
}

fn delivered_file_name(source: &Path) -> String {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "patch".to_string());
    format!("{}.{}", stem, DELIVERED_EXTENSION)
}
