use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::core::error::{LauncherError, LauncherResult};

const APP_DIR_NAME: &str = "apmc-launcher";

/// On-disk locations owned by the client itself (not the server).
#[derive(Debug, Clone)]
pub struct RuntimePaths {
    data_dir: PathBuf,
    runtimes_dir: PathBuf,
}

impl RuntimePaths {
    /// Lay out (and create) the client directories under `root`.
    pub fn at(root: &Path) -> LauncherResult<Self> {
        let data_dir = canonical_or_create_dir(root)?;
        let runtimes_dir = canonical_or_create_dir(&data_dir.join("runtimes"))?;
        Ok(Self {
            data_dir,
            runtimes_dir,
        })
    }

    /// Settings file and version manifest cache live here.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Extracted `jdk*` directories live here.
    pub fn runtimes_dir(&self) -> &Path {
        &self.runtimes_dir
    }

    pub fn settings_file(&self) -> PathBuf {
        self.data_dir.join("settings.json")
    }
}

static RUNTIME_PATHS: OnceLock<RuntimePaths> = OnceLock::new();

pub fn runtime_paths() -> LauncherResult<&'static RuntimePaths> {
    if let Some(paths) = RUNTIME_PATHS.get() {
        return Ok(paths);
    }

    let root = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME);
    let paths = RuntimePaths::at(&root)?;
    Ok(RUNTIME_PATHS.get_or_init(|| paths))
}

fn canonical_or_create_dir(path: &Path) -> LauncherResult<PathBuf> {
    std::fs::create_dir_all(path).map_err(|source| LauncherError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    std::fs::canonicalize(path).map_err(|source| LauncherError::Io {
        path: path.to_path_buf(),
        source,
    })
}
