use std::path::{Path, PathBuf};

use crate::core::error::{LauncherError, LauncherResult};
use crate::core::loaders::forge::{forge_library_dir, forge_version_token};

pub fn args_file_name() -> &'static str {
    if cfg!(windows) {
        "win_args.txt"
    } else {
        "unix_args.txt"
    }
}

/// Args file written by the Forge installer for `distribution`.
pub fn args_file_path(server_dir: &Path, distribution: &str) -> PathBuf {
    forge_library_dir(server_dir, &forge_version_token(distribution)).join(args_file_name())
}

/// Whitespace-separated tokens of every line of the args file.
///
/// A missing file is [`LauncherError::MissingArgsFile`]; callers that can
/// launch without extra arguments match on it and use an empty set.
pub fn read_args_file(path: &Path) -> LauncherResult<Vec<String>> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(LauncherError::MissingArgsFile(path.to_path_buf()));
        }
        Err(err) => return Err(LauncherError::io(path)(err)),
    };

    Ok(raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.starts_with('#'))
        .flat_map(str::split_whitespace)
        .map(str::to_string)
        .collect())
}
