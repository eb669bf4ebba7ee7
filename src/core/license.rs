// ─── License Gate ───
// The Forge server refuses to start until `eula.txt` says `eula=true`.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::core::error::{LauncherError, LauncherResult};
use crate::core::prompt::Prompt;

pub const EULA_FILE: &str = "eula.txt";
pub const EULA_URL: &str = "https://aka.ms/MinecraftEULA";

const DECLINED: &str = "eula=false";
const ACCEPTED: &str = "eula=true";

pub fn eula_path(server_dir: &Path) -> PathBuf {
    server_dir.join(EULA_FILE)
}

/// Ensure the server's EULA has been accepted, asking through `prompt`.
///
/// Returns `false` when the user declines; the caller must not launch the
/// server in that case.
pub async fn ensure_accepted(server_dir: &Path, prompt: &dyn Prompt) -> LauncherResult<bool> {
    let path = eula_path(server_dir);
    if !path.exists() {
        std::fs::create_dir_all(server_dir).map_err(LauncherError::io(server_dir))?;
        std::fs::write(&path, default_eula_text()).map_err(LauncherError::io(&path))?;
        info!("Created {:?}", path);
    }

    let text = std::fs::read_to_string(&path).map_err(LauncherError::io(&path))?;
    if is_accepted(&text) {
        return Ok(true);
    }

    let question = format!(
        "You need to agree to the Minecraft EULA in order to run the server. \
         The EULA can be found at {}\nDo you agree to the EULA?",
        EULA_URL
    );
    if !prompt.confirm(&question).await? {
        warn!("EULA not accepted, the server will not be started");
        return Ok(false);
    }

    std::fs::write(&path, accept(&text)).map_err(LauncherError::io(&path))?;
    info!("EULA accepted");
    Ok(true)
}

fn is_accepted(text: &str) -> bool {
    text.lines()
        .map(|line| line.trim().to_ascii_lowercase())
        .any(|line| line == ACCEPTED)
}

fn accept(text: &str) -> String {
    let mut replaced = false;
    let mut lines: Vec<String> = text
        .lines()
        .map(|line| {
            if line.trim().to_ascii_lowercase().starts_with("eula=") {
                replaced = true;
                ACCEPTED.to_string()
            } else {
                line.to_string()
            }
        })
        .collect();
    if !replaced {
        lines.push(ACCEPTED.to_string());
    }
    lines.join("\n") + "\n"
}

fn default_eula_text() -> String {
    format!(
        "#By changing the setting below to TRUE you are indicating your agreement to our EULA ({}).\n#{}\n{}\n",
        EULA_URL,
        chrono::Local::now().format("%a %b %d %H:%M:%S %Z %Y"),
        DECLINED
    )
}
