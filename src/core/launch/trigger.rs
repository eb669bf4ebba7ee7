// ─── Launch Trigger ───
// Starts the user's Minecraft client once the server is up. Best effort:
// nothing here can fail the pipeline.

use std::process::{ExitStatus, Stdio};
use std::thread::JoinHandle;

#[cfg(unix)]
use std::os::unix::process::CommandExt;
#[cfg(target_os = "windows")]
use std::os::windows::process::CommandExt;

use tracing::{info, warn};

/// Run `command_line` through the platform shell without waiting for it.
///
/// Returns whether a process was started.
pub fn try_launch(command_line: &str) -> bool {
    let command_line = command_line.trim();
    if command_line.is_empty() {
        return false;
    }

    spawn_reaped(command_line).is_some()
}

/// Spawn `command_line` and wait for it on a background thread, so the
/// finished shell is reaped instead of lingering as a zombie.
fn spawn_reaped(command_line: &str) -> Option<JoinHandle<Option<ExitStatus>>> {
    let mut cmd = shell_command(command_line);
    cmd.stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    configure_platform_spawn(&mut cmd);

    match cmd.spawn() {
        Ok(mut child) => {
            info!("Launched client (pid {}): {}", child.id(), command_line);
            Some(std::thread::spawn(move || match child.wait() {
                Ok(status) => Some(status),
                Err(err) => {
                    warn!("Could not wait for client launcher: {}", err);
                    None
                }
            }))
        }
        Err(err) => {
            warn!("Could not launch {:?}: {}", command_line, err);
            None
        }
    }
}

fn shell_command(command_line: &str) -> std::process::Command {
    if cfg!(windows) {
        let mut cmd = std::process::Command::new("cmd");
        cmd.arg("/C").arg(command_line);
        cmd
    } else {
        let mut cmd = std::process::Command::new("sh");
        cmd.arg("-c").arg(command_line);
        cmd
    }
}

fn configure_platform_spawn(cmd: &mut std::process::Command) {
    #[cfg(target_os = "windows")]
    {
        const DETACHED_PROCESS: u32 = 0x00000008;
        const CREATE_NEW_PROCESS_GROUP: u32 = 0x00000200;
        cmd.creation_flags(DETACHED_PROCESS | CREATE_NEW_PROCESS_GROUP);
    }

    #[cfg(unix)]
    {
        cmd.process_group(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_command_is_a_noop() {
        assert!(!try_launch(""));
        assert!(!try_launch("   "));
    }

    #[cfg(unix)]
    #[test]
    fn command_runs_through_the_shell() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("launched");
        assert!(try_launch(&format!("touch '{}'", marker.display())));

        for _ in 0..100 {
            if marker.exists() {
                return;
            }
            std::thread::sleep(std::time::Duration::from_millis(20));
        }
        panic!("shell command did not run");
    }

    #[cfg(unix)]
    #[test]
    fn finished_launcher_is_reaped() {
        let status = spawn_reaped("exit 3").unwrap().join().unwrap().unwrap();
        assert_eq!(status.code(), Some(3));
    }
}
