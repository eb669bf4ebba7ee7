// ─── Server Supervisor ───
// Owns the Forge server process for one invocation:
// Idle → ArgsAssembled → Launched → AwaitingReady → Ready → Exited,
// with AwaitingReady → TimedOut on failure.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::process::Child;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::core::error::{LauncherError, LauncherResult};

use super::args::read_args_file;
use super::heap::HeapSize;
use super::readiness::{wait_for_ready, Clock, ReadyWait};

const LOG_FILE: &str = "logs/latest.log";
const NO_GUI: &str = "-nogui";

/// How long an interrupted server may take to save and stop before it is
/// killed.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Idle,
    ArgsAssembled,
    Launched,
    AwaitingReady,
    Ready,
    TimedOut,
    Exited(Option<i32>),
}

pub struct ServerSupervisor {
    server_dir: PathBuf,
    java_bin: PathBuf,
    state: SupervisorState,
    args: Vec<String>,
    child: Option<Child>,
}

impl ServerSupervisor {
    pub fn new(server_dir: impl Into<PathBuf>, java_bin: impl Into<PathBuf>) -> Self {
        Self {
            server_dir: server_dir.into(),
            java_bin: java_bin.into(),
            state: SupervisorState::Idle,
            args: Vec::new(),
            child: None,
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> SupervisorState {
        self.state
    }

    pub fn log_path(&self) -> PathBuf {
        self.server_dir.join(LOG_FILE)
    }

    /// Build `-Xmx…`, the args file tokens and `-nogui`.
    pub fn assemble_args(
        &mut self,
        heap: &HeapSize,
        args_file: &Path,
    ) -> LauncherResult<&[String]> {
        self.expect_state(SupervisorState::Idle, "assemble arguments")?;

        let mut args = vec![heap.jvm_flag()];
        args.extend(read_args_file(args_file)?);
        args.push(NO_GUI.to_string());

        self.args = args;
        self.state = SupervisorState::ArgsAssembled;
        Ok(&self.args)
    }

    /// Spawn the server with the server folder as working directory.
    ///
    /// The child shares our process group, so a Ctrl-C in the terminal
    /// reaches it directly. It is killed if the supervisor is dropped before
    /// it exits; use [`ServerSupervisor::shutdown`] to let it stop first.
    #[instrument(skip(self), fields(server_dir = ?self.server_dir))]
    pub fn launch(&mut self) -> LauncherResult<()> {
        self.expect_state(SupervisorState::ArgsAssembled, "launch")?;

        let mut cmd = tokio::process::Command::new(&self.java_bin);
        cmd.args(&self.args)
            .current_dir(&self.server_dir)
            .kill_on_drop(true);

        info!("Starting Forge server with Java: {:?}", self.java_bin);
        debug!("Command (copy/paste): {}", format_command_for_logs(&cmd));

        let child = cmd
            .spawn()
            .map_err(|e| LauncherError::JavaExecution(e.to_string()))?;
        self.child = Some(child);
        self.state = SupervisorState::Launched;
        Ok(())
    }

    /// Wait for the readiness line in `logs/latest.log`.
    ///
    /// Fails early if the server exits while starting up.
    pub async fn wait_ready(
        &mut self,
        wait: ReadyWait<'_>,
        clock: &dyn Clock,
        cancel: &CancellationToken,
    ) -> LauncherResult<()> {
        self.expect_state(SupervisorState::Launched, "wait for readiness")?;
        let log_path = self.log_path();
        let child = self
            .child
            .as_mut()
            .ok_or_else(|| LauncherError::Other("server process missing".into()))?;

        self.state = SupervisorState::AwaitingReady;
        info!("Waiting for the server to finish starting ...");

        let result = tokio::select! {
            ready = wait_for_ready(&log_path, wait, clock, cancel) => ready,
            status = child.wait() => {
                let status = status.map_err(|e| LauncherError::JavaExecution(e.to_string()))?;
                self.state = SupervisorState::Exited(status.code());
                return Err(LauncherError::JavaExecution(format!(
                    "server exited with {:?} before it was ready",
                    status.code()
                )));
            }
        };

        self.state = match &result {
            Ok(()) => SupervisorState::Ready,
            Err(LauncherError::Timeout(_)) => SupervisorState::TimedOut,
            Err(_) => SupervisorState::AwaitingReady,
        };
        result
    }

    /// Block until the server process terminates; the exit code is only
    /// reported, not interpreted.
    ///
    /// On cancellation the server gets `grace` to finish its own shutdown
    /// before [`LauncherError::Cancelled`] is returned.
    pub async fn wait_exit(
        &mut self,
        cancel: &CancellationToken,
        grace: Duration,
    ) -> LauncherResult<Option<i32>> {
        if let SupervisorState::Exited(code) = self.state {
            return Ok(code);
        }
        let child = self.child.as_mut().ok_or_else(|| {
            LauncherError::Other(format!("cannot wait for exit in state {:?}", self.state))
        })?;

        let status = tokio::select! {
            status = child.wait() => Some(status),
            _ = cancel.cancelled() => None,
        };
        let Some(status) = status else {
            self.shutdown(grace).await?;
            return Err(LauncherError::Cancelled);
        };

        let status = status.map_err(|e| LauncherError::JavaExecution(e.to_string()))?;
        if !status.success() {
            warn!("Server exited with {:?}", status.code());
        } else {
            info!("Server stopped");
        }
        self.state = SupervisorState::Exited(status.code());
        Ok(status.code())
    }

    /// Wait up to `grace` for a server that is already stopping, then kill it.
    pub async fn shutdown(&mut self, grace: Duration) -> LauncherResult<Option<i32>> {
        if let SupervisorState::Exited(code) = self.state {
            return Ok(code);
        }
        let Some(child) = self.child.as_mut() else {
            return Ok(None);
        };

        info!("Waiting up to {}s for the server to stop ...", grace.as_secs());
        let status = match tokio::time::timeout(grace, child.wait()).await {
            Ok(status) => status,
            Err(_) => {
                warn!("Server still running after {}s, killing it", grace.as_secs());
                if let Err(err) = child.start_kill() {
                    warn!("Could not kill server: {}", err);
                }
                child.wait().await
            }
        }
        .map_err(|e| LauncherError::JavaExecution(e.to_string()))?;

        self.state = SupervisorState::Exited(status.code());
        Ok(status.code())
    }

    fn expect_state(&self, expected: SupervisorState, action: &str) -> LauncherResult<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(LauncherError::Other(format!(
                "cannot {} in state {:?}",
                action, self.state
            )))
        }
    }
}

fn format_command_for_logs(cmd: &tokio::process::Command) -> String {
    let cmd = cmd.as_std();
    let program = shell_escape(&cmd.get_program().to_string_lossy());
    let args = cmd
        .get_args()
        .map(|arg| shell_escape(&arg.to_string_lossy()))
        .collect::<Vec<_>>()
        .join(" ");

    if args.is_empty() {
        program
    } else {
        format!("{} {}", program, args)
    }
}

fn shell_escape(raw: &str) -> String {
    if raw.is_empty() {
        return "\"\"".to_string();
    }

    if raw.chars().all(|ch| {
        ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.' | '/' | ':' | '\\' | '=')
    }) {
        return raw.to_string();
    }

    format!("\"{}\"", raw.replace('"', "\\\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::launch::readiness::{ReadinessMarkers, TokioClock};
    use std::time::Duration;

    #[test]
    fn args_are_heap_then_file_then_nogui() {
        let dir = tempfile::tempdir().unwrap();
        let args_file = dir.path().join("unix_args.txt");
        std::fs::write(&args_file, "-Dfoo=bar\n--launchTarget forgeserver\n").unwrap();

        let mut supervisor = ServerSupervisor::new(dir.path(), "java");
        let heap = HeapSize::parse("2G").unwrap();
        let args = supervisor
            .assemble_args(&heap, &args_file)
            .unwrap()
            .to_vec();

        assert_eq!(
            args,
            vec!["-Xmx2G", "-Dfoo=bar", "--launchTarget", "forgeserver", "-nogui"]
        );
        assert_eq!(supervisor.state(), SupervisorState::ArgsAssembled);
        assert_eq!(supervisor.log_path(), dir.path().join("logs/latest.log"));
    }

    #[test]
    fn out_of_order_transitions_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut supervisor = ServerSupervisor::new(dir.path(), "java");
        assert!(supervisor.launch().is_err());

        let heap = HeapSize::parse("1G").unwrap();
        let missing = dir.path().join("missing.txt");
        assert!(matches!(
            supervisor.assemble_args(&heap, &missing),
            Err(LauncherError::MissingArgsFile(_))
        ));
        assert_eq!(supervisor.state(), SupervisorState::Idle);
    }

    #[test]
    fn command_logging_quotes_spaces() {
        let mut cmd = tokio::process::Command::new("/opt/java/bin/java");
        cmd.arg("-Xmx2G").arg("Forge server").arg("");
        assert_eq!(
            format_command_for_logs(&cmd),
            "/opt/java/bin/java -Xmx2G \"Forge server\" \"\""
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn supervises_a_server_until_ready_and_exit() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let fake_java = dir.path().join("fake-java");
        std::fs::write(
            &fake_java,
            "#!/bin/sh\n\
             echo \"$@\" > argv.txt\n\
             mkdir -p logs\n\
             echo 'Loading' > logs/latest.log\n\
             sleep 1\n\
             echo '[12:00] Done (1.0s)! For help, type \"help\"' >> logs/latest.log\n\
             sleep 1\n\
             exit 0\n",
        )
        .unwrap();
        std::fs::set_permissions(&fake_java, std::fs::Permissions::from_mode(0o755)).unwrap();
        let args_file = dir.path().join("unix_args.txt");
        std::fs::write(&args_file, "-Dfoo=bar\n").unwrap();

        let mut supervisor = ServerSupervisor::new(dir.path(), &fake_java);
        supervisor
            .assemble_args(&HeapSize::parse("2G").unwrap(), &args_file)
            .unwrap();
        supervisor.launch().unwrap();

        let markers = ReadinessMarkers::default();
        supervisor
            .wait_ready(
                ReadyWait {
                    markers: &markers,
                    timeout: Duration::from_secs(20),
                    interval: Duration::from_millis(50),
                },
                &TokioClock,
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(supervisor.state(), SupervisorState::Ready);

        assert_eq!(
            supervisor
                .wait_exit(&CancellationToken::new(), SHUTDOWN_GRACE)
                .await
                .unwrap(),
            Some(0)
        );
        assert_eq!(supervisor.state(), SupervisorState::Exited(Some(0)));
        assert_eq!(
            std::fs::read_to_string(dir.path().join("argv.txt")).unwrap().trim(),
            "-Xmx2G -Dfoo=bar -nogui"
        );
    }

    #[cfg(unix)]
    fn launch_script(dir: &Path, script: &str) -> ServerSupervisor {
        use std::os::unix::fs::PermissionsExt;

        let fake_java = dir.join("fake-java");
        std::fs::write(&fake_java, script).unwrap();
        std::fs::set_permissions(&fake_java, std::fs::Permissions::from_mode(0o755)).unwrap();
        let args_file = dir.join("unix_args.txt");
        std::fs::write(&args_file, "").unwrap();

        let mut supervisor = ServerSupervisor::new(dir, &fake_java);
        supervisor
            .assemble_args(&HeapSize::parse("1G").unwrap(), &args_file)
            .unwrap();
        supervisor.launch().unwrap();
        supervisor
    }

    #[cfg(unix)]
    async fn read_pid(dir: &Path) -> String {
        let pid_file = dir.join("pid.txt");
        for _ in 0..200 {
            if let Ok(pid) = std::fs::read_to_string(&pid_file) {
                if !pid.trim().is_empty() {
                    return pid.trim().to_string();
                }
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("server never wrote its pid");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn interrupted_server_finishes_saving_before_we_return() {
        let dir = tempfile::tempdir().unwrap();
        let mut supervisor = launch_script(
            dir.path(),
            "#!/bin/sh\n\
             trap 'sleep 0.5; echo saved > saved.txt; exit 0' INT\n\
             echo $$ > pid.txt\n\
             while true; do sleep 0.1; done\n",
        );
        let pid = read_pid(dir.path()).await;

        let status = std::process::Command::new("kill")
            .args(["-INT", &pid])
            .status()
            .unwrap();
        assert!(status.success());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = supervisor
            .wait_exit(&cancel, Duration::from_secs(20))
            .await
            .unwrap_err();
        assert!(matches!(err, LauncherError::Cancelled));
        assert_eq!(
            std::fs::read_to_string(dir.path().join("saved.txt")).unwrap().trim(),
            "saved"
        );
        assert_eq!(supervisor.state(), SupervisorState::Exited(Some(0)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn server_ignoring_interrupt_is_killed_after_grace() {
        let dir = tempfile::tempdir().unwrap();
        let mut supervisor = launch_script(
            dir.path(),
            "#!/bin/sh\n\
             trap '' INT\n\
             echo $$ > pid.txt\n\
             while true; do sleep 0.1; done\n",
        );
        read_pid(dir.path()).await;

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = supervisor
            .wait_exit(&cancel, Duration::from_millis(200))
            .await
            .unwrap_err();

        assert!(matches!(err, LauncherError::Cancelled));
        assert_eq!(supervisor.state(), SupervisorState::Exited(None));
    }
}
