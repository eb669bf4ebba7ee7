// ─── Commands ───
// The delivery pipeline: resolve dependencies, install what is missing,
// sync the mod, deliver the patch, pass the EULA, then supervise the server.

use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use tracing::{error, info, warn};

use crate::core::error::{LauncherError, LauncherResult};
use crate::core::java::{find_java_binary, find_jdk_dir, uses_bundled_runtime, RuntimeInstaller};
use crate::core::launch::{
    args_file_path, try_launch, Clock, HeapSize, ReadyWait, ServerSupervisor, SHUTDOWN_GRACE,
};
use crate::core::license;
use crate::core::loaders::{
    forge_version_token, is_correct_version_installed, ForgeInstaller, InstallContext,
};
use crate::core::mods::{ModSynchronizer, SyncOutcome};
use crate::core::patch::{deliver_patch, update_connection, PatchCodec, PatchContainer};
use crate::core::prompt::Prompt;
use crate::core::state::AppState;
use crate::core::version::{DependencyManifest, ManifestResolver};

/// One invocation's request, after CLI and settings have been merged.
#[derive(Debug, Clone, Default)]
pub struct LaunchRequest {
    pub patch_file: Option<PathBuf>,
    /// Install Java and Forge, then stop.
    pub install_only: bool,
    /// Overrides the payload's `client_version`.
    pub client_version: Option<String>,
    /// Rewrites the delivered patch to point at `host:port`.
    pub connect: Option<(String, u16)>,
    pub runtime_version: Option<String>,
    pub server_distribution: Option<String>,
    pub mod_url: Option<String>,
}

impl LaunchRequest {
    /// Replace resolved manifest fields with explicit overrides.
    fn apply_overrides(&self, manifest: &mut DependencyManifest) {
        let overrides = [
            (&self.runtime_version, &mut manifest.runtime_version),
            (&self.server_distribution, &mut manifest.server_distribution),
            (&self.mod_url, &mut manifest.mod_url),
        ];
        for (value, slot) in overrides {
            if let Some(value) = value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
                *slot = value.to_string();
            }
        }
    }
}

/// Ways the pipeline can end without an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Installed,
    LicenseDeclined,
    ServerStopped { exit_code: Option<i32> },
}

impl Outcome {
    pub fn summary(&self) -> String {
        match self {
            Outcome::Installed => "Installation complete.".to_string(),
            Outcome::LicenseDeclined => "EULA not accepted, server not started.".to_string(),
            Outcome::ServerStopped { exit_code: Some(code) } => {
                format!("Server stopped (exit code {}).", code)
            }
            Outcome::ServerStopped { exit_code: None } => "Server stopped.".to_string(),
        }
    }
}

pub struct Pipeline<'a> {
    state: &'a AppState,
    prompt: &'a dyn Prompt,
    clock: &'a dyn Clock,
    runtime_installer: RuntimeInstaller,
    forge_installer: ForgeInstaller,
    /// Whether Java is installed next to the client instead of taken from
    /// the system.
    bundled_runtime: bool,
}

impl<'a> Pipeline<'a> {
    pub fn new(state: &'a AppState, prompt: &'a dyn Prompt, clock: &'a dyn Clock) -> Self {
        Self {
            state,
            prompt,
            clock,
            runtime_installer: RuntimeInstaller::default(),
            forge_installer: ForgeInstaller::default(),
            bundled_runtime: uses_bundled_runtime(),
        }
    }

    #[cfg(test)]
    fn with_installers(mut self, runtime: RuntimeInstaller, forge: ForgeInstaller) -> Self {
        self.runtime_installer = runtime;
        self.forge_installer = forge;
        self
    }

    #[cfg(test)]
    fn with_bundled_runtime(mut self, bundled: bool) -> Self {
        self.bundled_runtime = bundled;
        self
    }

    pub async fn run(&self, request: &LaunchRequest) -> LauncherResult<Outcome> {
        let profile = &self.state.profile;
        let settings = &self.state.settings;
        let codec = PatchCodec::new(profile.container_entry);
        let forge_dir = self.state.forge_dir();
        info!("{} using server folder {:?}", profile.variant.display_name(), forge_dir);

        if request.patch_file.is_none() && !request.install_only {
            return Err(LauncherError::MissingPatch(
                "no patch file given; pass a .apmc file or use --install".into(),
            ));
        }

        // ── Patch ──
        let container = match &request.patch_file {
            Some(path) => Some(self.inspect_patch(&codec, path)?),
            None => None,
        };
        let requested_version = request.client_version.clone().or_else(|| {
            container
                .as_ref()
                .and_then(|c| c.info().client_version)
                .map(|v| v.to_string())
        });

        // ── Dependencies ──
        let resolver = ManifestResolver::new(
            &self.state.downloader,
            profile.manifest_source.clone(),
            self.state.paths.data_dir(),
        );
        let mut manifest = resolver
            .resolve(requested_version.as_deref(), &settings.release_channel)
            .await?;
        request.apply_overrides(&mut manifest);
        info!("[RESOLVE] {}", manifest);

        if request.install_only {
            return self.install_all(&forge_dir, &manifest).await;
        }

        self.ensure_runtime(&manifest).await?;
        let java = self.java_binary(&manifest)?;
        self.ensure_server(&forge_dir, &manifest, &java).await?;

        let heap = HeapSize::parse(&settings.max_heap_size)?;
        self.sync_mod(&forge_dir, &manifest).await?;

        if let Some(source) = &request.patch_file {
            let (delivered, _) = deliver_patch(&codec, source, &forge_dir)?;
            info!("[PATCH] Delivered {:?}", delivered);
            if let Some((host, port)) = &request.connect {
                rewrite_connection(&delivered, host, *port)?;
            }
        }

        // ── EULA ──
        if !license::ensure_accepted(&forge_dir, self.prompt).await? {
            return Ok(Outcome::LicenseDeclined);
        }

        // ── Server ──
        let mut supervisor = ServerSupervisor::new(&forge_dir, &java);
        supervisor.assemble_args(
            &heap,
            &args_file_path(&forge_dir, &manifest.server_distribution),
        )?;
        supervisor.launch()?;
        let ready = supervisor
            .wait_ready(
                ReadyWait {
                    markers: &profile.readiness,
                    timeout: settings.ready_timeout(),
                    interval: settings.poll_interval(),
                },
                self.clock,
                &self.state.cancel,
            )
            .await;
        if let Err(LauncherError::Cancelled) = ready {
            supervisor.shutdown(SHUTDOWN_GRACE).await?;
        }
        ready?;

        try_launch(&settings.mc_launch);

        let exit_code = supervisor.wait_exit(&self.state.cancel, SHUTDOWN_GRACE).await?;
        Ok(Outcome::ServerStopped { exit_code })
    }

    fn inspect_patch(&self, codec: &PatchCodec, path: &Path) -> LauncherResult<PatchContainer> {
        let container = codec.decode(path)?;
        let info = container.info();
        info!(
            "[PATCH] seed {} for {} (player {}, race: {}), digest {}",
            info.seed_name.as_deref().unwrap_or("?"),
            info.player_name.as_deref().unwrap_or("?"),
            info.player_id.map(|id| id.to_string()).unwrap_or_else(|| "?".into()),
            info.race.unwrap_or(false),
            container.content_digest
        );
        Ok(container)
    }

    async fn install_all(
        &self,
        forge_dir: &Path,
        manifest: &DependencyManifest,
    ) -> LauncherResult<Outcome> {
        if self.bundled_runtime {
            self.install_runtime(&manifest.runtime_version).await?;
        }

        if is_correct_version_installed(forge_dir, &manifest.server_distribution) {
            info!(
                "[INSTALL] Forge {} already installed",
                forge_version_token(&manifest.server_distribution)
            );
        } else {
            let java = self.java_binary(manifest)?;
            self.install_server(forge_dir, manifest, &java).await?;
        }
        Ok(Outcome::Installed)
    }

    /// Private JDK on platforms that bundle one; a failed install may be
    /// skipped if the user agrees.
    async fn ensure_runtime(&self, manifest: &DependencyManifest) -> LauncherResult<()> {
        if !self.bundled_runtime || self.state.settings.java.is_some() {
            return Ok(());
        }
        let version = &manifest.runtime_version;
        if find_jdk_dir(self.state.paths.runtimes_dir(), version).is_some() {
            return Ok(());
        }

        if !self
            .prompt
            .confirm(&format!("Java {} not found. Download and install it?", version))
            .await?
        {
            return Err(LauncherError::MissingDependency(format!(
                "Java {} is required to run the server",
                version
            )));
        }
        self.install_runtime(version).await
    }

    /// Install the bundled JDK; if that fails the user may carry on without it.
    async fn install_runtime(&self, version: &str) -> LauncherResult<()> {
        match self
            .runtime_installer
            .install(&self.state.downloader, self.state.paths.runtimes_dir(), version)
            .await
        {
            Ok(_) => Ok(()),
            Err(LauncherError::Cancelled) => Err(LauncherError::Cancelled),
            Err(err) => {
                error!("[INSTALL] Java {} could not be installed: {}", version, err);
                if self.prompt.confirm("Continue without installing Java?").await? {
                    warn!("[INSTALL] Continuing without Java {}", version);
                    Ok(())
                } else {
                    Err(err)
                }
            }
        }
    }

    fn java_binary(&self, manifest: &DependencyManifest) -> LauncherResult<PathBuf> {
        let java = find_java_binary(
            self.state.paths.runtimes_dir(),
            &manifest.runtime_version,
            self.state.settings.java.as_deref(),
        )?;
        info!("Using Java {:?}", java);
        Ok(java)
    }

    async fn ensure_server(
        &self,
        forge_dir: &Path,
        manifest: &DependencyManifest,
        java: &Path,
    ) -> LauncherResult<()> {
        if is_correct_version_installed(forge_dir, &manifest.server_distribution) {
            return Ok(());
        }

        let token = forge_version_token(&manifest.server_distribution);
        if !self
            .prompt
            .confirm(&format!(
                "Forge {} not found in {:?}. Install it now?",
                token, forge_dir
            ))
            .await?
        {
            return Err(LauncherError::MissingDependency(format!(
                "Forge {} is required to run the server",
                token
            )));
        }
        self.install_server(forge_dir, manifest, java).await
    }

    async fn install_server(
        &self,
        forge_dir: &Path,
        manifest: &DependencyManifest,
        java: &Path,
    ) -> LauncherResult<()> {
        self.forge_installer
            .install_server(InstallContext {
                server_dir: forge_dir,
                distribution: &manifest.server_distribution,
                java_bin: java,
                downloader: &self.state.downloader,
            })
            .await?;

        if is_correct_version_installed(forge_dir, &manifest.server_distribution) {
            Ok(())
        } else {
            Err(LauncherError::MissingDependency(format!(
                "Forge {} is still not installed; the installer likely failed",
                forge_version_token(&manifest.server_distribution)
            )))
        }
    }

    async fn sync_mod(
        &self,
        forge_dir: &Path,
        manifest: &DependencyManifest,
    ) -> LauncherResult<()> {
        let mods_dir = forge_dir.join("mods");
        let sync = ModSynchronizer::new(&self.state.downloader, &self.state.profile.mod_naming);
        if sync.is_current(&mods_dir, &manifest.mod_url)? {
            return Ok(());
        }

        let url = &manifest.mod_url;
        let name = url.rsplit('/').next().unwrap_or(url);
        if !self
            .prompt
            .confirm(&format!("New randomizer mod {} found. Download and install it?", name))
            .await?
        {
            warn!("[MOD] Keeping the installed mod; it may not match this patch");
            return Ok(());
        }
        match sync.reconcile(&mods_dir, url).await? {
            SyncOutcome::UpToDate(path) => info!("[MOD] {:?} already installed", path),
            SyncOutcome::Replaced { installed, removed } => info!(
                "[MOD] Installed {:?}, removed {} old file(s)",
                installed,
                removed.len()
            ),
        }
        Ok(())
    }
}

fn rewrite_connection(delivered: &Path, host: &str, port: u16) -> LauncherResult<()> {
    let text = std::fs::read_to_string(delivered).map_err(LauncherError::io(delivered))?;
    let updated = update_connection(&text, host, port)?;
    std::fs::write(delivered, updated).map_err(LauncherError::io(delivered))?;
    info!("[PATCH] Pointed patch at {}:{}", host, port);
    Ok(())
}

/// Report how the run ended and return the process exit code.
pub fn finish(result: &LauncherResult<Outcome>) -> i32 {
    match result {
        Ok(outcome) => {
            println!("{}", outcome.summary());
            0
        }
        Err(err) => {
            error!("{}", err);
            eprintln!("Error: {}", err);
            err.exit_code()
        }
    }
}

/// Wait for Enter so a double-clicked console window stays readable.
/// Returns at once when stdin is not a terminal or on Ctrl-C.
pub async fn wait_for_enter() {
    if !std::io::stdin().is_terminal() {
        return;
    }
    println!("Press enter to exit.");
    let read = tokio::task::spawn_blocking(|| {
        let mut line = String::new();
        let _ = std::io::stdin().read_line(&mut line);
    });
    tokio::select! {
        _ = read => {}
        _ = tokio::signal::ctrl_c() => {}
    }
}
