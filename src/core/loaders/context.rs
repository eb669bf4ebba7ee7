use std::path::Path;

use crate::core::downloader::Downloader;

/// Everything a server installer needs for one run.
pub struct InstallContext<'a> {
    /// Server root the distribution is installed into.
    pub server_dir: &'a Path,
    /// Version token or installer URL from the dependency manifest.
    pub distribution: &'a str,
    /// Java used to execute the installer.
    pub java_bin: &'a Path,
    pub downloader: &'a Downloader,
}
