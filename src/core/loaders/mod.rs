pub mod context;
pub mod forge;

pub use context::InstallContext;
pub use forge::{forge_version_token, is_correct_version_installed, ForgeInstaller};
