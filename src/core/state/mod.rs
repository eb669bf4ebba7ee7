pub mod app_state;
pub mod paths;
pub mod variant;

pub use app_state::{AppState, SettingsFile};
pub use paths::runtime_paths;
pub use variant::GameVariant;
