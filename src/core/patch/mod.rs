// ─── Patch Containers ───
// Reads the `.apmc` family of patch files in both on-disk layouts and
// delivers them to the server's `APData/` folder in the legacy layout.

pub mod container;
pub mod delivery;

pub use container::{update_connection, PatchCodec, PatchContainer};
pub use delivery::deliver_patch;
