mod sync;

pub use sync::{ModNaming, ModSynchronizer, SyncOutcome};
