pub mod args;
pub mod heap;
pub mod readiness;
pub mod supervisor;
pub mod trigger;

pub use args::args_file_path;
pub use heap::HeapSize;
pub use readiness::{Clock, ReadinessMarkers, ReadyWait, TokioClock};
pub use supervisor::{ServerSupervisor, SHUTDOWN_GRACE};
pub use trigger::try_launch;
