pub mod runtime;

pub use runtime::find_java_binary;
pub use runtime::find_jdk_dir;
pub use runtime::uses_bundled_runtime;
pub use runtime::RuntimeInstaller;
