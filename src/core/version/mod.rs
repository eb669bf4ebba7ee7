pub mod manifest;

pub use manifest::{
    DependencyManifest, ManifestEntry, ManifestResolver, ManifestSource, DEFAULT_MANIFEST_URL,
};
