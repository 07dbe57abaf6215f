pub mod manifest;

pub use manifest::{render_compose, render_env_file, DataStoreSummary, Manifest, MANIFEST_VERSION};
