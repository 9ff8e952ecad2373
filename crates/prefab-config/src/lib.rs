#![forbid(unsafe_code)]
//! Parse and validate `prefab.toml`.

pub mod manifest;

pub use manifest::{Companion, Manifest, ManifestError, ModuleEntry, Origin};
