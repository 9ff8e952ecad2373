#![forbid(unsafe_code)]
//! Filesystem, download, and process-control plumbing for Prefab.

pub mod download;
pub mod error;
pub mod fs;
pub mod process;
