#![forbid(unsafe_code)]
//! Prebuilt artifact acquisition for Prefab: cache probing, remote fetching,
//! local-override resolution, and companion-executable updates.

pub mod cache;
pub mod companion;
pub mod error;
pub mod fetch;
pub mod overrides;
pub mod resolve;

#[cfg(test)]
pub(crate) mod testutil;

pub use cache::CacheStatus;
pub use companion::{CompanionOutcome, CompanionSpec};
pub use error::EngineError;
pub use fetch::{ArtifactKind, FetchOptions, FetchedArtifact, RemoteOrigin};
pub use overrides::OverrideDecision;
pub use resolve::{
    resolve_manifest, resolve_module, HostContext, InvocationResult, ModuleResolution,
    ResolveRequest,
};
