//! Per-invocation orchestration.
//!
//! For each module the host asks about, decide whether to build from source,
//! skip an unsupported platform, or resolve prebuilt artifacts through the
//! cache → fetch → override pipeline, then run the companion updater once.

use std::path::{Path, PathBuf};

use rayon::prelude::{IntoParallelRefIterator, ParallelIterator};

use prefab_config::Manifest;
use prefab_keys::{
    join_segment, ArtifactKey, ArtifactNaming, BuildSettings, Configuration, LinkMode, Platform,
};
use prefab_util::process::ProcessControl;

use crate::cache::{self, CacheStatus};
use crate::companion::{self, CompanionOutcome, CompanionSpec};
use crate::error::EngineError;
use crate::fetch::{self, ArtifactKind, FetchOptions, RemoteOrigin};
use crate::overrides::{self, OverrideDecision};

/// Everything needed to resolve one module's artifacts.
#[derive(Debug)]
pub struct ResolveRequest<'a> {
    /// Module name; artifact file names are derived from it.
    pub module: &'a str,
    pub key: ArtifactKey,
    pub settings: BuildSettings,
    pub origin: &'a RemoteOrigin,
    /// Cache root; artifacts land at `<cache_root>/<version>/<segment>/<file>`.
    pub cache_root: &'a Path,
    /// Directory dynamic loader files are installed into.
    pub loader_dir: &'a Path,
    /// Base directory searched (per segment) for locally built artifacts.
    pub override_root: Option<&'a Path>,
    /// When this path exists, the module is built from source and no
    /// prebuilt artifact is resolved.
    pub source_probe: Option<&'a Path>,
    pub options: FetchOptions,
}

/// How a module resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleResolution {
    /// The module's own source is present; nothing to link.
    BuildFromSource,
    /// No prebuilt artifacts exist for this platform; nothing to link.
    Unsupported,
    /// Artifact paths to hand to the link step, in segment order.
    Resolved {
        link_paths: Vec<PathBuf>,
        loader_paths: Vec<PathBuf>,
    },
}

/// Resolve one module.
///
/// Multi-architecture platforms fan out to one artifact per path segment;
/// the segments are independent and resolved in parallel.
///
/// # Errors
/// Returns an error if a required artifact cannot be fetched or installed.
/// An unsupported platform is not an error.
pub fn resolve_module(req: &ResolveRequest<'_>) -> Result<ModuleResolution, EngineError> {
    if let Some(probe) = req.source_probe {
        if probe.exists() {
            eprintln!("    Building {} from source.", req.module);
            return Ok(ModuleResolution::BuildFromSource);
        }
    }

    let resolution = prefab_keys::resolve(&req.key, &req.settings);
    if resolution.is_unsupported() {
        return Ok(ModuleResolution::Unsupported);
    }

    let dynamic = req.key.link_mode == LinkMode::Dynamic;

    let per_segment: Vec<(PathBuf, Option<PathBuf>)> = resolution
        .segments
        .par_iter()
        .map(|segment| resolve_segment(req, &resolution.naming, segment, dynamic))
        .collect::<Result<Vec<_>, EngineError>>()?;

    let mut link_paths = Vec::new();
    let mut loader_paths = Vec::new();
    for (link, loader) in per_segment {
        link_paths.push(link);
        if let Some(path) = loader {
            if !loader_paths.contains(&path) {
                loader_paths.push(path);
            }
        }
    }

    Ok(ModuleResolution::Resolved {
        link_paths,
        loader_paths,
    })
}

/// Resolve one path segment of a module: probe the cache, fetch on a miss,
/// then let a newer locally built artifact supersede the result.
fn resolve_segment(
    req: &ResolveRequest<'_>,
    naming: &ArtifactNaming,
    segment: &str,
    dynamic: bool,
) -> Result<(PathBuf, Option<PathBuf>), EngineError> {
    let file_name = naming.file_name(req.module);
    let loader_name = naming.loader_file_name(req.module);

    let lib_dir = join_segment(&req.cache_root.join(req.origin.version()), segment);
    let canonical = lib_dir.join(&file_name);
    let override_candidate = req
        .override_root
        .map(|root| join_segment(root, segment).join(&file_name));

    match cache::probe(&canonical, override_candidate.as_deref()) {
        CacheStatus::Hit(_) => {}
        CacheStatus::Miss => {
            fetch_segment(req, segment, &canonical, &file_name, &loader_name, dynamic)?;
        }
        CacheStatus::StaleOverrideAvailable(fallback) => {
            // A locally built artifact can still serve the link step if the
            // origin is unreachable; only a bare miss makes that fatal.
            if let Err(e) =
                fetch_segment(req, segment, &canonical, &file_name, &loader_name, dynamic)
            {
                // The fallback must pass the same validity rules as any
                // override; a pre-epoch leftover does not rescue the fetch.
                match overrides::resolve_override(&canonical, &fallback) {
                    OverrideDecision::UseOverride(path) => {
                        eprintln!(
                            "    Cannot refresh {} from origin ({e}) — using locally built artifact.",
                            req.module
                        );
                        let loader = loader_if_on_disk(req, &loader_name, dynamic);
                        return Ok((path, loader));
                    }
                    OverrideDecision::UseCached => return Err(e),
                }
            }
        }
    }

    let link_path = match override_candidate
        .as_deref()
        .map(|candidate| overrides::resolve_override(&canonical, candidate))
    {
        Some(OverrideDecision::UseOverride(path)) => {
            eprintln!("    Using locally built {}.", req.module);
            path
        }
        _ => canonical,
    };

    let loader = dynamic.then(|| req.loader_dir.join(&loader_name));
    Ok((link_path, loader))
}

/// Fetch a segment's artifacts. In dynamic link mode the loader comes first:
/// it is the likelier failure (the host may be running and holding it open),
/// and failing fast avoids installing a primary artifact without its loader.
fn fetch_segment(
    req: &ResolveRequest<'_>,
    segment: &str,
    canonical: &Path,
    file_name: &str,
    loader_name: &str,
    dynamic: bool,
) -> Result<(), EngineError> {
    if dynamic {
        let url = req
            .origin
            .url_for(ArtifactKind::Lib, Some(segment), loader_name);
        let dest = req.loader_dir.join(loader_name);
        fetch::fetch(&url, &dest, req.module, req.origin.version(), &req.options)?;
    }

    let url = req.origin.url_for(ArtifactKind::Lib, Some(segment), file_name);
    fetch::fetch(&url, canonical, req.module, req.origin.version(), &req.options)?;
    Ok(())
}

fn loader_if_on_disk(
    req: &ResolveRequest<'_>,
    loader_name: &str,
    dynamic: bool,
) -> Option<PathBuf> {
    if !dynamic {
        return None;
    }
    let path = req.loader_dir.join(loader_name);
    path.is_file().then_some(path)
}

/// Host-side inputs shared by all modules of one build invocation.
#[derive(Debug)]
pub struct HostContext<'a> {
    pub platform: Platform,
    pub configuration: Configuration,
    pub link_mode: LinkMode,
    /// Root that manifest-relative paths resolve against.
    pub project_root: &'a Path,
    pub cache_root: &'a Path,
    pub loader_dir: &'a Path,
    pub options: FetchOptions,
}

/// Everything a build invocation gets back.
#[derive(Debug)]
pub struct InvocationResult {
    /// Artifact paths for the link step, across all modules.
    pub link_paths: Vec<PathBuf>,
    /// Dynamic loader paths installed alongside the host binaries.
    pub loader_paths: Vec<PathBuf>,
    /// Companion updater outcome, when the manifest declares one.
    pub companion: Option<CompanionOutcome>,
}

/// Resolve every module in a manifest, then run the companion updater once.
///
/// This is the library entry point called from the host build descriptor's
/// evaluation phase.
///
/// # Errors
/// Returns an error if the manifest settings are invalid or any required
/// artifact cannot be acquired.
pub fn resolve_manifest(
    manifest: &Manifest,
    host: &HostContext<'_>,
    processes: &dyn ProcessControl,
) -> Result<InvocationResult, EngineError> {
    let settings = manifest.build_settings()?;
    let origin = RemoteOrigin::new(&manifest.origin.base_url, &manifest.origin.version)?;
    let key = ArtifactKey {
        platform: host.platform,
        configuration: host.configuration,
        link_mode: host.link_mode,
    };

    let mut link_paths = Vec::new();
    let mut loader_paths = Vec::new();

    for module in &manifest.modules {
        let source_probe = module
            .source_probe
            .as_ref()
            .map(|p| host.project_root.join(p));
        let override_root = module
            .override_dir
            .as_ref()
            .map(|p| host.project_root.join(p));

        let request = ResolveRequest {
            module: &module.name,
            key,
            settings,
            origin: &origin,
            cache_root: host.cache_root,
            loader_dir: host.loader_dir,
            override_root: override_root.as_deref(),
            source_probe: source_probe.as_deref(),
            options: host.options,
        };

        if let ModuleResolution::Resolved {
            link_paths: links,
            loader_paths: loaders,
        } = resolve_module(&request)?
        {
            link_paths.extend(links);
            loader_paths.extend(loaders);
        }
    }

    let companion = match &manifest.companion {
        Some(c) => {
            let spec = CompanionSpec::new(
                host.project_root.join(&c.install_dir),
                c.executable.clone(),
                c.process_name.clone(),
            );
            Some(companion::update(&spec, &origin, processes, &host.options)?)
        }
        None => None,
    };

    Ok(InvocationResult {
        link_paths,
        loader_paths,
        companion,
    })
}
