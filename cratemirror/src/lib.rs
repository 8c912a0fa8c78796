// This file is dual licensed under the terms of the Apache License, Version
// 2.0, and the BSD License. See the LICENSE file in the root of this repository
// for complete details.

//! A curated mirror builder for a crates.io-shaped package index: seed a
//! worklist from the upstream catalog, resolve it to a transitive closure,
//! materialize a pruned index tree, and fetch the archives it names.

use camino::Utf8Path;
use log::info;
use thiserror::Error;

use crate::progress::Progress;
use crate::resolver::Seen;

pub mod catalog;
pub mod config;
pub mod errors;
pub mod exclude;
pub mod fetcher;
pub mod index;
pub mod materializer;
pub mod progress;
pub mod requirement;
pub mod resolver;
pub mod seed;
pub mod selector;
pub mod semver;
pub mod state;
pub mod types;

pub use config::RegistryConfig;
pub use errors::MirrorError;
pub use fetcher::FetchSummary;

const LOGNAME: &str = "cratemirror";

#[derive(Error, Debug)]
pub enum RunError {
    #[error(transparent)]
    Mirror(#[from] MirrorError),
}

/// Owns the config driving a single build and sequences the pipeline's four
/// phases (§2 data flow: F -> E -> G, H).
///
/// `T` is whatever handle the caller's progress backend needs to track a
/// running spinner (an `indicatif::ProgressBar`, an id into a map of them,
/// or `()` when no reporting is wanted) — the builder itself only ever
/// starts and finishes one, never inspects it.
pub struct MirrorBuilder<'p, T> {
    config: RegistryConfig,
    exclusions: exclude::ExclusionSet,
    progress: Progress<'p, T>,
}

impl<'p, T> MirrorBuilder<'p, T> {
    pub fn new(config: RegistryConfig) -> Result<MirrorBuilder<'p, T>, RunError> {
        let exclusions = exclude::ExclusionSet::compile(&config.exclusions)
            .map_err(errors::ConfigError::from)
            .map_err(MirrorError::from)?;
        Ok(MirrorBuilder {
            config,
            exclusions,
            progress: Progress::new(),
        })
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Register a callback invoked when a phase starts, given the spinner
    /// message, returning the caller's handle for it.
    pub fn with_progress_spinner(&mut self, cb: impl FnMut(&'static str) -> T + 'p) {
        self.progress.with_progress_spinner(cb);
    }

    /// Register a callback invoked when a phase completes.
    pub fn with_progress_finish(&mut self, cb: impl FnMut(&T) + 'p) {
        self.progress.with_progress_finish(cb);
    }

    /// Build the seed worklist (§4.F) from the catalog API, optionally
    /// reusing a previously persisted one instead of hitting the network.
    pub fn seed(&self, client: &dyn catalog::CatalogClient) -> Result<resolver::Worklist, RunError> {
        info!(target: LOGNAME, "building seed worklist");
        let bar = self.progress.spinner("seeding worklist from upstream catalog");
        let worklist = seed::build(client, &self.config, &self.exclusions)
            .map_err(MirrorError::from)?;
        bar.finish();
        info!(target: LOGNAME, "seed worklist has {} packages", worklist.len());
        Ok(worklist)
    }

    /// Resolve `worklist` to a transitive closure (§4.E) against the
    /// upstream index tree named by `config.upstream_index`.
    pub fn resolve(&self, worklist: resolver::Worklist) -> resolver::ResolveOutcome {
        let index_root = utf8(&self.config.upstream_index);
        let bar = self.progress.spinner("resolving transitive dependencies");
        let outcome = resolver::resolve(
            worklist,
            index_root,
            &self.exclusions,
            resolver::DEFAULT_MAX_ITERATIONS,
        );
        bar.finish();
        outcome
    }

    /// Materialize a pruned index tree (§4.G) from `seen` into the output
    /// tree selected by `git_registry`.
    pub fn materialize(&self, seen: &Seen, git_registry: bool) -> Result<(), RunError> {
        let dest = self
            .config
            .output_root(git_registry)
            .map_err(MirrorError::from)?;
        let selected = resolver::project_catalog(seen);
        let bar = self.progress.spinner("materializing pruned index");
        materializer::materialize(
            &selected,
            utf8(&self.config.upstream_index),
            utf8(dest),
            &self.exclusions,
        )
        .map_err(MirrorError::from)?;
        bar.finish();
        Ok(())
    }

    /// Fetch missing archives for `seen` (§4.H), purging unused ones when
    /// `purge` is set.
    pub fn fetch(
        &self,
        seen: &Seen,
        purge: bool,
        on_progress: impl FnMut(u64, u64) + Send,
    ) -> Result<FetchSummary, RunError> {
        let selected = resolver::project_catalog(seen);
        let archives_dir = utf8(&self.config.archives);
        let summary = fetcher::fetch(
            &selected,
            archives_dir,
            &self.config.archive_url,
            self.config.download_workers,
            purge,
            || catalog::HttpArchiveClient::new().expect("failed to build HTTP client"),
            on_progress,
        )
        .map_err(MirrorError::from)?;
        Ok(summary)
    }
}

fn utf8(path: &std::path::Path) -> &Utf8Path {
    Utf8Path::from_path(path).unwrap_or_else(|| panic!("path is not valid UTF-8: {path:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(dir: &std::path::Path) -> RegistryConfig {
        let path = dir.join("cratemirror.toml");
        std::fs::write(
            &path,
            format!(
                r#"
                upstream-index = "{idx}"
                local-registry = "{local}"
                archives = "{archives}"
                top-crates = 0
                categories = []
                "#,
                idx = dir.join("index").display(),
                local = dir.join("local").display(),
                archives = dir.join("archives").display(),
            ),
        )
        .unwrap();
        RegistryConfig::load(&path).unwrap()
    }

    #[test]
    fn builder_resolves_an_empty_worklist_to_an_empty_seen_set() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        std::fs::create_dir_all(&config.upstream_index).unwrap();
        let builder = MirrorBuilder::<()>::new(config).unwrap();

        let outcome = builder.resolve(resolver::Worklist::new());
        assert!(outcome.seen.is_empty());
        assert!(!outcome.iteration_budget_exceeded);
    }

    #[test]
    fn materialize_without_git_registry_uses_local_registry_root() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        std::fs::create_dir_all(&config.upstream_index).unwrap();
        let builder = MirrorBuilder::<()>::new(config).unwrap();

        let seen = Seen::new();
        builder.materialize(&seen, false).unwrap();
        assert!(builder.config().local_registry.is_dir());
    }
}
