// This file is dual licensed under the terms of the Apache License, Version
// 2.0, and the BSD License. See the LICENSE file in the root of this repository
// for complete details.

use thiserror::Error;

use crate::catalog::CatalogError;
use crate::exclude::ExclusionError;
use crate::index::IndexError;
use crate::requirement::RequirementError;
use crate::types::PackageName;

pub use crate::types::PackageNameError;

/// Top-level error type for the whole pipeline: seed, resolve, materialize,
/// fetch. CLI code converts this (and everything it wraps) via `anyhow`.
///
/// The resolver itself (§4.E) is deliberately infallible: every failure mode
/// it can hit (a missing package, a corrupt index line, a blown iteration
/// budget) is a non-fatal diagnostic that gets logged and skipped rather than
/// propagated, since the whole point of the pass is to produce a best-effort
/// partial mirror rather than to fail the run.
#[derive(Error, Debug)]
pub enum MirrorError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Seed(#[from] SeedError),

    #[error(transparent)]
    Materialize(#[from] MaterializeError),

    #[error(transparent)]
    Fetch(#[from] FetchError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not read configuration file {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration")]
    InvalidConfig(#[from] toml::de::Error),

    #[error("invalid url {value:?}")]
    InvalidUrl {
        value: String,
        #[source]
        source: url::ParseError,
    },

    #[error(transparent)]
    InvalidExclusion(#[from] ExclusionError),

    #[error("--git-registry was requested but no git-registry root is configured")]
    MissingGitRegistry,
}

#[derive(Error, Debug)]
pub enum SeedError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    InvalidRequirement(#[from] RequirementError),

    #[error(transparent)]
    InvalidPackageName(#[from] PackageNameError),

    #[error(transparent)]
    InvalidExclusion(#[from] ExclusionError),

    #[error("could not parse cookbook manifest")]
    InvalidCookbookManifest(#[from] toml::de::Error),
}

#[derive(Error, Debug)]
pub enum MaterializeError {
    #[error("could not read index file for {name}")]
    ReadIndex {
        name: PackageName,
        #[source]
        source: IndexError,
    },

    #[error("could not write pruned index file for {name}")]
    WriteIndex {
        name: PackageName,
        #[source]
        source: std::io::Error,
    },

    #[error("could not traverse index tree at {path}")]
    Walk {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("could not remove stale entry {path}")]
    Remove {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("could not create archives directory {path}")]
    CreateDir {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("could not list archives directory {path}")]
    ListArchives {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("could not remove unused archive {path}")]
    RemoveUnused {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
