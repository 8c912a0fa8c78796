// This file is dual licensed under the terms of the Apache License, Version
// 2.0, and the BSD License. See the LICENSE file in the root of this repository
// for complete details.

//! The TOML configuration file (§6 "Configuration file"): what packages to
//! seed, where the upstream index and output trees live, and the knobs the
//! rest of the pipeline needs that spec.md treats as externally supplied.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use url::Url;

use crate::errors::ConfigError;

const DEFAULT_CATALOG_URL: &str = "https://crates.io/api/v1/crates";
const DEFAULT_COOKBOOK_URL: &str =
    "https://raw.githubusercontent.com/rust-lang-nursery/rust-cookbook/master/Cargo.toml";
const DEFAULT_ARCHIVE_URL: &str = "https://crates.io/api/v1/crates/";

fn default_top_crates() -> u32 {
    500
}

fn default_download_workers() -> usize {
    16
}

/// The original mirror builder's hardcoded per-category pull list (§9
/// "Category top-N list is config-driven"): reproduced here as the default
/// so an unconfigured checkout still seeds the same categories.
fn default_categories() -> Vec<CategoryPull> {
    [
        ("network-programming", 50),
        ("filesystem", 50),
        ("web-programming", 50),
        ("mathematics", 50),
        ("science", 50),
        ("data-structures", 50),
        ("asynchronous", 50),
        ("api-bindings", 50),
        ("command-line-utilities", 50),
        ("embedded", 50),
    ]
    .into_iter()
    .map(|(category, count)| CategoryPull {
        category: category.to_string(),
        count,
    })
    .collect()
}

/// One `{ category-name = count }` table from the `categories` list (§6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryPull {
    pub category: String,
    pub count: u32,
}

impl<'de> Deserialize<'de> for CategoryPull {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let map = BTreeMap::<String, u32>::deserialize(deserializer)?;
        let mut entries = map.into_iter();
        let (category, count) = entries
            .next()
            .ok_or_else(|| serde::de::Error::custom("category entry must have exactly one key"))?;
        if entries.next().is_some() {
            return Err(serde::de::Error::custom(
                "category entry must have exactly one key",
            ));
        }
        Ok(CategoryPull { category, count })
    }
}

/// Raw deserialized shape of the TOML document, before URL fields are
/// parsed and validated (§6). Kept separate from `RegistryConfig` so a bad
/// URL string produces `ConfigError::InvalidUrl` rather than a generic
/// `toml::de::Error` that can't name which field was wrong.
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case")]
struct RawConfig {
    #[serde(default = "default_top_crates")]
    top_crates: u32,
    #[serde(default = "default_categories")]
    categories: Vec<CategoryPull>,
    #[serde(default)]
    cookbook: bool,
    #[serde(default)]
    additions: Vec<String>,
    #[serde(default)]
    commands: Vec<String>,
    #[serde(default)]
    exclusions: Vec<String>,
    upstream_index: PathBuf,
    local_registry: PathBuf,
    #[serde(default)]
    git_registry: Option<PathBuf>,
    archives: PathBuf,
    #[serde(default)]
    catalog_url: Option<String>,
    #[serde(default)]
    cookbook_url: Option<String>,
    #[serde(default)]
    archive_url: Option<String>,
    #[serde(default = "default_download_workers")]
    download_workers: usize,
}

/// The parsed, validated configuration driving a mirror build (§6 and the
/// ambient fields SPEC_FULL.md adds on top of `spec.md`'s recognized keys).
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    pub top_crates: u32,
    pub categories: Vec<CategoryPull>,
    pub cookbook: bool,
    pub additions: Vec<String>,
    pub commands: Vec<String>,
    pub exclusions: Vec<String>,
    pub upstream_index: PathBuf,
    pub local_registry: PathBuf,
    pub git_registry: Option<PathBuf>,
    pub archives: PathBuf,
    pub catalog_url: Url,
    pub cookbook_url: Url,
    pub archive_url: Url,
    pub download_workers: usize,
}

impl RegistryConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<RegistryConfig, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let raw: RawConfig = toml::from_str(&contents)?;
        RegistryConfig::from_raw(raw)
    }

    fn from_raw(raw: RawConfig) -> Result<RegistryConfig, ConfigError> {
        let catalog_url = parse_url(raw.catalog_url.as_deref().unwrap_or(DEFAULT_CATALOG_URL))?;
        let cookbook_url =
            parse_url(raw.cookbook_url.as_deref().unwrap_or(DEFAULT_COOKBOOK_URL))?;
        let archive_url = parse_url(raw.archive_url.as_deref().unwrap_or(DEFAULT_ARCHIVE_URL))?;

        Ok(RegistryConfig {
            top_crates: raw.top_crates,
            categories: raw.categories,
            cookbook: raw.cookbook,
            additions: raw.additions,
            commands: raw.commands,
            exclusions: raw.exclusions,
            upstream_index: raw.upstream_index,
            local_registry: raw.local_registry,
            git_registry: raw.git_registry,
            archives: raw.archives,
            catalog_url,
            cookbook_url,
            archive_url,
            download_workers: raw.download_workers,
        })
    }

    /// The output tree to materialize into: the git-registry root when
    /// `-g`/`--git-registry` is set, otherwise the local-registry root
    /// (§6 CLI surface).
    pub fn output_root(&self, git_registry: bool) -> Result<&Path, ConfigError> {
        if git_registry {
            self.git_registry
                .as_deref()
                .ok_or(ConfigError::MissingGitRegistry)
        } else {
            Ok(self.local_registry.as_path())
        }
    }
}

fn parse_url(value: &str) -> Result<Url, ConfigError> {
    Url::parse(value).map_err(|source| ConfigError::InvalidUrl {
        value: value.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_minimal_config_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cratemirror.toml");
        std::fs::write(
            &path,
            r#"
            upstream-index = "/tmp/crates.io-index"
            local-registry = "/tmp/local-registry"
            archives = "/tmp/archives"
            "#,
        )
        .unwrap();

        let config = RegistryConfig::load(&path).unwrap();
        assert_eq!(config.top_crates, 500);
        assert_eq!(config.categories.len(), 10);
        assert_eq!(config.download_workers, 16);
        assert_eq!(config.catalog_url.as_str(), "https://crates.io/api/v1/crates");
        assert!(!config.cookbook);
    }

    #[test]
    fn parses_category_tables() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cratemirror.toml");
        std::fs::write(
            &path,
            r#"
            upstream-index = "/tmp/crates.io-index"
            local-registry = "/tmp/local-registry"
            archives = "/tmp/archives"
            categories = [ { science = 25 }, { embedded = 10 } ]
            additions = ["foo"]
            "#,
        )
        .unwrap();

        let config = RegistryConfig::load(&path).unwrap();
        assert_eq!(config.categories.len(), 2);
        assert_eq!(config.categories[0].category, "science");
        assert_eq!(config.categories[0].count, 25);
        assert_eq!(config.additions, vec!["foo".to_string()]);
    }

    #[test]
    fn output_root_requires_git_registry_when_flag_set() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cratemirror.toml");
        std::fs::write(
            &path,
            r#"
            upstream-index = "/tmp/crates.io-index"
            local-registry = "/tmp/local-registry"
            archives = "/tmp/archives"
            "#,
        )
        .unwrap();

        let config = RegistryConfig::load(&path).unwrap();
        assert!(config.output_root(false).is_ok());
        assert!(matches!(
            config.output_root(true),
            Err(ConfigError::MissingGitRegistry)
        ));
    }
}
