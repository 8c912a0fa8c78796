// This file is dual licensed under the terms of the Apache License, Version
// 2.0, and the BSD License. See the LICENSE file in the root of this repository
// for complete details.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PackageNameError {
    #[error("names must have at least one character")]
    TooShort,

    #[error("names must begin with an alpha character")]
    NoStartingAlpha { name: String },

    #[error("names must contain only alphanumeric characters, '-', or '_'")]
    InvalidCharacter { name: String, character: char },
}

/// A crates.io-shaped package name: starts with an ASCII letter, followed
/// by letters, digits, `-`, or `_`. Stored lower-cased so it can be used
/// directly to derive the index path layout (§4.D), which is
/// case-insensitive on disk.
#[derive(Serialize, Deserialize, Clone, Eq, Debug, Hash, PartialEq, PartialOrd, Ord)]
#[serde(transparent)]
pub struct PackageName(String);

impl PackageName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PackageName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PackageName {
    type Err = PackageNameError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value.is_empty() {
            return Err(PackageNameError::TooShort);
        }
        if !value.starts_with(|c: char| c.is_ascii_alphabetic()) {
            return Err(PackageNameError::NoStartingAlpha {
                name: value.to_string(),
            });
        }
        for c in value.chars() {
            if !(c.is_ascii_alphanumeric() || c == '-' || c == '_') {
                return Err(PackageNameError::InvalidCharacter {
                    name: value.to_string(),
                    character: c,
                });
            }
        }

        Ok(PackageName(value.to_ascii_lowercase()))
    }
}

/// The `kind` of a dependency edge in a version record, per §3.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Eq, PartialEq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DependencyKind {
    Normal,
    Build,
    Dev,
}

/// One entry of a version record's `deps` list (§3).
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Dep {
    pub name: String,
    pub req: String,
    #[serde(default = "DependencyKind::default_normal")]
    pub kind: DependencyKind,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub package: Option<String>,
}

impl DependencyKind {
    fn default_normal() -> DependencyKind {
        DependencyKind::Normal
    }
}

impl Dep {
    /// The name the dependency must actually be resolved against: `package`
    /// when present (the outer `name` is then just a local alias), else
    /// `name` itself. See §3 and S6.
    pub fn dependency_name(&self) -> &str {
        self.package.as_deref().unwrap_or(&self.name)
    }
}

/// One line of a package's index file (§3).
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct VersionRecord {
    pub name: String,
    pub vers: String,
    #[serde(default)]
    pub yanked: bool,
    #[serde(default)]
    pub deps: Vec<Dep>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn package_name_allows_hyphen_and_underscore() {
        assert!("serde-json".parse::<PackageName>().is_ok());
        assert!("serde_json".parse::<PackageName>().is_ok());
        assert!("1password".parse::<PackageName>().is_err());
        assert_eq!(
            "Mixed-Case".parse::<PackageName>().unwrap().as_str(),
            "mixed-case"
        );
    }

    #[test]
    fn dep_uses_package_rename_when_present() {
        let dep: Dep = serde_json::from_str(
            r#"{"name":"foo-alias","req":"^1","package":"foo","kind":"normal","optional":false}"#,
        )
        .unwrap();
        assert_eq!(dep.dependency_name(), "foo");
    }
}
