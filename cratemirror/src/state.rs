// This file is dual licensed under the terms of the Apache License, Version
// 2.0, and the BSD License. See the LICENSE file in the root of this repository
// for complete details.

//! Persisted snapshots (§6 "Persisted state"): `crates.json` (the worklist
//! right after seed-building) and `selected_crates.json` (the selected
//! catalog after resolving). Both are pretty-printed JSON with sorted keys
//! so repeated runs produce a stable diff.

use std::collections::BTreeMap;
use std::path::Path;

use thiserror::Error;

use crate::resolver::{self, RequirementSlot, Seen, Worklist};
use crate::types::PackageName;

#[derive(Error, Debug)]
pub enum StateError {
    #[error("could not read {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("could not write {path}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse {path}")]
    Deserialize {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("could not serialize state for {path}")]
    Serialize {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    InvalidPackageName(#[from] crate::errors::PackageNameError),
}

/// Write `crates.json`: `{ name: [requirement-or-"latest", ...] }`, sorted.
pub fn save_worklist(worklist: &Worklist, path: &Path) -> Result<(), StateError> {
    let mut out: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, reqs) in worklist {
        let mut values: Vec<String> = reqs.iter().map(|r| r.to_string()).collect();
        values.sort();
        out.insert(name.to_string(), values);
    }
    write_pretty(path, &out)
}

/// Load a previously-saved `crates.json` back into a `Worklist`, for the
/// "reuse the existing seed unless `--download` forces a rebuild" flow
/// (§9, original `top-crates.py`'s `Path("crates.json").is_file()` check).
pub fn load_worklist(path: &Path) -> Result<Worklist, StateError> {
    let raw: BTreeMap<String, Vec<String>> = read_json(path)?;
    let mut worklist = Worklist::new();
    for (name, values) in raw {
        let name: PackageName = name.parse()?;
        for value in values {
            resolver::enqueue(&mut worklist, name.clone(), RequirementSlot::from(value));
        }
    }
    Ok(worklist)
}

/// Write `selected_crates.json`: `{ name: [version, ...] }`, sorted, as
/// projected from the resolver's `seen` set.
pub fn save_catalog(seen: &Seen, path: &Path) -> Result<(), StateError> {
    let mut out: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, vers) in seen {
        out.entry(name.to_string()).or_default().push(vers.clone());
    }
    for versions in out.values_mut() {
        versions.sort();
    }
    write_pretty(path, &out)
}

fn write_pretty<T: serde::Serialize>(path: &Path, value: &T) -> Result<(), StateError> {
    let file = std::fs::File::create(path).map_err(|source| StateError::Write {
        path: path.display().to_string(),
        source,
    })?;
    serde_json::to_writer_pretty(file, value).map_err(|source| StateError::Serialize {
        path: path.display().to_string(),
        source,
    })
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, StateError> {
    let contents = std::fs::read_to_string(path).map_err(|source| StateError::Io {
        path: path.display().to_string(),
        source,
    })?;
    serde_json::from_str(&contents).map_err(|source| StateError::Deserialize {
        path: path.display().to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worklist_round_trips_through_json() {
        let mut worklist = Worklist::new();
        resolver::enqueue(
            &mut worklist,
            "foo".parse().unwrap(),
            RequirementSlot::Req("^1".to_string()),
        );
        resolver::enqueue(&mut worklist, "foo".parse().unwrap(), RequirementSlot::Latest);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("crates.json");
        save_worklist(&worklist, &path).unwrap();

        let loaded = load_worklist(&path).unwrap();
        let reqs = loaded.get(&"foo".parse::<PackageName>().unwrap()).unwrap();
        assert!(reqs.contains(&RequirementSlot::Req("^1".to_string())));
        assert!(reqs.contains(&RequirementSlot::Latest));
    }

    #[test]
    fn catalog_snapshot_sorts_versions() {
        let mut seen = Seen::new();
        seen.insert(("foo".parse().unwrap(), "2.0.0".to_string()));
        seen.insert(("foo".parse().unwrap(), "1.0.0".to_string()));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("selected_crates.json");
        save_catalog(&seen, &path).unwrap();

        let raw: BTreeMap<String, Vec<String>> = read_json(&path).unwrap();
        assert_eq!(raw["foo"], vec!["1.0.0".to_string(), "2.0.0".to_string()]);
    }
}
