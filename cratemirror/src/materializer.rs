// This file is dual licensed under the terms of the Apache License, Version
// 2.0, and the BSD License. See the LICENSE file in the root of this repository
// for complete details.

//! Emitting a pruned index tree in the registry's canonical path layout
//! (§4.G), from the selected catalog the resolver produced.

use camino::{Utf8Path, Utf8PathBuf};
use indexmap::{IndexMap, IndexSet};
use log::{debug, info};

use crate::errors::MaterializeError;
use crate::exclude::ExclusionSet;
use crate::index;
use crate::types::PackageName;

const LOGNAME: &str = "cratemirror::materializer";

/// Materialize `selected` (the resolver's projected catalog, §3) into
/// `dest_root`, reading source records from `index_root`. Per §4.G:
///
/// 1. Purge prefix-bucket directories already present at `dest_root`
///    (names of length <= 2), leaving ancillary files (registry config, VCS
///    metadata) untouched.
/// 2. For each selected package, filter its source index lines down to the
///    selected versions, preserving file order, and write the result —
///    byte-identical to the retained source lines plus a trailing blank
///    line — to the canonical path under `dest_root`.
/// 3. Excluded packages are skipped; a stale file already at their
///    destination path is removed.
pub fn materialize(
    selected: &IndexMap<PackageName, IndexSet<String>>,
    index_root: &Utf8Path,
    dest_root: &Utf8Path,
    exclusions: &ExclusionSet,
) -> Result<(), MaterializeError> {
    std::fs::create_dir_all(dest_root).map_err(|source| MaterializeError::Walk {
        path: dest_root.to_string(),
        source,
    })?;
    purge_prefix_buckets(dest_root)?;

    for (name, versions) in selected {
        let dest_path = dest_root.join(index::prefixed_path(name));

        if exclusions.excludes(name.as_str()) {
            if dest_path.is_file() {
                debug!(target: LOGNAME, "removing stale excluded entry {dest_path}");
                std::fs::remove_file(&dest_path).map_err(|source| MaterializeError::Remove {
                    path: dest_path.to_string(),
                    source,
                })?;
            }
            continue;
        }

        let idx = index::read(index_root, name).map_err(|source| MaterializeError::ReadIndex {
            name: name.clone(),
            source,
        })?;

        let mut kept: Vec<&str> = Vec::new();
        for (record, line) in idx.records().iter().zip(idx.raw_lines()) {
            if versions.contains(&record.vers) {
                kept.push(line.as_str());
            }
        }
        // A trailing empty element makes `join` append the final blank line
        // §4.G step 3 requires, without the caller having to special-case
        // the already-correct separator between retained lines.
        kept.push("");
        let content = kept.join("\n");

        if let Some(parent) = dest_path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| MaterializeError::Walk {
                path: parent.to_string(),
                source,
            })?;
        }
        write_atomic(&dest_path, &content).map_err(|source| MaterializeError::WriteIndex {
            name: name.clone(),
            source,
        })?;
    }

    info!(target: LOGNAME, "materialized {} packages to {dest_root}", selected.len());
    Ok(())
}

/// Stage-to-temp-then-rename, so a crash mid-write never leaves a partial
/// index file in place (mirrors the atomicity the fetcher's archive writes
/// already require per §5, even though §4.G itself doesn't spell it out).
fn write_atomic(path: &Utf8Path, content: &str) -> std::io::Result<()> {
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, content)?;
    std::fs::rename(&tmp, path)
}

/// Remove every top-level entry of `dest_root` whose name has length <= 2
/// (the prefix buckets `1/`, `2/`, `3/`, `ab/`, ...), leaving anything else
/// — a `config.json`, a `.git` directory — untouched.
fn purge_prefix_buckets(dest_root: &Utf8Path) -> Result<(), MaterializeError> {
    let entries = std::fs::read_dir(dest_root).map_err(|source| MaterializeError::Walk {
        path: dest_root.to_string(),
        source,
    })?;

    for entry in entries {
        let entry = entry.map_err(|source| MaterializeError::Walk {
            path: dest_root.to_string(),
            source,
        })?;
        let path = Utf8PathBuf::from_path_buf(entry.path())
            .unwrap_or_else(|p| panic!("non-utf8 path in index tree: {p:?}"));
        let is_bucket = entry.file_type().map(|t| t.is_dir()).unwrap_or(false)
            && path.file_name().map(|n| n.len() <= 2).unwrap_or(false);
        if is_bucket {
            debug!(target: LOGNAME, "purging stale prefix bucket {path}");
            std::fs::remove_dir_all(&path).map_err(|source| MaterializeError::Remove {
                path: path.to_string(),
                source,
            })?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_source(root: &Utf8Path, name: &str, lines: &[&str]) {
        let path = root.join(index::prefixed_path(&name.parse().unwrap()));
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, lines.join("\n") + "\n").unwrap();
    }

    fn catalog(entries: &[(&str, &[&str])]) -> IndexMap<PackageName, IndexSet<String>> {
        entries
            .iter()
            .map(|(name, versions)| {
                (
                    name.parse().unwrap(),
                    versions.iter().map(|v| v.to_string()).collect(),
                )
            })
            .collect()
    }

    #[test]
    fn filters_to_selected_versions_preserving_order() {
        let src = tempfile::tempdir().unwrap();
        let src_root = Utf8Path::from_path(src.path()).unwrap();
        let dst = tempfile::tempdir().unwrap();
        let dst_root = Utf8Path::from_path(dst.path()).unwrap();

        write_source(
            src_root,
            "a",
            &[
                r#"{"name":"a","vers":"1.0.0","yanked":false,"deps":[]}"#,
                r#"{"name":"a","vers":"2.0.0","yanked":false,"deps":[]}"#,
                r#"{"name":"a","vers":"3.0.0","yanked":false,"deps":[]}"#,
            ],
        );

        let selected = catalog(&[("a", &["1.0.0", "3.0.0"])]);
        let exclusions = ExclusionSet::default();
        materialize(&selected, src_root, dst_root, &exclusions).unwrap();

        let written = std::fs::read_to_string(dst_root.join("1/a")).unwrap();
        let lines: Vec<&str> = written.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("1.0.0"));
        assert!(lines[1].contains("3.0.0"));
        assert!(written.ends_with('\n'));
    }

    #[test]
    fn excluded_package_is_skipped_and_stale_file_removed() {
        let src = tempfile::tempdir().unwrap();
        let src_root = Utf8Path::from_path(src.path()).unwrap();
        let dst = tempfile::tempdir().unwrap();
        let dst_root = Utf8Path::from_path(dst.path()).unwrap();

        write_source(
            src_root,
            "banned",
            &[r#"{"name":"banned","vers":"1.0.0","yanked":false,"deps":[]}"#],
        );
        let dest_path = dst_root.join(index::prefixed_path(&"banned".parse().unwrap()));
        std::fs::create_dir_all(dest_path.parent().unwrap()).unwrap();
        std::fs::write(&dest_path, "stale").unwrap();

        let selected = catalog(&[("banned", &["1.0.0"])]);
        let exclusions = ExclusionSet::compile(["banned"]).unwrap();
        materialize(&selected, src_root, dst_root, &exclusions).unwrap();

        assert!(!dest_path.is_file());
    }

    #[test]
    fn purges_stale_prefix_buckets_but_not_ancillary_files() {
        let src = tempfile::tempdir().unwrap();
        let src_root = Utf8Path::from_path(src.path()).unwrap();
        let dst = tempfile::tempdir().unwrap();
        let dst_root = Utf8Path::from_path(dst.path()).unwrap();

        std::fs::create_dir_all(dst_root.join("1")).unwrap();
        std::fs::write(dst_root.join("1/old"), "stale").unwrap();
        std::fs::write(dst_root.join("config.json"), "{}").unwrap();

        write_source(
            src_root,
            "a",
            &[r#"{"name":"a","vers":"1.0.0","yanked":false,"deps":[]}"#],
        );
        let selected = catalog(&[("a", &["1.0.0"])]);
        let exclusions = ExclusionSet::default();
        materialize(&selected, src_root, dst_root, &exclusions).unwrap();

        assert!(!dst_root.join("1/old").exists());
        assert!(dst_root.join("config.json").is_file());
        assert!(dst_root.join("1/a").is_file());
    }

}
