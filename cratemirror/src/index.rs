// This file is dual licensed under the terms of the Apache License, Version
// 2.0, and the BSD License. See the LICENSE file in the root of this repository
// for complete details.

//! Reading a package's line-delimited version records from the on-disk
//! index tree (§4.D).

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;

use crate::types::{PackageName, VersionRecord};

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("no index file for package {0}")]
    NoSuchPackage(PackageName),

    #[error("could not read index file for {name}")]
    Io {
        name: PackageName,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid version record for {name} on line {line}")]
    InvalidRecord {
        name: PackageName,
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// Compute the canonical index path for a lower-cased package name, per
/// §4.D:
///
/// - length 1 → `1/<name>`
/// - length 2 → `2/<name>`
/// - length 3 → `3/<name[0]>/<name>`
/// - length >= 4 → `<name[0:2]>/<name[2:4]>/<name>`
pub fn prefixed_path(name: &PackageName) -> Utf8PathBuf {
    let n = name.as_str();
    match n.len() {
        1 => Utf8PathBuf::from(format!("1/{n}")),
        2 => Utf8PathBuf::from(format!("2/{n}")),
        3 => Utf8PathBuf::from(format!("3/{}/{n}", &n[0..1])),
        _ => Utf8PathBuf::from(format!("{}/{}/{n}", &n[0..2], &n[2..4])),
    }
}

/// A package's version history in file-line order (oldest first, newest —
/// "latest" — last). See §3 "Package index entry".
///
/// `lines` mirrors `records` one-for-one and holds the exact bytes of each
/// record's source line, untouched. The materializer (§4.G) needs those
/// exact bytes — it copies retained lines byte-for-byte rather than
/// re-serializing the parsed `VersionRecord`, which would not round-trip
/// key order or formatting.
#[derive(Debug, Clone, Default)]
pub struct PackageIndex {
    records: Vec<VersionRecord>,
    lines: Vec<String>,
}

impl PackageIndex {
    pub(crate) fn new(records: Vec<VersionRecord>) -> PackageIndex {
        let lines = Vec::with_capacity(records.len());
        PackageIndex { records, lines }
    }

    pub fn records(&self) -> &[VersionRecord] {
        &self.records
    }

    /// The raw source line for each record, in the same order as `records()`.
    /// Empty when the index was built via `new()` rather than `read()`.
    pub fn raw_lines(&self) -> &[String] {
        &self.lines
    }

    pub fn latest(&self) -> Option<&VersionRecord> {
        self.records.last()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Read the index file for `name` rooted at `index_root`. A missing file is
/// not an I/O error — it is `IndexError::NoSuchPackage`, which callers (the
/// resolver) treat as "this package is a leaf."
pub fn read(index_root: &Utf8Path, name: &PackageName) -> Result<PackageIndex, IndexError> {
    let path = index_root.join(prefixed_path(name));

    if !path.is_file() {
        return Err(IndexError::NoSuchPackage(name.clone()));
    }

    let contents = std::fs::read_to_string(&path).map_err(|source| IndexError::Io {
        name: name.clone(),
        source,
    })?;

    let mut records = Vec::new();
    let mut lines = Vec::new();
    for (lineno, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let record: VersionRecord =
            serde_json::from_str(line).map_err(|source| IndexError::InvalidRecord {
                name: name.clone(),
                line: lineno + 1,
                source,
            })?;
        records.push(record);
        lines.push(line.to_string());
    }

    Ok(PackageIndex { records, lines })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s7_path_layout() {
        let n = |s: &str| s.parse::<PackageName>().unwrap();
        assert_eq!(prefixed_path(&n("a")), Utf8PathBuf::from("1/a"));
        assert_eq!(prefixed_path(&n("ab")), Utf8PathBuf::from("2/ab"));
        assert_eq!(prefixed_path(&n("abc")), Utf8PathBuf::from("3/a/abc"));
        assert_eq!(prefixed_path(&n("abcd")), Utf8PathBuf::from("ab/cd/abcd"));
        assert_eq!(
            prefixed_path(&n("abcde")),
            Utf8PathBuf::from("ab/cd/abcde")
        );
    }

    #[test]
    fn missing_file_is_no_such_package_not_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8Path::from_path(dir.path()).unwrap();
        let err = read(root, &"doesnotexist".parse().unwrap()).unwrap_err();
        assert!(matches!(err, IndexError::NoSuchPackage(_)));
    }

    #[test]
    fn reads_line_delimited_records_tolerating_trailing_blank_line() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8Path::from_path(dir.path()).unwrap();
        std::fs::create_dir_all(root.join("1")).unwrap();
        std::fs::write(
            root.join("1/a"),
            "{\"name\":\"a\",\"vers\":\"1.0.0\",\"yanked\":false,\"deps\":[]}\n{\"name\":\"a\",\"vers\":\"1.1.0\",\"yanked\":false,\"deps\":[]}\n\n",
        )
        .unwrap();

        let idx = read(root, &"a".parse().unwrap()).unwrap();
        assert_eq!(idx.records().len(), 2);
        assert_eq!(idx.latest().unwrap().vers, "1.1.0");
    }
}
