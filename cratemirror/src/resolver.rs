// This file is dual licensed under the terms of the Apache License, Version
// 2.0, and the BSD License. See the LICENSE file in the root of this repository
// for complete details.

//! Transitive resolution: drain a worklist of `(package, requirement-set)`
//! pairs into a monotonically-growing `seen` set of `(package, version)`
//! pairs, expanding each selected version's dependencies as it is visited.
//!
//! This is not SAT-style unification (see `pubgrub` in the pack for that
//! shape) — a package can end up in `seen` at several versions at once when
//! different requirements along the way pick different concretes. That's
//! the point: the output is a union mirror, not a single install plan.

use std::fmt;

use camino::Utf8Path;
use indexmap::{IndexMap, IndexSet};
use log::{debug, trace, warn};

use crate::exclude::ExclusionSet;
use crate::index::{self, IndexError};
use crate::requirement::Requirement;
use crate::selector::{self, SelectionOutcome};
use crate::types::PackageName;

const LOGNAME: &str = "cratemirror::resolver";

pub const DEFAULT_MAX_ITERATIONS: usize = 20_000;

/// An entry in a package's pending requirement set. `Latest` is the `"latest"`
/// sentinel from the seed builder; it is resolved to a concrete version
/// string the moment its package's index is loaded (§4.E step 6), then
/// treated like any other requirement from that point on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RequirementSlot {
    Req(String),
    Latest,
}

impl From<&str> for RequirementSlot {
    fn from(value: &str) -> Self {
        RequirementSlot::Req(value.to_string())
    }
}

/// Parses the persisted form back out: the literal string `"latest"` is the
/// sentinel, anything else is a concrete requirement. Used when reloading
/// `crates.json` (§6 "Persisted state") instead of rebuilding the seed.
impl From<String> for RequirementSlot {
    fn from(value: String) -> Self {
        if value == "latest" {
            RequirementSlot::Latest
        } else {
            RequirementSlot::Req(value)
        }
    }
}

impl fmt::Display for RequirementSlot {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RequirementSlot::Req(s) => write!(f, "{s}"),
            RequirementSlot::Latest => write!(f, "latest"),
        }
    }
}

pub type Worklist = IndexMap<PackageName, IndexSet<RequirementSlot>>;
pub type Seen = IndexSet<(PackageName, String)>;

/// Project `seen` into the selected catalog (§3): `package name -> set of
/// resolved version strings`. This is the input to the materializer (§4.G)
/// and the fetcher (§4.H).
pub fn project_catalog(seen: &Seen) -> IndexMap<PackageName, IndexSet<String>> {
    let mut catalog: IndexMap<PackageName, IndexSet<String>> = IndexMap::new();
    for (name, vers) in seen {
        catalog.entry(name.clone()).or_default().insert(vers.clone());
    }
    catalog
}

/// Add `(name, req)` to `worklist`, merging into any existing entry for
/// `name`. Used by both the seed builder and the resolver's own dependency
/// expansion step, so exclusions and dedup stay in one place.
pub fn enqueue(worklist: &mut Worklist, name: PackageName, req: RequirementSlot) {
    worklist.entry(name).or_default().insert(req);
}

#[derive(Debug, Clone, Default)]
pub struct ResolveOutcome {
    pub seen: Seen,
    /// Set when the loop hit `max_iterations` before the worklist drained.
    /// Per §4.E this is a non-fatal diagnostic, not an error — the caller
    /// gets the partial `seen` set back and decides whether to warn louder.
    pub iteration_budget_exceeded: bool,
}

/// Run the resolver to a fixed point (or until `max_iterations` is spent).
/// Traversal order within a single call is whatever `IndexMap`'s insertion
/// order happens to give us; §4.E requires only that the result be correct
/// under any order, not that it be this one.
pub fn resolve(
    mut worklist: Worklist,
    index_root: &Utf8Path,
    exclusions: &ExclusionSet,
    max_iterations: usize,
) -> ResolveOutcome {
    let mut seen: Seen = IndexSet::new();
    let mut iterations: usize = 0;

    loop {
        let Some(name) = worklist.keys().next().cloned() else {
            break;
        };

        if iterations >= max_iterations {
            warn!(
                target: LOGNAME,
                "resolver exceeded {max_iterations} iterations with {} packages still queued; returning partial result",
                worklist.len()
            );
            return ResolveOutcome {
                seen,
                iteration_budget_exceeded: true,
            };
        }
        iterations += 1;

        let req_set = worklist
            .shift_remove(&name)
            .expect("key was just observed in the map");

        if exclusions.excludes(name.as_str()) {
            trace!(target: LOGNAME, "{name} matches an exclusion pattern, skipping");
            continue;
        }
        if req_set.is_empty() {
            continue;
        }

        let idx = match index::read(index_root, &name) {
            Ok(idx) => idx,
            Err(IndexError::NoSuchPackage(_)) => {
                debug!(target: LOGNAME, "{name} has no index entry, treating as a leaf");
                continue;
            }
            Err(err) => {
                warn!(target: LOGNAME, "{name}: {err}, treating as a leaf");
                continue;
            }
        };

        let mut reqs: Vec<String> = Vec::with_capacity(req_set.len());
        for slot in req_set {
            match slot {
                RequirementSlot::Req(s) => reqs.push(s),
                RequirementSlot::Latest => match idx.latest() {
                    Some(record) => reqs.push(record.vers.clone()),
                    None => warn!(target: LOGNAME, "{name}: \"latest\" requested but index is empty"),
                },
            }
        }

        for req_str in reqs {
            let req = match Requirement::parse(&req_str) {
                Ok(req) => req,
                Err(err) => {
                    warn!(target: LOGNAME, "{name}: invalid requirement {req_str:?}: {err}");
                    continue;
                }
            };

            let selection = match selector::select(&req, &idx) {
                Ok(selection) => selection,
                Err(err) => {
                    warn!(target: LOGNAME, "{name}: {err}");
                    continue;
                }
            };
            match selection.outcome {
                SelectionOutcome::Live => {}
                SelectionOutcome::Yanked => {
                    debug!(target: LOGNAME, "{name} {req}: nothing live matched, using yanked {}", selection.record.vers);
                }
                SelectionOutcome::Fallback => {
                    warn!(target: LOGNAME, "{name} {req}: no matching version, using latest {}", selection.record.vers);
                }
            }

            let key = (name.clone(), selection.record.vers.clone());
            if seen.contains(&key) {
                continue;
            }
            seen.insert(key);

            // Normal, build, and dev dependencies all expand identically; optional
            // flags are ignored entirely (optional deps still expand).
            for dep in &selection.record.deps {
                let dep_name: PackageName = match dep.dependency_name().parse() {
                    Ok(n) => n,
                    Err(err) => {
                        warn!(target: LOGNAME, "{name} {}: dependency {:?} has an invalid name: {err}", selection.record.vers, dep.dependency_name());
                        continue;
                    }
                };
                if seen.iter().any(|(n, _)| n == &dep_name) {
                    continue;
                }
                enqueue(&mut worklist, dep_name, RequirementSlot::Req(dep.req.clone()));
            }
        }
    }

    ResolveOutcome {
        seen,
        iteration_budget_exceeded: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Dep, DependencyKind as DK, VersionRecord};

    fn write_index(root: &camino::Utf8Path, name: &str, records: &[VersionRecord]) {
        let path = index::prefixed_path(&name.parse().unwrap());
        let full = root.join(&path);
        std::fs::create_dir_all(full.parent().unwrap()).unwrap();
        let body = records
            .iter()
            .map(|r| serde_json::to_string(r).unwrap())
            .collect::<Vec<_>>()
            .join("\n");
        std::fs::write(full, body).unwrap();
    }

    fn record(name: &str, vers: &str, deps: Vec<Dep>) -> VersionRecord {
        VersionRecord {
            name: name.to_string(),
            vers: vers.to_string(),
            yanked: false,
            deps,
        }
    }

    fn dep(name: &str, req: &str) -> Dep {
        Dep {
            name: name.to_string(),
            req: req.to_string(),
            kind: DK::Normal,
            optional: false,
            package: None,
        }
    }

    #[test]
    fn expands_transitive_dependencies_to_a_fixed_point() {
        let dir = tempfile::tempdir().unwrap();
        let root = camino::Utf8Path::from_path(dir.path()).unwrap();

        write_index(
            root,
            "a",
            &[record("a", "1.0.0", vec![dep("b", "^1")])],
        );
        write_index(root, "b", &[record("b", "1.0.0", vec![])]);

        let mut worklist = Worklist::new();
        enqueue(&mut worklist, "a".parse().unwrap(), RequirementSlot::from("^1"));

        let exclusions = ExclusionSet::default();
        let outcome = resolve(worklist, root, &exclusions, DEFAULT_MAX_ITERATIONS);

        assert!(!outcome.iteration_budget_exceeded);
        assert!(outcome
            .seen
            .contains(&("a".parse().unwrap(), "1.0.0".to_string())));
        assert!(outcome
            .seen
            .contains(&("b".parse().unwrap(), "1.0.0".to_string())));
    }

    #[test]
    fn s6_renamed_dep_enqueues_the_real_package_name() {
        let dir = tempfile::tempdir().unwrap();
        let root = camino::Utf8Path::from_path(dir.path()).unwrap();

        let renamed_dep = Dep {
            name: "foo-alias".to_string(),
            req: "^1".to_string(),
            kind: DK::Normal,
            optional: false,
            package: Some("foo".to_string()),
        };
        write_index(root, "a", &[record("a", "1.0.0", vec![renamed_dep])]);
        write_index(root, "foo", &[record("foo", "1.0.0", vec![])]);

        let mut worklist = Worklist::new();
        enqueue(&mut worklist, "a".parse().unwrap(), RequirementSlot::from("^1"));

        let exclusions = ExclusionSet::default();
        let outcome = resolve(worklist, root, &exclusions, DEFAULT_MAX_ITERATIONS);

        assert!(outcome
            .seen
            .contains(&("foo".parse().unwrap(), "1.0.0".to_string())));
        assert!(!outcome.seen.iter().any(|(n, _)| n.as_str() == "foo-alias"));
    }

    #[test]
    fn missing_package_is_treated_as_a_leaf_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let root = camino::Utf8Path::from_path(dir.path()).unwrap();

        let mut worklist = Worklist::new();
        enqueue(&mut worklist, "ghost".parse().unwrap(), RequirementSlot::from("*"));

        let exclusions = ExclusionSet::default();
        let outcome = resolve(worklist, root, &exclusions, DEFAULT_MAX_ITERATIONS);
        assert!(outcome.seen.is_empty());
    }

    #[test]
    fn excluded_package_never_reaches_seen() {
        let dir = tempfile::tempdir().unwrap();
        let root = camino::Utf8Path::from_path(dir.path()).unwrap();
        write_index(root, "banned", &[record("banned", "1.0.0", vec![])]);

        let mut worklist = Worklist::new();
        enqueue(&mut worklist, "banned".parse().unwrap(), RequirementSlot::from("*"));

        let exclusions = ExclusionSet::compile(["banned"]).unwrap();
        let outcome = resolve(worklist, root, &exclusions, DEFAULT_MAX_ITERATIONS);
        assert!(outcome.seen.is_empty());
    }

    #[test]
    fn latest_sentinel_resolves_to_the_last_record() {
        let dir = tempfile::tempdir().unwrap();
        let root = camino::Utf8Path::from_path(dir.path()).unwrap();
        write_index(
            root,
            "a",
            &[
                record("a", "1.0.0", vec![]),
                record("a", "2.0.0", vec![]),
            ],
        );

        let mut worklist = Worklist::new();
        enqueue(&mut worklist, "a".parse().unwrap(), RequirementSlot::Latest);

        let exclusions = ExclusionSet::default();
        let outcome = resolve(worklist, root, &exclusions, DEFAULT_MAX_ITERATIONS);
        assert!(outcome
            .seen
            .contains(&("a".parse().unwrap(), "2.0.0".to_string())));
        assert!(!outcome
            .seen
            .contains(&("a".parse().unwrap(), "1.0.0".to_string())));
    }

    #[test]
    fn a_package_can_be_seen_at_multiple_versions() {
        let dir = tempfile::tempdir().unwrap();
        let root = camino::Utf8Path::from_path(dir.path()).unwrap();
        write_index(
            root,
            "shared",
            &[
                record("shared", "1.0.0", vec![]),
                record("shared", "2.0.0", vec![]),
            ],
        );
        write_index(
            root,
            "top",
            &[record("top", "1.0.0", vec![dep("shared", "^1")])],
        );

        let mut worklist = Worklist::new();
        enqueue(&mut worklist, "top".parse().unwrap(), RequirementSlot::from("^1"));
        enqueue(&mut worklist, "shared".parse().unwrap(), RequirementSlot::from("^2"));

        let exclusions = ExclusionSet::default();
        let outcome = resolve(worklist, root, &exclusions, DEFAULT_MAX_ITERATIONS);
        assert!(outcome
            .seen
            .contains(&("shared".parse().unwrap(), "1.0.0".to_string())));
        assert!(outcome
            .seen
            .contains(&("shared".parse().unwrap(), "2.0.0".to_string())));
    }

    #[test]
    fn iteration_budget_is_honored() {
        let dir = tempfile::tempdir().unwrap();
        let root = camino::Utf8Path::from_path(dir.path()).unwrap();
        write_index(root, "a", &[record("a", "1.0.0", vec![])]);
        write_index(root, "b", &[record("b", "1.0.0", vec![])]);

        let mut worklist = Worklist::new();
        enqueue(&mut worklist, "a".parse().unwrap(), RequirementSlot::from("*"));
        enqueue(&mut worklist, "b".parse().unwrap(), RequirementSlot::from("*"));

        let exclusions = ExclusionSet::default();
        let outcome = resolve(worklist, root, &exclusions, 1);
        assert!(outcome.iteration_budget_exceeded);
    }
}
