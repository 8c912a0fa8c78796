// This file is dual licensed under the terms of the Apache License, Version
// 2.0, and the BSD License. See the LICENSE file in the root of this repository
// for complete details.

//! Picking one concrete version record out of a package's index under the
//! match + yank policy (§4.C).

use thiserror::Error;

use crate::index::PackageIndex;
use crate::requirement::Requirement;
use crate::semver::SemVer;
use crate::types::VersionRecord;

#[derive(Error, Debug)]
pub enum SelectError {
    #[error("package index has no version records at all")]
    Empty,
}

/// How the selected record was arrived at — callers (the resolver) use this
/// to decide whether and how loudly to log, without the selector itself
/// taking a logging dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionOutcome {
    /// A live (non-yanked) version matched the requirement.
    Live,
    /// No live version matched; the newest yanked match was used instead.
    Yanked,
    /// Nothing matched at all; fell back to the last record in the index.
    Fallback,
}

pub struct Selection<'a> {
    pub record: &'a VersionRecord,
    pub outcome: SelectionOutcome,
}

/// Select a version record from `index` satisfying `req`, per §4.C:
///
/// 1. Walk the index in file order, testing each record against `req`.
/// 2. Track the best (highest by SemVer order) live match and the best
///    yanked match separately.
/// 3. Prefer the best live match.
/// 4. Else fall back to the best yanked match (loud diagnostic).
/// 5. Else fall back to the last record in the index (loud diagnostic) —
///    a deliberate best-effort behavior for upstream data that doesn't
///    actually have anything matching the requirement.
pub fn select<'a>(req: &Requirement, index: &'a PackageIndex) -> Result<Selection<'a>, SelectError> {
    let mut best_live: Option<(SemVer, &VersionRecord)> = None;
    let mut best_yanked: Option<(SemVer, &VersionRecord)> = None;

    for record in index.records() {
        let Ok(v) = SemVer::parse(&record.vers) else {
            continue;
        };
        if !req.matches(&v) {
            continue;
        }

        let slot = if record.yanked {
            &mut best_yanked
        } else {
            &mut best_live
        };
        match slot {
            Some((best_v, _)) if *best_v >= v => {}
            _ => *slot = Some((v, record)),
        }
    }

    if let Some((_, record)) = best_live {
        return Ok(Selection {
            record,
            outcome: SelectionOutcome::Live,
        });
    }

    if let Some((_, record)) = best_yanked {
        return Ok(Selection {
            record,
            outcome: SelectionOutcome::Yanked,
        });
    }

    match index.records().last() {
        Some(record) => Ok(Selection {
            record,
            outcome: SelectionOutcome::Fallback,
        }),
        None => Err(SelectError::Empty),
    }
}
