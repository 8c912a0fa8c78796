// This file is dual licensed under the terms of the Apache License, Version
// 2.0, and the BSD License. See the LICENSE file in the root of this repository
// for complete details.

//! Requirement matching: caret, tilde, comparator, wildcard, exact, and
//! comma-conjunction clauses, evaluated against a `SemVer`.

use std::fmt;

use regex::Regex;
use thiserror::Error;

use crate::semver::SemVer;

const UPPER_SENTINEL: u64 = 9_999_999;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequirementError {
    #[error("invalid version requirement clause: {0:?}")]
    InvalidClause(String),
}

/// A version literal as it appears inside a clause: 1, 2, or 3 dotted
/// numeric components plus an optional `-pre` suffix. Missing components
/// are filled in by each clause kind according to its own padding rule.
#[derive(Debug, Clone)]
struct PartialVersion {
    major: u64,
    minor: Option<u64>,
    patch: Option<u64>,
    pre: Option<String>,
}

impl PartialVersion {
    fn parse(s: &str) -> Result<PartialVersion, RequirementError> {
        let s = s.trim();
        let err = || RequirementError::InvalidClause(s.to_string());

        if s.is_empty() || s.contains('*') {
            return Err(err());
        }

        let (core, pre) = match s.split_once('-') {
            Some((c, p)) => (c, Some(p.to_string())),
            None => (s, None),
        };

        if let Some(ref p) = pre {
            if p.is_empty() {
                return Err(err());
            }
        }

        let mut parts = core.split('.');
        let major = parts.next().ok_or_else(err)?;
        let major = parse_component(major).ok_or_else(err)?;
        let minor = match parts.next() {
            Some(m) => Some(parse_component(m).ok_or_else(err)?),
            None => None,
        };
        let patch = match parts.next() {
            Some(p) => Some(parse_component(p).ok_or_else(err)?),
            None => None,
        };
        if parts.next().is_some() {
            return Err(err());
        }
        if minor.is_none() && patch.is_some() {
            return Err(err());
        }

        Ok(PartialVersion {
            major,
            minor,
            patch,
            pre,
        })
    }

    /// Pad missing components with zero, preserving any explicit prerelease.
    /// Used for lower bounds, which are compared with the full (prerelease
    /// aware) total order.
    fn padded_low(&self) -> SemVer {
        let minor = self.minor.unwrap_or(0);
        let patch = self.patch.unwrap_or(0);
        match &self.pre {
            Some(pre) => {
                SemVer::parse(&format!("{}.{}.{}-{}", self.major, minor, patch, pre)).unwrap()
            }
            None => SemVer::core(self.major, minor, patch),
        }
    }

    /// Pad missing components with a large sentinel, for use as an upper
    /// bound to comparator clauses (`<V`, `<=V`). Mirrors the original
    /// mirror-builder's `.9999999` padding.
    fn padded_high(&self) -> SemVer {
        match (self.minor, self.patch) {
            (Some(minor), Some(patch)) => SemVer::core(self.major, minor, patch),
            (Some(minor), None) => SemVer::core(self.major, minor, UPPER_SENTINEL),
            (None, None) => SemVer::core(self.major, UPPER_SENTINEL, UPPER_SENTINEL),
            (None, Some(_)) => unreachable!("parse() rejects patch without minor"),
        }
    }
}

fn parse_component(s: &str) -> Option<u64> {
    if s.is_empty() || !s.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    if s.len() > 1 && s.starts_with('0') {
        return None;
    }
    s.parse().ok()
}

#[derive(Debug, Clone)]
enum Clause {
    Wildcard,
    Exact(PartialVersion),
    Greater(PartialVersion),
    GreaterEq(PartialVersion),
    Less(PartialVersion),
    LessEq(PartialVersion),
    Caret(PartialVersion),
    Tilde(PartialVersion),
    WildcardPattern(String),
    Bare(String),
}

impl Clause {
    fn parse(raw: &str) -> Result<Clause, RequirementError> {
        let s = raw.trim();
        let err = || RequirementError::InvalidClause(raw.to_string());

        if s == "*" {
            return Ok(Clause::Wildcard);
        }
        if let Some(rest) = s.strip_prefix('=') {
            return Ok(Clause::Exact(PartialVersion::parse(rest)?));
        }
        if let Some(rest) = s.strip_prefix(">=") {
            return Ok(Clause::GreaterEq(PartialVersion::parse(rest)?));
        }
        if let Some(rest) = s.strip_prefix("<=") {
            return Ok(Clause::LessEq(PartialVersion::parse(rest)?));
        }
        if let Some(rest) = s.strip_prefix('>') {
            return Ok(Clause::Greater(PartialVersion::parse(rest)?));
        }
        if let Some(rest) = s.strip_prefix('<') {
            return Ok(Clause::Less(PartialVersion::parse(rest)?));
        }
        if let Some(rest) = s.strip_prefix('^') {
            return Ok(Clause::Caret(PartialVersion::parse(rest)?));
        }
        if let Some(rest) = s.strip_prefix('~') {
            return Ok(Clause::Tilde(PartialVersion::parse(rest)?));
        }

        if !s.starts_with(|c: char| c.is_ascii_digit()) {
            return Err(err());
        }

        if s.contains('*') {
            Ok(Clause::WildcardPattern(s.to_string()))
        } else {
            Ok(Clause::Bare(s.to_string()))
        }
    }

    fn matches(&self, v: &SemVer) -> bool {
        match self {
            Clause::Wildcard => true,
            Clause::Exact(pv) => match (pv.minor, pv.patch) {
                (Some(_), Some(_)) => v.as_str() == exact_text(pv),
                (Some(minor), None) => v.major() == pv.major && v.minor() == minor,
                (None, None) => v.major() == pv.major,
                (None, Some(_)) => unreachable!("parse() rejects patch without minor"),
            },
            Clause::GreaterEq(pv) => *v >= pv.padded_low(),
            Clause::Greater(pv) => *v > pv.padded_low(),
            Clause::LessEq(pv) => *v <= pv.padded_high(),
            Clause::Less(pv) => v.cmp_strict(&pv.padded_high()) == std::cmp::Ordering::Less,
            Clause::Caret(pv) => {
                let lower = pv.padded_low();
                let upper = caret_upper(pv);
                *v >= lower && v.cmp_strict(&upper) == std::cmp::Ordering::Less
            }
            Clause::Tilde(pv) => {
                let lower = pv.padded_low();
                let upper = tilde_upper(pv);
                *v >= lower && v.cmp_strict(&upper) == std::cmp::Ordering::Less
            }
            Clause::WildcardPattern(pattern) => wildcard_regex(pattern).is_match(v.as_str()),
            Clause::Bare(raw) => v.as_str() == raw,
        }
    }
}

fn exact_text(pv: &PartialVersion) -> String {
    match &pv.pre {
        Some(pre) => format!(
            "{}.{}.{}-{}",
            pv.major,
            pv.minor.unwrap(),
            pv.patch.unwrap(),
            pre
        ),
        None => format!("{}.{}.{}", pv.major, pv.minor.unwrap(), pv.patch.unwrap()),
    }
}

fn wildcard_regex(pattern: &str) -> Regex {
    let escaped = regex::escape(pattern).replace(r"\*", ".*");
    Regex::new(&format!("^{escaped}$")).expect("escaped wildcard pattern is always valid regex")
}

/// Upper bound (exclusive, strict/core-only) for `^V`, per §4.B.
fn caret_upper(pv: &PartialVersion) -> SemVer {
    let major = pv.major;
    match (pv.minor, pv.patch) {
        (Some(minor), Some(patch)) => caret_upper_full(major, minor, patch),
        // ^MAJOR.MINOR is treated as ^MAJOR.MINOR.0.
        (Some(minor), None) => caret_upper_full(major, minor, 0),
        // ^MAJOR on its own.
        (None, None) => {
            if major > 0 {
                SemVer::core(major + 1, 0, 0)
            } else {
                SemVer::core(1, 0, 0)
            }
        }
        (None, Some(_)) => unreachable!("parse() rejects patch without minor"),
    }
}

fn caret_upper_full(major: u64, minor: u64, patch: u64) -> SemVer {
    if major > 0 {
        SemVer::core(major + 1, 0, 0)
    } else if minor > 0 {
        SemVer::core(0, minor + 1, 0)
    } else {
        SemVer::core(0, 0, patch + 1)
    }
}

/// Upper bound (exclusive, strict/core-only) for `~V`, per §4.B.
fn tilde_upper(pv: &PartialVersion) -> SemVer {
    match pv.minor {
        Some(minor) => SemVer::core(pv.major, minor + 1, 0),
        None => SemVer::core(pv.major + 1, 0, 0),
    }
}

/// A comma-conjunction of clauses.
#[derive(Debug, Clone)]
pub struct Requirement {
    raw: String,
    clauses: Vec<Clause>,
}

impl Requirement {
    pub fn parse(value: &str) -> Result<Requirement, RequirementError> {
        let clauses = value
            .split(',')
            .map(Clause::parse)
            .collect::<Result<Vec<_>, _>>()?;

        if clauses.is_empty() {
            return Err(RequirementError::InvalidClause(value.to_string()));
        }

        Ok(Requirement {
            raw: value.to_string(),
            clauses,
        })
    }

    pub fn matches(&self, v: &SemVer) -> bool {
        self.clauses.iter().all(|c| c.matches(v))
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

impl PartialEq for Requirement {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}
impl Eq for Requirement {}

impl std::hash::Hash for Requirement {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> SemVer {
        SemVer::parse(s).unwrap()
    }

    fn req(s: &str) -> Requirement {
        Requirement::parse(s).unwrap()
    }

    #[test]
    fn s1_caret_lower_bound_nonzero_minor() {
        let r = req("^0.2.3");
        assert!(r.matches(&v("0.2.3")));
        assert!(r.matches(&v("0.2.4")));
        assert!(!r.matches(&v("0.3.0")));
        assert!(!r.matches(&v("0.2.3-alpha")));
    }

    #[test]
    fn s2_caret_zero_patch_only() {
        let r = req("^0.0.3");
        assert!(r.matches(&v("0.0.3")));
        assert!(!r.matches(&v("0.0.4")));
        assert!(!r.matches(&v("0.0.2")));
    }

    #[test]
    fn s3_tilde_minor() {
        let r = req("~1.2");
        assert!(r.matches(&v("1.2.0")));
        assert!(r.matches(&v("1.2.99")));
        assert!(!r.matches(&v("1.3.0")));
        assert!(!r.matches(&v("1.1.9")));
    }

    #[test]
    fn s4_wildcard_pattern() {
        let r = req("1.2.*");
        assert!(r.matches(&v("1.2.0")));
        assert!(r.matches(&v("1.2.5")));
        assert!(!r.matches(&v("1.3.0")));
    }

    #[test]
    fn bare_version_is_literal_equality() {
        let r = req("1.2.3");
        assert!(r.matches(&v("1.2.3")));
        assert!(!r.matches(&v("1.2.4")));
        assert!(!r.matches(&v("1.2.30")));
    }

    #[test]
    fn conjunction_requires_every_clause() {
        let r = req(">=1.0.0,<2.0.0");
        assert!(r.matches(&v("1.5.0")));
        assert!(!r.matches(&v("2.0.0")));
        assert!(!r.matches(&v("0.9.0")));
    }

    #[test]
    fn partial_exact_matches_prefix() {
        let r = req("=1.2");
        assert!(r.matches(&v("1.2.0")));
        assert!(r.matches(&v("1.2.9")));
        assert!(!r.matches(&v("1.3.0")));
    }

    #[test]
    fn caret_single_component() {
        assert!(req("^1").matches(&v("1.9.9")));
        assert!(!req("^1").matches(&v("2.0.0")));
        assert!(req("^0").matches(&v("0.9.9")));
        assert!(!req("^0").matches(&v("1.0.0")));
    }

    #[test]
    fn less_than_is_strict_about_prerelease() {
        let r = req("<2.0.0");
        assert!(!r.matches(&v("2.0.0-alpha")));
        assert!(r.matches(&v("1.9.9")));
    }
}
