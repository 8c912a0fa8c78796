// This file is dual licensed under the terms of the Apache License, Version
// 2.0, and the BSD License. See the LICENSE file in the root of this repository
// for complete details.

//! A from-scratch SemVer value: parsing, total ordering, and stringification.
//!
//! This deliberately does not wrap the upstream `semver` crate — see
//! `requirement.rs` and `DESIGN.md` for why.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SemVerError {
    #[error("invalid semantic version: {0:?}")]
    InvalidSemVer(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Identifier {
    Numeric(u64),
    Alphanumeric(String),
}

impl Identifier {
    fn parse(s: &str) -> Result<Identifier, SemVerError> {
        if s.is_empty() || !s.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(SemVerError::InvalidSemVer(s.to_string()));
        }

        if s.chars().all(|c| c.is_ascii_digit()) {
            if s.len() > 1 && s.starts_with('0') {
                return Err(SemVerError::InvalidSemVer(s.to_string()));
            }
            let n: u64 = s
                .parse()
                .map_err(|_| SemVerError::InvalidSemVer(s.to_string()))?;
            Ok(Identifier::Numeric(n))
        } else {
            Ok(Identifier::Alphanumeric(s.to_string()))
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Identifier::Numeric(n) => write!(f, "{n}"),
            Identifier::Alphanumeric(s) => write!(f, "{s}"),
        }
    }
}

impl Ord for Identifier {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Identifier::Numeric(a), Identifier::Numeric(b)) => a.cmp(b),
            (Identifier::Alphanumeric(a), Identifier::Alphanumeric(b)) => a.cmp(b),
            // numeric identifiers always have lower precedence than alphanumeric ones.
            (Identifier::Numeric(_), Identifier::Alphanumeric(_)) => Ordering::Less,
            (Identifier::Alphanumeric(_), Identifier::Numeric(_)) => Ordering::Greater,
        }
    }
}

impl PartialOrd for Identifier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A parsed, immutable semantic version.
///
/// `Eq`/`Hash`/`Ord` all operate on the *parsed* value (build metadata is
/// carried but never affects comparison), while `Display` reproduces the
/// exact string that was parsed, which is what the round-trip invariant
/// requires.
#[derive(Debug, Clone, Eq)]
pub struct SemVer {
    raw: String,
    major: u64,
    minor: u64,
    patch: u64,
    pre: Vec<Identifier>,
    build: Vec<String>,
}

impl SemVer {
    pub fn major(&self) -> u64 {
        self.major
    }

    pub fn minor(&self) -> u64 {
        self.minor
    }

    pub fn patch(&self) -> u64 {
        self.patch
    }

    pub fn is_prerelease(&self) -> bool {
        !self.pre.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Build a canonical `major.minor.patch` value with no prerelease or
    /// build metadata — used internally to synthesize requirement bounds.
    pub fn core(major: u64, minor: u64, patch: u64) -> SemVer {
        SemVer {
            raw: format!("{major}.{minor}.{patch}"),
            major,
            minor,
            patch,
            pre: Vec::new(),
            build: Vec::new(),
        }
    }

    pub fn parse(value: &str) -> Result<SemVer, SemVerError> {
        let err = || SemVerError::InvalidSemVer(value.to_string());

        let (core_and_pre, build) = match value.split_once('+') {
            Some((a, b)) => (a, Some(b)),
            None => (value, None),
        };
        let (core, pre) = match core_and_pre.split_once('-') {
            Some((a, b)) => (a, Some(b)),
            None => (core_and_pre, None),
        };

        let mut parts = core.split('.');
        let major = parse_numeric_component(parts.next().ok_or_else(err)?).ok_or_else(err)?;
        let minor = parse_numeric_component(parts.next().ok_or_else(err)?).ok_or_else(err)?;
        let patch = parse_numeric_component(parts.next().ok_or_else(err)?).ok_or_else(err)?;
        if parts.next().is_some() {
            return Err(err());
        }

        let pre = match pre {
            Some(p) => {
                if p.is_empty() {
                    return Err(err());
                }
                p.split('.')
                    .map(Identifier::parse)
                    .collect::<Result<Vec<_>, _>>()?
            }
            None => Vec::new(),
        };

        let build = match build {
            Some(b) => {
                if b.is_empty() {
                    return Err(err());
                }
                b.split('.')
                    .map(|ident| {
                        if ident.is_empty()
                            || !ident.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
                        {
                            Err(err())
                        } else {
                            Ok(ident.to_string())
                        }
                    })
                    .collect::<Result<Vec<_>, _>>()?
            }
            None => Vec::new(),
        };

        Ok(SemVer {
            raw: value.to_string(),
            major,
            minor,
            patch,
            pre,
            build,
        })
    }

    /// Compare ignoring prerelease identifiers entirely — used for the
    /// synthesized upper bounds of `^`/`~` clauses (requirement.rs), so that
    /// e.g. `^1.0.0` does not admit `2.0.0-alpha`.
    pub fn cmp_strict(&self, other: &SemVer) -> Ordering {
        (self.major, self.minor, self.patch).cmp(&(other.major, other.minor, other.patch))
    }
}

fn parse_numeric_component(s: &str) -> Option<u64> {
    if s.is_empty() || !s.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    if s.len() > 1 && s.starts_with('0') {
        return None;
    }
    s.parse().ok()
}

impl FromStr for SemVer {
    type Err = SemVerError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        SemVer::parse(value)
    }
}

impl fmt::Display for SemVer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

impl PartialEq for SemVer {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl std::hash::Hash for SemVer {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.major.hash(state);
        self.minor.hash(state);
        self.patch.hash(state);
        self.pre.hash(state);
    }
}

impl Ord for SemVer {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.cmp_strict(other) {
            Ordering::Equal => (),
            ord => return ord,
        }

        // A version with a prerelease is always less than one without,
        // given equal (major, minor, patch).
        match (self.pre.is_empty(), other.pre.is_empty()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => self.pre.cmp(&other.pre),
        }
    }
}

impl PartialOrd for SemVer {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
