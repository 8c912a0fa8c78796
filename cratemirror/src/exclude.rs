// This file is dual licensed under the terms of the Apache License, Version
// 2.0, and the BSD License. See the LICENSE file in the root of this repository
// for complete details.

//! Glob-like exclusion patterns, compiled once and applied at every
//! ingress/egress point in the pipeline (§3, §9 "Exclusion semantics").

use regex::Regex;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExclusionError {
    #[error("invalid exclusion pattern {pattern:?}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// An ordered list of `*`-glob patterns, compiled to anchored full-match
/// regular expressions.
#[derive(Debug, Clone, Default)]
pub struct ExclusionSet {
    patterns: Vec<Regex>,
}

impl ExclusionSet {
    pub fn compile<I, S>(patterns: I) -> Result<ExclusionSet, ExclusionError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let compiled = patterns
            .into_iter()
            .map(|p| {
                let p = p.as_ref();
                let escaped = regex::escape(p).replace(r"\*", ".*");
                Regex::new(&format!("^{escaped}$")).map_err(|source| {
                    ExclusionError::InvalidPattern {
                        pattern: p.to_string(),
                        source,
                    }
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ExclusionSet { patterns: compiled })
    }

    pub fn excludes(&self, name: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_and_glob_patterns() {
        let set = ExclusionSet::compile(["exact-name", "spam-*"]).unwrap();
        assert!(set.excludes("exact-name"));
        assert!(!set.excludes("exact-name-2"));
        assert!(set.excludes("spam-foo"));
        assert!(set.excludes("spam-"));
        assert!(!set.excludes("not-spam-foo"));
    }

    #[test]
    fn empty_set_excludes_nothing() {
        let set = ExclusionSet::compile(Vec::<String>::new()).unwrap();
        assert!(!set.excludes("anything"));
    }
}
