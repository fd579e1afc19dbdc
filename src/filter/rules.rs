//! Rule set of intercepted domains.
//!
//! Loads a flat list of domain patterns once at startup and answers
//! whether a domain is governed by one of them, looking back at most
//! four labels from the right.

use std::borrow::Cow;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use rustc_hash::FxHashSet;

use crate::error::{Error, Result};

/// Longest suffix, in labels, that is compared against the patterns.
const MAX_LOOKBACK: usize = 4;

/// An immutable set of domain patterns.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    patterns: FxHashSet<String>,
}

impl RuleSet {
    /// A rule set with no patterns. Nothing matches.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load patterns from a file, one per line.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| Error::SourceUnavailable {
            path: path.to_path_buf(),
            source,
        })?;

        Self::read(BufReader::new(file), path)
    }

    /// Load patterns from any line-oriented reader.
    pub fn from_reader(reader: impl BufRead) -> Result<Self> {
        Self::read(reader, Path::new("<reader>"))
    }

    /// Build a rule set from in-memory patterns, normalized like loaded lines.
    pub fn from_patterns<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .filter_map(|p| normalize_line(p.as_ref()))
            .collect();

        Self { patterns }
    }

    fn read(reader: impl BufRead, origin: &Path) -> Result<Self> {
        let mut patterns = FxHashSet::default();

        for line in reader.lines() {
            let line = line.map_err(|source| Error::SourceUnavailable {
                path: origin.to_path_buf(),
                source,
            })?;
            if let Some(pattern) = normalize_line(&line) {
                patterns.insert(pattern);
            }
        }

        Ok(Self { patterns })
    }

    /// Check whether a domain is governed by a pattern.
    ///
    /// The domain must not carry the trailing root dot. Single-label names
    /// never match. Otherwise the last four, three and two labels are tried
    /// in that order, bounded by the label count, and the first hit wins.
    pub fn matches(&self, domain: &str) -> bool {
        if self.patterns.is_empty() {
            return false;
        }

        let domain = lowercase(domain);
        let labels = domain.split('.').count();
        if labels < 2 {
            return false;
        }

        (2..=labels.min(MAX_LOOKBACK))
            .rev()
            .any(|depth| self.patterns.contains(suffix(&domain, depth)))
    }

    /// Number of distinct patterns.
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

fn normalize_line(line: &str) -> Option<String> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    Some(line.to_ascii_lowercase())
}

fn lowercase(domain: &str) -> Cow<'_, str> {
    if domain.bytes().any(|b| b.is_ascii_uppercase()) {
        Cow::Owned(domain.to_ascii_lowercase())
    } else {
        Cow::Borrowed(domain)
    }
}

/// The last `depth` labels of `domain`, or all of it if it has fewer.
fn suffix(domain: &str, depth: usize) -> &str {
    let mut seen = 0;
    for (pos, b) in domain.bytes().enumerate().rev() {
        if b == b'.' {
            seen += 1;
            if seen == depth {
                return &domain[pos + 1..];
            }
        }
    }
    domain
}
