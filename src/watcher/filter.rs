//! Path-based ignore filtering.
//!
//! A fixed set of noise patterns (shell history, interpreter history,
//! bytecode and generic caches, journal files, log/swap/temp suffixes) is
//! compiled into a single regex alternation. The filter is pure, so the
//! same instance serves both the recursive enumeration (where ignored
//! directories are pruned before their descendants are visited) and any
//! later check against a freshly created entry.

use std::path::Path;

use regex::Regex;

/// Patterns matched against the full path. Directory-name patterns are
/// anchored to segment boundaries with `(?:/|$)`; suffix patterns match
/// the end of the path only.
const IGNORE_PATTERNS: &[&str] = &[
    r"/\.bash_history(?:/|$)",
    r"/\.python_history(?:/|$)",
    r"/__pycache__(?:/|$)",
    r"/\.cache(?:/|$)",
    r"/sqlite3-journal$",
    r"\.log$",
    r"\.swp$",
    r"\.tmp$",
];

/// Decides, per candidate path, whether it belongs in the watch.
#[derive(Debug, Clone)]
pub struct PathFilter {
    ignore: Regex,
}

impl PathFilter {
    pub fn new() -> Self {
        let alternation = format!("(?:{})", IGNORE_PATTERNS.join("|"));
        Self {
            // Pattern set is a compile-time constant, so this cannot fail.
            ignore: Regex::new(&alternation).unwrap(),
        }
    }

    /// True if the path matches any ignore pattern.
    ///
    /// Matching is byte-based on the lossy UTF-8 form of the path; the
    /// pattern set contains only ASCII, so lossy replacement cannot create
    /// a false positive.
    pub fn is_ignored(&self, path: &Path) -> bool {
        self.ignore.is_match(&path.to_string_lossy())
    }
}

impl Default for PathFilter {
    fn default() -> Self {
        Self::new()
    }
}
