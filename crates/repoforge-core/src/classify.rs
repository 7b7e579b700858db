//! Stable / prerelease classification of package basenames.

use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Prerelease markers used when none are configured.
///
/// `rc` and `pre` are anchored on a separator or a version digit so names
/// such as `source-highlight` or `express` stay stable.
pub const DEFAULT_PRERELEASE_MARKERS: &[&str] = &[
    "alpha", "beta", "preview", "snapshot", "nightly", "~", "-rc", ".rc", "_rc", "0rc", "1rc",
    "2rc", "3rc", "4rc", "5rc", "6rc", "7rc", "8rc", "9rc", "-pre", ".pre", "_pre",
];

/// Repository component a package is published into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Component {
    Stable,
    Unstable,
}

impl Component {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stable => "stable",
            Self::Unstable => "unstable",
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pure basename -> component classifier.
///
/// A basename is prerelease when it contains any marker as a substring,
/// ignoring case.
#[derive(Debug, Clone)]
pub struct Classifier {
    pattern: Option<Regex>,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(DEFAULT_PRERELEASE_MARKERS.iter().copied())
            .unwrap_or(Self { pattern: None })
    }
}

impl Classifier {
    pub fn new<I, S>(markers: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let alternatives: Vec<String> = markers
            .into_iter()
            .map(|marker| marker.as_ref().trim().to_string())
            .filter(|marker| !marker.is_empty())
            .map(|marker| regex::escape(&marker))
            .collect();

        if alternatives.is_empty() {
            return Ok(Self { pattern: None });
        }
        let pattern = Regex::new(&format!("(?i){}", alternatives.join("|")))?;
        Ok(Self {
            pattern: Some(pattern),
        })
    }

    pub fn is_prerelease(&self, basename: &str) -> bool {
        match &self.pattern {
            Some(pattern) => pattern.is_match(basename),
            None => false,
        }
    }

    pub fn classify(&self, basename: &str) -> Component {
        if self.is_prerelease(basename) {
            Component::Unstable
        } else {
            Component::Stable
        }
    }
}
