// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Name filtering through shell-style glob patterns.
//!
//! Both the resource scanner and the orphan collector need to leave some
//! names alone: resource directories that are not real servers (scratch or
//! backup directories), and entries in the target directory that the
//! operator put there on purpose. Instead of comparing strings ad hoc, these
//! rules are expressed as a [`PatternSet`].

use glob::{MatchOptions, Pattern, PatternError};
use serde::{Deserialize, Serialize};

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: true,
};

/// Ordered set of glob patterns.
///
/// Serialized as a plain list of pattern strings.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct PatternSet(Vec<Pattern>);

impl PatternSet {
    /// Compile listing of glob patterns.
    ///
    /// # Errors
    ///
    /// - Return [`PatternError`] if any pattern is not a valid glob.
    pub fn new(patterns: impl IntoIterator<Item = impl AsRef<str>>) -> Result<Self, PatternError> {
        patterns
            .into_iter()
            .map(|pattern| Pattern::new(pattern.as_ref()))
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }

    /// Check if name matches at least one pattern.
    ///
    /// A leading `.` must be matched literally, so `*` does not pick up
    /// hidden names by accident.
    pub fn matches(&self, name: impl AsRef<str>) -> bool {
        self.0
            .iter()
            .any(|pattern| pattern.matches_with(name.as_ref(), MATCH_OPTIONS))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl TryFrom<Vec<String>> for PatternSet {
    type Error = PatternError;

    fn try_from(patterns: Vec<String>) -> Result<Self, Self::Error> {
        Self::new(patterns)
    }
}

impl From<PatternSet> for Vec<String> {
    fn from(set: PatternSet) -> Self {
        set.0.iter().map(|pattern| pattern.as_str().to_owned()).collect()
    }
}
