//! Step arguments.

use crate::error::Problem;
use crate::outcome::{Failure, Outcome, Success};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

fn scheme_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^([A-Za-z][A-Za-z0-9+.\-]*):").expect("uri scheme regex must compile")
    })
}

/// A whitespace-free URI reference, kept in its textual form.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Uri(String);

impl Uri {
    pub fn parse(input: &str) -> Result<Self, Problem> {
        if input.is_empty() || input.chars().any(char::is_whitespace) {
            return Err(Problem::parse(input, "uri"));
        }
        Ok(Self(input.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The scheme, if the reference is absolute.
    pub fn scheme(&self) -> Option<&str> {
        scheme_re()
            .captures(&self.0)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
    }

    /// Capture groups of `pattern` when it matches the whole reference.
    ///
    /// Groups that did not participate in the match come back empty.
    pub fn captures(&self, pattern: &Regex) -> Option<Vec<&str>> {
        let caps = pattern.captures(&self.0)?;
        let whole = caps.get(0)?;
        if whole.start() != 0 || whole.end() != self.0.len() {
            return None;
        }
        Some(
            caps.iter()
                .skip(1)
                .map(|group| group.map_or("", |m| m.as_str()))
                .collect(),
        )
    }

    /// Apply `f` to the captures of `pattern`, or fail with a parse problem.
    ///
    /// Alternatives chain with [`Outcome::chain_failure`].
    pub fn matches<R>(&self, pattern: &Regex, f: impl FnOnce(&[&str]) -> R) -> Outcome<R, Problem> {
        match self.captures(pattern) {
            Some(groups) => Success(f(&groups)),
            None => Failure(Problem::parse(self.0.as_str(), pattern.as_str())),
        }
    }
}

impl FromStr for Uri {
    type Err = Problem;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Uri {
    type Error = Problem;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Uri> for String {
    fn from(uri: Uri) -> Self {
        uri.0
    }
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
