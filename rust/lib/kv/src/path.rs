//! Hierarchical paths and prefix queries.
//!
//! A path is a separator-joined key such as `users/1`. Appending the
//! wildcard marker (`users/*`) turns it into a prefix query. The choice is
//! made once, when the [`Path`] is built, so stores only ever see plain
//! literal strings.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::KVError;

/// Marker that turns a path into a prefix query when it is the final
/// character.
pub const WILDCARD: char = '*';

/// Separator used when no [`PathConfig`] says otherwise.
pub const DEFAULT_SEPARATOR: &str = "/";

/// A key or a prefix query.
///
/// The fields are private: every constructor validates, so a `Path` in hand
/// is never empty and never carries the wildcard marker or control
/// characters. The one exception is the match-all prefix, which only
/// [`Path::parse`] produces, from the bare marker `"*"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Path {
    value: String,
    dynamic: bool,
}

impl Path {
    /// Build an exact key. Rejects empty input, control characters and the
    /// wildcard marker.
    pub fn literal(key: impl Into<String>) -> Result<Self, KVError> {
        let key = key.into();
        validate_key(&key)?;
        Ok(Path {
            value: key,
            dynamic: false,
        })
    }

    /// Build a prefix query over `prefix` (given without the marker). An
    /// empty prefix is rejected; parse `"*"` to match every key.
    pub fn prefix(prefix: impl Into<String>) -> Result<Self, KVError> {
        let prefix = prefix.into();
        if prefix.is_empty() {
            return Err(KVError::Validation(
                "prefix must not be empty; use \"*\" to match every key".into(),
            ));
        }
        if prefix.contains(WILDCARD) {
            return Err(KVError::Validation(format!(
                "prefix {:?} must not contain the wildcard marker",
                prefix
            )));
        }
        check_control(&prefix)?;
        Ok(Path {
            value: prefix,
            dynamic: true,
        })
    }

    /// Parse a raw path string: a trailing `*` makes it a prefix query.
    pub fn parse(raw: &str) -> Result<Self, KVError> {
        check_control(raw)?;
        match raw.find(WILDCARD) {
            None => Path::literal(raw),
            Some(0) if raw.len() == WILDCARD.len_utf8() => Ok(Path {
                value: String::new(),
                dynamic: true,
            }),
            Some(idx) if idx + WILDCARD.len_utf8() == raw.len() => Path::prefix(&raw[..idx]),
            Some(_) => Err(KVError::Validation(format!(
                "path {:?}: wildcard is only allowed once, as the final character",
                raw
            ))),
        }
    }

    pub fn is_dynamic(&self) -> bool {
        self.dynamic
    }

    /// The literal string handed to a store: the full key for an exact path,
    /// the prefix for a prefix query.
    pub fn trim_dynamic(&self) -> &str {
        &self.value
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// Whether a stored key falls under this path (prefix comparison in both
    /// modes, so an exact key may over-match longer siblings).
    pub fn matches(&self, key: &str) -> bool {
        key.starts_with(&self.value)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.dynamic {
            write!(f, "{}{}", self.value, WILDCARD)
        } else {
            f.write_str(&self.value)
        }
    }
}

impl FromStr for Path {
    type Err = KVError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Path::parse(s)
    }
}

/// How path segments are joined. Owned by whoever builds paths (a
/// [`Client`](crate::Client) carries one).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathConfig {
    #[serde(default = "default_separator")]
    pub separator: String,
}

fn default_separator() -> String {
    DEFAULT_SEPARATOR.to_string()
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            separator: default_separator(),
        }
    }
}

impl PathConfig {
    pub fn new(separator: impl Into<String>) -> Result<Self, KVError> {
        let config = Self {
            separator: separator.into(),
        };
        config.validate()?;
        Ok(config)
    }

    /// The separator must be non-empty, printable and distinct from the
    /// wildcard marker.
    pub fn validate(&self) -> Result<(), KVError> {
        if self.separator.is_empty() {
            return Err(KVError::Validation("separator must not be empty".into()));
        }
        if self.separator.contains(WILDCARD) {
            return Err(KVError::Validation(format!(
                "separator {:?} must not contain the wildcard marker",
                self.separator
            )));
        }
        check_control(&self.separator)
    }

    /// Join segments into a path. The last segment may be (or end with) the
    /// wildcard marker to produce a prefix query: `["users", "*"]` yields
    /// the prefix `users/`.
    pub fn join<I, S>(&self, segments: I) -> Result<Path, KVError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut joined = String::new();
        let mut count = 0usize;
        for segment in segments {
            let segment = segment.as_ref();
            if segment.is_empty() {
                return Err(KVError::Validation(format!(
                    "path segment {} is empty",
                    count
                )));
            }
            if count > 0 {
                joined.push_str(&self.separator);
            }
            joined.push_str(segment);
            count += 1;
        }
        if count == 0 {
            return Err(KVError::Validation("path needs at least one segment".into()));
        }
        Path::parse(&joined)
    }

    /// Split a key into its segments.
    pub fn segments<'a>(&self, key: &'a str) -> Vec<&'a str> {
        key.split(self.separator.as_str()).collect()
    }
}

/// Join segments with the default separator.
pub fn join<I, S>(segments: I) -> Result<Path, KVError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    PathConfig::default().join(segments)
}

/// Whether a raw path string contains the wildcard marker anywhere.
pub fn is_dynamic(raw: &str) -> bool {
    raw.contains(WILDCARD)
}

/// Remove the first wildcard marker from a raw path string.
pub fn trim_dynamic(raw: &str) -> String {
    raw.replacen(WILDCARD, "", 1)
}

/// Checks applied to every key that is about to be stored.
pub fn validate_key(key: &str) -> Result<(), KVError> {
    if key.is_empty() {
        return Err(KVError::Validation("key must not be empty".into()));
    }
    if key.contains(WILDCARD) {
        return Err(KVError::Validation(format!(
            "key {:?} must not contain the wildcard marker",
            key
        )));
    }
    check_control(key)
}

fn check_control(s: &str) -> Result<(), KVError> {
    if s.chars().any(char::is_control) {
        return Err(KVError::Validation(format!(
            "{:?} contains control characters",
            s
        )));
    }
    Ok(())
}
