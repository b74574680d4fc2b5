//! Required-field validation for session configuration. Nothing
//! downstream (database connections, model calls) is attempted until
//! every required field has a value.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::SessionError;

// Field names containing any of these are treated as secrets and
// never printed.
const SECRET_MARKERS: &[&str] = &["password", "key", "token", "secret"];

/// User supplied settings for a session, e.g. connection parameters
/// and API keys. Ordered so it can be hashed and used as a cache key.
#[derive(Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Configuration(BTreeMap<String, String>);

impl Configuration {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn with(mut self, name: &str, value: &str) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: &str, value: &str) {
        self.0.insert(name.to_string(), value.to_string());
    }

    /// Returns the trimmed value of a field, or `None` when it is
    /// missing or blank.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.0.keys().map(String::as_str).collect()
    }

    pub fn is_secret(name: &str) -> bool {
        let name = name.to_lowercase();
        SECRET_MARKERS.iter().any(|m| name.contains(m))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Configuration {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl fmt::Debug for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (k, v) in self.0.iter() {
            if Self::is_secret(k) {
                map.entry(k, &"********");
            } else {
                map.entry(k, v);
            }
        }
        map.finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation {
    Complete,
    Incomplete { missing: BTreeSet<String> },
}

impl Validation {
    pub fn is_complete(&self) -> bool {
        matches!(self, Validation::Complete)
    }

    /// User facing guidance for what still needs to be provided.
    pub fn message(&self) -> Option<String> {
        match self {
            Validation::Complete => None,
            Validation::Incomplete { missing } => Some(format!(
                "Please provide the following to proceed: {}",
                missing.iter().cloned().collect::<Vec<_>>().join(", ")
            )),
        }
    }

    pub fn into_result(self) -> Result<(), SessionError> {
        match self {
            Validation::Complete => Ok(()),
            Validation::Incomplete { missing } => Err(SessionError::ConfigIncomplete { missing }),
        }
    }
}

/// Checks that every required field is present and non-blank. Reports
/// all of the missing fields rather than stopping at the first.
pub fn validate(fields: &Configuration, required: &[&str]) -> Validation {
    let missing: BTreeSet<String> = required
        .iter()
        .filter(|name| fields.get(name).is_none())
        .map(|name| name.to_string())
        .collect();

    if missing.is_empty() {
        Validation::Complete
    } else {
        Validation::Incomplete { missing }
    }
}
