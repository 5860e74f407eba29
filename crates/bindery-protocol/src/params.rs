//! Per-deployment string parameters.
//!
//! Built once at start and shared by reference; the dispatch core reads two
//! flags from it: the forced request character encoding and the legacy REST
//! method-name recovery toggle.

use std::collections::HashMap;

/// Key of the forced request character encoding.
pub const FORCED_ENCODING: &str = "bindery.request.encoding";
/// Key of the REST compatibility toggle (recover names from `method`).
pub const LEGACY_METHOD_NAMES: &str = "bindery.rest.legacy-method-names";

#[derive(Debug, Clone, Default)]
pub struct DeploymentParams {
    values: HashMap<String, String>,
}

impl DeploymentParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Parse a `key=value` assignment. A missing `=` yields an empty value.
    pub fn parse_assignment(raw: &str) -> Option<(String, String)> {
        let (key, value) = raw.split_once('=').unwrap_or((raw, ""));
        let key = key.trim();
        if key.is_empty() {
            return None;
        }
        Some((key.to_string(), value.trim().to_string()))
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn forced_encoding(&self) -> Option<&str> {
        self.get(FORCED_ENCODING).filter(|v| !v.trim().is_empty())
    }

    pub fn legacy_method_names(&self) -> bool {
        self.get(LEGACY_METHOD_NAMES).is_some_and(is_truthy)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "yes" | "on" | "1"
    )
}
