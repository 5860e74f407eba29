//! Wire-format independent procedure call.

use indexmap::IndexMap;
use serde::Serialize;

/// One remote invocation: a procedure name plus string-valued parameters in
/// arrival order. Re-inserting a key overwrites its value in place, so the
/// last occurrence on the wire wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcedureCall {
    name: String,
    parameters: IndexMap<String, String>,
}

impl ProcedureCall {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: IndexMap::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn with_parameters(mut self, parameters: IndexMap<String, String>) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parameters(&self) -> &IndexMap<String, String> {
        &self.parameters
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.parameters.insert(key.into(), value.into());
    }

    pub fn into_parts(self) -> (String, IndexMap<String, String>) {
        (self.name, self.parameters)
    }
}
