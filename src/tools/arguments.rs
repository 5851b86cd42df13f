//! Typed accessors over a tool call's JSON arguments.

use serde::de::DeserializeOwned;

use crate::error::PalaverError;

/// Arguments passed to a tool, as parsed from the model's tool call.
#[derive(Debug, Clone, Default)]
pub struct ToolArguments {
    value: serde_json::Value,
}

impl ToolArguments {
    /// Wrap a raw JSON value (normally an object).
    pub fn new(value: serde_json::Value) -> Self {
        Self { value }
    }

    /// The underlying JSON value.
    pub fn raw(&self) -> &serde_json::Value {
        &self.value
    }

    /// Get a required string argument.
    pub fn get_str(&self, key: &str) -> Result<&str, PalaverError> {
        self.value
            .get(key)
            .and_then(|v| v.as_str())
            .ok_or_else(|| missing(key, "string"))
    }

    /// Get an optional string argument.
    pub fn get_str_opt(&self, key: &str) -> Option<&str> {
        self.value.get(key).and_then(|v| v.as_str())
    }

    /// Get a required integer argument.
    pub fn get_i64(&self, key: &str) -> Result<i64, PalaverError> {
        self.value
            .get(key)
            .and_then(|v| v.as_i64())
            .ok_or_else(|| missing(key, "integer"))
    }

    /// Get a required boolean argument.
    pub fn get_bool(&self, key: &str) -> Result<bool, PalaverError> {
        self.value
            .get(key)
            .and_then(|v| v.as_bool())
            .ok_or_else(|| missing(key, "boolean"))
    }

    /// Deserialize the full argument object into a typed value.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, PalaverError> {
        Ok(serde_json::from_value(self.value.clone())?)
    }
}

fn missing(key: &str, expected: &str) -> PalaverError {
    PalaverError::InvalidArgument(format!("missing or invalid {expected} argument '{key}'"))
}
