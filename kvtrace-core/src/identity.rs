//! Operation identities and the telemetry key names derived from them.
//!
//! Counts, histories and cached payloads share one flat key space. Cache
//! payloads live under hyphenated UUIDs; everything else is derived here so
//! that every process agrees on the same names.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Suffix of the list holding serialized call arguments.
pub const INPUTS_SUFFIX: &str = ":inputs";

/// Suffix of the list holding serialized call results.
pub const OUTPUTS_SUFFIX: &str = ":outputs";

/// Prefix of per-resource access counters.
pub const ACCESS_COUNT_PREFIX: &str = "count:";

/// Stable name of an instrumented operation, e.g. `Cache.store`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OperationId(String);

impl OperationId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Build the `<owner>.<method>` form used for methods.
    pub fn method(owner: &str, method: &str) -> Self {
        Self(format!("{}.{}", owner, method))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Telemetry key names for this operation.
    pub fn keys(&self) -> TelemetryKeys {
        TelemetryKeys::new(self)
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OperationId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for OperationId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// The three store keys an instrumented operation writes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryKeys {
    counter: String,
    inputs: String,
    outputs: String,
}

impl TelemetryKeys {
    pub fn new(id: &OperationId) -> Self {
        Self {
            counter: id.as_str().to_string(),
            inputs: format!("{}{}", id.as_str(), INPUTS_SUFFIX),
            outputs: format!("{}{}", id.as_str(), OUTPUTS_SUFFIX),
        }
    }

    /// Call counter key: the bare identity.
    pub fn counter(&self) -> &str {
        &self.counter
    }

    pub fn inputs(&self) -> &str {
        &self.inputs
    }

    pub fn outputs(&self) -> &str {
        &self.outputs
    }
}

/// Access counter key for a fetched resource.
pub fn access_count_key(url: &str) -> String {
    format!("{}{}", ACCESS_COUNT_PREFIX, url)
}
