// WDB - Workflow Debugger
// Copyright (C) 2024 Zhuo Zhang and Wuqi Zhang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

use std::{fmt::Display, str::FromStr};

use eyre::{bail, Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Placeholder returned wherever a credential value would otherwise appear.
pub const CREDENTIAL_MASK: &str = "***";

/// The named buckets a node's variable scope is divided into.
///
/// Ordering matters for display: inspection results list buckets in the
/// order declared here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ScopeBucket {
    /// Data flowing into the node from its upstream connections
    Input,
    /// Data the node produced (available after execution)
    Output,
    /// Workflow-level variables
    Variables,
    /// Environment values visible to the execution
    Environment,
    /// Credential material; always masked on read
    Credentials,
}

impl ScopeBucket {
    /// All buckets in display order.
    pub const ALL: [Self; 5] =
        [Self::Input, Self::Output, Self::Variables, Self::Environment, Self::Credentials];

    /// The bucket name as it appears in expression paths (`input.value`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Output => "output",
            Self::Variables => "variables",
            Self::Environment => "environment",
            Self::Credentials => "credentials",
        }
    }

    /// Whether values in this bucket are masked unconditionally.
    pub fn is_masked(&self) -> bool {
        matches!(self, Self::Credentials)
    }
}

impl Display for ScopeBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScopeBucket {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "input" => Ok(Self::Input),
            "output" => Ok(Self::Output),
            "variables" => Ok(Self::Variables),
            "environment" => Ok(Self::Environment),
            "credentials" => Ok(Self::Credentials),
            other => bail!("unknown scope bucket: {other}"),
        }
    }
}

/// The variable scope a node executes against.
///
/// Credential values are stored raw here; masking is applied at every read
/// surface (inspection, expressions, path lookup), never at storage time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VariableScope {
    /// Node input items
    #[serde(default)]
    pub input: Map<String, Value>,
    /// Node output items
    #[serde(default)]
    pub output: Map<String, Value>,
    /// Workflow variables
    #[serde(default)]
    pub variables: Map<String, Value>,
    /// Environment values
    #[serde(default)]
    pub environment: Map<String, Value>,
    /// Credential material (masked on every read path)
    #[serde(default)]
    pub credentials: Map<String, Value>,
}

impl VariableScope {
    /// Creates an empty scope.
    pub fn new() -> Self {
        Self::default()
    }

    /// Immutable access to a bucket's map.
    pub fn bucket(&self, bucket: ScopeBucket) -> &Map<String, Value> {
        match bucket {
            ScopeBucket::Input => &self.input,
            ScopeBucket::Output => &self.output,
            ScopeBucket::Variables => &self.variables,
            ScopeBucket::Environment => &self.environment,
            ScopeBucket::Credentials => &self.credentials,
        }
    }

    /// Mutable access to a bucket's map.
    pub fn bucket_mut(&mut self, bucket: ScopeBucket) -> &mut Map<String, Value> {
        match bucket {
            ScopeBucket::Input => &mut self.input,
            ScopeBucket::Output => &mut self.output,
            ScopeBucket::Variables => &mut self.variables,
            ScopeBucket::Environment => &mut self.environment,
            ScopeBucket::Credentials => &mut self.credentials,
        }
    }

    /// Sets a top-level entry in the given bucket.
    pub fn set(&mut self, bucket: ScopeBucket, key: impl Into<String>, value: Value) {
        self.bucket_mut(bucket).insert(key.into(), value);
    }

    /// Builder-style variant of [`Self::set`].
    pub fn with(mut self, bucket: ScopeBucket, key: impl Into<String>, value: Value) -> Self {
        self.set(bucket, key, value);
        self
    }

    /// All buckets paired with their maps, in display order.
    pub fn buckets(&self) -> [(ScopeBucket, &Map<String, Value>); 5] {
        [
            (ScopeBucket::Input, &self.input),
            (ScopeBucket::Output, &self.output),
            (ScopeBucket::Variables, &self.variables),
            (ScopeBucket::Environment, &self.environment),
            (ScopeBucket::Credentials, &self.credentials),
        ]
    }

    /// True when every bucket is empty.
    pub fn is_empty(&self) -> bool {
        self.buckets().iter().all(|(_, map)| map.is_empty())
    }
}

/// The JSON type of an inspected value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ValueKind {
    /// JSON null
    Null,
    /// true / false
    Bool,
    /// Integer or float
    Number,
    /// UTF-8 string
    String,
    /// Ordered list
    Array,
    /// Key/value map
    Object,
}

impl ValueKind {
    /// Classifies a JSON value.
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(_) => Self::Bool,
            Value::Number(_) => Self::Number,
            Value::String(_) => Self::String,
            Value::Array(_) => Self::Array,
            Value::Object(_) => Self::Object,
        }
    }

    /// Lowercase name, matching the serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool => "bool",
            Self::Number => "number",
            Self::String => "string",
            Self::Array => "array",
            Self::Object => "object",
        }
    }
}

impl Display for ValueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inspection result for a single variable or container child.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableMetadata {
    /// Variable name (last path segment)
    pub name: String,
    /// Full dotted path from the bucket root (e.g. `input.items.0.name`)
    pub path: String,
    /// JSON type of the value
    #[serde(rename = "type")]
    pub kind: ValueKind,
    /// Approximate serialized size in bytes
    pub size: usize,
    /// Whether the value was masked (credentials bucket)
    pub masked: bool,
    /// Short display preview of the value
    pub preview: String,
    /// Number of direct children (0 for scalars)
    pub child_count: usize,
}

/// Approximate byte size of a value (its compact JSON length).
pub fn value_size(value: &Value) -> usize {
    serde_json::to_string(value).map(|s| s.len()).unwrap_or(0)
}
