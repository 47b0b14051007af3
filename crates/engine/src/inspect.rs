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

//! Lazy, masking-aware traversal of a node's variable scope.
//!
//! [`VariableInspector`] turns scope values into [`VariableMetadata`] the
//! UI can render: type, size, a short preview, and the number of children
//! available for lazy expansion one level at a time. Everything at or
//! under the credentials bucket is masked with no bypass: lookups return
//! the mask string, previews show the mask, and expansion of credential
//! containers yields masked children.
//!
//! Paths are dotted, bucket first: `input.items.0.name`. Array elements
//! are addressed by index.

use serde_json::{Map, Value};
use wdb_common::types::{
    value_size, ScopeBucket, ValueKind, VariableMetadata, VariableScope, CREDENTIAL_MASK,
};

use crate::error::{DebugError, DebugResult};

/// Maximum preview length before truncation.
const PREVIEW_MAX: usize = 80;

/// Stateless inspector over [`VariableScope`] values.
#[derive(Debug, Clone, Copy, Default)]
pub struct VariableInspector;

impl VariableInspector {
    /// Create an inspector.
    pub fn new() -> Self {
        Self
    }

    /// Describe a single value under the given dotted path.
    pub fn inspect_variable(
        &self,
        name: &str,
        value: &Value,
        path: &str,
        masked: bool,
    ) -> VariableMetadata {
        if masked {
            return VariableMetadata {
                name: name.to_string(),
                path: path.to_string(),
                kind: ValueKind::String,
                size: CREDENTIAL_MASK.len(),
                masked: true,
                preview: CREDENTIAL_MASK.to_string(),
                child_count: 0,
            };
        }

        VariableMetadata {
            name: name.to_string(),
            path: path.to_string(),
            kind: ValueKind::of(value),
            size: value_size(value),
            masked: false,
            preview: preview(value),
            child_count: child_count(value),
        }
    }

    /// Describe every top-level variable in the scope, bucket by bucket in
    /// display order.
    pub fn inspect_scope(&self, scope: &VariableScope) -> Vec<VariableMetadata> {
        let mut out = Vec::new();
        for (bucket, values) in scope.buckets() {
            let masked = bucket.is_masked();
            for (name, value) in values {
                out.push(self.inspect_variable(name, value, &format!("{bucket}.{name}"), masked));
            }
        }
        out
    }

    /// Expand the container at `path` by one level.
    ///
    /// Scalars expand to nothing. Children of credential containers are
    /// masked individually so their names are visible but their values are
    /// not.
    pub fn expand_variable(
        &self,
        scope: &VariableScope,
        path: &str,
    ) -> DebugResult<Vec<VariableMetadata>> {
        let (bucket, value) = resolve(scope, path)?;
        let masked = bucket.is_masked();

        let children = match value {
            Value::Object(map) => map
                .iter()
                .map(|(name, child)| {
                    self.inspect_variable(name, child, &format!("{path}.{name}"), masked)
                })
                .collect(),
            Value::Array(items) => items
                .iter()
                .enumerate()
                .map(|(idx, child)| {
                    self.inspect_variable(&idx.to_string(), child, &format!("{path}.{idx}"), masked)
                })
                .collect(),
            _ => Vec::new(),
        };

        Ok(children)
    }

    /// Read the value at a dotted path. Credential reads return the mask.
    pub fn get_variable_at_path(&self, scope: &VariableScope, path: &str) -> DebugResult<Value> {
        let (bucket, value) = resolve(scope, path)?;
        if bucket.is_masked() {
            return Ok(Value::String(CREDENTIAL_MASK.to_string()));
        }
        Ok(value.clone())
    }

    /// Write the value at a dotted path, for test-time value injection.
    ///
    /// Intermediate containers must already exist; only the final segment
    /// may be created (in objects). Array writes require an existing index.
    pub fn set_variable_at_path(
        &self,
        scope: &mut VariableScope,
        path: &str,
        value: Value,
    ) -> DebugResult<()> {
        let (bucket, rest) = split_bucket(path)?;
        if rest.is_empty() {
            return Err(DebugError::InvalidPath(path.to_string()));
        }

        let segments: Vec<&str> = rest.split('.').collect();
        let (last, parents) =
            segments.split_last().ok_or_else(|| DebugError::InvalidPath(path.to_string()))?;

        let mut current = ContainerMut::Map(scope.bucket_mut(bucket));
        for segment in parents {
            current = current.descend(segment).ok_or_else(|| {
                DebugError::InvalidPath(path.to_string())
            })?;
        }
        current.write(last, value).map_err(|_| DebugError::InvalidPath(path.to_string()))
    }

    /// Filter metadata by a substring of name or path.
    pub fn search_variables(
        &self,
        variables: &[VariableMetadata],
        text: &str,
        case_sensitive: bool,
    ) -> Vec<VariableMetadata> {
        let needle = if case_sensitive { text.to_string() } else { text.to_lowercase() };
        variables
            .iter()
            .filter(|meta| {
                let (name, path) = if case_sensitive {
                    (meta.name.clone(), meta.path.clone())
                } else {
                    (meta.name.to_lowercase(), meta.path.to_lowercase())
                };
                name.contains(&needle) || path.contains(&needle)
            })
            .cloned()
            .collect()
    }
}

/// Short display preview of a value. Containers summarize; scalars render
/// compactly, truncated past [`PREVIEW_MAX`].
fn preview(value: &Value) -> String {
    let text = match value {
        Value::Object(map) => {
            return if map.len() == 1 {
                "{1 field}".to_string()
            } else {
                format!("{{{} fields}}", map.len())
            };
        }
        Value::Array(items) => {
            return if items.len() == 1 {
                "[1 item]".to_string()
            } else {
                format!("[{} items]", items.len())
            };
        }
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };

    if text.chars().count() > PREVIEW_MAX {
        let truncated: String = text.chars().take(PREVIEW_MAX).collect();
        format!("{truncated}…")
    } else {
        text
    }
}

fn child_count(value: &Value) -> usize {
    match value {
        Value::Object(map) => map.len(),
        Value::Array(items) => items.len(),
        _ => 0,
    }
}

fn split_bucket(path: &str) -> DebugResult<(ScopeBucket, &str)> {
    let (head, rest) = match path.split_once('.') {
        Some((head, rest)) => (head, rest),
        None => (path, ""),
    };
    let bucket: ScopeBucket =
        head.parse().map_err(|_| DebugError::InvalidPath(path.to_string()))?;
    Ok((bucket, rest))
}

/// Resolve a dotted path to the bucket it lives in and the value it names.
fn resolve<'a>(scope: &'a VariableScope, path: &str) -> DebugResult<(ScopeBucket, &'a Value)> {
    let (bucket, rest) = split_bucket(path)?;
    if rest.is_empty() {
        return Err(DebugError::InvalidPath(path.to_string()));
    }

    let mut segments = rest.split('.');
    let first = segments.next().ok_or_else(|| DebugError::InvalidPath(path.to_string()))?;
    let mut current = scope
        .bucket(bucket)
        .get(first)
        .ok_or_else(|| DebugError::InvalidPath(path.to_string()))?;

    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|idx| items.get(idx)),
            _ => None,
        }
        .ok_or_else(|| DebugError::InvalidPath(path.to_string()))?;
    }

    Ok((bucket, current))
}

/// Mutable cursor over either a bucket map or a JSON container.
enum ContainerMut<'a> {
    Map(&'a mut Map<String, Value>),
    Value(&'a mut Value),
}

impl<'a> ContainerMut<'a> {
    fn descend(self, segment: &str) -> Option<ContainerMut<'a>> {
        match self {
            ContainerMut::Map(map) => map.get_mut(segment).map(ContainerMut::Value),
            ContainerMut::Value(Value::Object(map)) => {
                map.get_mut(segment).map(ContainerMut::Value)
            }
            ContainerMut::Value(Value::Array(items)) => {
                let idx = segment.parse::<usize>().ok()?;
                items.get_mut(idx).map(ContainerMut::Value)
            }
            ContainerMut::Value(_) => None,
        }
    }

    fn write(self, segment: &str, value: Value) -> Result<(), ()> {
        match self {
            ContainerMut::Map(map) => {
                map.insert(segment.to_string(), value);
                Ok(())
            }
            ContainerMut::Value(Value::Object(map)) => {
                map.insert(segment.to_string(), value);
                Ok(())
            }
            ContainerMut::Value(Value::Array(items)) => {
                let idx = segment.parse::<usize>().map_err(|_| ())?;
                let slot = items.get_mut(idx).ok_or(())?;
                *slot = value;
                Ok(())
            }
            ContainerMut::Value(_) => Err(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn test_scope() -> VariableScope {
        VariableScope::new()
            .with(ScopeBucket::Input, "value", json!(11))
            .with(ScopeBucket::Input, "items", json!([1, 2, 3]))
            .with(ScopeBucket::Input, "user", json!({"name": "bob", "age": 42}))
            .with(ScopeBucket::Output, "statusCode", json!(500))
            .with(ScopeBucket::Credentials, "apiKey", json!("super-secret"))
            .with(ScopeBucket::Credentials, "oauth", json!({"token": "t", "refresh": "r"}))
    }

    #[test]
    fn test_inspect_scope_lists_all_buckets() {
        let inspector = VariableInspector::new();
        let metas = inspector.inspect_scope(&test_scope());

        assert_eq!(metas.len(), 6);
        // Buckets come out in display order: input first.
        assert!(metas[0].path.starts_with("input."));
        let status = metas.iter().find(|m| m.path == "output.statusCode").unwrap();
        assert_eq!(status.kind, ValueKind::Number);
        assert_eq!(status.preview, "500");
        assert!(!status.masked);
    }

    #[test]
    fn test_container_metadata() {
        let inspector = VariableInspector::new();
        let metas = inspector.inspect_scope(&test_scope());

        let items = metas.iter().find(|m| m.path == "input.items").unwrap();
        assert_eq!(items.kind, ValueKind::Array);
        assert_eq!(items.child_count, 3);
        assert_eq!(items.preview, "[3 items]");

        let user = metas.iter().find(|m| m.path == "input.user").unwrap();
        assert_eq!(user.kind, ValueKind::Object);
        assert_eq!(user.child_count, 2);
        assert_eq!(user.preview, "{2 fields}");
    }

    #[test]
    fn test_credentials_are_masked_in_scope_listing() {
        let inspector = VariableInspector::new();
        let metas = inspector.inspect_scope(&test_scope());

        for meta in metas.iter().filter(|m| m.path.starts_with("credentials.")) {
            assert!(meta.masked);
            assert_eq!(meta.preview, CREDENTIAL_MASK);
            assert_eq!(meta.child_count, 0);
            assert!(!meta.preview.contains("secret"));
        }
    }

    #[test]
    fn test_expand_one_level() {
        let inspector = VariableInspector::new();
        let scope = test_scope();

        let children = inspector.expand_variable(&scope, "input.user").unwrap();
        assert_eq!(children.len(), 2);
        let age = children.iter().find(|m| m.name == "age").unwrap();
        assert_eq!(age.path, "input.user.age");
        assert_eq!(age.preview, "42");

        let elements = inspector.expand_variable(&scope, "input.items").unwrap();
        assert_eq!(elements.len(), 3);
        assert_eq!(elements[0].path, "input.items.0");
    }

    #[test]
    fn test_expand_scalar_is_empty() {
        let inspector = VariableInspector::new();
        let children = inspector.expand_variable(&test_scope(), "input.value").unwrap();
        assert!(children.is_empty());
    }

    #[test]
    fn test_expand_credentials_masks_children() {
        let inspector = VariableInspector::new();
        let children = inspector.expand_variable(&test_scope(), "credentials.oauth").unwrap();

        assert_eq!(children.len(), 2);
        for child in &children {
            assert!(child.masked);
            assert_eq!(child.preview, CREDENTIAL_MASK);
        }
    }

    #[test]
    fn test_get_at_path() {
        let inspector = VariableInspector::new();
        let scope = test_scope();

        assert_eq!(inspector.get_variable_at_path(&scope, "input.value").unwrap(), json!(11));
        assert_eq!(inspector.get_variable_at_path(&scope, "input.items.1").unwrap(), json!(2));
        assert_eq!(
            inspector.get_variable_at_path(&scope, "input.user.name").unwrap(),
            json!("bob")
        );
    }

    #[test]
    fn test_get_credentials_returns_mask_at_any_depth() {
        let inspector = VariableInspector::new();
        let scope = test_scope();

        assert_eq!(
            inspector.get_variable_at_path(&scope, "credentials.apiKey").unwrap(),
            json!(CREDENTIAL_MASK)
        );
        assert_eq!(
            inspector.get_variable_at_path(&scope, "credentials.oauth.token").unwrap(),
            json!(CREDENTIAL_MASK)
        );
    }

    #[test]
    fn test_invalid_paths() {
        let inspector = VariableInspector::new();
        let scope = test_scope();

        for path in ["secrets.x", "input.missing", "input.items.9", "input.value.deeper", "input"]
        {
            assert!(
                matches!(
                    inspector.get_variable_at_path(&scope, path),
                    Err(DebugError::InvalidPath(_))
                ),
                "path {path} should be invalid"
            );
        }
    }

    #[test]
    fn test_set_at_path() {
        let inspector = VariableInspector::new();
        let mut scope = test_scope();

        inspector.set_variable_at_path(&mut scope, "input.value", json!(99)).unwrap();
        assert_eq!(scope.input.get("value"), Some(&json!(99)));

        inspector.set_variable_at_path(&mut scope, "input.user.age", json!(43)).unwrap();
        assert_eq!(inspector.get_variable_at_path(&scope, "input.user.age").unwrap(), json!(43));

        inspector.set_variable_at_path(&mut scope, "input.items.0", json!(7)).unwrap();
        assert_eq!(inspector.get_variable_at_path(&scope, "input.items.0").unwrap(), json!(7));

        // New top-level entries may be created.
        inspector.set_variable_at_path(&mut scope, "variables.injected", json!(true)).unwrap();
        assert_eq!(scope.variables.get("injected"), Some(&json!(true)));
    }

    #[test]
    fn test_set_at_invalid_path() {
        let inspector = VariableInspector::new();
        let mut scope = test_scope();

        assert!(inspector
            .set_variable_at_path(&mut scope, "input.missing.deep", json!(1))
            .is_err());
        assert!(inspector.set_variable_at_path(&mut scope, "input.items.9", json!(1)).is_err());
        assert!(inspector.set_variable_at_path(&mut scope, "input", json!(1)).is_err());
    }

    #[test]
    fn test_search_variables() {
        let inspector = VariableInspector::new();
        let metas = inspector.inspect_scope(&test_scope());

        let hits = inspector.search_variables(&metas, "status", false);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].path, "output.statusCode");

        // Case-insensitive by default, sensitive on request.
        assert_eq!(inspector.search_variables(&metas, "STATUS", false).len(), 1);
        assert!(inspector.search_variables(&metas, "STATUS", true).is_empty());

        // Path segments match too.
        let by_bucket = inspector.search_variables(&metas, "credentials.", false);
        assert_eq!(by_bucket.len(), 2);
    }

    #[test]
    fn test_long_string_preview_truncates() {
        let inspector = VariableInspector::new();
        let long = "x".repeat(200);
        let meta = inspector.inspect_variable("s", &json!(long), "input.s", false);
        assert!(meta.preview.chars().count() <= PREVIEW_MAX + 1);
        assert!(meta.preview.ends_with('…'));
    }
}
