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

//! Expression evaluation over a [`VariableScope`].
//!
//! Breakpoint conditions, watch expressions, and log point templates all
//! evaluate against the variable scope of the node about to execute. The
//! scope is flattened into dotted variable names (`input.value`,
//! `output.statusCode`, `variables.user.name`, ...) and handed to
//! `evalexpr`. Arrays are addressable both as tuples (`input.items`) and
//! by element path (`input.items.0`). Credential values are masked before
//! they ever reach an expression context, so conditions can never observe
//! a raw credential.

use evalexpr::{
    eval_boolean_with_context, eval_with_context, ContextWithMutableVariables, HashMapContext,
    Value as EvalValue,
};
use eyre::{eyre, Result};
use serde_json::Value as JsonValue;

use crate::types::{ScopeBucket, VariableScope, CREDENTIAL_MASK};

/// Normalize an expression by replacing any contiguous whitespace with a single space
pub fn normalize_expression(expr: &str) -> String {
    expr.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Build an `evalexpr` context from a variable scope.
///
/// Every leaf value in the scope becomes a dotted variable named after its
/// path (bucket name first). Arrays additionally register as tuples under
/// the array path itself so builtins like `len` work on them.
pub fn scope_context(scope: &VariableScope) -> Result<HashMapContext> {
    let mut ctx = HashMapContext::new();
    for (bucket, values) in scope.buckets() {
        let masked = bucket.is_masked();
        for (key, value) in values {
            insert_value(&mut ctx, &format!("{bucket}.{key}"), value, masked)?;
        }
    }
    Ok(ctx)
}

fn insert_value(
    ctx: &mut HashMapContext,
    path: &str,
    value: &JsonValue,
    masked: bool,
) -> Result<()> {
    if masked {
        // Credential subtrees collapse to the mask, shape included.
        ctx.set_value(path.to_string(), EvalValue::String(CREDENTIAL_MASK.to_string()))
            .map_err(|e| eyre!("failed to bind {path}: {e}"))?;
        return Ok(());
    }
    match value {
        JsonValue::Object(map) => {
            for (key, child) in map {
                insert_value(ctx, &format!("{path}.{key}"), child, masked)?;
            }
        }
        JsonValue::Array(items) => {
            for (idx, child) in items.iter().enumerate() {
                insert_value(ctx, &format!("{path}.{idx}"), child, masked)?;
            }
            ctx.set_value(path.to_string(), json_to_eval(value))
                .map_err(|e| eyre!("failed to bind {path}: {e}"))?;
        }
        _ => {
            ctx.set_value(path.to_string(), json_to_eval(value))
                .map_err(|e| eyre!("failed to bind {path}: {e}"))?;
        }
    }
    Ok(())
}

/// Convert a JSON value into an `evalexpr` value.
///
/// Objects have no `evalexpr` counterpart and degrade to their compact JSON
/// string; their fields remain individually addressable via dotted paths.
pub fn json_to_eval(value: &JsonValue) -> EvalValue {
    match value {
        JsonValue::Null => EvalValue::Empty,
        JsonValue::Bool(b) => EvalValue::Boolean(*b),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                EvalValue::Int(i)
            } else if let Some(f) = n.as_f64() {
                EvalValue::Float(f)
            } else {
                EvalValue::String(n.to_string())
            }
        }
        JsonValue::String(s) => EvalValue::String(s.clone()),
        JsonValue::Array(items) => EvalValue::Tuple(items.iter().map(json_to_eval).collect()),
        JsonValue::Object(_) => EvalValue::String(value.to_string()),
    }
}

/// Convert an `evalexpr` value back into JSON.
pub fn eval_to_json(value: EvalValue) -> JsonValue {
    match value {
        EvalValue::Empty => JsonValue::Null,
        EvalValue::Boolean(b) => JsonValue::Bool(b),
        EvalValue::Int(i) => JsonValue::from(i),
        EvalValue::Float(f) => {
            serde_json::Number::from_f64(f).map(JsonValue::Number).unwrap_or(JsonValue::Null)
        }
        EvalValue::String(s) => JsonValue::String(s),
        EvalValue::Tuple(items) => {
            JsonValue::Array(items.into_iter().map(eval_to_json).collect())
        }
    }
}

/// Evaluate a breakpoint condition against a scope.
///
/// The expression must produce a boolean. Parse errors, unknown variables,
/// and type mismatches all surface as errors; callers decide whether that
/// means "no match" (breakpoints do) or "error marker" (watches do).
pub fn evaluate_condition(condition: &str, scope: &VariableScope) -> Result<bool> {
    let ctx = scope_context(scope)?;
    eval_boolean_with_context(&normalize_expression(condition), &ctx)
        .map_err(|e| eyre!("condition `{condition}` failed: {e}"))
}

/// Evaluate an arbitrary expression against a scope and return its JSON value.
pub fn evaluate_expression(expr: &str, scope: &VariableScope) -> Result<JsonValue> {
    let ctx = scope_context(scope)?;
    eval_with_context(&normalize_expression(expr), &ctx)
        .map(eval_to_json)
        .map_err(|e| eyre!("expression `{expr}` failed: {e}"))
}

/// Render a log point template by substituting `{expr}` tokens.
///
/// Tokens whose expression fails to evaluate are left verbatim, including
/// the braces. An unterminated `{` is emitted as-is.
pub fn render_template(template: &str, scope: &VariableScope) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let Some(end) = after.find('}') else {
            out.push_str(&rest[start..]);
            return out;
        };
        let expr = &after[..end];
        match evaluate_expression(expr, scope) {
            Ok(value) => out.push_str(&render_value(&value)),
            Err(_) => {
                out.push('{');
                out.push_str(expr);
                out.push('}');
            }
        }
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    out
}

/// Render a JSON value for interpolation into a log message.
/// Strings render without surrounding quotes; everything else as JSON.
fn render_value(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}
