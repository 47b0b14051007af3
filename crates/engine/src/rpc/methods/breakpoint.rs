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

//! Breakpoint CRUD RPC methods.
//!
//! `wdb_addBreakpoint` takes a `type` plus the option matching it
//! (`condition`, `hitCount`, or `logMessage`); the breakpoint attaches to
//! `targetWorkflowId` when given, else to the session's own workflow so
//! sub-workflow nodes can be addressed. Export and import move the full
//! breakpoint set for configuration reuse across sessions.

use serde::Deserialize;
use serde_json::Value;

use super::{parse_params, resolve_session, to_value, SessionParams};
use crate::{
    core::Debugger,
    error::DebugError,
    rpc::{types::RpcError, utils::invalid_params},
};
use wdb_common::types::{Breakpoint, BreakpointId, BreakpointKind};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddBreakpointParams {
    workflow_id: String,
    execution_id: String,
    node_id: String,
    /// Workflow the node belongs to; defaults to the session's workflow
    #[serde(default)]
    target_workflow_id: Option<String>,
    #[serde(rename = "type")]
    kind: BreakpointKind,
    #[serde(default)]
    condition: Option<String>,
    #[serde(default)]
    hit_count: Option<u32>,
    #[serde(default)]
    log_message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BreakpointIdParams {
    workflow_id: String,
    execution_id: String,
    breakpoint_id: BreakpointId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImportParams {
    workflow_id: String,
    execution_id: String,
    breakpoints: Vec<Breakpoint>,
}

fn session_params(workflow_id: &str, execution_id: &str) -> SessionParams {
    SessionParams {
        workflow_id: workflow_id.to_string(),
        execution_id: execution_id.to_string(),
    }
}

pub fn add_breakpoint(debugger: &Debugger, params: Option<Value>) -> Result<Value, RpcError> {
    let params: AddBreakpointParams = parse_params(params)?;
    let session = resolve_session(
        debugger,
        &session_params(&params.workflow_id, &params.execution_id),
    )?;
    let workflow = params.target_workflow_id.as_deref().unwrap_or(&params.workflow_id);
    let manager = session.breakpoints();

    let breakpoint = match params.kind {
        BreakpointKind::Standard => manager.add_standard(&params.node_id, workflow),
        BreakpointKind::Conditional => {
            let condition = params
                .condition
                .as_deref()
                .ok_or_else(|| invalid_params("conditional breakpoint requires 'condition'"))?;
            manager.add_conditional(&params.node_id, workflow, condition)
        }
        BreakpointKind::HitCount => {
            let target = params
                .hit_count
                .ok_or_else(|| invalid_params("hitCount breakpoint requires 'hitCount'"))?;
            manager.add_hit_count(&params.node_id, workflow, target)
        }
        BreakpointKind::LogPoint => {
            let message = params
                .log_message
                .as_deref()
                .ok_or_else(|| invalid_params("logPoint breakpoint requires 'logMessage'"))?;
            manager.add_log_point(&params.node_id, workflow, message)
        }
    };
    to_value(breakpoint)
}

pub fn remove_breakpoint(debugger: &Debugger, params: Option<Value>) -> Result<Value, RpcError> {
    let params: BreakpointIdParams = parse_params(params)?;
    let session = resolve_session(
        debugger,
        &session_params(&params.workflow_id, &params.execution_id),
    )?;
    if !session.breakpoints().remove(params.breakpoint_id) {
        return Err(DebugError::BreakpointNotFound(params.breakpoint_id).into());
    }
    Ok(Value::Bool(true))
}

pub fn toggle_breakpoint(debugger: &Debugger, params: Option<Value>) -> Result<Value, RpcError> {
    let params: BreakpointIdParams = parse_params(params)?;
    let session = resolve_session(
        debugger,
        &session_params(&params.workflow_id, &params.execution_id),
    )?;
    let enabled = session.breakpoints().toggle(params.breakpoint_id)?;
    Ok(Value::Bool(enabled))
}

pub fn clear_breakpoints(debugger: &Debugger, params: Option<Value>) -> Result<Value, RpcError> {
    let params: SessionParams = parse_params(params)?;
    let session = resolve_session(debugger, &params)?;
    session.breakpoints().clear_all();
    Ok(Value::Bool(true))
}

pub fn list_breakpoints(debugger: &Debugger, params: Option<Value>) -> Result<Value, RpcError> {
    let params: SessionParams = parse_params(params)?;
    let session = resolve_session(debugger, &params)?;
    to_value(session.breakpoints().list())
}

pub fn reset_hit_counts(debugger: &Debugger, params: Option<Value>) -> Result<Value, RpcError> {
    let params: SessionParams = parse_params(params)?;
    let session = resolve_session(debugger, &params)?;
    session.breakpoints().reset_hit_counts();
    Ok(Value::Bool(true))
}

pub fn export_breakpoints(debugger: &Debugger, params: Option<Value>) -> Result<Value, RpcError> {
    let params: SessionParams = parse_params(params)?;
    let session = resolve_session(debugger, &params)?;
    to_value(session.breakpoints().export())
}

pub fn import_breakpoints(debugger: &Debugger, params: Option<Value>) -> Result<Value, RpcError> {
    let params: ImportParams = parse_params(params)?;
    let session = resolve_session(
        debugger,
        &session_params(&params.workflow_id, &params.execution_id),
    )?;
    let count = params.breakpoints.len();
    session.breakpoints().import(params.breakpoints);
    to_value(count)
}
