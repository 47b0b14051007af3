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

//! Variable inspection RPC methods.
//!
//! All methods operate on the scope of the addressed branch, defaulting
//! to the first paused branch. Credential values come back masked with
//! no bypass.

use serde::Deserialize;
use serde_json::Value;

use super::{parse_params, resolve_session, to_value, SessionParams};
use crate::{core::Debugger, rpc::types::RpcError};
use wdb_common::types::BranchId;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScopeParams {
    workflow_id: String,
    execution_id: String,
    #[serde(default)]
    branch_id: Option<BranchId>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PathParams {
    workflow_id: String,
    execution_id: String,
    #[serde(default)]
    branch_id: Option<BranchId>,
    path: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SetParams {
    workflow_id: String,
    execution_id: String,
    #[serde(default)]
    branch_id: Option<BranchId>,
    path: String,
    value: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchParams {
    workflow_id: String,
    execution_id: String,
    #[serde(default)]
    branch_id: Option<BranchId>,
    text: String,
    #[serde(default)]
    case_sensitive: bool,
}

fn session_params(workflow_id: &str, execution_id: &str) -> SessionParams {
    SessionParams {
        workflow_id: workflow_id.to_string(),
        execution_id: execution_id.to_string(),
    }
}

pub fn inspect_scope(debugger: &Debugger, params: Option<Value>) -> Result<Value, RpcError> {
    let params: ScopeParams = parse_params(params)?;
    let session = resolve_session(
        debugger,
        &session_params(&params.workflow_id, &params.execution_id),
    )?;
    to_value(session.inspect_variables(params.branch_id.as_ref()))
}

pub fn expand_variable(debugger: &Debugger, params: Option<Value>) -> Result<Value, RpcError> {
    let params: PathParams = parse_params(params)?;
    let session = resolve_session(
        debugger,
        &session_params(&params.workflow_id, &params.execution_id),
    )?;
    to_value(session.expand_variable(params.branch_id.as_ref(), &params.path)?)
}

pub fn search_variables(debugger: &Debugger, params: Option<Value>) -> Result<Value, RpcError> {
    let params: SearchParams = parse_params(params)?;
    let session = resolve_session(
        debugger,
        &session_params(&params.workflow_id, &params.execution_id),
    )?;
    to_value(session.search_variables(
        params.branch_id.as_ref(),
        &params.text,
        params.case_sensitive,
    ))
}

pub fn get_variable(debugger: &Debugger, params: Option<Value>) -> Result<Value, RpcError> {
    let params: PathParams = parse_params(params)?;
    let session = resolve_session(
        debugger,
        &session_params(&params.workflow_id, &params.execution_id),
    )?;
    Ok(session.get_variable(params.branch_id.as_ref(), &params.path)?)
}

pub fn set_variable(debugger: &Debugger, params: Option<Value>) -> Result<Value, RpcError> {
    let params: SetParams = parse_params(params)?;
    let session = resolve_session(
        debugger,
        &session_params(&params.workflow_id, &params.execution_id),
    )?;
    session.set_variable(params.branch_id.as_ref(), &params.path, params.value)?;
    Ok(Value::Bool(true))
}
