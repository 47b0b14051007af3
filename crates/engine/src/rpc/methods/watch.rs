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

//! Watch expression RPC methods.

use serde::Deserialize;
use serde_json::Value;

use super::{parse_params, resolve_session, to_value, SessionParams};
use crate::{core::Debugger, rpc::types::RpcError};
use wdb_common::types::WatchId;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddWatchParams {
    workflow_id: String,
    execution_id: String,
    expression: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoveWatchParams {
    workflow_id: String,
    execution_id: String,
    watch_id: WatchId,
}

pub fn add_watch(debugger: &Debugger, params: Option<Value>) -> Result<Value, RpcError> {
    let params: AddWatchParams = parse_params(params)?;
    let session = resolve_session(
        debugger,
        &SessionParams {
            workflow_id: params.workflow_id.clone(),
            execution_id: params.execution_id.clone(),
        },
    )?;
    to_value(session.add_watch(&params.expression))
}

pub fn remove_watch(debugger: &Debugger, params: Option<Value>) -> Result<Value, RpcError> {
    let params: RemoveWatchParams = parse_params(params)?;
    let session = resolve_session(
        debugger,
        &SessionParams {
            workflow_id: params.workflow_id.clone(),
            execution_id: params.execution_id.clone(),
        },
    )?;
    session.remove_watch(params.watch_id)?;
    Ok(Value::Bool(true))
}

pub fn list_watches(debugger: &Debugger, params: Option<Value>) -> Result<Value, RpcError> {
    let params: SessionParams = parse_params(params)?;
    let session = resolve_session(debugger, &params)?;
    to_value(session.watches())
}
