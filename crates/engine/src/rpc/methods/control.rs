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

//! Execution control RPC methods.
//!
//! `wdb_resume`, `wdb_pause`, and the three step methods. Step methods
//! accept an optional `branchId`; without one they target the first
//! paused branch. All return the resulting session summary.

use serde::Deserialize;
use serde_json::Value;

use super::{parse_params, resolve_session, to_value};
use crate::{core::Debugger, rpc::types::RpcError};
use wdb_common::types::BranchId;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ControlParams {
    workflow_id: String,
    execution_id: String,
    #[serde(default)]
    branch_id: Option<BranchId>,
}

impl ControlParams {
    fn session_params(&self) -> super::SessionParams {
        super::SessionParams {
            workflow_id: self.workflow_id.clone(),
            execution_id: self.execution_id.clone(),
        }
    }
}

pub fn resume(debugger: &Debugger, params: Option<Value>) -> Result<Value, RpcError> {
    let params: ControlParams = parse_params(params)?;
    let session = resolve_session(debugger, &params.session_params())?;
    session.resume();
    to_value(session.info())
}

pub fn pause(debugger: &Debugger, params: Option<Value>) -> Result<Value, RpcError> {
    let params: ControlParams = parse_params(params)?;
    let session = resolve_session(debugger, &params.session_params())?;
    session.pause();
    to_value(session.info())
}

pub fn step_over(debugger: &Debugger, params: Option<Value>) -> Result<Value, RpcError> {
    let params: ControlParams = parse_params(params)?;
    let session = resolve_session(debugger, &params.session_params())?;
    session.step_over(params.branch_id.as_ref());
    to_value(session.info())
}

pub fn step_into(debugger: &Debugger, params: Option<Value>) -> Result<Value, RpcError> {
    let params: ControlParams = parse_params(params)?;
    let session = resolve_session(debugger, &params.session_params())?;
    session.step_into(params.branch_id.as_ref());
    to_value(session.info())
}

pub fn step_out(debugger: &Debugger, params: Option<Value>) -> Result<Value, RpcError> {
    let params: ControlParams = parse_params(params)?;
    let session = resolve_session(debugger, &params.session_params())?;
    session.step_out(params.branch_id.as_ref());
    to_value(session.info())
}
