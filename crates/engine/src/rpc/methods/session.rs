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

//! Session lifecycle RPC methods.
//!
//! - `wdb_startSession` registers a session for an execution
//! - `wdb_stopSession` ends it and releases suspended branches
//! - `wdb_listSessions` / `wdb_getSessionState` report session summaries
//! - `wdb_getActiveBreakpointHit` reports the most recent unresumed hit

use serde_json::Value;

use super::{parse_params, resolve_session, to_value, SessionParams};
use crate::{core::Debugger, rpc::types::RpcError};

pub fn start_session(debugger: &Debugger, params: Option<Value>) -> Result<Value, RpcError> {
    let params: SessionParams = parse_params(params)?;
    let session = debugger.start_session(params.key())?;
    to_value(session.info())
}

pub fn stop_session(debugger: &Debugger, params: Option<Value>) -> Result<Value, RpcError> {
    let params: SessionParams = parse_params(params)?;
    debugger.stop_session(&params.key())?;
    Ok(Value::Bool(true))
}

pub fn list_sessions(debugger: &Debugger) -> Result<Value, RpcError> {
    to_value(debugger.list_sessions())
}

pub fn get_session_state(debugger: &Debugger, params: Option<Value>) -> Result<Value, RpcError> {
    let params: SessionParams = parse_params(params)?;
    let session = resolve_session(debugger, &params)?;
    to_value(session.info())
}

pub fn get_active_breakpoint_hit(
    debugger: &Debugger,
    params: Option<Value>,
) -> Result<Value, RpcError> {
    let params: SessionParams = parse_params(params)?;
    let session = resolve_session(debugger, &params)?;
    to_value(session.active_hit())
}
