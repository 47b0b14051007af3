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

//! RPC method handlers, one module per functional area.

pub mod breakpoint;
pub mod control;
pub mod inspect;
pub mod log;
pub mod memory;
pub mod profile;
pub mod session;
pub mod watch;

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;
use wdb_common::types::SessionKey;

use super::{types::RpcError, utils::method_not_found};
use crate::core::Debugger;
use crate::session::DebugSession;

/// Dispatches RPC calls onto the debugger.
#[derive(Debug)]
pub struct MethodHandler {
    debugger: Arc<Debugger>,
}

impl MethodHandler {
    pub fn new(debugger: Arc<Debugger>) -> Self {
        Self { debugger }
    }

    /// Handle one RPC method call.
    pub fn handle_method(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> Result<Value, RpcError> {
        debug!(method, "handling RPC method");
        let debugger = &self.debugger;

        match method {
            // session lifecycle
            "wdb_startSession" => session::start_session(debugger, params),
            "wdb_stopSession" => session::stop_session(debugger, params),
            "wdb_listSessions" => session::list_sessions(debugger),
            "wdb_getSessionState" => session::get_session_state(debugger, params),
            "wdb_getActiveBreakpointHit" => {
                session::get_active_breakpoint_hit(debugger, params)
            }

            // execution control
            "wdb_resume" => control::resume(debugger, params),
            "wdb_pause" => control::pause(debugger, params),
            "wdb_stepOver" => control::step_over(debugger, params),
            "wdb_stepInto" => control::step_into(debugger, params),
            "wdb_stepOut" => control::step_out(debugger, params),

            // breakpoints
            "wdb_addBreakpoint" => breakpoint::add_breakpoint(debugger, params),
            "wdb_removeBreakpoint" => breakpoint::remove_breakpoint(debugger, params),
            "wdb_toggleBreakpoint" => breakpoint::toggle_breakpoint(debugger, params),
            "wdb_clearBreakpoints" => breakpoint::clear_breakpoints(debugger, params),
            "wdb_listBreakpoints" => breakpoint::list_breakpoints(debugger, params),
            "wdb_resetHitCounts" => breakpoint::reset_hit_counts(debugger, params),
            "wdb_exportBreakpoints" => breakpoint::export_breakpoints(debugger, params),
            "wdb_importBreakpoints" => breakpoint::import_breakpoints(debugger, params),

            // watches
            "wdb_addWatch" => watch::add_watch(debugger, params),
            "wdb_removeWatch" => watch::remove_watch(debugger, params),
            "wdb_listWatches" => watch::list_watches(debugger, params),

            // variable inspection
            "wdb_inspectScope" => inspect::inspect_scope(debugger, params),
            "wdb_expandVariable" => inspect::expand_variable(debugger, params),
            "wdb_searchVariables" => inspect::search_variables(debugger, params),
            "wdb_getVariable" => inspect::get_variable(debugger, params),
            "wdb_setVariable" => inspect::set_variable(debugger, params),

            // profiling
            "wdb_getPerformanceStatistics" => {
                profile::get_performance_statistics(debugger, params)
            }
            "wdb_getFlameGraph" => profile::get_flame_graph(debugger, params),

            // memory
            "wdb_getMemoryLeaks" => memory::get_memory_leaks(debugger, params),
            "wdb_getMemorySnapshots" => memory::get_memory_snapshots(debugger, params),
            "wdb_takeMemorySnapshot" => memory::take_memory_snapshot(debugger, params),
            "wdb_getGcEvents" => memory::get_gc_events(debugger, params),
            "wdb_getMemoryStats" => memory::get_memory_stats(debugger, params),

            // logs
            "wdb_getLogs" => log::get_logs(debugger, params),
            "wdb_exportLogs" => log::export_logs(debugger, params),
            "wdb_getLogStatistics" => log::get_log_statistics(debugger, params),

            _ => Err(method_not_found(method)),
        }
    }
}

/// Parameters shared by every session-scoped method.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SessionParams {
    pub workflow_id: String,
    pub execution_id: String,
}

impl SessionParams {
    pub fn key(&self) -> SessionKey {
        SessionKey::new(&self.workflow_id, &self.execution_id)
    }
}

/// Deserialize method params, mapping failures to invalid-params errors.
pub(crate) fn parse_params<T: DeserializeOwned>(params: Option<Value>) -> Result<T, RpcError> {
    serde_json::from_value(params.unwrap_or(Value::Null))
        .map_err(|e| super::utils::invalid_params(format!("invalid params: {e}")))
}

/// Look up the session addressed by the embedded key.
pub(crate) fn resolve_session(
    debugger: &Debugger,
    params: &SessionParams,
) -> Result<Arc<DebugSession>, RpcError> {
    debugger.session(&params.key()).map_err(RpcError::from)
}

/// Serialize a handler result, mapping failures to internal errors.
pub(crate) fn to_value<T: serde::Serialize>(value: T) -> Result<Value, RpcError> {
    serde_json::to_value(value)
        .map_err(|e| super::utils::internal_error(format!("serialization failed: {e}")))
}
