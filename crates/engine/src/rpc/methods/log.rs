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

//! Log query and export RPC methods.
//!
//! `filter` accepts the full [`LogFilter`] shape (levels, sources, time
//! range, text, pattern); omitted means everything.

use serde::Deserialize;
use serde_json::Value;

use super::{parse_params, resolve_session, to_value, SessionParams};
use crate::{core::Debugger, rpc::types::RpcError};
use wdb_common::types::{LogExportFormat, LogFilter};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GetLogsParams {
    workflow_id: String,
    execution_id: String,
    #[serde(default)]
    filter: Option<LogFilter>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExportLogsParams {
    workflow_id: String,
    execution_id: String,
    format: LogExportFormat,
    #[serde(default)]
    filter: Option<LogFilter>,
}

pub fn get_logs(debugger: &Debugger, params: Option<Value>) -> Result<Value, RpcError> {
    let params: GetLogsParams = parse_params(params)?;
    let session = resolve_session(
        debugger,
        &SessionParams {
            workflow_id: params.workflow_id.clone(),
            execution_id: params.execution_id.clone(),
        },
    )?;
    let filter = params.filter.unwrap_or_default();
    to_value(session.logger().get_logs(&filter))
}

pub fn export_logs(debugger: &Debugger, params: Option<Value>) -> Result<Value, RpcError> {
    let params: ExportLogsParams = parse_params(params)?;
    let session = resolve_session(
        debugger,
        &SessionParams {
            workflow_id: params.workflow_id.clone(),
            execution_id: params.execution_id.clone(),
        },
    )?;
    let exported = session.logger().export(params.format, params.filter.as_ref())?;
    Ok(Value::String(exported))
}

pub fn get_log_statistics(debugger: &Debugger, params: Option<Value>) -> Result<Value, RpcError> {
    let params: SessionParams = parse_params(params)?;
    let session = resolve_session(debugger, &params)?;
    to_value(session.logger().statistics())
}
