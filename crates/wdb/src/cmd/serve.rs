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

//! Start an empty debugger and expose it over JSON-RPC.

use std::sync::Arc;

use eyre::Result;
use tracing::info;
use wdb_engine::{
    core::{Debugger, DebuggerConfig},
    rpc::{DebugRpcServer, RpcServerHandle},
};

/// Start the debug RPC server. Sessions are created later by clients via
/// `wdb_startSession`; memory sampling starts with each session.
pub async fn run_serve(port: Option<u16>) -> Result<RpcServerHandle> {
    let config = DebuggerConfig::default().with_auto_memory_sampling(true);
    let debugger = Arc::new(Debugger::new(config));
    let server = DebugRpcServer::new(debugger);

    let handle = match port {
        Some(port) => server.start_on_port(port).await?,
        None => server.start().await?,
    };

    info!("Waiting for workflow executions to attach");

    Ok(handle)
}
