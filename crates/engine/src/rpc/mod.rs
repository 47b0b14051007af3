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

//! JSON-RPC 2.0 surface of the debugger.
//!
//! HTTP POST `/` carries method calls, GET `/health` reports liveness, and
//! GET `/ws` upgrades to a WebSocket streaming lifecycle events (and,
//! when a session key is given, that session's log entries).

pub mod methods;
pub mod server;
pub mod types;
pub mod utils;

pub use methods::MethodHandler;
pub use server::{DebugRpcServer, RpcServerHandle};
pub use types::{error_codes, RpcError, RpcId, RpcRequest, RpcResponse};
