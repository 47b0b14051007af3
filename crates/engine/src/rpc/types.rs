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

//! JSON-RPC 2.0 protocol types.
//!
//! Wire structures shared by the server and its clients: requests,
//! responses, structured errors, and the error code table. Debugger
//! failures map onto stable application codes (the −33000 range) so UI
//! clients never have to parse message strings.

use serde::{Deserialize, Serialize};

use crate::error::DebugError;

/// JSON-RPC 2.0 request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    /// Protocol version, always "2.0"
    pub jsonrpc: String,
    /// Method name, e.g. "wdb_addBreakpoint"
    pub method: String,
    /// Method parameters, an object for all `wdb_` methods
    pub params: Option<serde_json::Value>,
    /// Identifier echoed in the response
    pub id: RpcId,
}

/// JSON-RPC 2.0 response. Carries either a result or an error, never both.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    /// Protocol version, always "2.0"
    pub jsonrpc: String,
    /// Method result, omitted on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    /// Error, omitted on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
    /// Identifier from the request
    pub id: RpcId,
}

impl RpcResponse {
    pub fn success(id: RpcId, result: serde_json::Value) -> Self {
        Self { jsonrpc: "2.0".to_string(), result: Some(result), error: None, id }
    }

    pub fn failure(id: RpcId, error: RpcError) -> Self {
        Self { jsonrpc: "2.0".to_string(), result: None, error: Some(error), id }
    }
}

/// JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcError {
    /// Numeric code, standard or from [`error_codes`]
    pub code: i32,
    /// Human-readable message
    pub message: String,
    /// Optional extra context
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl From<DebugError> for RpcError {
    fn from(err: DebugError) -> Self {
        let code = match &err {
            DebugError::SessionNotFound(_) => error_codes::SESSION_NOT_FOUND,
            DebugError::SessionAlreadyActive(_) => error_codes::SESSION_ALREADY_ACTIVE,
            DebugError::BreakpointNotFound(_) => error_codes::BREAKPOINT_NOT_FOUND,
            DebugError::WatchNotFound(_) => error_codes::WATCH_NOT_FOUND,
            DebugError::InvalidPath(_) => error_codes::INVALID_PATH,
            DebugError::ExportFailed(_) => error_codes::EXPORT_FAILED,
            DebugError::Other(_) => error_codes::INTERNAL_ERROR,
        };
        Self { code, message: err.to_string(), data: None }
    }
}

/// Request identifier, a string or a number per JSON-RPC 2.0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RpcId {
    /// Numeric identifier
    Number(u64),
    /// String identifier
    String(String),
}

/// JSON-RPC error codes: the standard set plus WDB application codes.
pub mod error_codes {
    // Standard JSON-RPC 2.0 error codes

    /// Invalid JSON was received by the server
    pub const PARSE_ERROR: i32 = -32700;
    /// The JSON sent is not a valid request object
    pub const INVALID_REQUEST: i32 = -32600;
    /// The method does not exist
    pub const METHOD_NOT_FOUND: i32 = -32601;
    /// Invalid method parameters
    pub const INVALID_PARAMS: i32 = -32602;
    /// Internal JSON-RPC error
    pub const INTERNAL_ERROR: i32 = -32603;

    // WDB application codes (starting from -33000)

    /// No active session under the given key
    pub const SESSION_NOT_FOUND: i32 = -33000;
    /// A session is already active under the given key
    pub const SESSION_ALREADY_ACTIVE: i32 = -33001;
    /// Breakpoint id not found in the session
    pub const BREAKPOINT_NOT_FOUND: i32 = -33002;
    /// Watch id not found in the session
    pub const WATCH_NOT_FOUND: i32 = -33003;
    /// Variable path did not resolve
    pub const INVALID_PATH: i32 = -33004;
    /// Breakpoint or log export failed
    pub const EXPORT_FAILED: i32 = -33005;
}
