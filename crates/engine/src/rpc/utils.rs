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

//! Port selection and error helpers for the RPC server.

use std::net::TcpListener;

use eyre::{eyre, Result};
use tracing::debug;
use wdb_common::env::WDB_PORT;

use super::types::{error_codes, RpcError};

/// Port tried first when neither flag nor environment picks one.
pub const DEFAULT_PORT: u16 = 3000;

/// Find an available port starting from a base port.
pub fn find_available_port(start_port: u16) -> Result<u16> {
    for port in start_port..65535 {
        if is_port_available(port) {
            return Ok(port);
        }
    }
    Err(eyre!("no available port found in range {start_port}-65534"))
}

/// Check whether a port is bindable on localhost.
pub fn is_port_available(port: u16) -> bool {
    TcpListener::bind(("127.0.0.1", port)).is_ok()
}

/// Resolve the listen port: `WDB_PORT` when set and valid, otherwise the
/// default port, searching upward when the preferred one is taken.
pub fn resolve_port() -> Result<u16> {
    let preferred = match std::env::var(WDB_PORT) {
        Ok(value) => value
            .parse::<u16>()
            .map_err(|_| eyre!("invalid {WDB_PORT} value '{value}': expected a port number"))?,
        Err(_) => DEFAULT_PORT,
    };
    if is_port_available(preferred) {
        Ok(preferred)
    } else {
        debug!("port {preferred} taken, searching upward");
        find_available_port(preferred + 1)
    }
}

/// Invalid-params error with a caller-facing message.
pub fn invalid_params(message: impl Into<String>) -> RpcError {
    RpcError { code: error_codes::INVALID_PARAMS, message: message.into(), data: None }
}

/// Method-not-found error for an unknown method name.
pub fn method_not_found(method: &str) -> RpcError {
    RpcError {
        code: error_codes::METHOD_NOT_FOUND,
        message: format!("method '{method}' not found"),
        data: None,
    }
}

/// Internal error with a caller-facing message.
pub fn internal_error(message: impl Into<String>) -> RpcError {
    RpcError { code: error_codes::INTERNAL_ERROR, message: message.into(), data: None }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_available_port() {
        let port = find_available_port(50000).unwrap();
        assert!(port >= 50000);
        assert!(is_port_available(port));
    }

    #[test]
    fn test_error_helpers() {
        assert_eq!(invalid_params("bad").code, error_codes::INVALID_PARAMS);
        let err = method_not_found("wdb_missing");
        assert_eq!(err.code, error_codes::METHOD_NOT_FOUND);
        assert!(err.message.contains("wdb_missing"));
        assert_eq!(internal_error("boom").code, error_codes::INTERNAL_ERROR);
    }
}
