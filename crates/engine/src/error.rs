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

//! Typed errors for the debugging API boundary.
//!
//! Components return [`DebugError`] so callers (the RPC layer in particular)
//! can map failures to stable error codes instead of parsing message strings.
//! Internal plumbing that has no caller-visible contract keeps using
//! `eyre::Result`.

use thiserror::Error;
use wdb_common::types::{BreakpointId, SessionKey, WatchId};

/// Errors surfaced by debugger operations.
#[derive(Debug, Error)]
pub enum DebugError {
    /// No active session is registered under the given key
    #[error("no active debug session for {0}")]
    SessionNotFound(SessionKey),

    /// A session is already registered under the given key
    #[error("debug session already active for {0}")]
    SessionAlreadyActive(SessionKey),

    /// No breakpoint with the given id exists in the session
    #[error("breakpoint #{0} not found")]
    BreakpointNotFound(BreakpointId),

    /// No watch expression with the given id exists in the session
    #[error("watch expression #{0} not found")]
    WatchNotFound(WatchId),

    /// A variable path did not resolve inside the scope
    #[error("invalid variable path '{0}'")]
    InvalidPath(String),

    /// Serializing an export (breakpoints or logs) failed
    #[error("export failed: {0}")]
    ExportFailed(String),

    /// Anything without a dedicated code
    #[error(transparent)]
    Other(#[from] eyre::Report),
}

/// Result alias for debugger operations.
pub type DebugResult<T> = Result<T, DebugError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = DebugError::SessionNotFound(SessionKey::new("wf-1", "exec-1"));
        assert_eq!(err.to_string(), "no active debug session for wf-1/exec-1");

        let err = DebugError::BreakpointNotFound(BreakpointId(4));
        assert_eq!(err.to_string(), "breakpoint #4 not found");

        let err = DebugError::InvalidPath("input..value".to_string());
        assert!(err.to_string().contains("input..value"));
    }
}
