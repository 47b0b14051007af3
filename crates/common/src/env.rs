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

//! Environment variable name constants for WDB configuration.
//!
//! This module provides constant string names for all environment variables used by WDB.
//! These constants ensure consistency across the codebase and provide a single source of
//! truth for environment variable names.
//!
//! # Environment Variables
//!
//! - [`WDB_PORT`] - Default port for the debugger JSON-RPC server
//! - [`WDB_LOG_DIR`] - Overrides the directory used for file logging

/// Environment variable for the debugger JSON-RPC server port.
///
/// When set, the `wdb` binary uses this port unless `--port` is passed
/// explicitly on the command line.
///
/// # Value Format
///
/// Must parse as a `u16`. Invalid values cause CLI argument parsing to fail.
///
/// # Examples
///
/// ```bash
/// # Serve the debugger API on port 9230
/// WDB_PORT=9230 wdb serve
///
/// # CLI argument takes precedence
/// WDB_PORT=9230 wdb serve --port 9231
/// ```
pub const WDB_PORT: &str = "WDB_PORT";

/// Environment variable overriding the file logging directory.
///
/// By default, file logging (when enabled) writes daily-rotated logs under
/// `<tmp>/wdb-logs/<component>/`. Setting this variable redirects logs to
/// the given directory instead.
///
/// # Examples
///
/// ```bash
/// # Keep logs next to the project
/// WDB_LOG_DIR=./logs wdb replay trace.json
/// ```
pub const WDB_LOG_DIR: &str = "WDB_LOG_DIR";
