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

//! WDB Common - Shared functionality for WDB components
//!
//! This crate provides the types and utilities shared by the wdb binary
//! and the engine crate, including the variable scope model, breakpoint
//! and profiling types, expression evaluation, and logging setup.

/// Common types used throughout the WDB ecosystem including breakpoints, execution frames, log entries, and profiling events
pub mod types;

/// Environment variable name constants for WDB configuration
pub mod env;
/// Expression normalization and scope-based evaluation for conditions, watches, and log point templates
pub mod expression;
/// Logging setup and utilities for consistent logging across WDB components
pub mod logging;

pub use expression::*;
pub use types::*;
