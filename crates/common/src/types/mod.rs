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

//! Shared data model for the debugger: breakpoints, execution frames,
//! variable scopes, log entries, profiling events, and memory records.
//!
//! Everything here is wire-visible: the JSON-RPC layer and the UI consume
//! these shapes directly, so all types serialize with camelCase field
//! names.

/// Breakpoint definitions and hit records
pub mod breakpoint;
/// Execution frames and branch identifiers for nested sub-workflow tracking
pub mod frame;
/// Log entries, levels, filters, and export formats
pub mod log;
/// Memory snapshots, allocations, leaks, and GC events
pub mod memory;
/// Profiling events, per-node metrics, bottlenecks, and flame graphs
pub mod profile;
/// Variable scope buckets and inspection metadata
pub mod scope;
/// Session keys, execution states, watch expressions, and debugger events
pub mod session;

pub use breakpoint::*;
pub use frame::*;
pub use log::*;
pub use memory::*;
pub use profile::*;
pub use scope::*;
pub use session::*;
