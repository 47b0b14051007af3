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

use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Identifier of an independently executing path within one execution.
///
/// The execution engine names its branches; the debugger only requires
/// that concurrent branches carry distinct identifiers. Frame stacks and
/// suspension are tracked per branch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BranchId(String);

impl BranchId {
    /// Creates a branch identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The conventional name of the root branch.
    pub fn main() -> Self {
        Self::new("main")
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for BranchId {
    fn default() -> Self {
        Self::main()
    }
}

impl From<&str> for BranchId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for BranchId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Display for BranchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One level of nesting on a branch's call stack.
///
/// A frame is pushed when a sub-workflow is entered through `node_id` and
/// popped when that sub-workflow exits. `depth` is the stack length after
/// the push, so the first sub-workflow entered on a branch records depth 1
/// (root executions run at depth 0 with an empty stack).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionFrame {
    /// The sub-workflow that was entered
    pub workflow_id: String,
    /// The node that opened the sub-workflow
    pub node_id: String,
    /// Stack length at push time
    pub depth: usize,
}

impl ExecutionFrame {
    /// Creates a frame record.
    pub fn new(workflow_id: impl Into<String>, node_id: impl Into<String>, depth: usize) -> Self {
        Self { workflow_id: workflow_id.into(), node_id: node_id.into(), depth }
    }
}

impl Display for ExecutionFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}@{}", self.depth, self.workflow_id, self.node_id)
    }
}
