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

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{BranchId, BreakpointHit, BreakpointId};

/// Identifies one debugged execution: a workflow plus the run being debugged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionKey {
    /// Workflow being executed
    pub workflow_id: String,
    /// The specific run of that workflow
    pub execution_id: String,
}

impl SessionKey {
    /// Create a key from its two components.
    pub fn new(workflow_id: impl Into<String>, execution_id: impl Into<String>) -> Self {
        Self { workflow_id: workflow_id.into(), execution_id: execution_id.into() }
    }
}

impl Display for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.workflow_id, self.execution_id)
    }
}

/// Run state of a debug session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum ExecutionState {
    /// Executing freely
    #[default]
    Running,
    /// At least one branch is suspended
    Paused,
    /// Running until the stepping branch reaches its origin depth
    SteppingOver,
    /// Running until the stepping branch reaches any next node
    SteppingInto,
    /// Running until the stepping branch leaves its origin depth
    SteppingOut,
    /// Session ended, all suspensions released
    Stopped,
}

impl ExecutionState {
    /// Lowercase name, matching the serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Paused => "paused",
            Self::SteppingOver => "steppingOver",
            Self::SteppingInto => "steppingInto",
            Self::SteppingOut => "steppingOut",
            Self::Stopped => "stopped",
        }
    }

    /// Whether the session has ended and accepts no further control.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped)
    }
}

impl Display for ExecutionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifier of a watch expression, unique within a session.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct WatchId(pub u64);

impl Display for WatchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An expression re-evaluated against the paused branch's scope.
///
/// `last_value` and `last_error` are mutually exclusive; both stay `None`
/// until the first evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchExpression {
    /// Watch identifier
    pub id: WatchId,
    /// Expression text, normalized
    pub expression: String,
    /// Result of the latest successful evaluation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_value: Option<Value>,
    /// Error message from the latest failed evaluation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl WatchExpression {
    /// Create a watch that has not been evaluated yet.
    pub fn new(id: WatchId, expression: impl Into<String>) -> Self {
        Self { id, expression: expression.into(), last_value: None, last_error: None }
    }
}

/// What caused a branch to suspend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PauseReason {
    /// A breakpoint halted the branch
    Breakpoint,
    /// A step request completed
    Step,
    /// An explicit pause request
    Manual,
}

impl PauseReason {
    /// Lowercase name, matching the serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Breakpoint => "breakpoint",
            Self::Step => "step",
            Self::Manual => "manual",
        }
    }
}

impl Display for PauseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outbound state-change notification, streamed to connected clients.
///
/// Serialize-only: clients consume these as JSON and never send them back.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum DebugEvent {
    /// A session was registered
    #[serde(rename_all = "camelCase")]
    SessionStarted {
        /// Session identity
        key: SessionKey,
    },
    /// A session ended and its suspensions were released
    #[serde(rename_all = "camelCase")]
    SessionStopped {
        /// Session identity
        key: SessionKey,
    },
    /// A breakpoint halted a branch
    #[serde(rename_all = "camelCase")]
    BreakpointHit {
        /// Session identity
        key: SessionKey,
        /// Branch that halted
        branch_id: BranchId,
        /// Which breakpoint, where, and the hit tally
        hit: BreakpointHit,
    },
    /// A branch suspended
    #[serde(rename_all = "camelCase")]
    Paused {
        /// Session identity
        key: SessionKey,
        /// Node the branch is suspended before
        node_id: String,
        /// Suspended branch
        branch_id: BranchId,
        /// Sub-workflow depth of the suspension
        depth: usize,
        /// What caused the suspension
        reason: PauseReason,
    },
    /// Execution continued after a control request
    #[serde(rename_all = "camelCase")]
    Resumed {
        /// Session identity
        key: SessionKey,
        /// State the session moved to
        state: ExecutionState,
    },
}

/// Session summary as reported by `listSessions` and `getState`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugSessionInfo {
    /// Session identity
    pub key: SessionKey,
    /// Current run state
    pub state: ExecutionState,
    /// When the session was registered
    pub started_at: DateTime<Utc>,
    /// Registered breakpoints
    pub breakpoint_count: usize,
    /// Registered watch expressions
    pub watch_count: usize,
    /// Branches currently suspended
    pub paused_branches: Vec<BranchId>,
    /// The breakpoint hit the session is paused on, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_hit: Option<BreakpointHit>,
    /// Breakpoint of the active hit, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_breakpoint_id: Option<BreakpointId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_key_display() {
        let key = SessionKey::new("wf-1", "exec-9");
        assert_eq!(key.to_string(), "wf-1/exec-9");
    }

    #[test]
    fn test_state_serialization() {
        assert_eq!(
            serde_json::to_value(ExecutionState::SteppingOver).unwrap(),
            serde_json::json!("steppingOver")
        );
        assert_eq!(serde_json::to_value(ExecutionState::Paused).unwrap(), serde_json::json!("paused"));
    }

    #[test]
    fn test_terminal_state() {
        assert!(ExecutionState::Stopped.is_terminal());
        assert!(!ExecutionState::Paused.is_terminal());
        assert!(!ExecutionState::Running.is_terminal());
    }

    #[test]
    fn test_event_tagging() {
        let event = DebugEvent::Paused {
            key: SessionKey::new("wf", "exec"),
            node_id: "n3".to_string(),
            branch_id: BranchId::main(),
            depth: 1,
            reason: PauseReason::Breakpoint,
        };
        let v = serde_json::to_value(&event).unwrap();
        assert_eq!(v["event"], serde_json::json!("paused"));
        assert_eq!(v["key"]["workflowId"], serde_json::json!("wf"));
        assert_eq!(v["nodeId"], serde_json::json!("n3"));
        assert_eq!(v["reason"], serde_json::json!("breakpoint"));
    }

    #[test]
    fn test_watch_starts_unevaluated() {
        let watch = WatchExpression::new(WatchId(1), "input.value");
        assert!(watch.last_value.is_none());
        assert!(watch.last_error.is_none());
        let v = serde_json::to_value(&watch).unwrap();
        assert!(v.get("lastValue").is_none());
    }
}
