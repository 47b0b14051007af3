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

//! Run-mode state machine and per-branch call stacks.
//!
//! [`StepController`] tracks how a session is currently running (free,
//! paused, or completing a step request) and, per concurrent branch, the
//! stack of sub-workflow frames the execution engine has entered. The
//! pause decision ([`StepController::should_pause_at_node`]) is a pure
//! function of the current mode and the depth the engine reports at the
//! node boundary; frame stacks are bookkeeping for the UI and for depth
//! targets captured when a step is issued.
//!
//! Step semantics, all scoped to the branch the step was issued on:
//! - *step over* at depth D pauses at the next node with depth <= D,
//!   never inside a sub-workflow (depth > D);
//! - *step into* pauses at the very next node, whatever its depth, so a
//!   depth increase lands inside the sub-workflow and anything else
//!   behaves like step over;
//! - *step out* at depth D pauses at the next node with depth < D.

use std::collections::HashMap;

use parking_lot::RwLock;
use wdb_common::types::{BranchId, ExecutionFrame, ExecutionState};

/// Internal run mode; stepping variants carry the branch and the depth
/// recorded when the step was issued.
#[derive(Debug, Clone, PartialEq, Eq)]
enum RunMode {
    Running,
    Paused,
    SteppingOver { branch: BranchId, depth: usize },
    SteppingInto { branch: BranchId },
    SteppingOut { branch: BranchId, depth: usize },
    Stopped,
}

/// Tracks the session run mode and one frame stack per branch.
#[derive(Debug)]
pub struct StepController {
    mode: RwLock<RunMode>,
    stacks: RwLock<HashMap<BranchId, Vec<ExecutionFrame>>>,
}

impl Default for StepController {
    fn default() -> Self {
        Self::new()
    }
}

impl StepController {
    /// Create a controller in the Running state with no frames.
    pub fn new() -> Self {
        Self { mode: RwLock::new(RunMode::Running), stacks: RwLock::new(HashMap::new()) }
    }

    /// The externally visible run state.
    pub fn state(&self) -> ExecutionState {
        match &*self.mode.read() {
            RunMode::Running => ExecutionState::Running,
            RunMode::Paused => ExecutionState::Paused,
            RunMode::SteppingOver { .. } => ExecutionState::SteppingOver,
            RunMode::SteppingInto { .. } => ExecutionState::SteppingInto,
            RunMode::SteppingOut { .. } => ExecutionState::SteppingOut,
            RunMode::Stopped => ExecutionState::Stopped,
        }
    }

    /// Whether the controller has been stopped (terminal).
    pub fn is_stopped(&self) -> bool {
        *self.mode.read() == RunMode::Stopped
    }

    /// Paused/Stepping* -> Running. No effect once stopped.
    pub fn resume(&self) {
        let mut mode = self.mode.write();
        if *mode != RunMode::Stopped {
            *mode = RunMode::Running;
        }
    }

    /// Request a global pause, taking effect at every branch's next node
    /// boundary. No effect once stopped.
    pub fn pause(&self) {
        let mut mode = self.mode.write();
        if *mode != RunMode::Stopped {
            *mode = RunMode::Paused;
        }
    }

    /// Run until the given branch reaches a node at or above `depth`.
    pub fn step_over(&self, branch: BranchId, depth: usize) {
        let mut mode = self.mode.write();
        if *mode != RunMode::Stopped {
            *mode = RunMode::SteppingOver { branch, depth };
        }
    }

    /// Run until the given branch reaches its next node, at any depth.
    pub fn step_into(&self, branch: BranchId) {
        let mut mode = self.mode.write();
        if *mode != RunMode::Stopped {
            *mode = RunMode::SteppingInto { branch };
        }
    }

    /// Run until the given branch leaves the frame it was paused in.
    pub fn step_out(&self, branch: BranchId, depth: usize) {
        let mut mode = self.mode.write();
        if *mode != RunMode::Stopped {
            *mode = RunMode::SteppingOut { branch, depth };
        }
    }

    /// Terminal stop; every later decision call answers "do not pause" so
    /// in-flight branches drain instead of deadlocking.
    pub fn stop(&self) {
        *self.mode.write() = RunMode::Stopped;
    }

    /// Called by the orchestrator when a step request completed and the
    /// stepping branch suspended: later boundaries run free again.
    /// Manual pauses stay in force.
    pub fn step_completed(&self) {
        let mut mode = self.mode.write();
        if matches!(
            &*mode,
            RunMode::SteppingOver { .. } | RunMode::SteppingInto { .. } | RunMode::SteppingOut { .. }
        ) {
            *mode = RunMode::Running;
        }
    }

    /// The pause decision for a node boundary on `branch` at the depth the
    /// execution engine reports. Pure: mutates nothing.
    pub fn should_pause_at_node(&self, branch: &BranchId, depth: usize) -> bool {
        match &*self.mode.read() {
            RunMode::Running | RunMode::Stopped => false,
            RunMode::Paused => true,
            RunMode::SteppingOver { branch: stepping, depth: target } => {
                branch == stepping && depth <= *target
            }
            RunMode::SteppingInto { branch: stepping } => branch == stepping,
            RunMode::SteppingOut { branch: stepping, depth: target } => {
                branch == stepping && depth < *target
            }
        }
    }

    /// Push a frame for a sub-workflow entered on `branch`.
    ///
    /// The frame records the stack length after the push, so the first
    /// entry on a branch is depth 1.
    pub fn enter_sub_workflow(
        &self,
        branch: BranchId,
        workflow_id: impl Into<String>,
        node_id: impl Into<String>,
    ) -> ExecutionFrame {
        let mut stacks = self.stacks.write();
        let stack = stacks.entry(branch).or_default();
        let frame = ExecutionFrame::new(workflow_id, node_id, stack.len() + 1);
        stack.push(frame.clone());
        frame
    }

    /// Pop the innermost frame on `branch`. Unmatched exits are ignored so
    /// the stack never goes negative.
    pub fn exit_sub_workflow(&self, branch: &BranchId) -> Option<ExecutionFrame> {
        self.stacks.write().get_mut(branch)?.pop()
    }

    /// Current stack depth on `branch` (0 when no sub-workflow is open).
    pub fn depth(&self, branch: &BranchId) -> usize {
        self.stacks.read().get(branch).map_or(0, Vec::len)
    }

    /// Snapshot of the frame stack on `branch`, outermost first.
    pub fn stack(&self, branch: &BranchId) -> Vec<ExecutionFrame> {
        self.stacks.read().get(branch).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn main_branch() -> BranchId {
        BranchId::main()
    }

    #[test]
    fn test_initial_state_is_running() {
        let ctl = StepController::new();
        assert_eq!(ctl.state(), ExecutionState::Running);
        assert!(!ctl.should_pause_at_node(&main_branch(), 0));
    }

    #[test]
    fn test_pause_is_global() {
        let ctl = StepController::new();
        ctl.pause();
        assert_eq!(ctl.state(), ExecutionState::Paused);
        assert!(ctl.should_pause_at_node(&main_branch(), 0));
        assert!(ctl.should_pause_at_node(&BranchId::new("sibling"), 3));

        ctl.resume();
        assert_eq!(ctl.state(), ExecutionState::Running);
        assert!(!ctl.should_pause_at_node(&main_branch(), 0));
    }

    #[test]
    fn test_step_over_pauses_at_same_depth_never_deeper() {
        let ctl = StepController::new();
        ctl.step_over(main_branch(), 1);

        assert_eq!(ctl.state(), ExecutionState::SteppingOver);
        // Inside a sub-workflow: keep running.
        assert!(!ctl.should_pause_at_node(&main_branch(), 2));
        assert!(!ctl.should_pause_at_node(&main_branch(), 3));
        // Back at the issuing depth, or above it: pause.
        assert!(ctl.should_pause_at_node(&main_branch(), 1));
        assert!(ctl.should_pause_at_node(&main_branch(), 0));
    }

    #[test]
    fn test_step_over_ignores_other_branches() {
        let ctl = StepController::new();
        ctl.step_over(main_branch(), 0);
        assert!(!ctl.should_pause_at_node(&BranchId::new("sibling"), 0));
        assert!(ctl.should_pause_at_node(&main_branch(), 0));
    }

    #[test]
    fn test_step_into_pauses_at_next_node_any_depth() {
        let ctl = StepController::new();
        ctl.step_into(main_branch());

        assert_eq!(ctl.state(), ExecutionState::SteppingInto);
        // Depth increase: land inside the sub-workflow.
        assert!(ctl.should_pause_at_node(&main_branch(), 1));
        // No sub-workflow opened: step-over fallback, still pauses.
        assert!(ctl.should_pause_at_node(&main_branch(), 0));
        assert!(!ctl.should_pause_at_node(&BranchId::new("sibling"), 1));
    }

    #[test]
    fn test_step_out_pauses_below_issue_depth() {
        let ctl = StepController::new();
        ctl.step_out(main_branch(), 2);

        assert_eq!(ctl.state(), ExecutionState::SteppingOut);
        assert!(!ctl.should_pause_at_node(&main_branch(), 2));
        assert!(!ctl.should_pause_at_node(&main_branch(), 3));
        assert!(ctl.should_pause_at_node(&main_branch(), 1));
    }

    #[test]
    fn test_step_out_at_root_never_pauses() {
        let ctl = StepController::new();
        ctl.step_out(main_branch(), 0);
        assert!(!ctl.should_pause_at_node(&main_branch(), 0));
        assert!(!ctl.should_pause_at_node(&main_branch(), 1));
    }

    #[test]
    fn test_step_completed_returns_to_running() {
        let ctl = StepController::new();
        ctl.step_over(main_branch(), 0);
        ctl.step_completed();
        assert_eq!(ctl.state(), ExecutionState::Running);

        // A manual pause is not cleared by step bookkeeping.
        ctl.pause();
        ctl.step_completed();
        assert_eq!(ctl.state(), ExecutionState::Paused);
    }

    #[test]
    fn test_stop_is_terminal() {
        let ctl = StepController::new();
        ctl.pause();
        ctl.stop();

        assert_eq!(ctl.state(), ExecutionState::Stopped);
        assert!(!ctl.should_pause_at_node(&main_branch(), 0));

        ctl.resume();
        ctl.pause();
        ctl.step_into(main_branch());
        assert_eq!(ctl.state(), ExecutionState::Stopped);
    }

    #[test]
    fn test_frame_stack_depth_matches_unmatched_entries() {
        let ctl = StepController::new();
        let branch = main_branch();

        assert_eq!(ctl.depth(&branch), 0);
        let first = ctl.enter_sub_workflow(branch.clone(), "sub-a", "call-a");
        assert_eq!(first.depth, 1);
        let second = ctl.enter_sub_workflow(branch.clone(), "sub-b", "call-b");
        assert_eq!(second.depth, 2);
        assert_eq!(ctl.depth(&branch), 2);

        assert_eq!(ctl.exit_sub_workflow(&branch), Some(second));
        assert_eq!(ctl.depth(&branch), 1);
        assert_eq!(ctl.exit_sub_workflow(&branch), Some(first));
        assert_eq!(ctl.depth(&branch), 0);

        // Unmatched exit: ignored, never negative.
        assert_eq!(ctl.exit_sub_workflow(&branch), None);
        assert_eq!(ctl.depth(&branch), 0);
    }

    #[test]
    fn test_frame_stacks_are_branch_local() {
        let ctl = StepController::new();
        let left = BranchId::new("left");
        let right = BranchId::new("right");

        ctl.enter_sub_workflow(left.clone(), "sub-a", "call-a");
        ctl.enter_sub_workflow(left.clone(), "sub-b", "call-b");
        ctl.enter_sub_workflow(right.clone(), "sub-c", "call-c");

        assert_eq!(ctl.depth(&left), 2);
        assert_eq!(ctl.depth(&right), 1);

        ctl.exit_sub_workflow(&right);
        assert_eq!(ctl.depth(&left), 2);
        assert_eq!(ctl.depth(&right), 0);

        let stack = ctl.stack(&left);
        assert_eq!(stack.len(), 2);
        assert_eq!(stack[0].workflow_id, "sub-a");
        assert_eq!(stack[1].workflow_id, "sub-b");
    }
}
