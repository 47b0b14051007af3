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

//! One debugged execution: hooks, suspension gates, and watches.
//!
//! A [`DebugSession`] owns the breakpoints, step controller, profilers,
//! and logger for a single (workflow, execution) pair. The execution
//! engine drives it through [`DebugSession::before_node_execution`] and
//! [`DebugSession::after_node_execution`]; the UI drives it through the
//! control operations (`resume`, `step_*`, `pause`, `stop`).
//!
//! Suspension is per-branch. A halting hook call gets back a
//! [`SuspendGate`], a one-shot future the calling branch awaits at the
//! node boundary. Control operations release exactly the gates they
//! target; `stop` releases everything so in-flight branches drain instead
//! of deadlocking.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tokio::sync::{broadcast, oneshot};
use tracing::debug;
use wdb_common::{
    expression::{evaluate_expression, normalize_expression},
    types::{
        BranchId, BreakpointHit, DebugEvent, DebugSessionInfo, ExecutionFrame, ExecutionState,
        NodeRunStatus, PauseReason, SessionKey, VariableMetadata, VariableScope, WatchExpression,
        WatchId,
    },
};

use crate::{
    breakpoints::BreakpointManager,
    error::{DebugError, DebugResult},
    inspect::VariableInspector,
    logger::{ExtendedLogger, LoggerConfig},
    memory::{MemoryProfiler, MemoryProfilerConfig},
    profiler::{Profiler, ProfilerConfig},
    step::StepController,
};

const LOG_SOURCE: &str = "session";

/// One-shot gate a suspended branch awaits at its node boundary.
#[derive(Debug)]
pub struct SuspendGate {
    rx: oneshot::Receiver<()>,
}

impl SuspendGate {
    /// Block until a control operation releases this branch. A gate whose
    /// session was dropped releases immediately.
    pub async fn wait(self) {
        let _ = self.rx.await;
    }
}

/// What a `before_node_execution` call should do next.
#[derive(Debug)]
pub enum HookDecision {
    /// Run the node without suspending
    Continue,
    /// Await the gate, then run the node
    Suspend(SuspendGate),
}

impl HookDecision {
    pub fn is_suspend(&self) -> bool {
        matches!(self, Self::Suspend(_))
    }

    /// Await the gate if suspended, otherwise return immediately.
    pub async fn proceed(self) {
        if let Self::Suspend(gate) = self {
            gate.wait().await;
        }
    }
}

/// A branch suspended at a node boundary.
#[derive(Debug)]
struct PausedBranch {
    node_id: String,
    depth: usize,
    gate: oneshot::Sender<()>,
}

/// Debugging state for one (workflow, execution) pair.
pub struct DebugSession {
    key: SessionKey,
    started_at: DateTime<Utc>,
    controller: StepController,
    breakpoints: BreakpointManager,
    profiler: Profiler,
    memory: Arc<MemoryProfiler>,
    logger: Arc<ExtendedLogger>,
    inspector: VariableInspector,
    watches: RwLock<Vec<WatchExpression>>,
    next_watch_id: AtomicU64,
    /// Latest scope seen per branch, refreshed on every hook call
    scopes: RwLock<HashMap<BranchId, VariableScope>>,
    paused: Mutex<HashMap<BranchId, PausedBranch>>,
    active_hit: RwLock<Option<BreakpointHit>>,
    events: broadcast::Sender<DebugEvent>,
}

impl DebugSession {
    pub fn new(
        key: SessionKey,
        logger_config: LoggerConfig,
        profiler_config: ProfilerConfig,
        memory_config: MemoryProfilerConfig,
        events: broadcast::Sender<DebugEvent>,
    ) -> Self {
        let logger = Arc::new(ExtendedLogger::new(logger_config));
        Self {
            key,
            started_at: Utc::now(),
            controller: StepController::new(),
            breakpoints: BreakpointManager::new(Arc::clone(&logger)),
            profiler: Profiler::new(profiler_config),
            memory: Arc::new(MemoryProfiler::new(memory_config)),
            logger,
            inspector: VariableInspector::new(),
            watches: RwLock::new(Vec::new()),
            next_watch_id: AtomicU64::new(1),
            scopes: RwLock::new(HashMap::new()),
            paused: Mutex::new(HashMap::new()),
            active_hit: RwLock::new(None),
            events,
        }
    }

    pub fn key(&self) -> &SessionKey {
        &self.key
    }

    pub fn breakpoints(&self) -> &BreakpointManager {
        &self.breakpoints
    }

    pub fn controller(&self) -> &StepController {
        &self.controller
    }

    pub fn profiler(&self) -> &Profiler {
        &self.profiler
    }

    pub fn memory(&self) -> &Arc<MemoryProfiler> {
        &self.memory
    }

    pub fn logger(&self) -> &Arc<ExtendedLogger> {
        &self.logger
    }

    // --- execution engine hooks ---

    /// Node-boundary hook, called before a node runs.
    ///
    /// Consults breakpoints first (any hit wins), then the step
    /// controller. A suspend decision carries the gate the calling branch
    /// must await; sibling branches are unaffected. After `stop` this is a
    /// no-op so draining executions never block.
    pub fn before_node_execution(
        &self,
        node_id: &str,
        node_name: &str,
        depth: usize,
        branch: &BranchId,
        scope: &VariableScope,
    ) -> HookDecision {
        if self.controller.is_stopped() {
            return HookDecision::Continue;
        }

        self.scopes.write().insert(branch.clone(), scope.clone());
        self.profiler.start_node(node_id, node_name, branch, depth);

        // Breakpoints match against the workflow currently executing on
        // this branch, which is the session's own workflow outside any
        // sub-workflow frame.
        let workflow_id = self
            .controller
            .stack(branch)
            .last()
            .map(|frame| frame.workflow_id.clone())
            .unwrap_or_else(|| self.key.workflow_id.clone());

        if let Some(hit) = self.breakpoints.should_break(node_id, &workflow_id, scope) {
            *self.active_hit.write() = Some(hit.clone());
            self.emit(DebugEvent::BreakpointHit {
                key: self.key.clone(),
                branch_id: branch.clone(),
                hit,
            });
            let gate =
                self.suspend_branch(branch, node_id, depth, PauseReason::Breakpoint, scope);
            return HookDecision::Suspend(gate);
        }

        if self.controller.should_pause_at_node(branch, depth) {
            let reason = if self.controller.state() == ExecutionState::Paused {
                PauseReason::Manual
            } else {
                self.controller.step_completed();
                PauseReason::Step
            };
            let gate = self.suspend_branch(branch, node_id, depth, reason, scope);
            return HookDecision::Suspend(gate);
        }

        HookDecision::Continue
    }

    /// Node-boundary hook, called after a node finished.
    ///
    /// Seals the node's open profile event and records a completion log
    /// entry. No-op after `stop` and for nodes with no open event.
    pub fn after_node_execution(
        &self,
        node_id: &str,
        status: NodeRunStatus,
        cpu_usage: Option<f64>,
        memory_usage: Option<u64>,
    ) {
        if self.controller.is_stopped() {
            return;
        }

        if let Some(event_id) = self.profiler.open_event_for_node(node_id) {
            self.profiler.end_node(event_id, status, cpu_usage, memory_usage);
        }
        self.logger.debug(LOG_SOURCE, format!("node {node_id} finished: {status}"));
    }

    /// Bracket a sub-workflow invocation on one branch.
    pub fn enter_sub_workflow(
        &self,
        branch: &BranchId,
        workflow_id: &str,
        node_id: &str,
    ) -> ExecutionFrame {
        self.controller.enter_sub_workflow(branch.clone(), workflow_id, node_id)
    }

    pub fn exit_sub_workflow(&self, branch: &BranchId) -> Option<ExecutionFrame> {
        self.controller.exit_sub_workflow(branch)
    }

    // --- control operations ---

    /// Release every suspended branch and run freely.
    pub fn resume(&self) {
        self.controller.resume();
        *self.active_hit.write() = None;
        self.release_all();
        self.emit(DebugEvent::Resumed { key: self.key.clone(), state: self.controller.state() });
    }

    /// Suspend all branches at their next node boundary.
    pub fn pause(&self) {
        self.controller.pause();
    }

    /// Run the targeted paused branch to its next node at the same depth
    /// or shallower. With no branch given, the first paused branch (by
    /// identifier) is targeted; with nothing paused this is a no-op.
    pub fn step_over(&self, branch: Option<&BranchId>) {
        let Some((branch, depth)) = self.pick_paused(branch) else {
            return;
        };
        self.controller.step_over(branch.clone(), depth);
        self.finish_step(&branch);
    }

    /// Run the targeted paused branch to the very next node, any depth.
    pub fn step_into(&self, branch: Option<&BranchId>) {
        let Some((branch, _)) = self.pick_paused(branch) else {
            return;
        };
        self.controller.step_into(branch.clone());
        self.finish_step(&branch);
    }

    /// Run the targeted paused branch until it leaves its current depth.
    /// At depth 0 there is nothing to leave, so this behaves like resume
    /// for that branch.
    pub fn step_out(&self, branch: Option<&BranchId>) {
        let Some((branch, depth)) = self.pick_paused(branch) else {
            return;
        };
        self.controller.step_out(branch.clone(), depth);
        self.finish_step(&branch);
    }

    /// End the session. Terminal: releases every gate, stops sampling,
    /// and turns all subsequent hook calls into no-ops.
    pub fn stop(&self) {
        self.controller.stop();
        *self.active_hit.write() = None;
        self.release_all();
        self.memory.stop_sampling();
        self.emit(DebugEvent::SessionStopped { key: self.key.clone() });
    }

    fn finish_step(&self, branch: &BranchId) {
        *self.active_hit.write() = None;
        self.release_branch(branch);
        self.emit(DebugEvent::Resumed { key: self.key.clone(), state: self.controller.state() });
    }

    fn suspend_branch(
        &self,
        branch: &BranchId,
        node_id: &str,
        depth: usize,
        reason: PauseReason,
        scope: &VariableScope,
    ) -> SuspendGate {
        let (tx, rx) = oneshot::channel();
        self.paused.lock().insert(
            branch.clone(),
            PausedBranch { node_id: node_id.to_string(), depth, gate: tx },
        );
        self.evaluate_watches(scope);
        debug!(branch = %branch, node_id, %reason, "branch suspended");
        self.emit(DebugEvent::Paused {
            key: self.key.clone(),
            node_id: node_id.to_string(),
            branch_id: branch.clone(),
            depth,
            reason,
        });
        SuspendGate { rx }
    }

    fn release_branch(&self, branch: &BranchId) {
        if let Some(paused) = self.paused.lock().remove(branch) {
            let _ = paused.gate.send(());
        }
    }

    fn release_all(&self) {
        for (_, paused) in self.paused.lock().drain() {
            let _ = paused.gate.send(());
        }
    }

    /// Resolve a control target to a paused branch and its depth.
    fn pick_paused(&self, branch: Option<&BranchId>) -> Option<(BranchId, usize)> {
        let paused = self.paused.lock();
        match branch {
            Some(branch) => paused.get(branch).map(|p| (branch.clone(), p.depth)),
            None => paused
                .iter()
                .min_by(|(a, _), (b, _)| a.cmp(b))
                .map(|(branch, p)| (branch.clone(), p.depth)),
        }
    }

    // --- watches ---

    /// Register a watch expression. It evaluates immediately when a scope
    /// is already available, then again on every pause.
    pub fn add_watch(&self, expression: &str) -> WatchExpression {
        let id = WatchId(self.next_watch_id.fetch_add(1, Ordering::SeqCst));
        let mut watch = WatchExpression::new(id, normalize_expression(expression));
        if let Some(scope) = self.current_scope() {
            evaluate_watch(&mut watch, &scope);
        }
        self.watches.write().push(watch.clone());
        watch
    }

    pub fn remove_watch(&self, id: WatchId) -> DebugResult<()> {
        let mut watches = self.watches.write();
        let before = watches.len();
        watches.retain(|w| w.id != id);
        if watches.len() == before {
            return Err(DebugError::WatchNotFound(id));
        }
        Ok(())
    }

    pub fn watches(&self) -> Vec<WatchExpression> {
        self.watches.read().clone()
    }

    fn evaluate_watches(&self, scope: &VariableScope) {
        for watch in self.watches.write().iter_mut() {
            evaluate_watch(watch, scope);
        }
    }

    /// Evaluate an ad-hoc expression against the current scope.
    pub fn evaluate(&self, expression: &str) -> DebugResult<Value> {
        let scope = self.current_scope().unwrap_or_default();
        evaluate_expression(expression, &scope).map_err(DebugError::Other)
    }

    // --- inspection ---

    /// Latest scope seen on a branch.
    pub fn scope(&self, branch: &BranchId) -> Option<VariableScope> {
        self.scopes.read().get(branch).cloned()
    }

    /// Scope of the first paused branch, falling back to the most recent
    /// main-branch scope.
    pub fn current_scope(&self) -> Option<VariableScope> {
        if let Some((branch, _)) = self.pick_paused(None) {
            if let Some(scope) = self.scope(&branch) {
                return Some(scope);
            }
        }
        self.scope(&BranchId::main())
    }

    pub fn inspect_variables(&self, branch: Option<&BranchId>) -> Vec<VariableMetadata> {
        match self.branch_scope(branch) {
            Some(scope) => self.inspector.inspect_scope(&scope),
            None => Vec::new(),
        }
    }

    pub fn expand_variable(
        &self,
        branch: Option<&BranchId>,
        path: &str,
    ) -> DebugResult<Vec<VariableMetadata>> {
        let scope = self.branch_scope(branch).unwrap_or_default();
        self.inspector.expand_variable(&scope, path)
    }

    pub fn get_variable(&self, branch: Option<&BranchId>, path: &str) -> DebugResult<Value> {
        let scope = self.branch_scope(branch).unwrap_or_default();
        self.inspector.get_variable_at_path(&scope, path)
    }

    /// Write a value into a branch's stored scope, for test-time value
    /// injection.
    pub fn set_variable(
        &self,
        branch: Option<&BranchId>,
        path: &str,
        value: Value,
    ) -> DebugResult<()> {
        let branch = branch.cloned().or_else(|| self.pick_paused(None).map(|(b, _)| b));
        let branch = branch.unwrap_or_else(BranchId::main);
        let mut scopes = self.scopes.write();
        let scope = scopes.entry(branch).or_default();
        self.inspector.set_variable_at_path(scope, path, value)
    }

    pub fn search_variables(
        &self,
        branch: Option<&BranchId>,
        text: &str,
        case_sensitive: bool,
    ) -> Vec<VariableMetadata> {
        let listed = self.inspect_variables(branch);
        self.inspector.search_variables(&listed, text, case_sensitive)
    }

    fn branch_scope(&self, branch: Option<&BranchId>) -> Option<VariableScope> {
        match branch {
            Some(branch) => self.scope(branch),
            None => self.current_scope(),
        }
    }

    // --- reporting ---

    /// The most recent unresumed breakpoint hit.
    pub fn active_hit(&self) -> Option<BreakpointHit> {
        self.active_hit.read().clone()
    }

    pub fn paused_branches(&self) -> Vec<BranchId> {
        let mut branches: Vec<BranchId> = self.paused.lock().keys().cloned().collect();
        branches.sort();
        branches
    }

    /// Where a paused branch is suspended, as (nodeId, depth).
    pub fn paused_position(&self, branch: &BranchId) -> Option<(String, usize)> {
        self.paused.lock().get(branch).map(|p| (p.node_id.clone(), p.depth))
    }

    /// Effective run state: `Stopped` is terminal, any suspended branch
    /// reports `Paused`, otherwise the controller mode stands.
    pub fn state(&self) -> ExecutionState {
        if self.controller.is_stopped() {
            ExecutionState::Stopped
        } else if !self.paused.lock().is_empty() {
            ExecutionState::Paused
        } else {
            self.controller.state()
        }
    }

    pub fn info(&self) -> DebugSessionInfo {
        let active_hit = self.active_hit();
        DebugSessionInfo {
            key: self.key.clone(),
            state: self.state(),
            started_at: self.started_at,
            breakpoint_count: self.breakpoints.list().len(),
            watch_count: self.watches.read().len(),
            paused_branches: self.paused_branches(),
            active_breakpoint_id: active_hit.as_ref().map(|hit| hit.breakpoint_id),
            active_hit,
        }
    }

    fn emit(&self, event: DebugEvent) {
        let _ = self.events.send(event);
    }
}

impl std::fmt::Debug for DebugSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DebugSession")
            .field("key", &self.key)
            .field("state", &self.state())
            .finish()
    }
}

fn evaluate_watch(watch: &mut WatchExpression, scope: &VariableScope) {
    match evaluate_expression(&watch.expression, scope) {
        Ok(value) => {
            watch.last_value = Some(value);
            watch.last_error = None;
        }
        Err(err) => {
            watch.last_value = None;
            watch.last_error = Some(err.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wdb_common::types::ScopeBucket;

    fn session() -> (DebugSession, broadcast::Receiver<DebugEvent>) {
        let (tx, rx) = broadcast::channel(64);
        let session = DebugSession::new(
            SessionKey::new("wf-1", "exec-1"),
            LoggerConfig::default(),
            ProfilerConfig::default(),
            MemoryProfilerConfig::default(),
            tx,
        );
        (session, rx)
    }

    fn scope_with(bucket: ScopeBucket, name: &str, value: Value) -> VariableScope {
        VariableScope::new().with(bucket, name, value)
    }

    #[test]
    fn test_no_breakpoints_means_continue() {
        let (session, _rx) = session();
        let decision = session.before_node_execution(
            "n1",
            "Set",
            0,
            &BranchId::main(),
            &VariableScope::new(),
        );
        assert!(!decision.is_suspend());
        assert_eq!(session.state(), ExecutionState::Running);
    }

    #[tokio::test]
    async fn test_conditional_breakpoint_scenario() {
        let (session, mut rx) = session();
        let bp = session.breakpoints().add_conditional("n1", "wf-1", "output.statusCode >= 400");
        let scope = scope_with(ScopeBucket::Output, "statusCode", json!(500));

        let decision =
            session.before_node_execution("n1", "HTTP Request", 0, &BranchId::main(), &scope);
        assert!(decision.is_suspend());
        assert_eq!(session.state(), ExecutionState::Paused);
        assert_eq!(session.active_hit().unwrap().breakpoint_id, bp.id);

        // Events: breakpointHit then paused.
        let event = rx.try_recv().unwrap();
        assert!(matches!(event, DebugEvent::BreakpointHit { .. }));
        let event = rx.try_recv().unwrap();
        assert!(matches!(event, DebugEvent::Paused { reason: PauseReason::Breakpoint, .. }));

        session.resume();
        assert_eq!(session.state(), ExecutionState::Running);
        assert!(session.active_hit().is_none());

        // The gate released, so the branch proceeds.
        decision.proceed().await;
    }

    #[test]
    fn test_non_matching_condition_does_not_suspend() {
        let (session, _rx) = session();
        session.breakpoints().add_conditional("n1", "wf-1", "output.statusCode >= 400");
        let scope = scope_with(ScopeBucket::Output, "statusCode", json!(200));

        let decision =
            session.before_node_execution("n1", "HTTP Request", 0, &BranchId::main(), &scope);
        assert!(!decision.is_suspend());
    }

    #[tokio::test]
    async fn test_breakpoint_suspends_only_hitting_branch() {
        let (session, _rx) = session();
        session.breakpoints().add_standard("n1", "wf-1");
        let left = BranchId::new("branch-0");
        let right = BranchId::new("branch-1");

        let hit = session.before_node_execution("n1", "Set", 0, &left, &VariableScope::new());
        let miss = session.before_node_execution("n2", "Set", 0, &right, &VariableScope::new());

        assert!(hit.is_suspend());
        assert!(!miss.is_suspend());
        assert_eq!(session.paused_branches(), vec![left.clone()]);
        assert_eq!(session.paused_position(&left), Some(("n1".to_string(), 0)));
    }

    #[tokio::test]
    async fn test_global_pause_suspends_every_branch() {
        let (session, _rx) = session();
        session.pause();
        let left = BranchId::new("branch-0");
        let right = BranchId::new("branch-1");

        let a = session.before_node_execution("n1", "Set", 0, &left, &VariableScope::new());
        let b = session.before_node_execution("n2", "Set", 0, &right, &VariableScope::new());
        assert!(a.is_suspend());
        assert!(b.is_suspend());
        assert_eq!(session.paused_branches().len(), 2);

        session.resume();
        a.proceed().await;
        b.proceed().await;
        assert!(session.paused_branches().is_empty());
    }

    #[tokio::test]
    async fn test_step_over_skips_deeper_nodes() {
        let (session, _rx) = session();
        let branch = BranchId::main();
        session.pause();

        let paused =
            session.before_node_execution("n1", "Execute Workflow", 0, &branch, &VariableScope::new());
        assert!(paused.is_suspend());

        session.step_over(Some(&branch));
        paused.proceed().await;

        // Deeper node on the same branch runs through.
        session.enter_sub_workflow(&branch, "sub-wf", "n1");
        let deeper =
            session.before_node_execution("s1", "Set", 1, &branch, &VariableScope::new());
        assert!(!deeper.is_suspend());
        session.exit_sub_workflow(&branch);

        // Next same-depth node pauses with a step reason.
        let next = session.before_node_execution("n2", "Set", 0, &branch, &VariableScope::new());
        assert!(next.is_suspend());
        assert_eq!(session.state(), ExecutionState::Paused);
    }

    #[tokio::test]
    async fn test_step_into_pauses_at_next_node() {
        let (session, _rx) = session();
        let branch = BranchId::main();
        session.pause();

        let paused = session.before_node_execution(
            "n1",
            "Execute Workflow",
            0,
            &branch,
            &VariableScope::new(),
        );
        session.step_into(Some(&branch));
        paused.proceed().await;

        session.enter_sub_workflow(&branch, "sub-wf", "n1");
        let inner = session.before_node_execution("s1", "Set", 1, &branch, &VariableScope::new());
        assert!(inner.is_suspend());
        assert_eq!(session.paused_position(&branch), Some(("s1".to_string(), 1)));
    }

    #[tokio::test]
    async fn test_stop_releases_all_gates_and_detaches_hooks() {
        let (session, mut rx) = session();
        session.breakpoints().add_standard("n1", "wf-1");

        let decision =
            session.before_node_execution("n1", "Set", 0, &BranchId::main(), &VariableScope::new());
        assert!(decision.is_suspend());

        session.stop();
        decision.proceed().await;
        assert_eq!(session.state(), ExecutionState::Stopped);

        // Hooks become no-ops.
        let decision =
            session.before_node_execution("n1", "Set", 0, &BranchId::main(), &VariableScope::new());
        assert!(!decision.is_suspend());

        let mut saw_stopped = false;
        while let Ok(event) = rx.try_recv() {
            saw_stopped |= matches!(event, DebugEvent::SessionStopped { .. });
        }
        assert!(saw_stopped);
    }

    #[test]
    fn test_after_node_execution_seals_profile_event() {
        let (session, _rx) = session();
        let branch = BranchId::main();

        session.before_node_execution("n1", "Set", 0, &branch, &VariableScope::new());
        session.after_node_execution("n1", NodeRunStatus::Success, None, Some(2048));

        let events = session.profiler().events();
        assert_eq!(events.len(), 1);
        assert!(events[0].is_complete());
        assert_eq!(events[0].memory_usage, Some(2048));
    }

    #[test]
    fn test_watches_evaluate_on_registration_and_pause() {
        let (session, _rx) = session();
        let branch = BranchId::main();
        let scope = scope_with(ScopeBucket::Input, "value", json!(11));
        session.before_node_execution("n1", "Set", 0, &branch, &scope);

        let watch = session.add_watch("input.value > 10");
        assert_eq!(watch.last_value, Some(json!(true)));

        // A failing watch carries an error marker without disturbing others.
        let bad = session.add_watch("input.missing > 1");
        assert!(bad.last_error.is_some());
        assert!(bad.last_value.is_none());

        session.pause();
        let next_scope = scope_with(ScopeBucket::Input, "value", json!(3));
        session.before_node_execution("n2", "Set", 0, &branch, &next_scope);

        let watches = session.watches();
        assert_eq!(watches[0].last_value, Some(json!(false)));
    }

    #[test]
    fn test_remove_watch() {
        let (session, _rx) = session();
        let watch = session.add_watch("1 + 1");
        assert!(session.remove_watch(watch.id).is_ok());
        assert!(matches!(
            session.remove_watch(watch.id),
            Err(DebugError::WatchNotFound(_))
        ));
    }

    #[test]
    fn test_variable_inspection_uses_paused_scope() {
        let (session, _rx) = session();
        let branch = BranchId::main();
        session.pause();
        let scope = scope_with(ScopeBucket::Input, "value", json!(11));
        session.before_node_execution("n1", "Set", 0, &branch, &scope);

        let variables = session.inspect_variables(None);
        assert!(variables.iter().any(|m| m.path == "input.value"));
        assert_eq!(session.get_variable(None, "input.value").unwrap(), json!(11));

        session.set_variable(None, "input.value", json!(42)).unwrap();
        assert_eq!(session.get_variable(None, "input.value").unwrap(), json!(42));
    }

    #[test]
    fn test_session_info() {
        let (session, _rx) = session();
        session.breakpoints().add_standard("n1", "wf-1");
        session.add_watch("1 + 1");

        let info = session.info();
        assert_eq!(info.key, SessionKey::new("wf-1", "exec-1"));
        assert_eq!(info.state, ExecutionState::Running);
        assert_eq!(info.breakpoint_count, 1);
        assert_eq!(info.watch_count, 1);
        assert!(info.paused_branches.is_empty());
        assert!(info.active_hit.is_none());
    }
}
