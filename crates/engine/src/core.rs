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

//! The debugger orchestrator: a registry of live sessions.
//!
//! [`Debugger`] owns every [`DebugSession`] keyed by (workflow,
//! execution) and enforces at most one active session per key. Sessions
//! are explicit instances, never process-wide state; dropping the
//! debugger drops all of them. Lifecycle events from every session fan
//! out on one shared broadcast channel.

use std::sync::Arc;

use dashmap::{mapref::entry::Entry, DashMap};
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::info;
use wdb_common::types::{
    BranchId, DebugEvent, DebugSessionInfo, NodeRunStatus, SessionKey, VariableScope,
};

use crate::{
    error::{DebugError, DebugResult},
    logger::LoggerConfig,
    memory::MemoryProfilerConfig,
    profiler::ProfilerConfig,
    session::{DebugSession, HookDecision},
};

/// Capacity of the shared lifecycle event channel.
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Top-level configuration, constructed once and handed to every session.
#[derive(Debug, Clone, PartialEq)]
pub struct DebuggerConfig {
    /// Ring buffer capacity of each session's logger
    pub max_log_entries: usize,
    /// Milliseconds between memory snapshots
    pub snapshot_interval_ms: u64,
    /// Memory snapshots retained per session
    pub max_snapshots: usize,
    /// Start the snapshot timer when a session starts
    pub auto_memory_sampling: bool,
    /// Bottleneck thresholds
    pub profiler: ProfilerConfig,
}

impl Default for DebuggerConfig {
    fn default() -> Self {
        Self {
            max_log_entries: 1000,
            snapshot_interval_ms: 5000,
            max_snapshots: 1000,
            auto_memory_sampling: false,
            profiler: ProfilerConfig::default(),
        }
    }
}

impl DebuggerConfig {
    pub fn with_max_log_entries(mut self, max: usize) -> Self {
        self.max_log_entries = max;
        self
    }

    pub fn with_snapshot_interval_ms(mut self, ms: u64) -> Self {
        self.snapshot_interval_ms = ms;
        self
    }

    pub fn with_max_snapshots(mut self, max: usize) -> Self {
        self.max_snapshots = max;
        self
    }

    pub fn with_auto_memory_sampling(mut self, enabled: bool) -> Self {
        self.auto_memory_sampling = enabled;
        self
    }

    pub fn with_profiler(mut self, profiler: ProfilerConfig) -> Self {
        self.profiler = profiler;
        self
    }

    fn logger_config(&self) -> LoggerConfig {
        LoggerConfig::default().with_max_entries(self.max_log_entries)
    }

    fn memory_config(&self) -> MemoryProfilerConfig {
        MemoryProfilerConfig::default()
            .with_snapshot_interval_ms(self.snapshot_interval_ms)
            .with_max_snapshots(self.max_snapshots)
    }
}

/// Session registry and hook fan-in for the execution engine.
#[derive(Debug)]
pub struct Debugger {
    config: DebuggerConfig,
    sessions: DashMap<SessionKey, Arc<DebugSession>>,
    events: broadcast::Sender<DebugEvent>,
}

impl Default for Debugger {
    fn default() -> Self {
        Self::new(DebuggerConfig::default())
    }
}

impl Debugger {
    pub fn new(config: DebuggerConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { config, sessions: DashMap::new(), events }
    }

    pub fn config(&self) -> &DebuggerConfig {
        &self.config
    }

    /// Register a session for an execution. Fails when one is already
    /// active under the same key.
    pub fn start_session(&self, key: SessionKey) -> DebugResult<Arc<DebugSession>> {
        let session = match self.sessions.entry(key.clone()) {
            Entry::Occupied(_) => return Err(DebugError::SessionAlreadyActive(key)),
            Entry::Vacant(slot) => {
                let session = Arc::new(DebugSession::new(
                    key.clone(),
                    self.config.logger_config(),
                    self.config.profiler.clone(),
                    self.config.memory_config(),
                    self.events.clone(),
                ));
                slot.insert(Arc::clone(&session));
                session
            }
        };

        if self.config.auto_memory_sampling {
            session.memory().start_sampling();
        }
        info!(key = %key, "debug session started");
        let _ = self.events.send(DebugEvent::SessionStarted { key });
        Ok(session)
    }

    /// End a session and remove it from the registry. Suspended branches
    /// are released so the execution can drain.
    pub fn stop_session(&self, key: &SessionKey) -> DebugResult<()> {
        let Some((_, session)) = self.sessions.remove(key) else {
            return Err(DebugError::SessionNotFound(key.clone()));
        };
        session.stop();
        info!(key = %key, "debug session stopped");
        Ok(())
    }

    pub fn session(&self, key: &SessionKey) -> DebugResult<Arc<DebugSession>> {
        self.sessions
            .get(key)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| DebugError::SessionNotFound(key.clone()))
    }

    pub fn list_sessions(&self) -> Vec<DebugSessionInfo> {
        let mut sessions: Vec<DebugSessionInfo> =
            self.sessions.iter().map(|entry| entry.value().info()).collect();
        sessions.sort_by(|a, b| a.started_at.cmp(&b.started_at));
        sessions
    }

    /// Subscribe to lifecycle events from all sessions.
    pub fn subscribe_events(&self) -> broadcast::Receiver<DebugEvent> {
        self.events.subscribe()
    }

    // --- hook fan-in ---
    //
    // The execution engine addresses hooks by session key. Hooks for a
    // key with no registered session (stopped, or never started) are
    // no-ops so draining executions never block or fail.

    pub fn before_node_execution(
        &self,
        key: &SessionKey,
        node_id: &str,
        node_name: &str,
        depth: usize,
        branch: &BranchId,
        scope: &VariableScope,
    ) -> HookDecision {
        match self.sessions.get(key) {
            Some(session) => {
                session.before_node_execution(node_id, node_name, depth, branch, scope)
            }
            None => HookDecision::Continue,
        }
    }

    pub fn after_node_execution(
        &self,
        key: &SessionKey,
        node_id: &str,
        status: NodeRunStatus,
        cpu_usage: Option<f64>,
        memory_usage: Option<u64>,
    ) {
        if let Some(session) = self.sessions.get(key) {
            session.after_node_execution(node_id, status, cpu_usage, memory_usage);
        }
    }

    pub fn enter_sub_workflow(
        &self,
        key: &SessionKey,
        branch: &BranchId,
        workflow_id: &str,
        node_id: &str,
    ) {
        if let Some(session) = self.sessions.get(key) {
            session.enter_sub_workflow(branch, workflow_id, node_id);
        }
    }

    pub fn exit_sub_workflow(&self, key: &SessionKey, branch: &BranchId) {
        if let Some(session) = self.sessions.get(key) {
            session.exit_sub_workflow(branch);
        }
    }
}

/// Parse an engine-supplied JSON object into a scope, tolerating missing
/// buckets.
pub fn scope_from_json(value: Value) -> VariableScope {
    serde_json::from_value(value).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> SessionKey {
        SessionKey::new("wf-1", "exec-1")
    }

    #[test]
    fn test_one_session_per_key() {
        let debugger = Debugger::default();
        debugger.start_session(key()).unwrap();

        assert!(matches!(
            debugger.start_session(key()),
            Err(DebugError::SessionAlreadyActive(_))
        ));

        // A different execution of the same workflow is a different key.
        debugger.start_session(SessionKey::new("wf-1", "exec-2")).unwrap();
        assert_eq!(debugger.list_sessions().len(), 2);
    }

    #[test]
    fn test_stop_removes_session() {
        let debugger = Debugger::default();
        debugger.start_session(key()).unwrap();
        debugger.stop_session(&key()).unwrap();

        assert!(matches!(debugger.session(&key()), Err(DebugError::SessionNotFound(_))));
        assert!(matches!(debugger.stop_session(&key()), Err(DebugError::SessionNotFound(_))));

        // The key is free for a fresh session.
        debugger.start_session(key()).unwrap();
    }

    #[test]
    fn test_hooks_for_unknown_session_are_noops() {
        let debugger = Debugger::default();
        let decision = debugger.before_node_execution(
            &key(),
            "n1",
            "Set",
            0,
            &BranchId::main(),
            &VariableScope::new(),
        );
        assert!(!decision.is_suspend());

        // No panic, no effect.
        debugger.after_node_execution(&key(), "n1", NodeRunStatus::Success, None, None);
        debugger.exit_sub_workflow(&key(), &BranchId::main());
    }

    #[test]
    fn test_lifecycle_events_fan_out() {
        let debugger = Debugger::default();
        let mut rx = debugger.subscribe_events();

        debugger.start_session(key()).unwrap();
        debugger.stop_session(&key()).unwrap();

        assert!(matches!(rx.try_recv().unwrap(), DebugEvent::SessionStarted { .. }));
        assert!(matches!(rx.try_recv().unwrap(), DebugEvent::SessionStopped { .. }));
    }

    #[test]
    fn test_config_flows_into_sessions() {
        let debugger = Debugger::new(DebuggerConfig::default().with_max_log_entries(5));
        let session = debugger.start_session(key()).unwrap();

        for i in 0..10 {
            session.logger().info("test", format!("entry {i}"));
        }
        assert_eq!(session.logger().len(), 5);
    }
}
