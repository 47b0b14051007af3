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

//! Breakpoint storage and the per-node halt decision.
//!
//! [`BreakpointManager`] owns a session's breakpoints and answers one
//! question on every node boundary: should this execution halt here?
//! Conditional breakpoints evaluate against the node's [`VariableScope`];
//! an expression that fails to evaluate is a non-match and produces a
//! warning log entry, never an error. Log points fire through the session's
//! [`ExtendedLogger`] and never halt.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use parking_lot::RwLock;
use wdb_common::{
    evaluate_condition, render_template,
    types::{Breakpoint, BreakpointHit, BreakpointId, BreakpointKind, VariableScope},
};

use crate::{
    error::{DebugError, DebugResult},
    logger::ExtendedLogger,
};

/// Log source used for breakpoint-related entries.
const LOG_SOURCE: &str = "breakpoints";

/// Owns a session's breakpoints and evaluates halt decisions.
#[derive(Debug)]
pub struct BreakpointManager {
    /// Breakpoints in insertion order
    breakpoints: RwLock<Vec<Breakpoint>>,
    /// Next breakpoint id (ids start at 1)
    next_id: AtomicU64,
    /// Session log; receives condition warnings and log point output
    logger: Arc<ExtendedLogger>,
}

impl BreakpointManager {
    /// Create a manager emitting into the given session log.
    pub fn new(logger: Arc<ExtendedLogger>) -> Self {
        Self { breakpoints: RwLock::new(Vec::new()), next_id: AtomicU64::new(0), logger }
    }

    fn allocate_id(&self) -> BreakpointId {
        BreakpointId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Add a standard (unconditional) breakpoint.
    pub fn add_standard(
        &self,
        node_id: impl Into<String>,
        workflow_id: impl Into<String>,
    ) -> Breakpoint {
        self.insert(Breakpoint::standard(self.allocate_id(), node_id, workflow_id))
    }

    /// Add a conditional breakpoint; the condition is normalized, not validated.
    ///
    /// Validation happens at evaluation time so that a condition referring to
    /// variables that only exist at runtime is accepted here.
    pub fn add_conditional(
        &self,
        node_id: impl Into<String>,
        workflow_id: impl Into<String>,
        condition: &str,
    ) -> Breakpoint {
        self.insert(Breakpoint::conditional(self.allocate_id(), node_id, workflow_id, condition))
    }

    /// Add a hit-count breakpoint halting on the `target`th visit.
    pub fn add_hit_count(
        &self,
        node_id: impl Into<String>,
        workflow_id: impl Into<String>,
        target: u32,
    ) -> Breakpoint {
        self.insert(Breakpoint::hit_count(self.allocate_id(), node_id, workflow_id, target))
    }

    /// Add a log point with the given `{expr}` message template.
    pub fn add_log_point(
        &self,
        node_id: impl Into<String>,
        workflow_id: impl Into<String>,
        message: impl Into<String>,
    ) -> Breakpoint {
        self.insert(Breakpoint::log_point(self.allocate_id(), node_id, workflow_id, message))
    }

    fn insert(&self, bp: Breakpoint) -> Breakpoint {
        self.breakpoints.write().push(bp.clone());
        bp
    }

    /// Remove a breakpoint. Returns whether it existed.
    pub fn remove(&self, id: BreakpointId) -> bool {
        let mut breakpoints = self.breakpoints.write();
        let before = breakpoints.len();
        breakpoints.retain(|bp| bp.id != id);
        breakpoints.len() < before
    }

    /// Flip a breakpoint's enabled flag and return the new state.
    pub fn toggle(&self, id: BreakpointId) -> DebugResult<bool> {
        let mut breakpoints = self.breakpoints.write();
        let bp = breakpoints
            .iter_mut()
            .find(|bp| bp.id == id)
            .ok_or(DebugError::BreakpointNotFound(id))?;
        bp.enabled = !bp.enabled;
        Ok(bp.enabled)
    }

    /// All breakpoints, in insertion order.
    pub fn list(&self) -> Vec<Breakpoint> {
        self.breakpoints.read().clone()
    }

    /// Look up a breakpoint by id.
    pub fn get(&self, id: BreakpointId) -> Option<Breakpoint> {
        self.breakpoints.read().iter().find(|bp| bp.id == id).cloned()
    }

    /// Remove all breakpoints.
    pub fn clear_all(&self) {
        self.breakpoints.write().clear();
    }

    /// Zero every breakpoint's visit counter so hit-count breakpoints re-arm.
    pub fn reset_hit_counts(&self) {
        for bp in self.breakpoints.write().iter_mut() {
            bp.current_hits = 0;
        }
    }

    /// Snapshot the full breakpoint set for export.
    pub fn export(&self) -> Vec<Breakpoint> {
        self.list()
    }

    /// Replace the breakpoint set with an imported one.
    ///
    /// Imported ids are kept as-is; the id allocator is advanced past the
    /// highest imported id so later additions cannot collide.
    pub fn import(&self, imported: Vec<Breakpoint>) {
        let max_id = imported.iter().map(|bp| bp.id.0).max().unwrap_or(0);
        self.next_id.fetch_max(max_id, Ordering::SeqCst);
        *self.breakpoints.write() = imported;
    }

    /// Decide whether execution should halt before the given node.
    ///
    /// Every enabled breakpoint attached to the node counts the visit; the
    /// first halting match wins. Log points fire as a side effect and never
    /// halt. A condition that fails to evaluate is a non-match, reported in
    /// the session log at warn level.
    pub fn should_break(
        &self,
        node_id: &str,
        workflow_id: &str,
        scope: &VariableScope,
    ) -> Option<BreakpointHit> {
        let mut hit = None;
        let mut breakpoints = self.breakpoints.write();

        for bp in breakpoints.iter_mut() {
            if !bp.enabled || !bp.matches_node(node_id, workflow_id) {
                continue;
            }
            bp.current_hits += 1;

            let halts = match bp.kind {
                BreakpointKind::Standard => true,
                BreakpointKind::Conditional => {
                    let condition = bp.condition.as_deref().unwrap_or("false");
                    match evaluate_condition(condition, scope) {
                        Ok(matched) => matched,
                        Err(e) => {
                            self.logger.warn(
                                LOG_SOURCE,
                                format!("breakpoint #{} condition error: {e}", bp.id),
                            );
                            false
                        }
                    }
                }
                BreakpointKind::HitCount => bp.hit_count == Some(bp.current_hits),
                BreakpointKind::LogPoint => {
                    let template = bp.log_message.as_deref().unwrap_or_default();
                    self.logger.info(node_id, render_template(template, scope));
                    false
                }
            };

            if halts && hit.is_none() {
                hit = Some(BreakpointHit {
                    breakpoint_id: bp.id,
                    node_id: node_id.to_string(),
                    workflow_id: workflow_id.to_string(),
                    kind: bp.kind,
                    hits: bp.current_hits,
                });
            }
        }

        hit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wdb_common::types::{LogFilter, LogLevel, ScopeBucket};

    fn manager() -> (BreakpointManager, Arc<ExtendedLogger>) {
        let logger = Arc::new(ExtendedLogger::default());
        (BreakpointManager::new(logger.clone()), logger)
    }

    fn scope_with(bucket: ScopeBucket, key: &str, value: serde_json::Value) -> VariableScope {
        VariableScope::new().with(bucket, key, value)
    }

    #[test]
    fn test_standard_breakpoint_halts_while_enabled() {
        let (mgr, _) = manager();
        let bp = mgr.add_standard("n1", "wf");
        let scope = VariableScope::new();

        let hit = mgr.should_break("n1", "wf", &scope).unwrap();
        assert_eq!(hit.breakpoint_id, bp.id);
        assert_eq!(hit.hits, 1);

        mgr.toggle(bp.id).unwrap();
        assert!(mgr.should_break("n1", "wf", &scope).is_none());
    }

    #[test]
    fn test_breakpoint_only_matches_its_node() {
        let (mgr, _) = manager();
        mgr.add_standard("n1", "wf");
        let scope = VariableScope::new();

        assert!(mgr.should_break("n2", "wf", &scope).is_none());
        assert!(mgr.should_break("n1", "other-wf", &scope).is_none());
    }

    #[test]
    fn test_conditional_breakpoint_matches() {
        let (mgr, _) = manager();
        mgr.add_conditional("n1", "wf", "input.value > 10");

        let hit_scope = scope_with(ScopeBucket::Input, "value", json!(11));
        assert!(mgr.should_break("n1", "wf", &hit_scope).is_some());

        let miss_scope = scope_with(ScopeBucket::Input, "value", json!(10));
        assert!(mgr.should_break("n1", "wf", &miss_scope).is_none());
    }

    #[test]
    fn test_failing_condition_is_non_match_and_warns() {
        let (mgr, logger) = manager();
        mgr.add_conditional("n1", "wf", "input.value > 10");

        // String compared to a number is a type error, not a halt.
        let scope = scope_with(ScopeBucket::Input, "value", json!("x"));
        assert!(mgr.should_break("n1", "wf", &scope).is_none());

        let warnings = logger.get_logs(&LogFilter::all().with_levels([LogLevel::Warn]));
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].source, "breakpoints");
        assert!(warnings[0].message.contains("condition error"));
    }

    #[test]
    fn test_hit_count_halts_exactly_on_target() {
        let (mgr, _) = manager();
        let bp = mgr.add_hit_count("n1", "wf", 3);
        let scope = VariableScope::new();

        assert!(mgr.should_break("n1", "wf", &scope).is_none());
        assert!(mgr.should_break("n1", "wf", &scope).is_none());
        let hit = mgr.should_break("n1", "wf", &scope).unwrap();
        assert_eq!(hit.hits, 3);
        // The fourth visit does not re-halt.
        assert!(mgr.should_break("n1", "wf", &scope).is_none());
        assert_eq!(mgr.get(bp.id).unwrap().current_hits, 4);
    }

    #[test]
    fn test_reset_hit_counts_rearms() {
        let (mgr, _) = manager();
        mgr.add_hit_count("n1", "wf", 2);
        let scope = VariableScope::new();

        assert!(mgr.should_break("n1", "wf", &scope).is_none());
        assert!(mgr.should_break("n1", "wf", &scope).is_some());
        assert!(mgr.should_break("n1", "wf", &scope).is_none());

        mgr.reset_hit_counts();
        assert!(mgr.should_break("n1", "wf", &scope).is_none());
        assert!(mgr.should_break("n1", "wf", &scope).is_some());
    }

    #[test]
    fn test_log_point_emits_and_never_halts() {
        let (mgr, logger) = manager();
        mgr.add_log_point("n1", "wf", "status={output.statusCode}");

        let scope = scope_with(ScopeBucket::Output, "statusCode", json!(500));
        assert!(mgr.should_break("n1", "wf", &scope).is_none());

        let logs = logger.get_logs(&LogFilter::all());
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].source, "n1");
        assert_eq!(logs[0].message, "status=500");
    }

    #[test]
    fn test_first_halting_match_wins() {
        let (mgr, _) = manager();
        let first = mgr.add_standard("n1", "wf");
        let second = mgr.add_standard("n1", "wf");

        let hit = mgr.should_break("n1", "wf", &VariableScope::new()).unwrap();
        assert_eq!(hit.breakpoint_id, first.id);
        // Both breakpoints still counted the visit.
        assert_eq!(mgr.get(second.id).unwrap().current_hits, 1);
    }

    #[test]
    fn test_disabled_breakpoint_does_not_count_hits() {
        let (mgr, _) = manager();
        let bp = mgr.add_standard("n1", "wf");
        mgr.toggle(bp.id).unwrap();

        mgr.should_break("n1", "wf", &VariableScope::new());
        assert_eq!(mgr.get(bp.id).unwrap().current_hits, 0);
    }

    #[test]
    fn test_remove_and_clear() {
        let (mgr, _) = manager();
        let bp = mgr.add_standard("n1", "wf");
        mgr.add_standard("n2", "wf");

        assert!(mgr.remove(bp.id));
        assert!(!mgr.remove(bp.id));
        assert_eq!(mgr.list().len(), 1);

        mgr.clear_all();
        assert!(mgr.list().is_empty());
    }

    #[test]
    fn test_toggle_unknown_breakpoint() {
        let (mgr, _) = manager();
        assert!(matches!(
            mgr.toggle(BreakpointId(99)),
            Err(DebugError::BreakpointNotFound(BreakpointId(99)))
        ));
    }

    #[test]
    fn test_export_import_roundtrip() {
        let (mgr, _) = manager();
        mgr.add_standard("n1", "wf");
        let bp = mgr.add_conditional("n2", "wf", "input.value > 10");
        mgr.toggle(bp.id).unwrap();
        mgr.add_hit_count("n3", "wf", 5);

        let exported = mgr.export();

        let (other, _) = manager();
        other.import(exported.clone());
        assert_eq!(other.export(), exported);

        // Imported ids survive and new ids do not collide with them.
        let fresh = other.add_standard("n4", "wf");
        assert!(exported.iter().all(|bp| bp.id != fresh.id));
    }
}
