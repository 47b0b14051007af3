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

use super::BranchId;

/// Identifier of a profiling event, unique within a session.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct ProfileEventId(pub u64);

impl Display for ProfileEventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Completion status of a node execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeRunStatus {
    /// Still executing (event not yet sealed)
    Running,
    /// Completed normally
    Success,
    /// Completed with an error
    Error,
    /// Aborted before completion
    Canceled,
}

impl NodeRunStatus {
    /// Lowercase name, matching the serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Success => "success",
            Self::Error => "error",
            Self::Canceled => "canceled",
        }
    }
}

impl Display for NodeRunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One timed node execution, possibly nested under a parent event.
///
/// Times are milliseconds relative to the profiler's origin instant, so
/// durations never depend on wall-clock adjustments. Resource counters
/// accumulate while the event is open.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileEvent {
    /// Event identifier
    pub event_id: ProfileEventId,
    /// Node that executed
    pub node_id: String,
    /// Display name of the node
    pub node_name: String,
    /// Enclosing event one level up, if any
    pub parent_event_id: Option<ProfileEventId>,
    /// Nesting depth at execution time
    pub depth: usize,
    /// Branch the node ran on
    pub branch_id: BranchId,
    /// Start offset in ms
    pub start_time: f64,
    /// End offset in ms; `None` while the event is open
    pub end_time: Option<f64>,
    /// Completion status (`Running` while open)
    pub status: NodeRunStatus,
    /// CPU usage fraction reported at completion
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_usage: Option<f64>,
    /// Memory usage in bytes reported at completion
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_usage: Option<u64>,
    /// Outbound network requests recorded while open
    pub network_request_count: u32,
    /// Total network time in ms
    pub network_request_time: f64,
    /// Database queries recorded while open
    pub db_query_count: u32,
    /// Total query time in ms
    pub db_query_time: f64,
}

impl ProfileEvent {
    /// Duration in ms, when sealed.
    pub fn duration(&self) -> Option<f64> {
        self.end_time.map(|end| end - self.start_time)
    }

    /// Whether the event has been sealed by `endNode`.
    pub fn is_complete(&self) -> bool {
        self.end_time.is_some()
    }
}

/// Aggregated execution-time statistics for one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodePerformanceMetrics {
    /// Node identifier
    pub node_id: String,
    /// Display name of the node
    pub node_name: String,
    /// Completed executions
    pub count: usize,
    /// Fastest execution in ms
    pub min_time: f64,
    /// Slowest execution in ms
    pub max_time: f64,
    /// Mean execution time in ms
    pub avg_time: f64,
    /// Median execution time in ms
    pub median_time: f64,
    /// Sum of execution times in ms
    pub total_time: f64,
}

/// Categories of flagged performance problems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BottleneckKind {
    /// Average time above the global p95 threshold
    SlowExecution,
    /// Average memory usage above the configured threshold
    HighMemory,
    /// Too many network requests per execution
    ExcessiveNetwork,
    /// Query time dominates execution
    InefficientQueries,
}

impl BottleneckKind {
    /// Lowercase name, matching the serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SlowExecution => "slowExecution",
            Self::HighMemory => "highMemory",
            Self::ExcessiveNetwork => "excessiveNetwork",
            Self::InefficientQueries => "inefficientQueries",
        }
    }
}

impl Display for BottleneckKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A flagged performance problem with a suggested remediation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bottleneck {
    /// Node identifier
    pub node_id: String,
    /// Display name of the node
    pub node_name: String,
    /// Problem category
    pub kind: BottleneckKind,
    /// What was measured (numbers included)
    pub details: String,
    /// Templated recommendation for this category
    pub recommendation: String,
}

/// One node of the flame graph tree.
///
/// `value` is the sealed duration in ms (0 for open events); parents span
/// their children's time ranges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlameGraphNode {
    /// Display name
    pub name: String,
    /// Duration in ms (0 while open)
    pub value: f64,
    /// Nested executions
    pub children: Vec<FlameGraphNode>,
    /// Node identifier (`None` for the synthetic root)
    pub node_id: Option<String>,
    /// Display color keyed by status
    pub color: String,
}

impl FlameGraphNode {
    /// Whether this node has no nested executions.
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// Everything `getStatistics` reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceReport {
    /// Per-node aggregates, slowest average first
    pub metrics: Vec<NodePerformanceMetrics>,
    /// Flagged problems
    pub bottlenecks: Vec<Bottleneck>,
    /// All events recorded (open and sealed)
    pub total_events: usize,
    /// Sealed events only
    pub completed_events: usize,
    /// Sum of sealed durations in ms
    pub total_time: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(id: u64, start: f64, end: Option<f64>) -> ProfileEvent {
        ProfileEvent {
            event_id: ProfileEventId(id),
            node_id: "n1".to_string(),
            node_name: "HTTP Request".to_string(),
            parent_event_id: None,
            depth: 0,
            branch_id: BranchId::main(),
            start_time: start,
            end_time: end,
            status: if end.is_some() { NodeRunStatus::Success } else { NodeRunStatus::Running },
            cpu_usage: None,
            memory_usage: None,
            network_request_count: 0,
            network_request_time: 0.0,
            db_query_count: 0,
            db_query_time: 0.0,
        }
    }

    #[test]
    fn test_event_duration() {
        assert_eq!(event(1, 10.0, Some(35.5)).duration(), Some(25.5));
        assert_eq!(event(2, 10.0, None).duration(), None);
    }

    #[test]
    fn test_event_completion() {
        assert!(event(1, 0.0, Some(1.0)).is_complete());
        assert!(!event(2, 0.0, None).is_complete());
    }

    #[test]
    fn test_event_wire_shape() {
        let v = serde_json::to_value(event(3, 1.0, Some(2.0))).unwrap();
        assert_eq!(v["eventId"], serde_json::json!(3));
        assert_eq!(v["parentEventId"], serde_json::Value::Null);
        assert_eq!(v["status"], serde_json::json!("success"));
        assert_eq!(v["branchId"], serde_json::json!("main"));
    }

    #[test]
    fn test_flame_graph_leaf() {
        let leaf = FlameGraphNode {
            name: "n".to_string(),
            value: 1.0,
            children: vec![],
            node_id: Some("n".to_string()),
            color: "#4caf50".to_string(),
        };
        assert!(leaf.is_leaf());
    }
}
