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

//! Hierarchical execution timing and bottleneck analysis.
//!
//! The [`Profiler`] records one [`ProfileEvent`] per node execution. Events
//! open on `start_node` and seal on `end_node`; nesting is reconstructed
//! from the currently-open event one level up on the same branch, so
//! sub-workflow executions hang off the node that invoked them. Sealed
//! events aggregate into [`PerformanceReport`]s and render as a flame
//! graph.
//!
//! All timestamps are millisecond offsets from the profiler's origin
//! instant. Recording is append-only and never blocks node execution
//! beyond the lock it takes to push the event.

use std::{
    collections::HashMap,
    sync::atomic::{AtomicU64, Ordering},
    time::Instant,
};

use dashmap::DashMap;
use parking_lot::RwLock;
use wdb_common::types::{
    Bottleneck, BottleneckKind, BranchId, FlameGraphNode, NodePerformanceMetrics,
    NodeRunStatus, PerformanceReport, ProfileEvent, ProfileEventId,
};

/// Flame graph colors keyed by completion status.
const COLOR_SUCCESS: &str = "#4caf50";
const COLOR_ERROR: &str = "#f44336";
const COLOR_CANCELED: &str = "#ff9800";
const COLOR_RUNNING: &str = "#9e9e9e";

/// Thresholds for bottleneck flagging.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfilerConfig {
    /// A node is slow when its average time exceeds this multiple of the
    /// global p95 duration
    pub slow_multiplier: f64,
    /// Average reported memory per event above this flags high memory
    pub memory_threshold_bytes: u64,
    /// Average network requests per event above this flags excessive network
    pub api_call_threshold: f64,
    /// Average time per query above this flags inefficient queries
    pub query_time_threshold_ms: f64,
}

impl Default for ProfilerConfig {
    fn default() -> Self {
        Self {
            slow_multiplier: 1.0,
            memory_threshold_bytes: 100 * 1024 * 1024,
            api_call_threshold: 10.0,
            query_time_threshold_ms: 100.0,
        }
    }
}

impl ProfilerConfig {
    pub fn with_slow_multiplier(mut self, multiplier: f64) -> Self {
        self.slow_multiplier = multiplier;
        self
    }

    pub fn with_memory_threshold_bytes(mut self, bytes: u64) -> Self {
        self.memory_threshold_bytes = bytes;
        self
    }

    pub fn with_api_call_threshold(mut self, count: f64) -> Self {
        self.api_call_threshold = count;
        self
    }

    pub fn with_query_time_threshold_ms(mut self, ms: f64) -> Self {
        self.query_time_threshold_ms = ms;
        self
    }
}

/// Per-session execution profiler.
#[derive(Debug)]
pub struct Profiler {
    config: ProfilerConfig,
    origin: Instant,
    next_id: AtomicU64,
    events: RwLock<Vec<ProfileEvent>>,
    /// Open event per (branch, depth), used for parent linking
    open_by_slot: DashMap<(BranchId, usize), ProfileEventId>,
    /// Most recently opened, still-open event per node, used to attribute
    /// resource counters
    open_by_node: DashMap<String, ProfileEventId>,
}

impl Default for Profiler {
    fn default() -> Self {
        Self::new(ProfilerConfig::default())
    }
}

impl Profiler {
    pub fn new(config: ProfilerConfig) -> Self {
        Self {
            config,
            origin: Instant::now(),
            next_id: AtomicU64::new(1),
            events: RwLock::new(Vec::new()),
            open_by_slot: DashMap::new(),
            open_by_node: DashMap::new(),
        }
    }

    fn now_ms(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }

    /// Open an event for a node execution.
    ///
    /// At depth > 0 the event links to the currently-open event one level
    /// up on the same branch, so flame graphs nest sub-workflows under the
    /// node that invoked them.
    pub fn start_node(
        &self,
        node_id: &str,
        node_name: &str,
        branch: &BranchId,
        depth: usize,
    ) -> ProfileEventId {
        let event_id = ProfileEventId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let parent_event_id = if depth > 0 {
            self.open_by_slot.get(&(branch.clone(), depth - 1)).map(|id| *id)
        } else {
            None
        };

        let event = ProfileEvent {
            event_id,
            node_id: node_id.to_string(),
            node_name: node_name.to_string(),
            parent_event_id,
            depth,
            branch_id: branch.clone(),
            start_time: self.now_ms(),
            end_time: None,
            status: NodeRunStatus::Running,
            cpu_usage: None,
            memory_usage: None,
            network_request_count: 0,
            network_request_time: 0.0,
            db_query_count: 0,
            db_query_time: 0.0,
        };

        self.events.write().push(event);
        self.open_by_slot.insert((branch.clone(), depth), event_id);
        self.open_by_node.insert(node_id.to_string(), event_id);
        event_id
    }

    /// Seal an open event. Sealing twice, or sealing an unknown id, is a
    /// no-op.
    pub fn end_node(
        &self,
        event_id: ProfileEventId,
        status: NodeRunStatus,
        cpu_usage: Option<f64>,
        memory_usage: Option<u64>,
    ) {
        let end_time = self.now_ms();
        let mut events = self.events.write();
        let Some(event) = events.iter_mut().find(|e| e.event_id == event_id) else {
            return;
        };
        if event.is_complete() {
            return;
        }

        event.end_time = Some(end_time);
        event.status = status;
        event.cpu_usage = cpu_usage;
        event.memory_usage = memory_usage;

        let slot = (event.branch_id.clone(), event.depth);
        let node_id = event.node_id.clone();
        drop(events);

        self.open_by_slot.remove_if(&slot, |_, open| *open == event_id);
        self.open_by_node.remove_if(&node_id, |_, open| *open == event_id);
    }

    /// Attribute a network request to the node's currently-open event.
    pub fn record_network_request(&self, node_id: &str, duration_ms: f64) {
        self.record_resource(node_id, |event| {
            event.network_request_count += 1;
            event.network_request_time += duration_ms;
        });
    }

    /// Attribute a database query to the node's currently-open event.
    pub fn record_database_query(&self, node_id: &str, duration_ms: f64) {
        self.record_resource(node_id, |event| {
            event.db_query_count += 1;
            event.db_query_time += duration_ms;
        });
    }

    fn record_resource(&self, node_id: &str, apply: impl FnOnce(&mut ProfileEvent)) {
        let Some(event_id) = self.open_by_node.get(node_id).map(|id| *id) else {
            return;
        };
        let mut events = self.events.write();
        if let Some(event) = events.iter_mut().find(|e| e.event_id == event_id) {
            apply(event);
        }
    }

    /// The node's currently-open event, if any.
    pub fn open_event_for_node(&self, node_id: &str) -> Option<ProfileEventId> {
        self.open_by_node.get(node_id).map(|id| *id)
    }

    /// All events recorded so far, open and sealed, in start order.
    pub fn events(&self) -> Vec<ProfileEvent> {
        self.events.read().clone()
    }

    /// Discard all recorded events.
    pub fn clear(&self) {
        self.events.write().clear();
        self.open_by_slot.clear();
        self.open_by_node.clear();
    }

    /// Aggregate sealed events into per-node metrics and bottleneck flags.
    pub fn statistics(&self) -> PerformanceReport {
        let events = self.events.read();
        let total_events = events.len();

        let mut durations: Vec<f64> = Vec::new();
        let mut by_node: HashMap<String, Vec<&ProfileEvent>> = HashMap::new();
        for event in events.iter().filter(|e| e.is_complete()) {
            durations.push(event.duration().unwrap_or(0.0));
            by_node.entry(event.node_id.clone()).or_default().push(event);
        }
        let completed_events = durations.len();
        let total_time: f64 = durations.iter().sum();
        let p95 = percentile(&mut durations, 0.95);

        let mut metrics = Vec::new();
        let mut bottlenecks = Vec::new();
        for (node_id, node_events) in by_node {
            let node_name = node_events[0].node_name.clone();
            let mut times: Vec<f64> =
                node_events.iter().filter_map(|e| e.duration()).collect();
            times.sort_by(|a, b| a.partial_cmp(b).expect("durations are finite"));

            let count = times.len();
            let total: f64 = times.iter().sum();
            let avg = total / count as f64;
            let median = if count % 2 == 1 {
                times[count / 2]
            } else {
                (times[count / 2 - 1] + times[count / 2]) / 2.0
            };

            let metric = NodePerformanceMetrics {
                node_id: node_id.clone(),
                node_name: node_name.clone(),
                count,
                min_time: times[0],
                max_time: times[count - 1],
                avg_time: avg,
                median_time: median,
                total_time: total,
            };
            bottlenecks.extend(self.flag_bottlenecks(&metric, &node_events, p95));
            metrics.push(metric);
        }

        metrics.sort_by(|a, b| b.avg_time.partial_cmp(&a.avg_time).expect("finite"));
        bottlenecks.sort_by(|a, b| a.node_id.cmp(&b.node_id));

        PerformanceReport { metrics, bottlenecks, total_events, completed_events, total_time }
    }

    fn flag_bottlenecks(
        &self,
        metric: &NodePerformanceMetrics,
        events: &[&ProfileEvent],
        p95: f64,
    ) -> Vec<Bottleneck> {
        let mut flags = Vec::new();
        let count = events.len() as f64;

        if p95 > 0.0 && metric.avg_time > self.config.slow_multiplier * p95 {
            flags.push(self.bottleneck(
                metric,
                BottleneckKind::SlowExecution,
                format!(
                    "average time {:.1}ms exceeds {:.1}x the global p95 of {:.1}ms",
                    metric.avg_time, self.config.slow_multiplier, p95
                ),
            ));
        }

        let memory_samples: Vec<u64> = events.iter().filter_map(|e| e.memory_usage).collect();
        if !memory_samples.is_empty() {
            let avg_memory =
                memory_samples.iter().sum::<u64>() as f64 / memory_samples.len() as f64;
            if avg_memory > self.config.memory_threshold_bytes as f64 {
                flags.push(self.bottleneck(
                    metric,
                    BottleneckKind::HighMemory,
                    format!(
                        "average memory {:.1}MiB exceeds the {:.1}MiB threshold",
                        avg_memory / (1024.0 * 1024.0),
                        self.config.memory_threshold_bytes as f64 / (1024.0 * 1024.0)
                    ),
                ));
            }
        }

        let avg_requests =
            events.iter().map(|e| e.network_request_count as f64).sum::<f64>() / count;
        if avg_requests > self.config.api_call_threshold {
            flags.push(self.bottleneck(
                metric,
                BottleneckKind::ExcessiveNetwork,
                format!(
                    "average of {avg_requests:.1} network requests per execution exceeds {}",
                    self.config.api_call_threshold
                ),
            ));
        }

        let query_count: u32 = events.iter().map(|e| e.db_query_count).sum();
        if query_count > 0 {
            let query_time: f64 = events.iter().map(|e| e.db_query_time).sum();
            let per_query = query_time / query_count as f64;
            if per_query > self.config.query_time_threshold_ms {
                flags.push(self.bottleneck(
                    metric,
                    BottleneckKind::InefficientQueries,
                    format!(
                        "average query time {per_query:.1}ms exceeds {:.1}ms",
                        self.config.query_time_threshold_ms
                    ),
                ));
            }
        }

        flags
    }

    fn bottleneck(
        &self,
        metric: &NodePerformanceMetrics,
        kind: BottleneckKind,
        details: String,
    ) -> Bottleneck {
        Bottleneck {
            node_id: metric.node_id.clone(),
            node_name: metric.node_name.clone(),
            kind,
            details,
            recommendation: recommendation(kind).to_string(),
        }
    }

    /// Rebuild the execution tree from parent links.
    ///
    /// Children keep start order. When more than one root event exists (or
    /// none), a synthetic root spans them.
    pub fn flame_graph(&self) -> FlameGraphNode {
        let events = self.events.read();

        let mut children_of: HashMap<Option<ProfileEventId>, Vec<&ProfileEvent>> = HashMap::new();
        for event in events.iter() {
            children_of.entry(event.parent_event_id).or_default().push(event);
        }

        let roots: Vec<FlameGraphNode> = children_of
            .get(&None)
            .map(|events| events.iter().map(|e| build_flame_node(e, &children_of)).collect())
            .unwrap_or_default();

        if roots.len() == 1 {
            roots.into_iter().next().expect("one root")
        } else {
            FlameGraphNode {
                name: "execution".to_string(),
                value: roots.iter().map(|r| r.value).sum(),
                children: roots,
                node_id: None,
                color: COLOR_RUNNING.to_string(),
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn inject_event(&self, event: ProfileEvent) {
        self.next_id.fetch_max(event.event_id.0 + 1, Ordering::SeqCst);
        self.events.write().push(event);
    }
}

fn build_flame_node(
    event: &ProfileEvent,
    children_of: &HashMap<Option<ProfileEventId>, Vec<&ProfileEvent>>,
) -> FlameGraphNode {
    let children = children_of
        .get(&Some(event.event_id))
        .map(|events| events.iter().map(|e| build_flame_node(e, children_of)).collect())
        .unwrap_or_default();

    FlameGraphNode {
        name: event.node_name.clone(),
        value: event.duration().unwrap_or(0.0),
        children,
        node_id: Some(event.node_id.clone()),
        color: status_color(event.status).to_string(),
    }
}

fn status_color(status: NodeRunStatus) -> &'static str {
    match status {
        NodeRunStatus::Success => COLOR_SUCCESS,
        NodeRunStatus::Error => COLOR_ERROR,
        NodeRunStatus::Canceled => COLOR_CANCELED,
        NodeRunStatus::Running => COLOR_RUNNING,
    }
}

fn recommendation(kind: BottleneckKind) -> &'static str {
    match kind {
        BottleneckKind::SlowExecution => {
            "Consider caching results, batching work, or moving this node off the critical path"
        }
        BottleneckKind::HighMemory => {
            "Process data in smaller chunks or stream items instead of buffering them"
        }
        BottleneckKind::ExcessiveNetwork => {
            "Batch API calls or use a bulk endpoint to reduce request count"
        }
        BottleneckKind::InefficientQueries => {
            "Add indexes, reduce result set size, or combine queries"
        }
    }
}

/// Nearest-rank percentile. Sorts in place; empty input yields 0.
fn percentile(values: &mut [f64], fraction: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(|a, b| a.partial_cmp(b).expect("durations are finite"));
    let rank = ((values.len() as f64) * fraction).ceil() as usize;
    values[rank.clamp(1, values.len()) - 1]
}
