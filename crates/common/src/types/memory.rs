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

const MIB: f64 = 1024.0 * 1024.0;

/// Point-in-time process memory reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemorySnapshot {
    /// When the sample was taken
    pub timestamp: DateTime<Utc>,
    /// Resident memory in bytes
    pub heap_used: u64,
    /// Virtual memory in bytes
    pub heap_total: u64,
}

/// Identifier of a tracked allocation, unique within a session.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct AllocationId(pub u64);

impl Display for AllocationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One reported allocation, attributed to the node that made it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Allocation {
    /// Allocation identifier
    pub allocation_id: AllocationId,
    /// Node that allocated
    pub node_id: String,
    /// Size in bytes
    pub size: u64,
    /// Caller-supplied label ("buffer", "json", ...)
    #[serde(rename = "type")]
    pub kind: String,
    /// When the allocation was reported
    pub allocated_at: DateTime<Utc>,
    /// When it was released; `None` while live
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub freed_at: Option<DateTime<Utc>>,
}

impl Allocation {
    /// Whether the allocation has not been released yet.
    pub fn is_live(&self) -> bool {
        self.freed_at.is_none()
    }
}

/// How urgent a suspected leak is, graded by growth per sample interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LeakSeverity {
    /// Under 1 MiB per interval
    Low,
    /// 1 to 5 MiB per interval
    Medium,
    /// 5 to 10 MiB per interval
    High,
    /// Over 10 MiB per interval
    Critical,
}

impl LeakSeverity {
    /// Grade an average growth rate in bytes per sample interval.
    pub fn from_growth(bytes_per_interval: f64) -> Self {
        if bytes_per_interval > 10.0 * MIB {
            Self::Critical
        } else if bytes_per_interval >= 5.0 * MIB {
            Self::High
        } else if bytes_per_interval >= MIB {
            Self::Medium
        } else {
            Self::Low
        }
    }

    /// Lowercase name, matching the serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl Display for LeakSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A node whose live allocations keep growing across samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryLeak {
    /// Node whose allocations grow
    pub node_id: String,
    /// Live bytes at the latest sample
    pub size: u64,
    /// Average growth in bytes per sample interval
    pub growth_rate: f64,
    /// Graded urgency
    pub severity: LeakSeverity,
}

/// One reported garbage-collection pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GcEvent {
    /// Collector-specific label ("minor", "major", ...)
    #[serde(rename = "type")]
    pub kind: String,
    /// Pause duration in ms
    pub duration: f64,
    /// Bytes reclaimed
    pub freed_bytes: u64,
    /// When the pass was reported
    pub timestamp: DateTime<Utc>,
}

/// Everything `getMemoryStats` reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryReport {
    /// Latest snapshot, if sampling has produced one
    pub current: Option<MemorySnapshot>,
    /// Peak resident bytes across all snapshots
    pub peak_heap_used: u64,
    /// Live (unfreed) bytes across all tracked allocations
    pub live_bytes: u64,
    /// Live bytes grouped by node, largest first
    pub by_node: Vec<NodeMemoryUsage>,
    /// Garbage collection passes reported so far
    pub gc_count: usize,
    /// Total bytes reclaimed by reported passes
    pub gc_freed_bytes: u64,
    /// Snapshots retained
    pub snapshot_count: usize,
}

/// Live allocation total for one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeMemoryUsage {
    /// Node identifier
    pub node_id: String,
    /// Live bytes attributed to the node
    pub live_bytes: u64,
    /// Live allocation count
    pub allocation_count: usize,
}
