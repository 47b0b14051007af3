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

//! Replay a recorded execution trace through the debugger.
//!
//! The trace is a JSON file naming the execution and listing events in
//! recorded order: node executions (with their variable scope, duration
//! and resource usage) interleaved with sub-workflow enter/exit markers.
//! The driver feeds each event through the hook surface on a background
//! task, so breakpoints, stepping and inspection behave exactly as they
//! would against a live execution.

use std::{collections::HashMap, path::Path, sync::Arc, time::Duration};

use eyre::{Context, Result};
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};
use wdb_common::types::{BranchId, NodeRunStatus, SessionKey};
use wdb_engine::{
    core::{scope_from_json, Debugger, DebuggerConfig},
    rpc::{DebugRpcServer, RpcServerHandle},
};

/// A recorded execution trace.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayScript {
    /// Workflow the trace was recorded from
    pub workflow_id: String,
    /// The recorded run
    pub execution_id: String,
    /// Events in recorded order
    #[serde(default)]
    pub events: Vec<TraceEvent>,
}

/// One recorded event.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TraceEvent {
    /// A node executed
    #[serde(rename_all = "camelCase")]
    Node {
        /// Node identifier
        node_id: String,
        /// Display name
        #[serde(default)]
        node_name: Option<String>,
        /// Branch the node ran on, main when omitted
        #[serde(default)]
        branch_id: Option<String>,
        /// Variable scope at node entry
        #[serde(default)]
        scope: Value,
        /// Recorded wall time of the node
        #[serde(default)]
        duration_ms: u64,
        /// Outcome, success when omitted
        #[serde(default)]
        status: Option<NodeRunStatus>,
        /// Recorded CPU usage in percent
        #[serde(default)]
        cpu_usage: Option<f64>,
        /// Recorded memory usage in bytes
        #[serde(default)]
        memory_usage: Option<u64>,
        /// Durations of outbound HTTP calls, in milliseconds
        #[serde(default)]
        network_requests: Vec<f64>,
        /// Durations of database queries, in milliseconds
        #[serde(default)]
        database_queries: Vec<f64>,
    },
    /// The branch descended into a sub-workflow
    #[serde(rename_all = "camelCase")]
    EnterSubWorkflow {
        /// Branch taking the call, main when omitted
        #[serde(default)]
        branch_id: Option<String>,
        /// Sub-workflow being entered
        workflow_id: String,
        /// Call site in the parent workflow
        node_id: String,
    },
    /// The branch returned from a sub-workflow
    #[serde(rename_all = "camelCase")]
    ExitSubWorkflow {
        /// Branch returning, main when omitted
        #[serde(default)]
        branch_id: Option<String>,
    },
}

fn branch_of(branch_id: &Option<String>) -> BranchId {
    branch_id.as_deref().map_or_else(BranchId::main, BranchId::new)
}

/// Load a trace, start a session for it with memory sampling, drive the
/// hook surface on a background task and expose the debugger over RPC.
pub async fn run_replay(
    script: &Path,
    port: Option<u16>,
    realtime: bool,
) -> Result<RpcServerHandle> {
    let raw = std::fs::read_to_string(script)
        .wrap_err_with(|| format!("failed to read trace script {}", script.display()))?;
    let script: ReplayScript = serde_json::from_str(&raw)
        .wrap_err("failed to parse trace script: expected a recorded execution trace")?;

    let key = SessionKey::new(&script.workflow_id, &script.execution_id);
    info!(key = %key, events = script.events.len(), realtime, "replaying execution trace");

    let config = DebuggerConfig::default().with_auto_memory_sampling(true);
    let debugger = Arc::new(Debugger::new(config));
    debugger.start_session(key.clone())?;

    let server = DebugRpcServer::new(debugger.clone());
    let handle = match port {
        Some(port) => server.start_on_port(port).await?,
        None => server.start().await?,
    };

    tokio::spawn(drive(debugger, key, script, realtime));

    Ok(handle)
}

/// Feed the recorded events through the hook surface, one at a time in
/// recorded order. Suspension gates make the task wait exactly where a
/// live execution would.
async fn drive(debugger: Arc<Debugger>, key: SessionKey, script: ReplayScript, realtime: bool) {
    // Call depth per branch, maintained from the sub-workflow markers.
    let mut depths: HashMap<BranchId, usize> = HashMap::new();

    for event in script.events {
        match event {
            TraceEvent::Node {
                node_id,
                node_name,
                branch_id,
                scope,
                duration_ms,
                status,
                cpu_usage,
                memory_usage,
                network_requests,
                database_queries,
            } => {
                let branch = branch_of(&branch_id);
                let depth = depths.get(&branch).copied().unwrap_or(0);
                let node_name = node_name.unwrap_or_else(|| node_id.clone());
                let scope = scope_from_json(scope);

                let decision = debugger.before_node_execution(
                    &key, &node_id, &node_name, depth, &branch, &scope,
                );
                decision.proceed().await;

                if let Ok(session) = debugger.session(&key) {
                    for duration in &network_requests {
                        session.profiler().record_network_request(&node_id, *duration);
                    }
                    for duration in &database_queries {
                        session.profiler().record_database_query(&node_id, *duration);
                    }
                }

                if realtime && duration_ms > 0 {
                    tokio::time::sleep(Duration::from_millis(duration_ms)).await;
                }

                debugger.after_node_execution(
                    &key,
                    &node_id,
                    status.unwrap_or(NodeRunStatus::Success),
                    cpu_usage,
                    memory_usage,
                );
            }
            TraceEvent::EnterSubWorkflow { branch_id, workflow_id, node_id } => {
                let branch = branch_of(&branch_id);
                debugger.enter_sub_workflow(&key, &branch, &workflow_id, &node_id);
                *depths.entry(branch).or_insert(0) += 1;
            }
            TraceEvent::ExitSubWorkflow { branch_id } => {
                let branch = branch_of(&branch_id);
                match depths.get_mut(&branch) {
                    Some(depth) if *depth > 0 => *depth -= 1,
                    _ => warn!(branch = %branch, "exitSubWorkflow without matching enter"),
                }
                debugger.exit_sub_workflow(&key, &branch);
            }
        }
    }

    info!(key = %key, "replay complete; session stays open for inspection");
}
