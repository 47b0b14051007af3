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

//! JSON-RPC server tests over HTTP.
//!
//! The server and the test share one debugger, so driver tasks feed the
//! hook surface in-process while every control and inspection call goes
//! through the wire like a real UI client.

use serde_json::json;
use tracing::info;
use wdb_common::types::{BranchId, NodeRunStatus, SessionKey};
use wdb_engine::core::{scope_from_json, DebuggerConfig};
use wdb_integration_tests::test_utils::{init, rpc};

const WF: &str = "wf-http";
const EXEC: &str = "exec-1";

fn key_params() -> serde_json::Value {
    json!({"workflowId": WF, "executionId": EXEC})
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_health_endpoint() {
    init::init_test_environment();
    info!("Testing the health endpoint");

    let server = rpc::start_test_server(DebuggerConfig::default()).await.unwrap();

    let health: serde_json::Value = reqwest::Client::new()
        .get(format!("{}/health", server.client.url()))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["service"], "wdb-debug-rpc-server");

    server.handle.shutdown().unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_session_lifecycle_over_http() {
    init::init_test_environment();
    info!("Testing session lifecycle over HTTP");

    let server = rpc::start_test_server(DebuggerConfig::default()).await.unwrap();
    let client = &server.client;

    let info = client.call("wdb_startSession", key_params()).await.unwrap();
    assert_eq!(info["key"]["workflowId"], WF);
    assert_eq!(info["state"], "running");

    // Starting the same execution twice is rejected
    let err = client.call("wdb_startSession", key_params()).await.unwrap_err();
    assert!(err.to_string().contains("-33001"), "expected sessionAlreadyActive, got {err}");

    let sessions = client.call("wdb_listSessions", json!(null)).await.unwrap();
    assert_eq!(sessions.as_array().unwrap().len(), 1);

    assert_eq!(client.call("wdb_stopSession", key_params()).await.unwrap(), json!(true));

    let err = client.session_state(WF, EXEC).await.unwrap_err();
    assert!(err.to_string().contains("-33000"), "expected sessionNotFound, got {err}");

    server.handle.shutdown().unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_breakpoint_hit_and_inspection_over_http() {
    init::init_test_environment();
    info!("Testing breakpoint hit, inspection and resume over HTTP");

    let server = rpc::start_test_server(DebuggerConfig::default()).await.unwrap();
    let client = server.client.clone();

    client.call("wdb_startSession", key_params()).await.unwrap();

    let bp = client
        .call(
            "wdb_addBreakpoint",
            json!({
                "workflowId": WF,
                "executionId": EXEC,
                "nodeId": "n1",
                "type": "conditional",
                "condition": "output.statusCode >= 400",
            }),
        )
        .await
        .unwrap();
    let bp_id = bp["id"].clone();

    client
        .call(
            "wdb_addWatch",
            json!({
                "workflowId": WF,
                "executionId": EXEC,
                "expression": "{{ output.statusCode }}",
            }),
        )
        .await
        .unwrap();

    // Drive the workflow in-process against the shared debugger
    let driver = {
        let debugger = server.debugger.clone();
        tokio::spawn(async move {
            let key = SessionKey::new(WF, EXEC);
            let branch = BranchId::main();
            let scope = scope_from_json(json!({
                "output": {"statusCode": 500},
                "credentials": {"apiKey": "super-secret"},
            }));
            let decision = debugger.before_node_execution(&key, "n1", "Fetch", 0, &branch, &scope);
            decision.proceed().await;
            debugger.after_node_execution(&key, "n1", NodeRunStatus::Error, None, Some(2048));
        })
    };

    let info = client.wait_for_state(WF, EXEC, "paused").await.unwrap();
    assert_eq!(info["activeBreakpointId"], bp_id);

    let hit = client.call("wdb_getActiveBreakpointHit", key_params()).await.unwrap();
    assert_eq!(hit["nodeId"], "n1");
    assert_eq!(hit["type"], "conditional");

    // Credentials come back masked on every inspection surface
    let secret = client
        .call(
            "wdb_getVariable",
            json!({
                "workflowId": WF,
                "executionId": EXEC,
                "path": "credentials.apiKey",
            }),
        )
        .await
        .unwrap();
    assert_eq!(secret, json!("***"));

    let variables = client.call("wdb_inspectScope", key_params()).await.unwrap();
    assert!(!variables.as_array().unwrap().is_empty());

    // Watches were evaluated at the pause
    let watches = client.call("wdb_listWatches", key_params()).await.unwrap();
    assert_eq!(watches[0]["lastValue"], json!(500));

    client.call("wdb_resume", key_params()).await.unwrap();
    driver.await.unwrap();

    let stats = client.call("wdb_getPerformanceStatistics", key_params()).await.unwrap();
    assert_eq!(stats["completedEvents"], json!(1));
    assert_eq!(stats["metrics"][0]["nodeId"], "n1");

    let flame = client.call("wdb_getFlameGraph", key_params()).await.unwrap();
    assert_eq!(flame["nodeId"], json!("n1"));

    server.handle.shutdown().unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_log_query_and_export_over_http() {
    init::init_test_environment();
    info!("Testing log query and export over HTTP");

    let server = rpc::start_test_server(DebuggerConfig::default()).await.unwrap();
    let client = &server.client;

    client.call("wdb_startSession", key_params()).await.unwrap();

    let session = server.debugger.session(&SessionKey::new(WF, EXEC)).unwrap();
    session.logger().info("http-node", "request sent");
    session.logger().error("http-node", "request failed");
    session.logger().info("db-node", "query done");

    let logs = client
        .call(
            "wdb_getLogs",
            json!({
                "workflowId": WF,
                "executionId": EXEC,
                "filter": {"levels": ["error"]},
            }),
        )
        .await
        .unwrap();
    let logs = logs.as_array().unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0]["message"], "request failed");

    let exported = client
        .call(
            "wdb_exportLogs",
            json!({
                "workflowId": WF,
                "executionId": EXEC,
                "format": "csv",
                "filter": {"sources": ["http-node"]},
            }),
        )
        .await
        .unwrap();
    let exported = exported.as_str().unwrap();
    assert!(exported.contains("request sent"));
    assert!(!exported.contains("query done"));

    let stats = client.call("wdb_getLogStatistics", key_params()).await.unwrap();
    assert_eq!(stats["total"], json!(3));

    server.handle.shutdown().unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_breakpoint_export_import_round_trip_over_http() {
    init::init_test_environment();
    info!("Testing breakpoint export/import over HTTP");

    let server = rpc::start_test_server(DebuggerConfig::default()).await.unwrap();
    let client = &server.client;

    client.call("wdb_startSession", key_params()).await.unwrap();
    client
        .call(
            "wdb_addBreakpoint",
            json!({
                "workflowId": WF,
                "executionId": EXEC,
                "nodeId": "n1",
                "type": "standard",
            }),
        )
        .await
        .unwrap();
    client
        .call(
            "wdb_addBreakpoint",
            json!({
                "workflowId": WF,
                "executionId": EXEC,
                "nodeId": "n2",
                "type": "hitCount",
                "hitCount": 3,
            }),
        )
        .await
        .unwrap();

    let exported = client.call("wdb_exportBreakpoints", key_params()).await.unwrap();
    assert_eq!(exported.as_array().unwrap().len(), 2);

    client.call("wdb_clearBreakpoints", key_params()).await.unwrap();
    let listed = client.call("wdb_listBreakpoints", key_params()).await.unwrap();
    assert!(listed.as_array().unwrap().is_empty());

    let count = client
        .call(
            "wdb_importBreakpoints",
            json!({
                "workflowId": WF,
                "executionId": EXEC,
                "breakpoints": exported,
            }),
        )
        .await
        .unwrap();
    assert_eq!(count, json!(2));

    let listed = client.call("wdb_listBreakpoints", key_params()).await.unwrap();
    assert_eq!(listed, exported, "import must restore the identical set");

    server.handle.shutdown().unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_memory_endpoints_over_http() {
    init::init_test_environment();
    info!("Testing memory profiling endpoints over HTTP");

    let server = rpc::start_test_server(DebuggerConfig::default()).await.unwrap();
    let client = &server.client;

    client.call("wdb_startSession", key_params()).await.unwrap();

    let snapshot = client.call("wdb_takeMemorySnapshot", key_params()).await.unwrap();
    assert!(snapshot.get("heapUsed").is_some());

    // Fewer than three snapshots: no leak verdict yet
    let leaks = client.call("wdb_getMemoryLeaks", key_params()).await.unwrap();
    assert!(leaks.as_array().unwrap().is_empty());

    let stats = client.call("wdb_getMemoryStats", key_params()).await.unwrap();
    assert!(stats.get("current").is_some());

    server.handle.shutdown().unwrap();
}
