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

//! Shared fixtures for WDB integration tests.

/// Test environment initialization
pub mod init {
    /// Set up logging once per test process, honoring RUST_LOG.
    pub fn init_test_environment() {
        wdb_common::logging::ensure_test_logging(None);
    }
}

/// JSON-RPC test server and client helpers
pub mod rpc {
    use std::{sync::Arc, time::Duration};

    use eyre::{eyre, Result};
    use serde_json::{json, Value};
    use wdb_engine::{
        core::{Debugger, DebuggerConfig},
        rpc::{DebugRpcServer, RpcServerHandle},
    };

    /// A running debug RPC server plus a client against it. The debugger
    /// is shared, so tests can drive hooks in-process while controlling
    /// the session over HTTP.
    pub struct TestServer {
        /// Shared debugger behind the server
        pub debugger: Arc<Debugger>,
        /// Keeps the server alive; dropping it leaks the server task,
        /// so call [`RpcServerHandle::shutdown`] at the end of the test
        pub handle: RpcServerHandle,
        /// Client pointed at the server
        pub client: RpcClient,
    }

    /// Start a debug RPC server on an ephemeral port.
    pub async fn start_test_server(config: DebuggerConfig) -> Result<TestServer> {
        let debugger = Arc::new(Debugger::new(config));
        let server = DebugRpcServer::new(debugger.clone());
        let handle = server.start_on_port(0).await?;
        let client = RpcClient::new(format!("http://{}", handle.addr()));
        Ok(TestServer { debugger, handle, client })
    }

    /// Minimal JSON-RPC 2.0 client over reqwest.
    #[derive(Debug, Clone)]
    pub struct RpcClient {
        client: reqwest::Client,
        url: String,
    }

    impl RpcClient {
        /// Client for the server at `url`.
        pub fn new(url: String) -> Self {
            Self { client: reqwest::Client::new(), url }
        }

        /// Base URL of the server.
        pub fn url(&self) -> &str {
            &self.url
        }

        /// Call a method, returning the result or an error carrying the
        /// RPC error code and message.
        pub async fn call(&self, method: &str, params: Value) -> Result<Value> {
            let body = json!({
                "jsonrpc": "2.0",
                "method": method,
                "params": params,
                "id": 1,
            });
            let response: Value =
                self.client.post(&self.url).json(&body).send().await?.json().await?;

            if let Some(error) = response.get("error") {
                return Err(eyre!(
                    "RPC error {} calling {method}: {}",
                    error["code"],
                    error["message"]
                ));
            }
            Ok(response["result"].clone())
        }

        /// Fetch the session info for a key.
        pub async fn session_state(&self, workflow_id: &str, execution_id: &str) -> Result<Value> {
            self.call(
                "wdb_getSessionState",
                json!({"workflowId": workflow_id, "executionId": execution_id}),
            )
            .await
        }

        /// Poll until the session reports the given state, with a 2s cap.
        pub async fn wait_for_state(
            &self,
            workflow_id: &str,
            execution_id: &str,
            state: &str,
        ) -> Result<Value> {
            let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
            loop {
                let info = self.session_state(workflow_id, execution_id).await?;
                if info["state"] == state {
                    return Ok(info);
                }
                if tokio::time::Instant::now() >= deadline {
                    return Err(eyre!(
                        "session never reached state '{state}', last info: {info}"
                    ));
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        }
    }
}
