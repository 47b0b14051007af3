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

//! WDB - Workflow Debugger
//!
//! A step-by-step debugger and profiler for workflow executions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use eyre::Result;

mod cmd;

/// Command-line interface for WDB
#[derive(Debug, Parser)]
#[command(name = "wdb")]
#[command(about = "Workflow Debugger - a step-by-step debugger for workflow executions")]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Start the debug RPC server and wait for executions to attach
    Serve {
        /// Port for the JSON-RPC server (WDB_PORT or 3000 when omitted)
        #[arg(long, env = "WDB_PORT")]
        port: Option<u16>,
    },
    /// Replay a recorded execution trace through the debugger
    Replay {
        /// Path to the recorded trace (JSON)
        script: PathBuf,

        /// Port for the JSON-RPC server (WDB_PORT or 3000 when omitted)
        #[arg(long, env = "WDB_PORT")]
        port: Option<u16>,

        /// Honor recorded node durations with real sleeps
        #[arg(long)]
        realtime: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Parse CLI arguments
    let cli = Cli::parse();

    wdb_common::logging::init_logging("wdb", true)?;

    let rpc_server_handle = match &cli.command {
        Commands::Serve { port } => cmd::run_serve(*port).await?,
        Commands::Replay { script, port, realtime } => {
            cmd::run_replay(script, *port, *realtime).await?
        }
    };

    tracing::info!(
        "Debug RPC server is running on {}. Press Ctrl+C to exit.",
        rpc_server_handle.addr()
    );

    tokio::signal::ctrl_c().await?;
    tracing::info!("Received Ctrl+C, shutting down...");

    if let Err(e) = rpc_server_handle.shutdown() {
        tracing::error!("Failed to shutdown RPC server: {e}");
    } else {
        tracing::info!("RPC server shut down successfully");
    }

    Ok(())
}
