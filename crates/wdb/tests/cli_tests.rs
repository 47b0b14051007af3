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

use std::io::Write;

use assert_cmd::Command;
use predicates::prelude::*;
use tracing::info;

#[test]
fn test_help_command() {
    wdb_common::logging::ensure_test_logging(None);
    info!("Testing CLI help command");

    let mut cmd = Command::cargo_bin("wdb").unwrap();
    cmd.arg("--help").assert().success().stdout(predicate::str::contains("Workflow Debugger"));
}

#[test]
fn test_version_command() {
    wdb_common::logging::ensure_test_logging(None);
    info!("Running test");
    let mut cmd = Command::cargo_bin("wdb").unwrap();
    cmd.arg("--version").assert().success().stdout(predicate::str::contains("wdb"));
}

#[test]
fn test_serve_subcommand_help() {
    wdb_common::logging::ensure_test_logging(None);
    info!("Running test");
    let mut cmd = Command::cargo_bin("wdb").unwrap();
    cmd.arg("serve")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Start the debug RPC server"));
}

#[test]
fn test_replay_subcommand_help() {
    wdb_common::logging::ensure_test_logging(None);
    info!("Running test");
    let mut cmd = Command::cargo_bin("wdb").unwrap();
    cmd.arg("replay")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Replay a recorded execution trace"));
}

#[test]
fn test_replay_missing_script() {
    wdb_common::logging::ensure_test_logging(None);
    info!("Running test");
    let mut cmd = Command::cargo_bin("wdb").unwrap();
    cmd.arg("replay").arg("/nonexistent/trace.json").assert().failure();
}

#[test]
fn test_replay_malformed_script() {
    wdb_common::logging::ensure_test_logging(None);
    info!("Running test");

    let mut script = tempfile::NamedTempFile::new().unwrap();
    script.write_all(b"not a trace").unwrap();

    let mut cmd = Command::cargo_bin("wdb").unwrap();
    cmd.arg("replay").arg(script.path()).assert().failure();
}

#[test]
fn test_missing_subcommand() {
    wdb_common::logging::ensure_test_logging(None);
    info!("Running test");
    let mut cmd = Command::cargo_bin("wdb").unwrap();
    cmd.assert().failure().stderr(predicate::str::contains("Usage"));
}
