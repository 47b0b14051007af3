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

use std::{fmt::Display, str::FromStr};

use eyre::{bail, Error, Result};
use serde::{Deserialize, Serialize};

use crate::expression::normalize_expression;

/// Unique identifier of a breakpoint, stable across export/import.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct BreakpointId(pub u64);

impl Display for BreakpointId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The four breakpoint behaviors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BreakpointKind {
    /// Halts unconditionally while enabled
    Standard,
    /// Halts when its condition evaluates to true
    Conditional,
    /// Halts on the Nth visit only
    HitCount,
    /// Never halts; emits a formatted log message
    LogPoint,
}

impl BreakpointKind {
    /// The camelCase name used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Conditional => "conditional",
            Self::HitCount => "hitCount",
            Self::LogPoint => "logPoint",
        }
    }
}

impl Display for BreakpointKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BreakpointKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "standard" => Ok(Self::Standard),
            "conditional" => Ok(Self::Conditional),
            "hitCount" => Ok(Self::HitCount),
            "logPoint" => Ok(Self::LogPoint),
            other => bail!("unknown breakpoint type: {other}"),
        }
    }
}

/// A breakpoint attached to a node within a workflow.
///
/// The shape is deliberately flat: `condition`, `hit_count`, and
/// `log_message` are populated according to `kind` and ignored otherwise.
/// Constructors keep the combination coherent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Breakpoint {
    /// Stable identifier
    pub id: BreakpointId,
    /// Node the breakpoint is attached to
    pub node_id: String,
    /// Workflow the node belongs to
    pub workflow_id: String,
    /// Behavior of the breakpoint
    #[serde(rename = "type")]
    pub kind: BreakpointKind,
    /// Disabled breakpoints never match and never count hits
    pub enabled: bool,
    /// Boolean expression over the scope (conditional only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    /// Target visit count (hitCount only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hit_count: Option<u32>,
    /// Visits recorded so far
    #[serde(default)]
    pub current_hits: u32,
    /// Message template with `{expr}` tokens (logPoint only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_message: Option<String>,
}

impl Breakpoint {
    /// Creates a standard (unconditional) breakpoint.
    pub fn standard(
        id: BreakpointId,
        node_id: impl Into<String>,
        workflow_id: impl Into<String>,
    ) -> Self {
        Self {
            id,
            node_id: node_id.into(),
            workflow_id: workflow_id.into(),
            kind: BreakpointKind::Standard,
            enabled: true,
            condition: None,
            hit_count: None,
            current_hits: 0,
            log_message: None,
        }
    }

    /// Creates a conditional breakpoint; the condition is normalized.
    pub fn conditional(
        id: BreakpointId,
        node_id: impl Into<String>,
        workflow_id: impl Into<String>,
        condition: &str,
    ) -> Self {
        let mut bp = Self::standard(id, node_id, workflow_id);
        bp.kind = BreakpointKind::Conditional;
        bp.condition = Some(normalize_expression(condition));
        bp
    }

    /// Creates a hit-count breakpoint halting on the `target`th visit.
    pub fn hit_count(
        id: BreakpointId,
        node_id: impl Into<String>,
        workflow_id: impl Into<String>,
        target: u32,
    ) -> Self {
        let mut bp = Self::standard(id, node_id, workflow_id);
        bp.kind = BreakpointKind::HitCount;
        bp.hit_count = Some(target);
        bp
    }

    /// Creates a log point with the given message template.
    pub fn log_point(
        id: BreakpointId,
        node_id: impl Into<String>,
        workflow_id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let mut bp = Self::standard(id, node_id, workflow_id);
        bp.kind = BreakpointKind::LogPoint;
        bp.log_message = Some(message.into());
        bp
    }

    /// Updates the condition, normalizing whitespace.
    pub fn set_condition(&mut self, condition: &str) {
        self.condition = Some(normalize_expression(condition));
    }

    /// Whether this breakpoint targets the given node/workflow pair.
    pub fn matches_node(&self, node_id: &str, workflow_id: &str) -> bool {
        self.node_id == node_id && self.workflow_id == workflow_id
    }
}

impl Display for Breakpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{} {} @{} ({})", self.id, self.kind, self.node_id, self.workflow_id)?;
        if let Some(cond) = &self.condition {
            write!(f, " if {cond}")?;
        }
        if let Some(target) = self.hit_count {
            write!(f, " on hit {target}")?;
        }
        if !self.enabled {
            write!(f, " [disabled]")?;
        }
        Ok(())
    }
}

/// Record of a breakpoint deciding to halt (or, for log points, firing).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakpointHit {
    /// The breakpoint that matched
    pub breakpoint_id: BreakpointId,
    /// Node being entered when the hit occurred
    pub node_id: String,
    /// Workflow of that node
    pub workflow_id: String,
    /// Kind of the matching breakpoint
    #[serde(rename = "type")]
    pub kind: BreakpointKind,
    /// Visit count at hit time
    pub hits: u32,
}
