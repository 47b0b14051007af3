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

use std::{collections::BTreeMap, fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use eyre::{bail, Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Severity of a debug log entry.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub enum LogLevel {
    /// Diagnostic detail
    Debug,
    /// Normal operation
    Info,
    /// Something unexpected but recoverable
    Warn,
    /// An operation failed
    Error,
    /// The execution cannot continue
    Fatal,
}

impl LogLevel {
    /// All levels, lowest severity first.
    pub const ALL: [Self; 5] = [Self::Debug, Self::Info, Self::Warn, Self::Error, Self::Fatal];

    /// Lowercase name, matching the serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
            Self::Fatal => "fatal",
        }
    }
}

impl Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            "fatal" => Ok(Self::Fatal),
            other => bail!("unknown log level: {other}"),
        }
    }
}

/// One entry in the debug log ring buffer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    /// Monotonic sequence number (also the emission order)
    pub id: u64,
    /// Capture time
    pub timestamp: DateTime<Utc>,
    /// Severity
    pub level: LogLevel,
    /// Component or node that produced the entry
    pub source: String,
    /// Human-readable message
    pub message: String,
    /// Structured payload tied to the event
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
    /// Free-form annotations (request ids, tags, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// Criteria for querying the log buffer. All criteria are conjunctive;
/// an empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LogFilter {
    /// Restrict to these levels
    #[serde(skip_serializing_if = "Option::is_none")]
    pub levels: Option<Vec<LogLevel>>,
    /// Restrict to these sources (exact match)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<String>>,
    /// Entries at or after this time
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<DateTime<Utc>>,
    /// Entries at or before this time
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<DateTime<Utc>>,
    /// Case-insensitive substring of the message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Regular expression over the message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

impl LogFilter {
    /// A filter that matches every entry.
    pub fn all() -> Self {
        Self::default()
    }

    /// Builder: restrict to the given levels.
    pub fn with_levels(mut self, levels: impl IntoIterator<Item = LogLevel>) -> Self {
        self.levels = Some(levels.into_iter().collect());
        self
    }

    /// Builder: restrict to the given sources.
    pub fn with_sources<S: Into<String>>(mut self, sources: impl IntoIterator<Item = S>) -> Self {
        self.sources = Some(sources.into_iter().map(Into::into).collect());
        self
    }

    /// Builder: case-insensitive substring search.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Builder: regex search over messages.
    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }
}

/// Export serialization formats for log entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LogExportFormat {
    /// Pretty-printed JSON array
    Json,
    /// One row per entry with header
    Csv,
    /// Plain text, one line per entry
    Txt,
}

impl FromStr for LogExportFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            "txt" => Ok(Self::Txt),
            other => bail!("unknown export format: {other} (expected json, csv, or txt)"),
        }
    }
}

impl Display for LogExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json => f.write_str("json"),
            Self::Csv => f.write_str("csv"),
            Self::Txt => f.write_str("txt"),
        }
    }
}

/// Aggregate statistics over the current log buffer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogStatistics {
    /// Number of entries currently retained
    pub total: usize,
    /// Entry counts keyed by level name
    pub by_level: BTreeMap<String, usize>,
    /// Share of entries at error or fatal level, in [0, 1]
    pub error_rate: f64,
    /// Most frequent sources, descending, capped at 10
    pub top_sources: Vec<SourceCount>,
}

/// A source name paired with its entry count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceCount {
    /// Source name
    pub source: String,
    /// Entries from this source
    pub count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_ordering() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Error < LogLevel::Fatal);
    }

    #[test]
    fn test_level_roundtrip() {
        for level in LogLevel::ALL {
            let parsed: LogLevel = level.as_str().parse().unwrap();
            assert_eq!(parsed, level);
        }
        assert!(LogLevel::from_str("trace").is_err());
    }

    #[test]
    fn test_export_format_parse() {
        assert_eq!(LogExportFormat::from_str("json").unwrap(), LogExportFormat::Json);
        assert_eq!(LogExportFormat::from_str("csv").unwrap(), LogExportFormat::Csv);
        assert_eq!(LogExportFormat::from_str("txt").unwrap(), LogExportFormat::Txt);
        assert!(LogExportFormat::from_str("xml").is_err());
    }

    #[test]
    fn test_filter_builders() {
        let filter = LogFilter::all()
            .with_levels([LogLevel::Warn, LogLevel::Error])
            .with_sources(["breakpoints"])
            .with_text("condition");
        assert_eq!(filter.levels.as_ref().map(Vec::len), Some(2));
        assert_eq!(filter.sources.as_deref(), Some(&["breakpoints".to_string()][..]));
        assert_eq!(filter.text.as_deref(), Some("condition"));
        assert!(filter.pattern.is_none());
    }

    #[test]
    fn test_empty_filter_deserializes() {
        let filter: LogFilter = serde_json::from_str("{}").unwrap();
        assert_eq!(filter, LogFilter::all());
    }
}
