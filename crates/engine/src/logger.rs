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

//! Bounded, filterable, exportable execution log.
//!
//! [`ExtendedLogger`] keeps debug-session log entries in a fixed-capacity
//! ring buffer (oldest entries evicted silently) and fans every entry out to
//! broadcast subscribers in real time. A slow subscriber loses old entries
//! instead of blocking the emitter, so logging stays off the execution hot
//! path. Filtered queries, exports (json/csv/txt), and summary statistics
//! are computed on demand.

use std::{
    collections::{BTreeMap, VecDeque},
    sync::atomic::{AtomicU64, Ordering},
};

use chrono::Utc;
use itertools::Itertools;
use parking_lot::Mutex;
use regex::Regex;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::warn;
use wdb_common::types::{
    LogEntry, LogExportFormat, LogFilter, LogLevel, LogStatistics, SourceCount,
};

use crate::error::{DebugError, DebugResult};

/// How many sources `getStatistics` reports at most.
const TOP_SOURCES_CAP: usize = 10;

/// Configuration for [`ExtendedLogger`].
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    /// Ring buffer capacity; the oldest entry is evicted when full
    pub max_entries: usize,
    /// Broadcast buffer per subscriber before lagging drops entries
    pub stream_capacity: usize,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self { max_entries: 1000, stream_capacity: 256 }
    }
}

impl LoggerConfig {
    /// Set the ring buffer capacity
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }

    /// Set the broadcast buffer capacity
    pub fn with_stream_capacity(mut self, stream_capacity: usize) -> Self {
        self.stream_capacity = stream_capacity;
        self
    }
}

/// Session-scoped structured log with bounded retention and live streaming.
#[derive(Debug)]
pub struct ExtendedLogger {
    /// Retained entries, oldest first
    entries: Mutex<VecDeque<LogEntry>>,
    /// Next entry id (ids start at 1)
    next_id: AtomicU64,
    /// Ring buffer capacity
    max_entries: usize,
    /// Live stream; send errors (no subscribers) are ignored
    stream: broadcast::Sender<LogEntry>,
}

impl ExtendedLogger {
    /// Create a logger with the given configuration.
    pub fn new(config: LoggerConfig) -> Self {
        let (stream, _) = broadcast::channel(config.stream_capacity.max(1));
        Self {
            entries: Mutex::new(VecDeque::with_capacity(config.max_entries.min(1024))),
            next_id: AtomicU64::new(0),
            max_entries: config.max_entries.max(1),
            stream,
        }
    }

    /// Append an entry, evicting the oldest when the buffer is full.
    ///
    /// Never fails: overflow evicts silently and subscriber delivery is
    /// fire-and-forget.
    pub fn log(
        &self,
        level: LogLevel,
        source: impl Into<String>,
        message: impl Into<String>,
        context: Option<Value>,
        metadata: Option<Value>,
    ) -> LogEntry {
        let entry = LogEntry {
            id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
            timestamp: Utc::now(),
            level,
            source: source.into(),
            message: message.into(),
            context,
            metadata,
        };

        {
            let mut entries = self.entries.lock();
            while entries.len() >= self.max_entries {
                entries.pop_front();
            }
            entries.push_back(entry.clone());
        }

        let _ = self.stream.send(entry.clone());
        entry
    }

    /// Append a debug-level entry.
    pub fn debug(&self, source: impl Into<String>, message: impl Into<String>) -> LogEntry {
        self.log(LogLevel::Debug, source, message, None, None)
    }

    /// Append an info-level entry.
    pub fn info(&self, source: impl Into<String>, message: impl Into<String>) -> LogEntry {
        self.log(LogLevel::Info, source, message, None, None)
    }

    /// Append a warn-level entry.
    pub fn warn(&self, source: impl Into<String>, message: impl Into<String>) -> LogEntry {
        self.log(LogLevel::Warn, source, message, None, None)
    }

    /// Append an error-level entry.
    pub fn error(&self, source: impl Into<String>, message: impl Into<String>) -> LogEntry {
        self.log(LogLevel::Error, source, message, None, None)
    }

    /// Append a fatal-level entry.
    pub fn fatal(&self, source: impl Into<String>, message: impl Into<String>) -> LogEntry {
        self.log(LogLevel::Fatal, source, message, None, None)
    }

    /// Subscribe to the live entry stream.
    ///
    /// Dropping the receiver unsubscribes; a lagging receiver loses the
    /// oldest buffered entries rather than blocking emission.
    pub fn subscribe(&self) -> broadcast::Receiver<LogEntry> {
        self.stream.subscribe()
    }

    /// Retained entries matching the filter, oldest first.
    pub fn get_logs(&self, filter: &LogFilter) -> Vec<LogEntry> {
        // An unparsable pattern matches nothing rather than failing the query.
        let pattern = filter.pattern.as_deref().map(|p| {
            Regex::new(p)
                .map_err(|e| warn!("Invalid log filter pattern '{}': {}", p, e))
                .ok()
        });
        let text = filter.text.as_deref().map(str::to_lowercase);

        self.entries
            .lock()
            .iter()
            .filter(|entry| {
                if let Some(levels) = &filter.levels {
                    if !levels.contains(&entry.level) {
                        return false;
                    }
                }
                if let Some(sources) = &filter.sources {
                    if !sources.iter().any(|s| s == &entry.source) {
                        return false;
                    }
                }
                if let Some(from) = &filter.from {
                    if entry.timestamp < *from {
                        return false;
                    }
                }
                if let Some(to) = &filter.to {
                    if entry.timestamp > *to {
                        return false;
                    }
                }
                if let Some(text) = &text {
                    if !entry.message.to_lowercase().contains(text) {
                        return false;
                    }
                }
                if let Some(pattern) = &pattern {
                    match pattern {
                        Some(re) => {
                            if !re.is_match(&entry.message) {
                                return false;
                            }
                        }
                        None => return false,
                    }
                }
                true
            })
            .cloned()
            .collect()
    }

    /// Serialize the (optionally filtered) entries to the named format.
    pub fn export(
        &self,
        format: LogExportFormat,
        filter: Option<&LogFilter>,
    ) -> DebugResult<String> {
        let default_filter = LogFilter::all();
        let entries = self.get_logs(filter.unwrap_or(&default_filter));

        match format {
            LogExportFormat::Json => serde_json::to_string_pretty(&entries)
                .map_err(|e| DebugError::ExportFailed(e.to_string())),
            LogExportFormat::Csv => export_csv(&entries),
            LogExportFormat::Txt => Ok(entries
                .iter()
                .map(|e| {
                    format!(
                        "[{}] {} {}: {}",
                        e.timestamp.to_rfc3339(),
                        e.level.as_str().to_uppercase(),
                        e.source,
                        e.message
                    )
                })
                .join("\n")),
        }
    }

    /// Counts by level, error rate, and the busiest sources.
    pub fn statistics(&self) -> LogStatistics {
        let entries = self.entries.lock();
        let total = entries.len();

        let mut by_level = BTreeMap::new();
        let mut by_source: BTreeMap<String, usize> = BTreeMap::new();
        let mut errors = 0usize;

        for entry in entries.iter() {
            *by_level.entry(entry.level.as_str().to_string()).or_insert(0) += 1;
            *by_source.entry(entry.source.clone()).or_insert(0) += 1;
            if entry.level >= LogLevel::Error {
                errors += 1;
            }
        }

        let top_sources = by_source
            .into_iter()
            .sorted_by(|(a_src, a_n), (b_src, b_n)| b_n.cmp(a_n).then_with(|| a_src.cmp(b_src)))
            .take(TOP_SOURCES_CAP)
            .map(|(source, count)| SourceCount { source, count })
            .collect();

        LogStatistics {
            total,
            by_level,
            error_rate: if total == 0 { 0.0 } else { errors as f64 / total as f64 },
            top_sources,
        }
    }

    /// Drop all retained entries.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Number of retained entries.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether no entries are retained.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl Default for ExtendedLogger {
    fn default() -> Self {
        Self::new(LoggerConfig::default())
    }
}

fn export_csv(entries: &[LogEntry]) -> DebugResult<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(["id", "timestamp", "level", "source", "message", "context", "metadata"])
        .map_err(|e| DebugError::ExportFailed(e.to_string()))?;

    for entry in entries {
        let context = entry.context.as_ref().map(Value::to_string).unwrap_or_default();
        let metadata = entry.metadata.as_ref().map(Value::to_string).unwrap_or_default();
        writer
            .write_record([
                entry.id.to_string(),
                entry.timestamp.to_rfc3339(),
                entry.level.as_str().to_string(),
                entry.source.clone(),
                entry.message.clone(),
                context,
                metadata,
            ])
            .map_err(|e| DebugError::ExportFailed(e.to_string()))?;
    }

    let bytes = writer.into_inner().map_err(|e| DebugError::ExportFailed(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| DebugError::ExportFailed(e.to_string()))
}
