//! Result accumulation for simulation runs.
//!
//! The aggregator owns the log/states/metrics accumulators and applies
//! decoded worker events to them. It is mutated only from the
//! orchestrator's single consumption loop, so it needs no internal
//! locking; worker reader threads only ever touch the shared queue.
//!
//! Merge rules:
//!
//! - App events append to the log in arrival order.
//! - State events **replace** the whole recorded field map for their
//!   device; they are not merged with a prior snapshot.
//! - The `"Delivered messages"` metric **accumulates** across all
//!   workers and occurrences; every other metric is last-write-wins.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::protocol::Event;
use crate::types::{FieldValue, LogLevel, MetricValue};

/// Name of the one metric that accumulates instead of overwriting.
pub const DELIVERED_MESSAGES: &str = "Delivered messages";

/// One application log entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Reporting device
    pub device: String,
    /// Verbosity level
    pub level: LogLevel,
    /// Log message text
    pub message: String,
}

/// The reconstructed result of a simulation run.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SimulationResult {
    /// Application log entries in arrival order
    pub log: Vec<LogEntry>,
    /// Last reported state snapshot per device
    pub states: HashMap<String, HashMap<String, FieldValue>>,
    /// Aggregate metrics by name
    pub metrics: HashMap<String, MetricValue>,
}

impl SimulationResult {
    /// Exports the result to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Exports the result to a JSON file.
    pub fn to_json_file<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        let json = self
            .to_json()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, json)
    }
}

/// Accumulates decoded events into a [`SimulationResult`].
#[derive(Debug, Default)]
pub struct ResultAggregator {
    result: SimulationResult,
}

impl ResultAggregator {
    /// Creates a new empty aggregator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one decoded event.
    pub fn apply(&mut self, event: Event) {
        match event {
            Event::App {
                device,
                level,
                message,
            } => {
                self.result.log.push(LogEntry {
                    device,
                    level,
                    message,
                });
            }
            Event::State { device, fields } => {
                self.result.states.insert(device, fields);
            }
            Event::Metric { name, value } => {
                if name == DELIVERED_MESSAGES {
                    *self.result.metrics.entry(name).or_insert(0) += value;
                } else {
                    self.result.metrics.insert(name, value);
                }
            }
        }
    }

    /// Returns a view of the result accumulated so far.
    pub fn result(&self) -> &SimulationResult {
        &self.result
    }

    /// Consumes the aggregator, returning the final result snapshot.
    pub fn into_result(self) -> SimulationResult {
        self.result
    }
}
