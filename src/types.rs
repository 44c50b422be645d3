//! Core type definitions for the simulation driver.
//!
//! This module defines the fundamental types used throughout the driver.

/// Index of a simulation worker process.
///
/// Workers are numbered `0..nworkers` and each spawned process receives
/// its own index as a command-line argument.
pub type WorkerId = usize;

/// Value of a single device state field as reported by a worker.
pub type FieldValue = i64;

/// Value of an aggregate metric reported by a worker.
pub type MetricValue = i64;

/// Verbosity level attached to an application log line.
pub type LogLevel = i64;
