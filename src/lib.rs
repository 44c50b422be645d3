//! # PSIM Simulation Driver
//!
//! A driver for distributed simulations of device-graph applications:
//! it parses a declarative graph description, hands the model to an
//! external code generator, compiles the generated engine source, runs
//! it as one or more cooperating worker processes, and reconstructs a
//! single coherent result from their output streams.
//!
//! ## Pipeline
//!
//! ```text
//! graph XML ─> parser ─> GraphModel ─> generate() ─> source text
//!                                                        │
//!          SimulationResult <─ aggregate <─ decode <─ run/compile
//! ```
//!
//! - **Parsing**: [`parser::parse_file`] builds an immutable
//!   [`GraphModel`] from a namespaced XML document.
//! - **Orchestration**: [`sim::run_simulation`] compiles the generated
//!   source and supervises N worker processes, one reader thread per
//!   worker feeding a single shared queue.
//! - **Decoding/aggregation**: [`protocol::decode`] classifies each
//!   output line; [`aggregate::ResultAggregator`] folds the decoded
//!   events into the final log/states/metrics.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use psim::{parser, sim, SimOptions};
//!
//! let model = parser::parse_file("ring.xml")?;
//! let options = SimOptions::new().with_workers(4);
//! let result = sim::run_simulation(&model, &options, my_generator)?;
//! println!("{}", result.to_json()?);
//! ```

pub mod aggregate;
pub mod config;
pub mod model;
pub mod parser;
pub mod protocol;
pub mod sim;
pub mod types;
pub mod worker;

// Re-export commonly used types
pub use aggregate::{LogEntry, ResultAggregator, SimulationResult, DELIVERED_MESSAGES};
pub use config::{ConfigError, SimOptions};
pub use model::{
    DeviceInstance, DeviceType, Edge, Endpoint, GraphInstance, GraphModel, MessageType, Pin,
    StateFields,
};
pub use parser::{parse_file, ParseError};
pub use protocol::Event;
pub use sim::{run_simulation, run_simulation_file, SimError};
pub use types::{FieldValue, LogLevel, MetricValue, WorkerId};
pub use worker::{OsSpawner, Spawner, Worker, WorkerCommand};

/// Initialize the tracing subscriber for logging.
///
/// Call this at the start of your program to enable logging.
///
/// # Example
///
/// ```rust,ignore
/// psim::init_logging("info");
/// ```
pub fn init_logging(level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}
