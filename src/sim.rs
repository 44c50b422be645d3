//! Simulation orchestration.
//!
//! The orchestrator turns generated engine source into a running
//! distributed simulation: it compiles the source into a binary,
//! spawns one worker process per index, and runs a single consumption
//! loop over the shared queue the worker reader threads feed. Each
//! popped line is optionally echoed, decoded, and applied to the
//! result aggregator; the loop ends exactly when every worker has
//! reported end of stream.
//!
//! Decoding and aggregation happen strictly on the consuming thread,
//! so no locking is needed beyond the queue itself.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::mpsc::{self, Receiver};

use chrono::Utc;
use rand::Rng;
use thiserror::Error;
use tracing::{debug, info};

use crate::aggregate::{ResultAggregator, SimulationResult};
use crate::config::SimOptions;
use crate::model::GraphModel;
use crate::parser::ParseError;
use crate::protocol;
use crate::types::WorkerId;
use crate::worker::{OsSpawner, QueueItem, Spawner, Worker, WorkerCommand};

/// Compiler flags for the generated engine source.
const COMPILE_FLAGS: [&str; 2] = ["-std=c++11", "-fdiagnostics-color=always"];

/// Errors that can occur while driving a simulation.
#[derive(Error, Debug)]
pub enum SimError {
    #[error("graph parsing failed: {0}")]
    Parse(#[from] ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("compilation failed ({})", source_file.display())]
    Compile {
        /// Path to the source file that failed to compile
        source_file: PathBuf,
    },

    #[error("worker {worker} failed to start: {source}")]
    Spawn {
        worker: WorkerId,
        #[source]
        source: std::io::Error,
    },

    #[error("worker {worker} output stream failed: {source}")]
    Read {
        worker: WorkerId,
        #[source]
        source: std::io::Error,
    },
}

/// Result type for orchestration operations.
pub type SimResult<T> = Result<T, SimError>;

/// Compiles generated engine source and returns the binary path.
///
/// Each run gets a fresh collision-free subdirectory under
/// `temp_dir/psim`, named from a UTC timestamp plus a random suffix,
/// holding both the written source and the compiled binary.
pub fn compile(source: &str, temp_dir: &Path) -> SimResult<PathBuf> {
    let run_dir = create_run_dir(temp_dir)?;
    let source_file = run_dir.join("psim.cpp");
    let output_file = run_dir.join("psim.exe");

    std::fs::write(&source_file, source)?;
    info!(dir = %run_dir.display(), "compiling simulation engine");

    let status = Command::new("g++")
        .args(COMPILE_FLAGS)
        .arg("-o")
        .arg(&output_file)
        .arg(&source_file)
        .status()?;

    if !status.success() {
        return Err(SimError::Compile { source_file });
    }

    Ok(output_file)
}

fn create_run_dir(temp_dir: &Path) -> std::io::Result<PathBuf> {
    let stamp = Utc::now().format("run-%Y%m%d-%H%M-");
    let mut rng = rand::thread_rng();
    let suffix: String = (0..6).map(|_| char::from(b'0' + rng.gen_range(0..10))).collect();

    let run_dir = temp_dir.join("psim").join(format!("{stamp}{suffix}"));
    std::fs::create_dir_all(&run_dir)?;
    Ok(run_dir)
}

/// Runs a compiled simulation binary with `nworkers` worker processes
/// and reconstructs the combined result from their output streams.
///
/// Single-worker runs invoke the binary directly; multi-worker runs
/// wrap each worker in the rendezvous bridge so the processes can
/// exchange messages. A spawn or read failure aborts the run and
/// terminates every already-started worker.
pub fn run(
    binary: &Path,
    nworkers: usize,
    quiet: bool,
    spawner: &dyn Spawner,
) -> SimResult<SimulationResult> {
    let (tx, rx) = mpsc::channel();
    let mut workers = Vec::with_capacity(nworkers);

    for index in 0..nworkers {
        let command = if nworkers > 1 {
            WorkerCommand::bridged(binary, index)
        } else {
            WorkerCommand::single(binary, index)
        };

        match Worker::spawn(spawner, &command, index, tx.clone()) {
            Ok(worker) => workers.push(worker),
            Err(source) => {
                abort(&mut workers);
                return Err(SimError::Spawn {
                    worker: index,
                    source,
                });
            }
        }
    }

    // The readers hold the only remaining senders; the queue closes
    // once every reader thread has exited.
    drop(tx);

    info!(nworkers, "simulation started");
    match consume(rx, nworkers, quiet) {
        Ok(result) => {
            for worker in workers {
                worker.shutdown()?;
            }
            info!(
                log_entries = result.log.len(),
                metrics = result.metrics.len(),
                "simulation complete"
            );
            Ok(result)
        }
        Err(err) => {
            abort(&mut workers);
            Err(err)
        }
    }
}

/// Runs the consumption loop over the shared worker queue.
///
/// Pops items until all `nworkers` indices have reported end of
/// stream: lines are echoed (unless `quiet`), decoded, and aggregated;
/// a duplicate end-of-stream item for an already-done index is
/// harmless; a read failure surfaces as [`SimError::Read`].
pub fn consume(
    queue: Receiver<QueueItem>,
    nworkers: usize,
    quiet: bool,
) -> SimResult<SimulationResult> {
    let mut aggregator = ResultAggregator::new();
    let mut done = vec![false; nworkers];
    let mut remaining = nworkers;

    while remaining > 0 {
        let Ok(item) = queue.recv() else {
            // All senders dropped without a full set of end-of-stream
            // items; nothing more can arrive.
            break;
        };

        match item {
            QueueItem::Line(index, line) => {
                if !quiet {
                    println!("{index} -> {}", protocol::echo_line(&line));
                }
                if let Some(event) = protocol::decode(&line) {
                    aggregator.apply(event);
                }
            }
            QueueItem::Eof(index) => {
                if !done[index] {
                    done[index] = true;
                    remaining -= 1;
                    debug!(index, remaining, "worker stream closed");
                }
            }
            QueueItem::Failed(index, source) => {
                return Err(SimError::Read {
                    worker: index,
                    source,
                });
            }
        }
    }

    Ok(aggregator.into_result())
}

fn abort(workers: &mut [Worker]) {
    for worker in workers {
        worker.terminate();
    }
}

/// Top-level entry: generate engine source for a parsed graph model,
/// compile it, and run the simulation.
///
/// `generate` is the opaque code-generator collaborator; it receives
/// the model and the run options and returns compilable source text.
pub fn run_simulation<G>(
    model: &GraphModel,
    options: &SimOptions,
    generate: G,
) -> SimResult<SimulationResult>
where
    G: FnOnce(&GraphModel, &SimOptions) -> String,
{
    let source = generate(model, options);
    let binary = compile(&source, &options.temp_dir)?;
    run(&binary, options.nworkers, options.quiet, &OsSpawner)
}

/// Like [`run_simulation`], starting from a graph description file.
pub fn run_simulation_file<P, G>(
    graph_file: P,
    options: &SimOptions,
    generate: G,
) -> SimResult<SimulationResult>
where
    P: AsRef<Path>,
    G: FnOnce(&GraphModel, &SimOptions) -> String,
{
    let model = crate::parser::parse_file(graph_file)?;
    run_simulation(&model, options, generate)
}
