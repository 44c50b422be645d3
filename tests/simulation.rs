//! Integration tests for the orchestration loop.
//!
//! These tests drive [`psim::sim::run`] against fake worker processes,
//! bypassing compilation entirely: each fake worker plays back a script
//! of output lines through the real reader threads, shared queue,
//! decoder, and aggregator.

use std::collections::VecDeque;
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use psim::sim::{self, SimError};
use psim::worker::{
    LineReader, ProcessControl, SpawnedProcess, Spawner, WorkerCommand,
};

// ============================================================================
// Fake workers
// ============================================================================

/// Plays back a fixed list of lines, then reports end of stream (or a
/// read error when `fail_at_end` is set).
struct ScriptedOutput {
    lines: VecDeque<String>,
    fail_at_end: bool,
}

impl LineReader for ScriptedOutput {
    fn next_line(&mut self) -> io::Result<Option<String>> {
        if let Some(line) = self.lines.pop_front() {
            return Ok(Some(line));
        }
        if self.fail_at_end {
            self.fail_at_end = false;
            return Err(io::Error::new(io::ErrorKind::Other, "stream torn down"));
        }
        Ok(None)
    }
}

struct CountingControl {
    terminated: Arc<AtomicUsize>,
}

impl ProcessControl for CountingControl {
    fn terminate(&mut self) {
        self.terminated.fetch_add(1, Ordering::SeqCst);
    }

    fn wait(&mut self) -> io::Result<Option<i32>> {
        Ok(Some(0))
    }
}

/// Hands out one script per spawn, in worker-index order.
struct ScriptedSpawner {
    scripts: Mutex<VecDeque<(Vec<&'static str>, bool)>>,
    terminated: Arc<AtomicUsize>,
}

impl ScriptedSpawner {
    fn new(scripts: Vec<Vec<&'static str>>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into_iter().map(|lines| (lines, false)).collect()),
            terminated: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn with_failing_worker(mut self, index: usize) -> Self {
        let scripts = self.scripts.get_mut().unwrap();
        scripts[index].1 = true;
        self
    }
}

impl Spawner for ScriptedSpawner {
    fn spawn(&self, _command: &WorkerCommand) -> io::Result<SpawnedProcess> {
        let (lines, fail_at_end) = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or((Vec::new(), false));

        Ok(SpawnedProcess {
            output: Box::new(ScriptedOutput {
                lines: lines.into_iter().map(String::from).collect(),
                fail_at_end,
            }),
            control: Box::new(CountingControl {
                terminated: self.terminated.clone(),
            }),
        })
    }
}

/// Fails every spawn after the first `allow` calls.
struct FlakySpawner {
    allow: usize,
    calls: AtomicUsize,
    terminated: Arc<AtomicUsize>,
}

impl Spawner for FlakySpawner {
    fn spawn(&self, _command: &WorkerCommand) -> io::Result<SpawnedProcess> {
        if self.calls.fetch_add(1, Ordering::SeqCst) >= self.allow {
            return Err(io::Error::new(io::ErrorKind::NotFound, "no such binary"));
        }
        Ok(SpawnedProcess {
            output: Box::new(ScriptedOutput {
                lines: VecDeque::new(),
                fail_at_end: false,
            }),
            control: Box::new(CountingControl {
                terminated: self.terminated.clone(),
            }),
        })
    }
}

fn binary() -> &'static Path {
    Path::new("/tmp/psim/fake/psim.exe")
}

// ============================================================================
// End-to-end runs
// ============================================================================

#[test]
fn three_worker_interleaved_run() {
    let spawner = ScriptedSpawner::new(vec![
        vec!["App [d, 1]: hi"],
        vec!["Metric [Cycles]: 10"],
        vec!["State [d]: a = 1"],
    ]);

    let result = sim::run(binary(), 3, true, &spawner).unwrap();

    assert_eq!(result.log.len(), 1);
    assert_eq!(result.log[0].device, "d");
    assert_eq!(result.log[0].level, 1);
    assert_eq!(result.log[0].message, "hi");

    assert_eq!(result.metrics.len(), 1);
    assert_eq!(result.metrics["Cycles"], 10);

    assert_eq!(result.states.len(), 1);
    assert_eq!(result.states["d"]["a"], 1);

    // Clean completion terminates nothing.
    assert_eq!(spawner.terminated.load(Ordering::SeqCst), 0);
}

#[test]
fn delivered_messages_accumulate_across_workers() {
    let spawner = ScriptedSpawner::new(vec![
        vec!["Metric [Delivered messages]: 5", "Metric [Cycles]: 100"],
        vec!["Metric [Delivered messages]: 7", "Metric [Cycles]: 200"],
    ]);

    let result = sim::run(binary(), 2, true, &spawner).unwrap();

    // Delivered messages accumulates; other metrics are last-write-wins
    // (either worker's value, depending on interleaving).
    assert_eq!(result.metrics["Delivered messages"], 12);
    let cycles = result.metrics["Cycles"];
    assert!(cycles == 100 || cycles == 200);
}

#[test]
fn state_snapshots_replace_within_a_worker() {
    let spawner = ScriptedSpawner::new(vec![vec![
        "State [dev0]: x = 1, y = 2",
        "unrecognized chatter in between",
        "State [dev0]: x = 3",
    ]]);

    let result = sim::run(binary(), 1, true, &spawner).unwrap();

    let dev0 = &result.states["dev0"];
    assert_eq!(dev0.len(), 1);
    assert_eq!(dev0["x"], 3);
}

#[test]
fn single_worker_run_with_empty_output() {
    let spawner = ScriptedSpawner::new(vec![vec![]]);
    let result = sim::run(binary(), 1, true, &spawner).unwrap();

    assert!(result.log.is_empty());
    assert!(result.states.is_empty());
    assert!(result.metrics.is_empty());
}

// ============================================================================
// Failure semantics
// ============================================================================

#[test]
fn spawn_failure_aborts_and_names_the_worker() {
    let terminated = Arc::new(AtomicUsize::new(0));
    let spawner = FlakySpawner {
        allow: 1,
        calls: AtomicUsize::new(0),
        terminated: terminated.clone(),
    };

    match sim::run(binary(), 3, true, &spawner) {
        Err(SimError::Spawn { worker, .. }) => assert_eq!(worker, 1),
        other => panic!("expected spawn error, got {other:?}"),
    }

    // The already-started worker was terminated, not orphaned.
    assert_eq!(terminated.load(Ordering::SeqCst), 1);
}

#[test]
fn read_failure_aborts_and_names_the_worker() {
    let spawner = ScriptedSpawner::new(vec![
        vec!["App [d, 1]: before the failure"],
        vec![],
    ])
    .with_failing_worker(1);

    match sim::run(binary(), 2, true, &spawner) {
        Err(SimError::Read { worker, .. }) => assert_eq!(worker, 1),
        other => panic!("expected read error, got {other:?}"),
    }

    // Both workers were told to terminate on abort.
    assert_eq!(spawner.terminated.load(Ordering::SeqCst), 2);
}
