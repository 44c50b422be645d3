//! Worker process management.
//!
//! A simulation run spawns one worker process per worker index. Each
//! worker gets a dedicated reader thread that drains its output stream
//! line-by-line into a shared queue, then pushes exactly one
//! end-of-stream item and exits. Per-worker line order is preserved;
//! interleaving across workers is unspecified.
//!
//! Process control is abstracted behind small capability traits
//! ([`Spawner`], [`LineReader`], [`ProcessControl`]) so the
//! orchestrator can be driven by fake processes in tests.

use std::io::{self, BufRead, BufReader};
use std::path::Path;
use std::process::{Child, ChildStdout, Command, Stdio};
use std::sync::mpsc::Sender;
use std::thread::JoinHandle;

use tracing::debug;

use crate::types::WorkerId;

/// TCP port of the shared rendezvous endpoint used to bridge
/// inter-worker traffic in multi-worker runs.
pub const RENDEZVOUS_PORT: u16 = 6379;

/// Items pushed onto the shared queue by worker reader threads.
#[derive(Debug)]
pub enum QueueItem {
    /// One output line from a worker.
    Line(WorkerId, String),
    /// Clean end of a worker's output stream.
    Eof(WorkerId),
    /// Abnormal read failure. The worker's stream is finished either
    /// way, but the failure must surface to the run's caller.
    Failed(WorkerId, io::Error),
}

/// The command line used to start one worker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkerCommand {
    /// Program to execute
    pub program: String,
    /// Arguments, in order
    pub args: Vec<String>,
}

impl WorkerCommand {
    /// Command for a single-worker run: the simulation binary invoked
    /// directly with the worker index as its sole argument.
    pub fn single(binary: &Path, index: WorkerId) -> Self {
        Self {
            program: binary.display().to_string(),
            args: vec![index.to_string()],
        }
    }

    /// Command for a multi-worker run: the binary is wrapped in socat,
    /// which bridges the worker's auxiliary stream (fd 3) to the shared
    /// TCP rendezvous endpoint so independently spawned processes can
    /// exchange messages. The primary output stream still reaches the
    /// orchestrator in isolation.
    pub fn bridged(binary: &Path, index: WorkerId) -> Self {
        Self {
            program: "socat".to_string(),
            args: vec![
                format!("exec:{} {},fdout=3", binary.display(), index),
                format!("tcp:localhost:{RENDEZVOUS_PORT}"),
            ],
        }
    }
}

/// Reads a worker's primary output stream one line at a time.
pub trait LineReader: Send {
    /// Returns the next line, or `None` once the stream has closed.
    fn next_line(&mut self) -> io::Result<Option<String>>;
}

/// Controls a spawned worker process.
pub trait ProcessControl: Send {
    /// Forcibly terminates the process. Best effort; used on abort so
    /// no worker is left orphaned.
    fn terminate(&mut self);

    /// Waits for the process to exit, returning its status code when
    /// the platform reports one.
    fn wait(&mut self) -> io::Result<Option<i32>>;
}

/// A freshly spawned worker: the reading half and the controlling half.
///
/// The reading half moves into the worker's reader thread; the
/// controlling half stays with the orchestrator.
pub struct SpawnedProcess {
    /// Output stream reader
    pub output: Box<dyn LineReader>,
    /// Process handle for terminate/wait
    pub control: Box<dyn ProcessControl>,
}

/// Capability to start worker processes.
pub trait Spawner {
    /// Spawns one worker from its command line.
    fn spawn(&self, command: &WorkerCommand) -> io::Result<SpawnedProcess>;
}

/// [`Spawner`] implementation over OS processes.
///
/// Stdout is piped to the reader; stderr passes through to the
/// console for compiler/runtime diagnostics.
#[derive(Clone, Copy, Debug, Default)]
pub struct OsSpawner;

impl Spawner for OsSpawner {
    fn spawn(&self, command: &WorkerCommand) -> io::Result<SpawnedProcess> {
        let mut child = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .spawn()?;

        let stdout = child.stdout.take().ok_or_else(|| {
            io::Error::new(io::ErrorKind::BrokenPipe, "worker stdout was not captured")
        })?;

        Ok(SpawnedProcess {
            output: Box::new(ChildOutput {
                reader: BufReader::new(stdout),
            }),
            control: Box::new(ChildControl { child }),
        })
    }
}

struct ChildOutput {
    reader: BufReader<ChildStdout>,
}

impl LineReader for ChildOutput {
    fn next_line(&mut self) -> io::Result<Option<String>> {
        // read_until rather than read_line: `msg:` echo lines may carry
        // arbitrary bytes, which must not abort the stream.
        let mut buf = Vec::new();
        let read = self.reader.read_until(b'\n', &mut buf)?;
        if read == 0 {
            return Ok(None);
        }
        Ok(Some(String::from_utf8_lossy(&buf).trim().to_string()))
    }
}

struct ChildControl {
    child: Child,
}

impl ProcessControl for ChildControl {
    fn terminate(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }

    fn wait(&mut self) -> io::Result<Option<i32>> {
        Ok(self.child.wait()?.code())
    }
}

/// One running worker: its index, its process handle, and its reader
/// thread.
pub struct Worker {
    index: WorkerId,
    control: Box<dyn ProcessControl>,
    reader: Option<JoinHandle<()>>,
}

impl Worker {
    /// Spawns a worker process and its reader thread.
    ///
    /// The reader pushes `Line` items onto `queue` until the stream
    /// closes, then exactly one `Eof` (or `Failed` on a read error) and
    /// exits.
    pub fn spawn(
        spawner: &dyn Spawner,
        command: &WorkerCommand,
        index: WorkerId,
        queue: Sender<QueueItem>,
    ) -> io::Result<Self> {
        let process = spawner.spawn(command)?;
        debug!(index, program = %command.program, "worker spawned");

        let mut output = process.output;
        let reader = std::thread::spawn(move || {
            loop {
                match output.next_line() {
                    Ok(Some(line)) => {
                        if queue.send(QueueItem::Line(index, line)).is_err() {
                            // Consumer is gone; the run was aborted.
                            return;
                        }
                    }
                    Ok(None) => {
                        let _ = queue.send(QueueItem::Eof(index));
                        return;
                    }
                    Err(err) => {
                        let _ = queue.send(QueueItem::Failed(index, err));
                        return;
                    }
                }
            }
        });

        Ok(Self {
            index,
            control: process.control,
            reader: Some(reader),
        })
    }

    /// Returns this worker's index.
    pub fn index(&self) -> WorkerId {
        self.index
    }

    /// Forcibly terminates the worker process.
    pub fn terminate(&mut self) {
        self.control.terminate();
    }

    /// Reaps the worker process and joins its reader thread.
    pub fn shutdown(mut self) -> io::Result<Option<i32>> {
        let status = self.control.wait()?;
        if let Some(reader) = self.reader.take() {
            let _ = reader.join();
        }
        debug!(index = self.index, ?status, "worker finished");
        Ok(status)
    }
}
