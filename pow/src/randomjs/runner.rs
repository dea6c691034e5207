//! Program execution
//!
//! The interpreter is an external collaborator. [`ProcessInterpreter`] runs
//! a child process fed with the program text on stdin; any other engine can
//! be plugged in through the [`Interpreter`] trait. A program that crashes or
//! runs past the timeout yields an unsuccessful report, never an error.

use std::io::{self, Read, Write};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::randomjs::blake2b::Key;
use crate::randomjs::error::RunnerError;
use crate::randomjs::metrics::ComplexityMetrics;
use crate::randomjs::program::Program;

/// Default interpreter command
pub const DEFAULT_INTERPRETER: &str = "node";

/// Default wall-clock limit per program
pub const DEFAULT_TIMEOUT_MS: u64 = 5_000;

/// Interval between exit polls of a child process
const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Raw outcome reported by an interpreter
#[derive(Debug, Clone, PartialEq)]
pub struct Execution {
    pub success: bool,
    /// Program output on success, diagnostic otherwise
    pub output: String,
    pub elapsed: Duration,
    /// Metrics measured by the interpreter, if it reports any
    pub metrics: Option<ComplexityMetrics>,
}

impl Execution {
    pub fn success(output: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            success: true,
            output: output.into(),
            elapsed,
            metrics: None,
        }
    }

    pub fn failure(diagnostic: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            success: false,
            output: diagnostic.into(),
            elapsed,
            metrics: None,
        }
    }
}

/// Executes program text
pub trait Interpreter {
    fn execute(&mut self, source: &str) -> Result<Execution, RunnerError>;
}

impl<F> Interpreter for F
where
    F: FnMut(&str) -> Result<Execution, RunnerError>,
{
    fn execute(&mut self, source: &str) -> Result<Execution, RunnerError> {
        self(source)
    }
}

/// Child-process interpreter settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    pub command: String,
    pub args: Vec<String>,
    pub timeout_ms: u64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            command: DEFAULT_INTERPRETER.to_string(),
            args: Vec::new(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

impl RunnerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Runs each program in a fresh child process
#[derive(Debug, Clone, Default)]
pub struct ProcessInterpreter {
    config: RunnerConfig,
}

fn read_all<R: Read>(pipe: Option<R>) -> io::Result<Vec<u8>> {
    let mut bytes = Vec::new();
    if let Some(mut pipe) = pipe {
        pipe.read_to_end(&mut bytes)?;
    }
    Ok(bytes)
}

fn kill_and_reap(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

/// Poll `child` until it exits or `deadline` passes; `None` on timeout.
/// The child is killed and reaped on timeout and on error.
fn wait_until(child: &mut Child, deadline: Instant) -> io::Result<Option<ExitStatus>> {
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(Some(status)),
            Ok(None) if Instant::now() >= deadline => {
                kill_and_reap(child);
                return Ok(None);
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(err) => {
                kill_and_reap(child);
                return Err(err);
            }
        }
    }
}

impl ProcessInterpreter {
    /// Interpreter spawning `config.command` once per program
    pub fn new(config: RunnerConfig) -> Self {
        Self { config }
    }

    /// Command, arguments and timeout in use
    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }
}

impl Interpreter for ProcessInterpreter {
    fn execute(&mut self, source: &str) -> Result<Execution, RunnerError> {
        let start = Instant::now();
        let mut child = Command::new(&self.config.command)
            .args(&self.config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| RunnerError::Spawn {
                command: self.config.command.clone(),
                source,
            })?;

        // Drain pipes concurrently; a full pipe stalls the child
        let stdin = child.stdin.take();
        let text = source.to_owned();
        let writer = thread::spawn(move || {
            if let Some(mut stdin) = stdin {
                let _ = stdin.write_all(text.as_bytes());
            }
        });
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let out_reader = thread::spawn(move || read_all(stdout));
        let err_reader = thread::spawn(move || read_all(stderr));

        let status = wait_until(&mut child, start + self.config.timeout());
        let elapsed = start.elapsed();

        // Pipes are closed once the child is gone, so the threads finish
        let _ = writer.join();
        let stdout = out_reader
            .join()
            .unwrap_or_else(|_| Err(io::Error::other("stdout reader panicked")));
        let stderr = err_reader.join().ok().and_then(Result::ok).unwrap_or_default();
        let stderr = String::from_utf8_lossy(&stderr);
        let status = status?;

        let execution = match status {
            None => Execution::failure(
                format!("timeout after {} ms", self.config.timeout_ms),
                elapsed,
            ),
            Some(status) if status.success() => match String::from_utf8(stdout?) {
                Ok(text) => Execution::success(text.trim_end_matches(['\r', '\n']), elapsed),
                Err(_) => Execution::failure("interpreter output is not valid UTF-8", elapsed),
            },
            Some(status) => {
                let diagnostic = stderr.trim();
                if diagnostic.is_empty() {
                    Execution::failure(format!("interpreter exited with {}", status), elapsed)
                } else {
                    Execution::failure(diagnostic, elapsed)
                }
            }
        };
        Ok(execution)
    }
}

/// Normalized outcome of one program run
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeReport {
    pub success: bool,
    pub output: String,
    pub elapsed: Duration,
    pub cyclomatic_complexity: u32,
    pub halstead_difficulty: f64,
    pub key: Key,
}

/// Feeds programs to an interpreter through a reusable buffer
pub struct ProgramRunner<I> {
    interpreter: I,
    buffer: Vec<u8>,
    metrics: ComplexityMetrics,
    key: Key,
}

impl<I: Interpreter> ProgramRunner<I> {
    pub fn new(interpreter: I) -> Self {
        Self {
            interpreter,
            buffer: Vec::new(),
            metrics: ComplexityMetrics::default(),
            key: Key([0; 32]),
        }
    }

    /// Copy `program` into the buffer, replacing the previous one
    pub fn write_program(&mut self, program: &Program) {
        self.buffer.clear();
        self.buffer.extend_from_slice(program.bytes());
        self.metrics = program.metrics();
        self.key = *program.key();
    }

    /// Bytes of the loaded program
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    /// Length in bytes of the loaded program
    pub fn program_length(&self) -> usize {
        self.buffer.len()
    }

    /// Run the loaded program
    pub fn execute(&mut self) -> Result<RuntimeReport, RunnerError> {
        let source = core::str::from_utf8(&self.buffer).map_err(|_| RunnerError::Encoding)?;
        let execution = self.interpreter.execute(source)?;
        let metrics = execution.metrics.unwrap_or(self.metrics);
        if !execution.success {
            debug!(key = %self.key, output = %execution.output, "program failed");
        }
        Ok(RuntimeReport {
            success: execution.success,
            output: execution.output,
            elapsed: execution.elapsed,
            cyclomatic_complexity: metrics.cyclomatic,
            halstead_difficulty: metrics.halstead_difficulty,
            key: self.key,
        })
    }

    /// Load and run `program`
    pub fn run(&mut self, program: &Program) -> Result<RuntimeReport, RunnerError> {
        self.write_program(program);
        self.execute()
    }
}
