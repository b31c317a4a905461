// src/kitchen/runner.rs

//! Process execution for install steps

use crate::error::{Error, Phase, Result, StepFailure};
use crate::overlay::Environment;
use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::debug;
use wait_timeout::ChildExt;

/// How often a running step checks for cancellation
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// How long a killed step's pipes may take to close
const DRAIN_GRACE: Duration = Duration::from_secs(1);

/// One resolved external process invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub phase: Phase,
    pub executable: String,
    pub args: Vec<String>,
}

impl Step {
    /// Command line for logs
    pub fn command_line(&self) -> String {
        let mut line = self.executable.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

/// Captured result of a finished process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// `None` when the process did not exit on its own
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Shared flag used to abort a running cook
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Runs install steps
///
/// Implementations block until the step finishes. A cancelled step must
/// return [`Error::Cancelled`] rather than an output.
pub trait ProcessRunner: Send + Sync {
    fn run(
        &self,
        step: &Step,
        env: &Environment,
        cwd: &Path,
        cancel: &CancelToken,
    ) -> Result<ProcessOutput>;
}

/// Runs steps as child processes of this one
#[derive(Debug, Clone, Default)]
pub struct SystemRunner {
    timeout: Option<Duration>,
}

impl SystemRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }
}

impl ProcessRunner for SystemRunner {
    fn run(
        &self,
        step: &Step,
        env: &Environment,
        cwd: &Path,
        cancel: &CancelToken,
    ) -> Result<ProcessOutput> {
        debug!("Spawning `{}` in {}", step.command_line(), cwd.display());

        let mut child = Command::new(&step.executable)
            .args(&step.args)
            .current_dir(cwd)
            .env_clear()
            .envs(env.iter())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                Error::step_failed(
                    step.phase,
                    StepFailure {
                        executable: step.executable.clone(),
                        exit_code: None,
                        stderr: format!("failed to spawn: {}", e),
                    },
                )
            })?;

        // Drain pipes while waiting so a chatty child cannot block on a full pipe
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let started = Instant::now();
        let status = loop {
            if let Some(status) = child.wait_timeout(POLL_INTERVAL)? {
                break status;
            }
            // Readers are left detached: grandchildren may still hold the pipes
            if cancel.is_cancelled() {
                kill(&mut child);
                return Err(Error::Cancelled {
                    phase: step.phase,
                    executable: step.executable.clone(),
                });
            }
            if let Some(limit) = self.timeout
                && started.elapsed() >= limit
            {
                kill(&mut child);
                let mut stderr = join_within(stderr, DRAIN_GRACE);
                if !stderr.is_empty() && !stderr.ends_with('\n') {
                    stderr.push('\n');
                }
                stderr.push_str(&format!("timed out after {:?}", limit));
                return Ok(ProcessOutput {
                    exit_code: None,
                    stdout: join_within(stdout, DRAIN_GRACE),
                    stderr,
                });
            }
        };

        let stdout = join(stdout);
        let stderr = join(stderr);
        let exit_code = status.code();

        Ok(ProcessOutput {
            exit_code,
            stdout,
            stderr,
        })
    }
}

fn kill(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<String>> {
    pipe.map(|mut pipe| {
        std::thread::spawn(move || {
            let mut buffer = Vec::new();
            let _ = pipe.read_to_end(&mut buffer);
            String::from_utf8_lossy(&buffer).into_owned()
        })
    })
}

fn join(handle: Option<JoinHandle<String>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .unwrap_or_default()
}

/// Join a reader, giving up once `grace` passes
///
/// A grandchild may keep the pipe open after the step itself was
/// killed; its reader is then left detached.
fn join_within(handle: Option<JoinHandle<String>>, grace: Duration) -> String {
    let Some(handle) = handle else {
        return String::new();
    };
    let deadline = Instant::now() + grace;
    while !handle.is_finished() {
        if Instant::now() >= deadline {
            return String::new();
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    handle.join().unwrap_or_default()
}
