// src/error.rs

//! Error types for formula execution

use std::fmt;
use std::io;
use thiserror::Error;

/// Result alias used throughout the library
pub type Result<T> = std::result::Result<T, Error>;

/// Phase of the build and install procedure a step belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Configure,
    Build,
    Install,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Configure => "configure",
            Phase::Build => "build",
            Phase::Install => "install",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Details of a step that exited unsuccessfully
///
/// `stderr` is the complete captured stream, never truncated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepFailure {
    /// Executable that was invoked
    pub executable: String,
    /// Exit code, `None` when the process was killed by a signal
    pub exit_code: Option<i32>,
    /// Captured standard error
    pub stderr: String,
}

impl fmt::Display for StepFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.exit_code {
            Some(code) => write!(f, "`{}` exited with code {}", self.executable, code)?,
            None => write!(f, "`{}` was terminated by a signal", self.executable)?,
        }
        if !self.stderr.is_empty() {
            write!(f, "\n{}", self.stderr)?;
        }
        Ok(())
    }
}

#[derive(Error, Debug)]
pub enum Error {
    /// Fetched payload digest does not match the declared checksum
    #[error("integrity check failed for {url}: expected {expected}, got {actual}")]
    Integrity {
        url: String,
        expected: String,
        actual: String,
    },

    /// Fetching a payload failed
    #[error("failed to fetch {url}: {message}")]
    Network { url: String, message: String },

    #[error("configure step failed: {0}")]
    Configure(StepFailure),

    #[error("build step failed: {0}")]
    Build(StepFailure),

    #[error("install step failed: {0}")]
    Install(StepFailure),

    /// A step was aborted by an external cancellation signal
    #[error("{phase} step `{executable}` was cancelled")]
    Cancelled { phase: Phase, executable: String },

    /// Reported by a dependency resolver before the procedure starts
    #[error("dependencies unavailable: {}", .0.join(", "))]
    DependencyUnavailable(Vec<String>),

    #[error("invalid formula: {0}")]
    InvalidFormula(String),

    /// Kitchen settings that cannot produce a valid installation
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("failed to unpack {archive}: {message}")]
    Unpack { archive: String, message: String },

    #[error("failed to encode service descriptor: {0}")]
    Encode(String),

    /// The state machine was asked to make a transition it does not allow
    #[error("invalid state transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Build the step error matching a procedure phase
    pub fn step_failed(phase: Phase, failure: StepFailure) -> Self {
        match phase {
            Phase::Configure => Error::Configure(failure),
            Phase::Build => Error::Build(failure),
            Phase::Install => Error::Install(failure),
        }
    }

    /// Captured stderr of the failing step, if this is a step failure
    pub fn stderr(&self) -> Option<&str> {
        match self {
            Error::Configure(f) | Error::Build(f) | Error::Install(f) => Some(&f.stderr),
            _ => None,
        }
    }

    pub fn is_integrity(&self) -> bool {
        matches!(self, Error::Integrity { .. })
    }
}
