// src/kitchen/state.rs

//! Install state machine
//!
//! ```text
//! Unverified -> Verified -> Configured -> Built -> Installed
//!                  \_________________________________/   (bottle)
//! any -> Failed
//! ```

use crate::error::{Error, Result};
use std::fmt;

/// Why a cook ended in [`InstallState::Failed`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Integrity,
    Network,
    Configure,
    Build,
    Install,
    Cancelled,
    DependencyUnavailable,
    Other,
}

impl FailureKind {
    pub fn of(error: &Error) -> Self {
        match error {
            Error::Integrity { .. } => FailureKind::Integrity,
            Error::Network { .. } => FailureKind::Network,
            Error::Configure(_) => FailureKind::Configure,
            Error::Build(_) => FailureKind::Build,
            Error::Install(_) => FailureKind::Install,
            Error::Cancelled { .. } => FailureKind::Cancelled,
            Error::DependencyUnavailable(_) => FailureKind::DependencyUnavailable,
            _ => FailureKind::Other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallState {
    Unverified,
    Verified,
    Configured,
    Built,
    Installed,
    Failed(FailureKind),
}

impl InstallState {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstallState::Unverified => "unverified",
            InstallState::Verified => "verified",
            InstallState::Configured => "configured",
            InstallState::Built => "built",
            InstallState::Installed => "installed",
            InstallState::Failed(_) => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, InstallState::Installed | InstallState::Failed(_))
    }

    fn allows(&self, next: &InstallState) -> bool {
        use InstallState::*;
        matches!(
            (self, next),
            (Unverified, Verified)
                | (Verified, Configured)
                | (Verified, Installed)
                | (Configured, Built)
                | (Built, Installed)
        )
    }
}

impl fmt::Display for InstallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tracks the state of one cook and every state it passed through
#[derive(Debug, Clone)]
pub struct InstallMachine {
    state: InstallState,
    history: Vec<InstallState>,
}

impl Default for InstallMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl InstallMachine {
    pub fn new() -> Self {
        Self {
            state: InstallState::Unverified,
            history: vec![InstallState::Unverified],
        }
    }

    pub fn state(&self) -> InstallState {
        self.state
    }

    pub fn history(&self) -> &[InstallState] {
        &self.history
    }

    /// Move to `next`, rejecting transitions the machine does not allow
    pub fn advance(&mut self, next: InstallState) -> Result<()> {
        if matches!(next, InstallState::Failed(_)) || !self.state.allows(&next) {
            return Err(Error::InvalidTransition {
                from: self.state.to_string(),
                to: next.to_string(),
            });
        }
        self.set(next);
        Ok(())
    }

    /// Record a failure; the first failure wins
    pub fn fail(&mut self, error: &Error) {
        if matches!(self.state, InstallState::Failed(_)) {
            return;
        }
        self.set(InstallState::Failed(FailureKind::of(error)));
    }

    fn set(&mut self, next: InstallState) {
        self.state = next;
        self.history.push(next);
    }
}
