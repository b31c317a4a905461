// src/service/mod.rs

//! Supervised service descriptors
//!
//! A formula that ships a long-running daemon declares a `[service]`
//! section. After a successful install the kitchen turns it into a typed
//! [`ServiceDescriptor`] and hands it to an encoder for the supervisor's
//! native format:
//!
//! - [`LaunchdEncoder`]: XML property list for launchd
//! - [`SystemdEncoder`]: unit file for systemd
//!
//! Generation is a pure function of its inputs. Encoders never read the
//! clock or the environment, so regenerating a descriptor is byte-identical.

mod launchd;
mod systemd;

pub use launchd::LaunchdEncoder;
pub use systemd::SystemdEncoder;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Default reverse-DNS prefix for service labels
pub const DEFAULT_LABEL_PREFIX: &str = "org.formulary";

/// When the supervisor restarts the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KeepAlive {
    /// Restart whenever the process exits
    Always,
    /// Never restart
    Never,
    /// Keep running while network connectivity is up, restart when it changes
    NetworkState,
    /// Restart unless the process exited successfully
    SuccessfulExit,
    /// Restart only after abnormal termination
    Crashed,
}

impl KeepAlive {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeepAlive::Always => "always",
            KeepAlive::Never => "never",
            KeepAlive::NetworkState => "network-state",
            KeepAlive::SuccessfulExit => "successful-exit",
            KeepAlive::Crashed => "crashed",
        }
    }
}

impl fmt::Display for KeepAlive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved filesystem inputs of a service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceInputs {
    /// Absolute path of the installed binary
    pub binary: PathBuf,
    pub config_dir: PathBuf,
    pub log_path: PathBuf,
}

/// Declarative knobs layered over [`ServiceInputs`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceOptions {
    /// Full service label, e.g. `org.formulary.transmission`
    pub label: String,
    pub description: Option<String>,
    /// Arguments after the binary, already resolved
    pub args: Vec<String>,
    /// Network daemons default to [`KeepAlive::NetworkState`] and run at load
    pub daemon: bool,
    pub keep_alive: Option<KeepAlive>,
    pub run_at_load: Option<bool>,
    /// Directories beyond the configuration and log directories
    pub extra_working_paths: Vec<PathBuf>,
}

impl ServiceOptions {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            description: None,
            args: Vec::new(),
            daemon: false,
            keep_alive: None,
            run_at_load: None,
            extra_working_paths: Vec::new(),
        }
    }
}

/// Service label for a formula: `<prefix>.<name>`
pub fn service_label(prefix: &str, name: &str) -> String {
    format!("{}.{}", prefix.trim_end_matches('.'), name)
}

/// A supervisor-agnostic service description
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDescriptor {
    pub label: String,
    pub description: Option<String>,
    /// The absolute binary path followed by its arguments
    pub program_arguments: Vec<String>,
    pub keep_alive: KeepAlive,
    pub run_at_load: bool,
    pub log_path: PathBuf,
    /// Directories that must exist before the service starts, sorted
    pub working_paths: BTreeSet<PathBuf>,
}

impl ServiceDescriptor {
    pub fn program(&self) -> &str {
        self.program_arguments.first().map(String::as_str).unwrap_or("")
    }
}

/// Build a service descriptor
///
/// The binary path must be absolute; it is embedded as given, never
/// rewritten to an unversioned alias.
pub fn generate(inputs: &ServiceInputs, options: &ServiceOptions) -> Result<ServiceDescriptor> {
    if !inputs.binary.is_absolute() {
        return Err(Error::InvalidFormula(format!(
            "service binary must be an absolute path, got {}",
            inputs.binary.display()
        )));
    }
    if options.label.trim().is_empty() {
        return Err(Error::InvalidFormula("service label cannot be empty".to_string()));
    }

    let mut program_arguments = Vec::with_capacity(options.args.len() + 1);
    program_arguments.push(inputs.binary.to_string_lossy().into_owned());
    program_arguments.extend(options.args.iter().cloned());

    let (default_keep_alive, default_run_at_load) = if options.daemon {
        (KeepAlive::NetworkState, true)
    } else {
        (KeepAlive::Never, false)
    };

    let mut working_paths = BTreeSet::new();
    working_paths.insert(inputs.config_dir.clone());
    if let Some(parent) = inputs.log_path.parent()
        && parent != Path::new("")
    {
        working_paths.insert(parent.to_path_buf());
    }
    working_paths.extend(options.extra_working_paths.iter().cloned());

    Ok(ServiceDescriptor {
        label: options.label.clone(),
        description: options.description.clone(),
        program_arguments,
        keep_alive: options.keep_alive.unwrap_or(default_keep_alive),
        run_at_load: options.run_at_load.unwrap_or(default_run_at_load),
        log_path: inputs.log_path.clone(),
        working_paths,
    })
}

/// Serializes a descriptor into one supervisor's file format
pub trait ServiceEncoder {
    /// File extension of the encoded descriptor, without the dot
    fn extension(&self) -> &'static str;

    fn encode(&self, descriptor: &ServiceDescriptor) -> Result<String>;

    /// File name for a descriptor, `<label>.<extension>`
    fn file_name(&self, descriptor: &ServiceDescriptor) -> String {
        format!("{}.{}", descriptor.label, self.extension())
    }
}

/// Supported supervisor formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceFormat {
    Launchd,
    Systemd,
}

impl ServiceFormat {
    /// Native format of the host
    pub fn host() -> Self {
        if cfg!(target_os = "macos") {
            ServiceFormat::Launchd
        } else {
            ServiceFormat::Systemd
        }
    }

    pub fn encoder(&self) -> Box<dyn ServiceEncoder + Send + Sync> {
        match self {
            ServiceFormat::Launchd => Box::new(LaunchdEncoder),
            ServiceFormat::Systemd => Box::new(SystemdEncoder),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceFormat::Launchd => "launchd",
            ServiceFormat::Systemd => "systemd",
        }
    }
}

impl Default for ServiceFormat {
    fn default() -> Self {
        Self::host()
    }
}

impl fmt::Display for ServiceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "launchd" | "plist" => Ok(ServiceFormat::Launchd),
            "systemd" | "service" => Ok(ServiceFormat::Systemd),
            other => Err(format!("unknown service format: {}", other)),
        }
    }
}
