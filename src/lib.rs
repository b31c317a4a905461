// src/lib.rs

//! Formulary
//!
//! Declarative package formulas: fetch and verify third-party software,
//! build it from source or pour a prebuilt bottle, install it into a
//! versioned keg, and describe how a supervisor should run it.
//!
//! # Architecture
//!
//! - Formulas: TOML descriptions, parsed once and never mutated
//! - Kitchen: runs the verify, configure, build and install procedure
//! - Overlay: build environments are derived maps, never the process env
//! - Services: launchd property lists or systemd units from one descriptor
//! - Caveats: deterministic post-install guidance

pub mod caveats;
mod error;
pub mod formula;
pub mod hash;
pub mod kitchen;
pub mod overlay;
pub mod paths;
pub mod service;

pub use error::{Error, Phase, Result, StepFailure};
pub use formula::{parse_formula, parse_formula_file, validate_formula, Formula};
pub use hash::{Checksum, Hash, HashAlgorithm, Hasher};
pub use kitchen::{CookResult, InstallState, Kitchen, KitchenConfig};
pub use overlay::{Environment, EnvironmentMutation};
pub use paths::InstallPaths;
pub use service::{ServiceDescriptor, ServiceFormat};
