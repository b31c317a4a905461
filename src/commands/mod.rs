// src/commands/mod.rs
//! Command handlers for the formulary CLI

mod caveats;
mod cook;
mod deps;
mod fetch;
mod service;
mod validate;
mod verify;

// Re-export all command handlers
pub use caveats::cmd_caveats;
pub use cook::{cmd_cook, CookOptions};
pub use deps::cmd_deps;
pub use fetch::cmd_fetch;
pub use service::cmd_service;
pub use validate::cmd_validate;
pub use verify::cmd_verify;

use anyhow::{Context, Result};
use formulary::formula::{parse_formula_file, Formula};
use std::path::Path;

/// Read a formula file, attaching the path to any error
pub(crate) fn load_formula(path: &Path) -> Result<Formula> {
    parse_formula_file(path)
        .with_context(|| format!("Failed to parse formula: {}", path.display()))
}
