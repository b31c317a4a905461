// src/commands/validate.rs

//! Validate command - parse and check a formula

use anyhow::{Context, Result};
use formulary::formula::validate_formula;
use std::path::Path;

use super::load_formula;

pub fn cmd_validate(formula_path: &Path) -> Result<()> {
    let formula = load_formula(formula_path)?;
    let version = formula.version().context("Formula has no usable version")?;
    println!("Formula: {} version {}", formula.name(), version);

    let warnings = validate_formula(&formula).with_context(|| "Formula validation failed")?;
    for warning in &warnings {
        println!("Warning: {}", warning);
    }

    println!("Formula validation passed");
    if warnings.is_empty() {
        println!("[OK] No issues found");
    } else {
        println!("[OK] {} warning(s)", warnings.len());
    }
    Ok(())
}
