// src/commands/caveats.rs

//! Caveats command - print post-install guidance

use anyhow::{Context, Result};
use formulary::kitchen::{Kitchen, KitchenConfig};
use std::path::Path;

use super::load_formula;

pub fn cmd_caveats(formula_path: &Path, config: KitchenConfig) -> Result<()> {
    let formula = load_formula(formula_path)?;
    let kitchen = Kitchen::new(config).context("Failed to set up the kitchen")?;

    let caveats = kitchen
        .caveats(&formula)
        .with_context(|| format!("Failed to render caveats for {}", formula.name()))?;

    if caveats.is_empty() {
        println!("{} has no caveats", formula.name());
    } else {
        print!("{}", caveats);
    }
    Ok(())
}
