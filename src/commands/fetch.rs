// src/commands/fetch.rs

//! Fetch command - download and verify payloads without building

use anyhow::{Context, Result};
use formulary::kitchen::{Kitchen, KitchenConfig};
use std::path::Path;

use super::load_formula;

pub fn cmd_fetch(formula_path: &Path, config: KitchenConfig) -> Result<()> {
    let formula = load_formula(formula_path)?;
    let kitchen = Kitchen::new(config).context("Failed to set up the kitchen")?;

    println!("Fetching payloads for {}...", formula.name());
    let payloads = kitchen
        .fetch(&formula)
        .with_context(|| format!("Failed to fetch payloads for {}", formula.name()))?;

    println!("\n[COMPLETE] Fetched {} payload(s):", payloads.len());
    for payload in &payloads {
        println!("  - {}", payload.url);
        println!("    {} -> {}", payload.checksum, payload.path.display());
    }

    if kitchen.sources_cached(&formula) {
        println!("\n[OK] Source is cached. Ready for offline build.");
    }

    Ok(())
}
