// src/commands/cook.rs

//! Cook command - verify, build and install a formula

use anyhow::{Context, Result};
use formulary::kitchen::{Kitchen, KitchenConfig, PourSource};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use super::load_formula;

/// Per-run switches on top of the shared kitchen options
#[derive(Debug, Clone, Default)]
pub struct CookOptions {
    pub build_from_source: bool,
    pub inherit_env: bool,
    pub step_timeout: Option<Duration>,
    pub keep_builddir: bool,
    pub verbose: bool,
}

/// Cook a formula into the installation root
pub fn cmd_cook(formula_path: &Path, config: KitchenConfig, options: CookOptions) -> Result<()> {
    println!("Reading formula: {}", formula_path.display());
    let formula = load_formula(formula_path)?;
    let version = formula.version().context("Formula has no usable version")?;
    println!("Formula: {} version {}", formula.name(), version);

    let config = KitchenConfig {
        build_from_source: options.build_from_source,
        inherit_env: options.inherit_env,
        step_timeout: options.step_timeout,
        keep_builddir: options.keep_builddir,
        ..config
    };

    let kitchen = Kitchen::new(config).context("Failed to set up the kitchen")?;
    let config = kitchen.config();

    println!("Cooking with {} parallel jobs...", config.jobs);
    println!("  - Root: {}", config.root.display());
    println!("  - Platform: {}", config.platform_tag);
    if config.build_from_source {
        println!("  - Bottles ignored (building from source)");
    }
    if kitchen.sources_cached(&formula) {
        println!("  - Sources already cached");
    }

    let mut cook = kitchen
        .prepare(&formula)
        .with_context(|| format!("Failed to prepare {}", formula.name()))?;

    let result = match cook.run() {
        Ok(result) => result,
        Err(e) => {
            println!("\n[FAILED] {} ({})", formula.name(), cook.state());
            if !cook.log().is_empty() {
                println!("\nBuild log:\n{}", cook.log());
            }
            return Err(e).with_context(|| format!("Failed to cook {}", formula.name()));
        }
    };

    if options.verbose && !result.log.is_empty() {
        println!("\nBuild log:\n{}", result.log);
    }

    println!(
        "\n[COMPLETE] Installed {} {} into {}",
        result.name,
        result.version,
        result.prefix.display()
    );
    match &result.poured_from {
        PourSource::Bottle(tag) => println!("  - Poured from bottle ({})", tag),
        PourSource::Source => println!("  - Built from source"),
    }
    if let Some(service_file) = &result.service_file {
        println!("  - Service descriptor: {}", service_file.display());
    }
    if let Some(build_dir) = &result.build_dir {
        println!("  - Build directory kept at {}", build_dir.display());
    }

    if !result.warnings.is_empty() {
        println!("\nFormula warnings:");
        for warning in &result.warnings {
            println!("  - {}", warning);
        }
    }

    if !result.caveats.is_empty() {
        println!("\n==> Caveats\n{}", result.caveats);
    }

    info!(
        "Successfully cooked {} into {}",
        result.name,
        result.prefix.display()
    );

    Ok(())
}
