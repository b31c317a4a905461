// src/commands/deps.rs

//! Deps command - show declared dependencies

use anyhow::{Context, Result};
use formulary::formula::{DependencyScope, DependencySet};
use std::path::Path;

use super::load_formula;

pub fn cmd_deps(formula_path: &Path, scope: Option<DependencyScope>) -> Result<()> {
    let formula = load_formula(formula_path)?;
    let deps = DependencySet::new(formula.dependencies.clone())
        .with_context(|| format!("Invalid dependencies in {}", formula.name()))?;

    if deps.is_empty() {
        println!("{} has no dependencies", formula.name());
        return Ok(());
    }

    match scope {
        Some(scope) => {
            for name in deps.with_scope(scope) {
                println!("{}", name);
            }
        }
        None => {
            for dep in deps.iter() {
                println!("{} ({})", dep.name, dep.scope);
            }
        }
    }
    Ok(())
}
