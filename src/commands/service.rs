// src/commands/service.rs

//! Service command - print the generated service descriptor

use anyhow::{Context, Result};
use formulary::kitchen::{Kitchen, KitchenConfig};
use std::path::Path;

use super::load_formula;

pub fn cmd_service(formula_path: &Path, config: KitchenConfig) -> Result<()> {
    let formula = load_formula(formula_path)?;
    let encoder = config.service_format.encoder();
    let kitchen = Kitchen::new(config).context("Failed to set up the kitchen")?;

    let descriptor = kitchen
        .service_descriptor(&formula)
        .with_context(|| format!("Failed to generate service for {}", formula.name()))?;

    match descriptor {
        Some(descriptor) => {
            let rendered = encoder
                .encode(&descriptor)
                .with_context(|| format!("Failed to encode {}", encoder.file_name(&descriptor)))?;
            print!("{}", rendered);
        }
        None => println!("{} does not define a service", formula.name()),
    }
    Ok(())
}
