// src/main.rs

use anyhow::Result;
use clap::Parser;
use tracing::debug;

mod cli;
mod commands;

use cli::{Cli, Commands};
use commands::CookOptions;

fn main() -> Result<()> {
    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Cook {
            formula,
            kitchen,
            build_from_source,
            inherit_env,
            step_timeout,
            keep_builddir,
            verbose,
        }) => {
            let options = CookOptions {
                build_from_source,
                inherit_env,
                step_timeout: cli::step_timeout(step_timeout),
                keep_builddir,
                verbose,
            };
            debug!("Cook options: {:?}", options);
            commands::cmd_cook(&formula, kitchen.to_config(), options)
        }
        Some(Commands::Fetch { formula, kitchen }) => {
            commands::cmd_fetch(&formula, kitchen.to_config())
        }
        Some(Commands::Verify { file, checksum }) => commands::cmd_verify(&file, &checksum),
        Some(Commands::Validate { formula }) => commands::cmd_validate(&formula),
        Some(Commands::Deps { formula, scope }) => commands::cmd_deps(&formula, scope),
        Some(Commands::Service { formula, kitchen }) => {
            commands::cmd_service(&formula, kitchen.to_config())
        }
        Some(Commands::Caveats { formula, kitchen }) => {
            commands::cmd_caveats(&formula, kitchen.to_config())
        }
        None => {
            // No command provided, show help
            println!("formulary v{}", env!("CARGO_PKG_VERSION"));
            println!("Run 'formulary --help' for usage information");
            Ok(())
        }
    }
}
