// src/cli/mod.rs
//! CLI definitions for formulary
//!
//! This module contains all command-line interface definitions using clap.
//! The actual command implementations are in the `commands` module.
//!
//! - `cook` - Verify, build (or pour) and install a formula
//! - `fetch` - Download and verify payloads into the source cache
//! - `verify` - Check a local file against a checksum
//! - `validate` - Parse and validate a formula
//! - `deps` - Show a formula's dependency closure
//! - `service` - Print the service descriptor a formula would install
//! - `caveats` - Print a formula's post-install caveats

use clap::{Args, Parser, Subcommand};
use formulary::formula::DependencyScope;
use formulary::kitchen::{KitchenConfig, DEFAULT_ROOT};
use formulary::service::ServiceFormat;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "formulary")]
#[command(author = "Formulary Contributors")]
#[command(version)]
#[command(about = "Verify, build and install software from declarative formulas", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Options shared by every command that touches the installation root
#[derive(Args, Debug, Clone)]
pub struct KitchenArgs {
    /// Installation root
    #[arg(short, long, default_value = DEFAULT_ROOT)]
    pub root: PathBuf,

    /// Directory for cached sources and bottles (default: <root>/cache/sources)
    #[arg(long)]
    pub source_cache: Option<PathBuf>,

    /// Number of parallel build jobs (default: available CPUs)
    #[arg(short, long)]
    pub jobs: Option<u32>,

    /// Platform tag used to pick a bottle (default: host platform)
    #[arg(long)]
    pub platform: Option<String>,

    /// Service descriptor format: launchd or systemd (default: host supervisor)
    #[arg(long, visible_alias = "format")]
    pub service_format: Option<ServiceFormat>,
}

impl KitchenArgs {
    pub fn to_config(&self) -> KitchenConfig {
        let mut config = KitchenConfig::rooted(self.root.clone());
        if let Some(cache) = &self.source_cache {
            config.source_cache = cache.clone();
        }
        if let Some(jobs) = self.jobs {
            config.jobs = jobs;
        }
        if let Some(platform) = &self.platform {
            config.platform_tag = platform.clone();
        }
        if let Some(format) = self.service_format {
            config.service_format = format;
        }
        config
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Cook a formula: verify, build or pour, and install it
    Cook {
        /// Path to the formula file
        formula: PathBuf,

        #[command(flatten)]
        kitchen: KitchenArgs,

        /// Ignore bottles and always build from source
        #[arg(short = 's', long)]
        build_from_source: bool,

        /// Start build steps from the full ambient environment
        #[arg(long)]
        inherit_env: bool,

        /// Abort any single step after this many seconds
        #[arg(long, value_name = "SECONDS")]
        step_timeout: Option<u64>,

        /// Keep the build directory after completion (for debugging)
        #[arg(long)]
        keep_builddir: bool,

        /// Print the captured build log after a successful install
        #[arg(short, long)]
        verbose: bool,
    },

    /// Fetch and verify a formula's source and matching bottle
    Fetch {
        /// Path to the formula file
        formula: PathBuf,

        #[command(flatten)]
        kitchen: KitchenArgs,
    },

    /// Verify a local file against a checksum
    Verify {
        /// File to check
        file: PathBuf,

        /// Expected checksum, e.g. sha256:<hex>
        checksum: String,
    },

    /// Parse and validate a formula without cooking it
    Validate {
        /// Path to the formula file
        formula: PathBuf,
    },

    /// Show a formula's dependencies
    Deps {
        /// Path to the formula file
        formula: PathBuf,

        /// Only show build or runtime dependencies
        #[arg(long)]
        scope: Option<DependencyScope>,
    },

    /// Print the service descriptor a formula would install
    Service {
        /// Path to the formula file
        formula: PathBuf,

        #[command(flatten)]
        kitchen: KitchenArgs,
    },

    /// Print a formula's post-install caveats
    Caveats {
        /// Path to the formula file
        formula: PathBuf,

        #[command(flatten)]
        kitchen: KitchenArgs,
    },
}

/// Seconds from the command line, where zero means no timeout
pub fn step_timeout(seconds: Option<u64>) -> Option<Duration> {
    seconds.filter(|s| *s > 0).map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cook_options() {
        let cli = Cli::try_parse_from([
            "formulary",
            "cook",
            "transmission.toml",
            "--root",
            "/tmp/root",
            "--jobs",
            "2",
            "--service-format",
            "systemd",
            "-s",
        ])
        .unwrap();

        match cli.command {
            Some(Commands::Cook {
                formula,
                kitchen,
                build_from_source,
                ..
            }) => {
                assert_eq!(formula, PathBuf::from("transmission.toml"));
                assert!(build_from_source);
                let config = kitchen.to_config();
                assert_eq!(config.root, PathBuf::from("/tmp/root"));
                assert_eq!(config.source_cache, PathBuf::from("/tmp/root/cache/sources"));
                assert_eq!(config.jobs, 2);
                assert_eq!(config.service_format, ServiceFormat::Systemd);
            }
            _ => panic!("expected cook"),
        }
    }

    #[test]
    fn test_step_timeout_zero_disables() {
        assert_eq!(step_timeout(Some(0)), None);
        assert_eq!(step_timeout(Some(30)), Some(Duration::from_secs(30)));
        assert_eq!(step_timeout(None), None);
    }
}
