// src/kitchen/config.rs

//! Configuration types for the Kitchen

use crate::formula::host_platform_tag;
use crate::hash::Checksum;
use crate::service::{ServiceFormat, DEFAULT_LABEL_PREFIX};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use super::receipt::InstallReceipt;

/// Default installation root
pub const DEFAULT_ROOT: &str = "/opt/formulary";

/// Configuration for the Kitchen
#[derive(Debug, Clone)]
pub struct KitchenConfig {
    /// Installation root holding `Cellar/`, `opt/`, `etc/` and `var/`
    pub root: PathBuf,
    /// Directory for downloaded sources and bottles
    pub source_cache: PathBuf,
    /// Number of parallel jobs, exported as `MAKEFLAGS=-j<jobs>`
    pub jobs: u32,
    /// Platform tag used to select a bottle
    pub platform_tag: String,
    /// Ignore bottles and always build from source
    pub build_from_source: bool,
    /// Keep build directory after completion (for debugging)
    pub keep_builddir: bool,
    /// Start builds from the whole ambient environment instead of a minimal subset
    pub inherit_env: bool,
    /// Per-step timeout; `None` lets steps run as long as they need
    pub step_timeout: Option<Duration>,
    /// Reverse-DNS prefix for service labels
    pub service_label_prefix: String,
    /// Supervisor format for generated service descriptors
    pub service_format: ServiceFormat,
}

impl Default for KitchenConfig {
    fn default() -> Self {
        let jobs = std::thread::available_parallelism()
            .map(|p| p.get() as u32)
            .unwrap_or(4);

        let source_cache = dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("formulary")
            .join("sources");

        Self {
            root: PathBuf::from(DEFAULT_ROOT),
            source_cache,
            jobs,
            platform_tag: host_platform_tag(),
            build_from_source: false,
            keep_builddir: false,
            inherit_env: false,
            step_timeout: None,
            service_label_prefix: DEFAULT_LABEL_PREFIX.to_string(),
            service_format: ServiceFormat::host(),
        }
    }
}

impl KitchenConfig {
    /// Configuration rooted at `root`, caching sources under `<root>/cache`
    ///
    /// A relative root is resolved against the current directory.
    pub fn rooted(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let root = std::path::absolute(&root).unwrap_or(root);
        Self {
            source_cache: root.join("cache").join("sources"),
            root,
            ..Self::default()
        }
    }
}

/// Where the installed files came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PourSource {
    /// Built from the source archive
    Source,
    /// Poured from the bottle for a platform tag
    Bottle(String),
}

impl fmt::Display for PourSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PourSource::Source => f.write_str("source"),
            PourSource::Bottle(tag) => write!(f, "bottle:{}", tag),
        }
    }
}

/// A fetched and verified payload
#[derive(Debug, Clone)]
pub struct FetchedPayload {
    pub url: String,
    pub checksum: Checksum,
    /// Location in the source cache
    pub path: PathBuf,
}

/// Result of cooking a formula
#[derive(Debug)]
pub struct CookResult {
    pub name: String,
    pub version: String,
    /// Absolute installation prefix (the keg)
    pub prefix: PathBuf,
    pub poured_from: PourSource,
    /// Receipt written into the keg
    pub receipt: InstallReceipt,
    /// Service descriptor written into the keg, if the formula declares one
    pub service_file: Option<PathBuf>,
    /// Rendered caveats, empty when there are none
    pub caveats: String,
    /// Build log
    pub log: String,
    /// Warnings generated during the cook
    pub warnings: Vec<String>,
    /// Build directory, when kept for debugging
    pub build_dir: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kitchen_config_default() {
        let config = KitchenConfig::default();
        assert!(config.jobs > 0);
        assert_eq!(config.root, PathBuf::from("/opt/formulary"));
        assert!(config.source_cache.ends_with("formulary/sources"));
        assert!(!config.build_from_source);
        assert!(!config.keep_builddir);
        assert!(!config.inherit_env);
        assert!(config.step_timeout.is_none());
        assert_eq!(config.service_label_prefix, "org.formulary");
        assert_eq!(config.platform_tag, host_platform_tag());
    }

    #[test]
    fn test_kitchen_config_rooted() {
        let config = KitchenConfig::rooted("/tmp/root");
        assert_eq!(config.root, PathBuf::from("/tmp/root"));
        assert_eq!(config.source_cache, PathBuf::from("/tmp/root/cache/sources"));
    }

    #[test]
    fn test_pour_source_display() {
        assert_eq!(PourSource::Source.to_string(), "source");
        assert_eq!(PourSource::Bottle("catalina".into()).to_string(), "bottle:catalina");
    }
}
