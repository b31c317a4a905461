// src/kitchen/mod.rs

//! Kitchen: where formulas are cooked
//!
//! The Kitchen turns a parsed formula into an installed keg. It handles:
//! - Fetching and verifying the source archive or a matching bottle
//! - Unpacking sources into a scratch build directory
//! - Running configure, build and install steps with the build environment
//! - Creating declared directories and writing the install receipt
//! - Generating the service descriptor and rendering caveats
//!
//! Collaborators sit behind traits so the procedure can run against stubs:
//! [`Fetcher`] for payloads, [`ProcessRunner`] for steps, [`Filesystem`]
//! for the installed tree and [`DependencyResolver`] for availability checks.

mod archive;
mod config;
mod cook;
mod fetch;
mod fs;
mod receipt;
mod runner;
mod state;

pub use archive::{pour_bottle, unpack_source, ArchiveKind};
pub use config::{CookResult, FetchedPayload, KitchenConfig, PourSource, DEFAULT_ROOT};
pub use cook::{Cook, SOURCE_DATE_EPOCH};
pub use fetch::{Fetcher, HttpFetcher, SourceCache};
pub use fs::{Filesystem, LocalFilesystem};
pub use receipt::{InstallReceipt, ReceiptSource, RECEIPT_FILE};
pub use runner::{CancelToken, ProcessOutput, ProcessRunner, Step, SystemRunner};
pub use state::{FailureKind, InstallMachine, InstallState};

use crate::caveats::{self, CaveatInputs};
use crate::error::{Error, Result};
use crate::formula::{
    validate_formula, ArtifactDescriptor, DependencyResolver, DependencySet, Formula, Payload,
};
use crate::hash::verify_bytes;
use crate::paths::InstallPaths;
use crate::service::{generate, service_label, ServiceDescriptor, ServiceInputs, ServiceOptions};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// The Kitchen: where formulas are cooked
pub struct Kitchen {
    pub(crate) config: KitchenConfig,
    fetcher: Arc<dyn Fetcher>,
    runner: Arc<dyn ProcessRunner>,
    filesystem: Arc<dyn Filesystem>,
    /// Optional availability check for dependencies
    resolver: Option<Arc<dyn DependencyResolver>>,
    cache: SourceCache,
    cancel: CancelToken,
}

impl Kitchen {
    /// Create a Kitchen backed by HTTP, child processes and the local disk
    pub fn new(config: KitchenConfig) -> Result<Self> {
        let fetcher = Arc::new(HttpFetcher::new()?);
        let runner = Arc::new(SystemRunner::with_timeout(config.step_timeout));
        Ok(Self::with_collaborators(
            config,
            fetcher,
            runner,
            Arc::new(LocalFilesystem),
        ))
    }

    /// Create a Kitchen with explicit collaborators
    pub fn with_collaborators(
        config: KitchenConfig,
        fetcher: Arc<dyn Fetcher>,
        runner: Arc<dyn ProcessRunner>,
        filesystem: Arc<dyn Filesystem>,
    ) -> Self {
        let cache = SourceCache::new(config.source_cache.clone());
        Self {
            config,
            fetcher,
            runner,
            filesystem,
            resolver: None,
            cache,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn DependencyResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Use a caller-owned cancellation token
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token that aborts running and future cooks of this kitchen
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &KitchenConfig {
        &self.config
    }

    /// Validate a formula, check its dependencies and set up a cook
    ///
    /// Fails before any state transition when the formula is invalid, the
    /// root is relative, the service descriptor cannot be generated or the
    /// resolver reports missing dependencies.
    pub fn prepare<'a>(&'a self, formula: &'a Formula) -> Result<Cook<'a>> {
        if !self.config.root.is_absolute() {
            return Err(Error::Config(format!(
                "installation root {} is not absolute",
                self.config.root.display()
            )));
        }
        let warnings = validate_formula(formula)?;
        let dependencies = DependencySet::new(formula.dependencies.clone())?;

        if let Some(resolver) = &self.resolver {
            let needed = dependencies.build_closure();
            debug!("Checking dependencies: {}", needed.join(", "));
            let missing = resolver.check_missing(&needed)?;
            if !missing.is_empty() {
                return Err(Error::DependencyUnavailable(missing));
            }
        }

        Cook::new(self, formula, dependencies, warnings)
    }

    /// Cook a formula into an installed keg
    ///
    /// This is the main entry point for installing.
    ///
    /// ## Cooking Process
    /// 1. **Verify**: fetch the bottle for this platform (unless building
    ///    from source) or the source archive, and check its checksum
    /// 2. **Unpack**: extract sources into a scratch directory
    /// 3. **Configure / Build / Install**: run each phase's steps in order
    ///    with the build environment; the first failure stops everything
    /// 4. **Finish**: create directories, write the receipt and the
    ///    service descriptor, render caveats
    ///
    /// A bottle skips steps 2 and 3 and is poured into the prefix instead.
    pub fn cook(&self, formula: &Formula) -> Result<CookResult> {
        info!("Cooking {}", formula.name());
        let mut cook = self.prepare(formula)?;
        cook.run()
    }

    /// Fetch and verify payloads for a formula without building
    ///
    /// Fetches the source archive and, unless building from source, the
    /// bottle matching the configured platform. Useful for warming the
    /// source cache before an offline cook.
    pub fn fetch(&self, formula: &Formula) -> Result<Vec<FetchedPayload>> {
        let artifact = ArtifactDescriptor::from_formula(formula)?;
        info!("Fetching sources for {} version {}", artifact.name, artifact.version);

        let mut payloads = vec![artifact.source.clone()];
        if !self.config.build_from_source
            && let Some(prebuilt) = artifact.prebuilt_for(&self.config.platform_tag)
        {
            payloads.push(prebuilt.payload.clone());
        }

        let mut fetched = Vec::with_capacity(payloads.len());
        for payload in payloads {
            self.fetch_verified(&payload)?;
            fetched.push(FetchedPayload {
                path: self.cache.path_for(&payload.checksum),
                url: payload.url,
                checksum: payload.checksum,
            });
        }

        info!("Fetched {} payload(s) for {}", fetched.len(), artifact.name);
        Ok(fetched)
    }

    /// Check if the source archive is already cached
    pub fn sources_cached(&self, formula: &Formula) -> bool {
        self.cache.contains(&formula.source.checksum)
    }

    /// Resolved layout for a formula under this kitchen's root
    pub fn install_paths(&self, formula: &Formula) -> Result<InstallPaths> {
        Ok(InstallPaths::new(&self.config.root, formula.name(), &formula.version()?))
    }

    /// Service descriptor a cook of this formula would write
    pub fn service_descriptor(&self, formula: &Formula) -> Result<Option<ServiceDescriptor>> {
        let paths = self.install_paths(formula)?;
        self.descriptor_for(formula, &paths)
    }

    /// Caveats a cook of this formula would print
    pub fn caveats(&self, formula: &Formula) -> Result<String> {
        let paths = self.install_paths(formula)?;
        self.caveats_for(formula, &paths)
    }

    /// Payload bytes that match their checksum, from cache or fetcher
    pub(crate) fn fetch_verified(&self, payload: &Payload) -> Result<Vec<u8>> {
        if let Some(data) = self.cache.get(&payload.checksum)? {
            return Ok(data);
        }

        info!("Downloading: {}", payload.url);
        let data = self.fetcher.fetch(&payload.url)?;

        if let Err(mismatch) = verify_bytes(&data, &payload.checksum) {
            return Err(Error::Integrity {
                url: payload.url.clone(),
                expected: payload.checksum.to_string(),
                actual: format!("{}:{}", mismatch.algorithm, mismatch.actual),
            });
        }

        self.cache.put(&payload.checksum, &data)?;
        Ok(data)
    }

    pub(crate) fn descriptor_for(
        &self,
        formula: &Formula,
        paths: &InstallPaths,
    ) -> Result<Option<ServiceDescriptor>> {
        let Some(service) = &formula.service else {
            return Ok(None);
        };

        let vars = paths.variables();
        let config_dir = formula.substitute(&service.config_dir, &vars)?;
        let log_path = formula.substitute(&service.log_path, &vars)?;
        let binary = formula.substitute(&service.program, &vars)?;

        let mut service_vars = vars.clone();
        service_vars.insert("config_dir".to_string(), config_dir.clone());
        service_vars.insert("log_path".to_string(), log_path.clone());

        let mut options = ServiceOptions::new(service_label(
            &self.config.service_label_prefix,
            formula.name(),
        ));
        options.description = formula.formula.description.clone();
        options.args = service
            .args
            .iter()
            .map(|arg| formula.substitute(arg, &service_vars))
            .collect::<Result<Vec<_>>>()?;
        options.daemon = service.daemon;
        options.keep_alive = service.keep_alive;
        options.run_at_load = service.run_at_load;
        options.extra_working_paths = service
            .working_paths
            .iter()
            .map(|p| formula.substitute(p, &vars).map(PathBuf::from))
            .collect::<Result<Vec<_>>>()?;

        let inputs = ServiceInputs {
            binary: PathBuf::from(binary),
            config_dir: PathBuf::from(config_dir),
            log_path: PathBuf::from(log_path),
        };
        generate(&inputs, &options).map(Some)
    }

    pub(crate) fn caveats_for(&self, formula: &Formula, paths: &InstallPaths) -> Result<String> {
        let vars = paths.variables();
        let section = formula.caveats.clone().unwrap_or_default();

        let inputs = CaveatInputs {
            name: formula.name().to_string(),
            service_settings: section
                .service_settings
                .as_deref()
                .map(|s| formula.substitute(s, &vars).map(PathBuf::from))
                .transpose()?,
            config_env: section.config_env,
            fallback: section.fallback,
            settings_file: section.settings_file,
            notes: section
                .notes
                .iter()
                .map(|n| formula.substitute(n, &vars))
                .collect::<Result<Vec<_>>>()?,
            manual: formula.service.as_ref().and_then(|s| s.manual.clone()),
        };

        Ok(caveats::render(&inputs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formula::parse_formula;
    use crate::service::KeepAlive;
    use std::path::Path;

    struct NoFetch;

    impl Fetcher for NoFetch {
        fn fetch(&self, url: &str) -> Result<Vec<u8>> {
            Err(Error::Network {
                url: url.to_string(),
                message: "offline".to_string(),
            })
        }
    }

    struct NoRun;

    impl ProcessRunner for NoRun {
        fn run(&self, step: &Step, _: &crate::overlay::Environment, _: &Path, _: &CancelToken) -> Result<ProcessOutput> {
            panic!("unexpected step {}", step.executable)
        }
    }

    struct Missing(Vec<&'static str>);

    impl DependencyResolver for Missing {
        fn check_missing(&self, deps: &[&str]) -> Result<Vec<String>> {
            Ok(deps
                .iter()
                .filter(|d| self.0.contains(d))
                .map(|d| d.to_string())
                .collect())
        }
    }

    const FORMULA: &str = r#"
[formula]
name = "transmission"
description = "Lightweight BitTorrent client"

[source]
url = "https://example.com/transmission-2.94.tar.xz"
checksum = "sha256:35442cc849f91f8df982c3d0d479d650c6ca19310a994eccdaa79a4af3916b7d"

[[dependencies]]
name = "pkg-config"
scope = "build"

[[dependencies]]
name = "libevent"

[[install.configure]]
executable = "./configure"
args = ["--prefix=%(prefix)s"]

[[install.install]]
executable = "make"
args = ["install"]

[service]
program = "%(bin)s/transmission-daemon"
args = ["--foreground", "--config-dir", "%(config_dir)s", "--logfile", "%(log_path)s"]
config_dir = "%(var)s/transmission/"
log_path = "%(var)s/log/transmission-daemon.log"
daemon = true
manual = "transmission-daemon --foreground"

[caveats]
service_settings = "%(var)s/transmission/settings.json"
config_env = "TRANSMISSION_HOME"
fallback = "Library/Application Support/transmission-daemon"
settings_file = "settings.json"
"#;

    fn kitchen(root: &Path) -> Kitchen {
        Kitchen::with_collaborators(
            KitchenConfig::rooted(root),
            Arc::new(NoFetch),
            Arc::new(NoRun),
            Arc::new(LocalFilesystem),
        )
    }

    #[test]
    fn test_missing_dependency_rejected_before_any_transition() {
        let dir = tempfile::tempdir().unwrap();
        let formula = parse_formula(FORMULA).unwrap();
        let kitchen = kitchen(dir.path()).with_resolver(Arc::new(Missing(vec!["pkg-config"])));

        match kitchen.prepare(&formula) {
            Err(Error::DependencyUnavailable(names)) => assert_eq!(names, vec!["pkg-config"]),
            Err(other) => panic!("unexpected error {}", other),
            Ok(_) => panic!("prepare should fail"),
        }
    }

    #[test]
    fn test_noop_resolver_accepts_everything() {
        let dir = tempfile::tempdir().unwrap();
        let formula = parse_formula(FORMULA).unwrap();
        let kitchen =
            kitchen(dir.path()).with_resolver(Arc::new(crate::formula::NoopResolver));
        let cook = kitchen.prepare(&formula).unwrap();
        assert_eq!(cook.state(), InstallState::Unverified);
    }

    #[test]
    fn test_network_failure_fails_machine() {
        let dir = tempfile::tempdir().unwrap();
        let formula = parse_formula(FORMULA).unwrap();
        let kitchen = kitchen(dir.path());
        let mut cook = kitchen.prepare(&formula).unwrap();
        assert!(matches!(cook.run(), Err(Error::Network { .. })));
        assert_eq!(cook.state(), InstallState::Failed(FailureKind::Network));
    }

    #[test]
    fn test_service_descriptor_uses_absolute_keg() {
        let dir = tempfile::tempdir().unwrap();
        let formula = parse_formula(FORMULA).unwrap();
        let kitchen = kitchen(dir.path());

        let descriptor = kitchen.service_descriptor(&formula).unwrap().unwrap();
        let keg = dir.path().join("Cellar/transmission/2.94");
        assert_eq!(
            descriptor.program(),
            keg.join("bin/transmission-daemon").to_string_lossy()
        );
        assert_eq!(descriptor.label, "org.formulary.transmission");
        assert_eq!(descriptor.keep_alive, KeepAlive::NetworkState);
        assert!(descriptor.run_at_load);
        let log = dir.path().join("var/log/transmission-daemon.log");
        assert_eq!(descriptor.program_arguments.last().unwrap(), &log.to_string_lossy());
        assert!(!descriptor
            .program_arguments
            .iter()
            .any(|a| a.contains("/opt/transmission")));
    }

    #[test]
    fn test_caveats_resolve_paths() {
        let dir = tempfile::tempdir().unwrap();
        let formula = parse_formula(FORMULA).unwrap();
        let text = kitchen(dir.path()).caveats(&formula).unwrap();

        let settings = dir.path().join("var/transmission/settings.json");
        assert!(text.contains(&*settings.to_string_lossy()));
        assert!(text.contains("If `$TRANSMISSION_HOME` is not set"));
        assert!(text.contains("transmission-daemon --foreground"));
    }

    #[test]
    fn test_rooted_resolves_relative_root() {
        let config = KitchenConfig::rooted("relroot");
        assert!(config.root.is_absolute());
        assert!(config.root.ends_with("relroot"));
        assert_eq!(config.source_cache, config.root.join("cache/sources"));
    }

    #[test]
    fn test_relative_root_rejected_before_any_transition() {
        let dir = tempfile::tempdir().unwrap();
        let formula = parse_formula(FORMULA).unwrap();
        let mut config = KitchenConfig::rooted(dir.path());
        config.root = PathBuf::from("relroot");
        let kitchen = Kitchen::with_collaborators(
            config,
            Arc::new(NoFetch),
            Arc::new(NoRun),
            Arc::new(LocalFilesystem),
        );

        match kitchen.prepare(&formula) {
            Err(Error::Config(message)) => assert!(message.contains("relroot")),
            Err(other) => panic!("unexpected error {}", other),
            Ok(_) => panic!("prepare should fail"),
        }
    }

    #[test]
    fn test_invalid_service_rejected_before_any_transition() {
        let dir = tempfile::tempdir().unwrap();
        let text = FORMULA.replace(
            r#"program = "%(bin)s/transmission-daemon""#,
            r#"program = "bin/transmission-daemon""#,
        );
        let formula = parse_formula(&text).unwrap();
        let kitchen = kitchen(dir.path());

        match kitchen.prepare(&formula) {
            Err(Error::InvalidFormula(message)) => assert!(message.contains("absolute")),
            Err(other) => panic!("unexpected error {}", other),
            Ok(_) => panic!("prepare should fail"),
        }
        assert!(!dir.path().join("Cellar").exists());
    }

    #[test]
    fn test_kitchen_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Kitchen>();
    }
}
