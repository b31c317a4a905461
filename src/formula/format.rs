// src/formula/format.rs

//! Formula file format definitions
//!
//! Formulas are TOML files describing one piece of third-party software:
//! where its source lives, what it depends on, how to build and install it,
//! and how a supervisor should run it afterwards.

use crate::error::{Error, Result};
use crate::hash::Checksum;
use crate::overlay::EnvironmentMutation;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::artifact::detect_version;
use super::dependency::Dependency;
use super::template;

/// A complete formula
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Formula {
    /// Descriptive metadata
    pub formula: FormulaSection,

    /// Source archive and its checksum
    pub source: SourceSection,

    /// Prebuilt payloads, one per platform tag
    #[serde(default, rename = "bottle")]
    pub bottles: Vec<BottleSection>,

    /// Build-only and runtime dependencies, in declaration order
    #[serde(default)]
    pub dependencies: Vec<Dependency>,

    /// Build environment mutations, applied in declaration order
    #[serde(default)]
    pub environment: Vec<EnvironmentMutation>,

    /// Install procedure
    #[serde(default)]
    pub install: InstallSection,

    /// Long-running service (optional)
    #[serde(default)]
    pub service: Option<ServiceSection>,

    /// Post-install guidance (optional)
    #[serde(default)]
    pub caveats: Option<CaveatSection>,

    /// Extra variables for `%(name)s` substitution
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
}

impl Formula {
    pub fn name(&self) -> &str {
        &self.formula.name
    }

    /// Declared version, or the one detected from the source archive name
    pub fn version(&self) -> Result<String> {
        if let Some(version) = &self.formula.version {
            return Ok(version.clone());
        }
        detect_version(&self.source.url).ok_or_else(|| {
            Error::InvalidFormula(format!(
                "no version declared and none detectable from {}",
                self.source.url
            ))
        })
    }

    /// Substitute `%(name)s` patterns
    ///
    /// Values come from the built-in path variables passed in `vars`, then
    /// from the formula's own `[variables]` section. Built-ins win.
    pub fn substitute(&self, source: &str, vars: &BTreeMap<String, String>) -> Result<String> {
        template::substitute(source, |key| {
            vars.get(key).or_else(|| self.variables.get(key)).cloned()
        })
    }

    /// Whether any install step is declared at all
    pub fn has_steps(&self) -> bool {
        !self.install.configure.is_empty()
            || !self.install.build.is_empty()
            || !self.install.install.is_empty()
    }
}

/// Formula metadata section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormulaSection {
    pub name: String,

    /// One-line description
    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub homepage: Option<String>,

    /// Version; detected from the source URL when omitted
    #[serde(default)]
    pub version: Option<String>,

    /// License identifier (SPDX)
    #[serde(default)]
    pub license: Option<String>,
}

/// Source archive section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSection {
    /// Archive URL (`https://` or `file://`)
    pub url: String,

    /// Checksum for the archive (sha256:...)
    pub checksum: Checksum,
}

/// A prebuilt payload for one platform
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BottleSection {
    /// Platform tag this payload was built for (e.g. `catalina`, `x86_64_linux`)
    pub platform: String,

    pub checksum: Checksum,

    /// Explicit payload URL
    #[serde(default)]
    pub url: Option<String>,

    /// Directory holding bottles named `<name>-<version>.<platform>.bottle.tar.gz`
    #[serde(default)]
    pub root_url: Option<String>,
}

/// One external process invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepTemplate {
    pub executable: String,

    #[serde(default)]
    pub args: Vec<String>,
}

impl StepTemplate {
    /// Whether the executable or any argument mentions `needle`
    pub fn mentions(&self, needle: &str) -> bool {
        self.executable.contains(needle) || self.args.iter().any(|a| a.contains(needle))
    }
}

/// Install procedure section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InstallSection {
    /// Configure-style steps
    ///
    /// Must pass the installation prefix, e.g. `--prefix=%(prefix)s`.
    #[serde(default)]
    pub configure: Vec<StepTemplate>,

    /// Build-style steps
    #[serde(default)]
    pub build: Vec<StepTemplate>,

    /// Install-style steps
    #[serde(default)]
    pub install: Vec<StepTemplate>,

    /// Directories to create after installing (e.g. `%(var)s/transmission`)
    #[serde(default)]
    pub directories: Vec<String>,

    /// Working directory within the unpacked source (relative path)
    #[serde(default)]
    pub workdir: Option<String>,
}

/// Service section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceSection {
    /// Program to run, usually `%(bin)s/<daemon>`
    pub program: String,

    /// Arguments after the program; may use `%(config_dir)s` and `%(log_path)s`
    #[serde(default)]
    pub args: Vec<String>,

    /// Directory the daemon reads its configuration from
    pub config_dir: String,

    /// File the daemon logs to
    pub log_path: String,

    /// Network daemons restart on connectivity changes and start at load
    #[serde(default)]
    pub daemon: bool,

    /// Override for the keep-alive policy
    #[serde(default)]
    pub keep_alive: Option<crate::service::KeepAlive>,

    /// Override for run-at-load
    #[serde(default)]
    pub run_at_load: Option<bool>,

    /// Additional directories the service needs at run time
    #[serde(default)]
    pub working_paths: Vec<String>,

    /// Foreground command for running without the supervisor
    #[serde(default)]
    pub manual: Option<String>,
}

/// Caveats section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CaveatSection {
    /// Settings file read when running under the supervisor
    #[serde(default)]
    pub service_settings: Option<String>,

    /// Environment variable overriding the configuration directory
    #[serde(default)]
    pub config_env: Option<String>,

    /// Fallback configuration directory, relative to `$HOME`
    #[serde(default)]
    pub fallback: Option<String>,

    /// Settings file name looked up inside the configuration directory
    #[serde(default)]
    pub settings_file: Option<String>,

    /// Free-form notes, rendered after the lookup order
    #[serde(default)]
    pub notes: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formula::dependency::DependencyScope;
    use crate::overlay::MutationOp;

    const SAMPLE_FORMULA: &str = r#"
[formula]
name = "transmission"
description = "Lightweight BitTorrent client"
homepage = "https://www.transmissionbt.com/"

[source]
url = "https://github.com/transmission/transmission-releases/raw/dc77bea/transmission-2.94.tar.xz"
checksum = "sha256:35442cc849f91f8df982c3d0d479d650c6ca19310a994eccdaa79a4af3916b7d"

[[bottle]]
platform = "catalina"
root_url = "https://example.com/bottles"
checksum = "sha256:d21df4f74de336823e41c7db5b730c98678af88a46a3a310fbe5d53efebff91d"

[[dependencies]]
name = "pkg-config"
scope = "build"

[[dependencies]]
name = "libevent"

[[environment]]
variable = "LDFLAGS"
op = "append"
value = "-liconv"
separator = " "

[install]
directories = ["%(var)s/transmission"]

[[install.configure]]
executable = "./configure"
args = ["--disable-dependency-tracking", "--prefix=%(prefix)s"]

[[install.install]]
executable = "make"
args = ["install"]

[service]
program = "%(bin)s/transmission-daemon"
args = ["--foreground", "--config-dir", "%(config_dir)s"]
config_dir = "%(var)s/transmission/"
log_path = "%(var)s/log/transmission-daemon.log"
daemon = true
manual = "transmission-daemon --foreground"
"#;

    #[test]
    fn test_parse_formula() {
        let formula: Formula = toml::from_str(SAMPLE_FORMULA).unwrap();

        assert_eq!(formula.name(), "transmission");
        assert_eq!(formula.version().unwrap(), "2.94");
        assert_eq!(formula.bottles.len(), 1);
        assert_eq!(formula.dependencies[0].scope, DependencyScope::BuildOnly);
        assert_eq!(formula.dependencies[1].scope, DependencyScope::Runtime);
        assert_eq!(formula.environment[0].op, MutationOp::Append);
        assert_eq!(formula.environment[0].separator.as_deref(), Some(" "));
        assert_eq!(formula.install.configure.len(), 1);
        assert!(formula.install.build.is_empty());
        assert_eq!(formula.install.install[0].executable, "make");
        assert!(formula.service.as_ref().unwrap().daemon);
        assert!(formula.caveats.is_none());
    }

    #[test]
    fn test_explicit_version_wins() {
        let toml = SAMPLE_FORMULA.replace(
            "homepage = \"https://www.transmissionbt.com/\"",
            "homepage = \"https://www.transmissionbt.com/\"\nversion = \"2.94_1\"",
        );
        let formula: Formula = toml::from_str(&toml).unwrap();
        assert_eq!(formula.version().unwrap(), "2.94_1");
    }

    #[test]
    fn test_substitute_prefers_builtins() {
        let mut formula: Formula = toml::from_str(SAMPLE_FORMULA).unwrap();
        formula.variables.insert("prefix".into(), "/wrong".into());
        formula.variables.insert("jobs".into(), "4".into());

        let mut vars = BTreeMap::new();
        vars.insert("prefix".to_string(), "/opt/formulary/Cellar/transmission/2.94".to_string());

        let out = formula.substitute("--prefix=%(prefix)s -j%(jobs)s", &vars).unwrap();
        assert_eq!(out, "--prefix=/opt/formulary/Cellar/transmission/2.94 -j4");

        assert!(formula.substitute("%(nope)s", &vars).is_err());
    }

    #[test]
    fn test_step_mentions() {
        let formula: Formula = toml::from_str(SAMPLE_FORMULA).unwrap();
        assert!(formula.install.configure[0].mentions("%(prefix)s"));
        assert!(!formula.install.install[0].mentions("%(prefix)s"));
        assert!(formula.has_steps());
    }

    #[test]
    fn test_bad_checksum_algorithm_rejected() {
        let toml = SAMPLE_FORMULA.replace("sha256:3544", "md5:3544");
        assert!(toml::from_str::<Formula>(&toml).is_err());
    }
}
