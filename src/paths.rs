// src/paths.rs

//! Resolved installation layout
//!
//! ```text
//! <root>/
//!   Cellar/<name>/<version>/   prefix (the keg), bin/ sbin/ lib/ include/ share/
//!   opt/<name>                 symbolic alias for the current keg
//!   etc/
//!   var/
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Variables every formula template may use
pub const BUILTIN_VARIABLES: &[&str] = &[
    "name",
    "version",
    "root",
    "cellar",
    "prefix",
    "opt_prefix",
    "bin",
    "sbin",
    "lib",
    "include",
    "share",
    "etc",
    "var",
];

/// Extra variables available to service arguments
pub const SERVICE_VARIABLES: &[&str] = &["config_dir", "log_path"];

/// Every path an install resolves against
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallPaths {
    pub name: String,
    pub version: String,
    pub root: PathBuf,
    pub cellar: PathBuf,
    /// Absolute versioned installation prefix
    pub prefix: PathBuf,
    /// Unversioned alias; never embedded in generated service descriptors
    pub opt_prefix: PathBuf,
    pub etc: PathBuf,
    pub var: PathBuf,
}

impl InstallPaths {
    pub fn new(root: &Path, name: &str, version: &str) -> Self {
        let cellar = root.join("Cellar");
        Self {
            name: name.to_string(),
            version: version.to_string(),
            prefix: cellar.join(name).join(version),
            opt_prefix: root.join("opt").join(name),
            etc: root.join("etc"),
            var: root.join("var"),
            cellar,
            root: root.to_path_buf(),
        }
    }

    pub fn bin(&self) -> PathBuf {
        self.prefix.join("bin")
    }

    pub fn sbin(&self) -> PathBuf {
        self.prefix.join("sbin")
    }

    pub fn lib(&self) -> PathBuf {
        self.prefix.join("lib")
    }

    pub fn include(&self) -> PathBuf {
        self.prefix.join("include")
    }

    pub fn share(&self) -> PathBuf {
        self.prefix.join("share")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.var.join("log")
    }

    /// Template variables for `%(name)s` substitution
    pub fn variables(&self) -> BTreeMap<String, String> {
        let display = |p: &Path| p.to_string_lossy().into_owned();
        let mut vars = BTreeMap::new();
        vars.insert("name".to_string(), self.name.clone());
        vars.insert("version".to_string(), self.version.clone());
        vars.insert("root".to_string(), display(&self.root));
        vars.insert("cellar".to_string(), display(&self.cellar));
        vars.insert("prefix".to_string(), display(&self.prefix));
        vars.insert("opt_prefix".to_string(), display(&self.opt_prefix));
        vars.insert("bin".to_string(), display(&self.bin()));
        vars.insert("sbin".to_string(), display(&self.sbin()));
        vars.insert("lib".to_string(), display(&self.lib()));
        vars.insert("include".to_string(), display(&self.include()));
        vars.insert("share".to_string(), display(&self.share()));
        vars.insert("etc".to_string(), display(&self.etc));
        vars.insert("var".to_string(), display(&self.var));
        vars
    }
}
