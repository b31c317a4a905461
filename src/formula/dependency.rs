// src/formula/dependency.rs

//! Dependency declarations
//!
//! A formula only declares what it needs. Resolving, fetching and building
//! dependencies is the job of an external resolver, which is expected to
//! have every dependency present and on the search path before the install
//! procedure starts.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// When a dependency must be present
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DependencyScope {
    /// Needed only while building; never part of the runtime closure
    #[serde(rename = "build", alias = "build-only")]
    BuildOnly,

    /// Needed while building and at run time
    #[default]
    #[serde(rename = "runtime")]
    Runtime,
}

impl DependencyScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            DependencyScope::BuildOnly => "build",
            DependencyScope::Runtime => "runtime",
        }
    }
}

impl fmt::Display for DependencyScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DependencyScope {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "build" | "build-only" => Ok(DependencyScope::BuildOnly),
            "runtime" => Ok(DependencyScope::Runtime),
            other => Err(format!("unknown dependency scope: {}", other)),
        }
    }
}

/// A named dependency with its scope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub name: String,

    #[serde(default)]
    pub scope: DependencyScope,
}

impl Dependency {
    pub fn build(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            scope: DependencyScope::BuildOnly,
        }
    }

    pub fn runtime(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            scope: DependencyScope::Runtime,
        }
    }
}

/// The dependencies of one formula, with unique names
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencySet {
    deps: Vec<Dependency>,
}

impl DependencySet {
    /// Build a set, rejecting duplicate names
    pub fn new(deps: Vec<Dependency>) -> Result<Self> {
        let mut seen = HashSet::new();
        for dep in &deps {
            if dep.name.trim().is_empty() {
                return Err(Error::InvalidFormula("dependency name cannot be empty".into()));
            }
            if !seen.insert(dep.name.as_str()) {
                return Err(Error::InvalidFormula(format!(
                    "dependency `{}` is declared more than once",
                    dep.name
                )));
            }
        }
        Ok(Self { deps })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Dependency> {
        self.deps.iter()
    }

    pub fn len(&self) -> usize {
        self.deps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deps.is_empty()
    }

    pub fn scope_of(&self, name: &str) -> Option<DependencyScope> {
        self.deps.iter().find(|d| d.name == name).map(|d| d.scope)
    }

    /// Everything that must be present while building
    pub fn build_closure(&self) -> Vec<&str> {
        self.deps.iter().map(|d| d.name.as_str()).collect()
    }

    /// What the installed artifact needs at run time
    pub fn runtime_closure(&self) -> Vec<&str> {
        self.with_scope(DependencyScope::Runtime)
    }

    pub fn with_scope(&self, scope: DependencyScope) -> Vec<&str> {
        self.deps
            .iter()
            .filter(|d| d.scope == scope)
            .map(|d| d.name.as_str())
            .collect()
    }
}

/// Checks dependency availability before a cook starts
///
/// Lets an orchestrator refuse to run the procedure when its resolver
/// could not satisfy a dependency. Nothing is installed through this trait.
pub trait DependencyResolver: Send + Sync {
    /// Names from `deps` that are not available
    fn check_missing(&self, deps: &[&str]) -> Result<Vec<String>>;
}

/// A resolver that assumes all dependencies are satisfied
pub struct NoopResolver;

impl DependencyResolver for NoopResolver {
    fn check_missing(&self, _deps: &[&str]) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
}
