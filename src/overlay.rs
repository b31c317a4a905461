// src/overlay.rs

//! Build environment overlays
//!
//! The build environment is an explicit map handed to every step. An
//! overlay never touches the process environment: it consumes a base map
//! and produces a new one, so the mutations exist only for as long as the
//! resulting map is used by a build.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Separator for path-list variables on this platform
pub const PATH_SEPARATOR: &str = if cfg!(windows) { ";" } else { ":" };

/// Variables carried over from the ambient environment for isolated builds
pub const MINIMAL_AMBIENT: &[&str] = &["PATH", "HOME", "TMPDIR", "LANG"];

/// How a mutation combines with the current value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MutationOp {
    Set,
    Append,
    Prepend,
}

/// One change to a build environment variable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentMutation {
    pub variable: String,
    pub op: MutationOp,
    pub value: String,
    /// Joiner for append/prepend, defaults to [`PATH_SEPARATOR`]
    #[serde(default)]
    pub separator: Option<String>,
}

impl EnvironmentMutation {
    pub fn set(variable: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(variable, MutationOp::Set, value)
    }

    pub fn append(variable: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(variable, MutationOp::Append, value)
    }

    pub fn prepend(variable: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(variable, MutationOp::Prepend, value)
    }

    fn new(variable: impl Into<String>, op: MutationOp, value: impl Into<String>) -> Self {
        Self {
            variable: variable.into(),
            op,
            value: value.into(),
            separator: None,
        }
    }

    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = Some(separator.into());
        self
    }

    fn separator(&self) -> &str {
        self.separator.as_deref().unwrap_or(PATH_SEPARATOR)
    }

    /// Combine with the current value of the variable
    ///
    /// The separator is only inserted between two non-empty values.
    pub fn combine(&self, current: Option<&str>) -> String {
        let current = current.unwrap_or("");
        match self.op {
            MutationOp::Set => self.value.clone(),
            MutationOp::Append | MutationOp::Prepend if self.value.is_empty() => {
                current.to_string()
            }
            MutationOp::Append if current.is_empty() => self.value.clone(),
            MutationOp::Append => format!("{}{}{}", current, self.separator(), self.value),
            MutationOp::Prepend if current.is_empty() => self.value.clone(),
            MutationOp::Prepend => format!("{}{}{}", self.value, self.separator(), current),
        }
    }
}

/// An environment map for process invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    vars: BTreeMap<String, String>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the whole process environment
    pub fn from_ambient() -> Self {
        Self {
            vars: std::env::vars().collect(),
        }
    }

    /// Snapshot of selected variables from the process environment
    pub fn from_ambient_subset(keys: &[&str]) -> Self {
        Self {
            vars: keys
                .iter()
                .filter_map(|k| std::env::var(k).ok().map(|v| (k.to_string(), v)))
                .collect(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Apply mutations in declaration order, producing a new environment
    pub fn overlay(&self, mutations: &[EnvironmentMutation]) -> Environment {
        let mut vars = self.vars.clone();
        for mutation in mutations {
            let value = mutation.combine(vars.get(&mutation.variable).map(String::as_str));
            vars.insert(mutation.variable.clone(), value);
        }
        Environment { vars }
    }
}

impl FromIterator<(String, String)> for Environment {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            vars: iter.into_iter().collect(),
        }
    }
}
