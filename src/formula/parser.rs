// src/formula/parser.rs

//! Formula file parsing and validation

use crate::error::{Error, Result};
use crate::paths::{BUILTIN_VARIABLES, SERVICE_VARIABLES};
use std::collections::HashSet;
use std::path::Path;

use super::dependency::DependencySet;
use super::format::Formula;
use super::template::placeholders;

/// Parse a formula from a TOML string
pub fn parse_formula(content: &str) -> Result<Formula> {
    toml::from_str(content).map_err(|e| Error::Parse(format!("Invalid formula: {}", e)))
}

/// Parse a formula from a file
pub fn parse_formula_file(path: &Path) -> Result<Formula> {
    let content = std::fs::read_to_string(path)?;
    parse_formula(&content)
}

/// Validate a formula for completeness and correctness
///
/// Hard problems are errors; cosmetic gaps come back as warnings.
pub fn validate_formula(formula: &Formula) -> Result<Vec<String>> {
    let mut warnings = Vec::new();

    if formula.formula.name.trim().is_empty() {
        return Err(Error::InvalidFormula("formula name cannot be empty".to_string()));
    }
    check_path_component("name", &formula.formula.name)?;
    check_path_component("version", &formula.version()?)?;

    formula
        .source
        .checksum
        .check_well_formed()
        .map_err(|e| Error::InvalidFormula(format!("source checksum: {}", e)))?;

    let mut platforms = HashSet::new();
    for bottle in &formula.bottles {
        bottle
            .checksum
            .check_well_formed()
            .map_err(|e| Error::InvalidFormula(format!("bottle {} checksum: {}", bottle.platform, e)))?;
        if bottle.url.is_none() && bottle.root_url.is_none() {
            return Err(Error::InvalidFormula(format!(
                "bottle {} needs either url or root_url",
                bottle.platform
            )));
        }
        if !platforms.insert(bottle.platform.as_str()) {
            return Err(Error::InvalidFormula(format!(
                "bottle platform {} is declared more than once",
                bottle.platform
            )));
        }
    }

    DependencySet::new(formula.dependencies.clone())?;

    for mutation in &formula.environment {
        if mutation.variable.trim().is_empty() {
            return Err(Error::InvalidFormula(
                "environment mutation has an empty variable name".to_string(),
            ));
        }
    }

    let configure = &formula.install.configure;
    if !configure.is_empty() && !configure.iter().any(|s| s.mentions("%(prefix)s")) {
        return Err(Error::InvalidFormula(
            "configure steps must pass the installation prefix via %(prefix)s".to_string(),
        ));
    }

    check_placeholders(formula)?;

    if formula.install.install.is_empty() {
        if formula.bottles.is_empty() {
            warnings.push("No install steps and no bottles: nothing will be installed".to_string());
        } else {
            warnings.push("No install steps: only bottles can be poured".to_string());
        }
    }

    if formula.formula.description.is_none() {
        warnings.push("Missing formula description".to_string());
    }
    if formula.formula.homepage.is_none() {
        warnings.push("Missing formula homepage".to_string());
    }
    if formula.formula.license.is_none() {
        warnings.push("Missing formula license".to_string());
    }

    if let Some(service) = &formula.service
        && service.manual.is_none()
    {
        warnings.push("Service has no manual (foreground) command".to_string());
    }

    Ok(warnings)
}

/// Name and version each become one directory under the cellar
fn check_path_component(what: &str, value: &str) -> Result<()> {
    if value.is_empty() || value == "." || value == ".." || value.contains(['/', '\\']) {
        return Err(Error::InvalidFormula(format!(
            "formula {} `{}` is not a single path component",
            what, value
        )));
    }
    Ok(())
}

fn check_placeholders(formula: &Formula) -> Result<()> {
    let known = |name: &str| {
        BUILTIN_VARIABLES.contains(&name) || formula.variables.contains_key(name)
    };

    let mut templates: Vec<&str> = Vec::new();
    for step in formula
        .install
        .configure
        .iter()
        .chain(&formula.install.build)
        .chain(&formula.install.install)
    {
        templates.push(&step.executable);
        templates.extend(step.args.iter().map(String::as_str));
    }
    templates.extend(formula.install.directories.iter().map(String::as_str));
    templates.extend(formula.environment.iter().map(|m| m.value.as_str()));
    if let Some(caveats) = &formula.caveats {
        templates.extend(caveats.service_settings.as_deref());
        templates.extend(caveats.notes.iter().map(String::as_str));
    }

    for template in templates {
        if let Some(name) = placeholders(template).into_iter().find(|n| !known(n)) {
            return Err(Error::InvalidFormula(format!(
                "unknown variable %({})s in `{}`",
                name, template
            )));
        }
    }

    if let Some(service) = &formula.service {
        let mut service_templates = vec![
            service.program.as_str(),
            service.config_dir.as_str(),
            service.log_path.as_str(),
        ];
        service_templates.extend(service.working_paths.iter().map(String::as_str));
        for template in &service_templates {
            if let Some(name) = placeholders(template).into_iter().find(|n| !known(n)) {
                return Err(Error::InvalidFormula(format!(
                    "unknown variable %({})s in `{}`",
                    name, template
                )));
            }
        }
        for arg in &service.args {
            if let Some(name) = placeholders(arg)
                .into_iter()
                .find(|n| !known(n) && !SERVICE_VARIABLES.contains(n))
            {
                return Err(Error::InvalidFormula(format!(
                    "unknown variable %({})s in service argument `{}`",
                    name, arg
                )));
            }
        }
    }

    Ok(())
}
