// src/kitchen/cook.rs

//! Cook: the build and install procedure for a single formula

use crate::error::{Error, Phase, Result, StepFailure};
use crate::formula::{ArtifactDescriptor, DependencySet, Formula, Payload, StepTemplate};
use crate::overlay::{Environment, EnvironmentMutation, MINIMAL_AMBIENT};
use crate::paths::InstallPaths;
use crate::service::ServiceDescriptor;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info, warn};

use super::archive::{pour_bottle, unpack_source};
use super::config::{CookResult, PourSource};
use super::receipt::{InstallReceipt, ReceiptSource, RECEIPT_FILE};
use super::runner::Step;
use super::state::{InstallMachine, InstallState};
use super::Kitchen;

/// `SOURCE_DATE_EPOCH` exported to every build (1980-01-01)
pub const SOURCE_DATE_EPOCH: &str = "315532800";

/// A single cook operation
///
/// Created by [`Kitchen::prepare`]; the state machine starts at
/// [`InstallState::Unverified`].
pub struct Cook<'a> {
    kitchen: &'a Kitchen,
    formula: &'a Formula,
    artifact: ArtifactDescriptor,
    dependencies: DependencySet,
    paths: InstallPaths,
    vars: BTreeMap<String, String>,
    /// Resolved up front so a bad service section fails before any work
    service: Option<ServiceDescriptor>,
    caveats: String,
    machine: InstallMachine,
    log: String,
    warnings: Vec<String>,
}

impl<'a> Cook<'a> {
    pub(super) fn new(
        kitchen: &'a Kitchen,
        formula: &'a Formula,
        dependencies: DependencySet,
        warnings: Vec<String>,
    ) -> Result<Self> {
        let artifact = ArtifactDescriptor::from_formula(formula)?;
        let paths = InstallPaths::new(&kitchen.config.root, &artifact.name, &artifact.version);
        let vars = paths.variables();
        let service = kitchen.descriptor_for(formula, &paths)?;
        let caveats = kitchen.caveats_for(formula, &paths)?;

        Ok(Self {
            kitchen,
            formula,
            artifact,
            dependencies,
            paths,
            vars,
            service,
            caveats,
            machine: InstallMachine::new(),
            log: String::new(),
            warnings,
        })
    }

    pub fn state(&self) -> InstallState {
        self.machine.state()
    }

    /// Every state this cook has been in, oldest first
    pub fn history(&self) -> &[InstallState] {
        self.machine.history()
    }

    pub fn paths(&self) -> &InstallPaths {
        &self.paths
    }

    pub fn log(&self) -> &str {
        &self.log
    }

    /// Run the procedure to completion
    ///
    /// Any error leaves the machine in [`InstallState::Failed`]; no later
    /// step runs. Files already written are left in place.
    pub fn run(&mut self) -> Result<CookResult> {
        if self.machine.state() != InstallState::Unverified {
            return Err(Error::InvalidTransition {
                from: self.machine.state().to_string(),
                to: InstallState::Verified.to_string(),
            });
        }

        match self.execute() {
            Ok(result) => Ok(result),
            Err(e) => {
                self.machine.fail(&e);
                warn!("Cooking {} failed: {}", self.artifact.name, e);
                Err(e)
            }
        }
    }

    fn execute(&mut self) -> Result<CookResult> {
        let bottle = if self.kitchen.config.build_from_source {
            None
        } else {
            self.artifact
                .prebuilt_for(&self.kitchen.config.platform_tag)
                .cloned()
        };

        match bottle {
            Some(prebuilt) => {
                info!("Pouring bottle for {}", prebuilt.platform);
                self.pour(&prebuilt.payload)?;
                let source = PourSource::Bottle(prebuilt.platform);
                self.finish(source, None)
            }
            None => {
                let build_dir = self.build_from_source()?;
                self.finish(PourSource::Source, build_dir)
            }
        }
    }

    /// Verified -> Installed, straight from a bottle
    fn pour(&mut self, payload: &Payload) -> Result<()> {
        let data = self.kitchen.fetch_verified(payload)?;
        self.machine.advance(InstallState::Verified)?;
        self.log_line(&format!("Verified bottle: {}", payload.url));

        let written = pour_bottle(
            &data,
            &payload.filename(),
            &self.paths.name,
            &self.paths.version,
            &self.paths.prefix,
            self.kitchen.filesystem.as_ref(),
        )?;
        self.log_line(&format!(
            "Poured {} files into {}",
            written,
            self.paths.prefix.display()
        ));
        Ok(())
    }

    /// Unverified -> Verified -> Configured -> Built, leaving install-ready state
    ///
    /// Returns the build directory when it is kept.
    fn build_from_source(&mut self) -> Result<Option<PathBuf>> {
        let source = self.artifact.source.clone();

        info!("Prep: fetching {}", source.url);
        let data = self.kitchen.fetch_verified(&source)?;
        self.machine.advance(InstallState::Verified)?;
        self.log_line(&format!("Verified source: {}", source.url));

        let build_dir = tempfile::Builder::new()
            .prefix("formulary-build-")
            .keep(self.kitchen.config.keep_builddir)
            .tempdir()?;

        info!("Unpacking {}", source.filename());
        let source_dir = unpack_source(&data, &source.filename(), &build_dir.path().join("source"))?;
        let formula = self.formula;
        let workdir = match &formula.install.workdir {
            Some(wd) => source_dir.join(wd),
            None => source_dir,
        };
        debug!("Working directory: {}", workdir.display());

        let env = self.build_environment()?;
        self.kitchen.filesystem.create_dir_all(&self.paths.prefix)?;
        let install = &formula.install;

        info!("Configuring {}", self.artifact.name);
        self.run_phase(Phase::Configure, &install.configure, &workdir, &env)?;
        self.machine.advance(InstallState::Configured)?;

        info!("Building {}", self.artifact.name);
        self.run_phase(Phase::Build, &install.build, &workdir, &env)?;
        self.machine.advance(InstallState::Built)?;

        info!("Installing {} into {}", self.artifact.name, self.paths.prefix.display());
        self.run_phase(Phase::Install, &install.install, &workdir, &env)?;

        Ok(keep_build_dir(build_dir, self.kitchen.config.keep_builddir))
    }

    /// Ambient base, kitchen variables, then the formula's own mutations
    pub fn build_environment(&self) -> Result<Environment> {
        let base = if self.kitchen.config.inherit_env {
            Environment::from_ambient()
        } else {
            Environment::from_ambient_subset(MINIMAL_AMBIENT)
        };

        let mut mutations = vec![
            EnvironmentMutation::set("SOURCE_DATE_EPOCH", SOURCE_DATE_EPOCH),
            EnvironmentMutation::set("MAKEFLAGS", format!("-j{}", self.kitchen.config.jobs)),
        ];
        for mutation in &self.formula.environment {
            let mut resolved = mutation.clone();
            resolved.value = self.formula.substitute(&mutation.value, &self.vars)?;
            mutations.push(resolved);
        }

        Ok(base.overlay(&mutations))
    }

    fn run_phase(
        &mut self,
        phase: Phase,
        templates: &[StepTemplate],
        workdir: &Path,
        env: &Environment,
    ) -> Result<()> {
        for template in templates {
            let step = self.resolve_step(phase, template)?;

            if self.kitchen.cancel.is_cancelled() {
                return Err(Error::Cancelled {
                    phase,
                    executable: step.executable,
                });
            }

            debug!("Command: {}", step.command_line());
            let output = self
                .kitchen
                .runner
                .run(&step, env, workdir, &self.kitchen.cancel)?;

            self.log_build_output(phase, &step, &output.stdout, &output.stderr);

            if !output.success() {
                return Err(Error::step_failed(
                    phase,
                    StepFailure {
                        executable: step.executable,
                        exit_code: output.exit_code,
                        stderr: output.stderr,
                    },
                ));
            }
        }
        Ok(())
    }

    fn resolve_step(&self, phase: Phase, template: &StepTemplate) -> Result<Step> {
        let executable = self.formula.substitute(&template.executable, &self.vars)?;
        let args = template
            .args
            .iter()
            .map(|arg| self.formula.substitute(arg, &self.vars))
            .collect::<Result<Vec<_>>>()?;
        Ok(Step {
            phase,
            executable,
            args,
        })
    }

    /// Directories, receipt and service descriptor, then Installed
    fn finish(&mut self, poured_from: PourSource, build_dir: Option<PathBuf>) -> Result<CookResult> {
        let filesystem = self.kitchen.filesystem.clone();

        for template in &self.formula.install.directories {
            let dir = PathBuf::from(self.formula.substitute(template, &self.vars)?);
            filesystem.create_dir_all(&dir)?;
            debug!("Ensured directory {}", dir.display());
        }

        let receipt = InstallReceipt {
            name: self.artifact.name.clone(),
            version: self.artifact.version.clone(),
            source: ReceiptSource {
                url: self.artifact.source.url.clone(),
                checksum: self.artifact.source.checksum.to_string(),
            },
            poured_from: poured_from.to_string(),
            runtime_dependencies: self
                .dependencies
                .runtime_closure()
                .into_iter()
                .map(String::from)
                .collect(),
        };
        filesystem.write(&self.paths.prefix.join(RECEIPT_FILE), receipt.to_json()?.as_bytes())?;

        let mut service_file = None;
        if let Some(descriptor) = &self.service {
            for path in &descriptor.working_paths {
                filesystem.create_dir_all(path)?;
            }
            let encoder = self.kitchen.config.service_format.encoder();
            let path = self.paths.prefix.join(encoder.file_name(descriptor));
            filesystem.write(&path, encoder.encode(descriptor)?.as_bytes())?;
            info!("Wrote service descriptor {}", path.display());
            service_file = Some(path);
        }

        self.machine.advance(InstallState::Installed)?;
        info!(
            "Installed {} {} into {}",
            self.artifact.name,
            self.artifact.version,
            self.paths.prefix.display()
        );

        Ok(CookResult {
            name: self.artifact.name.clone(),
            version: self.artifact.version.clone(),
            prefix: self.paths.prefix.clone(),
            poured_from,
            receipt,
            service_file,
            caveats: self.caveats.clone(),
            log: std::mem::take(&mut self.log),
            warnings: std::mem::take(&mut self.warnings),
            build_dir,
        })
    }

    fn log_line(&mut self, line: &str) {
        self.log.push_str(line);
        self.log.push('\n');
    }

    /// Log build step output (stdout/stderr) with a phase header
    fn log_build_output(&mut self, phase: Phase, step: &Step, stdout: &str, stderr: &str) {
        self.log_line(&format!("=== {}: {} ===", phase, step.command_line()));
        if !stdout.is_empty() {
            self.log.push_str(stdout);
            self.log.push('\n');
        }
        if !stderr.is_empty() {
            self.log.push_str(stderr);
            self.log.push('\n');
        }
    }
}

fn keep_build_dir(dir: TempDir, keep: bool) -> Option<PathBuf> {
    if keep {
        let path = dir.path().to_path_buf();
        info!("Keeping build directory {}", path.display());
        Some(path)
    } else {
        None
    }
}
