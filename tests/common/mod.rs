// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

#![allow(dead_code)]

use flate2::write::GzEncoder;
use flate2::Compression;
use formulary::hash::{hash_bytes, HashAlgorithm};
use formulary::kitchen::{
    CancelToken, Fetcher, Kitchen, KitchenConfig, LocalFilesystem, ProcessOutput, ProcessRunner,
    Step,
};
use formulary::service::ServiceFormat;
use formulary::{Environment, Error, Phase, Result};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const SOURCE_URL: &str = "https://example.com/hello-1.0.tar.gz";
pub const BOTTLE_ROOT: &str = "https://example.com/bottles";
pub const PLATFORM: &str = "testplat";

/// Deterministic gzipped tarball from (path, contents) pairs
pub fn tarball(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    for (path, contents) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(contents.len() as u64);
        header.set_mode(0o644);
        header.set_mtime(0);
        header.set_cksum();
        builder.append_data(&mut header, path, *contents).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

/// A source tarball for hello-1.0
pub fn source_tarball() -> Vec<u8> {
    tarball(&[
        ("hello-1.0/configure", b"#!/bin/sh\n"),
        ("hello-1.0/hello.c", b"int main(void) { return 0; }\n"),
    ])
}

/// `sha256:<hex>` of some bytes
pub fn sha256(data: &[u8]) -> String {
    hash_bytes(HashAlgorithm::Sha256, data).to_prefixed_string()
}

/// The hello formula with the given source checksum and optional bottle
pub fn hello_formula(source_checksum: &str, bottle_checksum: Option<&str>) -> String {
    let mut formula = format!(
        r#"
[formula]
name = "hello"
description = "Prints a greeting"
homepage = "https://example.com/hello"
license = "MIT"

[source]
url = "{SOURCE_URL}"
checksum = "{source_checksum}"

[[dependencies]]
name = "pkg-config"
scope = "build"

[[dependencies]]
name = "libevent"

[[environment]]
variable = "LDFLAGS"
op = "append"
value = "-L%(prefix)s/lib"
separator = " "

[install]
directories = ["%(var)s/hello", "%(var)s/log"]

[[install.configure]]
executable = "./configure"
args = ["--prefix=%(prefix)s", "--disable-silent-rules"]

[[install.build]]
executable = "make"

[[install.install]]
executable = "touch"
args = ["%(bin)s/hello", "%(share)s/doc/hello/README"]

[service]
program = "%(bin)s/hello"
args = ["--foreground", "--config-dir", "%(config_dir)s", "--logfile", "%(log_path)s"]
config_dir = "%(var)s/hello/"
log_path = "%(var)s/log/hello.log"
daemon = true
manual = "hello --foreground"

[caveats]
service_settings = "%(var)s/hello/settings.json"
config_env = "HELLO_HOME"
fallback = ".hello"
settings_file = "settings.json"
"#
    );

    if let Some(checksum) = bottle_checksum {
        formula.push_str(&format!(
            r#"
[[bottle]]
platform = "{PLATFORM}"
checksum = "{checksum}"
root_url = "{BOTTLE_ROOT}"
"#
        ));
    }
    formula
}

pub fn bottle_url() -> String {
    format!("{}/hello-1.0.{}.bottle.tar.gz", BOTTLE_ROOT, PLATFORM)
}

/// Serves payloads from memory and counts requests
#[derive(Default)]
pub struct StubFetcher {
    payloads: HashMap<String, Vec<u8>>,
    requests: AtomicUsize,
}

impl StubFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, url: &str, data: Vec<u8>) -> Self {
        self.payloads.insert(url.to_string(), data);
        self
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl Fetcher for StubFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        self.payloads.get(url).cloned().ok_or_else(|| Error::Network {
            url: url.to_string(),
            message: "404 Not Found".to_string(),
        })
    }
}

/// A step as the runner saw it
#[derive(Debug, Clone)]
pub struct RecordedStep {
    pub phase: Phase,
    pub executable: String,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub cwd: PathBuf,
}

/// Records every step instead of spawning processes
///
/// `touch` creates each argument as a file so install steps leave a tree
/// behind. Everything else succeeds unless listed in `failures`.
#[derive(Default)]
pub struct RecordingRunner {
    steps: Mutex<Vec<RecordedStep>>,
    failures: HashMap<String, (i32, String)>,
    cancel_after: Option<String>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `executable` exit with `code`, writing `stderr`
    pub fn failing(mut self, executable: &str, code: i32, stderr: &str) -> Self {
        self.failures
            .insert(executable.to_string(), (code, stderr.to_string()));
        self
    }

    /// Trip the cancellation token once `executable` has run
    pub fn cancel_after(mut self, executable: &str) -> Self {
        self.cancel_after = Some(executable.to_string());
        self
    }

    pub fn steps(&self) -> Vec<RecordedStep> {
        self.steps.lock().unwrap().clone()
    }

    pub fn executables(&self) -> Vec<String> {
        self.steps().into_iter().map(|s| s.executable).collect()
    }
}

impl ProcessRunner for RecordingRunner {
    fn run(
        &self,
        step: &Step,
        env: &Environment,
        cwd: &Path,
        cancel: &CancelToken,
    ) -> Result<ProcessOutput> {
        self.steps.lock().unwrap().push(RecordedStep {
            phase: step.phase,
            executable: step.executable.clone(),
            args: step.args.clone(),
            env: env
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            cwd: cwd.to_path_buf(),
        });

        if let Some((code, stderr)) = self.failures.get(&step.executable) {
            return Ok(ProcessOutput {
                exit_code: Some(*code),
                stdout: String::new(),
                stderr: stderr.clone(),
            });
        }

        if step.executable == "touch" {
            for arg in &step.args {
                let path = Path::new(arg);
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                let name = path.file_name().unwrap_or_default().to_string_lossy();
                std::fs::write(path, format!("{}\n", name))?;
            }
        }

        if self.cancel_after.as_deref() == Some(step.executable.as_str()) {
            cancel.cancel();
        }

        Ok(ProcessOutput {
            exit_code: Some(0),
            stdout: format!("ran {}", step.executable),
            stderr: String::new(),
        })
    }
}

/// A config rooted at `root` with fixed platform and supervisor format
pub fn config(root: &Path) -> KitchenConfig {
    KitchenConfig {
        jobs: 2,
        platform_tag: PLATFORM.to_string(),
        service_format: ServiceFormat::Launchd,
        ..KitchenConfig::rooted(root)
    }
}

pub fn kitchen(
    config: KitchenConfig,
    fetcher: Arc<StubFetcher>,
    runner: Arc<RecordingRunner>,
) -> Kitchen {
    Kitchen::with_collaborators(config, fetcher, runner, Arc::new(LocalFilesystem))
}

/// Every file under `dir` with its contents, keyed by relative path
pub fn snapshot(dir: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
    walkdir::WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            let relative = e.path().strip_prefix(dir).unwrap().to_path_buf();
            (relative, std::fs::read(e.path()).unwrap())
        })
        .collect()
}
