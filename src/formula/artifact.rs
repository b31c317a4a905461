// src/formula/artifact.rs

//! Artifact descriptors: what gets fetched and how it must hash

use crate::error::{Error, Result};
use crate::hash::Checksum;

use super::format::Formula;

/// A fetchable payload and the checksum it must match
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    pub url: String,
    pub checksum: Checksum,
}

impl Payload {
    /// File name component of the URL
    pub fn filename(&self) -> String {
        url_filename(&self.url).unwrap_or_else(|| "source".to_string())
    }
}

/// A prebuilt payload for one platform tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prebuilt {
    pub platform: String,
    pub payload: Payload,
}

/// Immutable description of one artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactDescriptor {
    pub name: String,
    pub version: String,
    pub description: Option<String>,
    pub homepage: Option<String>,
    pub source: Payload,
    pub prebuilt: Vec<Prebuilt>,
}

impl ArtifactDescriptor {
    /// Describe the artifact a formula produces
    pub fn from_formula(formula: &Formula) -> Result<Self> {
        let name = formula.name().to_string();
        let version = formula.version()?;

        let mut prebuilt = Vec::with_capacity(formula.bottles.len());
        for bottle in &formula.bottles {
            let url = match (&bottle.url, &bottle.root_url) {
                (Some(url), _) => url.clone(),
                (None, Some(root)) => format!(
                    "{}/{}-{}.{}.bottle.tar.gz",
                    root.trim_end_matches('/'),
                    name,
                    version,
                    bottle.platform
                ),
                (None, None) => {
                    return Err(Error::InvalidFormula(format!(
                        "bottle for {} needs either url or root_url",
                        bottle.platform
                    )));
                }
            };
            prebuilt.push(Prebuilt {
                platform: bottle.platform.clone(),
                payload: Payload {
                    url,
                    checksum: bottle.checksum.clone(),
                },
            });
        }

        Ok(Self {
            name,
            version,
            description: formula.formula.description.clone(),
            homepage: formula.formula.homepage.clone(),
            source: Payload {
                url: formula.source.url.clone(),
                checksum: formula.source.checksum.clone(),
            },
            prebuilt,
        })
    }

    /// Prebuilt payload matching a platform tag
    pub fn prebuilt_for(&self, platform: &str) -> Option<&Prebuilt> {
        self.prebuilt.iter().find(|p| p.platform == platform)
    }
}

/// Platform tag of the running host, e.g. `x86_64_linux` or `arm64_macos`
pub fn host_platform_tag() -> String {
    let arch = match std::env::consts::ARCH {
        "aarch64" => "arm64",
        other => other,
    };
    format!("{}_{}", arch, std::env::consts::OS)
}

const ARCHIVE_EXTENSIONS: &[&str] = &[
    ".tar.gz", ".tgz", ".tar.xz", ".txz", ".tar.bz2", ".tbz2", ".tar.zst", ".tar", ".zip",
];

fn url_filename(raw: &str) -> Option<String> {
    let path = match url::Url::parse(raw) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => raw.to_string(),
    };
    path.rsplit('/')
        .find(|s| !s.is_empty())
        .map(|s| s.to_string())
}

/// Detect a version from an archive URL
///
/// `transmission-2.94.tar.xz` gives `2.94`, `v1.2.3.tar.gz` gives `1.2.3`.
pub fn detect_version(raw_url: &str) -> Option<String> {
    let filename = url_filename(raw_url)?;
    let stem = ARCHIVE_EXTENSIONS
        .iter()
        .find_map(|ext| filename.strip_suffix(ext))
        .unwrap_or(&filename);

    // Last `-` or `_` followed by a digit starts the version
    let from_separator = stem
        .char_indices()
        .filter(|(_, c)| *c == '-' || *c == '_')
        .map(|(i, _)| i + 1)
        .filter(|&i| stem[i..].starts_with(|c: char| c.is_ascii_digit()))
        .last();

    let version = match from_separator {
        Some(i) => &stem[i..],
        None => stem
            .strip_prefix('v')
            .filter(|s| s.starts_with(|c: char| c.is_ascii_digit()))
            .or_else(|| stem.starts_with(|c: char| c.is_ascii_digit()).then_some(stem))?,
    };

    Some(version.to_string())
}
