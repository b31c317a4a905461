// src/kitchen/fetch.rs

//! Payload fetching and the content-addressed source cache

use crate::error::{Error, Result};
use crate::hash::{verify_file, Checksum};
use reqwest::blocking::Client;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// Default timeout for HTTP requests
const HTTP_TIMEOUT: Duration = Duration::from_secs(300);

/// Maximum attempts for a failed download
const MAX_RETRIES: u32 = 3;

/// Base retry delay in milliseconds, multiplied by the attempt number
const RETRY_DELAY_MS: u64 = 1000;

/// Retrieves payload bytes by URL
pub trait Fetcher: Send + Sync {
    fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// Fetches `http(s)://` URLs with retries, plus `file://` URLs and local paths
pub struct HttpFetcher {
    client: Client,
    max_retries: u32,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .user_agent(concat!("formulary/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Network {
                url: String::new(),
                message: format!("failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            max_retries: MAX_RETRIES,
        })
    }

    fn fetch_http(&self, url: &str) -> Result<Vec<u8>> {
        let network = |message: String| Error::Network {
            url: url.to_string(),
            message,
        };

        let mut attempt = 0;
        loop {
            attempt += 1;
            let failure = match self.client.get(url).send() {
                Ok(response) if response.status().is_success() => {
                    let bytes = response
                        .bytes()
                        .map_err(|e| network(format!("failed to read response: {}", e)))?;
                    debug!("Fetched {} bytes from {}", bytes.len(), url);
                    return Ok(bytes.to_vec());
                }
                // Client errors will not improve with retries
                Ok(response) if response.status().is_client_error() => {
                    return Err(network(format!("HTTP {}", response.status())));
                }
                Ok(response) => format!("HTTP {}", response.status()),
                Err(e) => e.to_string(),
            };

            if attempt >= self.max_retries {
                return Err(network(format!(
                    "failed after {} attempts: {}",
                    attempt, failure
                )));
            }
            warn!("Fetch attempt {} for {} failed: {}, retrying...", attempt, url, failure);
            std::thread::sleep(Duration::from_millis(RETRY_DELAY_MS * attempt as u64));
        }
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        match url::Url::parse(url) {
            Ok(parsed) if parsed.scheme() == "http" || parsed.scheme() == "https" => {
                self.fetch_http(url)
            }
            Ok(parsed) if parsed.scheme() == "file" => {
                let path = parsed.to_file_path().map_err(|_| Error::Network {
                    url: url.to_string(),
                    message: "not a local file path".to_string(),
                })?;
                read_local(url, &path)
            }
            Ok(parsed) => Err(Error::Network {
                url: url.to_string(),
                message: format!("unsupported URL scheme: {}", parsed.scheme()),
            }),
            // Plain filesystem paths
            Err(_) => read_local(url, Path::new(url)),
        }
    }
}

fn read_local(url: &str, path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| Error::Network {
        url: url.to_string(),
        message: e.to_string(),
    })
}

/// On-disk cache of verified payloads keyed by their checksum
///
/// Entries are re-verified on every hit; an entry that no longer matches
/// is evicted.
#[derive(Debug, Clone)]
pub struct SourceCache {
    dir: PathBuf,
}

impl SourceCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, checksum: &Checksum) -> PathBuf {
        self.dir.join(checksum.cache_key())
    }

    /// Whether an entry exists, without verifying it
    pub fn contains(&self, checksum: &Checksum) -> bool {
        self.path_for(checksum).exists()
    }

    /// Cached bytes for `checksum`, if present and still matching
    pub fn get(&self, checksum: &Checksum) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(checksum);
        if !path.exists() {
            return Ok(None);
        }

        debug!("Using cached source: {}", path.display());
        match verify_file(&path, checksum)? {
            Ok(_) => Ok(Some(fs::read(&path)?)),
            Err(mismatch) => {
                warn!("Cached file {} is corrupt ({}), evicting", path.display(), mismatch);
                fs::remove_file(&path)?;
                Ok(None)
            }
        }
    }

    /// Store verified bytes, returning the cache path
    pub fn put(&self, checksum: &Checksum, data: &[u8]) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(checksum);
        let mut temp = NamedTempFile::new_in(&self.dir)?;
        temp.write_all(data)?;
        temp.persist(&path).map_err(|e| e.error)?;
        info!("Cached {} ({} bytes)", path.display(), data.len());
        Ok(path)
    }
}
