//! Local cache of pretrained centroid models, refreshable from a remote index.
//!
//! ```text
//! <dir>/
//!   immune_basic.json      CentroidModel
//!   lung_atlas.json
//!   .staging/              downloads land here, then move into <dir>
//! ```
//!
//! The index at `index_url` is a JSON list:
//! `[{"name": "immune_basic", "url": "https://...", "sha256": "..."}]`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;

use crate::data::CentroidModel;
use crate::tools::tool_interface::ToolError;
use crate::utilities::temp_folder::{DirectoryCloseMode, TemporaryFolder};

const STAGING_DIR: &str = ".staging";
const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 300;

/// One downloadable model listed by the remote index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelIndexEntry {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub sha256: Option<String>,
}

/// Directory of `<name>.json` models with an optional remote index.
#[derive(Debug, Clone)]
pub struct ModelStore {
    dir: PathBuf,
    index_url: Option<String>,
    timeout: Duration,
}

impl ModelStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            index_url: None,
            timeout: Duration::from_secs(DEFAULT_DOWNLOAD_TIMEOUT_SECS),
        }
    }

    pub fn with_index_url(mut self, url: impl Into<String>) -> Self {
        self.index_url = Some(url.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn index_url(&self) -> Option<&str> {
        self.index_url.as_deref()
    }

    /// Request timeout for index and model downloads.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Whether the cache directory exists or can be created.
    pub fn is_usable(&self) -> bool {
        std::fs::create_dir_all(&self.dir).is_ok() && self.dir.is_dir()
    }

    pub fn model_path(&self, name: &str) -> Result<PathBuf, ToolError> {
        validate_name(name)?;
        Ok(self.dir.join(format!("{name}.json")))
    }

    /// Names of the models currently cached, sorted.
    pub fn available(&self) -> Result<Vec<String>, ToolError> {
        if !self.dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.is_file() && path.extension().map_or(false, |ext| ext == "json") {
                if let Some(stem) = path.file_stem() {
                    names.push(stem.to_string_lossy().to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    /// Read a cached model by name.
    pub async fn load(&self, name: &str) -> Result<CentroidModel, ToolError> {
        let path = self.model_path(name)?;
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ToolError::ModelNotFound(name.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        let model: CentroidModel = serde_json::from_slice(&bytes)?;
        log::debug!("Loaded model `{}` from {}", name, path.display());
        Ok(match model.name() {
            Some(_) => model,
            None => model.with_name(name),
        })
    }

    /// Fetch the remote index and download models into the cache.
    ///
    /// Models already cached are skipped unless `force` is set. Returns the
    /// names that were downloaded.
    pub async fn update(&self, force: bool) -> Result<Vec<String>, ToolError> {
        let index_url = self.index_url.as_deref().ok_or_else(|| {
            ToolError::ModelStore("no model index URL is configured".to_string())
        })?;

        let client = reqwest::Client::builder().timeout(self.timeout).build()?;
        log::debug!("Fetching model index from {}", index_url);
        let entries: Vec<ModelIndexEntry> = client
            .get(index_url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        tokio::fs::create_dir_all(&self.dir).await?;
        let staging = TemporaryFolder::open(
            self.dir.join(STAGING_DIR),
            DirectoryCloseMode::DeleteDirectory,
        )?;

        let mut downloaded = Vec::new();
        for entry in &entries {
            let target = self.model_path(&entry.name)?;
            if !force && target.exists() {
                log::debug!("Model `{}` already cached, skipping", entry.name);
                continue;
            }
            let staged = staging.path().join(format!("{}.json", entry.name));
            self.download(&client, entry, &staged).await?;
            tokio::fs::rename(&staged, &target).await?;
            log::info!("Downloaded model `{}`", entry.name);
            downloaded.push(entry.name.clone());
        }
        Ok(downloaded)
    }

    async fn download(
        &self,
        client: &reqwest::Client,
        entry: &ModelIndexEntry,
        staged: &Path,
    ) -> Result<(), ToolError> {
        let response = client.get(&entry.url).send().await?.error_for_status()?;
        let mut stream = response.bytes_stream();
        let mut file = tokio::fs::File::create(staged).await?;
        let mut hasher = Sha256::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            hasher.update(&chunk);
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        drop(file);

        if let Some(expected) = &entry.sha256 {
            verify_checksum(&entry.name, expected, &hex::encode(hasher.finalize()))?;
        }
        // Reject files that are not valid models before they reach the cache.
        let bytes = tokio::fs::read(staged).await?;
        serde_json::from_slice::<CentroidModel>(&bytes)?;
        Ok(())
    }
}

fn validate_name(name: &str) -> Result<(), ToolError> {
    let valid = !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if valid {
        Ok(())
    } else {
        Err(ToolError::ModelStore(format!("invalid model name `{name}`")))
    }
}

fn verify_checksum(name: &str, expected: &str, actual: &str) -> Result<(), ToolError> {
    if expected.eq_ignore_ascii_case(actual) {
        Ok(())
    } else {
        Err(ToolError::ChecksumMismatch {
            name: name.to_string(),
            expected: expected.to_lowercase(),
            actual: actual.to_string(),
        })
    }
}
