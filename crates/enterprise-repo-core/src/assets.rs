//! File assets shipped alongside the template.
//!
//! Each entry maps a local file to a bucket key. Bucket names may still
//! carry `${AWS::Region}` / `${AWS::AccountId}` placeholders; they are
//! resolved with [`AssetManifest::resolve`] once the deployment target is
//! known.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

use crate::error::{Result, SynthError};

pub const MANIFEST_FILE: &str = "assets.json";
pub const MANIFEST_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetEntry {
    pub id: String,
    pub source: PathBuf,
    pub bucket: String,
    pub key: String,
    /// BLAKE3 of the content, hex encoded
    pub hash: String,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetManifest {
    pub version: u32,
    pub assets: Vec<AssetEntry>,
}

impl Default for AssetManifest {
    fn default() -> Self {
        Self {
            version: MANIFEST_VERSION,
            assets: Vec::new(),
        }
    }
}

pub fn hash_bytes(content: &[u8]) -> String {
    hex::encode(blake3::hash(content).as_bytes())
}

fn read(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| SynthError::asset(path.display().to_string(), e.to_string()))
}

impl AssetManifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AssetEntry> {
        self.assets.iter()
    }

    pub fn get(&self, id: &str) -> Option<&AssetEntry> {
        self.assets.iter().find(|a| a.id == id)
    }

    /// Total bytes across all assets
    pub fn total_size(&self) -> u64 {
        self.assets.iter().map(|a| a.size).sum()
    }

    fn push(&mut self, entry: AssetEntry) -> Result<&AssetEntry> {
        if let Some(existing) = self
            .assets
            .iter()
            .find(|a| a.id == entry.id || (a.bucket == entry.bucket && a.key == entry.key))
        {
            return Err(SynthError::asset(
                entry.source.display().to_string(),
                format!(
                    "collides with asset '{}' at s3://{}/{}",
                    existing.id, existing.bucket, existing.key
                ),
            ));
        }
        debug!(id = %entry.id, key = %entry.key, size = entry.size, "Staged asset");
        let index = self.assets.len();
        self.assets.push(entry);
        Ok(&self.assets[index])
    }

    /// Stage one file at a fixed key
    pub fn add_file(
        &mut self,
        id: impl Into<String>,
        source: impl AsRef<Path>,
        bucket: &str,
        key: impl Into<String>,
    ) -> Result<&AssetEntry> {
        let source = source.as_ref();
        let content = read(source)?;
        self.push(AssetEntry {
            id: id.into(),
            source: source.to_path_buf(),
            bucket: bucket.to_string(),
            key: key.into(),
            hash: hash_bytes(&content),
            size: content.len() as u64,
        })
    }

    /// Stage a file under `<prefix>/<content hash>/<file name>`
    pub fn add_content_addressed(
        &mut self,
        id: impl Into<String>,
        source: impl AsRef<Path>,
        bucket: &str,
        prefix: &str,
    ) -> Result<&AssetEntry> {
        let source = source.as_ref();
        let file_name = source
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| SynthError::asset(source.display().to_string(), "has no file name"))?;
        let content = read(source)?;
        let hash = hash_bytes(&content);
        self.push(AssetEntry {
            id: id.into(),
            source: source.to_path_buf(),
            bucket: bucket.to_string(),
            key: join_key(&[prefix, &hash, file_name]),
            hash,
            size: content.len() as u64,
        })
    }

    /// Stage every file below `dir`, keeping relative paths under `prefix`.
    /// Returns the number of files added.
    pub fn add_directory(
        &mut self,
        id_prefix: &str,
        dir: impl AsRef<Path>,
        bucket: &str,
        prefix: &str,
    ) -> Result<usize> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(SynthError::asset(
                dir.display().to_string(),
                "is not a directory",
            ));
        }

        let mut added = 0;
        for entry in WalkDir::new(dir).sort_by_file_name() {
            let entry = entry
                .map_err(|e| SynthError::asset(dir.display().to_string(), e.to_string()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(dir)
                .map_err(|e| SynthError::asset(entry.path().display().to_string(), e.to_string()))?;
            let relative: Vec<String> = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            let relative = relative.join("/");

            self.add_file(
                format!("{}:{}", id_prefix, relative),
                entry.path(),
                bucket,
                join_key(&[prefix, &relative]),
            )?;
            added += 1;
        }
        Ok(added)
    }

    /// Copy with bucket-name placeholders filled in
    pub fn resolve(&self, account_id: &str, region: &str) -> AssetManifest {
        let assets = self
            .assets
            .iter()
            .map(|asset| AssetEntry {
                bucket: asset
                    .bucket
                    .replace("${AWS::Region}", region)
                    .replace("${AWS::AccountId}", account_id),
                ..asset.clone()
            })
            .collect();
        AssetManifest {
            version: self.version,
            assets,
        }
    }

    /// True if any bucket name still has a placeholder
    pub fn is_resolved(&self) -> bool {
        self.assets.iter().all(|a| !a.bucket.contains("${"))
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_json()?)
            .map_err(|e| SynthError::asset(path.display().to_string(), e.to_string()))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| SynthError::asset(path.display().to_string(), e.to_string()))?;
        Self::from_json(&text)
    }

    /// Distinct bucket names, in first-seen order
    pub fn buckets(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.assets
            .iter()
            .map(|a| a.bucket.as_str())
            .filter(|b| seen.insert(*b))
            .collect()
    }
}

fn join_key(parts: &[&str]) -> String {
    parts
        .iter()
        .map(|p| p.trim_matches('/'))
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}
