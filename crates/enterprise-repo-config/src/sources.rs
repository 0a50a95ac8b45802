// Configuration source loading.
//
// Priority order:
// 1. Environment variables (ENTERPRISE_REPO_* prefix, plus CDK/AWS standard names)
// 2. Config file path from ENTERPRISE_REPO_CONFIG
// 3. Default config file (./enterprise-repo.toml)
// 4. Built-in defaults

use crate::env_overrides::{self, EnvSource, ENV_PREFIX};
use crate::*;
use anyhow::{Context, Result};
use std::env;
use std::path::Path;

const DEFAULT_CONFIG_FILE: &str = "./enterprise-repo.toml";

/// Load configuration from the default file locations and the process environment.
/// Not validated: callers apply their own overrides first, then `validate()`.
pub fn load_config() -> Result<StackConfig> {
    let mut config = match load_from_file()? {
        Some(file_config) => file_config,
        None => StackConfig::default(),
    };

    env_overrides::apply_env_overrides(&mut config, &StdEnvSource)?;
    Ok(config)
}

/// Load configuration from a specific file path (for CLI --config flag).
/// Returns error if file doesn't exist or can't be parsed.
pub fn load_from_file_path(path: impl AsRef<Path>) -> Result<StackConfig> {
    let path = path.as_ref();
    let mut config = read_file(path)?;

    env_overrides::apply_env_overrides(&mut config, &StdEnvSource)?;
    Ok(config)
}

pub fn parse_toml(content: &str) -> Result<StackConfig> {
    toml::from_str(content).context("Failed to parse stack configuration")
}

fn load_from_file() -> Result<Option<StackConfig>> {
    if let Ok(path) = env::var(format!("{}CONFIG", ENV_PREFIX)) {
        return read_file(Path::new(&path)).map(Some);
    }

    let default_path = Path::new(DEFAULT_CONFIG_FILE);
    if default_path.exists() {
        return read_file(default_path).map(Some);
    }

    Ok(None)
}

fn read_file(path: &Path) -> Result<StackConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    tracing::debug!(path = %path.display(), "Loaded stack configuration file");
    parse_toml(&content).with_context(|| format!("Failed to parse config file: {}", path.display()))
}

struct StdEnvSource;

impl EnvSource for StdEnvSource {
    fn get(&self, key: &str) -> Option<String> {
        env::var(format!("{}{}", ENV_PREFIX, key)).ok()
    }

    fn get_raw(&self, key: &str) -> Option<String> {
        env::var(key).ok()
    }
}
