use crate::{LogFormat, StackConfig, WorkerType};
use anyhow::{anyhow, Context, Result};
use std::path::PathBuf;

pub const ENV_PREFIX: &str = "ENTERPRISE_REPO_";

/// Abstraction over environment-variable lookups so tests (and callers that
/// assemble their environment elsewhere) can supply their own source.
pub trait EnvSource {
    fn get(&self, key: &str) -> Option<String>;

    /// Get an environment variable WITHOUT the ENTERPRISE_REPO_ prefix
    /// Used for CDK/AWS standard variables (CDK_DEFAULT_ACCOUNT, AWS_REGION, etc.)
    fn get_raw(&self, key: &str) -> Option<String>;
}

impl EnvSource for std::collections::HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        std::collections::HashMap::get(self, &format!("{}{}", ENV_PREFIX, key)).cloned()
    }

    fn get_raw(&self, key: &str) -> Option<String> {
        std::collections::HashMap::get(self, key).cloned()
    }
}

/// Apply environment-variable overrides to the stack config.
pub fn apply_env_overrides<E: EnvSource>(config: &mut StackConfig, env: &E) -> Result<()> {
    // Stack identity
    if let Some(name) = get_env_string(env, "STACK_NAME") {
        config.stack.name = name;
    }
    if let Some(dir) = get_env_string(env, "OUTPUT_DIR") {
        config.stack.output_dir = PathBuf::from(dir);
    }

    // Account: prefixed name wins over the CDK standard name
    if let Some(account) =
        get_env_string(env, "ACCOUNT_ID").or_else(|| env.get_raw("CDK_DEFAULT_ACCOUNT"))
    {
        config.environment.account_id = account;
    }
    if let Some(region) = get_env_string(env, "REGION")
        .or_else(|| env.get_raw("CDK_DEFAULT_REGION"))
        .or_else(|| env.get_raw("AWS_REGION"))
    {
        config.environment.region = Some(region).filter(|r| !r.is_empty());
    }

    // Network
    if let Some(cidr) = get_env_string(env, "CIDR_BLOCK") {
        config.network.cidr_block = cidr;
    }
    if let Some(max_azs) = get_env_parsed::<u8, _>(env, "MAX_AZS")? {
        config.network.max_azs = max_azs;
    }
    if let Some(mask) = get_env_parsed::<u8, _>(env, "SUBNET_CIDR_MASK")? {
        config.network.subnet_cidr_mask = mask;
    }

    // Storage
    if let Some(dir) = get_env_string(env, "SEED_DIR") {
        config.storage.seed_dir = PathBuf::from(dir);
    }
    if let Some(auto_delete) = get_env_parsed::<bool, _>(env, "AUTO_DELETE_OBJECTS")? {
        config.storage.auto_delete_objects = auto_delete;
    }

    // Glue
    if let Some(path) = get_env_string(env, "GLUE_SCRIPT_PATH") {
        config.glue.script_path = PathBuf::from(path);
    }
    if let Some(count) = get_env_parsed::<u32, _>(env, "GLUE_WORKER_COUNT")? {
        config.glue.worker_count = count;
    }
    if let Some(worker_type) = get_env_string(env, "GLUE_WORKER_TYPE") {
        config.glue.worker_type = worker_type
            .parse::<WorkerType>()
            .context("Invalid ENTERPRISE_REPO_GLUE_WORKER_TYPE value")?;
    }
    if let Some(timeout) = get_env_parsed::<u32, _>(env, "GLUE_TIMEOUT_MINUTES")? {
        config.glue.timeout_minutes = timeout;
    }

    // Orchestration
    if let Some(path) = get_env_string(env, "STATE_MACHINE_TEMPLATE") {
        config.orchestration.template_path = PathBuf::from(path);
    }

    // Compliance
    if let Some(fail) = get_env_parsed::<bool, _>(env, "FAIL_ON_FINDINGS")? {
        config.compliance.fail_on_findings = fail;
    }

    // Logging
    if let Some(level) = get_env_string(env, "LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(format) = get_env_string(env, "LOG_FORMAT") {
        config.logging.format = format
            .parse::<LogFormat>()
            .context("Invalid ENTERPRISE_REPO_LOG_FORMAT value")?;
    }

    Ok(())
}

fn get_env_string<E: EnvSource>(env: &E, key: &str) -> Option<String> {
    env.get(key)
}

fn get_env_parsed<T, E>(env: &E, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    E: EnvSource,
{
    match get_env_string(env, key) {
        Some(val) => {
            let parsed = val
                .parse::<T>()
                .map_err(|e| anyhow!("Failed to parse {}{}: {}", ENV_PREFIX, key, e))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}
