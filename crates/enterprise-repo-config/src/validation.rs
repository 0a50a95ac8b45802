// Configuration validation
//
// Validates that required fields are present and values are sensible before
// anything is synthesized.

use crate::*;
use anyhow::{bail, Result};
use std::net::Ipv4Addr;
use tracing::warn;

pub fn validate_config(config: &StackConfig) -> Result<()> {
    validate_stack_settings(&config.stack)?;
    validate_environment(&config.environment)?;
    validate_network_config(&config.network)?;
    validate_artifact_config(&config.artifact)?;
    validate_storage_config(&config.storage)?;
    validate_glue_config(&config.glue)?;
    validate_orchestration_config(&config.orchestration)?;
    validate_compliance_config(&config.compliance)?;
    Ok(())
}

fn validate_stack_settings(config: &StackSettings) -> Result<()> {
    if config.name.is_empty() {
        bail!("stack.name must not be empty");
    }
    if !config.name.starts_with(|c: char| c.is_ascii_alphabetic())
        || !config
            .name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-')
    {
        bail!(
            "stack.name '{}' must start with a letter and contain only letters, digits and hyphens",
            config.name
        );
    }
    Ok(())
}

fn validate_environment(config: &EnvironmentConfig) -> Result<()> {
    if config.account_id.is_empty() {
        bail!("environment.account_id is required (set it in the config file, ENTERPRISE_REPO_ACCOUNT_ID or CDK_DEFAULT_ACCOUNT)");
    }
    if config.account_id.len() != 12 || !config.account_id.chars().all(|c| c.is_ascii_digit()) {
        bail!(
            "environment.account_id '{}' must be a 12-digit AWS account id",
            config.account_id
        );
    }
    if let Some(region) = &config.region {
        validate_region(region)?;
    }
    Ok(())
}

fn validate_region(region: &str) -> Result<()> {
    let parts: Vec<&str> = region.split('-').collect();
    let well_formed = parts.len() >= 3
        && parts
            .iter()
            .all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()))
        && parts
            .last()
            .is_some_and(|p| p.chars().all(|c| c.is_ascii_digit()));
    if !well_formed {
        bail!("environment.region '{}' is not a valid AWS region name", region);
    }
    Ok(())
}

fn validate_network_config(config: &NetworkConfig) -> Result<()> {
    if config.vpc_name.is_empty() {
        bail!("network.vpc_name must not be empty");
    }

    let Some((addr, prefix)) = config.cidr_block.split_once('/') else {
        bail!(
            "network.cidr_block '{}' must be in format 'a.b.c.d/n'",
            config.cidr_block
        );
    };
    if addr.parse::<Ipv4Addr>().is_err() {
        bail!("network.cidr_block '{}' has an invalid address", config.cidr_block);
    }
    let prefix: u8 = match prefix.parse() {
        Ok(p) if (16..=28).contains(&p) => p,
        _ => bail!(
            "network.cidr_block '{}' must have a prefix between /16 and /28",
            config.cidr_block
        ),
    };

    if !(16..=28).contains(&config.subnet_cidr_mask) {
        bail!("network.subnet_cidr_mask must be between 16 and 28");
    }
    if config.subnet_cidr_mask < prefix {
        bail!(
            "network.subnet_cidr_mask /{} is larger than the VPC block /{}",
            config.subnet_cidr_mask,
            prefix
        );
    }

    if config.max_azs == 0 {
        bail!("network.max_azs must be greater than 0");
    }
    let capacity = 1u64 << (config.subnet_cidr_mask - prefix);
    if u64::from(config.max_azs) > capacity {
        bail!(
            "network.max_azs ({}) subnets of /{} do not fit in {}",
            config.max_azs,
            config.subnet_cidr_mask,
            config.cidr_block
        );
    }
    if config.max_azs > 3 {
        warn!(
            max_azs = config.max_azs,
            "network.max_azs is larger than most regions can offer"
        );
    }

    if !config.subnet_parameter_prefix.starts_with('/') {
        bail!("network.subnet_parameter_prefix must start with '/'");
    }
    if config.flow_log_retention_days == 0 {
        bail!("network.flow_log_retention_days must be greater than 0");
    }
    Ok(())
}

fn validate_artifact_config(config: &ArtifactConfig) -> Result<()> {
    for (field, value) in [
        ("artifact.domain_name", &config.domain_name),
        ("artifact.pypi_repo_name", &config.pypi_repo_name),
        ("artifact.repo_name", &config.repo_name),
    ] {
        if value.len() < 2 || value.len() > 100 {
            bail!("{} must be 2-100 characters", field);
        }
        if !value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
        {
            bail!("{} '{}' contains invalid characters", field, value);
        }
    }
    if config.domain_name.chars().any(|c| c.is_ascii_uppercase()) {
        bail!("artifact.domain_name must be lowercase");
    }
    if config.pypi_repo_name == config.repo_name {
        bail!("artifact.pypi_repo_name and artifact.repo_name must differ");
    }
    if config.external_connection.is_empty() {
        bail!("artifact.external_connection must not be empty");
    }
    Ok(())
}

fn validate_storage_config(config: &StorageConfig) -> Result<()> {
    validate_bucket_prefix(&config.bucket_prefix)
        .map_err(|e| anyhow::anyhow!("storage.bucket_prefix: {}", e))?;
    if config.seed_key_prefix.is_empty() || config.seed_key_prefix.starts_with('/') {
        bail!("storage.seed_key_prefix must be a non-empty relative key prefix");
    }
    if config.asset_key_prefix.is_empty() || config.asset_key_prefix.starts_with('/') {
        bail!("storage.asset_key_prefix must be a non-empty relative key prefix");
    }
    if config.seed_key_prefix.trim_end_matches('/') == config.asset_key_prefix.trim_end_matches('/') {
        bail!("storage.seed_key_prefix and storage.asset_key_prefix must differ");
    }
    Ok(())
}

fn validate_bucket_prefix(input: &str) -> std::result::Result<(), String> {
    if input.is_empty() {
        return Err("Bucket name prefix cannot be empty".to_string());
    }
    // prefix + "-" + 5 digit suffix + "-" + region must stay within 63 characters
    if input.len() > 30 {
        return Err("Bucket name prefix must be at most 30 characters".to_string());
    }
    if !input
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(
            "Bucket name must contain only lowercase letters, numbers, and hyphens".to_string(),
        );
    }
    if input.starts_with('-') || input.ends_with('-') {
        return Err("Bucket name cannot start or end with a hyphen".to_string());
    }
    Ok(())
}

fn validate_glue_config(config: &GlueConfig) -> Result<()> {
    if config.database_name.is_empty()
        || config.database_name.chars().any(|c| c.is_ascii_uppercase())
    {
        bail!("glue.database_name must be a non-empty lowercase name");
    }
    for (field, value) in [
        ("glue.connection_name", &config.connection_name),
        ("glue.job_name", &config.job_name),
        ("glue.role_name", &config.role_name),
        ("glue.policy_name", &config.policy_name),
    ] {
        if value.is_empty() {
            bail!("{} must not be empty", field);
        }
    }
    if config.worker_count == 0 {
        bail!("glue.worker_count must be greater than 0");
    }
    if config.worker_type != WorkerType::Standard && config.worker_count < 2 {
        bail!(
            "glue.worker_count must be at least 2 for worker type {}",
            config.worker_type
        );
    }
    if config.timeout_minutes == 0 {
        bail!("glue.timeout_minutes must be greater than 0");
    }
    if config.timeout_minutes > 2880 {
        bail!("glue.timeout_minutes must not exceed 2880 (48 hours)");
    }
    if config.max_retries > 10 {
        bail!("glue.max_retries must not exceed 10");
    }
    if config.glue_version.is_empty() {
        bail!("glue.glue_version must not be empty");
    }
    Ok(())
}

fn validate_orchestration_config(config: &OrchestrationConfig) -> Result<()> {
    if config.state_machine_name.is_empty() || config.state_machine_name.len() > 80 {
        bail!("orchestration.state_machine_name must be 1-80 characters");
    }
    if config.url_state.is_empty() || config.url_parameter.is_empty() {
        bail!("orchestration.url_state and orchestration.url_parameter must not be empty");
    }
    if !config.url_parameter.ends_with(".$") {
        warn!(
            parameter = %config.url_parameter,
            "orchestration.url_parameter does not end with '.$'; the format string will be passed literally"
        );
    }
    Ok(())
}

fn validate_compliance_config(config: &ComplianceConfig) -> Result<()> {
    for suppression in &config.suppressions {
        if suppression.id.is_empty() {
            bail!("compliance.suppressions entries need an id");
        }
        // Suppressions without a reason are rejected, same as the rule packs do
        if suppression.reason.trim().len() < 10 {
            bail!(
                "compliance suppression '{}' needs a reason of at least 10 characters",
                suppression.id
            );
        }
        if is_placeholder_reason(&suppression.reason) {
            warn!(
                rule = %suppression.id,
                "compliance suppression reason is still a TODO placeholder"
            );
        }
    }
    Ok(())
}

fn is_placeholder_reason(reason: &str) -> bool {
    reason.trim_start().to_ascii_uppercase().starts_with("TODO")
}
