// enterprise-repo-config - Stack configuration for the synthesizer and CLI
//
// Supports configuration from multiple sources:
// 1. CLI flags (highest priority, applied by the binary)
// 2. Environment variables (ENTERPRISE_REPO_* plus CDK_DEFAULT_ACCOUNT/CDK_DEFAULT_REGION/AWS_REGION)
// 3. Config file path from --config or ENTERPRISE_REPO_CONFIG
// 4. Default config file location (./enterprise-repo.toml)
// 5. Built-in defaults (lowest priority)
//
// The synthesizer never reads the environment itself; everything it needs is
// carried by `StackConfig`.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub mod env_overrides;
mod sources;
mod validation;

pub use env_overrides::{EnvSource, ENV_PREFIX};

/// Complete stack configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StackConfig {
    pub stack: StackSettings,
    pub environment: EnvironmentConfig,
    pub network: NetworkConfig,
    pub artifact: ArtifactConfig,
    pub storage: StorageConfig,
    pub glue: GlueConfig,
    pub orchestration: OrchestrationConfig,
    pub compliance: ComplianceConfig,
    pub logging: LoggingConfig,
}

/// Stack identity and synthesis output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StackSettings {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub output_dir: PathBuf,
}

impl Default for StackSettings {
    fn default() -> Self {
        Self {
            name: "ApplicationStack".to_string(),
            description: None,
            output_dir: PathBuf::from("./stack.out"),
        }
    }
}

/// Target account and region.
///
/// `region = None` keeps the template environment-agnostic: region-dependent
/// names are emitted with the `${AWS::Region}` pseudo parameter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentConfig {
    pub account_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub vpc_name: String,
    pub cidr_block: String,
    pub max_azs: u8,
    pub subnet_cidr_mask: u8,
    pub subnet_name: String,
    pub subnet_parameter_prefix: String,
    pub flow_log_retention_days: u32,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            vpc_name: "enterprise-repo-vpc".to_string(),
            cidr_block: "192.168.50.0/24".to_string(),
            max_azs: 1,
            subnet_cidr_mask: 26,
            subnet_name: "Enterprise-Repo-Private-".to_string(),
            subnet_parameter_prefix: "/enterprise-repo/private-subnet-".to_string(),
            flow_log_retention_days: 731,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactConfig {
    pub domain_name: String,
    pub pypi_repo_name: String,
    pub repo_name: String,
    pub external_connection: String,
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            domain_name: "enterprise-repo-domain".to_string(),
            pypi_repo_name: "pypi-store".to_string(),
            repo_name: "enterprise-repo".to_string(),
            external_connection: "public:pypi".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub bucket_prefix: String,
    pub seed_dir: PathBuf,
    pub seed_key_prefix: String,
    pub asset_key_prefix: String,
    pub auto_delete_objects: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            bucket_prefix: "codeartifactblog".to_string(),
            seed_dir: PathBuf::from("./scripts/s3"),
            seed_key_prefix: "data".to_string(),
            asset_key_prefix: "assets".to_string(),
            auto_delete_objects: true,
        }
    }
}

/// Glue worker types accepted by the job definition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkerType {
    Standard,
    #[serde(rename = "G.025X")]
    G025X,
    #[serde(rename = "G.1X")]
    G1X,
    #[serde(rename = "G.2X")]
    G2X,
}

impl WorkerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerType::Standard => "Standard",
            WorkerType::G025X => "G.025X",
            WorkerType::G1X => "G.1X",
            WorkerType::G2X => "G.2X",
        }
    }
}

impl std::fmt::Display for WorkerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for WorkerType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "STANDARD" => Ok(WorkerType::Standard),
            "G.025X" | "G025X" => Ok(WorkerType::G025X),
            "G.1X" | "G1X" => Ok(WorkerType::G1X),
            "G.2X" | "G2X" => Ok(WorkerType::G2X),
            _ => anyhow::bail!(
                "Unsupported Glue worker type: {}. Supported: Standard, G.025X, G.1X, G.2X",
                s
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlueConfig {
    pub database_name: String,
    pub connection_name: String,
    pub security_group_description: String,
    pub job_name: String,
    pub job_description: String,
    pub role_name: String,
    pub policy_name: String,
    pub script_path: PathBuf,
    pub glue_version: String,
    pub python_version: String,
    pub worker_type: WorkerType,
    pub worker_count: u32,
    pub timeout_minutes: u32,
    pub max_retries: u32,
    pub additional_python_modules: Vec<String>,
    pub continuous_logging: bool,
    pub profiling_metrics: bool,
}

impl Default for GlueConfig {
    fn default() -> Self {
        Self {
            database_name: "codeartifactblog_glue_db".to_string(),
            connection_name: "enterprise-repo-glue-connection".to_string(),
            security_group_description: "Security Group for Glue Connection".to_string(),
            job_name: "enterprise-repo-glue-job".to_string(),
            job_description: "an example Python ETL job".to_string(),
            role_name: "enterprise_repo_glue_job_role".to_string(),
            policy_name: "enterprise-repo-glue-job-policy".to_string(),
            script_path: PathBuf::from("./scripts/glue/job.py"),
            glue_version: "3.0".to_string(),
            python_version: "3".to_string(),
            worker_type: WorkerType::G1X,
            worker_count: 3,
            timeout_minutes: 20,
            max_retries: 0,
            additional_python_modules: vec!["awswrangler".to_string()],
            continuous_logging: true,
            profiling_metrics: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestrationConfig {
    pub template_path: PathBuf,
    pub state_machine_name: String,
    pub role_name: String,
    pub policy_name: String,
    /// State whose parameters receive the index-url format string
    pub url_state: String,
    /// Parameter key rewritten inside `url_state`
    pub url_parameter: String,
}

impl Default for OrchestrationConfig {
    fn default() -> Self {
        Self {
            template_path: PathBuf::from("./scripts/statemachine/sfn.json"),
            state_machine_name: "enterprise-repo-step-function".to_string(),
            role_name: "enterprise_repo_sfn_role".to_string(),
            policy_name: "enterprise-repo-sfn-policy".to_string(),
            url_state: "GenerateCodeArtifactURL".to_string(),
            url_parameter: "codeartifacturl.$".to_string(),
        }
    }
}

/// A stack-wide compliance suppression
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suppression {
    pub id: String,
    pub reason: String,
}

impl Suppression {
    pub fn new(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComplianceConfig {
    pub fail_on_findings: bool,
    pub suppressions: Vec<Suppression>,
}

impl Default for ComplianceConfig {
    fn default() -> Self {
        Self {
            fail_on_findings: true,
            suppressions: vec![
                Suppression::new(
                    "AwsSolutions-S1",
                    "TODO: Set *server_access_logs_bucket* and *server_access_logs_prefix* to enable server access logging.",
                ),
                Suppression::new("AwsSolutions-IAM4", "TODO: Stop using AWS managed policies."),
                Suppression::new("AwsSolutions-IAM5", "TODO: Remove Wildcards in IAM roles."),
                Suppression::new(
                    "AwsSolutions-SF2",
                    "TODO: Set the X-Ray Tracing on the Step Function.",
                ),
                Suppression::new(
                    "AwsSolutions-SF1",
                    "TODO: Set the Step Function CloudWatch Logs log events to 'ALL' ",
                ),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => anyhow::bail!("Unsupported log format: {}. Supported: text, json", s),
        }
    }
}

impl StackConfig {
    /// Load configuration from the default file location and the process environment
    pub fn load() -> Result<Self> {
        sources::load_config()
    }

    /// Load configuration starting from an explicit file (CLI --config flag)
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        sources::load_from_file_path(path)
    }

    /// Parse a TOML document; missing keys fall back to defaults
    pub fn from_toml_str(content: &str) -> Result<Self> {
        sources::parse_toml(content)
    }

    /// Apply environment overrides from an arbitrary source
    pub fn apply_env<E: EnvSource>(&mut self, env: &E) -> Result<()> {
        env_overrides::apply_env_overrides(self, env)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        validation::validate_config(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_type_from_str() {
        assert_eq!("G.1X".parse::<WorkerType>().unwrap(), WorkerType::G1X);
        assert_eq!("g.2x".parse::<WorkerType>().unwrap(), WorkerType::G2X);
        assert_eq!(
            "standard".parse::<WorkerType>().unwrap(),
            WorkerType::Standard
        );
        assert!("G.8X".parse::<WorkerType>().is_err());
    }

    #[test]
    fn test_default_configs() {
        let config = StackConfig::default();
        assert_eq!(config.network.cidr_block, "192.168.50.0/24");
        assert_eq!(config.network.max_azs, 1);
        assert_eq!(config.network.subnet_cidr_mask, 26);
        assert_eq!(config.glue.worker_count, 3);
        assert_eq!(config.glue.worker_type, WorkerType::G1X);
        assert_eq!(config.glue.timeout_minutes, 20);
        assert_eq!(config.glue.max_retries, 0);
        assert_eq!(config.compliance.suppressions.len(), 5);
        assert!(config.compliance.suppressions.iter().all(|s| s.reason.starts_with("TODO")));
        assert_eq!(config.logging.format, LogFormat::Text);
    }

    #[test]
    fn test_worker_type_serde_names() {
        let toml = "[glue]\nworker_type = \"G.2X\"\n";
        let config = StackConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.glue.worker_type, WorkerType::G2X);
        assert_eq!(config.glue.worker_count, 3);
    }
}
