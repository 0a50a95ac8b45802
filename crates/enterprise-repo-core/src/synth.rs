//! Single-pass synthesis: config + local inputs -> template, assets, report.

use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

use enterprise_repo_config::StackConfig;

use crate::assets::{AssetManifest, MANIFEST_FILE};
use crate::compliance::{self, ComplianceReport};
use crate::error::{Result, SynthError};
use crate::naming;
use crate::stack::{self, Stack, StackInputs};
use crate::statemachine::StateMachineTemplate;

pub const TEMPLATE_FILE: &str = "template.json";
pub const SCRIPT_ASSET_ID: &str = "glue-script";
pub const SEED_ASSET_PREFIX: &str = "seed";

/// Local files the stack is built from
#[derive(Debug, Clone)]
pub struct SynthInputs {
    pub definition: StateMachineTemplate,
    pub script_path: PathBuf,
    pub seed_dir: PathBuf,
}

impl SynthInputs {
    /// Load the state machine template from the configured path
    pub fn from_config(config: &StackConfig) -> Result<Self> {
        Ok(Self {
            definition: StateMachineTemplate::load(&config.orchestration.template_path)?,
            script_path: config.glue.script_path.clone(),
            seed_dir: config.storage.seed_dir.clone(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct Synthesis {
    pub stack: Stack,
    pub assets: AssetManifest,
    pub compliance: ComplianceReport,
}

impl Synthesis {
    pub fn template_json(&self) -> Result<Value> {
        self.stack.template.to_json()
    }

    pub fn render_template(&self) -> Result<String> {
        self.stack.template.render()
    }

    /// Write `template.json` and `assets.json` into `out_dir`
    pub fn write(&self, out_dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
        let out_dir = out_dir.as_ref();
        std::fs::create_dir_all(out_dir).map_err(|e| {
            SynthError::invalid_config(format!("cannot create {}: {}", out_dir.display(), e))
        })?;

        let template_path = out_dir.join(TEMPLATE_FILE);
        std::fs::write(&template_path, self.render_template()?).map_err(|e| {
            SynthError::invalid_config(format!("cannot write {}: {}", template_path.display(), e))
        })?;
        let manifest_path = out_dir.join(MANIFEST_FILE);
        self.assets.write(&manifest_path)?;

        info!(
            template = %template_path.display(),
            assets = %manifest_path.display(),
            "Wrote stack artifacts"
        );
        Ok(vec![template_path, manifest_path])
    }
}

#[instrument(skip_all, fields(stack = %config.stack.name))]
pub fn synthesize(config: &StackConfig, inputs: &SynthInputs) -> Result<Synthesis> {
    let region = config.environment.region.as_deref();
    let bucket = naming::bucket_name(
        &config.storage.bucket_prefix,
        &config.environment.account_id,
        region,
    );

    let mut assets = AssetManifest::new();
    let seeded = assets.add_directory(
        SEED_ASSET_PREFIX,
        &inputs.seed_dir,
        &bucket,
        &config.storage.seed_key_prefix,
    )?;
    let script_key = assets
        .add_content_addressed(
            SCRIPT_ASSET_ID,
            &inputs.script_path,
            &bucket,
            &config.storage.asset_key_prefix,
        )?
        .key
        .clone();

    let mut stack = stack::build(
        config,
        &StackInputs {
            definition: &inputs.definition,
            script_key: &script_key,
        },
    )?;

    compliance::record_suppressions(&mut stack.template, &config.compliance.suppressions);
    let report = compliance::check(&stack.template, &config.compliance.suppressions);
    report.enforce(config.compliance.fail_on_findings)?;

    // Surfaces cycles and dangling references before anything is written
    stack.template.to_json()?;

    info!(
        resources = stack.template.graph().len(),
        seed_files = seeded,
        asset_bytes = assets.total_size(),
        "Synthesized stack"
    );

    Ok(Synthesis {
        stack,
        assets,
        compliance: report,
    })
}
