//! Asset publishing to the data bucket

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use tracing::info;

use enterprise_repo_config::StackConfig;
use enterprise_repo_core::AssetManifest;

use super::synth::synthesize_stack;
use crate::aws::{self, Session};

#[derive(Args, Debug, Default)]
pub struct PublishArgs {
    /// Publish a previously written assets.json instead of synthesizing again
    #[arg(long, value_name = "FILE")]
    pub manifest: Option<PathBuf>,
}

/// Resolve bucket placeholders for the session's account and region, then upload
pub async fn publish_manifest(
    manifest: &AssetManifest,
    config: &StackConfig,
    session: &Session,
) -> Result<usize> {
    let resolved = manifest.resolve(&config.environment.account_id, &session.region);
    let count = aws::upload_assets(&resolved, &session.region).await?;
    info!(assets = count, buckets = ?resolved.buckets(), "Published assets");
    Ok(count)
}

pub async fn run(args: PublishArgs, config: &StackConfig) -> Result<()> {
    let manifest = match &args.manifest {
        Some(path) => AssetManifest::load(path)
            .with_context(|| format!("Failed to load asset manifest {}", path.display()))?,
        None => synthesize_stack(config)?.assets,
    };

    let session = Session::load(config).await?;
    let count = publish_manifest(&manifest, config, &session).await?;
    println!("Published {} asset(s) ({} bytes)", count, manifest.total_size());
    Ok(())
}
