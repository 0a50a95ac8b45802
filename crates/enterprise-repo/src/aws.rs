//! CloudFormation and S3 plumbing shared by the deploy-side commands.

use anyhow::{bail, Context, Result};
use aws_config::BehaviorVersion;
use aws_sdk_cloudformation::error::ProvideErrorMetadata;
use aws_sdk_cloudformation::types::Capability;
use aws_sdk_cloudformation::Client as CfnClient;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use enterprise_repo_config::StackConfig;
use enterprise_repo_core::AssetManifest;

/// Interval between stack status polls
pub const POLL_INTERVAL: Duration = Duration::from_secs(10);
/// Give up waiting for a stack operation after this long
pub const STACK_TIMEOUT: Duration = Duration::from_secs(60 * 60);

/// Where a stack status leaves a create/update/delete operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    InProgress,
    Succeeded,
    Failed,
}

/// Classify a CloudFormation stack status string
pub fn classify_status(status: &str) -> StatusClass {
    if status.ends_with("_IN_PROGRESS") {
        StatusClass::InProgress
    } else if status.contains("ROLLBACK") || status.ends_with("_FAILED") {
        StatusClass::Failed
    } else if status.ends_with("_COMPLETE") {
        StatusClass::Succeeded
    } else {
        StatusClass::Failed
    }
}

/// Snapshot of a deployed stack
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackState {
    pub status: String,
    pub reason: Option<String>,
    pub outputs: BTreeMap<String, String>,
}

/// AWS session for the configured region, or the default provider chain's
pub struct Session {
    pub sdk: aws_config::SdkConfig,
    pub region: String,
}

impl Session {
    pub async fn load(config: &StackConfig) -> Result<Self> {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = &config.environment.region {
            loader = loader.region(aws_config::Region::new(region.clone()));
        }
        let sdk = loader.load().await;
        let region = sdk
            .region()
            .map(|r| r.to_string())
            .context("No AWS region configured. Set environment.region, ENTERPRISE_REPO_REGION or AWS_REGION")?;
        debug!(region = %region, "Loaded AWS configuration");
        Ok(Self { sdk, region })
    }

    pub fn cloudformation(&self) -> CfnClient {
        CfnClient::new(&self.sdk)
    }
}

fn is_missing_stack(message: Option<&str>) -> bool {
    message.is_some_and(|m| m.contains("does not exist"))
}

/// Current state of `stack_name`, `None` if there is no such stack
pub async fn describe_stack(client: &CfnClient, stack_name: &str) -> Result<Option<StackState>> {
    let response = match client.describe_stacks().stack_name(stack_name).send().await {
        Ok(response) => response,
        Err(err) if is_missing_stack(err.as_service_error().and_then(|e| e.message())) => {
            return Ok(None)
        }
        Err(err) => return Err(err).context("Failed to describe stack"),
    };

    let Some(stack) = response.stacks().first() else {
        return Ok(None);
    };

    let mut outputs = BTreeMap::new();
    for output in stack.outputs() {
        if let (Some(key), Some(value)) = (output.output_key(), output.output_value()) {
            outputs.insert(key.to_string(), value.to_string());
        }
    }

    Ok(Some(StackState {
        status: stack
            .stack_status()
            .map(|s| s.as_str().to_string())
            .unwrap_or_default(),
        reason: stack.stack_status_reason().map(str::to_string),
        outputs,
    }))
}

/// Poll until the stack leaves `*_IN_PROGRESS`. A vanished stack is reported
/// as `None`, which is success for deletes.
pub async fn wait_for_stack(client: &CfnClient, stack_name: &str) -> Result<Option<StackState>> {
    let started = Instant::now();
    loop {
        let state = describe_stack(client, stack_name).await?;
        match &state {
            None => return Ok(None),
            Some(s) if classify_status(&s.status) != StatusClass::InProgress => return Ok(state),
            Some(s) => {
                info!(stack = %stack_name, status = %s.status, "Waiting for stack");
            }
        }
        if started.elapsed() > STACK_TIMEOUT {
            bail!(
                "Timed out after {} minutes waiting for stack '{}'",
                STACK_TIMEOUT.as_secs() / 60,
                stack_name
            );
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

/// True for the update error CloudFormation returns when the template is unchanged
pub fn is_no_op_update(message: Option<&str>) -> bool {
    message.is_some_and(|m| m.contains("No updates are to be performed"))
}

/// What `submit_template` asked CloudFormation to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackChange {
    Created,
    Updated,
    Unchanged,
}

/// Whether a settled stack counts as deployed. An unchanged stack may still
/// sit in `UPDATE_ROLLBACK_COMPLETE` from an earlier rollback; it is healthy.
pub fn deployment_succeeded(change: StackChange, status: &str) -> bool {
    match change {
        StackChange::Unchanged => {
            status.ends_with("_COMPLETE")
                && classify_status(status) != StatusClass::InProgress
                && status != "ROLLBACK_COMPLETE"
        }
        StackChange::Created | StackChange::Updated => {
            classify_status(status) == StatusClass::Succeeded
        }
    }
}

/// Create the stack, or update it if it already exists
pub async fn submit_template(
    client: &CfnClient,
    stack_name: &str,
    template_body: &str,
) -> Result<StackChange> {
    match describe_stack(client, stack_name).await? {
        None => {
            client
                .create_stack()
                .stack_name(stack_name)
                .template_body(template_body)
                .capabilities(Capability::CapabilityNamedIam)
                .send()
                .await
                .context("Failed to create stack")?;
            info!(stack = %stack_name, "Stack creation started");
            Ok(StackChange::Created)
        }
        Some(state) if state.status == "ROLLBACK_COMPLETE" => bail!(
            "Stack '{}' is in ROLLBACK_COMPLETE and cannot be updated. Run destroy first.",
            stack_name
        ),
        Some(state) if classify_status(&state.status) == StatusClass::InProgress => bail!(
            "Stack '{}' has an operation in progress ({})",
            stack_name,
            state.status
        ),
        Some(_) => {
            let result = client
                .update_stack()
                .stack_name(stack_name)
                .template_body(template_body)
                .capabilities(Capability::CapabilityNamedIam)
                .send()
                .await;
            match result {
                Ok(_) => {
                    info!(stack = %stack_name, "Stack update started");
                    Ok(StackChange::Updated)
                }
                Err(err) if is_no_op_update(err.as_service_error().and_then(|e| e.message())) => {
                    info!(stack = %stack_name, "Stack is already up to date");
                    Ok(StackChange::Unchanged)
                }
                Err(err) => Err(err).context("Failed to update stack"),
            }
        }
    }
}

/// Start deleting the stack. Returns false if it does not exist.
pub async fn delete_stack(client: &CfnClient, stack_name: &str) -> Result<bool> {
    if describe_stack(client, stack_name).await?.is_none() {
        return Ok(false);
    }
    client
        .delete_stack()
        .stack_name(stack_name)
        .send()
        .await
        .context("Failed to delete stack")?;
    info!(stack = %stack_name, "Stack deletion started");
    Ok(true)
}

fn s3_operator(bucket: &str, region: &str) -> Result<opendal::Operator> {
    let builder = opendal::services::S3::default().bucket(bucket).region(region);
    Ok(opendal::Operator::new(builder)
        .with_context(|| format!("Failed to create S3 operator for bucket {}", bucket))?
        .finish())
}

/// Upload every manifest entry. Bucket names must already be resolved.
pub async fn upload_assets(manifest: &AssetManifest, region: &str) -> Result<usize> {
    if !manifest.is_resolved() {
        bail!("Asset manifest still contains unresolved bucket placeholders");
    }

    let mut uploaded = 0;
    for bucket in manifest.buckets() {
        let operator = s3_operator(bucket, region)?;
        for asset in manifest.iter().filter(|a| a.bucket == bucket) {
            let content = tokio::fs::read(&asset.source)
                .await
                .with_context(|| format!("Failed to read {}", asset.source.display()))?;
            if enterprise_repo_core::assets::hash_bytes(&content) != asset.hash {
                bail!(
                    "{} changed since synthesis; run synth again",
                    asset.source.display()
                );
            }
            operator
                .write(&asset.key, content)
                .await
                .with_context(|| format!("Failed to upload s3://{}/{}", bucket, asset.key))?;
            info!(bucket = %bucket, key = %asset.key, size = asset.size, "Uploaded asset");
            uploaded += 1;
        }
    }
    Ok(uploaded)
}

/// Delete every object in `bucket`. A missing bucket is not an error.
pub async fn empty_bucket(bucket: &str, region: &str) -> Result<()> {
    let operator = s3_operator(bucket, region)?;
    match operator.remove_all("/").await {
        Ok(()) => {
            info!(bucket = %bucket, "Emptied bucket");
            Ok(())
        }
        Err(err) if err.kind() == opendal::ErrorKind::NotFound => {
            debug!(bucket = %bucket, "Bucket does not exist, nothing to empty");
            Ok(())
        }
        Err(err) => Err(err).with_context(|| format!("Failed to empty bucket {}", bucket)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_status() {
        for status in ["CREATE_IN_PROGRESS", "UPDATE_COMPLETE_CLEANUP_IN_PROGRESS", "DELETE_IN_PROGRESS"] {
            assert_eq!(classify_status(status), StatusClass::InProgress, "{status}");
        }
        for status in ["CREATE_COMPLETE", "UPDATE_COMPLETE", "DELETE_COMPLETE", "IMPORT_COMPLETE"] {
            assert_eq!(classify_status(status), StatusClass::Succeeded, "{status}");
        }
        for status in [
            "CREATE_FAILED",
            "ROLLBACK_COMPLETE",
            "UPDATE_ROLLBACK_COMPLETE",
            "ROLLBACK_FAILED",
            "DELETE_FAILED",
            "SOMETHING_NEW",
        ] {
            assert_eq!(classify_status(status), StatusClass::Failed, "{status}");
        }
    }

    #[test]
    fn test_rollback_in_progress_is_still_in_progress() {
        assert_eq!(
            classify_status("UPDATE_ROLLBACK_IN_PROGRESS"),
            StatusClass::InProgress
        );
    }

    #[test]
    fn test_unchanged_stack_after_rollback_is_deployed() {
        assert!(deployment_succeeded(StackChange::Unchanged, "UPDATE_ROLLBACK_COMPLETE"));
        assert!(deployment_succeeded(StackChange::Unchanged, "UPDATE_COMPLETE"));
        assert!(!deployment_succeeded(StackChange::Unchanged, "UPDATE_ROLLBACK_FAILED"));
        assert!(!deployment_succeeded(StackChange::Unchanged, "ROLLBACK_COMPLETE"));

        // A fresh update that rolled back is still a failure
        assert!(!deployment_succeeded(StackChange::Updated, "UPDATE_ROLLBACK_COMPLETE"));
        assert!(!deployment_succeeded(StackChange::Created, "ROLLBACK_COMPLETE"));
        assert!(deployment_succeeded(StackChange::Created, "CREATE_COMPLETE"));
    }

    #[test]
    fn test_error_message_matching() {
        assert!(is_no_op_update(Some("No updates are to be performed.")));
        assert!(!is_no_op_update(Some("Template format error")));
        assert!(!is_no_op_update(None));
        assert!(is_missing_stack(Some("Stack with id demo does not exist")));
        assert!(!is_missing_stack(Some("Rate exceeded")));
    }
}
