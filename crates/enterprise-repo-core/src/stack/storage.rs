//! Data bucket

use serde_json::json;

use enterprise_repo_config::StorageConfig;

use crate::error::Result;
use crate::naming;
use crate::template::value;
use crate::template::{DeletionPolicy, Resource, Template};

/// Tag marking a bucket whose objects are removed before stack deletion
pub const AUTO_DELETE_TAG: &str = "enterprise-repo:auto-delete-objects";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageDescriptor {
    pub logical_id: String,
    /// May contain `${AWS::Region}` when the region is not pinned
    pub bucket_name: String,
    pub seed_key_prefix: String,
    pub auto_delete_objects: bool,
}

pub fn provision(
    template: &mut Template,
    config: &StorageConfig,
    account_id: &str,
    region: Option<&str>,
) -> Result<StorageDescriptor> {
    let bucket_name = naming::bucket_name(&config.bucket_prefix, account_id, region);
    let logical_id = format!("{}Bucket", naming::logical_id(&config.bucket_prefix));

    let mut bucket = Resource::new(&logical_id, "AWS::S3::Bucket")
        .property("BucketName", value::string(&bucket_name))
        .property(
            "BucketEncryption",
            json!({
                "ServerSideEncryptionConfiguration": [{
                    "ServerSideEncryptionByDefault": { "SSEAlgorithm": "AES256" }
                }]
            }),
        )
        .property(
            "PublicAccessBlockConfiguration",
            json!({
                "BlockPublicAcls": true,
                "BlockPublicPolicy": true,
                "IgnorePublicAcls": true,
                "RestrictPublicBuckets": true,
            }),
        )
        .deletion_policy(DeletionPolicy::Delete);
    if config.auto_delete_objects {
        bucket = bucket.property("Tags", json!([{ "Key": AUTO_DELETE_TAG, "Value": "true" }]));
    }
    template.add(bucket)?;

    Ok(StorageDescriptor {
        logical_id,
        bucket_name,
        seed_key_prefix: config.seed_key_prefix.clone(),
        auto_delete_objects: config.auto_delete_objects,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_is_locked_down() {
        for (account, region) in [
            ("123456789012", Some("us-east-1")),
            ("000000000001", Some("ap-southeast-2")),
            ("210987654321", None),
        ] {
            let mut template = Template::new(None);
            let storage =
                provision(&mut template, &StorageConfig::default(), account, region).unwrap();
            let bucket = template.graph().get(&storage.logical_id).unwrap();
            assert_eq!(
                bucket.get("BucketEncryption").unwrap()["ServerSideEncryptionConfiguration"][0]
                    ["ServerSideEncryptionByDefault"]["SSEAlgorithm"],
                json!("AES256")
            );
            let block = bucket.get("PublicAccessBlockConfiguration").unwrap();
            for flag in [
                "BlockPublicAcls",
                "BlockPublicPolicy",
                "IgnorePublicAcls",
                "RestrictPublicBuckets",
            ] {
                assert_eq!(block[flag], json!(true), "{flag} for {account}");
            }
            assert_eq!(bucket.get_deletion_policy(), Some(DeletionPolicy::Delete));
        }
    }

    #[test]
    fn test_bucket_name() {
        let mut template = Template::new(None);
        let storage = provision(
            &mut template,
            &StorageConfig::default(),
            "123456789012",
            Some("eu-central-1"),
        )
        .unwrap();
        assert_eq!(storage.bucket_name, "codeartifactblog-89012-eu-central-1");
        assert_eq!(storage.logical_id, "CodeartifactblogBucket");
        let bucket = template.graph().get(&storage.logical_id).unwrap();
        assert_eq!(
            bucket.get("BucketName"),
            Some(&json!("codeartifactblog-89012-eu-central-1"))
        );
        assert_eq!(bucket.get("Tags").unwrap()[0]["Key"], json!(AUTO_DELETE_TAG));
    }

    #[test]
    fn test_unpinned_region_bucket_name_is_substituted() {
        let mut template = Template::new(None);
        let storage =
            provision(&mut template, &StorageConfig::default(), "123456789012", None).unwrap();
        let bucket = template.graph().get(&storage.logical_id).unwrap();
        assert_eq!(
            bucket.get("BucketName"),
            Some(&json!({ "Fn::Sub": "codeartifactblog-89012-${AWS::Region}" }))
        );
    }
}
