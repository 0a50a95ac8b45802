//! Naming conventions shared by the provisioners.
//!
//! Region-dependent names use the `${AWS::Region}` placeholder when no region
//! is pinned, which keeps the template deployable to any region.

use crate::template::value;

pub const REGION_PLACEHOLDER: &str = "${AWS::Region}";

/// Concrete region, or the pseudo-parameter placeholder
pub fn region_token(region: Option<&str>) -> String {
    region.unwrap_or(REGION_PLACEHOLDER).to_string()
}

/// Last five characters of the account id
pub fn account_suffix(account_id: &str) -> &str {
    let start = account_id.len().saturating_sub(5);
    account_id.get(start..).unwrap_or(account_id)
}

/// `<prefix>-<account suffix>-<region>`
pub fn bucket_name(prefix: &str, account_id: &str, region: Option<&str>) -> String {
    format!(
        "{}-{}-{}",
        prefix,
        account_suffix(account_id),
        region_token(region)
    )
}

/// Host serving a CodeArtifact domain's repositories
pub fn codeartifact_endpoint(domain: &str, account_id: &str, region: Option<&str>) -> String {
    format!(
        "{}-{}.d.codeartifact.{}.amazonaws.com",
        domain,
        account_id,
        region_token(region)
    )
}

/// pip index URL for `repository` with a `{}` slot for the authorization token
pub fn codeartifact_index_url(
    domain: &str,
    account_id: &str,
    region: Option<&str>,
    repository: &str,
) -> String {
    format!(
        "https://aws:{{}}@{}/pypi/{}/simple/",
        codeartifact_endpoint(domain, account_id, region),
        repository
    )
}

/// `com.amazonaws.<region>.<service>`
pub fn endpoint_service(region: Option<&str>, service: &str) -> String {
    format!("com.amazonaws.{}.{}", region_token(region), service)
}

/// SSM parameter path for the n-th (1-based) private subnet
pub fn subnet_parameter_name(prefix: &str, index: usize) -> String {
    format!("{}{}", prefix, index)
}

/// CloudFormation logical ids are alphanumeric; `enterprise-repo-vpc` becomes `EnterpriseRepoVpc`.
pub fn logical_id(name: &str) -> String {
    name.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

/// S3 bucket ARN for a bucket declared in the same template
pub fn bucket_arn(bucket_logical_id: &str) -> serde_json::Value {
    value::get_att(bucket_logical_id, "Arn")
}

/// `<bucket arn>/*`
pub fn bucket_objects_arn(bucket_logical_id: &str) -> serde_json::Value {
    value::join("", vec![bucket_arn(bucket_logical_id), "/*".into()])
}
