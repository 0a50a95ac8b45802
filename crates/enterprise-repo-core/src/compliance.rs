//! Security rule pack run over the finished resource graph.
//!
//! Rules follow the AwsSolutions pack ids so suppressions written for that
//! pack carry over. Suppressions are stack-wide and are recorded in the
//! template metadata under `cdk_nag.rules_to_suppress`.

use serde_json::{json, Value};
use tracing::{info, warn};

use enterprise_repo_config::Suppression;

use crate::error::{Result, SynthError};
use crate::iam;
use crate::template::value::reference;
use crate::template::{Resource, Template};

/// A rule in the pack
#[derive(Debug, Clone, Copy)]
pub struct Rule {
    pub id: &'static str,
    pub description: &'static str,
    check: fn(&Template, &Resource) -> Option<String>,
}

pub const RULES: [Rule; 6] = [
    Rule {
        id: "AwsSolutions-S1",
        description: "The S3 Bucket has server access logs disabled.",
        check: bucket_without_access_logs,
    },
    Rule {
        id: "AwsSolutions-IAM4",
        description: "The IAM user, role, or group uses AWS managed policies.",
        check: role_with_aws_managed_policy,
    },
    Rule {
        id: "AwsSolutions-IAM5",
        description: "The IAM entity contains wildcard permissions.",
        check: policy_with_wildcards,
    },
    Rule {
        id: "AwsSolutions-SF1",
        description: "The Step Function does not log 'ALL' events to CloudWatch Logs.",
        check: state_machine_without_full_logging,
    },
    Rule {
        id: "AwsSolutions-SF2",
        description: "The Step Function does not have X-Ray tracing enabled.",
        check: state_machine_without_tracing,
    },
    Rule {
        id: "AwsSolutions-VPC7",
        description: "The VPC does not have an associated Flow Log.",
        check: vpc_without_flow_log,
    },
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub rule_id: String,
    pub logical_id: String,
    pub message: String,
    /// Reason of the suppression covering this finding
    pub suppressed_by: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComplianceReport {
    pub findings: Vec<Finding>,
}

impl ComplianceReport {
    pub fn unsuppressed(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(|f| f.suppressed_by.is_none())
    }

    pub fn suppressed(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(|f| f.suppressed_by.is_some())
    }

    pub fn is_clean(&self) -> bool {
        self.unsuppressed().next().is_none()
    }

    /// Distinct rule ids with at least one unsuppressed finding
    pub fn failing_rules(&self) -> Vec<String> {
        let mut rules: Vec<String> = self.unsuppressed().map(|f| f.rule_id.clone()).collect();
        rules.sort();
        rules.dedup();
        rules
    }

    /// Fail on unsuppressed findings, or log them when `fail_on_findings` is off
    pub fn enforce(&self, fail_on_findings: bool) -> Result<()> {
        for finding in self.unsuppressed() {
            warn!(
                rule = %finding.rule_id,
                resource = %finding.logical_id,
                "{}",
                finding.message
            );
        }
        if self.is_clean() || !fail_on_findings {
            return Ok(());
        }
        Err(SynthError::compliance(self.failing_rules()))
    }
}

/// Run every rule against every resource
pub fn check(template: &Template, suppressions: &[Suppression]) -> ComplianceReport {
    let mut findings = Vec::new();
    for resource in template.graph().iter() {
        for rule in &RULES {
            let Some(detail) = (rule.check)(template, resource) else {
                continue;
            };
            let suppressed_by = suppressions
                .iter()
                .find(|s| s.id == rule.id)
                .map(|s| s.reason.clone());
            findings.push(Finding {
                rule_id: rule.id.to_string(),
                logical_id: resource.logical_id().to_string(),
                message: format!("{} {}", rule.description, detail),
                suppressed_by,
            });
        }
    }

    let report = ComplianceReport { findings };
    info!(
        findings = report.findings.len(),
        suppressed = report.suppressed().count(),
        "Compliance checks complete"
    );
    report
}

/// Record stack-wide suppressions in the template metadata
pub fn record_suppressions(template: &mut Template, suppressions: &[Suppression]) {
    if suppressions.is_empty() {
        return;
    }
    let rules: Vec<Value> = suppressions
        .iter()
        .map(|s| json!({ "id": s.id, "reason": s.reason }))
        .collect();
    template.set_metadata("cdk_nag", json!({ "rules_to_suppress": rules }));
}

fn bucket_without_access_logs(_: &Template, resource: &Resource) -> Option<String> {
    (resource.resource_type() == "AWS::S3::Bucket" && resource.get("LoggingConfiguration").is_none())
        .then(|| "No LoggingConfiguration is set.".to_string())
}

fn role_with_aws_managed_policy(_: &Template, resource: &Resource) -> Option<String> {
    if resource.resource_type() != "AWS::IAM::Role" {
        return None;
    }
    let arns = resource.get("ManagedPolicyArns")?.as_array()?;
    let managed: Vec<String> = arns
        .iter()
        .filter_map(aws_managed_policy_name)
        .collect();
    (!managed.is_empty()).then(|| format!("Attached: {}.", managed.join(", ")))
}

fn aws_managed_policy_name(arn: &Value) -> Option<String> {
    let text = match arn {
        Value::String(s) => s.as_str(),
        other => other.get("Fn::Sub")?.as_str()?,
    };
    text.split_once(":iam::aws:policy/")
        .map(|(_, name)| name.to_string())
}

fn policy_with_wildcards(_: &Template, resource: &Resource) -> Option<String> {
    let documents: Vec<&Value> = match resource.resource_type() {
        "AWS::IAM::ManagedPolicy" | "AWS::IAM::Policy" => {
            resource.get("PolicyDocument").into_iter().collect()
        }
        "AWS::IAM::Role" => resource
            .get("Policies")
            .and_then(Value::as_array)
            .map(|policies| {
                policies
                    .iter()
                    .filter_map(|p| p.get("PolicyDocument"))
                    .collect()
            })
            .unwrap_or_default(),
        _ => return None,
    };

    let mut wildcards = Vec::new();
    for document in documents {
        let Some(statements) = document.get("Statement").and_then(Value::as_array) else {
            continue;
        };
        for statement in statements {
            for field in ["Action", "Resource"] {
                if let Some(value) = statement.get(field) {
                    wildcards.extend(iam::wildcard_entries(value));
                }
            }
        }
    }
    (!wildcards.is_empty()).then(|| format!("Wildcards: {}.", wildcards.join(", ")))
}

fn state_machine_without_full_logging(_: &Template, resource: &Resource) -> Option<String> {
    if resource.resource_type() != "AWS::StepFunctions::StateMachine" {
        return None;
    }
    let level = resource
        .get("LoggingConfiguration")
        .and_then(|c| c.get("Level"))
        .and_then(Value::as_str);
    match level {
        Some("ALL") => None,
        Some(other) => Some(format!("Log level is {}.", other)),
        None => Some("No LoggingConfiguration is set.".to_string()),
    }
}

fn state_machine_without_tracing(_: &Template, resource: &Resource) -> Option<String> {
    if resource.resource_type() != "AWS::StepFunctions::StateMachine" {
        return None;
    }
    let enabled = resource
        .get("TracingConfiguration")
        .and_then(|c| c.get("Enabled"))
        .and_then(Value::as_bool)
        .unwrap_or(false);
    (!enabled).then(|| "TracingConfiguration is not enabled.".to_string())
}

fn vpc_without_flow_log(template: &Template, resource: &Resource) -> Option<String> {
    if resource.resource_type() != "AWS::EC2::VPC" {
        return None;
    }
    let vpc = reference(resource.logical_id());
    let covered = template
        .graph()
        .of_type("AWS::EC2::FlowLog")
        .any(|flow_log| flow_log.get("ResourceId") == Some(&vpc));
    (!covered).then(|| "No AWS::EC2::FlowLog targets it.".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::value;

    fn template_with(resources: Vec<Resource>) -> Template {
        let mut template = Template::new(None);
        for resource in resources {
            template.add(resource).unwrap();
        }
        template
    }

    fn rule_ids(report: &ComplianceReport) -> Vec<&str> {
        report.findings.iter().map(|f| f.rule_id.as_str()).collect()
    }

    #[test]
    fn test_bucket_logging_rule() {
        let template = template_with(vec![Resource::new("B", "AWS::S3::Bucket")]);
        assert_eq!(rule_ids(&check(&template, &[])), vec!["AwsSolutions-S1"]);

        let template = template_with(vec![Resource::new("B", "AWS::S3::Bucket")
            .property("LoggingConfiguration", json!({ "DestinationBucketName": "logs" }))]);
        assert!(check(&template, &[]).findings.is_empty());
    }

    #[test]
    fn test_managed_policy_and_wildcard_rules() {
        let template = template_with(vec![
            Resource::new("Role", "AWS::IAM::Role").property(
                "ManagedPolicyArns",
                json!([value::aws_managed_policy_arn("service-role/AWSGlueServiceRole")]),
            ),
            Resource::new("Policy", "AWS::IAM::ManagedPolicy").property(
                "PolicyDocument",
                json!({ "Statement": [{ "Effect": "Allow", "Action": "s3:*", "Resource": "arn:x" }] }),
            ),
        ]);
        let report = check(&template, &[]);
        assert_eq!(rule_ids(&report), vec!["AwsSolutions-IAM4", "AwsSolutions-IAM5"]);
        assert!(report.findings[0].message.contains("service-role/AWSGlueServiceRole"));
        assert!(report.findings[1].message.contains("s3:*"));
    }

    #[test]
    fn test_state_machine_rules() {
        let bare = template_with(vec![Resource::new("Sm", "AWS::StepFunctions::StateMachine")]);
        assert_eq!(
            rule_ids(&check(&bare, &[])),
            vec!["AwsSolutions-SF1", "AwsSolutions-SF2"]
        );

        let configured = template_with(vec![Resource::new("Sm", "AWS::StepFunctions::StateMachine")
            .property("LoggingConfiguration", json!({ "Level": "ALL" }))
            .property("TracingConfiguration", json!({ "Enabled": true }))]);
        assert!(check(&configured, &[]).findings.is_empty());
    }

    #[test]
    fn test_vpc_flow_log_rule() {
        let without = template_with(vec![Resource::new("Vpc", "AWS::EC2::VPC")]);
        assert_eq!(rule_ids(&check(&without, &[])), vec!["AwsSolutions-VPC7"]);

        let with = template_with(vec![
            Resource::new("Vpc", "AWS::EC2::VPC"),
            Resource::new("Fl", "AWS::EC2::FlowLog").property("ResourceId", reference("Vpc")),
        ]);
        assert!(check(&with, &[]).findings.is_empty());
    }

    #[test]
    fn test_suppressions_and_enforcement() {
        let template = template_with(vec![
            Resource::new("B", "AWS::S3::Bucket"),
            Resource::new("Vpc", "AWS::EC2::VPC"),
        ]);
        let suppressions = vec![Suppression::new("AwsSolutions-S1", "TODO: enable access logs")];
        let report = check(&template, &suppressions);
        assert_eq!(report.suppressed().count(), 1);
        assert_eq!(report.failing_rules(), vec!["AwsSolutions-VPC7"]);

        let err = report.enforce(true).unwrap_err();
        assert_eq!(err.code(), Some(crate::error::ErrorCode::E007Compliance));
        assert!(report.enforce(false).is_ok());
    }

    #[test]
    fn test_record_suppressions() {
        let mut template = Template::new(None);
        record_suppressions(&mut template, &[]);
        assert!(template.metadata().is_empty());

        record_suppressions(
            &mut template,
            &[Suppression::new("AwsSolutions-IAM5", "TODO: Remove Wildcards in IAM roles.")],
        );
        assert_eq!(
            template.metadata()["cdk_nag"],
            json!({
                "rules_to_suppress": [
                    { "id": "AwsSolutions-IAM5", "reason": "TODO: Remove Wildcards in IAM roles." }
                ]
            })
        );
    }
}
