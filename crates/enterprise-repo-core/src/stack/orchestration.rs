//! Step Functions state machine and its execution role.

use serde_json::json;
use tracing::{debug, warn};

use enterprise_repo_config::OrchestrationConfig;

use super::artifact::{DomainDescriptor, RepositoryDescriptor};
use super::compute::{ComputeDescriptor, GLUE_SERVICE_ROLE_POLICY};
use super::storage::StorageDescriptor;
use crate::error::Result;
use crate::iam::{service_trust_policy, PolicyDocument, Statement};
use crate::naming;
use crate::statemachine::{self, StateMachineTemplate, SUBSTITUTION_VARIABLES};
use crate::template::value::{self, get_att, reference};
use crate::template::{Resource, Template};

pub const STATES_SERVICE: &str = "states.amazonaws.com";

/// AWS-managed policies attached to the execution role
pub const MANAGED_POLICIES: [&str; 3] = [
    "AmazonS3ReadOnlyAccess",
    "AWSCodeArtifactReadOnlyAccess",
    GLUE_SERVICE_ROLE_POLICY,
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestrationDescriptor {
    pub policy_id: String,
    pub role_id: String,
    pub state_machine_id: String,
    /// Rendered definition, placeholders unresolved
    pub definition: String,
    pub index_url: String,
}

/// Everything the orchestration layer reads from the layers below it
pub struct OrchestrationInputs<'a> {
    pub account_id: &'a str,
    pub region: Option<&'a str>,
    pub domain: &'a DomainDescriptor,
    pub repository: &'a RepositoryDescriptor,
    pub storage: &'a StorageDescriptor,
    pub compute: &'a ComputeDescriptor,
    pub definition: &'a StateMachineTemplate,
}

pub fn provision(
    template: &mut Template,
    config: &OrchestrationConfig,
    inputs: &OrchestrationInputs<'_>,
) -> Result<OrchestrationDescriptor> {
    let index_url = naming::codeartifact_index_url(
        &inputs.domain.name,
        inputs.account_id,
        inputs.region,
        &inputs.repository.name,
    );
    let patched = statemachine::patch_parameter(
        inputs.definition,
        &config.url_state,
        &config.url_parameter,
        &statemachine::index_url_expression(&index_url),
    )?;
    let definition = statemachine::render(&patched)?;

    for name in statemachine::unused_variables(&definition, &SUBSTITUTION_VARIABLES) {
        warn!(
            variable = name,
            template = %config.template_path.display(),
            "Substitution variable is never referenced by the state machine definition"
        );
    }

    let policy_id = naming::logical_id(&config.policy_name);
    let document = PolicyDocument::new().statement(
        Statement::allow()
            .actions(["s3:PutObject", "s3:GetObject"])
            .resource(naming::bucket_objects_arn(&inputs.storage.logical_id)),
    );
    template.add(
        Resource::new(&policy_id, "AWS::IAM::ManagedPolicy")
            .property("ManagedPolicyName", config.policy_name.as_str())
            .property("Description", "SFN IAM Policy")
            .property("Path", "/")
            .property("PolicyDocument", document.to_json()),
    )?;

    let mut managed = vec![reference(&policy_id)];
    managed.extend(MANAGED_POLICIES.iter().map(|name| value::aws_managed_policy_arn(name)));
    let role_id = naming::logical_id(&config.role_name);
    template.add(
        Resource::new(&role_id, "AWS::IAM::Role")
            .property("RoleName", config.role_name.as_str())
            .property("Path", "/service-role/")
            .property("AssumeRolePolicyDocument", service_trust_policy(STATES_SERVICE))
            .property("ManagedPolicyArns", managed),
    )?;

    let state_machine_id = naming::logical_id(&config.state_machine_name);
    template.add(
        Resource::new(&state_machine_id, "AWS::StepFunctions::StateMachine")
            .property("StateMachineName", config.state_machine_name.as_str())
            .property("RoleArn", get_att(&role_id, "Arn"))
            .property("DefinitionString", value::pseudo_string(&definition))
            .property(
                "DefinitionSubstitutions",
                json!({
                    "domain": inputs.domain.name,
                    "aws_account_id": reference(value::ACCOUNT_ID),
                    "jobname": reference(&inputs.compute.job_id),
                }),
            ),
    )?;

    debug!(
        state_machine = %config.state_machine_name,
        index_url = %index_url,
        "Declared state machine"
    );

    Ok(OrchestrationDescriptor {
        policy_id,
        role_id,
        state_machine_id,
        definition,
        index_url,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn definition() -> StateMachineTemplate {
        StateMachineTemplate::from_value(json!({
            "StartAt": "GetAuthorizationToken",
            "States": {
                "GetAuthorizationToken": {
                    "Type": "Task",
                    "Parameters": { "Domain": "${domain}", "DomainOwner": "${aws_account_id}" },
                    "ResultPath": "$.taskresult",
                    "Next": "GenerateCodeArtifactURL"
                },
                "GenerateCodeArtifactURL": {
                    "Type": "Pass",
                    "Parameters": { "codeartifacturl.$": "" },
                    "Next": "StartGlueJob"
                },
                "StartGlueJob": {
                    "Type": "Task",
                    "Parameters": { "JobName": "${jobname}" },
                    "End": true
                }
            }
        }))
        .unwrap()
    }

    fn build(region: Option<&str>) -> (Template, OrchestrationDescriptor) {
        let domain = DomainDescriptor {
            logical_id: "EnterpriseRepoDomain".into(),
            name: "enterprise-repo-domain".into(),
        };
        let repository = RepositoryDescriptor {
            logical_id: "EnterpriseRepoRepository".into(),
            name: "enterprise-repo".into(),
            domain_name: domain.name.clone(),
            upstreams: vec!["pypi-store".into()],
            external_connections: Vec::new(),
        };
        let storage = StorageDescriptor {
            logical_id: "Bucket".into(),
            bucket_name: "b".into(),
            seed_key_prefix: "data".into(),
            auto_delete_objects: true,
        };
        let compute = ComputeDescriptor {
            security_group_id: "Sg".into(),
            policy_id: "GluePolicy".into(),
            role_id: "GlueRole".into(),
            database_id: "Db".into(),
            database_name: "db".into(),
            connection_id: "Conn".into(),
            job_id: "Job".into(),
            job_name: "job".into(),
        };
        let sfn = definition();
        let mut template = Template::new(None);
        let descriptor = provision(
            &mut template,
            &OrchestrationConfig::default(),
            &OrchestrationInputs {
                account_id: "123456789012",
                region,
                domain: &domain,
                repository: &repository,
                storage: &storage,
                compute: &compute,
                definition: &sfn,
            },
        )
        .unwrap();
        (template, descriptor)
    }

    #[test]
    fn test_definition_is_patched_with_index_url() {
        let (template, descriptor) = build(Some("us-west-2"));
        let state_machine = template.graph().get(&descriptor.state_machine_id).unwrap();
        let Some(Value::String(definition)) = state_machine.get("DefinitionString") else {
            panic!("definition should be a literal string when the region is pinned");
        };
        let parsed: Value = serde_json::from_str(definition).unwrap();
        assert_eq!(
            parsed["States"]["GenerateCodeArtifactURL"]["Parameters"]["codeartifacturl.$"],
            json!("States.Format('--index-url=https://aws:{}@enterprise-repo-domain-123456789012.d.codeartifact.us-west-2.amazonaws.com/pypi/enterprise-repo/simple/', $.taskresult.AuthorizationToken)")
        );
        for placeholder in ["${domain}", "${aws_account_id}", "${jobname}"] {
            assert!(definition.contains(placeholder), "missing {placeholder}");
        }
        assert!(definition.contains("\n    \"StartAt\""));
    }

    #[test]
    fn test_substitutions_and_role() {
        let (template, descriptor) = build(Some("us-west-2"));
        let state_machine = template.graph().get(&descriptor.state_machine_id).unwrap();
        assert_eq!(
            state_machine.get("DefinitionSubstitutions"),
            Some(&json!({
                "domain": "enterprise-repo-domain",
                "aws_account_id": { "Ref": "AWS::AccountId" },
                "jobname": { "Ref": "Job" },
            }))
        );
        assert!(template.graph().depends_on(&descriptor.state_machine_id, "Job"));
        assert!(template
            .graph()
            .depends_on(&descriptor.state_machine_id, &descriptor.role_id));

        let role = template.graph().get(&descriptor.role_id).unwrap();
        assert_eq!(role.get("RoleName"), Some(&json!("enterprise_repo_sfn_role")));
        assert_eq!(role.get("ManagedPolicyArns").unwrap().as_array().unwrap().len(), 4);
        assert_eq!(
            role.get("AssumeRolePolicyDocument").unwrap()["Statement"][0]["Principal"]["Service"],
            json!(STATES_SERVICE)
        );

        let policy = template.graph().get(&descriptor.policy_id).unwrap();
        assert_eq!(
            policy.get("PolicyDocument").unwrap()["Statement"][0]["Action"],
            json!(["s3:PutObject", "s3:GetObject"])
        );
    }

    #[test]
    fn test_unpinned_region_joins_pseudo_parameter() {
        let (template, descriptor) = build(None);
        let state_machine = template.graph().get(&descriptor.state_machine_id).unwrap();
        let join = &state_machine.get("DefinitionString").unwrap()["Fn::Join"];
        let parts = join[1].as_array().unwrap();
        assert!(parts.contains(&json!({ "Ref": "AWS::Region" })));
        assert!(descriptor.index_url.contains(".d.codeartifact.${AWS::Region}."));
    }
}
