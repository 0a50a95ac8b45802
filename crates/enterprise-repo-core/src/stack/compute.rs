//! Glue ETL job running inside the VPC.

use serde_json::{json, Map, Value};
use tracing::debug;

use enterprise_repo_config::GlueConfig;

use super::network::{allow_all_egress, NetworkDescriptor};
use super::storage::StorageDescriptor;
use crate::error::{Result, SynthError};
use crate::iam::{service_trust_policy, PolicyDocument, Statement};
use crate::naming;
use crate::template::value::{self, get_att, reference};
use crate::template::{Resource, Template};

pub const GLUE_SERVICE: &str = "glue.amazonaws.com";
pub const GLUE_SERVICE_ROLE_POLICY: &str = "service-role/AWSGlueServiceRole";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComputeDescriptor {
    pub security_group_id: String,
    pub policy_id: String,
    pub role_id: String,
    pub database_id: String,
    pub database_name: String,
    pub connection_id: String,
    pub job_id: String,
    pub job_name: String,
}

/// Job arguments passed to every run
pub fn default_arguments(
    config: &GlueConfig,
    storage: &StorageDescriptor,
    database_id: &str,
) -> Map<String, Value> {
    let mut args = Map::new();
    args.insert(
        "--additional-python-modules".to_string(),
        json!(config.additional_python_modules.join(",")),
    );
    args.insert("--class".to_string(), json!("GlueApp"));
    args.insert("--S3_BUCKET".to_string(), reference(&storage.logical_id));
    args.insert("--GLUE_DATABASE".to_string(), reference(database_id));
    args.insert("--python-modules-installer-option".to_string(), json!(""));
    args.insert("--job-language".to_string(), json!("python"));
    if config.continuous_logging {
        args.insert(
            "--enable-continuous-cloudwatch-log".to_string(),
            json!("true"),
        );
    }
    if config.profiling_metrics {
        args.insert("--enable-metrics".to_string(), json!(""));
    }
    args
}

pub fn provision(
    template: &mut Template,
    config: &GlueConfig,
    network: &NetworkDescriptor,
    storage: &StorageDescriptor,
    script_key: &str,
) -> Result<ComputeDescriptor> {
    let subnet = network.primary_subnet().ok_or_else(|| {
        SynthError::invalid_network("the Glue connection needs at least one isolated subnet")
    })?;

    let security_group_id = "GlueConnectionSecurityGroup".to_string();
    template.add(
        Resource::new(&security_group_id, "AWS::EC2::SecurityGroup")
            .property("GroupDescription", config.security_group_description.as_str())
            .property("VpcId", reference(&network.vpc_id))
            .property("SecurityGroupEgress", allow_all_egress()),
    )?;
    // Glue workers talk to each other over any port
    template.add(
        Resource::new(
            format!("{}SelfIngress", security_group_id),
            "AWS::EC2::SecurityGroupIngress",
        )
        .property("GroupId", get_att(&security_group_id, "GroupId"))
        .property("SourceSecurityGroupId", get_att(&security_group_id, "GroupId"))
        .property("IpProtocol", "-1")
        .property("Description", "All traffic from members of this group"),
    )?;

    let policy_id = naming::logical_id(&config.policy_name);
    let document = PolicyDocument::new()
        .statement(
            Statement::allow()
                .action("s3:*")
                .resource(naming::bucket_objects_arn(&storage.logical_id))
                .resource(naming::bucket_arn(&storage.logical_id)),
        )
        .statement(
            Statement::allow()
                .action("iam:PassRole")
                .resource("*")
                .condition("StringLike", "iam:PassedToService", json!([GLUE_SERVICE])),
        );
    template.add(
        Resource::new(&policy_id, "AWS::IAM::ManagedPolicy")
            .property("ManagedPolicyName", config.policy_name.as_str())
            .property("Description", "Glue Job IAM Policy")
            .property("Path", "/")
            .property("PolicyDocument", document.to_json()),
    )?;

    let role_id = naming::logical_id(&config.role_name);
    template.add(
        Resource::new(&role_id, "AWS::IAM::Role")
            .property("RoleName", config.role_name.as_str())
            .property("Path", "/service-role/")
            .property("AssumeRolePolicyDocument", service_trust_policy(GLUE_SERVICE))
            .property(
                "ManagedPolicyArns",
                json!([
                    reference(&policy_id),
                    value::aws_managed_policy_arn(GLUE_SERVICE_ROLE_POLICY),
                ]),
            ),
    )?;

    let database_id = naming::logical_id(&config.database_name);
    template.add(
        Resource::new(&database_id, "AWS::Glue::Database")
            .property("CatalogId", reference(value::ACCOUNT_ID))
            .property("DatabaseInput", json!({ "Name": config.database_name })),
    )?;

    let connection_id = naming::logical_id(&config.connection_name);
    template.add(
        Resource::new(&connection_id, "AWS::Glue::Connection")
            .property("CatalogId", reference(value::ACCOUNT_ID))
            .property(
                "ConnectionInput",
                json!({
                    "Name": config.connection_name,
                    "ConnectionType": "NETWORK",
                    "ConnectionProperties": {},
                    "PhysicalConnectionRequirements": {
                        "AvailabilityZone": get_att(&subnet.logical_id, "AvailabilityZone"),
                        "SecurityGroupIdList": [get_att(&security_group_id, "GroupId")],
                        "SubnetId": reference(&subnet.logical_id),
                    },
                }),
            ),
    )?;

    let job_id = naming::logical_id(&config.job_name);
    let script_location = value::sub(format!(
        "s3://${{{}}}/{}",
        storage.logical_id, script_key
    ));
    template.add(
        Resource::new(&job_id, "AWS::Glue::Job")
            .property("Name", config.job_name.as_str())
            .property("Description", config.job_description.as_str())
            .property("Role", get_att(&role_id, "Arn"))
            .property(
                "Command",
                json!({
                    "Name": "glueetl",
                    "PythonVersion": config.python_version,
                    "ScriptLocation": script_location,
                }),
            )
            .property("GlueVersion", config.glue_version.as_str())
            .property("WorkerType", config.worker_type.as_str())
            .property("NumberOfWorkers", config.worker_count)
            .property("Timeout", config.timeout_minutes)
            .property("MaxRetries", config.max_retries)
            .property("Connections", json!({ "Connections": [reference(&connection_id)] }))
            .property(
                "DefaultArguments",
                Value::Object(default_arguments(config, storage, &database_id)),
            ),
    )?;

    debug!(
        job = %config.job_name,
        worker_type = %config.worker_type,
        workers = config.worker_count,
        subnet = %subnet.logical_id,
        "Declared Glue job"
    );

    Ok(ComputeDescriptor {
        security_group_id,
        policy_id,
        role_id,
        database_id,
        database_name: config.database_name.clone(),
        connection_id,
        job_id,
        job_name: config.job_name.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stack::{network, storage};
    use enterprise_repo_config::{NetworkConfig, StorageConfig};

    const SCRIPT_KEY: &str = "assets/abc123/job.py";

    fn build() -> (Template, StorageDescriptor, NetworkDescriptor, ComputeDescriptor) {
        let mut template = Template::new(None);
        let network =
            network::provision(&mut template, &NetworkConfig::default(), Some("us-east-1"))
                .unwrap();
        let storage = storage::provision(
            &mut template,
            &StorageConfig::default(),
            "123456789012",
            Some("us-east-1"),
        )
        .unwrap();
        let compute = provision(
            &mut template,
            &GlueConfig::default(),
            &network,
            &storage,
            SCRIPT_KEY,
        )
        .unwrap();
        (template, storage, network, compute)
    }

    #[test]
    fn test_job_arguments_point_at_same_pass_resources() {
        let (template, storage, _, compute) = build();
        let job = template.graph().get(&compute.job_id).unwrap();
        let args = job.get("DefaultArguments").unwrap();
        assert_eq!(args["--S3_BUCKET"], reference(&storage.logical_id));
        assert_eq!(args["--GLUE_DATABASE"], reference(&compute.database_id));
        assert_eq!(args["--additional-python-modules"], json!("awswrangler"));
        assert_eq!(args["--class"], json!("GlueApp"));
        assert_eq!(args["--python-modules-installer-option"], json!(""));
        assert_eq!(args["--job-language"], json!("python"));

        let database = template.graph().get(&compute.database_id).unwrap();
        assert_eq!(
            database.get("DatabaseInput").unwrap()["Name"],
            json!("codeartifactblog_glue_db")
        );
        assert!(template.graph().depends_on(&compute.job_id, &storage.logical_id));
        assert!(template.graph().depends_on(&compute.job_id, &compute.database_id));
    }

    #[test]
    fn test_job_shape() {
        let (template, storage, _, compute) = build();
        let job = template.graph().get(&compute.job_id).unwrap();
        assert_eq!(job.get("Name"), Some(&json!("enterprise-repo-glue-job")));
        assert_eq!(job.get("GlueVersion"), Some(&json!("3.0")));
        assert_eq!(job.get("WorkerType"), Some(&json!("G.1X")));
        assert_eq!(job.get("NumberOfWorkers"), Some(&json!(3)));
        assert_eq!(job.get("Timeout"), Some(&json!(20)));
        assert_eq!(job.get("MaxRetries"), Some(&json!(0)));
        assert_eq!(
            job.get("Command").unwrap()["ScriptLocation"],
            json!({ "Fn::Sub": format!("s3://${{{}}}/{}", storage.logical_id, SCRIPT_KEY) })
        );
        assert_eq!(job.get("Role"), Some(&get_att(&compute.role_id, "Arn")));
    }

    #[test]
    fn test_connection_uses_first_isolated_subnet() {
        let (template, _, network, compute) = build();
        let connection = template.graph().get(&compute.connection_id).unwrap();
        let requirements = &connection.get("ConnectionInput").unwrap()["PhysicalConnectionRequirements"];
        let subnet = &network.subnets[0].logical_id;
        assert_eq!(requirements["SubnetId"], reference(subnet));
        assert_eq!(requirements["AvailabilityZone"], get_att(subnet, "AvailabilityZone"));
        assert_eq!(
            requirements["SecurityGroupIdList"],
            json!([get_att(&compute.security_group_id, "GroupId")])
        );
    }

    #[test]
    fn test_role_and_policy() {
        let (template, storage, _, compute) = build();
        let role = template.graph().get(&compute.role_id).unwrap();
        assert_eq!(role.get("RoleName"), Some(&json!("enterprise_repo_glue_job_role")));
        assert_eq!(role.get("Path"), Some(&json!("/service-role/")));
        assert_eq!(
            role.get("AssumeRolePolicyDocument").unwrap()["Statement"][0]["Principal"],
            json!({ "Service": "glue.amazonaws.com" })
        );

        let policy = template.graph().get(&compute.policy_id).unwrap();
        let statements = &policy.get("PolicyDocument").unwrap()["Statement"];
        assert_eq!(statements[0]["Action"], json!("s3:*"));
        assert_eq!(
            statements[0]["Resource"][1],
            get_att(&storage.logical_id, "Arn")
        );
        assert_eq!(
            statements[1]["Condition"]["StringLike"]["iam:PassedToService"],
            json!(["glue.amazonaws.com"])
        );
    }

    #[test]
    fn test_self_referencing_ingress() {
        let (template, _, _, compute) = build();
        let ingress = template
            .graph()
            .get("GlueConnectionSecurityGroupSelfIngress")
            .unwrap();
        assert_eq!(
            ingress.get("SourceSecurityGroupId"),
            ingress.get("GroupId")
        );
        assert_eq!(ingress.get("IpProtocol"), Some(&json!("-1")));
        assert!(template
            .graph()
            .depends_on("GlueConnectionSecurityGroupSelfIngress", &compute.security_group_id));
    }
}
