//! Isolated VPC, its endpoints and flow logs.

use serde_json::{json, Value};
use tracing::debug;

use enterprise_repo_config::NetworkConfig;

use crate::cidr::Ipv4Cidr;
use crate::error::Result;
use crate::iam::{service_trust_policy, PolicyDocument, Statement};
use crate::naming;
use crate::template::value::{self, get_att, reference};
use crate::template::{DeletionPolicy, Resource, Template};

/// Interface endpoints created in the isolated subnets: (logical id stem, service suffix)
pub const INTERFACE_ENDPOINTS: [(&str, &str); 3] = [
    ("CodeArtifactApi", "codeartifact.api"),
    ("CodeArtifactRepositories", "codeartifact.repositories"),
    ("Glue", "glue"),
];

const HTTPS_PORT: u16 = 443;

#[derive(Debug, Clone, PartialEq)]
pub struct SubnetDescriptor {
    pub logical_id: String,
    pub cidr: Ipv4Cidr,
    pub route_table_id: String,
    pub parameter_id: String,
    pub parameter_name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NetworkDescriptor {
    pub vpc_id: String,
    pub cidr: Ipv4Cidr,
    pub subnets: Vec<SubnetDescriptor>,
    pub gateway_endpoint_id: String,
    pub interface_endpoint_ids: Vec<String>,
    pub flow_log_id: String,
}

impl NetworkDescriptor {
    /// Subnet hosting single-subnet consumers such as the Glue connection
    pub fn primary_subnet(&self) -> Option<&SubnetDescriptor> {
        self.subnets.first()
    }
}

/// Plan the isolated subnet blocks: `max_azs` consecutive `/subnet_cidr_mask`
/// blocks from the start of the VPC range.
pub fn plan_subnets(config: &NetworkConfig) -> Result<(Ipv4Cidr, Vec<Ipv4Cidr>)> {
    let vpc: Ipv4Cidr = config.cidr_block.parse()?;
    let subnets = vpc.subnets(config.subnet_cidr_mask, usize::from(config.max_azs))?;
    Ok((vpc, subnets))
}

pub fn provision(
    template: &mut Template,
    config: &NetworkConfig,
    region: Option<&str>,
) -> Result<NetworkDescriptor> {
    let (cidr, blocks) = plan_subnets(config)?;
    let vpc_id = naming::logical_id(&config.vpc_name);

    template.add(
        Resource::new(&vpc_id, "AWS::EC2::VPC")
            .property("CidrBlock", cidr.to_string())
            .property("EnableDnsHostnames", true)
            .property("EnableDnsSupport", true)
            .property("InstanceTenancy", "default")
            .property("Tags", name_tag(&config.vpc_name)),
    )?;

    let mut subnets = Vec::with_capacity(blocks.len());
    for (index, block) in blocks.into_iter().enumerate() {
        subnets.push(add_subnet(template, config, &vpc_id, index, block)?);
    }

    let gateway_endpoint_id = format!("{}S3Endpoint", vpc_id);
    template.add(
        Resource::new(&gateway_endpoint_id, "AWS::EC2::VPCEndpoint")
            .property(
                "ServiceName",
                value::string(&naming::endpoint_service(region, "s3")),
            )
            .property("VpcEndpointType", "Gateway")
            .property("VpcId", reference(&vpc_id))
            .property(
                "RouteTableIds",
                subnets
                    .iter()
                    .map(|s| reference(&s.route_table_id))
                    .collect::<Vec<_>>(),
            ),
    )?;

    let mut interface_endpoint_ids = Vec::new();
    for (stem, service) in INTERFACE_ENDPOINTS {
        let sg_id = format!("{}{}EndpointSecurityGroup", vpc_id, stem);
        let endpoint_id = format!("{}{}Endpoint", vpc_id, stem);
        let service_name = naming::endpoint_service(region, service);

        template.add(
            Resource::new(&sg_id, "AWS::EC2::SecurityGroup")
                .property("GroupDescription", format!("{} endpoint", service_name))
                .property("VpcId", reference(&vpc_id))
                .property(
                    "SecurityGroupIngress",
                    json!([{
                        "IpProtocol": "tcp",
                        "FromPort": HTTPS_PORT,
                        "ToPort": HTTPS_PORT,
                        "CidrIp": get_att(&vpc_id, "CidrBlock"),
                        "Description": "HTTPS from the VPC",
                    }]),
                )
                .property("SecurityGroupEgress", allow_all_egress()),
        )?;

        template.add(
            Resource::new(&endpoint_id, "AWS::EC2::VPCEndpoint")
                .property("ServiceName", value::string(&service_name))
                .property("VpcEndpointType", "Interface")
                .property("VpcId", reference(&vpc_id))
                .property("SubnetIds", subnet_refs(&subnets))
                .property("SecurityGroupIds", json!([get_att(&sg_id, "GroupId")]))
                .property("PrivateDnsEnabled", true),
        )?;
        interface_endpoint_ids.push(endpoint_id);
    }

    let flow_log_id = add_flow_log(template, config, &vpc_id)?;

    debug!(
        vpc = %vpc_id,
        cidr = %cidr,
        subnets = subnets.len(),
        "Planned isolated network"
    );

    Ok(NetworkDescriptor {
        vpc_id,
        cidr,
        subnets,
        gateway_endpoint_id,
        interface_endpoint_ids,
        flow_log_id,
    })
}

fn subnet_refs(subnets: &[SubnetDescriptor]) -> Vec<Value> {
    subnets.iter().map(|s| reference(&s.logical_id)).collect()
}

fn add_subnet(
    template: &mut Template,
    config: &NetworkConfig,
    vpc_id: &str,
    index: usize,
    block: Ipv4Cidr,
) -> Result<SubnetDescriptor> {
    let number = index + 1;
    let stem = naming::logical_id(&format!("{}{}", config.subnet_name, number));
    let logical_id = format!("{}Subnet", stem);
    let route_table_id = format!("{}RouteTable", stem);
    let parameter_id = format!("{}SubnetParameter", stem);
    let parameter_name = naming::subnet_parameter_name(&config.subnet_parameter_prefix, number);

    template.add(
        Resource::new(&logical_id, "AWS::EC2::Subnet")
            .property("VpcId", reference(vpc_id))
            .property("CidrBlock", block.to_string())
            .property("AvailabilityZone", value::select(index, value::get_azs()))
            .property("MapPublicIpOnLaunch", false)
            .property(
                "Tags",
                json!([
                    { "Key": "Name", "Value": format!("{}/{}{}", config.vpc_name, config.subnet_name, number) },
                    { "Key": "subnet-type", "Value": "Isolated" },
                ]),
            ),
    )?;
    template.add(
        Resource::new(&route_table_id, "AWS::EC2::RouteTable")
            .property("VpcId", reference(vpc_id))
            .property("Tags", name_tag(&format!("{}/{}{}", config.vpc_name, config.subnet_name, number))),
    )?;
    template.add(
        Resource::new(format!("{}RouteTableAssociation", stem), "AWS::EC2::SubnetRouteTableAssociation")
            .property("RouteTableId", reference(&route_table_id))
            .property("SubnetId", reference(&logical_id)),
    )?;
    template.add(
        Resource::new(&parameter_id, "AWS::SSM::Parameter")
            .property("Name", parameter_name.as_str())
            .property("Type", "String")
            .property("Value", reference(&logical_id))
            .property("Description", format!("Isolated subnet {} of {}", number, config.vpc_name)),
    )?;

    Ok(SubnetDescriptor {
        logical_id,
        cidr: block,
        route_table_id,
        parameter_id,
        parameter_name,
    })
}

fn add_flow_log(template: &mut Template, config: &NetworkConfig, vpc_id: &str) -> Result<String> {
    let log_group_id = format!("{}FlowLogGroup", vpc_id);
    let role_id = format!("{}FlowLogRole", vpc_id);
    let policy_id = format!("{}FlowLogRolePolicy", vpc_id);
    let flow_log_id = format!("{}FlowLog", vpc_id);

    template.add(
        Resource::new(&log_group_id, "AWS::Logs::LogGroup")
            .property("RetentionInDays", config.flow_log_retention_days)
            .deletion_policy(DeletionPolicy::Retain),
    )?;
    template.add(
        Resource::new(&role_id, "AWS::IAM::Role")
            .property(
                "AssumeRolePolicyDocument",
                service_trust_policy("vpc-flow-logs.amazonaws.com"),
            ),
    )?;

    let document = PolicyDocument::new()
        .statement(
            Statement::allow()
                .actions([
                    "logs:CreateLogStream",
                    "logs:PutLogEvents",
                    "logs:DescribeLogStreams",
                ])
                .resource(get_att(&log_group_id, "Arn")),
        )
        .statement(
            Statement::allow()
                .action("iam:PassRole")
                .resource(get_att(&role_id, "Arn")),
        );
    template.add(
        Resource::new(&policy_id, "AWS::IAM::Policy")
            .property("PolicyName", policy_id.as_str())
            .property("PolicyDocument", document.to_json())
            .property("Roles", json!([reference(&role_id)])),
    )?;

    // The role has no permissions until the policy exists
    template.add(
        Resource::new(&flow_log_id, "AWS::EC2::FlowLog")
            .property("ResourceId", reference(vpc_id))
            .property("ResourceType", "VPC")
            .property("TrafficType", "ALL")
            .property("LogDestinationType", "cloud-watch-logs")
            .property("LogGroupName", reference(&log_group_id))
            .property("DeliverLogsPermissionArn", get_att(&role_id, "Arn"))
            .depends_on(&policy_id),
    )?;
    Ok(flow_log_id)
}

fn name_tag(name: &str) -> Value {
    json!([{ "Key": "Name", "Value": name }])
}

pub(crate) fn allow_all_egress() -> Value {
    json!([{
        "CidrIp": "0.0.0.0/0",
        "IpProtocol": "-1",
        "Description": "Allow all outbound traffic by default",
    }])
}
