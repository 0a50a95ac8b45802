//! Stack composition.
//!
//! Layers are declared in dependency order (network, storage, artifact
//! repositories, Glue, state machine, outputs); each provisioner returns a
//! descriptor that the layers above it read.

pub mod artifact;
pub mod compute;
pub mod network;
pub mod orchestration;
pub mod outputs;
pub mod storage;

use tracing::info;

use enterprise_repo_config::StackConfig;

use crate::error::{Result, SynthError};
use crate::statemachine::StateMachineTemplate;
use crate::template::Template;

pub use artifact::{DomainDescriptor, RepositoryDescriptor};
pub use compute::ComputeDescriptor;
pub use network::{NetworkDescriptor, SubnetDescriptor};
pub use orchestration::OrchestrationDescriptor;
pub use storage::StorageDescriptor;

/// Inputs read from disk before the graph is built
#[derive(Debug, Clone, Copy)]
pub struct StackInputs<'a> {
    pub definition: &'a StateMachineTemplate,
    /// Bucket key of the staged Glue script
    pub script_key: &'a str,
}

/// The assembled template plus what each layer declared
#[derive(Debug, Clone)]
pub struct Stack {
    pub template: Template,
    pub network: NetworkDescriptor,
    pub storage: StorageDescriptor,
    pub domain: DomainDescriptor,
    pub pypi_repository: RepositoryDescriptor,
    pub code_repository: RepositoryDescriptor,
    pub compute: ComputeDescriptor,
    pub orchestration: OrchestrationDescriptor,
}

pub fn build(config: &StackConfig, inputs: &StackInputs<'_>) -> Result<Stack> {
    let account_id = config.environment.account_id.as_str();
    if account_id.is_empty() {
        return Err(SynthError::invalid_config(
            "environment.account_id is required (or set CDK_DEFAULT_ACCOUNT)",
        ));
    }
    let region = config.environment.region.as_deref();

    let mut template = Template::new(config.stack.description.clone());

    let network = network::provision(&mut template, &config.network, region)?;
    let storage = storage::provision(&mut template, &config.storage, account_id, region)?;

    let domain = artifact::create_domain(&mut template, &config.artifact)?;
    let pypi_repository = artifact::create_pypi_repo(&mut template, &config.artifact, &domain)?;
    let code_repository =
        artifact::create_code_repo(&mut template, &config.artifact, &domain, &pypi_repository)?;

    let compute = compute::provision(
        &mut template,
        &config.glue,
        &network,
        &storage,
        inputs.script_key,
    )?;

    let orchestration = orchestration::provision(
        &mut template,
        &config.orchestration,
        &orchestration::OrchestrationInputs {
            account_id,
            region,
            domain: &domain,
            repository: &code_repository,
            storage: &storage,
            compute: &compute,
            definition: inputs.definition,
        },
    )?;

    outputs::provision(&mut template, &domain, &code_repository)?;

    info!(
        stack = %config.stack.name,
        resources = template.graph().len(),
        bucket = %storage.bucket_name,
        "Built resource graph"
    );

    Ok(Stack {
        template,
        network,
        storage,
        domain,
        pypi_repository,
        code_repository,
        compute,
        orchestration,
    })
}
