use crate::error::Result;
use crate::template::{Output, Template};

use super::artifact::{DomainDescriptor, RepositoryDescriptor};

pub const REPOSITORY_NAME: &str = "RepositoryName";
pub const DOMAIN_NAME: &str = "DomainName";

pub fn provision(
    template: &mut Template,
    domain: &DomainDescriptor,
    repository: &RepositoryDescriptor,
) -> Result<()> {
    template.add_output(
        Output::new(REPOSITORY_NAME, repository.name.as_str())
            .description("Code Artifact Repository Name"),
    )?;
    template.add_output(
        Output::new(DOMAIN_NAME, domain.name.as_str())
            .description("Code Artifact Domain name for Repository"),
    )?;
    Ok(())
}
