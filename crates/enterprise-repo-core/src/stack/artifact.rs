//! CodeArtifact domain and repositories.
//!
//! Repositories name their domain and upstreams by string, so the backend
//! cannot infer creation order; domain -> pypi mirror -> internal repository
//! is declared with explicit `DependsOn` edges.

use serde_json::Value;
use tracing::debug;

use enterprise_repo_config::ArtifactConfig;

use crate::error::Result;
use crate::naming;
use crate::template::{Resource, Template};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainDescriptor {
    pub logical_id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryDescriptor {
    pub logical_id: String,
    pub name: String,
    pub domain_name: String,
    pub upstreams: Vec<String>,
    pub external_connections: Vec<String>,
}

pub fn create_domain(template: &mut Template, config: &ArtifactConfig) -> Result<DomainDescriptor> {
    let logical_id = naming::logical_id(&config.domain_name);
    template.add(
        Resource::new(&logical_id, "AWS::CodeArtifact::Domain")
            .property("DomainName", config.domain_name.as_str()),
    )?;
    Ok(DomainDescriptor {
        logical_id,
        name: config.domain_name.clone(),
    })
}

/// Mirror of public PyPI, no upstreams
pub fn create_pypi_repo(
    template: &mut Template,
    config: &ArtifactConfig,
    domain: &DomainDescriptor,
) -> Result<RepositoryDescriptor> {
    let repository = RepositoryDescriptor {
        logical_id: repository_logical_id(&config.pypi_repo_name),
        name: config.pypi_repo_name.clone(),
        domain_name: domain.name.clone(),
        upstreams: Vec::new(),
        external_connections: vec![config.external_connection.clone()],
    };
    add_repository(
        template,
        &repository,
        "Provides PyPI artifacts from PyPA.",
        &domain.logical_id,
    )?;
    Ok(repository)
}

/// Internal repository resolving through the mirror
pub fn create_code_repo(
    template: &mut Template,
    config: &ArtifactConfig,
    domain: &DomainDescriptor,
    upstream: &RepositoryDescriptor,
) -> Result<RepositoryDescriptor> {
    let repository = RepositoryDescriptor {
        logical_id: repository_logical_id(&config.repo_name),
        name: config.repo_name.clone(),
        domain_name: domain.name.clone(),
        upstreams: vec![upstream.name.clone()],
        external_connections: Vec::new(),
    };
    add_repository(
        template,
        &repository,
        "Internal python package repository.",
        &upstream.logical_id,
    )?;
    Ok(repository)
}

fn repository_logical_id(name: &str) -> String {
    format!("{}Repository", naming::logical_id(name))
}

fn add_repository(
    template: &mut Template,
    repository: &RepositoryDescriptor,
    description: &str,
    after: &str,
) -> Result<()> {
    let mut resource = Resource::new(&repository.logical_id, "AWS::CodeArtifact::Repository")
        .property("DomainName", repository.domain_name.as_str())
        .property("RepositoryName", repository.name.as_str())
        .property("Description", description);
    if !repository.external_connections.is_empty() {
        resource = resource.property("ExternalConnections", strings(&repository.external_connections));
    }
    if !repository.upstreams.is_empty() {
        resource = resource.property("Upstreams", strings(&repository.upstreams));
    }
    template.add(resource)?;
    template.graph_mut().add_dependency(&repository.logical_id, after)?;

    debug!(
        repository = %repository.name,
        upstreams = ?repository.upstreams,
        after = %after,
        "Declared CodeArtifact repository"
    );
    Ok(())
}

fn strings(items: &[String]) -> Value {
    Value::Array(items.iter().cloned().map(Value::String).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn build() -> (Template, DomainDescriptor, RepositoryDescriptor, RepositoryDescriptor) {
        let config = ArtifactConfig::default();
        let mut template = Template::new(None);
        let domain = create_domain(&mut template, &config).unwrap();
        let pypi = create_pypi_repo(&mut template, &config, &domain).unwrap();
        let code = create_code_repo(&mut template, &config, &domain, &pypi).unwrap();
        (template, domain, pypi, code)
    }

    #[test]
    fn test_code_repo_upstreams_only_the_mirror() {
        let (template, _, pypi, code) = build();
        assert_eq!(code.upstreams, vec!["pypi-store"]);
        assert!(code.external_connections.is_empty());
        assert_eq!(pypi.external_connections, vec!["public:pypi"]);
        assert!(pypi.upstreams.is_empty());

        let resource = template.graph().get(&code.logical_id).unwrap();
        assert_eq!(resource.get("Upstreams"), Some(&json!(["pypi-store"])));
        assert!(resource.get("ExternalConnections").is_none());
    }

    #[test]
    fn test_explicit_creation_order() {
        let (template, domain, pypi, code) = build();
        let graph = template.graph();
        assert!(graph.has_explicit_edge(&pypi.logical_id, &domain.logical_id));
        assert!(graph.has_explicit_edge(&code.logical_id, &pypi.logical_id));

        let order: Vec<&str> = graph
            .topological_order()
            .unwrap()
            .into_iter()
            .map(|r| r.logical_id())
            .collect();
        assert_eq!(
            order,
            vec![
                "EnterpriseRepoDomain",
                "PypiStoreRepository",
                "EnterpriseRepoRepository"
            ]
        );
    }
}
