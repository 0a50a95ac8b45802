//! Resource dependency graph.
//!
//! Resources are kept in declaration order. Edges come from explicit
//! `DependsOn` declarations and from references inside properties. Emission
//! order is a topological sort (Kahn's algorithm) where ties are broken by
//! declaration order, so the same graph always renders the same template.

use indexmap::IndexMap;
use std::collections::{BTreeSet, HashSet};

use super::resource::Resource;
use crate::error::{Result, SynthError};

#[derive(Debug, Clone, Default)]
pub struct ResourceGraph {
    resources: IndexMap<String, Resource>,
}

impl ResourceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a resource. Logical ids must be unique.
    pub fn add(&mut self, resource: Resource) -> Result<&Resource> {
        let id = resource.logical_id().to_string();
        if self.resources.contains_key(&id) {
            return Err(SynthError::duplicate_resource(id));
        }
        tracing::trace!(logical_id = %id, resource_type = %resource.resource_type(), "Declared resource");
        let (index, _) = self.resources.insert_full(id, resource);
        Ok(&self.resources[index])
    }

    /// Add an explicit ordering edge: `from` is created after `to`.
    pub fn add_dependency(&mut self, from: &str, to: &str) -> Result<()> {
        if !self.resources.contains_key(to) {
            return Err(SynthError::unknown_reference(from, to));
        }
        let resource = self
            .resources
            .get_mut(from)
            .ok_or_else(|| SynthError::unknown_reference(to, from))?;
        resource.add_dependency(to);
        Ok(())
    }

    pub fn get(&self, logical_id: &str) -> Option<&Resource> {
        self.resources.get(logical_id)
    }

    pub fn contains(&self, logical_id: &str) -> bool {
        self.resources.contains_key(logical_id)
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Resources in declaration order
    pub fn iter(&self) -> impl Iterator<Item = &Resource> {
        self.resources.values()
    }

    pub fn of_type<'a>(&'a self, resource_type: &'a str) -> impl Iterator<Item = &'a Resource> {
        self.iter()
            .filter(move |r| r.resource_type() == resource_type)
    }

    /// True if `from` directly depends on `to`, explicitly or by reference
    pub fn depends_on(&self, from: &str, to: &str) -> bool {
        self.get(from)
            .map(|r| r.dependencies().contains(to))
            .unwrap_or(false)
    }

    /// True if `from` has an explicit `DependsOn` edge to `to`
    pub fn has_explicit_edge(&self, from: &str, to: &str) -> bool {
        self.get(from)
            .map(|r| r.explicit_dependencies().contains(to))
            .unwrap_or(false)
    }

    /// Every edge must land on a declared resource
    pub fn validate_references(&self) -> Result<()> {
        for resource in self.iter() {
            for dep in resource.dependencies() {
                if !self.resources.contains_key(&dep) {
                    return Err(SynthError::unknown_reference(resource.logical_id(), dep));
                }
            }
        }
        Ok(())
    }

    /// Deterministic creation order.
    pub fn topological_order(&self) -> Result<Vec<&Resource>> {
        self.validate_references()?;

        let count = self.resources.len();
        let mut indegree = vec![0usize; count];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); count];

        for (index, resource) in self.resources.values().enumerate() {
            for dep in resource.dependencies() {
                if let Some(dep_index) = self.resources.get_index_of(&dep) {
                    indegree[index] += 1;
                    dependents[dep_index].push(index);
                }
            }
        }

        let mut ready: BTreeSet<usize> = (0..count).filter(|&i| indegree[i] == 0).collect();
        let mut order = Vec::with_capacity(count);

        while let Some(index) = ready.pop_first() {
            order.push(index);
            for &next in &dependents[index] {
                indegree[next] -= 1;
                if indegree[next] == 0 {
                    ready.insert(next);
                }
            }
        }

        if order.len() < count {
            let remaining: HashSet<usize> = (0..count).filter(|i| indegree[*i] > 0).collect();
            return Err(SynthError::dependency_cycle(self.find_cycle(&remaining)));
        }

        Ok(order
            .into_iter()
            .filter_map(|i| self.resources.get_index(i).map(|(_, r)| r))
            .collect())
    }

    /// Walk dependencies inside the unsorted remainder until a node repeats.
    fn find_cycle(&self, remaining: &HashSet<usize>) -> Vec<String> {
        let Some(&start) = remaining.iter().min() else {
            return Vec::new();
        };
        let mut path: Vec<usize> = Vec::new();
        let mut current = start;
        loop {
            if let Some(pos) = path.iter().position(|&p| p == current) {
                let mut cycle: Vec<String> = path[pos..]
                    .iter()
                    .filter_map(|&i| self.resources.get_index(i).map(|(id, _)| id.clone()))
                    .collect();
                if let Some(first) = cycle.first().cloned() {
                    cycle.push(first);
                }
                return cycle;
            }
            path.push(current);
            let next = self
                .resources
                .get_index(current)
                .and_then(|(_, r)| {
                    r.dependencies()
                        .into_iter()
                        .filter_map(|d| self.resources.get_index_of(&d))
                        .find(|i| remaining.contains(i))
                });
            match next {
                Some(n) => current = n,
                None => {
                    return path
                        .iter()
                        .filter_map(|&i| self.resources.get_index(i).map(|(id, _)| id.clone()))
                        .collect()
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::template::value::reference;

    fn ids(order: Vec<&Resource>) -> Vec<&str> {
        order.into_iter().map(|r| r.logical_id()).collect()
    }

    #[test]
    fn test_duplicate_logical_id_rejected() {
        let mut graph = ResourceGraph::new();
        graph.add(Resource::new("A", "T")).unwrap();
        let err = graph.add(Resource::new("A", "T")).unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::E002DuplicateResource));
    }

    #[test]
    fn test_order_respects_edges_and_declaration_ties() {
        let mut graph = ResourceGraph::new();
        graph
            .add(Resource::new("Code", "T").depends_on("Pypi"))
            .unwrap();
        graph
            .add(Resource::new("Pypi", "T").depends_on("Domain"))
            .unwrap();
        graph.add(Resource::new("Unrelated", "T")).unwrap();
        graph.add(Resource::new("Domain", "T")).unwrap();

        let order = ids(graph.topological_order().unwrap());
        assert_eq!(order, vec!["Unrelated", "Domain", "Pypi", "Code"]);
    }

    #[test]
    fn test_order_is_stable_across_runs() {
        let mut graph = ResourceGraph::new();
        for id in ["Vpc", "Log", "Role"] {
            graph.add(Resource::new(id, "T")).unwrap();
        }
        graph
            .add(Resource::new("Subnet", "T").property("VpcId", reference("Vpc")))
            .unwrap();
        let first = ids(graph.topological_order().unwrap());
        let second = ids(graph.topological_order().unwrap());
        assert_eq!(first, second);
        assert_eq!(first, vec!["Vpc", "Log", "Role", "Subnet"]);
    }

    #[test]
    fn test_cycle_detected() {
        let mut graph = ResourceGraph::new();
        graph.add(Resource::new("A", "T").depends_on("B")).unwrap();
        graph
            .add(Resource::new("B", "T").property("X", reference("A")))
            .unwrap();
        graph.add(Resource::new("C", "T")).unwrap();

        let err = graph.topological_order().unwrap_err();
        match err {
            SynthError::DependencyCycle { members, .. } => {
                assert_eq!(members, vec!["A", "B", "A"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_dangling_reference_rejected() {
        let mut graph = ResourceGraph::new();
        graph
            .add(Resource::new("Subnet", "T").property("VpcId", reference("Missing")))
            .unwrap();
        let err = graph.topological_order().unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::E003UnknownReference));
    }

    #[test]
    fn test_add_dependency_requires_both_ends() {
        let mut graph = ResourceGraph::new();
        graph.add(Resource::new("A", "T")).unwrap();
        assert!(graph.add_dependency("A", "Nope").is_err());
        assert!(graph.add_dependency("Nope", "A").is_err());

        graph.add(Resource::new("B", "T")).unwrap();
        graph.add_dependency("B", "A").unwrap();
        assert!(graph.has_explicit_edge("B", "A"));
        assert!(graph.depends_on("B", "A"));
    }
}
