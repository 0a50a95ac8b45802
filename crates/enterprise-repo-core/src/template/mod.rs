//! CloudFormation template model

use indexmap::IndexMap;
use serde_json::{Map, Value};

mod graph;
mod resource;
pub mod value;

pub use graph::ResourceGraph;
pub use resource::{DeletionPolicy, Resource};

use crate::error::{Result, SynthError};

pub const FORMAT_VERSION: &str = "2010-09-09";

/// A named stack output
#[derive(Debug, Clone, PartialEq)]
pub struct Output {
    pub logical_id: String,
    pub value: Value,
    pub description: Option<String>,
}

impl Output {
    pub fn new(logical_id: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            logical_id: logical_id.into(),
            value: value.into(),
            description: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    fn to_json(&self) -> Value {
        let mut out = Map::new();
        if let Some(description) = &self.description {
            out.insert("Description".to_string(), Value::String(description.clone()));
        }
        out.insert("Value".to_string(), self.value.clone());
        Value::Object(out)
    }
}

/// A complete template: resources, outputs and stack-level metadata
#[derive(Debug, Clone, Default)]
pub struct Template {
    description: Option<String>,
    metadata: Map<String, Value>,
    graph: ResourceGraph,
    outputs: IndexMap<String, Output>,
}

impl Template {
    pub fn new(description: Option<String>) -> Self {
        Self {
            description,
            ..Default::default()
        }
    }

    pub fn graph(&self) -> &ResourceGraph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut ResourceGraph {
        &mut self.graph
    }

    /// Convenience for `graph_mut().add(..)` returning the logical id
    pub fn add(&mut self, resource: Resource) -> Result<String> {
        self.graph.add(resource).map(|r| r.logical_id().to_string())
    }

    pub fn add_output(&mut self, output: Output) -> Result<()> {
        if self.outputs.contains_key(&output.logical_id) {
            return Err(SynthError::duplicate_resource(output.logical_id));
        }
        self.outputs.insert(output.logical_id.clone(), output);
        Ok(())
    }

    pub fn outputs(&self) -> impl Iterator<Item = &Output> {
        self.outputs.values()
    }

    pub fn output(&self, logical_id: &str) -> Option<&Output> {
        self.outputs.get(logical_id)
    }

    pub fn set_metadata(&mut self, key: &str, value: Value) {
        self.metadata.insert(key.to_string(), value);
    }

    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    /// Render the template document with resources in creation order
    pub fn to_json(&self) -> Result<Value> {
        let mut resources = Map::new();
        for resource in self.graph.topological_order()? {
            resources.insert(resource.logical_id().to_string(), resource.to_json());
        }

        for output in self.outputs.values() {
            for id in value::references(&output.value) {
                if !self.graph.contains(&id) {
                    return Err(SynthError::unknown_reference(&output.logical_id, id));
                }
            }
        }

        let mut doc = Map::new();
        doc.insert(
            "AWSTemplateFormatVersion".to_string(),
            Value::String(FORMAT_VERSION.to_string()),
        );
        if let Some(description) = &self.description {
            doc.insert("Description".to_string(), Value::String(description.clone()));
        }
        if !self.metadata.is_empty() {
            doc.insert("Metadata".to_string(), Value::Object(self.metadata.clone()));
        }
        doc.insert("Resources".to_string(), Value::Object(resources));
        if !self.outputs.is_empty() {
            let outputs: Map<String, Value> = self
                .outputs
                .values()
                .map(|o| (o.logical_id.clone(), o.to_json()))
                .collect();
            doc.insert("Outputs".to_string(), Value::Object(outputs));
        }
        Ok(Value::Object(doc))
    }

    pub fn render(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.to_json()?)?)
    }
}
