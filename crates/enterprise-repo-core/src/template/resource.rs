use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeSet;

use super::value;

/// What happens to the physical resource when it leaves the stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DeletionPolicy {
    Delete,
    Retain,
    Snapshot,
}

/// A single resource declaration
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    logical_id: String,
    resource_type: String,
    properties: Map<String, Value>,
    depends_on: BTreeSet<String>,
    deletion_policy: Option<DeletionPolicy>,
    update_replace_policy: Option<DeletionPolicy>,
    metadata: Map<String, Value>,
}

impl Resource {
    pub fn new(logical_id: impl Into<String>, resource_type: impl Into<String>) -> Self {
        Self {
            logical_id: logical_id.into(),
            resource_type: resource_type.into(),
            properties: Map::new(),
            depends_on: BTreeSet::new(),
            deletion_policy: None,
            update_replace_policy: None,
            metadata: Map::new(),
        }
    }

    pub fn property(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }

    /// Explicit `DependsOn` edge, for ordering the backend cannot infer
    pub fn depends_on(mut self, logical_id: impl Into<String>) -> Self {
        self.depends_on.insert(logical_id.into());
        self
    }

    /// Sets both the deletion and the update-replace policy
    pub fn deletion_policy(mut self, policy: DeletionPolicy) -> Self {
        self.deletion_policy = Some(policy);
        self.update_replace_policy = Some(policy);
        self
    }

    pub fn metadata(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    pub fn add_dependency(&mut self, logical_id: impl Into<String>) {
        self.depends_on.insert(logical_id.into());
    }

    pub fn logical_id(&self) -> &str {
        &self.logical_id
    }

    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    pub fn properties(&self) -> &Map<String, Value> {
        &self.properties
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    pub fn explicit_dependencies(&self) -> &BTreeSet<String> {
        &self.depends_on
    }

    pub fn get_deletion_policy(&self) -> Option<DeletionPolicy> {
        self.deletion_policy
    }

    pub fn get_metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    /// All resources this one must be created after: explicit edges plus
    /// anything referenced from its properties.
    pub fn dependencies(&self) -> BTreeSet<String> {
        let mut deps = value::references(&Value::Object(self.properties.clone()));
        deps.extend(self.depends_on.iter().cloned());
        deps.remove(&self.logical_id);
        deps
    }

    pub fn to_json(&self) -> Value {
        let mut out = Map::new();
        out.insert("Type".to_string(), Value::String(self.resource_type.clone()));
        if !self.properties.is_empty() {
            out.insert(
                "Properties".to_string(),
                Value::Object(self.properties.clone()),
            );
        }
        if !self.depends_on.is_empty() {
            out.insert(
                "DependsOn".to_string(),
                Value::Array(
                    self.depends_on
                        .iter()
                        .map(|d| Value::String(d.clone()))
                        .collect(),
                ),
            );
        }
        if let Some(policy) = self.update_replace_policy {
            out.insert("UpdateReplacePolicy".to_string(), policy_json(policy));
        }
        if let Some(policy) = self.deletion_policy {
            out.insert("DeletionPolicy".to_string(), policy_json(policy));
        }
        if !self.metadata.is_empty() {
            out.insert("Metadata".to_string(), Value::Object(self.metadata.clone()));
        }
        Value::Object(out)
    }
}

fn policy_json(policy: DeletionPolicy) -> Value {
    serde_json::to_value(policy).unwrap_or(Value::Null)
}
