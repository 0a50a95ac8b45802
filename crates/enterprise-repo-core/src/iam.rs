//! IAM policy documents

use serde_json::{json, Map, Value};

pub const POLICY_VERSION: &str = "2012-10-17";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    Allow,
    Deny,
}

impl Effect {
    fn as_str(&self) -> &'static str {
        match self {
            Effect::Allow => "Allow",
            Effect::Deny => "Deny",
        }
    }
}

/// One policy statement
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    effect: Effect,
    actions: Vec<String>,
    resources: Vec<Value>,
    principal: Option<Value>,
    condition: Map<String, Value>,
}

impl Statement {
    pub fn allow() -> Self {
        Self {
            effect: Effect::Allow,
            actions: Vec::new(),
            resources: Vec::new(),
            principal: None,
            condition: Map::new(),
        }
    }

    pub fn deny() -> Self {
        Self {
            effect: Effect::Deny,
            ..Self::allow()
        }
    }

    pub fn action(mut self, action: impl Into<String>) -> Self {
        self.actions.push(action.into());
        self
    }

    pub fn actions<I, S>(mut self, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.actions.extend(actions.into_iter().map(Into::into));
        self
    }

    pub fn resource(mut self, resource: impl Into<Value>) -> Self {
        self.resources.push(resource.into());
        self
    }

    pub fn service_principal(mut self, service: &str) -> Self {
        self.principal = Some(json!({ "Service": service }));
        self
    }

    /// Add `{operator: {key: value}}` to the condition block
    pub fn condition(mut self, operator: &str, key: &str, value: impl Into<Value>) -> Self {
        let entry = self
            .condition
            .entry(operator.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(keys) = entry {
            keys.insert(key.to_string(), value.into());
        }
        self
    }

    pub fn to_json(&self) -> Value {
        let mut out = Map::new();
        out.insert("Effect".to_string(), json!(self.effect.as_str()));
        if let Some(principal) = &self.principal {
            out.insert("Principal".to_string(), principal.clone());
        }
        if !self.actions.is_empty() {
            out.insert("Action".to_string(), collapse(self.actions.iter().map(|a| json!(a)).collect()));
        }
        if !self.resources.is_empty() {
            out.insert("Resource".to_string(), collapse(self.resources.clone()));
        }
        if !self.condition.is_empty() {
            out.insert("Condition".to_string(), Value::Object(self.condition.clone()));
        }
        Value::Object(out)
    }
}

/// Single-element lists are written as the bare element
fn collapse(mut items: Vec<Value>) -> Value {
    if items.len() == 1 {
        items.remove(0)
    } else {
        Value::Array(items)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PolicyDocument {
    statements: Vec<Statement>,
}

impl PolicyDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn statement(mut self, statement: Statement) -> Self {
        self.statements.push(statement);
        self
    }

    pub fn to_json(&self) -> Value {
        json!({
            "Version": POLICY_VERSION,
            "Statement": self.statements.iter().map(Statement::to_json).collect::<Vec<_>>(),
        })
    }
}

/// Trust policy letting `service` (e.g. `glue.amazonaws.com`) assume a role
pub fn service_trust_policy(service: &str) -> Value {
    PolicyDocument::new()
        .statement(
            Statement::allow()
                .action("sts:AssumeRole")
                .service_principal(service),
        )
        .to_json()
}

/// String leaves of a statement field that contain `*`, including those
/// nested inside intrinsic functions such as `Fn::Join`.
pub fn wildcard_entries(field: &Value) -> Vec<String> {
    let mut found = Vec::new();
    collect_wildcards(field, &mut found);
    found
}

fn collect_wildcards(value: &Value, found: &mut Vec<String>) {
    match value {
        Value::String(s) if s.contains('*') => found.push(s.clone()),
        Value::Array(items) => items.iter().for_each(|v| collect_wildcards(v, found)),
        Value::Object(map) => map.values().for_each(|v| collect_wildcards(v, found)),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trust_policy_shape() {
        assert_eq!(
            service_trust_policy("states.amazonaws.com"),
            json!({
                "Version": "2012-10-17",
                "Statement": [{
                    "Effect": "Allow",
                    "Principal": { "Service": "states.amazonaws.com" },
                    "Action": "sts:AssumeRole"
                }]
            })
        );
    }

    #[test]
    fn test_condition_and_multiple_resources() {
        let statement = Statement::allow()
            .action("iam:PassRole")
            .resource("*")
            .condition("StringLike", "iam:PassedToService", "glue.amazonaws.com")
            .to_json();
        assert_eq!(
            statement["Condition"],
            json!({ "StringLike": { "iam:PassedToService": "glue.amazonaws.com" } })
        );

        let statement = Statement::allow()
            .actions(["s3:GetObject", "s3:PutObject"])
            .resource("a")
            .resource("b")
            .to_json();
        assert_eq!(statement["Action"], json!(["s3:GetObject", "s3:PutObject"]));
        assert_eq!(statement["Resource"], json!(["a", "b"]));
    }

    #[test]
    fn test_wildcard_entries() {
        assert_eq!(wildcard_entries(&json!("s3:*")), vec!["s3:*"]);
        assert_eq!(wildcard_entries(&json!(["a", "*"])), vec!["*"]);
        assert!(wildcard_entries(&json!({ "Fn::GetAtt": ["B", "Arn"] })).is_empty());
        assert_eq!(
            wildcard_entries(&json!({ "Fn::Join": ["", [{ "Fn::GetAtt": ["B", "Arn"] }, "/*"]] })),
            vec!["/*"]
        );
    }
}
