//! CloudFormation intrinsic functions and reference discovery.
//!
//! Property values are plain `serde_json::Value`s; these helpers build the
//! intrinsic-function shapes and find which logical ids a value points at.

use serde_json::{json, Value};
use std::collections::BTreeSet;

pub const ACCOUNT_ID: &str = "AWS::AccountId";
pub const REGION: &str = "AWS::Region";
pub const PARTITION: &str = "AWS::Partition";
pub const URL_SUFFIX: &str = "AWS::URLSuffix";

/// `{"Ref": id}`
pub fn reference(logical_id: &str) -> Value {
    json!({ "Ref": logical_id })
}

/// `{"Fn::GetAtt": [id, attribute]}`
pub fn get_att(logical_id: &str, attribute: &str) -> Value {
    json!({ "Fn::GetAtt": [logical_id, attribute] })
}

/// `{"Fn::Sub": template}`
pub fn sub(template: impl Into<String>) -> Value {
    json!({ "Fn::Sub": template.into() })
}

/// `{"Fn::Join": [delimiter, parts]}`
pub fn join(delimiter: &str, parts: Vec<Value>) -> Value {
    json!({ "Fn::Join": [delimiter, parts] })
}

/// `{"Fn::Select": [index, list]}`
pub fn select(index: usize, list: Value) -> Value {
    json!({ "Fn::Select": [index, list] })
}

/// Availability zones of the deployment region
pub fn get_azs() -> Value {
    json!({ "Fn::GetAZs": "" })
}

/// A string that may embed `${...}` placeholders: emitted as `Fn::Sub` when it
/// does, as a plain literal otherwise.
pub fn string(s: &str) -> Value {
    if s.contains("${") {
        sub(s)
    } else {
        Value::String(s.to_string())
    }
}

/// Like [`string`], but only pseudo-parameter placeholders (`${AWS::*}`) are
/// resolved; any other `${name}` is kept as literal text.
///
/// Needed for documents that carry their own placeholder syntax, such as a
/// state machine definition with `DefinitionSubstitutions`.
pub fn pseudo_string(s: &str) -> Value {
    let mut parts: Vec<Value> = Vec::new();
    let mut literal = String::new();
    let mut rest = s;
    while let Some(start) = rest.find("${AWS::") {
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            break;
        };
        literal.push_str(&rest[..start]);
        if !literal.is_empty() {
            parts.push(Value::String(std::mem::take(&mut literal)));
        }
        parts.push(reference(&after[..end]));
        rest = &after[end + 1..];
    }
    literal.push_str(rest);

    if parts.is_empty() {
        return Value::String(literal);
    }
    if !literal.is_empty() {
        parts.push(Value::String(literal));
    }
    join("", parts)
}

/// ARN of an AWS-managed IAM policy, e.g. `service-role/AWSGlueServiceRole`
pub fn aws_managed_policy_arn(name: &str) -> Value {
    sub(format!("arn:${{{}}}:iam::aws:policy/{}", PARTITION, name))
}

/// Logical ids referenced by `value` through `Ref`, `Fn::GetAtt` or `Fn::Sub`.
///
/// Pseudo parameters (`AWS::*`) are not resources and are skipped.
pub fn references(value: &Value) -> BTreeSet<String> {
    let mut found = BTreeSet::new();
    collect(value, &mut found);
    found
}

fn collect(value: &Value, found: &mut BTreeSet<String>) {
    match value {
        Value::Object(map) if map.len() == 1 => {
            let Some((key, inner)) = map.iter().next() else {
                return;
            };
            match key.as_str() {
                "Ref" => {
                    if let Some(id) = inner.as_str() {
                        insert_resource(id, found);
                    }
                }
                "Fn::GetAtt" => match inner {
                    Value::Array(parts) => {
                        if let Some(id) = parts.first().and_then(Value::as_str) {
                            insert_resource(id, found);
                        }
                    }
                    Value::String(dotted) => {
                        if let Some((id, _)) = dotted.split_once('.') {
                            insert_resource(id, found);
                        }
                    }
                    _ => {}
                },
                "Fn::Sub" => match inner {
                    Value::String(template) => collect_sub(template, &BTreeSet::new(), found),
                    Value::Array(parts) => {
                        let locals: BTreeSet<String> = parts
                            .get(1)
                            .and_then(Value::as_object)
                            .map(|vars| vars.keys().cloned().collect())
                            .unwrap_or_default();
                        if let Some(template) = parts.first().and_then(Value::as_str) {
                            collect_sub(template, &locals, found);
                        }
                        if let Some(vars) = parts.get(1) {
                            collect(vars, found);
                        }
                    }
                    _ => {}
                },
                _ => collect(inner, found),
            }
        }
        Value::Object(map) => map.values().for_each(|v| collect(v, found)),
        Value::Array(items) => items.iter().for_each(|v| collect(v, found)),
        _ => {}
    }
}

fn collect_sub(template: &str, locals: &BTreeSet<String>, found: &mut BTreeSet<String>) {
    for name in placeholders(template) {
        // ${!Literal} is an escaped literal
        if name.starts_with('!') {
            continue;
        }
        let id = name.split('.').next().unwrap_or(&name);
        if !locals.contains(id) {
            insert_resource(id, found);
        }
    }
}

fn insert_resource(id: &str, found: &mut BTreeSet<String>) {
    if !id.starts_with("AWS::") && !id.is_empty() {
        found.insert(id.to_string());
    }
}

/// Names of all `${name}` placeholders in `text`, in order of appearance
pub fn placeholders(text: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut rest = text;
    while let Some(start) = rest.find("${") {
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                names.push(after[..end].to_string());
                rest = &after[end + 1..];
            }
            None => break,
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_switches_to_sub() {
        assert_eq!(string("plain"), json!("plain"));
        assert_eq!(
            string("bucket-${AWS::Region}"),
            json!({ "Fn::Sub": "bucket-${AWS::Region}" })
        );
    }

    #[test]
    fn test_pseudo_string_keeps_foreign_placeholders() {
        assert_eq!(pseudo_string("${domain}"), json!("${domain}"));
        assert_eq!(
            pseudo_string("a.${AWS::Region}.b/${domain}"),
            json!({ "Fn::Join": ["", ["a.", { "Ref": "AWS::Region" }, ".b/${domain}"]] })
        );
        assert_eq!(
            pseudo_string("${AWS::Region}"),
            json!({ "Fn::Join": ["", [{ "Ref": "AWS::Region" }]] })
        );
    }

    #[test]
    fn test_references_skip_pseudo_parameters() {
        let value = json!({
            "VpcId": reference("Vpc"),
            "Region": reference(REGION),
            "Arn": get_att("Role", "Arn"),
            "Nested": [{ "Fn::Join": ["", [reference("Bucket"), "/*"]] }],
        });
        let refs: Vec<String> = references(&value).into_iter().collect();
        assert_eq!(refs, vec!["Bucket", "Role", "Vpc"]);
    }

    #[test]
    fn test_sub_references() {
        let value = sub("arn:${AWS::Partition}:s3:::${DataBucket}/${Job.Name}/${!Literal}");
        let refs: Vec<String> = references(&value).into_iter().collect();
        assert_eq!(refs, vec!["DataBucket", "Job"]);
    }

    #[test]
    fn test_sub_with_local_variables() {
        let value = json!({
            "Fn::Sub": ["${Local}-${Other}", { "Local": reference("Target") }]
        });
        let refs: Vec<String> = references(&value).into_iter().collect();
        assert_eq!(refs, vec!["Other", "Target"]);
    }

    #[test]
    fn test_placeholders_in_order() {
        assert_eq!(
            placeholders("${domain}/${aws_account_id}/${jobname}/${unterminated"),
            vec!["domain", "aws_account_id", "jobname"]
        );
    }
}
