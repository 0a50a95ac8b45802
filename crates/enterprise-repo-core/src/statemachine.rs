//! State machine definition template.
//!
//! The definition is loaded once and never mutated; patching produces a new
//! document. `${name}` placeholders are left for Step Functions to resolve
//! from `DefinitionSubstitutions` at deploy time.

use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::Value;
use std::collections::BTreeSet;
use std::path::Path;

use crate::error::{Result, SynthError};
use crate::template::value;

/// Substitution variables supplied to every deployment of the definition
pub const SUBSTITUTION_VARIABLES: [&str; 3] = ["domain", "aws_account_id", "jobname"];

#[derive(Debug, Clone, PartialEq)]
pub struct StateMachineTemplate {
    document: Value,
}

impl StateMachineTemplate {
    /// Accepts any JSON object carrying a `States` object
    pub fn from_value(document: Value) -> Result<Self> {
        match document.get("States") {
            Some(Value::Object(_)) => Ok(Self { document }),
            Some(_) => Err(SynthError::template_patch("'States' must be an object")),
            None => Err(SynthError::template_patch("definition has no 'States'")),
        }
    }

    pub fn parse(text: &str) -> Result<Self> {
        let document: Value = serde_json::from_str(text)
            .map_err(|e| SynthError::template_patch(format!("invalid JSON: {}", e)))?;
        Self::from_value(document)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            SynthError::template_patch(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::parse(&text).map_err(|e| match e {
            SynthError::TemplatePatch { message, .. } => {
                SynthError::template_patch(format!("{}: {}", path.display(), message))
            }
            other => other,
        })
    }

    pub fn document(&self) -> &Value {
        &self.document
    }

    pub fn state(&self, name: &str) -> Option<&Value> {
        self.document.get("States").and_then(|states| states.get(name))
    }
}

/// `States.Format` expression producing `--index-url=<url>` with the token
/// from the previous step filled into the URL's `{}` slot.
pub fn index_url_expression(url: &str) -> String {
    format!(
        "States.Format('--index-url={}', $.taskresult.AuthorizationToken)",
        url.trim()
    )
}

/// Copy of the template with `States.<state>.Parameters.<parameter>` set to
/// `expression`. Every other field is carried over unchanged.
pub fn patch_parameter(
    template: &StateMachineTemplate,
    state: &str,
    parameter: &str,
    expression: &str,
) -> Result<Value> {
    let mut document = template.document.clone();
    let target = document
        .get_mut("States")
        .and_then(|states| states.get_mut(state))
        .ok_or_else(|| SynthError::template_patch(format!("state '{}' not found", state)))?;
    let parameters = target
        .get_mut("Parameters")
        .and_then(Value::as_object_mut)
        .ok_or_else(|| {
            SynthError::template_patch(format!("state '{}' has no 'Parameters' object", state))
        })?;
    parameters.insert(parameter.to_string(), Value::String(expression.to_string()));
    Ok(document)
}

/// Serialize with four-space indentation
pub fn render(document: &Value) -> Result<String> {
    let mut buf = Vec::new();
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
    document.serialize(&mut serializer)?;
    String::from_utf8(buf).map_err(|e| SynthError::template_patch(e.to_string()))
}

/// Declared variables whose `${name}` never appears in `rendered`
pub fn unused_variables<'a>(rendered: &str, variables: &[&'a str]) -> Vec<&'a str> {
    let present: BTreeSet<String> = value::placeholders(rendered).into_iter().collect();
    variables
        .iter()
        .copied()
        .filter(|name| !present.contains(*name))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> StateMachineTemplate {
        StateMachineTemplate::from_value(json!({
            "Comment": "test",
            "StartAt": "GetToken",
            "States": {
                "GetToken": {
                    "Type": "Task",
                    "Parameters": { "Domain": "${domain}", "DomainOwner": "${aws_account_id}" },
                    "Next": "GenerateCodeArtifactURL"
                },
                "GenerateCodeArtifactURL": {
                    "Type": "Pass",
                    "Parameters": { "codeartifacturl.$": "placeholder", "keep": 1 },
                    "Next": "Run"
                },
                "Run": {
                    "Type": "Task",
                    "Parameters": { "JobName": "${jobname}" },
                    "End": true
                }
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_patch_sets_only_the_target_field() {
        let template = sample();
        let before = template.document().clone();
        let patched = patch_parameter(
            &template,
            "GenerateCodeArtifactURL",
            "codeartifacturl.$",
            "EXPR",
        )
        .unwrap();

        assert_eq!(template.document(), &before);
        assert_eq!(
            patched["States"]["GenerateCodeArtifactURL"]["Parameters"],
            json!({ "codeartifacturl.$": "EXPR", "keep": 1 })
        );
        let mut expected = before;
        expected["States"]["GenerateCodeArtifactURL"]["Parameters"]["codeartifacturl.$"] =
            json!("EXPR");
        assert_eq!(patched, expected);
    }

    #[test]
    fn test_patch_missing_state_or_parameters() {
        let template = sample();
        let err = patch_parameter(&template, "Nope", "x", "y").unwrap_err();
        assert!(err.to_string().contains("state 'Nope' not found"));

        let template = StateMachineTemplate::from_value(json!({
            "States": { "GenerateCodeArtifactURL": { "Type": "Pass" } }
        }))
        .unwrap();
        assert!(patch_parameter(&template, "GenerateCodeArtifactURL", "x", "y").is_err());
    }

    #[test]
    fn test_rejects_documents_without_states() {
        assert!(StateMachineTemplate::parse("{}").is_err());
        assert!(StateMachineTemplate::parse("{\"States\": []}").is_err());
        assert!(StateMachineTemplate::parse("not json").is_err());
    }

    #[test]
    fn test_index_url_expression() {
        assert_eq!(
            index_url_expression(" https://aws:{}@host/pypi/repo/simple/ "),
            "States.Format('--index-url=https://aws:{}@host/pypi/repo/simple/', $.taskresult.AuthorizationToken)"
        );
    }

    #[test]
    fn test_render_uses_four_spaces_and_round_trips() {
        let document = sample().document().clone();
        let rendered = render(&document).unwrap();
        assert!(rendered.contains("\n    \"StartAt\": \"GetToken\""));
        let parsed: Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(parsed, document);
    }

    #[test]
    fn test_unused_variables() {
        let rendered = render(sample().document()).unwrap();
        assert!(unused_variables(&rendered, &SUBSTITUTION_VARIABLES).is_empty());
        assert_eq!(
            unused_variables("{\"a\": \"${domain}\"}", &SUBSTITUTION_VARIABLES),
            vec!["aws_account_id", "jobname"]
        );
    }

    #[test]
    fn test_load_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sfn.json");
        std::fs::write(&path, "{").unwrap();
        let err = StateMachineTemplate::load(&path).unwrap_err();
        assert!(err.to_string().contains("sfn.json"));
        assert!(StateMachineTemplate::load(dir.path().join("missing.json")).is_err());
    }
}
