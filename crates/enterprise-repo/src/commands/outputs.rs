//! Stack outputs for downstream tooling

use anyhow::{bail, Result};
use clap::Args;
use std::collections::BTreeMap;

use enterprise_repo_config::StackConfig;
use enterprise_repo_core::stack::outputs::{DOMAIN_NAME, REPOSITORY_NAME};

use crate::aws::{self, Session};

#[derive(Args, Debug, Default)]
pub struct OutputsArgs {
    /// Print the outputs as a JSON object
    #[arg(long)]
    pub json: bool,
}

/// `aws codeartifact login` invocation configuring pip against the repository
pub fn pip_login_command(outputs: &BTreeMap<String, String>, region: &str) -> Option<String> {
    let domain = outputs.get(DOMAIN_NAME)?;
    let repository = outputs.get(REPOSITORY_NAME)?;
    Some(format!(
        "aws codeartifact login --tool pip --domain {} --repository {} --region {}",
        domain, repository, region
    ))
}

pub async fn run(args: OutputsArgs, config: &StackConfig) -> Result<()> {
    let session = Session::load(config).await?;
    let client = session.cloudformation();

    let Some(state) = aws::describe_stack(&client, &config.stack.name).await? else {
        bail!("Stack '{}' does not exist", config.stack.name);
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&state.outputs)?);
        return Ok(());
    }

    print_outputs(&config.stack.name, &state.outputs);
    if let Some(login) = pip_login_command(&state.outputs, &session.region) {
        println!();
        println!("Configure pip:");
        println!("  {}", login);
    }
    Ok(())
}

pub(crate) fn print_outputs(stack_name: &str, outputs: &BTreeMap<String, String>) {
    println!("Outputs of stack '{}':", stack_name);
    for (key, value) in outputs {
        println!("  {} = {}", key, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pip_login_command() {
        let mut outputs = BTreeMap::new();
        outputs.insert(DOMAIN_NAME.to_string(), "enterprise-repo-domain".to_string());
        assert_eq!(pip_login_command(&outputs, "us-east-1"), None);

        outputs.insert(REPOSITORY_NAME.to_string(), "enterprise-repo".to_string());
        assert_eq!(
            pip_login_command(&outputs, "us-east-1").unwrap(),
            "aws codeartifact login --tool pip --domain enterprise-repo-domain --repository enterprise-repo --region us-east-1"
        );
    }
}
