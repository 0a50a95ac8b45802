//! Create or update the stack, then publish its assets

use anyhow::{bail, Result};
use clap::Args;

use enterprise_repo_config::StackConfig;

use super::outputs::print_outputs;
use super::publish::publish_manifest;
use super::synth::synthesize_stack;
use crate::aws::{self, Session, StackChange};

#[derive(Args, Debug, Default)]
pub struct DeployArgs {
    /// Skip uploading the asset manifest after the stack settles
    #[arg(long)]
    pub no_publish: bool,
}

pub async fn run(args: DeployArgs, config: &StackConfig) -> Result<()> {
    let stack_name = &config.stack.name;

    let synthesis = synthesize_stack(config)?;
    synthesis.write(&config.stack.output_dir)?;
    // Compact body keeps the request under the inline template size limit
    let body = serde_json::to_string(&synthesis.template_json()?)?;

    let session = Session::load(config).await?;
    let client = session.cloudformation();

    println!();
    println!("Deploying stack '{}' to {}", stack_name, session.region);

    let change = aws::submit_template(&client, stack_name, &body).await?;
    let state = if change == StackChange::Unchanged {
        aws::describe_stack(&client, stack_name).await?
    } else {
        aws::wait_for_stack(&client, stack_name).await?
    };

    let Some(state) = state else {
        bail!("Stack '{}' disappeared during deployment", stack_name);
    };
    if !aws::deployment_succeeded(change, &state.status) {
        bail!(
            "Deployment of '{}' ended in {}: {}",
            stack_name,
            state.status,
            state.reason.as_deref().unwrap_or("no reason given")
        );
    }

    println!("Stack '{}' is {}", stack_name, state.status);
    print_outputs(stack_name, &state.outputs);

    if args.no_publish {
        println!("Skipping asset publish (--no-publish)");
        return Ok(());
    }
    let count = publish_manifest(&synthesis.assets, config, &session).await?;
    println!("Published {} asset(s)", count);
    Ok(())
}
