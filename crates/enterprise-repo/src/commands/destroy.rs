//! Tear the stack down

use anyhow::{bail, Result};
use clap::Args;
use dialoguer::Confirm;

use enterprise_repo_config::StackConfig;
use enterprise_repo_core::naming;

use crate::aws::{self, Session};

#[derive(Args, Debug, Default)]
pub struct DestroyArgs {
    /// Skip the confirmation prompt
    #[arg(long)]
    pub force: bool,
}

pub async fn run(args: DestroyArgs, config: &StackConfig) -> Result<()> {
    let stack_name = &config.stack.name;

    if !args.force {
        let proceed = Confirm::new()
            .with_prompt(format!(
                "Delete stack '{}' and every object in its data bucket?",
                stack_name
            ))
            .default(false)
            .interact()?;
        if !proceed {
            println!("Aborted.");
            return Ok(());
        }
    }

    let session = Session::load(config).await?;
    let client = session.cloudformation();

    if config.storage.auto_delete_objects {
        let bucket = naming::bucket_name(
            &config.storage.bucket_prefix,
            &config.environment.account_id,
            Some(&session.region),
        );
        aws::empty_bucket(&bucket, &session.region).await?;
    }

    if !aws::delete_stack(&client, stack_name).await? {
        println!("Stack '{}' does not exist", stack_name);
        return Ok(());
    }

    if let Some(state) = aws::wait_for_stack(&client, stack_name).await? {
        if state.status != "DELETE_COMPLETE" {
            bail!(
                "Deletion of '{}' ended in {}: {}",
                stack_name,
                state.status,
                state.reason.as_deref().unwrap_or("no reason given")
            );
        }
    }

    println!("Stack '{}' deleted", stack_name);
    Ok(())
}
