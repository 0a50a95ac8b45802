//! Subcommands of the `enterprise-repo` binary

use clap::Subcommand;

pub mod deploy;
pub mod destroy;
pub mod outputs;
pub mod publish;
pub mod synth;

#[derive(Subcommand)]
pub enum Command {
    /// Synthesize the CloudFormation template and asset manifest
    Synth(synth::SynthArgs),
    /// Synthesize, then create or update the stack and publish assets
    Deploy(deploy::DeployArgs),
    /// Upload the asset manifest to the data bucket
    Publish(publish::PublishArgs),
    /// Print the deployed stack outputs
    Outputs(outputs::OutputsArgs),
    /// Empty the data bucket and delete the stack
    Destroy(destroy::DestroyArgs),
}
