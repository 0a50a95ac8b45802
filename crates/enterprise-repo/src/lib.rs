// enterprise-repo - CLI for the enterprise package repository stack
//
// `synth` works entirely offline. `deploy`, `publish`, `outputs` and
// `destroy` talk to CloudFormation and S3 with the default AWS credential
// chain, one call at a time on a current-thread runtime.

pub mod aws;
pub mod commands;
mod init;

pub use init::init_tracing;
