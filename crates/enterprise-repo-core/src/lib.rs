// enterprise-repo-core - Stack synthesis for the enterprise package repository
//
// Builds the CloudFormation template for an isolated VPC, a CodeArtifact
// domain with a PyPI mirror and an internal repository, a data bucket, a Glue
// ETL job and the Step Functions state machine that drives it.
//
// Nothing here talks to AWS; deployment lives in the CLI crate.

pub mod assets;
pub mod cidr;
pub mod compliance;
pub mod error;
pub mod iam;
pub mod naming;
pub mod stack;
pub mod statemachine;
pub mod synth;
pub mod template;

pub use assets::{AssetEntry, AssetManifest};
pub use cidr::Ipv4Cidr;
pub use compliance::{ComplianceReport, Finding};
pub use error::{ErrorCode, Result, SynthError};
pub use stack::Stack;
pub use statemachine::StateMachineTemplate;
pub use synth::{synthesize, SynthInputs, Synthesis};
pub use template::{Output, Resource, ResourceGraph, Template};
