//! `synth` against the scripts shipped in the repository.

use std::path::{Path, PathBuf};

use enterprise_repo::commands::synth::{self, compliance_summary, SynthArgs};
use enterprise_repo_config::StackConfig;
use enterprise_repo_core::assets::{AssetManifest, MANIFEST_FILE};
use enterprise_repo_core::synth::TEMPLATE_FILE;

fn repo_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../..")
}

fn config() -> StackConfig {
    let root = repo_root();
    let mut config = StackConfig::default();
    config.environment.account_id = "123456789012".to_string();
    config.environment.region = Some("us-west-2".to_string());
    config.orchestration.template_path = root.join("scripts/statemachine/sfn.json");
    config.glue.script_path = root.join("scripts/glue/job.py");
    config.storage.seed_dir = root.join("scripts/s3");
    config
}

#[test]
fn synth_writes_template_and_manifest() {
    let out = tempfile::tempdir().unwrap();
    let out_dir = out.path().join("stack.out");

    synth::run(
        SynthArgs {
            out: Some(out_dir.clone()),
            force: true,
        },
        &config(),
    )
    .unwrap();

    let template: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(out_dir.join(TEMPLATE_FILE)).unwrap())
            .unwrap();
    assert!(template["Resources"]
        .as_object()
        .unwrap()
        .contains_key("EnterpriseRepoDomain"));

    let manifest = AssetManifest::load(out_dir.join(MANIFEST_FILE)).unwrap();
    assert!(manifest.is_resolved());
    assert_eq!(manifest.buckets(), vec!["codeartifactblog-89012-us-west-2"]);
    assert!(manifest.get("seed:taxi_trips.csv").is_some());
}

#[test]
fn synth_overwrites_with_force() {
    let out = tempfile::tempdir().unwrap();
    std::fs::write(out.path().join(TEMPLATE_FILE), "stale").unwrap();

    synth::run(
        SynthArgs {
            out: Some(out.path().to_path_buf()),
            force: true,
        },
        &config(),
    )
    .unwrap();

    let written = std::fs::read_to_string(out.path().join(TEMPLATE_FILE)).unwrap();
    assert!(written.starts_with('{'));
}

#[test]
fn compliance_summary_lists_each_rule_once() {
    let synthesis = synth::synthesize_stack(&config()).unwrap();
    let summary = compliance_summary(&synthesis.compliance);
    assert_eq!(summary.len(), 5);
    assert!(summary.iter().all(|line| line.ends_with("suppressed")));
    assert!(summary[0].starts_with("AwsSolutions-IAM4"));
}

#[test]
fn missing_template_is_reported_with_its_path() {
    let mut config = config();
    config.orchestration.template_path = PathBuf::from("does/not/exist.json");
    let err = synth::synthesize_stack(&config).unwrap_err();
    assert!(format!("{:#}", err).contains("does/not/exist.json"));
}

#[test]
fn relaxed_compliance_still_synthesizes() {
    let mut config = config();
    config.compliance.suppressions.clear();
    config.compliance.fail_on_findings = false;

    let synthesis = synth::synthesize_stack(&config).unwrap();
    assert!(!synthesis.compliance.is_clean());
    let summary = compliance_summary(&synthesis.compliance);
    assert_eq!(summary.len(), 5);
    assert!(summary.iter().all(|line| line.ends_with("FAILED")));
}
