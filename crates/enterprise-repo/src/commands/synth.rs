//! Local synthesis: template.json, assets.json and the compliance summary

use anyhow::{Context, Result};
use clap::Args;
use dialoguer::Confirm;
use std::path::PathBuf;

use enterprise_repo_config::StackConfig;
use enterprise_repo_core::synth::TEMPLATE_FILE;
use enterprise_repo_core::{synthesize, ComplianceReport, SynthInputs, Synthesis};

#[derive(Args, Debug, Default)]
pub struct SynthArgs {
    /// Output directory (overrides stack.output_dir)
    #[arg(short, long, value_name = "DIR")]
    pub out: Option<PathBuf>,

    /// Overwrite existing output without asking
    #[arg(long)]
    pub force: bool,
}

/// Load the local inputs named by the config and synthesize the stack
pub fn synthesize_stack(config: &StackConfig) -> Result<Synthesis> {
    let inputs = SynthInputs::from_config(config).with_context(|| {
        format!(
            "Failed to load state machine template {}",
            config.orchestration.template_path.display()
        )
    })?;
    // Unsuppressed findings are already logged by the compliance check
    Ok(synthesize(config, &inputs)?)
}

/// One line per rule: `<rule> <resource count> <suppressed|FAILED>`
pub fn compliance_summary(report: &ComplianceReport) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    let mut rules: Vec<&str> = report.findings.iter().map(|f| f.rule_id.as_str()).collect();
    rules.sort_unstable();
    rules.dedup();

    for rule in rules {
        let findings: Vec<_> = report.findings.iter().filter(|f| f.rule_id == rule).collect();
        let open = findings.iter().filter(|f| f.suppressed_by.is_none()).count();
        let status = if open == 0 { "suppressed" } else { "FAILED" };
        lines.push(format!("{:<24} {:>3} resource(s)  {}", rule, findings.len(), status));
    }
    lines
}

pub fn run(args: SynthArgs, config: &StackConfig) -> Result<()> {
    let out_dir = args.out.unwrap_or_else(|| config.stack.output_dir.clone());

    if out_dir.join(TEMPLATE_FILE).exists() && !args.force {
        let overwrite = Confirm::new()
            .with_prompt(format!("{} already exists. Overwrite?", out_dir.display()))
            .default(false)
            .interact()?;
        if !overwrite {
            println!("Aborted.");
            return Ok(());
        }
    }

    let synthesis = synthesize_stack(config)?;
    let written = synthesis.write(&out_dir)?;

    println!();
    println!("Synthesized stack '{}'", config.stack.name);
    println!("  resources: {}", synthesis.stack.template.graph().len());
    println!("  assets:    {} ({} bytes)", synthesis.assets.len(), synthesis.assets.total_size());
    for path in &written {
        println!("  wrote      {}", path.display());
    }

    let summary = compliance_summary(&synthesis.compliance);
    if !summary.is_empty() {
        println!();
        println!("Compliance:");
        for line in summary {
            println!("  {}", line);
        }
    }
    println!();
    Ok(())
}
