//! `format-verify` pass: formatting, vet, optional analyzers, license headers, codegen
//!
//! Any finding fails the pass. A missing optional analyzer does not.

use std::path::Path;

use tracing::{info, warn};

use opgate_core::capability::{Requirement, probe_tool};
use opgate_core::config::VerifyConfig;
use opgate_core::error::OpgateError;
use opgate_core::pass::Pass;
use opgate_core::process::{CommandOutput, CommandRunner, CommandSpec};

use crate::context::RunContext;
use crate::passes::license::find_missing_headers;

/// Code quality gate.
pub struct VerifyPass;

impl Pass<RunContext> for VerifyPass {
    fn name(&self) -> &str {
        "format-verify"
    }

    fn description(&self) -> &str {
        "gofmt, go vet, optional analyzers, license headers and generated code"
    }

    async fn run(&self, ctx: &mut RunContext) -> Result<(), OpgateError> {
        let verify = ctx.config.verify.clone();
        let commands = &ctx.commands;

        check_gofmt(commands, &verify.source_dirs).await?;
        check_vet(commands, &verify.packages).await?;
        for tool in &verify.optional_tools {
            run_optional_tool(commands, tool, &verify.packages).await?;
        }
        check_license_headers(commands.work_dir(), &verify).await?;
        check_codegen(commands, &verify.codegen_command).await?;

        info!("verification passed");
        Ok(())
    }
}

/// `gofmt -l`: every listed file is a finding.
async fn check_gofmt(commands: &CommandRunner, source_dirs: &[String]) -> Result<(), OpgateError> {
    let dirs = existing_dirs(commands.work_dir(), source_dirs);
    if dirs.is_empty() {
        warn!("no source directories found, skipping gofmt");
        return Ok(());
    }

    let spec = CommandSpec::new("gofmt")
        .arg("-l")
        .args(dirs)
        .capture_output();
    let output = commands.run(&spec).await?;

    let mut findings = output.stdout_lines();
    if !output.success() {
        findings.extend(stderr_lines(&output));
    }
    findings_to_result("gofmt", findings)
}

/// `go vet`: a non-zero status is a finding.
async fn check_vet(commands: &CommandRunner, packages: &[String]) -> Result<(), OpgateError> {
    if packages.is_empty() {
        return Ok(());
    }
    let spec = CommandSpec::new("go")
        .arg("vet")
        .args(packages)
        .capture_output();
    let output = commands.run(&spec).await?;
    if output.success() {
        return Ok(());
    }
    findings_to_result("go vet", failure_findings(&spec, &output))
}

/// Run an analyzer only if it is installed.
///
/// Absence is a skip; findings from an installed analyzer fail the pass.
pub(crate) async fn run_optional_tool(
    commands: &CommandRunner,
    tool: &str,
    packages: &[String],
) -> Result<(), OpgateError> {
    let Some(path) = probe_tool(tool, Requirement::Optional).into_result()? else {
        return Ok(());
    };

    let spec = CommandSpec::new(path.display().to_string())
        .args(packages)
        .capture_output();
    let output = commands.run(&spec).await?;
    if output.success() {
        info!(tool, "analyzer reported no issues");
        return Ok(());
    }
    findings_to_result(tool, failure_findings(&spec, &output))
}

async fn check_license_headers(root: &Path, verify: &VerifyConfig) -> Result<(), OpgateError> {
    let root = root.to_path_buf();
    let source_dirs = verify.source_dirs.clone();
    let header_lines = verify.license_header_lines;
    let markers = verify.license_markers.clone();

    let missing = tokio::task::spawn_blocking(move || {
        find_missing_headers(&root, &source_dirs, header_lines, &markers)
    })
    .await
    .map_err(|e| OpgateError::Io(std::io::Error::other(format!("license check task failed: {e}"))))??;

    findings_to_result("license headers", missing)
}

/// Run the generated-code verifier, if one is configured.
pub(crate) async fn check_codegen(commands: &CommandRunner, argv: &[String]) -> Result<(), OpgateError> {
    let Some(spec) = CommandSpec::from_argv(argv) else {
        info!("no codegen verifier configured, skipping");
        return Ok(());
    };
    let output = commands.run(&spec).await?;
    if output.success() {
        return Ok(());
    }
    findings_to_result("codegen", vec![format!("`{spec}` exited with status {:?}", output.status)])
}

fn existing_dirs(root: &Path, dirs: &[String]) -> Vec<String> {
    dirs.iter()
        .filter(|d| root.join(d).is_dir())
        .cloned()
        .collect()
}

fn stderr_lines(output: &CommandOutput) -> Vec<String> {
    output
        .stderr
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_owned)
        .collect()
}

fn failure_findings(spec: &CommandSpec, output: &CommandOutput) -> Vec<String> {
    let mut findings = output.stdout_lines();
    findings.extend(stderr_lines(output));
    if findings.is_empty() {
        findings.push(format!("`{spec}` exited with status {:?}", output.status));
    }
    findings
}

fn findings_to_result(step: &str, findings: Vec<String>) -> Result<(), OpgateError> {
    if findings.is_empty() {
        return Ok(());
    }
    for finding in &findings {
        warn!(step, finding = %finding, "verification finding");
    }
    Err(OpgateError::Verification {
        step: step.to_owned(),
        findings,
    })
}
