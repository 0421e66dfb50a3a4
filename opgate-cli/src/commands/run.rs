//! `opgate run` command handler

use std::io::Write;

use serde::Serialize;
use tracing::{error, info};

use opgate_core::config::OpgateConfig;
use opgate_core::error::OpgateError;
use opgate_core::pass::{PassRecord, PassRegistry, PassSelection, RunError, RunReport};
use opgate_core::signal::Interrupt;
use opgate_provision::ServiceHandle;

use crate::cli::RunArgs;
use crate::context::RunContext;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};
use crate::passes;

/// Execute the `run` command.
///
/// Installs the SIGINT/SIGTERM listener for the duration of the run.
pub async fn execute(
    args: RunArgs,
    config: OpgateConfig,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let selection = resolve_selection(args.passes.as_deref(), &config)?;
    let registry = passes::registry()?;

    let interrupt = Interrupt::new();
    let listener = interrupt.listen();
    let mut ctx = RunContext::new(config, interrupt.clone());

    let result = run_selection(&registry, &selection, &mut ctx).await;
    listener.abort();

    let report = result?;
    writer.render(&RunSummary::new(&ctx, &selection, report))
}

/// `--passes` wins over the configured selection.
pub fn resolve_selection(
    flag: Option<&str>,
    config: &OpgateConfig,
) -> Result<PassSelection, CliError> {
    match flag {
        Some(passes) => Ok(passes.parse::<PassSelection>()?),
        None => Ok(config.selection()),
    }
}

/// Run the selection, reporting an interrupt in preference to whatever
/// error the interrupted pass produced.
pub async fn run_selection(
    registry: &PassRegistry<RunContext>,
    selection: &PassSelection,
    ctx: &mut RunContext,
) -> Result<RunReport, RunError> {
    info!(run_id = %ctx.run_id, selection = %selection, "run starting");
    let interrupt = ctx.interrupt.clone();

    match registry.run(selection, ctx, &interrupt).await {
        Err(RunError::PassFailed { pass, source })
            if interrupt.is_triggered() && !matches!(source, OpgateError::Interrupted { .. }) =>
        {
            error!(pass = %pass, error = %source, "pass failed while interrupted");
            Err(RunError::PassFailed {
                pass,
                source: interrupt.error(),
            })
        }
        other => other,
    }
}

/// Summary of a successful run.
#[derive(Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub selection: Vec<String>,
    pub passes: Vec<PassRecord>,
    pub total_ms: u64,
    /// Services provisioned or adopted during the run
    pub services: Vec<ServiceHandle>,
}

impl RunSummary {
    pub fn new(ctx: &RunContext, selection: &PassSelection, report: RunReport) -> Self {
        Self {
            run_id: ctx.run_id.clone(),
            selection: selection.names().to_vec(),
            passes: report.passes,
            total_ms: report.total_ms,
            services: ctx.services.iter().cloned().collect(),
        }
    }
}

impl Render for RunSummary {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Run {} {}", self.run_id, "PASSED".green().bold())?;
        for pass in &self.passes {
            writeln!(w, "  {} {:<16} {:>8} ms", "✓".green(), pass.name, pass.duration_ms)?;
        }
        if !self.services.is_empty() {
            writeln!(w, "Services:")?;
            for service in &self.services {
                let origin = if service.started_here { "started" } else { "reused" };
                writeln!(w, "  {:<20} {:<20} {}", service.name, service.endpoint, origin)?;
            }
        }
        writeln!(w, "Total: {} ms", self.total_ms)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opgate_core::error::ConfigError;

    #[test]
    fn test_flag_overrides_configured_selection() {
        let mut config = OpgateConfig::default();
        config.general.passes = vec!["unit".to_owned()];
        let selection = resolve_selection(Some("build, e2e-fast"), &config).expect("valid flag");
        assert_eq!(selection.names(), ["build", "e2e-fast"]);
    }

    #[test]
    fn test_configured_selection_without_flag() {
        let mut config = OpgateConfig::default();
        config.general.passes = vec!["unit".to_owned()];
        let selection = resolve_selection(None, &config).expect("configured selection");
        assert_eq!(selection.names(), ["unit"]);
    }

    #[test]
    fn test_empty_flag_is_config_error() {
        let err = resolve_selection(Some(" , "), &OpgateConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            CliError::Core(OpgateError::Config(ConfigError::EmptySelection))
        ));
        assert_eq!(err.exit_code(), 2);
    }

    #[tokio::test]
    async fn test_unknown_pass_rejected_before_any_pass_runs() {
        let registry = passes::registry().expect("registry");
        let mut ctx = RunContext::new(OpgateConfig::default(), Interrupt::new());
        let selection: PassSelection = "unit,lint".parse().expect("parse");

        let err = run_selection(&registry, &selection, &mut ctx).await.unwrap_err();
        assert!(matches!(err, RunError::Selection(ConfigError::UnknownPass { .. })));
        assert!(ctx.services.is_empty(), "no pass may have run");
    }

    #[tokio::test]
    async fn test_interrupt_before_first_pass() {
        let registry = passes::registry().expect("registry");
        let interrupt = Interrupt::new();
        interrupt.trigger("SIGINT");
        let mut ctx = RunContext::new(OpgateConfig::default(), interrupt);
        let selection: PassSelection = "build".parse().expect("parse");

        let err = run_selection(&registry, &selection, &mut ctx).await.unwrap_err();
        assert_eq!(CliError::Run(err).exit_code(), 130);
    }

    #[test]
    fn test_run_summary_render_text() {
        colored::control::set_override(false);
        let summary = RunSummary {
            run_id: "run-1".to_owned(),
            selection: vec!["build".to_owned()],
            passes: vec![PassRecord {
                name: "build".to_owned(),
                duration_ms: 1200,
            }],
            total_ms: 1250,
            services: Vec::new(),
        };
        let mut buffer = Vec::new();
        summary.render_text(&mut buffer).expect("text rendering should succeed");
        let output = String::from_utf8(buffer).expect("valid UTF-8");
        assert!(output.contains("run-1 PASSED"));
        assert!(output.contains("build"));
        assert!(output.contains("Total: 1250 ms"));
        assert!(!output.contains("Services:"));
    }
}
