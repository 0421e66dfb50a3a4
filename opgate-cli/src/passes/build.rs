//! `build` pass: operator image plus the backup and restore components

use tracing::info;

use opgate_core::error::OpgateError;
use opgate_core::pass::Pass;
use opgate_core::process::CommandSpec;

use crate::context::RunContext;

/// Environment variable every build command receives.
pub const OPERATOR_IMAGE_ENV: &str = "OPERATOR_IMAGE";

/// Runs the configured builders in order; the first failure aborts.
pub struct BuildPass;

impl Pass<RunContext> for BuildPass {
    fn name(&self) -> &str {
        "build"
    }

    fn description(&self) -> &str {
        "build the operator image and the backup/restore components"
    }

    fn preflight(&self, ctx: &RunContext) -> Result<(), OpgateError> {
        Ok(ctx.config.require_operator_image()?)
    }

    async fn run(&self, ctx: &mut RunContext) -> Result<(), OpgateError> {
        ctx.config.require_operator_image()?;
        let image = ctx.config.operator.image.clone();
        let build = ctx.config.build.clone();

        let steps = [
            ("operator", &build.operator_command),
            ("backup", &build.backup_command),
            ("restore", &build.restore_command),
        ];

        for (step, argv) in steps {
            let Some(spec) = CommandSpec::from_argv(argv) else {
                info!(step, "no build command configured, skipping");
                continue;
            };
            let spec = spec.env(OPERATOR_IMAGE_ENV, &image);

            info!(step, command = %spec, image = %image, "building");
            let output = ctx.commands.run(&spec).await?;
            if !output.success() {
                return Err(OpgateError::Build {
                    step: step.to_owned(),
                    reason: format!("`{spec}` exited with status {:?}", output.status),
                });
            }
        }

        Ok(())
    }
}
