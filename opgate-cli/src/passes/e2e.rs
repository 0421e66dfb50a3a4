//! End-to-end passes: `e2e-fast`, `e2e-slow`, `e2e-upgrade`
//!
//! Each variant runs one `go test` invocation against the target cluster
//! inside an authorization scope, so the temporary grant is released on
//! every exit path.

use std::path::Path;

use tracing::{info, warn};

use opgate_authz::{GrantSpec, KubeAuthorizationApi, ScopeOutcome, with_authorization};
use opgate_core::config::OpgateConfig;
use opgate_core::error::OpgateError;
use opgate_core::pass::Pass;
use opgate_core::process::CommandSpec;

use crate::context::RunContext;

/// Bucket the backup tests write to.
pub const E2E_BUCKET_ENV: &str = "E2E_BUCKET";

/// Which end-to-end suite to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum E2eVariant {
    Fast,
    Slow,
    Upgrade,
}

impl E2eVariant {
    pub fn pass_name(self) -> &'static str {
        match self {
            Self::Fast => "e2e-fast",
            Self::Slow => "e2e-slow",
            Self::Upgrade => "e2e-upgrade",
        }
    }

    fn description(self) -> &'static str {
        match self {
            Self::Fast => "fast end-to-end suite against the target cluster",
            Self::Slow => "slow end-to-end suite (backup/restore) against the target cluster",
            Self::Upgrade => "operator upgrade suite (upgrade_from -> upgrade_to)",
        }
    }
}

/// One end-to-end suite.
pub struct E2ePass {
    variant: E2eVariant,
}

impl E2ePass {
    pub fn new(variant: E2eVariant) -> Self {
        Self { variant }
    }

    pub fn variant(&self) -> E2eVariant {
        self.variant
    }
}

impl Pass<RunContext> for E2ePass {
    fn name(&self) -> &str {
        self.variant.pass_name()
    }

    fn description(&self) -> &str {
        self.variant.description()
    }

    fn preflight(&self, ctx: &RunContext) -> Result<(), OpgateError> {
        ctx.config.require_e2e()?;
        if self.variant == E2eVariant::Upgrade {
            ctx.config.require_upgrade_images()?;
        }
        Ok(())
    }

    async fn run(&self, ctx: &mut RunContext) -> Result<(), OpgateError> {
        self.preflight(ctx)?;
        let config = &ctx.config;

        let spec = e2e_command(config, self.variant);
        let context = Some(config.cluster.context.as_str()).filter(|c| !c.is_empty());
        let api = KubeAuthorizationApi::connect(Path::new(&config.cluster.kubeconfig), context).await?;
        let grant = GrantSpec::for_namespace(&config.cluster.namespace, &ctx.run_id);

        info!(
            pass = self.variant.pass_name(),
            namespace = %config.cluster.namespace,
            run_id = %ctx.run_id,
            command = %spec,
            "running end-to-end suite"
        );

        let commands = &ctx.commands;
        let outcome = with_authorization(&api, grant, &ctx.interrupt, commands.run(&spec)).await?;

        match outcome {
            ScopeOutcome::Interrupted(signal) => {
                warn!(pass = self.variant.pass_name(), signal, "suite interrupted, grant released");
                Err(ctx.interrupt.error())
            }
            ScopeOutcome::Completed(result) => {
                let output = result?;
                if output.success() {
                    Ok(())
                } else {
                    Err(OpgateError::Test {
                        step: self.variant.pass_name().to_owned(),
                        status: output.status,
                    })
                }
            }
        }
    }
}

/// Build the `go test` invocation for a variant.
///
/// Flags after the package are handed to the test binary.
pub fn e2e_command(config: &OpgateConfig, variant: E2eVariant) -> CommandSpec {
    let e2e = &config.e2e;
    let package = match variant {
        E2eVariant::Fast => &e2e.fast_package,
        E2eVariant::Slow => &e2e.slow_package,
        E2eVariant::Upgrade => &e2e.upgrade_package,
    };

    let mut spec = CommandSpec::new("go")
        .args(["test", package.as_str()])
        .args(["-timeout", e2e.timeout.as_str()]);
    if !e2e.run_filter.is_empty() {
        spec = spec.args(["-run", e2e.run_filter.as_str()]);
    }
    if e2e.race && variant != E2eVariant::Upgrade {
        spec = spec.arg("-race");
    }

    spec = spec
        .arg(format!("--kubeconfig={}", config.cluster.kubeconfig))
        .arg(format!("--namespace={}", config.cluster.namespace));

    spec = match variant {
        E2eVariant::Upgrade => spec
            .arg(format!("--old-image={}", config.operator.upgrade_from))
            .arg(format!("--new-image={}", config.operator.upgrade_to)),
        E2eVariant::Fast | E2eVariant::Slow => {
            spec.arg(format!("--operator-image={}", config.operator.image))
        }
    };

    spec.env(E2E_BUCKET_ENV, &e2e.bucket)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> OpgateConfig {
        let mut config = OpgateConfig::default();
        config.operator.image = "quay.io/example/operator:dev".to_owned();
        config.operator.upgrade_from = "quay.io/example/operator:v0.9".to_owned();
        config.operator.upgrade_to = "quay.io/example/operator:dev".to_owned();
        config.cluster.kubeconfig = "/ci/kubeconfig".to_owned();
        config.cluster.namespace = "e2e".to_owned();
        config.e2e.bucket = "backups".to_owned();
        config
    }

    #[test]
    fn fast_command_targets_operator_image() {
        let spec = e2e_command(&config(), E2eVariant::Fast);
        assert_eq!(
            spec.to_string(),
            "go test ./test/e2e/ -timeout 30m -race --kubeconfig=/ci/kubeconfig \
             --namespace=e2e --operator-image=quay.io/example/operator:dev"
        );
        assert_eq!(spec.envs(), [("E2E_BUCKET".to_owned(), "backups".to_owned())]);
    }

    #[test]
    fn run_filter_and_race_flag_follow_config() {
        let mut config = config();
        config.e2e.run_filter = "TestCreateCluster".to_owned();
        config.e2e.race = false;
        let spec = e2e_command(&config, E2eVariant::Slow);
        let args = spec.arguments();
        assert_eq!(args[1], "./test/e2e/e2eslow");
        assert!(args.windows(2).any(|w| w == ["-run", "TestCreateCluster"]));
        assert!(!args.iter().any(|a| a == "-race"));
    }

    #[test]
    fn upgrade_command_carries_both_images() {
        let spec = e2e_command(&config(), E2eVariant::Upgrade);
        let args = spec.arguments();
        assert!(args.contains(&"--old-image=quay.io/example/operator:v0.9".to_owned()));
        assert!(args.contains(&"--new-image=quay.io/example/operator:dev".to_owned()));
        assert!(!args.iter().any(|a| a.starts_with("--operator-image")));
    }

    #[test]
    fn variants_have_distinct_names() {
        let names: Vec<_> = [E2eVariant::Fast, E2eVariant::Slow, E2eVariant::Upgrade]
            .into_iter()
            .map(E2eVariant::pass_name)
            .collect();
        assert_eq!(names, ["e2e-fast", "e2e-slow", "e2e-upgrade"]);
    }
}
