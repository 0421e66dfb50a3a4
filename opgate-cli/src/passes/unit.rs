//! `unit` pass: object store emulator, per-package tests, merged coverage

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use opgate_core::config::ObjectStoreConfig;
use opgate_core::error::{ConfigError, OpgateError};
use opgate_core::pass::Pass;
use opgate_coverage::{
    CommandUploader, CoverMode, CoverageAggregator, GoTestRunner, PackageTestRunner,
    upload_best_effort,
};
use opgate_provision::{
    BollardRuntime, ContainerRuntime, Provisioner, ServiceHandle, ServiceSpec,
};

use crate::context::RunContext;

/// Where the unit pass gets its container runtime and package runner from.
pub trait UnitBackend: Send + Sync {
    type Runtime: ContainerRuntime;
    type Runner: PackageTestRunner;

    /// Detect the container runtime; `None` when it is unreachable.
    fn runtime(&self) -> impl Future<Output = Option<Arc<Self::Runtime>>> + Send;

    /// Build the package runner. `env` is exported to every package test.
    fn runner(&self, ctx: &RunContext, env: Vec<(String, String)>) -> Self::Runner;
}

/// Local docker daemon plus the `go` toolchain.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalBackend;

impl UnitBackend for LocalBackend {
    type Runtime = BollardRuntime;
    type Runner = GoTestRunner;

    async fn runtime(&self) -> Option<Arc<BollardRuntime>> {
        BollardRuntime::detect().await
    }

    fn runner(&self, ctx: &RunContext, env: Vec<(String, String)>) -> GoTestRunner {
        let mut runner =
            GoTestRunner::new(ctx.commands.clone()).with_test_args(ctx.config.unit.test_args.clone());
        for (key, value) in env {
            runner = runner.with_env(key, value);
        }
        runner
    }
}

/// Unit tests with coverage.
pub struct UnitPass<B = LocalBackend> {
    backend: B,
}

impl UnitPass {
    pub fn new() -> Self {
        Self {
            backend: LocalBackend,
        }
    }
}

impl Default for UnitPass {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: UnitBackend> UnitPass<B> {
    pub fn with_backend(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}

fn cover_mode(ctx: &RunContext) -> Result<CoverMode, ConfigError> {
    ctx.config
        .unit
        .cover_mode
        .parse()
        .map_err(|reason| ConfigError::InvalidValue {
            field: "unit.cover_mode".to_owned(),
            reason,
        })
}

impl<B: UnitBackend> Pass<RunContext> for UnitPass<B> {
    fn name(&self) -> &str {
        "unit"
    }

    fn description(&self) -> &str {
        "unit tests per package against the object store emulator, merged coverage"
    }

    fn preflight(&self, ctx: &RunContext) -> Result<(), OpgateError> {
        ctx.config.require_object_store()?;
        cover_mode(ctx)?;
        Ok(())
    }

    async fn run(&self, ctx: &mut RunContext) -> Result<(), OpgateError> {
        // credentials first: nothing is provisioned without them
        ctx.config.require_object_store()?;
        let mode = cover_mode(ctx)?;
        let store = ctx.config.object_store.clone();
        let unit = ctx.config.unit.clone();

        let spec = ServiceSpec::object_store(&store);
        let runtime = if ctx.services.running(spec.label()).is_some() {
            None
        } else {
            self.backend.runtime().await
        };
        let provisioner =
            Provisioner::new(runtime).with_settle(Duration::from_secs(store.settle_secs));
        let handle = provisioner.ensure(&spec, &mut ctx.services).await?;
        info!(
            service = %handle.name,
            endpoint = %handle.endpoint,
            started_here = handle.started_here,
            "object store ready"
        );

        let runner = self.backend.runner(ctx, test_env(&handle, &store));
        let aggregator = CoverageAggregator::new(runner, mode, ctx.resolve(&unit.profile_file));

        let packages = aggregator.runner().list_packages(&unit.package_pattern).await?;
        info!(pattern = %unit.package_pattern, count = packages.len(), "running unit tests");
        let outcome = aggregator.aggregate(&packages).await?;

        let report_path = ctx.resolve(&unit.coverage_file);
        outcome.report.write_to(&report_path).await?;
        info!(
            path = %report_path.display(),
            lines = outcome.report.len(),
            failures = outcome.failures.len(),
            "coverage report written"
        );

        let uploader = CommandUploader::from_argv(ctx.commands.clone(), &unit.upload_command);
        upload_best_effort(uploader.as_ref(), &report_path).await;

        outcome.ensure_passed()?;
        Ok(())
    }
}

/// Environment exported to every package test.
pub fn test_env(handle: &ServiceHandle, store: &ObjectStoreConfig) -> Vec<(String, String)> {
    vec![
        ("OBJECT_STORE_ENDPOINT".to_owned(), handle.endpoint.clone()),
        ("OBJECT_STORE_BUCKET".to_owned(), store.bucket.clone()),
        ("AWS_ACCESS_KEY_ID".to_owned(), store.access_key.clone()),
        ("AWS_SECRET_ACCESS_KEY".to_owned(), store.secret_key.clone()),
    ]
}
