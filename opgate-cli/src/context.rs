//! Shared state threaded through every pass of one run.

use std::path::{Path, PathBuf};

use opgate_core::config::OpgateConfig;
use opgate_core::process::CommandRunner;
use opgate_core::signal::Interrupt;
use opgate_provision::ServiceRegistry;

/// Run-wide context.
///
/// Passes are not isolated: services recorded here by one pass are visible
/// to every later pass in the same run.
pub struct RunContext {
    /// Effective configuration (file + env overrides + defaults).
    pub config: OpgateConfig,
    /// External command runner rooted at `general.work_dir`.
    pub commands: CommandRunner,
    /// Services provisioned (or adopted) during this run.
    pub services: ServiceRegistry,
    /// Shared interrupt handle.
    pub interrupt: Interrupt,
    /// Unique id for this run, attached to cluster objects.
    pub run_id: String,
}

impl RunContext {
    /// Build a context with a fresh run id.
    pub fn new(config: OpgateConfig, interrupt: Interrupt) -> Self {
        let work_dir = PathBuf::from(&config.general.work_dir);
        Self {
            commands: CommandRunner::new(work_dir, interrupt.clone()),
            services: ServiceRegistry::new(),
            run_id: uuid::Uuid::new_v4().to_string(),
            config,
            interrupt,
        }
    }

    /// Root of the repository under test.
    pub fn work_dir(&self) -> &Path {
        self.commands.work_dir()
    }

    /// Resolve a configured path relative to the work dir.
    pub fn resolve(&self, path: &str) -> PathBuf {
        self.work_dir().join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_ids_are_unique() {
        let a = RunContext::new(OpgateConfig::default(), Interrupt::new());
        let b = RunContext::new(OpgateConfig::default(), Interrupt::new());
        assert_ne!(a.run_id, b.run_id);
        assert!(uuid::Uuid::parse_str(&a.run_id).is_ok());
    }

    #[test]
    fn test_resolve_relative_to_work_dir() {
        let mut config = OpgateConfig::default();
        config.general.work_dir = "/src/operator".to_owned();
        let ctx = RunContext::new(config, Interrupt::new());
        assert_eq!(
            ctx.resolve("coverage.txt"),
            PathBuf::from("/src/operator/coverage.txt")
        );
        assert!(ctx.services.is_empty());
    }
}
