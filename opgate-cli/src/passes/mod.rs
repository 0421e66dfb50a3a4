//! Pass implementations and the static registry
//!
//! Registration order is the order `opgate list` prints; execution order
//! is always the selection's order.

pub mod build;
pub mod e2e;
pub mod license;
pub mod unit;
pub mod verify;

use opgate_core::error::ConfigError;
use opgate_core::pass::PassRegistry;

use crate::context::RunContext;

pub use build::BuildPass;
pub use e2e::{E2ePass, E2eVariant};
pub use unit::{LocalBackend, UnitBackend, UnitPass};
pub use verify::VerifyPass;

/// Build the registry of every pass opgate knows.
pub fn registry() -> Result<PassRegistry<RunContext>, ConfigError> {
    let mut registry = PassRegistry::new();
    registry.register(Box::new(VerifyPass))?;
    registry.register(Box::new(BuildPass))?;
    registry.register(Box::new(E2ePass::new(E2eVariant::Fast)))?;
    registry.register(Box::new(E2ePass::new(E2eVariant::Slow)))?;
    registry.register(Box::new(UnitPass::new()))?;
    registry.register(Box::new(E2ePass::new(E2eVariant::Upgrade)))?;
    Ok(registry)
}
