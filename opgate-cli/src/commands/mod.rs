//! Command handlers -- one module per subcommand

pub mod config;
pub mod list;
pub mod run;

use std::path::Path;

use opgate_core::config::OpgateConfig;
use opgate_core::error::OpgateError;

/// Config file used when `--config` is not given.
pub const DEFAULT_CONFIG_PATH: &str = "opgate.toml";

/// Load the effective configuration.
///
/// An explicit path must exist; the default path may be absent, in which
/// case defaults plus environment overrides are used.
pub async fn load_config(path: Option<&Path>) -> Result<OpgateConfig, OpgateError> {
    match path {
        Some(path) => OpgateConfig::load(path).await,
        None => OpgateConfig::load_or_default(DEFAULT_CONFIG_PATH).await,
    }
}

/// Human-readable name of the configuration source.
pub fn config_source(path: Option<&Path>) -> String {
    path.map_or_else(|| DEFAULT_CONFIG_PATH.to_owned(), |p| p.display().to_string())
}
