//! `opgate config` command handler

use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tracing::info;

use opgate_core::config::OpgateConfig;

use crate::cli::{ConfigAction, ConfigArgs};
use crate::commands::{config_source, load_config};
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Placeholder printed instead of secrets.
pub const REDACTED: &str = "***REDACTED***";

const SECTIONS: [&str; 8] = [
    "general",
    "operator",
    "cluster",
    "object_store",
    "e2e",
    "unit",
    "verify",
    "build",
];

/// Execute the `config` command.
pub async fn execute(
    args: ConfigArgs,
    config_path: Option<&Path>,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    match args.action {
        ConfigAction::Validate => execute_validate(config_path, writer).await,
        ConfigAction::Show { section } => execute_show(config_path, section, writer).await,
    }
}

/// Load and validate the configuration, reporting any error.
///
/// # Errors
///
/// Returns `CliError::Config` if validation fails (parse errors, invalid values,
/// an explicit `--config` path that does not exist).
async fn execute_validate(config_path: Option<&Path>, writer: &OutputWriter) -> Result<(), CliError> {
    let source = config_source(config_path);
    info!(path = %source, "validating configuration");

    let report = match load_config(config_path).await {
        Ok(_) => ConfigValidationReport {
            source,
            valid: true,
            errors: Vec::new(),
        },
        Err(e) => ConfigValidationReport {
            source,
            valid: false,
            errors: vec![e.to_string()],
        },
    };

    writer.render(&report)?;

    if !report.valid {
        return Err(CliError::Config("configuration is invalid".to_owned()));
    }

    Ok(())
}

/// Display the effective configuration (file + env overrides + defaults)
/// with object store credentials redacted.
async fn execute_show(
    config_path: Option<&Path>,
    section: Option<String>,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let source = config_source(config_path);
    info!(path = %source, "loading configuration");

    let mut config = load_config(config_path).await?;
    redact_credentials(&mut config);

    let config_toml = match section.as_deref() {
        None => render_toml(&config),
        Some("general") => render_toml(&config.general),
        Some("operator") => render_toml(&config.operator),
        Some("cluster") => render_toml(&config.cluster),
        Some("object_store") => render_toml(&config.object_store),
        Some("e2e") => render_toml(&config.e2e),
        Some("unit") => render_toml(&config.unit),
        Some("verify") => render_toml(&config.verify),
        Some("build") => render_toml(&config.build),
        Some(other) => {
            return Err(CliError::Command(format!(
                "unknown section: {other} (expected: {})",
                SECTIONS.join(", ")
            )));
        }
    };

    writer.render(&ConfigReport {
        source,
        section,
        config_toml,
    })
}

fn render_toml<T: Serialize>(value: &T) -> String {
    toml::to_string_pretty(value).unwrap_or_else(|e| format!("(serialization error: {e})"))
}

/// Replace object store credentials with a placeholder.
///
/// Empty values stay empty so a missing credential is still visible.
pub fn redact_credentials(config: &mut OpgateConfig) {
    for secret in [
        &mut config.object_store.access_key,
        &mut config.object_store.secret_key,
    ] {
        if !secret.is_empty() {
            *secret = REDACTED.to_owned();
        }
    }
}

/// Configuration display report.
///
/// The `config_toml` field is skipped during JSON serialization (only used for text rendering).
#[derive(Serialize)]
pub struct ConfigReport {
    /// Configuration source
    pub source: String,
    /// Optional section name (None = full config)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    /// Serialized TOML configuration (with redacted credentials)
    #[serde(skip)]
    pub config_toml: String,
}

impl Render for ConfigReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        if let Some(ref section) = self.section {
            let section_label = format!("[{section}]");
            writeln!(
                w,
                "Configuration {} (source: {})",
                section_label.bold(),
                self.source
            )?;
        } else {
            writeln!(w, "Configuration (source: {})", self.source.bold())?;
        }

        writeln!(w)?;
        write!(w, "{}", self.config_toml)?;

        Ok(())
    }
}

/// Configuration validation report.
#[derive(Serialize)]
pub struct ConfigValidationReport {
    /// Configuration source
    pub source: String,
    /// Whether the configuration is valid
    pub valid: bool,
    /// Validation error messages (empty if valid)
    pub errors: Vec<String>,
}

impl Render for ConfigValidationReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Config Validation: {}", self.source.bold())?;

        if self.valid {
            writeln!(w, "  Result: {}", "VALID".green().bold())?;
        } else {
            writeln!(w, "  Result: {}", "INVALID".red().bold())?;
            for err in &self.errors {
                writeln!(w, "  Error: {}", err.red())?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redact_credentials_masks_keys() {
        let mut config = OpgateConfig::default();
        config.object_store.access_key = "minio".to_owned();
        config.object_store.secret_key = "minio123".to_owned();

        redact_credentials(&mut config);

        assert_eq!(config.object_store.access_key, REDACTED);
        assert_eq!(config.object_store.secret_key, REDACTED);
        let rendered = render_toml(&config);
        assert!(!rendered.contains("minio123"), "secret leaked: {rendered}");
    }

    #[test]
    fn test_redact_credentials_keeps_empty_values() {
        let mut config = OpgateConfig::default();
        redact_credentials(&mut config);
        assert!(config.object_store.access_key.is_empty());
        assert!(config.object_store.secret_key.is_empty());
    }

    #[test]
    fn test_every_section_renders() {
        let config = OpgateConfig::default();
        let full = render_toml(&config);
        for section in SECTIONS {
            assert!(full.contains(&format!("[{section}]")), "missing [{section}]");
        }
    }

    #[test]
    fn test_config_report_render_text_specific_section() {
        let report = ConfigReport {
            source: "/ci/opgate.toml".to_owned(),
            section: Some("unit".to_owned()),
            config_toml: "cover_mode = \"count\"".to_owned(),
        };

        let mut buffer = Vec::new();
        report
            .render_text(&mut buffer)
            .expect("text rendering should succeed");

        let output = String::from_utf8(buffer).expect("valid UTF-8");
        assert!(output.contains("[unit]"), "should show section name");
        assert!(output.contains("cover_mode"), "should show config content");
    }

    #[test]
    fn test_config_report_json_skips_toml_body() {
        let report = ConfigReport {
            source: "opgate.toml".to_owned(),
            section: None,
            config_toml: "[general]".to_owned(),
        };

        let json = serde_json::to_value(&report).expect("JSON serialization should succeed");
        assert_eq!(json["source"].as_str(), Some("opgate.toml"));
        assert!(json.get("section").is_none());
        assert!(json.get("config_toml").is_none(), "config_toml should be skipped");
    }

    #[test]
    fn test_config_validation_report_invalid() {
        let report = ConfigValidationReport {
            source: "bad.toml".to_owned(),
            valid: false,
            errors: vec!["invalid config value for 'unit.cover_mode'".to_owned()],
        };

        let mut buffer = Vec::new();
        report
            .render_text(&mut buffer)
            .expect("text rendering should succeed");

        let output = String::from_utf8(buffer).expect("valid UTF-8");
        assert!(output.contains("INVALID"), "should show invalid status");
        assert!(output.contains("unit.cover_mode"), "should show error message");
    }
}
