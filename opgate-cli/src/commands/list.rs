//! `opgate list` command handler

use std::io::Write;

use serde::Serialize;

use opgate_core::config::OpgateConfig;

use crate::error::CliError;
use crate::output::{OutputWriter, Render};
use crate::passes;

/// Execute the `list` command.
pub fn execute(config: &OpgateConfig, writer: &OutputWriter) -> Result<(), CliError> {
    let report = build_pass_list(config)?;
    writer.render(&report)
}

/// Describe every registered pass and whether the effective selection includes it.
pub fn build_pass_list(config: &OpgateConfig) -> Result<PassList, CliError> {
    let registry = passes::registry()?;
    let selection = config.selection();

    let passes = registry
        .describe()
        .into_iter()
        .map(|(name, description)| PassInfo {
            position: selection.names().iter().position(|n| *n == name).map(|i| i + 1),
            name,
            description,
        })
        .collect();

    Ok(PassList {
        selection: selection.names().to_vec(),
        passes,
    })
}

/// Registered passes.
#[derive(Serialize)]
pub struct PassList {
    /// Effective selection, in run order
    pub selection: Vec<String>,
    /// Every registered pass
    pub passes: Vec<PassInfo>,
}

#[derive(Serialize)]
pub struct PassInfo {
    pub name: String,
    pub description: String,
    /// 1-based position in the effective selection
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<usize>,
}

impl Render for PassList {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Passes ({} registered)", self.passes.len())?;
        writeln!(w, "{:<4} {:<16} Description", "#", "Name")?;
        writeln!(w, "{}", "-".repeat(72))?;
        for pass in &self.passes {
            let position = pass
                .position
                .map_or_else(|| "-".to_owned(), |p| p.to_string());
            let name = if pass.position.is_some() {
                pass.name.bold().to_string()
            } else {
                pass.name.dimmed().to_string()
            };
            writeln!(w, "{:<4} {:<16} {}", position, name, pass.description)?;
        }
        writeln!(w)?;
        writeln!(w, "Selection: {}", self.selection.join(","))?;
        Ok(())
    }
}
