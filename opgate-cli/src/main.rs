use clap::Parser;

use opgate_cli::cli::{Cli, Commands};
use opgate_cli::commands;
use opgate_cli::error::CliError;
use opgate_cli::logging::init_tracing;
use opgate_cli::output::OutputWriter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let code = match dispatch(cli).await {
        Ok(()) => 0,
        Err(e) => {
            let code = e.exit_code();
            tracing::error!(
                error = %e,
                pass = e.failed_pass().unwrap_or("-"),
                exit_code = code,
                "opgate failed"
            );
            eprintln!("error: {e}");
            code
        }
    };

    std::process::exit(code);
}

async fn dispatch(cli: Cli) -> Result<(), CliError> {
    let writer = OutputWriter::new(cli.output);
    let config_path = cli.config.as_deref();

    // config subcommands report load errors themselves
    let command = match cli.command {
        Commands::Config(args) => {
            return commands::config::execute(args, config_path, &writer).await;
        }
        other => other,
    };

    let mut config = commands::load_config(config_path).await?;
    if let Some(level) = cli.log_level {
        config.general.log_level = level;
        config.validate()?;
    }
    init_tracing(&config.general)?;
    tracing::debug!(
        config = %commands::config_source(config_path),
        work_dir = %config.general.work_dir,
        "opgate starting"
    );

    match command {
        Commands::Run(args) => commands::run::execute(args, config, &writer).await,
        Commands::List => commands::list::execute(&config, &writer),
        Commands::Config(_) => Ok(()),
    }
}
