mod cli;
mod commands;
mod config;
mod record_file;

use anyhow::Result;
use clap::Parser;
use config::Config;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cli::*;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "qb_cli=debug,qb_script=debug"
    } else {
        "qb_cli=info,qb_script=warn"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Config::load()?;
    run(config, cli.command)
}

fn run(config: Config, command: Commands) -> Result<()> {
    match command {
        Commands::Info { record } => {
            commands::script::info(&config, &record)?;
        }

        Commands::Decompile {
            record,
            names,
            output,
        } => {
            commands::script::decompile(&config, &record, names.as_deref(), output.as_deref())?;
        }

        Commands::Strings { record, format } => {
            commands::strings::list(&config, &record, format)?;
        }

        Commands::SetString {
            record,
            index,
            text,
            output,
            backup,
        } => {
            commands::strings::set(&config, &record, index, &text, output.as_deref(), backup)?;
        }

        Commands::Export { record, output } => {
            commands::payload::export(&config, &record, &output)?;
        }

        Commands::Import {
            record,
            payload,
            output,
            backup,
        } => {
            commands::payload::import(&config, &record, &payload, output.as_deref(), backup)?;
        }

        Commands::Dump { record } => {
            commands::script::dump(&config, &record)?;
        }

        Commands::Configure {
            platform,
            endian,
            charset,
            names,
            show,
        } => {
            let changes = commands::configure::Changes {
                platform,
                endian,
                charset,
                names,
            };
            commands::configure::handle(config, changes, show)?;
        }
    }

    Ok(())
}
