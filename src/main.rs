mod cli;
mod commands;
mod paths;
mod schema;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use schema::FacsyncConfig;
use std::io;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(match cli.log_level {
            Some(level) => level.filter(),
            None if cli.quiet => log::LevelFilter::Error,
            None => log_level,
        })
        .format_timestamp(None)
        .init();

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
    };

    if let Command::Completions { shell } = cli.command {
        generate(shell, &mut Cli::command(), "facsync", &mut io::stdout());
        return Ok(());
    }

    let config = FacsyncConfig::load(cli.config.as_deref())?;

    match cli.command {
        Command::Sync(args) => {
            config.validate()?;
            commands::sync::run(&ctx, &config, args)
        }
        Command::Status => commands::status::run(&ctx, &config),
        Command::Serve(args) => {
            config.validate()?;
            commands::serve::run(&ctx, &config, args)
        }
        Command::Config(cmd) => commands::config::run(&ctx, cli.config.as_deref(), &config, cmd),
        Command::Completions { .. } => Ok(()),
    }
}
