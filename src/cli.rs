use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "facsync")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Synchronize the faculty thesis database with the university directory", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Minimum log level (overrides -v/-q)
    #[arg(long, value_enum, global = true, env = "FACSYNC_LOG_LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Config file (default: ~/.config/facsync/config.toml)
    #[arg(short, long, global = true, env = "FACSYNC_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run a full synchronization against the directory
    Sync(SyncArgs),

    /// Show per-entity sync flags and authority occupancy
    Status,

    /// Serve an HTTP endpoint that triggers synchronization
    Serve(ServeArgs),

    /// Inspect configuration
    #[command(subcommand)]
    Config(ConfigCommand),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn filter(self) -> log::LevelFilter {
        match self {
            Self::Error => log::LevelFilter::Error,
            Self::Warn => log::LevelFilter::Warn,
            Self::Info => log::LevelFilter::Info,
            Self::Debug => log::LevelFilter::Debug,
            Self::Trace => log::LevelFilter::Trace,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Summary table
    #[default]
    Text,
    /// Full report as JSON
    Json,
}

#[derive(Debug, clap::Args)]
pub struct SyncArgs {
    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Debug, clap::Args)]
pub struct ServeArgs {
    /// Listen address (default from serve.address)
    #[arg(short, long)]
    pub address: Option<String>,
}

// ============================================================================
// Config Commands
// ============================================================================

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Print the resolved configuration (password redacted)
    Show,

    /// Check the configuration for errors
    Validate,

    /// Print config, database and snapshot locations
    Path,
}
