use anyhow::Result;
use std::path::Path;

use crate::Context;
use crate::cli::ConfigCommand;
use crate::paths;
use crate::schema::{DirectorySource, FacsyncConfig};
use crate::ui;

pub fn run(
    ctx: &Context,
    config_path: Option<&Path>,
    config: &FacsyncConfig,
    cmd: ConfigCommand,
) -> Result<()> {
    match cmd {
        ConfigCommand::Show => {
            print!("{}", config.to_redacted_toml()?);
            Ok(())
        }
        ConfigCommand::Validate => validate(ctx, config),
        ConfigCommand::Path => show_paths(config_path, config),
    }
}

fn validate(ctx: &Context, config: &FacsyncConfig) -> Result<()> {
    config.validate()?;

    if config.directory.source == DirectorySource::Ldap
        && let Err(e) = config.directory.ldap.resolve_password()
    {
        ui::warn(&format!("LDAP password not available: {e}"));
    }

    if !ctx.quiet {
        ui::success("Configuration is valid");
    }
    Ok(())
}

fn show_paths(config_path: Option<&Path>, config: &FacsyncConfig) -> Result<()> {
    ui::header("facsync Paths");

    let file = match config_path {
        Some(path) => path.to_path_buf(),
        None => paths::config_file()?,
    };
    let marker = if file.exists() { "" } else { " (missing, using defaults)" };
    ui::kv("Config", &format!("{}{marker}", file.display()));
    ui::kv("Database", &config.database_path()?.display().to_string());

    match config.directory.source {
        DirectorySource::Ldap => ui::kv("Directory", &config.directory.ldap.url),
        DirectorySource::Snapshot => {
            ui::kv("Snapshot", &config.snapshot_path().display().to_string());
        }
    }

    println!();
    Ok(())
}
