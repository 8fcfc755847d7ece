//! Centralized path resolution for facsync
//!
//! # Environment Variables
//!
//! - `FACSYNC_CONFIG_DIR` - Override config directory
//! - `FACSYNC_DATA_DIR` - Override data directory (default database location)
//!
//! # Path Resolution Priority
//!
//! For config_dir():
//! 1. `FACSYNC_CONFIG_DIR` environment variable
//! 2. `XDG_CONFIG_HOME/facsync` (if set)
//! 3. Platform default:
//!    - Windows: `%APPDATA%\facsync`
//!    - macOS/Linux: `~/.config/facsync`
//!
//! For data_dir():
//! 1. `FACSYNC_DATA_DIR` environment variable
//! 2. `XDG_DATA_HOME/facsync` (if set)
//! 3. Platform default:
//!    - Windows: `%LOCALAPPDATA%\facsync`
//!    - macOS/Linux: `~/.local/share/facsync`

use anyhow::{Context, Result};
use std::path::PathBuf;

/// Environment variable for config directory override
pub const ENV_CONFIG_DIR: &str = "FACSYNC_CONFIG_DIR";

/// Environment variable for data directory override
pub const ENV_DATA_DIR: &str = "FACSYNC_DATA_DIR";

const APP_DIR: &str = "facsync";

/// Get the facsync config directory path
pub fn config_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(ENV_CONFIG_DIR) {
        let path = expand(&dir);
        log::debug!(
            "Using config dir from {}: {}",
            ENV_CONFIG_DIR,
            path.display()
        );
        return Ok(path);
    }

    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
        let path = PathBuf::from(xdg_config).join(APP_DIR);
        log::debug!("Using XDG_CONFIG_HOME: {}", path.display());
        return Ok(path);
    }

    #[cfg(windows)]
    {
        if let Some(app_data) = dirs::config_dir() {
            return Ok(app_data.join(APP_DIR));
        }
    }

    let home = dirs::home_dir().context("Could not determine home directory")?;
    let path = home.join(".config").join(APP_DIR);
    log::debug!("Using default config dir: {}", path.display());
    Ok(path)
}

/// Get the facsync data directory path
pub fn data_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(ENV_DATA_DIR) {
        let path = expand(&dir);
        log::debug!("Using data dir from {}: {}", ENV_DATA_DIR, path.display());
        return Ok(path);
    }

    if let Ok(xdg_data) = std::env::var("XDG_DATA_HOME") {
        let path = PathBuf::from(xdg_data).join(APP_DIR);
        log::debug!("Using XDG_DATA_HOME: {}", path.display());
        return Ok(path);
    }

    #[cfg(windows)]
    {
        if let Some(local_app_data) = dirs::data_local_dir() {
            return Ok(local_app_data.join(APP_DIR));
        }
    }

    let home = dirs::home_dir().context("Could not determine home directory")?;
    let path = home.join(".local").join("share").join(APP_DIR);
    log::debug!("Using default data dir: {}", path.display());
    Ok(path)
}

/// Default config file location
pub fn config_file() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

/// Default database location
pub fn database_file() -> Result<PathBuf> {
    Ok(data_dir()?.join("faculty.db"))
}

/// Expand ~ and environment variables in a path string.
///
/// Unknown variables leave the string unexpanded.
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    /// Run `f` with `key` set to `value`, restoring the previous value after
    fn with_env_var<F, R>(key: &str, value: &str, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let original = env::var(key).ok();
        // SAFETY: only these tests touch the facsync variables
        unsafe { env::set_var(key, value) };
        let result = f();
        match original {
            // SAFETY: as above
            Some(v) => unsafe { env::set_var(key, v) },
            None => unsafe { env::remove_var(key) },
        }
        result
    }

    #[test]
    fn test_config_dir_env_override() {
        with_env_var(ENV_CONFIG_DIR, "/custom/facsync", || {
            assert_eq!(config_dir().unwrap(), PathBuf::from("/custom/facsync"));
            assert_eq!(
                config_file().unwrap(),
                PathBuf::from("/custom/facsync/config.toml")
            );
        });
    }

    #[test]
    fn test_data_dir_env_override_with_tilde() {
        let home = dirs::home_dir().unwrap();
        with_env_var(ENV_DATA_DIR, "~/facsync-data-test", || {
            assert_eq!(data_dir().unwrap(), home.join("facsync-data-test"));
            assert_eq!(
                database_file().unwrap(),
                home.join("facsync-data-test").join("faculty.db")
            );
        });
    }

    #[test]
    fn test_expand_plain_path() {
        assert_eq!(expand("/srv/faculty.db"), PathBuf::from("/srv/faculty.db"));
    }

    #[test]
    fn test_expand_tilde() {
        let home = dirs::home_dir().unwrap();
        assert_eq!(expand("~/x.toml"), home.join("x.toml"));
    }
}
