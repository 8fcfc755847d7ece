use anyhow::{Context, Result, bail};
use directory::LdapSettings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::paths;

// ============================================================================
// Main Config Schema
// ============================================================================

/// The facsync configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FacsyncConfig {
    /// Local store location
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Where directory data comes from
    #[serde(default)]
    pub directory: DirectoryConfig,

    /// HTTP trigger settings
    #[serde(default)]
    pub serve: ServeConfig,
}

impl FacsyncConfig {
    /// Load the config from `path`, or from the default location
    ///
    /// A missing file at the default location yields the default config; a
    /// missing file given explicitly is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (config_path, explicit) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => (paths::config_file()?, false),
        };

        if !config_path.exists() {
            if explicit {
                bail!("Config file not found: {}", config_path.display());
            }
            log::debug!(
                "No config at {}, using defaults",
                config_path.display()
            );
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Could not read config file: {}", config_path.display()))?;
        Self::parse(&content)
            .with_context(|| format!("Invalid config file: {}", config_path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Invalid TOML format in facsync config")
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        match self.directory.source {
            DirectorySource::Ldap => self
                .directory
                .ldap
                .validate()
                .context("Invalid [directory.ldap] section")?,
            DirectorySource::Snapshot => {
                if self.directory.snapshot.path.trim().is_empty() {
                    bail!("directory.snapshot.path is required when directory.source = \"snapshot\"");
                }
            }
        }
        self.serve.validate()?;
        Ok(())
    }

    /// Resolved database path
    pub fn database_path(&self) -> Result<PathBuf> {
        match &self.database.path {
            Some(path) => Ok(paths::expand(path)),
            None => paths::database_file(),
        }
    }

    /// Resolved snapshot path
    pub fn snapshot_path(&self) -> PathBuf {
        paths::expand(&self.directory.snapshot.path)
    }

    /// TOML rendering with the bind password masked
    pub fn to_redacted_toml(&self) -> Result<String> {
        let mut shown = self.clone();
        if shown.directory.ldap.bind_password.is_some() {
            shown.directory.ldap.bind_password = Some("***REDACTED***".to_string());
        }
        toml::to_string_pretty(&shown).context("Failed to serialize config")
    }
}

// ============================================================================
// Sections
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite file; defaults to the data directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DirectorySource {
    #[default]
    Ldap,
    Snapshot,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DirectoryConfig {
    #[serde(default)]
    pub source: DirectorySource,

    #[serde(default)]
    pub ldap: LdapSettings,

    #[serde(default)]
    pub snapshot: SnapshotConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnapshotConfig {
    /// TOML or JSON snapshot file
    #[serde(default)]
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServeConfig {
    /// Listen address of the HTTP trigger
    #[serde(default = "default_serve_address")]
    pub address: String,
}

fn default_serve_address() -> String {
    "127.0.0.1:8089".to_string()
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            address: default_serve_address(),
        }
    }
}

impl ServeConfig {
    pub fn validate(&self) -> Result<()> {
        self.address
            .parse::<std::net::SocketAddr>()
            .with_context(|| format!("Invalid serve.address '{}'", self.address))?;
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_example_config() {
        let toml = r#"
[database]
path = "/var/lib/facsync/faculty.db"

[directory]
source = "ldap"

[directory.ldap]
url = "ldaps://ldap.example.edu:636"
base_dn = "ou=FCS,o=BUT,c=pl"
bind_dn = "cn=sync,ou=services,o=BUT,c=pl"
bind_password_env = "FACSYNC_LDAP_PASSWORD"

[serve]
address = "0.0.0.0:9000"
"#;

        let config = FacsyncConfig::parse(toml).unwrap();
        assert_eq!(config.directory.source, DirectorySource::Ldap);
        assert_eq!(config.directory.ldap.timeout_secs, 30);
        assert_eq!(config.directory.ldap.unit_head_node, "cn=kierownik");
        assert_eq!(
            config.database_path().unwrap(),
            PathBuf::from("/var/lib/facsync/faculty.db")
        );
        config.validate().unwrap();
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = FacsyncConfig::parse("").unwrap();
        assert_eq!(config.directory.source, DirectorySource::Ldap);
        assert_eq!(config.serve.address, "127.0.0.1:8089");
        assert!(config.database.path.is_none());
        config.validate().unwrap();
    }

    #[test]
    fn test_snapshot_source_requires_path() {
        let config = FacsyncConfig::parse("[directory]\nsource = \"snapshot\"\n").unwrap();
        assert!(config.validate().is_err());

        let config = FacsyncConfig::parse(
            "[directory]\nsource = \"snapshot\"\n[directory.snapshot]\npath = \"/tmp/dir.toml\"\n",
        )
        .unwrap();
        config.validate().unwrap();
        assert_eq!(config.snapshot_path(), PathBuf::from("/tmp/dir.toml"));
    }

    #[test]
    fn test_invalid_serve_address() {
        let config = FacsyncConfig::parse("[serve]\naddress = \"nowhere\"\n").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_redacted_toml_hides_password() {
        let mut config = FacsyncConfig::default();
        config.directory.ldap.bind_password = Some("hunter2".to_string());
        let shown = config.to_redacted_toml().unwrap();
        assert!(!shown.contains("hunter2"));
        assert!(shown.contains("REDACTED"));
        assert_eq!(
            config.directory.ldap.bind_password.as_deref(),
            Some("hunter2")
        );
    }

    #[test]
    fn test_load_explicit_missing_file() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("nope.toml");
        assert!(FacsyncConfig::load(Some(&missing)).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(
            &path,
            "[directory]\nsource = \"snapshot\"\n[directory.snapshot]\npath = \"dir.json\"\n",
        )
        .unwrap();

        let config = FacsyncConfig::load(Some(&path)).unwrap();
        assert_eq!(config.directory.source, DirectorySource::Snapshot);
    }
}
