pub mod config;
pub mod serve;
pub mod status;
pub mod sync;

use anyhow::{Context as _, Result};
use directory::{DirectoryReader, LdapDirectory, SnapshotDirectory};
use faculty::Store;

use crate::schema::{DirectorySource, FacsyncConfig};

/// Open the local store named by the config
pub fn open_store(config: &FacsyncConfig) -> Result<Store> {
    let path = config.database_path()?;
    Store::open(&path).with_context(|| format!("Failed to open database: {}", path.display()))
}

/// Open the directory source named by the config
///
/// LDAP sources bind immediately, so this fails fast on bad credentials.
pub fn open_directory(config: &FacsyncConfig) -> Result<Box<dyn DirectoryReader>> {
    match config.directory.source {
        DirectorySource::Ldap => {
            let settings = config.directory.ldap.clone();
            let url = settings.url.clone();
            let directory = LdapDirectory::connect(settings)
                .with_context(|| format!("Failed to connect to LDAP at {url}"))?;
            Ok(Box::new(directory))
        }
        DirectorySource::Snapshot => {
            let path = config.snapshot_path();
            let directory = SnapshotDirectory::load(&path)
                .with_context(|| format!("Failed to load snapshot: {}", path.display()))?;
            Ok(Box::new(directory))
        }
    }
}
