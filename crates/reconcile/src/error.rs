//! Error types for synchronization runs

use crate::types::{EntityKind, SyncReport};
use thiserror::Error;

/// Errors that can occur during a synchronization run
#[derive(Error, Debug)]
pub enum Error {
    /// The directory could not be read
    #[error("directory error: {0}")]
    Directory(#[from] directory::Error),

    /// The local store rejected a read or write
    #[error("store error: {0}")]
    Store(#[from] faculty::Error),

    /// The permission table is inconsistent
    #[error("invalid permission table: {0}")]
    PermissionTable(String),

    /// A pass failed; passes that finished before it stay applied
    #[error("synchronization aborted during {pass} pass: {cause}")]
    Aborted {
        pass: EntityKind,
        completed: Box<SyncReport>,
        #[source]
        cause: Box<Error>,
    },
}

impl Error {
    /// Report of the passes that completed before an abort
    pub fn completed(&self) -> Option<&SyncReport> {
        match self {
            Error::Aborted { completed, .. } => Some(completed),
            _ => None,
        }
    }

    /// Check if the failure came from the directory
    pub fn is_directory_failure(&self) -> bool {
        match self {
            Error::Directory(_) => true,
            Error::Aborted { cause, .. } => cause.is_directory_failure(),
            Error::Store(_) | Error::PermissionTable(_) => false,
        }
    }
}

/// Result type for synchronization operations
pub type Result<T> = std::result::Result<T, Error>;
