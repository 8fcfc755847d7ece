use thiserror::Error;

/// Errors that can occur while reading the directory.
///
/// Only [`Error::NotFound`] describes a condition the caller may recover from
/// (a directory entry that is expected but missing). Everything else means the
/// directory could not be read and the data returned so far is incomplete.
#[derive(Debug, Error)]
pub enum Error {
    /// A directory entry does not exist
    #[error("directory entry not found: {0}")]
    NotFound(String),

    /// Could not connect or bind to the directory server
    #[error("directory connection failed: {0}")]
    Connection(String),

    /// A search against the directory failed
    #[error("directory search under '{base}' failed: {message}")]
    Search {
        /// Search base DN
        base: String,
        /// Failure description from the client
        message: String,
    },

    /// An entry is missing a required attribute or has a malformed value
    #[error("invalid directory entry '{dn}': {message}")]
    InvalidEntry {
        /// Distinguished name of the offending entry
        dn: String,
        /// What is wrong with it
        message: String,
    },

    /// Snapshot file could not be parsed
    #[error("invalid directory snapshot: {0}")]
    Snapshot(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Returns true if this error only reports a missing entry.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    /// Returns true if the directory itself is unreachable or unreadable.
    pub fn is_fatal(&self) -> bool {
        !self.is_not_found()
    }

    #[cfg(feature = "ldap")]
    pub(crate) fn search(base: impl Into<String>, message: impl ToString) -> Self {
        Error::Search {
            base: base.into(),
            message: message.to_string(),
        }
    }
}

/// Result type for directory operations
pub type Result<T> = std::result::Result<T, Error>;
