//! # directory
//!
//! Read-only access to the faculty directory, the source of truth for
//! people, organizational units, study cycles and faculty authorities.
//!
//! ## Guarantees
//!
//! **This crate never writes to the directory.** Every backend exposes the
//! same query surface ([`DirectoryReader`]) and returns denormalized records
//! whose relationships are plain identifier lists.
//!
//! ## Backends
//!
//! - `ldap` (default feature): [`LdapDirectory`] reads a live LDAP server
//!   through a blocking connection
//! - [`SnapshotDirectory`]: serves a TOML/JSON snapshot of the directory
//!
//! ## Example
//!
//! ```no_run
//! use directory::{DirectoryReader, SnapshotDirectory};
//! use std::path::Path;
//!
//! let dir = SnapshotDirectory::load(Path::new("directory.toml"))?;
//! for student in dir.list_students()? {
//!     println!("{} {} <{}>", student.first_name, student.last_name, student.email);
//! }
//! # Ok::<(), directory::Error>(())
//! ```

#![deny(unsafe_code)]

/// Directory backends.
pub mod backend;
/// Error types for directory operations.
pub mod error;
/// Directory record types.
pub mod types;

pub use backend::DirectoryReader;
#[cfg(feature = "ldap")]
pub use backend::ldap::{LdapDirectory, LdapSettings};
pub use backend::snapshot::{Snapshot, SnapshotAuthority, SnapshotDirectory};
pub use error::{Error, Result};
pub use types::{
    AuthorityRole, DirectoryEmployee, DirectoryOrganization, DirectoryOrganizationalUnit,
    DirectoryStudent, DirectoryStudyCycle,
};
