//! # Reconcile
//!
//! Converges the local faculty store with the directory.
//!
//! A run has three parts:
//!
//! - **Prepare**: [`PermissionRegistrar::prepare`] drops and recreates every
//!   permission and capability group defined by the [`PermissionTable`]
//! - **Passes**: [`Reconciler`] runs one pass per [`EntityKind`] in
//!   [`EntityKind::SYNC_ORDER`]; each pass resets the freshness flag of its
//!   local rows, matches directory records by natural key, creates what is
//!   missing and rebuilds the relationships it owns
//! - **Report**: [`SyncEngine::run`] returns a [`SyncReport`] with per-kind
//!   counts, unresolved references and authority anomalies
//!
//! Local rows missing from the directory are never deleted; they keep
//! `is_directory_synced == false`. The one exception is authority rows with
//! roles outside the fixed role set.
//!
//! ## Example
//!
//! ```no_run
//! use directory::SnapshotDirectory;
//! use faculty::Store;
//! use reconcile::{NoProgress, PermissionRegistrar, PermissionTable, SyncEngine};
//! use std::path::Path;
//!
//! let directory = SnapshotDirectory::load(Path::new("directory.toml"))?;
//! let store = Store::open(Path::new("faculty.db"))?;
//! let registrar = PermissionRegistrar::new(PermissionTable::standard());
//!
//! let report = SyncEngine::new(&directory, &store, registrar).run(&mut NoProgress)?;
//! for pass in &report.passes {
//!     println!("{}: {} created, {} updated", pass.kind, pass.created, pass.updated);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod engine;
pub mod error;
pub mod permissions;
pub mod progress;
pub mod reconciler;
pub mod types;

pub use engine::SyncEngine;
pub use error::{Error, Result};
pub use permissions::{
    Capability, GroupSpec, PermissionRef, PermissionRegistrar, PermissionSpec, PermissionTable,
    PrepareSummary,
};
pub use progress::{NoProgress, SyncProgress};
pub use reconciler::Reconciler;
pub use types::{EntityKind, PassReport, RelationshipWarning, SyncReport, SyncTotals};
