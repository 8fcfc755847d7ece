//! Snapshot backend.
//!
//! Serves a directory snapshot stored as TOML or JSON. Used for offline
//! synchronization runs and as the directory in tests.
//!
//! ```toml
//! [[students]]
//! id = "u1"
//! first_name = "Anna"
//! last_name = "Nowak"
//! email = "anna@example.edu"
//!
//! [[study_cycles]]
//! key = "cs-2020"
//! name = "Computer Science 2020"
//! member_ids = ["u1"]
//!
//! [[authorities]]
//! role = "dean"
//! occupant = "e1"
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};
use crate::types::{
    AuthorityRole, DirectoryEmployee, DirectoryOrganization, DirectoryOrganizationalUnit,
    DirectoryStudent, DirectoryStudyCycle,
};

use super::DirectoryReader;

/// An authority role entry in a snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotAuthority {
    pub role: AuthorityRole,
    #[serde(default)]
    pub occupant: Option<String>,
}

/// Full directory contents
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub students: Vec<DirectoryStudent>,
    #[serde(default)]
    pub employees: Vec<DirectoryEmployee>,
    #[serde(default)]
    pub organizations: Vec<DirectoryOrganization>,
    #[serde(default)]
    pub study_cycles: Vec<DirectoryStudyCycle>,
    #[serde(default)]
    pub organizational_units: Vec<DirectoryOrganizationalUnit>,
    #[serde(default)]
    pub authorities: Vec<SnapshotAuthority>,
}

impl Snapshot {
    /// Parse a snapshot, choosing the format from the file extension
    pub fn parse(content: &str, path: &Path) -> Result<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => {
                serde_json::from_str(content).map_err(|e| Error::Snapshot(e.to_string()))
            }
            Some("toml") | None => {
                toml::from_str(content).map_err(|e| Error::Snapshot(e.to_string()))
            }
            Some(other) => Err(Error::Snapshot(format!(
                "unsupported snapshot format '.{other}' (expected .toml or .json)"
            ))),
        }
    }
}

/// Directory backed by an in-memory snapshot.
pub struct SnapshotDirectory {
    snapshot: Snapshot,
    source: String,
}

impl SnapshotDirectory {
    /// Load a snapshot file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let snapshot = Snapshot::parse(&content, path)?;
        log::debug!(
            "Loaded directory snapshot from {} ({} students, {} employees)",
            path.display(),
            snapshot.students.len(),
            snapshot.employees.len()
        );
        Ok(Self {
            snapshot,
            source: path.display().to_string(),
        })
    }

    /// Wrap an already-built snapshot
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        Self {
            snapshot,
            source: "in-memory snapshot".to_string(),
        }
    }
}

impl DirectoryReader for SnapshotDirectory {
    fn list_students(&self) -> Result<Vec<DirectoryStudent>> {
        Ok(self.snapshot.students.clone())
    }

    fn list_employees(&self) -> Result<Vec<DirectoryEmployee>> {
        Ok(self.snapshot.employees.clone())
    }

    fn list_organizations(&self) -> Result<Vec<DirectoryOrganization>> {
        Ok(self.snapshot.organizations.clone())
    }

    fn list_study_cycles(&self) -> Result<Vec<DirectoryStudyCycle>> {
        Ok(self.snapshot.study_cycles.clone())
    }

    fn list_organizational_units(&self) -> Result<Vec<DirectoryOrganizationalUnit>> {
        Ok(self.snapshot.organizational_units.clone())
    }

    fn authority_occupant(&self, role: AuthorityRole) -> Result<Option<String>> {
        self.snapshot
            .authorities
            .iter()
            .find(|a| a.role == role)
            .map(|a| a.occupant.clone())
            .ok_or_else(|| Error::NotFound(format!("cn={},ou=authorities", role.directory_name())))
    }

    fn describe(&self) -> String {
        format!("snapshot ({})", self.source)
    }
}
