use crate::error::Result;
use crate::types::{
    AuthorityRole, DirectoryEmployee, DirectoryOrganization, DirectoryOrganizationalUnit,
    DirectoryStudent, DirectoryStudyCycle,
};

#[cfg(feature = "ldap")]
pub mod ldap;
pub mod snapshot;

/// Read-only view of the directory.
///
/// Relationships are returned as lists of identifiers, never as resolved
/// objects. Implementations:
/// - `LdapDirectory` queries a live LDAP server
/// - `SnapshotDirectory` serves a snapshot loaded from disk (offline runs, tests)
pub trait DirectoryReader: Send + Sync {
    /// All students
    fn list_students(&self) -> Result<Vec<DirectoryStudent>>;

    /// All employees
    fn list_employees(&self) -> Result<Vec<DirectoryEmployee>>;

    /// All external organizations
    fn list_organizations(&self) -> Result<Vec<DirectoryOrganization>>;

    /// All study cycles with their student identifiers
    fn list_study_cycles(&self) -> Result<Vec<DirectoryStudyCycle>>;

    /// All organizational units with head and member identifiers
    fn list_organizational_units(&self) -> Result<Vec<DirectoryOrganizationalUnit>>;

    /// Identifier of the employee holding `role`.
    ///
    /// Returns `Err(Error::NotFound)` if the role entry itself is missing from
    /// the directory, and `Ok(None)` if the entry exists without an occupant.
    fn authority_occupant(&self, role: AuthorityRole) -> Result<Option<String>>;

    /// Short description of the source, for logs
    fn describe(&self) -> String;

    /// Key of the organizational unit the employee belongs to, if any
    fn organizational_unit_of(&self, employee_id: &str) -> Result<Option<String>> {
        Ok(self
            .list_organizational_units()?
            .into_iter()
            .find(|unit| unit.member_ids.iter().any(|id| id == employee_id))
            .map(|unit| unit.key))
    }
}
