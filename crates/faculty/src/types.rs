//! Entity types for the faculty store

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub type AccountId = i64;
pub type StudentId = i64;
pub type EmployeeId = i64;
pub type OrganizationId = i64;
pub type StudyCycleId = i64;
pub type OrganizationalUnitId = i64;
pub type AuthorityId = i64;
pub type PermissionId = i64;
pub type GroupId = i64;

/// Marker in an academic title meaning "doctor or above" ("dr", "dr hab.", "prof. dr hab.")
pub const DOCTORAL_MARKER: &str = "dr";

/// Directory freshness flag embedded in every synchronized entity.
///
/// True only when the last synchronization pass matched the entity against
/// the directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncFlag {
    pub is_directory_synced: bool,
}

impl SyncFlag {
    pub fn new(is_directory_synced: bool) -> Self {
        Self {
            is_directory_synced,
        }
    }
}

/// Person variant bound to an account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersonKind {
    Student,
    Employee,
    Organization,
}

impl PersonKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::Employee => "employee",
            Self::Organization => "organization",
        }
    }
}

impl fmt::Display for PersonKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A login account. Usernames are unique across every kind of person.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub last_login: DateTime<Utc>,
    pub date_joined: DateTime<Utc>,
}

impl Account {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub id: StudentId,
    pub account_id: AccountId,
    pub username: String,
    pub sync: SyncFlag,
}

/// A university employee
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    pub id: EmployeeId,
    pub account_id: AccountId,
    pub username: String,
    /// Academic title
    pub title: String,
    /// Position (assistant, professor, ...)
    pub position: String,
    pub organizational_unit_id: Option<OrganizationalUnitId>,
    pub sync: SyncFlag,
}

impl Employee {
    pub fn is_doctor_or_above(&self) -> bool {
        is_doctoral_title(&self.title)
    }

    pub fn can_supervise(&self) -> bool {
        self.is_doctor_or_above()
    }

    pub fn can_review(&self) -> bool {
        self.is_doctor_or_above()
    }
}

/// True if the academic title carries the doctoral marker
pub fn is_doctoral_title(title: &str) -> bool {
    title.contains(DOCTORAL_MARKER)
}

/// An external organization (company, association, office), acting through
/// its representative's account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    pub id: OrganizationId,
    pub account_id: AccountId,
    pub username: String,
    pub name: String,
    pub sync: SyncFlag,
}

/// A study cycle (e.g. computer science, full-time, 2020-2024)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudyCycle {
    pub id: StudyCycleId,
    pub directory_key: String,
    pub name: String,
    /// Managed locally, never written by synchronization
    pub submissions_open_at: Option<NaiveDate>,
    /// Managed locally, never written by synchronization
    pub submissions_close_at: Option<NaiveDate>,
    pub sync: SyncFlag,
}

impl StudyCycle {
    /// Whether thesis submissions are open on `day`
    pub fn accepts_submissions_on(&self, day: NaiveDate) -> bool {
        match (self.submissions_open_at, self.submissions_close_at) {
            (Some(open), Some(close)) => open <= day && day <= close,
            (Some(open), None) => open <= day,
            (None, Some(close)) => day <= close,
            (None, None) => false,
        }
    }
}

/// An organizational unit (department, dean's office)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationalUnit {
    pub id: OrganizationalUnitId,
    pub directory_key: String,
    pub name: String,
    pub head_id: Option<EmployeeId>,
    pub sync: SyncFlag,
}

/// A faculty authority slot. `role` is a local role code; rows with codes
/// outside the known set are invalid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authority {
    pub id: AuthorityId,
    pub role: String,
    pub occupant_id: Option<EmployeeId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub id: PermissionId,
    /// Object kind the permission applies to (e.g. "thesis_topic")
    pub scope: String,
    pub codename: String,
    pub description: String,
}

/// A named bundle of permissions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub name: String,
}

/// Tables carrying a [`SyncFlag`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SyncedEntity {
    Student,
    Employee,
    Organization,
    StudyCycle,
    OrganizationalUnit,
}

impl SyncedEntity {
    pub const ALL: [SyncedEntity; 5] = [
        SyncedEntity::Student,
        SyncedEntity::StudyCycle,
        SyncedEntity::Employee,
        SyncedEntity::OrganizationalUnit,
        SyncedEntity::Organization,
    ];

    pub(crate) fn table(&self) -> &'static str {
        match self {
            Self::Student => "students",
            Self::Employee => "employees",
            Self::Organization => "organizations",
            Self::StudyCycle => "study_cycles",
            Self::OrganizationalUnit => "organizational_units",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Student => "students",
            Self::Employee => "employees",
            Self::Organization => "organizations",
            Self::StudyCycle => "study cycles",
            Self::OrganizationalUnit => "organizational units",
        }
    }
}

/// Synced/unsynced row counts for one table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncFlagSummary {
    pub entity: SyncedEntity,
    pub synced: u64,
    pub unsynced: u64,
}

impl SyncFlagSummary {
    pub fn total(&self) -> u64 {
        self.synced + self.unsynced
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn employee(title: &str) -> Employee {
        Employee {
            id: 1,
            account_id: 1,
            username: "e1".to_string(),
            title: title.to_string(),
            position: String::new(),
            organizational_unit_id: None,
            sync: SyncFlag::default(),
        }
    }

    #[test]
    fn test_doctoral_titles() {
        assert!(employee("dr inż.").is_doctor_or_above());
        assert!(employee("prof. dr hab.").can_supervise());
        assert!(employee("dr hab. inż.").can_review());
        assert!(!employee("mgr inż.").is_doctor_or_above());
        assert!(!employee("").is_doctor_or_above());
    }

    #[test]
    fn test_submission_window() {
        let day = |d| NaiveDate::from_ymd_opt(2024, 3, d).unwrap();
        let mut cycle = StudyCycle {
            id: 1,
            directory_key: "cs-2020".to_string(),
            name: "CS".to_string(),
            submissions_open_at: None,
            submissions_close_at: None,
            sync: SyncFlag::default(),
        };
        assert!(!cycle.accepts_submissions_on(day(10)));

        cycle.submissions_open_at = Some(day(5));
        cycle.submissions_close_at = Some(day(20));
        assert!(cycle.accepts_submissions_on(day(5)));
        assert!(cycle.accepts_submissions_on(day(20)));
        assert!(!cycle.accepts_submissions_on(day(21)));
    }

    #[test]
    fn test_account_full_name() {
        let account = Account {
            id: 1,
            username: "u1".to_string(),
            first_name: "Anna".to_string(),
            last_name: String::new(),
            email: String::new(),
            last_login: DateTime::UNIX_EPOCH,
            date_joined: DateTime::UNIX_EPOCH,
        };
        assert_eq!(account.full_name(), "Anna");
    }
}
